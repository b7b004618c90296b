use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a virtnode-related operation.
pub type VirtnodeResult<T> = Result<T, VirtnodeError>;

/// An error that occurred during a virtnode operation.
#[derive(Debug, Error)]
pub enum VirtnodeError {
    /// A malformed spec field, unsupported kind value, invalid network
    /// geometry, empty candidate set or allocation exhaustion.
    #[error("bad input: {0}")]
    BadInput(String),

    /// A lookup by name matched zero active rows.
    #[error("not found: {0}")]
    NotFound(String),

    /// A lookup by name matched more than one active row, or an insert lost a
    /// race against the store's uniqueness constraint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A failure surfaced unchanged from the persistence layer.
    #[error("storage error: {0}")]
    Storage(sqlx::Error),

    /// An error that occurred while running database migrations.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred while serializing or deserializing a spec payload.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// An error that occurred while parsing a resource document.
    #[error("document error: {0}")]
    Document(#[from] serde_yaml::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl VirtnodeError {
    /// Creates a `BadInput` error from a displayable message.
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    /// Creates a `NotFound` error from a displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a `Conflict` error from a displayable message.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Returns true if the error is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the error is a `Conflict` error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true if the error is a `BadInput` error.
    pub fn is_bad_input(&self) -> bool {
        matches!(self, Self::BadInput(_))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<sqlx::Error> for VirtnodeError {
    /// The single translation point between the store and the error taxonomy.
    ///
    /// A unique-constraint violation means a concurrent caller won a
    /// create-create race for the same name, so it is reported as `Conflict`
    /// instead of an opaque storage failure.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("uniqueness constraint violated: {}", db_err));
            }
        }
        Self::Storage(err)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `VirtnodeResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> VirtnodeResult<T> {
    Result::Ok(value)
}
