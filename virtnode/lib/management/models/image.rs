use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A persisted image row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    /// The row id.
    pub id: i64,

    /// The name of the image, unique among active rows within a namespace.
    pub name: String,

    /// The namespace the image belongs to.
    pub namespace: String,

    /// The kind discriminator of the spec payload.
    pub kind: String,

    /// The canonical JSON of the kind payload.
    #[serde(skip)]
    pub spec_str: String,

    /// When the row was created.
    pub created_at: DateTime<Utc>,

    /// When the row was soft deleted, if ever.
    pub deleted_at: Option<DateTime<Utc>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Image {
    pub(crate) fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            namespace: row.get("namespace"),
            kind: row.get("kind"),
            spec_str: row.get("spec"),
            created_at: row.get("created_at"),
            deleted_at: row.get("deleted_at"),
        }
    }
}
