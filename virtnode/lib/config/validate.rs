//! Required-field validation for resource specs.
//!
//! Enumerated payload values (pull policies, restart policies, kind tags) are
//! already enforced by the tagged spec types at parse time; validation here
//! covers the constraints the type system cannot express.

use crate::{VirtnodeError, VirtnodeResult};

use super::{ImageSpec, NetworkSpec, VmSpec};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageSpec {
    /// Checks the required fields of the spec.
    pub fn validate(&self) -> VirtnodeResult<()> {
        require_non_empty("image.name", &self.name)?;
        require_non_empty("image.namespace", &self.namespace)?;

        match &self.kind {
            super::ImageKind::Url(url_spec) => require_non_empty("image.url", &url_spec.url)?,
        }

        Ok(())
    }
}

impl NetworkSpec {
    /// Checks the required fields of the spec.
    ///
    /// Address geometry has its own check in
    /// [`parse_geometry`](NetworkSpec::parse_geometry).
    pub fn validate(&self) -> VirtnodeResult<()> {
        require_non_empty("network.name", &self.name)?;
        require_non_empty("network.namespace", &self.namespace)?;
        require_non_empty("network.subnet", &self.subnet)?;
        require_non_empty("network.start_ip", &self.start_ip)?;
        require_non_empty("network.end_ip", &self.end_ip)?;
        require_non_empty("network.gateway", &self.gateway)?;
        Ok(())
    }
}

impl VmSpec {
    /// Checks the required fields of the spec.
    pub fn validate(&self) -> VirtnodeResult<()> {
        require_non_empty("vm.name", &self.name)?;
        require_non_zero("vm.vcpus", self.vcpus)?;
        require_non_zero("vm.memory_mb", self.memory_mb)?;
        require_non_zero("vm.disk_gb", self.disk_gb)?;

        for network in &self.networks {
            require_non_empty("vm.networks.name", &network.name)?;
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn require_non_empty(field: &str, value: &str) -> VirtnodeResult<()> {
    if value.is_empty() {
        return Err(VirtnodeError::bad_input(format!(
            "required field is empty: field={}",
            field
        )));
    }
    Ok(())
}

fn require_non_zero(field: &str, value: u32) -> VirtnodeResult<()> {
    if value == 0 {
        return Err(VirtnodeError::bad_input(format!(
            "required field is zero: field={}",
            field
        )));
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
