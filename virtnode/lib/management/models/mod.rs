//! Persisted entity rows and list views.

mod image;
mod network;
mod vm;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use image::*;
pub use network::*;
pub use vm::*;
