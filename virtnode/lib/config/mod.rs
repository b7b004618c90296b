//! Declarative resource spec types, validation and document parsing.

mod image;
mod network;
mod resource;
mod validate;
mod vm;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use image::*;
pub use network::*;
pub use resource::*;
pub use vm::*;
