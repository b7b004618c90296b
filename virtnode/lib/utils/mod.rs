//! Utility functions and types.

mod ipnet;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use ipnet::*;
