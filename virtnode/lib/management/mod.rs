//! Management components for the virtnode agent.

mod controller;
mod db;
mod image;
mod models;
mod netns;
mod network;
mod port;
mod vm;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use controller::*;
pub use db::*;
pub use models::*;
pub use netns::*;
pub use port::*;
