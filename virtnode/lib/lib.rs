//! `virtnode` is a node-local agent for managing declarative virtual machine,
//! image and network resources.
//!
//! # Overview
//!
//! virtnode turns declarative resource documents into persisted state exactly
//! once and hands out collision-free network identifiers. It handles:
//! - Idempotent create-or-update reconciliation for VMs, images and networks
//! - Candidate network resolution for symbolic port requests
//! - IP and MAC address allocation under transactional guarantees
//! - Local network-namespace id assignment with derived link-local addressing
//!
//! # Architecture
//!
//! virtnode consists of several key components:
//!
//! - **Config**: Declarative resource spec types with kind-tagged payloads
//! - **Controller**: Kind dispatch and top-level reconciliation entry points
//! - **Registries**: Image and network create-or-update/lookup operations
//! - **Port allocation**: Transactional IP/MAC assignment per VM port
//! - **Netns planning**: Namespace id allocation for the start flow
//!
//! All persisted entities are soft deleted; a `deleted_at` timestamp hides a
//! row from lookups while partial unique indexes keep its name reserved.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use virtnode::{config::parse_resource_documents, management::VirtController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let controller = VirtController::new("/var/lib/virtnode/virt.db").await?;
//!
//!     let docs = r#"
//! kind: network
//! spec:
//!   name: net0
//!   namespace: default
//!   kind: local
//!   subnet: 10.0.0.0/24
//!   start_ip: 10.0.0.10
//!   end_ip: 10.0.0.20
//!   gateway: 10.0.0.1
//! "#;
//!
//!     let resources = parse_resource_documents(docs)?;
//!     controller.apply(&resources).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`] - Resource spec types, validation and document parsing
//! - [`management`] - Controller, registries, port allocation and persistence
//! - [`utils`] - Address math and MAC generation helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod config;
pub mod management;
pub mod utils;

pub use error::*;
