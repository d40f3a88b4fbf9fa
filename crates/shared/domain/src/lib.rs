//! # Domain Models
//!
//! Pure types shared by the synchronization engine, its store collaborators and the CLI.
//! Keep it lean: no I/O, no async, no diffing logic. Just data and simple helpers.

pub mod attribute;
pub mod capabilities;
pub mod config;
pub mod constants;
pub mod leaf;

pub use attribute::{AttributeDefinition, Modify, ResolvedCommon};
pub use capabilities::StoreCapabilities;
pub use config::EngineConfig;
pub use leaf::{ContainerKind, LeafState, LeafWrite};
