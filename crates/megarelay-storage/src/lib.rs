//! MEGA storage gateway
//!
//! This crate is the boundary between the relay and the MEGA cloud storage
//! provider. It defines the `MegaGateway` trait that the HTTP handlers are
//! written against, the `StoreDescriptor` union covering the provider's
//! observed store-response shapes, public-link parsing/assembly, and the
//! production `MegaApiGateway` binding over the provider's JSON-RPC API.
//!
//! Handlers never touch the wire format: they see sessions, descriptors,
//! links, and `StorageError` kinds.

pub mod crypto;
pub mod descriptor;
pub mod link;
pub mod mega;
pub mod traits;

// Re-export commonly used types
pub use descriptor::StoreDescriptor;
pub use link::{looks_like_public_link, PublicLink, PUBLIC_LINK_BASE};
pub use mega::MegaApiGateway;
pub use traits::{MegaGateway, MegaSession, StorageError, StorageResult};
