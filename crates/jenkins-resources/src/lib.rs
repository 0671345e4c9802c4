//! Read-only `jenkins://` resources.
//!
//! [`ResourceAddress`] parses identifiers against a fixed, ordered set of
//! shapes; [`ResourceRouter`] turns an address into a payload using the typed
//! client, so every network call goes through the connector's executor.

pub mod address;
pub mod health;
pub mod router;

pub use address::{ResourceAddress, ResourceKind, SCHEME};
pub use health::{HealthStatus, HealthSummary, NodeCounts};
pub use router::{ResourceContent, ResourceDescriptor, ResourceRouter, ResourceTemplate};
