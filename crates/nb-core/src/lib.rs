//! nestboard/crates/nb-core/src/lib.rs
//!
//! The central domain logic and interface definitions for nestboard:
//! permission-pruned nested-set listings, read tracking, pagination and the
//! capability-checked board operations.

pub mod assembler;
pub mod error;
pub mod models;
pub mod pagination;
pub mod service;
pub mod tracking;
pub mod traits;
pub mod visibility;

// Re-exporting for easier access in other crates
pub use assembler::*;
pub use error::*;
pub use models::*;
pub use pagination::*;
pub use service::*;
pub use traits::*;
pub use visibility::*;
