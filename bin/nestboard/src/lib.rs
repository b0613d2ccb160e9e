//! # nestboard
//!
//! Shared startup pieces of the nestboard binaries.

pub mod settings;
