//! Domain model for the apps resource.
//!
//! # Invariants
//! - Apps are identified by an opaque, caller-supplied id.
//! - The model carries no storage-only attributes such as `created_at`.

pub mod app;
