//! App domain model.
//!
//! # Responsibility
//! - Define the record exchanged between transport, service and storage.
//!
//! # Invariants
//! - `id` is passed through unvalidated; uniqueness is a storage concern.
//! - `name` carries no uniqueness or length constraint.

use serde::{Deserialize, Serialize};

/// Opaque, caller-supplied app identifier.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type AppId = String;

/// The sole managed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: AppId,
    pub name: String,
}

impl App {
    pub fn new(id: impl Into<AppId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
