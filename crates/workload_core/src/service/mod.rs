//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate storage port calls into use-case level APIs.
//! - Keep the HTTP transport decoupled from storage details.

pub mod app_service;
