//! Editing session services.
//!
//! # Responsibility
//! - Orchestrate tree edits, projection and store calls into session APIs.
//! - Keep front ends decoupled from storage details.

pub mod editor_service;
