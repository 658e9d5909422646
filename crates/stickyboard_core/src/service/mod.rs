//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into caller-scoped use-case APIs.
//! - Keep the board facade and CLI decoupled from storage details.

pub mod category_service;
pub mod note_service;
