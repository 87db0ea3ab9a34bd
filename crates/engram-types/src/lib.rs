//! Shared domain types for Engram.
//!
//! This crate contains the core domain types used across the Engram memory
//! engine: Session, Message, Memory, ToolCall, configuration, and their
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod memory;
pub mod session;
pub mod tool;

/// Free-form metadata attached to sessions, messages, and memories.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
