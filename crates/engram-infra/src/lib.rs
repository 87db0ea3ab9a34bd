//! Infrastructure implementations for Engram.
//!
//! SQLite-backed persistence, OpenAI-backed embedding/summarization/chat
//! providers, and configuration loading. Everything here implements the
//! ports defined in `engram-core`.

pub mod config;
pub mod openai;
pub mod sqlite;
