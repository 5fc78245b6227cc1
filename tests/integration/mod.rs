//! Integration tests for sqlrag.
//!
//! These run against the in-process SQLite warehouse and the mock LLM, so
//! they need no network access or credentials.

pub mod cli_test;
pub mod common;
pub mod retrieval_test;
