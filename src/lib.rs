//! sqlrag - a retriever that answers questions with warehouse SQL.
//!
//! This library exposes the core modules for use by the binary and
//! integration tests.

pub mod aws;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod generator;
pub mod llm;
pub mod logging;
pub mod retriever;
pub mod warehouse;
