//! hotel-nlsql - natural-language questions over hotel reservation data.
//!
//! Questions are translated to SQL by an LLM, passed through the safety
//! pipeline in [`safety`] and only then executed read-only against SQLite.

pub mod agent;
pub mod answer;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod safety;
