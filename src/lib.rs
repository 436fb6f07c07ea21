//! Personal long-term memory for LLM tools: save short facts, recall them later.
//!
//! Tessera is an [MCP](https://modelcontextprotocol.io/) server exposing two tools,
//! `memory_save` and `memory_retrieve`. Saved facts are embedded through a remote
//! model provider and persisted alongside a keyword index; recall merges both
//! signals into one ranked answer.
//!
//! # Architecture
//!
//! - **Storage**: a single SQLite file with FTS5 indexes over memories and
//!   conversation history, opened exclusively by one process
//! - **Embeddings**: OpenAI-compatible `/v1/embeddings` endpoint, vectors
//!   L2-normalized before they are stored
//! - **Search**: brute-force cosine similarity + BM25 keyword search, fused by a
//!   weighted sum with per-signal relevance floors
//! - **Transport**: MCP over stdio
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite connection setup, schema, and migrations
//! - [`embedding`]: Provider capability traits and the HTTP provider
//! - [`error`]: The [`error::MemoryError`] taxonomy
//! - [`memory`]: Store, vector math, hybrid retrieval, and formatting
//! - [`server`]: MCP stdio server setup
//! - [`tools`]: MCP tool handlers

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod server;
pub mod tools;
