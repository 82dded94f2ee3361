//! `docpipe` crate (library surface).
//!
//! The primary entrypoint for end users is the `docpipe` binary (CLI + MCP stdio).
//! This library module exists to support embedding and to provide a stable way to
//! reuse core types without depending on internal crate layout.

pub use docpipe_core as core;
