//! Vidstash Web - HTTP API Server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Exposes media serving, URL and swarm ingestion and the transcode gateway
//! over plain HTTP. Responses are plain text; failures carry a stable code in
//! the `x-vidstash-error` header.

pub mod handlers;
pub mod server;

// Re-export main types
pub use handlers::ERROR_CODE_HEADER;
pub use server::{AppState, ServerError, build_router, run_server};
