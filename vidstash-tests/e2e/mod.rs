//! End-to-end tests over real sockets
//!
//! A Vidstash server and an upstream origin both listen on loopback; the
//! tests talk to them with an ordinary HTTP client.

#[path = "../integration/support.rs"]
#[allow(dead_code)]
mod support;

mod ingest_then_stream;
