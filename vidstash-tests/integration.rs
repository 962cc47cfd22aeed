//! Integration tests for Vidstash
//!
//! These tests drive the components through their public interfaces: the
//! media server against real files, ingestion against a local upstream and
//! scripted swarm clients, and the HTTP routes end to end.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/api_routes.rs"]
mod api_routes;
#[path = "integration/media_serving.rs"]
mod media_serving;
#[path = "integration/swarm_ingest.rs"]
mod swarm_ingest;
#[path = "integration/url_ingest.rs"]
mod url_ingest;
