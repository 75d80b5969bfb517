//! Test helper modules for ecp-api integration tests
//!
//! - TestServer: router over an in-memory database
//! - Fakes: identity, storage, automation relay and PDF renderer

#![allow(dead_code)]

pub mod fakes;
pub mod test_server;

pub use fakes::{ALICE_TOKEN, BOB_TOKEN, FAKE_PDF};
pub use test_server::{sample_row, TestServer, BUCKET, N8N_SECRET, REPROCESS_SECRET};
