//! Test support and end-to-end tests
//!
//! - `mocks`: in-memory pipeline stages
//! - `fixtures`: synthesized media files in temporary directories
//! - `e2e`: full conversions through the public API

pub mod mocks;
