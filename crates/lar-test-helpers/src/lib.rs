//! Test utilities and fixtures for lar
//!
//! Shared by the integration tests of `lar-core` and `lar-cli`.

pub mod fixtures;
pub mod mocks;
