//! Helpers shared by unit and integration tests.
//!
//! Compiled for `cfg(test)` and for the `test-util` feature, which the
//! integration tests enable through the crate's self dev-dependency.

pub mod mock_collector;

pub use mock_collector::{CannedResponse, CapturedRequest, MockCollector, self_signed_identity};
