//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the connectivity core
//! against the recording mock platform (or the host simulation
//! adapters).  All tests run on the host with no radio or flash.

mod connectivity_tests;
mod http_tests;
mod mock_platform;
mod settings_tests;
