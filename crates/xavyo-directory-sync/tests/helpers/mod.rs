//! Shared integration test helpers.

pub mod mock_directory;
