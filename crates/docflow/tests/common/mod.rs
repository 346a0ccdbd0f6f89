//! Shared test utilities for docflow integration tests.
//!
//! - `TestHarness`: temp input/data directories, an in-memory database and a
//!   pipeline wired to fake external tools
//! - `FakeTools` and `RecordingTracker`: collaborators that record what the
//!   pipeline asked of them

pub mod fakes;
pub mod harness;

pub use fakes::{FakeTools, RecordingTracker};
pub use harness::{wait_until, TestHarness};
