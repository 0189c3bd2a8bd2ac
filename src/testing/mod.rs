//! Testing infrastructure.
//!
//! Controllable in-memory doubles for the task store and code agent seams,
//! so processor and scheduler logic can be tested without a live store or
//! a real subprocess.

pub mod mocks;

pub use mocks::{AgentCall, MockCodeAgent, MockTaskStore, StoreCall};
