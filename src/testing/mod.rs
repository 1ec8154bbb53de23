//! Test doubles for the dispatcher's collaborators
//!
//! Shared by unit tests and the integration tests under `tests/`.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use denobot::storage::MemorySessionStore;
//! use denobot::telegram::HandlerDeps;
//! use denobot::testing::{FakeGenerateClient, FakeResponse, RecordingReplier};
//! use teloxide::types::UserId;
//!
//! let replier = Arc::new(RecordingReplier::new());
//! let upstream = Arc::new(FakeGenerateClient::always(FakeResponse::Status(500)));
//! let deps = HandlerDeps::new(replier, upstream, Arc::new(MemorySessionStore::new()), UserId(1));
//! ```

mod fakes;

pub use fakes::{FakeGenerateClient, FakeResponse, RecordingReplier, SentReply};
