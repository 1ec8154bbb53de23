//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod fixtures;
pub mod helpers;

#[allow(unused_imports)]
pub use fixtures::TestEnvironment;
#[allow(unused_imports)]
pub use helpers::{message_update, message_update_json, mount_send_message, sent_messages, OWNER_ID, STRANGER_ID};
