//! Builders for Telegram updates and Bot API mocks

#![allow(dead_code)]

use serde_json::{json, Value};
use teloxide::types::Update;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OWNER_ID: u64 = 1273841502;
pub const STRANGER_ID: u64 = 555000111;

/// Raw JSON of a private-chat text message update
pub fn message_update_json(update_id: u32, user_id: u64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1735992000,
            "chat": {"id": user_id, "type": "private", "first_name": "Test"},
            "from": {"id": user_id, "is_bot": false, "first_name": "Test"},
            "text": text
        }
    })
}

pub fn message_update(update_id: u32, user_id: u64, text: &str) -> Update {
    serde_json::from_value(message_update_json(update_id, user_id, text)).expect("valid update JSON")
}

/// Answers every sendMessage call with a plausible Message.
///
/// The method name is matched case-insensitively.
pub async fn mount_send_message(server: &MockServer) {
    let response = json!({
        "ok": true,
        "result": {
            "message_id": 42,
            "from": {"id": 987654321, "is_bot": true, "first_name": "TestBot", "username": "test_bot"},
            "chat": {"id": OWNER_ID, "type": "private", "first_name": "Test"},
            "date": 1735992000,
            "text": "ok"
        }
    });

    Mock::given(method("POST"))
        .and(path_regex("(?i)/bot[^/]+/sendmessage$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}

/// Bodies of all sendMessage requests received so far, in order.
pub async fn sent_messages(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().to_lowercase().ends_with("/sendmessage"))
        .map(|r| serde_json::from_slice(&r.body).expect("sendMessage body is JSON"))
        .collect()
}
