//! User-facing reply texts
//!
//! Everything coming from the upstream service or the session store is
//! escaped before it is embedded into HTML.

use chrono::{DateTime, Utc};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::{bold, code_inline, escape};

use super::bot::Command;
use crate::session::{DevUrlRecord, SessionRecord, DEV_URL_TTL_DAYS};
use crate::upstream::GenerateResult;

/// Number of cookie characters shown before truncation.
pub const COOKIE_PREVIEW_CHARS: usize = 20;

pub const ACCESS_DENIED: &str = "🚫 Access denied. Only owner can use this command.";
pub const IN_PROGRESS: &str = "⏳ Generating Deno project, please wait...";
pub const GENERATE_FAILED: &str = "❌ Error generating Deno project. Please try again later.";
pub const SESSION_UNAVAILABLE: &str = "❌ Session storage is unavailable. Please try again later.";
pub const SAVE_FAILED: &str = "⚠️ The project was generated, but the session could not be saved.";
pub const INTERNAL_ERROR: &str = "❌ Something went wrong while handling your request. Please try again.";

pub const WELCOME: &str = "👋 Welcome!\n\nThis bot generates Deno Deploy projects for its owner.\nUse /generate to create one or /help to see all commands.";

pub fn help() -> String {
    Command::descriptions().to_string()
}

/// First [`COOKIE_PREVIEW_CHARS`] characters of a cookie followed by an ellipsis.
pub fn cookie_preview(cookies: &str) -> String {
    let preview: String = cookies.chars().take(COOKIE_PREVIEW_CHARS).collect();
    format!("{}...", preview)
}

fn expiry_date(created_at: DateTime<Utc>) -> String {
    (created_at + chrono::Duration::days(DEV_URL_TTL_DAYS))
        .format("%Y-%m-%d")
        .to_string()
}

/// Summary of a successful generate call, HTML formatted.
///
/// Each section appears only when the corresponding field was returned.
pub fn generate_summary(result: &GenerateResult, now: DateTime<Utc>) -> String {
    let mut message = String::from("✅ Deno Project Generated Successfully!\n\n");

    if let Some(cookies) = result.cookies() {
        message.push_str(&format!(
            "🍪 {}\n{}\n\n",
            bold("Cookies Updated:"),
            code_inline(&cookie_preview(cookies))
        ));
    }

    if let Some(org) = &result.org {
        message.push_str(&format!(
            "🏢 {}\n{} (ID: {})\n\n",
            bold("Organization Created:"),
            escape(&org.name),
            code_inline(&org.id)
        ));
    }

    if let Some(dev_url) = &result.dev_url {
        message.push_str(&format!("🔗 {}\n{}\n\n", bold("Dev URL:"), escape(&dev_url.url)));
        message.push_str(&format!("⏳ {} {}", bold("Expires:"), expiry_date(now)));
    }

    if result.is_empty() {
        message.push_str("The service returned no new data.");
    }

    message.trim_end().to_string()
}

fn dev_url_line(dev_url: &DevUrlRecord, now: DateTime<Utc>) -> String {
    let state = if dev_url.is_expired(now) { "expired" } else { "expires" };
    format!(
        "• {} ({} {})",
        escape(&dev_url.url),
        state,
        dev_url.expires_at.format("%Y-%m-%d")
    )
}

/// Stored session, HTML formatted.
pub fn session_view(session: &SessionRecord, now: DateTime<Utc>) -> String {
    let mut message = format!("📋 {}\n\n", bold("Session"));

    message.push_str(&format!("🍪 {} ", bold("Cookies:")));
    if session.has_cookies() {
        message.push_str(&code_inline(&cookie_preview(&session.cookies)));
    } else {
        message.push_str("none");
    }
    message.push_str("\n\n");

    message.push_str(&format!("🏢 {} {}\n", bold("Organizations:"), session.organizations.len()));
    for org in &session.organizations {
        message.push_str(&format!("• {} (ID: {})\n", escape(&org.name), code_inline(&org.id)));
    }

    message.push_str(&format!(
        "\n🔗 {} {} ({} active)\n",
        bold("Dev URLs:"),
        session.dev_urls.len(),
        session.active_dev_urls(now).count()
    ));
    for dev_url in &session.dev_urls {
        message.push_str(&dev_url_line(dev_url, now));
        message.push('\n');
    }

    message.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OrgRecord;
    use crate::upstream::{DevUrlPayload, OrgPayload};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn test_cookie_preview_truncates_to_twenty_chars() {
        assert_eq!(cookie_preview("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnopqrst...");
        assert_eq!(cookie_preview("short"), "short...");
    }

    #[test]
    fn test_cookie_preview_respects_char_boundaries() {
        let cookie = "é".repeat(25);
        assert_eq!(cookie_preview(&cookie), format!("{}...", "é".repeat(20)));
    }

    #[test]
    fn test_summary_with_all_fields() {
        let result = GenerateResult {
            cookies: Some("session=0123456789abcdefghij".to_string()),
            org: Some(OrgPayload {
                id: "org-1".to_string(),
                name: "Acme <Labs>".to_string(),
            }),
            dev_url: Some(DevUrlPayload {
                url: "https://p.deno.dev/?a=1&b=2".to_string(),
            }),
        };

        let text = generate_summary(&result, now());

        assert!(text.starts_with("✅ Deno Project Generated Successfully!"));
        assert!(text.contains("<b>Cookies Updated:</b>"));
        assert!(text.contains("<code>session=0123456789ab...</code>"));
        assert!(text.contains("Acme &lt;Labs&gt; (ID: <code>org-1</code>)"));
        assert!(text.contains("https://p.deno.dev/?a=1&amp;b=2"));
        assert!(text.contains("<b>Expires:</b> 2026-02-09"));
    }

    #[test]
    fn test_summary_with_dev_url_only() {
        let result = GenerateResult {
            dev_url: Some(DevUrlPayload {
                url: "https://p.deno.dev".to_string(),
            }),
            ..Default::default()
        };

        let text = generate_summary(&result, now());

        assert!(!text.contains("Cookies Updated"));
        assert!(!text.contains("Organization Created"));
        assert!(text.contains("<b>Dev URL:</b>"));
    }

    #[test]
    fn test_summary_for_empty_result() {
        let text = generate_summary(&GenerateResult::default(), now());
        assert!(text.contains("no new data"));
    }

    #[test]
    fn test_session_view_marks_expired_urls() {
        let session = SessionRecord {
            cookies: String::new(),
            organizations: vec![OrgRecord {
                id: "o1".to_string(),
                name: "first".to_string(),
                created_at: now(),
            }],
            dev_urls: vec![
                DevUrlRecord::new("https://old.deno.dev", now() - chrono::Duration::days(40)),
                DevUrlRecord::new("https://new.deno.dev", now()),
            ],
        };

        let text = session_view(&session, now());

        assert!(text.contains("<b>Cookies:</b> none"));
        assert!(text.contains("<b>Organizations:</b> 1"));
        assert!(text.contains("<b>Dev URLs:</b> 2 (1 active)"));
        assert!(text.contains("https://old.deno.dev (expired"));
        assert!(text.contains("https://new.deno.dev (expires 2026-02-09)"));
    }

    #[test]
    fn test_help_lists_commands() {
        let text = help();
        assert!(text.contains("/generate"));
        assert!(text.contains("/help"));
    }
}
