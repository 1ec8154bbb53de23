//! Per-user session records
//!
//! A session is the durable state carried across updates for one Telegram
//! user: the upstream auth cookie, the organizations created for them and the
//! dev URLs they were handed. Lists are append-only.

mod merge;

pub use merge::merge;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a generated dev URL stays valid.
pub const DEV_URL_TTL_DAYS: i64 = 30;

/// Session state stored for a single user id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Opaque upstream auth token, empty until the first generate call returns one.
    #[serde(default)]
    pub cookies: String,
    #[serde(default, rename = "orgs")]
    pub organizations: Vec<OrgRecord>,
    #[serde(default)]
    pub dev_urls: Vec<DevUrlRecord>,
}

impl SessionRecord {
    pub fn has_cookies(&self) -> bool {
        !self.cookies.is_empty()
    }

    /// Dev URLs that have not reached their expiry at `now`.
    pub fn active_dev_urls(&self, now: DateTime<Utc>) -> impl Iterator<Item = &DevUrlRecord> {
        self.dev_urls.iter().filter(move |u| !u.is_expired(now))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevUrlRecord {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DevUrlRecord {
    /// Creates a record that expires [`DEV_URL_TTL_DAYS`] after `created_at`.
    pub fn new(url: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            created_at,
            expires_at: created_at + Duration::days(DEV_URL_TTL_DAYS),
        }
    }

    /// Expiry is informational only; nothing evicts expired records.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
