//! Folding an upstream generate result into a session

use chrono::{DateTime, Utc};

use super::{DevUrlRecord, OrgRecord, SessionRecord};
use crate::upstream::GenerateResult;

/// Returns the session that results from applying `result` to `old`.
///
/// The cookie field is overwritten only by a non-empty value; organizations and
/// dev URLs are appended. Fields missing from `result` leave their part of the
/// session untouched. `now` stamps the appended records.
pub fn merge(old: &SessionRecord, result: &GenerateResult, now: DateTime<Utc>) -> SessionRecord {
    let mut session = old.clone();

    if let Some(cookies) = result.cookies() {
        session.cookies = cookies.to_string();
    }

    if let Some(org) = &result.org {
        session.organizations.push(OrgRecord {
            id: org.id.clone(),
            name: org.name.clone(),
            created_at: now,
        });
    }

    if let Some(dev_url) = &result.dev_url {
        session.dev_urls.push(DevUrlRecord::new(dev_url.url.clone(), now));
    }

    session
}
