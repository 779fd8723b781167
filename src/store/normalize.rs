//! Schema validation with defaults for the raw JSON read from disk.
//!
//! The file may have been edited by hand or written by an older build, so
//! wrong shapes are repaired instead of rejected: non-array collections become
//! empty, entries missing their key field are dropped, and absent fields get
//! defaults.

use serde_json::{Map, Value};
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
use uuid::Uuid;

use super::types::{normalize_email, Document, MagicLink, MagicLinkMetadata, MagicLinkPurpose, User};

pub(crate) const DEFAULT_REDIRECT: &str = "/user";

/// Expiry given to a stored link that lost its `expiresAt`.
const MISSING_EXPIRY_DEFAULT: Duration = Duration::minutes(30);

pub(crate) fn normalize_document(raw: Value, now: OffsetDateTime) -> Document {
    let Value::Object(mut root) = raw else {
        return Document::default();
    };

    let jobs = match root.remove("jobs") {
        Some(Value::Null) | None => Value::Array(Vec::new()),
        Some(jobs) => jobs,
    };

    let users = match root.get("users") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| normalize_user(entry, now))
            .collect(),
        _ => Vec::new(),
    };

    let magic_links = match root.get("magicLinks") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| normalize_magic_link(entry, now))
            .collect(),
        _ => Vec::new(),
    };

    Document {
        jobs,
        users,
        magic_links,
    }
}

fn normalize_user(entry: &Value, now: OffsetDateTime) -> Option<User> {
    let obj = entry.as_object()?;
    let email = str_field(obj, "email")?;

    Some(User {
        id: str_field(obj, "id")
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        email: normalize_email(email),
        created_at: time_field(obj, "createdAt").unwrap_or(now),
        updated_at: time_field(obj, "updatedAt").unwrap_or(now),
        last_login_at: time_field(obj, "lastLoginAt"),
        password_hash: str_field(obj, "passwordHash").map(str::to_string),
    })
}

fn normalize_magic_link(entry: &Value, now: OffsetDateTime) -> Option<MagicLink> {
    let obj = entry.as_object()?;
    let token_hash = str_field(obj, "tokenHash")?;

    let expires_at = match obj.get("expiresAt") {
        None | Some(Value::Null) => now + MISSING_EXPIRY_DEFAULT,
        // present but unreadable: treat as long expired
        Some(_) => time_field(obj, "expiresAt").unwrap_or(OffsetDateTime::UNIX_EPOCH),
    };
    let consumed_at = match obj.get("consumedAt") {
        None | Some(Value::Null) => None,
        Some(_) => Some(time_field(obj, "consumedAt").unwrap_or(OffsetDateTime::UNIX_EPOCH)),
    };

    let metadata = obj.get("metadata").and_then(Value::as_object).map(|meta| MagicLinkMetadata {
        preview_url: str_field(meta, "previewUrl").map(str::to_string),
        request_ip: str_field(meta, "requestIp").map(str::to_string),
        user_agent: str_field(meta, "userAgent").map(str::to_string),
    });

    Some(MagicLink {
        token_hash: token_hash.to_string(),
        email: str_field(obj, "email").map(normalize_email).unwrap_or_default(),
        redirect_to: str_field(obj, "redirectTo")
            .unwrap_or(DEFAULT_REDIRECT)
            .to_string(),
        expires_at,
        created_at: time_field(obj, "createdAt").unwrap_or(now),
        consumed_at,
        purpose: MagicLinkPurpose::parse_lenient(str_field(obj, "purpose")),
        metadata,
    })
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn time_field(obj: &Map<String, Value>, key: &str) -> Option<OffsetDateTime> {
    str_field(obj, key).and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
}
