//! Upstream payloads are duck-typed: field names vary by endpoint version
//! and ids arrive as either JSON numbers or strings. Everything is squashed
//! to the fixed internal shape here, so the engine never sees the union of
//! possible upstream shapes.

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::{
    decode_entities, normalize_parent_id, user::normalize_avatar_ref, Comment, CommentId,
    CommentPage, Time, UserId, UserLite,
};

pub fn epoch() -> Time {
    Utc.timestamp_opt(0, 0).single().expect("epoch timestamp")
}

/// First present field wins; numbers are stringified. Upstream sends ids
/// both ways depending on endpoint version.
fn id_string(v: &Value, fields: &[&str]) -> Option<String> {
    for f in fields {
        match v.get(f) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(String::from(s.trim())),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => (),
        }
    }
    None
}

fn str_field<'a>(v: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|f| v.get(*f).and_then(|x| x.as_str()))
}

fn bool_field(v: &Value, fields: &[&str]) -> bool {
    for f in fields {
        match v.get(*f) {
            Some(Value::Bool(b)) => return *b,
            // some endpoints send 0/1
            Some(Value::Number(n)) => return n.as_i64().map(|n| n != 0).unwrap_or(false),
            _ => (),
        }
    }
    false
}

fn count_field(v: &Value, fields: &[&str]) -> u64 {
    for f in fields {
        if let Some(n) = v.get(*f).and_then(|x| x.as_i64()) {
            return n.max(0) as u64;
        }
    }
    0
}

/// ISO-like timestamps, with the upstream's space-separated variant as a
/// fallback. Anything unparseable degrades to the epoch, never an error.
pub fn parse_created_at(raw: Option<&str>) -> Time {
    let Some(raw) = raw else { return epoch() };
    let raw = raw.trim();
    if let Ok(d) = chrono::DateTime::parse_from_rfc3339(raw) {
        return d.with_timezone(&Utc);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Utc.from_utc_datetime(&n);
        }
    }
    epoch()
}

/// Display-name priority: `author`, then `user_login`, then `name`, then
/// `username`; an empty result means the account is gone, shown as "unknown".
fn author_from_payload(v: &Value) -> UserLite {
    // newer endpoints nest the author under "user"; on flat payloads "id"
    // is the comment's own id, so it only counts inside the nested object
    let (src, id_fields): (&Value, &[&str]) = match v.get("user") {
        Some(u) if u.is_object() => (u, &["id", "user_id"]),
        _ => (v, &["user_id", "author_id"]),
    };
    let id = id_string(src, id_fields)
        .map(UserId)
        .unwrap_or_else(UserId::stub);
    let username = str_field(src, &["author", "user_login", "name", "username"])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown");
    let avatar = str_field(src, &["avatar", "avatar_url", "profile_image_url"])
        .and_then(normalize_avatar_ref);
    UserLite {
        id,
        username: String::from(username),
        avatar,
    }
}

/// Returns None only when no id can be extracted at all; every other field
/// degrades to a usable default.
pub fn comment_from_payload(v: &Value) -> Option<Comment> {
    let id = CommentId(id_string(v, &["id", "comment_id", "commentId"])?);
    let parent_id = id_string(v, &["parent_id", "parentId", "in_reply_to"])
        .and_then(|raw| normalize_parent_id(&raw));
    let body = str_field(v, &["body", "text", "content"])
        .map(decode_entities)
        .unwrap_or_default();
    let created_at = parse_created_at(str_field(v, &["created_at", "createdAt", "date"]));
    Some(Comment {
        id,
        parent_id,
        author: author_from_payload(v),
        body,
        created_at,
        is_liked: bool_field(v, &["is_liked", "liked", "has_liked"]),
        like_count: count_field(v, &["like_count", "likes", "clap_count"]),
    })
}

/// Comments that fail to adapt (no id) are skipped with a warning rather
/// than failing the whole page.
pub fn page_from_payload(v: &Value) -> CommentPage {
    let raw_comments = v
        .get("comments")
        .and_then(|c| c.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);
    let mut comments = Vec::with_capacity(raw_comments.len());
    for raw in raw_comments {
        match comment_from_payload(raw) {
            Some(c) => comments.push(c),
            None => tracing::warn!(payload = %raw, "skipping comment payload without id"),
        }
    }
    let total_count = v
        .get("total_count")
        .or_else(|| v.get("totalCount"))
        .and_then(|n| n.as_i64())
        .map(|n| n.max(0) as u64)
        .unwrap_or(comments.len() as u64);
    CommentPage {
        total_count,
        comments,
    }
}

pub fn user_from_payload(v: &Value) -> Option<UserLite> {
    let id = UserId(id_string(v, &["id", "user_id"])?);
    let username = str_field(v, &["username", "user_login", "name", "author"])
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    let avatar = str_field(v, &["avatar", "avatar_url", "profile_image_url"])
        .and_then(normalize_avatar_ref);
    Some(UserLite {
        id,
        username: String::from(username),
        avatar,
    })
}
