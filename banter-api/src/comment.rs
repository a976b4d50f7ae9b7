use crate::{CommentId, Time, UserLite};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,

    /// Already sentinel-normalized by the adapter, but thread-building runs
    /// `normalize_parent_id` on it again: some callers build Comments by hand.
    pub parent_id: Option<CommentId>,

    pub author: UserLite,

    /// Decoded for display; re-encoded with `encode_entities` at the wire.
    pub body: String,

    pub created_at: Time,

    pub is_liked: bool,
    pub like_count: u64,
}

/// What the fetch-comments collaborator returns: the flat list plus the
/// server-side total (which can exceed `comments.len()` when paginated).
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentPage {
    pub total_count: u64,
    pub comments: Vec<Comment>,
}

/// Upstream "no parent" sentinels, observed in the wild: empty string, "0",
/// "null", "undefined" and "nan", in any case and with surrounding whitespace.
pub fn normalize_parent_id(raw: &str) -> Option<CommentId> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "" | "0" | "null" | "undefined" | "nan" => None,
        _ => Some(CommentId(String::from(trimmed))),
    }
}

impl Comment {
    /// The parent reference actually used for threading.
    pub fn effective_parent(&self) -> Option<CommentId> {
        self.parent_id
            .as_ref()
            .and_then(|p| normalize_parent_id(&p.0))
    }
}
