use async_trait::async_trait;
use chrono::Utc;

pub use uuid::Uuid;
pub type Time = chrono::DateTime<Utc>;

mod adapter;
pub use adapter::{comment_from_payload, epoch, page_from_payload, parse_created_at, user_from_payload};

mod comment;
pub use comment::{normalize_parent_id, Comment, CommentPage};

mod encode;
pub use encode::{decode_entities, encode_entities};

mod error;
pub use error::Error;

mod user;
pub use user::{normalize_avatar_ref, UserLite};

pub const STUB_ID: &str = "stub";

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub String);

impl PostId {
    pub fn stub() -> PostId {
        PostId(String::from(STUB_ID))
    }
}

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct UserId(pub String);

impl UserId {
    pub fn stub() -> UserId {
        UserId(String::from(STUB_ID))
    }
}

#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(String::from(STUB_ID))
    }

    /// Locally generated id for an optimistically inserted comment. Never
    /// sent to the server: a successful create is reconciled by refetching.
    pub fn placeholder() -> CommentId {
        CommentId(format!("pending-{}", Uuid::new_v4()))
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with("pending-")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum NotifyKind {
    Mention,
    Reply,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NotifyContext {
    pub post: PostId,
    pub comment: CommentId,
}

// See comments on other `validate` functions throughout banter-api
pub fn validate_body(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    if s.trim().is_empty() {
        return Err(Error::EmptyBody);
    }
    Ok(())
}

/// The remote collaborators this engine talks to. Implemented over HTTP in
/// the app shell, and in-memory by banter-mock-server for tests.
#[async_trait]
pub trait CommentStore {
    async fn fetch_comments(&self, post: &PostId) -> anyhow::Result<CommentPage>;

    /// Returns the server-assigned id of the new comment. The body must
    /// already be entity-encoded (see `encode_entities`).
    async fn create_comment(
        &self,
        post: &PostId,
        body: &str,
        parent: Option<&CommentId>,
    ) -> anyhow::Result<CommentId>;

    async fn edit_comment(&self, comment: &CommentId, body: &str) -> anyhow::Result<()>;

    async fn delete_comment(&self, comment: &CommentId) -> anyhow::Result<()>;

    async fn like_comment(&self, comment: &CommentId) -> anyhow::Result<()>;

    async fn unlike_comment(&self, comment: &CommentId) -> anyhow::Result<()>;

    /// Caller is expected to debounce; results arrive filtered and deduplicated.
    async fn search_users(&self, fragment: &str) -> anyhow::Result<Vec<UserLite>>;

    /// Fire-and-forget from the engine's point of view: failures are logged
    /// and swallowed, never folded into a mutation's own outcome.
    async fn notify(
        &self,
        receiver: &UserId,
        kind: NotifyKind,
        context: &NotifyContext,
    ) -> anyhow::Result<()>;
}
