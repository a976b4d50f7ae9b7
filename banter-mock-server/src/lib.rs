//! In-memory stand-in for the comment backend, single-viewer. Supports
//! scripted one-shot failures per operation and records notifications so
//! tests can assert on the fire-and-forget path.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use banter_client::api::{
    decode_entities, normalize_parent_id, Comment, CommentId, CommentPage, CommentStore, Error,
    NotifyContext, NotifyKind, PostId, UserId, UserLite,
};
use chrono::Utc;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Op {
    Fetch,
    Create,
    Edit,
    Delete,
    Like,
    Unlike,
    Search,
    Notify,
}

pub struct MockServer(Mutex<Inner>);

struct Inner {
    next_id: u64,
    viewer: UserLite,
    posts: HashMap<PostId, Vec<Comment>>,
    users: Vec<UserLite>,
    fail_next: HashSet<Op>,
    notifications: Vec<(UserId, NotifyKind, NotifyContext)>,
    last_wire_body: Option<String>,
}

impl MockServer {
    pub fn new(viewer: UserLite) -> MockServer {
        MockServer(Mutex::new(Inner {
            next_id: 1,
            viewer,
            posts: HashMap::new(),
            users: Vec::new(),
            fail_next: HashSet::new(),
            notifications: Vec::new(),
            last_wire_body: None,
        }))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.0.lock().expect("mock server lock poisoned")
    }

    pub fn add_post(&self, post: PostId) {
        self.lock().posts.entry(post).or_default();
    }

    pub fn add_user(&self, user: UserLite) {
        self.lock().users.push(user);
    }

    /// Test setup: install a comment as already existing server-side.
    pub fn seed_comment(&self, post: &PostId, comment: Comment) {
        self.lock()
            .posts
            .entry(post.clone())
            .or_default()
            .push(comment);
    }

    /// The next call of `op` fails once, then behavior returns to normal.
    pub fn fail_next(&self, op: Op) {
        self.lock().fail_next.insert(op);
    }

    pub fn test_comments(&self, post: &PostId) -> Vec<Comment> {
        self.lock().posts.get(post).cloned().unwrap_or_default()
    }

    pub fn test_notifications(&self) -> Vec<(UserId, NotifyKind, NotifyContext)> {
        self.lock().notifications.clone()
    }

    /// The body of the most recent create/edit exactly as it crossed the
    /// wire, before the server-side decode.
    pub fn test_last_wire_body(&self) -> Option<String> {
        self.lock().last_wire_body.clone()
    }
}

impl Inner {
    fn check_fail(&mut self, op: Op) -> anyhow::Result<()> {
        if self.fail_next.remove(&op) {
            return Err(Error::Unknown(format!("injected failure for {op:?}")).into());
        }
        Ok(())
    }

    fn find_comment(&mut self, id: &CommentId) -> anyhow::Result<&mut Comment> {
        self.posts
            .values_mut()
            .flat_map(|cs| cs.iter_mut())
            .find(|c| c.id == *id)
            .ok_or_else(|| Error::CommentNotFound(id.clone()).into())
    }
}

#[async_trait]
impl CommentStore for MockServer {
    async fn fetch_comments(&self, post: &PostId) -> anyhow::Result<CommentPage> {
        let mut inner = self.lock();
        inner.check_fail(Op::Fetch)?;
        let comments = inner.posts.get(post).cloned().unwrap_or_default();
        Ok(CommentPage {
            total_count: comments.len() as u64,
            comments,
        })
    }

    async fn create_comment(
        &self,
        post: &PostId,
        body: &str,
        parent: Option<&CommentId>,
    ) -> anyhow::Result<CommentId> {
        let mut inner = self.lock();
        inner.check_fail(Op::Create)?;
        inner.last_wire_body = Some(String::from(body));
        let id = CommentId(format!("srv-{}", inner.next_id));
        inner.next_id += 1;
        let comment = Comment {
            id: id.clone(),
            parent_id: parent.and_then(|p| normalize_parent_id(&p.0)),
            author: inner.viewer.clone(),
            // the server renders entities back to text
            body: decode_entities(body),
            created_at: Utc::now(),
            is_liked: false,
            like_count: 0,
        };
        inner.posts.entry(post.clone()).or_default().push(comment);
        Ok(id)
    }

    async fn edit_comment(&self, comment: &CommentId, body: &str) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.check_fail(Op::Edit)?;
        inner.last_wire_body = Some(String::from(body));
        let decoded = decode_entities(body);
        inner.find_comment(comment)?.body = decoded;
        Ok(())
    }

    async fn delete_comment(&self, comment: &CommentId) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.check_fail(Op::Delete)?;
        for comments in inner.posts.values_mut() {
            if let Some(idx) = comments.iter().position(|c| c.id == *comment) {
                comments.remove(idx);
                return Ok(());
            }
        }
        Err(Error::CommentNotFound(comment.clone()).into())
    }

    async fn like_comment(&self, comment: &CommentId) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.check_fail(Op::Like)?;
        let c = inner.find_comment(comment)?;
        if !c.is_liked {
            c.is_liked = true;
            c.like_count += 1;
        }
        Ok(())
    }

    async fn unlike_comment(&self, comment: &CommentId) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.check_fail(Op::Unlike)?;
        let c = inner.find_comment(comment)?;
        if c.is_liked {
            c.is_liked = false;
            c.like_count = c.like_count.saturating_sub(1);
        }
        Ok(())
    }

    async fn search_users(&self, fragment: &str) -> anyhow::Result<Vec<UserLite>> {
        let mut inner = self.lock();
        inner.check_fail(Op::Search)?;
        let needle = fragment.trim().to_lowercase();
        Ok(inner
            .users
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn notify(
        &self,
        receiver: &UserId,
        kind: NotifyKind,
        context: &NotifyContext,
    ) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.check_fail(Op::Notify)?;
        inner
            .notifications
            .push((receiver.clone(), kind, context.clone()));
        Ok(())
    }
}
