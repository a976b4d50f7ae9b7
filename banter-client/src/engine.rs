use std::collections::HashSet;

use chrono::Utc;

use crate::{
    api::{
        encode_entities, validate_body, Comment, CommentId, CommentPage, CommentStore,
        NotifyContext, NotifyKind, PostId, UserLite,
    },
    build_tree, CommentNode,
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MutationKind {
    Create,
    Edit,
    Delete,
    ToggleLike,
}

/// A user action against one comment (or, for Create, against the thread).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mutation {
    Create {
        parent_id: Option<CommentId>,
        body: String,
        /// Already resolved by the user-search collaborator; passed through
        /// unmodified, one notify fired per entry on success.
        mentions: Vec<UserLite>,
    },
    Edit {
        comment_id: CommentId,
        new_body: String,
    },
    Delete {
        comment_id: CommentId,
    },
    ToggleLike {
        comment_id: CommentId,
    },
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Create { .. } => MutationKind::Create,
            Mutation::Edit { .. } => MutationKind::Edit,
            Mutation::Delete { .. } => MutationKind::Delete,
            Mutation::ToggleLike { .. } => MutationKind::ToggleLike,
        }
    }
}

/// Exactly what is needed to restore the pre-mutation state.
#[derive(Clone, Debug)]
enum Snapshot {
    /// Rollback removes the placeholder; nothing else changed.
    Created,
    Edited { body: String },
    Deleted { comment: Comment, index: usize },
    Liked { is_liked: bool, like_count: u64 },
}

#[derive(Clone, Debug)]
enum RemoteCall {
    Create {
        /// Entity-encoded for the wire.
        body: String,
        parent: Option<CommentId>,
        mentions: Vec<UserLite>,
    },
    Edit {
        body: String,
    },
    Delete,
    Like {
        now_liked: bool,
    },
}

/// An optimistic mutation in flight: local state already reflects it, the
/// remote outcome hasn't been reported via `resolve` yet. While a ticket is
/// open, `begin` rejects another mutation of the same kind on the same id.
#[derive(Debug)]
pub struct Ticket {
    kind: MutationKind,
    target: CommentId,
    snapshot: Snapshot,
    call: RemoteCall,
}

impl Ticket {
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// For Create this is the local placeholder id.
    pub fn target(&self) -> &CommentId {
        &self.target
    }
}

/// The flat comment list of one post plus the optimistic-mutation state
/// machine over it. Owns its list exclusively for one screen visit; nothing
/// here survives teardown.
#[derive(Debug)]
pub struct CommentThread {
    post: PostId,
    viewer: UserLite,
    comments: Vec<Comment>,
    total_count: u64,
    pending: HashSet<(MutationKind, CommentId)>,
}

impl CommentThread {
    pub fn new(post: PostId, viewer: UserLite) -> CommentThread {
        CommentThread {
            post,
            viewer,
            comments: Vec::new(),
            total_count: 0,
            pending: HashSet::new(),
        }
    }

    pub fn post(&self) -> &PostId {
        &self.post
    }

    pub fn viewer(&self) -> &UserLite {
        &self.viewer
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Recomputed on demand; see `build_tree` for the ordering rules.
    pub fn tree(&self) -> Vec<CommentNode> {
        build_tree(&self.comments)
    }

    pub fn set_page(&mut self, page: CommentPage) {
        self.total_count = page.total_count;
        self.comments = page.comments;
    }

    /// Replaces the local list with a fresh fetch. Failures are surfaced to
    /// the host; nothing is retried here.
    pub async fn refresh<S: CommentStore + ?Sized>(&mut self, store: &S) -> anyhow::Result<()> {
        let page = store.fetch_comments(&self.post).await?;
        self.set_page(page);
        Ok(())
    }

    /// True while any mutation is in flight for this comment. Hosts use this
    /// to disable the matching controls.
    pub fn is_mutation_pending(&self, id: &CommentId) -> bool {
        self.pending.iter().any(|(_, c)| c == id)
    }

    pub fn is_kind_pending(&self, kind: MutationKind, id: &CommentId) -> bool {
        self.pending.contains(&(kind, id.clone()))
    }

    fn index_of(&self, id: &CommentId) -> Option<usize> {
        self.comments.iter().position(|c| c.id == *id)
    }

    /// Same kind on the same id is the at-most-one-in-flight rule. Edit and
    /// delete additionally exclude each other: a committed delete would
    /// leave the racing edit with no rollback target.
    fn rejects(&self, kind: MutationKind, id: &CommentId) -> bool {
        if self.pending.contains(&(kind, id.clone())) {
            return true;
        }
        match kind {
            MutationKind::Edit => self.pending.contains(&(MutationKind::Delete, id.clone())),
            MutationKind::Delete => self.pending.contains(&(MutationKind::Edit, id.clone())),
            _ => false,
        }
    }

    /// Applies the optimistic half of a mutation and opens a ticket for it.
    /// Returns None when the mutation is rejected (overlap rule, invalid
    /// body, or the target no longer exists); local state is untouched in
    /// that case.
    pub fn begin(&mut self, m: Mutation) -> Option<Ticket> {
        let kind = m.kind();
        match m {
            Mutation::ToggleLike { comment_id } => {
                if self.rejects(kind, &comment_id) {
                    tracing::debug!(comment = ?comment_id, "toggle-like rejected, already in flight");
                    return None;
                }
                let idx = self.index_of(&comment_id)?;
                let c = &mut self.comments[idx];
                let snapshot = Snapshot::Liked {
                    is_liked: c.is_liked,
                    like_count: c.like_count,
                };
                c.is_liked = !c.is_liked;
                c.like_count = match c.is_liked {
                    true => c.like_count + 1,
                    false => c.like_count.saturating_sub(1),
                };
                let now_liked = c.is_liked;
                self.pending.insert((kind, comment_id.clone()));
                Some(Ticket {
                    kind,
                    target: comment_id,
                    snapshot,
                    call: RemoteCall::Like { now_liked },
                })
            }
            Mutation::Create {
                parent_id,
                body,
                mentions,
            } => {
                if let Err(err) = validate_body(&body) {
                    tracing::debug!(%err, "create rejected");
                    return None;
                }
                let placeholder = CommentId::placeholder();
                let encoded = encode_entities(&body);
                let parent = parent_id
                    .as_ref()
                    .and_then(|p| crate::api::normalize_parent_id(&p.0));
                self.comments.push(Comment {
                    id: placeholder.clone(),
                    parent_id: parent.clone(),
                    author: self.viewer.clone(),
                    body,
                    created_at: Utc::now(),
                    is_liked: false,
                    like_count: 0,
                });
                self.total_count += 1;
                self.pending.insert((kind, placeholder.clone()));
                Some(Ticket {
                    kind,
                    target: placeholder,
                    snapshot: Snapshot::Created,
                    call: RemoteCall::Create {
                        body: encoded,
                        parent,
                        mentions,
                    },
                })
            }
            Mutation::Edit {
                comment_id,
                new_body,
            } => {
                if self.rejects(kind, &comment_id) {
                    tracing::debug!(comment = ?comment_id, "edit rejected, conflicting mutation in flight");
                    return None;
                }
                if let Err(err) = validate_body(&new_body) {
                    tracing::debug!(%err, "edit rejected");
                    return None;
                }
                let idx = self.index_of(&comment_id)?;
                let encoded = encode_entities(&new_body);
                let snapshot = Snapshot::Edited {
                    body: std::mem::replace(&mut self.comments[idx].body, new_body),
                };
                self.pending.insert((kind, comment_id.clone()));
                Some(Ticket {
                    kind,
                    target: comment_id,
                    snapshot,
                    call: RemoteCall::Edit { body: encoded },
                })
            }
            Mutation::Delete { comment_id } => {
                if self.rejects(kind, &comment_id) {
                    tracing::debug!(comment = ?comment_id, "delete rejected, conflicting mutation in flight");
                    return None;
                }
                let idx = self.index_of(&comment_id)?;
                let comment = self.comments.remove(idx);
                self.total_count = self.total_count.saturating_sub(1);
                self.pending.insert((kind, comment_id.clone()));
                Some(Ticket {
                    kind,
                    target: comment_id,
                    snapshot: Snapshot::Deleted {
                        comment,
                        index: idx,
                    },
                    call: RemoteCall::Delete,
                })
            }
        }
    }

    /// Closes a ticket. `committed == false` restores the exact snapshot.
    /// Safe to call after the host state moved on (a committed delete, a
    /// refetch that dropped the target): restoration no-ops instead of
    /// panicking.
    pub fn resolve(&mut self, ticket: Ticket, committed: bool) {
        self.pending.remove(&(ticket.kind, ticket.target.clone()));
        if committed {
            return;
        }
        tracing::debug!(kind = ?ticket.kind, target = ?ticket.target, "rolling back mutation");
        match ticket.snapshot {
            Snapshot::Created => {
                if let Some(idx) = self.index_of(&ticket.target) {
                    self.comments.remove(idx);
                    self.total_count = self.total_count.saturating_sub(1);
                }
            }
            Snapshot::Edited { body } => match self.index_of(&ticket.target) {
                Some(idx) => self.comments[idx].body = body,
                None => {
                    tracing::warn!(target = ?ticket.target, "edit rollback target is gone")
                }
            },
            Snapshot::Deleted { comment, index } => {
                let at = index.min(self.comments.len());
                self.comments.insert(at, comment);
                self.total_count += 1;
            }
            Snapshot::Liked {
                is_liked,
                like_count,
            } => match self.index_of(&ticket.target) {
                // exact restore, not a re-flip
                Some(idx) => {
                    self.comments[idx].is_liked = is_liked;
                    self.comments[idx].like_count = like_count;
                }
                None => {
                    tracing::warn!(target = ?ticket.target, "like rollback target is gone")
                }
            },
        }
    }

    /// Full optimistic cycle: begin, remote call, resolve. Returns true on
    /// commit, false on rejection or rollback. Remote errors never escape:
    /// they are classified as rollback triggers and logged.
    pub async fn apply<S: CommentStore + ?Sized>(&mut self, store: &S, m: Mutation) -> bool {
        let Some(ticket) = self.begin(m) else {
            return false;
        };

        let outcome: anyhow::Result<Option<CommentId>> = match &ticket.call {
            RemoteCall::Create { body, parent, .. } => store
                .create_comment(&self.post, body, parent.as_ref())
                .await
                .map(Some),
            RemoteCall::Edit { body } => store.edit_comment(&ticket.target, body).await.map(|_| None),
            RemoteCall::Delete => store.delete_comment(&ticket.target).await.map(|_| None),
            RemoteCall::Like { now_liked: true } => {
                store.like_comment(&ticket.target).await.map(|_| None)
            }
            RemoteCall::Like { now_liked: false } => {
                store.unlike_comment(&ticket.target).await.map(|_| None)
            }
        };

        let server_id = match outcome {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(kind = ?ticket.kind, target = ?ticket.target, %err, "remote mutation failed");
                self.resolve(ticket, false);
                return false;
            }
        };

        let kind = ticket.kind;
        let (mentions, parent) = match &ticket.call {
            RemoteCall::Create {
                mentions, parent, ..
            } => (mentions.clone(), parent.clone()),
            _ => (Vec::new(), None),
        };
        self.resolve(ticket, true);

        match kind {
            MutationKind::Create => {
                if let Some(new_id) = server_id {
                    self.send_notifications(store, &new_id, &mentions, parent.as_ref())
                        .await;
                }
                // Reconciliation strategy for creates: full refetch, the
                // placeholder id never round-trips.
                self.refetch_after_commit(store).await;
            }
            MutationKind::Edit => {
                // Edit responses are not guaranteed to echo normalized content.
                self.refetch_after_commit(store).await;
            }
            MutationKind::Delete | MutationKind::ToggleLike => (),
        }
        true
    }

    /// The mutation already committed, so a refetch failure only means the
    /// optimistic state stays on screen until the next successful refresh.
    async fn refetch_after_commit<S: CommentStore + ?Sized>(&mut self, store: &S) {
        if let Err(err) = self.refresh(store).await {
            tracing::warn!(%err, "refetch after committed mutation failed, keeping optimistic state");
        }
    }

    /// One notify per mentioned user, plus a reply notification to the
    /// parent's author. All fire-and-forget: failures are logged and
    /// swallowed, never folded into the mutation outcome.
    async fn send_notifications<S: CommentStore + ?Sized>(
        &self,
        store: &S,
        new_id: &CommentId,
        mentions: &[UserLite],
        parent: Option<&CommentId>,
    ) {
        let context = NotifyContext {
            post: self.post.clone(),
            comment: new_id.clone(),
        };
        for m in mentions {
            if m.id == self.viewer.id {
                continue;
            }
            if let Err(err) = store.notify(&m.id, NotifyKind::Mention, &context).await {
                tracing::warn!(receiver = ?m.id, %err, "mention notification failed");
            }
        }
        let parent_author = parent
            .and_then(|p| self.comments.iter().find(|c| c.id == *p))
            .map(|c| c.author.id.clone());
        if let Some(author) = parent_author {
            let already_mentioned = mentions.iter().any(|m| m.id == author);
            if author != self.viewer.id && !already_mentioned {
                if let Err(err) = store.notify(&author, NotifyKind::Reply, &context).await {
                    tracing::warn!(receiver = ?author, %err, "reply notification failed");
                }
            }
        }
    }
}
