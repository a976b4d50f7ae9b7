mod engine;
pub use engine::{CommentThread, Mutation, MutationKind, Ticket};

mod mentions;
pub use mentions::{search_users_cached, MentionCache};

mod tree;
pub use tree::{build_tree, CommentNode};

pub mod api {
    pub use banter_api::*;
}
