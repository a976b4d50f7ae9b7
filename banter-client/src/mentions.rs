use std::collections::HashMap;

use crate::api::{CommentStore, UserLite};

/// Username-fragment search results, cached per fragment. Owned by the host
/// screen and passed in alongside the store; nothing here is process-global
/// and eviction is the host's call (typically on screen teardown).
#[derive(Debug, Default)]
pub struct MentionCache {
    entries: HashMap<String, Vec<UserLite>>,
}

impl MentionCache {
    pub fn new() -> MentionCache {
        MentionCache::default()
    }

    pub fn get(&self, fragment: &str) -> Option<&[UserLite]> {
        self.entries.get(&cache_key(fragment)).map(Vec::as_slice)
    }

    pub fn insert(&mut self, fragment: &str, results: Vec<UserLite>) {
        self.entries.insert(cache_key(fragment), results);
    }

    pub fn evict(&mut self, fragment: &str) {
        self.entries.remove(&cache_key(fragment));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cache_key(fragment: &str) -> String {
    fragment.trim().to_lowercase()
}

/// Collaborator results are supposed to arrive deduplicated, but a duplicate
/// mention would double-notify, so dedup defensively, keeping first
/// occurrence order.
pub fn dedup_by_id(results: Vec<UserLite>) -> Vec<UserLite> {
    let mut seen = std::collections::HashSet::new();
    results
        .into_iter()
        .filter(|u| seen.insert(u.id.clone()))
        .collect()
}

/// Search with a cache in front. The debounce lives in the UI layer; by the
/// time this runs the fragment is final.
pub async fn search_users_cached<S: CommentStore + ?Sized>(
    store: &S,
    cache: &mut MentionCache,
    fragment: &str,
) -> anyhow::Result<Vec<UserLite>> {
    if let Some(hit) = cache.get(fragment) {
        return Ok(hit.to_vec());
    }
    let results = dedup_by_id(store.search_users(fragment).await?);
    cache.insert(fragment, results.clone());
    Ok(results)
}
