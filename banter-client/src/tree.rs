use std::collections::HashMap;

use crate::api::Comment;

/// A comment plus its replies. Derived from the flat list on every fetch
/// and on every committed mutation, never persisted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    /// This node plus all descendants.
    pub fn total_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(CommentNode::total_count)
            .sum::<usize>()
    }
}

/// Builds the display forest out of the flat list the backend returns.
///
/// Roots are newest-first, children of any node oldest-first, both stable
/// so comments sharing a timestamp keep their input order. A comment whose
/// parent id does not resolve becomes a root instead of disappearing. The
/// upstream only nests one level deep, but deeper nesting gets the same
/// two rules applied recursively. Never errors.
pub fn build_tree(flat: &[Comment]) -> Vec<CommentNode> {
    let mut by_id = HashMap::with_capacity(flat.len());
    for (i, c) in flat.iter().enumerate() {
        by_id.insert(c.id.0.as_str(), i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); flat.len()];
    let mut roots = Vec::new();
    for (i, c) in flat.iter().enumerate() {
        let parent = c.effective_parent();
        match parent {
            None => roots.push(i),
            Some(p) => match by_id.get(p.0.as_str()) {
                // self-parenting degrades to a root too
                Some(&pi) if pi != i => children[pi].push(i),
                Some(_) => roots.push(i),
                None => {
                    tracing::warn!(comment = ?c.id, parent = ?p, "dangling parent, showing as root");
                    roots.push(i);
                }
            },
        }
    }

    roots.sort_by(|&a, &b| flat[b].created_at.cmp(&flat[a].created_at));
    for list in children.iter_mut() {
        list.sort_by(|&a, &b| flat[a].created_at.cmp(&flat[b].created_at));
    }

    let mut visited = vec![false; flat.len()];
    let mut forest = Vec::with_capacity(roots.len());
    for r in roots {
        if let Some(node) = assemble(flat, &children, &mut visited, r) {
            forest.push(node);
        }
    }
    // Parent cycles leave nodes unreachable from any root; promote them so
    // nothing is ever dropped.
    for i in 0..flat.len() {
        if !visited[i] {
            tracing::warn!(comment = ?flat[i].id, "comment in a parent cycle, showing as root");
            if let Some(node) = assemble(flat, &children, &mut visited, i) {
                forest.push(node);
            }
        }
    }
    forest
}

fn assemble(
    flat: &[Comment],
    children: &[Vec<usize>],
    visited: &mut [bool],
    i: usize,
) -> Option<CommentNode> {
    if visited[i] {
        return None;
    }
    visited[i] = true;
    Some(CommentNode {
        comment: flat[i].clone(),
        children: children[i]
            .iter()
            .filter_map(|&c| assemble(flat, children, visited, c))
            .collect(),
    })
}
