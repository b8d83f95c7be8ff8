//! Threaded comment trees.
//!
//! Comments arrive from the platform as a flat, chronologically ordered
//! list; each row optionally points at a parent comment. This module turns
//! that list into a forest of root comments with arbitrarily nested
//! replies. Construction is two linear passes over explicit worklists, so
//! deep reply chains cannot exhaust the call stack.

use std::collections::{HashMap, HashSet};

use crate::store::Comment;

/// A comment with its direct replies, which nest without bound.
#[derive(Debug, Clone)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, the node itself included.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.replies.iter());
        }
        total
    }
}

/// Build the reply forest for a flat comment list.
///
/// Sibling order equals input order. A comment whose parent id is absent
/// from the list (or points at itself) is treated as a root rather than
/// dropped; replies to deleted comments stay visible that way.
#[must_use]
pub fn build_comment_tree(comments: &[Comment]) -> Vec<CommentNode> {
    let ids: HashSet<i64> = comments.iter().map(|c| c.id).collect();

    // First pass: partition into roots and per-parent reply lists.
    let mut root_indexes: Vec<usize> = Vec::new();
    let mut reply_indexes: HashMap<i64, Vec<usize>> = HashMap::new();
    for (index, comment) in comments.iter().enumerate() {
        match comment.parent_id {
            Some(parent) if parent != comment.id && ids.contains(&parent) => {
                reply_indexes.entry(parent).or_default().push(index);
            }
            _ => root_indexes.push(index),
        }
    }

    // Second pass: discover reachable comments top-down, then assemble
    // bottom-up. Walking the discovery order backwards guarantees every
    // comment's replies are built before the comment itself.
    let mut discovery: Vec<usize> = Vec::with_capacity(comments.len());
    let mut stack: Vec<usize> = root_indexes.clone();
    while let Some(index) = stack.pop() {
        discovery.push(index);
        if let Some(children) = reply_indexes.get(&comments[index].id) {
            stack.extend(children.iter().copied());
        }
    }

    let mut built: HashMap<usize, CommentNode> = HashMap::with_capacity(discovery.len());
    for &index in discovery.iter().rev() {
        let replies = reply_indexes
            .get(&comments[index].id)
            .map(|children| {
                children
                    .iter()
                    .filter_map(|child| built.remove(child))
                    .collect()
            })
            .unwrap_or_default();
        built.insert(
            index,
            CommentNode {
                comment: comments[index].clone(),
                replies,
            },
        );
    }

    root_indexes
        .into_iter()
        .filter_map(|index| built.remove(&index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Comment;

    fn comment(id: i64, parent_id: Option<i64>) -> Comment {
        Comment {
            id,
            content: format!("comment {id}"),
            author_id: Some("u-1".to_string()),
            author_name: Some("haruka".to_string()),
            author_email: None,
            category_id: Some(1),
            link_id: None,
            parent_id,
            created_at: Some(format!("2024-01-01T00:00:{:02}+00:00", id.min(59))),
        }
    }

    #[test]
    fn test_flat_list_is_all_roots() {
        let tree = build_comment_tree(&[comment(1, None), comment(2, None)]);
        assert_eq!(tree.len(), 2);
        assert!(tree.iter().all(|node| node.replies.is_empty()));
    }

    #[test]
    fn test_orphan_parent_reference_becomes_root() {
        // id 3 references a parent that is not in the set
        let tree = build_comment_tree(&[comment(1, None), comment(2, Some(1)), comment(3, Some(99))]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].comment.id, 1);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].comment.id, 2);
        assert_eq!(tree[1].comment.id, 3);
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn test_deep_nesting() {
        // 1 <- 2 <- 3 <- ... <- 500, one long chain
        let chain: Vec<Comment> = (1..=500)
            .map(|id| comment(id, if id == 1 { None } else { Some(id - 1) }))
            .collect();
        let tree = build_comment_tree(&chain);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].subtree_len(), 500);

        let mut depth = 0;
        let mut node = &tree[0];
        while let Some(first) = node.replies.first() {
            depth += 1;
            node = first;
        }
        assert_eq!(depth, 499);
    }

    #[test]
    fn test_sibling_order_follows_input_order() {
        let tree = build_comment_tree(&[
            comment(1, None),
            comment(5, Some(1)),
            comment(3, Some(1)),
            comment(4, Some(1)),
        ]);

        let sibling_ids: Vec<i64> = tree[0].replies.iter().map(|n| n.comment.id).collect();
        assert_eq!(sibling_ids, vec![5, 3, 4]);
    }

    #[test]
    fn test_parent_child_relations_survive_reordering() {
        let original = vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, Some(2)),
            comment(4, None),
            comment(5, Some(1)),
        ];
        let mut reversed = original.clone();
        reversed.reverse();

        let relations = |tree: &[CommentNode]| {
            let mut pairs: Vec<(i64, Option<i64>)> = Vec::new();
            let mut stack: Vec<(&CommentNode, Option<i64>)> =
                tree.iter().map(|n| (n, None)).collect();
            while let Some((node, parent)) = stack.pop() {
                pairs.push((node.comment.id, parent));
                stack.extend(node.replies.iter().map(|r| (r, Some(node.comment.id))));
            }
            pairs.sort_unstable();
            pairs
        };

        assert_eq!(
            relations(&build_comment_tree(&original)),
            relations(&build_comment_tree(&reversed))
        );
    }

    #[test]
    fn test_self_reference_degrades_to_root() {
        let tree = build_comment_tree(&[comment(1, Some(1))]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(build_comment_tree(&[]).is_empty());
    }
}
