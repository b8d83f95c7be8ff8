//! Integration tests for comment tree construction.

use korekushon::comments::{build_comment_tree, CommentNode};
use korekushon::store::Comment;

fn comment(id: i64, parent_id: Option<i64>) -> Comment {
    Comment {
        id,
        content: format!("comment {id}"),
        author_id: Some("u-1".to_string()),
        author_name: Some("haruka".to_string()),
        author_email: None,
        category_id: Some(1),
        link_id: Some(10),
        parent_id,
        created_at: Some(format!("2024-01-01T00:{:02}:00+00:00", id.min(59))),
    }
}

/// Collect (id, parent id) pairs from a built tree, sorted by id.
fn relations(tree: &[CommentNode]) -> Vec<(i64, Option<i64>)> {
    let mut pairs = Vec::new();
    let mut stack: Vec<(&CommentNode, Option<i64>)> = tree.iter().map(|n| (n, None)).collect();
    while let Some((node, parent)) = stack.pop() {
        pairs.push((node.comment.id, parent));
        stack.extend(node.replies.iter().map(|r| (r, Some(node.comment.id))));
    }
    pairs.sort_unstable();
    pairs
}

#[test]
fn test_orphan_scenario_from_flat_list() {
    // [{id:1,parent:none},{id:2,parent:1},{id:3,parent:99}] -> two roots,
    // id 1 carrying one reply, id 3 falling back to root.
    let tree = build_comment_tree(&[comment(1, None), comment(2, Some(1)), comment(3, Some(99))]);

    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0].comment.id, 1);
    assert_eq!(tree[0].replies.len(), 1);
    assert_eq!(tree[0].replies[0].comment.id, 2);
    assert_eq!(tree[1].comment.id, 3);
    assert!(tree[1].replies.is_empty());
}

#[test]
fn test_orphans_are_never_dropped() {
    let input: Vec<Comment> = (1..=50).map(|id| comment(id, Some(id + 1000))).collect();
    let tree = build_comment_tree(&input);

    assert_eq!(tree.len(), 50);
    let total: usize = tree.iter().map(CommentNode::subtree_len).sum();
    assert_eq!(total, 50);
}

#[test]
fn test_construction_is_stable_under_reordering() {
    let mut input = vec![
        comment(1, None),
        comment(2, Some(1)),
        comment(3, Some(1)),
        comment(4, Some(2)),
        comment(5, None),
        comment(6, Some(5)),
        comment(7, Some(99)),
    ];

    let baseline = relations(&build_comment_tree(&input));

    // Any order of the same set yields identical parent/child relations.
    input.reverse();
    assert_eq!(relations(&build_comment_tree(&input)), baseline);

    input.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    assert_eq!(relations(&build_comment_tree(&input)), baseline);

    input.sort_by_key(|c| c.id);
    assert_eq!(relations(&build_comment_tree(&input)), baseline);
}

#[test]
fn test_no_comment_is_lost_or_duplicated() {
    let input = vec![
        comment(1, None),
        comment(2, Some(1)),
        comment(3, Some(2)),
        comment(4, Some(3)),
        comment(5, Some(99)),
        comment(6, None),
    ];
    let tree = build_comment_tree(&input);

    let mut seen: Vec<i64> = relations(&tree).into_iter().map(|(id, _)| id).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
}
