//! Threaded comment reconstruction.
//!
//! Comment rows reference their parent by id; presentation wants a nested
//! reply forest. `build_thread` takes the rows for one post, pre-sorted by
//! creation time ascending, and returns top-level comments in creation order
//! with each node's direct replies in creation order, recursively.
//!
//! The build is two passes: every id is indexed before anything is attached,
//! so the result never depends on the order parents and children appear in.
//! A row whose parent id is absent from the batch (the parent was deleted)
//! is promoted to top level instead of being dropped.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One comment as read from the store, author name already joined in.
#[derive(Debug, Clone, Serialize)]
pub struct CommentRow {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentRow,
    pub replies: Vec<CommentNode>,
}

pub fn build_thread(rows: Vec<CommentRow>) -> Vec<CommentNode> {
    // First pass: index every id so attachment cannot depend on row order.
    let ids: HashSet<i64> = rows.iter().map(|row| row.id).collect();

    // Second pass: group replies under their parent. Roots are comments with
    // no parent, plus orphans whose parent id no longer resolves.
    let mut children: HashMap<i64, Vec<CommentRow>> = HashMap::new();
    let mut roots: Vec<CommentRow> = Vec::new();
    for row in rows {
        match row.parent_id {
            Some(parent) if parent != row.id && ids.contains(&parent) => {
                children.entry(parent).or_default().push(row);
            }
            _ => roots.push(row),
        }
    }

    roots
        .into_iter()
        .map(|row| attach(row, &mut children))
        .collect()
}

fn attach(comment: CommentRow, children: &mut HashMap<i64, Vec<CommentRow>>) -> CommentNode {
    let replies = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach(child, children))
        .collect();
    CommentNode { comment, replies }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, parent_id: Option<i64>) -> CommentRow {
        CommentRow {
            id,
            author_id: 1,
            author_name: "Ana Li".to_string(),
            body: format!("comment {id}"),
            created_at: format!("2026-01-01 00:00:{id:02}"),
            parent_id,
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.comment.id).collect()
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        assert!(build_thread(Vec::new()).is_empty());
    }

    #[test]
    fn nested_replies_attach_under_their_parents() {
        // 1 ── 2 ── 4
        // 3
        let forest = build_thread(vec![
            row(1, None),
            row(2, Some(1)),
            row(3, None),
            row(4, Some(2)),
        ]);

        assert_eq!(ids(&forest), vec![1, 3]);
        assert_eq!(ids(&forest[0].replies), vec![2]);
        assert_eq!(ids(&forest[0].replies[0].replies), vec![4]);
        assert!(forest[0].replies[0].replies[0].replies.is_empty());
        assert!(forest[1].replies.is_empty());
    }

    #[test]
    fn siblings_stay_in_creation_order() {
        let forest = build_thread(vec![
            row(1, None),
            row(2, Some(1)),
            row(3, Some(1)),
            row(4, Some(1)),
            row(5, None),
        ]);

        assert_eq!(ids(&forest), vec![1, 5]);
        assert_eq!(ids(&forest[0].replies), vec![2, 3, 4]);
    }

    #[test]
    fn attachment_does_not_depend_on_row_order() {
        // A child listed before its parent still attaches.
        let forest = build_thread(vec![row(2, Some(1)), row(1, None)]);

        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].replies), vec![2]);
    }

    #[test]
    fn orphans_are_promoted_to_top_level() {
        // Parent 7 was deleted; its replies surface as roots, in order,
        // keeping their own subtrees intact.
        let forest = build_thread(vec![
            row(1, None),
            row(2, Some(7)),
            row(3, Some(2)),
            row(4, Some(7)),
        ]);

        assert_eq!(ids(&forest), vec![1, 2, 4]);
        assert_eq!(ids(&forest[1].replies), vec![3]);
    }

    #[test]
    fn self_referencing_row_is_treated_as_a_root() {
        let forest = build_thread(vec![row(1, Some(1))]);
        assert_eq!(ids(&forest), vec![1]);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn deep_chains_nest_fully() {
        let rows = (1..=20)
            .map(|id| row(id, if id == 1 { None } else { Some(id - 1) }))
            .collect();
        let forest = build_thread(rows);

        assert_eq!(forest.len(), 1);
        let mut node = &forest[0];
        for expected in 2..=20 {
            assert_eq!(node.replies.len(), 1);
            node = &node.replies[0];
            assert_eq!(node.comment.id, expected);
        }
        assert!(node.replies.is_empty());
    }

    #[test]
    fn nodes_serialize_with_flattened_fields() {
        let forest = build_thread(vec![row(1, None), row(2, Some(1))]);
        let json = serde_json::to_value(&forest).unwrap();

        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["author_name"], "Ana Li");
        assert_eq!(json[0]["replies"][0]["id"], 2);
        assert_eq!(json[0]["replies"][0]["parent_id"], 1);
        assert_eq!(json[0]["replies"][0]["replies"], serde_json::json!([]));
    }
}
