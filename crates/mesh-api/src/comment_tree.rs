use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

use mesh_types::api::{CommentNode, CommentView};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommentTreeError {
    #[error("comment {comment_id} is its own ancestor")]
    Cycle { comment_id: Uuid },

    #[error("comment {comment_id} replies to unknown comment {parent_id}")]
    DanglingParent { comment_id: Uuid, parent_id: Uuid },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Nest a post's flat comments under their parents.
///
/// Roots are comments without a parent. Every level is ordered by
/// creation time, then id. The parent graph is checked before nesting, so
/// cyclic or dangling parent pointers are reported instead of looping.
pub fn build_comment_tree(comments: Vec<CommentView>) -> Result<Vec<CommentNode>, CommentTreeError> {
    let parents: HashMap<Uuid, Option<Uuid>> =
        comments.iter().map(|c| (c.id, c.parent_comment)).collect();

    for c in &comments {
        if let Some(parent_id) = c.parent_comment {
            if !parents.contains_key(&parent_id) {
                return Err(CommentTreeError::DanglingParent {
                    comment_id: c.id,
                    parent_id,
                });
            }
        }
    }

    check_acyclic(&parents)?;

    let mut children: HashMap<Option<Uuid>, Vec<CommentView>> = HashMap::new();
    let mut seen = HashSet::new();
    for c in comments {
        if seen.insert(c.id) {
            children.entry(c.parent_comment).or_default().push(c);
        }
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }

    Ok(nest(children))
}

/// Walks each ancestor chain once; meeting a node still on the current
/// path means the chain loops.
fn check_acyclic(parents: &HashMap<Uuid, Option<Uuid>>) -> Result<(), CommentTreeError> {
    let mut state: HashMap<Uuid, Visit> = HashMap::with_capacity(parents.len());

    for &start in parents.keys() {
        let mut path = Vec::new();
        let mut cur = Some(start);

        while let Some(id) = cur {
            match state.get(&id) {
                Some(Visit::Done) => break,
                Some(Visit::InProgress) => return Err(CommentTreeError::Cycle { comment_id: id }),
                None => {}
            }
            state.insert(id, Visit::InProgress);
            path.push(id);
            cur = parents.get(&id).copied().flatten();
        }

        for id in path {
            state.insert(id, Visit::Done);
        }
    }

    Ok(())
}

/// A comment whose replies are still being assembled.
struct Frame {
    comment: CommentView,
    pending: std::vec::IntoIter<CommentView>,
    replies: Vec<CommentNode>,
}

impl Frame {
    fn open(comment: CommentView, children: &mut HashMap<Option<Uuid>, Vec<CommentView>>) -> Self {
        let pending = children.remove(&Some(comment.id)).unwrap_or_default().into_iter();
        Self {
            comment,
            pending,
            replies: Vec::new(),
        }
    }
}

/// Depth-first with an explicit stack: a node is closed only after all of
/// its replies, so memory use grows with depth but the call stack does not.
fn nest(mut children: HashMap<Option<Uuid>, Vec<CommentView>>) -> Vec<CommentNode> {
    let mut roots = children.remove(&None).unwrap_or_default().into_iter();
    let mut forest = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let next = match stack.last_mut() {
            Some(frame) => frame.pending.next(),
            None => match roots.next() {
                Some(root) => Some(root),
                None => break,
            },
        };

        match next {
            Some(comment) => {
                let frame = Frame::open(comment, &mut children);
                stack.push(frame);
            }
            None => {
                let Some(done) = stack.pop() else { break };
                let node = CommentNode {
                    comment: done.comment,
                    replies: done.replies,
                };
                match stack.last_mut() {
                    Some(parent) => parent.replies.push(node),
                    None => forest.push(node),
                }
            }
        }
    }

    forest
}
