//! Reconstruction of nested reply trees from flat `forum_messages` rows.
//!
//! All rows of a forum are fetched in one request, grouped by parent in a single
//! pass, then built depth-first from the roots. A row is only attached if its
//! parent chain reaches a root, so self-references, cycles and rows whose parent
//! lives outside the forum never make it into the tree.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::models::{Message, MessageRecord};

/// Builds the reply tree for one forum. Siblings are ordered by creation time,
/// oldest first, with the row id breaking ties.
pub fn assemble(records: Vec<MessageRecord>) -> Vec<Message> {
    let total = records.len();
    let known: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<Message>> = HashMap::new();
    for record in records {
        let message = Message::from(record);
        match message.parent_id.clone() {
            None => roots.push(message),
            Some(parent) if known.contains(&parent) && parent != message.id => {
                children.entry(parent).or_default().push(message)
            }
            Some(_) => {}
        }
    }

    sort_siblings(&mut roots);
    let mut seen = HashSet::new();
    let tree: Vec<Message> = roots
        .into_iter()
        .filter_map(|root| attach(root, &mut children, &mut seen))
        .collect();

    let attached = count(&tree);
    if attached < total {
        warn!(
            "dropped {} of {} forum messages with an unreachable parent chain",
            total - attached,
            total
        );
    }
    tree
}

fn attach(
    mut message: Message,
    children: &mut HashMap<String, Vec<Message>>,
    seen: &mut HashSet<String>,
) -> Option<Message> {
    if !seen.insert(message.id.clone()) {
        return None;
    }
    let mut replies = children.remove(&message.id).unwrap_or_default();
    sort_siblings(&mut replies);
    message.replies = replies
        .into_iter()
        .filter_map(|reply| attach(reply, children, seen))
        .collect();
    Some(message)
}

fn sort_siblings(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}

/// Depth-first, pre-order walk yielding each message with its depth.
pub fn walk(tree: &[Message]) -> Vec<(usize, &Message)> {
    let mut out = Vec::new();
    let mut stack: Vec<(usize, &Message)> = tree.iter().rev().map(|m| (0, m)).collect();
    while let Some((depth, message)) = stack.pop() {
        out.push((depth, message));
        stack.extend(message.replies.iter().rev().map(|r| (depth + 1, r)));
    }
    out
}

pub fn count(tree: &[Message]) -> usize {
    tree.iter().map(|m| 1 + count(&m.replies)).sum()
}

pub fn find<'a>(tree: &'a [Message], id: &str) -> Option<&'a Message> {
    tree.iter().find_map(|m| {
        if m.id == id {
            Some(m)
        } else {
            find(&m.replies, id)
        }
    })
}

/// Appends `reply` to the children of `parent_id`, or to the roots when `None`.
/// Returns the reply back if the parent is not in the tree.
pub fn attach_reply(
    tree: &mut Vec<Message>,
    parent_id: Option<&str>,
    reply: Message,
) -> Result<(), Message> {
    let Some(parent_id) = parent_id else {
        tree.push(reply);
        return Ok(());
    };
    let mut reply = Some(reply);
    fn go(nodes: &mut [Message], parent_id: &str, reply: &mut Option<Message>) -> bool {
        for node in nodes {
            if node.id == parent_id {
                if let Some(r) = reply.take() {
                    node.replies.push(r);
                }
                return true;
            }
            if go(&mut node.replies, parent_id, reply) {
                return true;
            }
        }
        false
    }
    go(tree, parent_id, &mut reply);
    match reply {
        Some(unplaced) => Err(unplaced),
        None => Ok(()),
    }
}

/// Removes the message with `id` and its subtree.
pub fn remove(tree: &mut Vec<Message>, id: &str) -> Option<Message> {
    if let Some(pos) = tree.iter().position(|m| m.id == id) {
        return Some(tree.remove(pos));
    }
    tree.iter_mut().find_map(|m| remove(&mut m.replies, id))
}

/// Replaces the message with `id` in place, keeping its position.
pub fn replace(tree: &mut [Message], id: &str, with: Message) -> Result<(), Message> {
    let mut with = Some(with);
    fn go(nodes: &mut [Message], id: &str, with: &mut Option<Message>) -> bool {
        for node in nodes {
            if node.id == id {
                if let Some(mut w) = with.take() {
                    w.replies = std::mem::take(&mut node.replies);
                    *node = w;
                }
                return true;
            }
            if go(&mut node.replies, id, with) {
                return true;
            }
        }
        false
    }
    go(tree, id, &mut with);
    match with {
        Some(unplaced) => Err(unplaced),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(id: &str, parent: Option<&str>, minute: u32) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            forum_id: "f1".to_string(),
            author_id: "u1".to_string(),
            parent_id: parent.map(str::to_string),
            content: format!("content of {id}"),
            upvotes: 0,
            downvotes: 0,
            is_edited: false,
            created_at: Utc.with_ymd_and_hms(2025, 11, 10, 10, minute, 0).unwrap(),
            author: None,
        }
    }

    fn ids(tree: &[Message]) -> Vec<(usize, String)> {
        walk(tree)
            .into_iter()
            .map(|(d, m)| (d, m.id.clone()))
            .collect()
    }

    #[test]
    fn builds_nested_tree_in_creation_order() {
        // Rows arrive shuffled; siblings must come out oldest first.
        let tree = assemble(vec![
            row("m4", Some("m1"), 40),
            row("m3", Some("m2"), 30),
            row("m5", None, 50),
            row("m2", Some("m1"), 20),
            row("m1", None, 10),
        ]);

        assert_eq!(
            ids(&tree),
            vec![
                (0, "m1".to_string()),
                (1, "m2".to_string()),
                (2, "m3".to_string()),
                (1, "m4".to_string()),
                (0, "m5".to_string()),
            ]
        );
        assert_eq!(count(&tree), 5);
    }

    #[test]
    fn same_timestamp_siblings_fall_back_to_id() {
        let tree = assemble(vec![row("b", None, 1), row("a", None, 1)]);
        assert_eq!(tree[0].id, "a");
        assert_eq!(tree[1].id, "b");
    }

    #[test]
    fn self_reference_and_cycles_are_left_out() {
        let tree = assemble(vec![
            row("root", None, 0),
            row("ok", Some("root"), 1),
            row("selfish", Some("selfish"), 2),
            row("x", Some("y"), 3),
            row("y", Some("x"), 4),
            row("orphan", Some("elsewhere"), 5),
        ]);

        assert_eq!(
            ids(&tree),
            vec![(0, "root".to_string()), (1, "ok".to_string())]
        );
    }

    #[test]
    fn every_reply_parent_is_resident_in_the_tree() {
        let tree = assemble(vec![
            row("a", None, 0),
            row("b", Some("a"), 1),
            row("c", Some("b"), 2),
            row("d", None, 3),
            row("e", Some("d"), 4),
        ]);
        for (_, message) in walk(&tree) {
            if let Some(parent) = &message.parent_id {
                let parent = find(&tree, parent).expect("parent present");
                assert!(parent.replies.iter().any(|r| r.id == message.id));
            }
        }
    }

    #[test]
    fn attach_reply_keeps_prior_children() {
        let mut tree = assemble(vec![
            row("m1", None, 0),
            row("m2", Some("m1"), 1),
            row("m3", Some("m1"), 2),
        ]);
        let reply = Message::from(row("m9", Some("m1"), 9));

        attach_reply(&mut tree, Some("m1"), reply).unwrap();

        let children: Vec<_> = tree[0].replies.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(children, ["m2", "m3", "m9"]);
    }

    #[test]
    fn attach_reply_to_unknown_parent_hands_it_back() {
        let mut tree = assemble(vec![row("m1", None, 0)]);
        let reply = Message::from(row("m9", Some("nope"), 9));
        let back = attach_reply(&mut tree, Some("nope"), reply).unwrap_err();
        assert_eq!(back.id, "m9");
        assert_eq!(count(&tree), 1);
    }

    #[test]
    fn remove_and_replace_nested() {
        let mut tree = assemble(vec![
            row("m1", None, 0),
            row("m2", Some("m1"), 1),
            row("m3", Some("m2"), 2),
        ]);

        let mut confirmed = Message::from(row("m2-final", Some("m1"), 1));
        confirmed.content = "confirmed".into();
        replace(&mut tree, "m2", confirmed).unwrap();
        let swapped = find(&tree, "m2-final").unwrap();
        assert_eq!(swapped.content, "confirmed");
        assert_eq!(swapped.replies.len(), 1);

        let removed = remove(&mut tree, "m2-final").unwrap();
        assert_eq!(count(&[removed]), 2);
        assert_eq!(count(&tree), 1);
    }
}
