use std::collections::HashMap;

use serde_json::Value;

use super::content::Content;
use crate::listing::Listing;

/// Stable handle to a comment inside a [`CommentArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommentKey(usize);

impl CommentKey {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn shifted(self, offset: usize) -> Self {
        Self(self.0 + offset)
    }
}

/// A comment and its reply listing
///
/// Reply items are [`CommentKey`]s into the same arena as the comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub content: Content,
    /// Reply listing; its items are keys into the same arena
    pub replies: Listing,
}

impl Comment {
    pub fn id(&self) -> Option<&str> {
        self.content.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.content.name()
    }

    /// Fullname of the parent comment or post
    pub fn parent_id(&self) -> Option<&str> {
        self.content.get_str("parent_id")
    }

    /// Fullname of the post
    pub fn link_id(&self) -> Option<&str> {
        self.content.get_str("link_id")
    }

    pub fn body(&self) -> Option<&str> {
        self.content.get_str("body")
    }

    pub(crate) fn to_json(&self, arena: &CommentArena) -> Value {
        let mut value = self.content.to_json(arena);
        if let Value::Object(map) = &mut value {
            map.insert("replies".into(), self.replies.to_json_with(arena));
        }
        value
    }
}

/// Owning store for every comment of one materialized tree, indexed by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentArena {
    comments: Vec<Comment>,
    by_id: HashMap<String, CommentKey>,
}

impl CommentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Store `comment`, indexing it by id when it has one
    ///
    /// A later comment with the same id takes over the index entry.
    pub fn insert(&mut self, comment: Comment) -> CommentKey {
        let key = CommentKey(self.comments.len());
        if let Some(id) = comment.id() {
            self.by_id.insert(id.to_string(), key);
        }
        self.comments.push(comment);
        key
    }

    pub fn get(&self, key: CommentKey) -> Option<&Comment> {
        self.comments.get(key.0)
    }

    pub fn get_mut(&mut self, key: CommentKey) -> Option<&mut Comment> {
        self.comments.get_mut(key.0)
    }

    /// Key of the comment with bare id `id`
    pub fn lookup(&self, id: &str) -> Option<CommentKey> {
        self.by_id.get(id).copied()
    }

    /// Key of the comment with fullname `name` (`t1_<id>`)
    pub fn lookup_name(&self, name: &str) -> Option<CommentKey> {
        name.strip_prefix("t1_").and_then(|id| self.lookup(id))
    }

    /// Drop `key` from the id index; the comment itself stays addressable
    pub(crate) fn unindex(&mut self, key: CommentKey) {
        self.by_id.retain(|_, indexed| *indexed != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = (CommentKey, &Comment)> {
        self.comments.iter().enumerate().map(|(i, c)| (CommentKey(i), c))
    }

    /// Append every comment of `other`, returning the offset its keys were
    /// moved by
    ///
    /// Keys held outside `other` that pointed into it must be shifted by the
    /// returned offset (see [`super::Thing::shift_comment_keys`]).
    pub fn absorb(&mut self, other: CommentArena) -> usize {
        let offset = self.comments.len();
        for (id, key) in other.by_id {
            self.by_id.insert(id, key.shifted(offset));
        }
        for mut comment in other.comments {
            comment.content.shift_comment_keys(offset);
            comment.replies.shift_comment_keys(offset);
            self.comments.push(comment);
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fields, ObjectKind, Thing};

    fn comment(id: &str, replies: Vec<Thing>) -> Comment {
        let fields = Fields::from([("id".to_string(), Thing::from(id))]);
        let mut listing = Listing::comment_list();
        listing.push_items(replies);
        Comment { content: Content::new(ObjectKind::Comment, fields, true), replies: listing }
    }

    #[test]
    fn insert_indexes_by_id() {
        let mut arena = CommentArena::new();
        let key = arena.insert(comment("abc", vec![]));
        assert_eq!(arena.lookup("abc"), Some(key));
        assert_eq!(arena.lookup_name("t1_abc"), Some(key));
        assert_eq!(arena.get(key).and_then(Comment::id), Some("abc"));
        assert_eq!(arena.lookup("zzz"), None);
    }

    #[test]
    fn absorb_shifts_keys_and_reply_references() {
        let mut root = CommentArena::new();
        root.insert(comment("a", vec![]));
        root.insert(comment("b", vec![]));

        let mut other = CommentArena::new();
        let child = other.insert(comment("c", vec![]));
        other.insert(comment("d", vec![Thing::Comment(child)]));

        let offset = root.absorb(other);
        assert_eq!(offset, 2);
        let d = root.lookup("d").and_then(|k| root.get(k)).unwrap();
        assert_eq!(d.replies.items()[0].as_comment_key(), root.lookup("c"));
        assert_eq!(root.len(), 4);
    }
}
