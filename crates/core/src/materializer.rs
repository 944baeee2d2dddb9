//! Materializer
//!
//! Walks a raw JSON response and rebuilds it as a tree of [`Thing`]s:
//! `{kind, data}` envelopes go through the object factory, user-like and
//! forum-like keys become unfetched stubs, and the `[post listing, comment
//! listing]` response shape collapses into the post with its comments
//! attached.

use std::sync::Arc;

use redkite_domain::kinds;
use serde_json::Value;
use tracing::warn;

use crate::factory::ObjectFactory;
use crate::listing::Listing;
use crate::model::{CommentArena, Content, Fields, ObjectKind, Thing};

/// Result of materializing one response
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub value: Thing,
    /// Comments of the response that were not attached to a root listing
    /// or post
    pub comments: CommentArena,
    warnings: Vec<String>,
}

impl Materialized {
    /// Wrap an already-built value with no comments
    pub fn from_value(value: Thing) -> Self {
        Self { value, comments: CommentArena::new(), warnings: Vec::new() }
    }

    /// Warnings emitted while materializing, in order
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_listing(&self) -> bool {
        matches!(self.value, Thing::Listing(_))
    }

    /// Tag a root listing with the request it came from
    pub fn set_listing_uri(&mut self, uri: &str) {
        if let Thing::Listing(listing) = &mut self.value {
            listing.set_uri(Some(uri.to_string()));
        }
    }

    /// The response as a listing
    ///
    /// A post with comments yields its comment listing. Any comments still
    /// held here are moved into the listing's arena.
    pub fn into_listing(self) -> Option<Listing> {
        let Self { value, comments, .. } = self;
        let mut listing = match value {
            Thing::Listing(listing) => *listing,
            Thing::Object(mut content) if content.kind() == &ObjectKind::Post => {
                content.take_comments()?
            }
            _ => return None,
        };
        if !comments.is_empty() {
            listing.adopt_arena(comments);
        }
        Some(listing)
    }

    /// Entries of a `{json: {errors: [...]}}` envelope, rendered as text
    pub fn remote_errors(&self) -> Option<Vec<String>> {
        let errors = self.value.get("json")?.get("errors")?.as_array()?;
        if errors.is_empty() {
            return None;
        }
        Some(errors.iter().map(render_error).collect())
    }

    /// Items under `json.data.things`, as returned by the bulk children
    /// endpoint
    pub fn take_things(&mut self) -> Vec<Thing> {
        let Thing::Map(root) = &mut self.value else {
            return Vec::new();
        };
        let things = root
            .get_mut("json")
            .and_then(|json| match json {
                Thing::Map(fields) => fields.get_mut("data"),
                _ => None,
            })
            .and_then(|data| match data {
                Thing::Map(fields) => fields.remove("things"),
                _ => None,
            });
        match things {
            Some(Thing::Array(items)) => items,
            _ => Vec::new(),
        }
    }
}

fn render_error(entry: &Thing) -> String {
    match entry {
        Thing::String(s) => s.clone(),
        Thing::Array(parts) => {
            parts.iter().filter_map(Thing::as_str).collect::<Vec<_>>().join(": ")
        }
        other => other.to_json(&CommentArena::new()).to_string(),
    }
}

/// Recursive JSON-to-object transformer
#[derive(Debug, Clone)]
pub struct Materializer {
    factory: Arc<ObjectFactory>,
    emit_warnings: bool,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(ObjectFactory::shared())
    }
}

struct Scratch {
    arena: CommentArena,
    warnings: Vec<String>,
}

impl Materializer {
    pub fn new(factory: Arc<ObjectFactory>) -> Self {
        Self { factory, emit_warnings: true }
    }

    /// Toggle `warn!` output; warnings are still recorded either way
    pub fn with_warnings(mut self, enabled: bool) -> Self {
        self.emit_warnings = enabled;
        self
    }

    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    /// Materialize a whole response
    pub fn populate(&self, node: Value) -> Materialized {
        let mut scratch = Scratch { arena: CommentArena::new(), warnings: Vec::new() };
        let mut value = self.populate_node(node, &mut scratch);

        let Scratch { mut arena, warnings } = scratch;
        if !arena.is_empty() {
            // The comment index travels with the root listing or post
            let target = match &mut value {
                Thing::Listing(listing) => Some(listing.as_mut()),
                Thing::Object(content) => content.comments_mut(),
                _ => None,
            };
            if let Some(listing) = target {
                listing.adopt_arena(std::mem::take(&mut arena));
            }
        }
        Materialized { value, comments: arena, warnings }
    }

    fn populate_node(&self, node: Value, scratch: &mut Scratch) -> Thing {
        match node {
            Value::Object(mut map) => {
                if map.len() == 2 && map.contains_key("kind") && map.contains_key("data") {
                    let kind = map.remove("kind").unwrap_or(Value::Null);
                    let data = map.remove("data").unwrap_or(Value::Null);
                    return self.populate_envelope(kind, data, scratch);
                }
                let fields: Fields = map
                    .into_iter()
                    .map(|(key, value)| {
                        let populated = self.populate_field(&key, value, scratch);
                        (key, populated)
                    })
                    .collect();
                Thing::Map(fields)
            }
            Value::Array(items) => {
                let mapped: Vec<Thing> =
                    items.into_iter().map(|item| self.populate_node(item, scratch)).collect();
                pair_post_with_comments(mapped)
            }
            scalar => Thing::from_plain(scalar),
        }
    }

    fn populate_envelope(&self, kind: Value, data: Value, scratch: &mut Scratch) -> Thing {
        let payload = self.populate_node(data, scratch);
        let tag = match &kind {
            Value::String(tag) => tag.clone(),
            other => other.to_string(),
        };
        let variant = kinds::variant_for_tag(&tag).filter(|v| self.factory.is_registered(v));
        match variant {
            Some(variant) => self.factory.materialize(variant, payload, true, &mut scratch.arena),
            None => {
                let message =
                    format!("Unknown type {tag}. This may be a bug; the raw payload is returned.");
                if self.emit_warnings {
                    warn!(kind = %tag, "Unknown kind tag; returning raw payload");
                }
                scratch.warnings.push(message);
                payload
            }
        }
    }

    fn populate_field(&self, key: &str, value: Value, scratch: &mut Scratch) -> Thing {
        let is_scalar = !(value.is_null() || value.is_object() || value.is_array());
        if is_scalar && kinds::is_user_key(key) {
            return Thing::Object(Content::user_stub(scalar_text(value)));
        }
        if is_scalar && kinds::is_forum_key(key) {
            return Thing::Object(Content::forum_stub(scalar_text(value)));
        }
        self.populate_node(value, scratch)
    }
}

fn scalar_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Collapse `[Listing<one Post>, Listing]` into the post with its comments
fn pair_post_with_comments(mut items: Vec<Thing>) -> Thing {
    let is_pair = items.len() == 2
        && matches!(&items[0], Thing::Listing(first)
            if first.len() == 1
                && matches!(first.items().first(), Some(Thing::Object(c)) if c.kind() == &ObjectKind::Post))
        && matches!(&items[1], Thing::Listing(_));
    if !is_pair {
        return Thing::Array(items);
    }

    let (Some(Thing::Listing(mut comments)), Some(Thing::Listing(first))) = (items.pop(), items.pop())
    else {
        return Thing::Array(items);
    };
    let Some(Thing::Object(mut post)) = first.into_items().into_iter().next() else {
        return Thing::Array(items);
    };

    comments.mark_comment_list();
    let post_name = post.fullname();
    if let Some(more) = comments.more_mut() {
        if more.link_id.is_none() {
            more.link_id = post_name;
        }
    }
    post.set_comments(*comments);
    Thing::Object(post)
}

#[cfg(test)]
mod tests {
    use redkite_common::testing::fixtures;
    use serde_json::json;

    use super::*;

    fn populate(value: Value) -> Materialized {
        Materializer::default().with_warnings(false).populate(value)
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(populate(json!(5)).value, Thing::Number(5.into()));
        assert_eq!(populate(json!("x")).value, Thing::from("x"));
        assert_eq!(populate(json!(null)).value, Thing::Null);
    }

    #[test]
    fn registered_envelope_becomes_fetched_object() {
        let out = populate(fixtures::post("abc"));
        let post = out.value.as_content().unwrap();
        assert_eq!(post.kind(), &ObjectKind::Post);
        assert_eq!(post.id(), Some("abc"));
        assert!(post.has_fetched());
        assert!(out.warnings().is_empty());
    }

    #[test]
    fn unknown_kind_returns_populated_data_with_one_warning() {
        let out = populate(json!({"kind": "t9", "data": {"id": "q", "author": "bob"}}));
        assert_eq!(out.warnings().len(), 1);
        let data = out.value.as_map().unwrap();
        assert_eq!(data.get("id"), Some(&Thing::from("q")));
        assert_eq!(
            data.get("author").and_then(Thing::as_content).and_then(Content::name),
            Some("bob")
        );
    }

    #[test]
    fn user_and_forum_keys_become_stubs() {
        let out = populate(json!({"author": "alice", "sr": "rust", "approved_by": null}));
        let author = out.value.get("author").and_then(Thing::as_content).unwrap();
        assert_eq!(author.kind(), &ObjectKind::User);
        assert!(!author.has_fetched());
        let forum = out.value.get("sr").and_then(Thing::as_content).unwrap();
        assert_eq!(forum.display_name(), Some("rust"));
        assert_eq!(out.value.get("approved_by"), Some(&Thing::Null));
    }

    #[test]
    fn envelope_requires_exactly_two_keys() {
        let out = populate(json!({"kind": "t3", "data": {"id": "a"}, "extra": 1}));
        assert!(out.value.as_map().is_some());
        assert!(out.value.get("kind").is_some());
    }

    #[test]
    fn pairs_post_with_comment_listing() {
        let raw = fixtures::post_with_comments(
            "p1",
            vec![
                fixtures::comment("c1", "p1", "t3_p1", json!("")),
                fixtures::more("m1", &["c2", "c3"], "t3_p1", 0),
            ],
        );
        let out = populate(raw);
        let post = out.value.as_content().unwrap();
        let comments = post.comments().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments.is_comment_list());
        assert_eq!(comments.more().map(|m| m.children.len()), Some(2));
        // The arena travels with the comments listing
        assert!(out.comments.is_empty());
        assert!(comments.find_comment("c1").is_some());
    }

    #[test]
    fn pairing_backfills_missing_link_id() {
        let raw = json!([
            fixtures::listing(vec![fixtures::post("p1")], None, None),
            fixtures::listing(vec![json!({"kind": "more", "data": {
                "id": "m", "name": "t1_m", "children": ["a"], "count": 1, "depth": 0,
                "parent_id": "t3_p1"
            }})], None, None),
        ]);
        let out = populate(raw);
        let comments = out.value.as_content().and_then(Content::comments).unwrap();
        assert_eq!(comments.more().and_then(|m| m.link_id.as_deref()), Some("t3_p1"));
    }

    #[test]
    fn nested_comments_are_indexed() {
        let reply = fixtures::comment("c2", "p1", "t1_c1", json!(""));
        let top = fixtures::comment("c1", "p1", "t3_p1", fixtures::listing(vec![reply], None, None));
        let out = populate(fixtures::listing(vec![top], None, None));
        let listing = out.value.as_listing().unwrap();
        let c1 = listing.find_comment("c1").unwrap();
        let reply_key = c1.replies.items()[0].as_comment_key().unwrap();
        assert_eq!(listing.comment(reply_key).and_then(|c| c.id()), Some("c2"));
    }

    #[test]
    fn detects_remote_errors() {
        let out = populate(fixtures::json_errors(vec![json!(["RATELIMIT", "slow down", "ratelimit"])]));
        assert_eq!(out.remote_errors(), Some(vec!["RATELIMIT: slow down: ratelimit".to_string()]));
        assert_eq!(populate(fixtures::json_errors(vec![])).remote_errors(), None);
    }

    #[test]
    fn takes_bulk_children_things() {
        let mut out = populate(fixtures::more_children_response(vec![fixtures::comment(
            "c9",
            "p1",
            "t3_p1",
            json!(""),
        )]));
        let things = out.take_things();
        assert_eq!(things.len(), 1);
        let key = things[0].as_comment_key().unwrap();
        assert_eq!(out.comments.get(key).and_then(|c| c.id()), Some("c9"));
    }
}
