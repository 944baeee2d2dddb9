use redkite_domain::kinds::{add_fullname_prefix, has_fullname_prefix};
use redkite_domain::{RedkiteError, Result};
use serde_json::Value;
use tracing::debug;

use super::{fields_to_json, CommentArena, Fields, ObjectKind, Thing};
use crate::listing::Listing;
use crate::materializer::Materialized;
use crate::ports::{ApiRequest, Requester};

/// A typed remote object other than a comment's reply tree
///
/// Objects built from a bare name reference (e.g. the `author` of a post)
/// are stubs: `has_fetched` is false and only the identifying field is set
/// until [`Content::fetch`] loads the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    kind: ObjectKind,
    fields: Fields,
    has_fetched: bool,
    /// Comment tree of a post, attached when it arrives with the post
    comments: Option<Box<Listing>>,
}

impl Content {
    pub fn new(kind: ObjectKind, fields: Fields, has_fetched: bool) -> Self {
        Self { kind, fields, has_fetched, comments: None }
    }

    /// Unfetched user keyed by `name`
    pub fn user_stub(name: impl Into<String>) -> Self {
        let fields = Fields::from([("name".to_string(), Thing::String(name.into()))]);
        Self::new(ObjectKind::User, fields, false)
    }

    /// Unfetched forum keyed by `display_name`
    pub fn forum_stub(display_name: impl Into<String>) -> Self {
        let fields =
            Fields::from([("display_name".to_string(), Thing::String(display_name.into()))]);
        Self::new(ObjectKind::Forum, fields, false)
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// False for stubs built from a bare name
    pub fn has_fetched(&self) -> bool {
        self.has_fetched
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    /// Field by name
    pub fn get(&self, key: &str) -> Option<&Thing> {
        self.fields.get(key)
    }

    /// String field by name
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Thing::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Thing) -> Option<Thing> {
        self.fields.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Thing> {
        self.fields.remove(key)
    }

    /// Bare remote id
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    /// The `name` field: the fullname for most kinds, the username for users
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn display_name(&self) -> Option<&str> {
        self.get_str("display_name")
    }

    /// Kind-prefixed id, e.g. `t3_abc`
    pub fn fullname(&self) -> Option<String> {
        if let Some(name) = self.name().filter(|n| has_fullname_prefix(n)) {
            return Some(name.to_string());
        }
        let tag = self.kind.tag()?;
        self.id().map(|id| add_fullname_prefix(id, &format!("{tag}_")))
    }

    /// Comment tree attached to a post
    pub fn comments(&self) -> Option<&Listing> {
        self.comments.as_deref()
    }

    pub fn comments_mut(&mut self) -> Option<&mut Listing> {
        self.comments.as_deref_mut()
    }

    pub fn set_comments(&mut self, comments: Listing) {
        self.comments = Some(Box::new(comments));
    }

    pub fn take_comments(&mut self) -> Option<Listing> {
        self.comments.take().map(|boxed| *boxed)
    }

    /// Request that loads the full state of this object
    pub fn fetch_request(&self) -> Result<ApiRequest> {
        let missing = || {
            RedkiteError::InvalidArgument(format!(
                "cannot fetch {} without an identifying field",
                self.kind.variant()
            ))
        };
        let request = match self.kind {
            ObjectKind::User => {
                ApiRequest::get(format!("user/{}/about", self.name().ok_or_else(missing)?))
            }
            ObjectKind::Forum => {
                ApiRequest::get(format!("r/{}/about", self.display_name().ok_or_else(missing)?))
            }
            ObjectKind::Post => {
                ApiRequest::get(format!("comments/{}", self.bare_id().ok_or_else(missing)?))
            }
            ObjectKind::PrivateMessage => ApiRequest::get(format!(
                "message/messages/{}",
                self.bare_id().ok_or_else(missing)?
            )),
            _ => ApiRequest::get("api/info").query("id", self.fullname().ok_or_else(missing)?),
        };
        Ok(request)
    }

    fn bare_id(&self) -> Option<String> {
        self.id().map(str::to_string).or_else(|| {
            self.name().map(|n| redkite_domain::kinds::strip_fullname_prefix(n).to_string())
        })
    }

    /// Load the full state of a stub in place
    ///
    /// Does nothing when the object has already been fetched.
    pub async fn fetch(&mut self, requester: &dyn Requester) -> Result<()> {
        if self.has_fetched {
            return Ok(());
        }
        self.refresh(requester).await
    }

    /// Reload this object from the remote service, replacing its state
    pub async fn refresh(&mut self, requester: &dyn Requester) -> Result<()> {
        let request = self.fetch_request()?;
        let path = request.to_string();
        debug!(kind = self.kind.variant(), path = %path, "Fetching object");

        let response = requester.request(request).await?;
        let fetched = response.into_content().ok_or_else(|| {
            RedkiteError::Decode(format!("{path} did not return a {}", self.kind.variant()))
        })?;

        self.fields = fetched.fields;
        self.comments = fetched.comments;
        self.has_fetched = true;
        Ok(())
    }

    pub(crate) fn shift_comment_keys(&mut self, offset: usize) {
        self.fields.values_mut().for_each(|v| v.shift_comment_keys(offset));
        if let Some(comments) = self.comments.as_deref_mut() {
            comments.shift_comment_keys(offset);
        }
    }

    pub(crate) fn to_json(&self, arena: &CommentArena) -> Value {
        if !self.has_fetched {
            let bare = match self.kind {
                ObjectKind::User => self.name(),
                ObjectKind::Forum => self.display_name(),
                _ => None,
            };
            if let Some(bare) = bare {
                return Value::String(bare.to_string());
            }
        }
        let mut value = fields_to_json(&self.fields, arena);
        if let (Value::Object(map), Some(comments)) = (&mut value, self.comments.as_deref()) {
            map.insert("comments".into(), comments.to_json());
        }
        value
    }
}

impl Materialized {
    /// The single typed object a fetch response describes
    fn into_content(self) -> Option<Content> {
        let Materialized { value, comments, .. } = self;
        match value {
            Thing::Object(content) => Some(content),
            Thing::Comment(key) => comments.get(key).map(|c| c.content.clone()),
            Thing::Listing(listing) => {
                let first = listing.items().first()?;
                match first {
                    Thing::Object(content) => Some(content.clone()),
                    Thing::Comment(key) => {
                        let arena = listing.arena().unwrap_or(&comments);
                        arena.get(*key).map(|c| c.content.clone())
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stubs_are_unfetched() {
        let user = Content::user_stub("spez");
        assert!(!user.has_fetched());
        assert_eq!(user.name(), Some("spez"));
        assert_eq!(user.to_json(&CommentArena::default()), Value::String("spez".into()));

        let forum = Content::forum_stub("rust");
        assert_eq!(forum.display_name(), Some("rust"));
        assert_eq!(forum.fetch_request().unwrap().to_string(), "r/rust/about");
    }

    #[test]
    fn fullname_prefers_name_field() {
        let mut post = Content::new(
            ObjectKind::Post,
            Fields::from([("id".to_string(), Thing::from("abc"))]),
            true,
        );
        assert_eq!(post.fullname().as_deref(), Some("t3_abc"));
        post.insert("name", Thing::from("t3_zzz"));
        assert_eq!(post.fullname().as_deref(), Some("t3_zzz"));
    }

    #[test]
    fn fetch_paths_by_kind() {
        let id = |kind| Content::new(kind, Fields::from([("id".to_string(), Thing::from("x1"))]), false);
        let path = |content: Content| content.fetch_request().unwrap().to_string();
        assert_eq!(path(Content::user_stub("a")), "user/a/about");
        assert_eq!(path(id(ObjectKind::Post)), "comments/x1");
        assert_eq!(path(id(ObjectKind::PrivateMessage)), "message/messages/x1");
        assert_eq!(path(id(ObjectKind::Comment)), "api/info?id=t1_x1");
        assert!(Content::new(ObjectKind::Trophy, Fields::new(), false).fetch_request().is_err());
    }
}
