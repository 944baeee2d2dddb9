//! Materialized object model
//!
//! Every value the materializer produces is a [`Thing`]. Typed objects carry
//! an explicit [`ObjectKind`] discriminant; comments live in a
//! [`CommentArena`] and are referenced by [`CommentKey`] so reply trees can be
//! patched after the fact without chasing references through the tree.

mod comment;
mod content;
mod deferred;

use std::collections::BTreeMap;

use redkite_domain::kinds;
use serde_json::{Map, Number, Value};

pub use comment::{Comment, CommentArena, CommentKey};
pub use content::Content;
pub use deferred::DeferredSubtree;

use crate::listing::Listing;

/// Field map of an object payload
pub type Fields = BTreeMap<String, Thing>;

/// Semantic variant of a typed object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// `t1`
    Comment,
    /// `t2`
    User,
    /// `t3`
    Post,
    /// `t4`
    PrivateMessage,
    /// `t5`, a subreddit
    Forum,
    /// `t6`
    Trophy,
    /// `t8`
    PromoCampaign,
    /// Per-forum karma breakdown
    KarmaList,
    /// List of trophies
    TrophyList,
    /// Subreddit settings page
    ForumSettings,
    /// Moderation log entry
    ModAction,
    /// A wiki page
    WikiPage,
    WikiPageSettings,
    /// Names of the wiki pages of a forum
    WikiPageListing,
    /// A live thread
    LiveThread,
    /// Entry of a live thread
    LiveUpdate,
    /// A multireddit
    MultiForum,
    ModmailConversation,
    ModmailConversationAuthor,
    /// A variant registered at runtime under a custom name
    Other(String),
}

impl ObjectKind {
    /// Kind for a registered variant name
    pub fn from_variant(variant: &str) -> Self {
        match variant {
            kinds::COMMENT => Self::Comment,
            kinds::USER => Self::User,
            kinds::POST => Self::Post,
            kinds::PRIVATE_MESSAGE => Self::PrivateMessage,
            kinds::FORUM => Self::Forum,
            kinds::TROPHY => Self::Trophy,
            kinds::PROMO_CAMPAIGN => Self::PromoCampaign,
            kinds::KARMA_LIST => Self::KarmaList,
            kinds::TROPHY_LIST => Self::TrophyList,
            kinds::FORUM_SETTINGS => Self::ForumSettings,
            kinds::MOD_ACTION => Self::ModAction,
            kinds::WIKI_PAGE => Self::WikiPage,
            kinds::WIKI_PAGE_SETTINGS => Self::WikiPageSettings,
            kinds::WIKI_PAGE_LISTING => Self::WikiPageListing,
            kinds::LIVE_THREAD => Self::LiveThread,
            kinds::LIVE_UPDATE => Self::LiveUpdate,
            kinds::MULTI_FORUM => Self::MultiForum,
            kinds::MODMAIL_CONVERSATION => Self::ModmailConversation,
            kinds::MODMAIL_CONVERSATION_AUTHOR => Self::ModmailConversationAuthor,
            other => Self::Other(other.to_string()),
        }
    }

    /// Registered variant name
    pub fn variant(&self) -> &str {
        match self {
            Self::Comment => kinds::COMMENT,
            Self::User => kinds::USER,
            Self::Post => kinds::POST,
            Self::PrivateMessage => kinds::PRIVATE_MESSAGE,
            Self::Forum => kinds::FORUM,
            Self::Trophy => kinds::TROPHY,
            Self::PromoCampaign => kinds::PROMO_CAMPAIGN,
            Self::KarmaList => kinds::KARMA_LIST,
            Self::TrophyList => kinds::TROPHY_LIST,
            Self::ForumSettings => kinds::FORUM_SETTINGS,
            Self::ModAction => kinds::MOD_ACTION,
            Self::WikiPage => kinds::WIKI_PAGE,
            Self::WikiPageSettings => kinds::WIKI_PAGE_SETTINGS,
            Self::WikiPageListing => kinds::WIKI_PAGE_LISTING,
            Self::LiveThread => kinds::LIVE_THREAD,
            Self::LiveUpdate => kinds::LIVE_UPDATE,
            Self::MultiForum => kinds::MULTI_FORUM,
            Self::ModmailConversation => kinds::MODMAIL_CONVERSATION,
            Self::ModmailConversationAuthor => kinds::MODMAIL_CONVERSATION_AUTHOR,
            Self::Other(name) => name,
        }
    }

    /// Wire kind tag, when the variant has one
    pub fn tag(&self) -> Option<&'static str> {
        kinds::tag_for_variant(self.variant())
    }
}

/// A materialized value: a scalar, a container, or a typed object
#[derive(Debug, Clone, PartialEq)]
pub enum Thing {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// A sequence; never wrapped into a listing
    Array(Vec<Thing>),
    /// An object with no kind envelope
    Map(Fields),
    /// A typed object
    Object(Content),
    /// A comment stored in the owning tree's arena
    Comment(CommentKey),
    Listing(Box<Listing>),
    /// A `more` node that was not folded into a listing
    More(DeferredSubtree),
}

impl Thing {
    /// Convert a scalar JSON value; containers become `Array`/`Map` of
    /// scalars without any kind handling
    pub fn from_plain(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from_plain).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from_plain(v))).collect())
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Thing]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Field map of an untagged object
    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Self::Map(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_content(&self) -> Option<&Content> {
        match self {
            Self::Object(content) => Some(content),
            _ => None,
        }
    }

    pub fn as_listing(&self) -> Option<&Listing> {
        match self {
            Self::Listing(listing) => Some(listing),
            _ => None,
        }
    }

    /// Arena key of a comment; resolve it with the owning listing
    pub fn as_comment_key(&self) -> Option<CommentKey> {
        match self {
            Self::Comment(key) => Some(*key),
            _ => None,
        }
    }

    /// Look up `key` when this is a plain map
    pub fn get(&self, key: &str) -> Option<&Thing> {
        self.as_map().and_then(|fields| fields.get(key))
    }

    /// Move every [`CommentKey`] reachable from this value by `offset`
    ///
    /// Used when the arena these keys point into is appended to another.
    pub fn shift_comment_keys(&mut self, offset: usize) {
        if offset == 0 {
            return;
        }
        match self {
            Self::Comment(key) => *key = key.shifted(offset),
            Self::Array(items) => items.iter_mut().for_each(|item| item.shift_comment_keys(offset)),
            Self::Map(fields) => fields.values_mut().for_each(|v| v.shift_comment_keys(offset)),
            Self::Object(content) => content.shift_comment_keys(offset),
            Self::Listing(listing) => listing.shift_comment_keys(offset),
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) | Self::More(_) => {}
        }
    }

    /// Render back to JSON
    ///
    /// Unfetched user and forum stubs render as their bare name, listings as
    /// their item array. Comment keys resolve against `arena`.
    pub fn to_json(&self, arena: &CommentArena) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(|i| i.to_json(arena)).collect()),
            Self::Map(fields) => fields_to_json(fields, arena),
            Self::Object(content) => content.to_json(arena),
            Self::Comment(key) => arena.get(*key).map_or(Value::Null, |c| c.to_json(arena)),
            Self::Listing(listing) => listing.to_json_with(arena),
            Self::More(more) => more.to_json(),
        }
    }
}

pub(crate) fn fields_to_json(fields: &Fields, arena: &CommentArena) -> Value {
    let map: Map<String, Value> =
        fields.iter().map(|(k, v)| (k.clone(), v.to_json(arena))).collect();
    Value::Object(map)
}

impl From<&str> for Thing {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Thing {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
