//! Kind tags and fullname helpers
//!
//! The remote API labels every typed object with a short kind tag (`t1`,
//! `t3`, `Listing`, `more`, ...). The registry here maps those tags to the
//! local variant names the object factory knows how to construct.

use std::collections::HashMap;

use once_cell::sync::Lazy;

// Variant names produced by the registry
pub const COMMENT: &str = "Comment";
pub const USER: &str = "User";
pub const POST: &str = "Post";
pub const PRIVATE_MESSAGE: &str = "PrivateMessage";
pub const FORUM: &str = "Forum";
pub const TROPHY: &str = "Trophy";
pub const PROMO_CAMPAIGN: &str = "PromoCampaign";
pub const LISTING: &str = "Listing";
pub const DEFERRED_SUBTREE: &str = "DeferredSubtree";
pub const USER_LIST: &str = "UserList";
pub const KARMA_LIST: &str = "KarmaList";
pub const TROPHY_LIST: &str = "TrophyList";
pub const FORUM_SETTINGS: &str = "ForumSettings";
pub const MOD_ACTION: &str = "ModAction";
pub const WIKI_PAGE: &str = "WikiPage";
pub const WIKI_PAGE_SETTINGS: &str = "WikiPageSettings";
pub const WIKI_PAGE_LISTING: &str = "WikiPageListing";
pub const LIVE_THREAD: &str = "LiveThread";
pub const LIVE_UPDATE: &str = "LiveUpdate";
pub const MULTI_FORUM: &str = "MultiForum";
pub const MODMAIL_CONVERSATION: &str = "ModmailConversation";
pub const MODMAIL_CONVERSATION_AUTHOR: &str = "ModmailConversationAuthor";

const KIND_TABLE: &[(&str, &str)] = &[
    ("t1", COMMENT),
    ("t2", USER),
    ("t3", POST),
    ("t4", PRIVATE_MESSAGE),
    ("t5", FORUM),
    ("t6", TROPHY),
    ("t8", PROMO_CAMPAIGN),
    ("Listing", LISTING),
    ("more", DEFERRED_SUBTREE),
    ("UserList", USER_LIST),
    ("KarmaList", KARMA_LIST),
    ("TrophyList", TROPHY_LIST),
    ("subreddit_settings", FORUM_SETTINGS),
    ("modaction", MOD_ACTION),
    ("wikipage", WIKI_PAGE),
    ("wikipagesettings", WIKI_PAGE_SETTINGS),
    ("wikipagelisting", WIKI_PAGE_LISTING),
    ("LiveUpdateEvent", LIVE_THREAD),
    ("LiveUpdate", LIVE_UPDATE),
    ("LabeledMulti", MULTI_FORUM),
    ("ModmailConversation", MODMAIL_CONVERSATION),
    ("ModmailConversationAuthor", MODMAIL_CONVERSATION_AUTHOR),
];

static KIND_REGISTRY: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| KIND_TABLE.iter().copied().collect());

/// Keys whose string values name a user
pub const USER_KEYS: &[&str] = &["author", "approved_by", "banned_by", "user"];

/// Keys whose string values name a forum
pub const FORUM_KEYS: &[&str] = &["subreddit", "sr"];

/// Variant name registered for a kind tag
pub fn variant_for_tag(tag: &str) -> Option<&'static str> {
    KIND_REGISTRY.get(tag).copied()
}

/// Kind tag for a variant name, the inverse of [`variant_for_tag`]
pub fn tag_for_variant(variant: &str) -> Option<&'static str> {
    KIND_TABLE.iter().find(|(_, v)| *v == variant).map(|(tag, _)| *tag)
}

/// Variant name implied by a fullname's prefix, e.g. `t3_abc` -> `Post`
pub fn variant_for_fullname(fullname: &str) -> Option<&'static str> {
    let (prefix, rest) = fullname.split_once('_')?;
    if rest.is_empty() || !has_fullname_prefix(fullname) {
        return None;
    }
    variant_for_tag(prefix)
}

pub fn is_user_key(key: &str) -> bool {
    USER_KEYS.contains(&key)
}

pub fn is_forum_key(key: &str) -> bool {
    FORUM_KEYS.contains(&key)
}

/// Whether `value` starts with a type prefix: `t<digit>_` or `LiveUpdateEvent_`
pub fn has_fullname_prefix(value: &str) -> bool {
    if value.starts_with("LiveUpdateEvent_") {
        return true;
    }
    let bytes = value.as_bytes();
    bytes.len() >= 3 && bytes[0] == b't' && bytes[1].is_ascii_digit() && bytes[2] == b'_'
}

/// Prefix a bare id with `prefix` unless it already carries a type prefix
pub fn add_fullname_prefix(value: &str, prefix: &str) -> String {
    if has_fullname_prefix(value) {
        value.to_string()
    } else {
        format!("{prefix}{value}")
    }
}

/// Id portion of a fullname, or the input unchanged when it has no prefix
pub fn strip_fullname_prefix(value: &str) -> &str {
    if !has_fullname_prefix(value) {
        return value;
    }
    value.split_once('_').map_or(value, |(_, id)| id)
}
