//! Object factory
//!
//! Maps a variant name to a constructor. The default registrations cover
//! every variant of the kind registry; callers may register more variants or
//! replace existing ones before materializing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use redkite_domain::kinds;
use tracing::warn;

use crate::listing::Listing;
use crate::model::{Comment, CommentArena, Content, DeferredSubtree, Fields, ObjectKind, Thing};

/// Builds a typed value from a populated payload
///
/// Arguments are the payload's fields, the fetched flag, and the arena that
/// comments of the current response are stored in.
pub type Constructor = Arc<dyn Fn(Fields, bool, &mut CommentArena) -> Thing + Send + Sync>;

static DEFAULT_FACTORY: Lazy<Arc<ObjectFactory>> =
    Lazy::new(|| Arc::new(ObjectFactory::with_defaults()));

/// Registry of constructors keyed by variant name
#[derive(Clone)]
pub struct ObjectFactory {
    constructors: HashMap<String, Constructor>,
}

impl fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("ObjectFactory").field("variants", &names).finish()
    }
}

impl Default for ObjectFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ObjectFactory {
    /// Factory with no registrations
    pub fn empty() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Shared factory with the default registrations
    pub fn shared() -> Arc<Self> {
        Arc::clone(&DEFAULT_FACTORY)
    }

    /// Factory with a constructor for every variant in the kind registry
    pub fn with_defaults() -> Self {
        let mut factory = Self::empty();
        factory.register(kinds::COMMENT, build_comment);
        factory.register(kinds::LISTING, build_listing);
        factory.register(kinds::DEFERRED_SUBTREE, |fields, _, _| {
            Thing::More(DeferredSubtree::from_fields(&fields))
        });
        factory.register(kinds::USER_LIST, build_user_list);

        for variant in [
            kinds::USER,
            kinds::POST,
            kinds::PRIVATE_MESSAGE,
            kinds::FORUM,
            kinds::TROPHY,
            kinds::PROMO_CAMPAIGN,
            kinds::KARMA_LIST,
            kinds::TROPHY_LIST,
            kinds::FORUM_SETTINGS,
            kinds::MOD_ACTION,
            kinds::WIKI_PAGE,
            kinds::WIKI_PAGE_SETTINGS,
            kinds::WIKI_PAGE_LISTING,
            kinds::LIVE_THREAD,
            kinds::LIVE_UPDATE,
            kinds::MULTI_FORUM,
            kinds::MODMAIL_CONVERSATION,
            kinds::MODMAIL_CONVERSATION_AUTHOR,
        ] {
            factory.register(variant, move |fields, has_fetched, _| {
                Thing::Object(Content::new(ObjectKind::from_variant(variant), fields, has_fetched))
            });
        }
        factory
    }

    /// Register `constructor` under `variant`, replacing any earlier one
    pub fn register<F>(&mut self, variant: impl Into<String>, constructor: F)
    where
        F: Fn(Fields, bool, &mut CommentArena) -> Thing + Send + Sync + 'static,
    {
        self.constructors.insert(variant.into(), Arc::new(constructor));
    }

    pub fn is_registered(&self, variant: &str) -> bool {
        self.constructors.contains_key(variant)
    }

    /// Build the object for `variant` from `payload`
    ///
    /// Arrays are returned unchanged, as are non-object payloads. An unknown
    /// variant logs a warning and returns the payload.
    pub fn materialize(
        &self,
        variant: &str,
        payload: Thing,
        has_fetched: bool,
        arena: &mut CommentArena,
    ) -> Thing {
        let fields = match payload {
            Thing::Map(fields) => fields,
            other => return other,
        };
        match self.constructors.get(variant) {
            Some(constructor) => constructor(fields, has_fetched, arena),
            None => {
                warn!(variant, "No constructor registered for variant; returning raw payload");
                Thing::Map(fields)
            }
        }
    }
}

fn build_listing(mut fields: Fields, _has_fetched: bool, _arena: &mut CommentArena) -> Thing {
    let mut items = match fields.remove("children") {
        Some(Thing::Array(items)) => items,
        _ => Vec::new(),
    };
    let text = |fields: &Fields, key: &str| fields.get(key).and_then(Thing::as_str).map(str::to_string);

    // A trailing `more` child marks truncation
    let more = match items.last() {
        Some(Thing::More(_)) => match items.pop() {
            Some(Thing::More(more)) => Some(more),
            _ => None,
        },
        _ => None,
    };

    let mut listing = Listing::from_parts(items, text(&fields, "before"), text(&fields, "after"));
    if let Some(more) = more {
        listing.set_more(Some(more));
    }
    if listing.items().iter().any(|item| matches!(item, Thing::Comment(_))) || listing.more().is_some() {
        listing.mark_comment_list();
    }
    Thing::Listing(Box::new(listing))
}

fn build_comment(mut fields: Fields, has_fetched: bool, arena: &mut CommentArena) -> Thing {
    let link_id = fields.get("link_id").and_then(Thing::as_str).map(str::to_string);

    let replies = match fields.remove("replies") {
        Some(Thing::Listing(listing)) => {
            let mut listing = *listing;
            listing.mark_comment_list();
            if let Some(more) = listing.more_mut() {
                if more.link_id.is_none() {
                    more.link_id.clone_from(&link_id);
                }
            }
            listing
        }
        // "" when there are no replies
        _ => Listing::comment_list(),
    };

    let comment = Comment { content: Content::new(ObjectKind::Comment, fields, has_fetched), replies };
    Thing::Comment(arena.insert(comment))
}

fn build_user_list(mut fields: Fields, _has_fetched: bool, _arena: &mut CommentArena) -> Thing {
    let children = match fields.remove("children") {
        Some(Thing::Array(children)) => children,
        _ => Vec::new(),
    };
    let users = children
        .into_iter()
        .map(|child| match child {
            Thing::Map(user) => Thing::Object(Content::new(ObjectKind::User, user, false)),
            other => other,
        })
        .collect();
    Thing::Array(users)
}
