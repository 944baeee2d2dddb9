//! Lazily extended listings
//!
//! A [`Listing`] is an ordered sequence backed by a remote source. It grows
//! through [`Listing::fetch_more`], which never mutates the receiver: it
//! clones it and extends the clone, first from the lookahead buffer and then
//! from the network. Two physical strategies exist. Regular listings follow
//! `before`/`after` cursors; comment listings that end in a
//! [`DeferredSubtree`] expand it instead.

mod deferred;
mod options;
mod regular;

use std::collections::{BTreeMap, VecDeque};

use futures::future::BoxFuture;
use redkite_domain::{RedkiteError, Result};
use serde_json::Value;
use tracing::debug;

pub use options::{Amount, FetchOptions};

use crate::model::{Comment, CommentArena, CommentKey, Content, DeferredSubtree, Thing};
use crate::ports::Requester;

/// Remotely backed, incrementally fetchable sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    items: Vec<Thing>,
    /// Query re-sent with every page request; cursors are kept apart
    query: BTreeMap<String, String>,
    before: Option<String>,
    after: Option<String>,
    uri: Option<String>,
    /// Items fetched but not yet exposed
    lookahead: Option<VecDeque<Thing>>,
    more: Option<DeferredSubtree>,
    is_comment_list: bool,
    /// Owner of every comment the items (and their replies) refer to
    arena: Option<CommentArena>,
}

impl Listing {
    /// Empty regular listing bound to `uri`
    ///
    /// `before`/`after` entries of `query` seed the cursors and `limit` is
    /// dropped; everything else is re-sent with every page.
    pub fn new(uri: impl Into<String>, query: BTreeMap<String, String>) -> Self {
        let mut query = query;
        let before = query.remove("before");
        let after = query.remove("after");
        query.remove("limit");
        Self { uri: Some(uri.into()), query, before, after, ..Self::default() }
    }

    /// Load the first page of the listing at `uri`
    ///
    /// The amount comes from a `limit` entry in `query`, defaulting to the
    /// service's default page size. Amounts above the per-request maximum
    /// are loaded over several pages.
    pub async fn open(
        requester: &dyn Requester,
        uri: impl Into<String>,
        query: BTreeMap<String, String>,
    ) -> Result<Listing> {
        let limit = match query.get("limit") {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                RedkiteError::InvalidArgument(format!("invalid listing limit '{raw}'"))
            })?,
            None => regular::DEFAULT_PAGE_SIZE,
        };
        let mut listing = Listing::new(uri, query);
        // A fresh listing has no cursor yet and reads as finished, so the
        // first page is loaded before handing over to the driver
        let amount = Amount::Limited(limit);
        let first = regular::fetch(&mut listing, requester, amount).await?;
        if first == 0 {
            return Ok(listing);
        }
        extend(listing, requester, amount.minus(first), FetchOptions::default()).await
    }

    /// Empty, finished comment listing
    pub fn comment_list() -> Self {
        Self { is_comment_list: true, ..Self::default() }
    }

    pub(crate) fn from_parts(items: Vec<Thing>, before: Option<String>, after: Option<String>) -> Self {
        Self { items, before, after, ..Self::default() }
    }

    /// Items exposed so far
    pub fn items(&self) -> &[Thing] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Thing> {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Thing> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Endpoint the listing pages through
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn set_uri(&mut self, uri: Option<String>) {
        self.uri = uri;
    }

    /// Cursor for the previous page
    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    /// Cursor for the next page
    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Pending `more` node of a comment listing
    pub fn more(&self) -> Option<&DeferredSubtree> {
        self.more.as_ref()
    }

    pub fn more_mut(&mut self) -> Option<&mut DeferredSubtree> {
        self.more.as_mut()
    }

    pub fn set_more(&mut self, more: Option<DeferredSubtree>) {
        self.more = more;
    }

    pub fn is_comment_list(&self) -> bool {
        self.is_comment_list
    }

    pub(crate) fn mark_comment_list(&mut self) {
        self.is_comment_list = true;
    }

    /// Number of buffered items not yet exposed
    pub fn lookahead_len(&self) -> usize {
        self.lookahead.as_ref().map_or(0, VecDeque::len)
    }

    /// Arena owning the comments of this tree, on root listings
    pub fn arena(&self) -> Option<&CommentArena> {
        self.arena.as_ref()
    }

    /// Whether further `fetch_more` calls can add anything
    pub fn is_finished(&self) -> bool {
        if self.lookahead_len() > 0 {
            return false;
        }
        if let Some(more) = &self.more {
            return more.is_exhausted();
        }
        self.uri.is_none() || (self.before.is_none() && self.after.is_none())
    }

    /// Resolve a comment key against this listing's arena
    pub fn comment(&self, key: CommentKey) -> Option<&Comment> {
        self.arena.as_ref().and_then(|arena| arena.get(key))
    }

    /// Find a comment anywhere in this tree by bare id
    pub fn find_comment(&self, id: &str) -> Option<&Comment> {
        let arena = self.arena.as_ref()?;
        arena.lookup(id).and_then(|key| arena.get(key))
    }

    /// Top-level comments, in order
    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.items
            .iter()
            .filter_map(Thing::as_comment_key)
            .filter_map(move |key| self.comment(key))
    }

    /// Typed objects among the items, in order
    pub fn contents(&self) -> impl Iterator<Item = &Content> {
        self.items.iter().filter_map(Thing::as_content)
    }

    /// Render the items as a JSON array
    pub fn to_json(&self) -> Value {
        self.to_json_with(&CommentArena::new())
    }

    pub(crate) fn to_json_with(&self, arena: &CommentArena) -> Value {
        let arena = self.arena.as_ref().unwrap_or(arena);
        Value::Array(self.items.iter().map(|item| item.to_json(arena)).collect())
    }

    pub(crate) fn push_items(&mut self, items: impl IntoIterator<Item = Thing>) {
        self.items.extend(items);
    }

    /// Attach the arena this listing's comment keys point into
    ///
    /// When an arena is already attached the new comments are appended
    /// after it and keep no outside references.
    pub(crate) fn adopt_arena(&mut self, arena: CommentArena) {
        match &mut self.arena {
            Some(existing) => {
                existing.absorb(arena);
            }
            None => self.arena = Some(arena),
        }
    }

    /// Append `incoming` to this listing's arena and return the key offset
    /// to apply to values that referenced it
    pub(crate) fn merge_arena(&mut self, incoming: CommentArena) -> usize {
        match &mut self.arena {
            Some(existing) => existing.absorb(incoming),
            None => {
                self.arena = Some(incoming);
                0
            }
        }
    }

    pub(crate) fn arena_mut(&mut self) -> &mut CommentArena {
        self.arena.get_or_insert_with(CommentArena::new)
    }

    pub(crate) fn shift_comment_keys(&mut self, offset: usize) {
        self.items.iter_mut().for_each(|item| item.shift_comment_keys(offset));
        if let Some(buffer) = &mut self.lookahead {
            buffer.iter_mut().for_each(|item| item.shift_comment_keys(offset));
        }
    }

    fn holds_foreign_keys(&self) -> bool {
        self.arena.is_none()
            && self.items.iter().chain(self.lookahead.iter().flatten()).any(|item| {
                matches!(item, Thing::Comment(_))
            })
    }

    /// Return a clone extended by up to the requested amount
    ///
    /// Accepts a plain item count or [`FetchOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::InvalidArgument`] when no amount is given or
    /// when called on a reply listing detached from its tree (use
    /// [`Listing::fetch_more_replies`] on the root instead). Pipeline errors
    /// propagate unchanged.
    pub async fn fetch_more(
        &self,
        requester: &dyn Requester,
        options: impl Into<FetchOptions>,
    ) -> Result<Listing> {
        let options = options.into();
        let amount = options.amount.ok_or_else(|| {
            RedkiteError::InvalidArgument(
                "Failed to fetch Listing. (`amount` parameter was missing or invalid)".into(),
            )
        })?;
        if self.holds_foreign_keys() {
            return Err(RedkiteError::InvalidArgument(
                "reply listings are extended through the root listing's fetch_more_replies".into(),
            ));
        }
        extend(self.clone(), requester, amount, options).await
    }

    /// Fetch everything that is left
    pub async fn fetch_all(&self, requester: &dyn Requester) -> Result<Listing> {
        self.fetch_more(requester, FetchOptions::all()).await
    }

    /// Extend the replies of the comment with bare id `comment_id`, anywhere
    /// in this tree
    ///
    /// Returns a clone of this listing with that comment patched in place.
    pub async fn fetch_more_replies(
        &self,
        requester: &dyn Requester,
        comment_id: &str,
        options: impl Into<FetchOptions>,
    ) -> Result<Listing> {
        let options = options.into();
        let amount = options.amount.ok_or_else(|| {
            RedkiteError::InvalidArgument(
                "Failed to fetch Listing. (`amount` parameter was missing or invalid)".into(),
            )
        })?;
        let key = self
            .arena
            .as_ref()
            .and_then(|arena| arena.lookup(comment_id))
            .ok_or_else(|| {
                RedkiteError::InvalidArgument(format!("no comment '{comment_id}' in this listing"))
            })?;

        let mut root = self.clone();
        let mut arena = root.arena.take().unwrap_or_default();
        let mut replies = match arena.get_mut(key) {
            Some(comment) => std::mem::take(&mut comment.replies),
            None => Listing::comment_list(),
        };
        replies.arena = Some(arena);

        let mut extended = extend(replies, requester, amount, options).await?;

        let mut arena = extended.arena.take().unwrap_or_default();
        if let Some(comment) = arena.get_mut(key) {
            comment.replies = extended;
        }
        root.arena = Some(arena);
        Ok(root)
    }
}

/// Drive one `fetch_more` to completion on an owned clone
fn extend<'a>(
    mut listing: Listing,
    requester: &'a dyn Requester,
    amount: Amount,
    options: FetchOptions,
) -> BoxFuture<'a, Result<Listing>> {
    Box::pin(async move {
        if !options.append {
            listing.items.clear();
        }
        let options = options.appending();

        if amount.is_zero() || listing.is_finished() {
            return Ok(listing);
        }

        if let Some(buffer) = listing.lookahead.as_mut().filter(|b| !b.is_empty()) {
            let take = amount.take_count(buffer.len());
            let drained: Vec<Thing> = buffer.drain(..take).collect();
            if buffer.is_empty() {
                listing.lookahead = None;
            }
            debug!(drained = take, "Serving listing items from lookahead");
            listing.items.extend(drained);
            return extend(listing, requester, amount.minus(take), options).await;
        }

        let consumed = if listing.more.is_some() {
            deferred::fetch(&mut listing, requester, amount, options.skip_replies).await?
        } else {
            regular::fetch(&mut listing, requester, amount).await?
        };
        if consumed == 0 {
            return Ok(listing);
        }
        extend(listing, requester, amount.minus(consumed), options).await
    })
}
