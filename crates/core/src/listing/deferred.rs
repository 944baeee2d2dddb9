//! Deferred-subtree expansion
//!
//! A comment listing whose tail is a `more` node grows by expanding that
//! node's child ids. The service returns the expanded comments as a flat
//! sequence in depth-first order, each carrying its `parent_id`; the reply
//! tree is rebuilt from those ids. The "continue this thread" sentinel has no
//! child ids and is resolved by loading the parent comment's permalink page.

use redkite_domain::constants::{
    API_TYPE, MAX_API_INFO_AMOUNT, MAX_API_MORECHILDREN_AMOUNT,
};
use redkite_domain::kinds::{add_fullname_prefix, strip_fullname_prefix};
use redkite_domain::{RedkiteError, Result};
use tracing::debug;

use super::{Amount, Listing};
use crate::model::{CommentArena, CommentKey, DeferredSubtree, Thing};
use crate::ports::{ApiRequest, Requester};

/// Expand up to `amount` ids of the listing's deferred subtree
///
/// Returns how many ids were consumed.
pub(super) async fn fetch(
    listing: &mut Listing,
    requester: &dyn Requester,
    amount: Amount,
    skip_replies: bool,
) -> Result<usize> {
    let Some(more) = listing.more.clone() else {
        return Ok(0);
    };
    if more.is_continue_thread() {
        return continue_thread(listing, requester, &more).await;
    }

    let take = amount.take_count(more.children.len());
    if take == 0 {
        return Ok(0);
    }
    let ids = &more.children[..take];
    debug!(ids = take, skip_replies, parent = ?more.parent_id, "Expanding deferred subtree");

    let fetched = if skip_replies {
        fetch_by_info(listing, requester, ids).await?
    } else {
        fetch_more_children(listing, requester, &more, ids).await?
    };

    let (top_level, pending) = attach(listing.arena_mut(), fetched, more.parent_id.as_deref());
    listing.items.extend(top_level);

    if let Some(pointer) = listing.more.as_mut() {
        pointer.consume(take);
        pending.into_iter().for_each(|node| pointer.merge(node));
    }
    if listing.more.as_ref().is_some_and(DeferredSubtree::is_exhausted) {
        listing.more = None;
    }
    Ok(take)
}

/// Load the ids one level deep through the bulk info endpoint
async fn fetch_by_info(
    listing: &mut Listing,
    requester: &dyn Requester,
    ids: &[String],
) -> Result<Vec<Thing>> {
    let mut fetched = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(MAX_API_INFO_AMOUNT) {
        let fullnames: Vec<String> = chunk.iter().map(|id| add_fullname_prefix(id, "t1_")).collect();
        let request = ApiRequest::get("api/info").query("id", fullnames.join(","));
        let mut page = requester
            .request(request)
            .await?
            .into_listing()
            .ok_or_else(|| RedkiteError::Decode("api/info did not return a Listing".into()))?;
        if let Some(arena) = page.arena.take() {
            let offset = listing.merge_arena(arena);
            page.shift_comment_keys(offset);
        }
        fetched.extend(page.items);
    }
    Ok(fetched)
}

/// Load the ids with their nested replies through the bulk children endpoint
async fn fetch_more_children(
    listing: &mut Listing,
    requester: &dyn Requester,
    more: &DeferredSubtree,
    ids: &[String],
) -> Result<Vec<Thing>> {
    let link_id = more.link_id.clone().or_else(|| more.parent_id.clone()).ok_or_else(|| {
        RedkiteError::InvalidArgument("deferred subtree has neither link_id nor parent_id".into())
    })?;

    let mut fetched = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(MAX_API_MORECHILDREN_AMOUNT) {
        let request = ApiRequest::get("api/morechildren")
            .query("api_type", API_TYPE)
            .query("children", chunk.join(","))
            .query("link_id", link_id.clone());
        let mut response = requester.request(request).await?;
        let mut things = response.take_things();
        let offset = listing.merge_arena(std::mem::take(&mut response.comments));
        things.iter_mut().for_each(|thing| thing.shift_comment_keys(offset));
        fetched.extend(things);
    }
    Ok(fetched)
}

/// Rebuild reply nesting for a flat batch
///
/// Items whose parent is `pointer_parent` (or unknown) are returned as the
/// new top-level items; nested `more` nodes hang off their parent comment.
/// Top-level `more` nodes are returned separately so they can be folded into
/// the listing's own pointer.
fn attach(
    arena: &mut CommentArena,
    fetched: Vec<Thing>,
    pointer_parent: Option<&str>,
) -> (Vec<Thing>, Vec<DeferredSubtree>) {
    let mut top_level = Vec::new();
    let mut pending = Vec::new();

    for item in fetched {
        let parent = match &item {
            Thing::Comment(key) => arena.get(*key).and_then(|c| c.parent_id()).map(str::to_string),
            Thing::More(node) => node.parent_id.clone(),
            _ => None,
        };
        let parent_key: Option<CommentKey> = parent
            .as_deref()
            .filter(|p| Some(*p) != pointer_parent)
            .and_then(|p| arena.lookup_name(p));

        match (parent_key, item) {
            (Some(parent_key), Thing::Comment(key)) => {
                if let Some(parent) = arena.get_mut(parent_key) {
                    parent.replies.push_items([Thing::Comment(key)]);
                }
            }
            (Some(parent_key), Thing::More(mut node)) => {
                if let Some(parent) = arena.get_mut(parent_key) {
                    if node.link_id.is_none() {
                        node.link_id = parent.link_id().map(str::to_string);
                    }
                    match parent.replies.more_mut() {
                        Some(existing) => existing.merge(node),
                        None => parent.replies.set_more(Some(node)),
                    }
                }
            }
            (None, Thing::More(node)) => pending.push(node),
            (_, other) => top_level.push(other),
        }
    }
    (top_level, pending)
}

/// Resolve the "continue this thread" sentinel
async fn continue_thread(
    listing: &mut Listing,
    requester: &dyn Requester,
    sentinel: &DeferredSubtree,
) -> Result<usize> {
    let (Some(link_id), Some(parent_id)) = (&sentinel.link_id, &sentinel.parent_id) else {
        return Err(RedkiteError::InvalidArgument(
            "continue-thread node needs both link_id and parent_id".into(),
        ));
    };
    let request = ApiRequest::get(format!("comments/{}", strip_fullname_prefix(link_id)))
        .query("comment", strip_fullname_prefix(parent_id));
    debug!(parent = %parent_id, "Resolving continue-thread node");

    let mut thread = requester.request(request).await?.into_listing().ok_or_else(|| {
        RedkiteError::Decode(format!("no comment thread returned for {parent_id}"))
    })?;
    let mut arena = thread.arena.take().unwrap_or_default();
    let Some(root) = thread.items.first().and_then(Thing::as_comment_key) else {
        listing.more = None;
        return Ok(0);
    };

    // The parent is already in the tree; only its replies are new
    let mut replies = arena.get_mut(root).map(|c| std::mem::take(&mut c.replies)).unwrap_or_default();
    arena.unindex(root);
    let offset = listing.merge_arena(arena);
    replies.shift_comment_keys(offset);

    let added = replies.items.len();
    listing.items.append(&mut replies.items);
    listing.more = replies.more.take().map(|mut node| {
        if node.link_id.is_none() {
            node.link_id = Some(link_id.clone());
        }
        node
    });
    Ok(added)
}
