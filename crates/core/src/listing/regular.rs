//! Cursor-paged fetch
//!
//! One page per call: `limit` is capped at the service maximum and the
//! listing's `before` cursor, if set, wins over `after`. Backwards pages are
//! prepended; forward pages are appended.

use std::collections::VecDeque;

use redkite_domain::constants::MAX_LISTING_ITEMS;
use redkite_domain::{RedkiteError, Result};
use tracing::debug;

use super::{Amount, Listing};
use crate::model::Thing;
use crate::ports::{ApiRequest, Requester};

/// Page size the service uses when no `limit` is sent
pub(super) const DEFAULT_PAGE_SIZE: usize = 25;

/// Fetch one page into `listing`; returns how many items were exposed
pub(super) async fn fetch(
    listing: &mut Listing,
    requester: &dyn Requester,
    amount: Amount,
) -> Result<usize> {
    let Some(uri) = listing.uri.clone() else {
        return Ok(0);
    };
    let limit = amount.take_count(MAX_LISTING_ITEMS);
    let backwards = listing.before.is_some();

    let mut request = ApiRequest::get(uri.as_str())
        .queries(listing.query.iter().map(|(k, v)| (k.clone(), v.clone())))
        .query("limit", limit.to_string());
    if let Some(before) = &listing.before {
        request = request.query("before", before.clone());
    } else if let Some(after) = &listing.after {
        request = request.query("after", after.clone());
    }
    debug!(uri = %uri, limit, backwards, "Fetching listing page");

    let mut page = requester
        .request(request)
        .await?
        .into_listing()
        .ok_or_else(|| RedkiteError::Decode(format!("{uri} did not return a Listing")))?;

    if let Some(arena) = page.arena.take() {
        let offset = listing.merge_arena(arena);
        page.shift_comment_keys(offset);
    }

    let mut items = std::mem::take(&mut page.items);
    if items.is_empty() {
        listing.before = None;
        listing.after = None;
        return Ok(0);
    }

    if backwards {
        let exposed = items.len();
        items.append(&mut listing.items);
        listing.items = items;
        listing.before = page.before;
        listing.after = None;
        return Ok(exposed);
    }

    let exposed = amount.take_count(items.len());
    let surplus: VecDeque<Thing> = items.drain(exposed..).collect();
    if !surplus.is_empty() {
        debug!(buffered = surplus.len(), "Page exceeded requested amount; buffering surplus");
        listing.lookahead.get_or_insert_with(VecDeque::new).extend(surplus);
    }
    listing.items.append(&mut items);
    listing.after = page.after;
    listing.before = None;
    Ok(exposed)
}
