//! JSON fixture builders
//!
//! Builds raw API payloads in the exact envelope shapes the remote service
//! returns, so materializer, listing and pipeline tests can script responses
//! without hand-writing nested JSON.

use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a base-36 id of the given length with a seed (deterministic)
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "test-utils")]
/// # {
/// use redkite_common::testing::fixtures::random_id_seeded;
///
/// assert_eq!(random_id_seeded(6, 42), random_id_seeded(6, 42));
/// assert_eq!(random_id_seeded(6, 42).len(), 6);
/// # }
/// ```
pub fn random_id_seeded(len: usize, seed: u64) -> String {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..len).map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char).collect()
}

/// Wrap `data` in a `{kind, data}` envelope
pub fn envelope(kind: &str, data: Value) -> Value {
    json!({ "kind": kind, "data": data })
}

/// A `t1` comment on post `link_id` (bare id) replying to `parent`
/// (a fullname). `replies` is either `""` or a listing envelope.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "test-utils")]
/// # {
/// use redkite_common::testing::fixtures::comment;
///
/// let c = comment("c1", "p1", "t3_p1", serde_json::json!(""));
/// assert_eq!(c["data"]["name"], "t1_c1");
/// assert_eq!(c["data"]["link_id"], "t3_p1");
/// # }
/// ```
pub fn comment(id: &str, link_id: &str, parent: &str, replies: Value) -> Value {
    envelope(
        "t1",
        json!({
            "id": id,
            "name": format!("t1_{id}"),
            "link_id": format!("t3_{link_id}"),
            "parent_id": parent,
            "body": format!("comment {id}"),
            "author": "fixture_user",
            "subreddit": "fixtures",
            "replies": replies,
        }),
    )
}

/// A `t3` post
pub fn post(id: &str) -> Value {
    envelope(
        "t3",
        json!({
            "id": id,
            "name": format!("t3_{id}"),
            "title": format!("post {id}"),
            "author": "fixture_user",
            "subreddit": "fixtures",
            "num_comments": 0,
        }),
    )
}

/// A regular `Listing` envelope
pub fn listing(children: Vec<Value>, after: Option<&str>, before: Option<&str>) -> Value {
    envelope(
        "Listing",
        json!({
            "children": children,
            "after": after,
            "before": before,
        }),
    )
}

/// A `more` node listing child ids under `parent` (a fullname)
pub fn more(id: &str, children: &[&str], parent: &str, depth: u32) -> Value {
    envelope(
        "more",
        json!({
            "id": id,
            "name": format!("t1_{id}"),
            "children": children,
            "count": children.len(),
            "depth": depth,
            "parent_id": parent,
        }),
    )
}

/// The "continue this thread" sentinel hanging under `parent`
pub fn continue_thread(parent: &str, depth: u32) -> Value {
    envelope(
        "more",
        json!({
            "id": "_",
            "name": "t1__",
            "children": [],
            "count": 0,
            "depth": depth,
            "parent_id": parent,
        }),
    )
}

/// The `[post listing, comment listing]` pair a comments page returns
pub fn post_with_comments(post_id: &str, comments: Vec<Value>) -> Value {
    json!([listing(vec![post(post_id)], None, None), listing(comments, None, None)])
}

/// Response body of the bulk "expand children" endpoint
pub fn more_children_response(things: Vec<Value>) -> Value {
    json!({ "json": { "errors": [], "data": { "things": things } } })
}

/// A `{json: {errors}}` envelope carrying remote errors
pub fn json_errors(errors: Vec<Value>) -> Value {
    json!({ "json": { "errors": errors } })
}

/// Successful token endpoint body
pub fn token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "scope": "*",
    })
}

/// `count` posts with ids `p{offset}`..`p{offset+count-1}`
pub fn posts(offset: usize, count: usize) -> Vec<Value> {
    (offset..offset + count).map(|i| post(&format!("p{i}"))).collect()
}
