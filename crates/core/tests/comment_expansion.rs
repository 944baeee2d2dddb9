//! Deferred-subtree expansion of comment trees

mod support;

use redkite_common::testing::fixtures;
use redkite_core::{ApiRequest, FetchOptions, Listing, Requester};
use redkite_domain::RedkiteError;
use serde_json::{json, Value};
use support::ScriptedRequester;

fn top_level(id: &str) -> Value {
    fixtures::comment(id, "p1", "t3_p1", json!(""))
}

fn reply(id: &str, parent: &str) -> Value {
    fixtures::comment(id, "p1", &format!("t1_{parent}"), json!(""))
}

async fn load_thread(requester: &ScriptedRequester) -> Listing {
    requester
        .request(ApiRequest::get("comments/p1"))
        .await
        .unwrap()
        .into_listing()
        .unwrap()
}

fn top_level_ids(listing: &Listing) -> Vec<String> {
    listing.comments().filter_map(|c| c.id().map(str::to_string)).collect()
}

#[tokio::test]
async fn expands_more_node_and_rebuilds_nesting() {
    let requester = ScriptedRequester::new(vec![
        fixtures::post_with_comments(
            "p1",
            vec![top_level("c1"), fixtures::more("m1", &["c2", "c3", "c4", "c5", "c6"], "t3_p1", 0)],
        ),
        fixtures::more_children_response(vec![
            top_level("c2"),
            reply("c7", "c2"),
            top_level("c3"),
            fixtures::more("m2", &["c8", "c9"], "t1_c3", 1),
            top_level("c4"),
            top_level("c5"),
            top_level("c6"),
        ]),
    ]);
    let thread = load_thread(&requester).await;
    assert_eq!(thread.more().map(|m| m.children.len()), Some(5));
    assert_eq!(thread.more().and_then(|m| m.link_id.as_deref()), Some("t3_p1"));

    let expanded = thread.fetch_more(&requester, 5).await.unwrap();
    assert_eq!(top_level_ids(&expanded), vec!["c1", "c2", "c3", "c4", "c5", "c6"]);
    assert!(expanded.more().is_none());
    assert!(expanded.is_finished());

    let c2 = expanded.find_comment("c2").unwrap();
    let c7 = c2.replies.items()[0].as_comment_key().and_then(|k| expanded.comment(k)).unwrap();
    assert_eq!(c7.id(), Some("c7"));

    let c3 = expanded.find_comment("c3").unwrap();
    let nested = c3.replies.more().unwrap();
    assert_eq!(nested.children, vec!["c8", "c9"]);
    assert_eq!(nested.link_id.as_deref(), Some("t3_p1"));

    let requests = requester.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].uri, "api/morechildren");
    assert_eq!(requests[1].query_value("children"), Some("c2,c3,c4,c5,c6"));
    assert_eq!(requests[1].query_value("link_id"), Some("t3_p1"));
    assert_eq!(requests[1].query_value("api_type"), Some("json"));

    // Nested replies render inline
    let rendered = expanded.to_json();
    assert_eq!(rendered[1]["replies"][0]["id"], "c7");
}

#[tokio::test]
async fn partial_expansion_keeps_remaining_ids() {
    let requester = ScriptedRequester::new(vec![
        fixtures::post_with_comments(
            "p1",
            vec![top_level("c1"), fixtures::more("m1", &["c2", "c3", "c4"], "t3_p1", 0)],
        ),
        fixtures::more_children_response(vec![top_level("c2")]),
    ]);
    let thread = load_thread(&requester).await;
    let expanded = thread.fetch_more(&requester, 1).await.unwrap();
    assert_eq!(top_level_ids(&expanded), vec!["c1", "c2"]);
    assert_eq!(expanded.more().map(|m| m.children.clone()), Some(vec!["c3".into(), "c4".into()]));
    assert!(!expanded.is_finished());
}

#[tokio::test]
async fn skip_replies_goes_through_info_endpoint() {
    let requester = ScriptedRequester::new(vec![
        fixtures::post_with_comments(
            "p1",
            vec![top_level("c1"), fixtures::more("m1", &["c2", "c3", "c4"], "t3_p1", 0)],
        ),
        fixtures::listing(vec![top_level("c2"), top_level("c3")], None, None),
    ]);
    let thread = load_thread(&requester).await;
    let options = FetchOptions::new(2).with_skip_replies(true);
    let expanded = thread.fetch_more(&requester, options).await.unwrap();

    assert_eq!(top_level_ids(&expanded), vec!["c1", "c2", "c3"]);
    assert_eq!(expanded.more().map(|m| m.children.len()), Some(1));
    let request = &requester.requests()[1];
    assert_eq!(request.uri, "api/info");
    assert_eq!(request.query_value("id"), Some("t1_c2,t1_c3"));
}

#[tokio::test]
async fn large_expansion_is_chunked() {
    let ids: Vec<String> = (0..45).map(|i| format!("k{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let batch = |range: std::ops::Range<usize>| {
        fixtures::more_children_response(range.map(|i| top_level(&ids[i])).collect())
    };
    let requester = ScriptedRequester::new(vec![
        fixtures::post_with_comments("p1", vec![fixtures::more("m1", &id_refs, "t3_p1", 0)]),
        batch(0..20),
        batch(20..40),
        batch(40..45),
    ]);
    let thread = load_thread(&requester).await;
    assert!(thread.is_empty());

    let all = thread.fetch_all(&requester).await.unwrap();
    assert_eq!(all.len(), 45);
    assert!(all.is_finished());

    let chunk_sizes: Vec<usize> = requester.requests()[1..]
        .iter()
        .map(|r| r.query_value("children").map_or(0, |c| c.split(',').count()))
        .collect();
    assert_eq!(chunk_sizes, vec![20, 20, 5]);
}

#[tokio::test]
async fn continue_thread_loads_permalink_page() {
    let c2_replies = fixtures::listing(vec![fixtures::continue_thread("t1_c2", 10)], None, None);
    let requester = ScriptedRequester::new(vec![
        fixtures::post_with_comments(
            "p1",
            vec![fixtures::comment("c2", "p1", "t3_p1", c2_replies)],
        ),
        fixtures::post_with_comments(
            "p1",
            vec![fixtures::comment(
                "c2",
                "p1",
                "t3_p1",
                fixtures::listing(vec![reply("c3", "c2"), reply("c4", "c2")], None, None),
            )],
        ),
    ]);
    let thread = load_thread(&requester).await;
    let c2 = thread.find_comment("c2").unwrap();
    assert!(c2.replies.more().is_some_and(|m| m.is_continue_thread()));
    assert!(!c2.replies.is_finished());

    let expanded = thread.fetch_more_replies(&requester, "c2", 10).await.unwrap();
    let c2 = expanded.find_comment("c2").unwrap();
    let reply_ids: Vec<_> = c2
        .replies
        .items()
        .iter()
        .filter_map(|item| item.as_comment_key())
        .filter_map(|key| expanded.comment(key))
        .filter_map(|c| c.id())
        .collect();
    assert_eq!(reply_ids, vec!["c3", "c4"]);
    assert!(c2.replies.more().is_none());
    assert_eq!(top_level_ids(&expanded), vec!["c2"]);

    let request = &requester.requests()[1];
    assert_eq!(request.uri, "comments/p1");
    assert_eq!(request.query_value("comment"), Some("c2"));
}

#[tokio::test]
async fn nested_more_expands_through_root() {
    let c1_replies =
        fixtures::listing(vec![fixtures::more("m1", &["r1", "r2"], "t1_c1", 1)], None, None);
    let requester = ScriptedRequester::new(vec![
        fixtures::post_with_comments(
            "p1",
            vec![fixtures::comment("c1", "p1", "t3_p1", c1_replies)],
        ),
        fixtures::more_children_response(vec![reply("r1", "c1"), reply("r2", "c1")]),
    ]);
    let thread = load_thread(&requester).await;
    let expanded = thread.fetch_more_replies(&requester, "c1", 5).await.unwrap();

    let c1 = expanded.find_comment("c1").unwrap();
    assert_eq!(c1.replies.len(), 2);
    assert!(c1.replies.is_finished());
    assert!(expanded.find_comment("r2").is_some());
    // The receiver is unchanged
    assert!(thread.find_comment("c1").unwrap().replies.is_empty());
    assert_eq!(requester.requests()[1].query_value("link_id"), Some("t3_p1"));
}

#[tokio::test]
async fn detached_reply_listing_is_rejected() {
    let c1_replies = fixtures::listing(vec![reply("r1", "c1")], None, None);
    let requester = ScriptedRequester::new(vec![fixtures::post_with_comments(
        "p1",
        vec![fixtures::comment("c1", "p1", "t3_p1", c1_replies)],
    )]);
    let thread = load_thread(&requester).await;
    let replies = thread.find_comment("c1").unwrap().replies.clone();
    let err = replies.fetch_more(&requester, 1).await.unwrap_err();
    assert!(matches!(err, RedkiteError::InvalidArgument(_)));

    let err = thread.fetch_more_replies(&requester, "nope", 1).await.unwrap_err();
    assert!(matches!(err, RedkiteError::InvalidArgument(_)));
}
