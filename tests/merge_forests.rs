#[path = "common/mod.rs"]
mod common;

use common::*;
use serde_json::json;
use std::collections::HashSet;
use threadview::{extract_line, Comment, Post, PostIndex};

fn index_lines(lines: &[String]) -> Vec<Post> {
    let mut index = PostIndex::new();
    for l in lines {
        let extracted = extract_line(l).unwrap();
        for p in extracted.posts {
            index.insert_post(p);
        }
        index.attach_comments(extracted.comments);
    }
    index.into_posts()
}

fn all_ids(comments: &[Comment]) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack: Vec<&Comment> = comments.iter().collect();
    while let Some(c) = stack.pop() {
        out.push(c.id.clone());
        stack.extend(c.replies.iter());
    }
    out
}

/// The tree as a nested (id, [children]) structure for exact comparisons.
fn shape(comments: &[Comment]) -> Vec<(String, Vec<(String, Vec<String>)>)> {
    comments
        .iter()
        .map(|c| {
            (
                c.id.clone(),
                c.replies
                    .iter()
                    .map(|r| (r.id.clone(), r.replies.iter().map(|g| g.id.clone()).collect()))
                    .collect(),
            )
        })
        .collect()
}

/// Two capture files of the same post: file A has t1_1 -> t1_2, file B has
/// t1_1 (different score) -> t1_3. The merge must produce exactly one t1_1
/// carrying both replies.
#[test]
fn same_comment_across_files_merges_replies() {
    let file_a = line(
        vec![post("t3_xyz", "Title", "body", json!({}))],
        vec![comment("t1_1", "t3_xyz", "first capture", 5, vec![
            comment("t1_2", "t3_xyz", "reply from A", 2, vec![]),
        ])],
    );
    let file_b = line(
        vec![post("t3_xyz", "Title", "body", json!({}))],
        vec![comment("t1_1", "t3_xyz", "first capture", 7, vec![
            comment("t1_3", "t3_xyz", "reply from B", 9, vec![]),
        ])],
    );

    let posts = index_lines(&[file_a, file_b]);
    assert_eq!(posts.len(), 1);
    let comments = &posts[0].comments;
    assert_eq!(comments.len(), 1, "t1_1 must not be duplicated");
    assert_eq!(comments[0].id, "t1_1");

    let reply_ids: HashSet<String> =
        comments[0].replies.iter().map(|r| r.id.clone()).collect();
    assert_eq!(reply_ids, HashSet::from(["t1_2".to_string(), "t1_3".to_string()]));

    // uniqueness invariant over the whole tree
    let ids = all_ids(comments);
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len());
}

#[test]
fn merge_is_insensitive_to_input_order() {
    let a = line(
        vec![post("t3_xyz", "Title", "body", json!({}))],
        vec![comment("t1_1", "t3_xyz", "one", 5, vec![
            comment("t1_2", "t3_xyz", "two", 2, vec![]),
        ])],
    );
    let b = line(
        vec![post("t3_xyz", "Title", "body", json!({}))],
        vec![comment("t1_1", "t3_xyz", "one", 5, vec![
            comment("t1_3", "t3_xyz", "three", 9, vec![]),
        ])],
    );
    let c = line(
        vec![post("t3_xyz", "Title", "body", json!({}))],
        vec![
            comment("t1_4", "t3_xyz", "four", 1, vec![]),
            comment("t1_1", "t3_xyz", "one", 5, vec![
                comment("t1_2", "t3_xyz", "two", 2, vec![
                    comment("t1_5", "t3_xyz", "five", 3, vec![]),
                ]),
            ]),
        ],
    );

    let orders: [[&String; 3]; 6] = {
        // all permutations of [a, b, c]
        [
            [&a, &b, &c], [&a, &c, &b], [&b, &a, &c],
            [&b, &c, &a], [&c, &a, &b], [&c, &b, &a],
        ]
    };

    let mut shapes = Vec::new();
    for order in orders {
        let lines: Vec<String> = order.iter().map(|s| (*s).clone()).collect();
        let posts = index_lines(&lines);
        assert_eq!(posts.len(), 1);
        shapes.push(shape(&posts[0].comments));
    }
    for s in &shapes[1..] {
        assert_eq!(s, &shapes[0], "merge result depends on input order");
    }
}

#[test]
fn siblings_sort_by_score_then_recency() {
    let l = line(
        vec![post("t3_xyz", "Title", "", json!({}))],
        vec![
            comment("t1_low", "t3_xyz", "low", 1, vec![]),
            comment("t1_high", "t3_xyz", "high", 10, vec![]),
            comment("t1_mid", "t3_xyz", "mid", 5, vec![]),
        ],
    );
    let posts = index_lines(&[l]);
    let top_ids: Vec<&str> = posts[0].comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(top_ids, vec!["t1_high", "t1_mid", "t1_low"]);
}

#[test]
fn most_complete_body_wins_regardless_of_order() {
    let sparse = line(
        vec![post("t3_xyz", "Title", "", json!({}))],
        vec![comment("t1_1", "t3_xyz", "[unavailable]", 0, vec![])],
    );
    let full = line(
        vec![post("t3_xyz", "Title", "", json!({}))],
        vec![comment("t1_1", "t3_xyz", "actual text", 4, vec![])],
    );

    for lines in [[sparse.clone(), full.clone()], [full, sparse]] {
        let posts = index_lines(&lines);
        assert_eq!(posts[0].comments[0].body, "actual text");
    }
}

#[test]
fn conflicting_post_association_keeps_first() {
    let first = line(
        vec![post("t3_aaa", "A", "", json!({}))],
        vec![comment("t1_dup", "t3_aaa", "belongs to A", 1, vec![])],
    );
    let second = line(
        vec![post("t3_bbb", "B", "", json!({}))],
        vec![comment("t1_dup", "t3_bbb", "claims B", 1, vec![])],
    );

    let posts = index_lines(&[first, second]);
    let a = posts.iter().find(|p| p.id == "t3_aaa").unwrap();
    let b = posts.iter().find(|p| p.id == "t3_bbb").unwrap();
    assert_eq!(a.comments.len(), 1);
    assert!(b.comments.is_empty(), "first-seen association must win");
}

#[test]
fn duplicate_posts_keep_longer_body() {
    let short = line(vec![post("t3_xyz", "Title", "short", json!({}))], vec![]);
    let long = line(vec![post("t3_xyz", "Title", "much longer selftext", json!({}))], vec![]);
    let posts = index_lines(&[short, long]);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].body, "much longer selftext");
}
