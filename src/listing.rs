//! Listing extraction: one capture line is expected to be a 2-element JSON
//! array `[posts Listing, comments Listing]` in the Reddit API shape. The
//! shapes are polymorphic and frequently partial, so everything here is
//! permissive: unknown kinds are skipped, malformed children are logged and
//! skipped, and absence of a listing terminates quietly.

use crate::collect;
use crate::json_utils::{fullname, get_i64, get_str, str_or};
use crate::model::{Comment, Post};
use anyhow::{anyhow, Result};
use serde_json::Value;

/// One Reddit API "thing", discriminated by its `kind` tag.
/// Borrowed view over the raw JSON; `data` payloads stay untyped because the
/// field sets differ per capture vintage.
#[derive(Clone, Copy, Debug)]
pub enum Thing<'a> {
    /// `kind == "Listing"`, payload is `data` (with `children`).
    Listing(&'a Value),
    /// `kind == "t3"`, payload is the post `data`.
    Post(&'a Value),
    /// `kind == "t1"`, payload is the comment `data`.
    Comment(&'a Value),
    /// `kind == "more"` — truncation stub, carries no content.
    More,
    /// Anything else (`t2`, `t4`, future kinds). Skipped, never fatal.
    Unknown,
}

impl<'a> Thing<'a> {
    pub fn classify(v: &'a Value) -> Thing<'a> {
        static NULL: Value = Value::Null;
        let data = v.get("data").unwrap_or(&NULL);
        match get_str(v, "kind") {
            Some("Listing") => Thing::Listing(data),
            Some("t3") => Thing::Post(data),
            Some("t1") => Thing::Comment(data),
            Some("more") => Thing::More,
            Some(other) => {
                tracing::debug!(kind = other, "skipping child of unknown kind");
                Thing::Unknown
            }
            None => Thing::Unknown,
        }
    }
}

/// The `children` array of a Listing `data` payload, or empty when the shape
/// is off (replies are sometimes the empty string instead of a Listing).
fn listing_children(listing_data: &Value) -> &[Value] {
    listing_data
        .get("children")
        .and_then(|c| c.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Children of a value that *should* be a Listing thing (e.g. the `replies`
/// field). Non-Listing shapes yield no children.
fn children_of_listing_thing(v: &Value) -> &[Value] {
    match Thing::classify(v) {
        Thing::Listing(data) => listing_children(data),
        _ => &[],
    }
}

/// Result of extracting one capture line: the line's posts (comment lists
/// empty at this point) and its top-level comments with replies nested.
#[derive(Debug, Default)]
pub struct ExtractedLine {
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
}

/// Extract one capture line. Errors only on lines that are not a JSON array
/// holding at least a posts Listing; individual malformed children are
/// skipped with a log line instead.
pub fn extract_line(line: &str) -> Result<ExtractedLine> {
    let elements: Vec<Value> =
        serde_json::from_str(line).map_err(|e| anyhow!("invalid JSON line: {e}"))?;
    if elements.is_empty() {
        return Err(anyhow!("line is an empty array, expected [posts, comments]"));
    }

    let mut out = ExtractedLine::default();

    match Thing::classify(&elements[0]) {
        Thing::Listing(data) => {
            for child in listing_children(data) {
                if let Thing::Post(post_data) = Thing::classify(child) {
                    match post_from_data(post_data) {
                        Some(post) => out.posts.push(post),
                        None => tracing::warn!("skipping t3 child without a fullname"),
                    }
                }
            }
        }
        _ => return Err(anyhow!("first element is not a posts Listing")),
    }

    if let Some(comments_el) = elements.get(1) {
        for child in children_of_listing_thing(comments_el) {
            if let Thing::Comment(comment_data) = Thing::classify(child) {
                if let Some(c) = comment_from_data(comment_data) {
                    out.comments.push(c);
                }
            }
        }
    }

    // Comments without a link_id inherit the line's post. A line with several
    // posts keeps the first as the home for unattributed comments.
    if let Some(first_post_id) = out.posts.first().map(|p| p.id.clone()) {
        for c in &mut out.comments {
            if c.post_id.is_empty() {
                set_post_id_deep(c, &first_post_id);
            }
        }
    } else {
        let before = out.comments.len();
        out.comments.retain(|c| !c.post_id.is_empty());
        if out.comments.len() < before {
            tracing::warn!(
                dropped = before - out.comments.len(),
                "comments with no link_id on a line without posts; dropping"
            );
        }
    }

    Ok(out)
}

fn set_post_id_deep(c: &mut Comment, post_id: &str) {
    let mut stack = vec![c];
    while let Some(node) = stack.pop() {
        if node.post_id.is_empty() {
            node.post_id = post_id.to_string();
        }
        stack.extend(node.replies.iter_mut());
    }
}

fn post_from_data(data: &Value) -> Option<Post> {
    let id = fullname(data)?.to_string();
    Some(Post {
        id,
        title: str_or(data, "title", "Untitled").to_string(),
        body: get_str(data, "selftext").unwrap_or("").to_string(),
        author: str_or(data, "author", "[deleted]").to_string(),
        score: get_i64(data, "score").unwrap_or(0),
        subreddit: get_str(data, "subreddit").unwrap_or("").to_string(),
        created_utc: get_i64(data, "created_utc").unwrap_or(0),
        media: collect::collect_post_media(data),
        comments: Vec::new(),
    })
}

/// Build one comment and its nested replies. Depth is bounded by the JSON
/// parser's own recursion limit, so plain recursion over `replies` is safe.
fn comment_from_data(data: &Value) -> Option<Comment> {
    let id = fullname(data)?.to_string();

    let mut replies = Vec::new();
    if let Some(replies_val) = data.get("replies") {
        for child in children_of_listing_thing(replies_val) {
            if let Thing::Comment(reply_data) = Thing::classify(child) {
                if let Some(reply) = comment_from_data(reply_data) {
                    replies.push(reply);
                }
            }
        }
    }

    Some(Comment {
        id,
        post_id: get_str(data, "link_id").unwrap_or("").to_string(),
        author: str_or(data, "author", "[deleted]").to_string(),
        body: get_str(data, "body").unwrap_or("").to_string(),
        score: get_i64(data, "score").unwrap_or(0),
        created_utc: get_i64(data, "created_utc").unwrap_or(0),
        media: collect::collect_comment_media(data),
        replies,
    })
}
