//! Comment-forest merging across independently captured files. The merge is
//! a keyed union over comment ids: an arena of nodes plus ordered child-id
//! edges, absorbed and rebuilt with explicit stacks so capture depth never
//! becomes call-stack depth. Keyed union makes the merge associative and
//! commutative; the deterministic sibling sort makes it order-insensitive in
//! the byte-for-byte sense as well.

use crate::model::{Comment, MediaReference, Post};
use ahash::AHashMap;
use std::collections::hash_map::Entry;

fn body_unavailable(body: &str) -> bool {
    matches!(body, "" | "[unavailable]" | "[deleted]" | "[removed]")
}

/// Fold `src` into `dst` for two captures of the same comment: the more
/// complete body (and its sibling scalars) wins, media references union in
/// discovery order. Replies are handled by the arena, not here.
fn merge_comment_scalars(dst: &mut Comment, src: Comment) {
    if body_unavailable(&dst.body) && !body_unavailable(&src.body) {
        dst.body = src.body;
        dst.author = src.author;
        dst.score = src.score;
        dst.created_utc = src.created_utc;
    }
    merge_media(&mut dst.media, src.media);
}

fn merge_media(dst: &mut Vec<MediaReference>, src: Vec<MediaReference>) {
    for m in src {
        if !dst.contains(&m) {
            dst.push(m);
        }
    }
}

/// Arena-backed forest for one post while captures are still being absorbed.
#[derive(Debug, Default)]
struct Forest {
    nodes: AHashMap<String, Comment>,
    children: AHashMap<String, Vec<String>>,
    roots: Vec<String>,
}

impl Forest {
    /// Absorb one captured forest. First-seen tree position wins: a comment
    /// already known keeps its place and only merges content; its replies
    /// continue down the worklist either way. A comment first seen under a
    /// different post is an inconsistent capture: warn and skip it together
    /// with its subtree, keeping the first association.
    fn absorb(&mut self, forest: Vec<Comment>, post_id: &str, assoc: &mut AHashMap<String, String>) {
        let mut work: Vec<(Option<String>, Comment)> =
            forest.into_iter().rev().map(|c| (None, c)).collect();

        while let Some((parent, mut comment)) = work.pop() {
            match assoc.entry(comment.id.clone()) {
                Entry::Occupied(e) if e.get().as_str() != post_id => {
                    tracing::warn!(
                        comment = %comment.id,
                        first = %e.get(),
                        conflicting = %post_id,
                        "comment associated with two posts; keeping first association"
                    );
                    continue;
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(e) => {
                    e.insert(post_id.to_string());
                }
            }

            let replies = std::mem::take(&mut comment.replies);
            let id = comment.id.clone();

            match self.nodes.entry(id.clone()) {
                Entry::Occupied(mut e) => {
                    merge_comment_scalars(e.get_mut(), comment);
                }
                Entry::Vacant(e) => {
                    e.insert(comment);
                    match &parent {
                        Some(p) => self.children.entry(p.clone()).or_default().push(id.clone()),
                        None => self.roots.push(id.clone()),
                    }
                }
            }

            for reply in replies.into_iter().rev() {
                work.push((Some(id.clone()), reply));
            }
        }
    }

    /// Rebuild the nested forest. Sibling lists are sorted by
    /// (score desc, created desc, id) so the result is identical no matter
    /// what order the captures arrived in.
    fn into_comments(mut self) -> Vec<Comment> {
        let sort_ids = |ids: &mut Vec<String>, nodes: &AHashMap<String, Comment>| {
            ids.sort_by_cached_key(|id| {
                let (score, created) =
                    nodes.get(id).map(|c| (c.score, c.created_utc)).unwrap_or((0, 0));
                (std::cmp::Reverse(score), std::cmp::Reverse(created), id.clone())
            });
        };
        sort_ids(&mut self.roots, &self.nodes);
        let ids: Vec<String> = self.children.keys().cloned().collect();
        for id in ids {
            let mut list = self.children.remove(&id).unwrap_or_default();
            sort_ids(&mut list, &self.nodes);
            self.children.insert(id, list);
        }

        enum Frame {
            Enter(String),
            Exit(String),
        }

        let mut built: AHashMap<String, Comment> = AHashMap::with_capacity(self.nodes.len());
        let mut stack: Vec<Frame> = self.roots.iter().rev().cloned().map(Frame::Enter).collect();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    stack.push(Frame::Exit(id.clone()));
                    if let Some(kids) = self.children.get(&id) {
                        for k in kids.iter().rev() {
                            stack.push(Frame::Enter(k.clone()));
                        }
                    }
                }
                Frame::Exit(id) => {
                    let Some(mut node) = self.nodes.remove(&id) else { continue };
                    if let Some(kids) = self.children.remove(&id) {
                        for k in kids {
                            if let Some(child) = built.remove(&k) {
                                node.replies.push(child);
                            }
                        }
                    }
                    built.insert(id, node);
                }
            }
        }

        self.roots.iter().filter_map(|r| built.remove(r)).collect()
    }
}

/// Accumulates posts and their comment forests across all input files for
/// one run. Post order is first-seen; comment→post associations are policed
/// here (first association wins, mismatches warn).
#[derive(Debug, Default)]
pub struct PostIndex {
    entries: AHashMap<String, (Post, Forest)>,
    order: Vec<String>,
    /// comment id → the post id it was first seen under.
    assoc: AHashMap<String, String>,
    /// forests whose post hasn't been seen yet, keyed by post id.
    pending: AHashMap<String, Vec<Comment>>,
}

impl PostIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or merge a post record. The comment list must still be empty;
    /// forests arrive through `attach_forest`. On a duplicate id the longer
    /// body wins and media references union.
    pub fn insert_post(&mut self, post: Post) {
        debug_assert!(post.comments.is_empty(), "forests are attached separately");
        let id = post.id.clone();
        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut e) => {
                let existing = &mut e.get_mut().0;
                if post.body.len() > existing.body.len() {
                    existing.body = post.body;
                }
                merge_media(&mut existing.media, post.media);
            }
            Entry::Vacant(e) => {
                e.insert((post, Forest::default()));
                self.order.push(id.clone());
            }
        }
        if let Some(parked) = self.pending.remove(&id) {
            self.attach_forest(&id, parked);
        }
    }

    /// Merge one captured forest into the post's arena, or park it until the
    /// post shows up. Association policing happens inside the absorb.
    pub fn attach_forest(&mut self, post_id: &str, forest: Vec<Comment>) {
        if forest.is_empty() {
            return;
        }
        match self.entries.get_mut(post_id) {
            Some((_, forest_acc)) => forest_acc.absorb(forest, post_id, &mut self.assoc),
            None => self.pending.entry(post_id.to_string()).or_default().extend(forest),
        }
    }

    /// Route an extracted line's comments to their posts by `post_id`.
    pub fn attach_comments(&mut self, comments: Vec<Comment>) {
        let mut by_post: AHashMap<String, Vec<Comment>> = AHashMap::new();
        for c in comments {
            by_post.entry(c.post_id.clone()).or_default().push(c);
        }
        for (post_id, forest) in by_post {
            self.attach_forest(&post_id, forest);
        }
    }

    /// Finalize: rebuild every forest into its post, in first-seen post order.
    pub fn into_posts(mut self) -> Vec<Post> {
        if !self.pending.is_empty() {
            tracing::warn!(
                posts = self.pending.len(),
                "dropping comments whose post never appeared in any input"
            );
        }
        let mut posts = Vec::with_capacity(self.order.len());
        for id in &self.order {
            let Some((mut post, forest)) = self.entries.remove(id) else { continue };
            post.comments = forest.into_comments();
            posts.push(post);
        }
        posts
    }
}
