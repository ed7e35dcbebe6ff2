use std::path::PathBuf;

/// Where a media reference was discovered on its owning entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// `url` / `url_overridden_by_dest` field that looks like media.
    DirectUrl,
    /// `preview.images[]` source or variant.
    Preview,
    /// `thumbnail` field.
    Thumbnail,
    /// One entry of `gallery_data` joined through `media_metadata`.
    GalleryItem,
    /// `giphy|<ID>` marker in body text, canonicalized to the Giphy CDN URL.
    Giphy,
    /// Plain media URL found by scanning body text.
    Embedded,
}

/// A single media reference attributed to one post or comment.
/// `url` is canonical: HTML entities decoded, directly fetchable.
/// Multiple references (even across entities) may share the same URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaReference {
    pub url: String,
    pub kind: MediaKind,
}

impl MediaReference {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self { url: url.into(), kind }
    }
}

/// Outcome of a download attempt for one unique URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadStatus {
    Succeeded,
    Failed,
}

/// Per-unique-URL record kept by the fetcher for the whole run.
/// Created when first referenced, finalized after the download attempt,
/// never removed.
#[derive(Clone, Debug)]
pub struct MediaRecord {
    pub url: String,
    /// File name under the media directory (hash-of-URL + extension).
    /// `None` when the download failed before a name could be settled.
    pub local_name: Option<String>,
    pub status: DownloadStatus,
}

/// One comment node. Forms a tree rooted at its post; children live in
/// `replies`, the parent is referenced by id only.
#[derive(Clone, Debug)]
pub struct Comment {
    /// Fullname, e.g. `t1_abc`. Unique within a merged tree.
    pub id: String,
    /// Fullname of the owning post (`t3_...`), from `link_id` when present.
    pub post_id: String,
    pub author: String,
    pub body: String,
    pub score: i64,
    pub created_utc: i64,
    pub media: Vec<MediaReference>,
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Number of comments in this subtree, self included.
    pub fn tree_len(&self) -> usize {
        let mut n = 0usize;
        let mut stack = vec![self];
        while let Some(c) = stack.pop() {
            n += 1;
            stack.extend(c.replies.iter());
        }
        n
    }
}

/// One post with its merged comment forest.
#[derive(Clone, Debug)]
pub struct Post {
    /// Fullname, e.g. `t3_abc`. Immutable for the lifetime of the run.
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub subreddit: String,
    pub created_utc: i64,
    pub media: Vec<MediaReference>,
    pub comments: Vec<Comment>,
}

impl Post {
    /// Total number of comments across the whole forest.
    pub fn comment_count(&self) -> usize {
        self.comments.iter().map(Comment::tree_len).sum()
    }
}

/// What a finished run produced. Returned by `ThreadView::run`.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub posts: usize,
    pub comments: usize,
    pub media_unique: usize,
    pub media_downloaded: usize,
    pub media_failed: usize,
    pub html_path: PathBuf,
    pub jsonl_path: PathBuf,
}
