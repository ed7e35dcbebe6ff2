//! Training export: one JSON line per post, comment trees nested, bodies
//! cleaned of markup. Media references are either literal local paths or
//! `[media]` placeholders depending on the configured mode; remote fallback
//! URLs (failed Giphy downloads) stay resolvable in both modes.

use crate::config::ExportMode;
use crate::localize::media_path_regex;
use crate::model::{Comment, Post};
use crate::ndjson::NdjsonWriter;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Serialize)]
struct ExportComment<'a> {
    id: &'a str,
    author: &'a str,
    body: String,
    score: i64,
    created_at: i64,
    replies: Vec<ExportComment<'a>>,
}

#[derive(Serialize)]
struct ExportPost<'a> {
    id: &'a str,
    title: String,
    author: &'a str,
    body: String,
    score: i64,
    created_at: i64,
    subreddit: &'a str,
    comment_count: usize,
    comments: Vec<ExportComment<'a>>,
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

struct Cleaner {
    mode: ExportMode,
    media_re: Regex,
}

impl Cleaner {
    fn new(mode: ExportMode, media_dir: &str) -> Self {
        Self { mode, media_re: media_path_regex(media_dir) }
    }

    /// Strip any residual markup, decode entities, and apply the export mode
    /// to local media paths. Remote URLs are left untouched.
    fn clean(&self, text: &str) -> String {
        let mut t = if text.contains('<') {
            tag_re().replace_all(text, "").into_owned()
        } else {
            text.to_string()
        };
        t = html_escape::decode_html_entities(&t).into_owned();
        if self.mode == ExportMode::Placeholders {
            t = self.media_re.replace_all(&t, "[media]").into_owned();
        }
        t.trim().to_string()
    }
}

fn export_comment<'a>(c: &'a Comment, cleaner: &Cleaner) -> ExportComment<'a> {
    ExportComment {
        id: &c.id,
        author: &c.author,
        body: cleaner.clean(&c.body),
        score: c.score,
        created_at: c.created_utc,
        replies: c.replies.iter().map(|r| export_comment(r, cleaner)).collect(),
    }
}

/// Write the cleaned JSONL, one post per line, via a temp file promoted
/// atomically so a crash never leaves a half-written export behind.
pub fn export_jsonl(
    posts: &[Post],
    out_path: &Path,
    mode: ExportMode,
    media_dir: &str,
    write_buf: usize,
) -> Result<u64> {
    let cleaner = Cleaner::new(mode, media_dir);
    let tmp = out_path.with_extension("jsonl.inprogress");
    let mut w = NdjsonWriter::create(&tmp, write_buf)
        .with_context(|| format!("create {}", tmp.display()))?;

    let mut written = 0u64;
    for post in posts {
        let record = ExportPost {
            id: &post.id,
            title: cleaner.clean(&post.title),
            author: &post.author,
            body: cleaner.clean(&post.body),
            score: post.score,
            created_at: post.created_utc,
            subreddit: &post.subreddit,
            comment_count: post.comment_count(),
            comments: post.comments.iter().map(|c| export_comment(c, &cleaner)).collect(),
        };
        let line = serde_json::to_string(&record)
            .with_context(|| format!("serialize post {}", post.id))?;
        w.write_line(&line)?;
        written += 1;
    }

    w.finish_atomic(out_path)?;
    Ok(written)
}
