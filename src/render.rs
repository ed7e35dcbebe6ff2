//! HTML thread view: one self-contained document with embedded styling.
//! Bodies arrive localized (plain `media_dir/<file>` path references); this
//! layer escapes text and expands those paths into `<img>`/`<video>` tags.

use crate::collect::is_video_ext;
use crate::json_utils::is_http_url;
use crate::localize::media_path_regex;
use crate::model::{Comment, MediaKind, Post};
use crate::util::create_with_backoff;
use ahash::AHashSet;
use anyhow::{Context, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::io::{BufWriter, Write};
use std::path::Path;
use time::OffsetDateTime;

const STYLE: &str = r#"
* { box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
       margin: 0; padding: 0; background: #dae0e6; color: #1c1c1c; line-height: 1.5; }
.header { background: #fff; border-bottom: 1px solid #edeff1; padding: 12px 16px; position: sticky; top: 0;
          z-index: 100; box-shadow: 0 2px 4px rgba(0,0,0,0.05); }
.header-content { max-width: 1200px; margin: 0 auto; display: flex; align-items: center; gap: 16px; }
.header h1 { margin: 0; font-size: 20px; font-weight: 700; color: #1a1a1b; }
.header-stats { color: #7c7c7c; font-size: 14px; }
.container { max-width: 1200px; margin: 0 auto; padding: 16px; }
.post { background: #fff; border: 1px solid #ccc; border-radius: 4px; margin-bottom: 16px; overflow: hidden; }
.post-header { padding: 12px 16px; border-bottom: 1px solid #edeff1; }
.post-title { font-weight: 600; font-size: 18px; color: #1a1a1b; margin: 0 0 4px 0; line-height: 1.3; }
.post-meta { font-size: 12px; color: #7c7c7c; display: flex; align-items: center; gap: 8px; flex-wrap: wrap; }
.subreddit, .post-author { font-weight: 600; color: #1a1a1b; }
.post-body { padding: 16px; white-space: pre-wrap; word-wrap: break-word; }
.post-media { padding: 0 16px 16px; }
.post-media img, .post-media video, .post-body img, .post-body video, .comment-body img, .comment-body video {
    max-width: 100%; height: auto; margin: 8px 0; border-radius: 4px; display: block; }
.comments-section { border-top: 1px solid #edeff1; }
.comment { padding: 8px 16px; }
.comment:hover { background: #f8f9fa; }
.comment-thread { border-left: 2px solid #edeff1; margin-left: 16px; padding-left: 8px; }
.comment-header { display: flex; align-items: center; gap: 8px; margin-bottom: 4px; font-size: 12px; }
.comment-author { font-weight: 600; color: #1a1a1b; }
.comment-score { color: #7c7c7c; font-weight: 600; }
.comment-score.positive { color: #ff4500; }
.comment-score.negative { color: #7193ff; }
.comment-time { color: #7c7c7c; }
.comment-body { color: #1c1c1c; margin-top: 4px; word-wrap: break-word; white-space: pre-wrap; }
.deleted-author { color: #7c7c7c; font-style: italic; }
"#;

fn escape(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

/// "3d ago"-style buckets, matching the thread-view presentation.
fn relative_time(ts: i64) -> String {
    if ts <= 0 {
        return String::new();
    }
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let diff = now - ts;
    if diff < 60 {
        return "just now".to_string();
    }
    let minutes = diff / 60;
    let hours = diff / 3600;
    let days = diff / 86_400;
    if days > 365 {
        format!("{}y ago", days / 365)
    } else if days > 0 {
        format!("{days}d ago")
    } else if hours > 0 {
        format!("{hours}h ago")
    } else {
        format!("{minutes}m ago")
    }
}

fn media_tag(path: &str) -> String {
    let ext = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("");
    if is_video_ext(ext) {
        format!(
            r#"<video controls><source src="{path}" type="video/{}">Your browser does not support the video tag.</video>"#,
            ext.to_ascii_lowercase()
        )
    } else {
        format!(r#"<img src="{path}" alt="" loading="lazy">"#)
    }
}

/// Escape a localized body and expand its media path references into tags.
fn body_html(body: &str, re: &Regex) -> String {
    let escaped = escape(body);
    re.replace_all(&escaped, |caps: &regex::Captures<'_>| media_tag(&caps[0])).into_owned()
}

fn comment_html(c: &Comment, depth: usize, re: &Regex, out: &mut String) {
    let author_html = if c.author == "[deleted]" {
        r#"<span class="deleted-author">[deleted]</span>"#.to_string()
    } else {
        format!(r#"<span class="comment-author">u/{}</span>"#, escape(&c.author))
    };
    let score_class = match c.score {
        s if s > 0 => " positive",
        s if s < 0 => " negative",
        _ => "",
    };
    if depth > 0 {
        out.push_str(r#"<div class="comment-thread">"#);
    }
    let _ = write!(
        out,
        r#"<div class="comment"><div class="comment-header">{author_html}<span class="comment-score{score_class}">{} points</span><span class="comment-time">{}</span></div><div class="comment-body">{}</div>"#,
        c.score,
        relative_time(c.created_utc),
        body_html(&c.body, re),
    );
    for reply in &c.replies {
        comment_html(reply, depth + 1, re, out);
    }
    out.push_str("</div>");
    if depth > 0 {
        out.push_str("</div>");
    }
}

/// Structured media embeds shown after the post body. Preview, thumbnail and
/// gallery media embed even when the body never mentions them; duplicates of
/// the same local file collapse to one tag.
fn post_embeds(post: &Post) -> String {
    let mut seen = AHashSet::new();
    let mut tags = String::new();
    for m in &post.media {
        let structured = matches!(
            m.kind,
            MediaKind::DirectUrl | MediaKind::Preview | MediaKind::Thumbnail | MediaKind::GalleryItem
        );
        if structured && !is_http_url(&m.url) && seen.insert(m.url.clone()) {
            tags.push_str(&media_tag(&m.url));
        }
    }
    tags
}

/// Write the full thread view document.
pub fn render_html(
    posts: &[Post],
    media_files: usize,
    out_path: &Path,
    media_dir: &str,
    write_buf: usize,
) -> Result<()> {
    let re = media_path_regex(media_dir);
    let file = create_with_backoff(out_path, 16, 50)
        .with_context(|| format!("create {}", out_path.display()))?;
    let mut w = BufWriter::with_capacity(write_buf, file);

    write!(
        w,
        "<!DOCTYPE html>\n<html>\n<head>\n<title>Reddit Thread View</title>\n\
         <meta charset=\"UTF-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <style>{STYLE}</style>\n</head>\n<body>\n\
         <div class=\"header\"><div class=\"header-content\"><h1>Reddit Thread View</h1>\
         <div class=\"header-stats\">{} posts &bull; {} media files</div></div></div>\n\
         <div class=\"container\"><div class=\"post-list\">\n",
        posts.len(),
        media_files,
    )?;

    for post in posts {
        let mut buf = String::new();
        let _ = write!(
            buf,
            r#"<div class="post"><div class="post-header"><div class="post-title">{}</div><div class="post-meta"><span class="subreddit">r/{}</span><span>&bull;</span><span class="post-author">u/{}</span><span>&bull;</span><span>{} points</span><span>&bull;</span><span>{}</span><span>&bull;</span><span>{} comments</span></div></div>"#,
            escape(&post.title),
            escape(&post.subreddit),
            escape(&post.author),
            post.score,
            relative_time(post.created_utc),
            post.comment_count(),
        );

        let _ = write!(buf, r#"<div class="post-body">{}</div>"#, body_html(&post.body, &re));
        let embeds = post_embeds(post);
        if !embeds.is_empty() {
            let _ = write!(buf, r#"<div class="post-media">{embeds}</div>"#);
        }

        buf.push_str(r#"<div class="comments-section">"#);
        for comment in &post.comments {
            comment_html(comment, 0, &re, &mut buf);
        }
        buf.push_str("</div></div>\n");
        w.write_all(buf.as_bytes())?;
    }

    w.write_all(b"</div></div>\n</body>\n</html>\n")?;
    w.flush()?;
    Ok(())
}
