//! Localization: rewrite bodies and structured media references to point at
//! downloaded files. Rewritten text carries plain `media_dir/<file>` paths —
//! the HTML layer turns those into tags and the export layer into paths or
//! placeholders — so running localization twice changes nothing.

use crate::collect::giphy_media_url;
use crate::fetch::MediaMap;
use crate::json_utils::is_http_url;
use crate::model::{Comment, MediaKind, MediaReference, Post};
use regex::Regex;
use std::sync::OnceLock;

/// Matches the `media_dir/<hash>.<ext>` references this module writes into
/// bodies. Shared by the HTML layer (tag expansion) and the export layer
/// (placeholder substitution).
pub(crate) fn media_path_regex(media_dir: &str) -> Regex {
    let exts: Vec<&str> = crate::collect::IMAGE_EXTS
        .iter()
        .chain(crate::collect::VIDEO_EXTS)
        .copied()
        .collect();
    let pattern = format!(
        r"(?i){}/[0-9a-f]{{16}}\.(?:{})",
        regex::escape(media_dir),
        exts.join("|")
    );
    // Fixed template plus an escaped directory name; compilation can't fail
    // on user input.
    Regex::new(&pattern).unwrap()
}

/// Matches both marker spellings: `![gif](giphy|ID)` and bare `giphy|ID`.
fn giphy_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"!\[gif\]\(giphy\|([A-Za-z0-9]+)\)|giphy\|([A-Za-z0-9]+)").unwrap()
    })
}

/// Rewrite one body: Giphy markers become a local path (or the remote Giphy
/// URL when the download failed — markers are never left behind), and every
/// successfully downloaded URL is substituted in both its canonical and
/// entity-escaped spellings. URLs that failed to download stay as remote
/// text.
pub fn rewrite_body(text: &str, media: &MediaMap, media_dir: &str) -> String {
    let mut out = text.to_string();

    if out.contains("giphy|") {
        out = giphy_marker_re()
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                let id = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
                let url = giphy_media_url(id);
                match media.local_name(&url) {
                    Some(name) => format!("{media_dir}/{name}"),
                    None => url,
                }
            })
            .into_owned();
    }

    if out.contains("http") {
        // Longest URL first, so a URL that prefixes another (same image with
        // and without query parameters) can't clobber the longer match.
        let mut resolved: Vec<(&str, &str)> = media.succeeded().collect();
        resolved.sort_by_key(|(url, _)| std::cmp::Reverse(url.len()));
        for (url, name) in resolved {
            let local = format!("{media_dir}/{name}");
            if out.contains(url) {
                out = out.replace(url, &local);
            }
            // Reddit bodies sometimes carry the entity-escaped spelling.
            let escaped = url.replace('&', "&amp;");
            if escaped != url && out.contains(&escaped) {
                out = out.replace(&escaped, &local);
            }
        }
    }

    out
}

/// Rewrite an entity's structured reference list in place:
/// - already-local references are left untouched (idempotence),
/// - downloaded references point at their local path,
/// - failed Giphy references keep the remote URL (explicit fallback),
/// - other failed references are dropped.
fn rewrite_refs(refs: &mut Vec<MediaReference>, media: &MediaMap, media_dir: &str) {
    refs.retain_mut(|r| {
        if !is_http_url(&r.url) {
            return true;
        }
        match media.local_name(&r.url) {
            Some(name) => {
                r.url = format!("{media_dir}/{name}");
                true
            }
            None => r.kind == MediaKind::Giphy,
        }
    });
}

/// Localize a post and its whole comment forest.
pub fn localize_post(post: &mut Post, media: &MediaMap, media_dir: &str) {
    post.body = rewrite_body(&post.body, media, media_dir);
    rewrite_refs(&mut post.media, media, media_dir);

    let mut stack: Vec<&mut Comment> = post.comments.iter_mut().collect();
    while let Some(c) = stack.pop() {
        c.body = rewrite_body(&c.body, media, media_dir);
        rewrite_refs(&mut c.media, media, media_dir);
        stack.extend(c.replies.iter_mut());
    }
}
