//! Media reference collection: walk an entity's structured fields first, then
//! scan its body text. Discovery order is preserved (gallery order matters),
//! duplicates within one entity collapse to the first occurrence.

use crate::json_utils::{decode_url, get_str, is_http_url};
use crate::model::{MediaKind, MediaReference};
use ahash::AHashSet;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Image extensions we recognize in URLs and local media paths.
pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico"];
/// Video extensions, rendered with `<video>` instead of `<img>`.
pub const VIDEO_EXTS: &[&str] = &["mp4", "webm", "avi", "mov", "wmv", "flv", "m4v", "mpg", "mpeg"];

pub fn is_video_ext(ext: &str) -> bool {
    VIDEO_EXTS.iter().any(|e| ext.eq_ignore_ascii_case(e))
}

/// Hosts and extensions that mark a direct `url` field as media rather than
/// an article/self link.
fn looks_like_media_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["redd.it", "imgur.com", ".jpg", ".jpeg", ".png", ".gif", ".webp", ".mp4", ".webm"]
        .iter()
        .any(|m| lower.contains(m))
}

fn text_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?i)https?://(?:preview\.|i\.|v\.)?redd\.it/[^\s<>")\]]+"#,
            r#"(?i)https?://[^\s<>")\]]+\.(?:jpg|jpeg|png|gif|webp|svg|bmp|ico)"#,
            r#"(?i)https?://[^\s<>")\]]+\.(?:mp4|avi|mov|wmv|flv|webm|m4v|mpg|mpeg)"#,
            r#"(?i)https?://(?:i\.)?imgur\.com/[^\s<>")\]]+"#,
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn giphy_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"giphy\|([A-Za-z0-9]+)").unwrap())
}

/// Canonical Giphy-served URL for a short ID.
pub fn giphy_media_url(id: &str) -> String {
    format!("https://media.giphy.com/media/{id}/giphy.gif")
}

/// Discovery-ordered, per-entity-deduplicated reference accumulator.
struct RefSink {
    seen: AHashSet<String>,
    refs: Vec<MediaReference>,
}

impl RefSink {
    fn new() -> Self {
        Self { seen: AHashSet::new(), refs: Vec::new() }
    }

    fn push(&mut self, raw_url: &str, kind: MediaKind) {
        let url = decode_url(raw_url.trim());
        if url.is_empty() || !self.seen.insert(url.clone()) {
            return;
        }
        self.refs.push(MediaReference::new(url, kind));
    }

    fn into_refs(self) -> Vec<MediaReference> {
        self.refs
    }
}

/// All media references of a `t3` post's raw data, structured fields first.
pub fn collect_post_media(data: &Value) -> Vec<MediaReference> {
    let mut sink = RefSink::new();

    // 1. Direct URL fields, when they look like media.
    for key in ["url", "url_overridden_by_dest"] {
        if let Some(url) = get_str(data, key) {
            if is_http_url(url) && looks_like_media_url(url) {
                sink.push(url, MediaKind::DirectUrl);
            }
        }
    }

    // 2. Preview images: source plus every variant. Always collected —
    //    preview media embeds even when the body never mentions it.
    if let Some(images) = data.pointer("/preview/images").and_then(|v| v.as_array()) {
        for img in images {
            if let Some(src) = img.pointer("/source/url").and_then(|v| v.as_str()) {
                if is_http_url(src) {
                    sink.push(src, MediaKind::Preview);
                }
            }
            if let Some(variants) = img.get("variants").and_then(|v| v.as_object()) {
                for variant in variants.values() {
                    if let Some(src) = variant.pointer("/source/url").and_then(|v| v.as_str()) {
                        if is_http_url(src) {
                            sink.push(src, MediaKind::Preview);
                        }
                    }
                }
            }
        }
    }

    // 3. Thumbnail. Reddit uses placeholders ("self", "default", "nsfw")
    //    for non-URL values; only real URLs count.
    if let Some(thumb) = get_str(data, "thumbnail") {
        if is_http_url(thumb) {
            sink.push(thumb, MediaKind::Thumbnail);
        }
    }

    // 4. Gallery items, in gallery_data order, joined through media_metadata.
    //    Animated items expose gif/mp4 instead of u.
    if let (Some(items), Some(metadata)) = (
        data.pointer("/gallery_data/items").and_then(|v| v.as_array()),
        data.get("media_metadata"),
    ) {
        for item in items {
            let Some(media_id) = get_str(item, "media_id") else { continue };
            let Some(entry) = metadata.get(media_id).and_then(|m| m.get("s")) else { continue };
            let url = get_str(entry, "u")
                .or_else(|| get_str(entry, "gif"))
                .or_else(|| get_str(entry, "mp4"));
            if let Some(url) = url {
                if is_http_url(url) {
                    sink.push(url, MediaKind::GalleryItem);
                }
            }
        }
    }

    // 5. Free-text scan of the selftext body.
    if let Some(body) = get_str(data, "selftext") {
        scan_text(body, &mut sink);
    }

    sink.into_refs()
}

/// Media references of a `t1` comment: body text only.
pub fn collect_comment_media(data: &Value) -> Vec<MediaReference> {
    let mut sink = RefSink::new();
    if let Some(body) = get_str(data, "body") {
        scan_text(body, &mut sink);
    }
    sink.into_refs()
}

fn scan_text(text: &str, sink: &mut RefSink) {
    if text.contains("http") {
        for re in text_patterns() {
            for m in re.find_iter(text) {
                let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
                sink.push(url, MediaKind::Embedded);
            }
        }
    }
    if text.contains("giphy|") {
        for caps in giphy_marker_re().captures_iter(text) {
            sink.push(&giphy_media_url(&caps[1]), MediaKind::Giphy);
        }
    }
}
