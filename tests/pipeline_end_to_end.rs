#[path = "common/mod.rs"]
mod common;

use common::*;
use serde_json::{json, Value};
use std::fs;
use std::time::Duration;
use threadview::{giphy_media_url, url_hash, ExportMode, ThreadView};

const PREVIEW_ESCAPED: &str = "https://preview.redd.it/img1.jpg?width=640&amp;s=abc";
const PREVIEW: &str = "https://preview.redd.it/img1.jpg?width=640&s=abc";
const INLINE: &str = "https://i.redd.it/inline.png";

/// Two capture files for the same post, plus a malformed line and a second
/// distinct post arriving compressed. Exercises extraction, merging, media
/// download with one failure, localization, rendering and export in one go.
#[test]
fn full_pipeline_over_two_files() {
    let base = tempfile::tempdir().unwrap();
    let input_dir = base.path().join("captures");
    let out_dir = base.path().join("out");

    // File A: post with preview media not mentioned in the body, one comment
    // thread, and a trailing malformed line that must not abort the file.
    let post_a = post(
        "t3_xyz",
        "Look at this",
        &format!("inline image {INLINE} here"),
        json!({"preview": {"images": [{"source": {"url": PREVIEW_ESCAPED}}]}}),
    );
    let line_a = line(
        vec![post_a],
        vec![comment("t1_1", "t3_xyz", "top comment", 5, vec![
            comment("t1_2", "t3_xyz", "reply from A", 2, vec![]),
        ])],
    );
    write_jsonl(
        &input_dir.join("capture_a.jsonl"),
        &[line_a, "{definitely not json".to_string()],
    );

    // File B: same post captured again — same t1_1, new reply, plus a comment
    // with a Giphy marker whose download will fail.
    let line_b = line(
        vec![post("t3_xyz", "Look at this", "", json!({}))],
        vec![
            comment("t1_1", "t3_xyz", "top comment", 5, vec![
                comment("t1_3", "t3_xyz", "reply from B", 9, vec![]),
            ]),
            comment("t1_4", "t3_xyz", "have a gif ![gif](giphy|LOLcat1)", 1, vec![]),
        ],
    );
    // Second, unrelated post in a zstd-compressed capture.
    let line_c = line(vec![post("t3_other", "Other thread", "plain text", json!({}))], vec![]);
    write_jsonl_zst(&input_dir.join("capture_b.jsonl.zst"), &[line_b, line_c]);

    let stub = StubTransport::new()
        .serve(PREVIEW, b"preview-bytes", Some("image/jpeg"))
        .serve(INLINE, b"inline-bytes", Some("image/png"));
    // giphy URL is not registered: fails after retries

    let summary = ThreadView::new()
        .input(&input_dir)
        .output_dir(&out_dir)
        .retry(2, Duration::from_millis(1))
        .workers(4)
        .progress(false)
        .run_with_transport(&stub)
        .unwrap();

    assert_eq!(summary.posts, 2);
    assert_eq!(summary.comments, 4, "t1_1 + t1_2 + t1_3 + t1_4, no duplicates");
    assert_eq!(summary.media_unique, 3);
    assert_eq!(summary.media_downloaded, 2);
    assert_eq!(summary.media_failed, 1);

    // Media files landed under out/media with hash-derived names.
    let preview_name = format!("{}.jpg", url_hash(PREVIEW));
    let inline_name = format!("{}.png", url_hash(INLINE));
    assert!(out_dir.join("media").join(&preview_name).exists());
    assert!(out_dir.join("media").join(&inline_name).exists());

    // HTML embeds the preview even though the body never mentioned it, and no
    // remote spelling of a downloaded URL survives.
    let html = fs::read_to_string(&summary.html_path).unwrap();
    assert!(html.contains(&format!(r#"<img src="media/{preview_name}""#)));
    assert!(html.contains(&format!(r#"<img src="media/{inline_name}""#)));
    assert!(!html.contains("preview.redd.it"));
    assert!(!html.contains(INLINE));

    // Export: one line per post, merged comment tree, Giphy fallback intact.
    let jsonl = fs::read_to_string(&summary.jsonl_path).unwrap();
    let records: Vec<Value> =
        jsonl.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records.len(), 2);

    let xyz = records.iter().find(|r| r["id"] == "t3_xyz").unwrap();
    assert_eq!(xyz["comment_count"], 4);
    assert_eq!(xyz["body"].as_str().unwrap(), format!("inline image media/{inline_name} here"));

    let comments = xyz["comments"].as_array().unwrap();
    let t1_1 = comments.iter().find(|c| c["id"] == "t1_1").unwrap();
    let reply_ids: Vec<&str> = t1_1["replies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(reply_ids, vec!["t1_3", "t1_2"], "merged replies, score-descending");

    let t1_4 = comments.iter().find(|c| c["id"] == "t1_4").unwrap();
    let body = t1_4["body"].as_str().unwrap();
    assert!(body.contains("https://media.giphy.com/media/LOLcat1/giphy.gif"));
    assert!(!body.contains("giphy|"));
}

#[test]
fn placeholder_export_mode_masks_local_paths_only() {
    let base = tempfile::tempdir().unwrap();
    let out_dir = base.path().join("out");
    let input = base.path().join("capture.jsonl");

    let l = line(
        vec![post("t3_xyz", "T", &format!("pic {INLINE} and gif giphy|Nope1"), json!({}))],
        vec![],
    );
    write_jsonl(&input, &[l]);

    let stub = StubTransport::new().serve(INLINE, b"img", Some("image/png"));

    let summary = ThreadView::new()
        .input(&input)
        .output_dir(&out_dir)
        .retry(1, Duration::from_millis(1))
        .export_mode(ExportMode::Placeholders)
        .progress(false)
        .run_with_transport(&stub)
        .unwrap();

    let jsonl = fs::read_to_string(&summary.jsonl_path).unwrap();
    let record: Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
    let body = record["body"].as_str().unwrap();
    // Local media path masked; the remote Giphy fallback stays resolvable.
    assert_eq!(body, format!("pic [media] and gif {}", giphy_media_url("Nope1")));
}

#[test]
fn zero_extracted_posts_is_a_hard_error() {
    let base = tempfile::tempdir().unwrap();
    let input = base.path().join("empty.jsonl");
    // comments listing only, no posts anywhere
    write_jsonl(&input, &[line(vec![], vec![comment("t1_1", "t3_gone", "hi", 1, vec![])])]);

    let stub = StubTransport::new();
    let err = ThreadView::new()
        .input(&input)
        .output_dir(base.path().join("out"))
        .progress(false)
        .run_with_transport(&stub)
        .unwrap_err();
    assert!(err.to_string().contains("no posts"));
}

#[test]
fn missing_inputs_are_a_hard_error() {
    let stub = StubTransport::new();
    let err = ThreadView::new()
        .input("/definitely/not/here")
        .progress(false)
        .run_with_transport(&stub)
        .unwrap_err();
    assert!(err.to_string().contains("no .jsonl"));
}
