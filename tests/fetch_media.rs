#[path = "common/mod.rs"]
mod common;

use common::*;
use std::time::Duration;
use threadview::{url_hash, DownloadStatus, MediaFetcher, MediaKind, MediaReference, RetryPolicy};

fn quick_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy { max_attempts: attempts, base_delay: Duration::from_millis(1) }
}

#[test]
fn one_request_per_unique_url() {
    // 100 references where ten are duplicates of others: 90 unique URLs.
    let mut refs = Vec::new();
    let mut stub = StubTransport::new();
    for i in 0..90 {
        let url = format!("https://i.redd.it/img{i}.jpg");
        stub = stub.serve(&url, b"data", Some("image/jpeg"));
        refs.push(MediaReference::new(url, MediaKind::Embedded));
    }
    for i in 0..10 {
        refs.push(MediaReference::new(
            format!("https://i.redd.it/img{i}.jpg"),
            MediaKind::Preview,
        ));
    }
    assert_eq!(refs.len(), 100);

    let dir = tempfile::tempdir().unwrap();
    let map = MediaFetcher::new(&stub, dir.path())
        .workers(8)
        .retry(quick_retry(3))
        .fetch_all(&refs)
        .unwrap();

    assert_eq!(stub.calls(), 90, "exactly one request per unique URL");
    assert_eq!(map.len(), 90);
    assert_eq!(map.downloaded(), 90);
}

#[test]
fn transient_failures_retry_until_success() {
    let url = "https://i.redd.it/flaky.jpg";
    let stub = StubTransport::new().serve(url, b"data", None).fail_first(2);
    let refs = [MediaReference::new(url, MediaKind::Embedded)];

    let dir = tempfile::tempdir().unwrap();
    let map = MediaFetcher::new(&stub, dir.path())
        .retry(quick_retry(3))
        .fetch_all(&refs)
        .unwrap();

    assert_eq!(stub.calls_for(url), 3);
    assert_eq!(map.record(url).unwrap().status, DownloadStatus::Succeeded);
    let name = map.local_name(url).unwrap();
    assert!(dir.path().join(name).exists());
}

#[test]
fn exhausted_retries_mark_failed_and_exclude_from_mapping() {
    let url = "https://i.redd.it/gone.jpg";
    let stub = StubTransport::new(); // nothing registered: every attempt 404s
    let refs = [MediaReference::new(url, MediaKind::Embedded)];

    let dir = tempfile::tempdir().unwrap();
    let map = MediaFetcher::new(&stub, dir.path())
        .retry(quick_retry(3))
        .fetch_all(&refs)
        .unwrap();

    assert_eq!(stub.calls_for(url), 3, "every attempt consumed");
    let rec = map.record(url).unwrap();
    assert_eq!(rec.status, DownloadStatus::Failed);
    assert!(rec.local_name.is_none());
    assert!(map.local_name(url).is_none(), "failed URLs are excluded from the mapping");
    assert_eq!(map.failed(), 1);
}

#[test]
fn extension_inference_chain() {
    let by_path = "https://example.com/media/pic.PNG";
    let by_format = "https://preview.redd.it/abc?format=webp&s=1";
    let by_content_type = "https://cdn.example.com/media/12345";
    let by_default = "https://cdn.example.com/media/67890";

    let stub = StubTransport::new()
        .serve(by_path, b"d", None)
        .serve(by_format, b"d", None)
        .serve(by_content_type, b"d", Some("image/gif"))
        .serve(by_default, b"d", Some("application/octet-stream"));

    let refs: Vec<MediaReference> = [by_path, by_format, by_content_type, by_default]
        .iter()
        .map(|u| MediaReference::new(*u, MediaKind::Embedded))
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let map = MediaFetcher::new(&stub, dir.path())
        .retry(quick_retry(1))
        .fetch_all(&refs)
        .unwrap();

    assert_eq!(map.local_name(by_path).unwrap(), format!("{}.png", url_hash(by_path)));
    assert_eq!(map.local_name(by_format).unwrap(), format!("{}.webp", url_hash(by_format)));
    assert_eq!(
        map.local_name(by_content_type).unwrap(),
        format!("{}.gif", url_hash(by_content_type))
    );
    assert_eq!(map.local_name(by_default).unwrap(), format!("{}.jpg", url_hash(by_default)));
}

#[test]
fn existing_file_short_circuits_the_network() {
    let url = "https://i.redd.it/cached.jpg";
    let stub = StubTransport::new(); // would 404 if asked

    let dir = tempfile::tempdir().unwrap();
    let name = format!("{}.jpg", url_hash(url));
    std::fs::write(dir.path().join(&name), b"previous run").unwrap();

    let refs = [MediaReference::new(url, MediaKind::Embedded)];
    let map = MediaFetcher::new(&stub, dir.path())
        .retry(quick_retry(3))
        .fetch_all(&refs)
        .unwrap();

    assert_eq!(stub.calls(), 0, "no request for a file already on disk");
    assert_eq!(map.local_name(url).unwrap(), name);
}

#[test]
fn hash_names_are_stable_and_distinct() {
    let a = url_hash("https://i.redd.it/a.jpg");
    let b = url_hash("https://i.redd.it/b.jpg");
    assert_eq!(a.len(), 16);
    assert_eq!(a, url_hash("https://i.redd.it/a.jpg"));
    assert_ne!(a, b);
}
