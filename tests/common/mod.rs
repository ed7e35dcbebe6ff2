use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use threadview::{DownloadError, FetchedMedia, Transport};

/// Wrap children in the Reddit Listing envelope.
pub fn listing(children: Vec<Value>) -> Value {
    json!({"kind": "Listing", "data": {"children": children}})
}

/// A `t3` post thing with the fields the pipeline reads. Extra fields can be
/// merged into `extra` (preview, gallery_data, thumbnail, ...).
pub fn post(id: &str, title: &str, selftext: &str, extra: Value) -> Value {
    let mut data = json!({
        "name": id,
        "title": title,
        "selftext": selftext,
        "author": "bob",
        "score": 42,
        "subreddit": "pics",
        "created_utc": 1_700_000_000,
    });
    if let (Some(map), Some(extra_map)) = (data.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_map {
            map.insert(k.clone(), v.clone());
        }
    }
    json!({"kind": "t3", "data": data})
}

/// A `t1` comment thing. Empty `replies` serializes as the empty string, the
/// way Reddit emits childless comments.
pub fn comment(id: &str, link_id: &str, body: &str, score: i64, replies: Vec<Value>) -> Value {
    let replies_val = if replies.is_empty() { json!("") } else { listing(replies) };
    json!({"kind": "t1", "data": {
        "name": id,
        "link_id": link_id,
        "author": "alice",
        "body": body,
        "score": score,
        "created_utc": 1_700_000_100,
        "replies": replies_val,
    }})
}

/// One capture line: `[posts Listing, comments Listing]`.
pub fn line(posts: Vec<Value>, comments: Vec<Value>) -> String {
    serde_json::to_string(&json!([listing(posts), listing(comments)])).unwrap()
}

/// Write a plain JSONL capture file.
pub fn write_jsonl(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for l in lines {
        writeln!(&mut f, "{}", l).unwrap();
    }
}

/// Write a zstd-compressed capture file (`.jsonl.zst`).
pub fn write_jsonl_zst(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// Scripted transport: serves registered bodies, optionally failing the first
/// N attempts of every URL, and counts every request it sees.
pub struct StubTransport {
    bodies: HashMap<String, (Vec<u8>, Option<String>)>,
    fail_first: usize,
    attempts: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            fail_first: 0,
            attempts: Mutex::new(HashMap::new()),
            total_calls: AtomicUsize::new(0),
        }
    }

    /// Register a URL with a body and optional content type.
    pub fn serve(mut self, url: &str, bytes: &[u8], content_type: Option<&str>) -> Self {
        self.bodies.insert(url.to_string(), (bytes.to_vec(), content_type.map(str::to_string)));
        self
    }

    /// Fail the first `n` attempts of every URL with a network error.
    pub fn fail_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl Transport for StubTransport {
    fn fetch(&self, url: &str) -> Result<FetchedMedia, DownloadError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(url.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        if attempt <= self.fail_first {
            return Err(DownloadError::Network("injected failure".to_string()));
        }
        match self.bodies.get(url) {
            Some((bytes, content_type)) => {
                Ok(FetchedMedia { bytes: bytes.clone(), content_type: content_type.clone() })
            }
            None => Err(DownloadError::Status(404)),
        }
    }
}
