//! Media fetching: dedup by canonical URL, download on a bounded worker pool
//! with retry, file media under hash-derived names. A failed URL is recorded
//! and excluded from the mapping; it never aborts the run.

use crate::collect::{IMAGE_EXTS, VIDEO_EXTS};
use crate::model::{DownloadStatus, MediaRecord, MediaReference};
use crate::progress::make_count_progress;
use crate::util::create_with_backoff;
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A transport-level download failure. Every variant is treated as transient
/// and retried until the policy is exhausted.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("empty response body")]
    EmptyBody,
}

/// A successfully fetched body plus the content type the server claimed.
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Blocking transport seam. The production implementation wraps reqwest;
/// tests inject scripted implementations to exercise retry and fallback
/// behavior without a network.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedMedia, DownloadError>;
}

/// Retry schedule applied uniformly to every URL: `max_attempts` tries with a
/// linearly growing pause between them.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    /// Pause after the `attempt`-th failure (1-based): base_delay × attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// reqwest-backed transport with browser-ish headers; some image CDNs refuse
/// clients that don't present them.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .context("build HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<FetchedMedia, DownloadError> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "image/webp,image/*,*/*;q=0.8")
            .header(reqwest::header::REFERER, "https://www.reddit.com/")
            .send()
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(';').next().unwrap_or(s).trim().to_ascii_lowercase());
        let bytes = resp.bytes().map_err(|e| DownloadError::Network(e.to_string()))?;
        if bytes.is_empty() {
            return Err(DownloadError::EmptyBody);
        }
        Ok(FetchedMedia { bytes: bytes.to_vec(), content_type })
    }
}

/// URL → record mapping for one run. Records are created per unique canonical
/// URL and never removed; failures stay visible so the localizer can apply
/// per-kind fallbacks.
#[derive(Debug, Default)]
pub struct MediaMap {
    records: AHashMap<String, MediaRecord>,
}

impl MediaMap {
    /// Local file name for a URL, only when its download succeeded.
    pub fn local_name(&self, url: &str) -> Option<&str> {
        self.records
            .get(url)
            .filter(|r| r.status == DownloadStatus::Succeeded)
            .and_then(|r| r.local_name.as_deref())
    }

    pub fn record(&self, url: &str) -> Option<&MediaRecord> {
        self.records.get(url)
    }

    /// (url, local_name) pairs of every successful download.
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.values().filter_map(|r| match (r.status, r.local_name.as_deref()) {
            (DownloadStatus::Succeeded, Some(name)) => Some((r.url.as_str(), name)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn downloaded(&self) -> usize {
        self.records.values().filter(|r| r.status == DownloadStatus::Succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.records.values().filter(|r| r.status == DownloadStatus::Failed).count()
    }
}

/// Stable local file stem: first 16 hex chars of SHA-256 of the URL string.
/// The content isn't known before the download, so the URL is the hash key;
/// identical URLs land on the same file across runs.
pub fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..16].to_string()
}

fn known_ext(ext: &str) -> bool {
    IMAGE_EXTS.iter().chain(VIDEO_EXTS).any(|e| ext.eq_ignore_ascii_case(e))
}

/// Extension guessed from the URL alone: path extension, then a `format=`
/// query hint (preview.redd.it), then the reddit-CDN jpeg default.
fn ext_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if let Some(ext) = Path::new(parsed.path()).extension().and_then(|e| e.to_str()) {
        if known_ext(ext) {
            return Some(ext.to_ascii_lowercase());
        }
    }
    for (k, v) in parsed.query_pairs() {
        if k == "format" {
            let v = v.to_ascii_lowercase();
            return Some(match v.as_str() {
                "png" => "png".to_string(),
                "gif" => "gif".to_string(),
                "webp" => "webp".to_string(),
                _ => "jpg".to_string(),
            });
        }
    }
    let host = parsed.host_str()?;
    if host == "redd.it" || host.ends_with(".redd.it") {
        return Some("jpg".to_string());
    }
    None
}

fn ext_from_content_type(ct: &str) -> Option<String> {
    let ext = match ct {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => return None,
    };
    Some(ext.to_string())
}

fn file_nonempty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Downloads the deduplicated reference set onto disk and returns the
/// URL → record mapping. The only parallel stage of the pipeline.
pub struct MediaFetcher<'a> {
    transport: &'a dyn Transport,
    media_dir: PathBuf,
    workers: usize,
    retry: RetryPolicy,
    progress: bool,
}

impl<'a> MediaFetcher<'a> {
    pub fn new(transport: &'a dyn Transport, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            media_dir: media_dir.into(),
            workers: 50,
            retry: RetryPolicy::default(),
            progress: false,
        }
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }

    /// Fetch every unique URL in `refs` — exactly one request chain per
    /// unique canonical URL, regardless of how many references share it.
    /// Completion order between URLs is unspecified.
    pub fn fetch_all(&self, refs: &[MediaReference]) -> Result<MediaMap> {
        let mut seen = AHashSet::new();
        let unique: Vec<&str> = refs
            .iter()
            .map(|r| r.url.as_str())
            .filter(|u| seen.insert(u.to_string()))
            .collect();

        if unique.is_empty() {
            return Ok(MediaMap::default());
        }

        std::fs::create_dir_all(&self.media_dir)
            .with_context(|| format!("create media dir {}", self.media_dir.display()))?;

        let pb = if self.progress {
            Some(make_count_progress(unique.len() as u64, "Downloading media"))
        } else {
            None
        };

        // Keys are disjoint per worker (dedup happened above), so the mutex
        // only guards concurrent insertion.
        let records: Mutex<AHashMap<String, MediaRecord>> =
            Mutex::new(AHashMap::with_capacity(unique.len()));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.min(unique.len()))
            .build()
            .context("build download worker pool")?;

        pool.install(|| {
            use rayon::prelude::*;
            unique.par_iter().for_each(|url| {
                let rec = self.download_one(url);
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                records.lock().insert((*url).to_string(), rec);
            });
        });

        let map = MediaMap { records: records.into_inner() };
        if let Some(pb) = pb {
            pb.finish_with_message(format!("{}/{} downloaded", map.downloaded(), map.len()));
        }
        Ok(map)
    }

    fn download_one(&self, url: &str) -> MediaRecord {
        let guessed_ext = ext_from_url(url);

        // Filename-based incidental reuse: a non-empty file from a previous
        // run under the derived name skips the network entirely.
        if let Some(ext) = &guessed_ext {
            let name = format!("{}.{}", url_hash(url), ext);
            if file_nonempty(&self.media_dir.join(&name)) {
                return MediaRecord {
                    url: url.to_string(),
                    local_name: Some(name),
                    status: DownloadStatus::Succeeded,
                };
            }
        }

        let mut last_err = String::new();
        for attempt in 1..=self.retry.max_attempts {
            match self.transport.fetch(url) {
                Ok(media) => {
                    let ext = guessed_ext
                        .clone()
                        .or_else(|| media.content_type.as_deref().and_then(ext_from_content_type))
                        .unwrap_or_else(|| "jpg".to_string());
                    let name = format!("{}.{}", url_hash(url), ext);
                    let path = self.media_dir.join(&name);
                    match write_media_file(&path, &media.bytes) {
                        Ok(()) => {
                            return MediaRecord {
                                url: url.to_string(),
                                local_name: Some(name),
                                status: DownloadStatus::Succeeded,
                            };
                        }
                        Err(e) => {
                            // Disk trouble won't improve by re-downloading.
                            tracing::warn!(url, path = %path.display(), error = %e, "failed to write media file");
                            return MediaRecord {
                                url: url.to_string(),
                                local_name: None,
                                status: DownloadStatus::Failed,
                            };
                        }
                    }
                }
                Err(e) => {
                    last_err = e.to_string();
                    if attempt < self.retry.max_attempts {
                        std::thread::sleep(self.retry.delay_after(attempt));
                    }
                }
            }
        }

        tracing::warn!(
            url,
            attempts = self.retry.max_attempts,
            error = %last_err,
            "download failed, reference will fall back"
        );
        MediaRecord { url: url.to_string(), local_name: None, status: DownloadStatus::Failed }
    }
}

fn write_media_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = create_with_backoff(path, 16, 50)?;
    f.write_all(bytes)?;
    Ok(())
}
