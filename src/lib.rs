mod config;
mod paths;
mod jsonl;
mod json_utils;
mod model;

mod listing;
mod collect;
mod fetch;
mod merge;
mod localize;

mod render;
mod export;

mod ndjson;
mod progress;
mod util;
mod pipeline;

pub use crate::config::{ExportMode, ViewOptions};
pub use crate::model::{Comment, DownloadStatus, MediaKind, MediaRecord, MediaReference, Post, RunSummary};
pub use crate::pipeline::ThreadView;

// Extraction and collection entry points, usable without the full pipeline.
pub use crate::collect::{collect_comment_media, collect_post_media, giphy_media_url};
pub use crate::listing::{extract_line, ExtractedLine, Thing};

// Merge and localization primitives.
pub use crate::localize::{localize_post, rewrite_body};
pub use crate::merge::PostIndex;

// Fetcher surface, including the transport seam for injected test doubles.
pub use crate::fetch::{
    url_hash, DownloadError, FetchedMedia, HttpTransport, MediaFetcher, MediaMap, RetryPolicy,
    Transport,
};

// Expose multiprogress so binaries can compose bars with their own.
pub use crate::progress::set_global_multiprogress;

// Robust file ops, importable from the crate root by binaries.
pub use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
