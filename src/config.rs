use std::path::{Path, PathBuf};
use std::time::Duration;

/// How media references are spelled in the training export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportMode {
    /// Keep literal `media_dir/<file>` paths in exported bodies.
    LocalPaths,
    /// Replace any media path with the `[media]` placeholder token.
    Placeholders,
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ViewOptions {
    pub inputs: Vec<PathBuf>,          // capture files and/or directories
    pub output_dir: PathBuf,
    pub media_dir_name: String,        // subdirectory of output_dir
    pub html_name: String,
    pub jsonl_name: String,
    pub workers: usize,                // download worker pool size
    pub retry_attempts: u32,           // attempts per URL, including the first
    pub retry_base_delay: Duration,    // linear backoff step
    pub request_timeout: Duration,     // per-request HTTP timeout
    pub export_mode: ExportMode,
    pub progress: bool,                // show progress bars
    pub progress_label: Option<String>,

    // IO tuning
    pub read_buffer_bytes: usize,      // BufReader capacity
    pub write_buffer_bytes: usize,     // BufWriter capacity
}

impl Default for ViewOptions {
    fn default() -> Self {
        // Defaults chosen to be safe but noticeably faster than std defaults.
        // Adjust at runtime via the io_* builder methods.
        let default_read = 256 * 1024;
        let default_write = 256 * 1024;

        Self {
            inputs: Vec::new(),
            output_dir: PathBuf::from("."),
            media_dir_name: "media".to_string(),
            html_name: "threads.html".to_string(),
            jsonl_name: "threads_cleaned.jsonl".to_string(),
            workers: 50,
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(15),
            export_mode: ExportMode::LocalPaths,
            progress: true,
            progress_label: None,

            read_buffer_bytes: default_read,
            write_buffer_bytes: default_write,
        }
    }
}

impl ViewOptions {
    pub fn with_input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(path.as_ref().to_path_buf());
        self
    }
    pub fn with_inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.inputs.extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_media_dir_name(mut self, name: impl Into<String>) -> Self {
        self.media_dir_name = name.into();
        self
    }
    pub fn with_html_name(mut self, name: impl Into<String>) -> Self {
        self.html_name = name.into();
        self
    }
    pub fn with_jsonl_name(mut self, name: impl Into<String>) -> Self {
        self.jsonl_name = name.into();
        self
    }
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }
    pub fn with_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_base_delay = base_delay;
        self
    }
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
    pub fn with_export_mode(mut self, mode: ExportMode) -> Self {
        self.export_mode = mode;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }

    // IO buffers tuning
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_io_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
}
