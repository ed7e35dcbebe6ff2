//! Line streaming over capture files: plain `.jsonl` or `.jsonl.zst`,
//! selected by extension. Decode errors are logged and skip the file rather
//! than aborting the run.

use anyhow::Result;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

use crate::util::open_with_backoff;

fn is_zst(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("zst")).unwrap_or(false)
}

#[inline]
fn warn_decode_skip(path: &Path, e: &anyhow::Error) {
    let abs = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    tracing::warn!(
        path = %abs.display(),
        error = %e,
        "Skipping input file after read error; the pipeline will continue with the remaining files"
    );
}

/// Stream a capture file line-by-line; call `on_line` with the raw trimmed line.
/// I/O or decompression failure logs a warning and skips the rest of the file.
pub fn for_each_line_cfg(
    path: &Path,
    read_buf_bytes: usize,
    mut on_line: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    match for_each_line_attempt(path, Some(read_buf_bytes), &mut |_| {}, &mut on_line) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn_decode_skip(path, &e);
            Ok(())
        }
    }
}

/// Same as `for_each_line_cfg` but calls `on_progress(delta_bytes_read)` with
/// *on-disk* byte deltas (compressed size for `.zst` inputs), so byte-based
/// progress bars track file consumption. On failure, advances progress past
/// the whole file before skipping it.
pub fn for_each_line_with_progress_cfg(
    path: &Path,
    read_buf_bytes: usize,
    mut on_progress: impl FnMut(u64),
    mut on_line: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    match for_each_line_attempt(path, Some(read_buf_bytes), &mut on_progress, &mut on_line) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn_decode_skip(path, &e);
            if let Ok(meta) = fs::metadata(path) {
                on_progress(meta.len());
            }
            Ok(())
        }
    }
}

/// A `Read` wrapper that counts raw bytes read from the underlying file.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}
impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

fn for_each_line_attempt(
    path: &Path,
    read_buf_bytes: Option<usize>,
    on_progress: &mut impl FnMut(u64),
    on_line: &mut impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    let file = open_with_backoff(path, 16, 50)?;
    let counter = Arc::new(AtomicU64::new(0));
    let counting = CountingReader { inner: file, counter: counter.clone() };

    let cap = read_buf_bytes.unwrap_or(16 * 1024);
    let mut reader: BufReader<Box<dyn Read>> = if is_zst(path) {
        let mut decoder = Decoder::new(counting)?;
        // Avoid "Frame requires too much memory" on very large frames.
        decoder.window_log_max(31)?;
        BufReader::with_capacity(cap, Box::new(decoder))
    } else {
        BufReader::with_capacity(cap, Box::new(counting))
    };

    let mut buf = String::with_capacity(16 * 1024);
    let mut last = 0u64;
    loop {
        buf.clear();
        let n = reader.read_line(&mut buf)?;
        if n == 0 {
            let cur = counter.load(Ordering::Relaxed);
            if cur > last {
                on_progress(cur - last);
            }
            break;
        }
        if buf.ends_with('\n') {
            let _ = buf.pop();
            if buf.ends_with('\r') {
                let _ = buf.pop();
            }
        }
        let cur = counter.load(Ordering::Relaxed);
        if cur > last {
            on_progress(cur - last);
            last = cur;
        }
        on_line(&buf)?;
    }
    Ok(())
}
