use crate::config::{ExportMode, ViewOptions};
use crate::fetch::{HttpTransport, MediaFetcher, RetryPolicy, Transport};
use crate::jsonl::for_each_line_with_progress_cfg;
use crate::listing;
use crate::merge::PostIndex;
use crate::model::{MediaReference, RunSummary};
use crate::paths::{discover_inputs, total_input_size};
use crate::progress::make_progress_bar_labeled;
use crate::util::init_tracing_once;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Builder facade for one conversion run. Stages execute sequentially —
/// extract/merge, fetch, localize, render, export — with parallelism confined
/// to the fetch stage.
#[derive(Clone)]
pub struct ThreadView {
    pub(crate) opts: ViewOptions,
}

impl ThreadView {
    pub fn new() -> Self {
        Self { opts: ViewOptions::default() }
    }

    // -------- Builder methods --------
    pub fn input(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input(path); self }
    pub fn inputs<I, P>(mut self, paths: I) -> Self where I: IntoIterator<Item = P>, P: AsRef<Path> { self.opts = self.opts.with_inputs(paths); self }
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_dir(dir); self }
    pub fn media_dir(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_media_dir_name(name); self }
    pub fn html_name(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_html_name(name); self }
    pub fn jsonl_name(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_jsonl_name(name); self }
    pub fn workers(mut self, n: usize) -> Self { self.opts = self.opts.with_workers(n); self }
    pub fn retry(mut self, attempts: u32, base_delay: Duration) -> Self { self.opts = self.opts.with_retry(attempts, base_delay); self }
    pub fn request_timeout(mut self, timeout: Duration) -> Self { self.opts = self.opts.with_request_timeout(timeout); self }
    pub fn export_mode(mut self, mode: ExportMode) -> Self { self.opts = self.opts.with_export_mode(mode); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_read_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_read_buffer(bytes); self }
    pub fn io_write_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_write_buffer(bytes); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }

    /// Run with the real HTTP transport.
    pub fn run(self) -> Result<RunSummary> {
        let transport = HttpTransport::new(self.opts.request_timeout)?;
        self.run_with_transport(&transport)
    }

    /// Run with an injected transport. This is the seam tests use to script
    /// download outcomes without a network.
    pub fn run_with_transport(self, transport: &dyn Transport) -> Result<RunSummary> {
        init_tracing_once();

        let files = discover_inputs(&self.opts.inputs);
        if files.is_empty() {
            return Err(anyhow!("no .jsonl/.jsonl.zst input files found"));
        }
        tracing::info!(files = files.len(), "planned input files");

        fs::create_dir_all(&self.opts.output_dir)
            .with_context(|| format!("create output dir {}", self.opts.output_dir.display()))?;
        let media_dir_abs = self.opts.output_dir.join(&self.opts.media_dir_name);

        // ---- Stage 1: extract, collect, merge (sequential over files) ----
        let mut index = PostIndex::new();
        let mut all_refs: Vec<MediaReference> = Vec::new();
        let mut bad_lines = 0u64;

        let total_bytes = total_input_size(&files);
        let pb = if self.opts.progress {
            Some(make_progress_bar_labeled(
                total_bytes,
                Some(self.opts.progress_label.as_deref().unwrap_or("Reading captures")),
            ))
        } else {
            None
        };

        for file in &files {
            let mut line_no = 0u64;
            for_each_line_with_progress_cfg(
                file,
                self.opts.read_buffer_bytes,
                |delta| {
                    if let Some(pb) = &pb {
                        pb.inc(delta);
                    }
                },
                |line| {
                    line_no += 1;
                    if line.trim().is_empty() {
                        return Ok(());
                    }
                    match listing::extract_line(line) {
                        Ok(extracted) => {
                            for post in extracted.posts {
                                all_refs.extend(post.media.iter().cloned());
                                index.insert_post(post);
                            }
                            for comment in &extracted.comments {
                                collect_refs_deep(comment, &mut all_refs);
                            }
                            index.attach_comments(extracted.comments);
                        }
                        Err(e) => {
                            bad_lines += 1;
                            tracing::warn!(
                                file = %file.display(),
                                line = line_no,
                                error = %e,
                                "skipping malformed capture line"
                            );
                        }
                    }
                    Ok(())
                },
            )?;
        }
        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }

        if index.is_empty() {
            return Err(anyhow!("no posts extracted from any input file"));
        }
        tracing::info!(posts = index.len(), skipped_lines = bad_lines, "extraction complete");

        // ---- Stage 2: fetch (the only parallel stage) ----
        let media = MediaFetcher::new(transport, &media_dir_abs)
            .workers(self.opts.workers)
            .retry(RetryPolicy {
                max_attempts: self.opts.retry_attempts,
                base_delay: self.opts.retry_base_delay,
            })
            .progress(self.opts.progress)
            .fetch_all(&all_refs)?;
        tracing::info!(
            unique = media.len(),
            downloaded = media.downloaded(),
            failed = media.failed(),
            "media fetch complete"
        );

        // ---- Stage 3: finalize forests + localize ----
        let mut posts = index.into_posts();
        for post in &mut posts {
            crate::localize::localize_post(post, &media, &self.opts.media_dir_name);
        }
        let comments: usize = posts.iter().map(|p| p.comment_count()).sum();

        // ---- Stage 4: render + export ----
        let html_path = self.opts.output_dir.join(&self.opts.html_name);
        crate::render::render_html(
            &posts,
            media.downloaded(),
            &html_path,
            &self.opts.media_dir_name,
            self.opts.write_buffer_bytes,
        )?;

        let jsonl_path = self.opts.output_dir.join(&self.opts.jsonl_name);
        crate::export::export_jsonl(
            &posts,
            &jsonl_path,
            self.opts.export_mode,
            &self.opts.media_dir_name,
            self.opts.write_buffer_bytes,
        )?;

        tracing::info!(
            posts = posts.len(),
            comments,
            html = %html_path.display(),
            jsonl = %jsonl_path.display(),
            "run complete"
        );

        Ok(RunSummary {
            posts: posts.len(),
            comments,
            media_unique: media.len(),
            media_downloaded: media.downloaded(),
            media_failed: media.failed(),
            html_path,
            jsonl_path,
        })
    }
}

impl Default for ThreadView {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_refs_deep(comment: &crate::model::Comment, out: &mut Vec<MediaReference>) {
    let mut stack = vec![comment];
    while let Some(c) = stack.pop() {
        out.extend(c.media.iter().cloned());
        stack.extend(c.replies.iter());
    }
}
