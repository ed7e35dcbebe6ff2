use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use threadview::{ExportMode, ThreadView};

/// Convert Reddit API JSONL captures into a browsable HTML thread view and a
/// cleaned training JSONL, mirroring all referenced media locally.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input capture file(s) or directories of .jsonl/.jsonl.zst files
    #[arg(short, long, num_args = 1.., required = true)]
    input: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Output HTML filename
    #[arg(long, default_value = "threads.html")]
    html_name: String,

    /// Output JSONL filename
    #[arg(long, default_value = "threads_cleaned.jsonl")]
    jsonl_name: String,

    /// Subdirectory of the output directory for downloaded media
    #[arg(long, default_value = "media")]
    media_dir: String,

    /// Number of parallel workers for media downloads
    #[arg(long, default_value_t = 50)]
    workers: usize,

    /// Download attempts per URL (including the first)
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    /// Export [media] placeholders instead of literal local media paths
    #[arg(long, default_value_t = false)]
    placeholders: bool,

    /// Disable progress bars
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mode = if args.placeholders { ExportMode::Placeholders } else { ExportMode::LocalPaths };

    let summary = ThreadView::new()
        .inputs(&args.input)
        .output_dir(&args.output)
        .media_dir(args.media_dir)
        .html_name(args.html_name)
        .jsonl_name(args.jsonl_name)
        .workers(args.workers)
        .retry(args.retries, Duration::from_millis(500))
        .request_timeout(Duration::from_secs(args.timeout))
        .export_mode(mode)
        .progress(!args.quiet)
        .run()?;

    println!(
        "{} posts, {} comments, media {}/{} downloaded ({} failed)",
        summary.posts,
        summary.comments,
        summary.media_downloaded,
        summary.media_unique,
        summary.media_failed,
    );
    println!("HTML view : {}", summary.html_path.display());
    println!("Export    : {}", summary.jsonl_path.display());
    Ok(())
}
