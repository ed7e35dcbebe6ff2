use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// True for the capture extensions we accept: `.jsonl` and `.jsonl.zst`.
fn is_capture_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".jsonl") || lower.ends_with(".jsonl.zst")
}

/// Expand user-supplied inputs (files or directories) into the ordered list
/// of capture files to read. Directories are scanned one level deep and their
/// matches sorted; non-capture files and missing paths warn and are skipped.
pub fn discover_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if is_capture_file(input) {
                files.push(input.clone());
            } else {
                tracing::warn!(path = %input.display(), "not a .jsonl/.jsonl.zst file, skipping");
            }
        } else if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_capture_file(p))
                .collect();
            found.sort();
            if found.is_empty() {
                tracing::warn!(path = %input.display(), "no capture files found in directory");
            }
            files.extend(found);
        } else {
            tracing::warn!(path = %input.display(), "input path does not exist, skipping");
        }
    }
    files
}

/// Sum of on-disk sizes, used to size the byte progress bar.
pub fn total_input_size(files: &[PathBuf]) -> u64 {
    files.iter().map(|p| fs::metadata(p).map(|m| m.len()).unwrap_or(0)).sum()
}
