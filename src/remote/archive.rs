//! Result-archive extraction and result-file lookup.
//!
//! The service delivers its output as a zip containing a layout JSON
//! (`layout.json` in the common case), an optional `full.md` and an optional
//! `images/` directory. Extraction is blocking file I/O; async callers run
//! [`unpack`] inside `tokio::task::spawn_blocking`.

use super::types::ArchiveContents;
use crate::error::PdfLayoutError;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// Name of the preferred result file.
pub const RESULT_JSON: &str = "layout.json";
/// Name of the full-document markdown file.
pub const FULL_MARKDOWN: &str = "full.md";
/// Name of the image directory.
pub const IMAGES_DIR: &str = "images";

/// Extract `bytes` (a zip archive) into `destination` and locate its contents.
///
/// `destination` is created if needed. Files already present are overwritten.
pub fn unpack(bytes: &[u8], destination: &Path) -> Result<ArchiveContents, PdfLayoutError> {
    fs::create_dir_all(destination).map_err(|e| PdfLayoutError::io(destination, e))?;

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| PdfLayoutError::Archive {
        dir: destination.to_path_buf(),
        detail: e.to_string(),
    })?;
    debug!("Archive has {} entries", archive.len());

    archive
        .extract(destination)
        .map_err(|e| PdfLayoutError::Archive {
            dir: destination.to_path_buf(),
            detail: e.to_string(),
        })?;
    info!("Archive extracted to {}", destination.display());

    locate(destination)
}

/// Describe an already-extracted archive directory.
pub fn locate(dir: &Path) -> Result<ArchiveContents, PdfLayoutError> {
    let result_json_path = locate_result_json(dir)?;
    info!("Result JSON: {}", result_json_path.display());

    let images = dir.join(IMAGES_DIR);
    Ok(ArchiveContents {
        extract_dir: dir.to_path_buf(),
        result_json_path,
        markdown_path: find_full_markdown(dir),
        images_dir: images.is_dir().then_some(images),
    })
}

/// Pick the result JSON inside `dir`.
///
/// Priority: `layout.json` at the root; then the first JSON file (in path
/// order, any depth) whose name contains `layout` or `model`,
/// case-insensitively; then the first JSON file of any name.
pub fn locate_result_json(dir: &Path) -> Result<PathBuf, PdfLayoutError> {
    let direct = dir.join(RESULT_JSON);
    if direct.is_file() {
        return Ok(direct);
    }

    let mut candidates = Vec::new();
    collect_json_files(dir, &mut candidates).map_err(|e| PdfLayoutError::io(dir, e))?;
    candidates.sort();

    let named = candidates.iter().find(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .is_some_and(|n| n.contains("layout") || n.contains("model"))
    });

    named
        .or_else(|| candidates.first())
        .cloned()
        .ok_or_else(|| PdfLayoutError::NoResultFound {
            dir: dir.to_path_buf(),
        })
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Find `full.md` under `dir`: directly, else anywhere below it.
pub fn find_full_markdown(dir: &Path) -> Option<PathBuf> {
    let direct = dir.join(FULL_MARKDOWN);
    if direct.is_file() {
        return Some(direct);
    }
    let mut found = Vec::new();
    find_named(dir, FULL_MARKDOWN, &mut found).ok()?;
    found.sort();
    found.into_iter().next()
}

fn find_named(dir: &Path, name: &str, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            find_named(&path, name, out)?;
        } else if path.file_name().is_some_and(|n| n == name) {
            out.push(path);
        }
    }
    Ok(())
}
