//! Local file handling: upload names, atomic writes, contained path lookup.

use crate::error::PdfLayoutError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

/// Reduce a client-supplied filename to a safe single path component.
///
/// Only the last path component is kept. Whitespace runs become `_`,
/// anything outside `[A-Za-z0-9_.-]` is dropped (non-ASCII included) and
/// leading/trailing dots and underscores are stripped, separately for the
/// stem and the extension. A stem that ends up empty becomes `upload`.
///
/// ```rust
/// use edgequake_pdflayout::storage::sanitize_filename;
/// assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_filename("My Paper (v2).pdf"), "My_Paper_v2.pdf");
/// assert_eq!(sanitize_filename("报告.pdf"), "upload.pdf");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };

    let stem = match clean_part(stem) {
        s if s.is_empty() => "upload".to_string(),
        s => s,
    };
    match ext.map(clean_part).filter(|e| !e.is_empty()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// True when `value` is non-empty and only `[A-Za-z0-9_-]`, so it can be
/// used as, or spliced into, a single file name.
pub fn is_plain_component(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn clean_part(part: &str) -> String {
    let joined = part.split_whitespace().collect::<Vec<_>>().join("_");
    RE_UNSAFE
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PdfLayoutError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PdfLayoutError::io(parent, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| PdfLayoutError::io(&tmp_path, e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PdfLayoutError::io(path, e))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Store an uploaded file under `dir` with a sanitized name.
///
/// Returns the stored path. An existing file of the same name is replaced.
pub async fn save_upload(
    dir: &Path,
    original_name: &str,
    bytes: &[u8],
) -> Result<PathBuf, PdfLayoutError> {
    let path = dir.join(sanitize_filename(original_name));
    write_atomic(&path, bytes).await?;
    info!("Saved upload '{}' as {}", original_name, path.display());
    Ok(path)
}

/// Resolve `requested` (a client-supplied relative path) below `root`.
///
/// * `..` that climbs above `root`, absolute paths, or a symlink leading
///   outside → [`PdfLayoutError::PathOutsideRoot`];
/// * a path that does not exist → [`PdfLayoutError::FileNotFound`].
///
/// The returned path exists; it may be a directory.
pub fn resolve_contained(root: &Path, requested: &str) -> Result<PathBuf, PdfLayoutError> {
    let outside = || PdfLayoutError::PathOutsideRoot {
        requested: requested.to_string(),
    };

    let mut relative = PathBuf::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(outside());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(outside()),
        }
    }

    let root = root
        .canonicalize()
        .map_err(|e| PdfLayoutError::io(root, e))?;
    let candidate = root.join(&relative);
    let resolved = candidate
        .canonicalize()
        .map_err(|e| PdfLayoutError::io(&candidate, e))?;
    if !resolved.starts_with(&root) {
        return Err(outside());
    }
    Ok(resolved)
}

/// `Content-Type` for a served file, by extension.
pub fn content_type(path: &Path) -> &'static str {
    match extension_of(&path.to_string_lossy()).as_deref() {
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("md") => "text/markdown; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
