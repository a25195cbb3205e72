use std::path::Path;

use crate::error::GateError;

/// A label usable as one segment of a filesystem path. Labels end up inside
/// query literals, so quote, backslash, slash and control characters are
/// refused outright rather than escaped.
pub fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label == "." || label == ".." {
        return false;
    }
    !label
        .chars()
        .any(|c| c == '"' || c == '\\' || c == '/' || c.is_control())
}

/// Split a raw (still percent-encoded) browse path into validated labels.
/// Empty segments are dropped, so `""` and `"/"` both name the root.
pub fn parse_fs_path(raw: &str) -> Result<Vec<String>, GateError> {
    let mut segments = Vec::new();
    for part in raw.split('/').filter(|s| !s.is_empty()) {
        let label = urlencoding::decode(part)
            .map_err(|_| GateError::validation("path segment is not valid utf-8"))?;
        if !is_valid_label(&label) {
            return Err(GateError::validation("invalid path segment"));
        }
        segments.push(label.into_owned());
    }
    Ok(segments)
}

/// Reduce a client-provided upload filename to its final component.
pub fn upload_basename(name: &str) -> Result<String, GateError> {
    // Browsers on Windows may send backslash separated paths.
    let name = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if name.starts_with('.') || !is_valid_label(name) {
        return Err(GateError::validation("invalid filename"));
    }
    Ok(name.to_string())
}

/// Everything after the first dot (`a.tar.gz` -> `tar.gz`), `bin` otherwise.
/// Only ascii alphanumerics survive so the stored name stays `{uuid}.{ext}`.
pub fn extension_of(name: &str) -> String {
    let ext = match name.split_once('.') {
        Some((_, ext)) => ext,
        None => return String::from("bin"),
    };
    let ext: String = ext
        .split('.')
        .map(|part| {
            part.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    if ext.is_empty() {
        return String::from("bin");
    }
    ext
}
