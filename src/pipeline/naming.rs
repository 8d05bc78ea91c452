// Deterministic output filenames

use std::path::Path;

/// `{stem}_P{page}{prefix}{index}.{encoding}`
pub fn document_image_name(
    stem: &str,
    page_number: u32,
    prefix: &str,
    image_index: u32,
    encoding: &str,
) -> String {
    format!("{stem}_P{page_number}{prefix}{image_index}.{encoding}")
}

/// `{stem}_P{page}{prefix}{index}_sub_{sub}.{encoding}`
pub fn document_sub_image_name(
    stem: &str,
    page_number: u32,
    prefix: &str,
    image_index: u32,
    sub_index: usize,
    encoding: &str,
) -> String {
    format!("{stem}_P{page_number}{prefix}{image_index}_sub_{sub_index}.{encoding}")
}

/// `{stem}_sub_{sub}{extension}`; `extension` keeps its leading dot.
pub fn standalone_sub_image_name(stem: &str, sub_index: usize, extension: &str) -> String {
    format!("{stem}_sub_{sub_index}{extension}")
}

/// File stem as a lossy UTF-8 string (empty when the path has none).
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extension including the leading dot, original case (empty when absent).
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}
