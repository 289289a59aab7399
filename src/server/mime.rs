/// Content type for a file served raw from a repository.
///
/// Markup that a browser would execute (html, svg, js) goes out as plain
/// text; repository content is never rendered with the server's origin.
pub fn raw_content_type(filename: &str) -> &'static str {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return "text/plain; charset=utf-8",
    };
    match ext.as_str() {
        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        // Documents
        "pdf" => "application/pdf",
        "json" => "application/json",
        // Archives
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        // Binaries
        "bin" | "exe" | "so" | "a" | "o" | "wasm" => "application/octet-stream",
        // Everything else in a repository is most likely source or prose
        _ => "text/plain; charset=utf-8",
    }
}

/// Image types the file page shows inline instead of as text
pub fn inline_image_type(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpeg"),
        "gif" => Some("gif"),
        _ => None,
    }
}
