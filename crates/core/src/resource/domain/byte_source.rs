/// Raw media bytes plus what the ingestion side knows about them.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceBytes {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Human-readable origin (path or URL), kept on the resource handle.
    pub token: String,
}

/// Anything that can hand over a media payload: a local file, a URL, a test
/// fixture.
pub trait ByteSource {
    fn fetch(&self) -> Result<SourceBytes, Box<dyn std::error::Error>>;
}

/// MIME type for a file extension, `application/octet-stream` if unknown.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ogv" => "video/ogg",
        _ => "application/octet-stream",
    }
}
