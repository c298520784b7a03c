use crate::resource::domain::byte_source::{mime_for_extension, ByteSource, SourceBytes};

/// Fetches media over HTTP with a blocking GET.
///
/// The response's `Content-Type` decides the MIME type; when it is missing
/// or generic, the URL path's extension is used instead.
pub struct UrlByteSource {
    url: String,
}

impl UrlByteSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Whether `input` looks like something this source can fetch.
    pub fn accepts(input: &str) -> bool {
        input.starts_with("http://") || input.starts_with("https://")
    }
}

impl ByteSource for UrlByteSource {
    fn fetch(&self) -> Result<SourceBytes, Box<dyn std::error::Error>> {
        log::info!("Fetching {}", self.url);
        let response = reqwest::blocking::get(&self.url).and_then(|r| r.error_for_status())?;
        let header = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes()?.to_vec();

        Ok(SourceBytes {
            bytes,
            mime_type: resolve_mime(header.as_deref(), &self.url),
            token: self.url.clone(),
        })
    }
}

fn resolve_mime(content_type: Option<&str>, url: &str) -> String {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");
    match essence {
        Some(mime) => mime,
        None => mime_for_extension(url_extension(url)).to_string(),
    }
}

fn url_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}
