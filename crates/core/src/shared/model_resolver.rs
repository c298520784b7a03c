use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

const DOWNLOAD_BUFFER: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("model {name} not found in cache or bundled directory and no download URL configured")]
    NotFound { name: String },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model file by name.
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. Bundled directory
/// 3. Download `<base_url>/<name>` into the cache
pub fn resolve(
    name: &str,
    base_url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, name, base_url, bundled_dir, progress)
}

fn resolve_in(
    cache_dir: &Path,
    name: &str,
    base_url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(base_url) = base_url else {
        return Err(ModelResolveError::NotFound {
            name: name.to_string(),
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    let url = format!("{}/{}", base_url.trim_end_matches('/'), name);
    log::info!("Downloading {name} from {url}");
    download(&url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Posecast/models/`
/// - Linux: `$XDG_CACHE_HOME/Posecast/models/` or `~/.cache/Posecast/models/`
/// - Windows: `%LOCALAPPDATA%/Posecast/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("Posecast").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("Posecast").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

/// Streams `url` into a temporary file beside `dest`, moved into place only
/// once the body is complete.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let download_error = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };
    let write_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ModelResolveError::Write { path, source }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_error)?;
    let total = response.content_length().unwrap_or(0);

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut part = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(dir)
        .map_err(write_error(dir))?;

    let mut buf = vec![0u8; DOWNLOAD_BUFFER];
    let mut downloaded = 0u64;
    loop {
        let n = response
            .read(&mut buf)
            .map_err(write_error(part.path()))?;
        if n == 0 {
            break;
        }
        part.write_all(&buf[..n]).map_err(write_error(part.path()))?;
        downloaded += n as u64;
        if let Some(cb) = &progress {
            cb(downloaded, total);
        }
    }
    part.flush().map_err(write_error(part.path()))?;
    part.persist(dest)
        .map_err(|e| ModelResolveError::Write {
            path: dest.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}
