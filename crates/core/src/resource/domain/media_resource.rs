use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// `image/*` and `video/*`; parameters such as `;codecs=` are ignored.
    pub fn from_mime(mime_type: &str) -> Option<MediaKind> {
        let essence = mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let (top, sub) = essence.split_once('/')?;
        if sub.is_empty() {
            return None;
        }
        match top {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Monotonic id of one load. Events and handles of other generations are
/// inert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Generation {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Descriptor of the active media resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceHandle {
    pub kind: MediaKind,
    pub generation: Generation,
    pub source_token: String,
    pub width: u32,
    pub height: u32,
    /// 0 for stills.
    pub fps: f64,
    pub total_frames: usize,
}

impl ResourceHandle {
    /// Whether the resource keeps producing frames after the first.
    pub fn is_continuous(&self) -> bool {
        self.kind == MediaKind::Video
    }
}
