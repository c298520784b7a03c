use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::resource::domain::byte_source::ByteSource;
use crate::resource::domain::media_event::{EventSink, GenerationEvent, MediaEvent};
use crate::resource::domain::media_platform::{MediaPlatform, VideoElement};
use crate::resource::domain::media_resource::{Generation, MediaKind, ResourceHandle};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unsupported media type '{0}'")]
    UnsupportedType(String),
    #[error("failed to fetch media: {0}")]
    Ingest(String),
    #[error("failed to decode media: {0}")]
    Decode(String),
    #[error("failed to bind media source: {0}")]
    Bind(String),
    #[error("media load aborted")]
    Aborted,
    #[error("media load stalled")]
    Stalled,
}

enum ActiveResource {
    Image { handle: ResourceHandle, frame: Frame },
    Video { handle: ResourceHandle },
}

impl ActiveResource {
    fn handle(&self) -> &ResourceHandle {
        match self {
            ActiveResource::Image { handle, .. } | ActiveResource::Video { handle } => handle,
        }
    }
}

/// Owns the active media resource and arbitrates every transition of it.
///
/// At most one resource is active. Each load is stamped with a fresh
/// [`Generation`]; platform events carrying any other generation than the
/// one loading or active are dropped, so a replaced resource can no longer
/// affect state.
pub struct ResourceManager {
    platform: Box<dyn MediaPlatform>,
    events_tx: Sender<GenerationEvent>,
    events_rx: Receiver<GenerationEvent>,
    latest: Generation,
    active: Option<ActiveResource>,
    video: Option<Box<dyn VideoElement>>,
    /// Events of the active generation that arrived while another load was
    /// awaiting readiness.
    pending: VecDeque<MediaEvent>,
    preview_looping: bool,
}

impl ResourceManager {
    pub fn new(platform: Box<dyn MediaPlatform>) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            platform,
            events_tx,
            events_rx,
            latest: Generation::default(),
            active: None,
            video: None,
            pending: VecDeque::new(),
            preview_looping: true,
        }
    }

    /// Whether newly loaded videos loop. On by default.
    pub fn set_preview_looping(&mut self, looping: bool) {
        self.preview_looping = looping;
    }

    pub fn active_handle(&self) -> Option<ResourceHandle> {
        self.active.as_ref().map(|a| a.handle().clone())
    }

    pub fn is_current(&self, handle: &ResourceHandle) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.handle().generation == handle.generation)
    }

    /// Fetches `source` and makes it the active resource.
    ///
    /// `declared_type` overrides the MIME type the source reports.
    pub fn load_resource(
        &mut self,
        source: &dyn ByteSource,
        declared_type: Option<&str>,
    ) -> Result<ResourceHandle, LoadError> {
        if let Some(declared) = declared_type {
            MediaKind::from_mime(declared).ok_or_else(|| LoadError::UnsupportedType(declared.to_string()))?;
        }
        let fetched = source.fetch().map_err(|e| LoadError::Ingest(e.to_string()))?;
        let mime_type = declared_type.map(str::to_string).unwrap_or(fetched.mime_type);
        let kind =
            MediaKind::from_mime(&mime_type).ok_or_else(|| LoadError::UnsupportedType(mime_type.clone()))?;

        let generation = self.allocate_generation();
        log::info!("Loading {} ({mime_type}) as generation {generation}", fetched.token);

        match kind {
            MediaKind::Image => self.load_image(generation, &fetched.bytes, fetched.token),
            MediaKind::Video => self.load_video(generation, fetched.bytes, &mime_type, fetched.token),
        }
    }

    fn allocate_generation(&mut self) -> Generation {
        self.latest = self.latest.next();
        self.latest
    }

    fn load_image(
        &mut self,
        generation: Generation,
        bytes: &[u8],
        token: String,
    ) -> Result<ResourceHandle, LoadError> {
        let frame = self
            .platform
            .decode_image(bytes)
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        self.neutralize_active();
        let handle = ResourceHandle {
            kind: MediaKind::Image,
            generation,
            source_token: token,
            width: frame.width(),
            height: frame.height(),
            fps: 0.0,
            total_frames: 1,
        };
        log::info!(
            "Image {} active ({}x{}, generation {generation})",
            handle.source_token,
            handle.width,
            handle.height
        );
        self.active = Some(ActiveResource::Image {
            handle: handle.clone(),
            frame,
        });
        Ok(handle)
    }

    fn load_video(
        &mut self,
        generation: Generation,
        bytes: Vec<u8>,
        mime_type: &str,
        token: String,
    ) -> Result<ResourceHandle, LoadError> {
        let platform = &self.platform;
        let element = self.video.get_or_insert_with(|| platform.create_video_element());

        if element.has_source() {
            element.pause();
            if matches!(self.active, Some(ActiveResource::Video { .. })) {
                log::info!("Tearing down active video before rebinding");
                self.active = None;
                self.pending.clear();
            }
        }
        element.set_looping(self.preview_looping);

        let sink = EventSink::new(generation, self.events_tx.clone());
        let bound = element.bind_source(bytes, mime_type, sink);
        if let Err(e) = bound {
            element.detach();
            return Err(LoadError::Bind(e.to_string()));
        }

        self.await_ready(generation)?;

        let (width, height, fps, total_frames) = self
            .video
            .as_mut()
            .and_then(|el| el.metadata())
            .map(|m| (m.width, m.height, m.playback_fps(), m.total_frames))
            .unwrap_or((0, 0, 0.0, 0));

        if matches!(self.active, Some(ActiveResource::Image { .. })) {
            self.active = None;
        }
        self.pending.clear();
        let handle = ResourceHandle {
            kind: MediaKind::Video,
            generation,
            source_token: token,
            width,
            height,
            fps,
            total_frames,
        };
        log::info!(
            "Video {} active ({width}x{height} @ {fps:.2} fps, generation {generation})",
            handle.source_token
        );
        self.active = Some(ActiveResource::Video { handle: handle.clone() });
        Ok(handle)
    }

    /// Blocks until `generation` reports `CanPlayThrough` or fails. On
    /// failure the element's source binding is released.
    fn await_ready(&mut self, generation: Generation) -> Result<(), LoadError> {
        let active_generation = self.active.as_ref().map(|a| a.handle().generation);
        loop {
            let Ok(stamped) = self.events_rx.recv() else {
                return Err(LoadError::Aborted);
            };
            if stamped.generation != generation {
                if Some(stamped.generation) == active_generation {
                    self.pending.push_back(stamped.event);
                } else {
                    log::debug!(
                        "Dropping {:?} from stale generation {}",
                        stamped.event,
                        stamped.generation
                    );
                }
                continue;
            }
            let failure = match stamped.event {
                MediaEvent::CanPlay => {
                    log::debug!("Generation {generation} can play; waiting for full readiness");
                    continue;
                }
                MediaEvent::CanPlayThrough => return Ok(()),
                MediaEvent::Ended => continue,
                MediaEvent::Error(msg) => LoadError::Decode(msg),
                MediaEvent::Abort => LoadError::Aborted,
                MediaEvent::Stalled => LoadError::Stalled,
            };
            log::warn!("Load of generation {generation} failed: {failure}");
            if let Some(element) = self.video.as_mut() {
                element.detach();
            }
            return Err(failure);
        }
    }

    /// Detaches whatever is active so none of its callbacks can reach us.
    fn neutralize_active(&mut self) {
        if let Some(ActiveResource::Video { handle }) = &self.active {
            log::info!("Releasing video generation {}", handle.generation);
            if let Some(element) = self.video.as_mut() {
                element.pause();
                element.detach();
            }
        }
        self.active = None;
        self.pending.clear();
    }

    /// The active resource's current frame. `Ok(None)` for a stale handle or
    /// when no frame is decoded; decoder failures surface as
    /// [`LoadError::Decode`].
    pub fn frame(&mut self, handle: &ResourceHandle) -> Result<Option<Frame>, LoadError> {
        if !self.is_current(handle) {
            return Ok(None);
        }
        match self.active.as_ref() {
            None => Ok(None),
            Some(ActiveResource::Image { frame, .. }) => Ok(Some(frame.clone())),
            Some(ActiveResource::Video { .. }) => match self.video.as_mut() {
                Some(element) => element.next_frame().map_err(|e| LoadError::Decode(e.to_string())),
                None => Ok(None),
            },
        }
    }

    /// Events the active resource has reported since the last drain.
    pub fn drain_events(&mut self) -> Vec<MediaEvent> {
        let active_generation = self.active.as_ref().map(|a| a.handle().generation);
        let mut events: Vec<MediaEvent> = self.pending.drain(..).collect();
        for stamped in self.events_rx.try_iter() {
            if Some(stamped.generation) == active_generation {
                events.push(stamped.event);
            } else {
                log::debug!(
                    "Dropping {:?} from stale generation {}",
                    stamped.event,
                    stamped.generation
                );
            }
        }
        events
    }

    pub fn play(&mut self) {
        if let (Some(ActiveResource::Video { .. }), Some(element)) = (&self.active, self.video.as_mut()) {
            element.play();
        }
    }

    pub fn pause(&mut self) {
        if let (Some(ActiveResource::Video { .. }), Some(element)) = (&self.active, self.video.as_mut()) {
            element.pause();
        }
    }

    /// Rewinds the active video and waits until it can play through.
    ///
    /// The reload runs under a new generation, so the returned handle
    /// supersedes the previous one. On failure the video is torn down.
    pub fn restart_video(&mut self, looping: bool) -> Result<ResourceHandle, LoadError> {
        let previous = match &self.active {
            Some(ActiveResource::Video { handle }) => handle.clone(),
            _ => return Err(LoadError::Bind("no active video to restart".to_string())),
        };
        let generation = self.allocate_generation();
        let element = self
            .video
            .as_mut()
            .ok_or_else(|| LoadError::Bind("video element missing".to_string()))?;
        element.pause();
        element.set_looping(looping);
        let sink = EventSink::new(generation, self.events_tx.clone());
        let reloaded = element.load(sink);

        // The old generation is retired whatever happens next.
        self.active = None;
        self.pending.clear();
        if let Err(e) = reloaded {
            element.detach();
            return Err(LoadError::Bind(e.to_string()));
        }
        self.await_ready(generation)?;

        let handle = ResourceHandle {
            generation,
            ..previous
        };
        log::info!(
            "Restarted {} from the beginning (looping: {looping}, generation {generation})",
            handle.source_token
        );
        self.active = Some(ActiveResource::Video { handle: handle.clone() });
        Ok(handle)
    }
}
