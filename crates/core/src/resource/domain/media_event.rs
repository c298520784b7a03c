use crossbeam_channel::Sender;

use super::media_resource::Generation;

/// Readiness and failure signals a media element reports while loading or
/// playing.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    /// Enough data to show a frame; playback may still stall.
    CanPlay,
    /// Playback can run to the end without waiting.
    CanPlayThrough,
    Ended,
    Error(String),
    Abort,
    Stalled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationEvent {
    pub generation: Generation,
    pub event: MediaEvent,
}

/// Where a media element reports events. Every event is stamped with the
/// generation the sink was created for.
#[derive(Clone, Debug)]
pub struct EventSink {
    generation: Generation,
    tx: Sender<GenerationEvent>,
}

impl EventSink {
    pub fn new(generation: Generation, tx: Sender<GenerationEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns false once the receiving side is gone.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.tx
            .send(GenerationEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}
