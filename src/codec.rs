use crate::error::{DecodeError, EncodeError};
use crate::timeline::{DestinationTimeline, SourceTimeline, Timebase};
use std::path::Path;

/// Frames of one file, and whatever else about the container the encoder will need
#[derive(Debug)]
pub struct Decoded<I, M> {
    pub timeline: SourceTimeline<I>,
    pub meta: M,
}

/// Reads an animation file into a [`SourceTimeline`]
///
/// Delays must be converted to ticks of the given `timebase` without rounding.
pub trait Decode: Sync {
    type Image: Send + Sync;
    type Meta: Send;

    fn decode(&self, path: &Path, timebase: Timebase) -> Result<Decoded<Self::Image, Self::Meta>, DecodeError>;
}

/// Writes a fixed-rate [`DestinationTimeline`] to a file
pub trait Encode<I, M>: Sync {
    /// Returns number of frames written
    fn encode(&self, timeline: &DestinationTimeline<I>, meta: &M, timebase: Timebase, path: &Path) -> Result<u64, EncodeError>;
}
