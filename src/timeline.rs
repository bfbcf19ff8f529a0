//! Frames, timelines, and the exact time units they are measured in
//!
//! All durations are integer [`Ticks`] of a [`Timebase`] picked so that both the
//! container's native delay unit and the target frame interval are whole numbers
//! of ticks. Nothing here is ever rounded.

use crate::error::{CatResult, Error};
use std::collections::TryReserveError;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;

/// Exact duration, counted in units of a [`Timebase`]
pub type Ticks = u64;

/// GIF delays are in 1/100th of a second
pub const CENTISECONDS_PER_SECOND: u64 = 100;

/// Target frames per second for the fixed-rate output.
///
/// GIF can't express delays shorter than 1/100s, so at most 100.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameRate(NonZeroU32);

impl FrameRate {
    pub const MAX: u32 = 100;

    pub fn new(fps: u32) -> CatResult<Self> {
        let fps = NonZeroU32::new(fps)
            .ok_or_else(|| Error::InvalidRate("the frame rate must be at least 1 fps".into()))?;
        if fps.get() > Self::MAX {
            return Err(Error::InvalidRate(format!("{} fps is maximum", Self::MAX)));
        }
        if fps.get() > 50 {
            tracing::warn!("web browsers support max 50 fps");
        }
        Ok(Self(fps))
    }

    #[inline]
    #[must_use]
    pub fn fps(self) -> u32 {
        self.0.get()
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(NonZeroU32::new(25).unwrap_or(NonZeroU32::MIN))
    }
}

impl FromStr for FrameRate {
    type Err = Error;

    fn from_str(s: &str) -> CatResult<Self> {
        let fps: i64 = s.trim().parse()
            .map_err(|_| Error::InvalidRate(format!("\"{s}\" is not a whole number")))?;
        if fps <= 0 {
            return Err(Error::InvalidRate(format!("{fps} fps is not a positive rate")));
        }
        Self::new(u32::try_from(fps).map_err(|_| Error::InvalidRate(format!("{} fps is maximum", Self::MAX)))?)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fps", self.0)
    }
}

/// How many ticks make a second.
///
/// For GIF at `fps` it's `100 * fps`: a centisecond is `fps` ticks,
/// and one output frame is exactly 100 ticks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timebase {
    ticks_per_second: u64,
    interval: Ticks,
}

impl Timebase {
    #[must_use]
    pub fn for_gif(rate: FrameRate) -> Self {
        Self {
            ticks_per_second: CENTISECONDS_PER_SECOND * u64::from(rate.fps()),
            interval: CENTISECONDS_PER_SECOND,
        }
    }

    #[inline]
    #[must_use]
    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    /// Duration of one fixed-rate output frame
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Ticks {
        self.interval
    }

    #[inline]
    #[must_use]
    pub fn from_centiseconds(&self, cs: u16) -> Ticks {
        u64::from(cs) * self.ticks_per_second / CENTISECONDS_PER_SECOND
    }

    /// Rounds down. Convert cumulative positions, not individual delays,
    /// so that the rounding doesn't add up.
    #[inline]
    #[must_use]
    pub fn to_centiseconds_floor(&self, ticks: Ticks) -> u64 {
        (u128::from(ticks) * u128::from(CENTISECONDS_PER_SECOND) / u128::from(self.ticks_per_second)) as u64
    }
}

/// One decoded image, and how long it's supposed to be on screen
#[derive(Debug)]
pub struct SourceFrame<I> {
    pub image: Arc<I>,
    pub delay: Ticks,
}

impl<I> SourceFrame<I> {
    pub fn new(image: I, delay: Ticks) -> Self {
        Self { image: Arc::new(image), delay }
    }
}

impl<I> Clone for SourceFrame<I> {
    fn clone(&self) -> Self {
        Self { image: Arc::clone(&self.image), delay: self.delay }
    }
}

/// Decoded frames in display order
#[derive(Debug)]
pub struct SourceTimeline<I> {
    frames: Vec<SourceFrame<I>>,
}

impl<I> Default for SourceTimeline<I> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

impl<I> SourceTimeline<I> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, image: I, delay: Ticks) {
        self.frames.push(SourceFrame::new(image, delay));
    }

    #[inline]
    pub fn frames(&self) -> &[SourceFrame<I>] {
        &self.frames
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of all delays. Saturates at `Ticks::MAX`.
    pub fn duration(&self) -> Ticks {
        self.frames.iter().fold(0, |total, f| total.saturating_add(f.delay))
    }
}

impl<I> From<Vec<SourceFrame<I>>> for SourceTimeline<I> {
    fn from(frames: Vec<SourceFrame<I>>) -> Self {
        Self { frames }
    }
}

impl<I> FromIterator<(I, Ticks)> for SourceTimeline<I> {
    fn from_iter<T: IntoIterator<Item = (I, Ticks)>>(iter: T) -> Self {
        Self {
            frames: iter.into_iter().map(|(image, delay)| SourceFrame::new(image, delay)).collect(),
        }
    }
}

/// A frame of the fixed-rate output. The image is shared with the source frame it duplicates.
#[derive(Debug)]
pub struct DestinationFrame<I> {
    pub image: Arc<I>,
    pub delay: Ticks,
}

/// Fixed-rate frames, as made by the [`Resampler`][crate::Resampler]
///
/// Read-only: every frame has the same delay, to keep it that way it can't be edited.
#[derive(Debug)]
pub struct DestinationTimeline<I> {
    frames: Vec<DestinationFrame<I>>,
    interval: Ticks,
}

impl<I> DestinationTimeline<I> {
    pub(crate) fn with_capacity(interval: Ticks, capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            interval,
        }
    }

    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.frames.try_reserve(additional)
    }

    #[inline]
    pub(crate) fn push(&mut self, image: &Arc<I>) {
        self.frames.push(DestinationFrame {
            image: Arc::clone(image),
            delay: self.interval,
        });
    }

    #[inline]
    pub fn frames(&self) -> &[DestinationFrame<I>] {
        &self.frames
    }

    /// The delay of every frame
    #[inline]
    pub fn interval(&self) -> Ticks {
        self.interval
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration(&self) -> Ticks {
        self.frames.len() as Ticks * self.interval
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DestinationFrame<I>> {
        self.frames.iter()
    }
}

impl<'a, I> IntoIterator for &'a DestinationTimeline<I> {
    type Item = &'a DestinationFrame<I>;
    type IntoIter = std::slice::Iter<'a, DestinationFrame<I>>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
