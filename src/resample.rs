//! Variable frame rate to fixed frame rate conversion
//!
//! Two clocks run side by side: the source clock advances by each frame's own delay,
//! and the destination clock by the fixed interval. After every source frame the
//! destination clock catches up, duplicating that frame as many times as it
//! takes. Output never gets ahead of source frames that haven't been seen yet.

use crate::error::{CatResult, Error};
use crate::progress::ProgressReporter;
use crate::timeline::{DestinationTimeline, SourceFrame, SourceTimeline, Ticks};

/// What to do with source frames that have a delay of 0
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ZeroDelay {
    /// Keep plain catch-up semantics. The destination clock is never behind
    /// after a frame, so a zero-delay frame doesn't get an output frame of its own.
    #[default]
    Drop,
    /// Treat zero-delay frames as if they had this delay.
    /// Browsers show 0cs GIF frames for 10cs.
    Substitute(Ticks),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResampleStats {
    pub source_frames: usize,
    pub emitted_frames: usize,
    /// Source frames that didn't get a single output frame
    pub unrepresented_frames: usize,
    /// Includes delays substituted for zero-delay frames
    pub source_duration: Ticks,
    pub destination_duration: Ticks,
}

#[derive(Debug)]
pub struct Resampled<I> {
    pub timeline: DestinationTimeline<I>,
    pub stats: ResampleStats,
}

/// Maps a variable-delay timeline onto a fixed interval
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Resampler {
    interval: Ticks,
    zero_delay: ZeroDelay,
}

impl Resampler {
    /// `interval` is the delay of every output frame, in the same ticks as the source delays.
    pub fn new(interval: Ticks) -> CatResult<Self> {
        if interval == 0 {
            return Err(Error::InvalidRate("the frame interval must be longer than 0".into()));
        }
        Ok(Self {
            interval,
            zero_delay: ZeroDelay::Drop,
        })
    }

    #[must_use]
    pub fn with_zero_delay(mut self, zero_delay: ZeroDelay) -> Self {
        self.zero_delay = zero_delay;
        self
    }

    #[inline]
    pub fn interval(&self) -> Ticks {
        self.interval
    }

    #[inline]
    pub fn zero_delay(&self) -> ZeroDelay {
        self.zero_delay
    }

    /// Fails with [`Error::TooLong`] if the delays add up to more than fits in [`Ticks`],
    /// or if the output wouldn't fit in memory.
    pub fn resample<I>(&self, source: &SourceTimeline<I>) -> CatResult<Resampled<I>> {
        let mut clock = CatchUp::new(self, source);
        for (index, frame) in source.frames().iter().enumerate() {
            clock.consume(index, frame)?;
        }
        Ok(clock.finish())
    }

    /// Like [`Self::resample`], but `reporter.increase()` is called after each source frame,
    /// and can abort the conversion by returning `false`.
    ///
    /// An aborted conversion is [`Error::Aborted`]; the frames made so far are discarded.
    pub fn resample_with_progress<I>(&self, source: &SourceTimeline<I>, reporter: &mut dyn ProgressReporter) -> CatResult<Resampled<I>> {
        let mut clock = CatchUp::new(self, source);
        for (index, frame) in source.frames().iter().enumerate() {
            clock.consume(index, frame)?;
            if !reporter.increase() {
                return Err(Error::Aborted);
            }
        }
        Ok(clock.finish())
    }
}

/// Resample with the default [`ZeroDelay::Drop`] policy.
///
/// Fails with [`Error::InvalidRate`] if `interval` is 0.
pub fn resample<I>(source: &SourceTimeline<I>, interval: Ticks) -> CatResult<DestinationTimeline<I>> {
    Ok(Resampler::new(interval)?.resample(source)?.timeline)
}

struct CatchUp<I> {
    interval: Ticks,
    zero_delay: ZeroDelay,
    src_elapsed: Ticks,
    dst_elapsed: Ticks,
    timeline: DestinationTimeline<I>,
    consumed: usize,
    unrepresented: usize,
}

impl<I> CatchUp<I> {
    fn new(resampler: &Resampler, source: &SourceTimeline<I>) -> Self {
        // capacity is a guess; zero-delay substitutes may add more
        let expected = (source.duration() / resampler.interval).saturating_add(1).min(1 << 16);
        Self {
            interval: resampler.interval,
            zero_delay: resampler.zero_delay,
            src_elapsed: 0,
            dst_elapsed: 0,
            timeline: DestinationTimeline::with_capacity(resampler.interval, expected as usize),
            consumed: 0,
            unrepresented: 0,
        }
    }

    #[inline]
    fn consume(&mut self, index: usize, frame: &SourceFrame<I>) -> CatResult<()> {
        let delay = match (frame.delay, self.zero_delay) {
            (0, ZeroDelay::Substitute(substitute)) => substitute,
            (delay, _) => delay,
        };
        self.src_elapsed = self.src_elapsed.checked_add(delay).ok_or(Error::TooLong)?;
        self.consumed += 1;

        let behind = self.src_elapsed.saturating_sub(self.dst_elapsed).div_ceil(self.interval);
        self.timeline.try_reserve(usize::try_from(behind).map_err(|_| Error::TooLong)?)
            .map_err(|_| Error::TooLong)?;

        let emitted_before = self.timeline.len();
        while self.dst_elapsed < self.src_elapsed {
            self.dst_elapsed = self.dst_elapsed.checked_add(self.interval).ok_or(Error::TooLong)?;
            self.timeline.push(&frame.image);
        }

        if self.timeline.len() == emitted_before {
            self.unrepresented += 1;
            tracing::debug!(index, delay, "frame is covered by earlier output, skipped");
        }
        Ok(())
    }

    fn finish(self) -> Resampled<I> {
        debug_assert!(self.dst_elapsed >= self.src_elapsed);
        debug_assert!(self.dst_elapsed - self.src_elapsed < self.interval);
        Resampled {
            stats: ResampleStats {
                source_frames: self.consumed,
                emitted_frames: self.timeline.len(),
                unrepresented_frames: self.unrepresented,
                source_duration: self.src_elapsed,
                destination_duration: self.dst_elapsed,
            },
            timeline: self.timeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::sync::Arc;

    fn images<I: Copy>(timeline: &DestinationTimeline<I>) -> Vec<I> {
        timeline.iter().map(|f| *f.image).collect()
    }

    /// Deterministic pseudo-random delays, some of them 0
    fn delays(seed: u64, len: usize) -> Vec<Ticks> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (0..len).map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let r = state >> 33;
            if r % 7 == 0 { 0 } else { r % 300 }
        }).collect()
    }

    #[test]
    fn duplicates_to_catch_up() {
        let src: SourceTimeline<char> = [('A', 100), ('B', 50)].into_iter().collect();
        let dst = resample(&src, 40).unwrap();
        assert_eq!(images(&dst), ['A', 'A', 'A', 'B']);
        assert!(dst.iter().all(|f| f.delay == 40));
        assert_eq!(dst.duration(), 160);
        assert_eq!(src.duration(), 150);
    }

    #[test]
    fn zero_delay_frame_is_dropped_by_default() {
        let src: SourceTimeline<char> = [('A', 0), ('B', 40)].into_iter().collect();
        let res = Resampler::new(40).unwrap().resample(&src).unwrap();
        assert_eq!(images(&res.timeline), ['B']);
        assert_eq!(res.timeline.frames()[0].delay, 40);
        assert_eq!(res.stats.unrepresented_frames, 1);
        assert_eq!(res.stats.source_frames, 2);
    }

    #[test]
    fn zero_delay_frame_substituted() {
        let src: SourceTimeline<char> = [('A', 0), ('B', 40)].into_iter().collect();
        let res = Resampler::new(40).unwrap()
            .with_zero_delay(ZeroDelay::Substitute(40))
            .resample(&src).unwrap();
        assert_eq!(images(&res.timeline), ['A', 'B']);
        assert_eq!(res.stats.unrepresented_frames, 0);
        assert_eq!(res.stats.source_duration, 80);
    }

    #[test]
    fn zero_delay_frames_never_catch_up() {
        let src: SourceTimeline<char> = [('A', 40), ('B', 0), ('C', 30), ('D', 0)].into_iter().collect();
        let res = Resampler::new(40).unwrap().resample(&src).unwrap();
        assert_eq!(images(&res.timeline), ['A', 'C']);
        assert_eq!(res.stats.unrepresented_frames, 2);
    }

    #[test]
    fn short_frame_covered_by_overshoot() {
        let src: SourceTimeline<char> = [('A', 50), ('B', 20), ('C', 40)].into_iter().collect();
        let res = Resampler::new(40).unwrap().resample(&src).unwrap();
        assert_eq!(images(&res.timeline), ['A', 'A', 'C']);
        assert_eq!(res.stats.unrepresented_frames, 1);
        assert_eq!(res.stats.emitted_frames, 3);
        assert_eq!(res.stats.source_duration, 110);
        assert_eq!(res.stats.destination_duration, 120);
    }

    #[test]
    fn exact_multiples_dont_double_emit() {
        let src: SourceTimeline<u8> = [(1, 40), (2, 80), (3, 120), (4, 40)].into_iter().collect();
        let dst = resample(&src, 40).unwrap();
        assert_eq!(images(&dst), [1, 2, 2, 3, 3, 3, 4]);
        assert_eq!(dst.duration(), src.duration());
    }

    #[test]
    fn empty_in_empty_out() {
        let src = SourceTimeline::<u8>::new();
        let res = Resampler::new(3).unwrap().resample(&src).unwrap();
        assert!(res.timeline.is_empty());
        assert_eq!(res.stats, ResampleStats::default());
    }

    #[test]
    fn zero_interval_is_config_error() {
        let src: SourceTimeline<u8> = [(1, 40)].into_iter().collect();
        assert!(matches!(resample(&src, 0), Err(Error::InvalidRate(_))));
        assert!(matches!(Resampler::new(0), Err(Error::InvalidRate(_))));
    }

    #[test]
    fn huge_delays_dont_wrap_around() {
        let src: SourceTimeline<u8> = [(1, u64::MAX)].into_iter().collect();
        assert_eq!(resample(&src, u64::MAX).unwrap().len(), 1);
        assert!(matches!(resample(&src, (1 << 63) + 1), Err(Error::TooLong)));

        let src: SourceTimeline<u8> = [(1, u64::MAX - 1), (2, 5)].into_iter().collect();
        assert_eq!(src.duration(), u64::MAX);
        assert!(matches!(resample(&src, u64::MAX / 2), Err(Error::TooLong)));

        // more frames than can be allocated
        let src: SourceTimeline<u8> = [(1, u64::MAX / 2)].into_iter().collect();
        assert!(matches!(resample(&src, 1), Err(Error::TooLong)));
    }

    #[test]
    fn duplicates_share_the_image() {
        let src: SourceTimeline<Vec<u8>> = [(vec![1; 1000], 90)].into_iter().collect();
        let dst = resample(&src, 30).unwrap();
        assert_eq!(dst.len(), 3);
        assert!(dst.iter().all(|f| Arc::ptr_eq(&f.image, &src.frames()[0].image)));
    }

    #[test]
    fn overshoot_is_less_than_one_interval() {
        for seed in 0..200 {
            let interval = 1 + seed % 97;
            let src: SourceTimeline<usize> = delays(seed, 1 + (seed as usize % 40)).into_iter().enumerate().collect();
            let dst = resample(&src, interval).unwrap();
            let (s, d) = (src.duration(), dst.duration());
            assert!(s <= d && d < s + interval, "seed {seed}: {s} vs {d}");
            assert!(dst.iter().all(|f| f.delay == interval));
        }
    }

    #[test]
    fn output_never_runs_ahead_of_input() {
        for seed in 0..200 {
            let interval = 1 + seed % 50;
            let delays = delays(seed + 1000, 30);
            let src: SourceTimeline<usize> = delays.iter().copied().enumerate().collect();
            let dst = images(&resample(&src, interval).unwrap());

            // frames appear in source order
            assert!(dst.windows(2).all(|w| w[0] <= w[1]));

            // after k source frames the output covers exactly ceil(elapsed / interval) frames
            let mut elapsed = 0;
            for (k, delay) in delays.iter().enumerate() {
                elapsed += delay;
                let emitted = dst.iter().filter(|&&i| i <= k).count() as u64;
                assert_eq!(emitted, elapsed.div_ceil(interval), "seed {seed} frame {k}");
            }
        }
    }

    #[test]
    fn stats_add_up() {
        let src: SourceTimeline<usize> = delays(7, 100).into_iter().enumerate().collect();
        let res = Resampler::new(33).unwrap().resample(&src).unwrap();
        assert_eq!(res.stats.source_frames, src.len());
        assert_eq!(res.stats.emitted_frames, res.timeline.len());
        let represented = images(&res.timeline).windows(2).filter(|w| w[0] != w[1]).count() + 1;
        assert_eq!(res.stats.unrepresented_frames, src.len() - represented);
    }

    struct StopAfter(usize, usize);

    impl ProgressReporter for StopAfter {
        fn increase(&mut self) -> bool {
            self.1 += 1;
            self.1 <= self.0
        }
    }

    #[test]
    fn progress_once_per_source_frame() {
        let src: SourceTimeline<char> = [('A', 100), ('B', 50), ('C', 10)].into_iter().collect();
        let mut counter = StopAfter(usize::MAX, 0);
        let res = Resampler::new(40).unwrap().resample_with_progress(&src, &mut counter).unwrap();
        assert_eq!(counter.1, 3);
        assert_eq!(images(&res.timeline), ['A', 'A', 'A', 'B']);

        let res = Resampler::new(40).unwrap().resample_with_progress(&src, &mut NoProgress {}).unwrap();
        assert_eq!(res.timeline.len(), 4);
    }

    #[test]
    fn abort_between_frames() {
        let src: SourceTimeline<char> = [('A', 100), ('B', 50), ('C', 10)].into_iter().collect();
        let mut stop = StopAfter(1, 0);
        let res = Resampler::new(40).unwrap().resample_with_progress(&src, &mut stop);
        assert!(matches!(res, Err(Error::Aborted)));
        assert_eq!(stop.1, 2);
    }
}
