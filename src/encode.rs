use crate::codec::Encode;
use crate::decode::GifInfo;
use crate::error::EncodeError;
use crate::timeline::{DestinationTimeline, Ticks, Timebase};
use imgref::ImgVec;
use rgb::RGBA8;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

struct CountingWriter<W> {
    writer: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    #[inline(always)]
    fn write(&mut self, buf: &[u8]) -> Result<usize, std::io::Error> {
        let len = self.writer.write(buf)?;
        self.written += len as u64;
        Ok(len)
    }

    #[inline(always)]
    fn flush(&mut self) -> Result<(), std::io::Error> {
        self.writer.flush()
    }
}

/// Writes composited screens, as decoded by [`GifDecoder`][crate::GifDecoder], as full frames with fixed-rate delays
#[derive(Debug, Default, Copy, Clone)]
pub struct GifEncoder {
    repeat: Option<gif::Repeat>,
}

impl GifEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loop count to write instead of the source file's
    #[must_use]
    pub fn with_repeat(mut self, repeat: Option<gif::Repeat>) -> Self {
        self.repeat = repeat;
        self
    }

    /// `writer` can be any writer, such as `File` or `&mut Vec`.
    ///
    /// Returns number of frames written.
    pub fn encode_to<W: Write>(&self, timeline: &DestinationTimeline<ImgVec<RGBA8>>, meta: &GifInfo, timebase: Timebase, writer: W) -> Result<u64, EncodeError> {
        if timeline.is_empty() {
            return Err(EncodeError::NoFrames);
        }

        let w = CountingWriter { writer, written: 0 };
        let mut enc = gif::Encoder::new(w, meta.width, meta.height, &[])?;
        // no extension means play once
        let repeat = self.repeat.unwrap_or(meta.repeat);
        if repeat != gif::Repeat::Finite(0) {
            enc.write_extension(gif::ExtensionData::Repetitions(repeat))?;
        }

        let mut delays = Pulldown::new(timebase);
        let mut current: Option<(&Arc<ImgVec<RGBA8>>, gif::Frame<'static>)> = None;
        let mut approximated = 0;
        for dst in timeline {
            // duplicates of one source frame are adjacent, and are compressed only once
            if !current.as_ref().is_some_and(|(image, _)| Arc::ptr_eq(image, &dst.image)) {
                let (frame, exact) = Self::indexed_frame(&dst.image)?;
                if !exact {
                    approximated += 1;
                }
                current = Some((&dst.image, Self::compress_frame(frame)));
            }
            if let Some((_, frame)) = &mut current {
                frame.delay = delays.next_delay(dst.delay)?;
                enc.write_lzw_pre_encoded_frame(frame)?;
            }
        }
        if approximated > 0 {
            tracing::warn!("{approximated} frames have more than 256 colors after compositing, and had to be approximated");
        }

        let mut w = enc.into_inner()?;
        w.flush()?;
        tracing::debug!(frames = timeline.len(), bytes = w.written, "encoded GIF");
        Ok(timeline.len() as u64)
    }

    /// Full-screen frame that replaces whatever was shown before it.
    ///
    /// The palette is exact if the screen has at most 256 colors (`true`),
    /// otherwise it's made by NeuQuant.
    fn indexed_frame(image: &ImgVec<RGBA8>) -> Result<(gif::Frame<'static>, bool), EncodeError> {
        let width = u16::try_from(image.width())?;
        let height = u16::try_from(image.height())?;

        let mut colors = HashSet::with_capacity(257);
        let mut rgba = Vec::with_capacity(image.width() * image.height() * 4);
        for px in image.pixels() {
            // all see-through pixels have to share one palette entry
            let px = if px.a == 0 { RGBA8::default() } else { RGBA8 { a: 255, ..px } };
            if colors.len() <= 256 {
                colors.insert(px);
            }
            rgba.extend_from_slice(&[px.r, px.g, px.b, px.a]);
        }

        let mut frame = gif::Frame::from_rgba_speed(width, height, &mut rgba, 10);
        frame.dispose = gif::DisposalMethod::Background;
        Ok((frame, colors.len() <= 256))
    }

    #[inline(never)]
    fn compress_frame(mut frame: gif::Frame<'static>) -> gif::Frame<'static> {
        frame.make_lzw_pre_encoded();
        frame
    }
}

impl Encode<ImgVec<RGBA8>, GifInfo> for GifEncoder {
    fn encode(&self, timeline: &DestinationTimeline<ImgVec<RGBA8>>, meta: &GifInfo, timebase: Timebase, path: &Path) -> Result<u64, EncodeError> {
        let file = File::create(path)?;
        self.encode_to(timeline, meta, timebase, BufWriter::new(file))
    }
}

/// GIF delays are whole centiseconds. Frame durations that aren't are spread out
/// (like telecine pulldown), by rounding the running total rather than each delay.
struct Pulldown {
    timebase: Timebase,
    elapsed: Ticks,
    written_cs: u64,
}

impl Pulldown {
    fn new(timebase: Timebase) -> Self {
        Self { timebase, elapsed: 0, written_cs: 0 }
    }

    fn next_delay(&mut self, delay: Ticks) -> Result<u16, EncodeError> {
        self.elapsed += delay;
        let end_cs = self.timebase.to_centiseconds_floor(self.elapsed);
        let cs = end_cs - self.written_cs;
        self.written_cs = end_cs;
        match u16::try_from(cs) {
            Ok(0) => Err(EncodeError::Unsupported("frame interval is shorter than 1/100s, which GIF can't store".into())),
            Ok(cs) => Ok(cs),
            Err(_) => Err(EncodeError::Unsupported(format!("{cs}cs frame delay is too long for GIF"))),
        }
    }
}
