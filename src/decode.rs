//! This is for reading GIFs as an input for re-timing as another GIF
//!
//! Each frame is composited onto the screen (disposal, transparency and placement
//! applied), so every image is what the viewer sees while that frame is on.
//! Frames that get no output frame of their own can't lose any pixels this way.

use crate::codec::{Decode, Decoded};
use crate::error::DecodeError;
use crate::timeline::{SourceTimeline, Timebase};
use imgref::ImgVec;
use rgb::RGBA8;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Logical screen properties that have to survive the conversion
#[derive(Debug, Clone, PartialEq)]
pub struct GifInfo {
    pub width: u16,
    pub height: u16,
    pub repeat: gif::Repeat,
}

#[derive(Debug, Default, Copy, Clone)]
pub struct GifDecoder {}

impl GifDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }

    pub fn decode_from<R: Read>(&self, input: R, timebase: Timebase) -> Result<Decoded<ImgVec<RGBA8>, GifInfo>, DecodeError> {
        let mut gif_opts = gif::DecodeOptions::new();
        // Important:
        gif_opts.set_color_output(gif::ColorOutput::Indexed);

        let mut decoder = gif_opts.read_info(input)?;
        let mut screen = gif_dispose::Screen::new_decoder(&decoder);
        let mut timeline = SourceTimeline::new();
        while let Some(frame) = decoder.read_next_frame()? {
            screen.blit_frame(frame)?;
            let pixels = screen.pixels_rgba().map_buf(|b| b.to_owned());
            timeline.push(pixels, timebase.from_centiseconds(frame.delay));
        }

        // the loop count extension may come after the first frame
        let meta = GifInfo {
            width: decoder.width(),
            height: decoder.height(),
            repeat: decoder.repeat(),
        };
        tracing::debug!(frames = timeline.len(), width = meta.width, height = meta.height, "decoded GIF");
        Ok(Decoded { timeline, meta })
    }
}

impl Decode for GifDecoder {
    type Image = ImgVec<RGBA8>;
    type Meta = GifInfo;

    fn decode(&self, path: &Path, timebase: Timebase) -> Result<Decoded<Self::Image, Self::Meta>, DecodeError> {
        let file = File::open(path)?;
        self.decode_from(BufReader::new(file), timebase)
    }
}
