/*
 gifexpand variable to fixed frame rate GIF converter

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Converts animations where every frame has its own delay into ones where all frames
//! have the same delay, which is what video encoders want.
//!
//! Frames are duplicated (never blended, never dropped to reduce the rate) so that the
//! fixed-rate clock keeps up with the original one:
//!
//! ```
//! use gifexpand::{resample, SourceTimeline};
//!
//! let source: SourceTimeline<char> = [('A', 100), ('B', 50)].into_iter().collect();
//! let fixed = resample(&source, 40)?;
//! let frames: Vec<char> = fixed.iter().map(|f| *f.image).collect();
//! assert_eq!(frames, ['A', 'A', 'A', 'B']);
//! # Ok::<_, gifexpand::Error>(())
//! ```
//!
//! [`GifDecoder`] and [`GifEncoder`] re-time GIF files, keeping every screen exactly as it was shown,
//! and [`Batch`] converts many of them in parallel.

mod error;
pub use crate::error::*;
mod timeline;
pub use crate::timeline::*;
mod resample;
pub use crate::resample::*;
mod codec;
pub use crate::codec::*;
mod decode;
pub use crate::decode::{GifDecoder, GifInfo};
mod encode;
pub use crate::encode::GifEncoder;
pub mod batch;
pub use crate::batch::{Batch, BatchOutcome, FailurePolicy, FileReport, Job, Settings};
pub mod progress;
mod minipool;
