use std::io;
use std::num::TryFromIntError;
use std::path::PathBuf;
use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Internal error: a worker thread panicked, or a lock was poisoned by one
        ThreadSend {
            display("Internal error; unexpectedly aborted")
        }
        Aborted {
            display("aborted")
        }
        /// The target frame rate is zero, negative, or out of range
        InvalidRate(msg: String) {
            display("Invalid frame rate: {}", msg)
        }
        /// Delays add up to more than [`Ticks`][crate::Ticks] can count
        TooLong {
            display("The animation is too long to convert at this frame rate")
        }
        /// Invalid arguments or batch setup
        Config(msg: String) {
            display("{}", msg)
        }
        Decode(path: PathBuf, err: DecodeError) {
            display("Can't read \"{}\": {}", path.display(), err)
            source(err)
        }
        Encode(path: PathBuf, err: EncodeError) {
            display("Can't write \"{}\": {}", path.display(), err)
            source(err)
        }
        Io(err: io::Error) {
            from()
            display("I/O: {}", err)
            source(err)
        }
    }
}

quick_error! {
    /// Failure reported by a [`Decode`][crate::Decode] implementation
    #[derive(Debug)]
    pub enum DecodeError {
        Gif(err: gif::DecodingError) {
            display("GIF decoding error: {}", err)
            source(err)
        }
        Io(err: io::Error) {
            from()
            display("I/O: {}", err)
            source(err)
        }
        Pal(err: gif_dispose::Error) {
            from()
            display("gif dispose error: {}", err)
        }
    }
}

quick_error! {
    /// Failure reported by an [`Encode`][crate::Encode] implementation
    #[derive(Debug)]
    pub enum EncodeError {
        Gif(err: gif::EncodingError) {
            display("GIF encoding error: {}", err)
            source(err)
        }
        NoFrames {
            display("Found no usable frames to encode")
        }
        Io(err: io::Error) {
            from()
            display("I/O: {}", err)
            source(err)
        }
        Unsupported(msg: String) {
            display("{}", msg)
            from(e: TryFromIntError) -> (e.to_string())
        }
    }
}

pub type CatResult<T, E = Error> = Result<T, E>;

impl From<gif::DecodingError> for DecodeError {
    #[cold]
    fn from(err: gif::DecodingError) -> Self {
        match err {
            gif::DecodingError::Io(err) => err.into(),
            other => Self::Gif(other),
        }
    }
}

impl From<gif::EncodingError> for EncodeError {
    #[cold]
    fn from(err: gif::EncodingError) -> Self {
        match err {
            gif::EncodingError::Io(err) => err.into(),
            other => Self::Gif(other),
        }
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    #[cold]
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::ThreadSend
    }
}

impl From<crossbeam_channel::RecvError> for Error {
    #[cold]
    fn from(_: crossbeam_channel::RecvError) -> Self {
        Self::Aborted
    }
}

impl Error {
    /// Path of the file this error is about, if it's about a particular file
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Decode(path, _) | Self::Encode(path, _) => Some(path),
            _ => None,
        }
    }
}
