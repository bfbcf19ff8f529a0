//! Converting many files: wildcard resolution, output naming, and the worker pool

use crate::codec::{Decode, Encode};
use crate::error::{CatResult, Error};
use crate::minipool;
use crate::progress::ProgressReporter;
use crate::resample::{Resampled, Resampler, ZeroDelay};
use crate::timeline::{FrameRate, Timebase};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::num::NonZeroU8;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// What to do when one of the files can't be converted
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop taking new files, and return the first error
    #[default]
    Halt,
    /// Convert everything that can be converted, and collect the errors
    Continue,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Frame rate of the output
    pub rate: FrameRate,
    pub zero_delay: ZeroDelay,
    /// Number of files converted at the same time. Number of CPUs if not set.
    pub jobs: Option<NonZeroU8>,
    pub on_failure: FailurePolicy,
}

impl Settings {
    #[inline]
    #[must_use]
    pub fn timebase(&self) -> Timebase {
        Timebase::for_gif(self.rate)
    }
}

/// One file to convert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub source_frames: usize,
    pub frames_written: u64,
    /// Source frames too short to get an output frame of their own
    pub unrepresented_frames: usize,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub converted: Vec<FileReport>,
    /// Only with [`FailurePolicy::Continue`]
    pub failed: Vec<Error>,
}

impl BatchOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Turns command-line style inputs into a list of conversions.
///
/// A single plain `sources` path is written to `destination` as-is.
/// If there are several sources, or any of them has `*` or `?` in its file name,
/// `destination` is a suffix: `dir/name.gif` is written to `dir/name{suffix}.gif`.
///
/// Files that are the outputs of other jobs in the same batch are skipped,
/// so running the same command twice doesn't convert earlier outputs.
pub fn plan<S: AsRef<OsStr>>(sources: &[S], destination: &OsStr) -> CatResult<Vec<Job>> {
    if sources.is_empty() {
        return Err(Error::Config("Please specify input files".into()));
    }
    if destination.is_empty() {
        return Err(Error::Config("Please specify the destination".into()));
    }

    let suffix_mode = sources.len() > 1 || sources.iter().any(|s| is_pattern(Path::new(s)));
    let mut inputs = Vec::new();
    for source in sources {
        let source = Path::new(source);
        if is_pattern(source) {
            let matches = resolve_pattern(source)?;
            if matches.is_empty() {
                return Err(Error::Config(format!("No files match \"{}\"", source.display())));
            }
            inputs.extend(matches);
        } else {
            check_exists(source)?;
            inputs.push(source.to_path_buf());
        }
    }
    inputs.dedup();

    if !suffix_mode {
        let job = Job {
            source: inputs.swap_remove(0),
            destination: PathBuf::from(destination),
        };
        check_not_overwriting(&job)?;
        return Ok(vec![job]);
    }

    let suffix = destination.to_str()
        .ok_or_else(|| Error::Config("The file name suffix must be valid Unicode".into()))?;
    if suffix.contains(['/', '\\']) {
        return Err(Error::Config(format!("\"{suffix}\" can't be used as a file name suffix, because several input files were given")));
    }

    let jobs: Vec<_> = inputs.iter().map(|source| Job {
        destination: suffixed(source, suffix),
        source: source.clone(),
    }).collect();
    let mut planned = Vec::with_capacity(jobs.len());
    for job in &jobs {
        if jobs.iter().any(|other| other.destination == job.source) {
            tracing::debug!(path = %job.source.display(), "skipping output of another input");
            continue;
        }
        check_not_overwriting(job)?;
        planned.push(job.clone());
    }
    Ok(planned)
}

fn suffixed(source: &Path, suffix: &str) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    let ext = source.extension().map_or("gif".into(), |e| e.to_string_lossy());
    source.with_file_name(format!("{stem}{suffix}.{ext}"))
}

fn check_not_overwriting(job: &Job) -> CatResult<()> {
    let same = job.source == job.destination || match (fs::canonicalize(&job.source), fs::canonicalize(&job.destination)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(Error::Config(format!("\"{}\" would be overwritten by its own conversion", job.source.display())));
    }
    Ok(())
}

fn check_exists(path: &Path) -> CatResult<()> {
    if !path.is_file() {
        let mut msg = format!("Unable to find the input file: \"{}\"", path.display());
        if path.is_relative() {
            if let Ok(dir) = std::env::current_dir() {
                msg += &format!(" (searched in \"{}\")", dir.display());
            }
        }
        return Err(Error::Config(msg));
    }
    Ok(())
}

#[inline]
fn is_pattern(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.contains(['*', '?']))
}

/// Files in the pattern's directory (not subdirectories) with matching names, in natural order
fn resolve_pattern(pattern: &Path) -> CatResult<Vec<PathBuf>> {
    let name_pattern: Vec<char> = pattern.file_name().and_then(|n| n.to_str()).unwrap_or_default().chars().collect();
    let base = pattern.parent().unwrap_or(Path::new(""));
    if base.to_str().is_some_and(|b| b.contains(['*', '?'])) {
        return Err(Error::Config(format!("Wildcards are supported only in file names, not directories: \"{}\"", pattern.display())));
    }

    let dir = if base.as_os_str().is_empty() { Path::new(".") } else { base };
    let mut names: Vec<String> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::Config(format!("Can't list \"{}\": {}", dir.display(), e)))? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else { continue };
        if wildcard_match(&name_pattern, &name) && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort_by(|a, b| natord::compare(a, b));
    Ok(names.into_iter().map(|name| base.join(name)).collect())
}

/// `*` is any run of characters, `?` is exactly one
fn wildcard_match(pattern: &[char], name: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let same = |p: char, n: char| if cfg!(windows) { p.eq_ignore_ascii_case(&n) } else { p == n };

    let (mut p, mut n) = (0, 0);
    let mut backtrack = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            },
            Some(&c) if c == '?' || same(c, name[n]) => {
                p += 1;
                n += 1;
            },
            _ => match backtrack {
                // let the last star eat one more char
                Some((star_p, star_n)) => {
                    p = star_p + 1;
                    n = star_n + 1;
                    backtrack = Some((star_p, star_n + 1));
                },
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

/// Runs Decoder → Resampler → Encoder for each file
pub struct Batch<'a, D, E> {
    decoder: &'a D,
    encoder: &'a E,
    resampler: Resampler,
    settings: Settings,
}

impl<'a, D, E> Batch<'a, D, E> where D: Decode, E: Encode<D::Image, D::Meta> {
    pub fn new(decoder: &'a D, encoder: &'a E, settings: Settings) -> CatResult<Self> {
        let resampler = Resampler::new(settings.timebase().interval())?
            .with_zero_delay(settings.zero_delay);
        Ok(Self { decoder, encoder, resampler, settings })
    }

    /// Converts one file
    pub fn convert(&self, job: &Job) -> CatResult<FileReport> {
        let timebase = self.settings.timebase();
        tracing::debug!(source = %job.source.display(), destination = %job.destination.display(), "converting");

        let decoded = self.decoder.decode(&job.source, timebase)
            .map_err(|e| Error::Decode(job.source.clone(), e))?;
        let Resampled { timeline, stats } = self.resampler.resample(&decoded.timeline)
            .map_err(|e| Error::Config(format!("\"{}\": {}", job.source.display(), e)))?;
        if stats.unrepresented_frames > 0 {
            tracing::warn!("{}: {} of {} frames are too short to get an output frame of their own at {}",
                job.source.display(), stats.unrepresented_frames, stats.source_frames, self.settings.rate);
        }

        let frames_written = self.encoder.encode(&timeline, &decoded.meta, timebase, &job.destination)
            .map_err(|e| {
                remove_partial_output(&job.destination);
                Error::Encode(job.destination.clone(), e)
            })?;

        Ok(FileReport {
            source: job.source.clone(),
            destination: job.destination.clone(),
            source_frames: stats.source_frames,
            frames_written,
            unrepresented_frames: stats.unrepresented_frames,
        })
    }

    /// Converts files in parallel. Reports and errors are in the order of `jobs`.
    ///
    /// `progress.increase()` is called after every file, successful or not.
    /// Returning `false` from it aborts the batch with [`Error::Aborted`].
    /// Files that have already been written are left in place.
    ///
    /// With [`FailurePolicy::Halt`] the first failed file's error is returned.
    /// Other files that were being converted at the same time and failed too are logged.
    pub fn run(&self, jobs: Vec<Job>, progress: &mut dyn ProgressReporter) -> CatResult<BatchOutcome> {
        if jobs.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let threads = self.threads(jobs.len());
        let converted = Mutex::new(Vec::with_capacity(jobs.len()));
        let failed = Mutex::new(Vec::new());
        let progress = Mutex::new(progress);
        let cancelled = AtomicBool::new(false);
        let on_failure = self.settings.on_failure;

        let res = minipool::new(threads, "convert", |s| {
            for job in jobs.into_iter().enumerate() {
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }
                s.send(job)?;
            }
            Ok(())
        }, |(index, job): (usize, Job)| {
            if cancelled.load(Ordering::Relaxed) {
                return Err(Error::Aborted);
            }
            let res = self.convert(&job);
            if !progress.lock().map_err(|_| Error::ThreadSend)?.increase() {
                cancelled.store(true, Ordering::Relaxed);
                return Err(Error::Aborted);
            }
            match res {
                Ok(report) => converted.lock().map_err(|_| Error::ThreadSend)?.push((index, report)),
                Err(err) => {
                    tracing::debug!("{err}");
                    failed.lock().map_err(|_| Error::ThreadSend)?.push((index, err));
                    if on_failure == FailurePolicy::Halt {
                        // stops the other workers
                        return Err(Error::Aborted);
                    }
                },
            }
            Ok(())
        });

        let mut failed = failed.into_inner().map_err(|_| Error::ThreadSend)?;
        failed.sort_by_key(|&(index, _)| index);
        let mut failed = failed.into_iter().map(|(_, err)| err);

        if on_failure == FailurePolicy::Halt {
            if let Some(first) = failed.next() {
                for err in failed {
                    tracing::error!("{err}");
                }
                if let Err(err) = res {
                    if !matches!(err, Error::Aborted) {
                        tracing::error!("{err}");
                    }
                }
                return Err(first);
            }
        }
        res?;

        let mut converted = converted.into_inner().map_err(|_| Error::ThreadSend)?;
        converted.sort_by_key(|&(index, _)| index);
        Ok(BatchOutcome {
            converted: converted.into_iter().map(|(_, report)| report).collect(),
            failed: failed.collect(),
        })
    }

    fn threads(&self, num_jobs: usize) -> NonZeroU8 {
        let available = self.settings.jobs.map(NonZeroU8::get).unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, |n| n.get().min(255) as u8)
        });
        NonZeroU8::new(available.min(num_jobs.min(255) as u8)).unwrap_or(NonZeroU8::MIN)
    }
}

fn remove_partial_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed incomplete output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {},
        Err(e) => tracing::warn!("can't remove incomplete \"{}\": {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        wildcard_match(&pattern, name)
    }

    #[test]
    fn wildcards() {
        assert!(matches("*.gif", "a.gif"));
        assert!(matches("*.gif", ".gif"));
        assert!(!matches("*.gif", "a.gif.bak"));
        assert!(matches("a?c.gif", "abc.gif"));
        assert!(!matches("a?c.gif", "ac.gif"));
        assert!(matches("*-*.gif", "cat-walk-2.gif"));
        assert!(matches("**", ""));
        assert!(!matches("?", ""));
        assert!(matches("ünï*", "ünïcode"));
        assert!(matches("a*b*c", "aXbYbZc"));
        assert!(!matches("a*b*c", "aXbYbZ"));
    }

    #[test]
    fn pattern_detection() {
        assert!(is_pattern(Path::new("*.gif")));
        assert!(is_pattern(Path::new("dir/frame?.gif")));
        assert!(!is_pattern(Path::new("dir/frame.gif")));
    }

    #[test]
    fn suffix_naming() {
        assert_eq!(suffixed(Path::new("dir/cat.gif"), "-Fixed"), Path::new("dir/cat-Fixed.gif"));
        assert_eq!(suffixed(Path::new("cat.GIF"), "_25"), Path::new("cat_25.GIF"));
        assert_eq!(suffixed(Path::new("anim"), "-Fixed"), Path::new("anim-Fixed.gif"));
    }

    #[test]
    fn nothing_to_do() {
        let none: [&str; 0] = [];
        assert!(matches!(plan(&none, OsStr::new("out.gif")), Err(Error::Config(_))));
        assert!(matches!(plan(&["in.gif"], OsStr::new("")), Err(Error::Config(_))));
    }
}
