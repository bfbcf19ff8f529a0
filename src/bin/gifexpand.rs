use clap::{crate_name, crate_version, value_parser, Arg, ArgAction, Command};
use gifexpand::progress::{NoProgress, ProgressReporter};
use gifexpand::{batch, Batch, FailurePolicy, FrameRate, GifDecoder, GifEncoder, Settings, ZeroDelay};
use std::ffi::OsString;
use std::num::NonZeroU8;
use std::path::Path;
use std::time::Duration;

pub type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

const EXAMPLES: &str = "\
Examples:
  gifexpand MyAnimation.gif Fixed.gif 25
      Reads MyAnimation.gif and writes a new fixed 25 fps GIF called Fixed.gif

  gifexpand \"*.gif\" -Fixed 25
      Converts every GIF in the current directory, and writes *-Fixed.gif files";

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        let mut last = e.to_string();
        let mut source = e.source();
        while let Some(e) = source {
            let msg = e.to_string();
            if !last.contains(&msg) {
                eprintln!("  caused by: {msg}");
            }
            last = msg;
            source = e.source();
        }
        std::process::exit(1);
    }
}

fn bin_main() -> BinResult<()> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("Converts variable frame rate GIFs to fixed frame rate GIFs for video conversion")
        .arg_required_else_help(true)
        .after_help(EXAMPLES)
        .arg(Arg::new("quiet")
            .long("quiet")
            .short('q')
            .action(ArgAction::SetTrue)
            .help("Do not display anything on standard output/console, other than errors"))
        .arg(Arg::new("verbose")
            .long("verbose")
            .short('v')
            .action(ArgAction::SetTrue)
            .conflicts_with("quiet")
            .help("Log what is being done to stderr"))
        .arg(Arg::new("jobs")
            .long("jobs")
            .short('j')
            .value_name("num")
            .value_parser(value_parser!(u8).range(1..))
            .help("Number of files to convert at the same time [default: number of CPUs]"))
        .arg(Arg::new("keep-going")
            .long("keep-going")
            .action(ArgAction::SetTrue)
            .help("Don't stop at the first file that fails to convert"))
        .arg(Arg::new("zero-delay")
            .long("zero-delay")
            .value_name("cs")
            .value_parser(value_parser!(u16).range(1..))
            .help("Show frames that have no delay for this many 1/100ths of a second.\n\
                   By default they're skipped, like ones shorter than the output frames"))
        .arg(Arg::new("repeat")
            .long("repeat")
            .value_name("num")
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i32).range(-1..=i64::from(u16::MAX)))
            .help("Number of times the animation is repeated (-1 none, 0 forever or <value> repetitions).\n\
                   By default the source file's setting is kept"))
        .arg(Arg::new("INPUT")
            .value_name("SOURCE... DESTINATION FPS")
            .help("Source GIF file, which can contain * and ? wildcards, followed by the destination file, \
                   and the target frames per second.\n\
                   If there are wildcards or several source files, the destination is a suffix added to each file name")
            .num_args(3..)
            .allow_hyphen_values(true)
            .value_parser(value_parser!(OsString))
            .required(true))
        .get_matches_from(wild::args_os());

    let quiet = matches.get_flag("quiet");
    init_logging(quiet, matches.get_flag("verbose"));

    let mut args: Vec<OsString> = matches.get_many::<OsString>("INPUT").ok_or("Missing files")?.cloned().collect();
    let fps = args.pop().ok_or("Missing FPS")?;
    let destination = args.pop().ok_or("Missing destination")?;
    let sources = args;

    let rate: FrameRate = fps.to_str().ok_or("FPS must be a number")?.parse()?;
    let mut settings = Settings {
        rate,
        jobs: matches.get_one::<u8>("jobs").copied().and_then(NonZeroU8::new),
        on_failure: if matches.get_flag("keep-going") { FailurePolicy::Continue } else { FailurePolicy::Halt },
        ..Settings::default()
    };
    if let Some(&cs) = matches.get_one::<u16>("zero-delay") {
        settings.zero_delay = ZeroDelay::Substitute(settings.timebase().from_centiseconds(cs));
    }
    let repeat = matches.get_one::<i32>("repeat").map(|&r| match r {
        -1 => gif::Repeat::Finite(0),
        0 => gif::Repeat::Infinite,
        n => gif::Repeat::Finite(n as u16),
    });

    let jobs = batch::plan(&sources, &destination)?;
    let num_jobs = jobs.len();
    if !quiet {
        match jobs.as_slice() {
            [job] => println!("Converting \"{}\" to \"{}\" at a fixed {}.", job.source.display(), job.destination.display(), rate),
            _ => println!("Converting {num_jobs} files at a fixed {rate}."),
        }
    }

    let mut pb;
    let mut nopb = NoProgress {};
    let progress: &mut dyn ProgressReporter = if quiet || num_jobs < 2 {
        &mut nopb
    } else {
        pb = pbr::ProgressBar::new(num_jobs as u64);
        pb.show_speed = false;
        pb.show_percent = false;
        pb.format(" #_. ");
        pb.message("File ");
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        &mut pb
    };

    let decoder = GifDecoder::new();
    let encoder = GifEncoder::new().with_repeat(repeat);
    let outcome = Batch::new(&decoder, &encoder, settings)?.run(jobs, progress)?;
    progress.done(&format!("Converted {} of {num_jobs} files", outcome.converted.len()));

    if !quiet {
        for report in &outcome.converted {
            println!("Successfully converted \"{}\" to \"{}\". New file contains {} frames.",
                file_name(&report.source), display_path(&report.destination), report.frames_written);
        }
    }

    if !outcome.is_success() {
        for err in &outcome.failed {
            eprintln!("error: {err}");
        }
        return Err(format!("{} of {num_jobs} files could not be converted", outcome.failed.len()).into());
    }
    Ok(())
}

fn init_logging(quiet: bool, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();
}

fn file_name(path: &Path) -> std::borrow::Cow<'_, str> {
    path.file_name().unwrap_or(path.as_os_str()).to_string_lossy()
}

fn display_path(path: &Path) -> String {
    let abs_path = dunce::canonicalize(path);
    abs_path.as_ref().map(|p| p.as_path()).unwrap_or(path).display().to_string()
}
