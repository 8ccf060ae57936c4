use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;
use env_logger::Builder;
use log::{error, info, warn, Level, LevelFilter};
use std::io::{Read, Write};
use std::path::PathBuf;
use unipatch::{
    apply_patchset, apply_to_bytes, parse_bytes, preview_diff, ApplyError, ApplyOptions,
    FileOutcome, FilePatch, FileReport, PatchOutcome,
};

const EXIT_APPLY_FAILED: i32 = 1;
const EXIT_BAD_INPUT: i32 = 2;
const EXIT_PERMISSION: i32 = 3;
const EXIT_FETCH_FAILED: i32 = 4;
const EXIT_USAGE: i32 = 5;

// --- Main Application Entry Point ---

fn main() {
    // Parse arguments by hand so that usage errors map to our exit code
    // instead of clap's default.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    setup_logging(&args);
    std::process::exit(run(args));
}

/// Contains the primary logic of the application.
fn run(args: Args) -> i32 {
    // --- Load the patch bytes (file, URL or stdin) ---
    let bytes = match load_patch(&args.patch) {
        Ok(bytes) => bytes,
        Err(LoadError::Fetch(e)) => {
            error!("failed to fetch '{}': {:#}", args.patch, e);
            return EXIT_FETCH_FAILED;
        }
        Err(LoadError::Read(e)) => {
            error!("{:#}", e);
            return EXIT_BAD_INPUT;
        }
    };

    // --- Parse ---
    let set = match parse_bytes(&bytes) {
        Ok(set) => set,
        Err(e) => {
            error!("{}", e);
            return EXIT_BAD_INPUT;
        }
    };
    if set.items.is_empty() {
        error!("no patch data found in '{}'", args.patch);
        return EXIT_BAD_INPUT;
    }
    if set.errors() > 0 {
        warn!(
            "{} patch item(s) could not be parsed and were dropped",
            set.errors()
        );
    }
    info!(
        "{} patch operation(s) to perform, dialect: {}",
        set.items.len(),
        set.dialect
    );

    if args.diffstat {
        println!("{}", set.diffstat());
        return 0;
    }

    // --- Apply ---
    let mut options = ApplyOptions::new()
        .with_strip(args.strip)
        .with_dry_run(args.dry_run)
        .with_fuzz(args.fuzz);
    if let Some(dir) = &args.directory {
        options = options.with_root(dir);
    }

    let working = if args.revert { set.inverted() } else { set };
    let report = apply_patchset(&working, &options);

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut permission = false;
    for (fp, file) in working.items.iter().zip(&report.files) {
        match &file.outcome {
            Ok(outcome) => {
                succeeded += 1;
                if args.dry_run {
                    show_preview(fp, file, &options, *outcome);
                }
            }
            Err(e) => {
                failed += 1;
                error!("failed to patch {}: {}", file.path.display(), e);
                if is_permission_error(e) {
                    permission = true;
                }
            }
        }
    }

    // --- Final summary ---
    info!("");
    info!("successful operations: {}", succeeded);
    info!("failed operations:     {}", failed);
    if args.dry_run {
        info!("dry run completed, no files were modified");
    }

    if failed > 0 {
        if permission {
            EXIT_PERMISSION
        } else {
            EXIT_APPLY_FAILED
        }
    } else {
        0
    }
}

// --- Helper Structs and Functions ---

/// Defines the command-line arguments for the application.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Parse unified diffs and apply them to local files.",
    long_about = "Parses plain, git, mercurial and subversion unified diffs, recovering from \
                  malformed input, and applies or reverts them with byte-exact output."
)]
struct Args {
    /// Patch source: a file path, an http(s) URL, or '-' for stdin.
    patch: String,

    /// Strip N leading path components from patched filenames.
    #[arg(short = 'p', long = "strip", value_name = "N", default_value_t = 0)]
    strip: usize,

    /// Root directory to resolve patched filenames against.
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Match every hunk but modify nothing; report whether the patch would apply.
    #[arg(long)]
    dry_run: bool,

    /// Apply the patch in reverse (unpatch).
    #[arg(long)]
    revert: bool,

    /// Print the diffstat histogram and exit.
    #[arg(long)]
    diffstat: bool,

    /// Maximum distance, in lines, a hunk may be shifted from its declared position.
    #[arg(long, value_name = "N", default_value_t = 0)]
    fuzz: usize,

    /// Print only warnings and errors.
    #[arg(short, long)]
    quiet: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

enum LoadError {
    Fetch(anyhow::Error),
    Read(anyhow::Error),
}

/// Obtains the raw patch bytes from a file path, an http(s) URL or stdin.
fn load_patch(source: &str) -> Result<Vec<u8>, LoadError> {
    if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read patch from stdin")
            .map_err(LoadError::Read)?;
        return Ok(buf);
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        info!("downloading {}", source);
        let response = reqwest::blocking::get(source)
            .and_then(|r| r.error_for_status())
            .context("request failed")
            .map_err(LoadError::Fetch)?;
        let bytes = response
            .bytes()
            .context("reading response body failed")
            .map_err(LoadError::Fetch)?;
        return Ok(bytes.to_vec());
    }
    std::fs::read(source)
        .with_context(|| format!("failed to read patch file '{}'", source))
        .map_err(LoadError::Read)
}

/// Prints the proposed changes for one file during a dry run.
fn show_preview(fp: &FilePatch, file: &FileReport, options: &ApplyOptions, outcome: FileOutcome) {
    if outcome != FileOutcome::DryRun {
        return;
    }
    let Ok(original) = std::fs::read(&file.path) else {
        return;
    };
    if let Ok(PatchOutcome::Patched(new_content)) = apply_to_bytes(fp, &original, options.fuzz) {
        let name = file.path.to_string_lossy();
        println!("{}", preview_diff(&original, &new_content, &name));
    }
}

fn is_permission_error(e: &ApplyError) -> bool {
    match e {
        ApplyError::PermissionDenied(_) => true,
        ApplyError::Io { source, .. } => source.kind() == std::io::ErrorKind::PermissionDenied,
        _ => false,
    }
}

/// Sets up the global logger with colored level prefixes.
fn setup_logging(args: &Args) {
    let level = if args.quiet {
        LevelFilter::Warn
    } else {
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    Builder::new()
        .filter_level(level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();
}
