//! A tolerant unified-diff parser and patch applier.
//!
//! `unipatch` reads unified diffs in the flavors produced by plain `diff -u`,
//! Git, Mercurial and Subversion, recovers from the malformed input that
//! real-world patches (mail clients, copy/paste, online editors) tend to
//! accumulate, and applies the result to local files with byte-exact output.
//!
//! The library operates on **bytes** end to end: patch content, hunk bodies
//! and filenames are all opaque byte sequences, and line terminators (`\n`,
//! `\r\n`, `\r`) are preserved exactly. Decoding for display is left to the
//! caller.
//!
//! ## Getting started
//!
//! Parsing and applying in memory:
//!
//! ```rust
//! use unipatch::{parse_bytes, apply_to_bytes, PatchOutcome};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let patch = b"--- a/greeting.txt\n+++ b/greeting.txt\n@@ -1 +1 @@\n-Hello World\n+Hello unipatch!\n";
//! let set = parse_bytes(patch)?;
//! assert_eq!(set.items.len(), 1);
//! assert_eq!(set.errors(), 0);
//!
//! let new = match apply_to_bytes(&set.items[0], b"Hello World\n", 0)? {
//!     PatchOutcome::Patched(bytes) => bytes,
//!     PatchOutcome::AlreadyApplied => unreachable!(),
//! };
//! assert_eq!(new, b"Hello unipatch!\n");
//! # Ok(())
//! # }
//! ```
//!
//! Applying a patch to files on disk:
//!
//! ```rust
//! use unipatch::{parse_bytes, apply_patchset, ApplyOptions};
//! use std::fs;
//! use tempfile::tempdir;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempdir()?;
//! fs::write(dir.path().join("greeting.txt"), "Hello World\n")?;
//!
//! let patch = b"--- a/greeting.txt\n+++ b/greeting.txt\n@@ -1 +1 @@\n-Hello World\n+Hello unipatch!\n";
//! let set = parse_bytes(patch)?;
//!
//! let options = ApplyOptions::new().with_strip(1).with_root(dir.path());
//! let report = apply_patchset(&set, &options);
//! assert!(report.all_succeeded());
//! assert_eq!(fs::read(dir.path().join("greeting.txt"))?, b"Hello unipatch!\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Key concepts
//!
//! ### Parsing
//!
//! [`parse_bytes()`], [`parse_file()`] and [`parse_reader()`] all produce a
//! [`PatchSet`]: an ordered list of [`FilePatch`] records, each holding the
//! [`Hunk`]s for one file. The parser is a single-pass state machine that
//! keeps going when it meets damaged input; anything it had to work around is
//! recorded as a [`ParseEvent`] on the set, and the derived
//! [`PatchSet::errors()`] / [`PatchSet::warnings()`] counts summarize how the
//! parse went. A hunk whose body did not satisfy its declared line counts is
//! kept but flagged [`Hunk::invalid`] so that application can refuse it.
//!
//! ### Dialects and filenames
//!
//! After parsing, each [`FilePatch`] is labelled with the [`Dialect`] its
//! headers indicate (git, mercurial, subversion or plain), and filenames are
//! normalized: quoting and trailing timestamps are removed, `a/`/`b/`
//! prefixes are dropped for git/mercurial patches, and `/dev/null` is kept as
//! the "this side is empty" sentinel. Creation and deletion entries parse
//! cleanly but are never executed.
//!
//! ### Matching and rewriting
//!
//! Application locates every hunk in the target file before any byte is
//! written. A hunk must match at its declared position, at a nearby offset
//! within the caller's *fuzz* window, or in reverse (which marks the hunk as
//! already applied). The rewriter then streams the file through the match
//! plan into a sibling temporary file and atomically renames it over the
//! target, so a failed apply always leaves the file byte-identical to its
//! pre-call state.

use log::{debug, info, trace, warn};
use similar::udiff::unified_diff;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- Error Types ---

/// Errors raised while obtaining patch input, before any parsing happens.
///
/// These are the only failures that prevent a [`PatchSet`] from being
/// returned at all. Structural problems *inside* the patch are recorded as
/// [`ParseEvent`]s on the set instead.
#[derive(Error, Debug)]
pub enum InputError {
    /// The input contained zero bytes.
    #[error("patch input is empty")]
    Empty,
    /// The patch file could not be read.
    #[error("failed to read patch input {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A patch stream could not be drained.
    #[error("failed to read patch stream: {0}")]
    Stream(#[source] std::io::Error),
}

/// A hunk that could not be located in the target file.
///
/// Returned by [`match_hunks()`] and wrapped into [`ApplyError::Mismatch`]
/// by the apply functions. `hunk` is 1-based (users count hunks from one),
/// `line` is the 1-based line in the target file where the hunk was
/// expected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("hunk #{hunk} does not match the target file near line {line}")]
pub struct MatchError {
    pub hunk: usize,
    pub line: usize,
}

/// Hard errors raised while applying a [`FilePatch`] to the filesystem.
///
/// Any of these aborts the rewrite of the affected file (leaving it
/// untouched) but does not stop sibling files in the same [`PatchSet`];
/// the per-file results are collected in an [`ApplyReport`].
#[derive(Error, Debug)]
pub enum ApplyError {
    /// The patched filename is absolute and `allow_absolute` was not set.
    #[error("path {0:?} is absolute; refusing to patch outside the working tree")]
    AbsolutePath(PathBuf),
    /// The patched filename escapes the working tree through `..`.
    #[error("path {0:?} escapes the working tree")]
    PathTraversal(PathBuf),
    /// Stripping `strip` leading components consumed the whole filename.
    #[error("stripping {strip} component(s) leaves nothing of {path:?}")]
    StripExhausted { path: PathBuf, strip: usize },
    /// The patch does not name a usable target file.
    #[error("patch does not name a usable target file")]
    EmptyTargetPath,
    /// The patch describes a file creation, deletion or rename, which the
    /// rewriter never executes.
    #[error("file {operation} is not supported: {path:?}")]
    UnsupportedFileOperation {
        path: PathBuf,
        operation: &'static str,
    },
    /// The target file does not exist.
    #[error("target file not found: {0:?}")]
    TargetNotFound(PathBuf),
    /// The target path exists but is a directory.
    #[error("target path is a directory, not a file: {0:?}")]
    TargetIsDirectory(PathBuf),
    /// The target file or its directory cannot be accessed.
    #[error("permission denied for path {0:?}")]
    PermissionDenied(PathBuf),
    /// The hunk was flagged invalid during parsing and cannot be applied.
    #[error("hunk #{hunk} was flagged invalid during parsing and cannot be applied")]
    InvalidHunk { hunk: usize },
    /// A hunk could not be located in the target file.
    #[error(transparent)]
    Mismatch(#[from] MatchError),
    /// Reading or writing the target file failed.
    #[error("I/O error while processing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn map_io_error(path: PathBuf, e: std::io::Error) -> ApplyError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ApplyError::TargetNotFound(path),
        std::io::ErrorKind::PermissionDenied => ApplyError::PermissionDenied(path),
        _ => ApplyError::Io { path, source: e },
    }
}

// --- Parse Events ---

/// How serious a recorded parse event is.
///
/// `Error` events mark a [`FilePatch`] that had to be dropped; `Warning`
/// events mark anomalies the parser recovered from while keeping the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One anomaly met during parsing, with the input line it originated from.
///
/// The [`PatchSet`] keeps every event in order; [`PatchSet::errors()`] and
/// [`PatchSet::warnings()`] are derived counts over this log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEvent {
    pub severity: Severity,
    /// 1-based line number in the parsed stream.
    pub line: usize,
    pub message: String,
}

// --- Options ---

/// Options controlling how a [`PatchSet`] is applied.
///
/// The default configuration strips nothing, resolves filenames against the
/// process working directory, writes the results, and requires every hunk to
/// match at its declared position.
///
/// # Example
///
/// ```rust
/// use unipatch::ApplyOptions;
///
/// let options = ApplyOptions::new()
///     .with_strip(1)
///     .with_fuzz(2)
///     .with_dry_run(true);
/// assert_eq!(options.strip, 1);
/// assert_eq!(options.fuzz, 2);
/// assert!(options.dry_run);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Number of leading path components removed from each patched filename
    /// before it is resolved. Counted against the filename as written in the
    /// patch, so `strip: 1` keeps its usual meaning for `a/`-prefixed git
    /// patches too.
    pub strip: usize,
    /// Directory that patched filenames are resolved against. `None` means
    /// the process working directory.
    pub root: Option<PathBuf>,
    /// Match every hunk but write nothing. The report carries the same
    /// verdict a real run would.
    pub dry_run: bool,
    /// Maximum distance, in lines, the matcher may move a hunk away from its
    /// declared position. `0` requires exact positions.
    pub fuzz: usize,
    /// Permit absolute filenames after stripping. Off by default; a patch
    /// naming `/etc/passwd` is rejected as a security error.
    pub allow_absolute: bool,
}

impl ApplyOptions {
    /// Creates the default options. Alias for `ApplyOptions::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options configured for a dry run.
    ///
    /// ```rust
    /// # use unipatch::ApplyOptions;
    /// assert!(ApplyOptions::dry_run().dry_run);
    /// ```
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    /// Sets the number of leading path components to strip.
    pub fn with_strip(mut self, strip: usize) -> Self {
        self.strip = strip;
        self
    }

    /// Sets the directory that patched filenames are resolved against.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Enables or disables dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the matcher's maximum search offset.
    pub fn with_fuzz(mut self, fuzz: usize) -> Self {
        self.fuzz = fuzz;
        self
    }

    /// Permits absolute target filenames.
    pub fn with_allow_absolute(mut self, allow: bool) -> Self {
        self.allow_absolute = allow;
        self
    }
}

// --- Data Model ---

/// The version-control flavor a patch was produced by.
///
/// Inferred per [`FilePatch`] from its header lines; the containing
/// [`PatchSet`] carries the common value, or [`Dialect::Mixed`] when its
/// items disagree. Individual items are never `Mixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Plain,
    Git,
    Mercurial,
    Subversion,
    Mixed,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dialect::Plain => "plain",
            Dialect::Git => "git",
            Dialect::Mercurial => "mercurial",
            Dialect::Subversion => "subversion",
            Dialect::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

const DEV_NULL: &[u8] = b"/dev/null";

/// One contiguous change block within one file.
///
/// `text` holds the body exactly as it appeared in the diff: every line is
/// prefixed with one of ` ` (context), `+` (addition), `-` (deletion) or
/// `\` (the "No newline at end of file" marker, which attaches to the line
/// before it), and keeps its original terminator.
///
/// # Example
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let set = unipatch::parse_bytes(
///     b"--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n ctx\n-old\n+new\n ctx2\n",
/// )?;
/// let hunk = &set.items[0].hunks[0];
/// assert_eq!(hunk.start_src, 1);
/// assert_eq!(hunk.lines_src, 3);
/// assert_eq!(hunk.source_lines(), vec![&b"ctx"[..], &b"old"[..], &b"ctx2"[..]]);
/// assert_eq!(hunk.target_lines(), vec![&b"ctx"[..], &b"new"[..], &b"ctx2"[..]]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based starting line in the source (pre-patch) file.
    pub start_src: usize,
    /// Number of source-side lines (` ` and `-`) the hunk covers.
    pub lines_src: usize,
    /// 1-based starting line in the target (post-patch) file.
    pub start_tgt: usize,
    /// Number of target-side lines (` ` and `+`) the hunk covers.
    pub lines_tgt: usize,
    /// Free-form trailing text from the `@@` header line.
    pub desc: Vec<u8>,
    /// The prefixed body lines, terminators included.
    pub text: Vec<Vec<u8>>,
    /// True when parsing finished but the body did not satisfy the declared
    /// line counts. Invalid hunks are kept for inspection and refused by the
    /// apply functions.
    pub invalid: bool,
}

impl Hunk {
    /// The lines this hunk expects to find in the source file: context and
    /// deletion lines, with prefixes and terminators stripped.
    pub fn source_lines(&self) -> Vec<&[u8]> {
        self.text
            .iter()
            .filter(|l| matches!(l.first().copied(), Some(b' ') | Some(b'-')))
            .map(|l| strip_eol(&l[1..]))
            .collect()
    }

    /// The lines this hunk produces in the target file: context and addition
    /// lines, with prefixes and terminators stripped.
    pub fn target_lines(&self) -> Vec<&[u8]> {
        self.text
            .iter()
            .filter(|l| matches!(l.first().copied(), Some(b' ') | Some(b'+')))
            .map(|l| strip_eol(&l[1..]))
            .collect()
    }

    /// Number of `+` lines.
    pub fn added(&self) -> usize {
        self.text.iter().filter(|l| l.starts_with(b"+")).count()
    }

    /// Number of `-` lines.
    pub fn removed(&self) -> usize {
        self.text.iter().filter(|l| l.starts_with(b"-")).count()
    }

    /// Creates the hunk that undoes this one: source and target roles are
    /// swapped and every `+` becomes a `-` and vice versa.
    ///
    /// ```rust
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let set = unipatch::parse_bytes(b"--- a/f\n+++ b/f\n@@ -1 +1 @@\n-old\n+new\n")?;
    /// let inverted = set.items[0].hunks[0].inverted();
    /// assert_eq!(inverted.text, vec![b"+old\n".to_vec(), b"-new\n".to_vec()]);
    /// assert_eq!(inverted.start_src, set.items[0].hunks[0].start_tgt);
    /// # Ok(())
    /// # }
    /// ```
    pub fn inverted(&self) -> Hunk {
        let text = self
            .text
            .iter()
            .map(|line| {
                let mut flipped = line.clone();
                match flipped.first().copied() {
                    Some(b'+') => flipped[0] = b'-',
                    Some(b'-') => flipped[0] = b'+',
                    _ => {}
                }
                flipped
            })
            .collect();
        Hunk {
            start_src: self.start_tgt,
            lines_src: self.lines_tgt,
            start_tgt: self.start_src,
            lines_tgt: self.lines_src,
            desc: self.desc.clone(),
            text,
            invalid: self.invalid,
        }
    }

    /// 0-based index in the source file where the hunk's content begins.
    /// A pure insertion (`lines_src == 0`) inserts *after* `start_src`.
    fn declared_src_index(&self) -> usize {
        if self.lines_src == 0 {
            self.start_src
        } else {
            self.start_src.saturating_sub(1)
        }
    }

    /// 0-based index in the target file where the hunk's content begins.
    fn declared_tgt_index(&self) -> usize {
        if self.lines_tgt == 0 {
            self.start_tgt
        } else {
            self.start_tgt.saturating_sub(1)
        }
    }

    /// Target-side content with its no-newline flags: one entry per emitted
    /// line, true when a `\` marker suppresses that line's terminator.
    fn target_entries(&self) -> Vec<(&[u8], bool)> {
        let mut entries: Vec<(&[u8], bool)> = Vec::new();
        for (i, line) in self.text.iter().enumerate() {
            match line.first().copied() {
                Some(b' ') | Some(b'+') => entries.push((strip_eol(&line[1..]), false)),
                Some(b'\\') => {
                    let prev = i
                        .checked_sub(1)
                        .and_then(|j| self.text.get(j))
                        .and_then(|l| l.first().copied());
                    if matches!(prev, Some(b' ') | Some(b'+')) {
                        if let Some(last) = entries.last_mut() {
                            last.1 = true;
                        }
                    }
                }
                _ => {}
            }
        }
        entries
    }
}

/// All the changes to one logical file.
///
/// Filenames are byte strings as they appeared in the patch, after
/// normalization (quote and timestamp removal, `a/`/`b/` prefix stripping
/// for git and mercurial patches). One side may be the `/dev/null` sentinel,
/// meaning the file did not exist on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// The raw header lines preceding `---`/`+++`, terminators included.
    pub header: Vec<Vec<u8>>,
    /// Normalized source (pre-patch) filename, or `/dev/null`.
    pub source: Vec<u8>,
    /// Normalized target (post-patch) filename, or `/dev/null`.
    pub target: Vec<u8>,
    /// The ordered, non-empty list of hunks.
    pub hunks: Vec<Hunk>,
    /// The dialect this item's headers indicate.
    pub dialect: Dialect,
    /// True when the normalizer removed `a/`/`b/` prefixes from the names.
    /// Strip accounting uses this so that `strip: 1` keeps counting against
    /// the filename as written in the patch.
    pub prefix_stripped: bool,
}

impl FilePatch {
    /// Total `+` lines across all hunks.
    pub fn added(&self) -> usize {
        self.hunks.iter().map(Hunk::added).sum()
    }

    /// Total `-` lines across all hunks.
    pub fn removed(&self) -> usize {
        self.hunks.iter().map(Hunk::removed).sum()
    }

    /// True when the source side is `/dev/null` (the patch creates a file).
    pub fn is_creation(&self) -> bool {
        self.source == DEV_NULL
    }

    /// True when the target side is `/dev/null` (the patch deletes a file).
    pub fn is_deletion(&self) -> bool {
        self.target == DEV_NULL
    }

    /// The filename this patch applies to.
    ///
    /// If source and target agree, that name; if one side is `/dev/null`,
    /// the other; otherwise the source name is preferred, matching the
    /// behavior of classic patch tools.
    ///
    /// ```rust
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let set = unipatch::parse_bytes(b"--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1 @@\n+hi\n")?;
    /// assert!(set.items[0].is_creation());
    /// assert_eq!(set.items[0].filename(), b"b/new.txt");
    /// # Ok(())
    /// # }
    /// ```
    pub fn filename(&self) -> &[u8] {
        if self.source == self.target {
            &self.source
        } else if self.source == DEV_NULL {
            &self.target
        } else {
            &self.source
        }
    }

    /// Creates the patch that undoes this one. Filenames are untouched.
    pub fn inverted(&self) -> FilePatch {
        FilePatch {
            header: self.header.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            hunks: self.hunks.iter().map(Hunk::inverted).collect(),
            dialect: self.dialect,
            prefix_stripped: self.prefix_stripped,
        }
    }
}

/// The parsed form of a whole patch stream.
///
/// Immutable after parsing: application reads it but never mutates it, so a
/// `PatchSet` can be shared freely across threads for concurrent read-only
/// use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    /// The per-file patches, in input order. Items the parser had to drop
    /// are not present; each drop is recorded as an error event.
    pub items: Vec<FilePatch>,
    /// The common dialect of all items, or [`Dialect::Mixed`].
    pub dialect: Dialect,
    /// Everything the parser had to work around, in input order.
    pub events: Vec<ParseEvent>,
}

impl PatchSet {
    /// Number of fatal per-item failures (each dropped one [`FilePatch`]).
    ///
    /// ```rust
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let set = unipatch::parse_bytes(b"no patch data here\n")?;
    /// assert!(set.items.is_empty());
    /// assert_eq!(set.errors(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn errors(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .count()
    }

    /// Number of recovered anomalies (items kept, possibly with
    /// [`Hunk::invalid`] hunks).
    pub fn warnings(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count()
    }

    /// Creates the patch set that undoes this one, for [`revert_patchset()`].
    /// The inverse carries no parse events of its own.
    pub fn inverted(&self) -> PatchSet {
        PatchSet {
            items: self.items.iter().map(FilePatch::inverted).collect(),
            dialect: self.dialect,
            events: Vec::new(),
        }
    }

    /// Serializes the set back into unified-diff bytes.
    ///
    /// Header lines are reproduced verbatim; filenames are the normalized
    /// ones. Parsing the result yields a structurally equal set of items.
    ///
    /// ```rust
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let set = unipatch::parse_bytes(b"--- a/f\n+++ b/f\n@@ -1 +1 @@\n-x\n+y\n")?;
    /// let reparsed = unipatch::parse_bytes(&set.to_bytes())?;
    /// assert_eq!(set.items, reparsed.items);
    /// # Ok(())
    /// # }
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for fp in &self.items {
            for line in &fp.header {
                out.extend_from_slice(line);
            }
            out.extend_from_slice(b"--- ");
            out.extend_from_slice(&fp.source);
            out.push(b'\n');
            out.extend_from_slice(b"+++ ");
            out.extend_from_slice(&fp.target);
            out.push(b'\n');
            for h in &fp.hunks {
                let head = format!(
                    "@@ -{},{} +{},{} @@",
                    h.start_src, h.lines_src, h.start_tgt, h.lines_tgt
                );
                out.extend_from_slice(head.as_bytes());
                if !h.desc.is_empty() {
                    out.push(b' ');
                    out.extend_from_slice(&h.desc);
                }
                out.push(b'\n');
                for line in &h.text {
                    out.extend_from_slice(line);
                }
            }
        }
        out
    }
}

// --- Application Results ---

/// The result of applying one [`FilePatch`] to in-memory bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The rewritten file content.
    Patched(Vec<u8>),
    /// Every hunk matched in reverse: the file is already in its post-patch
    /// state and nothing needs writing.
    AlreadyApplied,
}

/// The per-file verdict of a filesystem apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was rewritten and atomically replaced.
    Applied,
    /// The file was already in its post-patch state; nothing was written.
    AlreadyApplied,
    /// Dry-run mode: every hunk matched, nothing was written.
    DryRun,
}

/// The outcome for one file in an [`ApplyReport`].
#[derive(Debug)]
pub struct FileReport {
    /// The resolved target path (or the patch's own name when resolution
    /// itself failed).
    pub path: PathBuf,
    pub outcome: Result<FileOutcome, ApplyError>,
}

/// The collected per-file outcomes of [`apply_patchset()`] or
/// [`revert_patchset()`].
///
/// Files fail independently: one conflict does not stop sibling files, and
/// the overall verdict is the conjunction of the per-file outcomes.
#[derive(Debug)]
pub struct ApplyReport {
    pub files: Vec<FileReport>,
}

impl ApplyReport {
    /// True when every file either applied, was already applied, or passed
    /// its dry-run check.
    pub fn all_succeeded(&self) -> bool {
        self.files.iter().all(|f| f.outcome.is_ok())
    }

    /// The files that failed, in input order.
    pub fn failures(&self) -> Vec<&FileReport> {
        self.files.iter().filter(|f| f.outcome.is_err()).collect()
    }
}

// --- Source Reader ---

/// One line from a patch stream, as yielded by [`ByteLines`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number.
    pub number: usize,
    /// The line's bytes, terminator included. Empty on the EOF tick.
    pub bytes: &'a [u8],
    /// True for the single extra tick after the last line.
    pub eof: bool,
}

/// Line iterator over a byte buffer that preserves exact content.
///
/// Yields every line with its original terminator (`\n`, `\r\n`, `\r`, or
/// none at end of input), then one extra tick with an empty slice and `eof`
/// set, which lets consumers finalize without lookahead.
///
/// ```rust
/// use unipatch::ByteLines;
///
/// let mut lines = ByteLines::new(b"one\r\ntwo");
/// let first = lines.next().unwrap();
/// assert_eq!((first.number, first.bytes, first.eof), (1, &b"one\r\n"[..], false));
/// let second = lines.next().unwrap();
/// assert_eq!((second.number, second.bytes, second.eof), (2, &b"two"[..], false));
/// let tick = lines.next().unwrap();
/// assert!(tick.eof && tick.bytes.is_empty());
/// assert!(lines.next().is_none());
/// ```
pub struct ByteLines<'a> {
    data: &'a [u8],
    pos: usize,
    number: usize,
    done: bool,
}

impl<'a> ByteLines<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteLines {
            data,
            pos: 0,
            number: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for ByteLines<'a> {
    type Item = SourceLine<'a>;

    fn next(&mut self) -> Option<SourceLine<'a>> {
        if self.done {
            return None;
        }
        if self.pos >= self.data.len() {
            self.done = true;
            return Some(SourceLine {
                number: self.number + 1,
                bytes: &[],
                eof: true,
            });
        }
        let start = self.pos;
        let mut end = self.data.len();
        let mut i = self.pos;
        while i < self.data.len() {
            match self.data[i] {
                b'\n' => {
                    end = i + 1;
                    break;
                }
                b'\r' => {
                    end = if self.data.get(i + 1) == Some(&b'\n') {
                        i + 2
                    } else {
                        i + 1
                    };
                    break;
                }
                _ => i += 1,
            }
        }
        self.pos = end;
        self.number += 1;
        Some(SourceLine {
            number: self.number,
            bytes: &self.data[start..end],
            eof: false,
        })
    }
}

fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    ByteLines::new(data)
        .filter(|l| !l.eof)
        .map(|l| l.bytes)
        .collect()
}

fn strip_eol(line: &[u8]) -> &[u8] {
    if line.ends_with(b"\r\n") {
        &line[..line.len() - 2]
    } else if line.ends_with(b"\n") || line.ends_with(b"\r") {
        &line[..line.len() - 1]
    } else {
        line
    }
}

fn eol_of(line: &[u8]) -> &[u8] {
    &line[strip_eol(line).len()..]
}

/// The most frequent terminator in the file; ties and terminator-free files
/// fall back to `\n`.
fn dominant_eol(lines: &[&[u8]]) -> &'static [u8] {
    let (mut lf, mut crlf, mut cr) = (0usize, 0usize, 0usize);
    for line in lines {
        let eol = eol_of(line);
        if eol == b"\r\n" {
            crlf += 1;
        } else if eol == b"\n" {
            lf += 1;
        } else if eol == b"\r" {
            cr += 1;
        }
    }
    if crlf > lf && crlf >= cr {
        b"\r\n"
    } else if cr > lf && cr > crlf {
        b"\r"
    } else {
        b"\n"
    }
}

fn trim_bytes(mut bytes: &[u8]) -> &[u8] {
    while let Some((first, rest)) = bytes.split_first() {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let Some((last, rest)) = bytes.split_last() {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

fn display_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

// --- Parsing ---

/// Parses a patch from an in-memory buffer.
///
/// Only zero-byte input is fatal. Structural problems inside the patch are
/// recorded as [`ParseEvent`]s on the returned set: items that could not be
/// recovered are dropped (an error event each), recovered anomalies keep
/// their item and add a warning event.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let set = unipatch::parse_bytes(b"--- a/f\n+++ b/f\n@@ -1 +1 @@\n-x\n+y\ntrailing garbage\n")?;
/// assert_eq!(set.items.len(), 1);
/// assert_eq!(set.warnings(), 1);
/// assert!(unipatch::parse_bytes(b"").is_err());
/// # Ok(())
/// # }
/// ```
pub fn parse_bytes(input: &[u8]) -> Result<PatchSet, InputError> {
    if input.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(Parser::new().run(input))
}

/// Parses a patch file from disk.
pub fn parse_file(path: impl AsRef<Path>) -> Result<PatchSet, InputError> {
    let path = path.as_ref();
    debug!("reading {}", path.display());
    let bytes = fs::read(path).map_err(|e| InputError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_bytes(&bytes)
}

/// Drains a reader and parses its content. The reader's lifetime does not
/// extend past this call; the returned set owns all of its data.
pub fn parse_reader(mut reader: impl Read) -> Result<PatchSet, InputError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(InputError::Stream)?;
    parse_bytes(&buf)
}

// --- Parser State Machine ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Collecting header lines until a `---` (or swapped `+++`) shows up.
    Header,
    /// One filename captured, waiting for its counterpart.
    Counterpart,
    /// Expecting a `@@` hunk header.
    HunkHead,
    /// Consuming hunk body lines until the declared counts are satisfied.
    HunkBody,
    /// Recovering from an invalid hunk: seeking the next `@@` or `---`.
    HunkSkip,
    /// A hunk just completed; peeking at what comes next.
    AfterHunk,
}

struct HunkDraft {
    start_src: usize,
    lines_src: usize,
    start_tgt: usize,
    lines_tgt: usize,
    desc: Vec<u8>,
    text: Vec<Vec<u8>>,
    seen_src: usize,
    seen_tgt: usize,
    src_no_nl: bool,
    tgt_no_nl: bool,
    invalid: bool,
}

impl HunkDraft {
    fn complete(&self) -> bool {
        self.seen_src == self.lines_src && self.seen_tgt == self.lines_tgt
    }

    fn overrun(&self) -> bool {
        self.seen_src > self.lines_src || self.seen_tgt > self.lines_tgt
    }

    fn into_hunk(self) -> Hunk {
        Hunk {
            start_src: self.start_src,
            lines_src: self.lines_src,
            start_tgt: self.start_tgt,
            lines_tgt: self.lines_tgt,
            desc: self.desc,
            text: self.text,
            invalid: self.invalid,
        }
    }
}

struct FileDraft {
    header: Vec<Vec<u8>>,
    source: Vec<u8>,
    target: Vec<u8>,
    hunks: Vec<Hunk>,
    start_line: usize,
    ends_lf: usize,
    ends_crlf: usize,
    ends_cr: usize,
    mixed_warned: bool,
}

enum HunkHeader {
    NotAHeader,
    Invalid,
    Parsed(HunkDraft),
}

fn parse_hunk_header(line: &[u8]) -> HunkHeader {
    fn read_number(bytes: &[u8]) -> Option<(usize, &[u8])> {
        let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let value = std::str::from_utf8(&bytes[..digits]).ok()?.parse().ok()?;
        Some((value, &bytes[digits..]))
    }

    let Some(rest) = line.strip_prefix(b"@@ -") else {
        return HunkHeader::NotAHeader;
    };
    let Some((start_src, rest)) = read_number(rest) else {
        return HunkHeader::Invalid;
    };
    let (lines_src, rest) = match rest.strip_prefix(b",") {
        Some(r) => match read_number(r) {
            Some(v) => v,
            None => return HunkHeader::Invalid,
        },
        None => (1, rest),
    };
    let Some(rest) = rest.strip_prefix(b" +") else {
        return HunkHeader::Invalid;
    };
    let Some((start_tgt, rest)) = read_number(rest) else {
        return HunkHeader::Invalid;
    };
    let (lines_tgt, rest) = match rest.strip_prefix(b",") {
        Some(r) => match read_number(r) {
            Some(v) => v,
            None => return HunkHeader::Invalid,
        },
        None => (1, rest),
    };
    let Some(rest) = rest.strip_prefix(b" @@") else {
        return HunkHeader::Invalid;
    };
    let desc: Vec<u8> = if rest.is_empty() {
        Vec::new()
    } else if let Some(d) = rest.strip_prefix(b" ") {
        d.to_vec()
    } else {
        return HunkHeader::Invalid;
    };
    HunkHeader::Parsed(HunkDraft {
        start_src,
        lines_src,
        start_tgt,
        lines_tgt,
        desc,
        text: Vec::new(),
        seen_src: 0,
        seen_tgt: 0,
        src_no_nl: false,
        tgt_no_nl: false,
        invalid: false,
    })
}

/// Header prefixes that open a new per-file block. When one of these shows
/// up while an earlier block marker is already pending, the earlier header
/// belonged to a file whose body never arrived and is discarded.
fn is_block_marker(line: &[u8]) -> bool {
    line.starts_with(b"diff --git ")
        || line.starts_with(b"Index: ")
        || line.starts_with(b"diff -r ")
}

/// The filename bytes of a `--- `/`+++ ` line, or `None` when nothing
/// usable follows the prefix. Quote and timestamp removal happens later, in
/// normalization.
fn capture_name(raw: &[u8]) -> Option<Vec<u8>> {
    let rest = trim_bytes(strip_eol(&raw[4..]));
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_vec())
    }
}

struct Parser {
    state: State,
    pending_header: Vec<Vec<u8>>,
    first_name: Option<(Vec<u8>, bool)>,
    current: Option<FileDraft>,
    hunk: Option<HunkDraft>,
    drafts: Vec<FileDraft>,
    events: Vec<ParseEvent>,
    last_line: usize,
}

impl Parser {
    fn new() -> Self {
        Parser {
            state: State::Header,
            pending_header: Vec::new(),
            first_name: None,
            current: None,
            hunk: None,
            drafts: Vec::new(),
            events: Vec::new(),
            last_line: 0,
        }
    }

    fn warn_at(&mut self, line: usize, message: String) {
        warn!("{}", message);
        self.events.push(ParseEvent {
            severity: Severity::Warning,
            line,
            message,
        });
    }

    fn error_at(&mut self, line: usize, message: String) {
        warn!("{}", message);
        self.events.push(ParseEvent {
            severity: Severity::Error,
            line,
            message,
        });
    }

    fn run(mut self, input: &[u8]) -> PatchSet {
        for line in ByteLines::new(input) {
            self.last_line = line.number;
            if line.eof {
                break;
            }
            self.feed(line.number, line.bytes);
        }
        self.finish()
    }

    fn feed(&mut self, lineno: usize, raw: &[u8]) {
        let mut consumed = false;
        while !consumed {
            match self.state {
                State::Header => {
                    consumed = true;
                    if raw.starts_with(b"--- ") || raw.starts_with(b"+++ ") {
                        let is_target = raw.starts_with(b"+++ ");
                        match capture_name(raw) {
                            Some(name) => {
                                self.first_name = Some((name, is_target));
                                self.state = State::Counterpart;
                            }
                            None => {
                                self.warn_at(lineno, format!("invalid filename at line {}", lineno));
                                self.pending_header.push(raw.to_vec());
                            }
                        }
                    } else {
                        if is_block_marker(raw)
                            && self.pending_header.iter().any(|l| is_block_marker(l))
                        {
                            debug!("new patch header at line {} resets the pending header", lineno);
                            self.pending_header.clear();
                        }
                        self.pending_header.push(raw.to_vec());
                    }
                }
                State::Counterpart => {
                    let (first, first_is_target) =
                        self.first_name.clone().expect("counterpart state has a name");
                    if !first_is_target {
                        if raw.starts_with(b"+++ ") {
                            if let Some(target) = capture_name(raw) {
                                self.open_file(first, target, lineno);
                            } else {
                                self.error_at(
                                    lineno,
                                    format!(
                                        "skipping invalid patch with no target for '{}'",
                                        display_name(&first)
                                    ),
                                );
                                self.first_name = None;
                                self.state = State::Header;
                            }
                            consumed = true;
                        } else if raw.starts_with(b"--- ") {
                            if let Some(name) = capture_name(raw) {
                                self.warn_at(
                                    lineno,
                                    format!("skipping false patch for '{}'", display_name(&first)),
                                );
                                self.first_name = Some((name, false));
                            } else {
                                self.warn_at(lineno, format!("invalid filename at line {}", lineno));
                            }
                            consumed = true;
                        } else {
                            self.error_at(
                                lineno,
                                format!(
                                    "skipping invalid patch with no target for '{}'",
                                    display_name(&first)
                                ),
                            );
                            self.first_name = None;
                            self.state = State::Header;
                        }
                    } else if raw.starts_with(b"--- ") {
                        if let Some(source) = capture_name(raw) {
                            self.warn_at(
                                lineno,
                                "file header lines are swapped (+++ before ---)".to_string(),
                            );
                            self.open_file(source, first, lineno);
                        } else {
                            self.error_at(lineno, format!("invalid filename at line {}", lineno));
                            self.first_name = None;
                            self.state = State::Header;
                        }
                        consumed = true;
                    } else {
                        self.error_at(
                            lineno,
                            "skipping invalid patch with no source filename".to_string(),
                        );
                        self.first_name = None;
                        self.state = State::Header;
                    }
                }
                State::HunkHead => match parse_hunk_header(strip_eol(raw)) {
                    HunkHeader::Parsed(draft) => {
                        let complete = draft.complete();
                        self.hunk = Some(draft);
                        if complete {
                            // degenerate 0,0 hunk: no body follows
                            self.finish_hunk();
                            self.state = State::AfterHunk;
                        } else {
                            self.state = State::HunkBody;
                        }
                        consumed = true;
                    }
                    HunkHeader::Invalid => {
                        self.warn_at(
                            lineno,
                            format!("invalid hunk header at line {}, skipping hunk", lineno),
                        );
                        self.state = State::HunkSkip;
                        consumed = true;
                    }
                    HunkHeader::NotAHeader => {
                        let no_hunks_yet =
                            self.current.as_ref().map_or(true, |c| c.hunks.is_empty());
                        if no_hunks_yet && raw.starts_with(b"--- ") {
                            if let Some(name) = capture_name(raw) {
                                // duplicated file headers: the last pair before
                                // the first hunk wins
                                self.warn_at(
                                    lineno,
                                    "duplicated file header, keeping the last pair".to_string(),
                                );
                                if let Some(cur) = self.current.take() {
                                    self.pending_header = cur.header;
                                }
                                self.first_name = Some((name, false));
                                self.state = State::Counterpart;
                                consumed = true;
                                continue;
                            }
                        }
                        if no_hunks_yet && raw.starts_with(b"+++ ") {
                            if let Some(name) = capture_name(raw) {
                                self.warn_at(
                                    lineno,
                                    "duplicated target filename, keeping the last".to_string(),
                                );
                                if let Some(cur) = self.current.as_mut() {
                                    cur.target = name;
                                }
                                consumed = true;
                                continue;
                            }
                        }
                        if no_hunks_yet {
                            if let Some(cur) = self.current.take() {
                                self.error_at(
                                    lineno,
                                    format!(
                                        "skipping invalid patch with no hunks for '{}'",
                                        display_name(&cur.source)
                                    ),
                                );
                            }
                        } else {
                            self.close_current(lineno);
                        }
                        self.state = State::Header;
                    }
                },
                State::HunkBody => {
                    let blank = strip_eol(raw).is_empty();
                    if blank {
                        self.warn_at(
                            lineno,
                            "empty line inside hunk body treated as context".to_string(),
                        );
                    }
                    let line_vec: Vec<u8> = if blank {
                        let mut v = Vec::with_capacity(raw.len() + 1);
                        v.push(b' ');
                        v.extend_from_slice(raw);
                        v
                    } else {
                        raw.to_vec()
                    };
                    match line_vec.first().copied() {
                        Some(b' ') | Some(b'-') | Some(b'+') => {
                            let first = line_vec[0];
                            {
                                let hunk = self.hunk.as_mut().expect("hunk body state has a draft");
                                if first != b'+' {
                                    hunk.seen_src += 1;
                                }
                                if first != b'-' {
                                    hunk.seen_tgt += 1;
                                }
                                hunk.text.push(line_vec);
                            }
                            if let Some(cur) = self.current.as_mut() {
                                if raw.ends_with(b"\r\n") {
                                    cur.ends_crlf += 1;
                                } else if raw.ends_with(b"\n") {
                                    cur.ends_lf += 1;
                                } else if raw.ends_with(b"\r") {
                                    cur.ends_cr += 1;
                                }
                            }
                            let (overrun, complete) = {
                                let hunk = self.hunk.as_ref().expect("hunk body state has a draft");
                                (hunk.overrun(), hunk.complete())
                            };
                            if overrun {
                                self.warn_at(lineno, format!("extra lines for hunk at line {}", lineno));
                                if let Some(hunk) = self.hunk.as_mut() {
                                    hunk.invalid = true;
                                }
                                self.finish_hunk();
                                self.state = State::HunkSkip;
                            } else if complete {
                                self.finish_hunk();
                                self.check_line_ends(lineno);
                                self.state = State::AfterHunk;
                            }
                            consumed = true;
                        }
                        Some(b'\\') => {
                            let prev = self
                                .hunk
                                .as_ref()
                                .and_then(|h| h.text.last())
                                .and_then(|l| l.first().copied());
                            match prev {
                                Some(b' ') | Some(b'-') | Some(b'+') => {
                                    let duplicate = {
                                        let hunk =
                                            self.hunk.as_mut().expect("hunk body state has a draft");
                                        let mut duplicate = false;
                                        if prev != Some(b'+') {
                                            if hunk.src_no_nl {
                                                duplicate = true;
                                            }
                                            hunk.src_no_nl = true;
                                        }
                                        if prev != Some(b'-') {
                                            if hunk.tgt_no_nl {
                                                duplicate = true;
                                            }
                                            hunk.tgt_no_nl = true;
                                        }
                                        hunk.text.push(line_vec);
                                        duplicate
                                    };
                                    if duplicate {
                                        self.warn_at(
                                            lineno,
                                            "repeated no-newline marker in hunk".to_string(),
                                        );
                                        if let Some(hunk) = self.hunk.as_mut() {
                                            hunk.invalid = true;
                                        }
                                    }
                                }
                                _ => {
                                    self.warn_at(
                                        lineno,
                                        "stray no-newline marker in hunk body".to_string(),
                                    );
                                    if let Some(hunk) = self.hunk.as_mut() {
                                        hunk.text.push(line_vec);
                                    }
                                }
                            }
                            consumed = true;
                        }
                        _ => {
                            self.warn_at(lineno, format!("hunk body cut short at line {}", lineno));
                            if let Some(hunk) = self.hunk.as_mut() {
                                hunk.invalid = true;
                            }
                            self.finish_hunk();
                            self.state = State::HunkSkip;
                            // the terminating line is reprocessed in HunkSkip
                        }
                    }
                }
                State::HunkSkip => {
                    if raw.starts_with(b"@@ -") {
                        self.state = State::HunkHead;
                    } else if raw.starts_with(b"--- ") {
                        if let Some(name) = capture_name(raw) {
                            self.close_current(lineno);
                            self.first_name = Some((name, false));
                            self.state = State::Counterpart;
                        }
                        consumed = true;
                    } else {
                        consumed = true;
                    }
                }
                State::AfterHunk => {
                    if raw.starts_with(b"\\") {
                        // trailing no-newline marker for the hunk that just closed
                        if let Some(last) = self
                            .current
                            .as_mut()
                            .and_then(|cur| cur.hunks.last_mut())
                        {
                            last.text.push(raw.to_vec());
                        }
                        consumed = true;
                    } else if strip_eol(raw).is_empty() {
                        // peek past blank separator lines
                        consumed = true;
                    } else if raw.starts_with(b"@@ -") {
                        self.state = State::HunkHead;
                    } else if raw.starts_with(b"--- ") {
                        if let Some(name) = capture_name(raw) {
                            self.close_current(lineno);
                            self.first_name = Some((name, false));
                            self.state = State::Counterpart;
                            consumed = true;
                        } else {
                            self.close_current(lineno);
                            self.state = State::Header;
                        }
                    } else {
                        self.close_current(lineno);
                        self.state = State::Header;
                    }
                }
            }
        }
    }

    fn finish_hunk(&mut self) {
        if let Some(draft) = self.hunk.take() {
            if let Some(cur) = self.current.as_mut() {
                cur.hunks.push(draft.into_hunk());
            }
        }
    }

    fn check_line_ends(&mut self, lineno: usize) {
        let (mixed, name) = match self.current.as_ref() {
            Some(cur) => {
                let styles = (cur.ends_lf > 0) as usize
                    + (cur.ends_crlf > 0) as usize
                    + (cur.ends_cr > 0) as usize;
                (styles > 1 && !cur.mixed_warned, display_name(&cur.source))
            }
            None => (false, String::new()),
        };
        if mixed {
            if let Some(cur) = self.current.as_mut() {
                cur.mixed_warned = true;
            }
            self.warn_at(
                lineno,
                format!("inconsistent line endings in patch hunks for '{}'", name),
            );
        }
    }

    fn open_file(&mut self, source: Vec<u8>, target: Vec<u8>, lineno: usize) {
        self.close_current(lineno);
        let header = std::mem::take(&mut self.pending_header);
        self.current = Some(FileDraft {
            header,
            source,
            target,
            hunks: Vec::new(),
            start_line: lineno,
            ends_lf: 0,
            ends_crlf: 0,
            ends_cr: 0,
            mixed_warned: false,
        });
        self.first_name = None;
        self.state = State::HunkHead;
    }

    fn close_current(&mut self, lineno: usize) {
        let Some(mut draft) = self.current.take() else {
            return;
        };
        if draft.hunks.is_empty() {
            self.error_at(
                lineno,
                format!(
                    "skipping invalid patch with no hunks for '{}'",
                    display_name(&draft.source)
                ),
            );
            return;
        }
        // hunks must stay ordered by source position and must not overlap
        let mut prev_end = 0usize;
        let mut out_of_order = Vec::new();
        for (i, h) in draft.hunks.iter().enumerate() {
            if h.start_src < prev_end {
                out_of_order.push(i);
            } else {
                prev_end = h.start_src + h.lines_src;
            }
        }
        for &i in &out_of_order {
            draft.hunks[i].invalid = true;
        }
        if !out_of_order.is_empty() {
            self.warn_at(
                lineno,
                format!(
                    "out-of-order or overlapping hunks for '{}'",
                    display_name(&draft.source)
                ),
            );
        }
        self.drafts.push(draft);
    }

    fn finish(mut self) -> PatchSet {
        let last = self.last_line;
        match self.state {
            State::HunkBody => {
                self.warn_at(last, "patch stream is incomplete, hunk body cut short".to_string());
                if let Some(hunk) = self.hunk.as_mut() {
                    hunk.invalid = true;
                }
                self.finish_hunk();
                self.close_current(last);
            }
            State::Counterpart => {
                self.error_at(
                    last,
                    "skipping invalid patch with missing target filename".to_string(),
                );
            }
            State::Header | State::HunkHead | State::HunkSkip | State::AfterHunk => {
                self.close_current(last);
            }
        }
        if !self.pending_header.is_empty() && !self.drafts.is_empty() {
            let bytes: usize = self.pending_header.iter().map(|l| l.len()).sum();
            self.warn_at(last, format!("{} unparsed bytes left at the end of stream", bytes));
        }
        if self.drafts.is_empty() {
            self.error_at(last, "no patch data found".to_string());
        }

        debug!(
            "total files: {}  total hunks: {}",
            self.drafts.len(),
            self.drafts.iter().map(|d| d.hunks.len()).sum::<usize>()
        );

        let signals: Vec<Option<Dialect>> =
            self.drafts.iter().map(|d| detect_dialect(&d.header)).collect();
        let majority = majority_dialect(&signals);
        let drafts = std::mem::take(&mut self.drafts);
        let mut items = Vec::with_capacity(drafts.len());
        for (draft, signal) in drafts.into_iter().zip(signals) {
            let dialect = signal.or(majority).unwrap_or(Dialect::Plain);
            items.push(normalize_draft(draft, dialect, &mut self.events));
        }
        let dialect = patchset_dialect(&items);
        PatchSet {
            items,
            dialect,
            events: self.events,
        }
    }
}

// --- Format Detection & Filename Normalization ---

/// The strongest dialect signal in a header, git > mercurial > subversion.
fn detect_dialect(header: &[Vec<u8>]) -> Option<Dialect> {
    let mut git = false;
    let mut hg = false;
    let mut svn = false;
    for line in header {
        if line.starts_with(b"diff --git ")
            || line.starts_with(b"rename from ")
            || line.starts_with(b"rename to ")
        {
            git = true;
        } else if line.starts_with(b"diff -r ") || line.starts_with(b"# HG changeset patch") {
            hg = true;
        } else if line.starts_with(b"Index: ") {
            svn = true;
        }
    }
    if git {
        Some(Dialect::Git)
    } else if hg {
        Some(Dialect::Mercurial)
    } else if svn {
        Some(Dialect::Subversion)
    } else {
        None
    }
}

/// The dialect signalled by more than half of the set's items, used to tag
/// the unsignalled ones. Anything short of a strict majority yields nothing.
fn majority_dialect(signals: &[Option<Dialect>]) -> Option<Dialect> {
    let mut counts = [
        (Dialect::Git, 0usize),
        (Dialect::Mercurial, 0usize),
        (Dialect::Subversion, 0usize),
    ];
    for signal in signals.iter().flatten() {
        for entry in counts.iter_mut() {
            if entry.0 == *signal {
                entry.1 += 1;
            }
        }
    }
    counts
        .iter()
        .find(|e| e.1 * 2 > signals.len())
        .map(|e| e.0)
}

fn patchset_dialect(items: &[FilePatch]) -> Dialect {
    let mut dialects = items.iter().map(|i| i.dialect);
    match dialects.next() {
        None => Dialect::Plain,
        Some(first) => {
            if dialects.all(|d| d == first) {
                first
            } else {
                Dialect::Mixed
            }
        }
    }
}

/// Removes the trailing tab-delimited timestamp and surrounding quotes from
/// a filename as written on a `---`/`+++` line.
fn normalize_name(raw: &[u8]) -> Vec<u8> {
    let cut = match raw.iter().position(|&b| b == b'\t') {
        Some(i) => &raw[..i],
        None => raw,
    };
    let trimmed = trim_bytes(cut);
    let unquoted = if trimmed.len() >= 2 && trimmed.first() == Some(&b'"') && trimmed.last() == Some(&b'"')
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unquoted.to_vec()
}

fn normalize_draft(draft: FileDraft, dialect: Dialect, events: &mut Vec<ParseEvent>) -> FilePatch {
    let line = draft.start_line;
    let mut source = normalize_name(&draft.source);
    let mut target = normalize_name(&draft.target);
    let mut prefix_stripped = false;

    if matches!(dialect, Dialect::Git | Dialect::Mercurial) {
        let src_ok = source == DEV_NULL || source.starts_with(b"a/");
        let tgt_ok = target == DEV_NULL || target.starts_with(b"b/");
        if src_ok && tgt_ok {
            debug!("stripping a/ and b/ prefixes");
            if source != DEV_NULL {
                source.drain(..2);
                prefix_stripped = true;
            }
            if target != DEV_NULL {
                target.drain(..2);
                prefix_stripped = true;
            }
        } else {
            let message = format!(
                "missing a/ b/ prefixes on {} patch filenames at line {}",
                dialect, line
            );
            warn!("{}", message);
            events.push(ParseEvent {
                severity: Severity::Warning,
                line,
                message,
            });
        }
    }

    if source != DEV_NULL {
        source = path_normalize(&source);
    }
    if target != DEV_NULL {
        target = path_normalize(&target);
    }

    for (label, name) in [("source", &source), ("target", &target)] {
        if name.as_slice() == DEV_NULL {
            continue;
        }
        let message = if name.as_slice() == b".." || name.starts_with(b"../") {
            Some(format!(
                "{} filename '{}' references the parent directory",
                label,
                display_name(name)
            ))
        } else if path_is_absolute(name) {
            Some(format!(
                "{} filename '{}' is absolute",
                label,
                display_name(name)
            ))
        } else {
            None
        };
        if let Some(message) = message {
            warn!("{}", message);
            events.push(ParseEvent {
                severity: Severity::Warning,
                line,
                message,
            });
        }
    }

    FilePatch {
        header: draft.header,
        source,
        target,
        hunks: draft.hunks,
        dialect,
        prefix_stripped,
    }
}

// --- Path Utilities ---

/// Cross-platform absolute-path test for byte-string filenames.
///
/// Recognizes a leading `/` or `\`, a Windows drive (`C:/` or `C:\`) and
/// UNC paths. Both separators count on every host.
///
/// ```rust
/// use unipatch::path_is_absolute;
///
/// assert!(path_is_absolute(b"/usr/bin/env"));
/// assert!(path_is_absolute(br"C:\temp\x"));
/// assert!(path_is_absolute(br"\\server\share"));
/// assert!(!path_is_absolute(b"src/lib.rs"));
/// assert!(!path_is_absolute(b"./relative"));
/// ```
pub fn path_is_absolute(path: &[u8]) -> bool {
    if path.starts_with(b"/") || path.starts_with(b"\\") {
        return true;
    }
    path.len() >= 3
        && path[0].is_ascii_alphabetic()
        && path[1] == b':'
        && (path[2] == b'/' || path[2] == b'\\')
}

/// Normalizes a byte-string path: maps `\` to `/`, collapses repeated
/// separators and resolves `.` and `..` components. A `..` that would climb
/// above the start of a relative path is preserved, not dropped; rejecting
/// it is the caller's decision.
///
/// ```rust
/// use unipatch::path_normalize;
///
/// assert_eq!(path_normalize(b"a//b/./c/../d"), b"a/b/d");
/// assert_eq!(path_normalize(br"dir\sub\file"), b"dir/sub/file");
/// assert_eq!(path_normalize(b"../escape"), b"../escape");
/// assert_eq!(path_normalize(b"a/.."), b".");
/// ```
pub fn path_normalize(path: &[u8]) -> Vec<u8> {
    let absolute = path.starts_with(b"/") || path.starts_with(b"\\");
    let mut stack: Vec<&[u8]> = Vec::new();
    for component in path.split(|&b| b == b'/' || b == b'\\') {
        if component.is_empty() || component == b"." {
            continue;
        }
        if component == b".." {
            match stack.last() {
                Some(top) if *top != b".." => {
                    stack.pop();
                }
                _ => {
                    if !absolute {
                        stack.push(component);
                    }
                }
            }
        } else {
            stack.push(component);
        }
    }
    let mut out: Vec<u8> = Vec::new();
    if absolute {
        out.push(b'/');
    }
    for (i, component) in stack.iter().enumerate() {
        if i > 0 {
            out.push(b'/');
        }
        out.extend_from_slice(component);
    }
    if out.is_empty() {
        out.push(b'.');
    }
    out
}

/// Removes the first `n` separator-delimited components from a byte-string
/// path. A run of separators counts once, and a leading separator counts as
/// the first boundary. Returns an empty vector when the path has `n` or
/// fewer components; callers reject that case.
///
/// ```rust
/// use unipatch::path_strip_components;
///
/// assert_eq!(path_strip_components(b"a/b/c.txt", 0), b"a/b/c.txt");
/// assert_eq!(path_strip_components(b"a/b/c.txt", 1), b"b/c.txt");
/// assert_eq!(path_strip_components(b"a/b/c.txt", 2), b"c.txt");
/// assert_eq!(path_strip_components(b"/usr/local", 1), b"usr/local");
/// assert_eq!(path_strip_components(b"c.txt", 1), b"");
/// ```
pub fn path_strip_components(path: &[u8], n: usize) -> Vec<u8> {
    let mut pos = 0usize;
    for _ in 0..n {
        match path[pos..].iter().position(|&b| b == b'/' || b == b'\\') {
            Some(sep) => {
                pos += sep;
                while pos < path.len() && (path[pos] == b'/' || path[pos] == b'\\') {
                    pos += 1;
                }
                if pos >= path.len() {
                    return Vec::new();
                }
            }
            None => return Vec::new(),
        }
    }
    path[pos..].to_vec()
}

fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    #[cfg(unix)]
    {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        PathBuf::from(OsStr::from_bytes(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
    }
}

// --- Hunk Matching ---

/// Where one hunk was located in the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkMatch {
    /// 0-based index of the hunk in its [`FilePatch`].
    pub hunk: usize,
    /// 0-based line index in the target file where the hunk's content begins.
    pub position: usize,
    /// Distance from the declared position. Committed to the running shift
    /// that biases the hunks after this one.
    pub offset: isize,
    /// True when the hunk's *target* side matched instead: the change is
    /// already present in the file.
    pub already_applied: bool,
}

/// Locates every hunk of a patch in `target_lines` (the file's lines,
/// terminators included).
///
/// Comparison strips terminators, so a hunk matches across `\n`/`\r\n`
/// variants of the same content. Each hunk is tried at its declared
/// position, then at offsets `+1, -1, +2, -2, …` out to `fuzz`. The offset
/// of a located hunk biases the search start of the hunks after it, so
/// cascading shifts still line up. A hunk that fails forward is probed in
/// reverse at its declared target position; a reverse match marks it
/// already applied. The first hunk that matches neither way fails the plan.
pub fn match_hunks(
    hunks: &[Hunk],
    target_lines: &[&[u8]],
    fuzz: usize,
) -> Result<Vec<HunkMatch>, MatchError> {
    let stripped: Vec<&[u8]> = target_lines.iter().map(|l| strip_eol(l)).collect();
    let mut plan = Vec::with_capacity(hunks.len());
    let mut shift = 0isize;
    let mut floor = 0usize; // matched regions must not run backwards
    for (index, hunk) in hunks.iter().enumerate() {
        let expected = hunk.source_lines();
        let declared = hunk.declared_src_index();
        let base = (declared as isize + shift).clamp(0, stripped.len() as isize);
        let mut found = None;
        'search: for distance in 0..=fuzz as isize {
            for offset in [distance, -distance] {
                let position = base + offset;
                if position >= floor as isize
                    && position as usize + expected.len() <= stripped.len()
                    && stripped[position as usize..position as usize + expected.len()]
                        == expected[..]
                {
                    found = Some(position as usize);
                    break 'search;
                }
                if distance == 0 {
                    break;
                }
            }
        }
        if let Some(position) = found {
            let offset = position as isize - declared as isize;
            if offset != 0 {
                debug!("hunk #{} matched at offset {}", index + 1, offset);
            }
            shift = offset;
            floor = position + expected.len();
            plan.push(HunkMatch {
                hunk: index,
                position,
                offset,
                already_applied: false,
            });
            continue;
        }
        // reverse probe: is the change already present in the file?
        let produced = hunk.target_lines();
        let target_declared = hunk.declared_tgt_index();
        if target_declared + produced.len() <= stripped.len()
            && stripped[target_declared..target_declared + produced.len()] == produced[..]
        {
            trace!("hunk #{} already present at its target position", index + 1);
            floor = target_declared + produced.len();
            plan.push(HunkMatch {
                hunk: index,
                position: target_declared,
                offset: 0,
                already_applied: true,
            });
            continue;
        }
        return Err(MatchError {
            hunk: index + 1,
            line: declared + 1,
        });
    }
    Ok(plan)
}

// --- Rewriting & Application ---

/// Streams the target's lines through a located plan and produces the new
/// file content. Unmodified lines are copied verbatim; replaced lines adopt
/// the terminator of the source line they displace, falling back to the
/// file's dominant terminator, and `\` markers suppress or restore the
/// final terminator as the hunk dictates.
fn rewrite_lines(target_lines: &[&[u8]], hunks: &[Hunk], plan: &[HunkMatch]) -> Vec<u8> {
    let dominant = dominant_eol(target_lines);
    let mut out = Vec::with_capacity(target_lines.iter().map(|l| l.len()).sum());
    let mut cursor = 0usize;
    for located in plan {
        if located.already_applied {
            continue;
        }
        let hunk = &hunks[located.hunk];
        for line in &target_lines[cursor..located.position] {
            out.extend_from_slice(line);
        }
        let consumed = hunk.source_lines().len();
        let entries = hunk.target_entries();
        let last = entries.len().checked_sub(1);
        for (k, (content, no_newline)) in entries.iter().enumerate() {
            out.extend_from_slice(content);
            if *no_newline && Some(k) == last {
                continue; // the target side ends without a terminator
            }
            let eol = if k < consumed {
                match target_lines.get(located.position + k) {
                    Some(source) if !eol_of(source).is_empty() => eol_of(source),
                    _ => dominant,
                }
            } else {
                dominant
            };
            out.extend_from_slice(eol);
        }
        cursor = located.position + consumed;
    }
    for line in &target_lines[cursor..] {
        out.extend_from_slice(line);
    }
    out
}

/// Applies one [`FilePatch`] to in-memory content.
///
/// Pure function of the patch and the bytes: nothing touches the
/// filesystem. Refuses patches with [`Hunk::invalid`] hunks. Returns the
/// rewritten content, or [`PatchOutcome::AlreadyApplied`] when every hunk
/// matches in reverse.
pub fn apply_to_bytes(
    fp: &FilePatch,
    original: &[u8],
    fuzz: usize,
) -> Result<PatchOutcome, ApplyError> {
    for (i, hunk) in fp.hunks.iter().enumerate() {
        if hunk.invalid {
            return Err(ApplyError::InvalidHunk { hunk: i + 1 });
        }
    }
    let lines = split_lines(original);
    let plan = match_hunks(&fp.hunks, &lines, fuzz)?;
    if !plan.is_empty() && plan.iter().all(|m| m.already_applied) {
        return Ok(PatchOutcome::AlreadyApplied);
    }
    Ok(PatchOutcome::Patched(rewrite_lines(&lines, &fp.hunks, &plan)))
}

/// Checks whether `fp` would apply cleanly to `original`, without writing.
/// An already-applied file counts as clean. This is the "can patch" probe;
/// a small fuzz window is commonly passed here.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let set = unipatch::parse_bytes(b"--- a/t\n+++ b/t\n@@ -1 +1 @@\n-old\n+new\n")?;
/// assert!(unipatch::can_apply(&set.items[0], b"old\n", 0));
/// assert!(!unipatch::can_apply(&set.items[0], b"other\n", 0));
/// # Ok(())
/// # }
/// ```
pub fn can_apply(fp: &FilePatch, original: &[u8], fuzz: usize) -> bool {
    if fp.hunks.iter().any(|h| h.invalid) {
        return false;
    }
    let lines = split_lines(original);
    match_hunks(&fp.hunks, &lines, fuzz).is_ok()
}

/// Strips, normalizes and resolves the filename a [`FilePatch`] applies to,
/// enforcing the security rules: a result that is absolute is rejected
/// unless explicitly permitted, and a result escaping the root through `..`
/// is always rejected.
fn resolve_target_path(fp: &FilePatch, options: &ApplyOptions) -> Result<PathBuf, ApplyError> {
    let name = fp.filename();
    if name.is_empty() {
        return Err(ApplyError::EmptyTargetPath);
    }
    // `strip` counts components of the name as written in the patch; when
    // the normalizer already removed a/ or b/, one level is accounted for.
    let effective_strip = if fp.prefix_stripped {
        options.strip.saturating_sub(1)
    } else {
        options.strip
    };
    let stripped = path_strip_components(name, effective_strip);
    if stripped.is_empty() {
        return Err(ApplyError::StripExhausted {
            path: bytes_to_path(name),
            strip: options.strip,
        });
    }
    let normalized = path_normalize(&stripped);
    if normalized.as_slice() == b".." || normalized.starts_with(b"../") {
        return Err(ApplyError::PathTraversal(bytes_to_path(&normalized)));
    }
    if path_is_absolute(&normalized) && !options.allow_absolute {
        return Err(ApplyError::AbsolutePath(bytes_to_path(&normalized)));
    }
    let relative = bytes_to_path(&normalized);
    Ok(match &options.root {
        Some(root) => root.join(&relative),
        None => relative,
    })
}

fn apply_to_path(
    fp: &FilePatch,
    path: &Path,
    options: &ApplyOptions,
) -> Result<FileOutcome, ApplyError> {
    let metadata = fs::metadata(path).map_err(|e| map_io_error(path.to_path_buf(), e))?;
    if metadata.is_dir() {
        return Err(ApplyError::TargetIsDirectory(path.to_path_buf()));
    }
    let original = fs::read(path).map_err(|e| map_io_error(path.to_path_buf(), e))?;
    match apply_to_bytes(fp, &original, options.fuzz)? {
        PatchOutcome::AlreadyApplied => {
            warn!("already applied: {}", path.display());
            Ok(FileOutcome::AlreadyApplied)
        }
        PatchOutcome::Patched(new_content) => {
            if options.dry_run {
                Ok(FileOutcome::DryRun)
            } else {
                atomic_replace(path, &new_content, metadata.permissions())?;
                Ok(FileOutcome::Applied)
            }
        }
    }
}

/// Writes `bytes` to a sibling temporary file, syncs it, carries over the
/// original permissions and renames it over `path`. The original is never
/// left half-written: any failure before the rename leaves it untouched.
fn atomic_replace(path: &Path, bytes: &[u8], permissions: fs::Permissions) -> Result<(), ApplyError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| map_io_error(dir.to_path_buf(), e))?;
    tmp.write_all(bytes)
        .map_err(|e| map_io_error(path.to_path_buf(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| map_io_error(path.to_path_buf(), e))?;
    fs::set_permissions(tmp.path(), permissions)
        .map_err(|e| map_io_error(path.to_path_buf(), e))?;
    tmp.persist(path).map_err(|e| ApplyError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Applies every item of a [`PatchSet`] to the filesystem.
///
/// Files fail independently: a conflict in one file leaves that file
/// byte-identical to its pre-call state and does not stop the others. The
/// returned [`ApplyReport`] holds one entry per item, in input order, and
/// its [`all_succeeded()`](ApplyReport::all_succeeded) is the conjunction
/// of the per-file outcomes. Creation and deletion entries are reported as
/// unsupported; they are never executed.
pub fn apply_patchset(set: &PatchSet, options: &ApplyOptions) -> ApplyReport {
    let total = set.items.len();
    let mut files = Vec::with_capacity(total);
    for (i, fp) in set.items.iter().enumerate() {
        let display_path = bytes_to_path(fp.filename());
        if fp.is_creation() || fp.is_deletion() {
            let operation = if fp.is_creation() { "creation" } else { "deletion" };
            warn!(
                "skipping unsupported file {}: {}",
                operation,
                display_path.display()
            );
            files.push(FileReport {
                path: display_path.clone(),
                outcome: Err(ApplyError::UnsupportedFileOperation {
                    path: display_path,
                    operation,
                }),
            });
            continue;
        }
        let path = match resolve_target_path(fp, options) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}", e);
                files.push(FileReport {
                    path: display_path,
                    outcome: Err(e),
                });
                continue;
            }
        };
        info!("processing {}/{}: {}", i + 1, total, path.display());
        let outcome = apply_to_path(fp, &path, options);
        match &outcome {
            Ok(FileOutcome::Applied) => {
                info!("successfully patched {}/{}: {}", i + 1, total, path.display());
            }
            Ok(FileOutcome::AlreadyApplied) => {}
            Ok(FileOutcome::DryRun) => {
                info!("dry run: {} would apply cleanly", path.display());
            }
            Err(e) => warn!("{}", e),
        }
        files.push(FileReport { path, outcome });
    }
    ApplyReport { files }
}

/// Applies the set in reverse, undoing a prior [`apply_patchset()`]. A
/// forward apply followed by a revert restores every file byte for byte.
pub fn revert_patchset(set: &PatchSet, options: &ApplyOptions) -> ApplyReport {
    apply_patchset(&set.inverted(), options)
}

// --- Diffstat ---

impl PatchSet {
    /// Renders the classic diffstat histogram: one row per file with its
    /// change count and `+`/`-` bars scaled to fit an 80-column line, then a
    /// summary line with total insertions, deletions and the byte delta.
    ///
    /// ```rust
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let set = unipatch::parse_bytes(b"--- a/t\n+++ b/t\n@@ -1 +1 @@\n-four\n+five\n")?;
    /// let stat = set.diffstat();
    /// assert!(stat.contains("a/t | 2 +-"));
    /// assert!(stat.contains("1 files changed, 1 insertions(+), 1 deletions(-)"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn diffstat(&self) -> String {
        let mut names = Vec::new();
        let mut inserted = Vec::new();
        let mut deleted = Vec::new();
        let mut delta = 0i64;
        let mut namelen = 0usize;
        let mut maxdiff = 0usize;
        for fp in &self.items {
            let mut ins = 0usize;
            let mut del = 0usize;
            for h in &fp.hunks {
                for line in &h.text {
                    if line.starts_with(b"+") {
                        ins += 1;
                        delta += line.len() as i64 - 1;
                    } else if line.starts_with(b"-") {
                        del += 1;
                        delta -= line.len() as i64 - 1;
                    }
                }
            }
            let name = display_name(fp.filename());
            namelen = namelen.max(name.len());
            maxdiff = maxdiff.max(ins + del);
            names.push(name);
            inserted.push(ins);
            deleted.push(del);
        }
        let statlen = maxdiff.to_string().len();
        let mut output = String::new();
        for (i, name) in names.iter().enumerate() {
            // row width with empty name, stat and histogram columns
            let width = namelen + statlen + 6;
            let histwidth = if width + 2 < 80 { 80 - width } else { 2 };
            let hist = if maxdiff < histwidth {
                format!("{}{}", "+".repeat(inserted[i]), "-".repeat(deleted[i]))
            } else {
                let iratio = inserted[i] as f64 / maxdiff as f64 * histwidth as f64;
                let dratio = deleted[i] as f64 / maxdiff as f64 * histwidth as f64;
                // every nonzero count keeps at least one mark
                let iwidth = if iratio > 0.0 && iratio < 1.0 { 1 } else { iratio as usize };
                let dwidth = if dratio > 0.0 && dratio < 1.0 { 1 } else { dratio as usize };
                format!("{}{}", "+".repeat(iwidth), "-".repeat(dwidth))
            };
            output.push_str(&format!(
                " {:<nw$} | {:>sw$} {}\n",
                name,
                inserted[i] + deleted[i],
                hist,
                nw = namelen,
                sw = statlen,
            ));
        }
        output.push_str(&format!(
            " {} files changed, {} insertions(+), {} deletions(-), {:+} bytes",
            names.len(),
            inserted.iter().sum::<usize>(),
            deleted.iter().sum::<usize>(),
            delta,
        ));
        output
    }
}

// --- Preview ---

/// Renders a unified preview diff between two byte buffers, decoding
/// lossily for display. The CLI uses this to show proposed changes during a
/// dry run.
pub fn preview_diff(old: &[u8], new: &[u8], name: &str) -> String {
    let old_text = String::from_utf8_lossy(old);
    let new_text = String::from_utf8_lossy(new);
    unified_diff(
        similar::Algorithm::default(),
        &old_text,
        &new_text,
        3,
        Some((&format!("a/{}", name), &format!("b/{}", name))),
    )
}
