use indoc::indoc;
use std::fs;
use tempfile::tempdir;
use unipatch::{
    apply_patchset, apply_to_bytes, can_apply, match_hunks, parse_bytes, path_is_absolute,
    path_normalize, path_strip_components, revert_patchset, ApplyError, ApplyOptions, Dialect,
    FileOutcome, PatchOutcome, Severity,
};

// --- Parsing ---

#[test]
fn parse_simple_patch() {
    let patch = indoc! {"
        --- a/src/main.rs
        +++ b/src/main.rs
        @@ -1,3 +1,3 @@
         fn main() {
        -    println!(\"Hello, world!\");
        +    println!(\"Hello, unipatch!\");
         }
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(set.items.len(), 1);
    assert_eq!(set.errors(), 0);
    assert_eq!(set.warnings(), 0);
    let fp = &set.items[0];
    assert_eq!(fp.source, b"a/src/main.rs");
    assert_eq!(fp.target, b"b/src/main.rs");
    assert_eq!(fp.dialect, Dialect::Plain);
    assert_eq!(fp.hunks.len(), 1);
    assert_eq!(fp.added(), 1);
    assert_eq!(fp.removed(), 1);
    let hunk = &fp.hunks[0];
    assert_eq!(
        (hunk.start_src, hunk.lines_src, hunk.start_tgt, hunk.lines_tgt),
        (1, 3, 1, 3)
    );
    assert!(!hunk.invalid);
    assert!(hunk.desc.is_empty());
}

#[test]
fn hunk_counts_default_to_one_and_desc_is_kept() {
    let patch = b"--- a/f\n+++ b/f\n@@ -1 +1 @@ fn main()\n-x\n+y\n";
    let set = parse_bytes(patch).unwrap();
    let hunk = &set.items[0].hunks[0];
    assert_eq!((hunk.start_src, hunk.lines_src), (1, 1));
    assert_eq!((hunk.start_tgt, hunk.lines_tgt), (1, 1));
    assert_eq!(hunk.desc, b"fn main()");
}

#[test]
fn blank_line_in_body_becomes_context() {
    let patch = b"--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n ctx\n\n ctx2\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.warnings(), 1);
    let hunk = &set.items[0].hunks[0];
    assert!(!hunk.invalid);
    assert_eq!(hunk.text[1], b" \n");
    assert_eq!(hunk.source_lines(), vec![&b"ctx"[..], &b""[..], &b"ctx2"[..]]);
}

#[test]
fn swapped_file_headers_are_fixed_with_a_warning() {
    let patch = b"+++ b/f\n--- a/f\n@@ -1 +1 @@\n-x\n+y\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.items.len(), 1);
    assert_eq!(set.warnings(), 1);
    assert_eq!(set.items[0].source, b"a/f");
    assert_eq!(set.items[0].target, b"b/f");
}

#[test]
fn duplicated_file_headers_keep_the_last_pair() {
    let patch = b"--- a/old\n+++ b/old\n--- a/new\n+++ b/new\n@@ -1 +1 @@\n-x\n+y\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.items.len(), 1);
    assert_eq!(set.warnings(), 1);
    assert_eq!(set.items[0].source, b"a/new");
    assert_eq!(set.items[0].target, b"b/new");
}

#[test]
fn short_hunk_body_is_kept_but_flagged_invalid() {
    let patch = b"--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n ctx\n-x\n+y\nEND OF PATCH\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.items.len(), 1);
    assert_eq!(set.errors(), 0);
    assert!(set.warnings() >= 1);
    assert!(set.items[0].hunks[0].invalid);

    // invalid hunks are refused at apply time
    let result = apply_to_bytes(&set.items[0], b"ctx\nx\n", 0);
    assert!(matches!(result, Err(ApplyError::InvalidHunk { hunk: 1 })));
}

#[test]
fn trailing_garbage_is_a_warning() {
    let patch = b"--- a/f\n+++ b/f\n@@ -1 +1 @@\n-x\n+y\nsome trailing explanation\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.items.len(), 1);
    assert_eq!(set.warnings(), 1);
    assert_eq!(set.events.len(), 1);
    assert_eq!(set.events[0].severity, Severity::Warning);
    assert_eq!(set.events[0].line, 7);
}

#[test]
fn unparseable_hunk_header_skips_that_hunk() {
    let patch =
        b"--- a/f\n+++ b/f\n@@ -99999999999999999999,3 +1,3 @@\n ctx\n@@ -1 +1 @@\n-x\n+y\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.items.len(), 1);
    assert_eq!(set.items[0].hunks.len(), 1);
    assert!(set.warnings() >= 1);
    assert_eq!(set.items[0].hunks[0].source_lines(), vec![&b"x"[..]]);
}

#[test]
fn input_without_patch_data() {
    let set = parse_bytes(b"hello\nworld\n").unwrap();
    assert!(set.items.is_empty());
    assert_eq!(set.errors(), 1);

    assert!(parse_bytes(b"").is_err());
}

#[test]
fn dev_null_marks_creation_and_deletion() {
    let creation = parse_bytes(b"--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+hello\n+world\n")
        .unwrap();
    let fp = &creation.items[0];
    assert!(fp.is_creation());
    assert!(!fp.is_deletion());
    assert_eq!(fp.filename(), b"b/new.txt");
    assert_eq!((fp.hunks[0].start_src, fp.hunks[0].lines_src), (0, 0));

    let deletion = parse_bytes(b"--- a/gone.txt\n+++ /dev/null\n@@ -1 +0,0 @@\n-bye\n").unwrap();
    let fp = &deletion.items[0];
    assert!(fp.is_deletion());
    assert_eq!(fp.filename(), b"a/gone.txt");
}

#[test]
fn mixed_line_endings_in_hunks_warn() {
    let patch = b"--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\r\n-x\n+y\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.warnings(), 1);
    // body bytes are preserved exactly, terminators included
    assert_eq!(set.items[0].hunks[0].text[0], b" a\r\n");
}

#[test]
fn quoted_and_timestamped_filenames_are_normalized() {
    let patch = b"--- \"a/my file.txt\"\t2024-01-01 10:00:00\n+++ \"b/my file.txt\"\n@@ -1 +1 @@\n-x\n+y\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.items[0].source, b"a/my file.txt");
    assert_eq!(set.items[0].target, b"b/my file.txt");
}

#[test]
fn parsing_is_idempotent() {
    let patch = indoc! {"
        diff --git a/one.txt b/one.txt
        index 1111111..2222222 100644
        --- a/one.txt
        +++ b/one.txt
        @@ -1 +1 @@
        -x
        +y
        Index: two.txt
        ===================================================================
        --- two.txt
        +++ two.txt
        @@ -1,2 +1,2 @@
         keep
        -old
        +new
    "};
    let first = parse_bytes(patch.as_bytes()).unwrap();
    let second = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(first, second);
}

// --- Dialect Detection ---

#[test]
fn git_patch_is_detected_and_prefixes_stripped() {
    let patch = indoc! {"
        diff --git a/src/x.py b/src/x.py
        index 1234567..89abcde 100644
        --- a/src/x.py
        +++ b/src/x.py
        @@ -1 +1 @@
        -old
        +new
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(set.dialect, Dialect::Git);
    let fp = &set.items[0];
    assert_eq!(fp.dialect, Dialect::Git);
    assert_eq!(fp.source, b"src/x.py");
    assert_eq!(fp.target, b"src/x.py");
    assert!(fp.prefix_stripped);
}

#[test]
fn mercurial_patch_is_detected() {
    let patch = indoc! {"
        diff -r 000000000000 f.txt
        --- a/f.txt
        +++ b/f.txt
        @@ -1 +1 @@
        -old
        +new
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(set.dialect, Dialect::Mercurial);
    assert_eq!(set.items[0].source, b"f.txt");
}

#[test]
fn subversion_patch_is_detected_and_names_left_alone() {
    let patch = indoc! {"
        Index: f.txt
        ===================================================================
        --- f.txt\t(revision 1)
        +++ f.txt\t(working copy)
        @@ -1 +1 @@
        -old
        +new
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(set.dialect, Dialect::Subversion);
    assert_eq!(set.items[0].source, b"f.txt");
    assert_eq!(set.items[0].target, b"f.txt");
    assert!(!set.items[0].prefix_stripped);
}

#[test]
fn disagreeing_items_make_the_set_mixed() {
    let patch = indoc! {"
        diff --git a/one.txt b/one.txt
        index 1111111..2222222 100644
        --- a/one.txt
        +++ b/one.txt
        @@ -1 +1 @@
        -x
        +y
        Index: two.txt
        ===================================================================
        --- two.txt
        +++ two.txt
        @@ -1 +1 @@
        -old
        +new
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(set.items.len(), 2);
    assert_eq!(set.items[0].dialect, Dialect::Git);
    assert_eq!(set.items[1].dialect, Dialect::Subversion);
    assert_eq!(set.dialect, Dialect::Mixed);
}

#[test]
fn unsignalled_items_take_the_majority_dialect() {
    let patch = indoc! {"
        diff --git a/one.txt b/one.txt
        index 1111111..2222222 100644
        --- a/one.txt
        +++ b/one.txt
        @@ -1 +1 @@
        -x
        +y
        diff --git a/two.txt b/two.txt
        index 3333333..4444444 100644
        --- a/two.txt
        +++ b/two.txt
        @@ -1 +1 @@
        -o
        +p
        --- a/three.txt
        +++ b/three.txt
        @@ -1 +1 @@
        -q
        +r
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(set.items.len(), 3);
    assert_eq!(set.items[2].dialect, Dialect::Git);
    assert_eq!(set.items[2].source, b"three.txt");
    assert_eq!(set.dialect, Dialect::Git);
}

// --- Path Utilities ---

#[test]
fn absolute_path_detection() {
    assert!(path_is_absolute(b"/usr/bin"));
    assert!(path_is_absolute(b"\\windows\\style"));
    assert!(path_is_absolute(b"\\\\server\\share"));
    assert!(path_is_absolute(b"C:/x"));
    assert!(path_is_absolute(b"c:\\x"));
    assert!(!path_is_absolute(b"a/b"));
    assert!(!path_is_absolute(b"C:x"));
    assert!(!path_is_absolute(b"./x"));
}

#[test]
fn path_normalization() {
    assert_eq!(path_normalize(b"a/./b//c/../d"), b"a/b/d");
    assert_eq!(path_normalize(b"dir\\sub\\file"), b"dir/sub/file");
    assert_eq!(path_normalize(b"../up"), b"../up");
    assert_eq!(path_normalize(b"a/.."), b".");
    assert_eq!(path_normalize(b"/a/../../b"), b"/b");
}

#[test]
fn component_stripping() {
    assert_eq!(path_strip_components(b"a/b/c", 0), b"a/b/c");
    assert_eq!(path_strip_components(b"a//b/c", 1), b"b/c");
    assert_eq!(path_strip_components(b"a/b/c", 2), b"c");
    assert_eq!(path_strip_components(b"/usr/local", 1), b"usr/local");
    assert_eq!(path_strip_components(b"a/b", 2), b"");
    assert_eq!(path_strip_components(b"file", 1), b"");
}

// --- Hunk Matching ---

#[test]
fn offset_recovery_with_fuzz() {
    let mut content = String::new();
    for i in 1..=11 {
        content.push_str(&format!("filler{}\n", i));
    }
    content.push_str("alpha\nbeta\nomega\n"); // the context lives at lines 12-14
    let patch = indoc! {"
        --- a/t
        +++ b/t
        @@ -10,3 +10,3 @@
         alpha
        -beta
        +BETA
         omega
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let fp = &set.items[0];

    assert!(matches!(
        apply_to_bytes(fp, content.as_bytes(), 0),
        Err(ApplyError::Mismatch(_))
    ));

    match apply_to_bytes(fp, content.as_bytes(), 2).unwrap() {
        PatchOutcome::Patched(new) => {
            let expected = content.replace("beta", "BETA");
            assert_eq!(new, expected.as_bytes());
        }
        PatchOutcome::AlreadyApplied => panic!("expected a patched result"),
    }
}

#[test]
fn cascading_shift_biases_later_hunks() {
    // the target gained two lines at the top relative to the patch
    let patch = indoc! {"
        --- a/t
        +++ b/t
        @@ -1,3 +1,3 @@
         a1
        -a2
        +A2
         a3
        @@ -9,3 +9,3 @@
         b1
        -b2
        +B2
         b3
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let lines: Vec<&[u8]> = vec![
        &b"x\n"[..],
        &b"y\n"[..],
        &b"a1\n"[..],
        &b"a2\n"[..],
        &b"a3\n"[..],
        &b"f0\n"[..],
        &b"f1\n"[..],
        &b"f2\n"[..],
        &b"f3\n"[..],
        &b"f4\n"[..],
        &b"b1\n"[..],
        &b"b2\n"[..],
        &b"b3\n"[..],
    ];
    let plan = match_hunks(&set.items[0].hunks, &lines, 2).unwrap();
    assert_eq!(plan[0].position, 2);
    assert_eq!(plan[0].offset, 2);
    assert!(!plan[0].already_applied);
    assert_eq!(plan[1].position, 10);
    assert_eq!(plan[1].offset, 2);
}

#[test]
fn can_apply_probe() {
    let set = parse_bytes(b"--- a/t\n+++ b/t\n@@ -1,2 +1,2 @@\n keep\n-old\n+new\n").unwrap();
    let fp = &set.items[0];
    assert!(can_apply(fp, b"keep\nold\n", 0));
    assert!(!can_apply(fp, b"x\nkeep\nold\n", 0));
    assert!(can_apply(fp, b"x\nkeep\nold\n", 1));
    // a file already in its post-patch state counts as clean
    assert!(can_apply(fp, b"keep\nnew\n", 0));
}

// --- Application ---

#[test]
fn single_line_replace_and_revert() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("t"), "Hello World\n").unwrap();
    let patch = indoc! {"
        --- a/t
        +++ b/t
        @@ -1 +1 @@
        -Hello World
        +Hello Patch!
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());

    let report = apply_patchset(&set, &options);
    assert!(report.all_succeeded());
    assert_eq!(report.files[0].path, dir.path().join("t"));
    assert!(matches!(report.files[0].outcome, Ok(FileOutcome::Applied)));
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"Hello Patch!\n");

    let report = revert_patchset(&set, &options);
    assert!(report.all_succeeded());
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"Hello World\n");
}

#[test]
fn insertion_counts_and_diffstat() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("t"), "line1\nline2\nline3\n").unwrap();
    let patch = indoc! {"
        diff --git a/t b/t
        index 0000000..1111111 100644
        --- a/t
        +++ b/t
        @@ -1,3 +1,4 @@
         line1
        +inserted
         line2
         line3
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let fp = &set.items[0];
    assert_eq!(fp.added(), 1);
    assert_eq!(fp.removed(), 0);
    assert!(set.diffstat().contains("t | 1 +"));

    let options = ApplyOptions::new().with_root(dir.path());
    assert!(apply_patchset(&set, &options).all_succeeded());
    assert_eq!(
        fs::read(dir.path().join("t")).unwrap(),
        b"line1\ninserted\nline2\nline3\n"
    );

    assert!(revert_patchset(&set, &options).all_succeeded());
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"line1\nline2\nline3\n");
}

#[test]
fn line_endings_preserved_per_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"one\ntwo\nthree\n").unwrap();
    fs::write(dir.path().join("b.txt"), b"one\r\ntwo\r\nthree\r\n").unwrap();
    let patch = indoc! {"
        --- a/a.txt
        +++ b/a.txt
        @@ -1,3 +1,3 @@
         one
        -two
        +TWO
         three
        --- a/b.txt
        +++ b/b.txt
        @@ -1,3 +1,3 @@
         one
        -two
        +TWO
         three
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());
    assert!(apply_patchset(&set, &options).all_succeeded());
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"one\nTWO\nthree\n");
    assert_eq!(
        fs::read(dir.path().join("b.txt")).unwrap(),
        b"one\r\nTWO\r\nthree\r\n"
    );
}

#[test]
fn git_prefix_strip_accounting() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/x.py"), "print('hi')\n").unwrap();
    let patch = indoc! {"
        diff --git a/src/x.py b/src/x.py
        index 1111111..2222222 100644
        --- a/src/x.py
        +++ b/src/x.py
        @@ -1 +1 @@
        -print('hi')
        +print('bye')
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(set.items[0].dialect, Dialect::Git);
    assert_eq!(set.items[0].source, b"src/x.py");

    // strip counts against the a/src/x.py spelling in the patch, so the
    // rewriter still operates on src/x.py
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());
    let report = apply_patchset(&set, &options);
    assert!(report.all_succeeded());
    assert_eq!(report.files[0].path, dir.path().join("src/x.py"));
    assert_eq!(
        fs::read(dir.path().join("src/x.py")).unwrap(),
        b"print('bye')\n"
    );
}

#[test]
fn already_applied_succeeds_without_writing() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("t"), "new content\n").unwrap();
    let patch = indoc! {"
        --- a/t
        +++ b/t
        @@ -1 +1 @@
        -old content
        +new content
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());
    let report = apply_patchset(&set, &options);
    assert!(report.all_succeeded());
    assert!(matches!(
        report.files[0].outcome,
        Ok(FileOutcome::AlreadyApplied)
    ));
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"new content\n");
}

#[test]
fn dry_run_reports_the_same_verdict_and_writes_nothing() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("t"), "Hello World\n").unwrap();
    let patch = indoc! {"
        --- a/t
        +++ b/t
        @@ -1 +1 @@
        -Hello World
        +Hello Patch!
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let base = ApplyOptions::new().with_strip(1).with_root(dir.path());

    let dry_report = apply_patchset(&set, &base.clone().with_dry_run(true));
    assert!(dry_report.all_succeeded());
    assert!(matches!(dry_report.files[0].outcome, Ok(FileOutcome::DryRun)));
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"Hello World\n");

    let real_report = apply_patchset(&set, &base);
    assert_eq!(dry_report.all_succeeded(), real_report.all_succeeded());
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"Hello Patch!\n");
}

#[test]
fn dry_run_failure_matches_real_failure() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("t"), "something else entirely\n").unwrap();
    let patch = indoc! {"
        --- a/t
        +++ b/t
        @@ -1 +1 @@
        -Hello World
        +Hello Patch!
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let base = ApplyOptions::new().with_strip(1).with_root(dir.path());

    let dry_report = apply_patchset(&set, &base.clone().with_dry_run(true));
    let real_report = apply_patchset(&set, &base);
    assert!(!dry_report.all_succeeded());
    assert_eq!(dry_report.all_succeeded(), real_report.all_succeeded());
    assert_eq!(
        fs::read(dir.path().join("t")).unwrap(),
        b"something else entirely\n"
    );
}

#[test]
fn strip_with_reconstructed_prefix_matches() {
    let patch = indoc! {"
        --- x/y/t
        +++ x/y/t
        @@ -1 +1 @@
        -before
        +after
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();

    let flat = tempdir().unwrap();
    fs::write(flat.path().join("t"), "before\n").unwrap();
    let report = apply_patchset(
        &set,
        &ApplyOptions::new().with_strip(2).with_root(flat.path()),
    );
    assert!(report.all_succeeded());

    let nested = tempdir().unwrap();
    fs::create_dir_all(nested.path().join("y")).unwrap();
    fs::write(nested.path().join("y/t"), "before\n").unwrap();
    let report = apply_patchset(
        &set,
        &ApplyOptions::new().with_strip(1).with_root(nested.path()),
    );
    assert!(report.all_succeeded());

    assert_eq!(
        fs::read(flat.path().join("t")).unwrap(),
        fs::read(nested.path().join("y/t")).unwrap()
    );
}

#[test]
fn failed_file_left_untouched_while_siblings_apply() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("file1.txt"), "foo\n").unwrap();
    fs::write(dir.path().join("file2.txt"), "unexpected\n").unwrap();
    let patch = indoc! {"
        --- a/file1.txt
        +++ b/file1.txt
        @@ -1 +1 @@
        -foo
        +bar
        --- a/file2.txt
        +++ b/file2.txt
        @@ -1 +1 @@
        -baz
        +qux
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());
    let report = apply_patchset(&set, &options);

    assert!(!report.all_succeeded());
    assert_eq!(report.failures().len(), 1);
    assert!(report.files[0].outcome.is_ok());
    assert!(matches!(
        report.files[1].outcome,
        Err(ApplyError::Mismatch(_))
    ));
    assert_eq!(fs::read(dir.path().join("file1.txt")).unwrap(), b"bar\n");
    assert_eq!(
        fs::read(dir.path().join("file2.txt")).unwrap(),
        b"unexpected\n"
    );
}

#[test]
fn creation_and_deletion_are_not_executed() {
    let dir = tempdir().unwrap();
    let patch = indoc! {"
        --- /dev/null
        +++ b/new.txt
        @@ -0,0 +1 @@
        +content
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert_eq!(set.errors(), 0);
    let report = apply_patchset(&set, &ApplyOptions::new().with_root(dir.path()));
    assert!(!report.all_succeeded());
    assert!(matches!(
        report.files[0].outcome,
        Err(ApplyError::UnsupportedFileOperation { .. })
    ));
    assert!(!dir.path().join("new.txt").exists());
}

#[test]
fn absolute_and_escaping_paths_are_rejected() {
    let dir = tempdir().unwrap();

    let set = parse_bytes(b"--- /etc/target\n+++ /etc/target\n@@ -1 +1 @@\n-x\n+y\n").unwrap();
    assert!(set.warnings() >= 1);
    let report = apply_patchset(&set, &ApplyOptions::new().with_root(dir.path()));
    assert!(matches!(
        report.files[0].outcome,
        Err(ApplyError::AbsolutePath(_))
    ));

    let set = parse_bytes(b"--- ../escape\n+++ ../escape\n@@ -1 +1 @@\n-x\n+y\n").unwrap();
    let report = apply_patchset(&set, &ApplyOptions::new().with_root(dir.path()));
    assert!(matches!(
        report.files[0].outcome,
        Err(ApplyError::PathTraversal(_))
    ));
}

#[test]
fn strip_deeper_than_the_path_is_rejected() {
    let dir = tempdir().unwrap();
    let set = parse_bytes(b"--- a/t\n+++ b/t\n@@ -1 +1 @@\n-x\n+y\n").unwrap();
    let report = apply_patchset(
        &set,
        &ApplyOptions::new().with_strip(5).with_root(dir.path()),
    );
    assert!(matches!(
        report.files[0].outcome,
        Err(ApplyError::StripExhausted { .. })
    ));
}

#[test]
fn missing_target_and_directory_target() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("d")).unwrap();

    let set = parse_bytes(b"--- a/missing.txt\n+++ b/missing.txt\n@@ -1 +1 @@\n-x\n+y\n").unwrap();
    let report = apply_patchset(
        &set,
        &ApplyOptions::new().with_strip(1).with_root(dir.path()),
    );
    assert!(matches!(
        report.files[0].outcome,
        Err(ApplyError::TargetNotFound(_))
    ));

    let set = parse_bytes(b"--- a/d\n+++ b/d\n@@ -1 +1 @@\n-x\n+y\n").unwrap();
    let report = apply_patchset(
        &set,
        &ApplyOptions::new().with_strip(1).with_root(dir.path()),
    );
    assert!(matches!(
        report.files[0].outcome,
        Err(ApplyError::TargetIsDirectory(_))
    ));
}

#[test]
fn no_newline_markers_are_honored_both_ways() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("t"), b"alpha\nbeta").unwrap();
    let patch = b"--- a/t\n+++ b/t\n@@ -1,2 +1,2 @@\n alpha\n-beta\n\\ No newline at end of file\n+BETA\n\\ No newline at end of file\n";
    let set = parse_bytes(patch).unwrap();
    assert_eq!(set.warnings(), 0);
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());

    assert!(apply_patchset(&set, &options).all_succeeded());
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"alpha\nBETA");

    assert!(revert_patchset(&set, &options).all_succeeded());
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"alpha\nbeta");
}

#[test]
fn newline_can_be_added_at_end_of_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("t"), b"alpha\nbeta").unwrap();
    let patch = b"--- a/t\n+++ b/t\n@@ -1,2 +1,2 @@\n alpha\n-beta\n\\ No newline at end of file\n+beta\n";
    let set = parse_bytes(patch).unwrap();
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());
    assert!(apply_patchset(&set, &options).all_succeeded());
    assert_eq!(fs::read(dir.path().join("t")).unwrap(), b"alpha\nbeta\n");
}

#[test]
fn multiple_hunks_apply_in_order() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("t"), "a\nb\nc\nd\ne\nf\ng\nh\n").unwrap();
    let patch = indoc! {"
        --- a/t
        +++ b/t
        @@ -1,3 +1,3 @@
         a
        -b
        +B
         c
        @@ -6,3 +6,3 @@
         f
        -g
        +G
         h
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());
    assert!(apply_patchset(&set, &options).all_succeeded());
    assert_eq!(
        fs::read(dir.path().join("t")).unwrap(),
        b"a\nB\nc\nd\ne\nf\nG\nh\n"
    );
}

#[test]
fn out_of_order_hunks_are_flagged() {
    let patch = indoc! {"
        --- a/t
        +++ b/t
        @@ -5,3 +5,3 @@
         e
        -f
        +F
         g
        @@ -2,2 +2,2 @@
         b
        -c
        +C
    "};
    let set = parse_bytes(patch.as_bytes()).unwrap();
    assert!(set.warnings() >= 1);
    assert!(!set.items[0].hunks[0].invalid);
    assert!(set.items[0].hunks[1].invalid);
}

#[cfg(unix)]
#[test]
fn permissions_survive_the_rewrite() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("t");
    fs::write(&path, "Hello World\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    let set = parse_bytes(b"--- a/t\n+++ b/t\n@@ -1 +1 @@\n-Hello World\n+Hello Patch!\n").unwrap();
    let options = ApplyOptions::new().with_strip(1).with_root(dir.path());
    assert!(apply_patchset(&set, &options).all_succeeded());

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}
