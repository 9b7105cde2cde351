//! Integration tests: CLI smoke tests and full-pipeline scan scenarios.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use verify_classes::core::config::Config;
use verify_classes::fixtures::{ClassFileBuilder, ClassLayout, ClassTree, patch_u2};
use verify_classes::loader::classfile::access;
use verify_classes::logger::{RecordingSink, ScanEvent};
use verify_classes::scanner::coordinator::{ScanCoordinator, ScanReport};

fn scan(roots: &[PathBuf]) -> (Result<ScanReport, verify_classes::core::errors::VciError>, RecordingSink) {
    let mut sink = RecordingSink::new();
    let result = ScanCoordinator::from_config(&Config::default()).scan(roots, &mut sink);
    (result, sink)
}

fn root_arg(tree: &ClassTree) -> String {
    tree.root().display().to_string()
}

fn parse_json_line(stdout: &str) -> Value {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .expect("json line on stdout");
    serde_json::from_str(line).expect("valid json")
}

// ──────────────────── scan scenarios ────────────────────

#[test]
fn corrupt_sibling_is_the_only_report() {
    let tree = ClassTree::new();
    tree.add(&ClassFileBuilder::class("a.Foo"));
    tree.add_bytes("a/Bar.class", b"\xCA\xFE\xBA\xBE\x00\x00");

    let (result, sink) = scan(&[tree.root().to_path_buf()]);
    let report = result.expect("scan succeeds");
    assert_eq!(report.broken, vec!["a.Bar"]);
    assert_eq!(sink.broken_names(), vec!["a.Bar"]);
}

#[test]
fn missing_superclass_is_suppressed() {
    let tree = ClassTree::new();
    tree.add(&ClassFileBuilder::class("x.X").extends("y.Y"));

    let (result, sink) = scan(&[tree.root().to_path_buf()]);
    let report = result.expect("scan succeeds");
    assert!(report.is_clean());
    assert_eq!(report.stats.unresolved, 1);
    assert!(sink.broken_names().is_empty());
}

#[test]
fn reference_not_needed_at_load_time_still_loads() {
    let tree = ClassTree::new();
    tree.add(&ClassFileBuilder::class("x.X").field(access::PRIVATE, "y", "Ly/Y;"));

    let (result, _) = scan(&[tree.root().to_path_buf()]);
    let report = result.expect("scan succeeds");
    assert!(report.is_clean());
    assert_eq!(report.stats.loaded, 1);
}

#[test]
fn same_corrupt_name_in_two_roots_reported_once() {
    let first = ClassTree::new();
    let second = ClassTree::new();
    first.add_bytes("shared/Util.class", b"broken");
    second.add_bytes("shared/Util.class", b"also broken");

    let (result, sink) = scan(&[first.root().to_path_buf(), second.root().to_path_buf()]);
    let report = result.expect("scan succeeds");
    assert_eq!(report.broken, vec!["shared.Util"]);
    assert_eq!(report.stats.corrupt, 2);
    assert_eq!(sink.broken_names(), vec!["shared.Util"]);
}

#[test]
fn missing_root_aborts_without_report_events() {
    let tree = ClassTree::new();
    let (result, sink) = scan(&[tree.root().join("does-not-exist")]);
    let err = result.expect_err("missing root is fatal");
    assert_eq!(err.code(), "VCI-2001");
    assert!(sink.broken_names().is_empty());
    assert!(
        !sink
            .events()
            .iter()
            .any(|e| matches!(e, ScanEvent::ScanStarted { .. }))
    );
}

#[test]
fn empty_root_starts_and_reports_nothing() {
    let tree = ClassTree::new();
    tree.mkdir("a/b");
    tree.add_bytes("a/b/readme.txt", b"not an artifact");

    let (result, sink) = scan(&[tree.root().to_path_buf()]);
    let report = result.expect("scan succeeds");
    assert!(report.is_clean());
    assert_eq!(report.stats.candidates, 0);
    assert!(matches!(
        sink.report_events().first(),
        Some(ScanEvent::ScanStarted { .. })
    ));
    assert!(sink.broken_names().is_empty());
}

#[test]
fn no_roots_starts_and_reports_nothing() {
    let (result, sink) = scan(&[]);
    let report = result.expect("scan succeeds");
    assert!(report.is_clean());
    assert_eq!(report.stats.roots, 0);
    assert!(matches!(
        sink.report_events().first(),
        Some(ScanEvent::ScanStarted { roots }) if roots.is_empty()
    ));
}

// ──────────────────── compiler output ────────────────────

/// Classes compiled by javac 17; see `tests/fixtures/javac/README.md`.
fn javac_classes() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/javac/classes")
}

type Patch = Box<dyn Fn(&mut [u8], &ClassLayout)>;

/// Overwrite the `u2` at `offset` into the body of `owner`'s `attribute`.
fn put(
    owner: &'static str,
    attribute: &'static str,
    offset: usize,
    value: impl Fn(&ClassLayout) -> u16 + 'static,
) -> Patch {
    Box::new(move |bytes, layout| {
        let at = layout.site(owner, attribute).body + offset;
        patch_u2(bytes, at, value(layout));
    })
}

fn rename(owner: &'static str, attribute: &'static str, to: &'static str) -> Patch {
    Box::new(move |bytes, layout| {
        let at = layout.site(owner, attribute).offset;
        patch_u2(bytes, at, layout.utf8(to));
    })
}

fn utf8(text: &'static str) -> impl Fn(&ClassLayout) -> u16 {
    move |layout| layout.utf8(text)
}

fn class(internal: &'static str) -> impl Fn(&ClassLayout) -> u16 {
    move |layout| layout.class(internal)
}

fn raw(value: u16) -> impl Fn(&ClassLayout) -> u16 {
    move |_| value
}

fn read_u2(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

/// Scan a copy of the javac output with `class` patched.
fn scan_patched(
    class: &str,
    patch: &Patch,
) -> (Result<ScanReport, verify_classes::core::errors::VciError>, RecordingSink) {
    let tree = ClassTree::copy_from(&javac_classes());
    let relative = format!("{class}.class");
    let mut bytes = tree.read(&relative);
    let layout = ClassLayout::of(&bytes);
    patch(&mut bytes, &layout);
    tree.add_bytes(&relative, &bytes);
    scan(&[tree.root().to_path_buf()])
}

#[test]
fn javac_output_loads_cleanly() {
    let (result, sink) = scan(&[javac_classes()]);
    let report = result.expect("scan succeeds");
    assert!(report.is_clean(), "{:?}", report.broken);
    assert_eq!(report.stats.candidates, 16);
    assert_eq!(report.stats.loaded, 16);
    assert_eq!(report.stats.unresolved, 0);
    assert!(sink.broken_names().is_empty());
}

#[test]
fn javac_output_with_a_broken_attribute_is_corrupt() {
    const DESCRIBE: &str = "method describe";
    const SUM: &str = "method sum";
    let start_at_code_length: Patch = Box::new(|bytes, layout| {
        let code = layout.site(DESCRIBE, "Code").body;
        let length = u32::from_be_bytes([
            bytes[code + 4],
            bytes[code + 5],
            bytes[code + 6],
            bytes[code + 7],
        ]);
        let at = layout.site(DESCRIBE, "LineNumberTable").body + 2;
        patch_u2(bytes, at, u16::try_from(length).unwrap());
    });
    let slot_at_max_locals: Patch = Box::new(|bytes, layout| {
        let max_locals = read_u2(bytes, layout.site(DESCRIBE, "Code").body + 2);
        let at = layout.site(DESCRIBE, "LocalVariableTable").body + 2 + 8;
        patch_u2(bytes, at, max_locals);
    });

    let cases: Vec<(&str, &str, Patch)> = vec![
        ("p/All", "line number past the code", start_at_code_length),
        ("p/All", "local variable slot past max_locals", slot_at_max_locals),
        (
            "p/All",
            "local variable with a method descriptor",
            put(DESCRIBE, "LocalVariableTable", 2 + 6, utf8("()V")),
        ),
        (
            "p/All",
            "local variable named with a slash",
            put(DESCRIBE, "LocalVariableTable", 2 + 4, utf8("java/lang/Object")),
        ),
        (
            "p/All",
            "local variable type without a local variable",
            put(SUM, "LocalVariableTypeTable", 2 + 4, utf8("total")),
        ),
        (
            "p/All",
            "second stack map table",
            rename(SUM, "LineNumberTable", "StackMapTable"),
        ),
        (
            "p/All",
            "exception entry is a string",
            put(SUM, "Exceptions", 2, utf8("java/lang/IllegalStateException")),
        ),
        (
            "p/All",
            "method signature is a class",
            put(SUM, "Signature", 0, class("java/util/List")),
        ),
        (
            "p/All",
            "field signature is a class",
            put("field names", "Signature", 0, class("java/util/List")),
        ),
        (
            "p/All",
            "source file is a class",
            put("class", "SourceFile", 0, class("p/All")),
        ),
        (
            "p/All",
            "nest member is a string",
            put("class", "NestMembers", 2, utf8("p/All$Sq")),
        ),
        (
            "p/All",
            "bootstrap method is a string",
            put("class", "BootstrapMethods", 2, utf8("p/All")),
        ),
        (
            "p/All",
            "no bootstrap methods for invokedynamic",
            put("class", "BootstrapMethods", 0, raw(0)),
        ),
        (
            "p/All",
            "bootstrap methods renamed away",
            rename("class", "BootstrapMethods", "SourceFile"),
        ),
        (
            "p/All",
            "inner class entry without an inner class",
            put("class", "InnerClasses", 2, raw(0)),
        ),
        (
            "p/All",
            "inner class index out of range",
            put("class", "InnerClasses", 2 + 8 + 8, raw(0xFFFF)),
        ),
        (
            "p/All",
            "no room for the argument",
            put(DESCRIBE, "Code", 2, raw(0)),
        ),
        (
            "p/All$1",
            "enclosing method is a class",
            put("class", "EnclosingMethod", 2, class("p/All")),
        ),
        (
            "p/All$1",
            "no enclosing class",
            put("class", "EnclosingMethod", 0, raw(0)),
        ),
        (
            "p/All$Sq",
            "nest host is a string",
            put("class", "NestHost", 0, utf8("p/All")),
        ),
        (
            "p/All$Sq",
            "record component with a method descriptor",
            put("class", "Record", 4, utf8("()V")),
        ),
        (
            "p/All$Sq",
            "record component named with a slash",
            put("class", "Record", 2, utf8("p/All")),
        ),
        (
            "p/All$Shape",
            "permitted subclass is a string",
            put("class", "PermittedSubclasses", 2, utf8("p/All$Sq")),
        ),
        (
            "s/Ty",
            "method parameters miscounted",
            put("method m", "MethodParameters", 0, raw(0x0203)),
        ),
        (
            "s/Ty",
            "second visible type annotation table on a field",
            rename("field f", "RuntimeInvisibleTypeAnnotations", "RuntimeVisibleTypeAnnotations"),
        ),
        (
            "s/Ty",
            "second class signature",
            rename("class", "RuntimeInvisibleTypeAnnotations", "Signature"),
        ),
    ];

    for (class, label, patch) in &cases {
        let (result, _) = scan_patched(class, patch);
        let report = result.unwrap_or_else(|err| panic!("{label}: {err}"));
        let name = class.replace('/', ".");
        assert!(report.broken.contains(&name), "{label}: {:?}", report.broken);
    }
}

#[test]
fn javac_output_with_unchecked_attribute_contents_still_loads() {
    let cases: Vec<(&str, Patch)> = vec![
        ("stack map frames", put("method sum", "StackMapTable", 2, raw(0xFFFF))),
        ("parameter name index", put("method task", "MethodParameters", 1, raw(9999))),
        ("annotation count", put("method task", "RuntimeVisibleAnnotations", 0, raw(500))),
    ];
    for (label, patch) in &cases {
        let (result, _) = scan_patched("p/All", patch);
        let report = result.unwrap_or_else(|err| panic!("{label}: {err}"));
        assert!(report.is_clean(), "{label}: {:?}", report.broken);
    }
}

#[test]
fn javac_output_reports_the_failure_met_first() {
    let cases: Vec<(&str, &str, Patch)> = vec![
        (
            "p/All$Sq",
            "wrong name before a zero interface index",
            Box::new(|bytes, layout| {
                patch_u2(bytes, layout.this_class, layout.class("p/All$Shape"));
                patch_u2(bytes, layout.interfaces[0], 0);
            }),
        ),
        (
            "p/All$1",
            "wrong name before a bad Code attribute name",
            Box::new(|bytes, layout| {
                patch_u2(bytes, layout.this_class, layout.class("p/All"));
                patch_u2(bytes, layout.site("method <init>", "LineNumberTable").offset, 1039);
            }),
        ),
        (
            "p/All$Sq",
            "missing interface before a bad class attribute name",
            Box::new(|bytes, layout| {
                let last = layout.utf8_text("p/All$Shape") + "p/All$Shap".len();
                bytes[last] = b'f';
                patch_u2(bytes, layout.site("class", "SourceFile").offset, 79);
            }),
        ),
    ];
    for (class, label, patch) in &cases {
        let (result, sink) = scan_patched(class, patch);
        let report = result.unwrap_or_else(|err| panic!("{label}: {err}"));
        assert!(report.is_clean(), "{label}: {:?}", report.broken);
        assert_eq!(report.stats.unresolved, 1, "{label}");
        assert!(sink.broken_names().is_empty(), "{label}");
    }
}

#[test]
fn javac_sealed_hierarchy_violations_abort_the_scan() {
    let dropped = put("class", "PermittedSubclasses", 4, class("p/All$Sq"));
    let (result, _) = scan_patched("p/All$Shape", &dropped);
    let err = result.expect_err("unpermitted subtype is fatal");
    assert_eq!(err.code(), "VCI-3001");
    assert!(
        err.to_string()
            .contains("class p.All$Circle cannot implement sealed interface p.All$Shape"),
        "{err}"
    );

    let itself = put("class", "PermittedSubclasses", 2, class("p/All$E"));
    let (result, _) = scan_patched("p/All$E", &itself);
    let err = result.expect_err("unpermitted subclass is fatal");
    assert!(
        err.to_string()
            .contains("class p.All$E$1 cannot inherit from sealed class p.All$E"),
        "{err}"
    );
}

// ──────────────────── properties ────────────────────

#[test]
fn repeated_scans_are_identical() {
    let tree = ClassTree::new();
    for name in ["z/Last", "a/First", "m/Middle", "a/b/Deep"] {
        tree.add_bytes(&format!("{name}.class"), b"junk");
    }
    tree.add(&ClassFileBuilder::class("a.Good"));

    let roots = [tree.root().to_path_buf()];
    let (first, first_sink) = scan(&roots);
    let (second, second_sink) = scan(&roots);
    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(first_sink.broken_names(), second_sink.broken_names());
    assert_eq!(
        first_sink.broken_names(),
        vec!["a.First", "a.b.Deep", "m.Middle", "z.Last"]
    );
}

#[test]
fn unresolved_never_reported_in_any_root_order() {
    let one = ClassTree::new();
    let two = ClassTree::new();
    one.add(&ClassFileBuilder::class("a.Sub").extends("b.Base"));
    two.add(&ClassFileBuilder::class("b.Base"));
    two.add(&ClassFileBuilder::class("b.Impl").implements("c.Missing"));

    for roots in [
        vec![one.root().to_path_buf(), two.root().to_path_buf()],
        vec![two.root().to_path_buf(), one.root().to_path_buf()],
    ] {
        let (result, sink) = scan(&roots);
        let report = result.expect("scan succeeds");
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.stats.unresolved, 2);
        assert!(sink.broken_names().is_empty());
    }
}

#[test]
fn classification_ignores_other_roots() {
    // a.Sub's superclass exists only in the other root, where it is corrupt.
    let isolated = ClassTree::new();
    let other = ClassTree::new();
    isolated.add(&ClassFileBuilder::class("a.Sub").extends("a.Base"));
    other.add_bytes("a/Base.class", b"corrupt");

    let (result, _) = scan(&[isolated.root().to_path_buf(), other.root().to_path_buf()]);
    let report = result.expect("scan succeeds");
    assert_eq!(report.broken, vec!["a.Base"]);
    assert_eq!(report.stats.unresolved, 1);

    // The same superclass inside the root does affect the subclass.
    other.add(&ClassFileBuilder::class("a.Sub").extends("a.Base"));
    let (result, _) = scan(&[other.root().to_path_buf()]);
    assert_eq!(result.unwrap().broken, vec!["a.Base", "a.Sub"]);
}

#[test]
fn file_under_wrong_directory_is_not_broken() {
    let tree = ClassTree::new();
    tree.add_at("misplaced/Foo.class", &ClassFileBuilder::class("a.Foo"));

    let (result, _) = scan(&[tree.root().to_path_buf()]);
    let report = result.expect("scan succeeds");
    assert!(report.is_clean());
    assert_eq!(report.stats.unresolved, 1);
}

#[test]
fn structurally_invalid_members_are_broken() {
    let tree = ClassTree::new();
    tree.add(
        &ClassFileBuilder::class("a.Dup")
            .field(access::PRIVATE, "x", "I")
            .field(access::PRIVATE, "x", "I"),
    );
    tree.add(&ClassFileBuilder::class("a.BadDesc").field(access::PRIVATE, "x", "Q"));
    tree.add(&ClassFileBuilder::class("a.Future").version(99));
    tree.add(&ClassFileBuilder::class("a.Ok").method(access::PUBLIC, "run", "()V"));

    let (result, _) = scan(&[tree.root().to_path_buf()]);
    assert_eq!(
        result.unwrap().broken,
        vec!["a.BadDesc", "a.Dup", "a.Future"]
    );
}

#[test]
fn class_circularity_aborts_the_scan() {
    let tree = ClassTree::new();
    tree.add(&ClassFileBuilder::class("a.A").extends("a.B"));
    tree.add(&ClassFileBuilder::class("a.B").extends("a.A"));

    let (result, sink) = scan(&[tree.root().to_path_buf()]);
    let err = result.expect_err("circularity is fatal");
    assert_eq!(err.code(), "VCI-3001");
    assert!(sink.broken_names().is_empty());
}

// ──────────────────── CLI ────────────────────

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: vci [OPTIONS] [ROOT]..."),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("vci"),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn cli_scan_reports_broken_and_exits_zero() {
    let tree = ClassTree::new();
    tree.add(&ClassFileBuilder::class("a.Foo"));
    tree.add_bytes("a/Bar.class", b"junk");
    let root = root_arg(&tree);

    let result = common::run_cli_case(
        "cli_scan_reports_broken_and_exits_zero",
        &["--no-color", "--json", &root],
    );
    assert_eq!(
        result.code(),
        Some(0),
        "log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("INFO: Broken a.Bar"),
        "log: {}",
        result.log_path.display()
    );
    let payload = parse_json_line(&result.stdout);
    assert_eq!(payload["command"], "scan");
    assert_eq!(payload["broken"], serde_json::json!(["a.Bar"]));
    assert_eq!(payload["stats"]["loaded"], 1);
}

#[test]
fn cli_fail_on_broken_exits_four() {
    let tree = ClassTree::new();
    tree.add_bytes("a/Bar.class", b"junk");
    let root = root_arg(&tree);

    let result = common::run_cli_case(
        "cli_fail_on_broken_exits_four",
        &["--no-color", "--fail-on-broken", &root],
    );
    assert_eq!(result.code(), Some(4), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("1 broken artifact(s) found"));
}

#[test]
fn cli_fail_on_broken_from_env_when_clean_exits_zero() {
    let tree = ClassTree::new();
    tree.add(&ClassFileBuilder::class("a.Foo"));
    let root = root_arg(&tree);

    let result = common::run_cli_case_with_env(
        "cli_fail_on_broken_from_env_when_clean_exits_zero",
        &["--no-color", &root],
        &[("VCI_REPORT_FAIL_ON_BROKEN", "true")],
    );
    assert_eq!(result.code(), Some(0), "log: {}", result.log_path.display());
}

#[test]
fn cli_missing_root_is_fatal() {
    let tree = ClassTree::new();
    let missing = tree.root().join("nope").display().to_string();

    let result = common::run_cli_case("cli_missing_root_is_fatal", &["--no-color", &missing]);
    assert_eq!(result.code(), Some(2), "log: {}", result.log_path.display());
    assert!(
        result.stderr.contains("SEVERE: [VCI-2001]"),
        "log: {}",
        result.log_path.display()
    );
    assert!(!result.stderr.contains("Scanning ["));
    assert!(result.stdout.trim().is_empty());
}

#[test]
fn cli_without_roots_scans_nothing() {
    let result = common::run_cli_case("cli_without_roots_scans_nothing", &["--no-color", "--json"]);
    assert_eq!(result.code(), Some(0), "log: {}", result.log_path.display());
    assert!(
        result.stderr.contains("INFO: Scanning []"),
        "log: {}",
        result.log_path.display()
    );
    let payload = parse_json_line(&result.stdout);
    assert_eq!(payload["broken"], serde_json::json!([]));
    assert_eq!(payload["stats"]["roots"], 0);
}

#[test]
fn cli_roots_from_classpath_env() {
    let first = ClassTree::new();
    let second = ClassTree::new();
    first.add_bytes("a/Bar.class", b"junk");
    second.add_bytes("b/Baz.class", b"junk");
    let jar = first.root().join("lib.jar");
    fs::write(&jar, b"").unwrap();

    let joined = std::env::join_paths([first.root(), jar.as_path(), second.root()]).unwrap();
    let joined = joined.to_str().unwrap().to_string();
    let result = common::run_cli_case_with_env(
        "cli_roots_from_classpath_env",
        &["--no-color", "--json"],
        &[("CLASSPATH", &joined)],
    );
    assert_eq!(result.code(), Some(0), "log: {}", result.log_path.display());
    let payload = parse_json_line(&result.stdout);
    assert_eq!(payload["broken"], serde_json::json!(["a.Bar", "b.Baz"]));
    assert_eq!(payload["stats"]["roots"], 2);
}

#[test]
fn cli_class_path_flag_overrides_env() {
    let flagged = ClassTree::new();
    let ignored = ClassTree::new();
    flagged.add_bytes("a/Bar.class", b"junk");
    ignored.add_bytes("z/Zed.class", b"junk");
    let flag = root_arg(&flagged);
    let env = root_arg(&ignored);

    let result = common::run_cli_case_with_env(
        "cli_class_path_flag_overrides_env",
        &["--no-color", "--json", "--class-path", &flag],
        &[("CLASSPATH", &env)],
    );
    assert_eq!(result.code(), Some(0), "log: {}", result.log_path.display());
    let payload = parse_json_line(&result.stdout);
    assert_eq!(payload["broken"], serde_json::json!(["a.Bar"]));
}

#[test]
fn cli_human_mode_keeps_stdout_empty() {
    let tree = ClassTree::new();
    tree.add_bytes("a/Bar.class", b"junk");
    let root = root_arg(&tree);

    let result = common::run_cli_case_with_env(
        "cli_human_mode_keeps_stdout_empty",
        &["--no-color", &root],
        &[("VCI_OUTPUT_FORMAT", "human")],
    );
    assert_eq!(result.code(), Some(0), "log: {}", result.log_path.display());
    assert!(result.stdout.trim().is_empty());
    assert!(result.stderr.contains("Broken a.Bar"));
}

#[test]
fn cli_verbosity_controls_diagnostics() {
    let tree = ClassTree::new();
    tree.add(&ClassFileBuilder::class("x.X").extends("y.Y"));
    let root = root_arg(&tree);

    let quiet = common::run_cli_case("cli_verbosity_quiet", &["--no-color", "-q", &root]);
    assert_eq!(quiet.code(), Some(0), "log: {}", quiet.log_path.display());
    assert!(quiet.stderr.trim().is_empty(), "log: {}", quiet.log_path.display());

    let verbose = common::run_cli_case("cli_verbosity_verbose", &["--no-color", "-v", &root]);
    assert_eq!(verbose.code(), Some(0), "log: {}", verbose.log_path.display());
    assert!(
        verbose
            .stderr
            .contains("FINE: Skipping x.X: y.Y is not in this root"),
        "log: {}",
        verbose.log_path.display()
    );
    assert!(!verbose.stderr.contains("FINEST: Loading x.X"));

    let finest = common::run_cli_case(
        "cli_verbosity_finest",
        &["--no-color", "--log-level", "finest", &root],
    );
    assert!(finest.stderr.contains("FINEST: Loading x.X"));
}

#[test]
fn cli_writes_jsonl_event_log() {
    let tree = ClassTree::new();
    tree.add_bytes("a/Bar.class", b"junk");
    let root = root_arg(&tree);
    let log_dir = tempfile::tempdir().unwrap();
    let log = log_dir.path().join("events.jsonl");
    let log_arg = log.display().to_string();

    let result = common::run_cli_case(
        "cli_writes_jsonl_event_log",
        &["--no-color", "--jsonl", &log_arg, &root],
    );
    assert_eq!(result.code(), Some(0), "log: {}", result.log_path.display());

    let content = fs::read_to_string(&log).expect("jsonl written");
    let entries: Vec<Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect();
    let kinds: Vec<&str> = entries
        .iter()
        .filter_map(|e| e["event"].as_str())
        .collect();
    // scan_finished is a fine-level event and sits below the default threshold.
    assert_eq!(kinds, vec!["scan_started", "broken"]);
    assert_eq!(entries[1]["name"], "a.Bar");
    assert!(entries.iter().all(|e| e["ts"].is_string()));
}

#[test]
fn cli_invalid_config_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("vci.toml");
    fs::write(&config, "[scan]\nextension = \"\"\n").unwrap();
    let config_arg = config.display().to_string();
    let root = dir.path().display().to_string();

    let result = common::run_cli_case(
        "cli_invalid_config_is_a_usage_error",
        &["--no-color", "--config", &config_arg, &root],
    );
    assert_eq!(result.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("VCI-1001"), "log: {}", result.log_path.display());
}

#[test]
fn cli_config_file_sets_extension() {
    let tree = ClassTree::new();
    tree.add_bytes("a/Bar.klass", b"junk");
    tree.add_bytes("a/Ignored.class", b"junk");
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("vci.toml");
    fs::write(&config, "[scan]\nextension = \".klass\"\n").unwrap();
    let config_arg = config.display().to_string();
    let root = root_arg(&tree);

    let result = common::run_cli_case(
        "cli_config_file_sets_extension",
        &["--no-color", "--json", "--config", &config_arg, &root],
    );
    assert_eq!(result.code(), Some(0), "log: {}", result.log_path.display());
    let payload = parse_json_line(&result.stdout);
    assert_eq!(payload["broken"], serde_json::json!(["a.Bar"]));
}
