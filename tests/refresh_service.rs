//! End-to-end runs of the refresh-patches binary against mock quilt and osc.

mod common;

use common::TestFixture;

const SEPARATOR: &str = "-------------------------------------------------------------------";

#[test]
fn merged_patch_is_dropped_and_logged_once() {
    let fixture = TestFixture::load("merged-upstream");
    if fixture.skip_if_shell_missing() {
        return;
    }
    let package = fixture.prepare();
    let args = [
        "--changesgenerate",
        "enable",
        "--changesauthor",
        "packager@example.org",
        "--outdir",
        "/nonexistent/ignored",
    ];

    let output = fixture.run(&package, &args);
    assert!(
        output.status.success(),
        "first run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let spec = package.read("pkg.spec");
    assert!(spec.contains("Patch1:         a.patch\n"));
    assert!(spec.contains("%patch1 -p1\n"));
    assert!(!spec.contains("b.patch"));
    assert!(!spec.contains("%patch2"));

    let changes = package.read("pkg.changes");
    assert!(changes.starts_with(SEPARATOR));
    assert!(changes.contains(" - packager@example.org\n\n- Rebased patches:\n  + b.patch dropped (merged upstream)\n\n"));
    assert!(changes.ends_with("- Update to version 1.0\n\n"));

    // Same stack again: the newest entry already says this.
    package.reset_mock_state();
    let output = fixture.run(&package, &args);
    assert!(
        output.status.success(),
        "second run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(package.read("pkg.changes"), changes);
    assert_eq!(package.read("pkg.changes").matches(SEPARATOR).count(), 2);
}

#[test]
fn offset_patch_is_refreshed_and_reported_as_json() {
    let fixture = TestFixture::load("offset-refresh");
    if fixture.skip_if_shell_missing() {
        return;
    }
    let package = fixture.prepare();
    let original_spec = package.read("pkg.spec");

    let output = fixture.run(
        &package,
        &[
            "--changesgenerate",
            "enable",
            "--changesauthor",
            "packager@example.org",
            "--ignorefuzz",
            "enable",
            "--json",
        ],
    );
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is the JSON report");
    assert_eq!(report[0]["manifest"], "pkg.spec");
    assert_eq!(report[0]["refreshed"], serde_json::json!(["a.patch"]));
    assert_eq!(report[0]["dropped"], serde_json::json!([]));
    assert_eq!(report[0]["changes_written"], true);

    assert_eq!(package.read("pkg.spec"), original_spec);
    let changes = package.read("pkg.changes");
    assert!(changes.contains("- Rebased patches:\n  + a.patch\n  + c.patch (manually)\n\n"));
    assert!(!changes.contains("a.patch (manually)"));
    assert!(!changes.contains("pkg.spec"));
}

#[test]
fn fuzzy_patch_without_ignorefuzz_fails_the_run() {
    let fixture = TestFixture::load("fuzz-rejected");
    if fixture.skip_if_shell_missing() {
        return;
    }
    let package = fixture.prepare();
    let original_spec = package.read("pkg.spec");

    let output = fixture.run(&package, &["--changesgenerate", "enable"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("a.patch applies only with fuzz"), "stderr: {stderr}");
    assert_eq!(package.read("pkg.spec"), original_spec);
    assert!(!package.package_dir.join("pkg.changes").exists());
}
