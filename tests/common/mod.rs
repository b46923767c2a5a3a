//! Shared test infrastructure for integration tests.
//!
//! A fixture under `tests/fixtures/<name>/` holds the package files (`*.spec`,
//! optional `*.changes`), the `series` the mock quilt unpacks, canned
//! `responses/<op>-NNN.txt`, and an optional `osc-status.txt`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// Package fixture that runs the service against mock quilt and osc commands.
pub struct TestFixture {
    pub fixture_dir: PathBuf,
}

/// Isolated package copy plus mock state for one or more runs.
pub struct PreparedPackage {
    _temp_dir: TempDir,
    pub package_dir: PathBuf,
    state_dir: PathBuf,
}

impl PreparedPackage {
    /// Read a file from the package directory.
    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.package_dir.join(name))
            .unwrap_or_else(|err| panic!("read {name}: {err}"))
    }

    /// Forget how many responses the mock quilt has replayed.
    pub fn reset_mock_state(&self) {
        for op in ["push", "refresh"] {
            let _ = fs::remove_file(self.state_dir.join(format!("{op}.count")));
        }
    }
}

impl TestFixture {
    /// Load a fixture by name from tests/fixtures/{name}/.
    pub fn load(name: &str) -> Self {
        let fixture_dir = manifest_dir().join("tests/fixtures").join(name);
        assert!(
            fixture_dir.is_dir(),
            "missing fixture {}",
            fixture_dir.display()
        );
        Self { fixture_dir }
    }

    /// Check if `sh` is available; skip test if not.
    pub fn skip_if_shell_missing(&self) -> bool {
        let missing = which::which("sh").is_err();
        if missing {
            eprintln!("Skipping: sh not available");
        }
        missing
    }

    /// Copy the package files of the fixture into a fresh temp directory.
    pub fn prepare(&self) -> PreparedPackage {
        let temp_dir = TempDir::new().expect("create temp dir");
        let package_dir = temp_dir.path().join("package");
        let state_dir = temp_dir.path().join("state");
        fs::create_dir_all(&package_dir).expect("create package dir");
        fs::create_dir_all(&state_dir).expect("create state dir");
        for entry in fs::read_dir(&self.fixture_dir).expect("read fixture") {
            let path = entry.expect("fixture entry").path();
            let is_package_file = path
                .extension()
                .is_some_and(|ext| ext == "spec" || ext == "changes");
            if is_package_file {
                let name = path.file_name().expect("file name");
                fs::copy(&path, package_dir.join(name)).expect("copy package file");
            }
        }
        PreparedPackage {
            _temp_dir: temp_dir,
            package_dir,
            state_dir,
        }
    }

    /// Run the service binary in the prepared package with extra CLI args.
    pub fn run(&self, package: &PreparedPackage, args: &[&str]) -> Output {
        let quilt = mock_command(
            "tests/mock-quilt.sh",
            &[self.fixture_dir.as_path(), package.state_dir.as_path()],
        );
        let osc = mock_command("tests/mock-osc.sh", &[self.fixture_dir.as_path()]);
        Command::new(env!("CARGO_BIN_EXE_refresh-patches"))
            .args(args)
            .current_dir(&package.package_dir)
            .env("REFRESH_PATCHES_QUILT_COMMAND", quilt)
            .env("REFRESH_PATCHES_OSC_COMMAND", osc)
            .env("RUST_LOG", "refresh_patches=debug")
            .output()
            .expect("spawn refresh-patches")
    }
}

fn mock_command(script: &str, args: &[&Path]) -> String {
    let mut argv = vec![
        "sh".to_string(),
        manifest_dir().join(script).display().to_string(),
    ];
    argv.extend(args.iter().map(|path| path.display().to_string()));
    shell_words::join(argv)
}
