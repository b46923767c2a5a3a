//! CLI argument parsing for the refresh-patches service.
//!
//! The flag names follow the packaging-service convention of
//! `--<name> <value>` pairs with `enable`/`disable` switches, so the service
//! can be driven from a `_service` file unchanged.
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Two-state switch used by the service flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    Enable,
    #[default]
    Disable,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Toggle::Enable)
    }
}

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "refresh-patches",
    version,
    about = "Refresh the quilt patch stack of every spec file in a package",
    after_help = "Examples:\n  refresh-patches --changesgenerate enable\n  refresh-patches --ignorefuzz enable --changesauthor me@example.org\n\nEnvironment:\n  REFRESH_PATCHES_QUILT_COMMAND  Override the quilt command\n  REFRESH_PATCHES_OSC_COMMAND    Override the osc command\n  RUST_LOG                       Tracing filter (default refresh_patches=info)"
)]
pub struct RootArgs {
    /// Add a changes-file entry describing refreshed and dropped patches
    #[arg(long, value_enum, value_name = "SWITCH", default_value = "disable")]
    pub changesgenerate: Toggle,

    /// Author of the changes-file entry (defaults to the email in ~/.oscrc)
    #[arg(long, value_name = "AUTHOR")]
    pub changesauthor: Option<String>,

    /// Refresh patches that only apply with fuzz instead of failing
    #[arg(long, value_enum, value_name = "SWITCH", default_value = "disable")]
    pub ignorefuzz: Toggle,

    /// Output directory passed by the service runner (unused; files are edited in place)
    #[arg(long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Package directory containing the spec files and patches
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub sourcedir: PathBuf,

    /// Emit a machine-readable JSON report per spec file on stdout
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_flags_parse_enable_disable_values() {
        let args = RootArgs::try_parse_from([
            "refresh-patches",
            "--changesgenerate",
            "enable",
            "--ignorefuzz",
            "disable",
            "--changesauthor",
            "packager@example.org",
            "--outdir",
            "/tmp/out",
        ])
        .expect("parse args");
        assert!(args.changesgenerate.enabled());
        assert!(!args.ignorefuzz.enabled());
        assert_eq!(args.changesauthor.as_deref(), Some("packager@example.org"));
        assert_eq!(args.sourcedir, PathBuf::from("."));
    }

    #[test]
    fn switches_default_to_disable() {
        let args = RootArgs::try_parse_from(["refresh-patches"]).expect("parse args");
        assert_eq!(args.changesgenerate, Toggle::Disable);
        assert_eq!(args.ignorefuzz, Toggle::Disable);
        assert!(args.changesauthor.is_none());
    }

    #[test]
    fn unknown_switch_value_is_rejected() {
        let err = RootArgs::try_parse_from(["refresh-patches", "--ignorefuzz", "maybe"]);
        assert!(err.is_err());
    }
}
