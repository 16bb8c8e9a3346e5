use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Run every sweep and report, touching nothing.
    Scan,
    /// Scan, then attempt a fix for every discovered error.
    Fix,
    /// Recreate missing directories and default data files.
    Rebuild,
    /// Continuous scan-and-fix loop until interrupted.
    Monitor,
    /// Serve the agent's operations over HTTP.
    Api,
    /// Lint a single file.
    Analyze,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Scan => write!(f, "scan"),
            Mode::Fix => write!(f, "fix"),
            Mode::Rebuild => write!(f, "rebuild"),
            Mode::Monitor => write!(f, "monitor"),
            Mode::Api => write!(f, "api"),
            Mode::Analyze => write!(f, "analyze"),
        }
    }
}

#[derive(Parser)]
#[command(name = "codemedic")]
#[command(version)]
#[command(about = "Local pattern-driven error detection and repair agent")]
pub struct Args {
    /// Operating mode
    #[arg(long, value_enum, default_value = "fix")]
    pub mode: Mode,

    /// Port for api mode
    #[arg(long, default_value = "5050")]
    pub port: u16,

    /// File to lint in analyze mode
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Root of the managed project tree
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["codemedic"]);
        assert_eq!(args.mode, Mode::Fix);
        assert_eq!(args.port, 5050);
        assert!(args.file.is_none());
        assert_eq!(args.root, PathBuf::from("."));
    }

    #[test]
    fn test_args_parse_scan_mode() {
        let args = Args::parse_from(["codemedic", "--mode", "scan"]);
        assert_eq!(args.mode, Mode::Scan);
    }

    #[test]
    fn test_args_parse_monitor_mode() {
        let args = Args::parse_from(["codemedic", "--mode", "monitor"]);
        assert_eq!(args.mode, Mode::Monitor);
    }

    #[test]
    fn test_args_parse_api_mode_with_port() {
        let args = Args::parse_from(["codemedic", "--mode", "api", "--port", "8099"]);
        assert_eq!(args.mode, Mode::Api);
        assert_eq!(args.port, 8099);
    }

    #[test]
    fn test_args_parse_analyze_with_file() {
        let args = Args::parse_from(["codemedic", "--mode", "analyze", "--file", "frontend/app.js"]);
        assert_eq!(args.mode, Mode::Analyze);
        assert_eq!(args.file, Some(PathBuf::from("frontend/app.js")));
    }

    #[test]
    fn test_args_parse_root_override() {
        let args = Args::parse_from(["codemedic", "--root", "/srv/shop"]);
        assert_eq!(args.root, PathBuf::from("/srv/shop"));
    }

    #[test]
    fn test_mode_display_round_trip() {
        for (mode, text) in [
            (Mode::Scan, "scan"),
            (Mode::Fix, "fix"),
            (Mode::Rebuild, "rebuild"),
            (Mode::Monitor, "monitor"),
            (Mode::Api, "api"),
            (Mode::Analyze, "analyze"),
        ] {
            assert_eq!(mode.to_string(), text);
        }
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Args::try_parse_from(["codemedic", "--mode", "panic"]).is_err());
    }
}
