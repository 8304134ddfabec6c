use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use reqwest::Url;

use kdl_core::model::{DownloadRequest, Mode, Sinks};

const DEFAULT_SEQUENTIAL_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug, Clone)]
#[command(name = "kdownload", author, version, about = "Segmented, resumable, parallel HTTP downloader", long_about = None)]
pub struct Cli {
    /// Download URL
    #[arg(value_name = "url", required = true)]
    pub url: String,

    /// Additional mirror URLs, validated but not yet rotated through
    /// mid-download — the core scheduler always targets a single URL.
    #[arg(short = 'm', long = "mirror", value_name = "url")]
    pub mirrors: Vec<String>,

    /// Output file or directory
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,

    /// Transfer strategy
    #[arg(long = "mode", value_enum, default_value_t = CliMode::Pool)]
    pub mode: CliMode,

    /// Number of segments (segmented modes only)
    #[arg(short = 's', long = "segments", value_name = "int", default_value_t = 8)]
    pub segments: usize,

    /// Worker pool size (segmented_pool only; segmented_fixed always uses
    /// one worker per segment)
    #[arg(short = 'c', long = "connections", value_name = "int", default_value_t = 4)]
    pub connections: usize,

    /// Maximum retry attempts per segment
    #[arg(long = "max-retries", value_name = "int", default_value_t = 3)]
    pub max_retries: usize,

    /// Resume from existing partial download / segment store
    #[arg(long = "resume", action = ArgAction::SetTrue)]
    pub resume: bool,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", value_name = "secs")]
    pub timeout: Option<u64>,

    /// Quiet mode
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Stream progress as newline-delimited JSON instead of a text bar
    #[arg(long = "json", action = ArgAction::SetTrue)]
    pub json: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Sequential,
    Pool,
    Fixed,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Sequential => Mode::Sequential,
            CliMode::Pool => Mode::SegmentedPool,
            CliMode::Fixed => Mode::SegmentedFixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Quiet,
    Text,
    Json,
}

impl Cli {
    pub fn progress_mode(&self) -> ProgressMode {
        if self.json {
            ProgressMode::Json
        } else if self.quiet {
            ProgressMode::Quiet
        } else {
            ProgressMode::Text
        }
    }

    pub fn log_level(&self) -> kdl_core::logging::LogLevel {
        if self.quiet {
            kdl_core::logging::LogLevel::Quiet
        } else if self.verbose {
            kdl_core::logging::LogLevel::Verbose
        } else {
            kdl_core::logging::LogLevel::Normal
        }
    }
}

/// Resolves `--mirror` URLs down to a single primary URL (the core scheduler
/// only ever sees one `url`, no per-segment mirror failover). Mirrors are
/// parsed and validated so a typo surfaces early, but today exist only as
/// documented intent for a future rotation layer outside the core.
fn resolve_primary_url(cli: &Cli) -> Result<Url> {
    let primary = Url::parse(&cli.url).with_context(|| format!("invalid URL: {}", cli.url))?;
    if primary.scheme() != "http" && primary.scheme() != "https" {
        return Err(anyhow!("unsupported URL scheme: {}", primary.scheme()));
    }
    for mirror in &cli.mirrors {
        let parsed =
            Url::parse(mirror).with_context(|| format!("invalid mirror URL: {mirror}"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(anyhow!("unsupported mirror URL scheme: {}", parsed.scheme()));
        }
    }
    Ok(primary)
}

pub fn resolve(cli: Cli, sinks: Sinks) -> Result<DownloadRequest> {
    let url = resolve_primary_url(&cli)?;

    let destination_directory = match &cli.output {
        Some(path) if path.is_dir() || path.to_string_lossy().ends_with('/') => path.clone(),
        Some(path) => path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".")),
        None => PathBuf::from("."),
    };

    let mode: Mode = cli.mode.into();

    let request_timeout = cli.timeout.map(Duration::from_secs).or_else(|| {
        matches!(mode, Mode::Sequential)
            .then(|| Duration::from_secs(DEFAULT_SEQUENTIAL_TIMEOUT_SECS))
    });

    Ok(DownloadRequest {
        url,
        destination_directory,
        mode,
        segment_count: cli.segments.max(1),
        worker_count: cli.connections.max(1),
        max_retries: cli.max_retries,
        allow_resume: cli.resume,
        request_timeout,
        sinks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_mode_defaults_to_text() {
        let cli = Cli::try_parse_from(["kdownload", "https://example.com/file"]).unwrap();
        assert_eq!(cli.progress_mode(), ProgressMode::Text);
    }

    #[test]
    fn progress_mode_respects_quiet() {
        let cli =
            Cli::try_parse_from(["kdownload", "https://example.com/file", "--quiet"]).unwrap();
        assert_eq!(cli.progress_mode(), ProgressMode::Quiet);
    }

    #[test]
    fn progress_mode_prefers_json_flag() {
        let cli = Cli::try_parse_from([
            "kdownload",
            "https://example.com/file",
            "--quiet",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.progress_mode(), ProgressMode::Json);
    }

    #[test]
    fn resolve_rejects_unsupported_scheme() {
        let cli = Cli::try_parse_from(["kdownload", "ftp://example.com/file"]).unwrap();
        assert!(resolve(cli, Sinks::default()).is_err());
    }

    #[test]
    fn resolve_defaults_sequential_timeout() {
        let cli = Cli::try_parse_from([
            "kdownload",
            "https://example.com/file",
            "--mode",
            "sequential",
        ])
        .unwrap();
        let request = resolve(cli, Sinks::default()).unwrap();
        assert_eq!(
            request.request_timeout,
            Some(Duration::from_secs(DEFAULT_SEQUENTIAL_TIMEOUT_SECS))
        );
    }

    #[test]
    fn resolve_leaves_segmented_timeout_unset_by_default() {
        let cli = Cli::try_parse_from(["kdownload", "https://example.com/file"]).unwrap();
        let request = resolve(cli, Sinks::default()).unwrap();
        assert_eq!(request.request_timeout, None);
    }
}
