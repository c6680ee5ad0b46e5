mod config;
mod log;
mod pipeline;
mod profile;
mod report;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use crate::log::{GitLogSource, ReaderSource};
use crate::pipeline::Pipeline;
use crate::profile::{ProfileRegistry, RegexProfile};

/// gitlog-parser: turns `git log --numstat --patch` output into a structured
/// commit history of file changes and hunks.
#[derive(Parser, Debug)]
#[command(name = "gitlog-parser", version, about)]
struct Cli {
    /// Path to the git repository whose history is parsed
    ///
    /// Not required when --input or --sample is used.
    repo: Option<PathBuf>,

    /// Parse a saved log file instead of running git ("-" reads stdin)
    #[arg(short, long, conflicts_with = "sample")]
    input: Option<PathBuf>,

    /// Parse the built-in sample log (no git repository needed)
    #[arg(long)]
    sample: bool,

    /// Pattern profile matching the repository (e.g. go-ethereum, js-ipfs)
    #[arg(short, long)]
    profile: Option<String>,

    /// Write the parsed history as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only commits more recent than this date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,

    /// Only commits older than this date (YYYY-MM-DD)
    #[arg(long)]
    until: Option<String>,

    /// Read history from this ref instead of all refs
    #[arg(long)]
    branch: Option<String>,

    /// Pass --no-renames to git log
    #[arg(long)]
    no_renames: bool,

    /// Pass --no-merges to git log
    #[arg(long)]
    no_merges: bool,

    /// Print the first N anomalies after the summary
    #[arg(long, default_value_t = 0)]
    show_anomalies: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let mut config = config::Config::load()?;
    apply_cli_overrides(&cli, &mut config.log);

    let mut registry = ProfileRegistry::with_builtins()?;
    for (name, params) in &config.profiles {
        registry.register(Arc::new(RegexProfile::compile(name, params)?));
    }
    let profile_name = config.profile_name(cli.profile.as_deref()).to_string();
    let pipeline = Pipeline::new(registry.get(&profile_name)?);
    debug!(profile = %profile_name, "selected pattern profile");

    let parsed = if cli.sample {
        info!("parsing built-in sample log");
        pipeline.parse_lines(include_str!("../tests/fixtures/sample_log.txt").lines())
    } else if let Some(input) = cli.input.as_deref() {
        let span = info_span!("parse_file", input = %input.display());
        if input.as_os_str() == "-" {
            let mut source = ReaderSource::new(BufReader::new(tokio::io::stdin()));
            pipeline.parse_source(&mut source).instrument(span).await?
        } else {
            let mut source = ReaderSource::open(input).await?;
            pipeline.parse_source(&mut source).instrument(span).await?
        }
    } else {
        let repo = cli.repo.as_deref().ok_or(
            "a repository path is required unless --input or --sample is used. Usage: gitlog-parser <REPO> or gitlog-parser --sample",
        )?;
        let span = info_span!("parse_repo", repo = %repo.display());
        let mut source = GitLogSource::spawn(repo, &config.log, pipeline.profile().delimiter())?;
        pipeline.parse_source(&mut source).instrument(span).await?
    };

    let summary = report::build(&parsed, &profile_name);
    report::output(&summary, &parsed, cli.output.as_deref(), cli.show_anomalies)?;
    info!(
        commits = summary.commits,
        anomalies = summary.anomalies.total(),
        "done"
    );

    Ok(())
}

/// Command-line flags take precedence over the config file.
fn apply_cli_overrides(cli: &Cli, log: &mut config::LogOptions) {
    if cli.since.is_some() {
        log.since = cli.since.clone();
    }
    if cli.until.is_some() {
        log.until = cli.until.clone();
    }
    if cli.branch.is_some() {
        log.branch = cli.branch.clone();
        log.all = false;
    }
    log.no_renames |= cli.no_renames;
    log.no_merges |= cli.no_merges;
}
