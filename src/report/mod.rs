pub mod types;

pub use types::{Anomaly, AnomalyCounts};

use crate::pipeline::ParsedLog;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write output file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize parsed log: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Quality-control totals for one parsed log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub profile: String,
    pub commits: usize,
    pub statistics: usize,
    pub file_changes: usize,
    pub hunks: usize,
    pub new_files: usize,
    pub deletions: usize,
    pub renames: usize,
    pub anomalies: AnomalyCounts,
}

/// Count what the pipeline produced.
pub fn build(parsed: &ParsedLog, profile: &str) -> Summary {
    let files = || parsed.commits.iter().flat_map(|c| &c.file_changes);
    Summary {
        profile: profile.to_string(),
        commits: parsed.commits.len(),
        statistics: parsed.commits.iter().map(|c| c.statistics.len()).sum(),
        file_changes: files().count(),
        hunks: parsed.commits.iter().map(|c| c.hunk_count()).sum(),
        new_files: files().filter(|f| f.is_new).count(),
        deletions: files().filter(|f| f.is_deletion).count(),
        renames: files().filter(|f| f.is_rename).count(),
        anomalies: parsed.anomaly_counts(),
    }
}

/// Print the summary to the terminal and, if `output_path` is given,
/// persist the parsed log there as JSON.
#[instrument(skip(summary, parsed), fields(commits = summary.commits))]
pub fn output(
    summary: &Summary,
    parsed: &ParsedLog,
    output_path: Option<&Path>,
    show_anomalies: usize,
) -> Result<(), ReportError> {
    print_terminal_report(summary, &parsed.anomalies, show_anomalies);
    if let Some(path) = output_path {
        debug!(path = %path.display(), "writing parsed log to file");
        write_json_report(parsed, path)?;
    }
    Ok(())
}

fn print_terminal_report(summary: &Summary, anomalies: &[Anomaly], show_anomalies: usize) {
    println!();
    print!("{}", format_summary(summary));
    if show_anomalies > 0 && !anomalies.is_empty() {
        println!();
        println!("═══ First {} anomalies ═══", show_anomalies.min(anomalies.len()));
        for anomaly in anomalies.iter().take(show_anomalies) {
            let commit = anomaly
                .commit
                .as_deref()
                .map(|sha| format!(" [{}]", &sha[..sha.len().min(9)]))
                .unwrap_or_default();
            println!(
                "  • line {}{}: {}: {}",
                anomaly.line_number,
                commit,
                anomaly.kind,
                anomaly.line.dimmed()
            );
        }
    }
    println!();
}

fn format_summary(summary: &Summary) -> String {
    let mut out = String::new();
    out.push_str(&format!("═══ Parsed log (profile: {}) ═══\n", summary.profile.bold()));
    out.push_str(&format!(
        "Commits: {} | Statistics: {} | File changes: {} | Hunks: {}\n",
        summary.commits, summary.statistics, summary.file_changes, summary.hunks
    ));
    out.push_str(&format!(
        "New files: {} | Deletions: {} | Renames: {}\n",
        summary.new_files, summary.deletions, summary.renames
    ));
    out.push_str(&format!(
        "Anomalies: {} (decode {}, parse {}, structural {})\n",
        colorize_count(summary.anomalies.total()),
        summary.anomalies.category("decode"),
        summary.anomalies.category("parse"),
        summary.anomalies.category("structural"),
    ));
    for (kind, count) in summary.anomalies.iter() {
        out.push_str(&format!("  • {}: {}\n", kind, count));
    }
    out
}

/// Write commits and anomalies as pretty-printed JSON.
fn write_json_report(parsed: &ParsedLog, path: &Path) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, parsed)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn colorize_count(count: usize) -> colored::ColoredString {
    if count == 0 {
        count.to_string().green().bold()
    } else {
        count.to_string().yellow().bold()
    }
}
