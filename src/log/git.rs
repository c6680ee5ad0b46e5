use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use super::{read_line, LineSource, LogError};
use crate::config::LogOptions;

/// The `--format` string whose fields the commit header parser expects.
pub fn commit_format(delimiter: &str) -> String {
    [
        "%H", "%h", "%T", "%P", "%d", "%an", "%ae", "%aI", "%cn", "%ce", "%cI", "%s",
    ]
    .join(delimiter)
}

/// Arguments for `git log` producing numstat and patch output.
pub fn git_log_args(options: &LogOptions, delimiter: &str) -> Vec<String> {
    let mut args = vec!["log".to_string()];
    if options.all {
        args.push("--all".to_string());
    }
    args.push("--numstat".to_string());
    args.push("--no-color".to_string());
    args.push(format!("--format=format:{}", commit_format(delimiter)));
    if let Some(since) = &options.since {
        args.push("--since".to_string());
        args.push(since.clone());
    }
    if let Some(until) = &options.until {
        args.push("--until".to_string());
        args.push(until.clone());
    }
    if options.no_renames {
        args.push("--no-renames".to_string());
    }
    if options.no_merges {
        args.push("--no-merges".to_string());
    }
    if options.show_diff {
        args.push("--patch".to_string());
    }
    if let Some(branch) = &options.branch {
        args.push(branch.clone());
    }
    if !options.paths.is_empty() {
        args.push("--".to_string());
        args.extend(options.paths.iter().cloned());
    }
    args
}

/// Streams the stdout of a running `git log`.
pub struct GitLogSource {
    child: Option<Child>,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
}

impl GitLogSource {
    #[instrument(skip(repo, options), fields(repo = %repo.display()))]
    pub fn spawn(repo: &Path, options: &LogOptions, delimiter: &str) -> Result<Self, LogError> {
        let args = git_log_args(options, delimiter);
        debug!(?args, "spawning git log");
        let mut child = Command::new("git")
            .args(&args)
            .current_dir(repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(LogError::Spawn)?;

        let stdout = child.stdout.take().ok_or(LogError::MissingPipe("stdout"))?;
        // Drain stderr concurrently so a chatty git cannot block on a full pipe.
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut bytes = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut bytes).await {
                    debug!(error = %e, "failed to read git stderr");
                }
                String::from_utf8_lossy(&bytes).into_owned()
            })
        });

        Ok(Self {
            child: Some(child),
            stdout: BufReader::new(stdout),
            stderr,
        })
    }
}

#[async_trait]
impl LineSource for GitLogSource {
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, LogError> {
        if let Some(line) = read_line(&mut self.stdout).await? {
            return Ok(Some(line));
        }
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };
        let status = child.wait().await?;
        debug!(%status, "git log finished");
        if !status.success() {
            let stderr = match self.stderr.take() {
                Some(handle) => handle.await.unwrap_or_default(),
                None => String::new(),
            };
            return Err(LogError::GitFailed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(None)
    }
}
