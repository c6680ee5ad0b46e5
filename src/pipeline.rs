use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::log::classify::classify;
use crate::log::group::{group, GroupedLog, Grouper};
use crate::log::segment::segment;
use crate::log::types::Commit;
use crate::log::{LineSource, LogError};
use crate::profile::PatternProfile;
use crate::report::types::{Anomaly, AnomalyCounts};

/// The structured history plus every anomaly found while building it.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParsedLog {
    pub commits: Vec<Commit>,
    /// Grouping anomalies first, then segmentation anomalies in commit order
    pub anomalies: Vec<Anomaly>,
}

impl ParsedLog {
    pub fn anomaly_counts(&self) -> AnomalyCounts {
        AnomalyCounts::from_anomalies(&self.anomalies)
    }
}

/// Classify, group, then segment, using one profile for the whole run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    profile: Arc<dyn PatternProfile>,
}

impl Pipeline {
    pub fn new(profile: Arc<dyn PatternProfile>) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &dyn PatternProfile {
        self.profile.as_ref()
    }

    /// Parse lines that are already in memory.
    #[instrument(skip_all, fields(profile = self.profile.name()))]
    pub fn parse_lines<I, L>(&self, lines: I) -> ParsedLog
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let classified = lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| (i + 1, classify(self.profile(), line.as_ref())));
        self.segment_all(group(classified))
    }

    /// Parse lines as they arrive from `source`.
    ///
    /// On a source error nothing is returned: commits still being built are
    /// dropped with the grouper.
    #[instrument(skip_all, fields(profile = self.profile.name()))]
    pub async fn parse_source(&self, source: &mut dyn LineSource) -> Result<ParsedLog, LogError> {
        let mut grouper = Grouper::new();
        let mut line_number = 0;
        while let Some(line) = source.next_line().await? {
            line_number += 1;
            grouper.push(line_number, classify(self.profile(), &line));
        }
        info!(lines = line_number, "finished reading log");
        Ok(self.segment_all(grouper.finish()))
    }

    /// Segment every commit's diff lines in parallel; commits keep their order.
    fn segment_all(&self, grouped: GroupedLog) -> ParsedLog {
        let GroupedLog {
            mut commits,
            mut anomalies,
        } = grouped;
        info!(commits = commits.len(), anomalies = anomalies.len(), "grouped commits");

        let profile = self.profile();
        let per_commit: Vec<Vec<Anomaly>> = commits
            .par_iter_mut()
            .map(|commit| {
                let lines = std::mem::take(&mut commit.diff_lines);
                let segmented = segment(profile, &commit.header.sha1, &lines);
                debug!(
                    sha1 = %commit.header.abbrev,
                    files = segmented.files.len(),
                    anomalies = segmented.anomalies.len(),
                    "segmented commit"
                );
                commit.file_changes = segmented.files;
                segmented.anomalies
            })
            .collect();

        for (commit, found) in commits.iter().zip(&per_commit) {
            if !found.is_empty() {
                warn!(sha1 = %commit.header.abbrev, anomalies = found.len(), "diff anomalies in commit");
            }
        }
        anomalies.extend(per_commit.into_iter().flatten());

        let parsed = ParsedLog { commits, anomalies };
        info!(
            commits = parsed.commits.len(),
            anomalies = parsed.anomalies.len(),
            "parsed log"
        );
        parsed
    }
}
