use tracing::{debug, warn};

use super::classify::{ClassifiedLine, Malformed, MalformedKind};
use super::types::{Commit, SourceLine};
use crate::report::types::{Anomaly, AnomalyKind, StructuralKind};

/// Commits in input order plus everything that could not be attached to one.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GroupedLog {
    pub commits: Vec<Commit>,
    pub anomalies: Vec<Anomaly>,
}

/// Folds classified lines into commits, one line at a time.
///
/// A commit is only emitted when the next header arrives or on [`Grouper::finish`],
/// so dropping a grouper mid-stream never exposes a half-built commit.
#[derive(Debug, Default)]
pub struct Grouper {
    current: Option<Commit>,
    commits: Vec<Commit>,
    anomalies: Vec<Anomaly>,
}

impl Grouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line_number: usize, line: ClassifiedLine) {
        match line {
            ClassifiedLine::Commit(header) => {
                self.close_current();
                self.current = Some(Commit::new(header));
            }
            ClassifiedLine::Stat { stat, raw } => match self.current.as_mut() {
                // numstat precedes the patch, so past the first diff line
                // this is a body line that happens to look like a stat
                Some(commit) if !commit.diff_lines.is_empty() => {
                    commit.diff_lines.push(SourceLine {
                        number: line_number,
                        text: raw,
                    })
                }
                Some(commit) => commit.statistics.push(stat),
                None => self.orphan(StructuralKind::OrphanStat, line_number, raw),
            },
            ClassifiedLine::Diff(text) => match self.current.as_mut() {
                Some(commit) => commit.diff_lines.push(SourceLine {
                    number: line_number,
                    text,
                }),
                None => self.orphan(StructuralKind::OrphanDiff, line_number, text),
            },
            ClassifiedLine::Malformed(Malformed {
                kind: MalformedKind::StatParse,
                text,
            }) if self
                .current
                .as_ref()
                .is_some_and(|commit| !commit.diff_lines.is_empty()) =>
            {
                if let Some(commit) = self.current.as_mut() {
                    commit.diff_lines.push(SourceLine {
                        number: line_number,
                        text,
                    });
                }
            }
            ClassifiedLine::Malformed(malformed) => {
                let kind = match malformed.kind {
                    MalformedKind::Decode => AnomalyKind::Decode,
                    MalformedKind::StatParse => AnomalyKind::ParseFailure,
                };
                debug!(line = line_number, %kind, "malformed line");
                let sha1 = self.current.as_ref().map(|c| c.header.sha1.as_str());
                self.anomalies
                    .push(Anomaly::new(kind, line_number, malformed.text).in_commit(sha1));
            }
            ClassifiedLine::Blank => {}
        }
    }

    pub fn finish(mut self) -> GroupedLog {
        self.close_current();
        GroupedLog {
            commits: self.commits,
            anomalies: self.anomalies,
        }
    }

    fn close_current(&mut self) {
        if let Some(commit) = self.current.take() {
            debug!(
                sha1 = %commit.header.abbrev,
                statistics = commit.statistics.len(),
                diff_lines = commit.diff_lines.len(),
                "closed commit"
            );
            self.commits.push(commit);
        }
    }

    fn orphan(&mut self, kind: StructuralKind, line_number: usize, text: String) {
        warn!(line = line_number, ?kind, "line has no enclosing commit, dropping it");
        self.anomalies
            .push(Anomaly::new(AnomalyKind::Structural(kind), line_number, text));
    }
}

/// Group a whole sequence of `(line number, classified line)` pairs.
pub fn group(lines: impl IntoIterator<Item = (usize, ClassifiedLine)>) -> GroupedLog {
    let mut grouper = Grouper::new();
    for (line_number, line) in lines {
        grouper.push(line_number, line);
    }
    grouper.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::classify::{classify, parse_header};
    use crate::log::types::{LineCount, Statistic};
    use crate::profile::{PatternProfile, ProfileRegistry};
    use std::sync::Arc;

    fn geth() -> Arc<dyn PatternProfile> {
        ProfileRegistry::with_builtins().unwrap().get("go-ethereum").unwrap()
    }

    fn header_line(sha: char) -> String {
        let sha1 = sha.to_string().repeat(40);
        format!(
            "{sha1}----{}----{}------------Ann----ann@x.org----2017-01-01T00:00:00+00:00----Ann----ann@x.org----2017-01-01T00:00:00+00:00----change {sha}",
            &sha1[..9],
            "e".repeat(40)
        )
    }

    fn classify_all(profile: &dyn PatternProfile, lines: &[&str]) -> Vec<(usize, ClassifiedLine)> {
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| (i + 1, classify(profile, line.as_bytes())))
            .collect()
    }

    #[test]
    fn test_single_commit_with_stat() {
        let profile = geth();
        let header = header_line('a');
        let grouped = group(classify_all(profile.as_ref(), &[&header, "3\t1\tREADME.md", ""]));
        assert_eq!(grouped.commits.len(), 1);
        assert!(grouped.anomalies.is_empty());
        let commit = &grouped.commits[0];
        assert_eq!(
            commit.statistics,
            vec![Statistic {
                added: LineCount::Lines(3),
                removed: LineCount::Lines(1),
                path: "README.md".to_string(),
            }]
        );
        assert!(commit.diff_lines.is_empty());
        assert!(commit.file_changes.is_empty());
    }

    #[test]
    fn test_stat_before_first_commit_is_orphan() {
        let profile = geth();
        let header = header_line('b');
        let grouped = group(classify_all(
            profile.as_ref(),
            &["2\t0\tmain.go", &header, "1\t1\tmain.go"],
        ));
        assert_eq!(grouped.commits.len(), 1);
        assert_eq!(grouped.commits[0].statistics.len(), 1);
        assert_eq!(grouped.anomalies.len(), 1);
        let anomaly = &grouped.anomalies[0];
        assert_eq!(anomaly.kind, AnomalyKind::Structural(StructuralKind::OrphanStat));
        assert_eq!(anomaly.line_number, 1);
        assert_eq!(anomaly.line, "2\t0\tmain.go");
        assert!(anomaly.commit.is_none());
    }

    #[test]
    fn test_orphan_stat_reports_the_line_as_read() {
        let profile = geth();
        let grouped = group(classify_all(profile.as_ref(), &["007\t1\tx.go"]));
        assert_eq!(grouped.anomalies.len(), 1);
        assert_eq!(grouped.anomalies[0].line, "007\t1\tx.go");
    }

    #[test]
    fn test_stat_shaped_body_lines_stay_in_the_diff() {
        let profile = geth();
        let header = header_line('f');
        let grouped = group(classify_all(
            profile.as_ref(),
            &[
                &header,
                "1\t1\tdata.tsv",
                "diff --git a/data.tsv b/data.tsv",
                "--- a/data.tsv",
                "+++ b/data.tsv",
                "@@ -1,2 +1,2 @@",
                "-\t-\tcol",
                "-12\t3\tcol",
                "+12\t4\tcol",
                "9999999999\t0\tx",
            ],
        ));
        assert!(grouped.anomalies.is_empty());
        let commit = &grouped.commits[0];
        assert_eq!(commit.statistics.len(), 1);
        assert_eq!(commit.statistics[0].path, "data.tsv");
        let texts: Vec<&str> = commit.diff_lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(&texts[4..], &["-\t-\tcol", "-12\t3\tcol", "+12\t4\tcol", "9999999999\t0\tx"]);
        assert_eq!(commit.diff_lines[4].number, 7);
    }

    #[test]
    fn test_diff_before_first_commit_is_orphan() {
        let grouped = group(vec![(1, ClassifiedLine::Diff("+stray".to_string()))]);
        assert!(grouped.commits.is_empty());
        assert_eq!(
            grouped.anomalies[0].kind,
            AnomalyKind::Structural(StructuralKind::OrphanDiff)
        );
    }

    #[test]
    fn test_commits_keep_input_order() {
        let profile = geth();
        let (a, b, c) = (header_line('a'), header_line('b'), header_line('c'));
        let grouped = group(classify_all(profile.as_ref(), &[&c, &a, &b]));
        let shas: Vec<char> = grouped
            .commits
            .iter()
            .map(|commit| commit.header.sha1.chars().next().unwrap())
            .collect();
        assert_eq!(shas, vec!['c', 'a', 'b']);
    }

    #[test]
    fn test_malformed_lines_go_to_anomalies_tagged_with_commit() {
        let profile = geth();
        let header = header_line('d');
        let mut lines = classify_all(profile.as_ref(), &[&header, "1\t0\tx.go"]);
        lines.push((3, classify(profile.as_ref(), b"+\xff\xfe")));
        lines.push((4, classify(profile.as_ref(), b"diff --git a/x.go b/x.go")));
        let grouped = group(lines);

        assert_eq!(grouped.commits[0].statistics.len(), 1);
        assert_eq!(grouped.commits[0].diff_lines.len(), 1);
        assert_eq!(grouped.commits[0].diff_lines[0].number, 4);
        assert_eq!(grouped.anomalies.len(), 1);
        assert_eq!(grouped.anomalies[0].kind, AnomalyKind::Decode);
        assert_eq!(grouped.anomalies[0].commit.as_deref(), Some(&*"d".repeat(40)));
    }

    #[test]
    fn test_every_non_blank_line_is_accounted_for() {
        let profile = geth();
        let (a, b) = (header_line('a'), header_line('b'));
        let input: [&str; 12] = [
            "+orphan",
            &a,
            "3\t1\tREADME",
            "",
            "diff --git a/README b/README",
            "@@ -1 +1 @@",
            "-old",
            "+new",
            &b,
            "9999999999\t0\tbig.go",
            "1\t0\tsmall.go",
            "   ",
        ];
        let non_blank = input.iter().filter(|l| !l.trim().is_empty()).count();
        let headers = 2;
        let grouped = group(classify_all(profile.as_ref(), &input));

        let attached: usize = grouped
            .commits
            .iter()
            .map(|c| c.statistics.len() + c.diff_lines.len())
            .sum();
        assert_eq!(attached + grouped.anomalies.len() + headers, non_blank);
        assert_eq!(grouped.commits[0].statistics.len() + grouped.commits[0].diff_lines.len(), 5);
        assert_eq!(grouped.commits[1].statistics.len(), 1);
    }

    #[test]
    fn test_finish_closes_open_commit() {
        let mut grouper = Grouper::new();
        grouper.push(1, ClassifiedLine::Commit(parse_header("abc----ab----def", "----")));
        grouper.push(
            2,
            ClassifiedLine::Malformed(Malformed {
                kind: MalformedKind::StatParse,
                text: "x".to_string(),
            }),
        );
        let grouped = grouper.finish();
        assert_eq!(grouped.commits.len(), 1);
        assert_eq!(grouped.anomalies[0].kind, AnomalyKind::ParseFailure);
        assert_eq!(grouped.anomalies[0].commit.as_deref(), Some("abc"));
    }
}
