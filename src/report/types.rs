use serde::Serialize;
use std::collections::BTreeMap;

/// Structural problems found while grouping or segmenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralKind {
    /// A numstat line before any commit header
    OrphanStat,
    /// A diff line before any commit header
    OrphanDiff,
    /// Both `---` and `+++` name the null device
    BothSidesDevNull,
    /// A line inside a file's diff span that matches no known category
    UnrecognizedDiffLine,
    /// A line of a commit's diff that precedes its first file header
    LineOutsideFile,
    /// A body line inside a file but before its first hunk header
    BodyLineOutsideHunk,
    /// A file marked both new and deleted
    ConflictingFileFlags,
    /// A file change whose old and new names are both unknown
    MissingFileNames,
}

/// Kind of a recorded anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// The line was not valid UTF-8
    Decode,
    /// A numstat line whose counts could not be parsed
    ParseFailure,
    Structural(StructuralKind),
}

impl AnomalyKind {
    pub fn category(&self) -> &'static str {
        match self {
            AnomalyKind::Decode => "decode",
            AnomalyKind::ParseFailure => "parse",
            AnomalyKind::Structural(_) => "structural",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyKind::Decode => write!(f, "decode error"),
            AnomalyKind::ParseFailure => write!(f, "numstat parse failure"),
            AnomalyKind::Structural(kind) => {
                let label = match kind {
                    StructuralKind::OrphanStat => "numstat line outside a commit",
                    StructuralKind::OrphanDiff => "diff line outside a commit",
                    StructuralKind::BothSidesDevNull => "both filenames are /dev/null",
                    StructuralKind::UnrecognizedDiffLine => "unrecognized diff line",
                    StructuralKind::LineOutsideFile => "diff line before first file header",
                    StructuralKind::BodyLineOutsideHunk => "body line before first hunk",
                    StructuralKind::ConflictingFileFlags => "file marked new and deleted",
                    StructuralKind::MissingFileNames => "file change without names",
                };
                write!(f, "{}", label)
            }
        }
    }
}

/// A problem found in the input, recorded instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// 1-based line number in the input stream
    pub line_number: usize,
    /// The offending line (lossily decoded for decode errors)
    pub line: String,
    /// Hash of the commit being built when the anomaly was detected
    pub commit: Option<String>,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind, line_number: usize, line: impl Into<String>) -> Self {
        Self {
            kind,
            line_number,
            line: line.into(),
            commit: None,
        }
    }

    pub fn in_commit(mut self, sha1: Option<&str>) -> Self {
        self.commit = sha1.map(str::to_string);
        self
    }
}

/// Number of anomalies recorded per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnomalyCounts(BTreeMap<AnomalyKind, usize>);

impl AnomalyCounts {
    pub fn from_anomalies<'a>(anomalies: impl IntoIterator<Item = &'a Anomaly>) -> Self {
        let mut counts = BTreeMap::new();
        for anomaly in anomalies {
            *counts.entry(anomaly.kind).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, kind: AnomalyKind) -> usize {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    /// Total for one category: "decode", "parse" or "structural".
    pub fn category(&self, category: &str) -> usize {
        self.0
            .iter()
            .filter(|(kind, _)| kind.category() == category)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnomalyKind, usize)> + '_ {
        self.0.iter().map(|(kind, n)| (*kind, *n))
    }
}
