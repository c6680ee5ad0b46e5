use serde::{Serialize, Serializer};

/// Placeholder path used by unified diffs for the side of a change that does not exist.
pub const DEV_NULL: &str = "/dev/null";

/// Metadata parsed from one commit header line of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitHeader {
    /// Full commit hash
    pub sha1: String,
    /// Abbreviated commit hash as printed by git
    pub abbrev: String,
    /// Tree hash
    pub tree: String,
    /// Parent hashes. `None` for a root commit, never an empty list.
    pub parents: Option<Vec<String>>,
    /// Ref names decorating the commit (branches, tags)
    pub refs: Option<Vec<String>>,
    pub author: Signature,
    pub committer: Signature,
    /// First line of the commit message
    pub subject: String,
    /// The header line exactly as read
    pub raw: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Strict ISO 8601 timestamp
    pub date: String,
}

/// A line count from a `--numstat` line. Git prints `-` for binary files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCount {
    Lines(u32),
    Binary,
}

impl Serialize for LineCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LineCount::Lines(n) => serializer.serialize_u32(*n),
            LineCount::Binary => serializer.serialize_str("-"),
        }
    }
}

impl std::fmt::Display for LineCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineCount::Lines(n) => write!(f, "{}", n),
            LineCount::Binary => write!(f, "-"),
        }
    }
}

/// One `--numstat` line: lines added, lines removed, path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistic {
    pub added: LineCount,
    pub removed: LineCount,
    pub path: String,
}

/// A raw line together with its 1-based position in the input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// A commit with its statistics and, once segmented, its file changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    #[serde(flatten)]
    pub header: CommitHeader,
    pub statistics: Vec<Statistic>,
    /// Diff lines collected by the grouper, consumed by segmentation.
    #[serde(skip)]
    pub diff_lines: Vec<SourceLine>,
    pub file_changes: Vec<FileChange>,
}

impl Commit {
    pub fn new(header: CommitHeader) -> Self {
        Self {
            header,
            statistics: Vec::new(),
            diff_lines: Vec::new(),
            file_changes: Vec::new(),
        }
    }

    pub fn hunk_count(&self) -> usize {
        self.file_changes.iter().map(|f| f.hunks.len()).sum()
    }
}

/// One side of a `---`/`+++` filename pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileName {
    /// The null-device sentinel: this side does not exist.
    DevNull,
    Path(String),
}

impl FileName {
    pub fn as_str(&self) -> &str {
        match self {
            FileName::DevNull => DEV_NULL,
            FileName::Path(path) => path,
        }
    }

    pub fn is_dev_null(&self) -> bool {
        matches!(self, FileName::DevNull)
    }
}

impl Serialize for FileName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The changes made to a single file within one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileChange {
    /// Preimage name. `None` when no filename line or rename line named it.
    pub old_filename: Option<FileName>,
    /// Postimage name. `None` when no filename line or rename line named it.
    pub new_filename: Option<FileName>,
    /// File mode from the index or mode lines (e.g. "100644")
    pub file_type: Option<String>,
    pub is_rename: bool,
    pub is_new: bool,
    pub is_deletion: bool,
    pub hunks: Vec<Hunk>,
    /// Every line of this file's diff span, header lines included
    pub raw_diff: Vec<String>,
    /// Number of hunk headers seen; always equals `hunks.len()` once closed
    pub change_count: usize,
}

/// A contiguous region of changes within a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    /// Starting line number in the old file
    pub old_start: u32,
    /// Number of lines in the old file (1 when omitted in the header)
    pub old_len: u32,
    /// Starting line number in the new file
    pub new_start: u32,
    /// Number of lines in the new file (1 when omitted in the header)
    pub new_len: u32,
    /// Enclosing function or section name from the header's trailing text
    pub function: Option<String>,
    /// Raw lines of the hunk (prefixed with +, -, space or backslash)
    pub lines: Vec<String>,
}
