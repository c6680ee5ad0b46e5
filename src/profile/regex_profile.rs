use regex::Regex;
use serde::Deserialize;

use super::{DiffPaths, FileNameLine, HunkHeader, IndexLine, PatternProfile, ProfileError, StatFields};
use crate::log::types::FileName;

/// Longest line count accepted in a numstat column.
const MAX_STATS_LEN: usize = 10;

/// Git never abbreviates object ids below this length in index lines.
const MIN_INDEX_ABBREV: usize = 7;

pub const DEFAULT_DELIMITER: &str = "----";

/// The knobs that differ between repositories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileParams {
    /// Length of a full object id
    pub hash_len: usize,
    /// Length of the abbreviated commit id printed by `%h`
    pub abbrev_len: usize,
    /// Longest file extension accepted in numstat paths
    pub ext_len: usize,
    /// Field separator of the commit header line
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

/// Parameters of the profiles that ship with the tool.
pub fn builtin_params() -> Vec<(&'static str, ProfileParams)> {
    vec![
        (
            "go-ethereum",
            ProfileParams {
                hash_len: 40,
                abbrev_len: 9,
                ext_len: 3,
                delimiter: default_delimiter(),
            },
        ),
        (
            "js-ipfs",
            ProfileParams {
                hash_len: 40,
                abbrev_len: 7,
                ext_len: 6,
                delimiter: default_delimiter(),
            },
        ),
    ]
}

/// A profile whose rules are regular expressions built from [`ProfileParams`].
#[derive(Debug)]
pub struct RegexProfile {
    name: String,
    delimiter: String,
    commit: Regex,
    stat: Regex,
    diff_start: Regex,
    diff_paths: Regex,
    index: Regex,
    new_index: Regex,
    filename: Regex,
    devnull_filename: Regex,
    hunk_header: Regex,
    context_name: Regex,
    raw_diff_line: Regex,
}

impl RegexProfile {
    pub fn compile(name: &str, params: &ProfileParams) -> Result<Self, ProfileError> {
        validate(name, params)?;
        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|source| ProfileError::InvalidPattern {
                profile: name.to_string(),
                pattern,
                source,
            })
        };

        let delim = regex::escape(&params.delimiter);
        let hash = format!("[0-9a-f]{{{}}}", params.hash_len);
        let abbrev = format!("[0-9a-f]{{{}}}", params.abbrev_len);
        let index_id = format!(
            "[0-9a-f]{{{},{}}}",
            MIN_INDEX_ABBREV.min(params.abbrev_len),
            params.hash_len
        );

        Ok(Self {
            name: name.to_string(),
            delimiter: params.delimiter.clone(),
            commit: build(format!("^{hash}{delim}{abbrev}{delim}{hash}{delim}"))?,
            // The path either has no dot in its last component or ends in a
            // short extension, optionally closing a `{old => new}` rename.
            stat: build(format!(
                r"^(\d{{1,{max}}}|-)\t(\d{{1,{max}}}|-)\t((?:[^\t]*/)?[^/\t.]+|[^\t]*\.\w{{1,{ext}}}\}}?)$",
                max = MAX_STATS_LEN,
                ext = params.ext_len,
            ))?,
            diff_start: build(r#"^diff --git "?a/.+ "?b/.+$"#.to_string())?,
            // Lazy on the old side so `a/x y.go b/x y.go` splits at ` b/`.
            diff_paths: build(r#"^diff --git (?:"a/(.+?)"|a/(.+?)) (?:"b/(.+)"|b/(.+))$"#.to_string())?,
            index: build(format!(r"^index {index_id}\.\.{index_id} ([0-7]{{6}})$"))?,
            new_index: build(format!(r"^index {index_id}\.\.{index_id}$"))?,
            filename: build(r#"^(?:--- (?:"a/(.+)"|a/(.+))|\+\+\+ (?:"b/(.+)"|b/(.+)))$"#.to_string())?,
            devnull_filename: build(r"^(---|\+\+\+) /dev/null$".to_string())?,
            hunk_header: build(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(.*)$".to_string())?,
            context_name: build(r"^[^\d\s]".to_string())?,
            raw_diff_line: build(r"^[ +\-\\]".to_string())?,
        })
    }
}

fn validate(name: &str, params: &ProfileParams) -> Result<(), ProfileError> {
    let invalid = |reason: &str| {
        Err(ProfileError::InvalidParams {
            profile: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if params.hash_len == 0 || params.abbrev_len == 0 || params.ext_len == 0 {
        return invalid("hash_len, abbrev_len and ext_len must be positive");
    }
    if params.abbrev_len > params.hash_len {
        return invalid("abbrev_len cannot exceed hash_len");
    }
    if params.delimiter.trim().is_empty() {
        return invalid("delimiter must contain a non-whitespace character");
    }
    Ok(())
}

impl PatternProfile for RegexProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn delimiter(&self) -> &str {
        &self.delimiter
    }

    fn is_commit(&self, line: &str) -> bool {
        self.commit.is_match(line)
    }

    fn match_stat<'a>(&self, line: &'a str) -> Option<StatFields<'a>> {
        let caps = self.stat.captures(line)?;
        Some(StatFields {
            added: caps.get(1)?.as_str(),
            removed: caps.get(2)?.as_str(),
            path: caps.get(3)?.as_str(),
        })
    }

    fn match_diff_start(&self, line: &str) -> Option<DiffPaths> {
        if !self.diff_start.is_match(line) {
            return None;
        }
        let Some(caps) = self.diff_paths.captures(line) else {
            return Some(DiffPaths::default());
        };
        let side = |quoted: usize, plain: usize| {
            caps.get(quoted)
                .or_else(|| caps.get(plain))
                .map(|m| m.as_str().to_string())
        };
        Some(DiffPaths {
            old: side(1, 2),
            new: side(3, 4),
        })
    }

    fn match_index(&self, line: &str) -> Option<IndexLine> {
        if let Some(caps) = self.index.captures(line) {
            return Some(IndexLine {
                mode: caps.get(1).map(|m| m.as_str().to_string()),
            });
        }
        self.new_index
            .is_match(line)
            .then_some(IndexLine { mode: None })
    }

    fn match_filename(&self, line: &str) -> Option<FileNameLine> {
        if let Some(caps) = self.devnull_filename.captures(line) {
            return Some(if &caps[1] == "---" {
                FileNameLine::Old(FileName::DevNull)
            } else {
                FileNameLine::New(FileName::DevNull)
            });
        }
        let caps = self.filename.captures(line)?;
        // git appends a tab to names containing spaces
        let path = |m: regex::Match<'_>| FileName::Path(m.as_str().trim_end_matches('\t').to_string());
        if let Some(old) = caps.get(1).or_else(|| caps.get(2)) {
            return Some(FileNameLine::Old(path(old)));
        }
        caps.get(3)
            .or_else(|| caps.get(4))
            .map(|new| FileNameLine::New(path(new)))
    }

    fn match_hunk_header(&self, line: &str) -> Option<HunkHeader> {
        let caps = self.hunk_header.captures(line)?;
        let number = |i: usize, default: Option<u32>| match caps.get(i) {
            Some(m) => m.as_str().parse::<u32>().ok(),
            None => default,
        };
        let trailing = caps.get(5).map(|m| m.as_str().trim()).unwrap_or("");
        let function = (!trailing.is_empty() && self.context_name.is_match(trailing))
            .then(|| trailing.to_string());

        Some(HunkHeader {
            old_start: number(1, None)?,
            old_len: number(2, Some(1))?,
            new_start: number(3, None)?,
            new_len: number(4, Some(1))?,
            function,
        })
    }

    fn is_raw_diff_line(&self, line: &str) -> bool {
        self.raw_diff_line.is_match(line)
    }
}
