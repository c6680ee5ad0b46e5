use crate::profile::PatternProfile;

use super::types::{CommitHeader, LineCount, Signature, Statistic};

/// Why a line could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// The bytes were not valid UTF-8
    Decode,
    /// A numstat line with unparsable counts
    StatParse,
}

/// A line that is reported instead of being classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    pub kind: MalformedKind,
    /// The line text, lossily decoded when it was not valid UTF-8
    pub text: String,
}

/// The tag assigned to one raw line of the log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedLine {
    Commit(CommitHeader),
    /// A numstat line, with the text it was parsed from
    Stat { stat: Statistic, raw: String },
    Diff(String),
    Blank,
    Malformed(Malformed),
}

/// Classify one raw line. Precedence is commit header, then numstat, then diff.
pub fn classify(profile: &dyn PatternProfile, raw: &[u8]) -> ClassifiedLine {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(_) => {
            return ClassifiedLine::Malformed(Malformed {
                kind: MalformedKind::Decode,
                text: String::from_utf8_lossy(raw).into_owned(),
            })
        }
    };

    if line.trim().is_empty() {
        return ClassifiedLine::Blank;
    }

    if profile.is_commit(line) {
        return ClassifiedLine::Commit(parse_header(line, profile.delimiter()));
    }

    if let Some(fields) = profile.match_stat(line) {
        return match (parse_count(fields.added), parse_count(fields.removed)) {
            (Some(added), Some(removed)) => ClassifiedLine::Stat {
                stat: Statistic {
                    added,
                    removed,
                    path: fields.path.to_string(),
                },
                raw: line.to_string(),
            },
            _ => ClassifiedLine::Malformed(Malformed {
                kind: MalformedKind::StatParse,
                text: line.to_string(),
            }),
        };
    }

    ClassifiedLine::Diff(line.to_string())
}

fn parse_count(field: &str) -> Option<LineCount> {
    if field == "-" {
        return Some(LineCount::Binary);
    }
    field.parse::<u32>().ok().map(LineCount::Lines)
}

/// Number of delimited fields in a header line; the subject comes last.
const HEADER_FIELDS: usize = 12;

/// Split a commit header line into its fields.
///
/// Missing trailing fields are left empty. The subject may contain the
/// delimiter itself.
pub fn parse_header(line: &str, delimiter: &str) -> CommitHeader {
    let mut fields = line.splitn(HEADER_FIELDS, delimiter);
    let mut next = || fields.next().unwrap_or("").to_string();

    let sha1 = next();
    let abbrev = next();
    let tree = next();
    let parents = as_list(next().split_whitespace());
    let refs = parse_refs(&next());
    let author = Signature {
        name: next(),
        email: next(),
        date: next(),
    };
    let committer = Signature {
        name: next(),
        email: next(),
        date: next(),
    };
    let subject = next();

    CommitHeader {
        sha1,
        abbrev,
        tree,
        parents,
        refs,
        author,
        committer,
        subject,
        raw: line.to_string(),
    }
}

fn as_list<'a>(items: impl Iterator<Item = &'a str>) -> Option<Vec<String>> {
    let items: Vec<String> = items
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// `%d` prints ` (HEAD -> master, tag: v1.0)`, or nothing.
fn parse_refs(field: &str) -> Option<Vec<String>> {
    let trimmed = field.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    as_list(inner.split(", ").map(str::trim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileRegistry;
    use std::sync::Arc;

    fn geth() -> Arc<dyn PatternProfile> {
        ProfileRegistry::with_builtins().unwrap().get("go-ethereum").unwrap()
    }

    const HEADER: &str = "a625406f6977d45c1391b078f4d3656e0b75bfcb----a625406f6----4358694eeb098c6708ae914a10562ce722bbbc34----6b1f53303a732ccc8c6aae6640399827c15250e3 2f22765d04931a078909145ca628d2264c852d7d---- (HEAD -> master, tag: v1.1.0)----Carol Jones----carol@example.com----2018-02-11T09:30:00+00:00----Dan Committer----dan@example.com----2018-02-12T10:00:00+00:00----p2p: drop legacy ---- cleanup";

    #[test]
    fn test_classify_commit_header() {
        let profile = geth();
        let ClassifiedLine::Commit(header) = classify(profile.as_ref(), HEADER.as_bytes()) else {
            panic!("expected commit header");
        };
        assert_eq!(header.sha1, "a625406f6977d45c1391b078f4d3656e0b75bfcb");
        assert_eq!(header.abbrev, "a625406f6");
        assert_eq!(header.parents.as_ref().map(Vec::len), Some(2));
        assert_eq!(
            header.refs,
            Some(vec!["HEAD -> master".to_string(), "tag: v1.1.0".to_string()])
        );
        assert_eq!(header.author.name, "Carol Jones");
        assert_eq!(header.committer.email, "dan@example.com");
        assert_eq!(header.subject, "p2p: drop legacy ---- cleanup");
        assert_eq!(header.raw, HEADER);
    }

    #[test]
    fn test_root_commit_has_no_parents() {
        let header = parse_header("abc----ab----def------------A----a@x----d----C----c@x----d----init", "----");
        assert!(header.parents.is_none());
        assert!(header.refs.is_none());
        assert_eq!(header.subject, "init");
    }

    #[test]
    fn test_short_header_fills_empty_fields() {
        let header = parse_header("abc----ab----def", "----");
        assert_eq!(header.tree, "def");
        assert!(header.parents.is_none());
        assert_eq!(header.subject, "");
    }

    #[test]
    fn test_classify_stat_lines() {
        let profile = geth();
        assert_eq!(
            classify(profile.as_ref(), b"3\t1\tREADME.md"),
            ClassifiedLine::Stat {
                stat: Statistic {
                    added: LineCount::Lines(3),
                    removed: LineCount::Lines(1),
                    path: "README.md".to_string(),
                },
                raw: "3\t1\tREADME.md".to_string(),
            }
        );
        let ClassifiedLine::Stat { stat: binary, .. } = classify(profile.as_ref(), b"-\t-\tlogo.png") else {
            panic!("expected statistic");
        };
        assert_eq!(binary.added, LineCount::Binary);
        assert_eq!(binary.removed, LineCount::Binary);
    }

    #[test]
    fn test_stat_keeps_leading_zeros_in_raw_text() {
        let profile = geth();
        let ClassifiedLine::Stat { stat, raw } = classify(profile.as_ref(), b"007\t1\tx.go") else {
            panic!("expected statistic");
        };
        assert_eq!(stat.added, LineCount::Lines(7));
        assert_eq!(raw, "007\t1\tx.go");
    }

    #[test]
    fn test_overflowing_count_is_parse_failure() {
        let profile = geth();
        let line = "9999999999\t1\tmain.go";
        assert_eq!(
            classify(profile.as_ref(), line.as_bytes()),
            ClassifiedLine::Malformed(Malformed {
                kind: MalformedKind::StatParse,
                text: line.to_string(),
            })
        );
    }

    #[test]
    fn test_blank_and_whitespace_lines() {
        let profile = geth();
        assert_eq!(classify(profile.as_ref(), b""), ClassifiedLine::Blank);
        assert_eq!(classify(profile.as_ref(), b"  \t "), ClassifiedLine::Blank);
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let profile = geth();
        let ClassifiedLine::Malformed(malformed) = classify(profile.as_ref(), b"+caf\xe9") else {
            panic!("expected malformed line");
        };
        assert_eq!(malformed.kind, MalformedKind::Decode);
        assert!(malformed.text.starts_with("+caf"));
    }

    #[test]
    fn test_everything_else_is_diff() {
        let profile = geth();
        for line in ["diff --git a/x.go b/x.go", "+\treturn nil", "@@ -1 +1 @@", "similarity index 90%"] {
            assert_eq!(
                classify(profile.as_ref(), line.as_bytes()),
                ClassifiedLine::Diff(line.to_string())
            );
        }
    }
}
