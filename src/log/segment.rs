use tracing::debug;

use super::types::{FileChange, FileName, Hunk, SourceLine};
use crate::profile::{DiffPaths, FileNameLine, PatternProfile};
use crate::report::types::{Anomaly, AnomalyKind, StructuralKind};

/// File changes reconstructed from one commit's diff lines.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Segmented {
    pub files: Vec<FileChange>,
    pub anomalies: Vec<Anomaly>,
}

/// Rebuild the file changes and hunks of one commit.
///
/// `commit` is the hash used to tag anomalies. Lines are expected in the
/// order git printed them.
pub fn segment(profile: &dyn PatternProfile, commit: &str, lines: &[SourceLine]) -> Segmented {
    let mut segmenter = Segmenter {
        profile,
        commit,
        state: State::AwaitingFile,
        out: Segmented::default(),
    };
    for line in lines {
        segmenter.feed(line);
    }
    segmenter.finish()
}

enum State {
    /// Before the first `diff --git` line of the commit
    AwaitingFile,
    InFile(OpenFile),
}

struct OpenFile {
    change: FileChange,
    hunk: Option<Hunk>,
    /// Line number of the `diff --git` header
    header_line: usize,
    /// Paths named by the header, used for sides no later line names
    paths: DiffPaths,
}

impl OpenFile {
    fn new(header: &SourceLine, paths: DiffPaths) -> Self {
        Self {
            change: FileChange {
                raw_diff: vec![header.text.clone()],
                ..FileChange::default()
            },
            hunk: None,
            header_line: header.number,
            paths,
        }
    }

    fn close_hunk(&mut self) {
        if let Some(hunk) = self.hunk.take() {
            self.change.hunks.push(hunk);
        }
    }

    /// Finish the file, filling unnamed sides from the header paths.
    ///
    /// A created file gets `/dev/null` as its old name and a deleted one as
    /// its new name. Both sides still unnamed is an anomaly.
    fn close(mut self) -> (FileChange, Option<StructuralKind>) {
        self.close_hunk();
        let change = &mut self.change;
        // with conflicting flags neither side is known to be absent
        let created = change.is_new && !change.is_deletion;
        let deleted = change.is_deletion && !change.is_new;

        if change.old_filename.is_none() {
            change.old_filename = if created && !is_dev_null(&change.new_filename) {
                Some(FileName::DevNull)
            } else {
                self.paths.old.take().map(FileName::Path)
            };
        }
        if change.new_filename.is_none() {
            change.new_filename = if deleted && !is_dev_null(&change.old_filename) {
                Some(FileName::DevNull)
            } else {
                self.paths.new.take().map(FileName::Path)
            };
        }

        let unnamed = change.old_filename.is_none() && change.new_filename.is_none();
        (self.change, unnamed.then_some(StructuralKind::MissingFileNames))
    }
}

fn is_dev_null(name: &Option<FileName>) -> bool {
    name.as_ref().is_some_and(FileName::is_dev_null)
}

struct Segmenter<'a> {
    profile: &'a dyn PatternProfile,
    commit: &'a str,
    state: State,
    out: Segmented,
}

impl Segmenter<'_> {
    fn feed(&mut self, line: &SourceLine) {
        let text = line.text.as_str();
        if let Some(paths) = self.profile.match_diff_start(text) {
            self.close_file();
            self.state = State::InFile(OpenFile::new(line, paths));
            return;
        }

        let outcome = match &mut self.state {
            State::AwaitingFile => Err(StructuralKind::LineOutsideFile),
            State::InFile(file) => apply_line(self.profile, file, text),
        };
        if let Err(kind) = outcome {
            self.report(kind, line.number, text);
        }
    }

    fn report(&mut self, kind: StructuralKind, line_number: usize, text: &str) {
        debug!(commit = self.commit, line = line_number, ?kind, text, "diff anomaly");
        self.out.anomalies.push(
            Anomaly::new(AnomalyKind::Structural(kind), line_number, text)
                .in_commit(Some(self.commit)),
        );
    }

    fn close_file(&mut self) {
        if let State::InFile(file) = std::mem::replace(&mut self.state, State::AwaitingFile) {
            let header_line = file.header_line;
            let (change, missing) = file.close();
            if let Some(kind) = missing {
                let header = change.raw_diff.first().cloned().unwrap_or_default();
                self.report(kind, header_line, &header);
            }
            self.out.files.push(change);
        }
    }

    fn finish(mut self) -> Segmented {
        self.close_file();
        self.out
    }
}

/// Apply one line of a file's diff span to the open file.
///
/// The line is always kept in the file's raw text; an `Err` names the
/// anomaly to record for it.
fn apply_line(
    profile: &dyn PatternProfile,
    file: &mut OpenFile,
    text: &str,
) -> Result<(), StructuralKind> {
    file.change.raw_diff.push(text.to_string());
    let change = &mut file.change;

    if let Some(index) = profile.match_index(text) {
        // A mode-less index line follows mode lines; keep what they set.
        if index.mode.is_some() {
            change.file_type = index.mode;
        }
        return Ok(());
    }

    if let Some(rest) = rename_marker(text) {
        change.is_rename = true;
        match rest {
            RenameLine::From(path) => change.old_filename = Some(FileName::Path(path.to_string())),
            RenameLine::To(path) => change.new_filename = Some(FileName::Path(path.to_string())),
            RenameLine::Similarity => {}
        }
        return Ok(());
    }

    if let Some(mode) = text.strip_prefix("new file mode ") {
        change.is_new = true;
        change.file_type = Some(mode.trim().to_string());
        return check_flags(change);
    }

    if let Some(mode) = text.strip_prefix("deleted file mode ") {
        change.is_deletion = true;
        change.file_type = Some(mode.trim().to_string());
        return check_flags(change);
    }

    if let Some(mode) = text.strip_prefix("new mode ") {
        change.file_type = Some(mode.trim().to_string());
        return Ok(());
    }
    if text.starts_with("old mode ") {
        return Ok(());
    }

    // Past the first hunk header, `--- a/...` and `+++ b/...` can only be body lines.
    if change.change_count == 0 {
        if let Some(name) = profile.match_filename(text) {
            return set_filename(change, name);
        }
    }

    if let Some(header) = profile.match_hunk_header(text) {
        file.close_hunk();
        file.hunk = Some(Hunk {
            old_start: header.old_start,
            old_len: header.old_len,
            new_start: header.new_start,
            new_len: header.new_len,
            function: header.function,
            lines: Vec::new(),
        });
        file.change.change_count += 1;
        return Ok(());
    }

    if profile.is_raw_diff_line(text) {
        return match file.hunk.as_mut() {
            Some(hunk) => {
                hunk.lines.push(text.to_string());
                Ok(())
            }
            None => Err(StructuralKind::BodyLineOutsideHunk),
        };
    }

    Err(StructuralKind::UnrecognizedDiffLine)
}

enum RenameLine<'a> {
    From(&'a str),
    To(&'a str),
    Similarity,
}

fn rename_marker(text: &str) -> Option<RenameLine<'_>> {
    for prefix in ["rename from ", "copy from "] {
        if let Some(path) = text.strip_prefix(prefix) {
            return Some(RenameLine::From(path));
        }
    }
    for prefix in ["rename to ", "copy to "] {
        if let Some(path) = text.strip_prefix(prefix) {
            return Some(RenameLine::To(path));
        }
    }
    (text.starts_with("similarity index") || text.starts_with("dissimilarity index"))
        .then_some(RenameLine::Similarity)
}

fn check_flags(change: &FileChange) -> Result<(), StructuralKind> {
    if change.is_new && change.is_deletion {
        Err(StructuralKind::ConflictingFileFlags)
    } else {
        Ok(())
    }
}

fn set_filename(change: &mut FileChange, name: FileNameLine) -> Result<(), StructuralKind> {
    let (slot, other, name) = match name {
        FileNameLine::Old(name) => (&mut change.old_filename, &change.new_filename, name),
        FileNameLine::New(name) => (&mut change.new_filename, &change.old_filename, name),
    };
    if name.is_dev_null() && is_dev_null(other) {
        return Err(StructuralKind::BothSidesDevNull);
    }
    *slot = Some(name);
    Ok(())
}
