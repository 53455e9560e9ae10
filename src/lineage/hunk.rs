//! Unified-diff hunk parsing
//!
//! Turns the raw hunk text of one file's diff into inserted, deleted and
//! modified line-number sets. A `-` run immediately followed by a `+` run is a
//! replace block: its first `min(deleted, inserted)` pairs are reclassified as
//! modified lines (recorded by their new-side number), the rest stay pure
//! insertions or deletions. Every raw `+`/`-` line ends up counted exactly once.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Parsed `@@ -a,b +c,d @@` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
}

/// Line-number sets of one (parent, child) file pair.
///
/// This is also the record shape of the persisted moving-lines artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub child_path: String,
    pub parent_path: String,
    /// New-side numbers of pure insertions
    #[serde(default)]
    pub inserted_lines: Vec<u32>,
    /// Old-side numbers of pure deletions
    #[serde(default)]
    pub deleted_lines: Vec<u32>,
    /// New-side numbers of lines replaced in place
    #[serde(default)]
    pub modified_lines: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_line_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_line_count: Option<u32>,
}

impl DiffHunk {
    /// An unchanged same-path file.
    pub fn unchanged(path: impl Into<String>, line_count: Option<u32>) -> Self {
        let path = path.into();
        Self {
            child_path: path.clone(),
            parent_path: path,
            parent_line_count: line_count,
            child_line_count: line_count,
            ..Default::default()
        }
    }

    /// Build the record for one file from its full patch text.
    ///
    /// Returns the record and the number of hunks that had to be skipped.
    pub fn from_patch(
        child_path: impl Into<String>,
        parent_path: impl Into<String>,
        patch: &str,
    ) -> (Self, usize) {
        let (lines, skipped) = parse_patch(patch);
        let hunk = Self {
            child_path: child_path.into(),
            parent_path: parent_path.into(),
            inserted_lines: lines.inserted,
            deleted_lines: lines.deleted,
            modified_lines: lines.modified,
            parent_line_count: None,
            child_line_count: None,
        };
        (hunk, skipped)
    }

    pub fn with_line_counts(mut self, parent: Option<u32>, child: Option<u32>) -> Self {
        self.parent_line_count = parent;
        self.child_line_count = child;
        self
    }

    pub fn is_same_path(&self) -> bool {
        self.child_path == self.parent_path
    }

    pub fn is_unchanged(&self) -> bool {
        self.inserted_lines.is_empty()
            && self.deleted_lines.is_empty()
            && self.modified_lines.is_empty()
    }

    /// Fold another record for the same file into this one.
    pub fn merge(&mut self, other: &DiffHunk) {
        self.inserted_lines.extend_from_slice(&other.inserted_lines);
        self.deleted_lines.extend_from_slice(&other.deleted_lines);
        self.modified_lines.extend_from_slice(&other.modified_lines);
        for list in [
            &mut self.inserted_lines,
            &mut self.deleted_lines,
            &mut self.modified_lines,
        ] {
            list.sort_unstable();
            list.dedup();
        }
        self.parent_line_count = self.parent_line_count.or(other.parent_line_count);
        self.child_line_count = self.child_line_count.or(other.child_line_count);
    }
}

/// Classified line numbers of one or more hunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HunkLines {
    pub inserted: Vec<u32>,
    pub deleted: Vec<u32>,
    pub modified: Vec<u32>,
}

impl HunkLines {
    fn extend(&mut self, other: HunkLines) {
        self.inserted.extend(other.inserted);
        self.deleted.extend(other.deleted);
        self.modified.extend(other.modified);
    }

    fn sort(&mut self) {
        self.inserted.sort_unstable();
        self.deleted.sort_unstable();
        self.modified.sort_unstable();
    }
}

/// Parse a hunk header line.
///
/// Returns `None` when the line has fewer than three `@@`-delimited segments
/// or when a range is missing or non-numeric.
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let segments: Vec<&str> = line.split("@@").collect();
    if segments.len() < 3 || !segments[0].trim().is_empty() {
        return None;
    }

    let mut old = None;
    let mut new = None;
    for token in segments[1].split_whitespace() {
        if let Some(range) = token.strip_prefix('-') {
            old = Some(parse_range(range)?);
        } else if let Some(range) = token.strip_prefix('+') {
            new = Some(parse_range(range)?);
        } else {
            return None;
        }
    }

    let (old_start, old_count) = old?;
    let (new_start, new_count) = new?;
    Some(HunkHeader {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

/// `"12,3"` -> `(12, 3)`, `"12"` -> `(12, 1)`
fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// One `-`* `+`* run between context lines.
#[derive(Default)]
struct ChangeBlock {
    deleted: Vec<u32>,
    inserted: Vec<u32>,
}

impl ChangeBlock {
    fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.inserted.is_empty()
    }

    fn flush_into(&mut self, out: &mut HunkLines) {
        let pairs = self.deleted.len().min(self.inserted.len());
        out.modified.extend_from_slice(&self.inserted[..pairs]);
        out.inserted.extend_from_slice(&self.inserted[pairs..]);
        out.deleted.extend_from_slice(&self.deleted[pairs..]);
        self.deleted.clear();
        self.inserted.clear();
    }
}

/// Parse a single hunk: its header line followed by body lines.
///
/// Returns `None` when the header is unparsable. Body scanning stops once
/// both sides' line counts from the header are used up, so trailing text
/// after the hunk is ignored.
pub fn parse_hunk(text: &str) -> Option<HunkLines> {
    let mut lines = text.lines();
    let header = parse_hunk_header(lines.next()?)?;
    Some(scan_body(header, lines))
}

fn scan_body<'a>(header: HunkHeader, body: impl Iterator<Item = &'a str>) -> HunkLines {
    let mut out = HunkLines::default();
    let mut block = ChangeBlock::default();
    let mut old_cursor = header.old_start;
    let mut new_cursor = header.new_start;
    let mut old_left = header.old_count;
    let mut new_left = header.new_count;

    for line in body {
        if old_left == 0 && new_left == 0 {
            break;
        }
        match line.as_bytes().first() {
            Some(b'+') => {
                block.inserted.push(new_cursor);
                new_cursor += 1;
                new_left = new_left.saturating_sub(1);
            }
            Some(b'-') => {
                // A deletion after insertions starts a new replace block
                if !block.inserted.is_empty() {
                    block.flush_into(&mut out);
                }
                block.deleted.push(old_cursor);
                old_cursor += 1;
                old_left = old_left.saturating_sub(1);
            }
            // "\ No newline at end of file"
            Some(b'\\') => continue,
            _ => {
                if !block.is_empty() {
                    block.flush_into(&mut out);
                }
                old_cursor += 1;
                new_cursor += 1;
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
            }
        }
    }
    block.flush_into(&mut out);
    out
}

type PendingHunk<'a> = (Option<HunkHeader>, Vec<&'a str>);

fn finish_hunk(hunk: Option<PendingHunk<'_>>, out: &mut HunkLines, skipped: &mut usize) {
    if let Some((header, body)) = hunk {
        match header {
            Some(header) => out.extend(scan_body(header, body.into_iter())),
            None => *skipped += 1,
        }
    }
}

/// Parse every hunk in one file's patch text.
///
/// Anything before the first `@@` line (`diff --git`, `index`, `---`, `+++`)
/// is ignored. A hunk with an unparsable header is skipped together with its
/// body; the remaining hunks are still parsed. Returns the accumulated lines in
/// ascending order and the number of skipped hunks.
pub fn parse_patch(patch: &str) -> (HunkLines, usize) {
    let mut out = HunkLines::default();
    let mut skipped = 0;
    let mut current: Option<PendingHunk<'_>> = None;

    for line in patch.lines() {
        if line.starts_with("@@") {
            finish_hunk(current.take(), &mut out, &mut skipped);
            let header = parse_hunk_header(line);
            if header.is_none() {
                warn!("Skipping unparsable hunk header: {}", line);
            }
            current = Some((header, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    finish_hunk(current.take(), &mut out, &mut skipped);

    out.sort();
    if skipped > 0 {
        debug!("Skipped {} unparsable hunk(s)", skipped);
    }
    (out, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_with_counts() {
        let header = parse_hunk_header("@@ -12,3 +14,5 @@ fn main() {").expect("header");
        assert_eq!(
            header,
            HunkHeader {
                old_start: 12,
                old_count: 3,
                new_start: 14,
                new_count: 5
            }
        );
    }

    #[test]
    fn test_parse_header_without_counts() {
        let header = parse_hunk_header("@@ -3 +3 @@").expect("header");
        assert_eq!(header.old_count, 1);
        assert_eq!(header.new_count, 1);
    }

    #[test]
    fn test_parse_header_rejects_garbage() {
        assert!(parse_hunk_header("@@ -a,b +c,d @@").is_none());
        assert!(parse_hunk_header("@@ -1,2 +1,2").is_none());
        assert!(parse_hunk_header("Binary files a/x and b/x differ").is_none());
        assert!(parse_hunk_header("@@ -1,2 @@").is_none());
    }

    #[test]
    fn test_single_insertion() {
        let hunk = "@@ -1,5 +1,6 @@\n a\n b\n+x\n c\n d\n e\n";
        let lines = parse_hunk(hunk).expect("parse");
        assert_eq!(lines.inserted, vec![3]);
        assert!(lines.deleted.is_empty());
        assert!(lines.modified.is_empty());
    }

    #[test]
    fn test_single_deletion() {
        let hunk = "@@ -4,3 +4,2 @@\n a\n-b\n c\n";
        let lines = parse_hunk(hunk).expect("parse");
        assert_eq!(lines.deleted, vec![5]);
        assert!(lines.inserted.is_empty());
    }

    #[test]
    fn test_same_size_replace_is_modified() {
        let hunk = "@@ -10,4 +10,4 @@\n a\n-b\n-c\n+B\n+C\n d\n";
        let lines = parse_hunk(hunk).expect("parse");
        assert_eq!(lines.modified, vec![11, 12]);
        assert!(lines.inserted.is_empty());
        assert!(lines.deleted.is_empty());
    }

    #[test]
    fn test_uneven_replace_splits_remainder() {
        // 1 deletion vs 3 insertions: one modified, two pure insertions
        let hunk = "@@ -1,3 +1,5 @@\n a\n-b\n+x\n+y\n+z\n c\n";
        let lines = parse_hunk(hunk).expect("parse");
        assert_eq!(lines.modified, vec![2]);
        assert_eq!(lines.inserted, vec![3, 4]);
        assert!(lines.deleted.is_empty());

        // 3 deletions vs 1 insertion: one modified, two pure deletions
        let hunk = "@@ -1,5 +1,3 @@\n a\n-b\n-c\n-d\n+x\n e\n";
        let lines = parse_hunk(hunk).expect("parse");
        assert_eq!(lines.modified, vec![2]);
        assert_eq!(lines.deleted, vec![3, 4]);
        assert!(lines.inserted.is_empty());
    }

    #[test]
    fn test_each_raw_line_counted_once() {
        let hunk = "@@ -1,7 +1,7 @@\n a\n-b\n+B\n+B2\n c\n-d\n-e\n+E\n f\n g\n";
        let raw_plus = hunk.lines().filter(|l| l.starts_with('+')).count();
        let raw_minus = hunk.lines().filter(|l| l.starts_with('-')).count();
        let lines = parse_hunk(hunk).expect("parse");
        assert_eq!(
            lines.inserted.len() + lines.deleted.len() + lines.modified.len() * 2,
            raw_plus + raw_minus
        );
    }

    #[test]
    fn test_pure_context_has_no_changes() {
        let hunk = "@@ -1,3 +1,3 @@\n a\n b\n c\n";
        let lines = parse_hunk(hunk).expect("parse");
        assert_eq!(lines, HunkLines::default());
    }

    #[test]
    fn test_no_newline_marker_ignored() {
        let hunk = "@@ -1,2 +1,2 @@\n a\n-b\n\\ No newline at end of file\n+c\n\\ No newline at end of file\n";
        let lines = parse_hunk(hunk).expect("parse");
        assert_eq!(lines.modified, vec![2]);
    }

    #[test]
    fn test_patch_with_multiple_hunks_and_preamble() {
        let patch = "diff --git a/f.py b/f.py\n\
                     index 111..222 100644\n\
                     --- a/f.py\n\
                     +++ b/f.py\n\
                     @@ -1,3 +1,4 @@\n a\n+x\n b\n c\n\
                     @@ -20,3 +21,2 @@\n t\n-u\n v\n";
        let (lines, skipped) = parse_patch(patch);
        assert_eq!(skipped, 0);
        assert_eq!(lines.inserted, vec![2]);
        assert_eq!(lines.deleted, vec![21]);
    }

    #[test]
    fn test_patch_skips_broken_hunk_only() {
        let patch = "@@ -x +y @@\n+junk\n@@ -5,2 +5,3 @@\n a\n+b\n c\n";
        let (lines, skipped) = parse_patch(patch);
        assert_eq!(skipped, 1);
        assert_eq!(lines.inserted, vec![6]);
    }

    #[test]
    fn test_binary_patch_produces_nothing() {
        let (lines, skipped) = parse_patch("Binary files a/logo.png and b/logo.png differ\n");
        assert_eq!(skipped, 0);
        assert_eq!(lines, HunkLines::default());
    }

    #[test]
    fn test_merge_records() {
        let mut a = DiffHunk {
            child_path: "f".into(),
            parent_path: "f".into(),
            inserted_lines: vec![10],
            ..Default::default()
        };
        let b = DiffHunk {
            child_path: "f".into(),
            parent_path: "f".into(),
            inserted_lines: vec![3, 10],
            deleted_lines: vec![40],
            child_line_count: Some(50),
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.inserted_lines, vec![3, 10]);
        assert_eq!(a.deleted_lines, vec![40]);
        assert_eq!(a.child_line_count, Some(50));
    }

    #[test]
    fn test_artifact_record_shape() {
        let hunk = DiffHunk {
            child_path: "svc/a.py".into(),
            parent_path: "svc/a.py".into(),
            inserted_lines: vec![3],
            ..Default::default()
        };
        let json = serde_json::to_value(&hunk).expect("serialize");
        assert_eq!(json["inserted_lines"][0], 3);
        assert!(json.get("child_line_count").is_none());

        let parsed: DiffHunk = serde_json::from_str(
            r#"{"child_path":"a","parent_path":"a","inserted_lines":[],"deleted_lines":[2],"modified_lines":[]}"#,
        )
        .expect("parse");
        assert_eq!(parsed.deleted_lines, vec![2]);
        assert_eq!(parsed.parent_line_count, None);
    }
}
