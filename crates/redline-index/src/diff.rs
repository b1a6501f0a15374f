//! Unified diff analysis: structural parsing and search-query generation.
//!
//! Parsing is total: any input text, including garbage, yields a
//! well-formed [`DiffAnalysis`]. Malformed pieces degrade to defaults
//! instead of failing the parse.

use std::sync::LazyLock;

use regex::Regex;

use crate::languages::{Lang, detect_language};

/// Hard cap on generated queries per diff.
pub const MAX_QUERIES: usize = 10;
const MAX_SNIPPET_QUERIES: usize = 5;
const MAX_SNIPPETS_PER_HUNK: usize = 3;
const MIN_SNIPPET_LEN: usize = 20;
const MIN_HEADER_LEN: usize = 5;

static GIT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^diff --git a/(.+?) b/(.+)$").expect("valid regex"));
static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@+\s+-(\d+)(?:,(\d+))?\s+\+(\d+)(?:,(\d+))?\s+@@\s?(.*)$").expect("valid regex")
});

/// How a file changed in the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
}

/// One contiguous changed region with its `@@` header data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// Text the diff tool placed after the closing `@@`, typically the
    /// enclosing function signature.
    pub context_header: String,
    /// Body lines with their leading `+`/`-`/` ` marker retained.
    pub lines: Vec<String>,
}

impl Default for Hunk {
    fn default() -> Self {
        Self {
            old_start: 1,
            old_count: 1,
            new_start: 1,
            new_count: 1,
            context_header: String::new(),
            lines: Vec::new(),
        }
    }
}

/// One file's change record.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub path: Option<String>,
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub language: Option<Lang>,
    pub hunks: Vec<Hunk>,
}

/// Structural decomposition of one diff submission.
#[derive(Debug, Clone, Default)]
pub struct DiffAnalysis {
    pub files: Vec<ChangedFile>,
    pub added_lines: usize,
    pub removed_lines: usize,
    /// Deduplicated (file, context header) pairs in first-seen order.
    pub modified_symbols: Vec<(String, String)>,
}

/// Parse unified diff text. Total: never fails, never panics.
#[must_use]
pub fn parse(diff_text: &str) -> DiffAnalysis {
    let mut analysis = DiffAnalysis::default();

    for block in split_file_blocks(diff_text) {
        if let Some(file) = parse_file_block(&block) {
            analysis.files.push(file);
        }
    }

    for file in &analysis.files {
        for hunk in &file.hunks {
            for line in &hunk.lines {
                if line.starts_with('+') {
                    analysis.added_lines += 1;
                } else if line.starts_with('-') {
                    analysis.removed_lines += 1;
                }
            }
            if let Some(path) = &file.path
                && !hunk.context_header.is_empty()
            {
                let pair = (path.clone(), hunk.context_header.clone());
                if !analysis.modified_symbols.contains(&pair) {
                    analysis.modified_symbols.push(pair);
                }
            }
        }
    }

    analysis
}

fn split_file_blocks(diff_text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in diff_text.lines() {
        if line.starts_with("diff --git") && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn parse_file_block(lines: &[&str]) -> Option<ChangedFile> {
    let header_paths = lines
        .first()
        .and_then(|first| GIT_HEADER_RE.captures(first))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()));

    let old_absent = lines.iter().any(|l| *l == "--- /dev/null");
    let new_absent = lines.iter().any(|l| *l == "+++ /dev/null");

    let (old_path, path) = match header_paths {
        Some((old, new)) => (
            (!old_absent).then_some(old),
            (!new_absent).then_some(new),
        ),
        None => (None, None),
    };

    let hunks = parse_hunks(lines);

    // A block without the a/b marker still contributes its hunks, but a
    // block with neither paths nor hunks carries no signal at all.
    if path.is_none() && old_path.is_none() && hunks.is_empty() {
        return None;
    }

    let status = match (&old_path, &path) {
        (None, _) => FileStatus::Added,
        (_, None) => FileStatus::Deleted,
        (Some(old), Some(new)) if old == new => FileStatus::Modified,
        _ => FileStatus::Renamed,
    };

    let language = path
        .as_deref()
        .or(old_path.as_deref())
        .and_then(|p| detect_language(std::path::Path::new(p)));

    Some(ChangedFile {
        path,
        old_path,
        status,
        language,
        hunks,
    })
}

fn parse_hunks(lines: &[&str]) -> Vec<Hunk> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for line in lines {
        if line.starts_with("@@") {
            hunks.push(parse_hunk_header(line));
        } else if let Some(hunk) = hunks.last_mut()
            && (line.starts_with('+')
                || line.starts_with('-')
                || line.starts_with(' ')
                || line.starts_with('\\')
                || line.is_empty())
        {
            hunk.lines.push((*line).to_string());
        }
    }

    hunks
}

/// Parse one `@@ -a,b +c,d @@ context` header. Missing counts default to
/// 1; an entirely unparsable header yields the all-ones default.
#[must_use]
pub fn parse_hunk_header(line: &str) -> Hunk {
    let Some(caps) = HUNK_HEADER_RE.captures(line) else {
        return Hunk::default();
    };

    let num = |idx: usize| {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(1)
    };

    Hunk {
        old_start: num(1),
        old_count: num(2),
        new_start: num(3),
        new_count: num(4),
        context_header: caps
            .get(5)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        lines: Vec::new(),
    }
}

/// Derive search queries from a diff analysis.
///
/// Capped at [`MAX_QUERIES`], order-preserving deduplicated, in priority
/// order: file paths, modified symbols, added-line snippets, context
/// headers. File- and symbol-level queries come first because they
/// anchor retrieval to the right region even when added lines are short
/// or boilerplate.
#[must_use]
pub fn generate_queries(analysis: &DiffAnalysis) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();

    for file in &analysis.files {
        if let Some(path) = &file.path {
            push_query(&mut queries, format!("File: {path}"));
        }
    }

    for (file, symbol) in &analysis.modified_symbols {
        push_query(&mut queries, format!("Function: {symbol} in {file}"));
    }

    let mut snippets = 0usize;
    'files: for file in &analysis.files {
        for hunk in &file.hunks {
            let mut from_hunk = 0usize;
            for line in &hunk.lines {
                if snippets >= MAX_SNIPPET_QUERIES {
                    break 'files;
                }
                if from_hunk >= MAX_SNIPPETS_PER_HUNK {
                    break;
                }
                let Some(added) = line.strip_prefix('+') else {
                    continue;
                };
                let content = added.trim();
                if content.chars().count() > MIN_SNIPPET_LEN
                    && push_query(&mut queries, content.to_string())
                {
                    snippets += 1;
                    from_hunk += 1;
                }
            }
        }
    }

    for file in &analysis.files {
        for hunk in &file.hunks {
            if hunk.context_header.chars().count() > MIN_HEADER_LEN {
                push_query(&mut queries, hunk.context_header.clone());
            }
        }
    }

    queries
}

fn push_query(queries: &mut Vec<String>, query: String) -> bool {
    if queries.len() >= MAX_QUERIES || queries.contains(&query) {
        return false;
    }
    queries.push(query);
    true
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const SAMPLE_DIFF: &str = "\
diff --git a/lib/parser.ex b/lib/parser.ex
index 83db48f..bf2a9c1 100644
--- a/lib/parser.ex
+++ b/lib/parser.ex
@@ -10,5 +12,7 @@ def handler
   def parse(input) do
-    legacy_tokenize(input)
+    tokenize_with_recovery(input, max_depth: 32)
+    |> collapse_whitespace_runs()
   end
diff --git a/src/util.rs b/src/util.rs
--- a/src/util.rs
+++ b/src/util.rs
@@ -1,3 +1,4 @@
 fn main() {
+    init_tracing();
 }
";

    #[test]
    fn scenario_b_hunk_header() {
        let hunk = parse_hunk_header("@@ -10,5 +12,7 @@ def handler");
        assert_eq!(hunk.old_start, 10);
        assert_eq!(hunk.old_count, 5);
        assert_eq!(hunk.new_start, 12);
        assert_eq!(hunk.new_count, 7);
        assert_eq!(hunk.context_header, "def handler");
    }

    #[test]
    fn hunk_header_missing_counts_default_to_one() {
        let hunk = parse_hunk_header("@@ -10 +12 @@");
        assert_eq!(hunk.old_start, 10);
        assert_eq!(hunk.old_count, 1);
        assert_eq!(hunk.new_start, 12);
        assert_eq!(hunk.new_count, 1);
        assert_eq!(hunk.context_header, "");
    }

    #[test]
    fn unparsable_hunk_header_defaults_to_all_ones() {
        let hunk = parse_hunk_header("@@ garbage @@");
        assert_eq!(hunk, Hunk::default());
    }

    #[test]
    fn parse_sample_diff_structure() {
        let analysis = parse(SAMPLE_DIFF);
        assert_eq!(analysis.files.len(), 2);

        let first = &analysis.files[0];
        assert_eq!(first.path.as_deref(), Some("lib/parser.ex"));
        assert_eq!(first.status, FileStatus::Modified);
        assert_eq!(first.language, Some(Lang::Elixir));
        assert_eq!(first.hunks.len(), 1);

        let second = &analysis.files[1];
        assert_eq!(second.path.as_deref(), Some("src/util.rs"));
        assert_eq!(second.language, Some(Lang::Rust));
    }

    #[test]
    fn parse_counts_added_and_removed() {
        let analysis = parse(SAMPLE_DIFF);
        assert_eq!(analysis.added_lines, 3);
        assert_eq!(analysis.removed_lines, 1);
    }

    #[test]
    fn hunk_lines_retain_markers() {
        let analysis = parse(SAMPLE_DIFF);
        let lines = &analysis.files[0].hunks[0].lines;
        assert!(lines.iter().any(|l| l.starts_with("+    tokenize")));
        assert!(lines.iter().any(|l| l.starts_with("-    legacy")));
        assert!(lines.iter().any(|l| l.starts_with("   def parse")));
    }

    #[test]
    fn modified_symbols_deduplicated() {
        let diff = "\
diff --git a/lib/a.ex b/lib/a.ex
--- a/lib/a.ex
+++ b/lib/a.ex
@@ -1,2 +1,2 @@ def run
+x
@@ -9,2 +9,2 @@ def run
+y
";
        let analysis = parse(diff);
        assert_eq!(
            analysis.modified_symbols,
            vec![("lib/a.ex".to_string(), "def run".to_string())]
        );
    }

    #[test]
    fn added_file_classified() {
        let diff = "\
diff --git a/lib/new.ex b/lib/new.ex
new file mode 100644
--- /dev/null
+++ b/lib/new.ex
@@ -0,0 +1,2 @@
+defmodule New do
+end
";
        let analysis = parse(diff);
        assert_eq!(analysis.files[0].status, FileStatus::Added);
        assert!(analysis.files[0].old_path.is_none());
        assert_eq!(analysis.files[0].path.as_deref(), Some("lib/new.ex"));
    }

    #[test]
    fn deleted_file_classified() {
        let diff = "\
diff --git a/lib/old.ex b/lib/old.ex
deleted file mode 100644
--- a/lib/old.ex
+++ /dev/null
@@ -1,2 +0,0 @@
-defmodule Old do
-end
";
        let analysis = parse(diff);
        assert_eq!(analysis.files[0].status, FileStatus::Deleted);
        assert!(analysis.files[0].path.is_none());
    }

    #[test]
    fn renamed_file_classified() {
        let diff = "\
diff --git a/lib/before.ex b/lib/after.ex
--- a/lib/before.ex
+++ b/lib/after.ex
@@ -1 +1 @@
-a
+b
";
        let analysis = parse(diff);
        assert_eq!(analysis.files[0].status, FileStatus::Renamed);
        assert_eq!(analysis.files[0].old_path.as_deref(), Some("lib/before.ex"));
        assert_eq!(analysis.files[0].path.as_deref(), Some("lib/after.ex"));
    }

    #[test]
    fn block_without_marker_keeps_hunks_but_no_path() {
        let diff = "\
@@ -1,2 +1,3 @@ def orphan
 context
+added line here
";
        let analysis = parse(diff);
        assert_eq!(analysis.files.len(), 1);
        assert!(analysis.files[0].path.is_none());
        assert_eq!(analysis.files[0].hunks.len(), 1);
        assert_eq!(analysis.added_lines, 1);
        // Pathless files contribute no modified symbols.
        assert!(analysis.modified_symbols.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_analysis() {
        let analysis = parse("");
        assert!(analysis.files.is_empty());
        assert_eq!(analysis.added_lines, 0);
        assert_eq!(analysis.removed_lines, 0);
    }

    #[test]
    fn garbage_input_never_fails() {
        let analysis = parse("this is not\na diff at all\n%%%");
        assert!(analysis.files.is_empty());
    }

    #[test]
    fn truncated_hunk_header_never_fails() {
        let diff = "diff --git a/x.rs b/x.rs\n@@ -3,\n+still counted\n";
        let analysis = parse(diff);
        assert_eq!(
            analysis.files[0].hunks[0],
            Hunk {
                lines: vec!["+still counted".to_string()],
                ..Hunk::default()
            }
        );
        assert_eq!(analysis.added_lines, 1);
    }

    #[test]
    fn queries_prioritize_files_then_symbols() {
        let queries = generate_queries(&parse(SAMPLE_DIFF));
        assert_eq!(queries[0], "File: lib/parser.ex");
        assert_eq!(queries[1], "File: src/util.rs");
        assert_eq!(queries[2], "Function: def handler in lib/parser.ex");
        assert!(queries.iter().any(|q| q.contains("tokenize_with_recovery")));
    }

    #[test]
    fn queries_capped_and_unique() {
        let mut diff = String::new();
        for i in 0..20 {
            diff.push_str(&format!(
                "diff --git a/lib/file_{i}.ex b/lib/file_{i}.ex\n--- a/lib/file_{i}.ex\n+++ b/lib/file_{i}.ex\n@@ -1 +1 @@ def fun_{i}\n+line\n"
            ));
        }
        let queries = generate_queries(&parse(&diff));
        assert_eq!(queries.len(), MAX_QUERIES);
        let mut deduped = queries.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), queries.len());
    }

    #[test]
    fn short_added_lines_not_used_as_snippets() {
        let diff = "\
diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1 +1,2 @@
+short
";
        let queries = generate_queries(&parse(diff));
        assert!(!queries.contains(&"short".to_string()));
    }

    #[test]
    fn snippets_limited_per_hunk() {
        let mut diff = String::from(
            "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1 +1,9 @@\n",
        );
        for i in 0..8 {
            diff.push_str(&format!(
                "+let unique_binding_number_{i} = compute_{i}();\n"
            ));
        }
        let queries = generate_queries(&parse(&diff));
        let snippet_count = queries
            .iter()
            .filter(|q| q.starts_with("let unique_binding"))
            .count();
        assert_eq!(snippet_count, 3);
    }

    #[test]
    fn short_context_headers_not_queried() {
        let diff = "\
diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1 +1 @@ fn a
+x
";
        let queries = generate_queries(&parse(diff));
        assert!(!queries.contains(&"fn a".to_string()));
    }

    #[test]
    fn no_queries_from_empty_analysis() {
        assert!(generate_queries(&DiffAnalysis::default()).is_empty());
    }

    proptest! {
        #[test]
        fn parse_is_total_over_arbitrary_text(input in ".*") {
            let analysis = parse(&input);
            for file in &analysis.files {
                for hunk in &file.hunks {
                    prop_assert!(hunk.old_start >= 1);
                    prop_assert!(hunk.new_start >= 1);
                }
            }
        }

        #[test]
        fn generate_queries_bounded_and_unique(input in ".*") {
            let queries = generate_queries(&parse(&input));
            prop_assert!(queries.len() <= MAX_QUERIES);
            let unique: std::collections::HashSet<_> = queries.iter().collect();
            prop_assert_eq!(unique.len(), queries.len());
        }
    }
}
