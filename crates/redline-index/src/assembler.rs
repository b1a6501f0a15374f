//! Context assembly: dedup, rank, budget-pack, and render retrieved chunks.
//!
//! Pure and synchronous. Ranking uses distance alone (smaller is more
//! relevant); packing is greedy prefix selection over the sorted list,
//! not best-fit.

use std::collections::HashSet;
use std::fmt::Write;

use crate::store::RetrievedResult;

/// Default character budget for assembled context.
pub const DEFAULT_MAX_CHARS: usize = 32_000;
/// Flat per-result estimate for header, fences, and separator.
const FORMAT_OVERHEAD: usize = 100;
/// Rendered when no result survives packing.
pub const NO_CONTEXT_PLACEHOLDER: &str = "No relevant context found in the indexed codebase.";

#[derive(Debug, Clone)]
pub struct AssembleConfig {
    pub max_chars: usize,
    /// When false, blocks render the code fence only, no header line.
    pub include_metadata: bool,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            include_metadata: true,
        }
    }
}

/// The assembled, prompt-ready context.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub chunks_used: Vec<RetrievedResult>,
    pub total_chars: usize,
    pub estimated_tokens: usize,
}

/// Assemble retrieved results into a bounded context string.
///
/// Steps: dedup by id keeping first occurrence, stable sort ascending by
/// distance, greedy budget packing, render.
#[must_use]
pub fn assemble(results: &[RetrievedResult], config: &AssembleConfig) -> AssembledContext {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unique: Vec<&RetrievedResult> = results
        .iter()
        .filter(|r| seen.insert(r.id.as_str()))
        .collect();

    // Stable sort: equal distances keep input order.
    unique.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut used: Vec<RetrievedResult> = Vec::new();
    let mut budget = 0usize;
    for result in unique {
        let cost = result.document.chars().count() + FORMAT_OVERHEAD;
        if budget + cost > config.max_chars {
            break;
        }
        budget += cost;
        used.push(result.clone());
    }

    let text = render(&used, config.include_metadata);
    let total_chars = text.chars().count();

    AssembledContext {
        estimated_tokens: total_chars / 4,
        total_chars,
        text,
        chunks_used: used,
    }
}

fn render(used: &[RetrievedResult], include_metadata: bool) -> String {
    if used.is_empty() {
        return NO_CONTEXT_PLACEHOLDER.to_string();
    }

    let mut out = String::new();
    for (i, result) in used.iter().enumerate() {
        if i > 0 {
            out.push_str("\n---\n\n");
        }
        let meta = &result.metadata;
        if include_metadata {
            let _ = writeln!(
                out,
                "// {} :: {} {} (lines {}-{})",
                meta.file_path, meta.unit_type, meta.unit_name, meta.start_line, meta.end_line,
            );
        }
        let _ = writeln!(out, "```{}", meta.language);
        out.push_str(&result.document);
        out.push_str("\n```\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChunkMetadata;

    fn result(id: &str, document: &str, distance: f32) -> RetrievedResult {
        RetrievedResult {
            id: id.to_string(),
            document: document.to_string(),
            metadata: ChunkMetadata {
                file_path: "lib/sample.ex".to_string(),
                unit_type: "public-function".to_string(),
                unit_name: "run/1".to_string(),
                start_line: 1,
                end_line: 3,
                language: "elixir".to_string(),
            },
            distance,
        }
    }

    #[test]
    fn scenario_c_empty_results_render_placeholder() {
        let ctx = assemble(&[], &AssembleConfig::default());
        assert_eq!(ctx.text, NO_CONTEXT_PLACEHOLDER);
        assert_eq!(ctx.total_chars, NO_CONTEXT_PLACEHOLDER.chars().count());
        assert!(ctx.chunks_used.is_empty());
    }

    #[test]
    fn scenario_d_duplicate_ids_keep_first() {
        let results: Vec<_> = (0..20)
            .map(|i| {
                let distance = 0.9 - f32::from(u8::try_from(i).unwrap()) * 0.01;
                result("same-id", &format!("document number {i}"), distance)
            })
            .collect();
        let ctx = assemble(&results, &AssembleConfig::default());
        assert_eq!(ctx.chunks_used.len(), 1);
        // First occurrence wins regardless of its distance.
        assert_eq!(ctx.chunks_used[0].document, "document number 0");
        assert!((ctx.chunks_used[0].distance - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn results_sorted_by_distance_ascending() {
        let results = vec![
            result("far", "far document text", 0.8),
            result("near", "near document text", 0.1),
            result("mid", "mid document text", 0.4),
        ];
        let ctx = assemble(&results, &AssembleConfig::default());
        let ids: Vec<_> = ctx.chunks_used.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
    }

    #[test]
    fn equal_distances_keep_input_order() {
        let results = vec![
            result("first", "first document text", 0.5),
            result("second", "second document text", 0.5),
        ];
        let ctx = assemble(&results, &AssembleConfig::default());
        let ids: Vec<_> = ctx.chunks_used.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn budget_stops_at_first_overflow() {
        let config = AssembleConfig {
            max_chars: 350,
            include_metadata: true,
        };
        // Each result costs 100 (document) + 100 (overhead).
        let results = vec![
            result("a", &"a".repeat(100), 0.1),
            result("b", &"b".repeat(100), 0.2),
            result("c", &"c".repeat(100), 0.3),
        ];
        let ctx = assemble(&results, &config);
        assert_eq!(ctx.chunks_used.len(), 1);
        assert_eq!(ctx.chunks_used[0].id, "a");
    }

    #[test]
    fn rendered_text_stays_near_budget() {
        let config = AssembleConfig {
            max_chars: 1_000,
            include_metadata: true,
        };
        let results: Vec<_> = (0..30)
            .map(|i| result(&format!("id-{i}"), &"x".repeat(150), 0.1))
            .collect();
        let ctx = assemble(&results, &config);
        assert!(ctx.total_chars <= config.max_chars + FORMAT_OVERHEAD + 150);
    }

    #[test]
    fn assemble_is_idempotent_over_sorted_input() {
        let results = vec![
            result("a", "first document body", 0.1),
            result("b", "second document body", 0.2),
        ];
        let once = assemble(&results, &AssembleConfig::default());
        let twice = assemble(&results, &AssembleConfig::default());
        assert_eq!(once.text, twice.text);
        assert_eq!(once.total_chars, twice.total_chars);
        assert_eq!(once.estimated_tokens, twice.estimated_tokens);
    }

    #[test]
    fn rendered_block_carries_metadata_and_fence() {
        let ctx = assemble(
            &[result("a", "def run(x), do: x", 0.1)],
            &AssembleConfig::default(),
        );
        assert!(ctx.text.contains("lib/sample.ex"));
        assert!(ctx.text.contains("public-function"));
        assert!(ctx.text.contains("run/1"));
        assert!(ctx.text.contains("(lines 1-3)"));
        assert!(ctx.text.contains("```elixir"));
        assert!(ctx.text.contains("def run(x), do: x"));
    }

    #[test]
    fn include_metadata_false_omits_header() {
        let config = AssembleConfig {
            max_chars: DEFAULT_MAX_CHARS,
            include_metadata: false,
        };
        let ctx = assemble(&[result("a", "def run(x), do: x", 0.1)], &config);
        assert!(!ctx.text.contains("lib/sample.ex"));
        assert!(ctx.text.contains("```elixir"));
    }

    #[test]
    fn blocks_joined_by_separator() {
        let ctx = assemble(
            &[
                result("a", "first document body", 0.1),
                result("b", "second document body", 0.2),
            ],
            &AssembleConfig::default(),
        );
        assert_eq!(ctx.text.matches("\n---\n").count(), 1);
    }

    #[test]
    fn token_estimate_is_quarter_of_chars() {
        let ctx = assemble(
            &[result("a", "some document body here", 0.1)],
            &AssembleConfig::default(),
        );
        assert_eq!(ctx.estimated_tokens, ctx.total_chars / 4);
    }
}
