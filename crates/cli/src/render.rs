use shelf_core::models::{keys, QueryHit};
use std::path::Path;

const SNIPPET_CHARS: usize = 250;

/// Last path component, or the whole string when there is none.
pub fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Similarity shown to users: `max(0, 1 - distance) * 100`.
pub fn match_percent(distance: f32) -> f32 {
    (1.0 - distance).max(0.0) * 100.0
}

/// Single-line preview of a chunk, cut at 250 characters.
pub fn snippet(content: &str) -> String {
    let flat = content.replace(['\n', '\r'], " ");
    flat.chars().take(SNIPPET_CHARS).collect()
}

/// 1-based page number for display; `?` when the hit carries none.
pub fn page_label(hit: &QueryHit) -> String {
    hit.meta(keys::PAGE)
        .and_then(|p| p.parse::<usize>().ok())
        .map(|p| (p + 1).to_string())
        .unwrap_or_else(|| "?".to_string())
}

pub fn category(hit: &QueryHit) -> &str {
    hit.meta(keys::CATEGORY).unwrap_or("Uncategorized")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(match_percent(0.0), 100.0);
        assert_eq!(match_percent(1.5), 0.0);
        assert!((match_percent(0.25) - 75.0).abs() < 1e-4);
    }

    #[test]
    fn snippet_is_flat_and_bounded() {
        let text = format!("line one\nline two {}", "x".repeat(400));
        let s = snippet(&text);
        assert!(s.starts_with("line one line two"));
        assert_eq!(s.chars().count(), 250);
    }

    #[test]
    fn page_and_category_defaults() {
        let hit = QueryHit {
            id: "1".into(),
            payload: String::new(),
            metadata: HashMap::from([(keys::PAGE.to_string(), "0".to_string())]),
            distance: 0.1,
        };
        assert_eq!(page_label(&hit), "1");
        assert_eq!(category(&hit), "Uncategorized");
        assert_eq!(file_name("documents/NLP/paper.pdf"), "paper.pdf");
    }
}
