use crate::models::QueryHit;

/// Label used for hits that do not carry the grouping key.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// First hit per distinct `metadata[key]`, in rank order.
pub fn distinct_sources<'a>(hits: &'a [QueryHit], key: &str) -> Vec<(&'a str, &'a QueryHit)> {
    let mut seen: Vec<&str> = Vec::new();
    let mut out = Vec::new();
    for hit in hits {
        let source = hit.meta(key).unwrap_or(UNKNOWN_SOURCE);
        if !seen.contains(&source) {
            seen.push(source);
            out.push((source, hit));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn hit(id: &str, source: Option<&str>, distance: f32) -> QueryHit {
        let mut metadata = HashMap::new();
        if let Some(s) = source {
            metadata.insert("source".to_string(), s.to_string());
        }
        QueryHit {
            id: id.to_string(),
            payload: String::new(),
            metadata,
            distance,
        }
    }

    #[test]
    fn keeps_first_seen_order() {
        let hits = vec![
            hit("1", Some("b.pdf"), 0.1),
            hit("2", Some("a.pdf"), 0.2),
            hit("3", Some("b.pdf"), 0.3),
            hit("4", None, 0.4),
            hit("5", None, 0.5),
        ];
        let distinct = distinct_sources(&hits, "source");
        let sources: Vec<_> = distinct.iter().map(|(s, _)| *s).collect();
        assert_eq!(sources, vec!["b.pdf", "a.pdf", "Unknown"]);
        assert_eq!(distinct[0].1.id, "1");
        assert_eq!(distinct[2].1.id, "4");
    }

    #[test]
    fn empty_hits() {
        assert!(distinct_sources(&[], "source").is_empty());
    }
}
