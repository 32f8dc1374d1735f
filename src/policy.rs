//! Vulnerability patterns and the policy built from them.

use crate::label::MultiLabel;
use serde::Deserialize;

/// A named triple of (sources, sanitizers, sinks) plus an implicit-flow
/// flag, as loaded from the patterns JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Pattern {
    #[serde(rename = "vulnerability")]
    pub name: String,
    pub sources: Vec<String>,
    pub sanitizers: Vec<String>,
    pub sinks: Vec<String>,
    #[serde(deserialize_with = "deserialize_yes_no")]
    pub implicit: bool,
}

fn deserialize_yes_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(s.eq_ignore_ascii_case("yes"))
}

impl Pattern {
    pub fn is_source(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s == name)
    }

    pub fn is_sanitizer(&self, name: &str) -> bool {
        self.sanitizers.iter().any(|s| s == name)
    }

    pub fn is_sink(&self, name: &str) -> bool {
        self.sinks.iter().any(|s| s == name)
    }
}

/// An ordered list of patterns, with the search/classification queries the
/// interpreter drives against it.
#[derive(Debug, Clone)]
pub struct Policy {
    pub patterns: Vec<Pattern>,
}

impl Policy {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Policy { patterns }
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let patterns: Vec<Pattern> = serde_json::from_str(data)?;
        Ok(Policy::new(patterns))
    }

    pub fn get_vulnerabilities(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn get_implicit_vulnerabilities(&self) -> std::collections::HashSet<String> {
        self.patterns
            .iter()
            .filter(|p| p.implicit)
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn search_source(&self, name: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.is_source(name))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn search_sanitizer(&self, name: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.is_sanitizer(name))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn search_sink(&self, name: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.is_sink(name))
            .map(|p| p.name.as_str())
            .collect()
    }

    /// For each pattern whose sinks contain `sink`, include the multilabel's
    /// label for that pattern (empty if absent) as evidence to record.
    pub fn find_illegal(&self, sink: &str, ml: &mut MultiLabel) -> MultiLabel {
        let mut bad = MultiLabel::empty();
        for pattern in &self.patterns {
            if pattern.is_sink(sink) {
                let label = ml.get_label(&pattern.name).clone();
                bad.labels.insert(label.pattern.clone(), label);
            }
        }
        bad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> Policy {
        Policy::new(vec![Pattern {
            name: "xss".to_string(),
            sources: vec!["a".to_string()],
            sanitizers: vec!["clean".to_string()],
            sinks: vec!["sink".to_string()],
            implicit: false,
        }])
    }

    #[test]
    fn loads_pattern_json_with_yes_no_implicit() {
        let json = r#"[{"vulnerability":"xss","sources":["a"],"sanitizers":["clean"],"sinks":["sink"],"implicit":"yes"}]"#;
        let policy = Policy::from_json(json).unwrap();
        assert_eq!(policy.patterns.len(), 1);
        assert!(policy.patterns[0].implicit);
    }

    #[test]
    fn get_vulnerabilities_lists_all_pattern_names_in_order() {
        let p = Policy::new(vec![
            Pattern {
                name: "xss".to_string(),
                sources: vec!["a".to_string()],
                sanitizers: vec!["clean".to_string()],
                sinks: vec!["sink".to_string()],
                implicit: false,
            },
            Pattern {
                name: "sqli".to_string(),
                sources: vec!["b".to_string()],
                sanitizers: vec![],
                sinks: vec!["query".to_string()],
                implicit: true,
            },
        ]);
        assert_eq!(p.get_vulnerabilities(), vec!["xss", "sqli"]);
    }

    #[test]
    fn search_helpers_classify_by_name() {
        let p = sample_policy();
        assert_eq!(p.search_source("a"), vec!["xss"]);
        assert_eq!(p.search_sanitizer("clean"), vec!["xss"]);
        assert_eq!(p.search_sink("sink"), vec!["xss"]);
        assert!(p.search_source("unrelated").is_empty());
    }

    #[test]
    fn find_illegal_returns_label_for_matching_sink_only() {
        let p = sample_policy();
        let mut ml = MultiLabel::empty();
        ml.get_label("xss").add_source("a", 1);

        let bad = p.find_illegal("sink", &mut ml);
        assert!(bad.labels.contains_key("xss"));

        let mut empty_ml = MultiLabel::empty();
        let none = p.find_illegal("not-a-sink", &mut empty_ml);
        assert!(none.labels.is_empty());
    }
}
