//! `Label` and `MultiLabel`: the taint lattice.

use crate::element::Element;
use std::collections::{HashMap, HashSet};

/// The set of elements (sources, possibly sanitized) that may have
/// influenced a value, for one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub pattern: String,
    pub values: HashSet<Element>,
}

impl Label {
    pub fn empty(pattern: impl Into<String>) -> Self {
        Label {
            pattern: pattern.into(),
            values: HashSet::new(),
        }
    }

    pub fn new(pattern: impl Into<String>, values: HashSet<Element>) -> Self {
        Label {
            pattern: pattern.into(),
            values,
        }
    }

    pub fn add_source(&mut self, name: &str, lineno: i64) {
        self.values.insert(Element::source(name, lineno));
    }

    /// Sanitization applies to the label's current contents, not to values
    /// added afterward: every existing value is wrapped, the set is then
    /// replaced.
    pub fn add_sanitizer(&mut self, name: &str, lineno: i64) {
        self.values = self
            .values
            .iter()
            .map(|v| Element::sanitized(name, lineno, v.clone()))
            .collect();
    }

    /// Pointwise union. `self.pattern` and `other.pattern` must match —
    /// combining labels across different patterns is an internal bug, not
    /// a recoverable condition.
    pub fn combine(&self, other: &Label) -> Label {
        assert_eq!(
            self.pattern, other.pattern,
            "combined labels must share a pattern name"
        );
        Label {
            pattern: self.pattern.clone(),
            values: self.values.union(&other.values).cloned().collect(),
        }
    }
}

/// A family of labels indexed by pattern name. A missing key denotes the
/// empty label for that pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiLabel {
    pub labels: HashMap<String, Label>,
}

impl MultiLabel {
    pub fn empty() -> Self {
        MultiLabel {
            labels: HashMap::new(),
        }
    }

    /// Read-write accessor: inserts an empty label for `pattern` if absent.
    /// Callers rely on this for in-place source/sanitizer injection.
    pub fn get_label(&mut self, pattern: &str) -> &mut Label {
        self.labels
            .entry(pattern.to_string())
            .or_insert_with(|| Label::empty(pattern))
    }

    /// Pointwise union across the union of keys.
    pub fn combine(&self, other: &MultiLabel) -> MultiLabel {
        let mut combined = self.clone();
        for (pattern, label) in &other.labels {
            match combined.labels.get(pattern) {
                Some(existing) => {
                    let merged = existing.combine(label);
                    combined.labels.insert(pattern.clone(), merged);
                }
                None => {
                    combined.labels.insert(pattern.clone(), label.clone());
                }
            }
        }
        combined
    }

    /// Retain only labels whose pattern is in `implicit_patterns`.
    pub fn filter_implicit(&self, implicit_patterns: &HashSet<String>) -> MultiLabel {
        MultiLabel {
            labels: self
                .labels
                .iter()
                .filter(|(name, _)| implicit_patterns.contains(*name))
                .map(|(name, label)| (name.clone(), label.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_with(pattern: &str, elems: &[Element]) -> Label {
        Label::new(pattern, elems.iter().cloned().collect())
    }

    #[test]
    fn combine_is_commutative() {
        let a = label_with("xss", &[Element::source("a", 1)]);
        let b = label_with("xss", &[Element::source("b", 2)]);
        assert_eq!(a.combine(&b), b.combine(&a));
    }

    #[test]
    fn combine_is_associative() {
        let a = label_with("xss", &[Element::source("a", 1)]);
        let b = label_with("xss", &[Element::source("b", 2)]);
        let c = label_with("xss", &[Element::source("c", 3)]);
        assert_eq!(a.combine(&b).combine(&c), a.combine(&b.combine(&c)));
    }

    #[test]
    fn combine_is_idempotent() {
        let a = label_with("xss", &[Element::source("a", 1)]);
        assert_eq!(a.combine(&a), a);
    }

    #[test]
    fn combine_has_identity() {
        let a = label_with("xss", &[Element::source("a", 1)]);
        let empty = Label::empty("xss");
        assert_eq!(a.combine(&empty), a);
    }

    #[test]
    fn add_sanitizer_wraps_every_existing_value_only() {
        let mut l = label_with("xss", &[Element::source("a", 1)]);
        l.add_sanitizer("clean", 2);
        l.add_source("b", 3);
        assert!(l.values.contains(&Element::source("b", 3)));
        assert!(l.values.contains(&Element::sanitized(
            "clean",
            2,
            Element::source("a", 1)
        )));
        assert!(!l.values.contains(&Element::source("a", 1)));
    }

    #[test]
    fn multilabel_combine_is_pointwise_and_order_independent() {
        let mut a = MultiLabel::empty();
        a.get_label("xss").add_source("a", 1);
        let mut b = MultiLabel::empty();
        b.get_label("sqli").add_source("b", 2);

        let ab = a.combine(&b);
        let ba = b.combine(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.labels.len(), 2);
    }

    #[test]
    fn filter_implicit_drops_non_implicit_patterns() {
        let mut ml = MultiLabel::empty();
        ml.get_label("xss").add_source("a", 1);
        ml.get_label("sqli").add_source("b", 2);

        let mut implicit = HashSet::new();
        implicit.insert("xss".to_string());

        let filtered = ml.filter_implicit(&implicit);
        assert!(filtered.labels.contains_key("xss"));
        assert!(!filtered.labels.contains_key("sqli"));
    }
}
