//! Collects illegal flows discovered during interpretation and renders the
//! final JSON report.

use crate::element::Ident;
use crate::label::MultiLabel;
use serde::Serialize;
use std::collections::HashMap;

/// One finding in the final report: a `(source, sink, pattern)` key, the
/// sanitizer chains observed for it, and whether any unsanitized flow
/// reached the sink.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub vulnerability: String,
    pub source: (String, i64),
    pub sink: (String, i64),
    pub sanitized_flows: Vec<Vec<(String, i64)>>,
    pub unsanitized_flows: &'static str,
}

/// Append-only collector of illegal flows, keyed by the sink at which they
/// were recorded.
#[derive(Debug, Default)]
pub struct Vulnerability {
    illegal_flows: HashMap<Ident, Vec<MultiLabel>>,
}

impl Vulnerability {
    pub fn new() -> Self {
        Vulnerability::default()
    }

    pub fn save(&mut self, sink: Ident, ml: MultiLabel) {
        self.illegal_flows.entry(sink).or_default().push(ml);
    }

    /// Renders the accumulated findings in the shape of spec.md's JSON
    /// report. Grouping is by `(source, sink, pattern)`; within a group,
    /// each recorded label value contributes either a sanitizer trace or,
    /// if bare, marks the group as having an unsanitized flow.
    ///
    /// Output order is made deterministic by sorting keys, since iteration
    /// over `HashMap` does not preserve insertion order the way the
    /// original's dict-based grouping happened to.
    pub fn to_report(&self) -> Vec<ReportEntry> {
        type Key = ((String, i64), (String, i64), String);

        let mut grouped: HashMap<Key, Vec<Vec<(String, i64)>>> = HashMap::new();

        // sort sinks and, within each sink, labels' pattern names, so the
        // traversal that discovers keys is itself deterministic
        let mut sinks: Vec<&Ident> = self.illegal_flows.keys().collect();
        sinks.sort_by(|a, b| (a.name.as_str(), a.lineno).cmp(&(b.name.as_str(), b.lineno)));

        for sink in sinks {
            for ml in &self.illegal_flows[sink] {
                let mut patterns: Vec<&String> = ml.labels.keys().collect();
                patterns.sort();
                for pattern in patterns {
                    let label = &ml.labels[pattern];
                    let mut values: Vec<_> = label.values.iter().collect();
                    values.sort_by(|a, b| format!("{a}").cmp(&format!("{b}")));
                    for val in values {
                        let (src_name, src_lineno) = val.get_source();
                        let key = (
                            (src_name.to_string(), src_lineno),
                            (sink.name.clone(), sink.lineno),
                            pattern.clone(),
                        );
                        grouped
                            .entry(key)
                            .or_default()
                            .push(val.sanitizer_trace());
                    }
                }
            }
        }

        let mut keys: Vec<&Key> = grouped.keys().collect();
        keys.sort();

        let mut counts: HashMap<&str, u32> = HashMap::new();
        let mut entries = Vec::with_capacity(keys.len());

        for key in keys {
            let (source, sink, vuln_name) = key;
            let count = counts.entry(vuln_name.as_str()).or_insert(0);
            *count += 1;

            let traces = &grouped[key];
            let mut sanitized_flows = Vec::new();
            let mut unsanitized = false;
            for trace in traces {
                if trace.is_empty() {
                    unsanitized = true;
                } else {
                    sanitized_flows.push(trace.clone());
                }
            }

            entries.push(ReportEntry {
                vulnerability: format!("{vuln_name}_{count}"),
                source: source.clone(),
                sink: sink.clone(),
                sanitized_flows,
                unsanitized_flows: if unsanitized { "yes" } else { "no" },
            });
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    #[test]
    fn bare_source_marks_unsanitized() {
        let mut v = Vulnerability::new();
        let mut ml = MultiLabel::empty();
        ml.get_label("xss").add_source("a", 1);
        v.save(Ident::new("sink", 2), ml);

        let report = v.to_report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].vulnerability, "xss_1");
        assert_eq!(report[0].source, ("a".to_string(), 1));
        assert_eq!(report[0].sink, ("sink".to_string(), 2));
        assert!(report[0].sanitized_flows.is_empty());
        assert_eq!(report[0].unsanitized_flows, "yes");
    }

    #[test]
    fn sanitized_chain_records_outer_first_trace() {
        let mut v = Vulnerability::new();
        let mut ml = MultiLabel::empty();
        let src = Element::source("a", 1);
        let once = Element::sanitized("clean", 2, src);
        let twice = Element::sanitized("clean", 3, once);
        ml.get_label("xss").values.insert(twice);
        v.save(Ident::new("sink", 4), ml);

        let report = v.to_report();
        assert_eq!(report.len(), 1);
        assert_eq!(
            report[0].sanitized_flows,
            vec![vec![("clean".to_string(), 3), ("clean".to_string(), 2)]]
        );
        assert_eq!(report[0].unsanitized_flows, "no");
    }

    #[test]
    fn distinct_patterns_at_same_sink_number_independently() {
        let mut v = Vulnerability::new();
        let mut ml = MultiLabel::empty();
        ml.get_label("xss").add_source("a", 1);
        ml.get_label("sqli").add_source("b", 1);
        v.save(Ident::new("sink", 2), ml);

        let report = v.to_report();
        assert_eq!(report.len(), 2);
        assert!(report.iter().any(|e| e.vulnerability == "xss_1"));
        assert!(report.iter().any(|e| e.vulnerability == "sqli_1"));
    }
}
