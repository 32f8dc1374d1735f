//! `MultiLabelling`: the per-variable environment at a program point.

use crate::label::MultiLabel;
use crate::policy::Policy;
use std::collections::HashMap;

/// Mapping from variable name to multilabel. A missing key means "not
/// initialized in any explored path."
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiLabelling {
    pub mapping: HashMap<String, MultiLabel>,
}

impl MultiLabelling {
    pub fn empty() -> Self {
        MultiLabelling {
            mapping: HashMap::new(),
        }
    }

    pub fn mlabel_of(&self, variable: &str) -> Option<&MultiLabel> {
        self.mapping.get(variable)
    }

    pub fn mlabel_set(&mut self, variable: &str, ml: MultiLabel) {
        self.mapping.insert(variable.to_string(), ml);
    }

    /// Pointwise `MultiLabel::combine` across the union of variable keys.
    pub fn combine(&self, other: &MultiLabelling) -> MultiLabelling {
        let mut combined = self.clone();
        for (var, ml) in &other.mapping {
            match combined.mapping.get(var) {
                Some(existing) => {
                    let merged = existing.combine(ml);
                    combined.mapping.insert(var.clone(), merged);
                }
                None => {
                    combined.mapping.insert(var.clone(), ml.clone());
                }
            }
        }
        combined
    }

    /// The multilabel for an unbound variable `v`: for every pattern in
    /// `policy`, a label containing a single `Source(v, lineno)`. Used both
    /// for the branch-merge fill (`lineno = -1`, patched on first use) and
    /// for a genuinely-never-bound read (`lineno` = the use site directly).
    pub fn uninitialized_sentinel(policy: &Policy, var: &str, lineno: i64) -> MultiLabel {
        let mut ml = MultiLabel::empty();
        for pattern in &policy.patterns {
            ml.get_label(&pattern.name).add_source(var, lineno);
        }
        ml
    }

    /// Branch-merge policy: for every variable present in `a` but missing
    /// from `b`, fill `b` with the uninitialized-sentinel multilabel at
    /// line `-1`. Applied symmetrically by the caller for both directions.
    pub fn fill_missing(target: &mut MultiLabelling, source: &MultiLabelling, policy: &Policy) {
        for var in source.mapping.keys() {
            if !target.mapping.contains_key(var) {
                target
                    .mapping
                    .insert(var.clone(), Self::uninitialized_sentinel(policy, var, -1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Pattern;

    fn policy() -> Policy {
        Policy::new(vec![Pattern {
            name: "xss".to_string(),
            sources: vec!["a".to_string()],
            sanitizers: vec!["clean".to_string()],
            sinks: vec!["sink".to_string()],
            implicit: false,
        }])
    }

    #[test]
    fn combine_unions_keys_and_is_order_independent() {
        let mut a = MultiLabelling::empty();
        a.mlabel_set("x", MultiLabel::empty());
        let mut b = MultiLabelling::empty();
        b.mlabel_set("y", MultiLabel::empty());

        let ab = a.combine(&b);
        let ba = b.combine(&a);
        assert_eq!(ab, ba);
        assert!(ab.mapping.contains_key("x"));
        assert!(ab.mapping.contains_key("y"));
    }

    #[test]
    fn fill_missing_adds_sentinel_for_variable_absent_on_one_side() {
        let p = policy();
        let mut taken = MultiLabelling::empty();
        taken.mlabel_set("b", MultiLabel::empty());
        let not_taken = MultiLabelling::empty();

        let mut filled_not_taken = not_taken.clone();
        MultiLabelling::fill_missing(&mut filled_not_taken, &taken, &p);

        let ml = filled_not_taken.mlabel_of("b").unwrap();
        let label = ml.labels.get("xss").unwrap();
        assert!(label.values.contains(&crate::element::Element::source("b", -1)));
    }
}
