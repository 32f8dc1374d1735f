//! The taint-value union: a program identifier at a line, optionally
//! wrapped in a chain of sanitizer applications.

use std::fmt;

/// A plain identifier at a source line. Used for sink keys and for the
/// sanitizer/source markers passed into [`crate::label::Label`] methods —
/// not itself a taint value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: String,
    pub lineno: i64,
}

impl Ident {
    pub fn new(name: impl Into<String>, lineno: i64) -> Self {
        Ident {
            name: name.into(),
            lineno,
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.lineno)
    }
}

/// A taint-value element: either a bare source or a source wrapped in one
/// or more sanitizer applications. The chain always terminates in a
/// `Source` — see [`Element::get_source`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    Source { name: String, lineno: i64 },
    Sanitized {
        name: String,
        lineno: i64,
        of: Box<Element>,
    },
}

impl Element {
    pub fn source(name: impl Into<String>, lineno: i64) -> Self {
        Element::Source {
            name: name.into(),
            lineno,
        }
    }

    /// Wrap `of` in a sanitizer application at `(name, lineno)`. Collapses
    /// the immediate duplicate when `(name, lineno)` equals `of`'s own
    /// `(name, lineno)` — applying the very same sanitizer call site twice
    /// in a row does not deepen the chain.
    pub fn sanitized(name: impl Into<String>, lineno: i64, of: Element) -> Self {
        let name = name.into();
        let (of_name, of_lineno) = of.head();
        if name == of_name && lineno == of_lineno {
            match of {
                Element::Sanitized { of: inner, .. } => Element::Sanitized {
                    name,
                    lineno,
                    of: inner,
                },
                Element::Source { .. } => Element::Sanitized {
                    name,
                    lineno,
                    of: Box::new(of),
                },
            }
        } else {
            Element::Sanitized {
                name,
                lineno,
                of: Box::new(of),
            }
        }
    }

    fn head(&self) -> (String, i64) {
        match self {
            Element::Source { name, lineno } => (name.clone(), *lineno),
            Element::Sanitized { name, lineno, .. } => (name.clone(), *lineno),
        }
    }

    /// Walk the chain down to its terminal `Source`.
    pub fn get_source(&self) -> (&str, i64) {
        match self {
            Element::Source { name, lineno } => (name.as_str(), *lineno),
            Element::Sanitized { of, .. } => of.get_source(),
        }
    }

    /// Rewrite every `-1` sentinel lineno in this element (the terminal
    /// source only — sanitizer application sites are always concrete) to
    /// `lineno`. Returns a new element; never mutates in place.
    pub fn patch_sentinel_lineno(&self, lineno: i64) -> Element {
        match self {
            Element::Source { name, lineno: l } if *l == -1 => {
                Element::Source {
                    name: name.clone(),
                    lineno,
                }
            }
            Element::Source { .. } => self.clone(),
            Element::Sanitized { name, lineno: l, of } => Element::Sanitized {
                name: name.clone(),
                lineno: *l,
                of: Box::new(of.patch_sentinel_lineno(lineno)),
            },
        }
    }

    /// Outer-first list of `(sanitizer-name, lineno)` pairs from this
    /// element down to (but excluding) its terminal source.
    pub fn sanitizer_trace(&self) -> Vec<(String, i64)> {
        let mut trace = Vec::new();
        let mut cur = self;
        while let Element::Sanitized { name, lineno, of } = cur {
            trace.push((name.clone(), *lineno));
            cur = of;
        }
        trace
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Source { name, lineno } => write!(f, "Source({name}@{lineno})"),
            Element::Sanitized { name, lineno, of } => {
                write!(f, "Sanitized({name}@{lineno} | {of})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_source_walks_chain() {
        let src = Element::source("a", 1);
        let once = Element::sanitized("clean", 2, src);
        let twice = Element::sanitized("clean2", 3, once);
        assert_eq!(twice.get_source(), ("a", 1));
    }

    #[test]
    fn duplicate_immediate_sanitizer_collapses() {
        let src = Element::source("a", 1);
        let once = Element::sanitized("clean", 2, src);
        let twice_same = Element::sanitized("clean", 2, once.clone());
        // re-wrapping with the same (name, lineno) as `once` is idempotent:
        // it must not deepen the chain nor drop the sanitizer layer
        assert_eq!(twice_same, once);
    }

    #[test]
    fn distinct_sanitizer_calls_deepen_the_chain() {
        let src = Element::source("a", 1);
        let once = Element::sanitized("clean", 2, src);
        let twice = Element::sanitized("clean", 4, once.clone());
        assert_eq!(twice.sanitizer_trace(), vec![
            ("clean".to_string(), 4),
            ("clean".to_string(), 2),
        ]);
    }

    #[test]
    fn patch_sentinel_only_rewrites_minus_one() {
        let src = Element::source("a", -1);
        let wrapped = Element::sanitized("clean", 5, src);
        let patched = wrapped.patch_sentinel_lineno(9);
        assert_eq!(patched.get_source(), ("a", 9));
        assert_eq!(patched.sanitizer_trace(), vec![("clean".to_string(), 5)]);
    }
}
