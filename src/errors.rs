use thiserror::Error;

pub type AnalyzerResult<T, E = AnalyzerError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tree-sitter error: {0}")]
    TreeSitter(#[from] tree_sitter::LanguageError),

    #[error("failed to parse slice at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("unsupported AST node `{kind}` at line {line}")]
    UnsupportedNode { kind: String, line: usize },

    #[error("{0}")]
    Msg(String),
}

impl From<&str> for AnalyzerError {
    fn from(s: &str) -> Self {
        AnalyzerError::Msg(s.to_owned())
    }
}

impl From<String> for AnalyzerError {
    fn from(s: String) -> Self {
        AnalyzerError::Msg(s)
    }
}

#[test]
fn io_conversion_retains_message() {
    let e = std::io::Error::new(std::io::ErrorKind::Other, "boom!");
    let n: AnalyzerError = e.into();
    assert!(matches!(n, AnalyzerError::Io(_)));
    assert!(n.to_string().contains("boom"));
}

#[test]
fn unsupported_node_message_carries_kind_and_line() {
    let n = AnalyzerError::UnsupportedNode {
        kind: "lambda".to_string(),
        line: 7,
    };
    assert!(n.to_string().contains("lambda"));
    assert!(n.to_string().contains('7'));
}

#[test]
fn simple_string_into_msg() {
    let n: AnalyzerError = "plain msg".into();
    assert!(matches!(n, AnalyzerError::Msg(s) if s == "plain msg"));
}
