//! Error and diagnostic types shared across the language core.

/// A non-fatal lexical error. The lexer keeps scanning after recording one,
/// so a single pass reports every bad literal in the source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("lex error at line {line}, column {column}: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// A fatal structural parse error. Unlike lex errors and semantic warnings,
/// one of these means no usable declaration list exists.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    /// Format the error with the offending source line and a caret under the
    /// reported column.
    pub fn display_with_context(&self, source: &str) -> String {
        match source.lines().nth(self.line.saturating_sub(1)) {
            Some(line) => {
                let caret = " ".repeat(self.column.saturating_sub(1)) + "^";
                format!("{line}\n{caret}\n{err}", err = self)
            }
            None => self.to_string(),
        }
    }
}

/// An advisory diagnostic produced by the semantic checker. Carries a stable
/// code so host tooling can filter or localize without string matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub code: &'static str,
    pub message: String,
    pub line: usize,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "warning[{code}] at line {line}: {message}",
            code = self.code,
            line = self.line,
            message = self.message
        )
    }
}

/// An unrecoverable script execution error. Aborts the current invocation;
/// the backtest runner decides what survives.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("runtime error: {message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Top-level error type for mqlsim.
#[derive(Debug, thiserror::Error)]
pub enum MqlError {
    #[error("compilation failed:\n{details}")]
    Compile { details: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("csv error at line {line}: {reason}")]
    Csv { line: usize, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid price series: {reason}")]
    InvalidSeries { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&MqlError> for std::process::ExitCode {
    fn from(err: &MqlError) -> Self {
        let code: u8 = match err {
            MqlError::Io(_) => 1,
            MqlError::ConfigParse { .. } | MqlError::ConfigInvalid { .. } => 2,
            MqlError::Compile { .. } => 3,
            MqlError::Runtime(_) => 4,
            MqlError::Csv { .. } | MqlError::InvalidSeries { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn parse_error_display() {
        let err = ParseError::new("expected ';'", 2, 5);
        assert_eq!(err.to_string(), "parse error at line 2, column 5: expected ';'");
    }

    #[test]
    fn parse_error_context_caret() {
        let err = ParseError::new("expected ';'", 2, 5);
        let rendered = err.display_with_context("int x = 1;\nint y = 2\nvoid f() {}");
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("int y = 2"));
        assert_eq!(lines.next(), Some("    ^"));
    }

    #[test]
    fn parse_error_context_out_of_range_line() {
        let err = ParseError::new("oops", 99, 1);
        assert_eq!(err.display_with_context("one line"), err.to_string());
    }

    #[test]
    fn warning_display_includes_code() {
        let w = Warning {
            code: "override-missing",
            message: "method 'f' marked override but no base declares it".into(),
            line: 7,
        };
        assert!(w.to_string().starts_with("warning[override-missing] at line 7"));
    }

    #[test]
    fn exit_codes_are_distinct_per_category() {
        let compile = MqlError::Compile {
            details: "x".into(),
        };
        let runtime = MqlError::Runtime(RuntimeError::new("y"));
        assert_ne!(
            format!("{:?}", ExitCode::from(&compile)),
            format!("{:?}", ExitCode::from(&runtime))
        );
    }
}
