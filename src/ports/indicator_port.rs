//! Custom-indicator resolution port.

/// Resolves a custom indicator name to its program text.
///
/// `iCustom` reaches indicator programs only through this trait, so the
/// engine never knows where sources live. The in-memory adapter backs
/// tests and embedding hosts; a directory-tree adapter would satisfy the
/// same contract.
pub trait IndicatorSource {
    fn source(&self, name: &str) -> Option<String>;
}
