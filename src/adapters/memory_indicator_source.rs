//! In-memory indicator source, for tests and embedding hosts.

use std::collections::HashMap;

use crate::ports::indicator_port::IndicatorSource;

/// Name to program-text map. Populate before handing an `Rc` of it to the
/// engine; resolution is read-only from then on.
#[derive(Debug, Default)]
pub struct MemoryIndicatorSource {
    programs: HashMap<String, String>,
}

impl MemoryIndicatorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.programs.insert(name.into(), source.into());
    }
}

impl IndicatorSource for MemoryIndicatorSource {
    fn source(&self, name: &str) -> Option<String> {
        self.programs.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_inserted_programs_by_name() {
        let mut source = MemoryIndicatorSource::new();
        source.insert("Trend", "int start() { return 0; }");
        assert_eq!(
            source.source("Trend").as_deref(),
            Some("int start() { return 0; }")
        );
        assert_eq!(source.source("Missing"), None);
    }
}
