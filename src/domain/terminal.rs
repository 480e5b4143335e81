//! Virtual terminal: files, global variables, journal, timer, chart events
//! and the simulated clock.
//!
//! Everything a script can observe outside the market lives here, per run.
//! Files are in-memory name/content pairs behind a handle table. Global
//! variables optionally persist to a CSV backing file so a terminal
//! constructed over the same path sees them again.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::path::PathBuf;

/// Custom chart events are delivered with this offset added to their id.
pub const CHARTEVENT_CUSTOM: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalVar {
    pub value: f64,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartEvent {
    pub id: i64,
    pub lparam: i64,
    pub dparam: f64,
    pub sparam: String,
}

#[derive(Debug, Clone)]
struct OpenFile {
    name: String,
    position: usize,
}

#[derive(Debug, Default)]
pub struct VirtualTerminal {
    files: HashMap<String, String>,
    handles: HashMap<i64, OpenFile>,
    next_handle: i64,
    globals: BTreeMap<String, GlobalVar>,
    store_path: Option<PathBuf>,
    journal: Vec<String>,
    comment: String,
    timer_period: Option<i64>,
    timer_next: i64,
    chart_events: VecDeque<ChartEvent>,
    clock: i64,
}

impl VirtualTerminal {
    pub fn new() -> Self {
        VirtualTerminal {
            next_handle: 1,
            ..VirtualTerminal::default()
        }
    }

    /// Terminal with persistent global variables. An existing backing file
    /// is loaded; a missing one means an empty store.
    pub fn with_store(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let mut terminal = VirtualTerminal::new();
        if path.exists() {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_path(&path)?;
            for record in reader.records() {
                let record = record.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                let name = record.get(0).unwrap_or("").to_string();
                let value: f64 = record.get(1).and_then(|v| v.parse().ok()).unwrap_or(0.0);
                let time: i64 = record.get(2).and_then(|v| v.parse().ok()).unwrap_or(0);
                if !name.is_empty() {
                    terminal.globals.insert(name, GlobalVar { value, time });
                }
            }
        }
        terminal.store_path = Some(path);
        Ok(terminal)
    }

    // -- clock --

    pub fn now(&self) -> i64 {
        self.clock
    }

    pub fn set_clock(&mut self, time: i64) {
        self.clock = time;
    }

    /// Sleep maps here. Sub-second amounts round up to one second.
    pub fn advance_millis(&mut self, millis: i64) {
        if millis > 0 {
            self.clock += (millis + 999) / 1000;
        }
    }

    // -- files --

    /// Open a virtual file. Writing truncates or creates; reading a missing
    /// file fails with None.
    pub fn file_open(&mut self, name: &str, write: bool) -> Option<i64> {
        if write {
            self.files.insert(name.to_string(), String::new());
        } else if !self.files.contains_key(name) {
            return None;
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(
            handle,
            OpenFile {
                name: name.to_string(),
                position: 0,
            },
        );
        Some(handle)
    }

    /// Read everything after the current position and move to the end.
    pub fn file_read_string(&mut self, handle: i64) -> Option<String> {
        let open = self.handles.get_mut(&handle)?;
        let data = self.files.get(&open.name)?;
        let start = open.position.min(data.len());
        open.position = data.len();
        Some(data[start..].to_string())
    }

    /// Append text, returns the byte count written.
    pub fn file_write_string(&mut self, handle: i64, text: &str) -> Option<usize> {
        let open = self.handles.get(&handle)?;
        let data = self.files.get_mut(&open.name)?;
        data.push_str(text);
        Some(text.len())
    }

    /// Closed handles become invalid immediately.
    pub fn file_close(&mut self, handle: i64) -> bool {
        self.handles.remove(&handle).is_some()
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn file_delete(&mut self, name: &str) -> bool {
        self.files.remove(name).is_some()
    }

    // -- global variables --

    pub fn global_set(&mut self, name: &str, value: f64) -> i64 {
        let time = self.clock;
        self.globals
            .insert(name.to_string(), GlobalVar { value, time });
        time
    }

    pub fn global_get(&self, name: &str) -> f64 {
        self.globals.get(name).map_or(0.0, |g| g.value)
    }

    pub fn global_check(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    pub fn global_del(&mut self, name: &str) -> bool {
        self.globals.remove(name).is_some()
    }

    pub fn global_time(&self, name: &str) -> i64 {
        self.globals.get(name).map_or(0, |g| g.time)
    }

    pub fn globals_total(&self) -> usize {
        self.globals.len()
    }

    /// Atomic compare-and-set: writes only when the stored value equals
    /// `check`. A missing variable never matches.
    pub fn global_set_on_condition(&mut self, name: &str, value: f64, check: f64) -> bool {
        match self.globals.get(name) {
            Some(current) if current.value == check => {
                self.global_set(name, value);
                true
            }
            _ => false,
        }
    }

    /// Persist global variables to the backing file. Without a configured
    /// path this does nothing.
    pub fn flush_globals(&self) -> io::Result<()> {
        let Some(path) = &self.store_path else {
            return Ok(());
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        for (name, var) in &self.globals {
            writer.write_record([name.as_str(), &var.value.to_string(), &var.time.to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }

    // -- journal and comment --

    pub fn print(&mut self, line: impl Into<String>) {
        self.journal.push(line.into());
    }

    pub fn alert(&mut self, text: &str) {
        self.journal.push(format!("alert: {text}"));
    }

    pub fn set_comment(&mut self, text: impl Into<String>) {
        self.comment = text.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn take_journal(&mut self) -> Vec<String> {
        std::mem::take(&mut self.journal)
    }

    // -- timer --

    pub fn set_timer(&mut self, seconds: i64) -> bool {
        if seconds <= 0 {
            return false;
        }
        self.timer_period = Some(seconds);
        self.timer_next = self.clock + seconds;
        true
    }

    pub fn kill_timer(&mut self) {
        self.timer_period = None;
    }

    /// At most one timer delivery per call; the next target moves forward
    /// from `now`.
    pub fn timer_due(&mut self, now: i64) -> bool {
        match self.timer_period {
            Some(period) if now >= self.timer_next => {
                self.timer_next = now + period;
                true
            }
            _ => false,
        }
    }

    // -- chart events --

    pub fn push_chart_event(&mut self, event: ChartEvent) {
        self.chart_events.push_back(event);
    }

    pub fn take_chart_events(&mut self) -> Vec<ChartEvent> {
        self.chart_events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_truncates_and_read_requires_existing() {
        let mut t = VirtualTerminal::new();
        assert_eq!(t.file_open("a.txt", false), None);
        let w = t.file_open("a.txt", true).unwrap();
        assert_eq!(t.file_write_string(w, "hello"), Some(5));
        t.file_close(w);
        // reopening for write clears the content
        let w2 = t.file_open("a.txt", true).unwrap();
        assert_eq!(t.file_read_string(w2), Some(String::new()));
        t.file_close(w2);
    }

    #[test]
    fn read_consumes_from_position() {
        let mut t = VirtualTerminal::new();
        let w = t.file_open("a.txt", true).unwrap();
        t.file_write_string(w, "one");
        assert_eq!(t.file_read_string(w).as_deref(), Some("one"));
        assert_eq!(t.file_read_string(w).as_deref(), Some(""));
        t.file_write_string(w, "two");
        assert_eq!(t.file_read_string(w).as_deref(), Some("two"));
    }

    #[test]
    fn closed_handle_is_rejected() {
        let mut t = VirtualTerminal::new();
        let w = t.file_open("a.txt", true).unwrap();
        assert!(t.file_close(w));
        assert!(!t.file_close(w));
        assert_eq!(t.file_read_string(w), None);
        assert_eq!(t.file_write_string(w, "x"), None);
    }

    #[test]
    fn handles_are_distinct() {
        let mut t = VirtualTerminal::new();
        let a = t.file_open("a.txt", true).unwrap();
        let b = t.file_open("b.txt", true).unwrap();
        assert_ne!(a, b);
        t.file_write_string(b, "bee");
        assert_eq!(t.file_read_string(a).as_deref(), Some(""));
    }

    #[test]
    fn delete_removes_file_and_dangles_handles() {
        let mut t = VirtualTerminal::new();
        let w = t.file_open("a.txt", true).unwrap();
        assert!(t.file_exists("a.txt"));
        assert!(t.file_delete("a.txt"));
        assert!(!t.file_delete("a.txt"));
        assert_eq!(t.file_read_string(w), None);
    }

    #[test]
    fn global_variables_store_value_and_time() {
        let mut t = VirtualTerminal::new();
        t.set_clock(500);
        assert_eq!(t.global_set("risk", 1.5), 500);
        assert_eq!(t.global_get("risk"), 1.5);
        assert_eq!(t.global_time("risk"), 500);
        assert_eq!(t.global_get("missing"), 0.0);
        assert!(t.global_check("risk"));
        assert!(!t.global_check("missing"));
        assert_eq!(t.globals_total(), 1);
        assert!(t.global_del("risk"));
        assert_eq!(t.globals_total(), 0);
    }

    #[test]
    fn set_on_condition_compares_stored_value() {
        let mut t = VirtualTerminal::new();
        t.global_set("lock", 0.0);
        assert!(t.global_set_on_condition("lock", 1.0, 0.0));
        assert!(!t.global_set_on_condition("lock", 2.0, 0.0));
        assert_eq!(t.global_get("lock"), 1.0);
        assert!(!t.global_set_on_condition("absent", 1.0, 0.0));
    }

    #[test]
    fn globals_persist_through_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("globals.csv");
        let mut t = VirtualTerminal::with_store(&path).unwrap();
        t.set_clock(42);
        t.global_set("a", 1.25);
        t.global_set("b", -3.0);
        t.flush_globals().unwrap();

        let t2 = VirtualTerminal::with_store(&path).unwrap();
        assert_eq!(t2.global_get("a"), 1.25);
        assert_eq!(t2.global_get("b"), -3.0);
        assert_eq!(t2.global_time("a"), 42);
        assert_eq!(t2.globals_total(), 2);
    }

    #[test]
    fn missing_store_file_means_empty() {
        let dir = tempfile::tempdir().unwrap();
        let t = VirtualTerminal::with_store(dir.path().join("none.csv")).unwrap();
        assert_eq!(t.globals_total(), 0);
    }

    #[test]
    fn journal_drains_in_order() {
        let mut t = VirtualTerminal::new();
        t.print("first");
        t.alert("second");
        assert_eq!(t.take_journal(), vec!["first".to_string(), "alert: second".to_string()]);
        assert!(t.take_journal().is_empty());
    }

    #[test]
    fn timer_fires_per_period() {
        let mut t = VirtualTerminal::new();
        assert!(!t.set_timer(0));
        t.set_clock(100);
        assert!(t.set_timer(10));
        assert!(!t.timer_due(105));
        assert!(t.timer_due(110));
        assert!(!t.timer_due(115));
        assert!(t.timer_due(120));
        t.kill_timer();
        assert!(!t.timer_due(999));
    }

    #[test]
    fn clock_advance_rounds_millis_up() {
        let mut t = VirtualTerminal::new();
        t.set_clock(10);
        t.advance_millis(500);
        assert_eq!(t.now(), 11);
        t.advance_millis(2000);
        assert_eq!(t.now(), 13);
        t.advance_millis(0);
        assert_eq!(t.now(), 13);
    }

    #[test]
    fn chart_events_queue_in_order() {
        let mut t = VirtualTerminal::new();
        t.push_chart_event(ChartEvent {
            id: 1,
            lparam: 2,
            dparam: 3.0,
            sparam: "x".into(),
        });
        t.push_chart_event(ChartEvent {
            id: 2,
            lparam: 0,
            dparam: 0.0,
            sparam: String::new(),
        });
        let events = t.take_chart_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, 1);
        assert!(t.take_chart_events().is_empty());
    }
}
