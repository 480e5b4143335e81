#![allow(dead_code)]

use mqlsim::domain::market::Candle;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Hourly bars where every price of bar `i` is `closes[i]`.
pub fn hourly_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            time: 3_600 * (i as i64 + 1),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
        })
        .collect()
}

/// 100 hourly bars: a 40-bar plateau at 1.00, then 30 bars rising by
/// 0.01 each, then 30 bars falling back by 0.01 each.
pub fn rise_then_fall() -> Vec<Candle> {
    let mut closes = vec![1.0; 40];
    for i in 1..=30 {
        closes.push(1.0 + 0.01 * i as f64);
    }
    for i in 1..=30 {
        closes.push(1.3 - 0.01 * i as f64);
    }
    hourly_candles(&closes)
}

pub fn shared_log() -> (Rc<RefCell<Vec<String>>>, impl FnMut(String)) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let writer = Rc::clone(&log);
    (log, move |line: String| writer.borrow_mut().push(line))
}

pub fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
