//! Background-run message contract.

use crate::domain::backtest::BacktestReport;

/// What a backtest worker sends over its channel while a run progresses.
///
/// `Log` lines stream as the program prints them; `Result` is always the
/// final message, `None` when the run aborted before producing a report.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RunnerMessage {
    Log(String),
    Result(Option<Box<BacktestReport>>),
}
