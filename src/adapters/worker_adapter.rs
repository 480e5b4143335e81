//! Thread-hosted backtest runs.
//!
//! The core stays single-threaded; this adapter spawns one worker per
//! run and streams `RunnerMessage`s back over an mpsc channel. The
//! channel closes after the terminal `Result` message when the worker
//! exits.

use std::sync::mpsc;
use std::thread;

use crate::domain::backtest::{BacktestConfig, BacktestRunner};
use crate::domain::market::Candle;
use crate::ports::worker_port::RunnerMessage;

/// The evaluator recurses on nested calls and `iCustom` chains, so the
/// worker gets a deeper stack than the platform default.
const WORKER_STACK: usize = 16 * 1024 * 1024;

/// Run the program against the series on a fresh thread. Journal lines
/// arrive as `Log` messages while the run progresses; the final message
/// is always `Result`, carrying `None` when the runner could not be
/// constructed (compile error, bad series).
pub fn spawn_backtest(
    source: String,
    candles: Vec<Candle>,
    config: BacktestConfig,
) -> std::io::Result<mpsc::Receiver<RunnerMessage>> {
    let (tx, rx) = mpsc::channel();
    let log_tx = tx.clone();
    thread::Builder::new()
        .name("backtest-runner".into())
        .stack_size(WORKER_STACK)
        .spawn(move || {
            let runner = BacktestRunner::new(&source, candles, config).map(|runner| {
                runner.with_log_sink(move |line| {
                    let _ = log_tx.send(RunnerMessage::Log(line));
                })
            });
            let message = match runner {
                Ok(mut runner) => RunnerMessage::Result(Some(Box::new(runner.run()))),
                Err(e) => {
                    let _ = tx.send(RunnerMessage::Log(e.to_string()));
                    RunnerMessage::Result(None)
                }
            };
            let _ = tx.send(message);
        })?;
    Ok(rx)
}
