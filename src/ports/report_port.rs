//! Report rendering port.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::MqlError;

/// Port for presenting a finished backtest.
pub trait ReportPort {
    fn render(&self, report: &BacktestReport) -> String;

    /// Render and write to `output_path`. Adapters that stream (sockets,
    /// stdout) override this; the default covers plain files.
    fn write(&self, report: &BacktestReport, output_path: &str) -> Result<(), MqlError> {
        std::fs::write(output_path, self.render(report))?;
        Ok(())
    }
}
