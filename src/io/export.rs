//! CSV export of per-tick telemetry.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::sim::engine::TickReport;
use crate::sink::TickSink;

/// Column header for CSV telemetry export.
const HEADER: &str = "tick,hour,server_kw,cooling_kw,pue,max_outlet_c,\
                      daily_cost_usd,compute_output,cooling_strategy,anomaly";

fn row(r: &TickReport) -> [String; 10] {
    let m = &r.metrics;
    [
        r.tick.to_string(),
        r.hour.to_string(),
        format!("{:.4}", m.total_server_power_kw),
        format!("{:.4}", m.total_cooling_power_kw),
        format!("{:.4}", m.average_pue),
        format!("{:.3}", m.max_outlet_temp_c),
        format!("{:.4}", m.total_daily_cost_usd),
        format!("{:.2}", m.total_compute_output),
        m.cooling_strategy.code().to_string(),
        r.anomaly.to_string(),
    ]
}

/// Streams one CSV row per emitted tick.
///
/// The header is written with the first row, so a run that emits nothing
/// leaves the destination empty.
pub struct TelemetryWriter<W: Write> {
    wtr: csv::Writer<W>,
    header_written: bool,
}

impl TelemetryWriter<BufWriter<File>> {
    /// Creates (or truncates) the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the file cannot be created.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> TelemetryWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            wtr: csv::WriterBuilder::new().from_writer(writer),
            header_written: false,
        }
    }
}

impl<W: Write> TickSink for TelemetryWriter<W> {
    fn emit(&mut self, report: &TickReport) -> io::Result<()> {
        if !self.header_written {
            self.wtr.write_record(HEADER.split(',').map(str::trim))?;
            self.header_written = true;
        }
        self.wtr.write_record(&row(report))?;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.wtr.flush()
    }
}

/// Writes a batch of reports as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(reports: &[TickReport], writer: impl Write) -> io::Result<()> {
    let mut out = TelemetryWriter::new(writer);
    for r in reports {
        out.emit(r)?;
    }
    out.finish()
}
