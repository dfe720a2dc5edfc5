//! Downstream consumers of tick reports.

use std::io::{self, Write};

use crate::sim::engine::TickReport;

/// Receives every emitted tick, in order.
pub trait TickSink {
    /// Consumes one report.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` when the sink cannot write.
    fn emit(&mut self, report: &TickReport) -> io::Result<()>;

    /// Flushes buffered output. The default does nothing.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` when flushing fails.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One human-readable line per tick, plus forecast horizons and alerts.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TickSink for ConsoleSink<W> {
    fn emit(&mut self, r: &TickReport) -> io::Result<()> {
        write!(self.out, "[{:>4}] {:02}:00 | {}", r.tick, r.hour, r.metrics)?;
        if !r.forecasts.is_empty() {
            let ends: Vec<String> = r
                .forecasts
                .iter()
                .filter_map(|(name, values)| values.last().map(|v| format!("{name}={v:.2}")))
                .collect();
            write!(self.out, " | +{}: {}", forecast_horizon(r), ends.join(" "))?;
        }
        if r.anomaly_alert {
            write!(self.out, " | ANOMALY")?;
        }
        writeln!(self.out)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn forecast_horizon(r: &TickReport) -> usize {
    r.forecasts.values().map(Vec::len).max().unwrap_or(0)
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub reports: Vec<TickReport>,
}

impl TickSink for CollectingSink {
    fn emit(&mut self, report: &TickReport) -> io::Result<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}

/// Fans one report out to several sinks, stopping at the first error.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn TickSink + Send>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: impl TickSink + Send + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TickSink for FanOut {
    fn emit(&mut self, report: &TickReport) -> io::Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.emit(report))
    }

    fn finish(&mut self) -> io::Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.finish())
    }
}
