//! Exporting a [`Summary`] as a terminal report or as CSV.

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use yansi::Paint;

use crate::measurements::{OperationKind, OperationSummary, Summary};
use crate::status::Status;

/// The format of the benchmark report.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// A coloured, human readable report.
    #[default]
    Text,
    /// A machine readable CSV file.
    Csv,
}

/// Writes the summary in the given format.
pub fn export(summary: &Summary, format: ExportFormat, output: impl Write) -> io::Result<()> {
    match format {
        ExportFormat::Text => write_text(summary, output),
        ExportFormat::Csv => write_csv(summary, output),
    }
}

/// Writes a coloured report, one block per operation kind.
pub fn write_text(summary: &Summary, mut output: impl Write) -> io::Result<()> {
    writeln!(
        output,
        "{} {:.2?}, {:.2} operations/s",
        "## TOTALS".bold(),
        summary.runtime.bold(),
        summary.throughput.bold()
    )?;

    for (kind, operation) in &summary.operations {
        writeln!(output)?;
        write_operation(&mut output, *kind, operation)?;
    }

    Ok(())
}

fn write_operation(
    output: &mut impl Write,
    kind: OperationKind,
    summary: &OperationSummary,
) -> io::Result<()> {
    write!(
        output,
        "{} ({} ops",
        format!("{kind}:").bold().green(),
        summary.operations.bold()
    )?;
    let failures: u64 = summary
        .statuses
        .iter()
        .filter(|(status, _)| !status.is_ok())
        .map(|(_, count)| count)
        .sum();
    if failures > 0 {
        write!(output, ", {}", format!("{failures} FAILURES").bold().red())?;
    }
    writeln!(output, ")")?;

    let latency = |micros: Option<f64>| micros.map(|us| Duration::from_secs_f64(us / 1_000_000.0));
    writeln!(
        output,
        "  avg: {:.2?}; p50: {:.2?}; p90: {:.2?}; p99: {:.2?}",
        Latency(latency(summary.average_us)).bold(),
        Latency(latency(summary.p50_us)),
        Latency(latency(summary.p90_us)),
        Latency(latency(summary.p99_us)),
    )?;

    for status in Status::ALL {
        let Some(count) = summary.statuses.get(&status) else {
            continue;
        };
        if status.is_ok() {
            writeln!(output, "  {status}: {count}")?;
        } else {
            writeln!(output, "  {}", format!("{status}: {count}").red())?;
        }
    }

    Ok(())
}

/// Formats a missing latency as `N/A`.
struct Latency(Option<Duration>);

impl fmt::Debug for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(duration) => fmt::Debug::fmt(duration, f),
            None => f.write_str(NOT_AVAILABLE),
        }
    }
}

/// The placeholder for measurements that were not taken.
const NOT_AVAILABLE: &str = "N/A";

/// The measurement columns of the CSV report.
const CSV_COLUMNS: [&str; 6] = [
    "Operations",
    "AverageLatency",
    "MinLatency",
    "MaxLatency",
    "95thPercentileLatency",
    "99thPercentileLatency",
];

/// Writes the summary as CSV.
///
/// The file starts with the total runtime and throughput as comments, followed by a header line
/// and one line per recorded operation kind. Units are part of the values, so that every column
/// holds a single measurement. The file ends with an empty line.
pub fn write_csv(summary: &Summary, output: impl Write) -> io::Result<()> {
    let mut output = io::BufWriter::new(output);

    let runtime_ms = summary.runtime.as_millis();
    writeln!(output, "# Total runtime: {runtime_ms} ms.")?;
    writeln!(output, "# Total throughput: {} ops/sec.", summary.throughput)?;

    write!(output, "# Metric")?;
    for column in CSV_COLUMNS {
        write!(output, ", {column}")?;
    }
    writeln!(output)?;

    for kind in OperationKind::ALL {
        let Some(operation) = summary.operations.get(&kind) else {
            continue;
        };

        let latency = |micros: Option<f64>| match micros {
            Some(us) => format!("{us:.3} us"),
            None => NOT_AVAILABLE.to_owned(),
        };
        let values = [
            operation.operations.to_string(),
            latency(operation.average_us),
            latency(operation.min_us),
            latency(operation.max_us),
            latency(operation.p95_us),
            latency(operation.p99_us),
        ];

        write!(output, "{kind}")?;
        for value in values {
            write!(output, ", {value}")?;
        }
        writeln!(output)?;
    }

    writeln!(output)?;
    output.flush()
}
