use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use serde::Serialize;
use tracing_subscriber::fmt::MakeWriter;

use crate::harvest::{HarvestReport, ProgressEvent, ProgressSink};
use crate::store::StoreStatus;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_harvest(report: &HarvestReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_status(status: &StoreStatus) -> io::Result<()> {
        Self::print_json(status)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// One log line per completed item.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match (&event.isbn, &event.outcome) {
            (Some(isbn), Some(outcome)) => tracing::info!(
                kind = %event.kind,
                position = event.position,
                total = event.total,
                %isbn,
                ?outcome,
                "item done"
            ),
            _ => tracing::info!(kind = %event.kind, total = event.total, "pass started"),
        }
    }
}

/// Single redrawn line on stderr: `prefix |████----| 12 of 40 (30.0%) Complete`.
pub struct TerminalProgress {
    width: usize,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self { width: 40 }
    }

    pub fn with_width(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn render(&self, event: &ProgressEvent) -> String {
        let prefix = format!("{} download", event.kind);
        if event.total == 0 {
            return format!("{prefix} | nothing pending");
        }
        let filled = self.width * event.position / event.total;
        let bar = format!("{}{}", "█".repeat(filled), "-".repeat(self.width - filled));
        let percent = 100.0 * event.position as f64 / event.total as f64;
        format!(
            "{prefix} |{bar}| {} of {} ({percent:.1}%) Complete",
            event.position, event.total
        )
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn event(&self, event: ProgressEvent) {
        let line = self.render(&event);
        let mut stderr = io::stderr();
        let _ = crossterm::execute!(
            stderr,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        );
        if event.position == event.total {
            let _ = writeln!(stderr);
        }
    }
}

/// Log writer for interactive runs. Each record starts by wiping the current
/// terminal line, so a log line never lands inside a half-drawn progress bar;
/// the bar is redrawn on the next item.
pub struct ClearLineWriter<F> {
    make: F,
}

impl<F> ClearLineWriter<F> {
    pub fn new(make: F) -> Self {
        Self { make }
    }
}

impl<'a, F, W> MakeWriter<'a> for ClearLineWriter<F>
where
    F: Fn() -> W,
    W: Write,
{
    type Writer = W;

    fn make_writer(&'a self) -> Self::Writer {
        let mut writer = (self.make)();
        let _ = crossterm::queue!(writer, MoveToColumn(0), Clear(ClearType::CurrentLine));
        writer
    }
}

pub fn print_harvest_summary(report: &HarvestReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}isbn-harvest summary{reset}");
    for pass in &report.passes {
        if pass.dry_run {
            println!("{cyan}{}: {} pending (dry run){reset}", pass.kind, pass.pending);
            continue;
        }
        println!(
            "{green}{}: processed {} of {} pending{reset}",
            pass.kind, pass.processed, pass.pending
        );
        println!(
            "{green}   found {} / empty {} / blurbs {} / already recorded {}{reset}",
            pass.marc_found, pass.marc_empty, pass.blurbs_stored, pass.already_recorded
        );
        if !pass.still_pending.is_empty() {
            println!(
                "{yellow}   {} left pending for the next run{reset}",
                pass.still_pending.len()
            );
        }
    }
}

pub fn print_status_summary(status: &StoreStatus) {
    println!("books: {}", status.books);
    println!(
        "marc21 records: {} with fields, {} empty ({} field rows)",
        status.marc21_found, status.marc21_empty, status.field_rows
    );
    for kind in &status.kinds {
        println!(
            "{}: {} candidates, {} completed, {} pending",
            kind.kind, kind.candidates, kind.completed, kind.pending
        );
    }
}
