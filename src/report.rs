use crate::export::Summary;
use crate::MergeOutcome;
use colored::Colorize;
use std::fmt::Write;

const MAX_LISTED_DUPLICATES: usize = 10;

/// Console summary of a merge run
pub struct Report<'a> {
    outcome: &'a MergeOutcome,
    summary: Summary,
}

impl<'a> Report<'a> {
    pub fn new(outcome: &'a MergeOutcome) -> Self {
        Self {
            outcome,
            summary: Summary::from_records(&outcome.records),
        }
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Print the report to stdout with colors
    pub fn print(&self) {
        print!("{}", self.render());
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> std::fmt::Result {
        let outcome = self.outcome;

        writeln!(out)?;
        writeln!(out, "{}", "bibmerge Report".bold())?;
        writeln!(out, "{}", "=".repeat(50))?;
        writeln!(out)?;

        writeln!(out, "{}", "FILES".bold())?;
        for file in &outcome.files {
            match &file.error {
                None => writeln!(
                    out,
                    "  {} {} records",
                    file.name.cyan(),
                    file.records.to_string().green()
                )?,
                Some(error) => writeln!(
                    out,
                    "  {} {}",
                    file.name.cyan(),
                    format!("failed: {}", error).red()
                )?,
            }
        }
        for path in &outcome.invalid {
            writeln!(
                out,
                "  {} {}",
                path.display().to_string().dimmed(),
                "skipped (not a non-empty .ris/.txt file)".yellow()
            )?;
        }
        writeln!(out)?;

        writeln!(
            out,
            "Processed: {} records, {} duplicates removed, {} kept",
            outcome.parsed,
            outcome.removed.len().to_string().yellow(),
            outcome.records.len().to_string().green()
        )?;
        if outcome.backfilled > 0 {
            writeln!(
                out,
                "  {} abstracts filled by lookup",
                outcome.backfilled.to_string().green()
            )?;
        }
        writeln!(out)?;

        writeln!(out, "{}", "COVERAGE".bold())?;
        let total = self.summary.total;
        for (label, count) in self.summary.metrics() {
            writeln!(out, "  {:<22} {:>6}{}", label, count, percent(count, total).dimmed())?;
        }
        writeln!(out)?;

        if !outcome.removed.is_empty() {
            writeln!(
                out,
                "{}",
                format!("DUPLICATES ({})", outcome.removed.len()).yellow().bold()
            )?;
            for entry in outcome.removed.iter().take(MAX_LISTED_DUPLICATES) {
                let title = entry.record.title.as_deref().unwrap_or("(no title)");
                writeln!(
                    out,
                    "  {} {} {}",
                    format!("[#{} → #{}]", entry.index, entry.kept_index).dimmed(),
                    truncate(title, 60),
                    entry.reason().dimmed()
                )?;
            }
            if outcome.removed.len() > MAX_LISTED_DUPLICATES {
                writeln!(
                    out,
                    "  {} {} more...",
                    "...".dimmed(),
                    (outcome.removed.len() - MAX_LISTED_DUPLICATES)
                        .to_string()
                        .dimmed()
                )?;
            }
            writeln!(out)?;
        }

        Ok(())
    }
}

fn percent(count: usize, total: usize) -> String {
    if total == 0 {
        String::new()
    } else {
        format!(" ({:.0}%)", count as f64 * 100.0 / total as f64)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", head)
    }
}
