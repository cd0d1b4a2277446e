//! Terminal output for sync runs
//!
//! Progress lines and plans go to stdout; logs stay on stderr.

use airgap_core::Category;
use airgap_sync::{PlanEntry, ProgressReporter, Stage, SyncEvent, SyncReport, TracingReporter};
use console::{Style, style};

/// Prints one line per pipeline event
///
/// Every event is also logged through [`TracingReporter`], visible on stderr
/// with `--verbose` or `--debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter {
    log: TracingReporter,
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: &SyncEvent) {
        self.log.report(event);
        if let Some(line) = render_event(event) {
            println!("{}", line);
        }
    }
}

fn category_label(category: Category) -> String {
    let palette = match category {
        Category::Distribution => Style::new().magenta(),
        Category::Chart => Style::new().cyan(),
        Category::Image => Style::new().blue(),
    };
    palette.apply_to(format!("[{}]", category)).bold().to_string()
}

/// Line for `event`, or `None` for events too fine-grained for the terminal
fn render_event(event: &SyncEvent) -> Option<String> {
    let line = match event {
        SyncEvent::PipelineStarted {
            category,
            items,
            dry_run: false,
        } => format!("{} {} item(s) to mirror", category_label(*category), items),
        SyncEvent::PipelineStarted { .. } => return None,
        SyncEvent::LoggedIn { category, registry } => format!(
            "{} {} logged in to {}",
            category_label(*category),
            style("✓").green(),
            registry
        ),
        SyncEvent::StageEntered {
            category,
            item,
            stage: stage @ (Stage::Downloading | Stage::Verifying | Stage::Uploading),
        } => format!(
            "{} {} {}",
            category_label(*category),
            style(stage).dim(),
            item
        ),
        SyncEvent::StageEntered { .. } => return None,
        SyncEvent::ItemCompleted {
            category,
            item,
            position,
            total,
        } => format!(
            "{} {} {} ({}/{})",
            category_label(*category),
            style("✓").green(),
            item,
            position,
            total
        ),
        SyncEvent::Planned(_) => return None,
        SyncEvent::Skipped {
            category,
            remaining,
        } => format!(
            "{} {} cancelled, {} item(s) skipped",
            category_label(*category),
            style("⚠").yellow(),
            remaining
        ),
        SyncEvent::PipelineFinished {
            category,
            succeeded: true,
            ..
        } => format!("{} {} done", category_label(*category), style("✓").green()),
        SyncEvent::PipelineFinished {
            category, error, ..
        } => format!(
            "{} {} {}",
            category_label(*category),
            style("✗").red(),
            error.as_deref().unwrap_or("failed")
        ),
    };
    Some(line)
}

/// Print what a dry run would do, grouped by category
pub fn print_plan(report: &SyncReport) {
    println!("{}", style("Dry run: nothing was downloaded or uploaded").bold());
    for category in Category::ALL {
        let entries = report.plan(category);
        println!();
        println!("{} {} item(s)", category_label(category), entries.len());
        for entry in entries {
            println!("  {}", plan_line(entry));
        }
    }
}

fn plan_line(entry: &PlanEntry) -> String {
    format!(
        "{} {}: {} {} {}",
        entry.item,
        entry.version,
        entry.source,
        style("->").dim(),
        entry.target
    )
}

pub fn print_summary(report: &SyncReport) {
    println!();
    println!(
        "{} mirrored {} artifact(s)",
        style("✓").green().bold(),
        report.completed()
    );
}
