use crate::core::models::{TaskOutcome, TaskReport};
use colored::*;
use std::path::Path;
use std::time::Instant;

/// Vite-style terminal summary for one pipeline run
pub struct PipelineUI {
    start_time: Instant,
}

impl PipelineUI {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn show_banner(&self) {
        println!(
            "\n  {} {}",
            "SLUICE".bright_cyan().bold(),
            concat!("v", env!("CARGO_PKG_VERSION")).bright_white()
        );
        println!();
    }

    pub fn show_summary(&self, outdir: &Path, outcomes: &[TaskOutcome]) {
        println!();
        for outcome in outcomes {
            match &outcome.result {
                Ok(report) => self.show_report(outdir, report),
                Err(message) => {
                    println!(
                        "  {} {} {}",
                        "✗".bright_red(),
                        outcome.task.name().bright_white(),
                        message.bright_black()
                    );
                }
            }
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        let elapsed = self.start_time.elapsed();

        println!();
        if failed == 0 {
            println!(
                "  {} built in {}",
                "✓".bright_green(),
                format!("{:.0}ms", elapsed.as_secs_f64() * 1000.0).bright_white().bold()
            );
        } else {
            println!(
                "  {} {} task(s) failed after {}",
                "✗".bright_red(),
                failed.to_string().bright_red().bold(),
                format!("{:.0}ms", elapsed.as_secs_f64() * 1000.0).bright_white()
            );
        }
    }

    fn show_report(&self, outdir: &Path, report: &TaskReport) {
        for file in &report.outputs {
            let relative = file
                .path
                .strip_prefix(outdir)
                .unwrap_or(&file.path)
                .display()
                .to_string();

            println!(
                "  {} {} {}",
                format!("{}/", outdir.file_name().and_then(|n| n.to_str()).unwrap_or("dist"))
                    .bright_black(),
                relative.bright_cyan(),
                format!("({})", format_size(file.size)).bright_black()
            );
        }

        if report.skipped > 0 {
            println!(
                "  {} {} unchanged",
                report.task.name().bright_black(),
                report.skipped.to_string().bright_black()
            );
        }
    }
}

impl Default for PipelineUI {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_size(size: usize) -> String {
    let size_kb = size as f64 / 1024.0;
    if size_kb < 1.0 {
        format!("{} B", size)
    } else {
        format!("{:.2} kB", size_kb)
    }
}
