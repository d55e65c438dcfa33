//! Terminal output for scan results.

use console::style;

use crate::types::{Report, Verdict};

/// One-line (plus permalink) description of a report.
pub fn report_message(name: &str, report: &Report) -> String {
    match Verdict::from_report(report) {
        Verdict::Unavailable => format!("File {name} not present in the database, upload it manually"),
        Verdict::Clean => format!("File {name} clean, last checked on {} by {} AVs\n{}", report.scan_date, report.total_count, report.permalink),
        Verdict::Suspicious | Verdict::Malicious => format!(
            "File {name} detected by {} out of {} AVs, last checked on {}\n{}",
            report.positive_count, report.total_count, report.scan_date, report.permalink
        ),
    }
}

/// Prints a report, colored by verdict, and returns the verdict.
///
/// Detections get an extra alert line so they stand out in long scans.
pub fn show_report(name: &str, report: &Report) -> Verdict {
    let verdict = Verdict::from_report(report);
    let message = report_message(name, report);

    match verdict {
        Verdict::Unavailable => println!("{}", style(message).blue()),
        Verdict::Clean => println!("{}", style(message).green()),
        Verdict::Suspicious => {
            println!("{} {}", style("⚠").yellow().bold(), style("Possible threat detected").yellow().bold());
            println!("{}", style(message).yellow());
        }
        Verdict::Malicious => {
            println!("{} {}", style("✗").red().bold(), style("Threat detected").red().bold());
            println!("{}", style(message).red());
        }
    }

    verdict
}

pub fn show_info(message: &str) {
    println!("{} {}", style("ℹ").blue(), style(message).blue());
}

pub fn show_success(message: &str) {
    println!("{} {}", style("✓").green(), style(message).bold());
}
