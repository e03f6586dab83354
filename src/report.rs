//! Human and JSON rendering of a [`Solution`], and of the conflicts the
//! resolver can fail with.

use colored::Colorize;
use serde::Serialize;

use crate::core::error::RverseError;
use crate::package::Source;
use crate::solution::Solution;

#[derive(Debug, Serialize)]
struct PackageReportEntry {
    name: String,
    source: String,
    version: String,
    depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DowngradeReportEntry {
    name: String,
    from: String,
    to: String,
    reason: String,
}

/// The §6 JSON report shape: `{ r_version, packages, downgrades, conflicts }`.
#[derive(Debug, Serialize)]
struct JsonReport {
    r_version: String,
    packages: Vec<PackageReportEntry>,
    downgrades: Vec<DowngradeReportEntry>,
    conflicts: Vec<String>,
}

fn source_label(source: Source) -> &'static str {
    match source {
        Source::Cran => "cran",
        Source::Bioc => "bioc",
        Source::Github => "github",
    }
}

fn packages_sorted(solution: &Solution) -> Vec<&str> {
    let mut names: Vec<&str> = solution.assignment.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

/// Render `solution` as the documented JSON report shape.
pub fn render_json(solution: &Solution) -> Result<String, RverseError> {
    let packages = packages_sorted(solution)
        .into_iter()
        .map(|name| {
            let candidate = &solution.assignment[name];
            PackageReportEntry {
                name: name.to_string(),
                source: source_label(candidate.package_ref.source).to_string(),
                version: candidate.version.to_string(),
                depends_on: solution.depends_on(name),
            }
        })
        .collect();

    let downgrades = solution
        .downgrades
        .iter()
        .map(|d| DowngradeReportEntry {
            name: d.name.clone(),
            from: d.from.to_string(),
            to: d.to.to_string(),
            reason: d.reason.clone(),
        })
        .collect();

    let report = JsonReport {
        r_version: solution.r_version.to_string(),
        packages,
        downgrades,
        conflicts: Vec::new(),
    };
    serde_json::to_string_pretty(&report).map_err(RverseError::from)
}

/// Render `solution` as the colored, tree-shaped human report.
pub fn render_human(solution: &Solution) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        "R version:".bold(),
        solution.r_version.to_string().cyan()
    ));
    out.push_str(&format!(
        "{} {} cran, {} bioc, {} github\n\n",
        "Packages:".bold(),
        solution.source_summary.cran,
        solution.source_summary.bioc,
        solution.source_summary.github
    ));

    for name in packages_sorted(solution) {
        let candidate = &solution.assignment[name];
        out.push_str(&format!(
            "  {} {} {} ({})\n",
            name.green(),
            candidate.version,
            "-".dimmed(),
            source_label(candidate.package_ref.source)
        ));
        for dep in solution.depends_on(name) {
            out.push_str(&format!("    {} {}\n", "depends on".dimmed(), dep));
        }
    }

    if !solution.downgrades.is_empty() {
        out.push_str(&format!("\n{}\n", "R version changes:".yellow().bold()));
        for d in &solution.downgrades {
            out.push_str(&format!(
                "  {}: {} -> {} ({})\n",
                d.name, d.from, d.to, d.reason
            ));
        }
    }

    out
}

/// Render a top-level failure the way the CLI prints it before exiting.
pub fn render_error_human(error: &RverseError) -> String {
    format!("{}: {}", "resolution failed".red().bold(), error)
}
