use crate::config::FeedConfig;
use crate::feed::FeedHandler;
use crate::model::Report;
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Compromised Versions")]
    compromised: String,
}

#[derive(Tabled)]
struct FeedRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Handler")]
    handler: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Renders the findings table and summary as plain text.
pub fn render_findings_table(report: &Report) -> String {
    render(report, false)
}

fn render(report: &Report, color: bool) -> String {
    let mut out = String::new();

    if report.has_findings {
        let heading = format!("Found {} compromised package(s):", report.totals.findings);
        if color {
            out.push_str(&format!("\x1b[31m{}\x1b[0m\n\n", heading));
        } else {
            out.push_str(&format!("{}\n\n", heading));
        }

        let rows: Vec<FindingRow> = report
            .findings()
            .map(|(project, f)| FindingRow {
                project: project.to_string(),
                package: f.package.clone(),
                installed: f.installed.clone(),
                compromised: truncate(&f.compromised.join(", "), 50),
            })
            .collect();

        out.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        out.push('\n');
    } else {
        out.push_str("No compromised packages found.\n");
    }

    out.push_str(&format!(
        "\nSummary:\n  Projects scanned: {}\n  Findings: {}\n",
        report.totals.projects, report.totals.findings
    ));
    out
}

pub fn print_cli_table(report: &Report) -> Result<()> {
    println!();
    print!("{}", render(report, true));
    Ok(())
}

/// Renders configured feeds, flagging handlers that are not registered.
pub fn render_feed_table(feeds: &[FeedConfig]) -> String {
    let rows: Vec<FeedRow> = feeds
        .iter()
        .map(|f| FeedRow {
            id: f.id.clone(),
            handler: match FeedHandler::lookup(&f.handler) {
                Ok(handler) => handler.display_name().to_string(),
                Err(_) => format!("{} (unknown)", f.handler),
            },
            enabled: if f.enabled { "yes" } else { "no" }.to_string(),
            url: truncate(&f.url, 60),
            description: if f.description.is_empty() {
                "-".to_string()
            } else {
                truncate(&f.description, 40)
            },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_feed_table(feeds: &[FeedConfig]) {
    println!("{}", render_feed_table(feeds));
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::aggregate;
    use crate::model::{Finding, ProjectReport};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_render_clean_report() {
        let report = aggregate(vec![ProjectReport {
            path: ".".to_string(),
            findings: Vec::new(),
        }]);

        let text = render_findings_table(&report);
        assert!(text.contains("No compromised packages found."));
        assert!(text.contains("Projects scanned: 1"));
    }

    #[test]
    fn test_render_findings() {
        let report = aggregate(vec![ProjectReport {
            path: "apps/web".to_string(),
            findings: vec![Finding {
                package: "left-pad".to_string(),
                installed: "1.0.0".to_string(),
                compromised: vec!["1.0.0".to_string(), "1.0.1".to_string()],
            }],
        }]);

        let text = render_findings_table(&report);
        assert!(text.contains("Found 1 compromised package(s):"));
        assert!(!text.contains('\x1b'));
        assert!(render(&report, true).contains("\x1b[31m"));
        assert!(text.contains("apps/web"));
        assert!(text.contains("left-pad"));
        assert!(text.contains("1.0.0, 1.0.1"));
        assert!(text.contains("Findings: 1"));
    }

    #[test]
    fn test_render_feed_table_flags_unknown_handler() {
        let feeds = vec![FeedConfig {
            id: "mirror".to_string(),
            url: "https://mirror.test".to_string(),
            enabled: false,
            description: String::new(),
            handler: "gone".to_string(),
        }];

        let text = render_feed_table(&feeds);
        assert!(text.contains("gone (unknown)"));
        assert!(text.contains("no"));
    }
}
