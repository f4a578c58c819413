//! Textual envelopes for a rendered [`Report`].
//!
//! Envelopes escape and wrap; they never compute. Every number a reader
//! sees was formatted by a renderer before reaching this module.

use chrono::{DateTime, Utc};
use probe_proto::{Analysis, PhaseLog, Session};
use serde::{Deserialize, Serialize};

use crate::ReporterError;
use crate::config::{Envelope, ReportConfiguration};
use crate::content::{Block, Report};

/// Machine-readable bundle written by the JSON envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub report_id: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,

    pub configuration: ReportConfiguration,
    pub phases: PhaseLog,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl From<&Report> for Snapshot {
    fn from(report: &Report) -> Self {
        Self {
            report_id: report.id.clone(),
            title: report.title.clone(),
            generated_at: report.generated_at,
            configuration: report.configuration.clone(),
            phases: report.phases.clone(),
            analysis: report.analysis.clone(),
            session: report.session.clone(),
        }
    }
}

/// Parses a JSON envelope back into its snapshot.
pub fn parse_snapshot(json: &str) -> Result<Snapshot, ReporterError> {
    Ok(serde_json::from_str(json)?)
}

/// Renders a report through one envelope.
pub fn render(report: &Report, envelope: Envelope) -> Result<String, ReporterError> {
    match envelope {
        Envelope::Text => Ok(text(report)),
        Envelope::Html => Ok(html(report)),
        Envelope::Markdown => Ok(markdown(report)),
        Envelope::Json => Ok(serde_json::to_string_pretty(&Snapshot::from(report))?),
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, w: usize) -> String {
    let fill = w.saturating_sub(width(s));
    format!("{s}{}", " ".repeat(fill))
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(width(cell));
            }
        }
    }
    widths
}

fn bar_label_width(bars: &[crate::content::Bar]) -> usize {
    bars.iter().map(|b| width(&b.label)).max().unwrap_or(0)
}

fn underline(out: &mut String, text: &str, ch: char) {
    out.push_str(text);
    out.push('\n');
    out.push_str(&ch.to_string().repeat(width(text)));
    out.push('\n');
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

fn text_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading { text } => underline(out, text, '~'),
        Block::Paragraph { text } => {
            out.push_str(text);
            out.push('\n');
        }
        Block::Notice { text } => {
            out.push_str(&format!("! {text}\n"));
        }
        Block::KeyValues { pairs } => {
            let w = pairs.iter().map(|(k, _)| width(k)).max().unwrap_or(0);
            for (key, value) in pairs {
                out.push_str(&format!("  {}  {value}\n", pad(key, w)));
            }
        }
        Block::List { items } => {
            for item in items {
                out.push_str(&format!("  - {item}\n"));
            }
        }
        Block::Table { headers, rows } => {
            let widths = column_widths(headers, rows);
            let line = |cells: &[String]| {
                let padded: Vec<String> = cells
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| pad(c, *w))
                    .collect();
                format!("  {}\n", padded.join("  ").trim_end())
            };
            out.push_str(&line(headers));
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&line(&rule));
            for row in rows {
                out.push_str(&line(row));
            }
        }
        Block::Bars { bars } => {
            let w = bar_label_width(bars);
            for bar in bars {
                out.push_str(&format!("  {}  {}\n", pad(&bar.label, w), bar.render()));
            }
        }
    }
}

fn text(report: &Report) -> String {
    let mut out = String::new();
    underline(&mut out, &report.title, '=');
    out.push_str(&format!("Report: {}\n", report.id));
    if let Some(at) = report.generated_at {
        out.push_str(&format!("Generated: {}\n", at.format("%Y-%m-%dT%H:%M:%SZ")));
    }
    for block in &report.preamble {
        out.push('\n');
        text_block(&mut out, block);
    }
    for section in &report.sections {
        out.push('\n');
        underline(&mut out, &section.title, '-');
        for block in &section.blocks {
            out.push('\n');
            text_block(&mut out, block);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

fn md_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

fn markdown_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading { text } => out.push_str(&format!("### {text}\n")),
        Block::Paragraph { text } => {
            out.push_str(text);
            out.push('\n');
        }
        Block::Notice { text } => out.push_str(&format!("> **Note:** {text}\n")),
        Block::KeyValues { pairs } => {
            for (key, value) in pairs {
                out.push_str(&format!("- **{key}:** {value}\n"));
            }
        }
        Block::List { items } => {
            for item in items {
                out.push_str(&format!("- {item}\n"));
            }
        }
        Block::Table { headers, rows } => {
            let row = |cells: &[String]| {
                let cells: Vec<String> = cells.iter().map(|c| md_cell(c)).collect();
                format!("| {} |\n", cells.join(" | "))
            };
            out.push_str(&row(headers));
            out.push_str(&format!(
                "|{}\n",
                headers.iter().map(|_| "---|").collect::<String>()
            ));
            for r in rows {
                out.push_str(&row(r));
            }
        }
        Block::Bars { bars } => {
            let w = bar_label_width(bars);
            out.push_str("```text\n");
            for bar in bars {
                out.push_str(&format!("{}  {}\n", pad(&bar.label, w), bar.render()));
            }
            out.push_str("```\n");
        }
    }
}

fn markdown(report: &Report) -> String {
    let mut out = format!("# {}\n\n", report.title);
    out.push_str(&format!("**Report:** {}\n", report.id));
    if let Some(at) = report.generated_at {
        out.push_str(&format!(
            "**Generated:** {}\n",
            at.format("%Y-%m-%dT%H:%M:%SZ")
        ));
    }
    for block in &report.preamble {
        out.push('\n');
        markdown_block(&mut out, block);
    }
    for section in &report.sections {
        out.push_str(&format!("\n## {}\n", section.title));
        for block in &section.blocks {
            out.push('\n');
            markdown_block(&mut out, block);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Minimal escaping for text and attribute content.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_block(out: &mut String, block: &Block) {
    match block {
        Block::Heading { text } => out.push_str(&format!("<h3>{}</h3>\n", escape_html(text))),
        Block::Paragraph { text } => out.push_str(&format!("<p>{}</p>\n", escape_html(text))),
        Block::Notice { text } => out.push_str(&format!(
            "<p class=\"notice\"><strong>Note:</strong> {}</p>\n",
            escape_html(text)
        )),
        Block::KeyValues { pairs } => {
            out.push_str("<dl>\n");
            for (key, value) in pairs {
                out.push_str(&format!(
                    "<dt>{}</dt><dd>{}</dd>\n",
                    escape_html(key),
                    escape_html(value)
                ));
            }
            out.push_str("</dl>\n");
        }
        Block::List { items } => {
            out.push_str("<ul>\n");
            for item in items {
                out.push_str(&format!("<li>{}</li>\n", escape_html(item)));
            }
            out.push_str("</ul>\n");
        }
        Block::Table { headers, rows } => {
            out.push_str("<table>\n<tr>");
            for h in headers {
                out.push_str(&format!("<th>{}</th>", escape_html(h)));
            }
            out.push_str("</tr>\n");
            for row in rows {
                out.push_str("<tr>");
                for cell in row {
                    out.push_str(&format!("<td>{}</td>", escape_html(cell)));
                }
                out.push_str("</tr>\n");
            }
            out.push_str("</table>\n");
        }
        Block::Bars { bars } => {
            let w = bar_label_width(bars);
            out.push_str("<pre class=\"bars\">\n");
            for bar in bars {
                out.push_str(&escape_html(&format!(
                    "{}  {}",
                    pad(&bar.label, w),
                    bar.render()
                )));
                out.push('\n');
            }
            out.push_str("</pre>\n");
        }
    }
}

fn html(report: &Report) -> String {
    let title = escape_html(&report.title);
    let mut out = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{title}</title>\n</head>\n<body>\n"));
    out.push_str(&format!("<h1>{title}</h1>\n"));
    out.push_str(&format!(
        "<p class=\"meta\">Report: {}</p>\n",
        escape_html(&report.id)
    ));
    if let Some(at) = report.generated_at {
        out.push_str(&format!(
            "<p class=\"meta\">Generated: {}</p>\n",
            at.format("%Y-%m-%dT%H:%M:%SZ")
        ));
    }
    for block in &report.preamble {
        html_block(&mut out, block);
    }
    for section in &report.sections {
        out.push_str(&format!(
            "<section class=\"{}\">\n<h2>{}</h2>\n",
            escape_html(section.kind.key()),
            escape_html(&section.title)
        ));
        for block in &section.blocks {
            html_block(&mut out, block);
        }
        out.push_str("</section>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}
