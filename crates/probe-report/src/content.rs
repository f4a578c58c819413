//! Envelope-neutral report content.
//!
//! Renderers produce [`Block`]s; envelopes only decide how blocks are
//! escaped and wrapped. Two envelopes given the same [`Report`] always
//! carry the same words and numbers.

use chrono::{DateTime, Utc};
use probe_proto::{Analysis, Grade, PhaseLog, Session, grade};
use serde::{Deserialize, Serialize};

use crate::config::{ReportConfiguration, SectionKind};

/// Slots in a score bar.
pub const BAR_WIDTH: usize = 20;

/// Fixed-width bar, filled in proportion to `score / 100`.
///
/// ```
/// use probe_report::ascii_bar;
/// assert_eq!(ascii_bar(50.0), "[##########----------]");
/// ```
pub fn ascii_bar(score: f64) -> String {
    let ratio = if score.is_finite() {
        (score / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

/// One labelled score bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub label: String,
    pub score: f64,
    pub grade: Grade,
}

impl Bar {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
            grade: grade(score),
        }
    }

    pub fn render(&self) -> String {
        format!("{} {:>5.1} {}", ascii_bar(self.score), self.score, self.grade)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum Block {
    Heading { text: String },
    Paragraph { text: String },
    /// Highlighted statement, e.g. a phase that did not complete.
    Notice { text: String },
    KeyValues { pairs: Vec<(String, String)> },
    List { items: Vec<String> },
    Table { headers: Vec<String>, rows: Vec<Vec<String>> },
    Bars { bars: Vec<Bar> },
}

impl Block {
    pub fn heading(text: impl Into<String>) -> Self {
        Block::Heading { text: text.into() }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Block::Notice { text: text.into() }
    }

    pub fn list(items: impl IntoIterator<Item = String>) -> Self {
        Block::List {
            items: items.into_iter().collect(),
        }
    }

    pub fn pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Block::KeyValues {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn table(headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Block::Table {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedSection {
    pub kind: SectionKind,
    pub title: String,
    pub blocks: Vec<Block>,
}

/// A rendered report and the artifacts it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Run identifier used for artifact names.
    pub id: String,
    pub title: String,

    /// Taken from the inputs, never the wall clock, so output is reproducible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,

    /// Phase status block shown ahead of every section.
    pub preamble: Vec<Block>,

    pub sections: Vec<RenderedSection>,

    pub configuration: ReportConfiguration,
    pub phases: PhaseLog,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl Report {
    pub fn section(&self, kind: &SectionKind) -> Option<&RenderedSection> {
        self.sections.iter().find(|s| &s.kind == kind)
    }

    /// True when a phase failed before the report was built.
    pub fn is_degraded(&self) -> bool {
        self.phases.failed.is_some()
    }
}
