//! Report configuration: which sections render, in what order, and into
//! which envelopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ReporterError;

/// Type of a report section. Each type is bound to one renderer.
///
/// Any name that is not a built-in type deserializes to `Custom`, so an
/// unrecognized section never fails configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionKind {
    Summary,
    Metrics,
    Analysis,
    Recommendations,
    Charts,
    Tables,
    Custom(String),
}

impl SectionKind {
    /// Built-in types in their default order.
    pub const BUILTIN: [SectionKind; 6] = [
        SectionKind::Summary,
        SectionKind::Metrics,
        SectionKind::Analysis,
        SectionKind::Charts,
        SectionKind::Tables,
        SectionKind::Recommendations,
    ];

    /// Registry key.
    pub fn key(&self) -> &str {
        match self {
            SectionKind::Summary => "summary",
            SectionKind::Metrics => "metrics",
            SectionKind::Analysis => "analysis",
            SectionKind::Recommendations => "recommendations",
            SectionKind::Charts => "charts",
            SectionKind::Tables => "tables",
            SectionKind::Custom(name) => name,
        }
    }

    pub fn default_title(&self) -> String {
        match self {
            SectionKind::Summary => "Executive Summary".to_string(),
            SectionKind::Metrics => "Execution Metrics".to_string(),
            SectionKind::Analysis => "Quality Analysis".to_string(),
            SectionKind::Recommendations => "Recommendations".to_string(),
            SectionKind::Charts => "Score Charts".to_string(),
            SectionKind::Tables => "Detailed Results".to_string(),
            SectionKind::Custom(name) => name.clone(),
        }
    }
}

impl From<String> for SectionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "summary" => SectionKind::Summary,
            "metrics" => SectionKind::Metrics,
            "analysis" => SectionKind::Analysis,
            "recommendations" => SectionKind::Recommendations,
            "charts" => SectionKind::Charts,
            "tables" => SectionKind::Tables,
            _ => SectionKind::Custom(value),
        }
    }
}

impl From<SectionKind> for String {
    fn from(kind: SectionKind) -> Self {
        kind.key().to_string()
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn default_enabled() -> bool {
    true
}

/// One entry of the ordered section list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub kind: SectionKind,

    /// Heading override. Defaults to the type's title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SectionConfig {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            title: None,
            enabled: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn heading(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.kind.default_title())
    }
}

/// Textual wrapping of a rendered report. Never changes content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Envelope {
    /// Plain structured text.
    Text,
    /// Tag-substituted hypertext.
    Html,
    Markdown,
    /// Machine-readable snapshot of configuration, analysis and session.
    Json,
}

impl Envelope {
    pub const ALL: [Envelope; 4] = [
        Envelope::Text,
        Envelope::Html,
        Envelope::Markdown,
        Envelope::Json,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            Envelope::Text => "txt",
            Envelope::Html => "html",
            Envelope::Markdown => "md",
            Envelope::Json => "json",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Envelope::Text => "text",
            Envelope::Html => "html",
            Envelope::Markdown => "markdown",
            Envelope::Json => "json",
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Envelope {
    type Err = ReporterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Envelope::Text),
            "html" => Ok(Envelope::Html),
            "markdown" | "md" => Ok(Envelope::Markdown),
            "json" => Ok(Envelope::Json),
            _ => Err(ReporterError::UnknownEnvelope(s.to_string())),
        }
    }
}

fn default_title() -> String {
    "API Quality Report".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".probe/reports")
}

fn default_envelopes() -> Vec<Envelope> {
    vec![Envelope::Text, Envelope::Json]
}

fn default_sections() -> Vec<SectionConfig> {
    SectionKind::BUILTIN
        .into_iter()
        .map(SectionConfig::new)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfiguration {
    #[serde(default = "default_title")]
    pub title: String,

    /// Where artifacts land when written to the filesystem.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_envelopes")]
    pub envelopes: Vec<Envelope>,

    /// Rendered in this order; disabled entries are skipped.
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionConfig>,
}

impl Default for ReportConfiguration {
    fn default() -> Self {
        Self {
            title: default_title(),
            output_dir: default_output_dir(),
            envelopes: default_envelopes(),
            sections: default_sections(),
        }
    }
}

impl ReportConfiguration {
    pub fn enabled_sections(&self) -> impl Iterator<Item = &SectionConfig> {
        self.sections.iter().filter(|s| s.enabled)
    }

    pub fn with_envelopes(mut self, envelopes: impl IntoIterator<Item = Envelope>) -> Self {
        self.envelopes = envelopes.into_iter().collect();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Turns one section type on or off. Unknown types are ignored.
    pub fn toggle(&mut self, kind: &SectionKind, enabled: bool) {
        for section in self.sections.iter_mut().filter(|s| &s.kind == kind) {
            section.enabled = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_becomes_custom() {
        let section: SectionConfig =
            serde_json::from_str(r#"{"kind":"heatmap","title":"Heat"}"#).unwrap();
        assert_eq!(section.kind, SectionKind::Custom("heatmap".into()));
        assert!(section.enabled);
        assert_eq!(section.heading(), "Heat");

        let json = serde_json::to_string(&section).unwrap();
        assert!(json.contains(r#""kind":"heatmap""#));
    }

    #[test]
    fn test_defaults() {
        let config = ReportConfiguration::default();
        assert_eq!(config.sections.len(), 6);
        assert_eq!(config.sections[0].kind, SectionKind::Summary);
        assert_eq!(config.envelopes, vec![Envelope::Text, Envelope::Json]);
    }

    #[test]
    fn test_toggle() {
        let mut config = ReportConfiguration::default();
        config.toggle(&SectionKind::Charts, false);
        assert_eq!(config.enabled_sections().count(), 5);
        assert!(
            config
                .enabled_sections()
                .all(|s| s.kind != SectionKind::Charts)
        );
    }

    #[test]
    fn test_envelope_from_str() {
        assert_eq!("md".parse::<Envelope>().unwrap(), Envelope::Markdown);
        assert_eq!("HTML".parse::<Envelope>().unwrap(), Envelope::Html);
        assert!("pdf".parse::<Envelope>().is_err());
        assert_eq!(Envelope::Markdown.extension(), "md");
    }
}
