//! # probe-report
//!
//! Report generation for the Probe pipeline.
//!
//! A [`ReportGenerator`] turns an `Analysis` and its `Session` into a
//! [`Report`]: an ordered list of sections, each produced by the
//! [`SectionRenderer`] registered for its [`SectionKind`]. The same report
//! can then be emitted through any [`Envelope`] (text, html, markdown, json)
//! and handed to an [`ArtifactSink`] by the [`ReportWriter`].
//!
//! ```
//! use probe_proto::PhaseLog;
//! use probe_report::{Envelope, ReportGenerator};
//!
//! let generator = ReportGenerator::default();
//! let report = generator.generate(None, None, &PhaseLog::new());
//! let text = generator.render(&report, Envelope::Text).unwrap();
//! assert!(text.contains("did not complete"));
//! ```

mod config;
mod content;
mod envelope;
mod generator;
mod render;
mod terminal;
mod writer;

pub use config::{Envelope, ReportConfiguration, SectionConfig, SectionKind};
pub use content::{BAR_WIDTH, Bar, Block, RenderedSection, Report, ascii_bar};
pub use envelope::{Snapshot, escape_html, parse_snapshot};
pub use generator::ReportGenerator;
pub use render::{
    AnalysisRenderer, ChartsRenderer, MetricsRenderer, PlaceholderRenderer,
    RecommendationsRenderer, RenderContext, RendererRegistry, SectionRenderer, SummaryRenderer,
    TablesRenderer,
};
pub use terminal::{TerminalReporter, Verbosity};
pub use writer::{ArtifactSink, FsSink, MemorySink, ReportWriter, ReporterError, artifact_name};
