//! Report generator: analysis and session in, section tree out.

use probe_proto::{Analysis, Phase, PhaseLog, Session};
use tracing::debug;

use crate::ReporterError;
use crate::config::{Envelope, ReportConfiguration, SectionKind};
use crate::content::{Block, RenderedSection, Report};
use crate::envelope;
use crate::render::{RenderContext, RendererRegistry, SectionRenderer};

/// Builds reports from whatever artifacts a cycle produced.
///
/// Always produces a document. Missing inputs become notices in the
/// affected sections, and the preamble lists every phase with its state.
pub struct ReportGenerator {
    config: ReportConfiguration,
    registry: RendererRegistry,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(ReportConfiguration::default())
    }
}

impl ReportGenerator {
    pub fn new(config: ReportConfiguration) -> Self {
        Self {
            config,
            registry: RendererRegistry::default(),
        }
    }

    pub fn with_registry(mut self, registry: RendererRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Binds a renderer to a section type, e.g. a custom one.
    pub fn with_renderer(
        mut self,
        kind: SectionKind,
        renderer: impl SectionRenderer + 'static,
    ) -> Self {
        self.registry.register(kind, renderer);
        self
    }

    pub fn config(&self) -> &ReportConfiguration {
        &self.config
    }

    /// Renders every enabled section in configured order.
    pub fn generate(
        &self,
        analysis: Option<&Analysis>,
        session: Option<&Session>,
        phases: &PhaseLog,
    ) -> Report {
        let id = session
            .map(|s| s.id.clone())
            .or_else(|| analysis.map(|a| a.session_id.clone()))
            .unwrap_or_else(|| "unknown-run".to_string());

        let generated_at = analysis
            .map(|a| a.generated_at)
            .or_else(|| session.map(|s| s.finished_at.unwrap_or(s.started_at)));

        let sections = self
            .config
            .enabled_sections()
            .map(|section| {
                let ctx = RenderContext {
                    section,
                    analysis,
                    session,
                    phases,
                };
                let blocks = self.registry.get(&section.kind).render(&ctx);
                debug!(section = %section.kind, blocks = blocks.len(), "section rendered");
                RenderedSection {
                    kind: section.kind.clone(),
                    title: section.heading(),
                    blocks,
                }
            })
            .collect();

        Report {
            id,
            title: self.config.title.clone(),
            generated_at,
            preamble: preamble(phases),
            sections,
            configuration: self.config.clone(),
            phases: phases.clone(),
            analysis: analysis.cloned(),
            session: session.cloned(),
        }
    }

    /// Renders a report through one envelope.
    pub fn render(&self, report: &Report, envelope: Envelope) -> Result<String, ReporterError> {
        envelope::render(report, envelope)
    }
}

/// Phase table plus a notice when the cycle is degraded.
///
/// The first phase that is neither completed nor failed is the one in
/// flight when the report was built.
fn preamble(phases: &PhaseLog) -> Vec<Block> {
    let mut in_flight_marked = false;
    let pairs: Vec<(String, String)> = Phase::ALL
        .into_iter()
        .map(|phase| {
            let state = if phases.is_complete(phase) {
                "completed".to_string()
            } else if let Some((failed, message)) = &phases.failed
                && *failed == phase
            {
                format!("failed: {message}")
            } else if phases.failed.is_none() && !in_flight_marked {
                in_flight_marked = true;
                "in progress".to_string()
            } else {
                "not completed".to_string()
            };
            (phase.as_str().to_string(), state)
        })
        .collect();

    let mut blocks = vec![Block::pairs(pairs)];
    if let Some((phase, message)) = &phases.failed {
        let skipped: Vec<String> = phases
            .incomplete()
            .into_iter()
            .filter(|p| p != phase)
            .map(|p| p.as_str().to_string())
            .collect();
        let mut text = format!("Run degraded: the {phase} phase failed ({message}).");
        if !skipped.is_empty() {
            text.push_str(&format!(" Not completed: {}.", skipped.join(", ")));
        }
        blocks.push(Block::notice(text));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionConfig;

    #[test]
    fn test_preamble_marks_in_flight_phase() {
        let mut phases = PhaseLog::new();
        phases.complete(Phase::Initializing);
        phases.complete(Phase::Executing);
        phases.complete(Phase::Analyzing);

        let blocks = preamble(&phases);
        assert_eq!(blocks.len(), 1);
        let Block::KeyValues { pairs } = &blocks[0] else {
            panic!("expected key values");
        };
        assert_eq!(pairs[2], ("analyzing".to_string(), "completed".to_string()));
        assert_eq!(pairs[3], ("reporting".to_string(), "in progress".to_string()));
    }

    #[test]
    fn test_preamble_marks_failed_and_skipped_phases() {
        let mut phases = PhaseLog::new();
        phases.complete(Phase::Initializing);
        phases.fail(Phase::Executing, "connection refused");

        let blocks = preamble(&phases);
        let Block::KeyValues { pairs } = &blocks[0] else {
            panic!("expected key values");
        };
        assert_eq!(pairs[1].1, "failed: connection refused");
        assert_eq!(pairs[2].1, "not completed");
        assert_eq!(
            blocks[1],
            Block::notice(
                "Run degraded: the executing phase failed (connection refused). \
                 Not completed: analyzing, reporting."
            )
        );
    }

    #[test]
    fn test_generates_without_inputs() {
        let mut config = ReportConfiguration::default();
        config
            .sections
            .push(SectionConfig::new(SectionKind::Custom("heatmap".into())));
        config.toggle(&SectionKind::Charts, false);

        let generator = ReportGenerator::new(config);
        let mut phases = PhaseLog::new();
        phases.fail(Phase::Initializing, "bad config");
        let report = generator.generate(None, None, &phases);

        assert_eq!(report.id, "unknown-run");
        assert!(report.generated_at.is_none());
        assert!(report.is_degraded());
        assert_eq!(report.sections.len(), 6);
        assert!(report.section(&SectionKind::Charts).is_none());
        assert!(
            report
                .section(&SectionKind::Custom("heatmap".into()))
                .is_some()
        );

        for envelope in Envelope::ALL {
            assert!(!generator.render(&report, envelope).unwrap().is_empty());
        }
    }
}
