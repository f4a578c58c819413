//! Section renderers and their registry.

use std::collections::HashMap;

use probe_proto::{
    ActionHorizon, Analysis, CaseStatus, Dimension, Grade, PhaseLog, Session, grade,
};

use crate::config::{SectionConfig, SectionKind};
use crate::content::{Bar, Block};

/// Inputs visible to a renderer. Either artifact may be missing when a
/// phase did not complete.
pub struct RenderContext<'a> {
    pub section: &'a SectionConfig,
    pub analysis: Option<&'a Analysis>,
    pub session: Option<&'a Session>,
    pub phases: &'a PhaseLog,
}

/// Renders one section type into blocks.
pub trait SectionRenderer: Send + Sync {
    fn render(&self, ctx: &RenderContext<'_>) -> Vec<Block>;
}

const NO_SESSION: &str = "No session data: the execution phase did not complete.";
const NO_ANALYSIS: &str = "No analysis: the analysis phase did not complete.";

fn pct(value: f64) -> String {
    format!("{value:.1}%")
}

fn ms(value: f64) -> String {
    format!("{value:.1} ms")
}

fn score(value: f64) -> String {
    format!("{value:.1} ({})", grade(value))
}

pub struct SummaryRenderer;

impl SectionRenderer for SummaryRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> Vec<Block> {
        let mut blocks = Vec::new();
        match ctx.session {
            Some(session) => {
                let r = &session.results;
                blocks.push(Block::pairs([
                    ("Session", session.id.clone()),
                    ("Environment", session.environment.name.clone()),
                    ("Base URL", session.environment.base_url.clone()),
                    ("Status", session.status.to_string()),
                    ("Cases", format!("{} ({} executed)", r.total, r.executed())),
                    ("Pass rate", pct(r.pass_rate)),
                    ("Error rate", pct(r.error_rate)),
                    ("Critical issues", session.critical_issues.len().to_string()),
                    ("Duration", ms(r.elapsed_ms)),
                ]));
            }
            None => blocks.push(Block::notice(NO_SESSION)),
        }

        match ctx.analysis {
            Some(analysis) => {
                blocks.push(Block::pairs([
                    ("Overall score", score(analysis.overall_score)),
                    ("Composite strategy", analysis.strategy.as_str().to_string()),
                    ("Risk level", analysis.risk.level.to_string()),
                    ("Recommendations", analysis.recommendations.len().to_string()),
                ]));
                let critical: Vec<String> = analysis
                    .insights
                    .iter()
                    .filter(|i| grade(i.score) == Grade::F)
                    .map(|i| format!("{} is failing at {:.1}", i.dimension.title(), i.score))
                    .collect();
                if !critical.is_empty() {
                    blocks.push(Block::list(critical));
                }
            }
            None => blocks.push(Block::notice(NO_ANALYSIS)),
        }
        blocks
    }
}

pub struct MetricsRenderer;

impl SectionRenderer for MetricsRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> Vec<Block> {
        let Some(session) = ctx.session else {
            return vec![Block::notice(NO_SESSION)];
        };

        let latency = &session.results.latency;
        let mut blocks = vec![Block::pairs([
            ("Min", ms(latency.min_ms)),
            ("Avg", ms(latency.avg_ms)),
            ("p50", ms(latency.p50_ms)),
            ("p95", ms(latency.p95_ms)),
            ("p99", ms(latency.p99_ms)),
            ("Max", ms(latency.max_ms)),
            ("Throughput", format!("{:.2} req/s", session.results.throughput_rps)),
        ])];

        let rows: Vec<Vec<String>> = session
            .suites_in_order()
            .map(|s| {
                let m = &s.metrics;
                vec![
                    s.name.clone(),
                    s.priority.to_string(),
                    m.total.to_string(),
                    m.passed.to_string(),
                    m.failed.to_string(),
                    m.errored.to_string(),
                    m.skipped.to_string(),
                    pct(m.error_rate),
                    format!("{:.1}", m.latency.avg_ms),
                    format!("{:.1}", m.latency.p95_ms),
                ]
            })
            .collect();
        blocks.push(Block::table(
            &[
                "Suite", "Priority", "Total", "Passed", "Failed", "Errors", "Skipped", "Error rate",
                "Avg ms", "p95 ms",
            ],
            rows,
        ));

        let load: Vec<Vec<String>> = session
            .suites_in_order()
            .filter_map(|s| s.load_result.as_ref().map(|l| (s, l)))
            .map(|(s, l)| {
                vec![
                    s.name.clone(),
                    l.dispatched.to_string(),
                    l.succeeded.to_string(),
                    l.failed.to_string(),
                    format!("{:.2}", l.requests_per_second),
                    format!("{:.1}", l.latency.p95_ms),
                    l.concurrency_cap
                        .map_or_else(|| "none".to_string(), |c| c.to_string()),
                ]
            })
            .collect();
        if !load.is_empty() {
            blocks.push(Block::heading("Load bursts"));
            blocks.push(Block::table(
                &["Suite", "Dispatched", "Succeeded", "Failed", "Req/s", "p95 ms", "Cap"],
                load,
            ));
        }
        blocks
    }
}

pub struct AnalysisRenderer;

impl SectionRenderer for AnalysisRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> Vec<Block> {
        let Some(analysis) = ctx.analysis else {
            return vec![Block::notice(NO_ANALYSIS)];
        };

        let mut blocks = Vec::new();
        for insight in &analysis.insights {
            blocks.push(Block::heading(format!(
                "{}: {}",
                insight.dimension.title(),
                score(insight.score)
            )));
            let notes: Vec<String> = insight
                .strengths
                .iter()
                .map(|s| format!("+ {s}"))
                .chain(insight.weaknesses.iter().map(|w| format!("- {w}")))
                .chain(insight.observations.iter().map(|o| format!("* {o}")))
                .collect();
            if !notes.is_empty() {
                blocks.push(Block::list(notes));
            }
        }

        blocks.push(Block::heading("Trends"));
        match &analysis.trends {
            Some(trends) => {
                let mut rows: Vec<Vec<String>> = trends
                    .dimensions
                    .iter()
                    .map(|t| {
                        vec![
                            t.dimension.title().to_string(),
                            format!("{:.1}", t.baseline),
                            format!("{:.1}", t.current),
                            format!("{:+.1}", t.delta),
                            t.direction.as_str().to_string(),
                        ]
                    })
                    .collect();
                rows.push(vec![
                    "Overall".to_string(),
                    format!("{:.1}", trends.overall.baseline),
                    format!("{:.1}", trends.overall.current),
                    format!("{:+.1}", trends.overall.delta),
                    trends.overall.direction.as_str().to_string(),
                ]);
                blocks.push(Block::paragraph(format!(
                    "{} sessions compared ({}).",
                    trends.sessions_considered, trends.method
                )));
                blocks.push(Block::table(
                    &["Dimension", "Baseline", "Current", "Delta", "Direction"],
                    rows,
                ));
            }
            None => blocks.push(Block::paragraph("No prior sessions to compare against.")),
        }

        blocks.push(Block::heading(format!(
            "Risk: {} ({:.1})",
            analysis.risk.level, analysis.risk.overall_score
        )));
        blocks.push(Block::table(
            &["Factor", "Category", "Source", "Probability", "Impact", "Score"],
            analysis
                .risk
                .factors
                .iter()
                .map(|f| {
                    vec![
                        f.name.clone(),
                        f.category.as_str().to_string(),
                        f.source.as_str().to_string(),
                        format!("{:.2}", f.probability),
                        format!("{:.0}", f.impact),
                        format!("{:.1}", f.score),
                    ]
                })
                .collect(),
        ));
        blocks
    }
}

pub struct RecommendationsRenderer;

impl SectionRenderer for RecommendationsRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> Vec<Block> {
        let Some(analysis) = ctx.analysis else {
            return vec![Block::notice(NO_ANALYSIS)];
        };
        if analysis.recommendations.is_empty() {
            return vec![Block::paragraph("No recommendations: every dimension meets its target.")];
        }

        let mut blocks = Vec::new();
        for rec in &analysis.recommendations {
            blocks.push(Block::heading(format!(
                "[{}] {} ({})",
                rec.priority.as_str().to_uppercase(),
                rec.title,
                rec.id
            )));
            blocks.push(Block::paragraph(rec.description.clone()));
            blocks.push(Block::pairs([
                ("Category", rec.category.to_string()),
                ("Effort", rec.effort.as_str().to_string()),
                ("Timeline", rec.timeline.clone()),
                (
                    "Expected",
                    format!(
                        "{} {:.1} -> {:.1}",
                        rec.estimate.metric, rec.estimate.before, rec.estimate.after
                    ),
                ),
            ]));
            blocks.push(Block::list(
                rec.steps
                    .iter()
                    .enumerate()
                    .map(|(n, s)| format!("{}. {s}", n + 1)),
            ));
        }

        blocks.push(Block::heading("Action plan"));
        for horizon in [
            ActionHorizon::Immediate,
            ActionHorizon::ShortTerm,
            ActionHorizon::LongTerm,
        ] {
            let items = analysis.action_plan.bucket(horizon);
            if items.is_empty() {
                continue;
            }
            blocks.push(Block::paragraph(format!(
                "{} ({} days)",
                horizon.title(),
                horizon.days()
            )));
            blocks.push(Block::list(items.iter().map(|item| {
                format!(
                    "{} by {}: {}",
                    item.title,
                    item.deadline.format("%Y-%m-%d"),
                    item.success_criteria.join("; ")
                )
            })));
        }
        blocks
    }
}

pub struct ChartsRenderer;

impl SectionRenderer for ChartsRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> Vec<Block> {
        let Some(analysis) = ctx.analysis else {
            return vec![Block::notice(NO_ANALYSIS)];
        };

        let mut bars: Vec<Bar> = Dimension::ALL
            .into_iter()
            .filter_map(|d| analysis.score(d).map(|s| Bar::new(d.title(), s)))
            .collect();
        bars.push(Bar::new("Overall", analysis.overall_score));
        let mut blocks = vec![Block::Bars { bars }];

        if let Some(session) = ctx.session {
            let suites: Vec<Bar> = session
                .suites_in_order()
                .filter(|s| s.metrics.executed() > 0)
                .map(|s| Bar::new(s.name.clone(), s.metrics.pass_rate))
                .collect();
            if !suites.is_empty() {
                blocks.push(Block::heading("Pass rate by suite"));
                blocks.push(Block::Bars { bars: suites });
            }
        }
        blocks
    }
}

pub struct TablesRenderer;

impl SectionRenderer for TablesRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> Vec<Block> {
        let mut blocks = Vec::new();

        match ctx.session {
            Some(session) => {
                let rows: Vec<Vec<String>> = session
                    .suites_in_order()
                    .flat_map(|suite| {
                        suite.cases.iter().map(move |case| {
                            let detail = match case.status {
                                CaseStatus::Error => case
                                    .transport_error
                                    .as_ref()
                                    .map(|e| e.to_string())
                                    .unwrap_or_default(),
                                CaseStatus::Failed => case
                                    .validation
                                    .as_ref()
                                    .map(|v| v.error_summary())
                                    .unwrap_or_default(),
                                _ => String::new(),
                            };
                            vec![
                                suite.name.clone(),
                                case.id.clone(),
                                case.route(),
                                case.status.as_str().to_string(),
                                case.response
                                    .as_ref()
                                    .map_or_else(|| "-".to_string(), |r| r.status.to_string()),
                                case.duration_ms
                                    .map_or_else(|| "-".to_string(), |d| format!("{d:.1}")),
                                case.attempts.to_string(),
                                detail,
                            ]
                        })
                    })
                    .collect();
                blocks.push(Block::table(
                    &["Suite", "Case", "Route", "Status", "HTTP", "ms", "Attempts", "Detail"],
                    rows,
                ));

                if !session.critical_issues.is_empty() {
                    blocks.push(Block::heading("Critical issues"));
                    blocks.push(Block::table(
                        &["Kind", "Source", "Message"],
                        session
                            .critical_issues
                            .iter()
                            .map(|i| {
                                vec![
                                    i.kind.as_str().to_string(),
                                    i.source.clone(),
                                    i.message.clone(),
                                ]
                            })
                            .collect(),
                    ));
                }
            }
            None => blocks.push(Block::notice(NO_SESSION)),
        }

        if let Some(analysis) = ctx.analysis
            && !analysis.flows.is_empty()
        {
            blocks.push(Block::heading("Flows"));
            blocks.push(Block::table(
                &["Flow", "Result", "Steps", "ms", "Budget", "Issues"],
                analysis
                    .flows
                    .iter()
                    .map(|f| {
                        vec![
                            f.flow.clone(),
                            if f.passed { "passed" } else { "failed" }.to_string(),
                            format!("{}/{}", f.steps_passed, f.steps_total),
                            format!("{:.1}", f.total_ms),
                            if f.within_budget { "ok" } else { "over" }.to_string(),
                            f.issues.len().to_string(),
                        ]
                    })
                    .collect(),
            ));
        }
        blocks
    }
}

/// Fallback for section types without a registered renderer.
pub struct PlaceholderRenderer;

impl SectionRenderer for PlaceholderRenderer {
    fn render(&self, ctx: &RenderContext<'_>) -> Vec<Block> {
        vec![Block::notice(format!(
            "No renderer is registered for section type '{}'.",
            ctx.section.kind
        ))]
    }
}

/// Maps section types to renderers.
pub struct RendererRegistry {
    renderers: HashMap<String, Box<dyn SectionRenderer>>,
    fallback: Box<dyn SectionRenderer>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SectionKind::Summary, SummaryRenderer);
        registry.register(SectionKind::Metrics, MetricsRenderer);
        registry.register(SectionKind::Analysis, AnalysisRenderer);
        registry.register(SectionKind::Recommendations, RecommendationsRenderer);
        registry.register(SectionKind::Charts, ChartsRenderer);
        registry.register(SectionKind::Tables, TablesRenderer);
        registry
    }
}

impl RendererRegistry {
    /// A registry where every section falls back to the placeholder.
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
            fallback: Box::new(PlaceholderRenderer),
        }
    }

    /// Binds a renderer to a section type, replacing any previous one.
    pub fn register(&mut self, kind: SectionKind, renderer: impl SectionRenderer + 'static) {
        self.renderers
            .insert(kind.key().to_string(), Box::new(renderer));
    }

    pub fn contains(&self, kind: &SectionKind) -> bool {
        self.renderers.contains_key(kind.key())
    }

    /// Never fails: unknown types get the placeholder.
    pub fn get(&self, kind: &SectionKind) -> &dyn SectionRenderer {
        self.renderers
            .get(kind.key())
            .map_or(self.fallback.as_ref(), |r| r.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(section: &'a SectionConfig, phases: &'a PhaseLog) -> RenderContext<'a> {
        RenderContext {
            section,
            analysis: None,
            session: None,
            phases,
        }
    }

    #[test]
    fn test_default_registry_covers_builtins() {
        let registry = RendererRegistry::default();
        for kind in SectionKind::BUILTIN {
            assert!(registry.contains(&kind));
        }
        assert!(!registry.contains(&SectionKind::Custom("heatmap".into())));
    }

    #[test]
    fn test_unknown_section_uses_placeholder() {
        let registry = RendererRegistry::default();
        let section = SectionConfig::new(SectionKind::Custom("heatmap".into()));
        let phases = PhaseLog::new();
        let blocks = registry.get(&section.kind).render(&ctx(&section, &phases));
        assert_eq!(
            blocks,
            vec![Block::notice(
                "No renderer is registered for section type 'heatmap'."
            )]
        );
    }

    #[test]
    fn test_missing_inputs_render_notices() {
        let registry = RendererRegistry::default();
        let phases = PhaseLog::new();
        for kind in SectionKind::BUILTIN {
            let section = SectionConfig::new(kind);
            let blocks = registry.get(&section.kind).render(&ctx(&section, &phases));
            assert!(
                blocks.iter().any(|b| matches!(b, Block::Notice { .. })),
                "{} rendered no notice",
                section.kind
            );
        }
    }

    #[test]
    fn test_custom_renderer_replaces_builtin() {
        struct Fixed;
        impl SectionRenderer for Fixed {
            fn render(&self, _ctx: &RenderContext<'_>) -> Vec<Block> {
                vec![Block::paragraph("fixed")]
            }
        }

        let mut registry = RendererRegistry::default();
        registry.register(SectionKind::Summary, Fixed);
        let section = SectionConfig::new(SectionKind::Summary);
        let phases = PhaseLog::new();
        let blocks = registry.get(&section.kind).render(&ctx(&section, &phases));
        assert_eq!(blocks, vec![Block::paragraph("fixed")]);
    }
}
