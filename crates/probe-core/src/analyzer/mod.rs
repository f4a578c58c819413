//! Data analyzer.
//!
//! Turns a finalized [`Session`] (plus flow results and prior sessions) into
//! an [`Analysis`]: one [`Insight`] per dimension, a composite score, trends,
//! risk, recommendations and an action plan.
//!
//! Usability, security and failure-pattern scoring sit behind traits so the
//! shipped heuristics can be replaced without touching this module.

mod action_plan;
mod performance;
mod quality;
mod recommend;
mod reliability;
mod risk;
mod rubric;
mod trend;

pub use action_plan::horizon_for;
pub use performance::{
    HIGH_VARIABILITY, VARIABILITY_FACTOR, error_rate_score, response_time_score, throughput_score,
};
pub use recommend::{priority_for, threshold};
pub use reliability::{CannedPatterns, ErrorBreakdown, ErrorCategory, PatternDetector, categorize};
pub use risk::{FACTORS as RISK_FACTORS, probability};
pub use rubric::{
    HeuristicSecurity, HeuristicUsability, SecurityRubric, SecurityScores, UsabilityRubric,
    UsabilityScores,
};
pub use trend::{ScoreCard, TREND_THRESHOLD, direction};

use chrono::Utc;
use probe_proto::{
    Analysis, CompositeStrategy, Dimension, FlowDigest, FlowResult, Insight, Session, grade,
};
use thiserror::Error;
use tracing::{debug, info};

/// Prior sessions considered for trends by default.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("session {0} has not finished executing")]
    SessionNotFinalized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// How per-dimension scores and risks are combined.
    pub strategy: CompositeStrategy,

    /// Most recent prior sessions used for trends.
    pub history_window: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            strategy: CompositeStrategy::Mean,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

pub struct DataAnalyzer {
    config: AnalyzerConfig,
    usability: Box<dyn UsabilityRubric>,
    security: Box<dyn SecurityRubric>,
    patterns: Box<dyn PatternDetector>,
}

impl Default for DataAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl DataAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            usability: Box::new(HeuristicUsability),
            security: Box::new(HeuristicSecurity),
            patterns: Box::new(CannedPatterns),
        }
    }

    pub fn with_usability_rubric(mut self, rubric: Box<dyn UsabilityRubric>) -> Self {
        self.usability = rubric;
        self
    }

    pub fn with_security_rubric(mut self, rubric: Box<dyn SecurityRubric>) -> Self {
        self.security = rubric;
        self
    }

    pub fn with_pattern_detector(mut self, detector: Box<dyn PatternDetector>) -> Self {
        self.patterns = detector;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// One insight per dimension, in [`Dimension::ALL`] order.
    pub fn insights(&self, session: &Session) -> Vec<Insight> {
        vec![
            performance::analyze(session),
            quality::analyze(session),
            reliability::analyze(session, self.patterns.as_ref()),
            rubric::usability_insight(session, self.usability.as_ref()),
            rubric::security_insight(session, self.security.as_ref()),
        ]
    }

    fn card(&self, insights: &[Insight]) -> ScoreCard {
        let scores: Vec<f64> = insights.iter().map(|i| i.score).collect();
        ScoreCard {
            dimensions: insights.iter().map(|i| (i.dimension, i.score)).collect(),
            overall: self.config.strategy.combine_scores(&scores),
        }
    }

    /// Scores a session without trends, risk or recommendations.
    pub fn score_card(&self, session: &Session) -> ScoreCard {
        self.card(&self.insights(session))
    }

    /// Full analysis of a finalized session.
    ///
    /// `history` is oldest first; only the last `history_window` finalized
    /// sessions other than `session` itself are used.
    pub fn analyze(
        &self,
        session: &Session,
        flows: &[FlowResult],
        history: &[Session],
    ) -> Result<Analysis, AnalyzerError> {
        if !session.is_finalized() {
            return Err(AnalyzerError::SessionNotFinalized(session.id.clone()));
        }

        let insights = self.insights(session);
        let current = self.card(&insights);

        let prior: Vec<&Session> = history
            .iter()
            .filter(|s| s.id != session.id && s.is_finalized())
            .collect();
        let window = &prior[prior.len().saturating_sub(self.config.history_window)..];
        let history_cards: Vec<ScoreCard> = window.iter().map(|s| self.score_card(s)).collect();
        let trends = trend::analyze(&history_cards, &current);

        let flows: Vec<FlowDigest> = flows
            .iter()
            .map(|f| FlowDigest {
                flow: f.flow.clone(),
                passed: f.passed(),
                steps_passed: f.passed_steps(),
                steps_total: f.steps.len(),
                total_ms: f.total_ms,
                within_budget: f.within_budget,
                issues: f.issues.clone(),
            })
            .collect();

        let risk = risk::assess(&insights, self.config.strategy);
        let recommendations = recommend::recommend(&insights, &flows);
        let generated_at = Utc::now();
        let action_plan = action_plan::plan(&recommendations, generated_at);

        for insight in &insights {
            debug!(
                dimension = %insight.dimension,
                score = insight.score,
                grade = %insight.grade,
                "dimension scored"
            );
        }

        let overall_score = current.overall;
        let analysis = Analysis {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            generated_at,
            insights,
            overall_score,
            overall_grade: grade(overall_score),
            strategy: self.config.strategy,
            trends,
            risk,
            recommendations,
            action_plan,
            flows,
        };

        info!(
            session = %session.id,
            overall = analysis.overall_score,
            grade = %analysis.overall_grade,
            risk = %analysis.risk.level,
            recommendations = analysis.recommendations.len(),
            "analysis complete"
        );
        Ok(analysis)
    }
}

/// Score for one dimension from a list of insights.
pub fn dimension_score(insights: &[Insight], dimension: Dimension) -> Option<f64> {
    insights
        .iter()
        .find(|i| i.dimension == dimension)
        .map(|i| i.score)
}
