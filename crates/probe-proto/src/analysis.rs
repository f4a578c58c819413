//! Analysis artifacts: insights, trends, risk, recommendations, action plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::grade::{Grade, grade};

/// Quality dimensions every session is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Performance,
    Quality,
    Reliability,
    Usability,
    Security,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Performance,
        Dimension::Quality,
        Dimension::Reliability,
        Dimension::Usability,
        Dimension::Security,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Performance => "performance",
            Dimension::Quality => "quality",
            Dimension::Reliability => "reliability",
            Dimension::Usability => "usability",
            Dimension::Security => "security",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Dimension::Performance => "Performance",
            Dimension::Quality => "Quality",
            Dimension::Reliability => "Reliability",
            Dimension::Usability => "Usability",
            Dimension::Security => "Security",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How several scores collapse into one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeStrategy {
    /// Unweighted arithmetic mean.
    #[default]
    Mean,
    /// The least favourable input wins.
    WorstOf,
}

impl CompositeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            CompositeStrategy::Mean => "mean",
            CompositeStrategy::WorstOf => "worst_of",
        }
    }

    /// Combines scores where higher is better.
    pub fn combine_scores(self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        match self {
            CompositeStrategy::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            CompositeStrategy::WorstOf => scores.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }

    /// Combines risks where higher is worse.
    pub fn combine_risks(self, risks: &[f64]) -> f64 {
        if risks.is_empty() {
            return 0.0;
        }
        match self {
            CompositeStrategy::Mean => risks.iter().sum::<f64>() / risks.len() as f64,
            CompositeStrategy::WorstOf => risks.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Scored assessment of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub dimension: Dimension,

    /// 0-100.
    pub score: f64,

    pub grade: Grade,

    /// Sub-metric breakdown, each on its native scale.
    pub metrics: BTreeMap<String, f64>,

    #[serde(default)]
    pub strengths: Vec<String>,

    #[serde(default)]
    pub weaknesses: Vec<String>,

    /// Rule-derived observations (bottlenecks, error patterns).
    #[serde(default)]
    pub observations: Vec<String>,
}

impl Insight {
    pub fn new(dimension: Dimension, score: f64) -> Self {
        let score = crate::grade::clamp_score(score);
        Self {
            dimension,
            score,
            grade: grade(score),
            metrics: BTreeMap::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            observations: Vec::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Urgency of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl RecommendationPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationPriority::Critical => "critical",
            RecommendationPriority::High => "high",
            RecommendationPriority::Medium => "medium",
            RecommendationPriority::Low => "low",
        }
    }
}

impl fmt::Display for RecommendationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rough sizing of the work a recommendation implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }
}

/// Expected movement of a metric if the recommendation lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEstimate {
    pub metric: String,
    pub before: f64,
    pub after: f64,
}

/// A prioritized improvement suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub priority: RecommendationPriority,
    pub category: Dimension,
    pub title: String,
    pub description: String,
    pub effort: Effort,

    /// Human-readable timeline, e.g. "1-2 weeks".
    pub timeline: String,

    /// Ordered implementation steps.
    pub steps: Vec<String>,

    pub estimate: MetricEstimate,
}

/// Grouping of risk factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Technical,
    Operational,
    Business,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 3] = [
        RiskCategory::Technical,
        RiskCategory::Operational,
        RiskCategory::Business,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskCategory::Technical => "technical",
            RiskCategory::Operational => "operational",
            RiskCategory::Business => "business",
        }
    }
}

/// Bucketed risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// <30 low, <50 medium, <70 high, else critical.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            RiskLevel::Low
        } else if score < 50.0 {
            RiskLevel::Medium
        } else if score < 70.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One probability x impact concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub category: RiskCategory,

    /// Dimension whose score drives the probability.
    pub source: Dimension,

    /// 0-1, derived inversely from the source score.
    pub probability: f64,

    /// 0-100, fixed per factor.
    pub impact: f64,

    /// probability x impact, 0-100.
    pub score: f64,
}

/// Rolled-up risk view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub factors: Vec<RiskFactor>,
    pub category_scores: BTreeMap<RiskCategory, f64>,
    pub overall_score: f64,
    pub level: RiskLevel,
    pub strategy: CompositeStrategy,
}

/// Direction a dimension moved relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Degrading,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Stable => "stable",
            TrendDirection::Degrading => "degrading",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionTrend {
    pub dimension: Dimension,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
    pub direction: TrendDirection,
}

/// Movement of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
    pub direction: TrendDirection,
}

/// Comparison of this session against history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// Sessions in the compared series, the current one included.
    pub sessions_considered: usize,

    /// `previous` or `split_halves`.
    pub method: String,

    pub dimensions: Vec<DimensionTrend>,
    pub overall: ScoreDelta,
}

/// Time bucket of an action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionHorizon {
    Immediate,
    ShortTerm,
    LongTerm,
}

impl ActionHorizon {
    pub fn days(self) -> i64 {
        match self {
            ActionHorizon::Immediate => 7,
            ActionHorizon::ShortTerm => 21,
            ActionHorizon::LongTerm => 90,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ActionHorizon::Immediate => "Immediate",
            ActionHorizon::ShortTerm => "Short term",
            ActionHorizon::LongTerm => "Long term",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub recommendation_id: String,
    pub title: String,
    pub horizon: ActionHorizon,
    pub deadline: DateTime<Utc>,
    pub success_criteria: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub immediate: Vec<ActionItem>,
    pub short_term: Vec<ActionItem>,
    pub long_term: Vec<ActionItem>,
}

impl ActionPlan {
    pub fn len(&self) -> usize {
        self.immediate.len() + self.short_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket(&self, horizon: ActionHorizon) -> &[ActionItem] {
        match horizon {
            ActionHorizon::Immediate => &self.immediate,
            ActionHorizon::ShortTerm => &self.short_term,
            ActionHorizon::LongTerm => &self.long_term,
        }
    }
}

/// Condensed flow outcome carried into the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDigest {
    pub flow: String,
    pub passed: bool,
    pub steps_passed: usize,
    pub steps_total: usize,
    pub total_ms: f64,
    pub within_budget: bool,
    pub issues: Vec<String>,
}

/// Everything the analyzer derives from a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub session_id: String,
    pub generated_at: DateTime<Utc>,
    pub insights: Vec<Insight>,
    pub overall_score: f64,
    pub overall_grade: Grade,
    pub strategy: CompositeStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trends: Option<TrendAnalysis>,

    pub risk: RiskAssessment,
    pub recommendations: Vec<Recommendation>,
    pub action_plan: ActionPlan,

    #[serde(default)]
    pub flows: Vec<FlowDigest>,
}

impl Analysis {
    pub fn insight(&self, dimension: Dimension) -> Option<&Insight> {
        self.insights.iter().find(|i| i.dimension == dimension)
    }

    pub fn score(&self, dimension: Dimension) -> Option<f64> {
        self.insight(dimension).map(|i| i.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_buckets() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(29.99), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(49.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(70.0), RiskLevel::Critical);
    }

    #[test]
    fn test_composite_strategies() {
        let scores = [90.0, 60.0, 75.0];
        assert_eq!(CompositeStrategy::Mean.combine_scores(&scores), 75.0);
        assert_eq!(CompositeStrategy::WorstOf.combine_scores(&scores), 60.0);
        assert_eq!(CompositeStrategy::WorstOf.combine_risks(&scores), 90.0);
        assert_eq!(CompositeStrategy::Mean.combine_scores(&[]), 0.0);
    }

    #[test]
    fn test_insight_grades_through_shared_function() {
        let insight = Insight::new(Dimension::Security, 104.0);
        assert_eq!(insight.score, 100.0);
        assert_eq!(insight.grade, Grade::A);
        assert_eq!(Insight::new(Dimension::Quality, 65.0).grade, Grade::D);
    }

    #[test]
    fn test_horizon_days() {
        assert_eq!(ActionHorizon::Immediate.days(), 7);
        assert_eq!(ActionHorizon::ShortTerm.days(), 21);
        assert_eq!(ActionHorizon::LongTerm.days(), 90);
    }
}
