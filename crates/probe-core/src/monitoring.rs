//! Monitoring setup derived from an analysis.
//!
//! The tail of the reporting phase: turns observed metrics into alert rules
//! a monitor can watch between runs.

use probe_proto::{
    AlertRule, AlertSeverity, Analysis, Comparator, Dimension, Grade, MonitoringPlan, RiskLevel,
    grade,
};

/// Error rate (percent) above which an alert fires.
pub const ERROR_RATE_ALERT: f64 = 5.0;

/// Availability (percent) below which an alert fires.
pub const AVAILABILITY_ALERT: f64 = 99.0;

/// Latency alerts fire this far above the observed value.
const LATENCY_HEADROOM: f64 = 1.5;

/// Latency thresholds never drop below this, in milliseconds.
const LATENCY_FLOOR_MS: f64 = 200.0;

/// Riskier APIs are checked more often.
pub fn check_interval_secs(level: RiskLevel) -> u64 {
    match level {
        RiskLevel::Critical => 60,
        RiskLevel::High => 300,
        RiskLevel::Medium => 900,
        RiskLevel::Low => 3_600,
    }
}

fn metric(analysis: &Analysis, dimension: Dimension, name: &str) -> Option<f64> {
    analysis
        .insight(dimension)
        .and_then(|i| i.metrics.get(name))
        .copied()
}

fn latency_rule(name: &str, observed: Option<f64>, severity: AlertSeverity) -> AlertRule {
    let threshold = observed
        .map_or(LATENCY_FLOOR_MS, |v| v * LATENCY_HEADROOM)
        .max(LATENCY_FLOOR_MS)
        .round();
    AlertRule {
        metric: name.to_string(),
        comparator: Comparator::Above,
        threshold,
        severity,
        description: match observed {
            Some(v) => format!("{name} above {threshold:.0} ms (observed {v:.0} ms)"),
            None => format!("{name} above {threshold:.0} ms"),
        },
    }
}

/// Builds the watch list for one analysis.
pub fn plan(analysis: &Analysis) -> MonitoringPlan {
    let mut alerts = vec![
        latency_rule(
            "avg_response_ms",
            metric(analysis, Dimension::Performance, "avg_response_ms"),
            AlertSeverity::Warning,
        ),
        latency_rule(
            "p95_ms",
            metric(analysis, Dimension::Performance, "p95_ms"),
            AlertSeverity::Warning,
        ),
        AlertRule {
            metric: "error_rate".to_string(),
            comparator: Comparator::Above,
            threshold: ERROR_RATE_ALERT,
            severity: AlertSeverity::Critical,
            description: format!("error rate above {ERROR_RATE_ALERT}%"),
        },
        AlertRule {
            metric: "availability".to_string(),
            comparator: Comparator::Below,
            threshold: AVAILABILITY_ALERT,
            severity: AlertSeverity::Critical,
            description: format!("availability below {AVAILABILITY_ALERT}%"),
        },
    ];

    let floor = Grade::C.floor();
    for insight in analysis.insights.iter().filter(|i| i.score < floor) {
        alerts.push(AlertRule {
            metric: format!("{}_score", insight.dimension),
            comparator: Comparator::Below,
            threshold: floor,
            severity: if insight.dimension == Dimension::Security {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            },
            description: format!(
                "{} currently {:.1} (grade {})",
                insight.dimension.title(),
                insight.score,
                grade(insight.score)
            ),
        });
    }

    MonitoringPlan {
        session_id: analysis.session_id.clone(),
        alerts,
        check_interval_secs: check_interval_secs(analysis.risk.level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use probe_proto::{
        ActionPlan, CompositeStrategy, Insight, RiskAssessment,
    };
    use std::collections::BTreeMap;

    fn analysis(scores: [f64; 5], level: RiskLevel) -> Analysis {
        let insights: Vec<Insight> = Dimension::ALL
            .into_iter()
            .zip(scores)
            .map(|(d, s)| Insight::new(d, s))
            .collect();
        let insights = insights
            .into_iter()
            .map(|i| {
                if i.dimension == Dimension::Performance {
                    i.with_metric("avg_response_ms", 400.0).with_metric("p95_ms", 90.0)
                } else {
                    i
                }
            })
            .collect();
        Analysis {
            id: "a".into(),
            session_id: "s".into(),
            generated_at: Utc::now(),
            insights,
            overall_score: 0.0,
            overall_grade: Grade::F,
            strategy: CompositeStrategy::Mean,
            trends: None,
            risk: RiskAssessment {
                factors: Vec::new(),
                category_scores: BTreeMap::new(),
                overall_score: 0.0,
                level,
                strategy: CompositeStrategy::Mean,
            },
            recommendations: Vec::new(),
            action_plan: ActionPlan::default(),
            flows: Vec::new(),
        }
    }

    #[test]
    fn test_base_alerts() {
        let plan = plan(&analysis([95.0, 95.0, 95.0, 95.0, 95.0], RiskLevel::Low));
        assert_eq!(plan.alerts.len(), 4);
        assert_eq!(plan.check_interval_secs, 3_600);

        let avg = plan.alerts.iter().find(|a| a.metric == "avg_response_ms").unwrap();
        assert_eq!(avg.threshold, 600.0);
        let p95 = plan.alerts.iter().find(|a| a.metric == "p95_ms").unwrap();
        assert_eq!(p95.threshold, LATENCY_FLOOR_MS);

        assert_eq!(plan.firing("error_rate", 6.0).count(), 1);
        assert_eq!(plan.firing("availability", 98.0).count(), 1);
    }

    #[test]
    fn test_dimension_below_c_band() {
        let plan = plan(&analysis([95.0, 69.9, 70.0, 50.0, 40.0], RiskLevel::Critical));
        let dims: Vec<&str> = plan
            .alerts
            .iter()
            .skip(4)
            .map(|a| a.metric.as_str())
            .collect();
        assert_eq!(dims, vec!["quality_score", "usability_score", "security_score"]);
        assert_eq!(plan.alerts.last().unwrap().severity, AlertSeverity::Critical);
        assert_eq!(plan.check_interval_secs, 60);
    }
}
