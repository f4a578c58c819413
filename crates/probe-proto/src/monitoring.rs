//! Alerting setup derived from an analysis.

use serde::{Deserialize, Serialize};

/// Direction in which a metric breaches its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Above,
    Below,
}

impl Comparator {
    pub fn breached(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Above => value > threshold,
            Comparator::Below => value < threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Above => ">",
            Comparator::Below => "<",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub metric: String,
    pub comparator: Comparator,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub description: String,
}

/// Watch list handed to whatever monitors the API between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringPlan {
    pub session_id: String,
    pub alerts: Vec<AlertRule>,
    pub check_interval_secs: u64,
}

impl MonitoringPlan {
    /// Alerts that would fire for the given metric value.
    pub fn firing<'a>(&'a self, metric: &'a str, value: f64) -> impl Iterator<Item = &'a AlertRule> {
        self.alerts
            .iter()
            .filter(move |a| a.metric == metric && a.comparator.breached(value, a.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firing_alerts() {
        let plan = MonitoringPlan {
            session_id: "s".into(),
            alerts: vec![AlertRule {
                metric: "error_rate".into(),
                comparator: Comparator::Above,
                threshold: 5.0,
                severity: AlertSeverity::Critical,
                description: String::new(),
            }],
            check_interval_secs: 60,
        };
        assert_eq!(plan.firing("error_rate", 7.0).count(), 1);
        assert_eq!(plan.firing("error_rate", 5.0).count(), 0);
        assert_eq!(plan.firing("latency", 7.0).count(), 0);
    }
}
