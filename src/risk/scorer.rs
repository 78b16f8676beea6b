//! Weighted risk scorer
//!
//! Derives a 0-100 risk score for a service from its current status,
//! recent downtime history, BIA fields, dependency health and integration
//! fan-out. Rules are additive and evaluated in a fixed order so the
//! reason list is reproducible.

use crate::models::{Bia, Downtime, HealthState, RiskLevel, ServiceStatus};
use chrono::{DateTime, Duration, Utc};

/// Downtime lookback window for the "frequent or prolonged downtimes" rule.
const RECENT_DOWNTIME_WINDOW_DAYS: i64 = 7;

/// Minutes of downtime inside the window above which the rule triggers.
const RECENT_DOWNTIME_BUDGET_MINUTES: f64 = 120.0;

/// Health of one BIA dependency, resolved by the caller.
#[derive(Debug, Clone)]
pub struct DependencyHealth {
    pub name: String,
    pub status: Option<HealthState>,
}

/// Everything the scorer looks at. Missing BIA or status simply skips the
/// corresponding rules.
#[derive(Debug)]
pub struct RiskInputs<'a> {
    pub bia: Option<&'a Bia>,
    pub status: Option<&'a ServiceStatus>,
    pub downtimes: &'a [Downtime],
    pub dependencies: &'a [DependencyHealth],
    pub integration_count: usize,
}

/// Scoring result. `reasons` preserves rule evaluation order.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub score: i32,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

impl RiskAssessment {
    /// The stored/displayed form of the reason list.
    pub fn reason(&self) -> String {
        self.reasons.join(", ")
    }
}

/// Compute the risk score for a service.
///
/// Additive rule set, in order:
/// 1. +40 service currently Down
/// 2. +20 more than 120 downtime minutes started in the last 7 days
/// 3. +15 criticality "high" / +10 "medium" (mutually exclusive)
/// 4. +10 impact "high" or "severe"
/// 5. +10 RTO under 60 minutes
/// 6. +5  RPO under 60 minutes
/// 7. +20 any BIA dependency currently Down
/// 8. +10 more than 3 integrations
///
/// The total is clamped to 100.
pub fn assess(inputs: &RiskInputs<'_>, now: DateTime<Utc>) -> RiskAssessment {
    let mut score = 0;
    let mut reasons = Vec::new();

    // 1. Service status
    if matches!(inputs.status, Some(s) if s.status == HealthState::Down) {
        score += 40;
        reasons.push("Service is currently down".to_string());
    }

    // 2. Recent downtime analysis (last 7 days)
    let window_start = now - Duration::days(RECENT_DOWNTIME_WINDOW_DAYS);
    let total_downtime_minutes: f64 = inputs
        .downtimes
        .iter()
        .filter(|d| d.start_time >= window_start)
        .map(|d| {
            let end = d.end_time.unwrap_or(now);
            (end - d.start_time).num_seconds() as f64 / 60.0
        })
        .sum();

    if total_downtime_minutes > RECENT_DOWNTIME_BUDGET_MINUTES {
        score += 20;
        reasons.push("Frequent or prolonged downtimes in the last 7 days".to_string());
    }

    if let Some(bia) = inputs.bia {
        // 3. BIA - Criticality
        let criticality = bia.criticality.as_deref().unwrap_or("");
        if criticality.eq_ignore_ascii_case("high") {
            score += 15;
            reasons.push("High criticality in BIA".to_string());
        } else if criticality.eq_ignore_ascii_case("medium") {
            score += 10;
            reasons.push("Medium criticality in BIA".to_string());
        }

        // 4. BIA - Impact
        if let Some(impact) = bia.impact.as_deref() {
            if impact.eq_ignore_ascii_case("high") || impact.eq_ignore_ascii_case("severe") {
                score += 10;
                reasons.push(format!("High impact in BIA: {}", impact));
            }
        }

        // 5. BIA - RTO
        if matches!(bia.rto, Some(rto) if rto < 60) {
            score += 10;
            reasons.push("RTO < 1 hour".to_string());
        }

        // 6. BIA - RPO
        if matches!(bia.rpo, Some(rpo) if rpo < 60) {
            score += 5;
            reasons.push("RPO < 1 hour".to_string());
        }

        // 7. Dependency health (one hop, non-transitive)
        let down_dependencies: Vec<&str> = inputs
            .dependencies
            .iter()
            .filter(|dep| dep.status == Some(HealthState::Down))
            .map(|dep| dep.name.as_str())
            .collect();

        if !down_dependencies.is_empty() {
            score += 20;
            reasons.push(format!("Dependencies down: {}", down_dependencies.join(", ")));
        }
    }

    // 8. Integration complexity
    if inputs.integration_count > 3 {
        score += 10;
        reasons.push("High number of integrations".to_string());
    }

    let score = score.min(100);

    RiskAssessment {
        score,
        level: RiskLevel::from_score(score),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bia(
        criticality: Option<&str>,
        impact: Option<&str>,
        rto: Option<i32>,
        rpo: Option<i32>,
    ) -> Bia {
        Bia {
            id: 1,
            service_id: 1,
            criticality: criticality.map(str::to_string),
            impact: impact.map(str::to_string),
            rto,
            rpo,
            signed_off: false,
            dependencies: Vec::new(),
        }
    }

    fn status(state: HealthState, now: DateTime<Utc>) -> ServiceStatus {
        ServiceStatus {
            id: 1,
            service_id: 1,
            status: state,
            last_updated: Some(now),
        }
    }

    fn downtime(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Downtime {
        Downtime {
            id: 1,
            service_id: 1,
            start_time: start,
            end_time: end,
            reason: None,
        }
    }

    fn empty_inputs<'a>() -> RiskInputs<'a> {
        RiskInputs {
            bia: None,
            status: None,
            downtimes: &[],
            dependencies: &[],
            integration_count: 0,
        }
    }

    #[test]
    fn down_service_without_bia_scores_forty() {
        let now = Utc::now();
        let st = status(HealthState::Down, now);
        let inputs = RiskInputs {
            status: Some(&st),
            ..empty_inputs()
        };

        let result = assess(&inputs, now);
        assert_eq!(result.score, 40);
        assert_eq!(result.level, RiskLevel::Low);
        assert_eq!(result.reasons, vec!["Service is currently down".to_string()]);
    }

    #[test]
    fn healthy_service_with_aggressive_bia_scores_forty() {
        let now = Utc::now();
        let st = status(HealthState::Healthy, now);
        let b = bia(Some("High"), Some("Severe"), Some(30), Some(10));
        let inputs = RiskInputs {
            bia: Some(&b),
            status: Some(&st),
            ..empty_inputs()
        };

        let result = assess(&inputs, now);
        assert_eq!(result.score, 40); // 15 + 10 + 10 + 5
        assert_eq!(result.level, RiskLevel::Low);
        assert_eq!(
            result.reasons,
            vec![
                "High criticality in BIA".to_string(),
                "High impact in BIA: Severe".to_string(),
                "RTO < 1 hour".to_string(),
                "RPO < 1 hour".to_string(),
            ]
        );
    }

    #[test]
    fn down_service_with_down_dependency_reaches_medium() {
        let now = Utc::now();
        let st = status(HealthState::Down, now);
        let b = bia(Some("high"), None, None, None);
        let deps = vec![DependencyHealth {
            name: "payments-db".to_string(),
            status: Some(HealthState::Down),
        }];
        let inputs = RiskInputs {
            bia: Some(&b),
            status: Some(&st),
            dependencies: &deps,
            ..empty_inputs()
        };

        let result = assess(&inputs, now);
        assert_eq!(result.score, 75); // 40 + 15 + 20
        assert_eq!(result.level, RiskLevel::Medium);
        assert_eq!(
            result.reasons,
            vec![
                "Service is currently down".to_string(),
                "High criticality in BIA".to_string(),
                "Dependencies down: payments-db".to_string(),
            ]
        );
    }

    #[test]
    fn all_rules_firing_clamps_to_one_hundred() {
        let now = Utc::now();
        let st = status(HealthState::Down, now);
        let b = bia(Some("high"), Some("severe"), Some(15), Some(15));
        let deps = vec![
            DependencyHealth {
                name: "auth".to_string(),
                status: Some(HealthState::Down),
            },
            DependencyHealth {
                name: "billing".to_string(),
                status: Some(HealthState::Down),
            },
        ];
        // Three hours of downtime yesterday
        let downtimes = vec![downtime(
            now - Duration::days(1),
            Some(now - Duration::days(1) + Duration::hours(3)),
        )];
        let inputs = RiskInputs {
            bia: Some(&b),
            status: Some(&st),
            downtimes: &downtimes,
            dependencies: &deps,
            integration_count: 5,
        };

        let result = assess(&inputs, now);
        // 40 + 20 + 15 + 10 + 10 + 5 + 20 + 10 = 130, clamped
        assert_eq!(result.score, 100);
        assert_eq!(result.level, RiskLevel::High);
        assert_eq!(
            result.reasons.last().unwrap(),
            "High number of integrations"
        );
        assert_eq!(
            result.reasons[result.reasons.len() - 2],
            "Dependencies down: auth, billing"
        );
    }

    #[test]
    fn downtime_outside_seven_day_window_is_ignored() {
        let now = Utc::now();
        let old = vec![downtime(
            now - Duration::days(8),
            Some(now - Duration::days(8) + Duration::hours(5)),
        )];
        let inputs = RiskInputs {
            downtimes: &old,
            ..empty_inputs()
        };

        let result = assess(&inputs, now);
        assert_eq!(result.score, 0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn ongoing_downtime_is_measured_against_now() {
        let now = Utc::now();
        // Started 3 hours ago, still open: 180 minutes > 120
        let open = vec![downtime(now - Duration::hours(3), None)];
        let inputs = RiskInputs {
            downtimes: &open,
            ..empty_inputs()
        };

        let result = assess(&inputs, now);
        assert_eq!(result.score, 20);
        assert_eq!(
            result.reasons,
            vec!["Frequent or prolonged downtimes in the last 7 days".to_string()]
        );
    }

    #[test]
    fn medium_criticality_is_the_else_branch() {
        let now = Utc::now();
        let b = bia(Some("Medium"), None, None, None);
        let inputs = RiskInputs {
            bia: Some(&b),
            ..empty_inputs()
        };

        let result = assess(&inputs, now);
        assert_eq!(result.score, 10);
        assert_eq!(result.reasons, vec!["Medium criticality in BIA".to_string()]);
    }

    #[test]
    fn rto_rpo_at_sixty_do_not_trigger() {
        let now = Utc::now();
        let b = bia(None, None, Some(60), Some(60));
        let inputs = RiskInputs {
            bia: Some(&b),
            ..empty_inputs()
        };

        assert_eq!(assess(&inputs, now).score, 0);
    }

    #[test]
    fn degraded_dependency_does_not_count_as_down() {
        let now = Utc::now();
        let b = bia(None, None, None, None);
        let deps = vec![DependencyHealth {
            name: "cache".to_string(),
            status: Some(HealthState::Degraded),
        }];
        let inputs = RiskInputs {
            bia: Some(&b),
            dependencies: &deps,
            ..empty_inputs()
        };

        assert_eq!(assess(&inputs, now).score, 0);
    }

    #[test]
    fn reason_string_joins_in_rule_order() {
        let now = Utc::now();
        let st = status(HealthState::Down, now);
        let b = bia(Some("high"), None, None, None);
        let inputs = RiskInputs {
            bia: Some(&b),
            status: Some(&st),
            ..empty_inputs()
        };

        let result = assess(&inputs, now);
        assert_eq!(
            result.reason(),
            "Service is currently down, High criticality in BIA"
        );
    }
}
