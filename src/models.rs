//! Domain models
//!
//! Persistent records of the service catalog: services, BIA metadata,
//! status, downtime events, integrations and risk snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational classification of a service.
///
/// `Unknown` is the initial state for services that have never reported;
/// the other three are derived from elapsed time since the last status
/// refresh (see `monitor::classify`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    Degraded,
    Down,
    Unknown,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "Healthy",
            HealthState::Degraded => "Degraded",
            HealthState::Down => "Down",
            HealthState::Unknown => "Unknown",
        }
    }

    /// Parse a stored status string. Anything unrecognized maps to
    /// `Unknown` rather than failing the row.
    pub fn from_db(value: &str) -> Self {
        match value {
            "Healthy" => HealthState::Healthy,
            "Degraded" => HealthState::Degraded,
            "Down" => HealthState::Down,
            _ => HealthState::Unknown,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity bucket derived from a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Level is a pure function of the score: >= 80 High, >= 50 Medium,
    /// else Low.
    pub fn from_score(score: i32) -> Self {
        if score >= 80 {
            RiskLevel::High
        } else if score >= 50 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "High" => RiskLevel::High,
            "Medium" => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a risk snapshot: computed by the scorer or entered by an
/// analyst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSource {
    Automated,
    Manual,
}

impl RiskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskSource::Automated => "automated",
            RiskSource::Manual => "manual",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "manual" => RiskSource::Manual,
            _ => RiskSource::Automated,
        }
    }
}

/// A catalog entry. BIA, status, downtime, integrations and risks hang
/// off this record by `service_id`.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Business Impact Analysis metadata for one service.
///
/// `dependencies` holds the ids of other services this one depends on.
/// The relationship is self-referential and cycles are not prevented.
#[derive(Debug, Clone, Serialize)]
pub struct Bia {
    pub id: i32,
    pub service_id: i32,
    pub criticality: Option<String>,
    pub impact: Option<String>,
    /// Recovery Time Objective, minutes.
    pub rto: Option<i32>,
    /// Recovery Point Objective, minutes.
    pub rpo: Option<i32>,
    pub signed_off: bool,
    pub dependencies: Vec<i32>,
}

/// Current status row for a service (at most one per service).
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub id: i32,
    pub service_id: i32,
    pub status: HealthState,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One downtime event. `end_time` of `None` means the outage is ongoing.
#[derive(Debug, Clone, Serialize)]
pub struct Downtime {
    pub id: i32,
    pub service_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// An external integration attached to a service (e.g. AWS, Slack).
#[derive(Debug, Clone, Serialize)]
pub struct Integration {
    pub id: i32,
    pub service_id: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub config: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A timestamped risk snapshot. Rows are append-only except for the
/// explicit "update most recent" operation, which rewrites the latest
/// row in place.
#[derive(Debug, Clone, Serialize)]
pub struct Risk {
    pub id: i32,
    pub service_id: i32,
    pub risk_score: i32,
    pub risk_level: RiskLevel,
    pub reason: Option<String>,
    pub source: RiskSource,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(49), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::High);
    }

    #[test]
    fn health_state_round_trips_through_storage() {
        for state in [
            HealthState::Healthy,
            HealthState::Degraded,
            HealthState::Down,
            HealthState::Unknown,
        ] {
            assert_eq!(HealthState::from_db(state.as_str()), state);
        }
        assert_eq!(HealthState::from_db("garbage"), HealthState::Unknown);
    }
}
