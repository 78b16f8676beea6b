//! Uptime calculator
//!
//! Percentage of time the service was up, measured over the window since
//! the last status refresh. Downtime rows are summed in full even when
//! they started before the window opened.

use crate::models::{Downtime, ServiceStatus};
use chrono::{DateTime, Utc};

/// Compute uptime percentage for a service, rounded to 2 decimal places.
///
/// The window runs from `status.last_updated` to `now`. With no status
/// row, no timestamp, or an empty window the result is defined as 100.
pub fn uptime_percent(
    status: Option<&ServiceStatus>,
    downtimes: &[Downtime],
    now: DateTime<Utc>,
) -> f64 {
    let Some(last_updated) = status.and_then(|s| s.last_updated) else {
        return 100.0;
    };

    let window_seconds = (now - last_updated).num_seconds();
    if window_seconds <= 0 {
        return 100.0;
    }

    let downtime_seconds: i64 = downtimes
        .iter()
        .map(|d| (d.end_time.unwrap_or(now) - d.start_time).num_seconds())
        .sum();

    let uptime_seconds = window_seconds - downtime_seconds;
    let percent = (uptime_seconds as f64 / window_seconds as f64) * 100.0;

    (percent * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HealthState;
    use chrono::Duration;

    fn status_updated_at(ts: DateTime<Utc>) -> ServiceStatus {
        ServiceStatus {
            id: 1,
            service_id: 1,
            status: HealthState::Healthy,
            last_updated: Some(ts),
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

    #[test]
    fn twenty_minutes_down_in_a_hundred_minute_window() {
        let now = Utc::now();
        let st = status_updated_at(now - Duration::minutes(100));
        let dts = vec![downtime(
            now - Duration::minutes(50),
            Some(now - Duration::minutes(30)),
        )];

        assert_eq!(uptime_percent(Some(&st), &dts, now), 80.00);
    }

    #[test]
    fn no_status_means_full_uptime() {
        let now = Utc::now();
        assert_eq!(uptime_percent(None, &[], now), 100.0);
    }

    #[test]
    fn missing_timestamp_means_full_uptime() {
        let now = Utc::now();
        let st = ServiceStatus {
            id: 1,
            service_id: 1,
            status: HealthState::Unknown,
            last_updated: None,
        };
        assert_eq!(uptime_percent(Some(&st), &[], now), 100.0);
    }

    #[test]
    fn empty_window_means_full_uptime() {
        let now = Utc::now();
        let st = status_updated_at(now);
        assert_eq!(uptime_percent(Some(&st), &[], now), 100.0);
    }

    #[test]
    fn ongoing_downtime_counts_up_to_now() {
        let now = Utc::now();
        let st = status_updated_at(now - Duration::minutes(60));
        let dts = vec![downtime(now - Duration::minutes(30), None)];

        assert_eq!(uptime_percent(Some(&st), &dts, now), 50.00);
    }

    #[test]
    fn downtime_older_than_the_window_still_counts_in_full() {
        let now = Utc::now();
        let st = status_updated_at(now - Duration::minutes(100));
        // Entirely before the window opened, still subtracted
        let dts = vec![downtime(
            now - Duration::minutes(200),
            Some(now - Duration::minutes(140)),
        )];

        assert_eq!(uptime_percent(Some(&st), &dts, now), 40.00);
    }

    #[test]
    fn result_rounds_to_two_decimals() {
        let now = Utc::now();
        let st = status_updated_at(now - Duration::minutes(90));
        let dts = vec![downtime(
            now - Duration::minutes(20),
            Some(now - Duration::minutes(10)),
        )];

        // 80/90 of the window up = 88.888..%
        assert_eq!(uptime_percent(Some(&st), &dts, now), 88.89);
    }
}
