//! Risk analysis
//!
//! Pure scoring logic over catalog records: the weighted risk scorer and
//! the uptime calculator. Persistence of the resulting snapshots lives in
//! `db::risk`.

mod scorer;
mod uptime;

pub use scorer::{assess, DependencyHealth, RiskAssessment, RiskInputs};
pub use uptime::uptime_percent;
