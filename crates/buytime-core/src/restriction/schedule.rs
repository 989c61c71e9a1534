use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

/// A usage-monitoring window registered with the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSchedule {
    pub activity_id: String,
    pub interval_start: NaiveTime,
    pub interval_end: NaiveTime,
    /// Usage minutes after which the threshold callback fires.
    pub threshold_minutes: Option<u32>,
    pub repeats: bool,
}

impl MonitoringSchedule {
    /// One-shot window opened by a spend: runs from `now` for `minutes`
    /// (wrapping past midnight) and fires once `minutes` of usage accrue.
    pub fn earned_window(activity_id: impl Into<String>, now: NaiveTime, minutes: u32) -> Self {
        let (end, _) = now.overflowing_add_signed(Duration::minutes(minutes as i64));
        Self {
            activity_id: activity_id.into(),
            interval_start: now,
            interval_end: end,
            threshold_minutes: Some(minutes),
            repeats: false,
        }
    }

    /// Repeating midnight-to-midnight window used to re-assert shields daily.
    pub fn daily(activity_id: impl Into<String>) -> Self {
        Self {
            activity_id: activity_id.into(),
            interval_start: NaiveTime::MIN,
            interval_end: NaiveTime::MIN,
            threshold_minutes: None,
            repeats: true,
        }
    }
}
