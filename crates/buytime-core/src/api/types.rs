//! Wire types for the remote service (camelCase JSON).

use serde::{Deserialize, Serialize};

/// Response envelope wrapping every payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub available_minutes: i64,
    #[serde(default)]
    pub current_streak_days: i64,
    #[serde(default)]
    pub last_session_date: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub today: Option<TodayStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStats {
    pub earned_minutes: i64,
    pub spent_minutes: i64,
    pub sessions_completed: i64,
    pub sessions_failed: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateBalanceBody {
    pub available_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRecord {
    pub focus_duration_minutes: i64,
    pub focus_mode: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdatePreferencesBody<'a> {
    pub focus_duration_minutes: u32,
    pub focus_mode: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub subscription_tier: Option<String>,
    #[serde(default)]
    pub balance: Option<Balance>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_decodes_with_optional_fields_missing() {
        let env: Envelope<Balance> = serde_json::from_str(
            r#"{"success":true,"data":{"availableMinutes":42,"currentStreakDays":3},"error":null}"#,
        )
        .unwrap();
        let balance = env.data.unwrap();
        assert_eq!(balance.available_minutes, 42);
        assert_eq!(balance.current_streak_days, 3);
        assert!(balance.today.is_none());
    }

    #[test]
    fn update_bodies_are_camel_case() {
        let body = serde_json::to_value(UpdatePreferencesBody {
            focus_duration_minutes: 45,
            focus_mode: "hard",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"focusDurationMinutes": 45, "focusMode": "hard"}));

        let body = serde_json::to_value(UpdateBalanceBody { available_minutes: 25 }).unwrap();
        assert_eq!(body, serde_json::json!({"availableMinutes": 25}));
    }
}
