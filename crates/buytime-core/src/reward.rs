//! Focus/reward derivation.
//!
//! `reward = focus * mode.multiplier`. The forward direction is trivial; the
//! reverse direction (user drags the reward slider) back-calculates focus and
//! switches mode when the current one cannot land focus inside
//! [`FOCUS_MIN`]..=[`FOCUS_MAX`]:
//!
//! - focus below range: reward is too low for this mode, so pick the
//!   largest multiplier `<= reward / FOCUS_MIN`
//! - focus above range: reward is too high, so pick the smallest multiplier
//!   `>= reward / FOCUS_MAX`
//!
//! If no mode qualifies the mode is kept and focus is clamped.

use serde::{Deserialize, Serialize};

pub const FOCUS_MIN: f64 = 15.0;
pub const FOCUS_MAX: f64 = 60.0;

/// Lowest reward the slider offers: `floor(FOCUS_MIN * hard multiplier)`.
pub const REWARD_MIN: f64 = 4.0;
pub const REWARD_MAX: f64 = 60.0;

/// Sessions assumed per day when showing daily totals.
pub const SESSIONS_PER_DAY: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    Hard,
    Medium,
    #[default]
    Easy,
    Fun,
}

impl FocusMode {
    /// All modes, ordered by ascending multiplier.
    pub const ORDERED: [FocusMode; 4] = [
        FocusMode::Hard,
        FocusMode::Medium,
        FocusMode::Easy,
        FocusMode::Fun,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            FocusMode::Hard => 0.25,
            FocusMode::Medium => 0.5,
            FocusMode::Easy => 0.75,
            FocusMode::Fun => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FocusMode::Hard => "hard",
            FocusMode::Medium => "medium",
            FocusMode::Easy => "easy",
            FocusMode::Fun => "fun",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            FocusMode::Hard => "Hard 25%",
            FocusMode::Medium => "Medium 50%",
            FocusMode::Easy => "Easy 75%",
            FocusMode::Fun => "Relax 100%",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hard" => Some(FocusMode::Hard),
            "medium" => Some(FocusMode::Medium),
            "easy" => Some(FocusMode::Easy),
            "fun" => Some(FocusMode::Fun),
            _ => None,
        }
    }

    /// Remote and cached values may carry modes this build doesn't know.
    pub fn parse_or_default(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }
}

impl std::fmt::Display for FocusMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FocusMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown focus mode '{s}' (hard, medium, easy, fun)"))
    }
}

/// Result of a reverse derivation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    pub focus_minutes: f64,
    pub mode: FocusMode,
}

impl Derivation {
    pub fn mode_changed_from(&self, previous: FocusMode) -> bool {
        self.mode != previous
    }

    /// Whole-minute focus for storage. Fractions are dropped, not rounded.
    pub fn focus_whole_minutes(&self) -> u32 {
        clamp_focus_minutes(self.focus_minutes.trunc() as i64)
    }
}

pub fn reward_minutes(focus_minutes: f64, mode: FocusMode) -> f64 {
    focus_minutes * mode.multiplier()
}

/// Back-calculates focus from a target reward, switching mode if needed.
pub fn derive_focus(reward: f64, current: FocusMode) -> Derivation {
    let mut mode = current;
    let mut focus = reward / current.multiplier();

    if focus < FOCUS_MIN {
        let max_multiplier = reward / FOCUS_MIN;
        match FocusMode::ORDERED
            .iter()
            .copied()
            .filter(|m| m.multiplier() <= max_multiplier)
            .last()
        {
            Some(m) => {
                mode = m;
                focus = reward / m.multiplier();
            }
            None => focus = FOCUS_MIN,
        }
    } else if focus > FOCUS_MAX {
        let min_multiplier = reward / FOCUS_MAX;
        match FocusMode::ORDERED
            .iter()
            .copied()
            .find(|m| m.multiplier() >= min_multiplier)
        {
            Some(m) => {
                mode = m;
                focus = reward / m.multiplier();
            }
            None => focus = FOCUS_MAX,
        }
    }

    Derivation {
        focus_minutes: focus.clamp(FOCUS_MIN, FOCUS_MAX),
        mode,
    }
}

pub fn clamp_focus_minutes(minutes: i64) -> u32 {
    minutes.clamp(FOCUS_MIN as i64, FOCUS_MAX as i64) as u32
}

/// Work and reward accumulated over a full day of sessions, as
/// `(hours, minutes)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub work: (u32, u32),
    pub reward: (u32, u32),
}

pub fn daily_totals(focus_minutes: f64, mode: FocusMode) -> DailyTotals {
    let split = |minutes: f64| {
        let total = (minutes * SESSIONS_PER_DAY as f64) as u32;
        (total / 60, total % 60)
    };
    DailyTotals {
        work: split(focus_minutes),
        reward: split(reward_minutes(focus_minutes, mode)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_are_ordered_by_multiplier() {
        let multipliers: Vec<f64> = FocusMode::ORDERED.iter().map(|m| m.multiplier()).collect();
        assert!(multipliers.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn forward_derivation() {
        assert_eq!(reward_minutes(40.0, FocusMode::Medium), 20.0);
        assert_eq!(reward_minutes(15.0, FocusMode::Hard), 3.75);
    }

    #[test]
    fn reverse_within_range_keeps_mode() {
        let d = derive_focus(30.0, FocusMode::Easy);
        assert_eq!(d.mode, FocusMode::Easy);
        assert!((d.focus_minutes - 40.0).abs() < 1e-9);
    }

    #[test]
    fn low_reward_switches_to_harder_mode() {
        // 10 / 1.0 = 10 < 15; largest multiplier <= 10/15 is medium (0.5).
        let d = derive_focus(10.0, FocusMode::Fun);
        assert_eq!(d.mode, FocusMode::Medium);
        assert!((d.focus_minutes - 20.0).abs() < 1e-9);
    }

    #[test]
    fn reward_four_from_fun_lands_on_hard() {
        // 4/15 ≈ 0.267, and hard (0.25) is the only multiplier at or below it.
        let d = derive_focus(4.0, FocusMode::Fun);
        assert_eq!(d.mode, FocusMode::Hard);
        assert!((d.focus_minutes - 16.0).abs() < 1e-9);
    }

    #[test]
    fn reward_below_every_mode_clamps_and_keeps_mode() {
        let d = derive_focus(3.0, FocusMode::Fun);
        assert_eq!(d.mode, FocusMode::Fun);
        assert_eq!(d.focus_minutes, FOCUS_MIN);
    }

    #[test]
    fn high_reward_switches_to_easier_mode() {
        // 40 / 0.25 = 160 > 60; smallest multiplier >= 40/60 is easy (0.75).
        let d = derive_focus(40.0, FocusMode::Hard);
        assert_eq!(d.mode, FocusMode::Easy);
        assert!((d.focus_minutes - 53.333333).abs() < 1e-5);
    }

    #[test]
    fn reward_above_every_mode_clamps_to_max() {
        let d = derive_focus(75.0, FocusMode::Easy);
        assert_eq!(d.mode, FocusMode::Easy);
        assert_eq!(d.focus_minutes, FOCUS_MAX);
    }

    #[test]
    fn exact_boundaries_do_not_switch() {
        let d = derive_focus(15.0, FocusMode::Fun);
        assert_eq!(d.mode, FocusMode::Fun);
        assert_eq!(d.focus_minutes, 15.0);

        let d = derive_focus(15.0, FocusMode::Hard);
        assert_eq!(d.mode, FocusMode::Hard);
        assert_eq!(d.focus_minutes, 60.0);
    }

    #[test]
    fn whole_minutes_truncate() {
        // 22.9 / 0.75 = 30.53...
        assert_eq!(derive_focus(22.9, FocusMode::Easy).focus_whole_minutes(), 30);
        assert_eq!(derive_focus(22.5, FocusMode::Easy).focus_whole_minutes(), 30);
        assert_eq!(derive_focus(29.9, FocusMode::Fun).focus_whole_minutes(), 29);
    }

    #[test]
    fn daily_totals_split_hours() {
        let totals = daily_totals(30.0, FocusMode::Easy);
        assert_eq!(totals.work, (4, 0));
        assert_eq!(totals.reward, (3, 0));
    }

    #[test]
    fn parse_modes() {
        assert_eq!("HARD".parse::<FocusMode>().unwrap(), FocusMode::Hard);
        assert!("brutal".parse::<FocusMode>().is_err());
        assert_eq!(FocusMode::parse_or_default("brutal"), FocusMode::Easy);
    }
}
