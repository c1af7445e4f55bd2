//! MET-based calorie estimation.
//!
//! `kcal = MET × weight_kg × hours`

use crate::collector::types::Activity;
use std::collections::HashMap;

/// Default body weight used when none is configured.
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

/// Metabolic equivalent of each activity. Unknown labels count as rest.
pub fn met_value(activity: Activity) -> f64 {
    match activity {
        Activity::Walking => 3.5,
        Activity::WalkingUpstairs => 8.0,
        Activity::WalkingDownstairs => 4.0,
        Activity::Sitting => 1.3,
        Activity::Standing => 1.8,
        Activity::Laying => 1.0,
        Activity::Unknown => 1.0,
    }
}

/// Estimated kcal burned doing `activity` for `seconds`.
pub fn estimate_calories(activity: Activity, seconds: f64, weight_kg: f64) -> f64 {
    met_value(activity) * weight_kg * (seconds / 3600.0)
}

/// Total kcal over a per-activity duration map (seconds).
pub fn total_calories(durations: &HashMap<Activity, f64>, weight_kg: f64) -> f64 {
    durations
        .iter()
        .map(|(activity, secs)| estimate_calories(*activity, *secs, weight_kg))
        .sum()
}

/// Format seconds as `1h 5m`, `2m 30s` or `45s`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hrs = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    if hrs > 0 {
        format!("{hrs}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_calories() {
        // one hour of walking at 70 kg
        let kcal = estimate_calories(Activity::Walking, 3600.0, 70.0);
        assert!((kcal - 245.0).abs() < 1e-9);

        assert_eq!(estimate_calories(Activity::Sitting, 0.0, 70.0), 0.0);
    }

    #[test]
    fn test_total_calories() {
        let mut durations = HashMap::new();
        durations.insert(Activity::WalkingUpstairs, 1800.0);
        durations.insert(Activity::Laying, 3600.0);

        let kcal = total_calories(&durations, 80.0);
        assert!((kcal - (8.0 * 80.0 * 0.5 + 80.0)).abs() < 1e-9);
        assert_eq!(total_calories(&HashMap::new(), 80.0), 0.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45.0), "45s");
        assert_eq!(format_duration(150.0), "2m 30s");
        assert_eq!(format_duration(3900.0), "1h 5m");
        assert_eq!(format_duration(-5.0), "0s");
        assert_eq!(format_duration(59.9), "59s");
    }
}
