use serde::Serialize;

use crate::models::{Reading, ReadingKind};

/// Post-meal readings above this count as a spike.
pub const POST_MEAL_SPIKE_MG_DL: f64 = 180.0;
/// A fasting mean above this is flagged.
pub const FASTING_LIMIT_MG_DL: f64 = 120.0;
/// Readings above this, next to a pizza note, suggest a food link.
pub const FOOD_SPIKE_MG_DL: f64 = 160.0;

const TREND_WINDOW: usize = 5;
const SPIKE_COUNT_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingStats {
    pub count: usize,
    pub average: f64,
    pub high: f64,
    pub low: f64,
    /// Percent change of the last five readings' mean against the five
    /// before them.
    pub trend_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Insight,
    Warning,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub action: String,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Summary statistics over readings in chronological (ascending) order.
pub fn reading_stats(readings: &[Reading]) -> ReadingStats {
    let Some(average) = mean(readings.iter().map(|r| r.value)) else {
        return ReadingStats::default();
    };

    let high = readings.iter().map(|r| r.value).fold(f64::MIN, f64::max);
    let low = readings.iter().map(|r| r.value).fold(f64::MAX, f64::min);

    let split = readings.len().saturating_sub(TREND_WINDOW);
    let recent = &readings[split..];
    let older = &readings[split.saturating_sub(TREND_WINDOW)..split];

    let recent_avg = mean(recent.iter().map(|r| r.value)).unwrap_or(0.0);
    let trend_pct = match mean(older.iter().map(|r| r.value)) {
        Some(older_avg) if older_avg != 0.0 => (recent_avg - older_avg) / older_avg * 100.0,
        _ => 0.0,
    };

    ReadingStats {
        count: readings.len(),
        average,
        high,
        low,
        trend_pct,
    }
}

/// Flag recurring problems in a reading history. Order of the input does not
/// matter.
pub fn detect_patterns(readings: &[Reading]) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    let spikes = readings
        .iter()
        .filter(|r| r.kind == ReadingKind::PostMeal && r.value > POST_MEAL_SPIKE_MG_DL)
        .count();
    if spikes > SPIKE_COUNT_THRESHOLD {
        patterns.push(Pattern {
            severity: Severity::Warning,
            title: "Frequent post-meal spikes".to_string(),
            description: format!(
                "{spikes} readings above {POST_MEAL_SPIKE_MG_DL} mg/dL after meals"
            ),
            action: "Consider smaller portions or lower GI foods".to_string(),
        });
    }

    let fasting_avg = mean(
        readings
            .iter()
            .filter(|r| r.kind == ReadingKind::Fasting)
            .map(|r| r.value),
    );
    if let Some(avg) = fasting_avg.filter(|avg| *avg > FASTING_LIMIT_MG_DL) {
        patterns.push(Pattern {
            severity: Severity::Alert,
            title: "Elevated fasting glucose".to_string(),
            description: format!("Average fasting reading: {avg:.1} mg/dL"),
            action: "Review dinner timing and evening snacks".to_string(),
        });
    }

    let mentions_pizza = readings.iter().any(|r| {
        r.note
            .as_deref()
            .is_some_and(|note| note.to_lowercase().contains("pizza"))
    });
    if mentions_pizza && readings.iter().any(|r| r.value > FOOD_SPIKE_MG_DL) {
        patterns.push(Pattern {
            severity: Severity::Insight,
            title: "Pizza may cause spikes".to_string(),
            description: "High readings observed after pizza meals".to_string(),
            action: "Try thin crust or smaller portions".to_string(),
        });
    }

    patterns
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;

    fn series(values: &[(f64, ReadingKind)]) -> Vec<Reading> {
        let start = NaiveDate::from_ymd_opt(2024, 9, 12)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &(value, kind))| Reading {
                id: i as i64 + 1,
                user_id: 1,
                value,
                kind,
                note: None,
                measured_at: start + Duration::hours(6 * i as i64),
            })
            .collect()
    }

    fn fasting(values: &[f64]) -> Vec<Reading> {
        series(
            &values
                .iter()
                .map(|&v| (v, ReadingKind::Fasting))
                .collect::<Vec<_>>(),
        )
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(reading_stats(&[]), ReadingStats::default());
    }

    #[test]
    fn test_stats_basic() {
        let stats = reading_stats(&fasting(&[100.0, 120.0, 80.0]));
        assert_eq!(stats.count, 3);
        assert!(approx(stats.average, 100.0));
        assert!(approx(stats.high, 120.0));
        assert!(approx(stats.low, 80.0));
        // no earlier window yet
        assert!(approx(stats.trend_pct, 0.0));
    }

    #[test]
    fn test_stats_trend_compares_windows() {
        let values = [100.0, 100.0, 100.0, 100.0, 100.0, 110.0, 110.0, 110.0, 110.0, 110.0];
        let stats = reading_stats(&fasting(&values));
        assert!(approx(stats.trend_pct, 10.0));
    }

    #[test]
    fn test_stats_trend_partial_older_window() {
        // older window is the first two readings only
        let values = [90.0, 110.0, 120.0, 120.0, 120.0, 120.0, 120.0];
        let stats = reading_stats(&fasting(&values));
        assert!(approx(stats.trend_pct, 20.0));
    }

    #[test]
    fn test_stats_trend_ignores_readings_beyond_ten() {
        let mut values = vec![500.0; 3];
        values.extend([100.0; 5]);
        values.extend([50.0; 5]);
        let stats = reading_stats(&fasting(&values));
        assert!(approx(stats.trend_pct, -50.0));
    }

    #[test]
    fn test_no_patterns_for_normal_readings() {
        let readings = series(&[
            (98.0, ReadingKind::Fasting),
            (145.0, ReadingKind::PostMeal),
            (92.0, ReadingKind::Fasting),
        ]);
        assert!(detect_patterns(&readings).is_empty());
        assert!(detect_patterns(&[]).is_empty());
    }

    #[test]
    fn test_post_meal_spikes_need_more_than_two() {
        let two = series(&[
            (190.0, ReadingKind::PostMeal),
            (200.0, ReadingKind::PostMeal),
            (95.0, ReadingKind::Fasting),
        ]);
        assert!(detect_patterns(&two).is_empty());

        let three = series(&[
            (190.0, ReadingKind::PostMeal),
            (200.0, ReadingKind::PostMeal),
            (185.0, ReadingKind::PostMeal),
            // fasting spikes do not count
            (250.0, ReadingKind::Fasting),
            (60.0, ReadingKind::Fasting),
            (50.0, ReadingKind::Fasting),
        ]);
        let patterns = detect_patterns(&three);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].severity, Severity::Warning);
        assert!(patterns[0].description.starts_with("3 readings"));
    }

    #[test]
    fn test_elevated_fasting() {
        let patterns = detect_patterns(&fasting(&[130.0, 125.0]));
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].severity, Severity::Alert);
        assert_eq!(patterns[0].description, "Average fasting reading: 127.5 mg/dL");

        assert!(detect_patterns(&fasting(&[120.0])).is_empty());
    }

    #[test]
    fn test_pizza_note_with_high_reading() {
        let mut readings = series(&[
            (170.0, ReadingKind::PostMeal),
            (95.0, ReadingKind::Fasting),
        ]);
        readings[0].note = Some("Pizza night".to_string());
        let patterns = detect_patterns(&readings);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].severity, Severity::Insight);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Alert).unwrap(), "\"alert\"");
    }
}
