//! Heuristic prediction model.
//!
//! Stands in for the ML collaborator: a deterministic function over the
//! configured default interval, the driver's recent break history and
//! the exercise catalog.

use tracing::debug;

use crate::error::CoreError;
use crate::model::{BreakPoint, Exercise, User};
use crate::providers::PredictionModel;

/// Bounds applied to history-derived intervals, so one odd trip cannot
/// push breaks absurdly close together or hours apart.
const MIN_INTERVAL_SECS: i64 = 1800;
const MAX_INTERVAL_SECS: i64 = 14400;

pub struct HeuristicPrediction {
    catalog: Vec<Exercise>,
    default_interval_secs: i64,
}

impl HeuristicPrediction {
    pub fn new(catalog: Vec<Exercise>, default_interval_secs: i64) -> Self {
        Self {
            catalog,
            default_interval_secs,
        }
    }
}

impl PredictionModel for HeuristicPrediction {
    fn predict_interval(
        &self,
        _driving_duration_secs: i64,
        history: &[BreakPoint],
    ) -> Result<i64, CoreError> {
        let mut completed: Vec<_> = history.iter().filter(|b| b.completed).collect();
        completed.sort_by_key(|b| b.scheduled_time);

        if completed.len() < 2 {
            return Ok(self.default_interval_secs);
        }

        // Mean gap between the driver's actual breaks, blended half-and-half
        // with the configured default.
        let gaps: Vec<i64> = completed
            .windows(2)
            .map(|w| (w[1].scheduled_time - w[0].scheduled_time).num_seconds())
            .filter(|gap| *gap > 0)
            .collect();
        if gaps.is_empty() {
            return Ok(self.default_interval_secs);
        }
        let mean = gaps.iter().sum::<i64>() / gaps.len() as i64;
        let blended = ((self.default_interval_secs + mean) / 2).clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
        debug!(mean_gap_secs = mean, interval_secs = blended, "interval from break history");
        Ok(blended)
    }

    fn recommend(&self, user: &User, break_duration_secs: i64) -> Result<Vec<Exercise>, CoreError> {
        let prefs = &user.preferences.exercise;
        Ok(self
            .catalog
            .iter()
            .filter(|e| {
                e.duration_secs <= break_duration_secs
                    && prefs.preferred_categories.contains(&e.category)
                    && e.difficulty == prefs.difficulty
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use crate::model::{ExerciseCategory, ExerciseDifficulty, GeoPoint};
    use chrono::{Duration, Utc};

    fn break_at(offset_secs: i64, completed: bool) -> BreakPoint {
        BreakPoint {
            id: format!("b{offset_secs}"),
            route_id: "r1".into(),
            location: GeoPoint::new(48.1, 11.5),
            scheduled_time: Utc::now() + Duration::seconds(offset_secs),
            poi: None,
            duration_secs: 900,
            completed,
            notes: None,
        }
    }

    #[test]
    fn empty_history_yields_default_interval() {
        let model = HeuristicPrediction::new(default_catalog(), 7200);
        assert_eq!(model.predict_interval(14400, &[]).unwrap(), 7200);
    }

    #[test]
    fn incomplete_breaks_are_ignored() {
        let model = HeuristicPrediction::new(default_catalog(), 7200);
        let history = vec![break_at(0, false), break_at(3600, false)];
        assert_eq!(model.predict_interval(14400, &history).unwrap(), 7200);
    }

    #[test]
    fn history_blends_toward_actual_gaps() {
        let model = HeuristicPrediction::new(default_catalog(), 7200);
        let history = vec![break_at(0, true), break_at(3600, true)];
        // mean gap 3600, blended with default 7200 -> 5400
        assert_eq!(model.predict_interval(14400, &history).unwrap(), 5400);
    }

    #[test]
    fn blended_interval_is_clamped() {
        let model = HeuristicPrediction::new(default_catalog(), 7200);
        let history = vec![break_at(0, true), break_at(60, true)];
        assert_eq!(model.predict_interval(14400, &history).unwrap(), MIN_INTERVAL_SECS);
    }

    #[test]
    fn recommendation_respects_preferences_and_duration() {
        let model = HeuristicPrediction::new(default_catalog(), 7200);
        let user = User::new("u1", "a@b.c", "A");
        // Default prefs: easy stretching/mobility.
        let recs = model.recommend(&user, 900).unwrap();
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|e| {
            e.duration_secs <= 900
                && e.difficulty == ExerciseDifficulty::Easy
                && matches!(
                    e.category,
                    ExerciseCategory::Stretching | ExerciseCategory::Mobility
                )
        }));
        // Catalog order is preserved: neck stretches lead the catalog.
        assert_eq!(recs[0].id, "neck-stretches");
    }

    #[test]
    fn short_break_filters_out_long_exercises() {
        let model = HeuristicPrediction::new(default_catalog(), 7200);
        let user = User::new("u1", "a@b.c", "A");
        let recs = model.recommend(&user, 100).unwrap();
        assert!(recs.iter().all(|e| e.duration_secs <= 100));
        assert_eq!(recs.len(), 1); // only shoulder rolls fit
        assert_eq!(recs[0].id, "shoulder-rolls");
    }
}
