//! # Activity Trends
//! Pure derivation of a chartable per-day activity signal from cumulative
//! counters (donations, attack wins, war stars are monotonic-ish counters
//! from the source API).
//!
//! Stateless and idempotent: re-derivable at any time from the stored
//! series. The chart renderer consumes the output as-is.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::PlayerWarStat;

/// One raw cumulative measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeSample {
    pub timestamp: i64,
    pub donations: i64,
    pub attack_wins: i64,
    pub war_stars: i64,
}

impl From<&PlayerWarStat> for CumulativeSample {
    fn from(s: &PlayerWarStat) -> Self {
        Self {
            timestamp: s.timestamp,
            donations: s.donations,
            attack_wins: s.attack_wins,
            war_stars: s.war_stars,
        }
    }
}

/// Per-day maxima of the cumulative counters (UTC calendar days).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub donations: i64,
    pub attack_wins: i64,
    pub war_stars: i64,
}

/// Day-over-day delta, clamped to non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPoint {
    pub date: NaiveDate,
    pub donations: i64,
    pub attack_wins: i64,
    pub war_stars: i64,
}

/// Trailing moving average over the deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub donations: f64,
    pub attack_wins: f64,
    pub war_stars: f64,
}

/// Derived series handed to the chart renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivitySeries {
    pub deltas: Vec<ActivityPoint>,
    pub trend: Vec<TrendPoint>,
}

/// Bucket samples by UTC calendar day, ascending. When several samples fall
/// in one day the per-field maximum wins, so a transient dip is not
/// mistaken for a counter reset.
pub fn group_by_day(samples: &[CumulativeSample]) -> Vec<DailyTotals> {
    let mut sorted: Vec<&CumulativeSample> = samples.iter().collect();
    sorted.sort_by_key(|s| s.timestamp);

    let mut days: Vec<DailyTotals> = Vec::new();
    for s in sorted {
        let date = match DateTime::<Utc>::from_timestamp(s.timestamp, 0) {
            Some(dt) => dt.date_naive(),
            None => continue,
        };
        match days.last_mut() {
            Some(last) if last.date == date => {
                last.donations = last.donations.max(s.donations);
                last.attack_wins = last.attack_wins.max(s.attack_wins);
                last.war_stars = last.war_stars.max(s.war_stars);
            }
            _ => days.push(DailyTotals {
                date,
                donations: s.donations,
                attack_wins: s.attack_wins,
                war_stars: s.war_stars,
            }),
        }
    }
    days
}

/// Day-over-day deltas. The first day has no prior reference and is
/// excluded. Clamping to zero absorbs upstream counter resets without
/// producing negative activity.
pub fn daily_deltas(days: &[DailyTotals]) -> Vec<ActivityPoint> {
    days.windows(2)
        .map(|pair| ActivityPoint {
            date: pair[1].date,
            donations: (pair[1].donations - pair[0].donations).max(0),
            attack_wins: (pair[1].attack_wins - pair[0].attack_wins).max(0),
            war_stars: (pair[1].war_stars - pair[0].war_stars).max(0),
        })
        .collect()
}

/// Trailing `window`-day simple moving average over the deltas. The first
/// `window - 1` days have no defined average and are excluded, not
/// zero-filled.
pub fn moving_average(deltas: &[ActivityPoint], window: usize) -> Vec<TrendPoint> {
    if window == 0 || deltas.len() < window {
        return Vec::new();
    }
    let n = window as f64;
    deltas
        .windows(window)
        .map(|w| TrendPoint {
            date: w[window - 1].date,
            donations: w.iter().map(|d| d.donations).sum::<i64>() as f64 / n,
            attack_wins: w.iter().map(|d| d.attack_wins).sum::<i64>() as f64 / n,
            war_stars: w.iter().map(|d| d.war_stars).sum::<i64>() as f64 / n,
        })
        .collect()
}

/// Full derivation: group, delta, smooth.
pub fn derive_activity(samples: &[CumulativeSample], window: usize) -> ActivitySeries {
    let days = group_by_day(samples);
    let deltas = daily_deltas(&days);
    let trend = moving_average(&deltas, window);
    ActivitySeries { deltas, trend }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400;

    fn sample(ts: i64, donations: i64) -> CumulativeSample {
        CumulativeSample {
            timestamp: ts,
            donations,
            attack_wins: 0,
            war_stars: 0,
        }
    }

    #[test]
    fn consecutive_days_yield_clamped_deltas() {
        // Daily cumulative donations [100, 100, 180] -> deltas [0, 80];
        // the first day has no prior reference.
        let samples = vec![sample(0, 100), sample(DAY, 100), sample(2 * DAY, 180)];
        let deltas = daily_deltas(&group_by_day(&samples));
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].donations, 0);
        assert_eq!(deltas[1].donations, 80);
    }

    #[test]
    fn counter_reset_never_goes_negative() {
        let samples = vec![sample(0, 500), sample(DAY, 20)];
        let deltas = daily_deltas(&group_by_day(&samples));
        assert_eq!(deltas[0].donations, 0);
    }

    #[test]
    fn same_day_samples_keep_the_maximum() {
        let samples = vec![
            sample(0, 100),
            sample(3600, 90), // transient dip, same day
            sample(7200, 120),
        ];
        let days = group_by_day(&samples);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].donations, 120);
    }

    #[test]
    fn unsorted_input_is_ordered_by_day() {
        let samples = vec![sample(2 * DAY, 180), sample(0, 100), sample(DAY, 140)];
        let days = group_by_day(&samples);
        let dates: Vec<_> = days.iter().map(|d| d.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn moving_average_excludes_warmup_days() {
        let deltas: Vec<ActivityPoint> = (0..10)
            .map(|i| ActivityPoint {
                date: DateTime::<Utc>::from_timestamp(i * DAY, 0).unwrap().date_naive(),
                donations: 7,
                attack_wins: 0,
                war_stars: 0,
            })
            .collect();

        let trend = moving_average(&deltas, 7);
        assert_eq!(trend.len(), 10 - 7 + 1);
        assert_eq!(trend[0].date, deltas[6].date);
        assert!((trend[0].donations - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_series_has_no_trend() {
        let samples = vec![sample(0, 100), sample(DAY, 150)];
        let series = derive_activity(&samples, 7);
        assert_eq!(series.deltas.len(), 1);
        assert!(series.trend.is_empty());
    }
}
