//! Bounding model input: median diagnosis age and row sampling.

use rand::seq::SliceRandom;
use rand::Rng;

use afibdash_store::ClinicalPictureRow;

/// Most recent rows always kept when sampling.
const MAX_RECENT_ROWS: usize = 40;
const MIN_RECENT_ROWS: usize = 10;

/// Median whole years since diagnosis over rows that state a year.
///
/// Years in the future are ignored. An even count averages the middle pair
/// before rounding.
pub fn median_years_since_diagnosis(rows: &[ClinicalPictureRow], current_year: i32) -> Option<i64> {
    let mut deltas: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.diagnosis_year)
        .map(|year| i64::from(current_year) - i64::from(year))
        .filter(|delta| *delta >= 0)
        .collect();
    if deltas.is_empty() {
        return None;
    }
    deltas.sort_unstable();

    let mid = deltas.len() / 2;
    let median = if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) as f64 / 2.0
    } else {
        deltas[mid] as f64
    };
    Some(median.round() as i64)
}

/// Keep the newest rows and fill the rest of `limit` with a uniform sample.
///
/// `rows` must be ordered newest first. When everything fits, all rows are
/// returned unchanged.
pub fn sample_rows<T: Clone, R: Rng + ?Sized>(rows: &[T], limit: usize, rng: &mut R) -> Vec<T> {
    if rows.len() <= limit {
        return rows.to_vec();
    }

    let recent_count = (limit / 3).clamp(MIN_RECENT_ROWS, MAX_RECENT_ROWS).min(limit);
    let (recent, rest) = rows.split_at(recent_count);
    let remaining = limit - recent_count;

    let mut sampled = recent.to_vec();
    sampled.extend(rest.choose_multiple(rng, remaining).cloned());
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn with_year(year: Option<i32>) -> ClinicalPictureRow {
        ClinicalPictureRow {
            id: 0,
            created_at: Utc::now(),
            diagnosis: None,
            description: None,
            diagnosis_year: year,
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        let rows: Vec<_> = [2020, 2015, 2024].into_iter().map(|y| with_year(Some(y))).collect();
        assert_eq!(median_years_since_diagnosis(&rows, 2025), Some(5));

        let rows: Vec<_> = [2020, 2021].into_iter().map(|y| with_year(Some(y))).collect();
        // (5 + 4) / 2 = 4.5 rounds up
        assert_eq!(median_years_since_diagnosis(&rows, 2025), Some(5));
    }

    #[test]
    fn test_median_ignores_missing_and_future_years() {
        let rows = vec![with_year(None), with_year(Some(2030)), with_year(Some(2019))];
        assert_eq!(median_years_since_diagnosis(&rows, 2025), Some(6));
        assert_eq!(median_years_since_diagnosis(&[with_year(None)], 2025), None);
        assert_eq!(median_years_since_diagnosis(&[], 2025), None);
    }

    #[test]
    fn test_sample_keeps_everything_under_limit() {
        let rows: Vec<u32> = (0..20).collect();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_rows(&rows, 120, &mut rng), rows);
    }

    #[test]
    fn test_sample_keeps_recent_prefix() {
        let rows: Vec<u32> = (0..500).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let sampled = sample_rows(&rows, 120, &mut rng);

        assert_eq!(sampled.len(), 120);
        // limit / 3 = 40 newest rows first
        assert_eq!(&sampled[..40], &rows[..40]);
        let unique: HashSet<_> = sampled.iter().collect();
        assert_eq!(unique.len(), 120);
        assert!(sampled[40..].iter().all(|n| *n >= 40));
    }

    #[test]
    fn test_sample_recent_floor() {
        let rows: Vec<u32> = (0..100).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let sampled = sample_rows(&rows, 20, &mut rng);
        assert_eq!(sampled.len(), 20);
        assert_eq!(&sampled[..10], &rows[..10]);
    }
}
