//! Request-time aggregation over the raw result set
//!
//! Two derived views feed the dashboard: time-bucketed activity counts
//! (30-minute buckets across the trailing 12 hours, 2-hour buckets across
//! the trailing 48 hours) and per-map clear-time histograms with
//! 95th-percentile outlier clipping. Everything here is a pure function of
//! the input slice so the arithmetic is testable without a database.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::BTreeMap;

/// Recent activity: 30-minute buckets over the trailing 12 hours
pub const RECENT_BUCKET_SECS: i64 = 1800;
pub const RECENT_WINDOW_SECS: i64 = 12 * 3600;

/// Activity trend: 2-hour buckets over the trailing 48 hours
pub const TREND_BUCKET_SECS: i64 = 7200;
pub const TREND_WINDOW_SECS: i64 = 48 * 3600;

/// Histograms target ~15 bins between min and the clipped maximum
const TARGET_BINS: f64 = 15.0;

/// Percentile clipping only kicks in above this sample count; below it the
/// true maximum is a better display bound than a noisy percentile.
const CLIP_MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPoint {
    /// Short label for the chart axis, rendered in the display offset
    pub time: String,
    pub count: i64,
    /// Full bucket timestamp (`YYYY-MM-DD HH:MM`) for tooltips
    pub full_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    /// `"<start>-<start+width>s"`
    pub range: String,
    pub count: i64,
    /// Bin lower bound in whole seconds
    pub min: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapHistogram {
    pub map_name: String,
    pub data: Vec<HistogramBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_plays: i64,
    pub recent_activity: Vec<ActivityPoint>,
    pub activity_trend: Vec<ActivityPoint>,
    pub histograms: Vec<MapHistogram>,
}

/// Axis-label style for an activity series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    /// `HH:MM` — enough inside a 12-hour window
    TimeOfDay,
    /// `MM/DD HH:MM` — the 48-hour window spans day boundaries
    DateAndTime,
}

/// Group timestamps into fixed-width buckets and count occupancy.
///
/// Bucket start is `floor(ts / width) * width`; output is ascending by
/// bucket. Empty buckets are not back-filled: only buckets that saw at
/// least one event appear.
pub fn bucket_counts(timestamps: &[i64], bucket_secs: i64) -> Vec<(i64, i64)> {
    let mut buckets: BTreeMap<i64, i64> = BTreeMap::new();
    for ts in timestamps {
        let start = ts.div_euclid(bucket_secs) * bucket_secs;
        *buckets.entry(start).or_insert(0) += 1;
    }
    buckets.into_iter().collect()
}

/// Bucket timestamps in the display zone and render each point's labels.
///
/// Grouping shifts each timestamp by `offset` before flooring, so bucket
/// boundaries land on round wall-clock times in the display zone. A +9h
/// offset is not a multiple of the 2-hour trend width; flooring the raw
/// epoch instead would split one wall-clock bucket across two points.
pub fn activity_series(
    timestamps: &[i64],
    bucket_secs: i64,
    style: LabelStyle,
    offset: FixedOffset,
) -> Vec<ActivityPoint> {
    let shift = i64::from(offset.local_minus_utc());
    let shifted: Vec<i64> = timestamps.iter().map(|ts| ts + shift).collect();
    bucket_counts(&shifted, bucket_secs)
        .into_iter()
        .filter_map(|(start, count)| {
            // `start` is already a display-zone wall-clock epoch, so
            // formatting it without further conversion gives the
            // display-zone timestamp.
            let local = DateTime::from_timestamp(start, 0)?;
            let time = match style {
                LabelStyle::TimeOfDay => local.format("%H:%M").to_string(),
                LabelStyle::DateAndTime => local.format("%m/%d %H:%M").to_string(),
            };
            Some(ActivityPoint {
                time,
                count,
                full_date: local.format("%Y-%m-%d %H:%M").to_string(),
            })
        })
        .collect()
}

/// Build the clear-time histogram for one map.
///
/// With more than [`CLIP_MIN_SAMPLES`] samples the display upper bound is
/// the floor-indexed 95th-percentile value; otherwise the true maximum.
/// Bins are whole seconds wide (`max(1, ceil(range / 15))`), dense across
/// `[start, end)` with one extra bin of headroom past the clipped maximum.
/// Samples beyond the padded end are dropped from the histogram entirely, a
/// visualization-only exclusion of true outliers.
///
/// Returns `None` for an empty sample set.
pub fn clear_time_histogram(clear_times: &[f64]) -> Option<Vec<HistogramBin>> {
    if clear_times.is_empty() {
        return None;
    }

    let mut sorted = clear_times.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let min = sorted[0];
    let max_limit = if sorted.len() > CLIP_MIN_SAMPLES {
        let p95_index = (sorted.len() as f64 * 0.95).floor() as usize;
        sorted[p95_index]
    } else {
        sorted[sorted.len() - 1]
    };

    let bin_width = (((max_limit - min) / TARGET_BINS).ceil() as i64).max(1);
    let start = (min / bin_width as f64).floor() as i64 * bin_width;
    let end = (max_limit / bin_width as f64).ceil() as i64 * bin_width + bin_width;

    let mut bins: BTreeMap<i64, i64> = BTreeMap::new();
    let mut edge = start;
    while edge < end {
        bins.insert(edge, 0);
        edge += bin_width;
    }

    for t in &sorted {
        if *t > end as f64 {
            continue;
        }
        let bin = (t / bin_width as f64).floor() as i64 * bin_width;
        if let Some(count) = bins.get_mut(&bin) {
            *count += 1;
        }
    }

    Some(
        bins.into_iter()
            .map(|(bin_start, count)| HistogramBin {
                range: format!("{}-{}s", bin_start, bin_start + bin_width),
                count,
                min: bin_start,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_bucket_counts_boundary() {
        // 0 and 1799 share the first 30-minute bucket; 1800 opens the next.
        let counts = bucket_counts(&[0, 1799, 1800], 1800);
        assert_eq!(counts, vec![(0, 2), (1800, 1)]);
    }

    #[test]
    fn test_bucket_counts_ascending_order() {
        let counts = bucket_counts(&[7200, 0, 3600, 3601], 3600);
        assert_eq!(counts, vec![(0, 1), (3600, 2), (7200, 1)]);
    }

    #[test]
    fn test_bucket_counts_no_zero_fill() {
        // 0 and 7200 are two buckets apart; the empty middle bucket is absent.
        let counts = bucket_counts(&[0, 7200], 3600);
        assert_eq!(counts, vec![(0, 1), (7200, 1)]);
    }

    #[test]
    fn test_activity_labels_time_of_day() {
        // 2023-11-14 22:30:00 UTC
        let points = activity_series(&[1700000000], 1800, LabelStyle::TimeOfDay, offset_utc());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time, "22:00");
        assert_eq!(points[0].full_date, "2023-11-14 22:00");
        assert_eq!(points[0].count, 1);
    }

    #[test]
    fn test_activity_labels_respect_display_offset() {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        let points = activity_series(&[1700000000], 1800, LabelStyle::DateAndTime, jst);
        // 22:13 UTC is 07:13 the next day in JST, bucketed to 07:00.
        assert_eq!(points[0].time, "11/15 07:00");
        assert_eq!(points[0].full_date, "2023-11-15 07:00");
    }

    #[test]
    fn test_trend_buckets_align_to_display_zone_hours() {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        // 2023-11-14 23:30 and 2023-11-15 00:30 UTC are 08:30 and 09:30 JST:
        // one 08:00-10:00 wall-clock bucket. Flooring the raw epoch would
        // put them in separate buckets, since +9h is not a multiple of the
        // 2-hour width.
        let points = activity_series(
            &[1700004600, 1700008200],
            TREND_BUCKET_SECS,
            LabelStyle::DateAndTime,
            jst,
        );
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time, "11/15 08:00");
        assert_eq!(points[0].count, 2);
        assert_eq!(points[0].full_date, "2023-11-15 08:00");
    }

    #[test]
    fn test_histogram_percentile_clipping_above_ten_samples() {
        // 11 samples triggers clipping; p95 index = floor(11 * 0.95) = 10,
        // so max_limit is still the true max here.
        let times: Vec<f64> = (1..=11).map(|v| v as f64).collect();
        let bins = clear_time_histogram(&times).unwrap();

        assert_eq!(bins.len(), 11);
        assert_eq!(bins[0].min, 1);
        assert_eq!(bins[10].min, 11);
        assert!(bins.iter().all(|b| b.count == 1));
        assert_eq!(bins[0].range, "1-2s");
    }

    #[test]
    fn test_histogram_small_sample_uses_true_max() {
        let bins = clear_time_histogram(&[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].min, 5);
        assert_eq!(bins[0].count, 3);
        assert_eq!(bins[0].range, "5-6s");
    }

    #[test]
    fn test_histogram_clips_long_tail() {
        // 19 tight samples plus one extreme outlier: p95 index = floor(20 *
        // 0.95) = 19... which is the outlier itself, so use 21 samples where
        // index 19 lands inside the tight cluster.
        let mut times: Vec<f64> = (10..30).map(|v| v as f64).collect();
        times.push(10_000.0);
        let bins = clear_time_histogram(&times).unwrap();

        // p95 index = floor(21 * 0.95) = 19 -> value 29; the outlier falls
        // past the padded end and is dropped from every bin.
        let total: i64 = bins.iter().map(|b| b.count).sum();
        assert_eq!(total, 20);
        assert!(bins.iter().all(|b| b.min <= 30));
    }

    #[test]
    fn test_histogram_dense_bins_include_empty() {
        // Range 0..=30 with width max(1, ceil(30/15)) = 2; every bin in
        // range appears even when nothing lands in it.
        let bins = clear_time_histogram(&[0.0, 30.0]).unwrap();
        assert_eq!(bins[0].min, 0);
        let mins: Vec<i64> = bins.iter().map(|b| b.min).collect();
        let expected: Vec<i64> = (0..=30).step_by(2).collect();
        assert_eq!(mins, expected);
        assert_eq!(bins.iter().filter(|b| b.count == 0).count(), bins.len() - 2);
    }

    #[test]
    fn test_histogram_empty_input() {
        assert!(clear_time_histogram(&[]).is_none());
    }

    #[test]
    fn test_histogram_deterministic() {
        let times = [3.2, 9.9, 4.4, 7.1, 3.2];
        assert_eq!(clear_time_histogram(&times), clear_time_histogram(&times));
    }
}
