//! Moving Average Engine.
//!
//! Pure functions over closing prices: rolling means, paired short/long
//! samples, and resampling of a fine series into coarser UTC buckets.

use chrono::{DateTime, Utc};

use crate::types::{MovingAverageSample, TimeSeries, TimeSeriesPoint};

/// Rolling arithmetic mean with the same length as `closes`.
///
/// Index `i` is `Some` only when `i >= window - 1`; earlier positions are
/// undefined rather than zero. A zero window yields no values.
pub fn rolling_mean(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if window == 0 {
        return out;
    }

    for (i, w) in closes.windows(window).enumerate() {
        out[i + window - 1] = Some(w.iter().sum::<f64>() / window as f64);
    }

    out
}

/// Short and long rolling means aligned with the series timestamps.
pub fn moving_average_samples(
    series: &TimeSeries,
    short_period: usize,
    long_period: usize,
) -> Vec<MovingAverageSample> {
    let closes = series.closes();
    let short = rolling_mean(&closes, short_period);
    let long = rolling_mean(&closes, long_period);

    series
        .points()
        .iter()
        .zip(short.into_iter().zip(long))
        .map(|(p, (short, long))| MovingAverageSample {
            ts: p.ts,
            short,
            long,
        })
        .collect()
}

/// Start of the `bucket_hours` bucket containing `ts`, aligned to epoch multiples.
pub fn bucket_start(ts: DateTime<Utc>, bucket_hours: u32) -> DateTime<Utc> {
    let width = i64::from(bucket_hours.max(1)) * 3_600;
    let secs = ts.timestamp().div_euclid(width) * width;
    DateTime::from_timestamp(secs, 0).unwrap_or(ts)
}

/// Aggregates `series` into `bucket_hours` candles.
///
/// Each bucket covers `[start, start + bucket_hours)`. The bucket close is the
/// last raw close inside it; open is the first open, high/low the extremes.
/// Buckets without raw points are omitted, never forward-filled.
pub fn resample(series: &TimeSeries, bucket_hours: u32) -> TimeSeries {
    let mut buckets: Vec<TimeSeriesPoint> = Vec::new();

    for p in series.points() {
        let start = bucket_start(p.ts, bucket_hours);

        match buckets.last_mut() {
            Some(b) if b.ts == start => {
                b.high = b.high.max(p.high);
                b.low = b.low.min(p.low);
                b.close = p.close;
            }
            _ => buckets.push(TimeSeriesPoint {
                ts: start,
                open: p.open,
                high: p.high,
                low: p.low,
                close: p.close,
            }),
        }
    }

    TimeSeries::new(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn hourly(closes: &[f64]) -> TimeSeries {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, c)| TimeSeriesPoint::from_close(base + Duration::hours(i as i64), *c)),
        )
    }

    #[test]
    fn undefined_before_window_fills() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn zero_window_is_undefined() {
        assert!(rolling_mean(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }

    #[test]
    fn samples_pair_short_and_long() {
        let s = hourly(&[10.0, 10.0, 10.0, 9.0, 11.0, 12.0]);
        let samples = moving_average_samples(&s, 2, 3);

        assert_eq!(samples.len(), 6);
        assert_eq!(samples[0].short, None);
        assert_eq!(samples[1].short, Some(10.0));
        assert_eq!(samples[1].long, None);
        assert_eq!(samples[4].short, Some(10.0));
        assert_eq!(samples[4].long, Some(10.0));
        assert_eq!(samples[5].short, Some(11.5));
        assert_eq!(samples[5].ts, s.points()[5].ts);
    }

    #[test]
    fn resample_to_four_hours_takes_last_close() {
        let s = hourly(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let r = resample(&s, 4);

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.points()[0].ts, base);
        assert_eq!(r.points()[0].close, 4.0);
        assert_eq!(r.points()[0].open, 1.0);
        assert_eq!(r.points()[0].high, 4.0);
        assert_eq!(r.points()[0].low, 1.0);
        assert_eq!(r.points()[1].ts, base + Duration::hours(4));
        assert_eq!(r.points()[1].close, 5.0);
    }

    #[test]
    fn resample_aligns_to_epoch_not_first_point() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 2, 30, 0).unwrap();
        let s = TimeSeries::new(vec![
            TimeSeriesPoint::from_close(base, 1.0),
            TimeSeriesPoint::from_close(base + Duration::hours(1), 2.0),
            TimeSeriesPoint::from_close(base + Duration::hours(2), 3.0),
        ]);

        let r = resample(&s, 4);

        assert_eq!(r.closes(), vec![2.0, 3.0]);
        assert_eq!(r.points()[0].ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(r.points()[1].ts, Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap());
    }

    #[test]
    fn resample_omits_empty_buckets() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let s = TimeSeries::new(vec![
            TimeSeriesPoint::from_close(base, 1.0),
            TimeSeriesPoint::from_close(base + Duration::hours(13), 2.0),
        ]);

        let r = resample(&s, 4);

        assert_eq!(r.len(), 2);
        assert_eq!(r.points()[1].ts, base + Duration::hours(12));
    }

    proptest! {
        #[test]
        fn short_input_has_no_defined_value(
            closes in prop::collection::vec(-1e6f64..1e6, 0..10),
            extra in 1usize..5,
        ) {
            let window = closes.len() + extra;
            prop_assert!(rolling_mean(&closes, window).iter().all(Option::is_none));
        }

        #[test]
        fn defined_values_equal_window_mean(
            closes in prop::collection::vec(-1e6f64..1e6, 1..60),
            window in 1usize..20,
        ) {
            let out = rolling_mean(&closes, window);
            prop_assert_eq!(out.len(), closes.len());

            for (i, v) in out.iter().enumerate() {
                if i + 1 < window {
                    prop_assert!(v.is_none());
                } else {
                    let slice = &closes[i + 1 - window..=i];
                    let expected = slice.iter().sum::<f64>() / window as f64;
                    let got = v.unwrap();
                    prop_assert!((got - expected).abs() <= 1e-9 * expected.abs().max(1.0));
                }
            }
        }
    }
}
