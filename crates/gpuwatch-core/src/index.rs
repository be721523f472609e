//! Per-device series index with binary-searchable time ranges.
//!
//! Each device owns a `Series`: samples in append order plus a parallel
//! vector of their timestamps. Range queries run two binary searches over the
//! timestamp vector and return a borrowed slice of samples, so a redraw costs
//! O(log n + k) no matter how long the log has grown.
//!
//! Appends must be non-decreasing per device. An earlier timestamp (clock
//! step on the sampling host) is rejected rather than inserted, since the
//! binary searches rely on sorted timestamps.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

use crate::sample::{DeviceId, Sample};

/// Why a sample was not stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppendError {
    #[error("device {device}: sample at {got} precedes last stored sample at {last}")]
    OutOfOrder {
        device: DeviceId,
        last: NaiveDateTime,
        got: NaiveDateTime,
    },
}

/// Inclusive time span covered by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Time-ordered samples for one device.
#[derive(Debug, Clone, Default)]
struct Series {
    timestamps: Vec<NaiveDateTime>,
    samples: Vec<Sample>,
}

impl Series {
    fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    fn push(&mut self, sample: Sample) -> Result<(), AppendError> {
        if let Some(&last) = self.timestamps.last()
            && sample.timestamp < last
        {
            return Err(AppendError::OutOfOrder {
                device: sample.device_id,
                last,
                got: sample.timestamp,
            });
        }
        self.timestamps.push(sample.timestamp);
        self.samples.push(sample);
        Ok(())
    }

    /// Samples with `start <= t <= end`, in order.
    fn range(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Sample] {
        if start > end {
            return &[];
        }
        let lo = self.timestamps.partition_point(|t| *t < start);
        let hi = self.timestamps.partition_point(|t| *t <= end);
        &self.samples[lo..hi]
    }
}

// ---------------------------------------------------------------------------
// SeriesIndex
// ---------------------------------------------------------------------------

/// All ingested samples, grouped by device.
#[derive(Debug, Clone, Default)]
pub struct SeriesIndex {
    series: BTreeMap<DeviceId, Series>,
    /// Every device seen this session. Survives rebuilds.
    devices: BTreeSet<DeviceId>,
    bounds: Option<Bounds>,
    len: usize,
}

impl SeriesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from samples in log order.
    ///
    /// Returns the index and the number of samples rejected as out of order.
    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> (Self, usize) {
        let mut index = Self::new();
        let rejected = index.rebuild_from(samples);
        (index, rejected)
    }

    /// Append one sample. O(1) amortized.
    pub fn append(&mut self, sample: Sample) -> Result<(), AppendError> {
        let ts = sample.timestamp;
        let device = sample.device_id;
        self.series.entry(device).or_default().push(sample)?;
        self.devices.insert(device);
        self.len += 1;
        self.bounds = Some(match self.bounds {
            None => Bounds { first: ts, last: ts },
            Some(b) => Bounds {
                first: b.first.min(ts),
                last: b.last.max(ts),
            },
        });
        Ok(())
    }

    /// Append a batch, returning how many samples were rejected.
    pub fn extend(&mut self, samples: impl IntoIterator<Item = Sample>) -> usize {
        let mut rejected = 0;
        for sample in samples {
            if let Err(e) = self.append(sample) {
                log::debug!("dropping sample: {e}");
                rejected += 1;
            }
        }
        if rejected > 0 {
            log::warn!("{rejected} out-of-order sample(s) rejected");
        }
        rejected
    }

    /// Discard all series and reindex from scratch.
    ///
    /// Used when the backing log shrank and the append-only assumption no
    /// longer holds. Previously discovered devices stay in [`devices`](Self::devices).
    pub fn rebuild_from(&mut self, samples: impl IntoIterator<Item = Sample>) -> usize {
        self.series.clear();
        self.bounds = None;
        self.len = 0;
        self.extend(samples)
    }

    /// Samples for `device` with `start <= t <= end`. Empty for unknown
    /// devices and out-of-range queries.
    pub fn range_query(&self, device: DeviceId, start: NaiveDateTime, end: NaiveDateTime) -> &[Sample] {
        self.series
            .get(&device)
            .map(|s| s.range(start, end))
            .unwrap_or_default()
    }

    /// Total samples across devices inside `[start, end]`.
    pub fn count_in(&self, start: NaiveDateTime, end: NaiveDateTime) -> usize {
        self.series.values().map(|s| s.range(start, end).len()).sum()
    }

    /// Earliest and latest timestamps across all devices.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Device ids discovered so far, ascending.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.iter().copied()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Newest sample for `device`.
    pub fn latest(&self, device: DeviceId) -> Option<&Sample> {
        self.series.get(&device).and_then(Series::last)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::tests::sample_at;

    fn ts(secs: i64) -> NaiveDateTime {
        sample_at(0, secs, 0.0).timestamp
    }

    #[test]
    fn empty_index_returns_empty_ranges() {
        let index = SeriesIndex::new();
        assert!(index.range_query(0, ts(0), ts(1_000)).is_empty());
        assert!(index.range_query(7, ts(-50), ts(50)).is_empty());
        assert_eq!(index.bounds(), None);
        assert!(index.is_empty());
    }

    #[test]
    fn range_query_is_inclusive_on_both_ends() {
        let (index, _) = SeriesIndex::from_samples((0..10).map(|i| sample_at(0, i, i as f64)));
        let hits = index.range_query(0, ts(3), ts(6));
        let secs: Vec<f64> = hits.iter().map(|s| s.utilization_pct).collect();
        assert_eq!(secs, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn range_query_matches_linear_filter() {
        // Non-decreasing with duplicates and gaps.
        let offsets = [0, 0, 1, 3, 3, 3, 7, 8, 8, 12, 20, 20, 21];
        let samples: Vec<Sample> = offsets
            .iter()
            .enumerate()
            .map(|(i, &t)| sample_at(0, t, i as f64))
            .collect();
        let (index, rejected) = SeriesIndex::from_samples(samples.clone());
        assert_eq!(rejected, 0);

        for start in -2..24 {
            for end in -2..24 {
                let expected: Vec<&Sample> = samples
                    .iter()
                    .filter(|s| s.timestamp >= ts(start) && s.timestamp <= ts(end))
                    .collect();
                let got: Vec<&Sample> = index.range_query(0, ts(start), ts(end)).iter().collect();
                assert_eq!(got, expected, "range [{start}, {end}]");
            }
        }
    }

    #[test]
    fn range_query_with_start_after_end_is_empty() {
        let (index, _) = SeriesIndex::from_samples((0..5).map(|i| sample_at(0, i, 0.0)));
        assert!(index.range_query(0, ts(4), ts(1)).is_empty());
    }

    #[test]
    fn range_query_outside_data_is_empty() {
        let (index, _) = SeriesIndex::from_samples((10..20).map(|i| sample_at(0, i, 0.0)));
        assert!(index.range_query(0, ts(0), ts(9)).is_empty());
        assert!(index.range_query(0, ts(21), ts(99)).is_empty());
        assert!(index.range_query(1, ts(10), ts(20)).is_empty());
    }

    #[test]
    fn out_of_order_append_is_rejected() {
        let mut index = SeriesIndex::new();
        index.append(sample_at(0, 10, 1.0)).unwrap();
        let err = index.append(sample_at(0, 5, 2.0)).unwrap_err();
        assert_eq!(
            err,
            AppendError::OutOfOrder {
                device: 0,
                last: ts(10),
                got: ts(5),
            }
        );
        assert_eq!(index.len(), 1);
        assert_eq!(index.latest(0).unwrap().utilization_pct, 1.0);
    }

    #[test]
    fn equal_timestamps_are_accepted() {
        let mut index = SeriesIndex::new();
        index.append(sample_at(0, 10, 1.0)).unwrap();
        index.append(sample_at(0, 10, 2.0)).unwrap();
        assert_eq!(index.range_query(0, ts(10), ts(10)).len(), 2);
    }

    #[test]
    fn ordering_is_per_device() {
        let mut index = SeriesIndex::new();
        index.append(sample_at(0, 10, 0.0)).unwrap();
        index.append(sample_at(1, 5, 0.0)).unwrap();
        assert_eq!(
            index.bounds(),
            Some(Bounds {
                first: ts(5),
                last: ts(10)
            })
        );
        assert_eq!(index.devices().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn extend_counts_rejections() {
        let mut index = SeriesIndex::new();
        let rejected = index.extend([sample_at(0, 3, 0.0), sample_at(0, 1, 0.0), sample_at(0, 4, 0.0)]);
        assert_eq!(rejected, 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn rebuild_discards_samples_but_keeps_devices() {
        let (mut index, _) = SeriesIndex::from_samples([sample_at(0, 0, 0.0), sample_at(3, 0, 0.0)]);
        index.rebuild_from([sample_at(0, 100, 0.0)]);
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.bounds(),
            Some(Bounds {
                first: ts(100),
                last: ts(100)
            })
        );
        assert_eq!(index.devices().collect::<Vec<_>>(), vec![0, 3]);
        assert!(index.range_query(3, ts(0), ts(1_000)).is_empty());
    }

    #[test]
    fn count_in_sums_devices() {
        let (index, _) =
            SeriesIndex::from_samples((0..10).flat_map(|i| [sample_at(0, i, 0.0), sample_at(1, i, 0.0)]));
        assert_eq!(index.count_in(ts(0), ts(4)), 10);
    }
}
