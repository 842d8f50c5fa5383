use chrono::{NaiveDateTime, Timelike};
use thiserror::Error;

use crate::domain::models::IntensityBucket;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntensityTableError {
    #[error("duplicate intensity bucket at {0}")]
    DuplicateBucket(NaiveDateTime),
    #[error("intensity bucket at {0} is not aligned to the hour")]
    UnalignedBucket(NaiveDateTime),
}

/// Hourly intensity buckets sorted by `bucket_start`, unique per hour.
/// Gaps between hours are allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntensityTable {
    buckets: Vec<IntensityBucket>,
}

impl IntensityTable {
    pub fn from_buckets(mut buckets: Vec<IntensityBucket>) -> Result<Self, IntensityTableError> {
        if let Some(bucket) = buckets
            .iter()
            .find(|bucket| !is_hour_aligned(bucket.bucket_start))
        {
            return Err(IntensityTableError::UnalignedBucket(bucket.bucket_start));
        }

        buckets.sort_by_key(|bucket| bucket.bucket_start);

        if let Some(pair) = buckets
            .windows(2)
            .find(|pair| pair[0].bucket_start == pair[1].bucket_start)
        {
            return Err(IntensityTableError::DuplicateBucket(pair[1].bucket_start));
        }

        Ok(Self { buckets })
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> &[IntensityBucket] {
        &self.buckets
    }

    /// First and last covered hour.
    pub fn coverage(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((
            self.buckets.first()?.bucket_start,
            self.buckets.last()?.bucket_start,
        ))
    }

    pub fn bucket_at(&self, hour: NaiveDateTime) -> Option<&IntensityBucket> {
        self.buckets
            .binary_search_by_key(&hour, |bucket| bucket.bucket_start)
            .ok()
            .map(|index| &self.buckets[index])
    }

    /// Buckets whose hour intersects the half-open range `[start, end)`.
    pub fn intersecting(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[IntensityBucket] {
        if end <= start {
            return &[];
        }

        let first = self
            .buckets
            .partition_point(|bucket| bucket.bucket_end() <= start);
        let last = self
            .buckets
            .partition_point(|bucket| bucket.bucket_start < end);

        &self.buckets[first..last.max(first)]
    }
}

pub fn floor_to_hour(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .date()
        .and_hms_opt(timestamp.hour(), 0, 0)
        .unwrap_or(timestamp)
}

pub fn is_hour_aligned(timestamp: NaiveDateTime) -> bool {
    timestamp.minute() == 0 && timestamp.second() == 0 && timestamp.nanosecond() == 0
}
