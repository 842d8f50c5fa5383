use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeDelta};

use crate::domain::intensity_table::IntensityTable;
use crate::domain::models::IntensityBucket;

pub fn ts(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .expect("test timestamp should parse")
}

pub fn bucket(start: &str, direct: f64, lca: f64) -> IntensityBucket {
    IntensityBucket {
        bucket_start: ts(start),
        direct_intensity: direct,
        lca_intensity: lca,
    }
}

/// Consecutive hourly buckets beginning at `first_hour`.
pub fn hourly_table(first_hour: &str, intensities: &[(f64, f64)]) -> IntensityTable {
    let first = ts(first_hour);
    let buckets = intensities
        .iter()
        .enumerate()
        .map(|(offset, (direct, lca))| IntensityBucket {
            bucket_start: first + TimeDelta::hours(offset as i64),
            direct_intensity: *direct,
            lca_intensity: *lca,
        })
        .collect();
    IntensityTable::from_buckets(buckets).expect("test table should build")
}

pub fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("fixture should be writable");
    path
}

pub fn testdata(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(path)
}
