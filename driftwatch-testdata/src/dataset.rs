// Driftwatch Testdata - Stream structures
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Generated observation streams and their I/O.

use driftwatch::Observation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Testdata error types.
#[derive(Debug, Error)]
pub enum TestdataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid generator configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty stream")]
    Empty,
}

/// Metadata about a generated stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub profile: Option<String>,
    pub seed: Option<u64>,
    pub bucket_ms: Option<u64>,
    /// Number of injections applied during generation.
    pub injections: usize,
}

/// Observations in time order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationStream {
    pub metadata: StreamMetadata,
    pub observations: Vec<Observation>,
}

impl ObservationStream {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            metadata: StreamMetadata::default(),
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Sum of all counts.
    pub fn total_count(&self) -> u64 {
        self.observations.iter().map(|o| o.count).sum()
    }

    /// Observations grouped by timestamp, in time order.
    pub fn buckets(&self) -> BTreeMap<u64, Vec<&Observation>> {
        let mut buckets: BTreeMap<u64, Vec<&Observation>> = BTreeMap::new();
        for obs in &self.observations {
            buckets.entry(obs.timestamp_ms).or_default().push(obs);
        }
        buckets
    }

    /// Summed counts per category over `[start_ms, end_ms)`.
    pub fn category_totals(&self, start_ms: u64, end_ms: u64) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for obs in self
            .observations
            .iter()
            .filter(|o| o.timestamp_ms >= start_ms && o.timestamp_ms < end_ms)
        {
            *totals.entry(obs.category.clone()).or_insert(0) += obs.count;
        }
        totals
    }

    /// Export to CSV (`metric_key,category,timestamp_ms,count`).
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<(), TestdataError> {
        let mut writer = csv::Writer::from_writer(BufWriter::new(File::create(path)?));
        for obs in &self.observations {
            writer.serialize(obs)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Import from CSV.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, TestdataError> {
        let mut reader = csv::Reader::from_reader(BufReader::new(File::open(path)?));
        let observations = reader
            .deserialize()
            .collect::<Result<Vec<Observation>, csv::Error>>()?;
        if observations.is_empty() {
            return Err(TestdataError::Empty);
        }
        Ok(Self::new(observations))
    }

    /// Export to JSON, metadata included.
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<(), TestdataError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, TestdataError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stream() -> ObservationStream {
        ObservationStream::new(vec![
            Observation::new("en.wikipedia", "Main_Page", 0, 10),
            Observation::new("en.wikipedia", "Washington,_D.C.", 0, 3),
            Observation::new("en.wikipedia", "Main_Page", 1000, 7),
        ])
    }

    #[test]
    fn test_buckets_and_totals() {
        let s = stream();
        assert_eq!(s.total_count(), 20);
        let buckets = s.buckets();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[&0].len(), 2);

        let totals = s.category_totals(0, 1000);
        assert_eq!(totals["Main_Page"], 10);
        assert_eq!(totals["Washington,_D.C."], 3);
    }

    #[test]
    fn test_csv_roundtrip_with_commas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream.csv");
        stream().to_csv(&path).unwrap();

        let loaded = ObservationStream::from_csv(&path).unwrap();
        assert_eq!(loaded.observations, stream().observations);
    }

    #[test]
    fn test_empty_csv_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "metric_key,category,timestamp_ms,count\n").unwrap();
        assert!(matches!(
            ObservationStream::from_csv(&path),
            Err(TestdataError::Empty)
        ));
    }

    #[test]
    fn test_json_keeps_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream.json");
        let mut s = stream();
        s.metadata.seed = Some(7);
        s.to_json(&path).unwrap();

        let loaded = ObservationStream::from_json(&path).unwrap();
        assert_eq!(loaded.metadata.seed, Some(7));
        assert_eq!(loaded.len(), 3);
    }
}
