//! Per-track-size experiment reports.
//!
//! Aggregates run summaries into collision counts and average completion
//! ticks per track size, and exports them as JSON (`map<size>` keys) or as
//! space-delimited `(size, value)` rows. Several exported reports can be
//! averaged with [`compile`].

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::RunSummary;

const MAP_PREFIX: &str = "map";

/// Running totals for one track size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeStats {
    pub runs: u64,
    pub vehicles: u64,
    pub collisions: u64,
    pub finishes: u64,
    /// Sum of per-run mean finish ticks, over runs with at least one finisher.
    pub finish_ticks_sum: f64,
    pub runs_with_finish: u64,
}

impl SizeStats {
    /// Mean of the per-run average completion ticks.
    pub fn average_ticks(&self) -> Option<f64> {
        (self.runs_with_finish > 0).then(|| self.finish_ticks_sum / self.runs_with_finish as f64)
    }
}

/// One exported row set entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub collisions: f64,
    pub average_ticks: Option<f64>,
}

/// Accumulates run summaries per track size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentReport {
    sizes: BTreeMap<usize, SizeStats>,
}

impl ExperimentReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one run.
    pub fn record(&mut self, summary: &RunSummary) {
        let stats = self.sizes.entry(summary.track_size).or_default();
        stats.runs += 1;
        stats.vehicles += (summary.finished + summary.collided + summary.timed_out) as u64;
        stats.collisions += summary.collided as u64;
        stats.finishes += summary.finished as u64;
        if let Some(ticks) = summary.mean_finish_ticks {
            stats.finish_ticks_sum += ticks;
            stats.runs_with_finish += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Track sizes seen so far, ascending.
    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.sizes.keys().copied()
    }

    pub fn stats(&self, size: usize) -> Option<&SizeStats> {
        self.sizes.get(&size)
    }

    /// `(size, collisions)` rows.
    pub fn collision_rows(&self) -> Vec<(usize, u64)> {
        self.sizes.iter().map(|(&s, st)| (s, st.collisions)).collect()
    }

    /// `(size, average ticks)` rows for sizes where something finished.
    pub fn average_tick_rows(&self) -> Vec<(usize, f64)> {
        self.sizes
            .iter()
            .filter_map(|(&s, st)| st.average_ticks().map(|t| (s, t)))
            .collect()
    }

    /// Summary table keyed by track size.
    pub fn table(&self) -> BTreeMap<usize, ReportEntry> {
        self.sizes
            .iter()
            .map(|(&size, st)| {
                (
                    size,
                    ReportEntry {
                        collisions: st.collisions as f64,
                        average_ticks: st.average_ticks(),
                    },
                )
            })
            .collect()
    }

    /// JSON object with one `map<size>` entry per track size.
    pub fn to_json(&self) -> Value {
        table_to_json(&self.table())
    }

    /// Write the JSON export to disk.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&self.to_json())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

/// Encode a table with `map<size>` keys.
pub fn table_to_json(table: &BTreeMap<usize, ReportEntry>) -> Value {
    let mut map = Map::new();
    for (size, entry) in table {
        map.insert(
            format!("{MAP_PREFIX}{size}"),
            serde_json::json!({
                "collisions": entry.collisions,
                "average_ticks": entry.average_ticks,
            }),
        );
    }
    Value::Object(map)
}

/// Decode a table from a JSON export, ignoring keys that are not `map<size>`.
pub fn table_from_json(value: &Value) -> io::Result<BTreeMap<usize, ReportEntry>> {
    let object = value
        .as_object()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Report is not an object"))?;

    let mut table = BTreeMap::new();
    for (key, entry) in object {
        let Some(size) = key
            .strip_prefix(MAP_PREFIX)
            .and_then(|s| s.parse::<usize>().ok())
        else {
            continue;
        };
        let entry: ReportEntry = serde_json::from_value(entry.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        table.insert(size, entry);
    }
    Ok(table)
}

/// Read a JSON export from disk.
pub fn read_json<P: AsRef<Path>>(path: P) -> io::Result<BTreeMap<usize, ReportEntry>> {
    let contents = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    table_from_json(&value)
}

/// Average several experiments per track size. Average ticks are averaged
/// over the experiments that reported a value for that size.
pub fn compile(tables: &[BTreeMap<usize, ReportEntry>]) -> BTreeMap<usize, ReportEntry> {
    let mut sums: BTreeMap<usize, (f64, usize, f64, usize)> = BTreeMap::new();
    for table in tables {
        for (&size, entry) in table {
            let sum = sums.entry(size).or_default();
            sum.0 += entry.collisions;
            sum.1 += 1;
            if let Some(ticks) = entry.average_ticks {
                sum.2 += ticks;
                sum.3 += 1;
            }
        }
    }

    sums.into_iter()
        .map(|(size, (collisions, n, ticks, n_ticks))| {
            (
                size,
                ReportEntry {
                    collisions: collisions / n as f64,
                    average_ticks: (n_ticks > 0).then(|| ticks / n_ticks as f64),
                },
            )
        })
        .collect()
}

/// Write `(size, value)` rows, one space-delimited pair per line.
pub fn write_rows<P, T>(path: P, rows: &[(usize, T)]) -> io::Result<()>
where
    P: AsRef<Path>,
    T: Display,
{
    let mut writer = BufWriter::new(File::create(path)?);
    for (size, value) in rows {
        writeln!(writer, "{size} {value}")?;
    }
    writer.flush()
}
