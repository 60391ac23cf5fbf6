//! Square gene-by-gene adjacency matrices.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::schema::EdgeStats;
use crate::table::{join_record, parse_cell, split_record};
use crate::{GrnOpsError, Result};

/// Entries with an absolute weight below this are treated as no edge.
pub const ZERO_THRESHOLD: f64 = 1e-8;

#[derive(Clone, Debug, PartialEq)]
pub struct AdjacencyMatrix {
    pub labels: Vec<String>,
    /// Row-major `n * n`; `values[i * n + j]` is the weight of edge i -> j.
    pub values: Vec<f64>,
}

impl AdjacencyMatrix {
    pub fn zeros(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self { labels, values: vec![0.0; n * n] }
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size() + j]
    }

    /// Zeroes near-zero (and NaN) entries in place.
    pub fn threshold(&mut self, eps: f64) {
        for v in &mut self.values {
            if v.is_nan() || v.abs() < eps {
                *v = 0.0;
            }
        }
    }

    pub fn zero_diagonal(&mut self) {
        let n = self.size();
        for i in 0..n {
            self.values[i * n + i] = 0.0;
        }
    }

    /// Edge count and weight statistics over non-zero entries; all zero when
    /// the matrix has no edges.
    pub fn stats(&self) -> EdgeStats {
        let mut count = 0u64;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;

        for &v in self.values.iter().filter(|v| **v != 0.0 && !v.is_nan()) {
            count += 1;
            sum += v;
            max = max.max(v);
            min = min.min(v);
        }

        if count == 0 {
            return EdgeStats::default();
        }
        EdgeStats {
            edges_count: count,
            mean_weight: sum / count as f64,
            max_weight: max,
            min_weight: min,
        }
    }

    /// Row/column labeled CSV bytes. Formatting is deterministic: the same
    /// matrix always serializes to the same bytes.
    pub fn to_csv_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let header = std::iter::once("").chain(self.labels.iter().map(String::as_str));
        // writing into a Vec<u8> cannot fail
        let _ = writeln!(out, "{}", join_record(header));
        let n = self.size();
        for (i, label) in self.labels.iter().enumerate() {
            let row = &self.values[i * n..(i + 1) * n];
            let cells = std::iter::once(label.clone()).chain(row.iter().map(|v| v.to_string()));
            let _ = writeln!(out, "{}", join_record(cells));
        }
        out
    }

    /// Writes the CSV file and returns the BLAKE3 hex digest of its bytes.
    pub fn write_csv(&self, path: &Path) -> Result<String> {
        let bytes = self.to_csv_bytes();
        fs::write(path, &bytes).map_err(|e| GrnOpsError::io(path, e))?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    /// Reads a square labeled matrix as produced by `write_csv` (or by an
    /// external inference tool using the same layout).
    pub fn read_csv(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| GrnOpsError::io(path, e))?;
        let bad = |msg: String| GrnOpsError::Execution(format!("{}: {msg}", path.display()));

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = split_record(lines.next().ok_or_else(|| bad("empty adjacency file".into()))?);
        let labels: Vec<String> = header.into_iter().skip(1).collect();
        let n = labels.len();

        let mut values = Vec::with_capacity(n * n);
        let mut rows = 0usize;
        for line in lines {
            let fields = split_record(line);
            if fields.len() != n + 1 {
                return Err(bad(format!("row {rows}: expected {} fields, found {}", n + 1, fields.len())));
            }
            for cell in &fields[1..] {
                values.push(parse_cell(cell).ok_or_else(|| bad(format!("non-numeric weight {cell:?}")))?);
            }
            rows += 1;
        }
        if rows != n {
            return Err(bad(format!("matrix is not square: {rows} rows for {n} columns")));
        }

        Ok(Self { labels, values })
    }
}
