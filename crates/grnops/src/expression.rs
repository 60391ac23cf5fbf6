//! Gene expression matrices (genes as rows, samples as columns).

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};

use crate::table::{join_record, parse_cell, split_record};
use crate::{GrnOpsError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionMatrix {
    pub index_name: String,
    pub genes: Vec<String>,
    pub samples: Vec<String>,
    /// Row-major, `genes.len() * samples.len()`.
    pub values: Vec<f64>,
}

impl ExpressionMatrix {
    /// (genes, samples)
    pub fn shape(&self) -> (usize, usize) {
        (self.genes.len(), self.samples.len())
    }

    pub fn row(&self, gene: usize) -> &[f64] {
        let n = self.samples.len();
        &self.values[gene * n..(gene + 1) * n]
    }

    /// Reads a local CSV whose first column is the row index.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GrnOpsError::DatasetLoad(format!("Dataset not found: {}", path.display())));
        }
        let text = fs::read_to_string(path)
            .map_err(|e| GrnOpsError::DatasetLoad(format!("{}: {e}", path.display())))?;
        Self::from_csv_str(&text).map_err(|e| match e {
            GrnOpsError::DatasetLoad(msg) => GrnOpsError::DatasetLoad(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| GrnOpsError::DatasetLoad("empty file".into()))?;
        let header = split_record(header);
        if header.len() < 2 {
            return Err(GrnOpsError::DatasetLoad("expected an index column and at least one sample column".into()));
        }
        let index_name = header[0].clone();
        let samples: Vec<String> = header[1..].to_vec();

        let mut genes = Vec::new();
        let mut values = Vec::new();
        for (i, line) in lines {
            let line_no = i + 1;
            let fields = split_record(line);
            if fields.len() != header.len() {
                return Err(GrnOpsError::DatasetLoad(format!(
                    "line {line_no}: expected {} fields, found {}",
                    header.len(),
                    fields.len()
                )));
            }
            genes.push(fields[0].clone());
            for (col, cell) in fields[1..].iter().enumerate() {
                let v = parse_cell(cell).ok_or_else(|| {
                    GrnOpsError::DatasetLoad(format!(
                        "line {line_no}: non-numeric value {cell:?} in column {:?}",
                        samples[col]
                    ))
                })?;
                values.push(v);
            }
        }

        Ok(Self { index_name, genes, samples, values })
    }

    /// Builds a matrix from materialized hub records, re-indexed by the
    /// first column.
    pub fn from_records(columns: &[String], rows: &[Map<String, Value>]) -> Result<Self> {
        let (index_col, sample_cols) = columns
            .split_first()
            .ok_or_else(|| GrnOpsError::DatasetLoad("dataset has no columns".into()))?;

        let mut genes = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len() * sample_cols.len());
        for (row_idx, row) in rows.iter().enumerate() {
            let label = match row.get(index_col) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => {
                    return Err(GrnOpsError::DatasetLoad(format!("row {row_idx}: missing index value")))
                }
                Some(other) => other.to_string(),
            };
            genes.push(label);

            for col in sample_cols {
                let v = match row.get(col) {
                    Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
                    Some(Value::Null) | None => f64::NAN,
                    Some(Value::String(s)) => parse_cell(s).ok_or_else(|| {
                        GrnOpsError::DatasetLoad(format!("row {row_idx}: non-numeric value {s:?} in column {col:?}"))
                    })?,
                    Some(other) => {
                        return Err(GrnOpsError::DatasetLoad(format!(
                            "row {row_idx}: unsupported value {other} in column {col:?}"
                        )))
                    }
                };
                values.push(v);
            }
        }

        Ok(Self {
            index_name: index_col.clone(),
            genes,
            samples: sample_cols.to_vec(),
            values,
        })
    }

    /// Writes the matrix back out as CSV (used as input for external tools).
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut out = Vec::new();
        let header = std::iter::once(self.index_name.as_str()).chain(self.samples.iter().map(String::as_str));
        writeln!(out, "{}", join_record(header)).map_err(|e| GrnOpsError::io(path, e))?;
        for (g, gene) in self.genes.iter().enumerate() {
            let cells = std::iter::once(gene.clone()).chain(self.row(g).iter().map(|v| format_value(*v)));
            writeln!(out, "{}", join_record(cells)).map_err(|e| GrnOpsError::io(path, e))?;
        }
        fs::write(path, out).map_err(|e| GrnOpsError::io(path, e))
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}
