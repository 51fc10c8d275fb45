//! Confound tables and regressor matrices.
//!
//! * [`ConfoundTable`] – tab-separated table, one named column per
//!   regressor and one row per frame; `n/a` and empty cells read as NaN.
//! * [`drop_nonsteady`] – remove leading non-steady-state frames from a
//!   series and its table.
//! * [`select_acompcor`] – pick anatomical CompCor components by mask.
//! * [`parse_confound_matrix`] / [`read_confound_matrix`] – whitespace
//!   matrix stored `[T, regressors]`, returned `[regressors, T]`.
use std::path::Path;

use anyhow::Context;
use ndarray::{Array, Array1, Array2, Axis, Dimension, Slice};

use crate::error::{DenoiseError, Result};

/// Column marker of fMRIPrep's one-hot non-steady-state regressors.
pub const NONSTEADY_MARKER: &str = "non_steady_state";

/// Key marker of anatomical CompCor components in the metadata JSON.
pub const ACOMPCOR_MARKER: &str = "a_comp_cor";

/// Named numeric columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfoundTable {
    names: Vec<String>,
    /// Column-major: `columns[j][t]`.
    columns: Vec<Vec<f64>>,
}

impl ConfoundTable {
    /// Build from names and columns.
    ///
    /// # Errors
    ///
    /// [`DenoiseError::DimensionMismatch`] if the name and column counts
    /// differ or the columns have different lengths.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(DenoiseError::dimension_mismatch(
                "confound column names vs columns",
                names.len(),
                columns.len(),
            ));
        }
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(DenoiseError::dimension_mismatch(
                    "rows in confound column",
                    first.len(),
                    bad.len(),
                ));
            }
        }
        Ok(Self { names, columns })
    }

    /// Parse tab-separated text with a header line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| DenoiseError::configuration("confound table is empty"))?;
        let names: Vec<String> = header.split('\t').map(|s| s.trim().to_string()).collect();
        let mut columns = vec![Vec::new(); names.len()];

        for (row, line) in lines.enumerate() {
            let cells: Vec<&str> = line.split('\t').collect();
            if cells.len() != names.len() {
                return Err(DenoiseError::configuration(format!(
                    "confound table row {} has {} cells, header has {}",
                    row + 1,
                    cells.len(),
                    names.len()
                )));
            }
            for (j, cell) in cells.iter().enumerate() {
                columns[j].push(parse_cell(cell).ok_or_else(|| {
                    DenoiseError::configuration(format!(
                        "confound table row {}, column '{}': cannot parse '{}'",
                        row + 1,
                        names[j],
                        cell.trim()
                    ))
                })?);
            }
        }
        Ok(Self { names, columns })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading confound table {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing confound table {}", path.display()))
    }

    /// Tab-separated text; NaN is written as `n/a`.
    pub fn to_tsv(&self) -> String {
        let mut out = self.names.join("\t");
        out.push('\n');
        for t in 0..self.n_rows() {
            let row: Vec<String> = self
                .columns
                .iter()
                .map(|c| {
                    if c[t].is_nan() {
                        "n/a".to_string()
                    } else {
                        c[t].to_string()
                    }
                })
                .collect();
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_tsv())
            .with_context(|| format!("writing confound table {}", path.display()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|j| self.columns[j].as_slice())
    }

    /// The named columns as a `[regressors, T]` matrix, in the order given.
    ///
    /// # Errors
    ///
    /// [`DenoiseError::Configuration`] for a name that is not in the table.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>> {
        let n_t = self.n_rows();
        let mut out = Array2::<f64>::zeros((names.len(), n_t));
        for (r, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let col = self.column(name).ok_or_else(|| {
                DenoiseError::configuration(format!("confound column '{name}' not found"))
            })?;
            out.row_mut(r).assign(&Array1::from(col.to_vec()));
        }
        Ok(out)
    }

    /// Table without its first `k` rows.
    pub fn skip_rows(&self, k: usize) -> Self {
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| c[k.min(c.len())..].to_vec())
                .collect(),
        }
    }

    /// Row indices where the non-steady-state columns sum to more than zero
    /// (NaN cells skipped).
    pub fn nonsteady_rows(&self) -> Vec<usize> {
        let flagged: Vec<&Vec<f64>> = self
            .names
            .iter()
            .zip(&self.columns)
            .filter(|(n, _)| n.contains(NONSTEADY_MARKER))
            .map(|(_, c)| c)
            .collect();
        (0..self.n_rows())
            .filter(|&t| {
                flagged
                    .iter()
                    .map(|c| c[t])
                    .filter(|v| !v.is_nan())
                    .sum::<f64>()
                    > 0.0
            })
            .collect()
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    match cell.trim() {
        "" | "n/a" | "N/A" | "na" => Some(f64::NAN),
        s => s.parse().ok(),
    }
}

/// Remove leading non-steady-state frames.
///
/// The series may have any rank; its last axis is time.  `k` flagged rows
/// remove the first `k` frames of the series and the first `k` rows of the
/// table.  Without flagged rows both inputs come back unchanged.
///
/// # Errors
///
/// * [`DenoiseError::DimensionMismatch`] if the table row count differs from
///   the frame count.
/// * [`DenoiseError::Configuration`] if the flagged rows are not the leading
///   run `0..k`.
pub fn drop_nonsteady<D: Dimension>(
    series: &Array<f64, D>,
    table: &ConfoundTable,
) -> Result<(Array<f64, D>, ConfoundTable)> {
    let time_axis = Axis(series.ndim().saturating_sub(1));
    let n_t = if series.ndim() == 0 { 0 } else { series.len_of(time_axis) };
    if table.n_rows() != n_t {
        return Err(DenoiseError::dimension_mismatch(
            "confound table rows vs series frames",
            n_t,
            table.n_rows(),
        ));
    }

    let flagged = table.nonsteady_rows();
    let k = flagged.len();
    if flagged.iter().enumerate().any(|(i, &t)| i != t) {
        return Err(DenoiseError::configuration(format!(
            "non-steady-state frames {flagged:?} are not a leading run"
        )));
    }
    if k == 0 {
        tracing::info!("no non-steady-state volumes");
        return Ok((series.clone(), table.clone()));
    }

    tracing::info!(k, "dropping leading non-steady-state volumes");
    let trimmed = series.slice_axis(time_axis, Slice::from(k..)).to_owned();
    Ok((trimmed, table.skip_rows(k)))
}

/// Select anatomical CompCor regressors.
///
/// `metadata` is the confound JSON sidecar: an object keyed by component
/// name with `Mask` (`"CSF"` / `"WM"`), `Retained` and `VarianceExplained`
/// fields.  Retained components are taken in key order, the first
/// `n_per_mask` CSF components then the first `n_per_mask` WM components.
///
/// Returns the `[2·n_per_mask, T]` matrix and the selected names.
///
/// # Errors
///
/// * [`DenoiseError::Configuration`] if `metadata` is not an object or a
///   selected component has no column in `table`.
/// * [`DenoiseError::InsufficientData`] if a mask has fewer than
///   `n_per_mask` retained components.
pub fn select_acompcor(
    table: &ConfoundTable,
    metadata: &serde_json::Value,
    n_per_mask: usize,
) -> Result<(Array2<f64>, Vec<String>)> {
    let obj = metadata
        .as_object()
        .ok_or_else(|| DenoiseError::configuration("confound metadata is not a JSON object"))?;

    let mut keys: Vec<&String> = obj
        .iter()
        .filter(|(k, v)| {
            k.contains(ACOMPCOR_MARKER) && v.get("Retained").and_then(|r| r.as_bool()) == Some(true)
        })
        .map(|(k, _)| k)
        .collect();
    keys.sort();

    let of_mask = |mask: &str| -> Vec<String> {
        keys.iter()
            .filter(|k| obj[k.as_str()].get("Mask").and_then(|m| m.as_str()) == Some(mask))
            .map(|k| k.to_string())
            .collect()
    };
    let csf = of_mask("CSF");
    let wm = of_mask("WM");
    if csf.len() < n_per_mask {
        return Err(DenoiseError::insufficient_data(
            "retained CSF aCompCor components",
            n_per_mask,
            csf.len(),
        ));
    }
    if wm.len() < n_per_mask {
        return Err(DenoiseError::insufficient_data(
            "retained WM aCompCor components",
            n_per_mask,
            wm.len(),
        ));
    }

    let names: Vec<String> = csf
        .into_iter()
        .take(n_per_mask)
        .chain(wm.into_iter().take(n_per_mask))
        .collect();
    let matrix = table.select(&names)?;
    tracing::debug!(?names, "selected aCompCor components");
    Ok((matrix, names))
}

/// Parse a whitespace-separated matrix stored one frame per line
/// (`[T, regressors]`) and return it as `[regressors, T]`.
pub fn parse_confound_matrix(text: &str) -> Result<Array2<f64>> {
    let rows: Vec<Vec<f64>> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            line.split_whitespace()
                .map(|tok| {
                    parse_cell(tok).ok_or_else(|| {
                        DenoiseError::configuration(format!(
                            "confound matrix line {}: cannot parse '{tok}'",
                            i + 1
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;

    let n_t = rows.len();
    let n_reg = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().find(|r| r.len() != n_reg) {
        return Err(DenoiseError::dimension_mismatch(
            "values per confound matrix line",
            n_reg,
            bad.len(),
        ));
    }
    Ok(Array2::from_shape_fn((n_reg, n_t), |(r, t)| rows[t][r]))
}

pub fn read_confound_matrix(path: &Path) -> anyhow::Result<Array2<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading confound matrix {}", path.display()))?;
    parse_confound_matrix(&text)
        .with_context(|| format!("parsing confound matrix {}", path.display()))
}

/// Write `[regressors, T]` as space-separated lines, one frame per line.
pub fn write_confound_matrix(path: &Path, matrix: &Array2<f64>) -> anyhow::Result<()> {
    let mut out = String::new();
    for frame in matrix.axis_iter(Axis(1)) {
        let line: Vec<String> = frame.iter().map(|v| v.to_string()).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("writing confound matrix {}", path.display()))
}

/// Read one number per whitespace token (e.g. a framewise-displacement trace).
pub fn read_vector(path: &Path) -> anyhow::Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    text.split_whitespace()
        .map(|tok| {
            parse_cell(tok).with_context(|| format!("{}: cannot parse '{tok}'", path.display()))
        })
        .collect()
}
