//! Series containers.
//!
//! Imaging codecs live outside this crate; series travel as safetensors
//! archives whose file name keeps the imaging suffix, e.g.
//! `sub-01_task-rest_bold.nii.gz.safetensors`.  The suffix before
//! `.safetensors` selects the [`SeriesFormat`] and the tensor layout:
//!
//! | suffix          | format         | `data` layout  |
//! |-----------------|----------------|----------------|
//! | `.dtseries.nii` | grayordinates  | `[T, units]`   |
//! | `.func.gii`     | surface        | `[units, T]`   |
//! | `.nii[.gz]`     | volume         | `[X, Y, Z, T]` |
//!
//! Optional keys: `affine` `[4, 4]`, `tr` `[1]`, `mask` `[X, Y, Z]`.
use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, Axis};
use std::collections::HashMap;
use std::path::Path;

use crate::error::DenoiseError;

const CONTAINER_SUFFIX: &str = ".safetensors";

// ── Low-level safetensors parser ─────────────────────────────────────────────

/// One decoded tensor, values widened to `f64`.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

fn parse_header(bytes: &[u8]) -> Result<(serde_json::Map<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    let end = 8usize.checked_add(n).filter(|&e| e <= bytes.len());
    let Some(end) = end else {
        bail!("safetensors header length {n} exceeds file size {}", bytes.len());
    };
    let header: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

fn decode_tensor(name: &str, entry: &serde_json::Value, payload: &[u8]) -> Result<Tensor> {
    let dtype = entry["dtype"]
        .as_str()
        .with_context(|| format!("tensor '{name}': missing dtype"))?;
    let shape: Vec<usize> = entry["shape"]
        .as_array()
        .with_context(|| format!("tensor '{name}': missing shape"))?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize))
        .collect::<Option<_>>()
        .with_context(|| format!("tensor '{name}': bad shape"))?;
    let offsets: Vec<usize> = entry["data_offsets"]
        .as_array()
        .with_context(|| format!("tensor '{name}': missing data_offsets"))?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize))
        .collect::<Option<_>>()
        .with_context(|| format!("tensor '{name}': bad data_offsets"))?;
    let [start, stop] = offsets[..] else {
        bail!("tensor '{name}': data_offsets must have two entries");
    };
    if start > stop || stop > payload.len() {
        bail!("tensor '{name}': data_offsets [{start}, {stop}] out of range");
    }
    let raw = &payload[start..stop];

    let values: Vec<f64> = match dtype {
        "F64" => raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect(),
        "F32" => raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "I32" => raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
        "I16" => raw
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f64)
            .collect(),
        "U8" | "BOOL" => raw.iter().map(|&b| b as f64).collect(),
        other => bail!("tensor '{name}': unsupported dtype {other}"),
    };
    let expected: usize = shape.iter().product();
    if values.len() != expected {
        bail!(
            "tensor '{name}': shape {shape:?} needs {expected} values, payload holds {}",
            values.len()
        );
    }
    Ok(Tensor { shape, values })
}

/// Decode every tensor of a safetensors buffer (`__metadata__` skipped).
pub fn parse_tensors(bytes: &[u8]) -> Result<HashMap<String, Tensor>> {
    let (header, data_start) = parse_header(bytes)?;
    let payload = &bytes[data_start..];
    header
        .iter()
        .filter(|(k, _)| k.as_str() != "__metadata__")
        .map(|(k, v)| decode_tensor(k, v, payload).map(|t| (k.clone(), t)))
        .collect()
}

pub fn read_tensors(path: &Path) -> Result<HashMap<String, Tensor>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    parse_tensors(&bytes).with_context(|| format!("decoding {}", path.display()))
}

// ── Formats ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    Left,
    Right,
    Unknown,
}

impl Hemisphere {
    /// `hemi-L` / `L_bold` style markers in a file name.
    pub fn from_name(name: &str) -> Self {
        if name.contains("hemi-L") || name.contains("L_bold") {
            Hemisphere::Left
        } else if name.contains("hemi-R") || name.contains("R_bold") {
            Hemisphere::Right
        } else {
            Hemisphere::Unknown
        }
    }
}

/// Kind of series, selected by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesFormat {
    /// CIFTI dense time series (`.dtseries.nii`).
    Grayordinate,
    /// GIFTI functional surface (`.func.gii`).
    Surface { hemisphere: Hemisphere },
    /// NIfTI 4-D volume (`.nii`, `.nii.gz`).
    Volume,
}

impl SeriesFormat {
    /// Dispatch on the suffix, ignoring a trailing `.safetensors`.
    ///
    /// # Errors
    ///
    /// [`DenoiseError::Configuration`] for an unknown suffix.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let stem = name.strip_suffix(CONTAINER_SUFFIX).unwrap_or(name);
        if stem.ends_with(".dtseries.nii") {
            Ok(SeriesFormat::Grayordinate)
        } else if stem.ends_with(".func.gii") {
            Ok(SeriesFormat::Surface {
                hemisphere: Hemisphere::from_name(stem),
            })
        } else if stem.ends_with(".nii") || stem.ends_with(".nii.gz") {
            Ok(SeriesFormat::Volume)
        } else {
            Err(DenoiseError::configuration(format!(
                "unknown file suffix: {name} (expected .dtseries.nii, .func.gii, .nii or .nii.gz)"
            )))
        }
    }

    /// Output file name for this format.
    pub fn output_name(&self, prefix: &str, tag: &str) -> String {
        let base = match self {
            SeriesFormat::Grayordinate => format!("{prefix}_{tag}.dtseries.nii"),
            SeriesFormat::Surface { hemisphere } => match hemisphere {
                Hemisphere::Left => format!("{prefix}_{tag}_hemi-L_bold.func.gii"),
                Hemisphere::Right => format!("{prefix}_{tag}_hemi-R_bold.func.gii"),
                Hemisphere::Unknown => format!("{prefix}_{tag}_bold.func.gii"),
            },
            SeriesFormat::Volume => format!("{prefix}_{tag}_bold.nii.gz"),
        };
        base + CONTAINER_SUFFIX
    }
}

// ── Series image ─────────────────────────────────────────────────────────────

/// A `[units, T]` series together with its container metadata.
#[derive(Debug, Clone)]
pub struct SeriesImage {
    pub format: SeriesFormat,
    /// `[units, T]`.  For volumes, one row per in-mask voxel.
    pub data: Array2<f64>,
    /// `[X, Y, Z]` for volumes, `[units]` otherwise.
    pub spatial_shape: Vec<usize>,
    pub affine: Option<Array2<f64>>,
    tr: Option<f64>,
    /// Volumes only: flat (C-order) indices of the in-mask voxels.
    mask_indices: Option<Vec<usize>>,
}

impl SeriesImage {
    /// Wrap a `[units, T]` surface or grayordinate series.
    pub fn from_series(format: SeriesFormat, data: Array2<f64>, tr: Option<f64>) -> Self {
        Self {
            format,
            spatial_shape: vec![data.nrows()],
            data,
            affine: None,
            tr,
            mask_indices: None,
        }
    }

    /// Read a series container.
    ///
    /// For volumes, `mask_path` (a container with a `mask` or `data` tensor
    /// of shape `[X, Y, Z]`) overrides any `mask` stored alongside the data.
    pub fn load(path: &Path, mask_path: Option<&Path>) -> Result<Self> {
        let format = SeriesFormat::from_path(path)?;
        let mut tensors = read_tensors(path)?;
        let data = tensors
            .remove("data")
            .with_context(|| format!("{}: missing 'data' tensor", path.display()))?;

        let affine = match tensors.remove("affine") {
            Some(t) if t.shape == [4, 4] => Some(Array2::from_shape_vec((4, 4), t.values)?),
            Some(t) => bail!("{}: affine has shape {:?}, expected [4, 4]", path.display(), t.shape),
            None => None,
        };
        let tr = tensors.remove("tr").and_then(|t| t.values.first().copied());

        let image = match format {
            SeriesFormat::Grayordinate | SeriesFormat::Surface { .. } => {
                let [a, b] = data.shape[..] else {
                    bail!("{}: expected 2-D data, got shape {:?}", path.display(), data.shape);
                };
                let stored = Array2::from_shape_vec((a, b), data.values)?;
                let series = if format == SeriesFormat::Grayordinate {
                    stored.reversed_axes().as_standard_layout().to_owned()
                } else {
                    stored
                };
                Self {
                    format,
                    spatial_shape: vec![series.nrows()],
                    data: series,
                    affine,
                    tr,
                    mask_indices: None,
                }
            }
            SeriesFormat::Volume => {
                let [x, y, z, t] = data.shape[..] else {
                    bail!("{}: expected 4-D data, got shape {:?}", path.display(), data.shape);
                };
                let n_vox = x * y * z;
                // C-order [X, Y, Z, T] is [voxels, T] row by row.
                let full = Array2::from_shape_vec((n_vox, t), data.values)?;

                let mask = match mask_path {
                    Some(mp) => {
                        let mut m = read_tensors(mp)?;
                        Some(
                            m.remove("mask")
                                .or_else(|| m.remove("data"))
                                .with_context(|| format!("{}: no mask tensor", mp.display()))?,
                        )
                    }
                    None => tensors.remove("mask"),
                };
                let mask_indices = match mask {
                    Some(m) => {
                        if m.values.len() != n_vox {
                            bail!(
                                "mask has {} voxels, volume has {n_vox} ({x}×{y}×{z})",
                                m.values.len()
                            );
                        }
                        let idx: Vec<usize> = m
                            .values
                            .iter()
                            .enumerate()
                            .filter(|&(_, &v)| (v - 1.0).abs() < 1e-6)
                            .map(|(i, _)| i)
                            .collect();
                        Some(idx)
                    }
                    None => None,
                };
                let series = match &mask_indices {
                    Some(idx) => full.select(Axis(0), idx),
                    None => full,
                };
                tracing::debug!(
                    n_units = series.nrows(),
                    n_vox,
                    masked = mask_indices.is_some(),
                    "loaded volume"
                );
                Self {
                    format,
                    data: series,
                    spatial_shape: vec![x, y, z],
                    affine,
                    tr,
                    mask_indices,
                }
            }
        };
        Ok(image)
    }

    /// Write the series as F32 in its format's layout.  Voxels outside the
    /// mask are written as zero.
    pub fn save(&self, path: &Path) -> Result<()> {
        let n_t = self.n_timepoints();
        let mut w = StWriter::new();
        match self.format {
            SeriesFormat::Grayordinate => {
                let stored: Vec<f32> = self.data.t().iter().map(|&v| v as f32).collect();
                w.add_f32("data", &stored, &[n_t, self.n_units()]);
            }
            SeriesFormat::Surface { .. } => {
                let stored: Vec<f32> = self.data.iter().map(|&v| v as f32).collect();
                w.add_f32("data", &stored, &[self.n_units(), n_t]);
            }
            SeriesFormat::Volume => {
                let n_vox: usize = self.spatial_shape.iter().product();
                let mut full = vec![0f32; n_vox * n_t];
                let rows: Vec<usize> = match &self.mask_indices {
                    Some(idx) => idx.clone(),
                    None => (0..n_vox).collect(),
                };
                for (row, &vox) in self.data.outer_iter().zip(rows.iter()) {
                    for (t, &v) in row.iter().enumerate() {
                        full[vox * n_t + t] = v as f32;
                    }
                }
                let mut shape = self.spatial_shape.clone();
                shape.push(n_t);
                w.add_f32("data", &full, &shape);
                if let Some(idx) = &self.mask_indices {
                    let mut mask = vec![0u8; n_vox];
                    for &i in idx {
                        mask[i] = 1;
                    }
                    w.add_u8("mask", &mask, &self.spatial_shape);
                }
            }
        }
        if let Some(affine) = &self.affine {
            w.add_f64_arr2("affine", affine);
        }
        if let Some(tr) = self.tr {
            w.add_f64("tr", &[tr], &[1]);
        }
        w.write(path)
            .with_context(|| format!("writing {}", path.display()))
    }

    /// Same container with a new `[units, T']` series.  The frame count may
    /// change (e.g. after trimming), the unit count may not.
    pub fn with_data(&self, data: Array2<f64>) -> crate::Result<Self> {
        if data.nrows() != self.n_units() {
            return Err(DenoiseError::dimension_mismatch(
                "units in replacement series",
                self.n_units(),
                data.nrows(),
            ));
        }
        Ok(Self {
            data,
            ..self.clone()
        })
    }

    /// Replace the repetition time stored with the series.
    pub fn set_repetition_time(&mut self, tr: f64) -> crate::Result<()> {
        crate::config::validate_tr(tr)?;
        self.tr = Some(tr);
        Ok(())
    }

    pub fn repetition_time(&self) -> Option<f64> {
        self.tr
    }

    pub fn n_units(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_timepoints(&self) -> usize {
        self.data.ncols()
    }

    pub fn mask_indices(&self) -> Option<&[usize]> {
        self.mask_indices.as_deref()
    }
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Safetensors writer for F32, F64 and U8 tensors.
///
/// ```rust,no_run
/// use boldclean::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("data", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_f64("tr", &[2.0], &[1]);
/// w.write(Path::new("/tmp/out.nii.gz.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr1(&mut self, name: &str, arr: &Array1<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.len()]);
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_u8(&mut self, name: &str, data: &[u8], shape: &[usize]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", shape.to_vec()));
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let mut out = Vec::with_capacity(8 + hdr_bytes.len() + pad + offset);
        out.extend_from_slice(&((hdr_bytes.len() + pad) as u64).to_le_bytes());
        out.extend_from_slice(&hdr_bytes);
        out.extend(std::iter::repeat(b' ').take(pad));
        for (_, data, _, _) in &self.entries {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

// ── QC sidecar ───────────────────────────────────────────────────────────────

/// Write the DVARS traces (and FD when given) for the plotting tools.
pub fn write_qc(
    path: &Path,
    dvars_pre: &Array1<f64>,
    dvars_post: &Array1<f64>,
    fd: Option<&[f64]>,
) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr1("dvars_pre", dvars_pre);
    w.add_f64_arr1("dvars_post", dvars_post);
    if let Some(fd) = fd {
        w.add_f64("fd", fd, &[fd.len()]);
    }
    w.write(path)
        .with_context(|| format!("writing QC {}", path.display()))
}
