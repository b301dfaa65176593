//! Turns a density field into a colormapped PNG and a JSON report.

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgb, RgbImage};
use ndarray::Array2;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ColorMap;
use crate::error::Result;
use crate::field::DensityField;
use crate::physics::{BohrRadius, QuantumNumbers};

/// Control points of matplotlib's inferno, interpolated linearly in between
const INFERNO: [[f64; 3]; 9] = [
    [0.001462, 0.000466, 0.013866],
    [0.121380, 0.047550, 0.282623],
    [0.335217, 0.060060, 0.428524],
    [0.532495, 0.133743, 0.415573],
    [0.735683, 0.215906, 0.330245],
    [0.891820, 0.347315, 0.195350],
    [0.978422, 0.557937, 0.034931],
    [0.973416, 0.798968, 0.152264],
    [0.988362, 0.998364, 0.644924],
];

/// `wavefunction(n, l, m).png`
pub fn output_file_name(state: &QuantumNumbers) -> String {
    format!("wavefunction{}.png", state.label())
}

/// Map a value in [0, 1] to a color. Out-of-range input is clamped.
pub fn colorize(value: f64, colormap: ColorMap) -> Rgb<u8> {
    let t = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let [r, g, b] = match colormap {
        ColorMap::Inferno => interpolate(&INFERNO, t),
        ColorMap::GistHeat => [1.5 * t, 2.0 * t - 1.0, 4.0 * t - 3.0],
        ColorMap::Afmhot => [2.0 * t, 2.0 * t - 0.5, 2.0 * t - 1.0],
        ColorMap::GistGray => [t, t, t],
    };
    Rgb([to_byte(r), to_byte(g), to_byte(b)])
}

fn interpolate(stops: &[[f64; 3]], t: f64) -> [f64; 3] {
    let segments = (stops.len() - 1) as f64;
    let pos = t * segments;
    let idx = (pos.floor() as usize).min(stops.len() - 2);
    let frac = pos - idx as f64;
    let (a, b) = (stops[idx], stops[idx + 1]);
    [
        a[0] + (b[0] - a[0]) * frac,
        a[1] + (b[1] - a[1]) * frac,
        a[2] + (b[2] - a[2]) * frac,
    ]
}

fn to_byte(channel: f64) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Linear min-max scaling to [0, 1]; a flat field maps to all zeros.
pub fn normalize(values: &Array2<f64>) -> Array2<f64> {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = hi - lo;
    if !span.is_finite() || span <= 0.0 {
        return Array2::zeros(values.dim());
    }
    values.mapv(|v| (v - lo) / span)
}

/// Renders sqrt(density). Row 0 of the field is the top row of the image.
pub fn render_density(density: &DensityField, colormap: ColorMap) -> RgbImage {
    let scaled = normalize(&density.display());
    let (rows, cols) = scaled.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        colorize(scaled[[y as usize, x as usize]], colormap)
    })
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(bytes)
}

/// Writes the image as `output_dir/wavefunction(n, l, m).png`, creating the directory.
pub fn save_png(image: &RgbImage, output_dir: &Path, state: &QuantumNumbers) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(output_file_name(state));
    image.save(&path)?;
    Ok(path)
}

/// What the plot is annotated with, plus optionally the density values.
#[derive(Debug, Serialize)]
pub struct DensityReport {
    pub n: u32,
    pub l: u32,
    pub m: i32,
    pub a0: f64,
    pub label: String,
    pub orbital: String,
    pub file_name: String,
    pub rows: usize,
    pub cols: usize,
    pub extent: f64,
    pub max_density: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Array2<f64>>,
}

impl DensityReport {
    pub fn new(
        state: &QuantumNumbers,
        bohr_radius: BohrRadius,
        extent: f64,
        density: &DensityField,
        include_values: bool,
    ) -> Self {
        let (rows, cols) = density.shape();
        DensityReport {
            n: state.n(),
            l: state.l(),
            m: state.m_l(),
            a0: bohr_radius.value(),
            label: state.label(),
            orbital: state.orbital_name(),
            file_name: output_file_name(state),
            rows,
            cols,
            extent,
            max_density: density.max(),
            values: include_values.then(|| density.values().clone()),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
