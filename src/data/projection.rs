use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ProjectionConfig;

use super::model::{
    CanonicalPoint, IntensityMode, ProjectedRow, SpectralDataset, WavelengthUnit,
};
use super::units;

// ---------------------------------------------------------------------------
// Projection output
// ---------------------------------------------------------------------------

/// Column description for one projected dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Wide table of several datasets re-sampled onto one shared axis.
///
/// `rows` are always ascending in the display unit. `descending` only tells
/// the presentation layer to show them high → low (wavenumber charts).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub display_unit: WavelengthUnit,
    pub y_mode: IntensityMode,
    pub normalized: bool,
    pub descending: bool,
    /// Datasets in the order they were passed in.
    pub series: Vec<Series>,
    pub rows: Vec<ProjectedRow>,
}

impl Projection {
    /// Rows in presentation order.
    pub fn display_rows(&self) -> impl Iterator<Item = &ProjectedRow> + '_ {
        let n = self.rows.len();
        (0..n).map(move |i| {
            if self.descending {
                &self.rows[n - 1 - i]
            } else {
                &self.rows[i]
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Projector
// ---------------------------------------------------------------------------

/// Project `datasets` onto the union of their display-unit x values.
///
/// Each cell holds the intensity of the dataset point nearest to the row's
/// x (measured in the display unit) when it lies within
/// [`WavelengthUnit::match_tolerance`]; otherwise the cell is `None`.
/// Nothing is interpolated.
pub fn project<'a, I>(datasets: I, config: &ProjectionConfig) -> Projection
where
    I: IntoIterator<Item = &'a SpectralDataset>,
{
    let datasets: Vec<&SpectralDataset> = datasets.into_iter().collect();
    let unit = config.display_unit;
    let axis = build_axis(&datasets, unit);

    let scales: Vec<f64> = datasets
        .iter()
        .map(|ds| normalization_divisor(ds, config))
        .collect();

    let tolerance = unit.match_tolerance();
    let rows = axis
        .into_iter()
        .map(|x| {
            let target_microns = units::to_microns(x, unit);
            let values: BTreeMap<String, Option<f64>> = datasets
                .iter()
                .zip(&scales)
                .map(|(ds, &scale)| {
                    let value = nearest_within(ds.points(), target_microns, x, unit, tolerance)
                        .map(|p| display_value(p.intensity, scale, config));
                    (ds.id.clone(), value)
                })
                .collect();
            ProjectedRow { x, values }
        })
        .collect::<Vec<_>>();

    log::debug!(
        "Projected {} datasets onto {} rows ({}, {})",
        datasets.len(),
        rows.len(),
        unit,
        config.y_mode
    );

    Projection {
        display_unit: unit,
        y_mode: config.y_mode,
        normalized: config.normalize,
        descending: unit == WavelengthUnit::Wavenumber && config.descending_wavenumber,
        series: datasets
            .iter()
            .map(|ds| Series {
                id: ds.id.clone(),
                name: ds.name.clone(),
                color: ds.color.clone(),
            })
            .collect(),
        rows,
    }
}

/// Sorted, de-duplicated union of every dataset's display x values.
fn build_axis(datasets: &[&SpectralDataset], unit: WavelengthUnit) -> Vec<f64> {
    let mut axis: Vec<f64> = datasets
        .iter()
        .flat_map(|ds| ds.points().iter())
        .map(|p| units::from_microns(p.wavelength_microns, unit))
        .filter(|x| x.is_finite() && *x > 0.0)
        .collect();
    axis.sort_by(f64::total_cmp);
    axis.dedup();
    axis
}

/// Per-dataset divisor for normalized absorbance output (1.0 otherwise).
fn normalization_divisor(ds: &SpectralDataset, config: &ProjectionConfig) -> f64 {
    if !config.normalize || config.y_mode == IntensityMode::Transmittance {
        return 1.0;
    }
    match ds.max_intensity() {
        Some(max) if max != 0.0 && max.is_finite() => max,
        _ => 1.0,
    }
}

fn display_value(intensity: f64, divisor: f64, config: &ProjectionConfig) -> f64 {
    match config.y_mode {
        IntensityMode::Transmittance if config.normalize => {
            units::transmittance_from_absorbance(intensity)
        }
        IntensityMode::Transmittance => units::transmittance_percent_from_absorbance(intensity),
        IntensityMode::Absorbance => intensity / divisor,
    }
}

/// Binary search for the point closest to `target_microns`.
///
/// Display conversions are monotone, so the nearest point in display units
/// is one of the two neighbours of the insertion position. Ties go to the
/// shorter wavelength.
///
/// The bound is inclusive: `tolerance` is the largest accepted offset, so a
/// point exactly that far away still fills the cell. Strict `<` would drop
/// it on grids spaced at exactly the tolerance step.
fn nearest_within(
    points: &[CanonicalPoint],
    target_microns: f64,
    display_x: f64,
    unit: WavelengthUnit,
    tolerance: f64,
) -> Option<&CanonicalPoint> {
    let idx = points.partition_point(|p| p.wavelength_microns < target_microns);
    let lower = idx.checked_sub(1).and_then(|i| points.get(i));
    let upper = points.get(idx);

    let distance =
        |p: &CanonicalPoint| (units::from_microns(p.wavelength_microns, unit) - display_x).abs();

    let best = match (lower, upper) {
        (Some(l), Some(u)) => {
            if distance(u) < distance(l) {
                u
            } else {
                l
            }
        }
        (Some(l), None) => l,
        (None, Some(u)) => u,
        (None, None) => return None,
    };

    (distance(best) <= tolerance).then_some(best)
}
