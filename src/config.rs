use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::model::{IntensityMode, WavelengthUnit};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// How points closer than the coincidence tolerance are merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Replace the cluster by its mean wavelength and mean intensity.
    #[default]
    Average,
    /// Keep the point that came last in the source order.
    LastWins,
}

/// Scale of incoming transmittance values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmittanceScale {
    /// 0.0 – 1.0
    #[default]
    Fraction,
    /// 0 – 100
    Percent,
}

/// Configuration for turning raw samples into a canonical dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Exclusive lower bound of the plausibility band (default: 0.05 µm)
    pub min_wavelength_microns: f64,
    /// Exclusive upper bound of the plausibility band (default: 1000 µm)
    pub max_wavelength_microns: f64,
    /// Points closer than this are treated as one (default: 1e-6 µm)
    pub coincidence_tolerance_microns: f64,
    pub duplicate_policy: DuplicatePolicy,
    pub transmittance_scale: TransmittanceScale,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            min_wavelength_microns: 0.05,
            max_wavelength_microns: 1000.0,
            coincidence_tolerance_microns: 1e-6,
            duplicate_policy: DuplicatePolicy::Average,
            transmittance_scale: TransmittanceScale::Fraction,
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Display settings for a multi-dataset projection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub display_unit: WavelengthUnit,
    pub y_mode: IntensityMode,
    /// Rescale each dataset by its own maximum (default: false)
    pub normalize: bool,
    /// Present wavenumber axes high → low, as IR charts usually are (default: true)
    pub descending_wavenumber: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig {
            display_unit: WavelengthUnit::Microns,
            y_mode: IntensityMode::Absorbance,
            normalize: false,
            descending_wavenumber: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub normalize: NormalizeConfig,
    pub projection: ProjectionConfig,
}

impl ProcessingConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config = serde_json::from_str(text)?;
        log::debug!("Loaded processing config: {config:?}");
        Ok(config)
    }
}
