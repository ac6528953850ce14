//! Wavelength and intensity conversions.
//!
//! All functions are total: non-positive wavelengths map to `0.0` instead of
//! producing infinities, so chart and export code never has to special-case.

use super::model::WavelengthUnit;

/// cm⁻¹ · µm.
pub const WAVENUMBER_MICRON_PRODUCT: f64 = 10_000.0;

/// Lowest transmittance fed into the logarithm (fully opaque samples).
pub const TRANSMITTANCE_FLOOR: f64 = 1e-4;

// ---------------------------------------------------------------------------
// Wavelength
// ---------------------------------------------------------------------------

pub fn microns_to_wavenumber(microns: f64) -> f64 {
    if microns > 0.0 {
        WAVENUMBER_MICRON_PRODUCT / microns
    } else {
        0.0
    }
}

pub fn wavenumber_to_microns(wavenumber: f64) -> f64 {
    if wavenumber > 0.0 {
        WAVENUMBER_MICRON_PRODUCT / wavenumber
    } else {
        0.0
    }
}

pub fn microns_to_nanometers(microns: f64) -> f64 {
    microns * 1000.0
}

pub fn nanometers_to_microns(nanometers: f64) -> f64 {
    nanometers / 1000.0
}

/// Convert a value expressed in `unit` to microns.
pub fn to_microns(value: f64, unit: WavelengthUnit) -> f64 {
    match unit {
        WavelengthUnit::Microns => value,
        WavelengthUnit::Nanometers => nanometers_to_microns(value),
        WavelengthUnit::Wavenumber => wavenumber_to_microns(value),
    }
}

/// Convert a value in microns to `unit`.
pub fn from_microns(microns: f64, unit: WavelengthUnit) -> f64 {
    match unit {
        WavelengthUnit::Microns => microns,
        WavelengthUnit::Nanometers => microns_to_nanometers(microns),
        WavelengthUnit::Wavenumber => microns_to_wavenumber(microns),
    }
}

/// Companion value for the chart's secondary axis: wavenumber for a
/// wavelength axis and microns for a wavenumber axis.
pub fn secondary_axis_value(x: f64, unit: WavelengthUnit) -> f64 {
    match unit {
        WavelengthUnit::Microns => microns_to_wavenumber(x),
        WavelengthUnit::Nanometers => microns_to_wavenumber(nanometers_to_microns(x)),
        WavelengthUnit::Wavenumber => wavenumber_to_microns(x),
    }
}

// ---------------------------------------------------------------------------
// Intensity
// ---------------------------------------------------------------------------

/// `A = -log10(T)` with `T` clamped to [`TRANSMITTANCE_FLOOR`].
pub fn absorbance_from_transmittance(transmittance: f64) -> f64 {
    -transmittance.max(TRANSMITTANCE_FLOOR).log10()
}

/// `T = 10^(-A)`, as a fraction.
pub fn transmittance_from_absorbance(absorbance: f64) -> f64 {
    10f64.powf(-absorbance)
}

/// Transmittance on the 0–100 scale.
pub fn transmittance_percent_from_absorbance(absorbance: f64) -> f64 {
    transmittance_from_absorbance(absorbance) * 100.0
}
