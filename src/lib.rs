//! Spectral data normalization: JCAMP-DX parsing, unit conversion between
//! microns / nanometers / wavenumbers, and projection of several datasets
//! onto one display axis.

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod state;

pub use config::ProcessingConfig;
pub use data::model::{IntensityMode, SpectralDataset, SpectralRecord, WavelengthUnit};
pub use data::projection::{Projection, project};
pub use error::{Result, SpectraError};
pub use state::Workbench;
