/// Data layer: parsing, unit conversion, normalization and projection.
///
/// Architecture:
/// ```text
///  .jdx / .json / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  dispatch by extension
///   └──────────┘
///        │  jcamp::parse / SpectralRecord
///        ▼
///   ┌───────────┐
///   │ normalize  │  → microns + absorbance, sorted, merged
///   └───────────┘
///        │
///        ▼
///   ┌─────────────────┐
///   │ SpectralDataset  │  canonical points, provenance
///   └─────────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ projection  │  shared display axis, one column per dataset
///   └────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  wide CSV
///   └──────────┘
/// ```

pub mod export;
pub mod jcamp;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod projection;
pub mod units;
