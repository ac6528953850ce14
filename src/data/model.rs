use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Units and conventions
// ---------------------------------------------------------------------------

/// The three wavelength representations the core understands.
///
/// Storage is always [`WavelengthUnit::Microns`]; the other two only appear
/// at the edges (source headers, display).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WavelengthUnit {
    Microns,
    Nanometers,
    /// Reciprocal centimeters (cm⁻¹).
    Wavenumber,
}

impl WavelengthUnit {
    /// Axis label used for the first export column.
    pub fn axis_label(self) -> &'static str {
        match self {
            WavelengthUnit::Microns => "Wavelength (um)",
            WavelengthUnit::Nanometers => "Wavelength (nm)",
            WavelengthUnit::Wavenumber => "Wavenumber (cm-1)",
        }
    }

    /// Point-matching tolerance for a projection displayed in this unit,
    /// expressed in the same unit.
    pub fn match_tolerance(self) -> f64 {
        match self {
            WavelengthUnit::Microns => 0.005,
            WavelengthUnit::Nanometers => 1.0,
            WavelengthUnit::Wavenumber => 1.0,
        }
    }

    /// Next display unit in the viewer's cycle.
    pub fn next(self) -> Self {
        match self {
            WavelengthUnit::Microns => WavelengthUnit::Nanometers,
            WavelengthUnit::Nanometers => WavelengthUnit::Wavenumber,
            WavelengthUnit::Wavenumber => WavelengthUnit::Microns,
        }
    }
}

impl fmt::Display for WavelengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WavelengthUnit::Microns => write!(f, "microns"),
            WavelengthUnit::Nanometers => write!(f, "nanometers"),
            WavelengthUnit::Wavenumber => write!(f, "wavenumber"),
        }
    }
}

impl FromStr for WavelengthUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "um" | "micron" | "microns" | "micrometers" => Ok(WavelengthUnit::Microns),
            "nm" | "nanometer" | "nanometers" => Ok(WavelengthUnit::Nanometers),
            "cm-1" | "1/cm" | "wavenumber" | "wavenumbers" => Ok(WavelengthUnit::Wavenumber),
            other => Err(format!("unknown wavelength unit '{other}'")),
        }
    }
}

/// Intensity convention declared by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityConvention {
    Absorbance,
    Transmittance,
    #[default]
    Unknown,
}

/// Intensity mode requested for display/export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityMode {
    #[default]
    Absorbance,
    Transmittance,
}

impl fmt::Display for IntensityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntensityMode::Absorbance => write!(f, "Absorbance"),
            IntensityMode::Transmittance => write!(f, "Transmittance"),
        }
    }
}

impl FromStr for IntensityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "abs" | "absorbance" => Ok(IntensityMode::Absorbance),
            "t" | "trans" | "transmittance" => Ok(IntensityMode::Transmittance),
            other => Err(format!("unknown intensity mode '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser output
// ---------------------------------------------------------------------------

/// One decoded (x, y) pair in source-native units, factors already applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub x: f64,
    pub y: f64,
}

/// Header information gathered while parsing; kept on the dataset as
/// provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseMetadata {
    pub x_unit: WavelengthUnit,
    pub y_convention: IntensityConvention,
    pub x_factor: f64,
    pub y_factor: f64,
    pub phase: Option<String>,
    pub instrument: Option<String>,
    pub title: Option<String>,
    /// Samples were emitted already divided by 1000 (nm → µm).
    #[serde(default)]
    pub nm_prescaled: bool,
    /// Compressed (ASDF) data lines were seen; output is best-effort.
    #[serde(default)]
    pub compressed: bool,
}

impl Default for ParseMetadata {
    fn default() -> Self {
        Self {
            x_unit: WavelengthUnit::Wavenumber,
            y_convention: IntensityConvention::Unknown,
            x_factor: 1.0,
            y_factor: 1.0,
            phase: None,
            instrument: None,
            title: None,
            nm_prescaled: false,
            compressed: false,
        }
    }
}

impl ParseMetadata {
    /// Unit the emitted sample x values are actually expressed in.
    pub fn sample_unit(&self) -> WavelengthUnit {
        if self.x_unit == WavelengthUnit::Nanometers && self.nm_prescaled {
            WavelengthUnit::Microns
        } else {
            self.x_unit
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical dataset
// ---------------------------------------------------------------------------

/// A single stored point: microns and raw (absorbance-like) intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPoint {
    pub wavelength_microns: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DatasetKind {
    #[default]
    Continuum,
    AtomicLineSet,
}

impl DatasetKind {
    /// Map a source's free-text category ("Compound", "Star", "Line", ...).
    pub fn from_category(category: &str) -> Self {
        match category.trim().to_ascii_lowercase().as_str() {
            "element" | "line" | "lines" => DatasetKind::AtomicLineSet,
            _ => DatasetKind::Continuum,
        }
    }
}

/// A normalized spectrum.
///
/// The point sequence is sorted strictly ascending by wavelength and never
/// changes after construction; only `visible` (and the display colour) are
/// meant to be touched afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct SpectralDataset {
    pub id: String,
    pub name: String,
    pub kind: DatasetKind,
    points: Vec<CanonicalPoint>,
    pub metadata: ParseMetadata,
    pub description: String,
    pub composition: Vec<String>,
    pub references: Vec<String>,
    pub color: String,
    pub visible: bool,
}

impl SpectralDataset {
    /// Only the normalizer builds datasets, so `points` is trusted to be
    /// sorted and de-duplicated here.
    pub(crate) fn from_canonical(
        name: String,
        kind: DatasetKind,
        points: Vec<CanonicalPoint>,
        metadata: ParseMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            kind,
            points,
            metadata,
            description: String::new(),
            composition: Vec::new(),
            references: Vec::new(),
            color: String::new(),
            visible: true,
        }
    }

    pub fn points(&self) -> &[CanonicalPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest raw intensity, or `None` for an empty dataset.
    pub fn max_intensity(&self) -> Option<f64> {
        self.points
            .iter()
            .map(|p| p.intensity)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
    }

    /// (first, last) wavelength in microns.
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some((first.wavelength_microns, last.wavelength_microns))
    }
}

// ---------------------------------------------------------------------------
// External records
// ---------------------------------------------------------------------------

/// Already-decoded spectrum handed over by a record source (LLM retrieval,
/// tuple tables). Bypasses the text parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpectralRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub category: String,
    /// `[wavelength, intensity]` tuples.
    pub data_points: Vec<[f64; 2]>,
    pub units_x: String,
    pub units_y: String,
    pub description: String,
    pub composition: Vec<String>,
    pub references: Vec<String>,
    pub phase: Option<String>,
    pub instrumentation: Option<String>,
}

// ---------------------------------------------------------------------------
// Projection output
// ---------------------------------------------------------------------------

/// One row of the wide projection table.
///
/// `values` is keyed by dataset id; `None` marks a gap (no point within
/// tolerance), which must never be rendered as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedRow {
    pub x: f64,
    pub values: BTreeMap<String, Option<f64>>,
}

impl ProjectedRow {
    /// Value for a dataset, flattening "unknown id" and "gap" together.
    pub fn value(&self, dataset_id: &str) -> Option<f64> {
        self.values.get(dataset_id).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(intensities: &[f64]) -> SpectralDataset {
        let points = intensities
            .iter()
            .enumerate()
            .map(|(i, &y)| CanonicalPoint {
                wavelength_microns: 1.0 + i as f64,
                intensity: y,
            })
            .collect();
        SpectralDataset::from_canonical(
            "test".into(),
            DatasetKind::Continuum,
            points,
            ParseMetadata::default(),
        )
    }

    #[test]
    fn metadata_defaults() {
        let meta = ParseMetadata::default();
        assert_eq!(meta.x_unit, WavelengthUnit::Wavenumber);
        assert_eq!(meta.y_convention, IntensityConvention::Unknown);
        assert_eq!(meta.x_factor, 1.0);
        assert_eq!(meta.y_factor, 1.0);
        assert!(meta.title.is_none());
    }

    #[test]
    fn prescaled_nanometers_are_microns() {
        let meta = ParseMetadata {
            x_unit: WavelengthUnit::Nanometers,
            nm_prescaled: true,
            ..Default::default()
        };
        assert_eq!(meta.sample_unit(), WavelengthUnit::Microns);

        let meta = ParseMetadata {
            x_unit: WavelengthUnit::Nanometers,
            ..Default::default()
        };
        assert_eq!(meta.sample_unit(), WavelengthUnit::Nanometers);
    }

    #[test]
    fn unit_parsing_and_cycle() {
        assert_eq!("um".parse::<WavelengthUnit>(), Ok(WavelengthUnit::Microns));
        assert_eq!("NM".parse::<WavelengthUnit>(), Ok(WavelengthUnit::Nanometers));
        assert_eq!("1/cm".parse::<WavelengthUnit>(), Ok(WavelengthUnit::Wavenumber));
        assert!("furlongs".parse::<WavelengthUnit>().is_err());

        let mut unit = WavelengthUnit::Microns;
        for _ in 0..3 {
            unit = unit.next();
        }
        assert_eq!(unit, WavelengthUnit::Microns);
    }

    #[test]
    fn category_maps_to_kind() {
        assert_eq!(DatasetKind::from_category("Line"), DatasetKind::AtomicLineSet);
        assert_eq!(DatasetKind::from_category("element"), DatasetKind::AtomicLineSet);
        assert_eq!(DatasetKind::from_category("Compound"), DatasetKind::Continuum);
        assert_eq!(DatasetKind::from_category(""), DatasetKind::Continuum);
    }

    #[test]
    fn dataset_summary_helpers() {
        let ds = dataset(&[0.2, 0.8, 0.5]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.max_intensity(), Some(0.8));
        assert_eq!(ds.wavelength_range(), Some((1.0, 3.0)));
        assert!(ds.visible);
        assert!(!ds.id.is_empty());

        let empty = dataset(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.max_intensity(), None);
        assert_eq!(empty.wavelength_range(), None);
    }

    #[test]
    fn record_reads_camel_case_json() {
        let json = r#"{
            "name": "Methane",
            "type": "Compound",
            "dataPoints": [[3.3, 0.9], [7.7, 0.4]],
            "unitsX": "Microns",
            "unitsY": "Absorbance"
        }"#;
        let record: SpectralRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "Methane");
        assert_eq!(record.category, "Compound");
        assert_eq!(record.data_points, vec![[3.3, 0.9], [7.7, 0.4]]);
        assert!(record.references.is_empty());
        assert!(record.phase.is_none());
    }

    #[test]
    fn projected_row_gap_lookup() {
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), Some(1.5));
        values.insert("b".to_string(), None);
        let row = ProjectedRow { x: 2.0, values };
        assert_eq!(row.value("a"), Some(1.5));
        assert_eq!(row.value("b"), None);
        assert_eq!(row.value("missing"), None);
    }
}
