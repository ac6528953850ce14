use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::color::generate_palette;
use crate::config::{NormalizeConfig, ProcessingConfig, ProjectionConfig};
use crate::data::export;
use crate::data::jcamp;
use crate::data::loader;
use crate::data::model::{IntensityMode, SpectralDataset, SpectralRecord};
use crate::data::normalize::{normalize_parsed, normalize_record};
use crate::data::projection::{Projection, project};
use crate::data::units;
use crate::error::{Result, SpectraError};

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// A user note pinned to a wavelength.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub id: String,
    pub wavelength_microns: f64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Workbench state
// ---------------------------------------------------------------------------

/// The dataset store and view settings, independent of rendering.
///
/// Datasets only enter the store once fully normalized; a failed retrieval
/// leaves the existing datasets untouched.
pub struct Workbench {
    /// Loaded datasets, in the order they were added.
    datasets: Vec<SpectralDataset>,

    /// Applied to every incoming spectrum.
    pub normalize_config: NormalizeConfig,

    /// Current display unit / intensity mode / normalization.
    pub projection: ProjectionConfig,

    annotations: Vec<Annotation>,

    /// Status / error message for the user.
    pub status_message: Option<String>,
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new(ProcessingConfig::default())
    }
}

impl Workbench {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            datasets: Vec::new(),
            normalize_config: config.normalize,
            projection: config.projection,
            annotations: Vec::new(),
            status_message: None,
        }
    }

    pub fn datasets(&self) -> &[SpectralDataset] {
        &self.datasets
    }

    pub fn visible_datasets(&self) -> impl Iterator<Item = &SpectralDataset> + '_ {
        self.datasets.iter().filter(|ds| ds.visible)
    }

    pub fn get(&self, id: &str) -> Option<&SpectralDataset> {
        self.datasets.iter().find(|ds| ds.id == id)
    }

    // -- Ingestion --

    /// Parse, normalize and commit a JCAMP-DX text.
    pub fn add_jcamp_text(&mut self, text: &str) -> Result<&SpectralDataset> {
        let result = normalize_parsed(jcamp::parse(text), &self.normalize_config);
        self.commit_one(result)
    }

    /// Normalize and commit an already-decoded record.
    pub fn add_record(&mut self, record: &SpectralRecord) -> Result<&SpectralDataset> {
        let result = normalize_record(record, &self.normalize_config);
        self.commit_one(result)
    }

    /// Load every spectrum of a file; returns how many were added.
    pub fn add_file(&mut self, path: &Path) -> Result<usize> {
        match loader::load_file(path, &self.normalize_config) {
            Ok(datasets) => {
                let n = datasets.len();
                for ds in datasets {
                    self.insert(ds);
                }
                self.status_message = None;
                Ok(n)
            }
            Err(e) => Err(self.record_failure(e)),
        }
    }

    fn commit_one(&mut self, result: Result<SpectralDataset>) -> Result<&SpectralDataset> {
        match result {
            Ok(ds) => {
                self.status_message = None;
                let idx = self.insert(ds);
                Ok(&self.datasets[idx])
            }
            Err(e) => Err(self.record_failure(e)),
        }
    }

    fn insert(&mut self, dataset: SpectralDataset) -> usize {
        log::info!(
            "Added '{}' ({} points, {:?})",
            dataset.name,
            dataset.len(),
            dataset.kind
        );
        self.datasets.push(dataset);
        self.recolor();
        self.datasets.len() - 1
    }

    fn record_failure(&mut self, err: SpectraError) -> SpectraError {
        if err.is_user_visible() {
            log::warn!("Retrieval failed: {err}");
        } else {
            log::error!("Failed to load spectrum: {err}");
        }
        self.status_message = Some(format!("Error: {err}"));
        err
    }

    /// Re-assign series colours after the dataset list changed.
    fn recolor(&mut self) {
        let palette = generate_palette(self.datasets.len());
        for (ds, color) in self.datasets.iter_mut().zip(palette) {
            ds.color = color;
        }
    }

    // -- Dataset management --

    /// Flip visibility; returns the new state, `None` for unknown ids.
    pub fn toggle_visibility(&mut self, id: &str) -> Option<bool> {
        let ds = self.datasets.iter_mut().find(|ds| ds.id == id)?;
        ds.visible = !ds.visible;
        Some(ds.visible)
    }

    pub fn remove(&mut self, id: &str) -> Option<SpectralDataset> {
        let idx = self.datasets.iter().position(|ds| ds.id == id)?;
        let removed = self.datasets.remove(idx);
        self.recolor();
        Some(removed)
    }

    // -- View settings --

    pub fn toggle_normalize(&mut self) {
        self.projection.normalize = !self.projection.normalize;
    }

    pub fn cycle_display_unit(&mut self) {
        self.projection.display_unit = self.projection.display_unit.next();
    }

    pub fn set_y_mode(&mut self, mode: IntensityMode) {
        self.projection.y_mode = mode;
    }

    /// Project the visible datasets with the current view settings.
    pub fn project(&self) -> Projection {
        project(self.visible_datasets(), &self.projection)
    }

    /// Export the visible datasets as CSV.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<()> {
        if self.visible_datasets().next().is_none() {
            return Err(SpectraError::EmptyResult("no visible datasets to export".into()));
        }
        export::write_csv(&self.project(), writer)
    }

    // -- Annotations --

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Pin a note at `x`, given in the current display unit.
    /// Blank text or a non-positive position adds nothing.
    pub fn add_annotation(&mut self, x: f64, text: &str) -> Option<&Annotation> {
        let text = text.trim();
        let wavelength_microns = units::to_microns(x, self.projection.display_unit);
        if text.is_empty() || !(wavelength_microns > 0.0) {
            return None;
        }
        self.annotations.push(Annotation {
            id: uuid::Uuid::new_v4().to_string(),
            wavelength_microns,
            text: text.to_string(),
            created_at: Utc::now(),
        });
        self.annotations.last()
    }

    pub fn delete_annotation(&mut self, id: &str) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.id != id);
        self.annotations.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::WavelengthUnit;

    const CO2: &str = "##TITLE=CARBON DIOXIDE\n##XUNITS=1/CM\n##YUNITS=ABSORBANCE\n##XYDATA=(X++(Y..Y))\n2349 0.9\n667 0.4\n##END=\n";

    fn record(name: &str, points: Vec<[f64; 2]>) -> SpectralRecord {
        SpectralRecord {
            name: name.into(),
            category: "Compound".into(),
            data_points: points,
            units_x: "Microns".into(),
            units_y: "Absorbance".into(),
            ..Default::default()
        }
    }

    #[test]
    fn add_assigns_ids_and_colours() {
        let mut wb = Workbench::default();
        let id = wb.add_jcamp_text(CO2).unwrap().id.clone();
        wb.add_record(&record("H2O", vec![[2.7, 1.0], [6.3, 0.6]])).unwrap();

        assert_eq!(wb.datasets().len(), 2);
        assert_eq!(wb.get(&id).unwrap().name, "CARBON DIOXIDE");
        let colors: Vec<&str> = wb.datasets().iter().map(|d| d.color.as_str()).collect();
        assert!(colors.iter().all(|c| c.starts_with('#')));
        assert_ne!(colors[0], colors[1]);
        assert!(wb.status_message.is_none());
    }

    #[test]
    fn failed_retrieval_keeps_existing_datasets() {
        let mut wb = Workbench::default();
        wb.add_jcamp_text(CO2).unwrap();

        let err = wb.add_jcamp_text("##TITLE=Nothing\n##END=\n").unwrap_err();
        assert!(err.is_user_visible());
        assert_eq!(wb.datasets().len(), 1);
        assert!(wb.status_message.as_deref().unwrap().starts_with("Error:"));

        wb.add_record(&record("ok", vec![[1.0, 1.0]])).unwrap();
        assert!(wb.status_message.is_none());
    }

    #[test]
    fn visibility_and_removal() {
        let mut wb = Workbench::default();
        let a = wb.add_record(&record("a", vec![[1.0, 1.0]])).unwrap().id.clone();
        let b = wb.add_record(&record("b", vec![[2.0, 2.0]])).unwrap().id.clone();

        assert_eq!(wb.toggle_visibility(&a), Some(false));
        assert_eq!(wb.visible_datasets().count(), 1);
        assert_eq!(wb.toggle_visibility("nope"), None);

        let p = wb.project();
        assert_eq!(p.series.len(), 1);
        assert_eq!(p.series[0].id, b);
        assert_eq!(p.rows.len(), 1);

        assert!(wb.remove(&b).is_some());
        assert!(wb.remove(&b).is_none());
        assert_eq!(wb.datasets().len(), 1);
        assert!(wb.project().is_empty());
    }

    #[test]
    fn view_settings() {
        let mut wb = Workbench::default();
        assert_eq!(wb.projection.display_unit, WavelengthUnit::Microns);
        wb.cycle_display_unit();
        assert_eq!(wb.projection.display_unit, WavelengthUnit::Nanometers);
        wb.cycle_display_unit();
        assert_eq!(wb.projection.display_unit, WavelengthUnit::Wavenumber);

        wb.toggle_normalize();
        assert!(wb.projection.normalize);
        wb.set_y_mode(IntensityMode::Transmittance);
        assert_eq!(wb.projection.y_mode, IntensityMode::Transmittance);
    }

    #[test]
    fn export_needs_visible_data() {
        let mut wb = Workbench::default();
        let mut out = Vec::new();
        assert!(matches!(wb.export_csv(&mut out), Err(SpectraError::EmptyResult(_))));

        wb.add_record(&record("a", vec![[1.0, 0.2], [2.0, 0.8]])).unwrap();
        wb.toggle_normalize();
        wb.export_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Wavelength (um),a (Normalized Absorbance)\n1.00000,0.25\n2.00000,1\n"
        );
    }

    #[test]
    fn annotations_are_stored_in_microns() {
        let mut wb = Workbench::default();
        wb.projection.display_unit = WavelengthUnit::Wavenumber;

        let id = wb.add_annotation(4000.0, "  C-H stretch ").unwrap().id.clone();
        let note = &wb.annotations()[0];
        assert!((note.wavelength_microns - 2.5).abs() < 1e-12);
        assert_eq!(note.text, "C-H stretch");

        assert!(wb.add_annotation(1000.0, "   ").is_none());
        assert!(wb.add_annotation(0.0, "zero").is_none());
        assert_eq!(wb.annotations().len(), 1);

        assert!(wb.delete_annotation(&id));
        assert!(!wb.delete_annotation(&id));
        assert!(wb.annotations().is_empty());
    }
}
