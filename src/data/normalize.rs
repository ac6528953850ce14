use crate::config::{DuplicatePolicy, NormalizeConfig, TransmittanceScale};
use crate::error::{Result, SpectraError};

use super::jcamp::{ParsedSpectrum, y_convention_from_units};
use super::model::{
    CanonicalPoint, DatasetKind, IntensityConvention, ParseMetadata, RawSample, SpectralDataset,
    SpectralRecord, WavelengthUnit,
};
use super::units;

const UNTITLED: &str = "Untitled spectrum";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Turn raw samples into a canonical dataset (microns, absorbance-like).
///
/// Steps: unit conversion, intensity conversion, plausibility band,
/// ascending sort, coincident-point merge. Fails with
/// [`SpectraError::EmptyResult`] when nothing survives.
pub fn normalize(
    samples: &[RawSample],
    metadata: ParseMetadata,
    config: &NormalizeConfig,
) -> Result<SpectralDataset> {
    let unit = metadata.sample_unit();
    let transmittance = metadata.y_convention == IntensityConvention::Transmittance;

    let mut non_finite = 0usize;
    let mut out_of_range = 0usize;
    let mut indexed: Vec<(usize, CanonicalPoint)> = Vec::with_capacity(samples.len());

    for (idx, sample) in samples.iter().enumerate() {
        if !sample.x.is_finite() || !sample.y.is_finite() {
            non_finite += 1;
            continue;
        }

        let wavelength_microns = units::to_microns(sample.x, unit);
        if !(wavelength_microns > config.min_wavelength_microns
            && wavelength_microns < config.max_wavelength_microns)
        {
            out_of_range += 1;
            continue;
        }

        let intensity = if transmittance {
            let t = match config.transmittance_scale {
                TransmittanceScale::Fraction => sample.y,
                TransmittanceScale::Percent => sample.y / 100.0,
            };
            units::absorbance_from_transmittance(t)
        } else {
            sample.y
        };

        indexed.push((
            idx,
            CanonicalPoint {
                wavelength_microns,
                intensity,
            },
        ));
    }

    // Stable, so equal wavelengths keep their source order.
    indexed.sort_by(|a, b| a.1.wavelength_microns.total_cmp(&b.1.wavelength_microns));

    let before_merge = indexed.len();
    let points = merge_coincident(
        &indexed,
        config.coincidence_tolerance_microns.max(0.0),
        config.duplicate_policy,
    );

    log::debug!(
        "Normalized {} samples from {unit}: {} kept, {} out of range, {} non-finite, {} merged",
        samples.len(),
        points.len(),
        out_of_range,
        non_finite,
        before_merge - points.len()
    );

    let name = metadata
        .title
        .clone()
        .unwrap_or_else(|| UNTITLED.to_string());

    if points.is_empty() {
        return Err(SpectraError::EmptyResult(format!(
            "{name}: no points within {} - {} µm",
            config.min_wavelength_microns, config.max_wavelength_microns
        )));
    }

    Ok(SpectralDataset::from_canonical(
        name,
        DatasetKind::Continuum,
        points,
        metadata,
    ))
}

/// Normalize the output of the text parser.
pub fn normalize_parsed(
    parsed: ParsedSpectrum,
    config: &NormalizeConfig,
) -> Result<SpectralDataset> {
    if parsed.is_not_found() {
        return Err(SpectraError::EmptyResult(
            "source reports spectrum not found".to_string(),
        ));
    }
    if parsed.is_empty() {
        let what = parsed.metadata.title.as_deref().unwrap_or(UNTITLED);
        let hint = if parsed.metadata.compressed {
            " (compressed table, not supported)"
        } else {
            ""
        };
        return Err(SpectraError::EmptyResult(format!(
            "{what}: no data lines{hint}"
        )));
    }
    normalize(&parsed.samples, parsed.metadata, config)
}

/// Normalize an already-decoded record, carrying its descriptive fields.
pub fn normalize_record(
    record: &SpectralRecord,
    config: &NormalizeConfig,
) -> Result<SpectralDataset> {
    let metadata = ParseMetadata {
        x_unit: x_unit_from_label(&record.units_x),
        y_convention: y_convention_from_label(&record.units_y),
        phase: record.phase.clone(),
        instrument: record.instrumentation.clone(),
        title: (!record.name.trim().is_empty()).then(|| record.name.trim().to_string()),
        ..Default::default()
    };

    let samples: Vec<RawSample> = record
        .data_points
        .iter()
        .map(|&[x, y]| RawSample { x, y })
        .collect();

    let mut dataset = normalize(&samples, metadata, config)?;
    dataset.kind = DatasetKind::from_category(&record.category);
    dataset.description = record.description.clone();
    dataset.composition = record.composition.clone();
    dataset.references = record.references.clone();
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Record unit labels; records default to microns.
pub(crate) fn x_unit_from_label(label: &str) -> WavelengthUnit {
    let upper = label.trim().to_uppercase();
    if upper.contains("NANOMETER") || upper == "NM" || upper.contains("(NM)") {
        WavelengthUnit::Nanometers
    } else if upper.contains("1/CM")
        || upper.contains("CM-1")
        || upper.contains("CM^-1")
        || upper.contains("CM⁻¹")
        || upper.contains("WAVENUMBER")
    {
        WavelengthUnit::Wavenumber
    } else {
        WavelengthUnit::Microns
    }
}

fn y_convention_from_label(label: &str) -> IntensityConvention {
    if label.trim().is_empty() {
        IntensityConvention::Unknown
    } else if label.to_uppercase().contains("ABSORBANCE") {
        IntensityConvention::Absorbance
    } else {
        match y_convention_from_units(label) {
            IntensityConvention::Transmittance => IntensityConvention::Transmittance,
            _ => IntensityConvention::Unknown,
        }
    }
}

/// Collapse chains of points where each lies within `tolerance` of its
/// predecessor. Input must be sorted by wavelength. The merged point stays
/// inside its chain, so emitted neighbours are always more than `tolerance`
/// apart.
fn merge_coincident(
    sorted: &[(usize, CanonicalPoint)],
    tolerance: f64,
    policy: DuplicatePolicy,
) -> Vec<CanonicalPoint> {
    let mut merged = Vec::with_capacity(sorted.len());
    let mut i = 0;

    while i < sorted.len() {
        let start = sorted[i].1.wavelength_microns;
        let mut j = i + 1;
        while j < sorted.len()
            && sorted[j].1.wavelength_microns - sorted[j - 1].1.wavelength_microns <= tolerance
        {
            j += 1;
        }

        let cluster = &sorted[i..j];
        let point = if cluster.len() == 1 {
            cluster[0].1
        } else {
            match policy {
                DuplicatePolicy::Average => {
                    let n = cluster.len() as f64;
                    let end = cluster[cluster.len() - 1].1.wavelength_microns;
                    let mean_wl =
                        cluster.iter().map(|(_, p)| p.wavelength_microns).sum::<f64>() / n;
                    CanonicalPoint {
                        // Rounding must not push the mean past the run.
                        wavelength_microns: mean_wl.clamp(start, end),
                        intensity: cluster.iter().map(|(_, p)| p.intensity).sum::<f64>() / n,
                    }
                }
                DuplicatePolicy::LastWins => cluster
                    .iter()
                    .max_by_key(|(idx, _)| *idx)
                    .map(|(_, p)| *p)
                    .unwrap_or(cluster[0].1),
            }
        };

        merged.push(point);
        i = j;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::jcamp;

    fn samples(pairs: &[(f64, f64)]) -> Vec<RawSample> {
        pairs.iter().map(|&(x, y)| RawSample { x, y }).collect()
    }

    fn microns_meta() -> ParseMetadata {
        ParseMetadata {
            x_unit: WavelengthUnit::Microns,
            y_convention: IntensityConvention::Absorbance,
            ..Default::default()
        }
    }

    fn assert_strictly_increasing(ds: &SpectralDataset) {
        for w in ds.points().windows(2) {
            assert!(w[0].wavelength_microns < w[1].wavelength_microns);
        }
    }

    #[test]
    fn test_parser_scenario_end_to_end() {
        let parsed = jcamp::parse(
            "##XFACTOR=2\n##YFACTOR=0.5\n##XUNITS=1/CM\n##XYDATA=(X++(Y..Y))\n1000 10\n2000 20\n##END=",
        );
        let ds = normalize_parsed(parsed, &NormalizeConfig::default()).unwrap();
        let pts = ds.points();
        assert_eq!(pts.len(), 2);
        assert!((pts[0].wavelength_microns - 2.5).abs() < 1e-12);
        assert!((pts[0].intensity - 10.0).abs() < 1e-12);
        assert!((pts[1].wavelength_microns - 5.0).abs() < 1e-12);
        assert!((pts[1].intensity - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_canonical_input_is_unchanged() {
        let input = samples(&[(1.0, 0.1), (2.0, 0.4), (3.5, 0.2)]);
        let ds = normalize(&input, microns_meta(), &NormalizeConfig::default()).unwrap();
        let got: Vec<(f64, f64)> = ds
            .points()
            .iter()
            .map(|p| (p.wavelength_microns, p.intensity))
            .collect();
        assert_eq!(got, vec![(1.0, 0.1), (2.0, 0.4), (3.5, 0.2)]);
    }

    #[test]
    fn test_sorted_and_strictly_increasing() {
        let input = samples(&[
            (4000.0, 1.0),
            (500.0, 2.0),
            (1234.5, 3.0),
            (4000.0, 4.0),
            (700.0, 5.0),
        ]);
        let meta = ParseMetadata::default();
        let ds = normalize(&input, meta, &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.len(), 4);
        assert_strictly_increasing(&ds);
    }

    #[test]
    fn test_plausibility_band_is_exclusive() {
        let input = samples(&[(0.05, 1.0), (0.06, 2.0), (999.0, 3.0), (1000.0, 4.0), (-1.0, 5.0)]);
        let ds = normalize(&input, microns_meta(), &NormalizeConfig::default()).unwrap();
        let wl: Vec<f64> = ds.points().iter().map(|p| p.wavelength_microns).collect();
        assert_eq!(wl, vec![0.06, 999.0]);
    }

    #[test]
    fn test_zero_wavenumber_dropped() {
        let input = samples(&[(0.0, 1.0), (2000.0, 2.0)]);
        let ds = normalize(&input, ParseMetadata::default(), &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.len(), 1);
        assert!((ds.points()[0].wavelength_microns - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_dropped() {
        let input = samples(&[(f64::NAN, 1.0), (2.0, f64::INFINITY), (3.0, 0.5)]);
        let ds = normalize(&input, microns_meta(), &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_everything_filtered_is_empty_result() {
        let input = samples(&[(0.01, 1.0), (5000.0, 1.0)]);
        let err = normalize(&input, microns_meta(), &NormalizeConfig::default()).unwrap_err();
        assert!(matches!(err, SpectraError::EmptyResult(_)));

        let err = normalize(&[], microns_meta(), &NormalizeConfig::default()).unwrap_err();
        assert!(matches!(err, SpectraError::EmptyResult(_)));
    }

    #[test]
    fn test_transmittance_converted_to_absorbance() {
        let meta = ParseMetadata {
            x_unit: WavelengthUnit::Microns,
            y_convention: IntensityConvention::Transmittance,
            ..Default::default()
        };
        let input = samples(&[(1.0, 1.0), (2.0, 0.1), (3.0, 0.0)]);
        let ds = normalize(&input, meta.clone(), &NormalizeConfig::default()).unwrap();
        let a: Vec<f64> = ds.points().iter().map(|p| p.intensity).collect();
        assert!(a[0].abs() < 1e-12);
        assert!((a[1] - 1.0).abs() < 1e-12);
        assert!((a[2] - 4.0).abs() < 1e-12);

        let config = NormalizeConfig {
            transmittance_scale: TransmittanceScale::Percent,
            ..Default::default()
        };
        let input = samples(&[(1.0, 10.0)]);
        let ds = normalize(&input, meta, &config).unwrap();
        assert!((ds.points()[0].intensity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_convention_passes_through() {
        let meta = ParseMetadata {
            x_unit: WavelengthUnit::Microns,
            ..Default::default()
        };
        let ds = normalize(&samples(&[(1.0, 0.37)]), meta, &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.points()[0].intensity, 0.37);
    }

    #[test]
    fn test_duplicate_policies() {
        let input = samples(&[(2.0, 0.2), (1.0, 0.1), (2.0, 0.6)]);

        let ds = normalize(&input, microns_meta(), &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert!((ds.points()[1].intensity - 0.4).abs() < 1e-12);

        let config = NormalizeConfig {
            duplicate_policy: DuplicatePolicy::LastWins,
            ..Default::default()
        };
        let ds = normalize(&input, microns_meta(), &config).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.points()[1].intensity, 0.6);
    }

    #[test]
    fn test_near_coincident_points_merge_within_tolerance() {
        let input = samples(&[(1.0, 1.0), (1.0000004, 3.0), (1.1, 5.0)]);
        let ds = normalize(&input, microns_meta(), &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert!((ds.points()[0].intensity - 2.0).abs() < 1e-12);
        assert_strictly_increasing(&ds);
    }

    #[test]
    fn test_chained_points_leave_no_close_neighbours() {
        let runs = [
            samples(&[(1.0, 1.0), (1.0000008, 2.0), (1.0000016, 3.0), (2.0, 4.0)]),
            samples(&[(1.0, 1.0), (1.000001, 2.0), (1.0000015, 3.0), (2.0, 4.0)]),
        ];
        for policy in [DuplicatePolicy::Average, DuplicatePolicy::LastWins] {
            let config = NormalizeConfig {
                duplicate_policy: policy,
                ..Default::default()
            };
            for input in &runs {
                let ds = normalize(input, microns_meta(), &config).unwrap();
                for w in ds.points().windows(2) {
                    let gap = w[1].wavelength_microns - w[0].wavelength_microns;
                    assert!(gap > config.coincidence_tolerance_microns, "{policy:?}: gap {gap}");
                }
            }

            // Each step is within tolerance, so the whole chain is one point.
            let ds = normalize(&runs[0], microns_meta(), &config).unwrap();
            assert_eq!(ds.len(), 2);
            let first = ds.points()[0];
            assert!(first.wavelength_microns >= 1.0 && first.wavelength_microns <= 1.0000016);
            match policy {
                DuplicatePolicy::Average => assert!((first.intensity - 2.0).abs() < 1e-12),
                DuplicatePolicy::LastWins => assert_eq!(first.intensity, 3.0),
            }
        }
    }

    #[test]
    fn test_nanometer_input() {
        // Parser output: already pre-scaled to microns.
        let parsed = jcamp::parse("##XUNITS=NANOMETERS\n##XYDATA=(XY..XY)\n500 0.3\n##END=");
        let ds = normalize_parsed(parsed, &NormalizeConfig::default()).unwrap();
        assert!((ds.points()[0].wavelength_microns - 0.5).abs() < 1e-12);

        // Record tuples in nm are converted here instead.
        let meta = ParseMetadata {
            x_unit: WavelengthUnit::Nanometers,
            ..Default::default()
        };
        let ds = normalize(&samples(&[(500.0, 0.3)]), meta, &NormalizeConfig::default()).unwrap();
        assert!((ds.points()[0].wavelength_microns - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parsed_empty_and_not_found() {
        let parsed = jcamp::parse("##TITLE=Methane\n##XYDATA=(X++(Y..Y))\n##END=");
        let err = normalize_parsed(parsed, &NormalizeConfig::default()).unwrap_err();
        assert!(matches!(err, SpectraError::EmptyResult(ref m) if m.contains("Methane")));

        let parsed = jcamp::parse("##TITLE=Spectrum not found\n");
        let err = normalize_parsed(parsed, &NormalizeConfig::default()).unwrap_err();
        assert!(matches!(err, SpectraError::EmptyResult(_)));
        let parsed = jcamp::parse("##XYDATA=(X++(Y..Y))\n450@A23J4\n##END=");
        let err = normalize_parsed(parsed, &NormalizeConfig::default()).unwrap_err();
        assert!(err.to_string().contains("compressed"));

        let parsed = jcamp::parse("##XYDATA=(XY..XY)\nfoo bar\n##END=");
        let err = normalize_parsed(parsed, &NormalizeConfig::default()).unwrap_err();
        assert!(!err.to_string().contains("compressed"));
    }

    #[test]
    fn test_title_becomes_name() {
        let parsed = jcamp::parse("##TITLE=CARBON DIOXIDE\n##XYDATA=(XY..XY)\n2349 0.9\n##END=");
        let ds = normalize_parsed(parsed, &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.name, "CARBON DIOXIDE");
        assert_eq!(ds.kind, DatasetKind::Continuum);

        let ds =
            normalize(&samples(&[(1.0, 1.0)]), microns_meta(), &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.name, UNTITLED);
    }

    #[test]
    fn test_record_normalization() {
        let record = SpectralRecord {
            name: "Sodium".into(),
            category: "Element".into(),
            data_points: vec![[589.6, 0.5], [589.0, 1.0]],
            units_x: "nm".into(),
            units_y: "Relative intensity".into(),
            description: "D lines".into(),
            composition: vec!["Na".into()],
            references: vec!["https://physics.nist.gov".into()],
            phase: Some("Gas".into()),
            instrumentation: None,
        };
        let ds = normalize_record(&record, &NormalizeConfig::default()).unwrap();
        assert_eq!(ds.name, "Sodium");
        assert_eq!(ds.kind, DatasetKind::AtomicLineSet);
        assert_eq!(ds.metadata.x_unit, WavelengthUnit::Nanometers);
        assert_eq!(ds.metadata.y_convention, IntensityConvention::Unknown);
        assert_eq!(ds.metadata.phase.as_deref(), Some("Gas"));
        assert_eq!(ds.composition, vec!["Na".to_string()]);
        assert!((ds.points()[0].wavelength_microns - 0.589).abs() < 1e-12);
        assert_strictly_increasing(&ds);
    }

    #[test]
    fn test_record_unit_labels() {
        assert_eq!(x_unit_from_label("Microns"), WavelengthUnit::Microns);
        assert_eq!(x_unit_from_label(""), WavelengthUnit::Microns);
        assert_eq!(x_unit_from_label("Nanometers"), WavelengthUnit::Nanometers);
        assert_eq!(x_unit_from_label("nm"), WavelengthUnit::Nanometers);
        assert_eq!(x_unit_from_label("Wavelength (nm)"), WavelengthUnit::Nanometers);
        assert_eq!(x_unit_from_label("Wavelength (um)"), WavelengthUnit::Microns);
        assert_eq!(x_unit_from_label("Wavenumber (cm-1)"), WavelengthUnit::Wavenumber);
        assert_eq!(x_unit_from_label("1/CM"), WavelengthUnit::Wavenumber);

        assert_eq!(y_convention_from_label("Absorbance / Flux"), IntensityConvention::Absorbance);
        assert_eq!(y_convention_from_label("% Transmittance"), IntensityConvention::Transmittance);
        assert_eq!(y_convention_from_label("Flux"), IntensityConvention::Unknown);
    }
}
