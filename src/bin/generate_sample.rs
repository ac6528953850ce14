use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Lorentzian band: `peak` at `centre`, full width `fwhm` at half maximum.
fn lorentzian(x: f64, centre: f64, fwhm: f64, peak: f64) -> f64 {
    let half = fwhm / 2.0;
    peak * half * half / ((x - centre).powi(2) + half * half)
}

/// Sum of bands on a slowly drifting baseline, clamped at zero absorbance.
///
/// The ripple stands in for instrument noise and is fully deterministic, so
/// regenerated files are byte-identical.
fn synthesize(axis: &[f64], bands: &[(f64, f64, f64)], ripple: f64) -> Vec<f64> {
    axis.iter()
        .enumerate()
        .map(|(i, &x)| {
            let signal: f64 = bands
                .iter()
                .map(|&(centre, fwhm, peak)| lorentzian(x, centre, fwhm, peak))
                .sum();
            let t = i as f64;
            let baseline = ripple * ((t * 0.37).sin() + 0.5 * (t * 1.91).cos());
            (signal + baseline).max(0.0)
        })
        .collect()
}

/// Transmittance spectrum on a wavenumber grid, JCAMP-DX with factors.
fn write_jcamp(path: &str) -> anyhow::Result<()> {
    // 4000 → 500 cm-1, step 4
    let wavenumbers: Vec<f64> = (0..876).map(|i| 4000.0 - i as f64 * 4.0).collect();
    let bands = [(2962.0, 25.0, 0.9), (1460.0, 18.0, 0.5), (1380.0, 10.0, 0.3)];
    let absorbance = synthesize(&wavenumbers, &bands, 0.004);

    let y_factor = 0.0001;
    let mut out = String::new();
    writeln!(out, "##TITLE=Synthetic alkane")?;
    writeln!(out, "##JCAMP-DX=4.24")?;
    writeln!(out, "##DATA TYPE=INFRARED SPECTRUM")?;
    writeln!(out, "##STATE=gas")?;
    writeln!(out, "##SPECTROMETER/DATA SYSTEM=generate_sample")?;
    writeln!(out, "##XUNITS=1/CM")?;
    writeln!(out, "##YUNITS=TRANSMITTANCE")?;
    writeln!(out, "##XFACTOR=1.0")?;
    writeln!(out, "##YFACTOR={y_factor}")?;
    writeln!(out, "##NPOINTS={}", wavenumbers.len())?;
    writeln!(out, "##XYPOINTS=(XY..XY)")?;
    for (&x, &a) in wavenumbers.iter().zip(&absorbance) {
        let t = 10f64.powf(-a);
        writeln!(out, "{x:.1}, {}", (t / y_factor).round() as i64)?;
    }
    writeln!(out, "##END=")?;

    std::fs::write(path, out).with_context(|| format!("writing {path}"))?;
    println!("Wrote {} points to {path}", wavenumbers.len());
    Ok(())
}

/// Three compounds as tuple rows on a micron grid.
fn write_parquet(path: &str) -> anyhow::Result<()> {
    // 2.0 → 15.0 µm, step 0.01
    let microns: Vec<f64> = (0..=1300).map(|i| 2.0 + i as f64 * 0.01).collect();

    let compounds: Vec<(&str, &str, Vec<(f64, f64, f64)>)> = vec![
        ("Water", "Compound", vec![(2.7, 0.08, 1.0), (6.3, 0.15, 0.6)]),
        ("Carbon dioxide", "Compound", vec![(4.26, 0.05, 1.2), (15.0, 0.2, 0.7)]),
        ("Methane", "Compound", vec![(3.31, 0.06, 0.8), (7.66, 0.1, 0.5)]),
    ];

    let mut x_builder = ListBuilder::new(Float64Builder::new());
    let mut y_builder = ListBuilder::new(Float64Builder::new());
    for (_, _, bands) in &compounds {
        let y = synthesize(&microns, bands, 0.01);
        let values = x_builder.values();
        for &v in &microns {
            values.append_value(v);
        }
        x_builder.append(true);
        let values = y_builder.values();
        for &v in &y {
            values.append_value(v);
        }
        y_builder.append(true);
    }
    let x_array = x_builder.finish();
    let y_array = y_builder.finish();

    let names = StringArray::from(compounds.iter().map(|c| c.0).collect::<Vec<_>>());
    let kinds = StringArray::from(compounds.iter().map(|c| c.1).collect::<Vec<_>>());
    let units_x = StringArray::from(vec!["Microns"; compounds.len()]);
    let units_y = StringArray::from(vec!["Absorbance"; compounds.len()]);

    let list = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", list.clone(), false),
        Field::new("y", list, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("type", DataType::Utf8, false),
        Field::new("unitsX", DataType::Utf8, false),
        Field::new("unitsY", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(x_array),
            Arc::new(y_array),
            Arc::new(names),
            Arc::new(kinds),
            Arc::new(units_x),
            Arc::new(units_y),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;

    println!(
        "Wrote {} spectra ({} wavelengths each) to {path}",
        compounds.len(),
        microns.len()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    write_jcamp("sample_spectrum.jdx")?;
    write_parquet("sample_compounds.parquet")?;
    Ok(())
}
