use std::io::Write;
use std::path::Path;

use crate::error::{Result, SpectraError};

use super::projection::Projection;

// ---------------------------------------------------------------------------
// CSV export of a projection
// ---------------------------------------------------------------------------

/// Column header for one dataset, e.g. `"Methane (Raw Absorbance)"`.
pub fn series_header(name: &str, projection: &Projection) -> String {
    let scale = if projection.normalized { "Normalized" } else { "Raw" };
    format!("{name} ({scale} {})", projection.y_mode)
}

/// Write the wide table: one row per axis value, one column per dataset.
///
/// Axis values get 5 decimals; cells carry the projected value verbatim and
/// gaps are left empty.
pub fn write_csv<W: Write>(projection: &Projection, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(projection.series.len() + 1);
    header.push(projection.display_unit.axis_label().to_string());
    header.extend(
        projection
            .series
            .iter()
            .map(|s| series_header(&s.name, projection)),
    );
    wtr.write_record(&header)?;

    for row in projection.display_rows() {
        let mut record = Vec::with_capacity(header.len());
        record.push(format!("{:.5}", row.x));
        for series in &projection.series {
            record.push(
                row.value(&series.id)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(projection: &Projection) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(projection, &mut buf)?;
    String::from_utf8(buf).map_err(|e| SpectraError::MalformedInput(e.to_string()))
}

pub fn write_csv_file(projection: &Projection, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(projection, std::io::BufWriter::new(file))?;
    log::info!(
        "Exported {} rows x {} datasets to {}",
        projection.rows.len(),
        projection.series.len(),
        path.display()
    );
    Ok(())
}
