//! JCAMP-DX text reader (the subset served by spectral web databases).
//!
//! Format overview:
//!   - `##TAG=value` lines are labeled data records; tags are case-sensitive
//!   - `##TITLE=`, `##STATE=`, `##SPECTROMETER/DATA SYSTEM=`: provenance
//!   - `##XUNITS=`, `##YUNITS=`: axis units ("1/CM", "MICROMETERS",
//!     "NANOMETERS", "TRANSMITTANCE", "ABSORBANCE", ...)
//!   - `##XFACTOR=`, `##YFACTOR=`: multipliers applied to every x / y token
//!   - `##XYDATA=(X++(Y..Y))`: opens the numeric table, `##END=` closes it
//!   - `$$` starts a comment
//!
//! Only the first two numbers of each table line are read. Compressed
//! tables (ASDF: SQZ/DIF/DUP characters) and multi-ordinate lines
//! (`400 1 2 3 4` in an `(X++(Y..Y))` table) are not decoded; when one is
//! seen the metadata is flagged and a warning logged. The output then only
//! holds the first X Y pair of each line that splits into plain numbers.

use super::model::{IntensityConvention, ParseMetadata, RawSample, WavelengthUnit};
use crate::error::{Result, SpectraError};

/// Result of parsing one text block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSpectrum {
    pub samples: Vec<RawSample>,
    pub metadata: ParseMetadata,
}

impl ParsedSpectrum {
    /// No data-section samples were extracted.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The source answered with its "spectrum not found" placeholder.
    pub fn is_not_found(&self) -> bool {
        self.metadata
            .title
            .as_deref()
            .is_some_and(|t| t.to_ascii_lowercase().contains("spectrum not found"))
    }
}

/// Decode raw bytes as UTF-8 and parse them.
pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedSpectrum> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| SpectraError::MalformedInput(format!("not UTF-8 text: {e}")))?;
    Ok(parse(text))
}

/// Parse a JCAMP-DX text block in a single pass.
///
/// Never fails: an input without table lines simply yields no samples.
pub fn parse(text: &str) -> ParsedSpectrum {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut metadata = ParseMetadata::default();
    let mut samples = Vec::new();
    let mut in_data_section = false;
    let mut skipped = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(record) = trimmed.strip_prefix("##") {
            let Some((tag, value)) = record.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match tag.trim() {
                "XYDATA" | "XYPOINTS" | "PEAK TABLE" => {
                    in_data_section = true;
                    log::debug!("Numeric section opened: {value}");
                }
                "END" => in_data_section = false,
                "XFACTOR" => update_factor(&mut metadata.x_factor, value, "XFACTOR"),
                "YFACTOR" => update_factor(&mut metadata.y_factor, value, "YFACTOR"),
                "XUNITS" => apply_x_units(&mut metadata, value),
                "YUNITS" => metadata.y_convention = y_convention_from_units(value),
                "STATE" => metadata.phase = non_empty(value),
                "TITLE" => metadata.title = non_empty(value),
                "SPECTROMETER/DATA SYSTEM" | "INSTRUMENT" => {
                    metadata.instrument = non_empty(value)
                }
                _ => {}
            }
            continue;
        }

        if !in_data_section || trimmed.is_empty() {
            continue;
        }

        let content = match trimmed.find("$$") {
            Some(pos) => &trimmed[..pos],
            None => trimmed,
        };

        if !metadata.compressed {
            if looks_compressed(content) {
                log::warn!(
                    "Compressed JCAMP-DX table detected; only plain X Y lines will be read"
                );
                metadata.compressed = true;
            } else if numbers(content).count() > 2 {
                log::warn!(
                    "Multi-ordinate JCAMP-DX lines detected; only the first Y of each line \
                     will be read"
                );
                metadata.compressed = true;
            }
        }

        match first_two_numbers(content) {
            Some((x, y)) => {
                let mut x = x * metadata.x_factor;
                if metadata.nm_prescaled {
                    x *= 0.001;
                }
                samples.push(RawSample {
                    x,
                    y: y * metadata.y_factor,
                });
            }
            None => skipped += 1,
        }
    }

    log::debug!(
        "Parsed {} samples ({} table lines skipped), x unit {}",
        samples.len(),
        skipped,
        metadata.x_unit
    );

    ParsedSpectrum { samples, metadata }
}

// ---------------------------------------------------------------------------
// Directive helpers
// ---------------------------------------------------------------------------

/// Parse a numeric value from a JCAMP field (first whitespace token).
fn parse_jcamp_float(s: &str) -> Option<f64> {
    s.split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn update_factor(slot: &mut f64, value: &str, tag: &str) {
    match parse_jcamp_float(value) {
        Some(v) => *slot = v,
        None => log::warn!("Ignoring unparseable ##{tag}={value}"),
    }
}

/// Unit detection is substring based on purpose: source headers are not
/// consistent ("MICROMETERS", "MICRONS", "1/CM", "CM-1", ...).
fn apply_x_units(metadata: &mut ParseMetadata, value: &str) {
    let upper = value.to_uppercase();
    if upper.contains("MICROMETERS") || upper.contains("MICRONS") {
        metadata.x_unit = WavelengthUnit::Microns;
        metadata.nm_prescaled = false;
    } else if upper.contains("NANOMETERS") {
        metadata.x_unit = WavelengthUnit::Nanometers;
        metadata.nm_prescaled = true;
    } else {
        metadata.x_unit = WavelengthUnit::Wavenumber;
        metadata.nm_prescaled = false;
    }
}

pub(crate) fn y_convention_from_units(value: &str) -> IntensityConvention {
    if value.to_uppercase().contains("TRANSMITTANCE") {
        IntensityConvention::Transmittance
    } else {
        IntensityConvention::Absorbance
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Table lines
// ---------------------------------------------------------------------------

/// Finite numbers of a table line. Separators are whitespace, plus `,`/`;`
/// used by `(XY..XY)` tables.
fn numbers(line: &str) -> impl Iterator<Item = f64> + '_ {
    line.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|tok| !tok.is_empty())
        .filter_map(|tok| tok.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn first_two_numbers(line: &str) -> Option<(f64, f64)> {
    let mut numbers = numbers(line);
    let x = numbers.next()?;
    let y = numbers.next()?;
    Some((x, y))
}

/// ASDF pseudo-digits:
///   SQZ `@`, `A`–`I`, `a`–`i`; DIF `%`, `J`–`R`, `j`–`r`; DUP `S`–`Z`, `s`
fn is_asdf_char(c: char) -> bool {
    matches!(c, '@' | '%' | 'A'..='Z' | 'a'..='s')
}

/// A token that is not a plain number, is built only from digits, signs,
/// `.` and ASDF pseudo-digits, and carries at least one pseudo-digit next to
/// a digit (`450@A23J4`) or a bare zero form (`@`, `%`). Words such as
/// `foo` do not qualify.
fn looks_compressed(line: &str) -> bool {
    line.split_whitespace()
        .filter(|tok| tok.parse::<f64>().is_err())
        .any(is_asdf_token)
}

fn is_asdf_token(tok: &str) -> bool {
    let allowed = tok
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-') || is_asdf_char(c));
    let has_pseudo = tok.chars().any(is_asdf_char);
    let has_digit_or_zero = tok.chars().any(|c| c.is_ascii_digit() || matches!(c, '@' | '%'));
    allowed && has_pseudo && has_digit_or_zero
}
