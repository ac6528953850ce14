use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;

use spectrascope::{IntensityMode, ProcessingConfig, WavelengthUnit, Workbench};

/// Normalize spectra from JCAMP-DX / JSON / CSV / Parquet files and print
/// them side by side on one axis.
#[derive(Parser, Debug)]
#[command(name = "spectrascope", version, about)]
struct Cli {
    /// Input files (.jdx, .dx, .jcamp, .json, .csv, .parquet)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON processing config; command-line flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Display unit: microns, nanometers or wavenumber
    #[arg(short, long)]
    unit: Option<WavelengthUnit>,

    /// Intensity mode: absorbance or transmittance
    #[arg(short = 'y', long)]
    y_mode: Option<IntensityMode>,

    /// Scale each dataset by its own maximum
    #[arg(short, long)]
    normalize: bool,

    /// Keep wavenumber rows ascending
    #[arg(long)]
    ascending: bool,

    /// Write the CSV here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the canonical datasets as JSON instead of the CSV table
    #[arg(long)]
    dump_json: bool,

    /// Continue past files that fail to load
    #[arg(long)]
    keep_going: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ProcessingConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ProcessingConfig::default(),
    };
    if let Some(unit) = cli.unit {
        config.projection.display_unit = unit;
    }
    if let Some(mode) = cli.y_mode {
        config.projection.y_mode = mode;
    }
    if cli.normalize {
        config.projection.normalize = true;
    }
    if cli.ascending {
        config.projection.descending_wavenumber = false;
    }

    let mut workbench = Workbench::new(config);
    for path in &cli.files {
        match workbench.add_file(path) {
            Ok(n) => log::debug!("{}: {n} dataset(s)", path.display()),
            Err(e) if cli.keep_going => eprintln!("skipping {}: {e}", path.display()),
            Err(e) => return Err(e).with_context(|| format!("loading {}", path.display())),
        }
    }
    if workbench.datasets().is_empty() {
        bail!("no spectra loaded");
    }

    if cli.dump_json {
        let json = serde_json::to_string_pretty(workbench.datasets())?;
        println!("{json}");
        return Ok(());
    }

    match &cli.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            workbench.export_csv(std::io::BufWriter::new(file))?;
            log::info!("Wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            workbench.export_csv(&mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}
