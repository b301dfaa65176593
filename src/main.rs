//! # Hydrogen wavefunction probability density
//!
//! Plots the probability density of a hydrogen stationary state on the phi = 0 cross-section.
//!
//! ```bash
//! # 3d orbital with m = 1, default inferno colormap
//! wavefunction -n 3 -l 2 -m 1 --a0 1
//!
//! # gist_heat colormap, custom grid from a config file, density dump
//! wavefunction -n 4 -l 3 -m -2 --a0 2 --cm 2 --config grid.json --json density.json
//! ```
//!
//! ## Configuration (JSON, every field optional)
//!
//! ```json
//! {
//!   "grid": { "extent": 480.0, "samples": 680, "parallel": true, "threads": null },
//!   "render": { "colormap": "inferno", "output_dir": "." }
//! }
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hydrogen_wavefunction::config::{AppConfig, ColorMap};
use hydrogen_wavefunction::field::FieldComposer;
use hydrogen_wavefunction::physics::{BohrRadius, QuantumNumbers};
use hydrogen_wavefunction::render::{render_density, save_png, DensityReport};
use hydrogen_wavefunction::Result;

#[derive(Parser, Debug)]
#[command(name = "wavefunction")]
#[command(about = "Hydrogen wavefunction probability-density by definition of quantum numbers n, l, m and bohr radius")]
#[command(version, allow_negative_numbers = true)]
struct Args {
    /// (n) principal quantum number (constraint: 1 <= n)
    #[arg(short)]
    n: i32,

    /// (l) azimuthal quantum number (constraint: 0 <= l <= n-1)
    #[arg(short)]
    l: i32,

    /// (m) magnetic quantum number (constraint: -l <= m <= l)
    #[arg(short)]
    m: i32,

    /// (a0) bohr radius (constraint: 1 <= a0)
    #[arg(long = "a0")]
    a0: i32,

    /// Color scheme: 1 inferno, 2 gist_heat, 3 afmhot, 4 gist_gray
    #[arg(long = "cm", value_parser = ["1", "2", "3", "4"])]
    cm: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the PNG is written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also write the density field and its labels as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// File config first, then CLI flags on top.
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(selector) = &args.cm {
        config.render.colormap = ColorMap::from_selector(selector)?;
    }
    if let Some(dir) = &args.output_dir {
        config.render.output_dir = dir.clone();
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    // Validate before touching config files or the grid
    let state = QuantumNumbers::new(args.n, args.l, args.m)?;
    let bohr_radius = BohrRadius::new(f64::from(args.a0))?;
    let config = resolve_config(&args)?;

    info!(
        "plotting {} ({}) with a0 = {}, {} samples over +/-{}, colormap {}",
        state.label(),
        state.orbital_name(),
        bohr_radius.value(),
        config.grid.samples,
        config.grid.extent,
        config.render.colormap.as_str()
    );

    let composer = FieldComposer::new(config.grid.clone())?;
    let slice = composer.compose(state, bohr_radius)?;
    let density = slice.density();
    if density.max() == 0.0 {
        warn!("density vanishes on the whole grid; the image will be flat");
    }

    let image = render_density(&density, config.render.colormap);
    let path = save_png(&image, &config.render.output_dir, &state)?;
    info!("wrote {}", path.display());

    if let Some(json_path) = &args.json {
        DensityReport::new(&state, slice.bohr_radius, config.grid.extent, &density, true)
            .write_json(json_path)?;
        info!("wrote {}", json_path.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            if e.is_input_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
