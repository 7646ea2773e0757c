use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tubercle_analysis::config::{load_config, Config};
use tubercle_analysis::export::{write_annotations, Annotations};
use tubercle_analysis::logging::{init_logging, LoggingConfig};
use tubercle_analysis::statistics::MeasurementStats;
use tubercle_analysis::*;

#[derive(Parser)]
#[command(name = "tubercles")]
#[command(about = "Measure tubercle diameter and spacing on fish-scale micrographs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and measure tubercles on one image
    Measure {
        /// Path to the micrograph
        image: PathBuf,

        /// Detection profile name
        #[arg(short, long)]
        profile: Option<String>,

        /// JSON or TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scale bar length in micrometers
        #[arg(long, requires = "scale_bar_px")]
        scale_bar_um: Option<f64>,

        /// Scale bar length in pixels
        #[arg(long, requires = "scale_bar_um")]
        scale_bar_px: Option<f64>,

        /// Nominal magnification, used when no scale bar is given
        #[arg(short, long, conflicts_with = "scale_bar_um")]
        magnification: Option<f64>,

        /// Blob detector (log or dog)
        #[arg(long)]
        method: Option<BlobMethod>,

        /// Neighbor graph (gabriel, delaunay or rng)
        #[arg(long)]
        graph: Option<GraphMethod>,

        /// Write the annotation document here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the detection profiles, including those from a configuration file
    Profiles {
        /// JSON or TOML configuration file with custom profiles
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the calibration implied by a scale bar or a magnification
    Calibrate {
        #[arg(long, requires = "scale_bar_px")]
        scale_bar_um: Option<f64>,

        #[arg(long, requires = "scale_bar_um")]
        scale_bar_px: Option<f64>,

        #[arg(short, long, conflicts_with = "scale_bar_um")]
        magnification: Option<f64>,

        /// Image width in pixels
        #[arg(short, long)]
        width: Option<u32>,
    },
}

fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Measure {
            config: Some(path), ..
        }
        | Commands::Profiles { config: Some(path) } => {
            load_config(path).with_context(|| format!("loading {}", path.display()))?
        }
        _ => Config::default(),
    };

    let logging = if cli.verbose > 0 {
        let level = level_for(cli.verbose).to_string();
        LoggingConfig {
            global_level: level.clone(),
            pipeline_level: level.clone(),
            detection_level: level,
            ..config.logging.clone()
        }
    } else {
        config.logging.clone()
    };
    let _guard = init_logging(&logging)?;

    match cli.command {
        Commands::Measure {
            image,
            profile,
            config: _,
            scale_bar_um,
            scale_bar_px,
            magnification,
            method,
            graph,
            output,
        } => {
            let mut options = config.pipeline_options();
            if let Some(name) = profile {
                options.profile = ProfileChoice::Named(name);
            }
            if let (Some(scale_bar_um), Some(scale_bar_px)) = (scale_bar_um, scale_bar_px) {
                options.calibration = CalibrationSource::Manual {
                    scale_bar_um,
                    scale_bar_px,
                };
            } else if let Some(m) = magnification {
                options.calibration = CalibrationSource::Magnification(m);
            }
            if let Some(method) = method {
                options.blob_method = method;
            }
            if let Some(graph) = graph {
                options.neighbor_graph = graph;
            }
            handle_measure(&config, image, &options, output)?;
        }
        Commands::Profiles { config: _ } => handle_profiles(&config)?,
        Commands::Calibrate {
            scale_bar_um,
            scale_bar_px,
            magnification,
            width,
        } => handle_calibrate(scale_bar_um, scale_bar_px, magnification, width)?,
    }

    Ok(())
}

fn handle_measure(
    config: &Config,
    image: PathBuf,
    options: &PipelineOptions,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config.registry()?);
    let run = pipeline
        .process_path(&image, options)
        .with_context(|| format!("measuring {}", image.display()))?;
    let result = &run.result;

    let fmt_um = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.2} um", v));

    println!(
        "Image:        {} ({}x{})",
        result.image_id, result.image_shape.1, result.image_shape.0
    );
    println!(
        "Calibration:  {:.4} um/px ({})",
        result.calibration.um_per_pixel(),
        result.calibration.method()
    );
    println!("Profile:      {}", result.profile);
    println!(
        "Candidates:   {} -> {} (size) -> {} (edge) -> {} (circularity)",
        run.diagnostics.detection.candidates,
        run.diagnostics.detection.after_size_filter,
        run.diagnostics.detection.after_edge_filter,
        run.diagnostics.detection.after_circularity_filter
    );
    println!("Tubercles:    {}", result.n_tubercles());
    println!("Edges:        {}", result.edges.len());
    println!(
        "Diameter:     {} (sd {})",
        fmt_um(result.stats.mean_diameter_um),
        fmt_um(result.stats.std_diameter_um)
    );
    println!(
        "Spacing:      {} (sd {})",
        fmt_um(result.stats.mean_spacing_um),
        fmt_um(result.stats.std_spacing_um)
    );
    println!(
        "Pitch:        {}",
        fmt_um(MeasurementStats::mean_center_distance_um(&result.edges))
    );
    println!(
        "Genus:        {} ({} confidence)",
        result.suggested_genus.as_deref().unwrap_or("none"),
        result.classification_confidence
    );
    println!("Elapsed:      {:.1} ms", run.diagnostics.total_duration_ms());

    if let Some(output_path) = output {
        let profile = options.profile.resolve(pipeline.registry())?;
        let annotations = Annotations::from_result(result, &profile);
        write_annotations(&output_path, &annotations)?;
        println!("Annotations saved to {}", output_path.display());
    }

    Ok(())
}

fn handle_profiles(config: &Config) -> anyhow::Result<()> {
    let registry = config.registry()?;
    println!("{:<18} {:>12} {:>8} {:>6}  description", "name", "diameter um", "thresh", "circ");
    for profile in registry.iter() {
        println!(
            "{:<18} {:>5.1}-{:<6.1} {:>8.3} {:>6.2}  {}",
            profile.name,
            profile.min_diameter_um,
            profile.max_diameter_um,
            profile.threshold,
            profile.min_circularity,
            profile.description
        );
    }
    Ok(())
}

fn handle_calibrate(
    scale_bar_um: Option<f64>,
    scale_bar_px: Option<f64>,
    magnification: Option<f64>,
    width: Option<u32>,
) -> anyhow::Result<()> {
    let calibration = match (scale_bar_um, scale_bar_px, magnification) {
        (Some(um), Some(px), _) => calibrate_manual(um, px)?,
        (_, _, Some(m)) => calibrate_from_known_magnification(
            m,
            width.unwrap_or(calibration::DEFAULT_IMAGE_WIDTH_PX),
        )?,
        _ => estimate_calibration_700x(width)?,
    };
    println!("{}", serde_json::to_string_pretty(&calibration)?);
    println!(
        "{:.6} um per pixel, {:.4} px per um ({})",
        calibration.um_per_pixel(),
        calibration.um_to_px(1.0),
        calibration.method()
    );
    Ok(())
}
