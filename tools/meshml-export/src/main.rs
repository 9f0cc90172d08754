//! meshml-export - MeshML export tool
//!
//! Converts JSON scene documents into MeshML model files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use meshml_export::{
    export_scene, write_meshml_file, ExportSettings, PartitionStrategy, SceneDocument,
};

#[derive(Parser)]
#[command(name = "meshml-export")]
#[command(about = "MeshML export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene to MeshML
    Export {
        /// Input scene document (JSON)
        scene: PathBuf,

        /// Output .meshml file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export settings (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Influences per vertex (0 disables skinning)
        #[arg(short, long)]
        joints_per_vertex: Option<usize>,

        /// Merge meshes sharing a material
        #[arg(long)]
        combine: bool,

        /// Host units to meters
        #[arg(long)]
        unit_scale: Option<f32>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the export pipeline without writing anything
    Check {
        /// Input scene document (JSON)
        scene: PathBuf,

        /// Export settings (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_settings(config: Option<&Path>) -> Result<ExportSettings> {
    match config {
        Some(path) => ExportSettings::load(path),
        None => Ok(ExportSettings::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Export { verbose: true, .. });
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Export {
            scene,
            output,
            config,
            joints_per_vertex,
            combine,
            unit_scale,
            verbose: _,
        } => {
            let mut settings = load_settings(config.as_deref())?;
            if let Some(k) = joints_per_vertex {
                settings.joints_per_vertex = k;
            }
            if let Some(scale) = unit_scale {
                settings.unit_scale = scale;
            }
            if combine {
                settings.partition = PartitionStrategy::Combine;
            }

            let output = output.unwrap_or_else(|| scene.with_extension("meshml"));
            tracing::info!("Exporting {:?} -> {:?}", scene, output);

            let document = SceneDocument::load(&scene)?;
            let model = export_scene(&document, &settings)?;
            write_meshml_file(&output, &model, &settings.attributes)?;
            tracing::info!("Done!");
        }

        Commands::Check { scene, config } => {
            tracing::info!("Checking scene {:?}", scene);
            let settings = load_settings(config.as_deref())?;
            let document = SceneDocument::load(&scene)?;
            export_scene(&document, &settings)?;
            tracing::info!("Scene is exportable!");
        }
    }

    Ok(())
}
