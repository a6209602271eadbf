//! udk-export - PSK/PSA skeletal mesh and animation export tool
//!
//! Converts a triangulated JSON scene (mesh, armature, actions) into the
//! Unreal binary interchange formats (.psk, .psa).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use udk_export::{export_scene, find_armature_and_mesh, ExportMode, ExportOptions, Scene};

#[derive(Parser)]
#[command(name = "udk-export")]
#[command(about = "PSK/PSA skeletal mesh and animation export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Write only the .psk mesh file
    Mesh,
    /// Write only the .psa animation file
    Anim,
    /// Write both files
    Both,
}

impl From<ModeArg> for ExportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Mesh => ExportMode::MeshOnly,
            ModeArg::Anim => ExportMode::AnimationOnly,
            ModeArg::Both => ExportMode::Both,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene to .psk/.psa
    Export {
        /// Input scene JSON file
        scene: PathBuf,

        /// Output path; extension is replaced per written file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Which files to write
        #[arg(short, long, value_enum, default_value_t = ModeArg::Both)]
        mode: ModeArg,

        /// Disable smoothing-group resolution
        #[arg(long)]
        no_smoothing_groups: bool,

        /// Clamp exported UVs into the 0..=1 range
        #[arg(long)]
        clamp_uv: bool,

        /// Allow skeletons with fewer than three bones
        #[arg(long)]
        allow_small_skeletons: bool,
    },

    /// Validate a scene without writing anything
    Check {
        /// Input scene JSON file
        scene: PathBuf,
    },
}

fn load_scene(path: &Path) -> Result<Scene> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scene file {:?}", path))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse scene file {:?}", path))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            output,
            mode,
            no_smoothing_groups,
            clamp_uv,
            allow_small_skeletons,
        } => {
            let output = output.unwrap_or_else(|| scene.with_extension("psk"));
            tracing::info!("Exporting {:?} -> {:?}", scene, output);

            let scene = load_scene(&scene)?;
            let options = ExportOptions {
                mode: mode.into(),
                smoothing_groups: !no_smoothing_groups,
                clamp_uv,
                min_bone_check: !allow_small_skeletons,
            };
            let summary = export_scene(&scene, &output, &options)?;
            tracing::info!(
                "Done! {} points, {} faces, {} bones, {} sequences",
                summary.points,
                summary.faces,
                summary.bones,
                summary.sequences
            );
        }

        Commands::Check { scene } => {
            tracing::info!("Checking scene {:?}", scene);
            let scene = load_scene(&scene)?;
            let (armature, mesh) = find_armature_and_mesh(&scene)?;
            tracing::info!(
                "Scene is exportable: armature '{}' ({} bones), mesh '{}' ({} faces), {} actions",
                armature.name,
                armature.bones.len(),
                mesh.name,
                mesh.faces.len(),
                scene.actions.len()
            );
        }
    }

    Ok(())
}
