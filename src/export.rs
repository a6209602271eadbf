//! Export driver: object selection, validation, file assembly and writing.

use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::animation::sample_actions;
use crate::error::{bail, Result};
use crate::formats::{PsaFile, PskFile};
use crate::mesh::serialize_mesh;
use crate::scene::{Armature, Scene, ScenePoseProvider, TriMesh};
use crate::skeleton::collect_skeleton;

/// Which output files to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    MeshOnly,
    AnimationOnly,
    Both,
}

impl ExportMode {
    fn writes_mesh(self) -> bool {
        matches!(self, Self::MeshOnly | Self::Both)
    }

    fn writes_animation(self) -> bool {
        matches!(self, Self::AnimationOnly | Self::Both)
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub mode: ExportMode,
    /// Resolve smoothing groups from sharp edges and split points across
    /// group boundaries.
    pub smoothing_groups: bool,
    /// Clamp exported UVs into the 0..=1 range.
    pub clamp_uv: bool,
    /// Reject skeletons with fewer than three bones.
    pub min_bone_check: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            mode: ExportMode::Both,
            smoothing_groups: true,
            clamp_uv: false,
            min_bone_check: true,
        }
    }
}

/// Table counts of a finished export.
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub points: usize,
    pub wedges: usize,
    pub faces: usize,
    pub materials: usize,
    pub bones: usize,
    pub influences: usize,
    pub sequences: usize,
    pub raw_keys: usize,
    pub psk_path: Option<PathBuf>,
    pub psa_path: Option<PathBuf>,
}

/// Resolve the armature/mesh pair to export.
///
/// The armature is the active object when that is an armature, otherwise the
/// scene's only armature. The mesh must be parented to that armature; with
/// several candidates the active or the single selected one wins.
pub fn find_armature_and_mesh(scene: &Scene) -> Result<(&Armature, &TriMesh)> {
    let active = scene.active_object.as_deref();

    let armature = match scene
        .armatures
        .iter()
        .find(|armature| Some(armature.name.as_str()) == active)
    {
        Some(armature) => armature,
        None => match scene.armatures.as_slice() {
            [] => bail!("no armatures in scene"),
            [only] => only,
            _ => bail!("multiple armatures in scene, select the one to export"),
        },
    };

    let parented: Vec<&TriMesh> = scene
        .meshes
        .iter()
        .filter(|mesh| mesh.parent.as_deref() == Some(armature.name.as_str()))
        .collect();

    let mesh = match parented.as_slice() {
        [] => bail!("no mesh parented to armature '{}'", armature.name),
        [only] => *only,
        several => {
            if let Some(mesh) = several
                .iter()
                .find(|mesh| Some(mesh.name.as_str()) == active)
            {
                *mesh
            } else {
                let selected: Vec<&&TriMesh> =
                    several.iter().filter(|mesh| mesh.selected).collect();
                match selected.as_slice() {
                    [only] => **only,
                    [] => bail!(
                        "multiple meshes parented to armature '{}', select the one to export",
                        armature.name
                    ),
                    _ => bail!(
                        "multiple selected meshes parented to armature '{}', select only one",
                        armature.name
                    ),
                }
            }
        }
    };

    if armature.bones.len() != mesh.vertex_groups.len() {
        bail!(
            "armature '{}' has {} bones but mesh '{}' has {} vertex groups; counts must match",
            armature.name,
            armature.bones.len(),
            mesh.name,
            mesh.vertex_groups.len()
        );
    }

    Ok((armature, mesh))
}

fn check_object_transform(kind: &str, name: &str, location: Vec3, scale: Vec3) -> Result<()> {
    if location != Vec3::ZERO {
        bail!(
            "bad {} location: '{}' must have location (0, 0, 0), found {:?}",
            kind,
            name,
            location
        );
    }
    if scale != Vec3::ONE {
        bail!(
            "bad {} scale: '{}' must have scale (1, 1, 1), found {:?}",
            kind,
            name,
            scale
        );
    }
    Ok(())
}

/// Run the full export and write `<path>.psk` and/or `<path>.psa` next to
/// each other, depending on the mode. An extension on `path` is replaced.
pub fn export_scene(scene: &Scene, path: &Path, options: &ExportOptions) -> Result<ExportSummary> {
    let (armature, mesh) = find_armature_and_mesh(scene)?;
    tracing::info!(armature = %armature.name, mesh = %mesh.name, mode = ?options.mode, "export starting");

    check_object_transform("armature", &armature.name, armature.location, armature.scale)?;
    check_object_transform("mesh", &mesh.name, mesh.location, mesh.scale)?;

    let mut psk = PskFile::new();
    let mut psa = PsaFile::new();

    // the mesh is serialized in every mode: influences need its vertex
    // group to point index mapping
    serialize_mesh(mesh, options, &mut psk)?;
    let bones = collect_skeleton(armature, options, &mut psk, &mut psa)?;

    if options.mode.writes_animation() {
        let mut provider = ScenePoseProvider::new(armature, &scene.actions, scene.current_frame);
        sample_actions(&mut provider, &bones, scene.fps, &mut psa)?;
    }

    let mut summary = ExportSummary {
        points: psk.points.len(),
        wedges: psk.wedges.len(),
        faces: psk.faces.len(),
        materials: psk.materials.len(),
        bones: psk.bones.len(),
        influences: psk.influences.len(),
        sequences: psa.animations.len(),
        raw_keys: psa.raw_keys.len(),
        ..ExportSummary::default()
    };

    if options.mode.writes_mesh() {
        let psk_path = path.with_extension("psk");
        write_file(&psk_path, &psk.encode())?;
        tracing::info!(
            path = %psk_path.display(),
            points = summary.points,
            wedges = summary.wedges,
            faces = summary.faces,
            bones = summary.bones,
            influences = summary.influences,
            "wrote mesh file"
        );
        summary.psk_path = Some(psk_path);
    }

    if options.mode.writes_animation() {
        if psa.is_empty() {
            tracing::info!("no usable animation data, skipping .psa");
        } else {
            let psa_path = path.with_extension("psa");
            write_file(&psa_path, &psa.encode())?;
            tracing::info!(
                path = %psa_path.display(),
                sequences = summary.sequences,
                raw_keys = summary.raw_keys,
                "wrote animation file"
            );
            summary.psa_path = Some(psa_path);
        }
    }

    Ok(summary)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)
        .map_err(|error| crate::error::ExportError::new(format!(
            "failed to write '{}': {}",
            path.display(),
            error
        )))
}
