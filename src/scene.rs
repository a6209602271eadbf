//! Input scene model.
//!
//! The exporter does not talk to a host application directly; the host hands
//! it this already-triangulated view of a scene: a mesh with per-face
//! material indices and UVs, an armature with rest-pose transforms, and
//! keyframed actions. Scene files are plain JSON deserialized into these
//! types.
//!
//! Pose sampling goes through the [`PoseProvider`] trait: advancing the
//! scene to a frame is a blocking, side-effecting call against shared pose
//! state, so the animation sampler serializes all access to it and restores
//! the prior state when it is done.

use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{bail, Result};

fn default_fps() -> f32 {
    30.0
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_matrix() -> Mat4 {
    Mat4::IDENTITY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Scene frame rate; becomes the PSA anim rate.
    #[serde(default = "default_fps")]
    pub fps: f32,
    /// Current scene frame, restored after animation sampling.
    #[serde(default)]
    pub current_frame: i32,
    /// Name of the active object, if any.
    #[serde(default)]
    pub active_object: Option<String>,
    #[serde(default)]
    pub armatures: Vec<Armature>,
    #[serde(default)]
    pub meshes: Vec<TriMesh>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A triangulated mesh object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriMesh {
    pub name: String,
    /// Object-to-export-space transform applied to positions.
    #[serde(default = "default_matrix")]
    pub matrix_local: Mat4,
    #[serde(default)]
    pub location: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    /// Armature object this mesh is parented to.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub selected: bool,
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Material slot names, in slot order.
    #[serde(default)]
    pub material_slots: Vec<String>,
    #[serde(default)]
    pub vertex_groups: Vec<VertexGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    /// Corner vertex indices. Anything but exactly three is rejected at
    /// export time.
    pub vertices: Vec<u32>,
    #[serde(default)]
    pub material_index: u8,
    /// Mesh-authored face normal, used only to settle winding order.
    pub normal: Vec3,
    /// Per-corner UVs from the active UV layer, if one exists.
    #[serde(default)]
    pub uvs: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    pub use_smooth: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Edge {
    pub vertices: [u32; 2],
    /// Sharp edges split smoothing groups.
    #[serde(default)]
    pub sharp: bool,
}

/// Blend weights for the mesh vertices belonging to one named group. Groups
/// are matched to bones by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexGroup {
    pub name: String,
    /// (mesh vertex index, weight) pairs.
    pub weights: Vec<(u32, f32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Armature {
    pub name: String,
    #[serde(default = "default_matrix")]
    pub matrix_local: Mat4,
    #[serde(default)]
    pub location: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    pub bones: Vec<RestBone>,
}

/// A bone's rest pose. Head, tail and rotation are expressed in the parent
/// bone's space; for a root bone that space is the armature object's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestBone {
    pub name: String,
    /// Index of the parent bone within the armature, if any.
    #[serde(default)]
    pub parent: Option<usize>,
    pub head: Vec3,
    #[serde(default)]
    pub tail: Vec3,
    #[serde(default = "Quat::default")]
    pub rotation: Quat,
    /// Deform bones contribute to skinning; the export root must be the
    /// only parentless bone with this set.
    #[serde(default)]
    pub use_deform: bool,
}

/// A keyframed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub frame_start: i32,
    pub frame_end: i32,
    /// Per-bone curves. An action with no curves is skipped at export.
    #[serde(default)]
    pub curves: Vec<BoneCurve>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneCurve {
    pub bone: String,
    pub keys: Vec<PoseKey>,
}

/// One keyframe: the bone's parent-relative pose transform at a frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseKey {
    pub frame: f32,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Armature-space pose matrix per pose bone, keyed by bone name.
pub type PoseSnapshot = HashMap<String, Mat4>;

/// Summary of one exportable action, as reported by a [`PoseProvider`].
#[derive(Debug, Clone)]
pub struct ActionInfo {
    pub name: String,
    /// Inclusive frame range.
    pub frame_start: i32,
    pub frame_end: i32,
    pub has_curves: bool,
}

/// The collaborator owning mutable "current pose" scene state.
///
/// `advance_to_frame` is a blocking call with an observable effect on shared
/// state; no two actions can be sampled concurrently. Callers must snapshot
/// `active_action`/`current_frame` up front and restore both on every exit
/// path.
pub trait PoseProvider {
    /// Actions available for export, in export order.
    fn actions(&self) -> Vec<ActionInfo>;

    fn active_action(&self) -> Option<String>;

    fn set_active_action(&mut self, name: Option<&str>) -> Result<()>;

    fn current_frame(&self) -> i32;

    /// Advance the scene to `frame` and re-derive pose transforms.
    fn advance_to_frame(&mut self, frame: i32) -> Result<PoseSnapshot>;
}

/// [`PoseProvider`] over a loaded [`Scene`]: composes each bone's keyed (or
/// rest) parent-relative transform down the hierarchy into armature-space
/// pose matrices.
pub struct ScenePoseProvider<'a> {
    armature: &'a Armature,
    actions: &'a [Action],
    active: Option<String>,
    frame: i32,
}

impl<'a> ScenePoseProvider<'a> {
    pub fn new(armature: &'a Armature, actions: &'a [Action], current_frame: i32) -> Self {
        Self {
            armature,
            actions,
            active: None,
            frame: current_frame,
        }
    }

    fn active_curves(&self) -> Option<&'a [BoneCurve]> {
        let name = self.active.as_deref()?;
        self.actions
            .iter()
            .find(|action| action.name == name)
            .map(|action| action.curves.as_slice())
    }

    /// Parent-relative transform of one bone at `frame`: the sampled curve
    /// when the active action keys it, the rest pose otherwise.
    fn local_transform(&self, bone: &RestBone, frame: f32) -> (Vec3, Quat) {
        if let Some(curves) = self.active_curves() {
            if let Some(curve) = curves.iter().find(|c| c.bone == bone.name) {
                if let Some(sample) = sample_curve(&curve.keys, frame) {
                    return sample;
                }
            }
        }
        (bone.head, bone.rotation)
    }
}

impl PoseProvider for ScenePoseProvider<'_> {
    fn actions(&self) -> Vec<ActionInfo> {
        self.actions
            .iter()
            .map(|action| ActionInfo {
                name: action.name.clone(),
                frame_start: action.frame_start,
                frame_end: action.frame_end,
                has_curves: !action.curves.is_empty(),
            })
            .collect()
    }

    fn active_action(&self) -> Option<String> {
        self.active.clone()
    }

    fn set_active_action(&mut self, name: Option<&str>) -> Result<()> {
        if let Some(name) = name {
            if !self.actions.iter().any(|action| action.name == name) {
                bail!("action '{}' not found in scene", name);
            }
        }
        self.active = name.map(str::to_owned);
        Ok(())
    }

    fn current_frame(&self) -> i32 {
        self.frame
    }

    fn advance_to_frame(&mut self, frame: i32) -> Result<PoseSnapshot> {
        self.frame = frame;

        // bones are stored parent-before-child, so one pass composes the
        // whole hierarchy
        let mut matrices: Vec<Mat4> = Vec::with_capacity(self.armature.bones.len());
        let mut snapshot = PoseSnapshot::new();
        for (index, bone) in self.armature.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    bail!(
                        "armature '{}': bone '{}' appears before its parent",
                        self.armature.name,
                        bone.name
                    );
                }
            }
            let (translation, rotation) = self.local_transform(bone, frame as f32);
            let local = Mat4::from_rotation_translation(rotation, translation);
            let matrix = match bone.parent {
                Some(parent) => matrices[parent] * local,
                None => local,
            };
            matrices.push(matrix);
            snapshot.insert(bone.name.clone(), matrix);
        }
        Ok(snapshot)
    }
}

/// Sample a curve at `frame` with linear translation interpolation and
/// shortest-path rotation slerp, clamping outside the keyed range.
fn sample_curve(keys: &[PoseKey], frame: f32) -> Option<(Vec3, Quat)> {
    let first = keys.first()?;
    if keys.len() == 1 || frame <= first.frame {
        return Some((first.translation, first.rotation));
    }

    let mut i = 0;
    while i < keys.len() - 1 && keys[i + 1].frame < frame {
        i += 1;
    }
    if i >= keys.len() - 1 {
        let last = &keys[keys.len() - 1];
        return Some((last.translation, last.rotation));
    }

    let (k0, k1) = (&keys[i], &keys[i + 1]);
    let span = k1.frame - k0.frame;
    let factor = if span > 0.0 {
        ((frame - k0.frame) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let translation = k0.translation.lerp(k1.translation, factor);
    // glam's slerp already takes the shortest path
    let rotation = k0.rotation.slerp(k1.rotation, factor).normalize();
    Some((translation, rotation))
}
