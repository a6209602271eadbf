//! Skeleton collection: bone indexing, rest transforms, influences.

use glam::{Mat3, Quat};

use crate::error::{bail, Result};
use crate::export::ExportOptions;
use crate::formats::{BoneRecord, InfluenceRecord, PsaFile, PskFile};
use crate::scene::Armature;

/// One bone of the export skeleton, in visit order.
#[derive(Debug, Clone)]
pub struct ExportBone {
    pub name: String,
    /// Export index, assigned in pre-order traversal from the root.
    pub index: u32,
    /// Export index of the parent, if any.
    pub parent: Option<u32>,
}

/// Handedness flip applied to every parented-bone rotation: negate the
/// vector part, keep w.
pub(crate) fn flip_handedness(q: Quat) -> Quat {
    Quat::from_xyzw(-q.x, -q.y, -q.z, q.w)
}

/// Walk the armature from its single deform root, emitting one PSK bone
/// record and one PSA named-bone registration per visited bone, plus
/// influence records for bones with a matching vertex-group entry.
///
/// Returns the ordered export bone list consumed by the animation sampler.
pub fn collect_skeleton(
    armature: &Armature,
    options: &ExportOptions,
    psk: &mut PskFile,
    psa: &mut PsaFile,
) -> Result<Vec<ExportBone>> {
    tracing::info!(armature = %armature.name, bones = armature.bones.len(), "collecting skeleton");

    // exactly one parentless bone may deform; everything else hanging off
    // other roots is a control rig and stays out of the export
    let roots: Vec<usize> = armature
        .bones
        .iter()
        .enumerate()
        .filter(|(_, bone)| bone.parent.is_none() && bone.use_deform)
        .map(|(index, _)| index)
        .collect();
    if roots.is_empty() {
        bail!("cannot find a root bone: the root bone must have deform enabled");
    }
    if roots.len() > 1 {
        bail!("ambiguous root bone: more than one parentless bone has deform enabled");
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); armature.bones.len()];
    for (index, bone) in armature.bones.iter().enumerate() {
        if let Some(parent) = bone.parent {
            if parent >= armature.bones.len() {
                bail!("bone '{}' has parent index {} out of range", bone.name, parent);
            }
            children[parent].push(index);
        }
    }

    // explicit pre-order worklist; children pushed in reverse so they are
    // visited in declaration order
    let mut export: Vec<ExportBone> = Vec::new();
    let mut stack: Vec<(usize, i32)> = vec![(roots[0], -1)];
    while let Some((index, parent_id)) = stack.pop() {
        let bone = &armature.bones[index];
        let bone_id = export.len() as i32;

        let (orientation, translation) = match bone.parent {
            Some(parent_index) => {
                let parent = &armature.bones[parent_index];
                let orientation = flip_handedness(bone.rotation);
                // rest pose in parent-local space: parent tail-to-head
                // offset plus the bone's own head offset
                let inv = parent.rotation.inverse();
                let translation = inv * parent.tail - inv * parent.head + bone.head;
                (orientation, translation)
            }
            None => {
                // root is expressed in armature object space, no flip
                let translation = armature.matrix_local.transform_point3(bone.head);
                let rotation =
                    Mat3::from_quat(bone.rotation) * Mat3::from_mat4(armature.matrix_local);
                (Quat::from_mat3(&rotation), translation)
            }
        };

        let child_count = children[index].len() as i32;
        let record = BoneRecord::new(&bone.name, parent_id, child_count, orientation, translation);
        psk.bones.push(record.clone());
        psa.store_bone(record);

        if let Some(weights) = psk.vertex_groups.get(&bone.name) {
            for &(point_index, weight) in weights {
                psk.influences.push(InfluenceRecord {
                    weight,
                    point_index: point_index as i32,
                    bone_index: bone_id,
                });
            }
            tracing::debug!(bone = %bone.name, id = bone_id, influences = weights.len(), "bone collected");
        } else {
            tracing::debug!(bone = %bone.name, id = bone_id, "bone collected, no vertex group");
        }

        export.push(ExportBone {
            name: bone.name.clone(),
            index: bone_id as u32,
            parent: (parent_id >= 0).then_some(parent_id as u32),
        });

        for &child in children[index].iter().rev() {
            stack.push((child, bone_id));
        }
    }

    if options.min_bone_check && export.len() < 3 {
        bail!(
            "only {} exportable bone(s): fewer than three bones is known to destabilize consumers",
            export.len()
        );
    }

    Ok(export)
}
