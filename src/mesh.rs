//! Mesh serialization into the PSK point/wedge/face/material tables.

use glam::Vec3;
use hashbrown::HashMap;

use crate::dedup::DedupMap;
use crate::error::{bail, Result};
use crate::export::ExportOptions;
use crate::formats::{PointRecord, PskFile, TriangleRecord, WedgeRecord};
use crate::scene::TriMesh;
use crate::smoothing::SmoothingGroups;

/// Hard format limit: point indices are 16-bit in the wedge record.
pub const MAX_POINTS: usize = 32767;

/// Hard format limit: wedge indices are 16-bit in the triangle record.
pub const MAX_WEDGES: usize = 65535;

/// Exact-position key. Positions are compared bit-for-bit; only corners that
/// agree on every float collapse into one table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VecKey {
    x: u32,
    y: u32,
    z: u32,
}

impl VecKey {
    fn new(v: Vec3) -> Self {
        Self {
            x: v.x.to_bits(),
            y: v.y.to_bits(),
            z: v.z.to_bits(),
        }
    }
}

/// Point identity: transformed position plus smoothing group (zero when
/// smoothing groups are disabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointKey {
    position: VecKey,
    smoothing_group: u32,
}

impl PointKey {
    fn position(&self) -> Vec3 {
        Vec3::new(
            f32::from_bits(self.position.x),
            f32::from_bits(self.position.y),
            f32::from_bits(self.position.z),
        )
    }
}

/// Wedge identity: point index, UV pair and material. The smoothing group
/// rides along for the record but does not split wedges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WedgeKey {
    point_index: u32,
    u: u32,
    v: u32,
    material_index: u8,
}

/// Serialize `mesh` into the PSK tables, including the vertex-group weight
/// association consumed later by the skeleton walk.
pub fn serialize_mesh(mesh: &TriMesh, options: &ExportOptions, psk: &mut PskFile) -> Result<()> {
    tracing::info!(mesh = %mesh.name, faces = mesh.faces.len(), "serializing mesh");

    psk.set_material_slots(&mesh.material_slots);
    for (slot, name) in mesh.material_slots.iter().enumerate() {
        let material = psk.material_by_index(slot);
        material.name = name.clone();
        tracing::debug!(slot, material = %name, "registered material slot");
    }

    let smoothing = SmoothingGroups::resolve(&mesh.faces, &mesh.edges)?;

    let mut points: DedupMap<PointKey> = DedupMap::new();
    let mut wedges: DedupMap<WedgeKey> = DedupMap::new();
    let mut wedge_groups: Vec<u32> = Vec::new();
    // transformed position -> every dedup point sharing it; resolved again
    // when vertex groups are mapped to point indices
    let mut points_linked: HashMap<VecKey, Vec<u32>> = HashMap::new();

    for (face_index, face) in mesh.faces.iter().enumerate() {
        if face.vertices.len() != 3 {
            bail!("non-triangular face ({} vertices)", face.vertices.len());
        }

        let corners = [
            corner_position(mesh, face.vertices[0])?,
            corner_position(mesh, face.vertices[1])?,
            corner_position(mesh, face.vertices[2])?,
        ];
        if corners[0] == corners[1] || corners[1] == corners[2] || corners[2] == corners[0] {
            bail!(
                "degenerate face {}: two corners share one position, mesh must not contain 1-D faces",
                face_index
            );
        }

        let smoothgroup_id = smoothing.face_id(face_index);
        psk.material_by_index(face.material_index as usize);

        let mut wedge_list = [0u32; 3];
        for i in 0..3 {
            let mut uv = match &face.uvs {
                Some(uvs) if uvs.len() == 3 => uvs[i],
                Some(_) => {
                    tracing::warn!(
                        face = face_index,
                        "face has more or less than 3 UV coordinates, writing 0,0"
                    );
                    [0.0, 0.0]
                }
                None => [0.0, 0.0],
            };

            // consumers expect a flipped V and do not flip it themselves
            uv[1] = 1.0 - uv[1];
            if options.clamp_uv {
                uv[0] = uv[0].clamp(0.0, 1.0);
                uv[1] = uv[1].clamp(0.0, 1.0);
            }

            let vpos = mesh.matrix_local.transform_point3(corners[i]);
            let point_key = PointKey {
                position: VecKey::new(vpos),
                smoothing_group: if options.smoothing_groups {
                    smoothgroup_id
                } else {
                    0
                },
            };
            let point_index = points.get(point_key);

            let linked = points_linked.entry(VecKey::new(vpos)).or_default();
            if !linked.contains(&point_index) {
                linked.push(point_index);
            }

            let wedge_key = WedgeKey {
                point_index,
                u: uv[0].to_bits(),
                v: uv[1].to_bits(),
                material_index: face.material_index,
            };
            let wedge_index = wedges.get(wedge_key);
            if wedge_index as usize == wedge_groups.len() {
                wedge_groups.push(if options.smoothing_groups {
                    smoothgroup_id
                } else {
                    0
                });
            }
            wedge_list[i] = wedge_index;
        }

        // winding: compare the authored normal against the geometric one;
        // only the sign of the dot product matters
        let geometric = (corners[1] - corners[0]).cross(corners[2] - corners[1]);
        let dot = face.normal.dot(geometric);
        let ordered = if dot > 0.0 {
            [wedge_list[2], wedge_list[1], wedge_list[0]]
        } else if dot < 0.0 {
            wedge_list
        } else {
            bail!(
                "face normal coplanar with face (corners {:?}, {:?}, {:?}); cannot determine winding",
                corners[0],
                corners[1],
                corners[2]
            );
        };

        psk.faces.push(TriangleRecord {
            wedges: [ordered[0] as u16, ordered[1] as u16, ordered[2] as u16],
            material_index: face.material_index,
            aux_material_index: 0,
            smoothing_groups: if options.smoothing_groups {
                smoothgroup_id
            } else {
                u32::from(face.use_smooth)
            },
        });
    }

    tracing::info!(points = points.len(), wedges = wedges.len(), "mesh tables built");

    for key in points.items() {
        psk.points.push(PointRecord {
            position: key.position(),
        });
    }
    if points.len() > MAX_POINTS {
        bail!("mesh vertex limit exceeded: {} > {}", points.len(), MAX_POINTS);
    }
    if wedges.len() > MAX_WEDGES {
        bail!("mesh wedge limit exceeded: {} > {}", wedges.len(), MAX_WEDGES);
    }

    for (key, group) in wedges.items().zip(&wedge_groups) {
        psk.wedges.push(WedgeRecord {
            point_index: key.point_index as u16,
            u: f32::from_bits(key.u),
            v: f32::from_bits(key.v),
            material_index: key.material_index,
            smoothing_group: *group,
        });
    }

    // vertex groups are matched to bones by name later; a source vertex may
    // fan out to several dedup points when its corners disagreed on UV,
    // material or smoothing, and every one of them takes the weight
    for group in &mesh.vertex_groups {
        let mut list = Vec::new();
        for &(vertex_index, weight) in &group.weights {
            let Some(&co) = mesh.vertices.get(vertex_index as usize) else {
                bail!(
                    "vertex group '{}' references vertex {} out of range",
                    group.name,
                    vertex_index
                );
            };
            let vpos = mesh.matrix_local.transform_point3(co);
            if let Some(linked) = points_linked.get(&VecKey::new(vpos)) {
                for &point_index in linked {
                    list.push((point_index, weight));
                }
            }
        }
        tracing::debug!(group = %group.name, entries = list.len(), "vertex group collected");
        psk.vertex_groups.insert(group.name.clone(), list);
    }

    Ok(())
}

fn corner_position(mesh: &TriMesh, index: u32) -> Result<Vec3> {
    match mesh.vertices.get(index as usize) {
        Some(&co) => Ok(co),
        None => bail!("face references vertex {} out of range", index),
    }
}
