//! Smoothing-group resolution over mesh topology.
//!
//! Faces connected through non-sharp edges share one group; groups that
//! touch only across sharp edges become neighbors and must receive distinct
//! bit-flag ids, so consumers can reconstruct shared versus split normals
//! from the per-face bitmask.

use hashbrown::{HashMap, HashSet};

use crate::error::{bail, Result};
use crate::scene::{Edge, Face};

/// Id reported for faces that belong to no group.
pub const NO_GROUP: u32 = 0x8000_0000;

type EdgeKey = (u32, u32);

fn edge_key(a: u32, b: u32) -> EdgeKey {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn face_edge_keys(face: &Face) -> Vec<EdgeKey> {
    let n = face.vertices.len();
    if n < 3 {
        return Vec::new();
    }
    (0..n)
        .map(|i| edge_key(face.vertices[i], face.vertices[(i + 1) % n]))
        .collect()
}

#[derive(Debug, Default)]
struct Group {
    faces: Vec<usize>,
    neighbor_faces: Vec<usize>,
    neighbors: HashSet<usize>,
    id: u32,
}

/// Per-face smoothing-group ids for one mesh.
#[derive(Debug)]
pub struct SmoothingGroups {
    face_ids: Vec<u32>,
    group_count: usize,
}

impl SmoothingGroups {
    /// Partition `faces` into smoothing groups and assign bit-flag ids.
    pub fn resolve(faces: &[Face], edges: &[Edge]) -> Result<Self> {
        // sharpness per mesh edge; edges absent from the list do not link
        // faces at all
        let mut sharp: HashMap<EdgeKey, bool> = HashMap::with_capacity(edges.len());
        for edge in edges {
            sharp.insert(edge_key(edge.vertices[0], edge.vertices[1]), edge.sharp);
        }

        let mut edge_faces: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        for (fi, face) in faces.iter().enumerate() {
            for key in face_edge_keys(face) {
                let incident = edge_faces.entry(key).or_default();
                if !incident.contains(&fi) {
                    incident.push(fi);
                }
            }
        }

        // flood fill across non-sharp edges, worklist instead of recursion
        let mut face_group: Vec<Option<usize>> = vec![None; faces.len()];
        let mut groups: Vec<Group> = Vec::new();
        for start in 0..faces.len() {
            if face_group[start].is_some() {
                continue;
            }
            let gi = groups.len();
            groups.push(Group::default());

            let mut stack = vec![start];
            while let Some(fi) = stack.pop() {
                if face_group[fi].is_some() {
                    continue;
                }
                face_group[fi] = Some(gi);
                groups[gi].faces.push(fi);

                for key in face_edge_keys(&faces[fi]) {
                    let Some(&is_sharp) = sharp.get(&key) else {
                        continue;
                    };
                    let Some(incident) = edge_faces.get(&key) else {
                        continue;
                    };
                    for &other in incident {
                        if other == fi {
                            continue;
                        }
                        if is_sharp {
                            if !groups[gi].neighbor_faces.contains(&other) {
                                groups[gi].neighbor_faces.push(other);
                            }
                        } else if face_group[other].is_none() {
                            stack.push(other);
                        }
                    }
                }
            }
        }

        // neighbor faces resolve to mutual group adjacency
        for gi in 0..groups.len() {
            let neighbor_groups: Vec<usize> = groups[gi]
                .neighbor_faces
                .iter()
                .filter_map(|&fi| face_group[fi])
                .filter(|&other| other != gi)
                .collect();
            for other in neighbor_groups {
                groups[gi].neighbors.insert(other);
                groups[other].neighbors.insert(gi);
            }
        }

        // smallest free power-of-two id, distinct from every neighbor
        for gi in 0..groups.len() {
            let used: HashSet<u32> = groups[gi]
                .neighbors
                .iter()
                .map(|&other| groups[other].id)
                .filter(|&id| id != 0)
                .collect();
            let mut candidate = 1u32;
            while used.contains(&candidate) {
                if candidate >= NO_GROUP {
                    bail!(
                        "smoothing group id overflow: group has more than 31 neighboring groups"
                    );
                }
                candidate <<= 1;
            }
            groups[gi].id = candidate;
        }

        let face_ids = face_group
            .iter()
            .map(|slot| slot.map_or(NO_GROUP, |gi| groups[gi].id))
            .collect();

        tracing::debug!(groups = groups.len(), faces = faces.len(), "smoothing groups resolved");

        Ok(Self {
            face_ids,
            group_count: groups.len(),
        })
    }

    /// Bit-flag id of the group containing `face`.
    pub fn face_id(&self, face: usize) -> u32 {
        self.face_ids.get(face).copied().unwrap_or(NO_GROUP)
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }
}
