//! Shared helpers for integration tests: scene builders and a minimal
//! chunk-level reader for the produced binary files.

use glam::{Mat4, Quat, Vec3};
use udk_export::scene::{
    Action, Armature, BoneCurve, Edge, Face, PoseKey, RestBone, Scene, TriMesh, VertexGroup,
};

/// One parsed section: 20-byte tag plus its raw record bytes.
pub struct Chunk {
    pub tag: String,
    pub type_flag: i32,
    pub stride: i32,
    pub count: i32,
    pub data: Vec<u8>,
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

/// Split a .psk/.psa image into its chunks, header chunk included.
pub fn parse_chunks(bytes: &[u8]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        assert!(bytes.len() >= offset + 32, "truncated chunk header");
        let tag_bytes = &bytes[offset..offset + 20];
        let end = tag_bytes.iter().position(|&b| b == 0).unwrap_or(20);
        let tag = String::from_utf8(tag_bytes[..end].to_vec()).unwrap();
        let type_flag = read_i32(bytes, offset + 20);
        let stride = read_i32(bytes, offset + 24);
        let count = read_i32(bytes, offset + 28);
        offset += 32;

        let data_len = (stride as usize) * (count as usize);
        assert!(bytes.len() >= offset + data_len, "truncated chunk '{}'", tag);
        let data = bytes[offset..offset + data_len].to_vec();
        offset += data_len;

        chunks.push(Chunk {
            tag,
            type_flag,
            stride,
            count,
            data,
        });
    }
    chunks
}

pub fn chunk<'a>(chunks: &'a [Chunk], tag: &str) -> &'a Chunk {
    chunks
        .iter()
        .find(|chunk| chunk.tag == tag)
        .unwrap_or_else(|| panic!("missing chunk '{}'", tag))
}

/// A single triangle skinned to a one-bone armature, with one keyed action.
pub fn single_triangle_scene() -> Scene {
    let mesh = TriMesh {
        name: "body".into(),
        matrix_local: Mat4::IDENTITY,
        location: Vec3::ZERO,
        scale: Vec3::ONE,
        parent: Some("rig".into()),
        selected: true,
        vertices: vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ],
        faces: vec![Face {
            vertices: vec![0, 1, 2],
            material_index: 0,
            normal: -Vec3::Z,
            uvs: Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]),
            use_smooth: true,
        }],
        edges: vec![
            Edge { vertices: [0, 1], sharp: false },
            Edge { vertices: [1, 2], sharp: false },
            Edge { vertices: [0, 2], sharp: false },
        ],
        material_slots: vec!["skin".into()],
        vertex_groups: vec![VertexGroup {
            name: "root".into(),
            weights: vec![(0, 1.0), (1, 1.0), (2, 1.0)],
        }],
    };

    let armature = Armature {
        name: "rig".into(),
        matrix_local: Mat4::IDENTITY,
        location: Vec3::ZERO,
        scale: Vec3::ONE,
        bones: vec![RestBone {
            name: "root".into(),
            parent: None,
            head: Vec3::ZERO,
            tail: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::IDENTITY,
            use_deform: true,
        }],
    };

    let action = Action {
        name: "wave".into(),
        frame_start: 1,
        frame_end: 2,
        curves: vec![BoneCurve {
            bone: "root".into(),
            keys: vec![
                PoseKey {
                    frame: 1.0,
                    translation: Vec3::ZERO,
                    rotation: Quat::IDENTITY,
                },
                PoseKey {
                    frame: 2.0,
                    translation: Vec3::new(0.0, 0.0, 1.0),
                    rotation: Quat::IDENTITY,
                },
            ],
        }],
    };

    Scene {
        fps: 30.0,
        current_frame: 1,
        active_object: Some("rig".into()),
        armatures: vec![armature],
        meshes: vec![mesh],
        actions: vec![action],
    }
}
