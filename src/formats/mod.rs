//! PSK/PSA binary record layer.
//!
//! Fixed-stride record encoders for the Unreal skeletal mesh (.psk) and
//! animation (.psa) interchange formats, as documented on UDN. All integers
//! are little-endian, floats are 32-bit IEEE, names are 64-byte null-padded
//! fields.

pub mod psa;
pub mod psk;

pub use psa::PsaFile;
pub use psk::PskFile;

use glam::{Quat, Vec3};

/// Value stored in every chunk header's type-flag field.
pub const CHUNK_TYPE_FLAG: i32 = 1999801;

/// Fixed width of name fields.
pub const NAME_LEN: usize = 64;

/// A fixed-size binary record.
///
/// `write` appends exactly `SIZE` bytes to the buffer. Encoding is pure and
/// deterministic; record state is never mutated by it.
pub trait Record {
    const SIZE: usize;

    fn write(&self, buf: &mut Vec<u8>);
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_vec3(buf: &mut Vec<u8>, v: Vec3) {
    put_f32(buf, v.x);
    put_f32(buf, v.y);
    put_f32(buf, v.z);
}

fn put_quat(buf: &mut Vec<u8>, q: Quat) {
    put_f32(buf, q.x);
    put_f32(buf, q.y);
    put_f32(buf, q.z);
    put_f32(buf, q.w);
}

/// Fixed-width string field: null-padded, truncated to `width` bytes.
fn put_name(buf: &mut Vec<u8>, name: &str, width: usize) {
    let bytes = name.as_bytes();
    let n = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..n]);
    buf.resize(buf.len() + (width - n), 0);
}

/// 32-byte section header: 20-byte tag, type flag, record stride, count.
#[derive(Debug, Clone)]
pub struct ChunkHeader {
    pub id: &'static str,
    pub type_flag: i32,
    pub data_size: i32,
    pub data_count: i32,
}

impl ChunkHeader {
    pub const SIZE: usize = 32;

    pub fn new(id: &'static str, data_size: usize, data_count: usize) -> Self {
        Self {
            id,
            type_flag: CHUNK_TYPE_FLAG,
            data_size: data_size as i32,
            data_count: data_count as i32,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = Vec::with_capacity(Self::SIZE);
        put_name(&mut buf, self.id, 20);
        put_i32(&mut buf, self.type_flag);
        put_i32(&mut buf, self.data_size);
        put_i32(&mut buf, self.data_count);
        let mut bytes = [0u8; Self::SIZE];
        bytes.copy_from_slice(&buf);
        bytes
    }
}

/// A tagged section: header plus an ordered list of one record type.
///
/// `encode` recomputes the element count from the current record list every
/// time. The count is never cached; records may be appended between encodes.
#[derive(Debug)]
pub struct Section<R: Record> {
    id: &'static str,
    pub records: Vec<R>,
}

impl<R: Record> Section<R> {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: R) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let header = ChunkHeader::new(self.id, R::SIZE, self.records.len());
        buf.extend_from_slice(&header.to_bytes());
        for record in &self.records {
            record.write(buf);
        }
    }
}

/// 3D point position (PNTS0000), 12 bytes.
#[derive(Debug, Clone, Copy)]
pub struct PointRecord {
    pub position: Vec3,
}

impl Record for PointRecord {
    const SIZE: usize = 12;

    fn write(&self, buf: &mut Vec<u8>) {
        put_vec3(buf, self.position);
    }
}

/// Mesh corner (VTXW0000), 16 bytes.
///
/// The smoothing group is carried for in-memory identity only; the format
/// serializes that field as zero.
#[derive(Debug, Clone, Copy)]
pub struct WedgeRecord {
    pub point_index: u16,
    pub u: f32,
    pub v: f32,
    pub material_index: u8,
    pub smoothing_group: u32,
}

impl Record for WedgeRecord {
    const SIZE: usize = 16;

    fn write(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.point_index);
        put_u16(buf, 0);
        put_f32(buf, self.u);
        put_f32(buf, self.v);
        buf.push(self.material_index);
        buf.push(0); // reserved
        put_u16(buf, 0);
    }
}

/// Triangle (FACE0000), 12 bytes. Wedge indices are in final winding order.
#[derive(Debug, Clone, Copy)]
pub struct TriangleRecord {
    pub wedges: [u16; 3],
    pub material_index: u8,
    pub aux_material_index: u8,
    pub smoothing_groups: u32,
}

impl Record for TriangleRecord {
    const SIZE: usize = 12;

    fn write(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.wedges[0]);
        put_u16(buf, self.wedges[1]);
        put_u16(buf, self.wedges[2]);
        buf.push(self.material_index);
        buf.push(self.aux_material_index);
        put_u32(buf, self.smoothing_groups);
    }
}

/// Material slot (MATT0000), 88 bytes.
#[derive(Debug, Clone, Default)]
pub struct MaterialRecord {
    pub name: String,
    pub texture_index: i32,
    pub poly_flags: u32,
    pub aux_material: i32,
    pub aux_flags: u32,
    pub lod_bias: i32,
    pub lod_style: i32,
}

impl Record for MaterialRecord {
    const SIZE: usize = 88;

    fn write(&self, buf: &mut Vec<u8>) {
        put_name(buf, &self.name, NAME_LEN);
        put_i32(buf, self.texture_index);
        put_u32(buf, self.poly_flags);
        put_i32(buf, self.aux_material);
        put_u32(buf, self.aux_flags);
        put_i32(buf, self.lod_bias);
        put_i32(buf, self.lod_style);
    }
}

/// Bone rest transform, 44 bytes inside a bone record.
///
/// Length and size fields are ignored by consumers and written as zero.
#[derive(Debug, Clone, Copy)]
pub struct JointPos {
    pub orientation: Quat,
    pub position: Vec3,
}

impl JointPos {
    pub const SIZE: usize = 44;

    fn write(&self, buf: &mut Vec<u8>) {
        put_quat(buf, self.orientation);
        put_vec3(buf, self.position);
        put_f32(buf, 0.0); // length
        put_f32(buf, 0.0); // x size
        put_f32(buf, 0.0); // y size
        put_f32(buf, 0.0); // z size
    }
}

/// Skeleton bone (REFSKELT) and PSA named bone (BONENAMES), 120 bytes.
#[derive(Debug, Clone)]
pub struct BoneRecord {
    pub name: String,
    pub flags: u32,
    pub num_children: i32,
    pub parent_index: i32,
    pub joint: JointPos,
}

impl BoneRecord {
    pub fn new(
        name: &str,
        parent_index: i32,
        num_children: i32,
        orientation: Quat,
        position: Vec3,
    ) -> Self {
        Self {
            name: name.to_owned(),
            flags: 0,
            num_children,
            parent_index,
            joint: JointPos {
                orientation,
                position,
            },
        }
    }
}

impl Record for BoneRecord {
    const SIZE: usize = 120;

    fn write(&self, buf: &mut Vec<u8>) {
        put_name(buf, &self.name, NAME_LEN);
        put_u32(buf, self.flags);
        put_i32(buf, self.num_children);
        put_i32(buf, self.parent_index);
        self.joint.write(buf);
    }
}

/// Single vertex weight (RAWWEIGHTS), 12 bytes.
#[derive(Debug, Clone, Copy)]
pub struct InfluenceRecord {
    pub weight: f32,
    pub point_index: i32,
    pub bone_index: i32,
}

impl Record for InfluenceRecord {
    const SIZE: usize = 12;

    fn write(&self, buf: &mut Vec<u8>) {
        put_f32(buf, self.weight);
        put_i32(buf, self.point_index);
        put_i32(buf, self.bone_index);
    }
}

/// Sampled pose key (ANIMKEYS), 32 bytes.
///
/// The time field is nominally the frame delta (1/fps); consumers derive
/// actual timing from frame counts and the per-sequence rate instead.
#[derive(Debug, Clone, Copy)]
pub struct AnimKeyRecord {
    pub position: Vec3,
    pub orientation: Quat,
    pub time: f32,
}

impl Record for AnimKeyRecord {
    const SIZE: usize = 32;

    fn write(&self, buf: &mut Vec<u8>) {
        put_vec3(buf, self.position);
        put_quat(buf, self.orientation);
        put_f32(buf, self.time);
    }
}

/// Per-sequence metadata (ANIMINFO), 168 bytes.
#[derive(Debug, Clone, Default)]
pub struct AnimInfoRecord {
    pub name: String,
    pub group: String,
    pub total_bones: i32,
    pub root_include: i32,
    pub key_compression_style: i32,
    pub key_quotum: i32,
    pub key_prediction: f32,
    pub track_time: f32,
    pub anim_rate: f32,
    pub start_bone: i32,
    pub first_raw_frame: i32,
    pub num_raw_frames: i32,
}

impl Record for AnimInfoRecord {
    const SIZE: usize = 168;

    fn write(&self, buf: &mut Vec<u8>) {
        put_name(buf, &self.name, NAME_LEN);
        put_name(buf, &self.group, NAME_LEN);
        put_i32(buf, self.total_bones);
        put_i32(buf, self.root_include);
        put_i32(buf, self.key_compression_style);
        put_i32(buf, self.key_quotum);
        put_f32(buf, self.key_prediction);
        put_f32(buf, self.track_time);
        put_f32(buf, self.anim_rate);
        put_i32(buf, self.start_bone);
        put_i32(buf, self.first_raw_frame);
        put_i32(buf, self.num_raw_frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_len<R: Record>(record: &R) -> usize {
        let mut buf = Vec::new();
        record.write(&mut buf);
        buf.len()
    }

    #[test]
    fn record_strides_match_declared_sizes() {
        let quat = Quat::IDENTITY;
        let vec = Vec3::ZERO;

        assert_eq!(encoded_len(&PointRecord { position: vec }), PointRecord::SIZE);
        assert_eq!(
            encoded_len(&WedgeRecord {
                point_index: 0,
                u: 0.0,
                v: 0.0,
                material_index: 0,
                smoothing_group: 0,
            }),
            WedgeRecord::SIZE
        );
        assert_eq!(
            encoded_len(&TriangleRecord {
                wedges: [0, 1, 2],
                material_index: 0,
                aux_material_index: 0,
                smoothing_groups: 0,
            }),
            TriangleRecord::SIZE
        );
        assert_eq!(encoded_len(&MaterialRecord::default()), MaterialRecord::SIZE);
        assert_eq!(
            encoded_len(&BoneRecord::new("root", -1, 0, quat, vec)),
            BoneRecord::SIZE
        );
        assert_eq!(
            encoded_len(&InfluenceRecord {
                weight: 1.0,
                point_index: 0,
                bone_index: 0,
            }),
            InfluenceRecord::SIZE
        );
        assert_eq!(
            encoded_len(&AnimKeyRecord {
                position: vec,
                orientation: quat,
                time: 0.0,
            }),
            AnimKeyRecord::SIZE
        );
        assert_eq!(encoded_len(&AnimInfoRecord::default()), AnimInfoRecord::SIZE);
    }

    #[test]
    fn chunk_header_is_32_bytes_with_null_padded_tag() {
        let header = ChunkHeader::new("PNTS0000", PointRecord::SIZE, 7);
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), ChunkHeader::SIZE);
        assert_eq!(&bytes[0..8], b"PNTS0000");
        assert!(bytes[8..20].iter().all(|&b| b == 0));
        assert_eq!(i32::from_le_bytes(bytes[20..24].try_into().unwrap()), CHUNK_TYPE_FLAG);
        assert_eq!(i32::from_le_bytes(bytes[24..28].try_into().unwrap()), 12);
        assert_eq!(i32::from_le_bytes(bytes[28..32].try_into().unwrap()), 7);
    }

    #[test]
    fn names_are_truncated_to_field_width() {
        let long = "x".repeat(100);
        let mut buf = Vec::new();
        put_name(&mut buf, &long, NAME_LEN);
        assert_eq!(buf.len(), NAME_LEN);
        assert!(buf.iter().all(|&b| b == b'x'));
    }

    #[test]
    fn section_recounts_records_on_every_encode() {
        let mut section = Section::<PointRecord>::new("PNTS0000");
        let mut buf = Vec::new();
        section.encode(&mut buf);
        assert_eq!(i32::from_le_bytes(buf[28..32].try_into().unwrap()), 0);

        section.push(PointRecord { position: Vec3::X });
        section.push(PointRecord { position: Vec3::Y });
        buf.clear();
        section.encode(&mut buf);
        assert_eq!(i32::from_le_bytes(buf[28..32].try_into().unwrap()), 2);
        assert_eq!(buf.len(), ChunkHeader::SIZE + 2 * PointRecord::SIZE);
    }
}
