//! Skeletal mesh (.psk) file assembler.

use hashbrown::HashMap;

use super::{
    BoneRecord, ChunkHeader, InfluenceRecord, MaterialRecord, PointRecord, Section,
    TriangleRecord, WedgeRecord,
};

/// One weighted point reference inside a vertex group.
pub type GroupWeight = (u32, f32);

/// The .psk file: a zero-size general header followed by the point, wedge,
/// face, material, bone and influence sections, in that order.
#[derive(Debug)]
pub struct PskFile {
    pub points: Section<PointRecord>,
    pub wedges: Section<WedgeRecord>,
    pub faces: Section<TriangleRecord>,
    pub materials: Section<MaterialRecord>,
    pub bones: Section<BoneRecord>,
    pub influences: Section<InfluenceRecord>,

    /// Vertex-group name -> (point index, weight) pairs. Built during mesh
    /// serialization, consumed once by the skeleton walk when it emits
    /// influence records, never serialized itself.
    pub vertex_groups: HashMap<String, Vec<GroupWeight>>,

    /// Material slot names, in slot order. Backs lazy material creation.
    slot_names: Vec<String>,
}

impl PskFile {
    pub fn new() -> Self {
        Self {
            points: Section::new("PNTS0000"),
            wedges: Section::new("VTXW0000"),
            faces: Section::new("FACE0000"),
            materials: Section::new("MATT0000"),
            bones: Section::new("REFSKELT"),
            influences: Section::new("RAWWEIGHTS"),
            vertex_groups: HashMap::new(),
            slot_names: Vec::new(),
        }
    }

    pub fn set_material_slots(&mut self, names: &[String]) {
        self.slot_names = names.to_vec();
    }

    /// Material record for a slot index, created lazily on first use.
    ///
    /// Missing intermediate slots are filled in so that record position
    /// always equals slot index.
    pub fn material_by_index(&mut self, index: usize) -> &mut MaterialRecord {
        while self.materials.len() <= index {
            let slot = self.materials.len();
            let name = self.slot_names.get(slot).cloned().unwrap_or_default();
            self.materials.push(MaterialRecord {
                name,
                texture_index: slot as i32,
                aux_material: slot as i32,
                ..MaterialRecord::default()
            });
        }
        &mut self.materials.records[index]
    }

    /// Assemble the complete file image.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&ChunkHeader::new("ACTRHEAD", 0, 0).to_bytes());
        self.points.encode(&mut buf);
        self.wedges.encode(&mut buf);
        self.faces.encode(&mut buf);
        self.materials.encode(&mut buf);
        self.bones.encode(&mut buf);
        self.influences.encode(&mut buf);
        buf
    }
}

impl Default for PskFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Record;

    #[test]
    fn lazy_materials_fill_slots_up_to_requested_index() {
        let mut psk = PskFile::new();
        psk.set_material_slots(&["skin".into(), "armor".into(), "cloth".into()]);

        let mat = psk.material_by_index(2);
        assert_eq!(mat.name, "cloth");
        assert_eq!(mat.texture_index, 2);
        assert_eq!(psk.materials.len(), 3);
        assert_eq!(psk.materials.records[0].name, "skin");
        assert_eq!(psk.materials.records[1].aux_material, 1);

        // repeat lookups create nothing new
        psk.material_by_index(1);
        assert_eq!(psk.materials.len(), 3);
    }

    #[test]
    fn empty_file_is_header_plus_six_empty_sections() {
        let psk = PskFile::new();
        let bytes = psk.encode();
        assert_eq!(bytes.len(), 7 * ChunkHeader::SIZE);
        assert_eq!(&bytes[0..8], b"ACTRHEAD");
        assert_eq!(&bytes[32..40], b"PNTS0000");
        assert_eq!(&bytes[64..72], b"VTXW0000");
    }

    #[test]
    fn section_stride_constants_match_format_layout() {
        assert_eq!(PointRecord::SIZE, 12);
        assert_eq!(WedgeRecord::SIZE, 16);
        assert_eq!(TriangleRecord::SIZE, 12);
        assert_eq!(MaterialRecord::SIZE, 88);
        assert_eq!(BoneRecord::SIZE, 120);
        assert_eq!(InfluenceRecord::SIZE, 12);
    }
}
