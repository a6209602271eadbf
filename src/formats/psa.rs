//! Animation (.psa) file assembler.

use hashbrown::HashMap;

use super::{AnimInfoRecord, AnimKeyRecord, BoneRecord, ChunkHeader, Section};

#[derive(Debug)]
struct StoredBone {
    /// BONENAMES index, or -1 while the bone has not been used by any
    /// sampled action yet.
    index: i32,
    record: BoneRecord,
}

/// The .psa file: general header, named bones, per-sequence metadata and the
/// flat raw key stream shared by all sequences.
#[derive(Debug)]
pub struct PsaFile {
    pub bones: Section<BoneRecord>,
    pub animations: Section<AnimInfoRecord>,
    pub raw_keys: Section<AnimKeyRecord>,

    /// Bone registry filled by the skeleton walk. Bones enter the BONENAMES
    /// section lazily, on first use by an action. Never serialized.
    lookup: HashMap<String, StoredBone>,
}

impl PsaFile {
    pub fn new() -> Self {
        Self {
            bones: Section::new("BONENAMES"),
            animations: Section::new("ANIMINFO"),
            raw_keys: Section::new("ANIMKEYS"),
            lookup: HashMap::new(),
        }
    }

    /// Register a bone without assigning it a BONENAMES index.
    pub fn store_bone(&mut self, record: BoneRecord) {
        self.lookup
            .insert(record.name.clone(), StoredBone { index: -1, record });
    }

    /// BONENAMES index for a stored bone, appending its record on first use.
    /// Returns `None` for names the skeleton walk never registered.
    pub fn use_bone(&mut self, name: &str) -> Option<i32> {
        let stored = self.lookup.get_mut(name)?;
        if stored.index == -1 {
            stored.index = self.bones.len() as i32;
            self.bones.push(stored.record.clone());
        }
        Some(stored.index)
    }

    pub fn bone_index(&self, name: &str) -> Option<i32> {
        self.lookup.get(name).map(|stored| stored.index)
    }

    /// A PSA with no used bones or no sequences carries nothing a consumer
    /// can load; such a file is skipped at write time.
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty() || self.animations.is_empty()
    }

    /// Assemble the complete file image.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&ChunkHeader::new("ANIMHEAD", 0, 0).to_bytes());
        self.bones.encode(&mut buf);
        self.animations.encode(&mut buf);
        self.raw_keys.encode(&mut buf);
        buf
    }
}

impl Default for PsaFile {
    fn default() -> Self {
        Self::new()
    }
}
