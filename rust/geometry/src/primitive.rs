// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-material grouping of triangle, strip and fan index lists
//!
//! A group lives in two mutually exclusive storage modes. While editable
//! it accumulates raw index lists; `change_to_vbo_mode` converts those
//! into byte offsets within the engine's shared index buffer, and
//! `finish` drops the editable lists for good. Counts captured during
//! accumulation stay queryable after finish, contents do not.

use crate::error::{Error, Result};
use crate::material::MaterialId;
use crate::serialize::{ByteReader, ByteWriter};
use smallvec::SmallVec;

/// Chunk id tag for serialized primitive groups
pub const PRIMITIVE_GROUP_CHUNK_ID: u32 = 0xA701;

const INDEX_BYTES: usize = std::mem::size_of::<u32>();

type Sizes = SmallVec<[u32; 8]>;
type Ids = SmallVec<[u32; 8]>;
type Offsets = SmallVec<[usize; 8]>;

/// Triangles, strips and fans index lists grouped by material
#[derive(Debug, Clone, Default)]
pub struct PrimitiveGroup {
    id: MaterialId,

    triangles_index: Vec<u32>,
    triangles_index_size: usize,
    triangles_offset: usize,

    strips_index: Vec<u32>,
    strips_index_size: usize,
    strips_sizes: Sizes,
    strips_ids: Ids,
    strips_offsets: Offsets,

    fans_index: Vec<u32>,
    fans_index_size: usize,
    fans_sizes: Sizes,
    fans_ids: Ids,
    fans_offsets: Offsets,

    vbo_mode: bool,
    finished: bool,
}

impl PrimitiveGroup {
    pub fn new(id: MaterialId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    #[inline]
    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn set_id(&mut self, id: MaterialId) {
        self.id = id;
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn is_vbo_mode(&self) -> bool {
        self.vbo_mode
    }

    #[inline]
    pub fn contains_triangles(&self) -> bool {
        self.triangles_index_size > 0
    }

    #[inline]
    pub fn contains_strips(&self) -> bool {
        self.strips_index_size > 0
    }

    #[inline]
    pub fn contains_fans(&self) -> bool {
        self.fans_index_size > 0
    }

    /// Number of triangle indices; valid before and after finish
    #[inline]
    pub fn triangles_index_size(&self) -> usize {
        self.triangles_index_size
    }

    #[inline]
    pub fn strips_index_size(&self) -> usize {
        self.strips_index_size
    }

    #[inline]
    pub fn fans_index_size(&self) -> usize {
        self.fans_index_size
    }

    /// Editable triangle index list; invalid once finished
    pub fn triangles_index(&self) -> Result<&[u32]> {
        if self.finished {
            return Err(Error::InvalidState("finished group accessed as editable"));
        }
        Ok(&self.triangles_index)
    }

    pub fn strips_index(&self) -> Result<&[u32]> {
        if self.finished {
            return Err(Error::InvalidState("finished group accessed as editable"));
        }
        Ok(&self.strips_index)
    }

    pub fn fans_index(&self) -> Result<&[u32]> {
        if self.finished {
            return Err(Error::InvalidState("finished group accessed as editable"));
        }
        Ok(&self.fans_index)
    }

    /// Per-strip index counts; one entry per `add_strip` call
    pub fn strips_sizes(&self) -> &[u32] {
        &self.strips_sizes
    }

    pub fn fans_sizes(&self) -> &[u32] {
        &self.fans_sizes
    }

    /// Id recorded for the `index`-th strip, for partial updates
    pub fn strip_id(&self, index: usize) -> Option<u32> {
        self.strips_ids.get(index).copied()
    }

    pub fn fan_id(&self, index: usize) -> Option<u32> {
        self.fans_ids.get(index).copied()
    }

    /// Byte offset of the triangle run in the shared index buffer
    pub fn triangles_offset(&self) -> Result<usize> {
        if !self.vbo_mode {
            return Err(Error::InvalidState("offset query before VBO conversion"));
        }
        Ok(self.triangles_offset)
    }

    /// Byte offsets of each strip in the shared index buffer
    pub fn strips_offsets(&self) -> Result<&[usize]> {
        if !self.vbo_mode {
            return Err(Error::InvalidState("offset query before VBO conversion"));
        }
        Ok(&self.strips_offsets)
    }

    pub fn fans_offsets(&self) -> Result<&[usize]> {
        if !self.vbo_mode {
            return Err(Error::InvalidState("offset query before VBO conversion"));
        }
        Ok(&self.fans_offsets)
    }

    /// Append triangle indices (3 per triangle)
    pub fn add_triangles(&mut self, indices: &[u32]) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidState("add_triangles on finished group"));
        }
        if indices.len() < 3 || indices.len() % 3 != 0 {
            return Err(Error::Geometry(format!(
                "triangle index count must be a positive multiple of 3, got {}",
                indices.len()
            )));
        }
        self.triangles_index.extend_from_slice(indices);
        self.triangles_index_size += indices.len();
        Ok(())
    }

    /// Append one triangle strip; several strips can share the group
    pub fn add_strip(&mut self, indices: &[u32], id: u32) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidState("add_strip on finished group"));
        }
        if indices.len() < 3 {
            return Err(Error::Geometry(format!(
                "strip needs at least 3 indices, got {}",
                indices.len()
            )));
        }
        self.strips_index.extend_from_slice(indices);
        self.strips_sizes.push(indices.len() as u32);
        self.strips_ids.push(id);
        self.strips_index_size += indices.len();
        Ok(())
    }

    /// Append one triangle fan
    pub fn add_fan(&mut self, indices: &[u32], id: u32) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidState("add_fan on finished group"));
        }
        if indices.len() < 3 {
            return Err(Error::Geometry(format!(
                "fan needs at least 3 indices, got {}",
                indices.len()
            )));
        }
        self.fans_index.extend_from_slice(indices);
        self.fans_sizes.push(indices.len() as u32);
        self.fans_ids.push(id);
        self.fans_index_size += indices.len();
        Ok(())
    }

    /// Convert accumulated index counts into byte offsets within the
    /// shared index buffer laid out as triangles, strips, fans per group.
    ///
    /// `byte_cursor` is the running write position in that buffer;
    /// irreversible.
    pub fn change_to_vbo_mode(&mut self, byte_cursor: &mut usize) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidState("VBO conversion on finished group"));
        }
        if self.vbo_mode {
            return Err(Error::InvalidState("VBO conversion applied twice"));
        }

        self.triangles_offset = *byte_cursor;
        *byte_cursor += self.triangles_index.len() * INDEX_BYTES;

        self.strips_offsets.clear();
        for &size in &self.strips_sizes {
            self.strips_offsets.push(*byte_cursor);
            *byte_cursor += size as usize * INDEX_BYTES;
        }

        self.fans_offsets.clear();
        for &size in &self.fans_sizes {
            self.fans_offsets.push(*byte_cursor);
            *byte_cursor += size as usize * INDEX_BYTES;
        }

        self.vbo_mode = true;
        Ok(())
    }

    /// Drop editable index storage; counts stay queryable, contents do not
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidState("group finished twice"));
        }
        self.triangles_index.clear();
        self.triangles_index.shrink_to_fit();
        self.strips_index.clear();
        self.strips_index.shrink_to_fit();
        self.fans_index.clear();
        self.fans_index.shrink_to_fit();
        self.finished = true;
        Ok(())
    }

    /// Reset the group to an empty editable state
    pub fn clear(&mut self) {
        *self = Self::new(self.id);
    }

    /// Serialize the editable state; finished groups have no contents
    /// left to write.
    pub fn write_to(&self, writer: &mut ByteWriter) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidState("serialization of finished group"));
        }
        writer.write_chunk_id(PRIMITIVE_GROUP_CHUNK_ID);
        writer.write_u32(self.id);
        writer.write_u32_slice(&self.triangles_index);
        writer.write_u32_slice(&self.strips_index);
        writer.write_u32_slice(&self.strips_sizes);
        writer.write_u32_slice(&self.strips_ids);
        writer.write_u32_slice(&self.fans_index);
        writer.write_u32_slice(&self.fans_sizes);
        writer.write_u32_slice(&self.fans_ids);
        Ok(())
    }

    pub fn read_from(reader: &mut ByteReader) -> Result<Self> {
        reader.expect_chunk_id(PRIMITIVE_GROUP_CHUNK_ID)?;
        let id = reader.read_u32()?;
        let triangles_index = reader.read_u32_vec()?;
        let strips_index = reader.read_u32_vec()?;
        let strips_sizes: Sizes = reader.read_u32_vec()?.into_iter().collect();
        let strips_ids: Ids = reader.read_u32_vec()?.into_iter().collect();
        let fans_index = reader.read_u32_vec()?;
        let fans_sizes: Sizes = reader.read_u32_vec()?.into_iter().collect();
        let fans_ids: Ids = reader.read_u32_vec()?.into_iter().collect();

        if strips_sizes.len() != strips_ids.len()
            || strips_sizes.iter().map(|&s| s as usize).sum::<usize>() != strips_index.len()
        {
            return Err(Error::Corrupt("strip size table disagrees with index list".into()));
        }
        if fans_sizes.len() != fans_ids.len()
            || fans_sizes.iter().map(|&s| s as usize).sum::<usize>() != fans_index.len()
        {
            return Err(Error::Corrupt("fan size table disagrees with index list".into()));
        }

        Ok(Self {
            id,
            triangles_index_size: triangles_index.len(),
            triangles_index,
            strips_index_size: strips_index.len(),
            strips_index,
            strips_sizes,
            strips_ids,
            fans_index_size: fans_index.len(),
            fans_index,
            fans_sizes,
            fans_ids,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_group() -> PrimitiveGroup {
        let mut group = PrimitiveGroup::new(5);
        group.add_triangles(&[0, 1, 2, 2, 1, 3]).unwrap();
        group.add_strip(&[0, 4, 1, 5], 1).unwrap();
        group.add_strip(&[2, 6, 3, 7], 2).unwrap();
        group.add_fan(&[8, 0, 1, 2], 3).unwrap();
        group
    }

    #[test]
    fn test_counts_survive_finish_but_contents_do_not() {
        let mut group = sample_group();
        assert_eq!(group.triangles_index_size(), 6);
        assert_eq!(group.strips_index_size(), 8);
        assert_eq!(group.fans_index_size(), 4);
        assert_eq!(group.triangles_index().unwrap().len(), 6);

        group.finish().unwrap();
        assert!(group.is_finished());
        assert_eq!(group.triangles_index_size(), 6);
        assert_eq!(group.strips_index_size(), 8);
        assert!(group.triangles_index().is_err());
        assert!(group.strips_index().is_err());
        assert!(group.fans_index().is_err());
        assert!(group.add_triangles(&[0, 1, 2]).is_err());
        assert!(group.finish().is_err());
    }

    #[test]
    fn test_vbo_offsets_are_increasing_and_disjoint() {
        let mut group = sample_group();
        let mut cursor = 0usize;
        group.change_to_vbo_mode(&mut cursor).unwrap();

        assert_eq!(group.triangles_offset().unwrap(), 0);
        let strips = group.strips_offsets().unwrap().to_vec();
        assert_eq!(strips, vec![24, 40]);
        let fans = group.fans_offsets().unwrap().to_vec();
        assert_eq!(fans, vec![56]);
        // Cursor advanced past every sub-primitive
        assert_eq!(cursor, (6 + 8 + 4) * 4);

        // A second group continues from the shared cursor without overlap
        let mut other = PrimitiveGroup::new(6);
        other.add_triangles(&[0, 1, 2]).unwrap();
        other.change_to_vbo_mode(&mut cursor).unwrap();
        assert_eq!(other.triangles_offset().unwrap(), 72);

        assert!(group.change_to_vbo_mode(&mut cursor).is_err());
    }

    #[test]
    fn test_offset_query_requires_vbo_mode() {
        let group = sample_group();
        assert!(group.triangles_offset().is_err());
        assert!(group.strips_offsets().is_err());
    }

    #[test]
    fn test_strip_and_fan_ids() {
        let group = sample_group();
        assert_eq!(group.strip_id(0), Some(1));
        assert_eq!(group.strip_id(1), Some(2));
        assert_eq!(group.strip_id(2), None);
        assert_eq!(group.fan_id(0), Some(3));
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        let mut group = PrimitiveGroup::new(0);
        assert!(group.add_triangles(&[0, 1]).is_err());
        assert!(group.add_triangles(&[0, 1, 2, 3]).is_err());
        assert!(group.add_strip(&[0, 1], 0).is_err());
        assert!(group.add_fan(&[0, 1], 0).is_err());
    }

    #[test]
    fn test_serialization_round_trip() {
        let group = sample_group();
        let mut writer = ByteWriter::new();
        group.write_to(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        let restored = PrimitiveGroup::read_from(&mut reader).unwrap();
        assert_eq!(restored.id(), 5);
        assert_eq!(restored.triangles_index().unwrap(), group.triangles_index().unwrap());
        assert_eq!(restored.strips_sizes(), group.strips_sizes());
        assert_eq!(restored.fans_sizes(), group.fans_sizes());
        assert_eq!(restored.strip_id(1), Some(2));
    }

    #[test]
    fn test_serialization_rejects_wrong_chunk_id() {
        let mut writer = ByteWriter::new();
        writer.write_chunk_id(0xBEEF);
        writer.write_u32(0);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            PrimitiveGroup::read_from(&mut reader),
            Err(Error::ChunkMismatch { .. })
        ));
    }
}
