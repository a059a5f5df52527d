//! On-disk records and their byte layouts.
//!
//! Every record is decoded from and encoded into a raw block buffer at fixed,
//! little-endian field offsets:
//!
//! Superblock (block 0)
//! - 0..2    magic
//! - 2..4    total number of blocks
//! - 4..16   label
//! - 16..    directory block list, zero-terminated
//!
//! Directory entry (32 bytes, 32 per block)
//! - 0       status
//! - 1..12   name
//! - 12..14  extent sequence number
//! - 14..16  bytes used in this entry's span
//! - 16..32  direct block pointers

use crate::config::*;
use crate::error::{FsError, Result};
use crate::name::{self, RawName};

fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u16,
    pub num_blocks: u16,
    pub label: [u8; LABEL_LEN],
    pub dir_blocks: [u16; MAX_DIR_BLOCKS], // Zero-terminated list of directory blocks
}

impl SuperBlock {
    const MAGIC_OFFSET: usize = 0;
    const NUM_BLOCKS_OFFSET: usize = 2;
    const LABEL_OFFSET: usize = 4;
    const DIR_OFFSET: usize = Self::LABEL_OFFSET + LABEL_LEN;

    pub fn new(num_blocks: u16, label: &str) -> Self {
        let mut dir_blocks = [0; MAX_DIR_BLOCKS];
        dir_blocks[0] = FIRST_DIR_BLOCK_ID as u16;
        Self {
            magic: MAGIC,
            num_blocks,
            label: name::encode::<LABEL_LEN>(label),
            dir_blocks,
        }
    }

    pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Self {
        let mut label = [0; LABEL_LEN];
        label.copy_from_slice(&buf[Self::LABEL_OFFSET..Self::DIR_OFFSET]);
        let mut dir_blocks = [0; MAX_DIR_BLOCKS];
        for (i, dir) in dir_blocks.iter_mut().enumerate() {
            *dir = get_u16(buf, Self::DIR_OFFSET + i * 2);
        }
        Self {
            magic: get_u16(buf, Self::MAGIC_OFFSET),
            num_blocks: get_u16(buf, Self::NUM_BLOCKS_OFFSET),
            label,
            dir_blocks,
        }
    }

    pub fn encode(&self, buf: &mut [u8; BLOCK_SIZE]) {
        put_u16(buf, Self::MAGIC_OFFSET, self.magic);
        put_u16(buf, Self::NUM_BLOCKS_OFFSET, self.num_blocks);
        buf[Self::LABEL_OFFSET..Self::DIR_OFFSET].copy_from_slice(&self.label);
        for (i, &dir) in self.dir_blocks.iter().enumerate() {
            put_u16(buf, Self::DIR_OFFSET + i * 2, dir);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn label(&self) -> String {
        name::decode(&self.label)
    }

    /// Directory blocks in list order, up to the first zero.
    pub fn dir_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.dir_blocks
            .iter()
            .take_while(|&&id| id != 0)
            .map(|&id| id as u32)
    }

    pub fn num_dir_blocks(&self) -> usize {
        self.dir_blocks().count()
    }

    /// Block holding the `dir_index`-th directory block, if it is listed.
    pub fn dir_block(&self, dir_index: usize) -> Option<u32> {
        self.dir_blocks().nth(dir_index)
    }

    /// Appends a directory block to the list, returning its position.
    pub fn push_dir_block(&mut self, block_id: u32) -> Result<usize> {
        let dir_index = self.num_dir_blocks();
        if dir_index >= MAX_DIR_BLOCKS {
            return Err(FsError::DirectoryFull);
        }
        self.dir_blocks[dir_index] = block_id as u16;
        Ok(dir_index)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Free = 0x00,
    File = 0x10,
    Extent = 0xff,
}

impl TryFrom<u8> for EntryStatus {
    type Error = u8;

    fn try_from(value: u8) -> core::result::Result<Self, u8> {
        match value {
            0x00 => Ok(EntryStatus::Free),
            0x10 => Ok(EntryStatus::File),
            0xff => Ok(EntryStatus::Extent),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub status: EntryStatus,
    pub name: RawName,
    /// On a file entry, the number of extents that follow it.
    /// On an extent, its position in the chain starting from 1.
    pub extent: u16,
    /// Bytes of file content stored in this entry's span.
    pub size: u16,
    pub blocks: [u16; NUM_DIRECT_PTRS], // 0 means unused
}

impl DirEntry {
    pub const NULL: Self = Self {
        status: EntryStatus::Free,
        name: [0; NAME_LEN],
        extent: 0,
        size: 0,
        blocks: [0; NUM_DIRECT_PTRS],
    };

    const NAME_OFFSET: usize = 1;
    const EXTENT_OFFSET: usize = Self::NAME_OFFSET + NAME_LEN;
    const SIZE_OFFSET: usize = Self::EXTENT_OFFSET + 2;
    const BLOCKS_OFFSET: usize = Self::SIZE_OFFSET + 2;

    pub fn new_file(name: RawName) -> Self {
        Self {
            status: EntryStatus::File,
            name,
            ..Self::NULL
        }
    }

    pub fn new_extent(name: RawName, seq: u16) -> Self {
        Self {
            status: EntryStatus::Extent,
            name,
            extent: seq,
            ..Self::NULL
        }
    }

    /// Decodes one entry from its 32-byte record.
    /// Returns the raw status byte if it is not a known tag.
    pub fn decode(raw: &[u8]) -> core::result::Result<Self, u8> {
        let status = EntryStatus::try_from(raw[0])?;
        let mut name = [0; NAME_LEN];
        name.copy_from_slice(&raw[Self::NAME_OFFSET..Self::EXTENT_OFFSET]);
        let mut blocks = [0; NUM_DIRECT_PTRS];
        for (i, ptr) in blocks.iter_mut().enumerate() {
            *ptr = get_u16(raw, Self::BLOCKS_OFFSET + i * 2);
        }
        Ok(Self {
            status,
            name,
            extent: get_u16(raw, Self::EXTENT_OFFSET),
            size: get_u16(raw, Self::SIZE_OFFSET),
            blocks,
        })
    }

    pub fn encode(&self, raw: &mut [u8]) {
        raw[0] = self.status as u8;
        raw[Self::NAME_OFFSET..Self::EXTENT_OFFSET].copy_from_slice(&self.name);
        put_u16(raw, Self::EXTENT_OFFSET, self.extent);
        put_u16(raw, Self::SIZE_OFFSET, self.size);
        for (i, &ptr) in self.blocks.iter().enumerate() {
            put_u16(raw, Self::BLOCKS_OFFSET + i * 2, ptr);
        }
    }

    pub fn is_free(&self) -> bool {
        self.status == EntryStatus::Free
    }

    pub fn name(&self) -> String {
        name::decode(&self.name)
    }

    /// Number of leading non-zero block pointers.
    pub fn num_blocks(&self) -> usize {
        self.blocks.iter().take_while(|&&ptr| ptr != 0).count()
    }

    /// Non-zero block pointers.
    pub fn used_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.blocks.iter().filter(|&&ptr| ptr != 0).map(|&ptr| ptr as u32)
    }
}

/// A directory block seen as an array of entries.
#[derive(Debug, Clone)]
pub struct DirBlock {
    pub entries: [DirEntry; NUM_ENTRY_PER_BLOCK],
}

impl DirBlock {
    pub const EMPTY: Self = Self {
        entries: [DirEntry::NULL; NUM_ENTRY_PER_BLOCK],
    };

    /// `block_id` is only used to report corruption.
    pub fn decode(block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
        let mut dir_block = Self::EMPTY;
        for (slot, raw) in buf.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
            dir_block.entries[slot] = DirEntry::decode(raw).map_err(|status| FsError::Corruption {
                block: block_id,
                detail: format!("entry {slot} has unknown status {status:#04x}"),
            })?;
        }
        Ok(dir_block)
    }

    pub fn encode(&self, buf: &mut [u8; BLOCK_SIZE]) {
        for (entry, raw) in self.entries.iter().zip(buf.chunks_exact_mut(DIR_ENTRY_SIZE)) {
            entry.encode(raw);
        }
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.entries.iter().position(DirEntry::is_free)
    }
}

/// Position of an entry in the directory: which directory block in the
/// superblock list, and which slot inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntryPos {
    pub dir_index: usize,
    pub slot: usize,
}

impl EntryPos {
    pub fn new(dir_index: usize, slot: usize) -> Self {
        Self { dir_index, slot }
    }

    /// `dir_index = index / NUM_ENTRY_PER_BLOCK`, `slot = index % NUM_ENTRY_PER_BLOCK`.
    pub fn from_index(index: usize) -> Self {
        Self {
            dir_index: index / NUM_ENTRY_PER_BLOCK,
            slot: index % NUM_ENTRY_PER_BLOCK,
        }
    }

    /// `index = dir_index * NUM_ENTRY_PER_BLOCK + slot`.
    pub fn index(&self) -> usize {
        self.dir_index * NUM_ENTRY_PER_BLOCK + self.slot
    }
}
