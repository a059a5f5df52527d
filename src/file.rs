//! Offset-based file I/O over a file's chain of entries.
//!
//! A file is its primary entry followed by extents 1..=n. Logical block `b` of
//! the file lives in entry `b / NUM_DIRECT_PTRS`, pointer `b % NUM_DIRECT_PTRS`.

use std::collections::HashMap;

use log::{debug, warn};

use crate::config::*;
use crate::directory::{dir_insert_entry, dir_rm_entry, find_extent, find_primary, read_dir};
use crate::error::{FsError, Result};
use crate::fs::Volume;
use crate::name::{encode_name, RawName};
use crate::structs::*;
use crate::BlockDevice;

/// What a listing reports for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: usize,
    pub blocks: usize,
}

type Chain = Vec<(EntryPos, DirEntry)>;

/// Loads the primary entry of `name` and all its extents.
fn load_chain(device: &impl BlockDevice, superblock: &SuperBlock, name: &RawName) -> Result<Option<Chain>> {
    let Some((pos, primary)) = find_primary(device, superblock, name)? else {
        return Ok(None);
    };
    let mut chain = vec![(pos, primary)];
    for seq in 1..=primary.extent {
        let extent = find_extent(device, superblock, name, seq)?.ok_or_else(|| FsError::Corruption {
            block: superblock.dir_block(pos.dir_index).unwrap_or(0),
            detail: format!("{:?} is missing extent {seq}", primary.name()),
        })?;
        chain.push(extent);
    }
    Ok(Some(chain))
}

fn chain_size<'a>(entries: impl Iterator<Item = &'a DirEntry>) -> usize {
    entries.map(|entry| entry.size as usize).sum()
}

fn chain_blocks<'a>(entries: impl Iterator<Item = &'a DirEntry>) -> usize {
    entries.map(DirEntry::num_blocks).sum()
}

/// Block ID backing logical block `logical` of the file, if allocated.
fn bmap(entries: &[DirEntry], logical: usize) -> Option<u32> {
    entries
        .get(logical / NUM_DIRECT_PTRS)
        .map(|entry| entry.blocks[logical % NUM_DIRECT_PTRS])
        .filter(|&ptr| ptr != 0)
        .map(u32::from)
}

/// Bytes of a `total`-byte file that fall inside the span of entry `index`.
fn span_size(total: usize, index: usize) -> u16 {
    total.saturating_sub(index * ENTRY_SPAN).min(ENTRY_SPAN) as u16
}

pub fn fstat(device: &impl BlockDevice, superblock: &SuperBlock, name: &str) -> Result<FileInfo> {
    let chain = load_chain(device, superblock, &encode_name(name))?
        .ok_or_else(|| FsError::FileNotFound(name.to_string()))?;
    Ok(FileInfo {
        name: chain[0].1.name(),
        size: chain_size(chain.iter().map(|(_, e)| e)),
        blocks: chain_blocks(chain.iter().map(|(_, e)| e)),
    })
}

/// Lists every file with its total size, extents folded into their file.
pub fn flist(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Vec<FileInfo>> {
    let entries = read_dir(device, superblock)?;
    let mut files: Vec<FileInfo> = vec![];
    let mut by_name: HashMap<RawName, usize> = HashMap::new();
    for (_, entry) in entries.iter().filter(|(_, e)| e.status == EntryStatus::File) {
        by_name.insert(entry.name, files.len());
        files.push(FileInfo {
            name: entry.name(),
            size: entry.size as usize,
            blocks: entry.num_blocks(),
        });
    }
    for (_, entry) in entries.iter().filter(|(_, e)| e.status == EntryStatus::Extent) {
        match by_name.get(&entry.name) {
            Some(&i) => {
                files[i].size += entry.size as usize;
                files[i].blocks += entry.num_blocks();
            }
            None => warn!("extent {} of {:?} has no file entry", entry.extent, entry.name()),
        }
    }
    Ok(files)
}

/// Reads data from a file into the provided buffer, starting at `offset`.
/// Stops at the end of the buffer or at the end of the file.
/// Returns the number of bytes read.
pub fn fread(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    name: &str,
    offset: usize,
    buffer: &mut [u8],
) -> Result<usize> {
    let chain = load_chain(device, superblock, &encode_name(name))?
        .ok_or_else(|| FsError::FileNotFound(name.to_string()))?;
    let entries: Vec<DirEntry> = chain.into_iter().map(|(_, e)| e).collect();
    let size = chain_size(entries.iter());
    if offset >= size {
        return Ok(0);
    }
    let end = size.min(offset.saturating_add(buffer.len()));

    let mut bytes_read = 0;
    let mut current_offset = offset;
    let mut block_buf = Box::new([0u8; BLOCK_SIZE]);

    while current_offset < end {
        let Some(block_id) = bmap(&entries, current_offset / BLOCK_SIZE) else {
            break;
        };
        device.read_block(block_id, &mut block_buf)?;
        let start_offset = current_offset % BLOCK_SIZE;
        let bytes_to_read = (BLOCK_SIZE - start_offset).min(end - current_offset);
        buffer[bytes_read..bytes_read + bytes_to_read]
            .copy_from_slice(&block_buf[start_offset..start_offset + bytes_to_read]);

        bytes_read += bytes_to_read;
        current_offset += bytes_to_read;
    }

    Ok(bytes_read)
}

/// Writes `buffer` into the file at `offset`, creating the file if needed.
///
/// Blocks are granted up front and new extent entries take their directory
/// slots before any data block is written. If either step fails, every grant
/// is returned and the file is left as it was. Changed extents are persisted
/// after the data, the primary entry being the final write.
/// Returns the number of bytes written.
pub fn fwrite(
    device: &impl BlockDevice,
    volume: &mut Volume,
    name: &str,
    offset: usize,
    buffer: &[u8],
) -> Result<usize> {
    let length = buffer.len();
    let end = offset
        .checked_add(length)
        .filter(|&end| end <= MAX_FSIZE)
        .ok_or(FsError::InvalidOffset { offset, length })?;

    let raw_name = encode_name(name);
    let (positions, mut entries): (Vec<Option<EntryPos>>, Vec<DirEntry>) =
        match load_chain(device, &volume.superblock, &raw_name)? {
            Some(chain) => chain.into_iter().map(|(pos, e)| (Some(pos), e)).unzip(),
            None => (vec![None], vec![DirEntry::new_file(raw_name)]),
        };
    let original = entries.clone();

    // Allocate
    let held = chain_blocks(entries.iter());
    let needed = end.div_ceil(BLOCK_SIZE);
    let mut granted = vec![];
    for _ in held..needed {
        match volume.free_map.alloc() {
            Ok(block_id) => granted.push(block_id),
            Err(e) => {
                release(volume, &granted);
                return Err(e);
            }
        }
    }
    for (logical, &block_id) in (held..needed).zip(&granted) {
        let index = logical / NUM_DIRECT_PTRS;
        if index == entries.len() {
            entries.push(DirEntry::new_extent(raw_name, index as u16));
        }
        entries[index].blocks[logical % NUM_DIRECT_PTRS] = block_id as u16;
    }

    let size = chain_size(original.iter()).max(end);
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.size = span_size(size, index);
    }
    entries[0].extent = (entries.len() - 1) as u16;

    // Reserve slots for new extents before any existing block is touched.
    let mut inserted = vec![];
    for entry in &entries[positions.len()..] {
        match dir_insert_entry(device, volume, None, entry) {
            Ok(pos) => inserted.push(pos),
            Err(e) => {
                rollback(device, volume, &inserted, &[], &granted);
                return Err(e);
            }
        }
    }

    // Populate
    if let Err(e) = write_data(device, &entries, held, offset, buffer) {
        rollback(device, volume, &inserted, &[], &granted);
        return Err(e);
    }

    // Commit
    let mut updated = vec![];
    for index in 1..positions.len() {
        if entries[index] == original[index] {
            continue;
        }
        match dir_insert_entry(device, volume, positions[index], &entries[index]) {
            Ok(pos) => updated.push((pos, original[index])),
            Err(e) => {
                rollback(device, volume, &inserted, &updated, &granted);
                return Err(e);
            }
        }
    }
    if let Err(e) = dir_insert_entry(device, volume, positions[0], &entries[0]) {
        rollback(device, volume, &inserted, &updated, &granted);
        return Err(e);
    }
    debug!(
        "wrote {length} bytes at {offset} to {:?}, size {size}, {} entries",
        entries[0].name(),
        entries.len()
    );

    Ok(length)
}

/// Writes the data blocks touched by a write.
/// Logical blocks from `held` on are fresh and start zero-filled, even when the
/// write itself does not reach them.
fn write_data(
    device: &impl BlockDevice,
    entries: &[DirEntry],
    held: usize,
    offset: usize,
    buffer: &[u8],
) -> Result<()> {
    let end = offset + buffer.len();
    let first = offset / BLOCK_SIZE;
    let touched = if buffer.is_empty() {
        first..first
    } else {
        first..end.div_ceil(BLOCK_SIZE)
    };
    let needed = end.div_ceil(BLOCK_SIZE);
    let mut block_buf = Box::new([0u8; BLOCK_SIZE]);

    for logical in held.min(first)..needed {
        let fresh = logical >= held;
        if !fresh && !touched.contains(&logical) {
            continue;
        }
        let Some(block_id) = bmap(entries, logical) else {
            return Err(FsError::Corruption {
                block: 0,
                detail: format!("{:?} has no block {logical}", entries[0].name()),
            });
        };
        if fresh {
            block_buf.fill(0);
        } else {
            device.read_block(block_id, &mut block_buf)?;
        }
        if touched.contains(&logical) {
            let block_start = logical * BLOCK_SIZE;
            let from = offset.max(block_start);
            let to = end.min(block_start + BLOCK_SIZE);
            block_buf[from - block_start..to - block_start].copy_from_slice(&buffer[from - offset..to - offset]);
        }
        device.write_block(block_id, &block_buf)?;
    }
    Ok(())
}

fn release(volume: &mut Volume, granted: &[u32]) {
    for &block_id in granted {
        // Granted blocks are in range, so this cannot fail.
        let _ = volume.free_map.free(block_id);
    }
}

/// Undoes an uncommitted write: restores the extents it changed, frees the
/// extents it inserted and returns its blocks.
fn rollback(
    device: &impl BlockDevice,
    volume: &mut Volume,
    inserted: &[EntryPos],
    updated: &[(EntryPos, DirEntry)],
    granted: &[u32],
) {
    warn!(
        "rolling back write: {} new extents, {} changed extents, {} blocks",
        inserted.len(),
        updated.len(),
        granted.len()
    );
    for (pos, entry) in updated {
        if let Err(e) = dir_insert_entry(device, volume, Some(*pos), entry) {
            warn!("failed to restore entry {}: {e}", pos.index());
        }
    }
    for &pos in inserted {
        if let Err(e) = dir_insert_entry(device, volume, Some(pos), &DirEntry::NULL) {
            warn!("failed to free entry {}: {e}", pos.index());
        }
    }
    release(volume, granted);
}

/// Removes a file: its primary entry first, then every extent.
pub fn fdelete(device: &impl BlockDevice, volume: &mut Volume, name: &str) -> Result<()> {
    let chain = load_chain(device, &volume.superblock, &encode_name(name))?
        .ok_or_else(|| FsError::FileNotFound(name.to_string()))?;
    for (pos, entry) in &chain {
        dir_rm_entry(device, volume, *pos, entry)?;
    }
    debug!("deleted {:?}, {} entries", chain[0].1.name(), chain.len());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_span_size() {
        assert_eq!(span_size(0, 0), 0);
        assert_eq!(span_size(5, 0), 5);
        assert_eq!(span_size(ENTRY_SPAN + 10, 0), ENTRY_SPAN as u16);
        assert_eq!(span_size(ENTRY_SPAN + 10, 1), 10);
        assert_eq!(span_size(ENTRY_SPAN + 10, 2), 0);
    }

    #[test]
    fn test_bmap() {
        let mut primary = DirEntry::new_file(encode_name("f"));
        primary.blocks = [2, 3, 4, 5, 6, 7, 8, 9];
        let mut extent = DirEntry::new_extent(primary.name, 1);
        extent.blocks[0] = 10;
        let entries = [primary, extent];
        assert_eq!(bmap(&entries, 0), Some(2));
        assert_eq!(bmap(&entries, 7), Some(9));
        assert_eq!(bmap(&entries, 8), Some(10));
        assert_eq!(bmap(&entries, 9), None);
        assert_eq!(bmap(&entries, 16), None);
    }
}
