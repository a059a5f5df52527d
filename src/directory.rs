//! The flat directory: an ordered list of directory blocks, each an array of
//! fixed-size entries. Files are found by a linear scan over every slot.

use log::debug;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::fs::Volume;
use crate::name::RawName;
use crate::structs::*;
use crate::superblock::write_superblock;
use crate::BlockDevice;

pub fn read_dir_block(device: &impl BlockDevice, block_id: u32) -> Result<DirBlock> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(block_id, &mut buf)?;
    DirBlock::decode(block_id, &buf)
}

pub fn write_dir_block(device: &impl BlockDevice, block_id: u32, dir_block: &DirBlock) -> Result<()> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    dir_block.encode(&mut buf);
    device.write_block(block_id, &buf)
}

/// First entry, in directory order, accepted by `pred`.
fn find_entry(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    pred: impl Fn(&DirEntry) -> bool,
) -> Result<Option<(EntryPos, DirEntry)>> {
    for (dir_index, block_id) in superblock.dir_blocks().enumerate() {
        let dir_block = read_dir_block(device, block_id)?;
        if let Some(slot) = dir_block.entries.iter().position(&pred) {
            return Ok(Some((EntryPos::new(dir_index, slot), dir_block.entries[slot])));
        }
    }
    Ok(None)
}

/// Looks up the file entry named `name`.
pub fn find_primary(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    name: &RawName,
) -> Result<Option<(EntryPos, DirEntry)>> {
    find_entry(device, superblock, |entry| {
        entry.status == EntryStatus::File && entry.name == *name
    })
}

/// Looks up extent number `seq` (starting at 1) of the file named `name`.
pub fn find_extent(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    name: &RawName,
    seq: u16,
) -> Result<Option<(EntryPos, DirEntry)>> {
    find_entry(device, superblock, |entry| {
        entry.status == EntryStatus::Extent && entry.extent == seq && entry.name == *name
    })
}

/// Writes `entry` into the directory.
/// With `pos`, the slot at `pos` is overwritten. Without it, the first free slot
/// is used, and a new directory block is linked into the superblock when every
/// slot is taken.
/// Returns the position the entry was stored at.
pub fn dir_insert_entry(
    device: &impl BlockDevice,
    volume: &mut Volume,
    pos: Option<EntryPos>,
    entry: &DirEntry,
) -> Result<EntryPos> {
    if let Some(pos) = pos {
        let block_id = volume
            .superblock
            .dir_block(pos.dir_index)
            .filter(|_| pos.slot < NUM_ENTRY_PER_BLOCK)
            .ok_or(FsError::InvalidEntryIndex(pos.index()))?;
        let mut dir_block = read_dir_block(device, block_id)?;
        dir_block.entries[pos.slot] = *entry;
        write_dir_block(device, block_id, &dir_block)?;
        debug!("updated entry {} ({:?})", pos.index(), entry.name());
        return Ok(pos);
    }

    let mut num_dir_blocks = 0;
    for (dir_index, block_id) in volume.superblock.dir_blocks().enumerate() {
        num_dir_blocks += 1;
        let mut dir_block = read_dir_block(device, block_id)?;
        if let Some(slot) = dir_block.free_slot() {
            dir_block.entries[slot] = *entry;
            write_dir_block(device, block_id, &dir_block)?;
            let pos = EntryPos::new(dir_index, slot);
            debug!("added entry {} ({:?})", pos.index(), entry.name());
            return Ok(pos);
        }
    }

    // Every slot is taken, link a new directory block.
    if num_dir_blocks >= MAX_DIR_BLOCKS {
        return Err(FsError::DirectoryFull);
    }
    let block_id = volume.free_map.alloc()?;
    let mut dir_block = DirBlock::EMPTY;
    dir_block.entries[0] = *entry;
    if let Err(e) = write_dir_block(device, block_id, &dir_block) {
        volume.free_map.free(block_id)?;
        return Err(e);
    }
    let dir_index = volume.superblock.push_dir_block(block_id)?;
    write_superblock(device, &volume.superblock)?;
    debug!("directory grew to block {block_id} at position {dir_index}");

    Ok(EntryPos::new(dir_index, 0))
}

/// Releases the blocks held by `entry` and frees its slot at `pos`.
/// The slot and the name can be reused right away.
pub fn dir_rm_entry(
    device: &impl BlockDevice,
    volume: &mut Volume,
    pos: EntryPos,
    entry: &DirEntry,
) -> Result<()> {
    for block_id in entry.used_blocks() {
        volume.free_map.free(block_id)?;
    }
    let freed = DirEntry {
        status: EntryStatus::Free,
        ..*entry
    };
    dir_insert_entry(device, volume, Some(pos), &freed)?;
    Ok(())
}

/// Every live entry (files and extents) in directory order.
pub fn read_dir(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Vec<(EntryPos, DirEntry)>> {
    let mut entries = vec![];
    for (dir_index, block_id) in superblock.dir_blocks().enumerate() {
        let dir_block = read_dir_block(device, block_id)?;
        for (slot, entry) in dir_block.entries.iter().enumerate() {
            if !entry.is_free() {
                entries.push((EntryPos::new(dir_index, slot), *entry));
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::bitmap::FreeMap;
    use crate::name::encode_name;

    struct MemDisk(Mutex<Vec<[u8; BLOCK_SIZE]>>);

    impl BlockDevice for MemDisk {
        fn num_blocks(&self) -> usize {
            self.0.lock().unwrap().len()
        }

        fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
            *buf = self.0.lock().unwrap()[block_id as usize];
            Ok(())
        }

        fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
            self.0.lock().unwrap()[block_id as usize] = *buf;
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    fn volume(num_blocks: usize) -> (MemDisk, Volume) {
        let disk = MemDisk(Mutex::new(vec![[0; BLOCK_SIZE]; num_blocks]));
        let mut free_map = FreeMap::new(num_blocks);
        free_map.mark_used(0).unwrap();
        free_map.mark_used(1).unwrap();
        let superblock = SuperBlock::new(num_blocks as u16, "test");
        write_superblock(&disk, &superblock).unwrap();
        (disk, Volume { superblock, free_map })
    }

    #[test]
    fn test_insert_and_find() {
        let (disk, mut vol) = volume(8);
        let a = DirEntry::new_file(encode_name("a"));
        let b = DirEntry::new_file(encode_name("b"));
        assert_eq!(dir_insert_entry(&disk, &mut vol, None, &a).unwrap(), EntryPos::new(0, 0));
        assert_eq!(dir_insert_entry(&disk, &mut vol, None, &b).unwrap(), EntryPos::new(0, 1));

        let (pos, found) = find_primary(&disk, &vol.superblock, &encode_name("B")).unwrap().unwrap();
        assert_eq!(pos.index(), 1);
        assert_eq!(found, b);
        assert!(find_primary(&disk, &vol.superblock, &encode_name("c")).unwrap().is_none());
    }

    #[test]
    fn test_extent_is_not_primary() {
        let (disk, mut vol) = volume(8);
        let name = encode_name("big");
        dir_insert_entry(&disk, &mut vol, None, &DirEntry::new_extent(name, 1)).unwrap();
        assert!(find_primary(&disk, &vol.superblock, &name).unwrap().is_none());
        assert!(find_extent(&disk, &vol.superblock, &name, 2).unwrap().is_none());
        let (pos, _) = find_extent(&disk, &vol.superblock, &name, 1).unwrap().unwrap();
        assert_eq!(pos, EntryPos::new(0, 0));
    }

    #[test]
    fn test_update_in_place() {
        let (disk, mut vol) = volume(8);
        let mut entry = DirEntry::new_file(encode_name("x"));
        let pos = dir_insert_entry(&disk, &mut vol, None, &entry).unwrap();
        entry.size = 12;
        assert_eq!(dir_insert_entry(&disk, &mut vol, Some(pos), &entry).unwrap(), pos);
        let (_, found) = find_primary(&disk, &vol.superblock, &entry.name).unwrap().unwrap();
        assert_eq!(found.size, 12);

        let missing = EntryPos::new(1, 0);
        assert!(matches!(
            dir_insert_entry(&disk, &mut vol, Some(missing), &entry),
            Err(FsError::InvalidEntryIndex(32))
        ));
    }

    #[test]
    fn test_directory_grows() {
        let (disk, mut vol) = volume(8);
        for i in 0..NUM_ENTRY_PER_BLOCK {
            let entry = DirEntry::new_file(encode_name(&format!("f{i}")));
            dir_insert_entry(&disk, &mut vol, None, &entry).unwrap();
        }
        let entry = DirEntry::new_file(encode_name("overflow"));
        let pos = dir_insert_entry(&disk, &mut vol, None, &entry).unwrap();
        assert_eq!(pos, EntryPos::new(1, 0));
        assert_eq!(vol.superblock.dir_blocks().collect::<Vec<_>>(), vec![1, 2]);
        assert!(vol.free_map.is_used(2));

        let on_disk = crate::superblock::read_superblock(&disk).unwrap();
        assert_eq!(on_disk, vol.superblock);
        assert_eq!(read_dir(&disk, &vol.superblock).unwrap().len(), NUM_ENTRY_PER_BLOCK + 1);
    }

    #[test]
    fn test_remove_frees_slot_and_blocks() {
        let (disk, mut vol) = volume(8);
        let mut entry = DirEntry::new_file(encode_name("gone"));
        entry.blocks[0] = vol.free_map.alloc().unwrap() as u16;
        entry.blocks[1] = vol.free_map.alloc().unwrap() as u16;
        let pos = dir_insert_entry(&disk, &mut vol, None, &entry).unwrap();

        dir_rm_entry(&disk, &mut vol, pos, &entry).unwrap();
        assert!(!vol.free_map.is_used(2));
        assert!(!vol.free_map.is_used(3));
        assert!(find_primary(&disk, &vol.superblock, &entry.name).unwrap().is_none());
        assert!(read_dir(&disk, &vol.superblock).unwrap().is_empty());

        let other = DirEntry::new_file(encode_name("next"));
        assert_eq!(dir_insert_entry(&disk, &mut vol, None, &other).unwrap(), pos);
    }
}
