//! Superblock persistence and the format/mount steps that build a volume.

use log::{debug, info};

use crate::bitmap::FreeMap;
use crate::config::*;
use crate::directory::read_dir_block;
use crate::error::{FsError, Result};
use crate::fs::Volume;
use crate::{BlockDevice, SuperBlock};

/// Reads block 0 as a superblock without validating it.
pub fn read_superblock(device: &impl BlockDevice) -> Result<SuperBlock> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(SUPERBLOCK_ID, &mut buf)?;
    Ok(SuperBlock::decode(&buf))
}

pub fn write_superblock(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<()> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    superblock.encode(&mut buf);
    device.write_block(SUPERBLOCK_ID, &buf)?;
    device.flush()?;
    Ok(())
}

/// Lays out an empty volume on the device: a zeroed first directory block,
/// then the superblock pointing at it.
pub fn format_fs(device: &impl BlockDevice, label: &str) -> Result<SuperBlock> {
    let num_blocks = device.num_blocks();
    if num_blocks <= FIRST_DIR_BLOCK_ID as usize || num_blocks > u16::MAX as usize {
        return Err(FsError::InvalidGeometry(num_blocks));
    }

    let zero_block = Box::new([0u8; BLOCK_SIZE]);
    device.write_block(FIRST_DIR_BLOCK_ID, &zero_block)?;

    let superblock = SuperBlock::new(num_blocks as u16, label);
    write_superblock(device, &superblock)?;
    info!(
        "formatted {} blocks, label {:?}",
        num_blocks,
        superblock.label()
    );
    Ok(superblock)
}

/// Validates the superblock and rebuilds the free map by walking the directory.
pub fn load_volume(device: &impl BlockDevice) -> Result<Volume> {
    let superblock = read_superblock(device)?;
    if !superblock.is_valid() {
        return Err(FsError::Unformatted(superblock.magic));
    }
    let num_blocks = device.num_blocks();
    if superblock.num_blocks as usize != num_blocks {
        return Err(FsError::SizeMismatch {
            stored: superblock.num_blocks as usize,
            actual: num_blocks,
        });
    }

    let mut free_map = FreeMap::new(num_blocks);
    free_map.mark_used(SUPERBLOCK_ID)?;
    for dir_block_id in superblock.dir_blocks() {
        free_map
            .mark_used(dir_block_id)
            .map_err(|_| FsError::Corruption {
                block: SUPERBLOCK_ID,
                detail: format!("directory block {dir_block_id} is outside the volume"),
            })?;
        let dir_block = read_dir_block(device, dir_block_id)?;
        for entry in dir_block.entries.iter().filter(|e| !e.is_free()) {
            for block_id in entry.used_blocks() {
                free_map
                    .mark_used(block_id)
                    .map_err(|_| FsError::Corruption {
                        block: dir_block_id,
                        detail: format!("{:?} points at block {block_id}", entry.name()),
                    })?;
            }
        }
    }
    debug!(
        "mounted volume: {} directory blocks, {} free blocks",
        superblock.num_dir_blocks(),
        free_map.num_free()
    );

    Ok(Volume {
        superblock,
        free_map,
    })
}
