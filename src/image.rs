//! A block device backed by a disk image file on the host.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use log::debug;

use crate::config::BLOCK_SIZE;
use crate::error::{FsError, Result};
use crate::BlockDevice;

#[derive(Debug)]
pub struct ImageFile {
    inner: Mutex<File>,
    num_blocks: usize,
}

impl ImageFile {
    /// Creates (or truncates) an image of `num_blocks` zeroed blocks.
    pub fn create(path: impl AsRef<Path>, num_blocks: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len((num_blocks * BLOCK_SIZE) as u64)?;
        debug!("created image {:?}, {num_blocks} blocks", path.as_ref());
        Ok(Self {
            inner: Mutex::new(file),
            num_blocks,
        })
    }

    /// Opens an existing image. Its length sets the block count; a trailing
    /// partial block is ignored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let num_blocks = file.metadata()?.len() as usize / BLOCK_SIZE;
        Ok(Self {
            inner: Mutex::new(file),
            num_blocks,
        })
    }

    fn seek_to(file: &mut File, block_id: u32) -> Result<()> {
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, File> {
        // A poisoned lock still guards a usable file handle.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BlockDevice for ImageFile {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        if block_id as usize >= self.num_blocks {
            return Err(FsError::InvalidBlockId(block_id));
        }
        let mut file = self.lock();
        Self::seek_to(&mut file, block_id)?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        if block_id as usize >= self.num_blocks {
            return Err(FsError::InvalidBlockId(block_id));
        }
        let mut file = self.lock();
        Self::seek_to(&mut file, block_id)?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.lock();
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}
