use std::sync::Arc;

use log::info;

use crate::bitmap::FreeMap;
use crate::dump::Dump;
use crate::error::{FsError, Result};
use crate::file::{fdelete, flist, fread, fstat, fwrite, FileInfo};
use crate::superblock::{format_fs, load_volume, read_superblock};
use crate::{BlockDevice, SuperBlock};

/// State of a mounted volume: the cached superblock and the free-block map
/// rebuilt at mount time.
#[derive(Debug)]
pub struct Volume {
    pub superblock: SuperBlock,
    pub free_map: FreeMap,
}

/// A session over one block device.
///
/// The session starts unmounted. `format` lays out a volume, `mount` loads it,
/// and every file operation fails with [`FsError::NotMounted`] until then.
/// Operations take `&mut self` whenever they touch volume state; wrap the
/// session in a lock to share it.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    volume: Option<Volume>,
}

impl<D: BlockDevice> FileSystem<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            volume: None,
        }
    }

    pub fn format(&mut self, label: &str) -> Result<()> {
        if self.volume.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        format_fs(&*self.device, label)?;
        Ok(())
    }

    pub fn mount(&mut self) -> Result<()> {
        if self.volume.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        let volume = load_volume(&*self.device)?;
        info!(
            "mounted {:?}: {} blocks, {} free",
            volume.superblock.label(),
            volume.superblock.num_blocks,
            volume.free_map.num_free()
        );
        self.volume = Some(volume);
        Ok(())
    }

    /// Ends the session, flushing the device.
    pub fn unmount(&mut self) -> Result<()> {
        let volume = self.volume.take().ok_or(FsError::NotMounted)?;
        self.device.flush()?;
        info!("unmounted {:?}", volume.superblock.label());
        Ok(())
    }

    pub fn is_mounted(&self) -> bool {
        self.volume.is_some()
    }

    fn volume(&self) -> Result<&Volume> {
        self.volume.as_ref().ok_or(FsError::NotMounted)
    }

    fn volume_mut(&mut self) -> Result<&mut Volume> {
        self.volume.as_mut().ok_or(FsError::NotMounted)
    }

    pub fn list(&self) -> Result<Vec<FileInfo>> {
        flist(&*self.device, &self.volume()?.superblock)
    }

    pub fn stat(&self, name: &str) -> Result<FileInfo> {
        fstat(&*self.device, &self.volume()?.superblock, name)
    }

    /// Reads from `name` at `offset` into `buf`.
    /// Returns the number of bytes read, which is short at end-of-file.
    pub fn read(&self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize> {
        fread(&*self.device, &self.volume()?.superblock, name, offset, buf)
    }

    /// Reads up to `length` bytes from `name` at `offset`.
    /// The buffer never outgrows what the file holds past `offset`.
    pub fn read_vec(&self, name: &str, offset: usize, length: usize) -> Result<Vec<u8>> {
        let size = self.stat(name)?.size;
        let mut buf = vec![0u8; length.min(size.saturating_sub(offset))];
        let bytes_read = self.read(name, offset, &mut buf)?;
        buf.truncate(bytes_read);
        Ok(buf)
    }

    /// Writes `buf` to `name` at `offset`, creating the file on first write.
    pub fn write(&mut self, name: &str, offset: usize, buf: &[u8]) -> Result<usize> {
        let device = Arc::clone(&self.device);
        fwrite(&*device, self.volume_mut()?, name, offset, buf)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let device = Arc::clone(&self.device);
        fdelete(&*device, self.volume_mut()?, name)
    }

    /// Diagnostic view of the device, formatted or not, mounted or not.
    pub fn dump(&self) -> Result<Dump> {
        let superblock = read_superblock(&*self.device)?;
        let mut dump = Dump {
            superblock: superblock.is_valid().then_some(superblock),
            used_blocks: None,
            files: None,
        };
        if let Some(volume) = &self.volume {
            dump.used_blocks = Some(volume.free_map.used_blocks().collect());
            dump.files = Some(self.list()?);
        }
        Ok(dump)
    }

    pub fn superblock(&self) -> Option<&SuperBlock> {
        self.volume.as_ref().map(|v| &v.superblock)
    }

    pub fn free_map(&self) -> Option<&FreeMap> {
        self.volume.as_ref().map(|v| &v.free_map)
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}
