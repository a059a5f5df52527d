use crate::config::BLOCK_SIZE;
use crate::error::Result;

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads a block of data from the block device.
    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Writes a block of data to the block device.
    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Flushes any buffered data to the underlying storage.
    fn flush(&self) -> Result<()>;
}

