//! Common utilities for tests

#![allow(unused)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use ofs::{BlockDevice, Error, FileSystem, Result, BLOCK_SIZE};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

/// Routes library log records to the test output, `RUST_LOG` permitting.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE]),
            num_blocks,
        }
    }

    /// A copy of this disk's content on a device of another size.
    pub fn resized(&self, num_blocks: usize) -> Self {
        let mut data = self.inner.lock().unwrap().clone();
        data.resize(num_blocks * BLOCK_SIZE, 0);
        RamDisk {
            inner: Mutex::new(data),
            num_blocks,
        }
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        if block_id as usize >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id));
        }
        let start = block_id as usize * BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        if block_id as usize >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id));
        }
        let start = block_id as usize * BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // In a RAM disk, flushing is a no-op since data is already in memory.
        Ok(())
    }
}

/// A RamDisk whose writes to one chosen block fail while armed.
pub struct FaultyDisk {
    disk: RamDisk,
    failing: AtomicU32,
}

impl FaultyDisk {
    pub fn new(num_blocks: usize) -> Self {
        FaultyDisk {
            disk: RamDisk::new(num_blocks),
            failing: AtomicU32::new(u32::MAX),
        }
    }

    pub fn fail_writes_to(&self, block_id: u32) {
        self.failing.store(block_id, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failing.store(u32::MAX, Ordering::SeqCst);
    }
}

impl BlockDevice for FaultyDisk {
    fn num_blocks(&self) -> usize {
        self.disk.num_blocks()
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.disk.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        if block_id == self.failing.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other(format!("write to block {block_id} failed"))));
        }
        self.disk.write_block(block_id, buf)
    }

    fn flush(&self) -> Result<()> {
        self.disk.flush()
    }
}

/// A formatted and mounted file system on a fresh RamDisk.
pub fn mounted(num_blocks: usize) -> FileSystem<RamDisk> {
    init_logger();
    let mut fs = FileSystem::new(Arc::new(RamDisk::new(num_blocks)));
    fs.format("test").unwrap();
    fs.mount().unwrap();
    fs
}

pub fn used_blocks(fs: &FileSystem<RamDisk>) -> Vec<u32> {
    fs.free_map().unwrap().used_blocks().collect()
}

/// Deterministic, non-repeating-per-block content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
