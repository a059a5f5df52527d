//! OFS is a tiny flat file system living directly on a fixed-size block device.
//! No permissions, timestamps or subdirectories: a volume is a list of named files.
//!
//! OFS on-disk layout:
//! - Block 0: Superblock (magic, size, label, list of directory blocks)
//! - Block 1: First directory block
//! - Other blocks: more directory blocks and file data, in allocation order
//!
//! OFS layers (from bottom to top):
//! 1. Block Device: fixed-size block reads and writes.          | User implemented (or `ImageFile`)
//! 2. Free Map: in-memory used/free flag per block.              | Rebuilt on mount
//! 3. Superblock: volume identity and directory block list.     | Fs implemented
//! 4. Directory: fixed-size entries, file entries and extents.  | Fs implemented
//! 5. File: offset reads and writes over an entry chain.        | Fs implemented
//! 6. FileSystem: the mounted session users talk to.            | Fs implemented

mod config;
mod block_dev;
mod structs;
mod name;
mod bitmap;
mod superblock;
mod directory;
mod file;
mod fs;
mod dump;
mod image;
mod error;

pub use block_dev::BlockDevice;
pub use config::*;
pub use structs::*;
pub use name::{decode, encode, encode_name, RawName};
pub use bitmap::FreeMap;
pub use superblock::{read_superblock, write_superblock};
pub use directory::{find_extent, find_primary, read_dir, read_dir_block, write_dir_block};
pub use file::FileInfo;
pub use fs::{FileSystem, Volume};
pub use dump::Dump;
pub use image::ImageFile;
pub use error::FsError as Error;
pub use error::Result;
