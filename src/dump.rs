//! Human-readable report of a device's superblock, used blocks and files.

use core::fmt;

use crate::config::MAX_DIR_BLOCKS;
use crate::file::FileInfo;
use crate::SuperBlock;

#[derive(Debug, Clone)]
pub struct Dump {
    /// `None` when block 0 does not hold a formatted superblock.
    pub superblock: Option<SuperBlock>,
    /// Present only while mounted.
    pub used_blocks: Option<Vec<u32>>,
    pub files: Option<Vec<FileInfo>>,
}

impl fmt::Display for Dump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(sb) = &self.superblock else {
            return writeln!(f, "disk unformatted");
        };
        writeln!(f, "superblock:")?;
        writeln!(f, "    magic = {:#x}", sb.magic)?;
        writeln!(f, "    {} blocks", sb.num_blocks)?;
        writeln!(f, "    dir_size: {MAX_DIR_BLOCKS}")?;
        writeln!(f, "    first dir block: {}", sb.dir_blocks[0])?;
        writeln!(f, "    disk label: {}", sb.label())?;
        write!(f, "dir blocks:")?;
        for block_id in sb.dir_blocks() {
            write!(f, " {block_id}")?;
        }
        writeln!(f)?;

        if let Some(used) = &self.used_blocks {
            write!(f, "used blocks:")?;
            for block_id in used {
                write!(f, " {block_id}")?;
            }
            writeln!(f)?;
        }
        if let Some(files) = &self.files {
            writeln!(f, "files:")?;
            for file in files {
                writeln!(f, "    {}, size: {} bytes, {} blocks", file.name, file.size, file.blocks)?;
            }
        }
        Ok(())
    }
}
