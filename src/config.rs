pub const MAGIC: u16 = 0xF0F0;

pub const BLOCK_SIZE: usize = 1024;
pub const SUPERBLOCK_ID: u32 = 0; // Block ID for the superblock
pub const FIRST_DIR_BLOCK_ID: u32 = 1; // Zeroed by format, always the first directory block

pub const NAME_LEN: usize = 11;
pub const LABEL_LEN: usize = 12;
pub const MAX_DIR_BLOCKS: usize = (BLOCK_SIZE - 4 - LABEL_LEN) / 2; // 504 slots in the superblock list

pub const DIR_ENTRY_SIZE: usize = 32;
pub const NUM_ENTRY_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
pub const NUM_DIRECT_PTRS: usize = 8; // Block pointers held by a single entry

/// Bytes of file content covered by one entry (primary or extent).
pub const ENTRY_SPAN: usize = NUM_DIRECT_PTRS * BLOCK_SIZE;
/// The extent counter is 16 bits wide, which bounds the chain length.
pub const MAX_CHAIN_LEN: usize = u16::MAX as usize + 1;
pub const MAX_FSIZE: usize = MAX_CHAIN_LEN * ENTRY_SPAN;
