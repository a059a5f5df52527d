//! The free-block map of a mounted volume.
//! It lives in memory only and is rebuilt from the directory on every mount.

use log::{debug, warn};

use crate::error::{FsError, Result};

#[derive(Debug, Clone)]
pub struct FreeMap {
    bits: Vec<u8>,
    num_blocks: usize,
}

impl FreeMap {
    /// A map with every block free.
    pub fn new(num_blocks: usize) -> Self {
        Self {
            bits: vec![0; num_blocks.div_ceil(8)],
            num_blocks,
        }
    }

    /// Set the first bit that is not equal to `value`, scanning from block 0.
    /// Returns the block ID of the bit that was flipped.
    fn set_first_fit_bit(&mut self, value: bool) -> Option<u32> {
        for (j, byte) in self.bits.iter_mut().enumerate() {
            for k in 0..8 {
                let block_id = j * 8 + k;
                if block_id >= self.num_blocks {
                    return None;
                }
                let is_set = (*byte & (1 << k)) != 0;
                if is_set != value {
                    if value {
                        *byte |= 1 << k;
                    } else {
                        *byte &= !(1 << k);
                    }
                    return Some(block_id as u32);
                }
            }
        }
        None
    }

    /// Sets the bit of `block_id`. Returns the previous value.
    fn set_bit_at(&mut self, block_id: u32, set_value: bool) -> Result<bool> {
        if block_id as usize >= self.num_blocks {
            return Err(FsError::InvalidBlockId(block_id));
        }
        let byte = &mut self.bits[block_id as usize / 8];
        let bit_offset = block_id % 8;
        let pre_value = (*byte & (1 << bit_offset)) != 0;
        if set_value {
            *byte |= 1 << bit_offset;
        } else {
            *byte &= !(1 << bit_offset);
        }
        Ok(pre_value)
    }

    /// Allocates the lowest free block.
    pub fn alloc(&mut self) -> Result<u32> {
        let block_id = self.set_first_fit_bit(true).ok_or(FsError::Exhausted)?;
        debug!("alloc block {block_id}");
        Ok(block_id)
    }

    /// Returns a block to the free pool.
    pub fn free(&mut self, block_id: u32) -> Result<()> {
        if !self.set_bit_at(block_id, false)? {
            warn!("block {block_id} freed while already free");
        }
        debug!("free block {block_id}");
        Ok(())
    }

    /// Marks a block as used, whatever its current state.
    pub fn mark_used(&mut self, block_id: u32) -> Result<()> {
        self.set_bit_at(block_id, true)?;
        Ok(())
    }

    pub fn is_used(&self, block_id: u32) -> bool {
        let block_id = block_id as usize;
        block_id < self.num_blocks && self.bits[block_id / 8] & (1 << (block_id % 8)) != 0
    }

    pub fn used_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.num_blocks as u32).filter(|&id| self.is_used(id))
    }

    pub fn num_free(&self) -> usize {
        self.num_blocks - self.used_blocks().count()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_first_fit() {
        let mut map = FreeMap::new(12);
        map.mark_used(0).unwrap();
        map.mark_used(2).unwrap();
        assert_eq!(map.alloc().unwrap(), 1);
        assert_eq!(map.alloc().unwrap(), 3);
        map.free(1).unwrap();
        assert_eq!(map.alloc().unwrap(), 1);
        assert_eq!(map.used_blocks().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(map.num_free(), 8);
    }

    #[test]
    fn test_exhausted() {
        let mut map = FreeMap::new(3);
        for _ in 0..3 {
            map.alloc().unwrap();
        }
        assert!(matches!(map.alloc(), Err(FsError::Exhausted)));
    }

    #[test]
    fn test_bounds() {
        let mut map = FreeMap::new(9);
        assert!(matches!(map.mark_used(9), Err(FsError::InvalidBlockId(9))));
        assert!(matches!(map.free(100), Err(FsError::InvalidBlockId(100))));
        assert!(!map.is_used(9));
        map.mark_used(8).unwrap();
        assert!(map.is_used(8));
    }

    #[test]
    fn test_double_free_keeps_block_free() {
        let mut map = FreeMap::new(4);
        let id = map.alloc().unwrap();
        map.free(id).unwrap();
        map.free(id).unwrap();
        assert!(!map.is_used(id));
        assert_eq!(map.num_free(), 4);
    }
}
