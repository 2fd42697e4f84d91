use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{Result, StratusError};
use crate::types::BlockRange;

/// Split `size` bytes into contiguous `block_size` ranges.
///
/// The last range carries the remainder. A zero-length object yields an
/// empty plan.
pub fn plan(size: u64, block_size: u64) -> Result<Vec<BlockRange>> {
    if block_size == 0 {
        return Err(StratusError::InvalidBlockSize(block_size));
    }

    let count = block_count(size, block_size);
    let mut blocks = Vec::with_capacity(count);
    let mut offset = 0u64;

    while offset < size {
        let length = block_size.min(size - offset);
        blocks.push(BlockRange {
            index: blocks.len(),
            offset,
            length,
        });
        offset += length;
    }

    Ok(blocks)
}

/// `ceil(size / block_size)`; `block_size` must be non-zero.
pub fn block_count(size: u64, block_size: u64) -> usize {
    size.div_ceil(block_size) as usize
}

/// Raw block id: the block index as a little-endian u64.
pub fn block_id_bytes(index: usize) -> [u8; 8] {
    (index as u64).to_le_bytes()
}

/// Block id rendered to a URL- and filename-safe alphabet.
pub fn encode_block_id(index: usize) -> String {
    URL_SAFE_NO_PAD.encode(block_id_bytes(index))
}
