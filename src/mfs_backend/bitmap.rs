//! 位图操作
//!
//! 位图按 32 位小端字组织，全局位 `i` 落在第 `i / 32` 个字的
//! 第 `31 - i % 32` 位（高位在前）。这里只有纯函数，不碰设备。

use crate::mfs_backend::endian::{read_u32_le, write_u32_le};

const FULL_WORD: u32 = u32::MAX;

#[inline]
fn locate(bit: u32) -> (usize, u32) {
    let word = (bit / 32) as usize * 4;
    let mask = 1u32 << (31 - bit % 32);
    (word, mask)
}

/// 找到前 `limit` 位中第一个为 0 的位
pub fn first_zero_bit(bitmap: &[u8], limit: u32) -> Option<u32> {
    let words = (limit as usize).div_ceil(32).min(bitmap.len() / 4);
    for w in 0..words {
        let word = read_u32_le(bitmap, w * 4);
        if word == FULL_WORD {
            continue;
        }
        let bit = w as u32 * 32 + (!word).leading_zeros();
        return if bit < limit { Some(bit) } else { None };
    }
    None
}

/// 检查某一位是否已占用
pub fn test_bit(bitmap: &[u8], bit: u32) -> bool {
    let (off, mask) = locate(bit);
    read_u32_le(bitmap, off) & mask != 0
}

/// 置位
pub fn set_bit(bitmap: &mut [u8], bit: u32) {
    let (off, mask) = locate(bit);
    let word = read_u32_le(bitmap, off);
    write_u32_le(bitmap, off, word | mask);
}

/// 清位
pub fn clear_bit(bitmap: &mut [u8], bit: u32) {
    let (off, mask) = locate(bit);
    let word = read_u32_le(bitmap, off);
    write_u32_le(bitmap, off, word & !mask);
}
