//! 磁盘字节序转换，所有多字节字段均为小端

/// 磁盘记录的编解码
///
/// 调用方保证切片长度不小于 `DISK_SIZE`。
pub trait DiskFormat: Sized {
    /// 记录在磁盘上的字节数
    const DISK_SIZE: usize;

    /// 从磁盘字节解析
    fn from_disk_bytes(bytes: &[u8]) -> Self;

    /// 写回磁盘字节
    fn to_disk_bytes(&self, bytes: &mut [u8]);
}

#[inline]
pub fn read_u16_le(bytes: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([bytes[off], bytes[off + 1]])
}

#[inline]
pub fn read_u32_le(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

#[inline]
pub fn read_u64_le(bytes: &[u8], off: usize) -> u64 {
    let lo = read_u32_le(bytes, off) as u64;
    let hi = read_u32_le(bytes, off + 4) as u64;
    (hi << 32) | lo
}

#[inline]
pub fn write_u16_le(bytes: &mut [u8], off: usize, v: u16) {
    bytes[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn write_u32_le(bytes: &mut [u8], off: usize, v: u32) {
    bytes[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn write_u64_le(bytes: &mut [u8], off: usize, v: u64) {
    bytes[off..off + 8].copy_from_slice(&v.to_le_bytes());
}
