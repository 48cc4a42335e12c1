//! 目录块里的目录项
//!
//! 目录块布局：前 4 字节是游标（下一条记录的偏移），
//! `[4, 游标)` 之间是一条接一条的变长记录：
//!
//! | 偏移 | 大小 | 字段 |
//! |------|------|------|
//! | 0 | 4 | inode 号，0 表示已删除 |
//! | 4 | 2 | rec_len，记录总长度 |
//! | 6 | 1 | name_len |
//! | 7 | 1 | file_type |
//! | 8 | name_len | 名字（无结尾 0） |

use crate::mfs_backend::config::*;
use crate::mfs_backend::disknode::FileType;
use crate::mfs_backend::endian::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
    pub name: Vec<u8>,
}

impl DirEntry {
    pub const MAX_NAME_LEN: u8 = 255;

    /// 新记录，rec_len 恰好容纳名字
    pub fn new(inode: u32, file_type: FileType, name: &[u8]) -> Self {
        let name_len = name.len().min(Self::MAX_NAME_LEN as usize);
        Self {
            inode,
            rec_len: Self::entry_len(name_len as u8),
            name_len: name_len as u8,
            file_type: file_type.mode() as u8,
            name: name[..name_len].to_vec(),
        }
    }

    /// 名字长度为 `name_len` 的记录所需字节数
    pub const fn entry_len(name_len: u8) -> u16 {
        DIR_ENTRY_HEADER_SIZE as u16 + name_len as u16
    }

    pub fn is_live(&self) -> bool {
        self.inode != 0
    }

    pub fn kind(&self) -> Option<FileType> {
        FileType::from_mode(self.file_type as u16)
    }

    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// 从 `bytes` 开头解析一条记录；头部或名字越界时返回 None
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < DIR_ENTRY_HEADER_SIZE {
            return None;
        }
        let name_len = bytes[6];
        let end = DIR_ENTRY_HEADER_SIZE + name_len as usize;
        if bytes.len() < end {
            return None;
        }
        Some(Self {
            inode: read_u32_le(bytes, 0),
            rec_len: read_u16_le(bytes, 4),
            name_len,
            file_type: bytes[7],
            name: bytes[DIR_ENTRY_HEADER_SIZE..end].to_vec(),
        })
    }

    /// 写出头部和名字，调用方保证空间足够
    pub fn write_to(&self, bytes: &mut [u8]) {
        write_u32_le(bytes, 0, self.inode);
        write_u16_le(bytes, 4, self.rec_len);
        bytes[6] = self.name_len;
        bytes[7] = self.file_type;
        let end = DIR_ENTRY_HEADER_SIZE + self.name_len as usize;
        bytes[DIR_ENTRY_HEADER_SIZE..end].copy_from_slice(&self.name[..self.name_len as usize]);
    }
}

/// 读取目录块游标
pub fn read_cursor(block: &[u8]) -> usize {
    read_u32_le(block, 0) as usize
}

fn write_cursor(block: &mut [u8], cursor: usize) {
    write_u32_le(block, 0, cursor as u32);
}

/// 遍历目录块内 `[4, 游标)` 的记录，产出 (偏移, 记录)
pub struct DirEntryIter<'a> {
    block: &'a [u8],
    offset: usize,
    end: usize,
}

impl<'a> DirEntryIter<'a> {
    pub fn new(block: &'a [u8]) -> Self {
        let end = read_cursor(block).min(block.len());
        Self {
            block,
            offset: DIR_CURSOR_SIZE,
            end,
        }
    }
}

impl Iterator for DirEntryIter<'_> {
    type Item = (usize, DirEntry);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }
        let entry = DirEntry::parse(&self.block[self.offset..self.end])?;
        if (entry.rec_len as usize) < DIR_ENTRY_HEADER_SIZE {
            // 损坏的记录，停止遍历
            return None;
        }
        let at = self.offset;
        self.offset += entry.rec_len as usize;
        Some((at, entry))
    }
}

/// 把块初始化为只含 "." 和 ".." 的目录块
pub fn init_dir_block(block: &mut [u8], self_id: u32, parent_id: u32) {
    block.fill(0);
    write_cursor(block, DIR_CURSOR_SIZE);
    let dot = DirEntry::new(self_id, FileType::Directory, b".");
    let dotdot = DirEntry::new(parent_id, FileType::Directory, b"..");
    append_entry(block, &dot);
    append_entry(block, &dotdot);
}

/// 在游标处追加记录，放不下返回 false
pub fn append_entry(block: &mut [u8], entry: &DirEntry) -> bool {
    let cursor = read_cursor(block);
    let end = cursor + entry.rec_len as usize;
    if cursor < DIR_CURSOR_SIZE || end > block.len() {
        return false;
    }
    entry.write_to(&mut block[cursor..end]);
    write_cursor(block, end);
    true
}

/// 首次适配：复用第一个足够大的已删除记录，保留它原来的 rec_len
pub fn reuse_tombstone(block: &mut [u8], entry: &DirEntry) -> bool {
    let slot = DirEntryIter::new(block)
        .find(|(_, e)| !e.is_live() && e.rec_len >= entry.rec_len)
        .map(|(off, e)| (off, e.rec_len));
    match slot {
        Some((off, rec_len)) => {
            let mut placed = entry.clone();
            placed.rec_len = rec_len;
            placed.write_to(&mut block[off..off + rec_len as usize]);
            true
        }
        None => false,
    }
}

/// 把第一条满足条件的有效记录标记为已删除，rec_len 不变
pub fn tombstone_first<F>(block: &mut [u8], mut pred: F) -> bool
where
    F: FnMut(&DirEntry) -> bool,
{
    let hit = DirEntryIter::new(block)
        .find(|(_, e)| e.is_live() && pred(e))
        .map(|(off, _)| off);
    match hit {
        Some(off) => {
            write_u32_le(block, off, 0);
            true
        }
        None => false,
    }
}

/// 把第一条满足条件的有效记录改指向 `new_inode`
pub fn retarget_first<F>(block: &mut [u8], new_inode: u32, mut pred: F) -> bool
where
    F: FnMut(&DirEntry) -> bool,
{
    let hit = DirEntryIter::new(block)
        .find(|(_, e)| e.is_live() && pred(e))
        .map(|(off, _)| off);
    match hit {
        Some(off) => {
            write_u32_le(block, off, new_inode);
            true
        }
        None => false,
    }
}
