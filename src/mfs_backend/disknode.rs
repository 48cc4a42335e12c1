//! 磁盘节点：inode、描述符块头和块组描述符

use crate::mfs_backend::blockdev::BlockAddr;
use crate::mfs_backend::config::*;
use crate::mfs_backend::endian::*;

/// inode 类型，磁盘上 mode 字段 0 为目录、1 为普通文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Directory,
    Regular,
}

impl FileType {
    pub const fn from_mode(mode: u16) -> Option<Self> {
        match mode {
            0 => Some(FileType::Directory),
            1 => Some(FileType::Regular),
            _ => None,
        }
    }

    pub const fn mode(self) -> u16 {
        match self {
            FileType::Directory => 0,
            FileType::Regular => 1,
        }
    }
}

impl core::fmt::Display for FileType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FileType::Directory => write!(f, "directory"),
            FileType::Regular => write!(f, "file"),
        }
    }
}

/// Inode (88 字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub node_id: u16,                        // inode 号，从 1 开始
    pub mode: u16,                           // 0 目录 / 1 文件
    pub file_size: u64,                      // 文件字节数，目录为块大小
    pub creation_time: u32,                  // 创建时间
    pub access_time: u32,                    // 最后访问时间
    pub modification_time: u32,              // 最后修改时间
    pub datablocks: [u32; DATABLOCK_NUM],    // 0..12 直接，12 一级，13 二级，14 三级（保留）
}

impl DiskFormat for Inode {
    const DISK_SIZE: usize = INODE_SIZE;

    fn from_disk_bytes(bytes: &[u8]) -> Self {
        let mut datablocks = [0u32; DATABLOCK_NUM];
        for (i, slot) in datablocks.iter_mut().enumerate() {
            *slot = read_u32_le(bytes, 28 + i * 4);
        }
        Self {
            node_id: read_u16_le(bytes, 0),
            mode: read_u16_le(bytes, 2),
            file_size: read_u64_le(bytes, 8),
            creation_time: read_u32_le(bytes, 16),
            access_time: read_u32_le(bytes, 20),
            modification_time: read_u32_le(bytes, 24),
            datablocks,
        }
    }

    fn to_disk_bytes(&self, bytes: &mut [u8]) {
        write_u16_le(bytes, 0, self.node_id);
        write_u16_le(bytes, 2, self.mode);
        write_u32_le(bytes, 4, 0);
        write_u64_le(bytes, 8, self.file_size);
        write_u32_le(bytes, 16, self.creation_time);
        write_u32_le(bytes, 20, self.access_time);
        write_u32_le(bytes, 24, self.modification_time);
        for (i, blk) in self.datablocks.iter().enumerate() {
            write_u32_le(bytes, 28 + i * 4, *blk);
        }
    }
}

impl Inode {
    /// 新建 inode，三个时间戳都取 `now`
    pub fn new(node_id: u16, file_type: FileType, file_size: u64, now: u32) -> Self {
        Self {
            node_id,
            mode: file_type.mode(),
            file_size,
            creation_time: now,
            access_time: now,
            modification_time: now,
            datablocks: [0; DATABLOCK_NUM],
        }
    }

    pub fn id(&self) -> u32 {
        self.node_id as u32
    }

    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == Some(FileType::Directory)
    }

    pub fn is_file(&self) -> bool {
        self.file_type() == Some(FileType::Regular)
    }

    /// 目录用到的数据块（全部 15 个槽都按直接块处理）
    pub fn dir_blocks(&self) -> impl Iterator<Item = BlockAddr> + '_ {
        self.datablocks
            .iter()
            .filter(|b| **b != 0)
            .map(|b| BlockAddr(*b))
    }
}

/// 描述符块头 (12 字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupLinker {
    pub next_block: u32,      // 下一个描述符块，0 表示链尾
    pub no_descriptors: u32,  // 本块已有描述符数
    pub max_descriptors: u32, // 本块最多描述符数
}

impl DiskFormat for GroupLinker {
    const DISK_SIZE: usize = GROUP_LINKER_SIZE;

    fn from_disk_bytes(bytes: &[u8]) -> Self {
        Self {
            next_block: read_u32_le(bytes, 0),
            no_descriptors: read_u32_le(bytes, 4),
            max_descriptors: read_u32_le(bytes, 8),
        }
    }

    fn to_disk_bytes(&self, bytes: &mut [u8]) {
        write_u32_le(bytes, 0, self.next_block);
        write_u32_le(bytes, 4, self.no_descriptors);
        write_u32_le(bytes, 8, self.max_descriptors);
    }
}

impl GroupLinker {
    pub fn is_full(&self) -> bool {
        self.no_descriptors >= self.max_descriptors
    }

    pub fn next(&self) -> Option<BlockAddr> {
        if self.next_block == 0 {
            None
        } else {
            Some(BlockAddr(self.next_block))
        }
    }
}

/// 块组描述符 (20 字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupDescriptor {
    pub block_bitmap: u32, // 块位图所在块
    pub inode_bitmap: u32, // inode 位图所在块
    pub inode_table: u32,  // inode 表起始块
    pub free_blocks: u32,  // 空闲数据块数
    pub free_inodes: u32,  // 空闲 inode 数
}

impl DiskFormat for GroupDescriptor {
    const DISK_SIZE: usize = GROUP_DESC_SIZE;

    fn from_disk_bytes(bytes: &[u8]) -> Self {
        Self {
            block_bitmap: read_u32_le(bytes, 0),
            inode_bitmap: read_u32_le(bytes, 4),
            inode_table: read_u32_le(bytes, 8),
            free_blocks: read_u32_le(bytes, 12),
            free_inodes: read_u32_le(bytes, 16),
        }
    }

    fn to_disk_bytes(&self, bytes: &mut [u8]) {
        write_u32_le(bytes, 0, self.block_bitmap);
        write_u32_le(bytes, 4, self.inode_bitmap);
        write_u32_le(bytes, 8, self.inode_table);
        write_u32_le(bytes, 12, self.free_blocks);
        write_u32_le(bytes, 16, self.free_inodes);
    }
}

impl GroupDescriptor {
    /// 以 `first` 为块位图起点的新组（块位图、inode 位图、inode 表依次排列）
    pub fn fresh(first: BlockAddr, per_group: u32) -> Self {
        Self {
            block_bitmap: first.get(),
            inode_bitmap: first.offset(1).get(),
            inode_table: first.offset(2).get(),
            free_blocks: per_group,
            free_inodes: per_group,
        }
    }

    /// 组内第 `index` 个数据块的块号
    pub fn data_block(&self, inode_blocks: u32, index: u32) -> BlockAddr {
        BlockAddr(self.inode_table + inode_blocks + index)
    }

    /// 组内数据区起始块
    pub fn data_start(&self, inode_blocks: u32) -> BlockAddr {
        self.data_block(inode_blocks, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_layout_offsets() {
        let mut inode = Inode::new(7, FileType::Regular, 5000, 1_700_000_000);
        inode.datablocks[0] = 100;
        inode.datablocks[14] = 0xDEAD;
        let mut raw = [0xFFu8; INODE_SIZE];
        inode.to_disk_bytes(&mut raw);

        assert_eq!(&raw[0..2], &7u16.to_le_bytes());
        assert_eq!(&raw[2..4], &1u16.to_le_bytes());
        assert_eq!(&raw[4..8], &[0, 0, 0, 0]);
        assert_eq!(&raw[8..16], &5000u64.to_le_bytes());
        assert_eq!(&raw[28..32], &100u32.to_le_bytes());
        assert_eq!(&raw[84..88], &0xDEADu32.to_le_bytes());
        assert_eq!(Inode::from_disk_bytes(&raw), inode);
    }

    #[test]
    fn unknown_mode_has_no_type() {
        let mut inode = Inode::new(1, FileType::Directory, 0, 0);
        inode.mode = 9;
        assert_eq!(inode.file_type(), None);
        assert!(!inode.is_dir());
        assert!(!inode.is_file());
    }

    #[test]
    fn fresh_group_lays_out_consecutively() {
        let desc = GroupDescriptor::fresh(BlockAddr(40), 4096);
        assert_eq!(desc.inode_bitmap, 41);
        assert_eq!(desc.inode_table, 42);
        assert_eq!(desc.data_block(820, 3), BlockAddr(42 + 820 + 3));
    }
}
