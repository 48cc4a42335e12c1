//! 超级块
//!
//! 位于 block 0 开头的 40 字节，格式化时写入一次，之后只读。

use log::warn;

use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::config::*;
use crate::mfs_backend::endian::*;
use crate::mfs_backend::error::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub inodes_count: u32,        // 格式化时的 inode 总数
    pub blocks_count: u32,        // 格式化时的块总数
    pub blocks_per_group: u32,    // 每组数据块数 = block_size * 8
    pub inodes_per_group: u32,    // 每组 inode 数 = block_size * 8
    pub inode_blocks: u32,        // 每组 inode 表占用块数
    pub block_size: u32,          // 块大小
    pub max_filename_size: u32,   // 最大文件名长度
    pub max_directory_files: u32, // 单目录最大目录项数，u32::MAX 为不限制
    pub max_file_size: u64,       // 最大文件大小
}

impl DiskFormat for Superblock {
    const DISK_SIZE: usize = SUPERBLOCK_SIZE;

    fn from_disk_bytes(bytes: &[u8]) -> Self {
        Self {
            inodes_count: read_u32_le(bytes, 0),
            blocks_count: read_u32_le(bytes, 4),
            blocks_per_group: read_u32_le(bytes, 8),
            inodes_per_group: read_u32_le(bytes, 12),
            inode_blocks: read_u32_le(bytes, 16),
            block_size: read_u32_le(bytes, 20),
            max_filename_size: read_u32_le(bytes, 24),
            max_directory_files: read_u32_le(bytes, 28),
            max_file_size: read_u64_le(bytes, 32),
        }
    }

    fn to_disk_bytes(&self, bytes: &mut [u8]) {
        write_u32_le(bytes, 0, self.inodes_count);
        write_u32_le(bytes, 4, self.blocks_count);
        write_u32_le(bytes, 8, self.blocks_per_group);
        write_u32_le(bytes, 12, self.inodes_per_group);
        write_u32_le(bytes, 16, self.inode_blocks);
        write_u32_le(bytes, 20, self.block_size);
        write_u32_le(bytes, 24, self.max_filename_size);
        write_u32_le(bytes, 28, self.max_directory_files);
        write_u64_le(bytes, 32, self.max_file_size);
    }
}

impl Superblock {
    /// 按卷参数构造超级块，越界参数按规则回退
    pub fn with_params(
        block_size: u64,
        max_filename_size: u64,
        max_directory_files: u64,
        max_file_size: u64,
    ) -> Self {
        let block_size = match u32::try_from(block_size) {
            Ok(bs) if ACCEPTED_BLOCK_SIZES.contains(&bs) => bs,
            _ => {
                warn!("block size {block_size} not accepted, using {DEFAULT_BLOCK_SIZE}");
                DEFAULT_BLOCK_SIZE
            }
        };

        let max_filename_size = if max_filename_size < MIN_FILENAME_SIZE as u64 {
            warn!("max filename size {max_filename_size} too small, using {DEFAULT_FILENAME_SIZE}");
            DEFAULT_FILENAME_SIZE
        } else {
            max_filename_size.min(MAX_NAME_LEN as u64) as u32
        };

        let max_file_size = if max_file_size < DIRECT_BLOCKS as u64 * block_size as u64 {
            warn!("max file size {max_file_size} too small, using {DEFAULT_MAX_FILE_SIZE}");
            DEFAULT_MAX_FILE_SIZE
        } else {
            max_file_size
        };

        let max_directory_files = match u32::try_from(max_directory_files) {
            Ok(n) if n >= MIN_DIRECTORY_FILES => n,
            _ => UNLIMITED_DIRECTORY_FILES,
        };

        let per_group = block_size * 8;
        let inode_blocks = per_group.div_ceil(block_size / INODE_SIZE as u32);

        Self {
            inodes_count: per_group,
            blocks_count: FIRST_DESC_BLOCK + 3 + inode_blocks + per_group,
            blocks_per_group: per_group,
            inodes_per_group: per_group,
            inode_blocks,
            block_size,
            max_filename_size,
            max_directory_files,
            max_file_size,
        }
    }

    /// 校验从磁盘读出的超级块
    pub fn validate(&self) -> MfsResult<()> {
        if !ACCEPTED_BLOCK_SIZES.contains(&self.block_size) {
            return Err(MfsError::Corrupted(format!(
                "unsupported block size {}",
                self.block_size
            )));
        }
        let per_group = self.block_size * 8;
        if self.blocks_per_group != per_group || self.inodes_per_group != per_group {
            return Err(MfsError::Corrupted("group geometry mismatch".into()));
        }
        if self.inode_blocks != per_group.div_ceil(self.inodes_per_block()) {
            return Err(MfsError::Corrupted("inode table size mismatch".into()));
        }
        if self.max_filename_size == 0 || self.max_filename_size > MAX_NAME_LEN {
            return Err(MfsError::Corrupted(format!(
                "max filename size {} out of range",
                self.max_filename_size
            )));
        }
        Ok(())
    }

    /// 每块 inode 数
    pub fn inodes_per_block(&self) -> u32 {
        self.block_size / INODE_SIZE as u32
    }

    /// 每个描述符块可容纳的描述符数
    pub fn descriptors_per_block(&self) -> u32 {
        (self.block_size - GROUP_LINKER_SIZE as u32) / GROUP_DESC_SIZE as u32
    }

    /// 每个间接块可容纳的块指针数
    pub fn pointers_per_block(&self) -> u32 {
        self.block_size / 4
    }

    /// 不使用三级间接块时单个文件最多能占的数据块数
    pub fn max_addressable_blocks(&self) -> u64 {
        let p = self.pointers_per_block() as u64;
        DIRECT_BLOCKS as u64 + p + p * p
    }

    /// 实际生效的文件名长度上限
    pub fn name_limit(&self) -> usize {
        self.max_filename_size.min(MAX_NAME_LEN) as usize
    }
}

/// 读取超级块
pub fn read_superblock<B: BlockDevice>(dev: &mut BlockDev<B>) -> MfsResult<Superblock> {
    dev.read_block(BlockAddr(SUPERBLOCK_BLOCK))?;
    let sb = Superblock::from_disk_bytes(dev.buffer());
    sb.validate()?;
    Ok(sb)
}

/// 写入超级块，块内其余字节清零
pub fn write_superblock<B: BlockDevice>(dev: &mut BlockDev<B>, sb: &Superblock) -> MfsResult<()> {
    dev.clear_buffer();
    sb.to_disk_bytes(dev.buffer_mut());
    dev.write_block(BlockAddr(SUPERBLOCK_BLOCK))?;
    Ok(())
}
