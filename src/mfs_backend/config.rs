/// MFS 文件系统配置
// ============================================================================
// 块相关配置
// ============================================================================
/// 默认块大小（字节）
pub const DEFAULT_BLOCK_SIZE: u32 = 1024;

/// 允许的块大小，其余取值一律回退到默认值
pub const ACCEPTED_BLOCK_SIZES: [u32; 5] = [512, 1024, 2048, 4096, 8192];

// ============================================================================
// 卷参数默认值
// ============================================================================

/// 默认最大文件名长度
pub const DEFAULT_FILENAME_SIZE: u32 = 255;

/// 文件名长度下限，低于该值回退到默认值
pub const MIN_FILENAME_SIZE: u32 = 10;

/// 目录项头里 name_len 只有一个字节
pub const MAX_NAME_LEN: u32 = 255;

/// 默认最大文件大小：16 GiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 17_179_869_184;

/// 默认单目录最大目录项数
pub const DEFAULT_MAX_DIRECTORY_FILES: u32 = 45;

/// 目录项上限下限，低于该值视为不限制
pub const MIN_DIRECTORY_FILES: u32 = 10;

/// "不限制目录项数" 的取值
pub const UNLIMITED_DIRECTORY_FILES: u32 = u32::MAX;

// ============================================================================
// 磁盘记录大小
// ============================================================================

/// 超级块大小（字节），位于 block 0 起始处
pub const SUPERBLOCK_SIZE: usize = 40;

/// 描述符块头部 (GroupLinker) 大小
pub const GROUP_LINKER_SIZE: usize = 12;

/// 块组描述符大小
pub const GROUP_DESC_SIZE: usize = 20;

/// Inode 大小
pub const INODE_SIZE: usize = 88;

/// 目录项固定头大小
pub const DIR_ENTRY_HEADER_SIZE: usize = 8;

/// 目录块开头的游标（下一个空闲偏移）
pub const DIR_CURSOR_SIZE: usize = 4;

// ============================================================================
// 文件系统布局
// ============================================================================

/// 超级块所在块
pub const SUPERBLOCK_BLOCK: u32 = 0;

/// 第一个描述符块
pub const FIRST_DESC_BLOCK: u32 = 1;

/// 根目录 inode 号
pub const ROOT_INODE: u32 = 1;

/// inode 里的数据块指针个数
pub const DATABLOCK_NUM: usize = 15;

/// 直接块个数
pub const DIRECT_BLOCKS: usize = 12;

/// 一级间接块指针槽
pub const SINGLE_INDIRECT_SLOT: usize = 12;

/// 二级间接块指针槽
pub const DOUBLE_INDIRECT_SLOT: usize = 13;

/// 卷文件扩展名
pub const VOLUME_EXTENSION: &str = ".mfs";
