//! 错误类型
//!
//! 块设备层使用 [`BlockDevError`]，文件系统层使用 [`MfsError`]，
//! 命令层需要整数结果时通过 [`MfsError::to_errno`] 转换。

use crate::mfs_backend::disknode::FileType;
use crate::mfs_backend::errno::*;

/// 块设备错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDevError {
    /// 读取错误
    ReadError,

    /// 写入错误
    WriteError,

    /// 块号超出范围
    BlockOutOfRange { block_id: u32, max_blocks: u64 },

    /// 缓冲区太小
    BufferTooSmall { provided: usize, required: usize },

    /// I/O错误
    IoError,

    /// 不支持的操作
    Unsupported,

    /// 设备只读
    ReadOnly,

    /// 空间不足
    NoSpace,

    /// 设备损坏或数据损坏
    Corrupted,
}

impl core::fmt::Display for BlockDevError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BlockDevError::ReadError => write!(f, "failed to read from block device"),
            BlockDevError::WriteError => write!(f, "failed to write to block device"),
            BlockDevError::BlockOutOfRange {
                block_id,
                max_blocks,
            } => {
                write!(f, "block id {block_id} out of range (max {max_blocks})")
            }
            BlockDevError::BufferTooSmall { provided, required } => {
                write!(
                    f,
                    "buffer too small: provided {provided} bytes, required {required} bytes"
                )
            }
            BlockDevError::IoError => write!(f, "I/O error"),
            BlockDevError::Unsupported => write!(f, "unsupported operation"),
            BlockDevError::ReadOnly => write!(f, "device is read-only"),
            BlockDevError::NoSpace => write!(f, "no space left on device"),
            BlockDevError::Corrupted => write!(f, "device or data is corrupted"),
        }
    }
}

impl std::error::Error for BlockDevError {}

/// 块设备操作结果类型
pub type BlockDevResult<T> = Result<T, BlockDevError>;

/// 文件系统错误
#[derive(Debug)]
pub enum MfsError {
    /// 参数不合法
    InvalidArgument(String),

    /// 路径格式不合法
    InvalidPath(String),

    /// 卷文件名不合法（必须是 `<名字>.mfs`）
    InvalidFilename(String),

    /// 整数字面量解析失败
    InvalidLiteral(String),

    /// 路径或目录项不存在
    NotFound(String),

    /// 名字存在但类型不符
    TypeMismatch { name: String, expected: FileType },

    /// 目标已存在
    AlreadyExists(String),

    /// 路径中间段不是目录
    NotDirectory(String),

    /// 超过卷的最大文件大小
    FileTooLarge { size: u64, max: u64 },

    /// 需要三级间接块
    TripleIndirectUnsupported { blocks: u64 },

    /// 空间耗尽（inode 号、目录块指针等）
    NoSpace(String),

    /// 目录项数达到上限
    DirectoryFull { limit: u32 },

    /// 磁盘结构不一致
    Corrupted(String),

    /// 块设备错误
    Device(BlockDevError),

    /// 宿主机 I/O 错误
    Io(std::io::Error),
}

impl MfsError {
    /// 转换为 errno
    pub fn to_errno(&self) -> i32 {
        match self {
            MfsError::InvalidArgument(_)
            | MfsError::InvalidPath(_)
            | MfsError::InvalidFilename(_)
            | MfsError::InvalidLiteral(_) => EINVAL,
            MfsError::NotFound(_) => ENOENT,
            MfsError::TypeMismatch {
                expected: FileType::Directory,
                ..
            } => ENOTDIR,
            MfsError::TypeMismatch {
                expected: FileType::Regular,
                ..
            } => EISDIR,
            MfsError::AlreadyExists(_) => EEXIST,
            MfsError::NotDirectory(_) => ENOTDIR,
            MfsError::FileTooLarge { .. } => EFBIG,
            MfsError::TripleIndirectUnsupported { .. } => ENOTSUP,
            MfsError::NoSpace(_) => ENOSPC,
            MfsError::DirectoryFull { .. } => EMLINK,
            MfsError::Corrupted(_) => EUCLEAN,
            MfsError::Device(BlockDevError::ReadOnly) => EROFS,
            MfsError::Device(BlockDevError::NoSpace) => ENOSPC,
            MfsError::Device(BlockDevError::Unsupported) => ENOTSUP,
            MfsError::Device(_) | MfsError::Io(_) => EIO,
        }
    }
}

impl core::fmt::Display for MfsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MfsError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            MfsError::InvalidPath(path) => write!(f, "invalid path: {path}"),
            MfsError::InvalidFilename(name) => {
                write!(f, "invalid volume filename `{name}` (expected <name>.mfs)")
            }
            MfsError::InvalidLiteral(lit) => write!(f, "not a valid integer literal: {lit}"),
            MfsError::NotFound(name) => write!(f, "{name}: no such file or directory"),
            MfsError::TypeMismatch { name, expected } => {
                write!(f, "{name}: expected a {expected}")
            }
            MfsError::AlreadyExists(name) => write!(f, "{name}: already exists"),
            MfsError::NotDirectory(name) => write!(f, "{name}: not a directory"),
            MfsError::FileTooLarge { size, max } => {
                write!(f, "file size {size} exceeds volume limit {max}")
            }
            MfsError::TripleIndirectUnsupported { blocks } => write!(
                f,
                "{blocks} data blocks would need triple-indirect addressing, which is not supported"
            ),
            MfsError::NoSpace(what) => write!(f, "no space left: {what}"),
            MfsError::DirectoryFull { limit } => {
                write!(f, "directory already holds the maximum of {limit} entries")
            }
            MfsError::Corrupted(what) => write!(f, "volume is corrupted: {what}"),
            MfsError::Device(e) => write!(f, "{e}"),
            MfsError::Io(e) => write!(f, "host I/O error: {e}"),
        }
    }
}

impl std::error::Error for MfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MfsError::Device(e) => Some(e),
            MfsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BlockDevError> for MfsError {
    fn from(e: BlockDevError) -> Self {
        MfsError::Device(e)
    }
}

impl From<std::io::Error> for MfsError {
    fn from(e: std::io::Error) -> Self {
        MfsError::Io(e)
    }
}

/// 文件系统操作结果类型
pub type MfsResult<T> = Result<T, MfsError>;
