//! # mfs
//!
//! 一个用 Rust 实现的镜像文件系统库：整个卷就是宿主机上的一个 `.mfs` 文件，
//! 内部由超级块、链式块组描述符块、位图、inode 表和数据块组成。
//!
//! ## 功能特点
//!
//! - 卷的格式化与打开
//! - 按需追加块组的空间分配
//! - 路径解析、目录项插入/删除（墓碑复用）
//! - 宿主文件导入/导出（直接块 + 一级/二级间接块）
//! - 移动/重命名、目录列表
//!
//! ## 基本使用
//!
//! ```no_run
//! use mfs::*;
//!
//! format("disk.mfs", &FormatOptions::default())?;
//! let mut session = Session::open("disk.mfs")?;
//! session.make_directory(&["docs"]);
//! let listing = session.list(ListFlags::ALL | ListFlags::INCLUDE_FILES)?;
//! print!("{listing}");
//! # Ok::<(), mfs::MfsError>(())
//! ```

pub mod mfs_backend;
pub use mfs_backend::api::*;
pub use mfs_backend::blockdev::*;
pub use mfs_backend::config::*;
pub use mfs_backend::error::*;
pub use mfs_backend::list::{DirListing, ListEntry, ListFlags};
pub use mfs_backend::mfs::*;
pub use mfs_backend::mkfs::FormatOptions;
pub use mfs_backend::volume::VolumeFile;
