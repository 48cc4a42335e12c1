//! 面向命令层的操作
//!
//! 所有函数都接收一个已经解析好的起始目录 inode。批量操作对每一项
//! 单独返回结果，某一项失败不影响后面的项；共享目标（导入目的目录、
//! 导出宿主目录、移动目的地）出错时整个调用直接失败。

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::config::*;
use crate::mfs_backend::dir;
use crate::mfs_backend::disknode::{FileType, Inode};
use crate::mfs_backend::endian::DiskFormat;
use crate::mfs_backend::error::*;
use crate::mfs_backend::file::{export_stream, import_stream};
use crate::mfs_backend::inodetable::{read_inode, update_inode};
use crate::mfs_backend::list::{self, DirListing, ListFlags};
use crate::mfs_backend::mfs::MfsFileSystem;
use crate::mfs_backend::mkfs::check_volume_name;
use crate::mfs_backend::path::{resolve, resolve_any};
use crate::mfs_backend::superblock::Superblock;
use crate::mfs_backend::tool::{final_name, now_secs, split_parent};
use crate::mfs_backend::volume::VolumeFile;

pub use crate::mfs_backend::mkfs::format;

/// touch 更新哪些时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchMode {
    /// 只更新访问时间（-a）
    Access,
    /// 只更新修改时间（-m）
    Modify,
    /// 两个都更新
    #[default]
    Both,
}

/// 打开已有卷，返回 (文件系统, 根目录 inode, 块设备)
pub fn open_volume<P: AsRef<Path>>(path: P) -> MfsResult<(MfsFileSystem, Inode, BlockDev<VolumeFile>)> {
    let path = path.as_ref();
    check_volume_name(path)?;
    let header = VolumeFile::read_header(path, SUPERBLOCK_SIZE).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MfsError::NotFound(path.display().to_string()),
        std::io::ErrorKind::UnexpectedEof => {
            MfsError::Corrupted(format!("{} is too short to hold a superblock", path.display()))
        }
        _ => MfsError::Io(e),
    })?;
    let sb = Superblock::from_disk_bytes(&header);
    sb.validate()?;

    let mut dev = BlockDev::new(VolumeFile::open(path, sb.block_size)?);
    let root = read_inode(&mut dev, &sb, ROOT_INODE)?;
    if !root.is_dir() {
        return Err(MfsError::Corrupted("root inode is not a directory".into()));
    }
    info!(
        "opened {} (block size {}, {} blocks)",
        path.display(),
        sb.block_size,
        dev.total_blocks()
    );
    Ok((MfsFileSystem::new(sb), root, dev))
}

/// 列出目录
pub fn list<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    fs: &MfsFileSystem,
    dir: &Inode,
    flags: ListFlags,
) -> MfsResult<DirListing> {
    list::list(dev, &fs.superblock, dir, flags)
}

/// 递归列出目录
pub fn list_recursive<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    fs: &MfsFileSystem,
    dir: &Inode,
    label: &str,
    flags: ListFlags,
) -> MfsResult<Vec<(String, DirListing)>> {
    list::list_recursive(dev, &fs.superblock, dir, label, flags)
}

/// 解析到一个目录（cd）
pub fn resolve_path<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    fs: &MfsFileSystem,
    path: &str,
    start: &Inode,
) -> MfsResult<Inode> {
    resolve(dev, &fs.superblock, path, start, FileType::Directory)
}

/// 批量建目录，每项返回新目录的 inode 号
pub fn make_directory<B: BlockDevice, S: AsRef<str>>(
    dev: &mut BlockDev<B>,
    fs: &MfsFileSystem,
    paths: &[S],
    start: &Inode,
) -> Vec<MfsResult<u32>> {
    let sb = &fs.superblock;
    paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            let result = final_name(p).and_then(|name| {
                let (parent_path, _) = split_parent(p);
                let parent = resolve(dev, sb, &parent_path, start, FileType::Directory)?;
                dir::make_directory(dev, sb, parent.id(), &name)
            });
            if let Err(e) = &result {
                warn!("mkdir {p}: {e}");
            }
            result
        })
        .collect()
}

/// 批量更新时间戳，文件和目录都可以
pub fn touch<B: BlockDevice, S: AsRef<str>>(
    dev: &mut BlockDev<B>,
    fs: &MfsFileSystem,
    paths: &[S],
    start: &Inode,
    mode: TouchMode,
) -> Vec<MfsResult<()>> {
    let sb = &fs.superblock;
    paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            let result = resolve_any(dev, sb, p, start).and_then(|mut inode| {
                let now = now_secs();
                if mode != TouchMode::Modify {
                    inode.access_time = now;
                }
                if mode != TouchMode::Access {
                    inode.modification_time = now;
                }
                update_inode(dev, sb, &inode)
            });
            if let Err(e) = &result {
                warn!("touch {p}: {e}");
            }
            result
        })
        .collect()
}

fn import_one<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    host_path: &Path,
    dest: &Inode,
) -> MfsResult<u32> {
    let name = host_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MfsError::InvalidArgument(format!("{}: no usable file name", host_path.display())))?;
    let file = File::open(host_path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MfsError::NotFound(host_path.display().to_string()),
        _ => MfsError::Io(e),
    })?;
    let meta = file.metadata()?;
    if !meta.is_file() {
        return Err(MfsError::InvalidArgument(format!(
            "{}: not a regular file",
            host_path.display()
        )));
    }
    let mut reader = BufReader::new(file);
    import_stream(dev, sb, &mut reader, meta.len(), dest.id(), name)
}

/// 把宿主机文件导入卷内目录 `dest_path`，每项返回新文件的 inode 号
pub fn import<B: BlockDevice, P: AsRef<Path>>(
    dev: &mut BlockDev<B>,
    fs: &MfsFileSystem,
    host_paths: &[P],
    dest_path: &str,
    start: &Inode,
) -> MfsResult<Vec<MfsResult<u32>>> {
    let sb = &fs.superblock;
    let dest = resolve(dev, sb, dest_path, start, FileType::Directory)?;
    Ok(host_paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            let result = import_one(dev, sb, p, &dest);
            if let Err(e) = &result {
                warn!("import {}: {e}", p.display());
            }
            result
        })
        .collect())
}

fn export_one<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    volume_path: &str,
    host_dir: &Path,
    start: &Inode,
) -> MfsResult<PathBuf> {
    let inode = resolve(dev, sb, volume_path, start, FileType::Regular)?;
    let name = final_name(volume_path)?;
    let out_path = host_dir.join(&name);
    let file = File::options()
        .write(true)
        .create_new(true)
        .open(&out_path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => MfsError::AlreadyExists(out_path.display().to_string()),
            _ => MfsError::Io(e),
        })?;

    let mut writer = BufWriter::new(file);
    let written = export_stream(dev, sb, &inode, &mut writer);
    drop(writer);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&out_path);
        return Err(e);
    }
    Ok(out_path)
}

/// 把卷内文件导出到宿主机目录，每项返回生成的宿主机路径
pub fn export<B: BlockDevice, S: AsRef<str>, P: AsRef<Path>>(
    dev: &mut BlockDev<B>,
    fs: &MfsFileSystem,
    volume_paths: &[S],
    host_dir: P,
    start: &Inode,
) -> MfsResult<Vec<MfsResult<PathBuf>>> {
    let host_dir = host_dir.as_ref();
    let meta = std::fs::metadata(host_dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MfsError::NotFound(host_dir.display().to_string()),
        _ => MfsError::Io(e),
    })?;
    if !meta.is_dir() {
        return Err(MfsError::NotDirectory(host_dir.display().to_string()));
    }

    let sb = &fs.superblock;
    Ok(volume_paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            let result = export_one(dev, sb, p, host_dir, start);
            if let Err(e) = &result {
                warn!("export {p}: {e}");
            }
            result
        })
        .collect())
}

/// 批量移动/重命名
///
/// 多个源时目的地必须是已有目录。交互模式下每项先调用
/// `confirm(源, 目的地)`，返回 false 则跳过该项，结果为 `Ok(false)`。
pub fn move_entries<B, S, F>(
    dev: &mut BlockDev<B>,
    fs: &MfsFileSystem,
    sources: &[S],
    destination: &str,
    start: &Inode,
    interactive: bool,
    mut confirm: F,
) -> MfsResult<Vec<MfsResult<bool>>>
where
    B: BlockDevice,
    S: AsRef<str>,
    F: FnMut(&str, &str) -> bool,
{
    let sb = &fs.superblock;
    if sources.len() > 1 {
        resolve(dev, sb, destination, start, FileType::Directory)?;
    }
    Ok(sources
        .iter()
        .map(|s| {
            let s = s.as_ref();
            if interactive && !confirm(s, destination) {
                info!("mv {s}: skipped");
                return Ok(false);
            }
            let result = dir::move_entry(dev, sb, s, destination, start).map(|_| true);
            if let Err(e) = &result {
                warn!("mv {s} {destination}: {e}");
            }
            result
        })
        .collect())
}
