//! 路径解析

use log::debug;

use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::config::ROOT_INODE;
use crate::mfs_backend::dir::{find_entry, lookup_entry};
use crate::mfs_backend::disknode::{FileType, Inode};
use crate::mfs_backend::error::*;
use crate::mfs_backend::inodetable::read_inode;
use crate::mfs_backend::superblock::Superblock;

/// 路径首字符只能是 '/'、'.' 或 ASCII 字母数字
fn check_first_char(path: &str) -> MfsResult<()> {
    match path.chars().next() {
        Some(c) if c == '/' || c == '.' || c.is_ascii_alphanumeric() => Ok(()),
        _ => Err(MfsError::InvalidPath(path.to_string())),
    }
}

/// 逐段走到最后一段之前，返回 (最后所在目录, 最后一段)
fn walk_to_last<'p, B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    path: &'p str,
    start: &Inode,
) -> MfsResult<(Inode, Option<&'p str>)> {
    check_first_char(path)?;
    let mut cur = if path.starts_with('/') {
        read_inode(dev, sb, ROOT_INODE)?
    } else {
        *start
    };

    let mut parts = path.split('/').filter(|s| !s.is_empty()).peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            return Ok((cur, Some(part)));
        }
        let next = find_entry(dev, &cur, part, FileType::Directory)?;
        cur = read_inode(dev, sb, next)?;
    }
    Ok((cur, None))
}

/// 从 `start`（或以 '/' 开头时从根）解析路径，最后一段必须是 `expected` 类型
///
/// 中间段必须都是目录。`"."` 直接返回 `start`，`"/"` 返回根目录。
pub fn resolve<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    path: &str,
    start: &Inode,
    expected: FileType,
) -> MfsResult<Inode> {
    if path == "." {
        return check_type(*start, path, expected);
    }
    let (dir, last) = walk_to_last(dev, sb, path, start)?;
    let inode = match last {
        None => dir,
        Some(name) => {
            let id = find_entry(dev, &dir, name, expected)?;
            read_inode(dev, sb, id)?
        }
    };
    debug!("resolved {path} -> inode {}", inode.id());
    check_type(inode, path, expected)
}

/// 与 [`resolve`] 相同，但最后一段的类型不限
pub fn resolve_any<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    path: &str,
    start: &Inode,
) -> MfsResult<Inode> {
    if path == "." {
        return Ok(*start);
    }
    let (dir, last) = walk_to_last(dev, sb, path, start)?;
    match last {
        None => Ok(dir),
        Some(name) => {
            let entry = lookup_entry(dev, &dir, name)?
                .ok_or_else(|| MfsError::NotFound(path.to_string()))?;
            read_inode(dev, sb, entry.inode)
        }
    }
}

fn check_type(inode: Inode, path: &str, expected: FileType) -> MfsResult<Inode> {
    if inode.file_type() == Some(expected) {
        Ok(inode)
    } else {
        Err(MfsError::TypeMismatch {
            name: path.to_string(),
            expected,
        })
    }
}
