//! 目录列表

use bitflags::bitflags;

use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::dir::read_entries;
use crate::mfs_backend::disknode::Inode;
use crate::mfs_backend::error::*;
use crate::mfs_backend::inodetable::read_inode;
use crate::mfs_backend::superblock::Superblock;

bitflags! {
    /// ls 选项
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ListFlags: u8 {
        /// 显示以 '.' 开头的名字（-a）
        const ALL = 1 << 0;
        /// 显示非目录项（-d 的反面）
        const INCLUDE_FILES = 1 << 1;
        /// 按名字排序（-U），默认按创建时间
        const BY_NAME = 1 << 2;
        /// 长格式（-l）
        const LONG = 1 << 3;
        /// 递归列出子目录（-r）
        const RECURSIVE = 1 << 4;
    }
}

/// 列表里的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub inode: Inode,
}

/// 有序目录列表，记住生成它的选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    entries: Vec<ListEntry>,
    flags: ListFlags,
}

impl DirListing {
    pub fn new(flags: ListFlags) -> Self {
        Self {
            entries: Vec::new(),
            flags,
        }
    }

    /// 按选定顺序插入；与已有项相等时排在它们后面
    pub fn insert(&mut self, entry: ListEntry) {
        let at = if self.flags.contains(ListFlags::BY_NAME) {
            self.entries.partition_point(|e| e.name <= entry.name)
        } else {
            self.entries
                .partition_point(|e| e.inode.creation_time <= entry.inode.creation_time)
        };
        self.entries.insert(at, entry);
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 每项一行；带 `LONG` 时为 `名字 ct: 创建 at: 访问 mt: 修改 大小`
    pub fn render(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            if self.flags.contains(ListFlags::LONG) {
                out.push_str(&format!(
                    "{} ct: {} at: {} mt: {} {}\n",
                    e.name,
                    e.inode.creation_time,
                    e.inode.access_time,
                    e.inode.modification_time,
                    e.inode.file_size
                ));
            } else {
                out.push_str(&e.name);
                out.push('\n');
            }
        }
        out
    }
}

impl core::fmt::Display for DirListing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.render())
    }
}

/// 列出一个目录
///
/// 带 `RECURSIVE` 时按 [`list_recursive`] 的顺序把各层拼成一个列表，
/// 子目录里的项以相对路径命名（`a/b`）。
pub fn list<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    dir: &Inode,
    flags: ListFlags,
) -> MfsResult<DirListing> {
    if !flags.contains(ListFlags::RECURSIVE) {
        return list_one(dev, sb, dir, flags);
    }
    let mut flat = DirListing::new(flags);
    for (path, section) in list_recursive(dev, sb, dir, "", flags)? {
        flat.entries.extend(section.entries.into_iter().map(|mut e| {
            e.name = join(&path, &e.name);
            e
        }));
    }
    Ok(flat)
}

fn list_one<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    dir: &Inode,
    flags: ListFlags,
) -> MfsResult<DirListing> {
    let mut listing = DirListing::new(flags - ListFlags::RECURSIVE);
    for entry in read_entries(dev, dir)? {
        let name = entry.name_str();
        if name.starts_with('.') && !flags.contains(ListFlags::ALL) {
            continue;
        }
        let inode = read_inode(dev, sb, entry.inode)?;
        if !inode.is_dir() && !flags.contains(ListFlags::INCLUDE_FILES) {
            continue;
        }
        listing.insert(ListEntry { name, inode });
    }
    Ok(listing)
}

/// 递归列出，返回 (路径, 列表)，父目录排在子目录前，不管是否带 `RECURSIVE`
pub fn list_recursive<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    dir: &Inode,
    label: &str,
    flags: ListFlags,
) -> MfsResult<Vec<(String, DirListing)>> {
    let mut out = Vec::new();
    let mut pending = vec![(label.to_string(), *dir)];
    while let Some((path, inode)) = pending.pop() {
        let listing = list_one(dev, sb, &inode, flags)?;
        let mut children: Vec<(String, Inode)> = listing
            .entries()
            .iter()
            .filter(|e| e.inode.is_dir() && e.name != "." && e.name != "..")
            .map(|e| (join(&path, &e.name), e.inode))
            .collect();
        children.reverse();
        pending.extend(children);
        out.push((path, listing));
    }
    Ok(out)
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}
