//! 目录项的查找、插入、删除，以及建目录和移动

use log::{debug, info};

use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::blockgroup_description::GroupCursor;
use crate::mfs_backend::bmalloc::store_block;
use crate::mfs_backend::config::*;
use crate::mfs_backend::disknode::{FileType, Inode};
use crate::mfs_backend::entries::*;
use crate::mfs_backend::error::*;
use crate::mfs_backend::inodetable::*;
use crate::mfs_backend::path::resolve;
use crate::mfs_backend::superblock::Superblock;
use crate::mfs_backend::tool::{final_name, now_secs, split_parent, truncate_name};

fn require_dir(dir: &Inode) -> MfsResult<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(MfsError::NotDirectory(format!("inode {}", dir.id())))
    }
}

/// 目录的全部有效记录，按磁盘顺序
pub fn read_entries<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    dir: &Inode,
) -> MfsResult<Vec<DirEntry>> {
    require_dir(dir)?;
    let mut out = Vec::new();
    for block in dir.dir_blocks() {
        dev.read_block(block)?;
        out.extend(
            DirEntryIter::new(dev.buffer())
                .map(|(_, e)| e)
                .filter(DirEntry::is_live),
        );
    }
    Ok(out)
}

/// 按名字查找第一条有效记录，不关心类型
pub fn lookup_entry<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    dir: &Inode,
    name: &str,
) -> MfsResult<Option<DirEntry>> {
    require_dir(dir)?;
    for block in dir.dir_blocks() {
        dev.read_block(block)?;
        let hit = DirEntryIter::new(dev.buffer())
            .map(|(_, e)| e)
            .find(|e| e.is_live() && e.name == name.as_bytes());
        if hit.is_some() {
            return Ok(hit);
        }
    }
    Ok(None)
}

/// 查找指定类型的目录项，返回 inode 号
///
/// 名字匹配但类型不符时立即失败，不继续往后找。
pub fn find_entry<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    dir: &Inode,
    name: &str,
    expected: FileType,
) -> MfsResult<u32> {
    match lookup_entry(dev, dir, name)? {
        Some(entry) if entry.kind() == Some(expected) => Ok(entry.inode),
        Some(_) => Err(MfsError::TypeMismatch {
            name: name.to_string(),
            expected,
        }),
        None => Err(MfsError::NotFound(name.to_string())),
    }
}

/// 检查 `name` 能否插进目录：不能重名，且不能超过目录项上限
///
/// `replaces` 为真时新记录会顶替同一目录里的一条旧记录，有效项数不变，
/// 不检查上限。
pub fn check_insertable<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    dir: &Inode,
    name: &str,
    replaces: bool,
) -> MfsResult<()> {
    let entries = read_entries(dev, dir)?;
    if entries.iter().any(|e| e.name == name.as_bytes()) {
        return Err(MfsError::AlreadyExists(name.to_string()));
    }
    if !replaces && sb.max_directory_files != UNLIMITED_DIRECTORY_FILES {
        let used = entries
            .iter()
            .filter(|e| e.name != b"." && e.name != b"..")
            .count();
        if used >= sb.max_directory_files as usize {
            return Err(MfsError::DirectoryFull {
                limit: sb.max_directory_files,
            });
        }
    }
    Ok(())
}

/// 在目录 `dir_id` 里插入指向 `child` 的记录，名字取 `path` 的最后一段
///
/// 依次尝试每个已用目录块：先在游标处追加，放不下再复用墓碑；
/// 都不行就分配一个新目录块挂到第一个空指针槽上，并写回目录 inode。
/// `replaces` 见 [`check_insertable`]。
pub fn insert_entry<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    dir_id: u32,
    child: u32,
    kind: FileType,
    path: &str,
    replaces: bool,
) -> MfsResult<()> {
    let mut dir = read_inode(dev, sb, dir_id)?;
    let (_, last) = split_parent(path);
    if last.is_empty() {
        return Err(MfsError::InvalidPath(format!("{path}: no filename given")));
    }
    let name = truncate_name(&last, sb.name_limit());
    check_insertable(dev, sb, &dir, name, replaces)?;

    let entry = DirEntry::new(child, kind, name.as_bytes());
    for block in dir.dir_blocks() {
        dev.read_block(block)?;
        if append_entry(dev.buffer_mut(), &entry) || reuse_tombstone(dev.buffer_mut(), &entry) {
            dev.write_block(block)?;
            debug!("entry {name} -> inode {child} placed in dir {dir_id} block {block}");
            return Ok(());
        }
    }

    let slot = dir
        .datablocks
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| MfsError::NoSpace(format!("directory inode {dir_id} has no free block pointer")))?;

    let mut data = vec![0u8; sb.block_size as usize];
    data[..DIR_CURSOR_SIZE].copy_from_slice(&(DIR_CURSOR_SIZE as u32).to_le_bytes());
    append_entry(&mut data, &entry);
    let mut cursor = GroupCursor::start();
    let addr = store_block(dev, sb, &mut cursor, &data)?;

    dir.datablocks[slot] = addr.get();
    dir.file_size += sb.block_size as u64;
    dir.modification_time = now_secs();
    update_inode(dev, sb, &dir)?;
    debug!("dir {dir_id} grew block {addr} in slot {slot} for entry {name}");
    Ok(())
}

fn clear_where<B, F>(dev: &mut BlockDev<B>, sb: &Superblock, dir_id: u32, mut pred: F) -> MfsResult<bool>
where
    B: BlockDevice,
    F: FnMut(&DirEntry) -> bool,
{
    let dir = read_inode(dev, sb, dir_id)?;
    require_dir(&dir)?;
    for block in dir.dir_blocks() {
        dev.read_block(block)?;
        if tombstone_first(dev.buffer_mut(), &mut pred) {
            dev.write_block(block)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// 把目录里第一条指向 `target` 的有效记录置为墓碑
pub fn clear_entry<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    dir_id: u32,
    target: u32,
) -> MfsResult<()> {
    if clear_where(dev, sb, dir_id, |e| e.inode == target)? {
        Ok(())
    } else {
        Err(MfsError::NotFound(format!("entry for inode {target} in dir {dir_id}")))
    }
}

/// 同 [`clear_entry`]，但名字也必须一致
pub fn clear_named_entry<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    dir_id: u32,
    target: u32,
    name: &str,
) -> MfsResult<()> {
    if clear_where(dev, sb, dir_id, |e| e.inode == target && e.name == name.as_bytes())? {
        Ok(())
    } else {
        Err(MfsError::NotFound(name.to_string()))
    }
}

/// 在 `parent_id` 下新建目录 `name`，返回新目录的 inode 号
pub fn make_directory<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    parent_id: u32,
    name: &str,
) -> MfsResult<u32> {
    let parent = read_inode(dev, sb, parent_id)?;
    let name = truncate_name(name, sb.name_limit());
    check_insertable(dev, sb, &parent, name, false)?;

    let (cursor, slot, id) = allocate_inode(dev, sb)?;
    let mut block = vec![0u8; sb.block_size as usize];
    init_dir_block(&mut block, id as u32, parent_id);
    let mut data_cursor = GroupCursor::start();
    let addr = store_block(dev, sb, &mut data_cursor, &block)?;

    let mut inode = Inode::new(id, FileType::Directory, sb.block_size as u64, now_secs());
    inode.datablocks[0] = addr.get();
    write_inode(dev, sb, &inode, cursor, slot, WriteMode::Create)?;
    insert_entry(dev, sb, parent_id, id as u32, FileType::Directory, name, false)?;
    info!("mkdir {name} -> inode {id} under {parent_id}");
    Ok(id as u32)
}

/// `dir` 是否就是 `ancestor` 或在它下面
fn is_within<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    dir: &Inode,
    ancestor: u32,
) -> MfsResult<bool> {
    let mut cur = *dir;
    for _ in 0..=u16::MAX {
        if cur.id() == ancestor {
            return Ok(true);
        }
        if cur.id() == ROOT_INODE {
            return Ok(false);
        }
        let up = find_entry(dev, &cur, "..", FileType::Directory)?;
        cur = read_inode(dev, sb, up)?;
    }
    Err(MfsError::Corrupted("\"..\" chain never reaches the root".into()))
}

/// 移动/重命名：目标是已有目录时保留原名放进去，否则按目标路径改名
///
/// 先插入新记录再删除旧记录；插入失败时源记录保持不变。
pub fn move_entry<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    source: &str,
    destination: &str,
    start: &Inode,
) -> MfsResult<()> {
    let src_name = final_name(source)?;
    let (src_parent_path, _) = split_parent(source);
    let src_parent = resolve(dev, sb, &src_parent_path, start, FileType::Directory)?;
    let src = lookup_entry(dev, &src_parent, &src_name)?
        .ok_or_else(|| MfsError::NotFound(source.to_string()))?;
    let kind = src
        .kind()
        .ok_or_else(|| MfsError::Corrupted(format!("{source}: unknown entry type")))?;

    let (target, new_name) = match resolve(dev, sb, destination, start, FileType::Directory) {
        Ok(dir) => (dir, src_name.clone()),
        Err(MfsError::NotFound(_)) | Err(MfsError::TypeMismatch { .. }) => {
            let new_name = final_name(destination)?;
            let (dst_parent_path, _) = split_parent(destination);
            let dir = resolve(dev, sb, &dst_parent_path, start, FileType::Directory)?;
            (dir, new_name)
        }
        Err(e) => return Err(e),
    };

    if target.id() == src_parent.id() && new_name == src_name {
        return Ok(());
    }
    if kind == FileType::Directory && is_within(dev, sb, &target, src.inode)? {
        return Err(MfsError::InvalidArgument(format!(
            "cannot move {source} into itself"
        )));
    }

    let same_dir = target.id() == src_parent.id();
    insert_entry(dev, sb, target.id(), src.inode, kind, &new_name, same_dir)?;
    clear_named_entry(dev, sb, src_parent.id(), src.inode, &src_name)?;

    if kind == FileType::Directory && !same_dir {
        let moved = read_inode(dev, sb, src.inode)?;
        for block in moved.dir_blocks() {
            dev.read_block(block)?;
            if retarget_first(dev.buffer_mut(), target.id(), |e| e.name == b"..") {
                dev.write_block(block)?;
                break;
            }
        }
    }
    info!("moved {source} -> {destination}");
    Ok(())
}
