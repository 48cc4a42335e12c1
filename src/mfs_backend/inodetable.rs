//! inode 表：按 inode 号定位、读取、写回

use log::debug;

use crate::mfs_backend::bitmap::set_bit;
use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::blockgroup_description::*;
use crate::mfs_backend::bmalloc::{AllocKind, allocate};
use crate::mfs_backend::config::*;
use crate::mfs_backend::disknode::{GroupDescriptor, Inode};
use crate::mfs_backend::endian::DiskFormat;
use crate::mfs_backend::error::*;
use crate::mfs_backend::superblock::Superblock;

/// inode 在磁盘上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeLocation {
    pub cursor: GroupCursor,   // 所在块组
    pub slot: u32,             // 组内下标
    pub table_block: BlockAddr,
    pub offset: usize,         // 块内字节偏移
}

/// 写 inode 的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// 新建：同时占用 inode 位图并扣减空闲 inode 数
    Create,
    /// 原地更新
    Update,
}

fn slot_position(sb: &Superblock, desc: &GroupDescriptor, slot: u32) -> (BlockAddr, usize) {
    let per_block = sb.inodes_per_block();
    (
        BlockAddr(desc.inode_table + slot / per_block),
        (slot % per_block) as usize * INODE_SIZE,
    )
}

/// 按 inode 号定位
pub fn locate<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    id: u32,
) -> MfsResult<InodeLocation> {
    if id == 0 {
        return Err(MfsError::InvalidArgument("inode 0 does not exist".into()));
    }
    let group = (id - 1) / sb.inodes_per_group;
    let slot = (id - 1) % sb.inodes_per_group;

    let cursor = cursor_for_group(dev, sb, group)?;
    let linker = read_linker(dev, cursor.desc_block)?;
    if cursor.desc_index >= linker.no_descriptors {
        return Err(MfsError::NotFound(format!("inode {id}")));
    }
    let desc = read_descriptor(dev, cursor)?;
    let (table_block, offset) = slot_position(sb, &desc, slot);
    Ok(InodeLocation {
        cursor,
        slot,
        table_block,
        offset,
    })
}

/// 读取 inode，槽位里记录的号码对不上视为不存在
pub fn read_inode<B: BlockDevice>(dev: &mut BlockDev<B>, sb: &Superblock, id: u32) -> MfsResult<Inode> {
    let loc = locate(dev, sb, id)?;
    dev.read_block(loc.table_block)?;
    let inode = Inode::from_disk_bytes(&dev.buffer()[loc.offset..loc.offset + INODE_SIZE]);
    if inode.id() != id {
        return Err(MfsError::NotFound(format!("inode {id}")));
    }
    Ok(inode)
}

/// 把 inode 写到游标所指块组的第 `slot` 个槽
pub fn write_inode<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    inode: &Inode,
    cursor: GroupCursor,
    slot: u32,
    mode: WriteMode,
) -> MfsResult<()> {
    let mut desc = read_descriptor(dev, cursor)?;
    let (table_block, offset) = slot_position(sb, &desc, slot);

    dev.read_block(table_block)?;
    inode.to_disk_bytes(&mut dev.buffer_mut()[offset..offset + INODE_SIZE]);
    dev.write_block(table_block)?;

    if mode == WriteMode::Create {
        if desc.free_inodes == 0 {
            return Err(MfsError::Corrupted(format!(
                "no free inodes left in group at desc block {} index {}",
                cursor.desc_block, cursor.desc_index
            )));
        }
        dev.read_block(BlockAddr(desc.inode_bitmap))?;
        set_bit(dev.buffer_mut(), slot);
        dev.write_block(BlockAddr(desc.inode_bitmap))?;

        desc.free_inodes -= 1;
        write_descriptor(dev, cursor, &desc)?;
        debug!("inode {} created in slot {}", inode.id(), slot);
    }
    Ok(())
}

/// 原地写回已有 inode
pub fn update_inode<B: BlockDevice>(dev: &mut BlockDev<B>, sb: &Superblock, inode: &Inode) -> MfsResult<()> {
    let loc = locate(dev, sb, inode.id())?;
    write_inode(dev, sb, inode, loc.cursor, loc.slot, WriteMode::Update)
}

/// 为新 inode 找一个空闲槽，返回 (游标, 槽位, inode 号)
///
/// 每次都从第一个块组开始找。
pub fn allocate_inode<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
) -> MfsResult<(GroupCursor, u32, u16)> {
    let mut cursor = GroupCursor::start();
    let slot = allocate(dev, sb, &mut cursor, AllocKind::Inode)?;
    let group = group_index(dev, sb, cursor)?;
    let id = group as u64 * sb.inodes_per_group as u64 + slot as u64 + 1;
    let id = u16::try_from(id)
        .map_err(|_| MfsError::NoSpace(format!("inode id {id} does not fit in 16 bits")))?;
    Ok((cursor, slot, id))
}
