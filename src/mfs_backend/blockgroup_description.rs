//! 块组描述符块
//!
//! 描述符块 = 12 字节 [`GroupLinker`] + 紧跟其后的若干 20 字节描述符，
//! 通过 `next_block` 串成单链表，第一块固定在 block 1。

use log::debug;

use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::config::*;
use crate::mfs_backend::disknode::{GroupDescriptor, GroupLinker};
use crate::mfs_backend::endian::DiskFormat;
use crate::mfs_backend::error::*;
use crate::mfs_backend::superblock::Superblock;

/// 分配游标：(描述符块号, 块内描述符下标)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCursor {
    pub desc_block: BlockAddr,
    pub desc_index: u32,
}

impl GroupCursor {
    /// 指向第一个描述符块的第一个描述符
    pub const fn start() -> Self {
        Self {
            desc_block: BlockAddr(FIRST_DESC_BLOCK),
            desc_index: 0,
        }
    }
}

impl Default for GroupCursor {
    fn default() -> Self {
        Self::start()
    }
}

#[inline]
fn desc_offset(index: u32) -> usize {
    GROUP_LINKER_SIZE + index as usize * GROUP_DESC_SIZE
}

/// 读取描述符块头
pub fn read_linker<B: BlockDevice>(dev: &mut BlockDev<B>, block: BlockAddr) -> MfsResult<GroupLinker> {
    dev.read_block(block)?;
    Ok(GroupLinker::from_disk_bytes(dev.buffer()))
}

/// 改写描述符块头，块内描述符保持不变
pub fn write_linker<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    block: BlockAddr,
    linker: &GroupLinker,
) -> MfsResult<()> {
    dev.read_block(block)?;
    linker.to_disk_bytes(&mut dev.buffer_mut()[..GROUP_LINKER_SIZE]);
    dev.write_block(block)?;
    Ok(())
}

/// 读取描述符块内第 `index` 个描述符
pub fn read_descriptor<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    cursor: GroupCursor,
) -> MfsResult<GroupDescriptor> {
    dev.read_block(cursor.desc_block)?;
    let linker = GroupLinker::from_disk_bytes(dev.buffer());
    if cursor.desc_index >= linker.no_descriptors {
        return Err(MfsError::Corrupted(format!(
            "descriptor {} not present in block {} ({} in use)",
            cursor.desc_index, cursor.desc_block, linker.no_descriptors
        )));
    }
    let off = desc_offset(cursor.desc_index);
    Ok(GroupDescriptor::from_disk_bytes(
        &dev.buffer()[off..off + GROUP_DESC_SIZE],
    ))
}

/// 写回单个描述符
pub fn write_descriptor<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    cursor: GroupCursor,
    desc: &GroupDescriptor,
) -> MfsResult<()> {
    dev.read_block(cursor.desc_block)?;
    let off = desc_offset(cursor.desc_index);
    desc.to_disk_bytes(&mut dev.buffer_mut()[off..off + GROUP_DESC_SIZE]);
    dev.write_block(cursor.desc_block)?;
    Ok(())
}

/// 写一个只含一个描述符的全新描述符块
pub fn write_fresh_desc_block<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    block: BlockAddr,
    desc: &GroupDescriptor,
) -> MfsResult<()> {
    let linker = GroupLinker {
        next_block: 0,
        no_descriptors: 1,
        max_descriptors: sb.descriptors_per_block(),
    };
    dev.clear_buffer();
    linker.to_disk_bytes(&mut dev.buffer_mut()[..GROUP_LINKER_SIZE]);
    let off = desc_offset(0);
    desc.to_disk_bytes(&mut dev.buffer_mut()[off..off + GROUP_DESC_SIZE]);
    dev.write_block(block)?;
    Ok(())
}

/// 沿描述符链找到第 `group` 个块组对应的游标
pub fn cursor_for_group<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    group: u32,
) -> MfsResult<GroupCursor> {
    let per_block = sb.descriptors_per_block();
    let mut block = BlockAddr(FIRST_DESC_BLOCK);
    for _ in 0..group / per_block {
        let linker = read_linker(dev, block)?;
        block = linker
            .next()
            .ok_or_else(|| MfsError::NotFound(format!("block group {group}")))?;
    }
    let cursor = GroupCursor {
        desc_block: block,
        desc_index: group % per_block,
    };
    debug!("group {group} -> desc block {} index {}", block, cursor.desc_index);
    Ok(cursor)
}

/// 游标对应的全局块组号
pub fn group_index<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    cursor: GroupCursor,
) -> MfsResult<u32> {
    let per_block = sb.descriptors_per_block();
    let mut block = BlockAddr(FIRST_DESC_BLOCK);
    let mut hops = 0u32;
    while block != cursor.desc_block {
        let linker = read_linker(dev, block)?;
        block = linker.next().ok_or_else(|| {
            MfsError::Corrupted(format!(
                "descriptor block {} is not on the group chain",
                cursor.desc_block
            ))
        })?;
        hops += 1;
        if hops as u64 > dev.total_blocks() {
            return Err(MfsError::Corrupted("descriptor chain loops".into()));
        }
    }
    Ok(hops * per_block + cursor.desc_index)
}

/// 按链表顺序列出所有块组描述符
pub fn all_descriptors<B: BlockDevice>(
    dev: &mut BlockDev<B>,
) -> MfsResult<Vec<(GroupCursor, GroupDescriptor)>> {
    let mut out = Vec::new();
    let mut block = Some(BlockAddr(FIRST_DESC_BLOCK));
    while let Some(cur) = block {
        let linker = read_linker(dev, cur)?;
        for index in 0..linker.no_descriptors {
            let off = desc_offset(index);
            let desc = GroupDescriptor::from_disk_bytes(&dev.buffer()[off..off + GROUP_DESC_SIZE]);
            out.push((
                GroupCursor {
                    desc_block: cur,
                    desc_index: index,
                },
                desc,
            ));
        }
        block = linker.next();
        if out.len() as u64 > dev.total_blocks() {
            return Err(MfsError::Corrupted("descriptor chain loops".into()));
        }
    }
    Ok(out)
}
