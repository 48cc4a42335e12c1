//! 块 / inode 分配
//!
//! 分配分两步：[`find_free`] 只负责找到空闲位（必要时追加块组），
//! 真正置位、扣减空闲计数并写回描述符的是 [`write_data`] 和
//! `inodetable::write_inode`。两步之间用同一个 [`GroupCursor`] 传递位置。

use log::{debug, info};

use crate::mfs_backend::bitmap::first_zero_bit;
use crate::mfs_backend::bitmap::set_bit;
use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::blockgroup_description::*;
use crate::mfs_backend::config::*;
use crate::mfs_backend::disknode::{GroupDescriptor, GroupLinker};
use crate::mfs_backend::endian::DiskFormat;
use crate::mfs_backend::error::*;
use crate::mfs_backend::superblock::Superblock;

/// 分配对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocKind {
    Block,
    Inode,
}

/// `find_free` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeSlot {
    /// 游标所指块组中空闲位的下标
    Found(u32),
    /// 游标已移动（跟随链表或追加了新块组），需要重新查找
    Retry,
}

/// 从游标位置开始查找空闲的块或 inode
pub fn find_free<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    cursor: &mut GroupCursor,
    kind: AllocKind,
) -> MfsResult<FreeSlot> {
    let linker = read_linker(dev, cursor.desc_block)?;
    let descs: Vec<GroupDescriptor> = (cursor.desc_index..linker.no_descriptors)
        .map(|i| {
            let off = GROUP_LINKER_SIZE + i as usize * GROUP_DESC_SIZE;
            GroupDescriptor::from_disk_bytes(&dev.buffer()[off..off + GROUP_DESC_SIZE])
        })
        .collect();

    let start = cursor.desc_index;
    for (i, desc) in descs.iter().enumerate() {
        let (free, bitmap) = match kind {
            AllocKind::Block => (desc.free_blocks, desc.block_bitmap),
            AllocKind::Inode => (desc.free_inodes, desc.inode_bitmap),
        };
        if free == 0 {
            continue;
        }

        cursor.desc_index = start + i as u32;
        dev.read_block(BlockAddr(bitmap))?;
        let limit = match kind {
            AllocKind::Block => sb.blocks_per_group,
            AllocKind::Inode => sb.inodes_per_group,
        };
        return match first_zero_bit(dev.buffer(), limit) {
            Some(bit) => {
                debug!(
                    "free {:?} bit {} in desc block {} index {}",
                    kind, bit, cursor.desc_block, cursor.desc_index
                );
                Ok(FreeSlot::Found(bit))
            }
            None => Err(MfsError::Corrupted(format!(
                "group descriptor reports {free} free but bitmap block {bitmap} is full"
            ))),
        };
    }

    match linker.next() {
        Some(next) => {
            *cursor = GroupCursor {
                desc_block: next,
                desc_index: 0,
            };
        }
        None => append_group(dev, sb, cursor, linker)?,
    }
    Ok(FreeSlot::Retry)
}

/// 在卷末尾追加一个新块组，并把游标移到它上面
fn append_group<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    cursor: &mut GroupCursor,
    mut linker: GroupLinker,
) -> MfsResult<()> {
    let end = u32::try_from(dev.total_blocks())
        .map_err(|_| MfsError::NoSpace("volume block numbers exhausted".into()))?;
    let new_desc_block = linker.is_full();
    let first = if new_desc_block {
        BlockAddr(end).offset(1)
    } else {
        BlockAddr(end)
    };
    let desc = GroupDescriptor::fresh(first, sb.blocks_per_group);
    let total = desc.data_start(sb.inode_blocks).get() as u64 + sb.blocks_per_group as u64;
    dev.grow(total)?;

    dev.clear_buffer();
    dev.write_block(BlockAddr(desc.block_bitmap))?;
    dev.write_block(BlockAddr(desc.inode_bitmap))?;

    if new_desc_block {
        let block = BlockAddr(end);
        write_fresh_desc_block(dev, sb, block, &desc)?;
        linker.next_block = block.get();
        write_linker(dev, cursor.desc_block, &linker)?;
        *cursor = GroupCursor {
            desc_block: block,
            desc_index: 0,
        };
    } else {
        let placed = GroupCursor {
            desc_block: cursor.desc_block,
            desc_index: linker.no_descriptors,
        };
        write_descriptor(dev, placed, &desc)?;
        linker.no_descriptors += 1;
        write_linker(dev, cursor.desc_block, &linker)?;
        *cursor = placed;
    }

    info!(
        "appended block group at desc block {} index {} (bitmaps {}/{}, table {}, volume now {} blocks)",
        cursor.desc_block, cursor.desc_index, desc.block_bitmap, desc.inode_bitmap, desc.inode_table, total
    );
    Ok(())
}

/// 反复调用 `find_free` 直到找到空闲位
pub fn allocate<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    cursor: &mut GroupCursor,
    kind: AllocKind,
) -> MfsResult<u32> {
    let mut rounds = 0u64;
    loop {
        match find_free(dev, sb, cursor, kind)? {
            FreeSlot::Found(bit) => return Ok(bit),
            FreeSlot::Retry => {
                rounds += 1;
                if rounds > dev.total_blocks() {
                    return Err(MfsError::Corrupted("allocation never settles".into()));
                }
            }
        }
    }
}

/// 把 `data` 写进游标所指块组的第 `bit` 个数据块，并标记为已用
///
/// `data` 不足一块时剩余部分补 0。
pub fn write_data<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    cursor: GroupCursor,
    bit: u32,
    data: &[u8],
) -> MfsResult<BlockAddr> {
    let mut desc = read_descriptor(dev, cursor)?;
    if desc.free_blocks == 0 {
        return Err(MfsError::Corrupted(format!(
            "no free blocks left in group at desc block {} index {}",
            cursor.desc_block, cursor.desc_index
        )));
    }
    let addr = desc.data_block(sb.inode_blocks, bit);

    let len = data.len().min(sb.block_size as usize);
    dev.clear_buffer();
    dev.buffer_mut()[..len].copy_from_slice(&data[..len]);
    dev.write_block(addr)?;

    dev.read_block(BlockAddr(desc.block_bitmap))?;
    set_bit(dev.buffer_mut(), bit);
    dev.write_block(BlockAddr(desc.block_bitmap))?;

    desc.free_blocks -= 1;
    write_descriptor(dev, cursor, &desc)?;
    Ok(addr)
}

/// 分配一个数据块并写入内容
pub fn store_block<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    cursor: &mut GroupCursor,
    data: &[u8],
) -> MfsResult<BlockAddr> {
    let bit = allocate(dev, sb, cursor, AllocKind::Block)?;
    write_data(dev, sb, *cursor, bit, data)
}
