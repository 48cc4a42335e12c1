//! 文件数据的导入与导出
//!
//! 块寻址：前 12 块直接放在 inode 里，接着一个一级间接块（槽 12，
//! 存 block_size / 4 个指针），再接一个二级间接块（槽 13）。
//! 需要三级间接块的文件直接拒绝。

use std::io::{Read, Write};

use log::{debug, info};

use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::blockgroup_description::GroupCursor;
use crate::mfs_backend::bmalloc::store_block;
use crate::mfs_backend::config::*;
use crate::mfs_backend::dir::{check_insertable, insert_entry};
use crate::mfs_backend::disknode::{FileType, Inode};
use crate::mfs_backend::endian::read_u32_le;
use crate::mfs_backend::error::*;
use crate::mfs_backend::inodetable::*;
use crate::mfs_backend::superblock::Superblock;
use crate::mfs_backend::tool::{now_secs, truncate_name};

/// 长度为 `len` 的文件需要多少数据块，超出二级间接寻址范围时报错
pub fn blocks_needed(sb: &Superblock, len: u64) -> MfsResult<u64> {
    let blocks = len.div_ceil(sb.block_size as u64);
    if blocks > sb.max_addressable_blocks() {
        return Err(MfsError::TripleIndirectUnsupported { blocks });
    }
    Ok(blocks)
}

fn encode_pointers(sb: &Superblock, ptrs: &[u32]) -> Vec<u8> {
    let mut block = vec![0u8; sb.block_size as usize];
    for (i, p) in ptrs.iter().enumerate() {
        block[i * 4..i * 4 + 4].copy_from_slice(&p.to_le_bytes());
    }
    block
}

fn read_pointers<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    block: BlockAddr,
    count: usize,
) -> MfsResult<Vec<u32>> {
    dev.read_block(block)?;
    let buf = dev.buffer();
    Ok((0..count).map(|i| read_u32_le(buf, i * 4)).collect())
}

/// 从 reader 依次读 `count` 块写入新分配的数据块，返回块号
fn copy_in<B: BlockDevice, R: Read>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    cursor: &mut GroupCursor,
    reader: &mut R,
    remaining: &mut u64,
    count: u64,
) -> MfsResult<Vec<u32>> {
    let bs = sb.block_size as usize;
    let mut chunk = vec![0u8; bs];
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let take = (*remaining).min(bs as u64) as usize;
        chunk.fill(0);
        reader.read_exact(&mut chunk[..take])?;
        let addr = store_block(dev, sb, cursor, &chunk)?;
        *remaining -= take as u64;
        out.push(addr.get());
    }
    Ok(out)
}

/// 把长度为 `len` 的数据流导入为目录 `dir_id` 下的文件 `name`，返回新 inode 号
///
/// 顺序：数据块 -> 间接块 -> inode -> 目录项。
pub fn import_stream<B: BlockDevice, R: Read>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    reader: &mut R,
    len: u64,
    dir_id: u32,
    name: &str,
) -> MfsResult<u32> {
    if len > sb.max_file_size {
        return Err(MfsError::FileTooLarge {
            size: len,
            max: sb.max_file_size,
        });
    }
    let total = blocks_needed(sb, len)?;
    let dir = read_inode(dev, sb, dir_id)?;
    let name = truncate_name(name, sb.name_limit());
    check_insertable(dev, sb, &dir, name, false)?;

    let (inode_cursor, slot, id) = allocate_inode(dev, sb)?;
    let mut inode = Inode::new(id, FileType::Regular, len, now_secs());

    let p = sb.pointers_per_block() as u64;
    let mut cursor = GroupCursor::start();
    let mut remaining = len;
    let mut left = total;

    let direct = copy_in(dev, sb, &mut cursor, reader, &mut remaining, left.min(DIRECT_BLOCKS as u64))?;
    left -= direct.len() as u64;
    inode.datablocks[..direct.len()].copy_from_slice(&direct);

    if left > 0 {
        let single = copy_in(dev, sb, &mut cursor, reader, &mut remaining, left.min(p))?;
        left -= single.len() as u64;
        let table = encode_pointers(sb, &single);
        inode.datablocks[SINGLE_INDIRECT_SLOT] = store_block(dev, sb, &mut cursor, &table)?.get();
    }

    if left > 0 {
        let mut level1 = Vec::new();
        while left > 0 {
            let leaf = copy_in(dev, sb, &mut cursor, reader, &mut remaining, left.min(p))?;
            left -= leaf.len() as u64;
            let table = encode_pointers(sb, &leaf);
            level1.push(store_block(dev, sb, &mut cursor, &table)?.get());
        }
        let table = encode_pointers(sb, &level1);
        inode.datablocks[DOUBLE_INDIRECT_SLOT] = store_block(dev, sb, &mut cursor, &table)?.get();
    }

    write_inode(dev, sb, &inode, inode_cursor, slot, WriteMode::Create)?;
    insert_entry(dev, sb, dir_id, id as u32, FileType::Regular, name, false)?;
    info!("imported {name} ({len} bytes, {total} blocks) as inode {id}");
    Ok(id as u32)
}

/// 按逻辑顺序列出文件的全部数据块
pub fn file_blocks<B: BlockDevice>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    inode: &Inode,
) -> MfsResult<Vec<BlockAddr>> {
    let total = blocks_needed(sb, inode.file_size)?;
    let p = sb.pointers_per_block() as u64;
    let mut out: Vec<u32> = Vec::with_capacity(total as usize);

    let direct = total.min(DIRECT_BLOCKS as u64) as usize;
    out.extend_from_slice(&inode.datablocks[..direct]);
    let mut left = total - direct as u64;

    if left > 0 {
        let take = left.min(p);
        let table = inode.datablocks[SINGLE_INDIRECT_SLOT];
        if table == 0 {
            return Err(MfsError::Corrupted(format!(
                "inode {} lacks its single-indirect block",
                inode.id()
            )));
        }
        out.extend(read_pointers(dev, BlockAddr(table), take as usize)?);
        left -= take;
    }

    if left > 0 {
        let table = inode.datablocks[DOUBLE_INDIRECT_SLOT];
        if table == 0 {
            return Err(MfsError::Corrupted(format!(
                "inode {} lacks its double-indirect block",
                inode.id()
            )));
        }
        let level1 = read_pointers(dev, BlockAddr(table), left.div_ceil(p) as usize)?;
        for leaf in level1 {
            let take = left.min(p);
            if leaf == 0 {
                return Err(MfsError::Corrupted(format!(
                    "inode {} has a hole in its double-indirect table",
                    inode.id()
                )));
            }
            out.extend(read_pointers(dev, BlockAddr(leaf), take as usize)?);
            left -= take;
        }
    }

    if out.contains(&0) {
        return Err(MfsError::Corrupted(format!(
            "inode {} points at block 0",
            inode.id()
        )));
    }
    Ok(out.into_iter().map(BlockAddr).collect())
}

/// 把文件内容写到 writer，每块写 min(块大小, 剩余字节)，返回写出的字节数
pub fn export_stream<B: BlockDevice, W: Write>(
    dev: &mut BlockDev<B>,
    sb: &Superblock,
    inode: &Inode,
    writer: &mut W,
) -> MfsResult<u64> {
    if !inode.is_file() {
        return Err(MfsError::TypeMismatch {
            name: format!("inode {}", inode.id()),
            expected: FileType::Regular,
        });
    }
    let blocks = file_blocks(dev, sb, inode)?;
    let mut remaining = inode.file_size;
    for block in blocks {
        dev.read_block(block)?;
        let take = remaining.min(sb.block_size as u64) as usize;
        writer.write_all(&dev.buffer()[..take])?;
        remaining -= take as u64;
    }
    writer.flush()?;
    debug!("exported inode {} ({} bytes)", inode.id(), inode.file_size);
    Ok(inode.file_size)
}
