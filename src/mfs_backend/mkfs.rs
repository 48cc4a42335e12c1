//! 格式化：创建新卷

use std::path::Path;

use log::{error, info};

use crate::mfs_backend::bitmap::set_bit;
use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::blockgroup_description::write_fresh_desc_block;
use crate::mfs_backend::config::*;
use crate::mfs_backend::disknode::{FileType, GroupDescriptor, Inode};
use crate::mfs_backend::endian::DiskFormat;
use crate::mfs_backend::entries::init_dir_block;
use crate::mfs_backend::error::*;
use crate::mfs_backend::superblock::{Superblock, write_superblock};
use crate::mfs_backend::tool::{now_secs, parse_int_literal};
use crate::mfs_backend::volume::VolumeFile;

/// 格式化参数，均为未校验的原始整数；`None` 用默认值
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub block_size: Option<i64>,
    pub max_filename_size: Option<i64>,
    pub max_file_size: Option<i64>,
    pub max_directory_files: Option<i64>,
}

impl FormatOptions {
    /// 从整数字面量构造，任何一个字面量不合法都直接失败
    pub fn from_literals(
        block_size: Option<&str>,
        max_filename_size: Option<&str>,
        max_file_size: Option<&str>,
        max_directory_files: Option<&str>,
    ) -> MfsResult<Self> {
        Ok(Self {
            block_size: block_size.map(parse_int_literal).transpose()?,
            max_filename_size: max_filename_size.map(parse_int_literal).transpose()?,
            max_file_size: max_file_size.map(parse_int_literal).transpose()?,
            max_directory_files: max_directory_files.map(parse_int_literal).transpose()?,
        })
    }

    /// 解析 `create` 命令参数：`[-bs N] [-fns N] [-mfs N] [-mdfn N] <卷文件>`
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> MfsResult<(String, Self)> {
        let mut opts = Self::default();
        let mut path: Option<String> = None;
        let mut iter = args.iter().map(AsRef::as_ref);
        while let Some(arg) = iter.next() {
            let slot = match arg {
                "-bs" => &mut opts.block_size,
                "-fns" => &mut opts.max_filename_size,
                "-mfs" => &mut opts.max_file_size,
                "-mdfn" => &mut opts.max_directory_files,
                flag if flag.starts_with('-') => {
                    return Err(MfsError::InvalidArgument(format!("unknown option {flag}")));
                }
                positional => {
                    if path.replace(positional.to_string()).is_some() {
                        return Err(MfsError::InvalidArgument(
                            "more than one volume file given".into(),
                        ));
                    }
                    continue;
                }
            };
            let value = iter
                .next()
                .ok_or_else(|| MfsError::InvalidArgument(format!("{arg} needs a value")))?;
            if slot.replace(parse_int_literal(value)?).is_some() {
                return Err(MfsError::InvalidArgument(format!("{arg} given twice")));
            }
        }
        let path = path.ok_or_else(|| MfsError::InvalidArgument("no volume file given".into()))?;
        Ok((path, opts))
    }

    /// 套用默认值和回退规则得到超级块
    pub fn superblock(&self) -> Superblock {
        let non_negative = |v: i64| u64::try_from(v).unwrap_or(0);
        Superblock::with_params(
            self.block_size.map_or(DEFAULT_BLOCK_SIZE as u64, non_negative),
            self.max_filename_size.map_or(DEFAULT_FILENAME_SIZE as u64, non_negative),
            self.max_directory_files
                .map_or(DEFAULT_MAX_DIRECTORY_FILES as u64, |v| {
                    u64::try_from(v).unwrap_or(u64::MAX)
                }),
            self.max_file_size.map_or(DEFAULT_MAX_FILE_SIZE, non_negative),
        )
    }
}

/// 卷文件名必须形如 `<名字>.mfs`
pub fn check_volume_name(path: &Path) -> MfsResult<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MfsError::InvalidFilename(path.display().to_string()))?;
    match name.strip_suffix(VOLUME_EXTENSION) {
        Some(stem) if !stem.is_empty() => Ok(()),
        _ => Err(MfsError::InvalidFilename(name.to_string())),
    }
}

/// 在设备上写出只有一个块组的全新卷
///
/// 布局：0 超级块，1 描述符块，2 块位图，3 inode 位图，4.. inode 表，
/// 其后是数据区，数据区第 0 块是根目录。
pub fn write_fresh_volume<B: BlockDevice>(dev: &mut BlockDev<B>, sb: &Superblock) -> MfsResult<()> {
    let total = sb.blocks_count as u64;
    if dev.total_blocks() < total {
        dev.grow(total)?;
    }
    write_superblock(dev, sb)?;

    let mut desc = GroupDescriptor::fresh(BlockAddr(FIRST_DESC_BLOCK + 1), sb.blocks_per_group);
    desc.free_blocks -= 1;
    desc.free_inodes -= 1;
    write_fresh_desc_block(dev, sb, BlockAddr(FIRST_DESC_BLOCK), &desc)?;

    dev.clear_buffer();
    set_bit(dev.buffer_mut(), 0);
    dev.write_block(BlockAddr(desc.block_bitmap))?;
    dev.write_block(BlockAddr(desc.inode_bitmap))?;

    dev.clear_buffer();
    for i in 0..sb.inode_blocks {
        dev.write_block(BlockAddr(desc.inode_table).offset(i))?;
    }

    let root_block = desc.data_start(sb.inode_blocks);
    let mut root = Inode::new(ROOT_INODE as u16, FileType::Directory, sb.block_size as u64, now_secs());
    root.datablocks[0] = root_block.get();
    root.to_disk_bytes(&mut dev.buffer_mut()[..INODE_SIZE]);
    dev.write_block(BlockAddr(desc.inode_table))?;

    init_dir_block(dev.buffer_mut(), ROOT_INODE, ROOT_INODE);
    dev.write_block(root_block)?;
    Ok(())
}

/// 创建新卷文件；文件已存在时失败，中途出错会删掉半成品
pub fn format<P: AsRef<Path>>(path: P, opts: &FormatOptions) -> MfsResult<Superblock> {
    let path = path.as_ref();
    check_volume_name(path)?;
    let sb = opts.superblock();

    let file = VolumeFile::create_new(path, sb.block_size).map_err(|e| match e.kind() {
        std::io::ErrorKind::AlreadyExists => MfsError::AlreadyExists(path.display().to_string()),
        _ => MfsError::Io(e),
    })?;
    let mut dev = BlockDev::new(file);
    let written = write_fresh_volume(&mut dev, &sb).and_then(|_| dev.close().map_err(MfsError::from));
    drop(dev);

    if let Err(e) = written {
        error!("format {} failed: {e}", path.display());
        if let Err(rm) = std::fs::remove_file(path) {
            error!("could not remove partial volume {}: {rm}", path.display());
        }
        return Err(e);
    }
    info!(
        "formatted {} (block size {}, {} blocks, {} inodes)",
        path.display(),
        sb.block_size,
        sb.blocks_count,
        sb.inodes_count
    );
    Ok(sb)
}
