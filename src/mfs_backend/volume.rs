//! 基于宿主机文件的块设备

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::mfs_backend::blockdev::*;

/// 一个 `.mfs` 卷文件
pub struct VolumeFile {
    file: File,
    path: PathBuf,
    block_size: u32,
    total_blocks: u64,
}

impl VolumeFile {
    /// 独占创建一个新的空卷文件，文件已存在时失败
    pub fn create_new<P: AsRef<Path>>(path: P, block_size: u32) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        debug!("created volume file {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
            block_size,
            total_blocks: 0,
        })
    }

    /// 以读写方式打开已有卷文件
    pub fn open<P: AsRef<Path>>(path: P, block_size: u32) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let total_blocks = file.metadata()?.len() / block_size as u64;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            block_size,
            total_blocks,
        })
    }

    /// 读取文件开头的若干字节（用于在知道块大小之前读取超级块）
    pub fn read_header<P: AsRef<Path>>(path: P, len: usize) -> std::io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let mut header = vec![0u8; len];
        file.read_exact(&mut header)?;
        Ok(header)
    }
}

impl BlockDevice for VolumeFile {
    fn write(&mut self, buffer: &[u8], block_id: u32, count: u32) -> BlockDevResult<()> {
        let block_size = self.block_size() as usize;
        let required = block_size * count as usize;
        if buffer.len() < required {
            return Err(BlockDevError::BufferTooSmall {
                provided: buffer.len(),
                required,
            });
        }

        let offset = block_id as u64 * block_size as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|_| BlockDevError::IoError)?;
        self.file
            .write_all(&buffer[..required])
            .map_err(|_| BlockDevError::WriteError)?;

        let end = block_id as u64 + count as u64;
        if end > self.total_blocks {
            self.total_blocks = end;
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8], block_id: u32, count: u32) -> BlockDevResult<()> {
        let block_size = self.block_size() as usize;
        let required = block_size * count as usize;
        if buffer.len() < required {
            return Err(BlockDevError::BufferTooSmall {
                provided: buffer.len(),
                required,
            });
        }

        let offset = block_id as u64 * block_size as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|_| BlockDevError::IoError)?;
        self.file
            .read_exact(&mut buffer[..required])
            .map_err(|_| BlockDevError::ReadError)?;
        Ok(())
    }

    fn open(&mut self) -> BlockDevResult<()> {
        Ok(())
    }

    fn close(&mut self) -> BlockDevResult<()> {
        self.file.flush().map_err(|_| BlockDevError::IoError)?;
        Ok(())
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn grow(&mut self, total_blocks: u64) -> BlockDevResult<()> {
        if total_blocks <= self.total_blocks {
            return Ok(());
        }
        self.file
            .set_len(total_blocks * self.block_size as u64)
            .map_err(|_| BlockDevError::NoSpace)?;
        debug!(
            "volume {} grown to {} blocks",
            self.path.display(),
            total_blocks
        );
        self.total_blocks = total_blocks;
        Ok(())
    }

    fn flush(&mut self) -> BlockDevResult<()> {
        self.file.sync_data().map_err(|_| BlockDevError::IoError)
    }
}
