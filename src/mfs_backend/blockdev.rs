use log::trace;

pub use crate::mfs_backend::error::{BlockDevError, BlockDevResult};

/// 卷内块号
///
/// 所有磁盘上的块指针都是 32 位；0 号块永远是超级块，因此
/// 在 inode 指针和描述符链里 0 表示 "未使用"。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BlockAddr(pub u32);

impl BlockAddr {
    pub const fn get(self) -> u32 {
        self.0
    }

    /// 向后偏移 n 个块
    pub const fn offset(self, n: u32) -> BlockAddr {
        BlockAddr(self.0 + n)
    }
}

impl core::fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 外部需要实现的块设备trait
pub trait BlockDevice {
    /// 写入数据到块设备
    /// * `buffer` - 要写入的数据
    /// * `block_id` - 起始块号
    /// * `count` - 块数量
    fn write(&mut self, buffer: &[u8], block_id: u32, count: u32) -> BlockDevResult<()>;

    /// 从块设备读取数据
    /// * `buffer` - 读取数据的目标缓冲区
    /// * `block_id` - 起始块号
    /// * `count` - 块数量
    fn read(&mut self, buffer: &mut [u8], block_id: u32, count: u32) -> BlockDevResult<()>;

    /// 打开块设备
    fn open(&mut self) -> BlockDevResult<()>;

    /// 关闭块设备
    fn close(&mut self) -> BlockDevResult<()>;

    /// 获取块设备的总块数
    fn total_blocks(&self) -> u64;

    /// 获取块大小（字节）
    fn block_size(&self) -> u32;

    /// 把设备扩展到 `total_blocks` 个块，新增部分读出来必须全是 0
    fn grow(&mut self, total_blocks: u64) -> BlockDevResult<()> {
        let _ = total_blocks;
        Err(BlockDevError::Unsupported)
    }

    /// 刷新缓存到磁盘
    fn flush(&mut self) -> BlockDevResult<()> {
        Ok(())
    }

    /// 检查设备是否只读
    fn is_readonly(&self) -> bool {
        false
    }
}

/// 单块缓冲区，大小跟随设备块大小
pub struct BlockBuffer {
    buffer: Vec<u8>,
}

impl BlockBuffer {
    pub fn new(block_size: usize) -> Self {
        Self {
            buffer: vec![0u8; block_size],
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 清空缓冲区
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }
}

/// 块设备封装
///
/// 只带一个暂存块，不做跨调用缓存：每次 `read_block` 都会真正读盘。
pub struct BlockDev<B: BlockDevice> {
    dev: B,
    buffer: BlockBuffer,
}

impl<B: BlockDevice> BlockDev<B> {
    /// 创建新的块设备封装
    pub fn new(dev: B) -> Self {
        let block_size = dev.block_size() as usize;
        Self {
            dev,
            buffer: BlockBuffer::new(block_size),
        }
    }

    /// 关闭块设备
    pub fn close(&mut self) -> BlockDevResult<()> {
        self.dev.flush()?;
        self.dev.close()
    }

    /// 读取指定块到内部缓冲区
    pub fn read_block(&mut self, block: BlockAddr) -> BlockDevResult<()> {
        self.validate_block_range(block, 1)?;
        trace!("read block {block}");
        self.dev.read(self.buffer.as_mut_slice(), block.get(), 1)
    }

    /// 写入内部缓冲区到指定块
    pub fn write_block(&mut self, block: BlockAddr) -> BlockDevResult<()> {
        if self.dev.is_readonly() {
            return Err(BlockDevError::ReadOnly);
        }
        self.validate_block_range(block, 1)?;
        trace!("write block {block}");
        self.dev.write(self.buffer.as_slice(), block.get(), 1)
    }

    /// 直接读取多个块
    pub fn read_blocks(&mut self, buffer: &mut [u8], block: BlockAddr, count: u32) -> BlockDevResult<()> {
        let required_size = self.block_size() as usize * count as usize;
        if buffer.len() < required_size {
            return Err(BlockDevError::BufferTooSmall {
                provided: buffer.len(),
                required: required_size,
            });
        }
        self.validate_block_range(block, count)?;
        self.dev.read(&mut buffer[..required_size], block.get(), count)
    }

    /// 获取缓冲区引用
    pub fn buffer(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// 获取可变缓冲区引用
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }

    /// 清零内部缓冲区
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// 刷新到磁盘
    pub fn flush(&mut self) -> BlockDevResult<()> {
        self.dev.flush()
    }

    /// 把设备扩展到 `total_blocks` 个块
    pub fn grow(&mut self, total_blocks: u64) -> BlockDevResult<()> {
        if self.dev.is_readonly() {
            return Err(BlockDevError::ReadOnly);
        }
        if total_blocks > u32::MAX as u64 {
            return Err(BlockDevError::NoSpace);
        }
        self.dev.grow(total_blocks)
    }

    /// 获取总块数
    pub fn total_blocks(&self) -> u64 {
        self.dev.total_blocks()
    }

    /// 获取块大小
    pub fn block_size(&self) -> u32 {
        self.dev.block_size()
    }

    /// 验证块范围
    pub fn validate_block_range(&self, block: BlockAddr, count: u32) -> BlockDevResult<()> {
        let end_block = block.get() as u64 + count as u64;
        if end_block > self.total_blocks() {
            return Err(BlockDevError::BlockOutOfRange {
                block_id: block.get(),
                max_blocks: self.total_blocks(),
            });
        }
        Ok(())
    }

    /// 获取内部设备可变引用
    pub fn device_mut(&mut self) -> &mut B {
        &mut self.dev
    }
}
