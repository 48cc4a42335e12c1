//! 文件系统句柄与会话
//!
//! [`MfsFileSystem`] 只保存超级块；[`Session`] 在它之上持有打开的卷文件、
//! 当前目录 inode 和当前目录的路径文本，相当于命令层的上下文。

use std::path::{Path, PathBuf};

use log::debug;

use crate::mfs_backend::api::{self, TouchMode};
use crate::mfs_backend::blockdev::*;
use crate::mfs_backend::blockgroup_description::all_descriptors;
use crate::mfs_backend::disknode::Inode;
use crate::mfs_backend::error::*;
use crate::mfs_backend::inodetable::read_inode;
use crate::mfs_backend::list::{DirListing, ListFlags};
use crate::mfs_backend::superblock::Superblock;
use crate::mfs_backend::volume::VolumeFile;

/// 已打开卷的文件系统参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfsFileSystem {
    pub superblock: Superblock,
}

impl MfsFileSystem {
    pub fn new(superblock: Superblock) -> Self {
        Self { superblock }
    }

    /// 重新读取根目录 inode
    pub fn root<B: BlockDevice>(&self, dev: &mut BlockDev<B>) -> MfsResult<Inode> {
        read_inode(dev, &self.superblock, crate::mfs_backend::config::ROOT_INODE)
    }

    /// 汇总所有块组的空闲情况
    pub fn statfs<B: BlockDevice>(&self, dev: &mut BlockDev<B>) -> MfsResult<FileSystemStats> {
        let groups = all_descriptors(dev)?;
        Ok(FileSystemStats {
            block_size: self.superblock.block_size,
            groups: groups.len() as u32,
            total_blocks: dev.total_blocks(),
            free_blocks: groups.iter().map(|(_, d)| d.free_blocks as u64).sum(),
            free_inodes: groups.iter().map(|(_, d)| d.free_inodes as u64).sum(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSystemStats {
    pub block_size: u32,
    pub groups: u32,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub free_inodes: u64,
}

/// 一个打开的卷及其当前目录
pub struct Session {
    dev: BlockDev<VolumeFile>,
    fs: MfsFileSystem,
    volume_name: String,
    cwd: Inode,
    cwd_path: String,
}

impl Session {
    /// 打开卷，当前目录为根
    pub fn open<P: AsRef<Path>>(path: P) -> MfsResult<Self> {
        let path = path.as_ref();
        let (fs, root, dev) = api::open_volume(path)?;
        let volume_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            dev,
            fs,
            volume_name,
            cwd: root,
            cwd_path: "/".to_string(),
        })
    }

    /// 卷名（不含扩展名）
    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    /// 当前目录路径，总以 '/' 结尾
    pub fn pwd(&self) -> &str {
        &self.cwd_path
    }

    pub fn cwd(&self) -> &Inode {
        &self.cwd
    }

    pub fn superblock(&self) -> &Superblock {
        &self.fs.superblock
    }

    pub fn device_mut(&mut self) -> &mut BlockDev<VolumeFile> {
        &mut self.dev
    }

    /// 切换当前目录
    pub fn change_directory(&mut self, path: &str) -> MfsResult<()> {
        let target = api::resolve_path(&mut self.dev, &self.fs, path, &self.cwd)?;
        self.cwd_path = next_pwd(&self.cwd_path, path);
        self.cwd = target;
        debug!("cwd -> {} (inode {})", self.cwd_path, self.cwd.id());
        Ok(())
    }

    /// 当前目录可能被改动过（新增目录块等），重新读一次
    pub fn refresh_cwd(&mut self) -> MfsResult<()> {
        self.cwd = read_inode(&mut self.dev, &self.fs.superblock, self.cwd.id())?;
        Ok(())
    }

    /// 列出当前目录
    pub fn list(&mut self, flags: ListFlags) -> MfsResult<DirListing> {
        let cwd = self.cwd;
        api::list(&mut self.dev, &self.fs, &cwd, flags)
    }

    /// 列出指定目录
    pub fn list_path(&mut self, path: &str, flags: ListFlags) -> MfsResult<DirListing> {
        let dir = api::resolve_path(&mut self.dev, &self.fs, path, &self.cwd)?;
        api::list(&mut self.dev, &self.fs, &dir, flags)
    }

    /// 递归列出当前目录
    pub fn list_recursive(&mut self, flags: ListFlags) -> MfsResult<Vec<(String, DirListing)>> {
        let cwd = self.cwd;
        let label = self.cwd_path.clone();
        api::list_recursive(&mut self.dev, &self.fs, &cwd, &label, flags)
    }

    pub fn make_directory<S: AsRef<str>>(&mut self, paths: &[S]) -> Vec<MfsResult<u32>> {
        let cwd = self.cwd;
        let out = api::make_directory(&mut self.dev, &self.fs, paths, &cwd);
        self.refresh_after_write();
        out
    }

    pub fn touch<S: AsRef<str>>(&mut self, paths: &[S], mode: TouchMode) -> Vec<MfsResult<()>> {
        let cwd = self.cwd;
        let out = api::touch(&mut self.dev, &self.fs, paths, &cwd, mode);
        self.refresh_after_write();
        out
    }

    pub fn import<P: AsRef<Path>>(
        &mut self,
        host_paths: &[P],
        dest_path: &str,
    ) -> MfsResult<Vec<MfsResult<u32>>> {
        let cwd = self.cwd;
        let out = api::import(&mut self.dev, &self.fs, host_paths, dest_path, &cwd);
        self.refresh_after_write();
        out
    }

    pub fn export<S: AsRef<str>, P: AsRef<Path>>(
        &mut self,
        volume_paths: &[S],
        host_dir: P,
    ) -> MfsResult<Vec<MfsResult<PathBuf>>> {
        let cwd = self.cwd;
        api::export(&mut self.dev, &self.fs, volume_paths, host_dir, &cwd)
    }

    pub fn move_entries<S, F>(
        &mut self,
        sources: &[S],
        destination: &str,
        interactive: bool,
        confirm: F,
    ) -> MfsResult<Vec<MfsResult<bool>>>
    where
        S: AsRef<str>,
        F: FnMut(&str, &str) -> bool,
    {
        let cwd = self.cwd;
        let out = api::move_entries(
            &mut self.dev,
            &self.fs,
            sources,
            destination,
            &cwd,
            interactive,
            confirm,
        );
        self.refresh_after_write();
        out
    }

    pub fn statfs(&mut self) -> MfsResult<FileSystemStats> {
        self.fs.statfs(&mut self.dev)
    }

    /// 关闭卷
    pub fn close(mut self) -> MfsResult<()> {
        self.dev.close()?;
        Ok(())
    }

    fn refresh_after_write(&mut self) {
        if let Err(e) = self.refresh_cwd() {
            log::warn!("could not reload current directory: {e}");
        }
    }
}

/// 按 cd 的参数推算新的当前目录文本
fn next_pwd(current: &str, path: &str) -> String {
    let mut parts: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        current.split('/').filter(|s| !s.is_empty()).collect()
    };
    for seg in path.split('/').filter(|s| !s.is_empty()) {
        match seg {
            "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    let mut out = String::from("/");
    for p in parts {
        out.push_str(p);
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::next_pwd;

    #[test]
    fn pwd_follows_cd_arguments() {
        assert_eq!(next_pwd("/", "a"), "/a/");
        assert_eq!(next_pwd("/a/", "b/c"), "/a/b/c/");
        assert_eq!(next_pwd("/a/b/", ".."), "/a/");
        assert_eq!(next_pwd("/a/b/", "../../.."), "/");
        assert_eq!(next_pwd("/a/", "."), "/a/");
        assert_eq!(next_pwd("/a/", "/x//y/"), "/x/y/");
    }
}
