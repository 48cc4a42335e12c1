//! # 集成测试
//!
//! 在临时目录里创建真实的 `.mfs` 卷文件，测试格式化、打开和磁盘布局

use std::fs;
use std::path::PathBuf;

use mfs::mfs_backend::config::*;
use mfs::mfs_backend::entries::read_cursor;
use mfs::mfs_backend::errno::*;
use mfs::*;
use tempfile::TempDir;

fn volume_in(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

fn read_u32(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap())
}

#[test]
fn test_format_then_open_every_block_size() {
    let tmp = TempDir::new().unwrap();
    for bs in ACCEPTED_BLOCK_SIZES {
        let path = volume_in(&tmp, &format!("vol{bs}.mfs"));
        let opts = FormatOptions {
            block_size: Some(bs as i64),
            ..Default::default()
        };
        let sb = format(&path, &opts).expect("format failed");
        assert_eq!(sb.block_size, bs);
        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            sb.blocks_count as u64 * bs as u64
        );

        let mut session = Session::open(&path).expect("open failed");
        assert_eq!(session.superblock(), &sb);
        assert_eq!(session.pwd(), "/");
        assert_eq!(session.cwd().id(), ROOT_INODE);

        let listing = session.list(ListFlags::ALL | ListFlags::BY_NAME).unwrap();
        assert_eq!(listing.names(), vec![".", ".."]);
        let stats = session.statfs().unwrap();
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.free_blocks, bs as u64 * 8 - 1);
        session.close().unwrap();
    }
}

#[test]
fn test_on_disk_layout_of_fresh_volume() {
    let tmp = TempDir::new().unwrap();
    let path = volume_in(&tmp, "layout.mfs");
    let sb = format(&path, &FormatOptions::default()).unwrap();
    let raw = fs::read(&path).unwrap();
    let bs = sb.block_size as usize;
    assert_eq!(bs, DEFAULT_BLOCK_SIZE as usize);

    // 超级块
    assert_eq!(read_u32(&raw, 0), 8192);
    assert_eq!(read_u32(&raw, 8), 8192);
    assert_eq!(read_u32(&raw, 20), 1024);
    assert_eq!(read_u32(&raw, 24), DEFAULT_FILENAME_SIZE);
    assert_eq!(read_u32(&raw, 28), DEFAULT_MAX_DIRECTORY_FILES);
    assert_eq!(
        u64::from_le_bytes(raw[32..40].try_into().unwrap()),
        DEFAULT_MAX_FILE_SIZE
    );

    // 描述符块：链接头 + 第一个描述符
    let desc = &raw[bs..2 * bs];
    assert_eq!(read_u32(desc, 0), 0);
    assert_eq!(read_u32(desc, 4), 1);
    assert_eq!(read_u32(desc, 8), 50);
    assert_eq!(read_u32(desc, 12), 2);
    assert_eq!(read_u32(desc, 16), 3);
    assert_eq!(read_u32(desc, 20), 4);
    assert_eq!(read_u32(desc, 24), 8191);
    assert_eq!(read_u32(desc, 28), 8191);

    // 两个位图的第 0 位都是第一个字的最高位
    assert_eq!(read_u32(&raw, 2 * bs), 0x8000_0000);
    assert_eq!(read_u32(&raw, 3 * bs), 0x8000_0000);

    // 根 inode 在 inode 表第 0 槽
    let root = &raw[4 * bs..4 * bs + INODE_SIZE];
    assert_eq!(u16::from_le_bytes([root[0], root[1]]), 1);
    assert_eq!(u16::from_le_bytes([root[2], root[3]]), 0);
    assert_eq!(u64::from_le_bytes(root[8..16].try_into().unwrap()), 1024);
    let root_block = read_u32(root, 28) as usize;
    assert_eq!(root_block, 4 + sb.inode_blocks as usize);

    // 根目录块：游标 23，"." 和 ".." 都指向 1
    let block = &raw[root_block * bs..(root_block + 1) * bs];
    assert_eq!(read_cursor(block), 23);
    assert_eq!(read_u32(block, 4), 1);
    assert_eq!(&block[12..13], b".");
    assert_eq!(read_u32(block, 13), 1);
    assert_eq!(&block[21..23], b"..");
}

#[test]
fn test_format_refuses_existing_file() {
    let tmp = TempDir::new().unwrap();
    let path = volume_in(&tmp, "taken.mfs");
    fs::write(&path, b"keep me").unwrap();

    let err = format(&path, &FormatOptions::default()).unwrap_err();
    assert!(matches!(err, MfsError::AlreadyExists(_)));
    assert_eq!(err.to_errno(), EEXIST);
    assert_eq!(fs::read(&path).unwrap(), b"keep me");
}

#[test]
fn test_volume_name_must_end_in_mfs() {
    let tmp = TempDir::new().unwrap();
    for name in ["disk.img", "disk", ".mfs", "disk.mfs.bak"] {
        let path = volume_in(&tmp, name);
        let err = format(&path, &FormatOptions::default()).unwrap_err();
        assert!(matches!(err, MfsError::InvalidFilename(_)), "{name}");
        assert!(!path.exists());
    }
    assert!(matches!(
        Session::open(volume_in(&tmp, "disk.img")),
        Err(MfsError::InvalidFilename(_))
    ));
}

#[test]
fn test_bad_literal_creates_nothing() {
    let tmp = TempDir::new().unwrap();
    let path = volume_in(&tmp, "bad.mfs");
    let arg = path.to_str().unwrap();

    let err = FormatOptions::from_args(&["-bs", "12ab", arg]).unwrap_err();
    assert!(matches!(err, MfsError::InvalidLiteral(_)));
    assert_eq!(err.to_errno(), EINVAL);
    assert!(!path.exists());
}

#[test]
fn test_options_from_args_are_persisted() {
    let tmp = TempDir::new().unwrap();
    let path = volume_in(&tmp, "opts.mfs");
    let arg = path.to_str().unwrap().to_string();

    let (target, opts) =
        FormatOptions::from_args(&["-bs", "0x1000", "-fns", "020", "-mdfn", "12", arg.as_str()]).unwrap();
    let sb = format(&target, &opts).unwrap();
    assert_eq!(sb.block_size, 4096);
    assert_eq!(sb.max_filename_size, 16);
    assert_eq!(sb.max_directory_files, 12);

    let session = Session::open(&path).unwrap();
    assert_eq!(session.superblock(), &sb);
    assert_eq!(session.volume_name(), "opts");
}

#[test]
fn test_out_of_range_options_fall_back() {
    let tmp = TempDir::new().unwrap();
    let path = volume_in(&tmp, "fallback.mfs");
    let opts = FormatOptions::from_literals(Some("3000"), Some("4"), Some("100"), Some("3")).unwrap();
    let sb = format(&path, &opts).unwrap();
    assert_eq!(sb.block_size, DEFAULT_BLOCK_SIZE);
    assert_eq!(sb.max_filename_size, DEFAULT_FILENAME_SIZE);
    assert_eq!(sb.max_file_size, DEFAULT_MAX_FILE_SIZE);
    assert_eq!(sb.max_directory_files, UNLIMITED_DIRECTORY_FILES);
}

#[test]
fn test_open_rejects_missing_and_truncated_volumes() {
    let tmp = TempDir::new().unwrap();
    let missing = volume_in(&tmp, "missing.mfs");
    let err = Session::open(&missing).err().unwrap();
    assert_eq!(err.to_errno(), ENOENT);

    let short = volume_in(&tmp, "short.mfs");
    fs::write(&short, [0u8; 16]).unwrap();
    assert!(matches!(Session::open(&short), Err(MfsError::Corrupted(_))));

    let garbage = volume_in(&tmp, "garbage.mfs");
    fs::write(&garbage, [0xABu8; 4096]).unwrap();
    assert!(matches!(Session::open(&garbage), Err(MfsError::Corrupted(_))));
}

#[test]
fn test_reopen_sees_previous_changes() {
    let tmp = TempDir::new().unwrap();
    let path = volume_in(&tmp, "persist.mfs");
    format(&path, &FormatOptions::default()).unwrap();

    let mut session = Session::open(&path).unwrap();
    let ids: Vec<u32> = session
        .make_directory(&["alpha", "beta"])
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(ids, vec![2, 3]);
    session.close().unwrap();

    let mut session = Session::open(&path).unwrap();
    let listing = session.list(ListFlags::BY_NAME).unwrap();
    assert_eq!(listing.names(), vec!["alpha", "beta"]);
}
