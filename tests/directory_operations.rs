//! # 目录操作测试
//!
//! 测试 mkdir / cd / mv / touch / ls 以及目录块的增长和墓碑复用

use std::fs;

use mfs::mfs_backend::dir;
use mfs::mfs_backend::entries::{DirEntry, DirEntryIter, read_cursor};
use mfs::mfs_backend::errno::*;
use mfs::mfs_backend::inodetable::{read_inode, update_inode};
use mfs::*;
use tempfile::TempDir;

fn open_volume_with(opts: FormatOptions) -> (TempDir, Session) {
    let tmp = TempDir::new().unwrap();
    let volume = tmp.path().join("dirs.mfs");
    format(&volume, &opts).unwrap();
    let session = Session::open(&volume).unwrap();
    (tmp, session)
}

fn open_volume() -> (TempDir, Session) {
    open_volume_with(FormatOptions {
        block_size: Some(512),
        ..Default::default()
    })
}

fn mkdir_all(session: &mut Session, names: &[&str]) -> Vec<u32> {
    session
        .make_directory(names)
        .into_iter()
        .map(|r| r.expect("mkdir failed"))
        .collect()
}

fn import_file(tmp: &TempDir, session: &mut Session, name: &str, dest: &str) -> u32 {
    let host = tmp.path().join(name);
    fs::write(&host, name.as_bytes()).unwrap();
    session.import(&[host], dest).unwrap().pop().unwrap().unwrap()
}

fn names_in(session: &mut Session, path: &str) -> Vec<String> {
    session
        .list_path(path, ListFlags::INCLUDE_FILES | ListFlags::BY_NAME)
        .unwrap()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// 把 inode 的三个时间戳改成给定值
fn set_times(session: &mut Session, id: u32, t: u32) {
    let sb = *session.superblock();
    let dev = session.device_mut();
    let mut inode = read_inode(dev, &sb, id).unwrap();
    inode.creation_time = t;
    inode.access_time = t;
    inode.modification_time = t;
    update_inode(dev, &sb, &inode).unwrap();
}

fn root_block_cursor(session: &mut Session) -> usize {
    let sb = *session.superblock();
    let dev = session.device_mut();
    let root = read_inode(dev, &sb, 1).unwrap();
    dev.read_block(BlockAddr(root.datablocks[0])).unwrap();
    read_cursor(dev.buffer())
}

/// 根目录第一个块里的全部记录（含墓碑），带偏移
fn root_block_records(session: &mut Session) -> Vec<(usize, DirEntry)> {
    let sb = *session.superblock();
    let dev = session.device_mut();
    let root = read_inode(dev, &sb, 1).unwrap();
    dev.read_block(BlockAddr(root.datablocks[0])).unwrap();
    DirEntryIter::new(dev.buffer()).collect()
}

#[test]
fn test_mkdir_and_change_directory() {
    let (_tmp, mut session) = open_volume();
    mkdir_all(&mut session, &["a"]);
    mkdir_all(&mut session, &["a/b", "/a/c"]);

    session.change_directory("a/b").unwrap();
    assert_eq!(session.pwd(), "/a/b/");
    session.change_directory("..").unwrap();
    assert_eq!(session.pwd(), "/a/");
    assert_eq!(names_in(&mut session, "."), vec!["b", "c"]);

    session.change_directory("./c/../b").unwrap();
    assert_eq!(session.pwd(), "/a/b/");
    session.change_directory("/").unwrap();
    assert_eq!(session.pwd(), "/");
    assert_eq!(session.cwd().id(), ROOT_INODE);

    // 根目录的 ".." 指向自己
    session.change_directory("..").unwrap();
    assert_eq!(session.cwd().id(), ROOT_INODE);
}

#[test]
fn test_failed_cd_keeps_current_directory() {
    let (tmp, mut session) = open_volume();
    mkdir_all(&mut session, &["d"]);
    session.change_directory("d").unwrap();
    import_file(&tmp, &mut session, "plain", ".");

    let err = session.change_directory("nothing").unwrap_err();
    assert_eq!(err.to_errno(), ENOENT);
    let err = session.change_directory("plain").unwrap_err();
    assert_eq!(err.to_errno(), ENOTDIR);
    // 中间段是文件时整个路径失败，即使后面有 ".."
    let err = session.change_directory("plain/x/..").unwrap_err();
    assert_eq!(err.to_errno(), ENOTDIR);
    assert!(matches!(
        session.change_directory("#bad"),
        Err(MfsError::InvalidPath(_))
    ));
    assert_eq!(session.pwd(), "/d/");
}

#[test]
fn test_mkdir_errors_do_not_stop_batch() {
    let (_tmp, mut session) = open_volume();
    let results = session.make_directory(&["x", "x", "missing/y", "z/", "w"]);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(MfsError::AlreadyExists(_))));
    assert_eq!(results[2].as_ref().unwrap_err().to_errno(), ENOENT);
    assert!(matches!(results[3], Err(MfsError::InvalidPath(_))));
    assert!(results[4].is_ok());
    assert_eq!(names_in(&mut session, "/"), vec!["w", "x"]);
}

#[test]
fn test_new_directory_links_back_to_parent() {
    let (_tmp, mut session) = open_volume();
    let ids = mkdir_all(&mut session, &["p"]);
    let child = mkdir_all(&mut session, &["p/q"]);

    let listing = session
        .list_path("p/q", ListFlags::ALL | ListFlags::BY_NAME)
        .unwrap();
    let entries = listing.entries();
    assert_eq!(entries[0].name, ".");
    assert_eq!(entries[0].inode.id(), child[0]);
    assert_eq!(entries[1].name, "..");
    assert_eq!(entries[1].inode.id(), ids[0]);
    assert_eq!(entries[0].inode.file_size, 512);
}

#[test]
fn test_directory_entry_limit() {
    let (_tmp, mut session) = open_volume_with(FormatOptions {
        block_size: Some(512),
        max_directory_files: Some(10),
        ..Default::default()
    });
    let names: Vec<String> = (0..10).map(|i| format!("d{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    mkdir_all(&mut session, &names);

    let err = session.make_directory(&["extra"]).pop().unwrap().unwrap_err();
    assert!(matches!(err, MfsError::DirectoryFull { limit: 10 }));
    assert_eq!(err.to_errno(), EMLINK);

    // 子目录有自己的配额
    mkdir_all(&mut session, &["d0/inner"]);
}

#[test]
fn test_rename_in_full_directory() {
    let (_tmp, mut session) = open_volume_with(FormatOptions {
        block_size: Some(512),
        max_directory_files: Some(10),
        ..Default::default()
    });
    let names: Vec<String> = (0..10).map(|i| format!("d{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    mkdir_all(&mut session, &names);
    mkdir_all(&mut session, &["d1/x"]);

    // 同目录改名不改变有效项数
    let r = session.move_entries(&["d0"], "renamed", false, |_, _| true).unwrap();
    assert!(*r[0].as_ref().unwrap());
    let listed = names_in(&mut session, "/");
    assert_eq!(listed.len(), 10);
    assert!(listed.contains(&"renamed".to_string()));
    assert!(!listed.contains(&"d0".to_string()));

    // 从别的目录移进来仍受上限约束
    let r = session.move_entries(&["d1/x"], "/", false, |_, _| true).unwrap();
    assert!(matches!(r[0], Err(MfsError::DirectoryFull { limit: 10 })));
    assert_eq!(names_in(&mut session, "d1"), vec!["x"]);
    let err = session.make_directory(&["extra"]).pop().unwrap().unwrap_err();
    assert_eq!(err.to_errno(), EMLINK);
}

#[test]
fn test_directory_grows_past_one_block() {
    let (_tmp, mut session) = open_volume_with(FormatOptions {
        block_size: Some(512),
        max_directory_files: Some(-1),
        ..Default::default()
    });
    // 每条 16 字节，一个 512 字节的目录块放不下 40 条
    let names: Vec<String> = (0..40).map(|i| format!("entry_{i:02}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    mkdir_all(&mut session, &names);

    assert_ne!(session.cwd().datablocks[1], 0);
    assert_eq!(session.cwd().datablocks[2], 0);
    assert_eq!(session.cwd().file_size, 1024);

    let listed = names_in(&mut session, "/");
    assert_eq!(listed.len(), 40);
    assert_eq!(listed, names);

    session.change_directory("entry_39").unwrap();
    session.change_directory("..").unwrap();
    assert_eq!(session.cwd().id(), ROOT_INODE);
}

#[test]
fn test_tombstone_is_reused_when_block_is_full() {
    let (_tmp, mut session) = open_volume();
    // 23 + 28 * 17 = 499，剩下的 13 字节放不下新记录
    let names: Vec<String> = (0..28).map(|i| format!("d{i:08}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    mkdir_all(&mut session, &names);
    assert_eq!(root_block_cursor(&mut session), 499);

    let moved = session
        .move_entries(&["d00000002"], "d00000001", false, |_, _| true)
        .unwrap();
    assert!(*moved[0].as_ref().unwrap());

    mkdir_all(&mut session, &["newname1"]);
    assert_eq!(root_block_cursor(&mut session), 499);
    assert_eq!(session.cwd().datablocks[1], 0);

    let listed = names_in(&mut session, "/");
    assert!(listed.contains(&"newname1".to_string()));
    assert!(!listed.contains(&"d00000002".to_string()));
    assert_eq!(names_in(&mut session, "d00000001"), vec!["d00000002"]);
}

#[test]
fn test_clear_by_inode_keeps_record_length() {
    let (_tmp, mut session) = open_volume();
    let names: Vec<String> = (0..28).map(|i| format!("d{i:08}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let ids = mkdir_all(&mut session, &names);
    assert_eq!(root_block_cursor(&mut session), 499);

    let (offset, before) = root_block_records(&mut session)
        .into_iter()
        .find(|(_, e)| e.inode == ids[5])
        .unwrap();
    assert_eq!(before.rec_len, 17);

    let sb = *session.superblock();
    dir::clear_entry(session.device_mut(), &sb, ROOT_INODE, ids[5]).unwrap();
    let err = dir::clear_entry(session.device_mut(), &sb, ROOT_INODE, ids[5]).unwrap_err();
    assert_eq!(err.to_errno(), ENOENT);

    let records = root_block_records(&mut session);
    let (_, cleared) = records.iter().find(|(off, _)| *off == offset).unwrap();
    assert!(!cleared.is_live());
    assert_eq!(cleared.rec_len, before.rec_len);
    assert_eq!(root_block_cursor(&mut session), 499);
    assert!(!names_in(&mut session, "/").contains(&"d00000005".to_string()));

    // 新记录放不到游标后面，落进墓碑
    mkdir_all(&mut session, &["newname1"]);
    assert_eq!(root_block_cursor(&mut session), 499);
    assert_eq!(session.cwd().datablocks[1], 0);
    let records = root_block_records(&mut session);
    let (_, reused) = records.iter().find(|(off, _)| *off == offset).unwrap();
    assert_eq!(reused.name, b"newname1");
    assert_eq!(reused.rec_len, before.rec_len);
}

#[test]
fn test_move_renames_and_relocates() {
    let (tmp, mut session) = open_volume();
    mkdir_all(&mut session, &["box"]);
    let ino = import_file(&tmp, &mut session, "item", "/");

    let r = session.move_entries(&["item"], "renamed", false, |_, _| true).unwrap();
    assert!(r[0].is_ok());
    assert_eq!(names_in(&mut session, "/"), vec!["box", "renamed"]);

    let r = session.move_entries(&["renamed"], "box", false, |_, _| true).unwrap();
    assert!(r[0].is_ok());
    assert_eq!(names_in(&mut session, "/"), vec!["box"]);

    let r = session
        .move_entries(&["box/renamed"], "/box/final", false, |_, _| true)
        .unwrap();
    assert!(r[0].is_ok());
    let listing = session.list_path("box", ListFlags::INCLUDE_FILES).unwrap();
    assert_eq!(listing.names(), vec!["final"]);
    assert_eq!(listing.entries()[0].inode.id(), ino);
}

#[test]
fn test_move_directory_rewrites_parent_link() {
    let (_tmp, mut session) = open_volume();
    let ids = mkdir_all(&mut session, &["x", "y"]);
    mkdir_all(&mut session, &["x/deep"]);

    session.move_entries(&["x"], "y", false, |_, _| true).unwrap()[0]
        .as_ref()
        .unwrap();
    session.change_directory("y/x").unwrap();
    session.change_directory("..").unwrap();
    assert_eq!(session.cwd().id(), ids[1]);

    session.change_directory("/y/x/deep/../..").unwrap();
    assert_eq!(session.cwd().id(), ids[1]);
}

#[test]
fn test_move_into_itself_is_rejected() {
    let (_tmp, mut session) = open_volume();
    mkdir_all(&mut session, &["a", "a/b"]);

    for dest in ["a", "a/b", "a/b/c", "/a/b/"] {
        let r = session.move_entries(&["a"], dest, false, |_, _| true).unwrap();
        let err = r[0].as_ref().unwrap_err();
        assert_eq!(err.to_errno(), EINVAL, "mv a {dest}");
    }
    assert_eq!(names_in(&mut session, "/"), vec!["a"]);
    assert_eq!(names_in(&mut session, "a"), vec!["b"]);
}

#[test]
fn test_move_missing_source_changes_nothing() {
    let (_tmp, mut session) = open_volume();
    mkdir_all(&mut session, &["keep"]);
    let before = session.list(ListFlags::ALL | ListFlags::INCLUDE_FILES).unwrap();

    let r = session.move_entries(&["ghost"], "keep", false, |_, _| true).unwrap();
    assert_eq!(r[0].as_ref().unwrap_err().to_errno(), ENOENT);
    assert_eq!(
        session.list(ListFlags::ALL | ListFlags::INCLUDE_FILES).unwrap(),
        before
    );
}

#[test]
fn test_move_onto_existing_name_fails() {
    let (tmp, mut session) = open_volume();
    import_file(&tmp, &mut session, "one", "/");
    import_file(&tmp, &mut session, "two", "/");

    let r = session.move_entries(&["one"], "two", false, |_, _| true).unwrap();
    assert!(matches!(r[0], Err(MfsError::AlreadyExists(_))));
    assert_eq!(names_in(&mut session, "/"), vec!["one", "two"]);
}

#[test]
fn test_interactive_move_asks_each_time() {
    let (tmp, mut session) = open_volume();
    mkdir_all(&mut session, &["dest"]);
    import_file(&tmp, &mut session, "f1", "/");
    import_file(&tmp, &mut session, "f2", "/");

    let mut asked = Vec::new();
    let r = session
        .move_entries(&["f1", "f2"], "dest", true, |src, dst| {
            asked.push(format!("{src}->{dst}"));
            src == "f2"
        })
        .unwrap();
    assert_eq!(asked, vec!["f1->dest", "f2->dest"]);
    assert!(!*r[0].as_ref().unwrap());
    assert!(*r[1].as_ref().unwrap());
    assert_eq!(names_in(&mut session, "/"), vec!["dest", "f1"]);
    assert_eq!(names_in(&mut session, "dest"), vec!["f2"]);
}

#[test]
fn test_many_sources_need_directory_destination() {
    let (tmp, mut session) = open_volume();
    import_file(&tmp, &mut session, "f1", "/");
    import_file(&tmp, &mut session, "f2", "/");

    let err = session
        .move_entries(&["f1", "f2"], "f2", false, |_, _| true)
        .unwrap_err();
    assert_eq!(err.to_errno(), ENOTDIR);
    assert!(session
        .move_entries(&["f1", "f2"], "nowhere", false, |_, _| true)
        .is_err());
    assert_eq!(names_in(&mut session, "/"), vec!["f1", "f2"]);
}

#[test]
fn test_touch_modes() {
    let (tmp, mut session) = open_volume();
    let file = import_file(&tmp, &mut session, "stamp", "/");
    let dir = mkdir_all(&mut session, &["folder"])[0];
    let sb = *session.superblock();

    set_times(&mut session, file, 5);
    session.touch(&["stamp"], TouchMode::Access)[0].as_ref().unwrap();
    let inode = read_inode(session.device_mut(), &sb, file).unwrap();
    assert!(inode.access_time > 5);
    assert_eq!(inode.modification_time, 5);
    assert_eq!(inode.creation_time, 5);

    set_times(&mut session, file, 5);
    session.touch(&["stamp"], TouchMode::Modify)[0].as_ref().unwrap();
    let inode = read_inode(session.device_mut(), &sb, file).unwrap();
    assert_eq!(inode.access_time, 5);
    assert!(inode.modification_time > 5);

    set_times(&mut session, dir, 5);
    let results = session.touch(&["folder", "absent"], TouchMode::default());
    assert!(results[0].is_ok());
    assert_eq!(results[1].as_ref().unwrap_err().to_errno(), ENOENT);
    let inode = read_inode(session.device_mut(), &sb, dir).unwrap();
    assert!(inode.access_time > 5 && inode.modification_time > 5);
    assert_eq!(inode.creation_time, 5);
}

#[test]
fn test_list_flags_filter_and_order() {
    let (tmp, mut session) = open_volume();
    let c = mkdir_all(&mut session, &["charlie"])[0];
    let a = mkdir_all(&mut session, &["alpha"])[0];
    let h = mkdir_all(&mut session, &[".hidden"])[0];
    let f = import_file(&tmp, &mut session, "bravo", "/");
    set_times(&mut session, c, 30);
    set_times(&mut session, a, 10);
    set_times(&mut session, h, 20);
    set_times(&mut session, f, 20);
    set_times(&mut session, ROOT_INODE, 0);

    let plain = session.list(ListFlags::empty()).unwrap();
    assert_eq!(plain.names(), vec!["alpha", "charlie"]);

    let with_files = session.list(ListFlags::INCLUDE_FILES).unwrap();
    assert_eq!(with_files.names(), vec!["alpha", "bravo", "charlie"]);

    // 按创建时间，时间相同保持磁盘顺序
    let all = session.list(ListFlags::ALL | ListFlags::INCLUDE_FILES).unwrap();
    assert_eq!(all.names(), vec![".", "..", "alpha", ".hidden", "bravo", "charlie"]);

    let by_name = session
        .list(ListFlags::ALL | ListFlags::INCLUDE_FILES | ListFlags::BY_NAME)
        .unwrap();
    assert_eq!(
        by_name.names(),
        vec![".", "..", ".hidden", "alpha", "bravo", "charlie"]
    );

    let long = session
        .list(ListFlags::INCLUDE_FILES | ListFlags::BY_NAME | ListFlags::LONG)
        .unwrap();
    let rendered = long.render();
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "alpha ct: 10 at: 10 mt: 10 512");
    assert_eq!(lines[1], "bravo ct: 20 at: 20 mt: 20 5");
    assert_eq!(long.to_string(), rendered);

    let short = session.list(ListFlags::INCLUDE_FILES | ListFlags::BY_NAME).unwrap();
    assert_eq!(short.to_string(), "alpha\nbravo\ncharlie\n");
}

#[test]
fn test_recursive_listing_visits_subdirectories() {
    let (tmp, mut session) = open_volume();
    mkdir_all(&mut session, &["a", "b", "a/inner"]);
    import_file(&tmp, &mut session, "leaf", "a/inner");

    let flags = ListFlags::INCLUDE_FILES | ListFlags::BY_NAME | ListFlags::RECURSIVE;
    let tree = session.list_recursive(flags).unwrap();
    let labels: Vec<&str> = tree.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(labels, vec!["/", "/a", "/a/inner", "/b"]);
    assert_eq!(tree[2].1.names(), vec!["leaf"]);
    assert!(tree[3].1.is_empty());

    // list 带 RECURSIVE 时把各层拼在一起，子目录项用相对路径
    let flat = session.list(flags).unwrap();
    assert_eq!(flat.names(), vec!["a", "b", "a/inner", "a/inner/leaf"]);
    let from_a = session.list_path("a", flags).unwrap();
    assert_eq!(from_a.names(), vec!["inner", "inner/leaf"]);

    let long = session.list(flags | ListFlags::LONG).unwrap();
    let rendered = long.render();
    assert_eq!(rendered.lines().count(), 4);
    assert!(rendered.lines().all(|l| l.contains(" ct: ")));
    assert!(rendered.ends_with(" 4\n"));

    session.change_directory("a").unwrap();
    let tree = session.list_recursive(flags).unwrap();
    assert_eq!(tree[0].0, "/a/");
    assert_eq!(tree[1].0, "/a/inner");
}
