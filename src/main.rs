//! # mfs 演示程序
//!
//! 用法：`mfs <卷文件.mfs> [宿主机文件...]`
//!
//! 卷不存在时先格式化，然后建 `/docs`，把给出的宿主机文件导入进去，
//! 最后递归列出整个卷并打印空闲统计。

use std::process::ExitCode;

use log::*;
use mfs::*;

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // 根据级别选颜色
        let (level_str, color) = match record.level() {
            Level::Error => ("ERROR", "\x1b[31m"), // 红
            Level::Warn => ("WARN ", "\x1b[33m"),  // 黄
            Level::Info => ("INFO ", "\x1b[32m"),  // 绿
            Level::Debug => ("DEBUG", "\x1b[34m"), // 蓝
            Level::Trace => ("TRACE", "\x1b[90m"), // 灰
        };

        let reset = "\x1b[0m";

        eprintln!(
            "{}[{}]{} {}: {}",
            color,
            level_str,
            reset,
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

// 全局静态实例
static LOGGER: SimpleLogger = SimpleLogger;

fn init_logger() {
    if log::set_logger(&LOGGER).is_err() {
        return;
    }
    // 从环境读取日志等级，比如 LOG=debug / info / error
    let level = match std::env::var("LOG").as_deref() {
        Ok("trace") => LevelFilter::Trace,
        Ok("debug") => LevelFilter::Debug,
        Ok("info") => LevelFilter::Info,
        Ok("warn") => LevelFilter::Warn,
        Ok("error") => LevelFilter::Error,
        _ => LevelFilter::Off, // 默认
    };
    log::set_max_level(level);
}

fn run(volume: &str, host_files: &[String]) -> MfsResult<()> {
    if !std::path::Path::new(volume).exists() {
        let sb = format(volume, &FormatOptions::default())?;
        info!("新建卷 {volume}，块大小 {}", sb.block_size);
    }

    let mut session = Session::open(volume)?;

    match session.make_directory(&["docs"]).pop() {
        Some(Err(MfsError::AlreadyExists(_))) | Some(Ok(_)) | None => {}
        Some(Err(e)) => return Err(e),
    }

    if !host_files.is_empty() {
        for (path, result) in host_files.iter().zip(session.import(host_files, "/docs")?) {
            match result {
                Ok(ino) => println!("imported {path} -> inode {ino}"),
                Err(e) => eprintln!("import {path}: {e} (errno {})", e.to_errno()),
            }
        }
    }

    let flags = ListFlags::ALL | ListFlags::INCLUDE_FILES | ListFlags::BY_NAME | ListFlags::LONG;
    for (dir, listing) in session.list_recursive(flags)? {
        println!("{}:{}", session.volume_name(), dir);
        print!("{}", listing.render());
    }

    let stats = session.statfs()?;
    println!(
        "groups {} / blocks {} / free blocks {} / free inodes {}",
        stats.groups, stats.total_blocks, stats.free_blocks, stats.free_inodes
    );
    session.close()
}

fn main() -> ExitCode {
    init_logger();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((volume, host_files)) = args.split_first() else {
        eprintln!("usage: mfs <volume.mfs> [host files...]");
        return ExitCode::FAILURE;
    };

    match run(volume, host_files) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mfs: {e}");
            ExitCode::FAILURE
        }
    }
}
