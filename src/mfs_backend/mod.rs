pub mod api;
pub mod bitmap;
pub mod blockdev;
pub mod blockgroup_description;
pub mod bmalloc;
pub mod config;
pub mod dir;
pub mod disknode;
pub mod endian;
pub mod entries;
pub mod errno;
pub mod error;
pub mod file;
pub mod inodetable;
pub mod list;
pub mod mfs;
pub mod mkfs;
pub mod path;
pub mod superblock;
pub mod tool;
pub mod volume;
