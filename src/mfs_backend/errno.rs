//! MFS error codes
//! POSIX-style integer codes handed to the command layer

/// Success code
pub const EOK: i32 = 0;

/// No such file or directory
pub const ENOENT: i32 = 2;

/// I/O error
pub const EIO: i32 = 5;

/// File exists
pub const EEXIST: i32 = 17;

/// Not a directory
pub const ENOTDIR: i32 = 20;

/// Is a directory
pub const EISDIR: i32 = 21;

/// Invalid argument
pub const EINVAL: i32 = 22;

/// File too large
pub const EFBIG: i32 = 27;

/// No space left on device
pub const ENOSPC: i32 = 28;

/// Read-only file system
pub const EROFS: i32 = 30;

/// Too many links
pub const EMLINK: i32 = 31;

/// Structure needs cleaning
pub const EUCLEAN: i32 = 117;

/// Not supported
pub const ENOTSUP: i32 = 95;

/// Convert error code to string description
pub const fn errno_to_str(errno: i32) -> &'static str {
    match errno {
        EOK => "Success",
        ENOENT => "No such file or directory",
        EIO => "I/O error",
        EEXIST => "File exists",
        ENOTDIR => "Not a directory",
        EISDIR => "Is a directory",
        EINVAL => "Invalid argument",
        EFBIG => "File too large",
        ENOSPC => "No space left on device",
        EROFS => "Read-only file system",
        EMLINK => "Too many links",
        EUCLEAN => "Structure needs cleaning",
        ENOTSUP => "Not supported",
        _ => "Unknown error",
    }
}

/// Convert a per-item result to an errno
#[inline]
pub fn result_to_errno<T>(result: &crate::mfs_backend::error::MfsResult<T>) -> i32 {
    match result {
        Ok(_) => EOK,
        Err(e) => e.to_errno(),
    }
}
