//! 杂项工具：时间、路径文本、整数字面量

use std::time::{SystemTime, UNIX_EPOCH};

use crate::mfs_backend::error::*;

/// 当前时间（秒），早于 1970 或超出 u32 时取边界值
pub fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

///合法化路径：去掉重复的 '/' 和末尾多余的 '/'
pub fn normalize_path(pat: &str) -> String {
    let mut last_c = '\0';
    let mut result_s = String::with_capacity(pat.len());
    for ch in pat.chars() {
        if ch == '/' && last_c == '/' {
            continue;
        }
        result_s.push(ch);
        last_c = ch;
    }
    // 保留单独的根"/"
    while result_s.len() > 1 && result_s.ends_with('/') {
        result_s.pop();
    }
    result_s
}

/// 路径拆成 (父目录, 最后一段)
///
/// 没有 '/' 时父目录是 "."，`/name` 的父目录是 "/"。
pub fn split_parent(path: &str) -> (String, String) {
    let norm = normalize_path(path);
    match norm.rfind('/') {
        Some(0) => ("/".to_string(), norm[1..].to_string()),
        Some(pos) => (norm[..pos].to_string(), norm[pos + 1..].to_string()),
        None => (".".to_string(), norm),
    }
}

/// 取出要新建/导出的名字：路径为空、以 '/' 结尾或最后一段是 "."/".." 都不行
pub fn final_name(path: &str) -> MfsResult<String> {
    if path.is_empty() || path.ends_with('/') {
        return Err(MfsError::InvalidPath(format!("{path}: no filename given")));
    }
    let (_, name) = split_parent(path);
    if name.is_empty() || name == "." || name == ".." {
        return Err(MfsError::InvalidPath(format!("{path}: no filename given")));
    }
    Ok(name)
}

/// 把名字截到不超过 `limit` 字节（不切断 UTF-8 字符）
pub fn truncate_name(name: &str, limit: usize) -> &str {
    if name.len() <= limit {
        return name;
    }
    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// 按 strtol(base 0) 的规则解析整数：`0x` 十六进制，前导 `0` 八进制，其余十进制
pub fn parse_int_literal(lit: &str) -> MfsResult<i64> {
    let bad = || MfsError::InvalidLiteral(lit.to_string());
    let s = lit.trim();
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if body.is_empty() {
        return Err(bad());
    }

    let (radix, digits) = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(bad());
    }

    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| bad())?;
    Ok(if negative { -magnitude } else { magnitude })
}
