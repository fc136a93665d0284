//! 块缓存常量定义

/// 默认块大小（字节）
pub const BSIZE: usize = 1024;

/// 默认 shard 数量
///
/// 取素数，使 `(dev * blockno) % NBUCKET` 的分布更均匀
pub const NBUCKET: usize = 13;

/// 默认缓存槽位数量
pub const NBUF: usize = 30;
