//! 数据结构定义

use crate::consts::{NBUCKET, NBUF};
use crate::error::{Error, ErrorKind, Result};
use core::fmt;

/// 缓存键：(设备号, 块号)
///
/// 同一个键在缓存中最多只有一个有效槽位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    /// 设备号
    pub device: u32,
    /// 块号
    pub block_no: u32,
}

impl BlockKey {
    /// 创建缓存键
    pub const fn new(device: u32, block_no: u32) -> Self {
        Self { device, block_no }
    }

    /// 计算所属 shard 下标
    ///
    /// `(dev * blockno) % nshards`，乘法在 u64 中进行，不会溢出
    pub fn shard(&self, nshards: usize) -> usize {
        ((self.device as u64 * self.block_no as u64) % nshards as u64) as usize
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev={} blk={}", self.device, self.block_no)
    }
}

/// 块缓存配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// shard 数量
    pub nshards: usize,
    /// 槽位总数
    pub nslots: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            nshards: NBUCKET,
            nslots: NBUF,
        }
    }
}

impl CacheConfig {
    /// 创建配置
    pub const fn new(nshards: usize, nslots: usize) -> Self {
        Self { nshards, nslots }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.nshards == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Cache must have at least one shard",
            ));
        }
        if self.nslots == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Cache must have at least one slot",
            ));
        }
        if self.nslots < self.nshards {
            log::warn!(
                "[BCACHE] {} slots for {} shards, some shards will stay empty",
                self.nslots,
                self.nshards
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.nshards, 13);
        assert_eq!(config.nslots, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let err = CacheConfig::new(0, 8).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = CacheConfig::new(3, 0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_shard_hash() {
        // 1*3 和 1*6 都落在 shard 0
        assert_eq!(BlockKey::new(1, 3).shard(3), 0);
        assert_eq!(BlockKey::new(1, 6).shard(3), 0);
        assert_eq!(BlockKey::new(1, 1).shard(13), 1);
        assert_eq!(BlockKey::new(1, 14).shard(13), 1);
        // 设备号 0 总是落在 shard 0
        assert_eq!(BlockKey::new(0, 12345).shard(13), 0);
        // 大数相乘不溢出
        assert_eq!(BlockKey::new(u32::MAX, u32::MAX).shard(1), 0);
    }
}
