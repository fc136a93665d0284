//! bcache_core: 并发共享的块缓存
//!
//! 位于文件系统层和块设备驱动之间的固定容量块缓存，提供：
//! - **减少设备 I/O**：最近使用过的块留在内存中
//! - **同步点**：同一 (设备号, 块号) 的所有调用者看到同一份内存副本
//! - **细粒度并发**：按哈希分片加锁，没有全局瓶颈锁
//!
//! # 示例
//!
//! ```rust,ignore
//! use bcache_core::{BlockDevice, BlockKey, BufferCache, CacheConfig, Result};
//!
//! // 实现 BlockDevice trait
//! struct MyDisk {
//!     // ...
//! }
//!
//! impl BlockDevice for MyDisk {
//!     // 实现必要的方法
//!     // ...
//! }
//!
//! fn main() -> Result<()> {
//!     let cache = BufferCache::new(CacheConfig::default(), MyDisk::new())?;
//!
//!     // 读取块，返回时持有该块的内容锁
//!     let mut block = cache.bread(1, 0)?;
//!     block.data_mut()[0] = 0x42;
//!     block.bwrite()?;
//!     block.release();
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备接口、内容锁、块句柄和读写接口
//! - [`cache`] - 缓存表和查找/驱逐引擎
//! - [`clock`] - 时间戳来源
//! - [`consts`] - 常量定义
//! - [`types`] - 缓存键和配置

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 块缓存
pub mod cache;

/// 时间戳来源
pub mod clock;

/// 常量定义
pub mod consts;

/// 数据结构定义
pub mod types;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{Block, BlockDevice, BlockRef};

// Cache
pub use cache::{BufferCache, CacheFlags, CacheStats};

// 时间戳
pub use clock::{MonotonicClock, TickSource, Ticks};

// 类型
pub use types::{BlockKey, CacheConfig};
