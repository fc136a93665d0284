//! 块缓存模块
//!
//! 固定容量的块缓存，位于文件系统和块设备驱动之间。
//!
//! # 主要组件
//!
//! - [`BufferCache`] - 缓存表和查找/驱逐引擎
//! - [`CacheFlags`] - 缓存块状态标志
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 设计原理
//!
//! 槽位按 `(dev * blockno) % S` 分到 S 个 shard 中，每个 shard 有自己的自旋锁，
//! 命中路径只锁一个 shard，不同 shard 上的查找完全并行。
//!
//! 未命中时在所有 shard 中寻找引用计数为 0 的槽位，迁移到目标 shard。
//! 迁移在协调锁下进行，并复查目标 shard，保证同一个键不会出现两个槽位。
//!
//! # 与 xv6 的对应关系
//!
//! | xv6                        | bcache_core                      |
//! |----------------------------|----------------------------------|
//! | `struct buf`               | `Slot` + `SlotMeta`              |
//! | `struct bucket`            | `spin::Mutex<Shard>`             |
//! | `bcache.lock`              | `BufferCache::migration`         |
//! | `binit()`                  | [`BufferCache::with_clock()`]    |
//! | `bget()`                   | [`BufferCache::bget()`]          |
//! | `bread()`                  | [`BufferCache::bread()`]         |
//! | `bwrite()`                 | [`Block::bwrite()`]              |
//! | `brelse()`                 | [`Block::release()`] / drop      |
//! | `bpin()` / `bunpin()`      | [`BufferCache::pin()`] / [`BufferCache::unpin()`] |
//!
//! [`Block::bwrite()`]: crate::block::Block::bwrite
//! [`Block::release()`]: crate::block::Block::release
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use bcache_core::{BufferCache, CacheConfig};
//!
//! let cache = BufferCache::new(CacheConfig::default(), disk)?;
//!
//! // 读取块，返回时持有内容锁
//! let mut block = cache.bread(1, 100)?;
//! block.data_mut()[0] = 42;
//! block.bwrite()?;
//!
//! // 日志层：释放后仍保持驻留
//! let pinned = block.pin()?;
//! drop(block);
//! // ...
//! cache.unpin(pinned)?;
//!
//! let stats = cache.stats();
//! println!("hit rate: {:.2}", stats.hit_rate());
//! ```

mod buffer;
pub(crate) mod block_cache;
mod shard;

pub use buffer::{CacheFlags, SlotId};
pub(crate) use buffer::SlotContent;
pub use block_cache::{BufferCache, CacheStats};
