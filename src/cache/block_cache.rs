//! 块缓存实现
//!
//! 对应 xv6 lock 实验中按哈希分桶的 `bcache`
//!
//! # 结构
//!
//! ```text
//! struct BufferCache {
//!     slots: [Slot; N],                  // 槽位数组，只存内容和内容锁
//!     shards: [spin::Mutex<Shard>; S],   // 每个 shard 一条 SlotMeta 链表
//!     migration: spin::Mutex<()>,        // 跨 shard 迁移时的协调锁
//! }
//! ```
//!
//! # 锁的顺序
//!
//! - 命中路径只拿目标 shard 的锁；
//! - 驱逐扫描按下标递增依次加锁，任意时刻最多持有"当前胜者 + 正在扫描"两把；
//! - 迁移时先拿协调锁，再拿目标 shard 的锁；
//! - 持有任何自旋锁时都不会等待内容锁，也不会做设备 I/O。

use super::buffer::{Slot, SlotId, SlotMeta};
use super::shard::Shard;
use crate::block::{Block, BlockDevice, BlockRef};
use crate::clock::{MonotonicClock, TickSource};
use crate::error::{Error, ErrorKind, Result};
use crate::types::{BlockKey, CacheConfig};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 快速路径命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 槽位被重新分配给新键的次数
    pub evictions: u64,
    /// 迁移复查时发现其他线程已插入同一键的次数
    pub duplicate_races: u64,
    /// 设备读取次数
    pub device_reads: u64,
    /// 设备写入次数
    pub device_writes: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    duplicate_races: AtomicU64,
    pub(crate) device_reads: AtomicU64,
    pub(crate) device_writes: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            duplicate_races: self.duplicate_races.load(Ordering::Relaxed),
            device_reads: self.device_reads.load(Ordering::Relaxed),
            device_writes: self.device_writes.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// 块缓存
///
/// 固定容量、可在线程间共享的块缓存。所有引用同一 (设备号, 块号) 的调用者
/// 看到的是同一份内存副本。
///
/// 缓存通常在启动时构造一次，之后以共享引用（例如 `Arc<BufferCache<_>>`
/// 或 `static` + `OnceLock`）传给所有使用者。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BufferCache, CacheConfig};
///
/// let cache = BufferCache::new(CacheConfig::default(), disk)?;
///
/// let mut block = cache.bread(1, 42)?;
/// block.data_mut()[0] = 0x42;
/// block.bwrite()?;
/// // block 离开作用域时自动 brelse
/// ```
pub struct BufferCache<D, C = MonotonicClock> {
    /// 块设备
    device: D,
    /// 时间戳来源
    clock: C,
    /// 槽位数组
    slots: Box<[Slot]>,
    /// shard 数组
    shards: Box<[spin::Mutex<Shard>]>,
    /// 迁移协调锁
    migration: spin::Mutex<()>,
    /// 统计信息
    pub(crate) stats: StatCounters,
}

impl<D: BlockDevice> BufferCache<D> {
    /// 创建块缓存，使用 [`MonotonicClock`] 作为时间戳来源
    pub fn new(config: CacheConfig, device: D) -> Result<Self> {
        Self::with_clock(config, device, MonotonicClock::new())
    }
}

impl<D: BlockDevice, C: TickSource> BufferCache<D, C> {
    /// 创建块缓存
    ///
    /// 所有槽位初始时不属于任何键，全部挂在 shard 0 上，
    /// 空闲时间戳为当前 `clock.now()`。
    ///
    /// # 参数
    ///
    /// * `config` - shard 数量和槽位数量
    /// * `device` - 块设备，决定每个槽位的数据大小
    /// * `clock` - 时间戳来源
    pub fn with_clock(config: CacheConfig, device: D, clock: C) -> Result<Self> {
        config.validate()?;

        let block_size = device.block_size();
        if block_size == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Block size must be non-zero",
            ));
        }

        let now = clock.now();
        let slots: Box<[Slot]> = (0..config.nslots).map(|_| Slot::new(block_size)).collect();
        let shards: Box<[spin::Mutex<Shard>]> = (0..config.nshards)
            .map(|_| spin::Mutex::new(Shard::new()))
            .collect();

        {
            let mut first = shards[0].lock();
            for id in 0..config.nslots {
                first.link_back(SlotMeta::new(id, now));
            }
        }

        log::debug!(
            "[BCACHE] init: {} slots x {} bytes, {} shards",
            config.nslots,
            block_size,
            config.nshards
        );

        Ok(Self {
            device,
            clock,
            slots,
            shards,
            migration: spin::Mutex::new(()),
            stats: StatCounters::default(),
        })
    }

    /// 查找或分配缓存块，返回已加锁的块
    ///
    /// 返回的块键与请求一致，引用计数已为调用者加一，内容锁由调用者持有。
    /// 数据不一定有效，需要有效数据请用 [`BufferCache::bread`]。
    ///
    /// # Panics
    ///
    /// 所有槽位都被引用、且没有其他线程恰好插入了同一个键时，缓存耗尽，直接 panic。
    pub fn bget(&self, device: u32, block_no: u32) -> Block<'_, D, C> {
        let key = BlockKey::new(device, block_no);
        let target = self.shard_of(key);

        // 快速路径：只看目标 shard
        {
            let mut shard = self.shards[target].lock();
            if let Some(meta) = shard.find_mut(key) {
                meta.ref_count += 1;
                let (id, generation) = (meta.id, meta.generation);
                drop(shard);
                bump(&self.stats.hits);
                log::trace!("[BCACHE] bget {} HIT slot={}", key, id);
                return self.lock_slot(id, key, generation);
            }
        }

        bump(&self.stats.misses);
        log::debug!("[BCACHE] bget {} MISS, shard={}", key, target);

        let victim = self.steal_victim();
        self.install(key, target, victim)
    }

    /// 把偷来的槽位迁入目标 shard 并分配给 `key`
    ///
    /// 扫描期间可能有其他线程插入了同一个键，因此先在目标 shard 中复查；
    /// 若已存在，直接使用它，偷来的槽位清空键后放回原 shard。
    fn install(
        &self,
        key: BlockKey,
        target: usize,
        victim: Option<(usize, SlotMeta)>,
    ) -> Block<'_, D, C> {
        let migration = self.migration.lock();
        let mut dest = self.shards[target].lock();

        if let Some(meta) = dest.find_mut(key) {
            meta.ref_count += 1;
            let (id, generation) = (meta.id, meta.generation);
            drop(dest);
            bump(&self.stats.duplicate_races);
            log::warn!(
                "[BCACHE] bget {} inserted concurrently, using slot={}",
                key,
                id
            );
            if let Some((origin, mut meta)) = victim {
                // 旧键可能已被别的槽位重新缓存，放回的槽位不能再占着它
                meta.key = None;
                self.shards[origin].lock().link_front(meta);
            }
            drop(migration);
            return self.lock_slot(id, key, generation);
        }

        let Some((origin, mut meta)) = victim else {
            drop(dest);
            drop(migration);
            log::error!(
                "[BCACHE] Cannot allocate {}: all {} slots are referenced",
                key,
                self.slots.len()
            );
            panic!("bget: no buffers");
        };

        let id = meta.id;
        log::debug!(
            "[BCACHE] evict slot={} ({:?}) shard {} -> {}",
            id,
            meta.key,
            origin,
            target
        );
        meta.assign(key);
        let generation = meta.generation;
        dest.link_front(meta);
        drop(dest);
        drop(migration);

        bump(&self.stats.evictions);
        self.lock_slot(id, key, generation)
    }

    /// 在整个缓存中寻找驱逐对象，并把它从所在 shard 摘下
    ///
    /// 选择引用计数为 0 且空闲时间戳**最大**的槽位，即最近变为空闲的那个。
    /// 扫描结束前一直持有当前胜者所在 shard 的锁，防止它被别人抢走。
    fn steal_victim(&self) -> Option<(usize, SlotMeta)> {
        let mut winner: Option<(usize, spin::MutexGuard<'_, Shard>, usize)> = None;
        let mut max_free = 0u64;

        for (idx, shard) in self.shards.iter().enumerate() {
            let guard = shard.lock();
            let candidate = guard.best_free(max_free);
            if let Some(candidate) = candidate {
                max_free = candidate.last_free;
                // 覆盖旧胜者时释放它的锁
                winner = Some((idx, guard, candidate.pos));
            }
        }

        let (origin, mut guard, pos) = winner?;
        let meta = guard.unlink(pos)?;
        Some((origin, meta))
    }

    /// 获取槽位内容锁，构造块句柄
    fn lock_slot(&self, id: SlotId, key: BlockKey, generation: u64) -> Block<'_, D, C> {
        let mut content = self.slots[id].content.lock();
        content.claim(key, generation);
        Block::new(self, id, key, content)
    }

    /// 释放一次引用
    ///
    /// 调用时内容锁必须已经释放。引用计数降到 0 时记录空闲时间戳；
    /// 槽位留在原 shard，直到某次驱逐扫描选中它。
    pub(crate) fn brelse(&self, id: SlotId, key: BlockKey) {
        let mut shard = self.shards[self.shard_of(key)].lock();
        let Some(meta) = shard.find_slot_mut(id, key) else {
            log::error!("[BCACHE] brelse {}: slot={} not linked", key, id);
            panic!("brelse: slot not in its shard");
        };
        meta.ref_count -= 1;
        if meta.ref_count == 0 {
            meta.last_free = self.clock.now();
        }
        log::trace!(
            "[BCACHE] brelse {} slot={} ref_count={}",
            key,
            id,
            meta.ref_count
        );
    }

    /// 增加引用计数，使块不会被驱逐
    ///
    /// 与内容锁无关：调用者可以释放块后继续持有 pin，
    /// 每次 `pin` 必须对应一次 [`BufferCache::unpin`]。
    ///
    /// # 错误
    ///
    /// 槽位已不再缓存 `block.key()` 时返回 `NotFound`。
    pub fn pin(&self, block: BlockRef) -> Result<()> {
        let mut shard = self.shards[self.shard_of(block.key())].lock();
        let meta = shard
            .find_slot_mut(block.id(), block.key())
            .ok_or(Error::new(ErrorKind::NotFound, "Block not in cache"))?;
        meta.ref_count += 1;
        log::trace!("[BCACHE] pin {} ref_count={}", block.key(), meta.ref_count);
        Ok(())
    }

    /// 撤销一次 [`BufferCache::pin`]
    ///
    /// 不更新空闲时间戳。
    ///
    /// # 错误
    ///
    /// - 槽位已不再缓存该键：`NotFound`
    /// - 引用计数已为 0：`InvalidState`
    pub fn unpin(&self, block: BlockRef) -> Result<()> {
        let mut shard = self.shards[self.shard_of(block.key())].lock();
        let meta = shard
            .find_slot_mut(block.id(), block.key())
            .ok_or(Error::new(ErrorKind::NotFound, "Block not in cache"))?;
        if meta.ref_count == 0 {
            log::warn!("[BCACHE] unpin {} without matching pin", block.key());
            return Err(Error::new(
                ErrorKind::InvalidState,
                "Unpin of a block with no references",
            ));
        }
        meta.ref_count -= 1;
        log::trace!("[BCACHE] unpin {} ref_count={}", block.key(), meta.ref_count);
        Ok(())
    }

    #[inline]
    fn shard_of(&self, key: BlockKey) -> usize {
        key.shard(self.shards.len())
    }

    pub(crate) fn device(&self) -> &D {
        &self.device
    }

    pub(crate) fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id]
    }

    /// 时间戳来源
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// 槽位总数
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// shard 数量
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// 指定 shard 中的槽位数
    pub fn shard_len(&self, shard: usize) -> usize {
        self.shards[shard].lock().len()
    }

    /// 挂在各 shard 上的槽位总数
    ///
    /// 没有迁移在进行时等于 [`BufferCache::capacity`]。
    pub fn linked_slots(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// 某个键当前的引用计数，不在缓存中时返回 `None`
    pub fn ref_count(&self, device: u32, block_no: u32) -> Option<u32> {
        let key = BlockKey::new(device, block_no);
        self.shards[self.shard_of(key)]
            .lock()
            .find_mut(key)
            .map(|m| m.ref_count)
    }

    /// 当前缓存的所有键
    ///
    /// 逐个 shard 加锁读取，并发修改时结果只是近似快照。
    pub fn cached_keys(&self) -> Vec<BlockKey> {
        let mut keys = Vec::new();
        for shard in self.shards.iter() {
            keys.extend(shard.lock().iter().filter_map(|m| m.key));
        }
        keys
    }
}

impl<D, C> core::fmt::Debug for BufferCache<D, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferCache")
            .field("capacity", &self.slots.len())
            .field("shards", &self.shards.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
