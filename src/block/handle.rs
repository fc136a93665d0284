//! 块句柄 - RAII 风格的块访问
//!
//! 对应 xv6 的 `struct buf *`：由 `bget`/`bread` 返回，持有槽位的内容锁，
//! 离开作用域时自动执行 `brelse`。

use crate::block::BlockDevice;
use crate::block::lock::ContentGuard;
use crate::cache::block_cache::bump;
use crate::cache::{BufferCache, CacheFlags, SlotContent, SlotId};
use crate::clock::TickSource;
use crate::error::Result;
use crate::types::BlockKey;

/// 块的轻量引用
///
/// 不持有内容锁，只记录槽位和键，用于 [`BufferCache::pin`] /
/// [`BufferCache::unpin`]。槽位被重新分配给其他键后，引用即失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    id: SlotId,
    key: BlockKey,
}

impl BlockRef {
    /// 槽位 ID
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// 缓存键
    pub fn key(&self) -> BlockKey {
        self.key
    }
}

/// 块句柄
///
/// 持有期间：
/// - 槽位的引用计数包含这个句柄，不会被驱逐；
/// - 当前线程独占槽位的内容锁，其他请求同一块的线程会阻塞。
///
/// 句柄与持锁线程绑定（`!Send`），drop 时先释放内容锁，再减少引用计数。
///
/// # 示例
///
/// ```rust,ignore
/// let mut block = cache.bread(1, 7)?;
/// block.data_mut()[0] = 0x42;
/// block.bwrite()?;
/// block.release();
/// ```
pub struct Block<'a, D: BlockDevice, C: TickSource> {
    cache: &'a BufferCache<D, C>,
    id: SlotId,
    key: BlockKey,
    /// 内容锁守卫，仅在 drop 时被取走
    content: Option<ContentGuard<'a, SlotContent>>,
}

impl<'a, D: BlockDevice, C: TickSource> Block<'a, D, C> {
    pub(crate) fn new(
        cache: &'a BufferCache<D, C>,
        id: SlotId,
        key: BlockKey,
        content: ContentGuard<'a, SlotContent>,
    ) -> Self {
        Self {
            cache,
            id,
            key,
            content: Some(content),
        }
    }

    fn content(&self) -> &SlotContent {
        self.content.as_ref().expect("block content taken before drop")
    }

    fn content_mut(&mut self) -> &mut SlotContent {
        self.content.as_mut().expect("block content taken before drop")
    }

    /// 缓存键
    pub fn key(&self) -> BlockKey {
        self.key
    }

    /// 设备号
    pub fn device(&self) -> u32 {
        self.key.device
    }

    /// 块号
    pub fn block_no(&self) -> u32 {
        self.key.block_no
    }

    /// 不持锁的引用
    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            id: self.id,
            key: self.key,
        }
    }

    /// 块数据
    pub fn data(&self) -> &[u8] {
        &self.content().data
    }

    /// 可修改的块数据，标记为脏
    pub fn data_mut(&mut self) -> &mut [u8] {
        let content = self.content_mut();
        content.flags.insert(CacheFlags::DIRTY);
        &mut content.data
    }

    /// 数据是否已从设备读入
    pub fn is_valid(&self) -> bool {
        self.content().is_valid()
    }

    /// 数据是否在上次 bwrite 之后被修改过
    pub fn is_dirty(&self) -> bool {
        self.content().is_dirty()
    }

    /// 增加一次引用，释放句柄后块仍不会被驱逐
    ///
    /// 需要用 [`BufferCache::unpin`] 撤销。
    pub fn pin(&self) -> Result<BlockRef> {
        let block = self.block_ref();
        self.cache.pin(block)?;
        Ok(block)
    }

    /// 把数据写到设备
    ///
    /// 写入后调用 [`BlockDevice::flush`]，返回时数据已经落到设备上。
    /// 不改变引用计数、有效标志和锁状态。
    ///
    /// # Panics
    ///
    /// 当前线程不持有内容锁时 panic。
    pub fn bwrite(&mut self) -> Result<()> {
        if !self.cache.slot(self.id).content.holding() {
            log::error!("[BCACHE] bwrite {}: content lock not held", self.key);
            panic!("bwrite: content lock not held");
        }

        let key = self.key;
        let cache = self.cache;
        let content = self.content_mut();
        cache.device().write_block(key, &content.data)?;
        cache.device().flush()?;
        content.flags.remove(CacheFlags::DIRTY);
        bump(&cache.stats.device_writes);
        log::trace!("[BCACHE] bwrite {}", key);
        Ok(())
    }

    /// 从设备读入数据并标记有效
    pub(crate) fn fill(&mut self) -> Result<()> {
        let key = self.key;
        let cache = self.cache;
        let content = self.content_mut();
        if let Err(e) = cache.device().read_block(key, &mut content.data) {
            log::warn!("[BCACHE] bread {} failed: {}", key, e);
            return Err(e);
        }
        content.flags.insert(CacheFlags::VALID);
        bump(&cache.stats.device_reads);
        Ok(())
    }

    /// 释放块，等同于 drop
    pub fn release(self) {
        drop(self);
    }
}

impl<D: BlockDevice, C: TickSource> Drop for Block<'_, D, C> {
    fn drop(&mut self) {
        let Some(content) = self.content.take() else {
            return;
        };
        if !self.cache.slot(self.id).content.holding() {
            log::error!("[BCACHE] brelse {}: content lock not held", self.key);
            panic!("brelse: content lock not held");
        }
        // 先释放内容锁，槽位立刻可以被下一个等待者拿到
        drop(content);
        self.cache.brelse(self.id, self.key);
    }
}

impl<D: BlockDevice, C: TickSource> core::fmt::Debug for Block<'_, D, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Block")
            .field("key", &self.key)
            .field("slot", &self.id)
            .field("flags", &self.content.as_ref().map(|c| c.flags))
            .finish()
    }
}
