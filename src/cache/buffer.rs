//! 缓存槽位结构
//!
//! 一个槽位被拆成两部分，分别由两层锁保护：
//!
//! - `SlotMeta`：键、引用计数、空闲时间戳。记录本身存放在某个 shard 的链表里，
//!   由该 shard 的自旋锁保护；槽位在 shard 之间迁移就是把这条记录搬过去。
//! - `SlotContent`：块数据和状态标志，由槽位自己的 [`ContentLock`] 保护，
//!   可以在持锁期间做设备 I/O。

use crate::block::ContentLock;
use crate::types::BlockKey;
use bitflags::bitflags;

/// 槽位 ID，即槽位在缓存数组中的下标
pub type SlotId = usize;

bitflags! {
    /// 缓存块标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CacheFlags: u8 {
        /// 数据与设备上的内容一致（已读入）
        const VALID = 0x01;
        /// 数据被持有者修改过，尚未 bwrite
        const DIRTY = 0x02;
    }
}

/// 槽位元数据，由所在 shard 的锁保护
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotMeta {
    /// 对应的槽位
    pub id: SlotId,
    /// 当前缓存的键，初始化后尚未分配时为 `None`
    pub key: Option<BlockKey>,
    /// 引用计数，为 0 时才可被驱逐
    pub ref_count: u32,
    /// 引用计数降为 0 时的时间戳
    pub last_free: u64,
    /// 分配代数，槽位每被分配给一个键就加一
    pub generation: u64,
}

impl SlotMeta {
    pub fn new(id: SlotId, last_free: u64) -> Self {
        Self {
            id,
            key: None,
            ref_count: 0,
            last_free,
            generation: 0,
        }
    }

    /// 分配给新键，开始新的一代
    pub fn assign(&mut self, key: BlockKey) {
        self.key = Some(key);
        self.ref_count = 1;
        self.generation = self.generation.wrapping_add(1);
    }

    /// 可以被驱逐
    pub fn is_free(&self) -> bool {
        self.ref_count == 0
    }
}

/// 槽位内容，由内容锁保护
pub struct SlotContent {
    /// 数据所属的键
    pub(crate) key: Option<BlockKey>,
    /// 数据所属的分配代数
    ///
    /// 槽位每次被分配后，第一个拿到内容锁的调用者发现代数与元数据不一致，
    /// 就清除 `VALID`，从而触发一次设备读取。即使新键与旧键相同也是如此。
    pub(crate) generation: u64,
    /// 状态标志
    pub(crate) flags: CacheFlags,
    /// 块数据
    pub(crate) data: alloc::boxed::Box<[u8]>,
}

impl SlotContent {
    fn new(block_size: usize) -> Self {
        Self {
            key: None,
            generation: 0,
            flags: CacheFlags::empty(),
            data: alloc::vec![0u8; block_size].into_boxed_slice(),
        }
    }

    /// 认领内容：代数不一致说明槽位刚被重新分配，旧数据作废
    pub(crate) fn claim(&mut self, key: BlockKey, generation: u64) {
        if self.generation != generation || self.key != Some(key) {
            self.key = Some(key);
            self.generation = generation;
            self.flags = CacheFlags::empty();
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.flags.contains(CacheFlags::VALID)
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.flags.contains(CacheFlags::DIRTY)
    }
}

/// 缓存槽位
///
/// 启动时创建，之后永不销毁，只在不同的键之间循环复用。
pub(crate) struct Slot {
    pub content: ContentLock<SlotContent>,
}

impl Slot {
    pub fn new(block_size: usize) -> Self {
        Self {
            content: ContentLock::new(SlotContent::new(block_size)),
        }
    }
}
