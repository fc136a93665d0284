//! Shard：由一把自旋锁保护的槽位链表

use super::buffer::{SlotId, SlotMeta};
use crate::types::BlockKey;
use alloc::collections::VecDeque;

/// 槽位链表
///
/// 槽位属于哪个 shard，只由它的 [`SlotMeta`] 在哪个链表里决定。
/// 新迁入的槽位插在表头。
#[derive(Debug, Default)]
pub(crate) struct Shard {
    slots: VecDeque<SlotMeta>,
}

/// 驱逐候选：在某个 shard 中的位置和它的空闲时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub pos: usize,
    pub last_free: u64,
}

impl Shard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotMeta> {
        self.slots.iter()
    }

    /// 按键查找
    pub fn find_mut(&mut self, key: BlockKey) -> Option<&mut SlotMeta> {
        self.slots.iter_mut().find(|m| m.key == Some(key))
    }

    /// 按槽位 ID 和键查找，两者都要匹配
    pub fn find_slot_mut(&mut self, id: SlotId, key: BlockKey) -> Option<&mut SlotMeta> {
        self.slots
            .iter_mut()
            .find(|m| m.id == id && m.key == Some(key))
    }

    /// 在本链表中寻找空闲时间戳不小于 `floor` 的最新空闲槽位
    ///
    /// 比较用 `>=`，时间戳相同时链表中靠后的槽位胜出。
    pub fn best_free(&self, floor: u64) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for (pos, meta) in self.slots.iter().enumerate() {
            let threshold = best.map_or(floor, |c| c.last_free);
            if meta.is_free() && meta.last_free >= threshold {
                best = Some(Candidate {
                    pos,
                    last_free: meta.last_free,
                });
            }
        }
        best
    }

    /// 从链表中摘下
    pub fn unlink(&mut self, pos: usize) -> Option<SlotMeta> {
        self.slots.remove(pos)
    }

    /// 挂到表头
    pub fn link_front(&mut self, meta: SlotMeta) {
        self.slots.push_front(meta);
    }

    /// 挂到表尾，仅在初始化时使用，保持槽位原有顺序
    pub fn link_back(&mut self, meta: SlotMeta) {
        self.slots.push_back(meta);
    }
}
