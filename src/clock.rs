//! 时间戳来源
//!
//! 块缓存用单调不减的计数值记录槽位"变为空闲"的时刻。

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 单调不减的计数器
pub trait TickSource: Send + Sync {
    /// 当前计数值
    fn now(&self) -> u64;
}

/// 基于 [`Instant`] 的时钟，计数单位为纳秒
///
/// 同一纳秒内释放的槽位时间戳相同，驱逐时按扫描顺序取靠后的那个。
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// 以当前时刻为零点创建时钟
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for MonotonicClock {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

/// 手动推进的计数器
///
/// 对应内核中由时钟中断递增的 `ticks`。
#[derive(Debug, Default)]
pub struct Ticks {
    value: AtomicU64,
}

impl Ticks {
    /// 从 0 开始计数
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// 推进一个 tick，返回推进后的值
    pub fn tick(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl TickSource for Ticks {
    fn now(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}
