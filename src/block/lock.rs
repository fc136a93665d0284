//! 槽位内容锁
//!
//! 对应 xv6 的 sleeplock：可以在持有期间进行设备 I/O，
//! 等待者会被阻塞（挂起线程），而不是自旋。
//!
//! 与 shard 元数据使用的 `spin::Mutex` 是两层不同的锁，不能互相替代。

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// 阻塞式互斥锁，记录当前持有者
///
/// 相比 `std::sync::Mutex`，多了 [`ContentLock::holding`]，
/// 用于检查"调用者是否持有这把锁"的契约。
pub struct ContentLock<T> {
    inner: Mutex<T>,
    owner: spin::Mutex<Option<ThreadId>>,
}

/// [`ContentLock`] 的守卫，drop 时释放锁
pub struct ContentGuard<'a, T> {
    lock: &'a ContentLock<T>,
    guard: MutexGuard<'a, T>,
}

impl<T> ContentLock<T> {
    /// 创建内容锁
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            owner: spin::Mutex::new(None),
        }
    }

    /// 获取锁，可能阻塞
    ///
    /// 上一个持有者在持锁期间 panic 不会使锁失效：
    /// 内容的有效性由 `VALID` 标志表达，而不是由锁的中毒状态表达。
    pub fn lock(&self) -> ContentGuard<'_, T> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *self.owner.lock() = Some(thread::current().id());
        ContentGuard { lock: self, guard }
    }

    /// 当前线程是否持有这把锁
    pub fn holding(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }
}

impl<T> core::ops::Deref for ContentGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> core::ops::DerefMut for ContentGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for ContentGuard<'_, T> {
    fn drop(&mut self) {
        // 先清除持有者，随后 `guard` 字段被 drop，锁才真正释放
        *self.lock.owner.lock() = None;
    }
}

impl<T> core::fmt::Debug for ContentLock<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContentLock")
            .field("owner", &*self.owner.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_holding() {
        let lock = ContentLock::new(0u32);
        assert!(!lock.holding());

        let guard = lock.lock();
        assert!(lock.holding());

        // 其他线程看到的是"未持有"
        thread::scope(|s| {
            s.spawn(|| assert!(!lock.holding()));
        });

        drop(guard);
        assert!(!lock.holding());
    }

    #[test]
    fn test_lock_blocks_until_release() {
        let lock = ContentLock::new(0u32);
        let acquired = AtomicBool::new(false);

        let mut guard = lock.lock();
        thread::scope(|s| {
            s.spawn(|| {
                let value = lock.lock();
                acquired.store(true, Ordering::SeqCst);
                assert_eq!(*value, 42);
            });

            thread::sleep(Duration::from_millis(50));
            assert!(!acquired.load(Ordering::SeqCst));

            *guard = 42;
            drop(guard);
        });

        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_lock_survives_poison() {
        let lock = ContentLock::new(7u32);

        let result = thread::scope(|s| {
            s.spawn(|| {
                let _guard = lock.lock();
                panic!("holder died");
            })
            .join()
        });
        assert!(result.is_err());

        let guard = lock.lock();
        assert_eq!(*guard, 7);
        assert!(lock.holding());
    }
}
