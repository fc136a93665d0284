//! 块读写接口
//!
//! `bread` 在 `bget` 之上补上设备读取；写入见 [`Block::bwrite`]。

use crate::block::{Block, BlockDevice};
use crate::cache::BufferCache;
use crate::clock::TickSource;
use crate::error::Result;

impl<D: BlockDevice, C: TickSource> BufferCache<D, C> {
    /// 返回已加锁、数据有效的块
    ///
    /// 槽位刚被分配给这个块时从设备读取一次；之后的 `bread` 不再访问设备。
    ///
    /// # 错误
    ///
    /// 设备读取失败时返回错误，块随之释放，数据保持无效，下次 `bread` 会重新读取。
    ///
    /// # Panics
    ///
    /// 缓存耗尽时 panic，见 [`BufferCache::bget`]。
    pub fn bread(&self, device: u32, block_no: u32) -> Result<Block<'_, D, C>> {
        let mut block = self.bget(device, block_no);
        if !block.is_valid() {
            block.fill()?;
        }
        Ok(block)
    }

    /// 读取一块并复制到 `buf`，随即释放
    ///
    /// 复制 `min(buf.len(), block_size)` 字节，返回复制的字节数。
    pub fn read_into(&self, device: u32, block_no: u32, buf: &mut [u8]) -> Result<usize> {
        let block = self.bread(device, block_no)?;
        let len = buf.len().min(block.data().len());
        buf[..len].copy_from_slice(&block.data()[..len]);
        Ok(len)
    }

    /// 把 `data` 写入块的开头并立即写到设备
    ///
    /// 块的其余部分保持原有内容，返回写入的字节数。
    pub fn write_from(&self, device: u32, block_no: u32, data: &[u8]) -> Result<usize> {
        let mut block = self.bread(device, block_no)?;
        let len = data.len().min(block.data().len());
        block.data_mut()[..len].copy_from_slice(&data[..len]);
        block.bwrite()?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use crate::block::mock::MockDevice;
    use crate::cache::BufferCache;
    use crate::error::ErrorKind;
    use crate::types::{BlockKey, CacheConfig};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn cache(device: MockDevice) -> BufferCache<MockDevice> {
        BufferCache::new(CacheConfig::new(3, 6), device).unwrap()
    }

    #[test]
    fn test_bread_reads_once() {
        let cache = cache(MockDevice::new(64));

        let block = cache.bread(1, 8).unwrap();
        assert!(block.is_valid());
        assert_eq!(block.data(), MockDevice::pattern(BlockKey::new(1, 8), 64).as_slice());
        drop(block);

        for _ in 0..5 {
            let block = cache.bread(1, 8).unwrap();
            assert!(block.is_valid());
        }
        assert_eq!(cache.device().reads(), 1);
        assert_eq!(cache.stats().device_reads, 1);
    }

    #[test]
    fn test_bread_rereads_after_eviction() {
        let cache = BufferCache::new(CacheConfig::new(1, 1), MockDevice::new(64)).unwrap();

        drop(cache.bread(1, 1).unwrap());
        drop(cache.bread(1, 2).unwrap());
        let block = cache.bread(1, 1).unwrap();
        assert_eq!(block.data(), MockDevice::pattern(BlockKey::new(1, 1), 64).as_slice());
        assert_eq!(cache.device().reads(), 3);
    }

    #[test]
    fn test_written_data_survives_eviction() {
        let cache = BufferCache::new(CacheConfig::new(1, 1), MockDevice::new(64)).unwrap();

        assert_eq!(cache.write_from(3, 3, b"hello").unwrap(), 5);
        drop(cache.bread(3, 4).unwrap());

        let mut buf = [0u8; 5];
        assert_eq!(cache.read_into(3, 3, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_read_error_releases_block() {
        let cache = cache(MockDevice::new(64));
        cache.device().fail_reads(true);

        let err = cache.bread(1, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(cache.ref_count(1, 2), Some(0));

        // 设备恢复后重新读取
        cache.device().fail_reads(false);
        let block = cache.bread(1, 2).unwrap();
        assert!(block.is_valid());
        assert_eq!(cache.device().reads(), 1);
    }

    #[test]
    fn test_concurrent_bread_fills_once() {
        const THREADS: usize = 2;
        let device = MockDevice::new(64).with_read_delay(Duration::from_millis(20));
        let cache = cache(device);
        let barrier = Barrier::new(THREADS);

        let results: Vec<(bool, Vec<u8>)> = thread::scope(|s| {
            let (cache, barrier) = (&cache, &barrier);
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        let block = cache.bread(2, 5).unwrap();
                        (block.is_valid(), block.data().to_vec())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.device().reads(), 1);
        for (valid, data) in &results {
            assert!(valid);
            assert_eq!(data, &results[0].1);
        }
        assert_eq!(cache.cached_keys(), [BlockKey::new(2, 5)]);
    }

    #[test]
    fn test_many_threads_fill_once_per_key() {
        const THREADS: usize = 5;
        let device = MockDevice::new(64).with_read_delay(Duration::from_millis(5));
        let cache = BufferCache::new(CacheConfig::new(3, 12), device).unwrap();
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    for blk in 0..3 {
                        let block = cache.bread(7, blk).unwrap();
                        assert_eq!(
                            block.data(),
                            MockDevice::pattern(BlockKey::new(7, blk), 64).as_slice()
                        );
                    }
                });
            }
        });

        assert_eq!(cache.device().reads(), 3);
        assert_eq!(cache.linked_slots(), 12);
    }
}
