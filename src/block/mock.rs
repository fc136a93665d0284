//! 测试用内存块设备

use crate::block::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use crate::types::BlockKey;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// 内存块设备，未写过的块返回由键决定的固定内容
pub(crate) struct MockDevice {
    block_size: usize,
    storage: spin::Mutex<BTreeMap<BlockKey, Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    flushes: AtomicUsize,
    fail_reads: AtomicBool,
    read_delay: Option<Duration>,
}

impl MockDevice {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            storage: spin::Mutex::new(BTreeMap::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            read_delay: None,
        }
    }

    /// 每次读取前睡眠，拉长竞争窗口
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// 未写过的块的内容
    pub fn pattern(key: BlockKey, block_size: usize) -> Vec<u8> {
        (0..block_size)
            .map(|i| (key.device as usize * 31 + key.block_no as usize * 7 + i) as u8)
            .collect()
    }

    /// 成功读取的次数
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self, key: BlockKey) -> Option<Vec<u8>> {
        self.storage.lock().get(&key).cloned()
    }
}

impl BlockDevice for MockDevice {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Io, "injected read failure"));
        }
        match self.storage.lock().get(&key) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.copy_from_slice(&Self::pattern(key, self.block_size)),
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()> {
        self.storage.lock().insert(key, buf.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
