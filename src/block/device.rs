//! 块设备接口

use crate::error::Result;
use crate::types::BlockKey;

/// 块设备接口
///
/// 实现此 trait 以提供底层块传输。块缓存会在多个线程中同时调用它，
/// 因此所有方法都只取 `&self`，实现者自行处理内部同步。
///
/// 传输是同步的：返回时数据已经读入 `buf` 或已经写到设备。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockDevice, BlockKey, Result};
///
/// struct VirtioDisk {
///     // ...
/// }
///
/// impl BlockDevice for VirtioDisk {
///     fn block_size(&self) -> usize {
///         1024
///     }
///
///     fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()> {
///         // 从 key.device 的 key.block_no 读取一块
///         Ok(())
///     }
///
///     fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()> {
///         // 写入一块
///         Ok(())
///     }
/// }
/// ```
pub trait BlockDevice: Send + Sync {
    /// 块大小（字节），缓存中每个槽位的数据都是这个长度
    fn block_size(&self) -> usize;

    /// 读取一块
    ///
    /// # 参数
    ///
    /// * `key` - 设备号和块号
    /// * `buf` - 目标缓冲区，长度等于 `block_size()`
    fn read_block(&self, key: BlockKey, buf: &mut [u8]) -> Result<()>;

    /// 写入一块
    ///
    /// # 参数
    ///
    /// * `key` - 设备号和块号
    /// * `buf` - 源缓冲区，长度等于 `block_size()`
    fn write_block(&self, key: BlockKey, buf: &[u8]) -> Result<()>;

    /// 刷新设备自身的写缓存
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
