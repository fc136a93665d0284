//! 块设备抽象
//!
//! block/device.rs 定义块设备接口，缓存通过它做同步的块传输
//! block/lock.rs 提供槽位内容锁（阻塞式，可跨设备 I/O 持有）
//! block/handle.rs 提供 RAII 风格的块句柄，drop 时自动 brelse
//! block/io.rs 提供 bread 以及基于它的字节读写便捷接口

mod device;
mod handle;
mod io;
mod lock;

#[cfg(test)]
pub(crate) mod mock;

pub use device::BlockDevice;
pub use handle::{Block, BlockRef};
pub use lock::{ContentGuard, ContentLock};
