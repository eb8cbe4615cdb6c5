//! 有界就绪轮询与事件产出。

use std::os::fd::BorrowedFd;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::events::{Event, EventKind, EventSink};
use crate::table::DispatchTable;

/// 默认轮询超时：只约束分发延迟，不是收发操作的截止时间。
const DEFAULT_POLL_TIMEOUT_MS: u16 = 10;

nix::ioctl_read_bad!(fionread, libc::FIONREAD, libc::c_int);

/// 单线程协作式分发器。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 宿主进程的协作式主循环反复调用 [`poll_once`](Dispatcher::poll_once)，
///   以一次有界的 `poll(2)` 覆盖全部已注册句柄，把就绪结果规范化为
///   [`Event`] 交给外部工作队列；
/// - 分发器从不长于超时阻塞，也绝不替端点收发应用负载。
///
/// ## 逻辑 (How)
/// - 入口处快照分发表（注销/注册发生在回调中也不影响本轮）；
/// - 就绪句柄以 FIONREAD 询问排队字节数：零字节 ⇒ 对端关闭
///   （`Disconnected`），非零 ⇒ `DataAvailable`；
/// - `poll(2)` 自身失败降级为仅记日志的空轮（EINTR 同样按空轮处理），
///   事件产出为零，复用器整体继续运转。
///
/// ## 契约 (What)
/// - 返回值为本轮产出的事件数；
/// - 只为分发器自己注册过的句柄产出事件；
/// - 同端口事件跨轮 FIFO，跨端口顺序不作保证。
#[derive(Debug)]
pub struct Dispatcher {
    table: DispatchTable,
    timeout_ms: u16,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            table: DispatchTable::new(),
            timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
        }
    }

    /// 调整轮询超时（毫秒）。主要供测试压缩等待时间。
    pub fn with_poll_timeout(mut self, timeout_ms: u16) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// 克隆分发表句柄，交给新建的 [`Port`](crate::Port) 持有。
    pub fn table(&self) -> DispatchTable {
        self.table.clone()
    }

    /// 执行一轮有界就绪检查，返回产出的事件数。
    pub fn poll_once(&self, sink: &mut dyn EventSink) -> usize {
        let snapshot = self.table.snapshot();
        if snapshot.is_empty() {
            return 0;
        }

        let mut fds: Vec<PollFd> = snapshot
            .iter()
            // 表项来自仍存活的注册句柄：Port 在释放句柄前先注销。
            .map(|(fd, _)| PollFd::new(unsafe { BorrowedFd::borrow_raw(*fd) }, PollFlags::POLLIN))
            .collect();

        match poll(&mut fds, PollTimeout::from(self.timeout_ms)) {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(Errno::EINTR) => {
                tracing::trace!("readiness poll interrupted; empty pass");
                return 0;
            }
            Err(errno) => {
                tracing::warn!(error = %errno, "readiness poll failed; skipping this pass");
                return 0;
            }
        }

        let ready: Vec<PollFlags> = fds
            .iter()
            .map(|pfd| pfd.revents().unwrap_or(PollFlags::empty()))
            .collect();
        drop(fds);

        let mut emitted = 0;
        for ((fd, port), revents) in snapshot.into_iter().zip(ready) {
            if revents.contains(PollFlags::POLLNVAL) {
                tracing::warn!(fd, port = port.raw(), "stale handle in dispatch table");
                continue;
            }
            if !revents.intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP) {
                continue;
            }
            let queued = queued_bytes(fd).unwrap_or_else(|errno| {
                tracing::warn!(fd, error = %errno, "FIONREAD failed; treating as disconnect");
                0
            });
            let kind = if queued == 0 {
                EventKind::Disconnected
            } else {
                EventKind::DataAvailable
            };
            tracing::trace!(fd, port = port.raw(), queued, ?kind, "event emitted");
            sink.push(Event { kind, port });
            emitted += 1;
        }
        emitted
    }
}

/// 询问句柄上排队待读的字节数。
fn queued_bytes(fd: std::os::fd::RawFd) -> Result<usize, Errno> {
    let mut count: libc::c_int = 0;
    // 只读查询，句柄由快照保证在本轮内有效。
    unsafe { fionread(fd, &mut count) }?;
    Ok(count.max(0) as usize)
}
