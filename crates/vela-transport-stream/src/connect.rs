use std::io;
use std::net::SocketAddr;
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socket2::{SockAddr, Socket};
use vela_transport::TransportError;

use crate::error as op;

/// 建连状态机的对外可见状态。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectState {
    /// 尚未发起连接。
    Idle,
    /// 非阻塞 connect 在途，等待后续轮询。
    Connecting,
    /// 建连完成，句柄可注册、可收发。
    Established,
    /// 建连失败，句柄已释放；重试需重新 `open`。
    Failed,
}

/// 单次 `attempt` 的推进结果。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectProgress {
    /// 已到达 `Established`。
    Established,
    /// 仍在等待，调用方应稍后重试。
    Pending,
}

/// 在途建连的瞬态记录。
///
/// 生命周期与一次建连尝试严格绑定：进入 `Connecting` 时创建，到达
/// 终态即被丢弃，绝不跨句柄存续。`announced` 区分首次进入轮询与
/// 后续轮询，用于只在首轮打一条进度日志。
#[derive(Debug)]
struct PendingConnect {
    target: SocketAddr,
    announced: bool,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Connecting(PendingConnect),
    Established,
    Failed,
}

/// 非阻塞建连状态机：`Idle → Connecting → Established`，两个活跃态均可
/// 跌入 `Failed`。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 把「connect 立即完成 / EINPROGRESS / 轮询推进 / SO_ERROR 判票」的
///   全部分支收敛为一个可反复驱动、永不阻塞的调用；
/// - 控制器按定时器调用 [`attempt`](ConnectMachine::attempt) 直至终态，
///   期间线程可继续服务其它端点。
///
/// ## 逻辑（How）
/// - `Idle`：发起非阻塞 connect；立即成功 ⇒ `Established`；OS 报告
///   在途（EINPROGRESS/EWOULDBLOCK）⇒ 记录目标地址进入 `Connecting`；
/// - `Connecting`：零超时 `poll(2)` 检查可写性；不可写 ⇒ 维持现状；
///   可写 ⇒ 查询 `SO_ERROR`——无错误才算成功，有错误则携带 errno 进入
///   `Failed`。部分内核在同时建连/错误竞态下会先报告可写，因此可写性
///   本身从不作为成功依据；
/// - 任一 OS 级失败都进入 `Failed`，由持有通道负责释放句柄。
///
/// ## 契约（What）
/// - 返回 `Ok(Pending)` 表示仍需驱动；`Ok(Established)` 为成功终态；
///   `Err(_)` 为失败终态且携带 OS 错误码；
/// - 终态后的再次 `attempt`：`Established` 幂等返回成功，`Failed`
///   返回错误提醒调用方先重新打开句柄。
#[derive(Debug, Default)]
pub struct ConnectMachine {
    phase: Phase,
}

impl ConnectMachine {
    /// 返回当前状态。
    pub fn state(&self) -> ConnectState {
        match self.phase {
            Phase::Idle => ConnectState::Idle,
            Phase::Connecting(_) => ConnectState::Connecting,
            Phase::Established => ConnectState::Established,
            Phase::Failed => ConnectState::Failed,
        }
    }

    /// 句柄被释放时的状态回收：在途/已建连的记录随句柄一并失效，
    /// 失败终态保留以便上层查询。
    pub(crate) fn on_handle_released(&mut self) {
        if !matches!(self.phase, Phase::Failed) {
            self.phase = Phase::Idle;
        }
    }

    /// 推进一次建连尝试。
    pub(crate) fn attempt(
        &mut self,
        sock: &Socket,
        target: SocketAddr,
    ) -> Result<ConnectProgress, TransportError> {
        match &mut self.phase {
            Phase::Established => Ok(ConnectProgress::Established),
            Phase::Failed => Err(TransportError::io(
                op::CONNECT,
                io::Error::new(
                    io::ErrorKind::NotConnected,
                    "previous connect attempt failed; reopen the channel first",
                ),
            )),
            Phase::Idle => self.first_attempt(sock, target),
            Phase::Connecting(_) => self.poll_progress(sock),
        }
    }

    fn first_attempt(
        &mut self,
        sock: &Socket,
        target: SocketAddr,
    ) -> Result<ConnectProgress, TransportError> {
        match sock.connect(&SockAddr::from(target)) {
            Ok(()) => {
                tracing::info!(%target, "connection established immediately");
                self.phase = Phase::Established;
                Ok(ConnectProgress::Established)
            }
            Err(err) if connect_in_progress(&err) => {
                self.phase = Phase::Connecting(PendingConnect {
                    target,
                    announced: false,
                });
                Ok(ConnectProgress::Pending)
            }
            Err(err) => {
                tracing::warn!(%target, error = %err, "connect failed on first attempt");
                self.phase = Phase::Failed;
                Err(TransportError::io(op::CONNECT, err))
            }
        }
    }

    fn poll_progress(&mut self, sock: &Socket) -> Result<ConnectProgress, TransportError> {
        let Phase::Connecting(pending) = &mut self.phase else {
            // attempt() 只在 Connecting 态转入此分支。
            return Ok(ConnectProgress::Pending);
        };
        let target = pending.target;

        let mut fds = [PollFd::new(sock.as_fd(), PollFlags::POLLOUT)];
        let ready = match poll(&mut fds, PollTimeout::ZERO) {
            Ok(n) => n,
            Err(Errno::EINTR) => return Ok(ConnectProgress::Pending),
            Err(errno) => {
                self.phase = Phase::Failed;
                return Err(TransportError::io(
                    op::CONNECT,
                    io::Error::from_raw_os_error(errno as i32),
                ));
            }
        };
        if ready == 0
            || !fds[0]
                .revents()
                .unwrap_or(PollFlags::empty())
                .intersects(PollFlags::POLLOUT | PollFlags::POLLERR | PollFlags::POLLHUP)
        {
            if !pending.announced {
                tracing::debug!(%target, "connect still in progress");
                pending.announced = true;
            }
            return Ok(ConnectProgress::Pending);
        }

        // 可写不等于成功：SO_ERROR 是唯一权威判据。
        match sock.take_error() {
            Ok(None) => {
                tracing::info!(%target, "connection established");
                self.phase = Phase::Established;
                Ok(ConnectProgress::Established)
            }
            Ok(Some(err)) => {
                tracing::warn!(%target, error = %err, "connect failed");
                self.phase = Phase::Failed;
                Err(TransportError::io(op::CONNECT, err))
            }
            Err(err) => {
                self.phase = Phase::Failed;
                Err(TransportError::io(op::CONNECT, err))
            }
        }
    }
}

/// OS 是否将该失败报告为「建连在途」。
fn connect_in_progress(err: &io::Error) -> bool {
    err.raw_os_error() == Some(Errno::EINPROGRESS as i32)
        || err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 状态机初始为 `Idle`，句柄释放不会抹掉失败终态。
    #[test]
    fn released_handle_preserves_failed_state() {
        let mut machine = ConnectMachine::default();
        assert_eq!(machine.state(), ConnectState::Idle);

        machine.phase = Phase::Failed;
        machine.on_handle_released();
        assert_eq!(machine.state(), ConnectState::Failed);

        machine.phase = Phase::Connecting(PendingConnect {
            target: "127.0.0.1:1".parse().expect("addr"),
            announced: false,
        });
        machine.on_handle_released();
        assert_eq!(machine.state(), ConnectState::Idle);
    }

    /// EINPROGRESS 与 WouldBlock 判为在途，其它 errno 不判。
    #[test]
    fn in_progress_classification() {
        assert!(connect_in_progress(&io::Error::from_raw_os_error(
            Errno::EINPROGRESS as i32
        )));
        assert!(connect_in_progress(&io::Error::from(
            io::ErrorKind::WouldBlock
        )));
        assert!(!connect_in_progress(&io::Error::from_raw_os_error(
            Errno::ECONNREFUSED as i32
        )));
    }
}
