//! 端口：应用可见的端点身份与注册不变量的唯一维护者。

use std::os::fd::RawFd;

use vela_transport::{RecvMode, Transport, TransportError, TransportKind};
use vela_transport_stream::{ConnectProgress, StreamChannel};

use crate::events::PortId;
use crate::table::DispatchTable;

/// 控制器层持有的端点句柄身份。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 把「端点名称 + 传输通道 + 分发表注册状态」捆绑为一个所有权清晰
///   的对象：Port 独占其通道，销毁时强制关闭并注销；
/// - 注册/注销只经由 Port 流动，分发表不变量因此只有一个维护者。
///
/// ## 契约 (What)
/// - 流式端点在建连到达 `Established` 时注册句柄；链路/设备端点在
///   `open` 成功时注册（流式 `open` 只分配套接字、尚未建连，过早注册
///   会把未建连句柄暴露给轮询）；
/// - `close` 幂等：先注销、后释放句柄；
/// - 不可重入：同一 Port 同一时刻至多一次在途建连尝试（由调用方的
///   驱动节奏保证，本类型不额外加锁）。
#[derive(Debug)]
pub struct Port<T: Transport> {
    id: PortId,
    name: String,
    transport: T,
    table: DispatchTable,
}

impl<T: Transport> Port<T> {
    /// 创建端口并向分发表申领身份。
    pub fn new(name: impl Into<String>, transport: T, table: DispatchTable) -> Self {
        let id = table.allocate_port_id();
        let name = name.into();
        tracing::debug!(port = id.raw(), name = %name, kind = transport.kind().as_str(), "port created");
        Self {
            id,
            name,
            transport,
            table,
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 访问底层通道（只读）。
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 打开底层通道；链路/设备端点随即注册句柄，流式端点留待建连完成。
    pub fn open(&mut self) -> Result<(), TransportError> {
        self.transport.open()?;
        if self.transport.kind() != TransportKind::Stream {
            self.enroll();
        }
        Ok(())
    }

    /// 把当前存活句柄纳入轮询集合（无句柄时为空操作）。
    fn enroll(&self) {
        if let Some(fd) = self.transport.handle() {
            self.table.register(fd, self.id);
        }
    }

    /// 发送；致命错误已由通道释放句柄，这里同步清理注册项。
    pub fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let fd = self.transport.handle();
        let outcome = self.transport.send(buf);
        self.sweep_on_error(fd, outcome.is_err());
        outcome
    }

    /// 接收；清理策略与 [`send`](Port::send) 对称。
    pub fn recv(&mut self, buf: &mut [u8], mode: RecvMode) -> Result<usize, TransportError> {
        let fd = self.transport.handle();
        let outcome = self.transport.recv(buf, mode);
        self.sweep_on_error(fd, outcome.is_err());
        outcome
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// 先注销、后释放句柄。幂等。
    pub fn close(&mut self) {
        if let Some(fd) = self.transport.handle() {
            self.table.deregister(fd);
        }
        self.transport.close();
    }

    fn sweep_on_error(&self, fd_before: Option<RawFd>, failed: bool) {
        if failed && let Some(fd) = fd_before {
            self.table.deregister(fd);
        }
    }
}

impl Port<StreamChannel> {
    /// 推进一次建连尝试，并在到达 `Established` 时注册句柄。
    ///
    /// 失败路径上通道已释放句柄，这里清理可能残留的注册项（例如此前
    /// 已建连、正在重建的端口），保证失败后分发表无残余。
    pub fn attempt_connect(&mut self) -> Result<ConnectProgress, TransportError> {
        let fd_before = self.transport.handle();
        match self.transport.attempt_connect() {
            Ok(ConnectProgress::Established) => {
                self.enroll();
                Ok(ConnectProgress::Established)
            }
            Ok(ConnectProgress::Pending) => Ok(ConnectProgress::Pending),
            Err(err) => {
                if let Some(fd) = fd_before {
                    self.table.deregister(fd);
                }
                Err(err)
            }
        }
    }
}

impl<T: Transport> Drop for Port<T> {
    fn drop(&mut self) {
        self.close();
    }
}
