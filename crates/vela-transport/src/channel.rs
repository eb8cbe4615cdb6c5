use std::os::fd::RawFd;

use crate::error::TransportError;

/// 传输端点的变体类别，用于日志与诊断输出。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportKind {
    /// 面向连接/报文的流式套接字（TCP/UDP）。
    Stream,
    /// 链路层裸帧端点（AF_PACKET）。
    Link,
    /// 字符设备端点。
    Device,
}

impl TransportKind {
    /// 返回可嵌入结构化日志字段的稳定名称。
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Stream => "stream",
            TransportKind::Link => "link",
            TransportKind::Device => "device",
        }
    }
}

/// 控制 `recv` 的收取语义。
///
/// - `Exact`：循环读取直至缓冲区填满；中途检测到对端关闭或致命错误则提前返回；
/// - `Available`：单次读取，返回当前可得的字节数。
///
/// 字符设备端点是约定的例外：设备假定不出现部分 I/O，两种模式均为
/// 单次透传读取。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecvMode {
    Exact,
    Available,
}

/// 统一的端点能力集：打开、发送、接收、关闭。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 让控制器层以一致方式操作三类物理通路，支撑上层有限状态机在不感知
///   OS 差异的情况下完成硬件占用/准备/释放等协议；
/// - 将瞬态错误（EINTR/EWOULDBLOCK）的重试策略收敛到实现内部，调用方只
///   面对「成功字节数 / 对端关闭 / 致命错误」三种结局。
///
/// ## 契约说明（What）
/// - 一个实现同一时刻至多持有一个存活句柄；`open` 在句柄存活时会先关闭
///   旧句柄再获取新句柄；
/// - `send`/`recv` 返回 `Ok(0)` 统一表示对端有序关闭或连接被重置，属于
///   正常结果而非错误路径；
/// - 致命 I/O 错误返回 [`TransportError::Io`]，实现须在返回前释放句柄；
/// - 在无存活句柄时调用 `send`/`recv` 属于契约违例，返回
///   [`TransportError::NotOpen`]（构造时伴随 error 级日志）；
/// - `close` 幂等且不失败，对已关闭端点重复调用是无害空操作。
///
/// ## 风险提示（Trade-offs）
/// - 重试瞬态错误没有截止时间，整体活性由进程级看门狗（工作区之外）兜底；
/// - 实现不得缓冲应用负载：`recv` 直接从 OS 队列读入调用方缓冲区。
pub trait Transport {
    /// 返回端点变体类别。
    fn kind(&self) -> TransportKind;

    /// 返回当前存活的 OS 句柄；无句柄时为 `None`。
    fn handle(&self) -> Option<RawFd>;

    /// 按实现自身的配置获取句柄。流式端点只分配非阻塞套接字而不发起
    /// 连接；链路端点在单次调用内完成滤镜安装、接口绑定与混杂开启；
    /// 设备端点以读写方式打开路径。
    fn open(&mut self) -> Result<(), TransportError>;

    /// 发送缓冲区内容，返回实际写出的逻辑字节数。
    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// 读取数据到缓冲区，收取语义由 `mode` 决定。
    fn recv(&mut self, buf: &mut [u8], mode: RecvMode) -> Result<usize, TransportError>;

    /// 释放句柄。幂等。
    fn close(&mut self);

    /// 判断端点当前是否持有存活句柄。
    fn is_open(&self) -> bool {
        self.handle().is_some()
    }
}
