//! 规范化事件模型与外部工作队列的协作边界。

use std::collections::VecDeque;

/// 端口身份：轻量、可拷贝，由分发表在创建 [`Port`](crate::Port) 时
/// 分配，进程内单调递增、从不复用。
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PortId(u64);

impl PortId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// 暴露原始编号，便于日志与消费方建立索引。
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// 事件类别。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventKind {
    /// 端口句柄上有排队数据可读。
    DataAvailable,
    /// 对端关闭：就绪但零字节排队。
    Disconnected,
}

/// 不可变事件值：由分发器产出，被外部工作队列恰好消费一次。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub port: PortId,
}

/// 外部工作队列的接入点（协作者，本层不实现队列本身）。
///
/// # 教案级注释
/// - **意图 (Why)**：分发器只负责产出规范化事件，执行应用逻辑的调度
///   器在工作区之外；该 trait 是两者之间唯一的缝合面。
/// - **契约 (What)**：
///   - 同端口事件按产出顺序入队（FIFO），跨端口顺序不作保证；
///   - 端口关闭前已入队的事件仍会被投递，消费方必须把「指向已关闭
///     端口的事件」当作正常情况空操作处理，而非错误；
///   - `push` 在 `poll_once` 的调用栈内同步执行，实现方可以在回调中
///     注册/注销端口（受快照规则保护），但不应执行长阻塞工作。
pub trait EventSink {
    fn push(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn push(&mut self, event: Event) {
        Vec::push(self, event);
    }
}

impl EventSink for VecDeque<Event> {
    fn push(&mut self, event: Event) {
        self.push_back(event);
    }
}
