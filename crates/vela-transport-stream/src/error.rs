//! 流式后端的稳定操作码。
//!
//! 与 `TransportError::Io` 搭配使用，保证日志与告警中的失败环节可检索。

pub(crate) const OPEN: &str = "stream.open";
pub(crate) const CONNECT: &str = "stream.connect";
pub(crate) const SEND: &str = "stream.send";
pub(crate) const RECV: &str = "stream.recv";
