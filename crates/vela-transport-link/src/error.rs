//! 链路后端的稳定操作码。

pub(crate) const OPEN: &str = "link.open";
pub(crate) const IFINDEX: &str = "link.ifindex";
pub(crate) const FILTER: &str = "link.filter";
pub(crate) const BIND: &str = "link.bind";
pub(crate) const PROMISC: &str = "link.promisc";
pub(crate) const BUFFER: &str = "link.buffer";
pub(crate) const SEND: &str = "link.send";
pub(crate) const RECV: &str = "link.recv";
