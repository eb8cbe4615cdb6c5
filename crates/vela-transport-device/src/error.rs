//! 设备后端的稳定操作码。

pub(crate) const OPEN: &str = "device.open";
pub(crate) const SEND: &str = "device.send";
pub(crate) const RECV: &str = "device.recv";
