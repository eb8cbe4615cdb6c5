//! 句柄到端口的分发表。

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::os::fd::RawFd;
use std::rc::Rc;

use crate::events::PortId;

#[derive(Debug, Default)]
struct TableInner {
    entries: BTreeMap<RawFd, PortId>,
    next_port: u64,
}

/// 可克隆的分发表句柄。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 不设进程级单例：分发表由 [`Dispatcher`](crate::Dispatcher)
///   创建并持有，每个 [`Port`](crate::Port) 克隆一份句柄用于随生命周期
///   注册/注销，所有权清晰、无隐式全局状态；
/// - 单线程协作式执行下以 `Rc<RefCell<..>>` 共享，无需锁。
///
/// ## 契约 (What)
/// - `register`：同一句柄已在表中时为空操作（带告警日志）；
/// - `deregister`：句柄不在表中时为空操作；
/// - 不变量：表项集合 == 已注册且仍存活的句柄集合，无重复；
/// - `snapshot` 供 `poll_once` 在入口处取走当轮工作集，使回调中的表
///   变更不影响进行中的轮询。
#[derive(Clone, Debug, Default)]
pub struct DispatchTable {
    inner: Rc<RefCell<TableInner>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为新端口分配身份。
    pub(crate) fn allocate_port_id(&self) -> PortId {
        let mut inner = self.inner.borrow_mut();
        let id = PortId::new(inner.next_port);
        inner.next_port += 1;
        id
    }

    /// 把存活句柄纳入轮询集合。
    pub fn register(&self, fd: RawFd, port: PortId) {
        let mut inner = self.inner.borrow_mut();
        match inner.entries.get(&fd) {
            Some(owner) if *owner == port => {
                tracing::debug!(fd, port = port.raw(), "handle already registered");
            }
            Some(owner) => {
                tracing::warn!(
                    fd,
                    port = port.raw(),
                    owner = owner.raw(),
                    "handle registered to another port; keeping existing entry"
                );
            }
            None => {
                inner.entries.insert(fd, port);
                tracing::debug!(fd, port = port.raw(), "handle registered");
            }
        }
    }

    /// 把句柄移出轮询集合。
    pub fn deregister(&self, fd: RawFd) {
        if self.inner.borrow_mut().entries.remove(&fd).is_some() {
            tracing::debug!(fd, "handle deregistered");
        }
    }

    /// 查询句柄是否已注册。
    pub fn contains(&self, fd: RawFd) -> bool {
        self.inner.borrow().entries.contains_key(&fd)
    }

    /// 当前表项数量。
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取走当轮工作集快照。
    pub(crate) fn snapshot(&self) -> Vec<(RawFd, PortId)> {
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|(fd, port)| (*fd, *port))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 任意注册/注销序列后，快照恰为当前注册集合。
    #[test]
    fn snapshot_tracks_register_deregister_sequences() {
        let table = DispatchTable::new();
        let a = table.allocate_port_id();
        let b = table.allocate_port_id();
        assert_ne!(a, b);

        table.register(3, a);
        table.register(5, b);
        table.register(3, a); // 重复注册：空操作
        assert_eq!(table.len(), 2);

        table.deregister(4); // 未注册：空操作
        assert_eq!(table.len(), 2);

        table.deregister(3);
        assert!(!table.contains(3));
        assert_eq!(table.snapshot(), vec![(5, b)]);

        table.deregister(5);
        assert!(table.is_empty());
    }

    /// 同一句柄不会被第二个端口抢占。
    #[test]
    fn conflicting_registration_keeps_existing_owner() {
        let table = DispatchTable::new();
        let a = table.allocate_port_id();
        let b = table.allocate_port_id();

        table.register(7, a);
        table.register(7, b);
        assert_eq!(table.snapshot(), vec![(7, a)]);
    }
}
