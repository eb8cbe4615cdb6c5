#![doc = r#"
# vela-transport-stream

## 设计动机（Why）
- **定位**：提供 `vela-transport` 能力集在流式套接字（TCP/UDP）上的
  实现，句柄全程工作在非阻塞模式。
- **架构角色**：作为控制器层与 OS 套接字之间的唯一通道，收敛部分写、
  瞬态错误重试与「对端关闭 vs. 致命错误」的判别逻辑。
- **设计理念**：建连被建模为显式状态机 [`ConnectMachine`]——控制器按
  定时器反复驱动 `attempt_connect`，任何一次调用都不会阻塞线程。

## 核心契约（What）
- **输入条件**：调用方提供 [`StreamConfig`]（目标地址与 TCP/UDP 变体）；
- **输出保障**：`send`/`recv` 以 `Ok(0)` 表示对端有序关闭或连接重置；
  瞬态失败在内部重试，绝不外泄；致命错误返回前句柄已释放；
- **前置约束**：同一通道同一时刻至多一次在途建连尝试（由上层 Port
  的不可重入约定保证）。

## 实现策略（How）
- **套接字层**：使用 `socket2` 创建并操作非阻塞套接字；
- **建连轮询**：`Connecting` 态通过零超时的 `poll(2)` 可写性检查推进，
  可写后以 `SO_ERROR` 为权威判据——可写本身不代表建连成功；
- **收取语义**：`RecvMode::Exact` 循环读满缓冲区，`RecvMode::Available`
  单次返回当前可得数据。
"#]

mod channel;
mod connect;
mod error;

pub use channel::{StreamChannel, StreamConfig, StreamKind};
pub use connect::{ConnectMachine, ConnectProgress, ConnectState};
