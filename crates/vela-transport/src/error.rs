//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为三类后端与调度层提供集中式错误域，划分四档语义：瞬态
//!   （内部重试，不出层）、有序关闭（`Ok(0)` 正常结果）、致命 I/O
//!   （携带 OS 错误码出层）与契约违例（编程错误，响亮失败）；
//! - OS errno 原样保留在 `source` 中，供运维诊断直读。
//!
//! ## 设计要求（What）
//! - 所有变体实现 `thiserror::Error`，携带 `&'static str` 操作码
//!   （形如 `"stream.connect"`），由各后端 crate 的 `op` 常量表提供；
//! - 瞬态/断连的判别函数放在本模块，保证各后端口径一致。

use std::io;

use thiserror::Error;

/// 传输层统一错误域。
///
/// # 教案级注释
/// - **意图 (Why)**：聚合打开、收发、建连等关键路径的失败形态，使控制器
///   层能以 `?` 直接传播并按变体决定重试/放弃策略。
/// - **契约 (What)**：
///   - `Io`：致命 I/O 错误，`op` 为稳定操作码，`source` 保留原始
///     `io::Error`（含 errno）；实现方在返回该变体前必须已释放句柄；
///   - `NotOpen`：在无存活句柄时调用收发接口的契约违例；
///   - `HwAddrResolve`：链路端点无法解析接口本地硬件地址；
///   - `HwAddrParse`：硬件地址字面量非法。
/// - **权衡 (Trade-offs)**：操作码采用静态字符串而非枚举，换取跨 crate
///   扩展时零协调成本；代价是拼写错误只能靠测试约束。
#[derive(Debug, Error)]
pub enum TransportError {
    /// 致命 I/O 失败，OS 错误码经 `source` 原样透出。
    #[error("I/O failure during `{op}`: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// 在无存活句柄的端点上调用了收发接口。
    #[error("operation `{op}` requires an open handle")]
    NotOpen { op: &'static str },

    /// 指定网络接口未能解析出本地硬件地址。
    #[error("no hardware address found for interface `{interface}`")]
    HwAddrResolve { interface: String },

    /// 硬件地址字面量不符合 `aa:bb:cc:dd:ee:ff` 形式。
    #[error("invalid hardware address literal `{literal}`")]
    HwAddrParse { literal: String },
}

impl TransportError {
    /// 包装一次致命 I/O 失败。
    pub fn io(op: &'static str, source: io::Error) -> Self {
        TransportError::Io { op, source }
    }

    /// 构造契约违例错误并立即记录 error 级日志。
    ///
    /// 该变体意味着控制器层破坏了 Port/Transport 的生命周期约定，属于
    /// 编程错误，须在日志中响亮呈现而非静默传播。
    pub fn not_open(op: &'static str) -> Self {
        tracing::error!(op, "transport used without a live handle");
        TransportError::NotOpen { op }
    }

    /// 提取底层 OS 错误码（若有）。
    pub fn os_errno(&self) -> Option<i32> {
        match self {
            TransportError::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// 判断一次 I/O 失败是否为瞬态（中断/将阻塞），应在层内重试。
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// 判断一次 I/O 失败是否等价于对端断开，应折算为 `Ok(0)`。
///
/// 复位（ECONNRESET）、管道破裂（EPIPE）与中止（ECONNABORTED）均与
/// 零字节读写同样呈现为「对端已关闭」，与真正的致命错误区分开。
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
    )
}
