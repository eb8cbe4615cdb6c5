use std::io::{self, Read};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, Socket, Type};
use vela_transport::error::{is_disconnect, is_transient};
use vela_transport::{RecvMode, Transport, TransportError, TransportKind};

use crate::connect::{ConnectMachine, ConnectProgress, ConnectState};
use crate::error as op;

/// 流式端点的协议变体。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamKind {
    Tcp,
    Udp,
}

/// 流式端点配置。
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamConfig {
    /// 目标地址。建连尝试始终指向该地址。
    pub addr: SocketAddr,
    /// TCP 或 UDP。
    pub kind: StreamKind,
}

/// 非阻塞流式通道。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 为上层控制器提供对单个 TCP/UDP 端点的直接控制，同时把部分写、
///   瞬态重试与断连判别收敛在通道内部；
/// - 建连进度由内嵌的 [`ConnectMachine`] 驱动，调用方按定时器反复调用
///   [`attempt_connect`](StreamChannel::attempt_connect) 直至终态。
///
/// ## 逻辑 (How)
/// - `open` 仅分配非阻塞套接字，不发起连接；句柄存活时再次 `open`
///   会先关闭旧句柄（单句柄不变量）；
/// - `send` 循环写出直至全部字节落盘或检测到断连；`recv` 按
///   [`RecvMode`] 决定是否读满缓冲区；
/// - 致命 I/O 错误在返回前释放句柄，调用方无需补救性 `close`。
///
/// ## 契约 (What)
/// - `Ok(0)` 统一表示对端有序关闭或连接被重置；
/// - 无句柄时调用收发接口返回 [`TransportError::NotOpen`]；
/// - `close` 幂等。
#[derive(Debug)]
pub struct StreamChannel {
    config: StreamConfig,
    socket: Option<Socket>,
    machine: ConnectMachine,
}

impl StreamChannel {
    /// 以给定配置创建空通道（尚无句柄）。
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            socket: None,
            machine: ConnectMachine::default(),
        }
    }

    /// 返回通道配置。
    pub fn config(&self) -> StreamConfig {
        self.config
    }

    /// 返回建连状态机的当前状态。
    pub fn connect_state(&self) -> ConnectState {
        self.machine.state()
    }

    /// 推进一次建连尝试。
    ///
    /// 语义见 [`ConnectMachine::attempt`]：`Idle` 发起非阻塞 connect，
    /// `Connecting` 做零超时可写性检查并以 `SO_ERROR` 为权威判据。
    /// 返回 `Err` 时句柄已释放，状态机停留在 `Failed`；重试需先重新
    /// `open`。
    pub fn attempt_connect(&mut self) -> Result<ConnectProgress, TransportError> {
        let target = self.config.addr;
        let outcome = match self.socket.as_ref() {
            Some(sock) => self.machine.attempt(sock, target),
            None => return Err(TransportError::not_open(op::CONNECT)),
        };
        if outcome.is_err() {
            self.release_handle();
        }
        outcome
    }

    /// 释放句柄但保留状态机终态，供失败路径复用。
    fn release_handle(&mut self) {
        if let Some(sock) = self.socket.take() {
            tracing::debug!(
                fd = sock.as_raw_fd(),
                addr = %self.config.addr,
                "stream channel handle released"
            );
        }
        self.machine.on_handle_released();
    }
}

impl Transport for StreamChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn handle(&self) -> Option<RawFd> {
        self.socket.as_ref().map(|s| s.as_raw_fd())
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.socket.is_some() {
            tracing::warn!(addr = %self.config.addr, "re-opening stream channel with a live handle");
            self.close();
        }
        let domain = Domain::for_address(self.config.addr);
        let (ty, proto) = match self.config.kind {
            StreamKind::Tcp => (Type::STREAM, Protocol::TCP),
            StreamKind::Udp => (Type::DGRAM, Protocol::UDP),
        };
        let sock = Socket::new(domain, ty, Some(proto))
            .map_err(|err| TransportError::io(op::OPEN, err))?;
        sock.set_nonblocking(true)
            .map_err(|err| TransportError::io(op::OPEN, err))?;
        tracing::debug!(
            fd = sock.as_raw_fd(),
            addr = %self.config.addr,
            kind = ?self.config.kind,
            "stream channel opened"
        );
        self.socket = Some(sock);
        self.machine = ConnectMachine::default();
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let outcome = match self.socket.as_ref() {
            Some(sock) => send_all(sock, buf),
            None => return Err(TransportError::not_open(op::SEND)),
        };
        match outcome {
            Ok(n) => Ok(n),
            Err(err) => {
                self.release_handle();
                Err(TransportError::io(op::SEND, err))
            }
        }
    }

    fn recv(&mut self, buf: &mut [u8], mode: RecvMode) -> Result<usize, TransportError> {
        let outcome = match self.socket.as_ref() {
            Some(sock) => recv_into(sock, buf, mode),
            None => return Err(TransportError::not_open(op::RECV)),
        };
        match outcome {
            Ok(n) => Ok(n),
            Err(err) => {
                self.release_handle();
                Err(TransportError::io(op::RECV, err))
            }
        }
    }

    fn close(&mut self) {
        self.release_handle();
    }
}

/// 循环写出整个缓冲区。
///
/// 瞬态失败原地重试；写出 0 字节或复位族错误折算为 `Ok(0)`（对端已
/// 关闭）；其余错误原样上抛，由调用方释放句柄并包装操作码。
fn send_all(sock: &Socket, buf: &[u8]) -> io::Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    let mut written = 0;
    while written < buf.len() {
        match sock.send(&buf[written..]) {
            Ok(0) => return Ok(0),
            Ok(n) => written += n,
            Err(err) if is_transient(&err) => continue,
            Err(err) if is_disconnect(&err) => return Ok(0),
            Err(err) => return Err(err),
        }
    }
    Ok(written)
}

/// 按收取语义读入缓冲区，重试策略与 [`send_all`] 对称。
///
/// `Exact` 模式在读满前检测到对端关闭时返回 `Ok(0)`：契约以「对端已
/// 关闭」为准，缓冲区内的残余字节不计入结果。
fn recv_into(sock: &Socket, buf: &mut [u8], mode: RecvMode) -> io::Result<usize> {
    let mut reader = sock;
    match mode {
        RecvMode::Available => loop {
            match reader.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if is_transient(&err) => continue,
                Err(err) if is_disconnect(&err) => return Ok(0),
                Err(err) => return Err(err),
            }
        },
        RecvMode::Exact => {
            let mut filled = 0;
            while filled < buf.len() {
                match reader.read(&mut buf[filled..]) {
                    Ok(0) => return Ok(0),
                    Ok(n) => filled += n,
                    Err(err) if is_transient(&err) => continue,
                    Err(err) if is_disconnect(&err) => return Ok(0),
                    Err(err) => return Err(err),
                }
            }
            Ok(filled)
        }
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        self.close();
    }
}
