use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use vela_transport::{HwAddr, RecvMode, Transport, TransportError, TransportKind};

use crate::error as op;
use crate::filter::source_mac_filter;
use crate::frame::{ETH_FRAME_CAPACITY, FrameTemplate, strip_header};
use crate::sys;

/// 链路层端点配置。
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// 捕获与发送所绑定的网络接口名（如 `eth1`）。
    pub interface: String,
    /// 对端硬件地址：既是出站帧的目的地址，也是入站滤镜的匹配条件。
    pub peer: HwAddr,
    /// 帧协议字段（以太类型），按主机序给出。
    pub ethertype: u16,
}

/// 链路层裸帧通道。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 让控制器层像操作字节流一样操作以太网直连硬件：帧头构造、内核
///   过滤与混杂捕获全部折叠进 `open`，收发只暴露负载区。
///
/// ## 逻辑 (How)
/// - `open` 单次调用内依序完成：本地硬件地址解析 → 缓冲区放大 →
///   源地址 BPF 滤镜安装 → 接口绑定 → 混杂成员开启 → 出站模板预构建；
///   任一步失败立即携带该步骤的操作码出层，已建的套接字随作用域关闭；
/// - `send` 把负载写入模板负载区并补零至 60 字节最小帧，返回逻辑
///   （未补齐）长度；
/// - `recv` 整帧读入暂存区后剥离 14 字节帧头，只拷贝负载给调用方；
///   短于帧头的残帧被静默丢弃并继续等待下一帧。
///
/// ## 契约 (What)
/// - 补齐字节对接收方不可见：调用方按协议自身的报文长度收取（`Exact`
///   模式的缓冲区长度即逻辑长度），超出部分不进入缓冲区；
/// - 单帧负载超过调用方缓冲区时，多余字节按帧语义丢弃（本层不缓冲
///   应用负载）。
///
/// ## 注意事项 (Trade-offs)
/// - `Exact` 模式跨帧拼接时假设协议按帧对齐报文；混用补齐帧与跨帧
///   报文的协议应使用 `Available` 模式自行切分。
#[derive(Debug)]
pub struct LinkChannel {
    config: LinkConfig,
    fd: Option<OwnedFd>,
    template: Option<FrameTemplate>,
}

impl LinkChannel {
    /// 以给定配置创建空通道（尚无句柄）。
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            fd: None,
            template: None,
        }
    }

    /// 返回通道配置。
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn release_handle(&mut self) {
        if let Some(fd) = self.fd.take() {
            tracing::debug!(
                fd = fd.as_raw_fd(),
                interface = %self.config.interface,
                "link channel handle released"
            );
        }
        self.template = None;
    }

    /// 读入一帧并把负载拷贝到 `buf`，返回拷贝的字节数。
    fn recv_frame(fd: &OwnedFd, buf: &mut [u8]) -> io::Result<usize> {
        let mut scratch = [0u8; ETH_FRAME_CAPACITY];
        loop {
            match nix::unistd::read(fd.as_raw_fd(), &mut scratch) {
                Ok(0) => return Ok(0),
                Ok(n) => match strip_header(&scratch[..n]) {
                    Some(payload) => {
                        let copied = payload.len().min(buf.len());
                        buf[..copied].copy_from_slice(&payload[..copied]);
                        return Ok(copied);
                    }
                    None => {
                        tracing::warn!(len = n, "runt frame discarded");
                        continue;
                    }
                },
                Err(Errno::EINTR | Errno::EAGAIN) => continue,
                Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32)),
            }
        }
    }
}

impl Transport for LinkChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Link
    }

    fn handle(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd())
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.fd.is_some() {
            tracing::warn!(
                interface = %self.config.interface,
                "re-opening link channel with a live handle"
            );
            self.close();
        }

        let local = sys::resolve_local_hwaddr(&self.config.interface)?;
        let ifindex = sys::interface_index(&self.config.interface)?;
        let fd = sys::open_packet_socket(self.config.ethertype)?;
        sys::enlarge_buffers(&fd)?;
        let prog = source_mac_filter(self.config.peer);
        sys::attach_source_filter(&fd, &prog)?;
        sys::bind_to_interface(&fd, ifindex, self.config.ethertype)?;
        sys::enable_promiscuous(&fd, ifindex)?;

        tracing::info!(
            fd = fd.as_raw_fd(),
            interface = %self.config.interface,
            peer = %self.config.peer,
            local = %local,
            ethertype = format_args!("{:#06x}", self.config.ethertype),
            "link channel opened"
        );
        self.template = Some(FrameTemplate::new(
            self.config.peer,
            local,
            self.config.ethertype,
        ));
        self.fd = Some(fd);
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let outcome = match (&self.fd, &self.template) {
            (Some(fd), Some(template)) => send_frame(fd, template, buf),
            _ => return Err(TransportError::not_open(op::SEND)),
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
        let outcome = match &self.fd {
            Some(fd) => match mode {
                RecvMode::Available => Self::recv_frame(fd, buf),
                RecvMode::Exact => {
                    let mut filled = 0;
                    loop {
                        if filled == buf.len() {
                            break Ok(filled);
                        }
                        match Self::recv_frame(fd, &mut buf[filled..]) {
                            Ok(0) => break Ok(0),
                            Ok(n) => filled += n,
                            Err(err) => break Err(err),
                        }
                    }
                }
            },
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

/// 组帧并整帧写出，返回逻辑负载长度。
///
/// 链路层写出不可分割：出现部分写视为致命错误而非重试点，否则残余
/// 字节会被当作独立帧发出。
fn send_frame(fd: &OwnedFd, template: &FrameTemplate, payload: &[u8]) -> io::Result<usize> {
    let frame = template.frame_for(payload);
    loop {
        match nix::unistd::write(fd, &frame) {
            Ok(n) if n == frame.len() => return Ok(payload.len()),
            Ok(n) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("truncated frame write: {n} of {} bytes", frame.len()),
                ));
            }
            Err(Errno::EINTR | Errno::EAGAIN) => continue,
            Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32)),
        }
    }
}

impl Drop for LinkChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LinkConfig {
        LinkConfig {
            interface: "eth-test".to_owned(),
            peer: "02:00:00:00:00:02".parse().expect("peer"),
            ethertype: 0x88b5,
        }
    }

    /// 无句柄时的收发是响亮的契约违例。
    #[test]
    fn use_without_handle_is_loud() {
        let mut channel = LinkChannel::new(config());
        assert!(matches!(
            channel.send(b"x"),
            Err(TransportError::NotOpen { op: "link.send" })
        ));
        let mut buf = [0u8; 4];
        assert!(matches!(
            channel.recv(&mut buf, RecvMode::Available),
            Err(TransportError::NotOpen { op: "link.recv" })
        ));
    }

    /// 未打开的通道重复关闭是无害空操作。
    #[test]
    fn close_is_idempotent_without_handle() {
        let mut channel = LinkChannel::new(config());
        channel.close();
        channel.close();
        assert!(!channel.is_open());
        assert_eq!(channel.kind(), TransportKind::Link);
    }

    /// 不存在的接口在解析阶段即失败，不会留下半开句柄。
    #[test]
    fn open_on_missing_interface_fails_cleanly() {
        let mut channel = LinkChannel::new(LinkConfig {
            interface: "vela-no-such-if".to_owned(),
            ..config()
        });
        assert!(channel.open().is_err());
        assert!(!channel.is_open());
    }
}
