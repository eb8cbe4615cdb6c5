use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use vela_transport::{RecvMode, Transport, TransportError, TransportKind};

use crate::error as op;

/// 字符设备端点配置。
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// 设备路径（如 `/dev/ttyS0`）。
    pub path: PathBuf,
}

/// 字符设备通道：网络端点语义下的本地设备。
///
/// `open` 直接映射为「按读写方式打开路径」（附带 O_NOCTTY，避免串口
/// 设备劫持控制终端）；`send`/`recv` 为单次透传调用，既不重试也不
/// 循环——设备假定不出现部分 I/O。读到 EOF 时 `recv` 返回 `Ok(0)`，
/// 与网络端点的「对端关闭」呈现一致。
#[derive(Debug)]
pub struct DeviceChannel {
    config: DeviceConfig,
    file: Option<File>,
}

impl DeviceChannel {
    /// 以给定配置创建空通道（尚无句柄）。
    pub fn new(config: DeviceConfig) -> Self {
        Self { config, file: None }
    }

    /// 返回通道配置。
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn release_handle(&mut self) {
        if let Some(file) = self.file.take() {
            tracing::debug!(
                fd = file.as_raw_fd(),
                path = %self.config.path.display(),
                "device channel handle released"
            );
        }
    }
}

impl Transport for DeviceChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Device
    }

    fn handle(&self) -> Option<RawFd> {
        self.file.as_ref().map(|f| f.as_raw_fd())
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.file.is_some() {
            tracing::warn!(
                path = %self.config.path.display(),
                "re-opening device channel with a live handle"
            );
            self.close();
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&self.config.path)
            .map_err(|err| TransportError::io(op::OPEN, err))?;
        tracing::debug!(
            fd = file.as_raw_fd(),
            path = %self.config.path.display(),
            "device channel opened"
        );
        self.file = Some(file);
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let outcome = match self.file.as_mut() {
            Some(file) => file.write(buf),
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

    fn recv(&mut self, buf: &mut [u8], _mode: RecvMode) -> Result<usize, TransportError> {
        let outcome = match self.file.as_mut() {
            Some(file) => file.read(buf),
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

impl Drop for DeviceChannel {
    fn drop(&mut self) {
        self.close();
    }
}
