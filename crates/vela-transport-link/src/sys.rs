//! AF_PACKET 套接字的 OS 层装配。
//!
//! `open` 的每个步骤（建套接字、整定缓冲、装滤镜、绑接口、开混杂）
//! 在此各自成函数，失败时携带独立操作码出层，方便运维按步骤定位。

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use nix::errno::Errno;
use vela_transport::{HwAddr, TransportError};

use crate::error as op;

/// 收发缓冲的目标容量：远超 OS 默认值，容忍突发捕获不丢帧。
const RCV_BUFFER_BYTES: usize = 1 << 20;
const SND_BUFFER_BYTES: usize = 1 << 20;

/// 经 getifaddrs 解析接口的本地硬件地址。
pub(crate) fn resolve_local_hwaddr(interface: &str) -> Result<HwAddr, TransportError> {
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|errno| TransportError::io(op::OPEN, errno_to_io(errno)))?;
    for ifaddr in addrs {
        if ifaddr.interface_name != interface {
            continue;
        }
        let Some(storage) = ifaddr.address else {
            continue;
        };
        if let Some(link) = storage.as_link_addr()
            && let Some(octets) = link.addr()
        {
            return Ok(HwAddr(octets));
        }
    }
    Err(TransportError::HwAddrResolve {
        interface: interface.to_owned(),
    })
}

/// 解析接口索引，绑定与混杂成员关系均以它为键。
pub(crate) fn interface_index(interface: &str) -> Result<u32, TransportError> {
    nix::net::if_::if_nametoindex(interface)
        .map(|idx| idx as u32)
        .map_err(|errno| TransportError::io(op::IFINDEX, errno_to_io(errno)))
}

/// 创建非阻塞的链路层裸套接字，协议字段取网络字节序的以太类型。
pub(crate) fn open_packet_socket(ethertype: u16) -> Result<OwnedFd, TransportError> {
    let fd = unsafe {
        libc::socket(
            libc::AF_PACKET,
            libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            libc::c_int::from(ethertype.to_be()),
        )
    };
    if fd < 0 {
        return Err(TransportError::io(op::OPEN, io::Error::last_os_error()));
    }
    // 裸 fd 刚由上面的 socket(2) 返回，所有权在此唯一转移。
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// 把收发缓冲放大到超出 OS 默认值。
pub(crate) fn enlarge_buffers(fd: &OwnedFd) -> Result<(), TransportError> {
    use nix::sys::socket::{setsockopt, sockopt};

    setsockopt(fd, sockopt::RcvBuf, &RCV_BUFFER_BYTES)
        .map_err(|errno| TransportError::io(op::BUFFER, errno_to_io(errno)))?;
    setsockopt(fd, sockopt::SndBuf, &SND_BUFFER_BYTES)
        .map_err(|errno| TransportError::io(op::BUFFER, errno_to_io(errno)))?;
    Ok(())
}

/// 安装经典 BPF 过滤程序（SO_ATTACH_FILTER）。
pub(crate) fn attach_source_filter(
    fd: &OwnedFd,
    prog: &[libc::sock_filter],
) -> Result<(), TransportError> {
    let fprog = libc::sock_fprog {
        len: prog.len() as u16,
        filter: prog.as_ptr() as *mut libc::sock_filter,
    };
    // fprog 只在本次调用期间被内核读取，借用在返回前始终有效。
    let rc = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_ATTACH_FILTER,
            (&fprog as *const libc::sock_fprog).cast(),
            mem::size_of::<libc::sock_fprog>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(TransportError::io(op::FILTER, io::Error::last_os_error()));
    }
    Ok(())
}

/// 将套接字绑定到指定接口与以太类型。
pub(crate) fn bind_to_interface(
    fd: &OwnedFd,
    ifindex: u32,
    ethertype: u16,
) -> Result<(), TransportError> {
    let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
    sll.sll_family = libc::AF_PACKET as libc::c_ushort;
    sll.sll_protocol = ethertype.to_be();
    sll.sll_ifindex = ifindex as libc::c_int;
    let rc = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            (&sll as *const libc::sockaddr_ll).cast(),
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(TransportError::io(op::BIND, io::Error::last_os_error()));
    }
    Ok(())
}

/// 为接口开启混杂成员关系（PACKET_MR_PROMISC）。
pub(crate) fn enable_promiscuous(fd: &OwnedFd, ifindex: u32) -> Result<(), TransportError> {
    let mut mreq: libc::packet_mreq = unsafe { mem::zeroed() };
    mreq.mr_ifindex = ifindex as libc::c_int;
    mreq.mr_type = libc::PACKET_MR_PROMISC as libc::c_ushort;
    let rc = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_PACKET,
            libc::PACKET_ADD_MEMBERSHIP,
            (&mreq as *const libc::packet_mreq).cast(),
            mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(TransportError::io(op::PROMISC, io::Error::last_os_error()));
    }
    Ok(())
}

fn errno_to_io(errno: Errno) -> io::Error {
    io::Error::from_raw_os_error(errno as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 接口索引解析失败携带自身操作码，与 bind(2) 步骤区分。
    #[test]
    fn missing_interface_reports_ifindex_op() {
        let err = interface_index("vela-no-such-if").expect_err("must fail");
        assert!(matches!(
            err,
            TransportError::Io { op: "link.ifindex", .. }
        ));
    }
}
