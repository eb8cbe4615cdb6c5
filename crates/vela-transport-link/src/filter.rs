//! 源硬件地址匹配的经典 BPF 程序。
//!
//! 程序在内核侧丢弃源地址不等于对端地址的捕获帧，避免混杂模式下的
//! 无关流量抵达用户态。指令编码为纯函数，可在无特权环境下验证。

use libc::sock_filter;
use vela_transport::HwAddr;

// 经典 BPF 指令编码（BPF_CLASS | BPF_SIZE | BPF_MODE）。
const BPF_LD_W_ABS: u16 = 0x20;
const BPF_LD_H_ABS: u16 = 0x28;
const BPF_JEQ_K: u16 = 0x15;
const BPF_RET_K: u16 = 0x06;

/// 接受判决：放行整帧（上限远大于任何合法帧长）。
const ACCEPT_WHOLE_FRAME: u32 = 0x0004_0000;

/// 以太帧内源硬件地址的偏移：目的地址 6 字节之后。
const SRC_MAC_OFFSET: u32 = 6;

/// 构造「源硬件地址 == `peer`」的六指令过滤程序。
///
/// 地址按「低 4 字节整字比较 + 高 2 字节半字比较」两段匹配，这是
/// tcpdump `ether src` 谓词的标准编译形态：
///
/// ```text
/// (0) ld  [8]            ; 源地址的后四字节
/// (1) jeq #low4  -> (2) else (5)
/// (2) ldh [6]            ; 源地址的前两字节
/// (3) jeq #high2 -> (4) else (5)
/// (4) ret #0x40000       ; 放行
/// (5) ret #0             ; 丢弃
/// ```
pub(crate) fn source_mac_filter(peer: HwAddr) -> [sock_filter; 6] {
    let o = peer.octets();
    let low4 = u32::from_be_bytes([o[2], o[3], o[4], o[5]]);
    let high2 = u32::from(u16::from_be_bytes([o[0], o[1]]));
    [
        sock_filter {
            code: BPF_LD_W_ABS,
            jt: 0,
            jf: 0,
            k: SRC_MAC_OFFSET + 2,
        },
        sock_filter {
            code: BPF_JEQ_K,
            jt: 0,
            jf: 3,
            k: low4,
        },
        sock_filter {
            code: BPF_LD_H_ABS,
            jt: 0,
            jf: 0,
            k: SRC_MAC_OFFSET,
        },
        sock_filter {
            code: BPF_JEQ_K,
            jt: 0,
            jf: 1,
            k: high2,
        },
        sock_filter {
            code: BPF_RET_K,
            jt: 0,
            jf: 0,
            k: ACCEPT_WHOLE_FRAME,
        },
        sock_filter {
            code: BPF_RET_K,
            jt: 0,
            jf: 0,
            k: 0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 最小经典 BPF 解释器：仅覆盖本程序用到的四种指令，用于在
    /// 无特权环境下验证判决逻辑。
    fn run(prog: &[sock_filter], frame: &[u8]) -> u32 {
        let mut acc: u32 = 0;
        let mut pc = 0usize;
        loop {
            let insn = &prog[pc];
            match insn.code {
                BPF_LD_W_ABS => {
                    let off = insn.k as usize;
                    acc = u32::from_be_bytes(frame[off..off + 4].try_into().expect("word load"));
                    pc += 1;
                }
                BPF_LD_H_ABS => {
                    let off = insn.k as usize;
                    acc = u32::from(u16::from_be_bytes(
                        frame[off..off + 2].try_into().expect("half load"),
                    ));
                    pc += 1;
                }
                BPF_JEQ_K => {
                    pc += 1 + usize::from(if acc == insn.k { insn.jt } else { insn.jf });
                }
                BPF_RET_K => return insn.k,
                other => panic!("unexpected opcode {other:#x}"),
            }
        }
    }

    fn frame_from(src: HwAddr) -> Vec<u8> {
        let mut frame = vec![0u8; 60];
        frame[..6].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x0a]);
        frame[6..12].copy_from_slice(&src.octets());
        frame
    }

    /// 对端源地址的帧被放行，其余一律丢弃。
    #[test]
    fn filter_accepts_peer_and_drops_others() {
        let peer: HwAddr = "02:1b:44:11:3a:b7".parse().expect("peer");
        let prog = source_mac_filter(peer);

        assert_eq!(run(&prog, &frame_from(peer)), ACCEPT_WHOLE_FRAME);

        let stranger: HwAddr = "02:1b:44:11:3a:b8".parse().expect("stranger");
        assert_eq!(run(&prog, &frame_from(stranger)), 0);

        // 仅高两字节不同的地址也必须被丢弃（两段匹配缺一不可）。
        let high_diff: HwAddr = "03:1b:44:11:3a:b7".parse().expect("high diff");
        assert_eq!(run(&prog, &frame_from(high_diff)), 0);
    }

    /// 程序长度与判决常量是 setsockopt 安装契约的一部分。
    #[test]
    fn program_shape_is_stable() {
        let prog = source_mac_filter(HwAddr::BROADCAST);
        assert_eq!(prog.len(), 6);
        assert_eq!(prog[4].k, ACCEPT_WHOLE_FRAME);
        assert_eq!(prog[5].k, 0);
    }
}
