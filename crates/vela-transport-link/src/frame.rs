//! 以太帧的构造与拆解，全部为纯函数，不触碰套接字。

use bytes::{BufMut, BytesMut};
use vela_transport::HwAddr;

/// 以太帧头长度（目的 6 + 源 6 + 以太类型 2）。
pub const ETH_HEADER_LEN: usize = 14;
/// 不含 FCS 的最小帧长；短帧发送前补零至该长度。
pub const ETH_MIN_FRAME: usize = 60;
/// 入站暂存缓冲的上限（标准 MTU 帧 + 帧头）。
pub(crate) const ETH_FRAME_CAPACITY: usize = 1514;

/// 预构建的出站帧头模板。
///
/// `open` 时一次性写定目的/源地址与以太类型，之后每次发送仅拼接负载，
/// 帧头处理对调用方完全不可见。
#[derive(Clone, Debug)]
pub(crate) struct FrameTemplate {
    header: [u8; ETH_HEADER_LEN],
}

impl FrameTemplate {
    pub(crate) fn new(dst: HwAddr, src: HwAddr, ethertype: u16) -> Self {
        let mut header = [0u8; ETH_HEADER_LEN];
        header[..6].copy_from_slice(&dst.octets());
        header[6..12].copy_from_slice(&src.octets());
        header[12..].copy_from_slice(&ethertype.to_be_bytes());
        Self { header }
    }

    /// 组装一枚完整出站帧：模板帧头 + 负载 + 补零至最小帧长。
    pub(crate) fn frame_for(&self, payload: &[u8]) -> BytesMut {
        let logical = ETH_HEADER_LEN + payload.len();
        let mut frame = BytesMut::with_capacity(logical.max(ETH_MIN_FRAME));
        frame.put_slice(&self.header);
        frame.put_slice(payload);
        if frame.len() < ETH_MIN_FRAME {
            frame.put_bytes(0, ETH_MIN_FRAME - frame.len());
        }
        frame
    }
}

/// 剥离入站帧的帧头，返回负载区；帧短于帧头时返回 `None`。
pub(crate) fn strip_header(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < ETH_HEADER_LEN {
        return None;
    }
    Some(&frame[ETH_HEADER_LEN..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> FrameTemplate {
        let dst: HwAddr = "02:00:00:00:00:02".parse().expect("dst");
        let src: HwAddr = "02:00:00:00:00:01".parse().expect("src");
        FrameTemplate::new(dst, src, 0x88b5)
    }

    /// 模板帧头按「目的、源、以太类型」的线序写定。
    #[test]
    fn template_lays_out_header_in_wire_order() {
        let frame = template().frame_for(&[0xaa; 50]);
        assert_eq!(&frame[..6], &[0x02, 0, 0, 0, 0, 0x02]);
        assert_eq!(&frame[6..12], &[0x02, 0, 0, 0, 0, 0x01]);
        assert_eq!(&frame[12..14], &[0x88, 0xb5]);
        assert_eq!(&frame[14..64], &[0xaa; 50]);
        assert_eq!(frame.len(), 64);
    }

    /// 短负载补零至 60 字节最小帧，负载区原样保留。
    #[test]
    fn short_payload_is_padded_to_minimum_frame() {
        let payload = b"ok";
        let frame = template().frame_for(payload);
        assert_eq!(frame.len(), ETH_MIN_FRAME);
        assert_eq!(&frame[ETH_HEADER_LEN..ETH_HEADER_LEN + 2], payload);
        assert!(frame[ETH_HEADER_LEN + 2..].iter().all(|&b| b == 0));
    }

    /// 空负载同样成帧（纯帧头 + 补零）。
    #[test]
    fn empty_payload_still_forms_minimum_frame() {
        let frame = template().frame_for(&[]);
        assert_eq!(frame.len(), ETH_MIN_FRAME);
    }

    /// 剥头后只剩负载，帧头字节不外泄；残帧被拒绝。
    #[test]
    fn strip_header_hides_wire_bytes() {
        let frame = template().frame_for(b"telemetry");
        let payload = strip_header(&frame).expect("payload");
        assert_eq!(&payload[..9], b"telemetry");
        assert!(strip_header(&frame[..ETH_HEADER_LEN - 1]).is_none());
    }

    /// 发送端视角的往返：负载经组帧/剥头后逐字节一致。
    #[test]
    fn payload_round_trips_through_frame_and_strip() {
        let payload: Vec<u8> = (0u8..=200).collect();
        let frame = template().frame_for(&payload);
        let recovered = strip_header(&frame).expect("payload");
        assert_eq!(&recovered[..payload.len()], payload.as_slice());
    }
}
