//! 硬件地址（EUI-48）模型。
//!
//! 链路层端点以对端硬件地址为过滤与寻址依据；运维侧以
//! `aa:bb:cc:dd:ee:ff` 字面量配置对端，故此处同时提供解析与展示。

use core::fmt;
use core::str::FromStr;

use crate::error::TransportError;

/// 48 位硬件地址。
///
/// # 教案级注释
/// - **意图 (Why)**：以新类型包装 `[u8; 6]`，阻止裸字节数组在配置、帧
///   模板与滤镜程序之间随意流动；
/// - **契约 (What)**：`FromStr` 仅接受六组两位十六进制、冒号分隔的
///   字面量；`Display` 输出等价的小写形式，保证日志与配置可往返；
/// - **权衡 (Trade-offs)**：不支持 `-` 分隔等变体写法，控制面配置规范
///   统一使用冒号形式。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HwAddr(pub [u8; 6]);

impl HwAddr {
    /// 广播地址 `ff:ff:ff:ff:ff:ff`。
    pub const BROADCAST: HwAddr = HwAddr([0xff; 6]);

    /// 返回底层字节。
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for HwAddr {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| TransportError::HwAddrParse {
                literal: s.to_owned(),
            })?;
            if part.len() != 2 {
                return Err(TransportError::HwAddrParse {
                    literal: s.to_owned(),
                });
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| TransportError::HwAddrParse {
                literal: s.to_owned(),
            })?;
        }
        if parts.next().is_some() {
            return Err(TransportError::HwAddrParse {
                literal: s.to_owned(),
            });
        }
        Ok(HwAddr(octets))
    }
}
