#![deny(unsafe_code)]
#![doc = "vela-transport: 传输端点能力集的统一契约层。"]
#![doc = ""]
#![doc = "== 使命概述 =="]
#![doc = "- **Why**：为流式套接字、链路层裸帧与字符设备三类后端提供共同语言，使控制器层在不触碰任何 OS I/O 原语的前提下完成打开、收发与关闭。"]
#![doc = "- **What**：定义 `Transport` 能力集 trait、`RecvMode` 收取语义、错误分类 `TransportError` 以及 `HwAddr` 硬件地址模型。"]
#![doc = "- **How**：各后端 crate (`vela-transport-stream` 等) 仅依赖本 crate 即可遵循统一契约；调度层 `vela-dispatch` 通过 trait 对象/泛型持有端点，从不触及具体类型。"]

pub mod addr;
pub mod channel;
pub mod error;

pub use addr::HwAddr;
pub use channel::{RecvMode, Transport, TransportKind};
pub use error::TransportError;
