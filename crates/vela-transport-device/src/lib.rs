#![doc = r#"
# vela-transport-device

## 设计动机（Why）
- **定位**：提供 `vela-transport` 能力集在字符设备上的实现，使控制器
  层能以与网络端点完全一致的方式操作本地设备。
- **契约（What）**：`open` 以读写方式打开设备路径；`send`/`recv` 为
  单次透传读写，不做重试循环（设备假定不出现部分 I/O）。
"#]

mod channel;
mod error;

pub use channel::{DeviceChannel, DeviceConfig};
