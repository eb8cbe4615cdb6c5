#![doc = r#"
# vela-transport-link

## 设计动机（Why）
- **定位**：提供 `vela-transport` 能力集在链路层裸帧（AF_PACKET）上的
  实现，面向通过以太网直连的硬件单元。
- **架构角色**：把帧头构造、内核滤镜安装、混杂捕获与缓冲区整定全部
  收敛在 `open` 的单次调用内，调用方之后只面对纯负载字节。

## 核心契约（What）
- **输入条件**：[`LinkConfig`] 给出接口名、对端硬件地址与以太类型；
- **输出保障**：`send` 自动补齐至 60 字节最小帧并报告逻辑（未补齐）
  长度；`recv` 剥离 14 字节帧头后只返回负载，帧头绝不外泄；
- **前置约束**：打开 AF_PACKET 套接字需要 CAP_NET_RAW。

## 实现策略（How）
- **入站过滤**：安装经典 BPF 程序，仅放行源硬件地址等于对端地址的
  帧，再叠加混杂成员关系保证非本机地址的帧也能抵达；
- **出站模板**：`open` 时预构建「目的=对端、源=本地、协议=以太类型」
  的帧头模板，`send` 仅填充负载区；
- **缓冲整定**：收发缓冲区放大到超出 OS 默认值，以容忍突发捕获。
"#]

mod channel;
mod error;
mod filter;
mod frame;
mod sys;

pub use channel::{LinkChannel, LinkConfig};
pub use frame::{ETH_HEADER_LEN, ETH_MIN_FRAME};
