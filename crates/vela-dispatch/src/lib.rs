#![doc = r#"
# vela-dispatch

## 设计动机（Why）
- **定位**：单线程协作式多路复用的中枢——把所有已注册端点的就绪/断连
  探测收敛为一次有界（约 10 ms）的 `poll(2)` 调用，并将结果折算为
  规范化事件交给外部工作队列。
- **架构角色**：不设进程级单例——复用器是显式的 [`Dispatcher`] 对象：
  由宿主进程构造一次、每个 [`Port`] 持有其 [`DispatchTable`] 句柄，
  单实例语义保留而全局可变状态消失。

## 核心契约（What）
- **注册不变量**：表项集合恒等于「当前持有存活句柄且已建连/打开」的
  端点集合；同一句柄绝不重复注册；
- **快照规则**：`poll_once` 在入口处快照工作集，事件消费方在回调中
  注册/注销不会破坏进行中的轮询；
- **事件语义**：就绪且有排队字节 ⇒ `DataAvailable`；就绪且零字节 ⇒
  `Disconnected`；同端口事件按轮询产出顺序 FIFO，跨端口顺序不作保证；
- **降级策略**：就绪检查本身失败只记日志、本轮零事件，绝不停摆整个
  复用器，也不制造事件风暴。

## 调度模型（How）
- 无内部线程：一切工作同步发生在调用 `poll_once` 的线程内；
- 共享的分发表用 `Rc<RefCell<..>>` 承载——单线程执行下无需锁。
"#]

mod dispatcher;
mod events;
mod port;
mod table;

pub use dispatcher::Dispatcher;
pub use events::{Event, EventKind, EventSink, PortId};
pub use port::Port;
pub use table::DispatchTable;
