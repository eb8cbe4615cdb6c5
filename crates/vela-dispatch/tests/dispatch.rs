//! 分发器的回环验证：注册一致性、事件判别与快照规则。

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::os::fd::RawFd;
use std::thread;
use std::time::Duration;

use vela_dispatch::{Dispatcher, DispatchTable, Event, EventKind, EventSink, Port};
use vela_transport::{RecvMode, Transport};
use vela_transport_stream::{ConnectProgress, StreamChannel, StreamConfig, StreamKind};

/// 测试期日志装配：按 `RUST_LOG` 过滤，输出进测试捕获器。
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 建一条已建连并注册完毕的流式端口，返回对端套接字。
fn connected_port(dispatcher: &Dispatcher, name: &str) -> (Port<StreamChannel>, TcpStream) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");

    let channel = StreamChannel::new(StreamConfig {
        addr,
        kind: StreamKind::Tcp,
    });
    let mut port = Port::new(name, channel, dispatcher.table());
    port.open().expect("open port");
    for _ in 0..100 {
        match port.attempt_connect().expect("connect") {
            ConnectProgress::Established => break,
            ConnectProgress::Pending => thread::sleep(Duration::from_millis(10)),
        }
    }
    assert!(port.is_open(), "connect did not converge");

    let (peer, _) = listener.accept().expect("accept");
    (port, peer)
}

/// 空分发表的轮询立即返回零事件。
#[test]
fn empty_table_polls_to_zero_events() {
    let dispatcher = Dispatcher::new().with_poll_timeout(1);
    let mut events = Vec::new();
    assert_eq!(dispatcher.poll_once(&mut events), 0);
    assert!(events.is_empty());
}

/// 流式端口在建连完成时注册、关闭时注销。
#[test]
fn stream_port_registers_on_establish_and_deregisters_on_close() {
    let dispatcher = Dispatcher::new().with_poll_timeout(1);
    let table = dispatcher.table();

    let (mut port, _peer) = connected_port(&dispatcher, "mount-axis");
    assert_eq!(table.len(), 1);

    port.close();
    assert!(table.is_empty());

    let mut events = Vec::new();
    assert_eq!(dispatcher.poll_once(&mut events), 0);
}

/// 有排队数据 ⇒ `DataAvailable`，且事件指向正确端口。
#[test]
fn queued_bytes_emit_data_available() {
    let dispatcher = Dispatcher::new().with_poll_timeout(50);
    let (mut port, mut peer) = connected_port(&dispatcher, "guider");

    // 无流量时的轮询不产出事件。
    let mut events = Vec::new();
    assert_eq!(dispatcher.poll_once(&mut events), 0);

    peer.write_all(b"frame-ready").expect("peer write");
    thread::sleep(Duration::from_millis(20));

    let emitted = dispatcher.poll_once(&mut events);
    assert_eq!(emitted, 1);
    assert_eq!(
        events,
        vec![Event {
            kind: EventKind::DataAvailable,
            port: port.id(),
        }]
    );

    // 事件之后控制器直接在端口上收取负载。
    let mut buf = [0u8; 16];
    let n = port.recv(&mut buf, RecvMode::Available).expect("recv");
    assert_eq!(&buf[..n], b"frame-ready");
}

/// 就绪但零字节排队 ⇒ `Disconnected`。
#[test]
fn peer_close_emits_disconnected() {
    let dispatcher = Dispatcher::new().with_poll_timeout(50);
    let (port, peer) = connected_port(&dispatcher, "focuser");

    drop(peer);
    thread::sleep(Duration::from_millis(20));

    let mut events = Vec::new();
    assert_eq!(dispatcher.poll_once(&mut events), 1);
    assert_eq!(
        events,
        vec![Event {
            kind: EventKind::Disconnected,
            port: port.id(),
        }]
    );
}

/// 同端口事件跨轮 FIFO：数据事件先于断连事件被观测。
#[test]
fn per_port_events_are_fifo_across_polls() {
    let dispatcher = Dispatcher::new().with_poll_timeout(50);
    let (mut port, mut peer) = connected_port(&dispatcher, "dome");

    peer.write_all(b"last-words").expect("peer write");
    thread::sleep(Duration::from_millis(20));

    let mut events = Vec::new();
    assert_eq!(dispatcher.poll_once(&mut events), 1);
    assert_eq!(events[0].kind, EventKind::DataAvailable);

    // 消费数据后对端关闭，下一轮观测到断连。
    let mut buf = [0u8; 16];
    port.recv(&mut buf, RecvMode::Available).expect("drain");
    drop(peer);
    thread::sleep(Duration::from_millis(20));

    assert_eq!(dispatcher.poll_once(&mut events), 1);
    assert_eq!(events[1].kind, EventKind::Disconnected);
    assert_eq!(events[0].port, events[1].port);
}

/// 在自身事件回调中注销：本轮安全完成，下一轮不再报告该句柄。
#[test]
fn mid_poll_deregistration_is_safe() {
    struct DeregisteringSink {
        table: DispatchTable,
        fd: RawFd,
        events: Vec<Event>,
    }

    impl EventSink for DeregisteringSink {
        fn push(&mut self, event: Event) {
            // 消费方在回调中立即注销自己的句柄。
            self.table.deregister(self.fd);
            self.events.push(event);
        }
    }

    let dispatcher = Dispatcher::new().with_poll_timeout(50);
    let (port, mut peer) = connected_port(&dispatcher, "spectrograph");
    let fd = port.transport().handle().expect("registered fd");

    peer.write_all(b"x").expect("peer write");
    thread::sleep(Duration::from_millis(20));

    let mut sink = DeregisteringSink {
        table: dispatcher.table(),
        fd,
        events: Vec::new(),
    };
    assert_eq!(dispatcher.poll_once(&mut sink), 1);
    assert_eq!(sink.events.len(), 1);
    assert!(dispatcher.table().is_empty());

    // 数据仍未被消费，但句柄已注销：下一轮不得再报告。
    let mut events = Vec::new();
    assert_eq!(dispatcher.poll_once(&mut events), 0);
    let _ = port;
}

/// 端口随作用域销毁时强制注销（Drop 语义）。
#[test]
fn dropping_port_cleans_registry() {
    let dispatcher = Dispatcher::new().with_poll_timeout(1);
    let table = dispatcher.table();
    let (port, _peer) = connected_port(&dispatcher, "derotator");
    assert_eq!(table.len(), 1);
    drop(port);
    assert!(table.is_empty());
}

/// 两个端口并行注册时，事件各自指向正确的归属端口。
#[test]
fn events_route_to_owning_port() {
    let dispatcher = Dispatcher::new().with_poll_timeout(50);
    let (port_a, mut peer_a) = connected_port(&dispatcher, "m1-support");
    let (port_b, mut peer_b) = connected_port(&dispatcher, "m2-hexapod");
    assert_eq!(dispatcher.table().len(), 2);

    peer_a.write_all(b"a").expect("peer a write");
    peer_b.write_all(b"b").expect("peer b write");
    thread::sleep(Duration::from_millis(20));

    let mut events = Vec::new();
    assert_eq!(dispatcher.poll_once(&mut events), 2);
    let ports: Vec<_> = events.iter().map(|e| e.port).collect();
    assert!(ports.contains(&port_a.id()));
    assert!(ports.contains(&port_b.id()));
    assert!(events.iter().all(|e| e.kind == EventKind::DataAvailable));
}
