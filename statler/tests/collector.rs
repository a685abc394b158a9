use std::{
    collections::HashMap,
    net::UdpSocket,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use prost::Message as _;
use statler::{
    Client, CollectorBuilder, CollectorHandle, DebuggingSink, ReportSink, SinkError, Stat, WireStat,
};

const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn spawn_collector(readers: usize, sink: Arc<DebuggingSink>) -> CollectorHandle {
    CollectorBuilder::new()
        .with_bind_address("127.0.0.1:0")
        .with_readers(readers)
        .with_poll_interval(Duration::from_millis(50))
        .spawn(sink)
        .expect("failed to spawn collector")
}

fn raw_sender(collector: &CollectorHandle) -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.connect(collector.local_addr()).unwrap();
    socket
}

/// Waits until the collector has finished with `expected` datagrams, reported or dropped.
fn wait_for_processed(collector: &CollectorHandle, expected: u64) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    loop {
        let telemetry = collector.telemetry();
        if telemetry.reported + telemetry.dropped() >= expected {
            return;
        }

        assert!(Instant::now() < deadline, "timed out waiting for datagrams: {:?}", telemetry);
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
#[allow(clippy::approx_constant)]
fn value_and_count_are_dispatched() {
    init_tracing();

    let sink = Arc::new(DebuggingSink::new());
    let collector = spawn_collector(2, Arc::clone(&sink));
    let client = Client::new(collector.local_addr().to_string()).unwrap();

    client.send_value("k", 3.14).unwrap();
    wait_for_processed(&collector, 1);
    client.send_count("k", 5).unwrap();
    wait_for_processed(&collector, 2);

    assert_eq!(sink.reports(), vec![Stat::value("k", 3.14), Stat::count("k", 5)]);
    collector.shutdown();
}

#[test]
fn increment_matches_count_of_one() {
    init_tracing();

    let sink = Arc::new(DebuggingSink::new());
    let collector = spawn_collector(1, Arc::clone(&sink));
    let client = Client::new(collector.local_addr().to_string()).unwrap();

    client.increment("requests").unwrap();
    client.send_count("requests", 1).unwrap();
    wait_for_processed(&collector, 2);

    let reports = sink.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0], reports[1]);
    assert_eq!(reports[0], Stat::count("requests", 1));
}

#[test]
fn bad_datagram_does_not_affect_the_next() {
    init_tracing();

    let sink = Arc::new(DebuggingSink::new());
    let collector = spawn_collector(1, Arc::clone(&sink));
    let sender = raw_sender(&collector);

    sender.send(&[0xff, 0xff, 0xff]).unwrap();
    sender.send(&statler::encode(&Stat::count("after", 2)).unwrap()).unwrap();
    wait_for_processed(&collector, 2);

    assert_eq!(sink.reports(), vec![Stat::count("after", 2)]);

    let telemetry = collector.telemetry();
    assert_eq!(telemetry.received, 2);
    assert_eq!(telemetry.decode_failures, 1);
    assert_eq!(telemetry.reported, 1);
}

#[test]
fn unknown_kind_is_dropped_without_sink_call() {
    init_tracing();

    let sink = Arc::new(DebuggingSink::new());
    let collector = spawn_collector(1, Arc::clone(&sink));
    let sender = raw_sender(&collector);

    let future = WireStat { kind: 17, count: 3, value: 0.0, key: "future".into() };
    sender.send(&future.encode_to_vec()).unwrap();
    sender.send(&statler::encode(&Stat::value("present", 1.0)).unwrap()).unwrap();
    wait_for_processed(&collector, 2);

    assert_eq!(sink.reports(), vec![Stat::value("present", 1.0)]);
    assert_eq!(collector.telemetry().unknown_kinds, 1);
}

#[test]
fn sink_failures_do_not_stop_readers() {
    struct FlakySink {
        inner: DebuggingSink,
    }

    impl ReportSink for FlakySink {
        fn report_value(&self, key: &str, value: f64) -> Result<(), SinkError> {
            self.inner.report_value(key, value)
        }

        fn report_count(&self, key: &str, count: i32) -> Result<(), SinkError> {
            if count < 0 {
                return Err(SinkError::Rejected { reason: "negative".into() });
            }
            self.inner.report_count(key, count)
        }
    }

    init_tracing();

    let sink = Arc::new(FlakySink { inner: DebuggingSink::new() });
    let collector = CollectorBuilder::new()
        .with_bind_address("127.0.0.1:0")
        .with_readers(1)
        .spawn(Arc::clone(&sink))
        .unwrap();
    let client = Client::new(collector.local_addr().to_string()).unwrap();

    client.send_count("down", -1).unwrap();
    client.send_count("up", 1).unwrap();
    wait_for_processed(&collector, 2);

    assert_eq!(sink.inner.reports(), vec![Stat::count("up", 1)]);
    assert_eq!(collector.telemetry().sink_failures, 1);
}

#[test]
fn many_datagrams_across_readers() {
    const TOTAL: usize = 10_000;
    const SENDERS: usize = 2;
    const BATCH: usize = 100;

    init_tracing();

    let sink = Arc::new(DebuggingSink::new());
    let collector = spawn_collector(4, Arc::clone(&sink));
    assert_eq!(collector.readers(), 4);

    let expected = (0..TOTAL)
        .map(|i| {
            let key = format!("k{}", i);
            if i % 2 == 0 {
                Stat::count(key, i as i32)
            } else {
                Stat::value(key, i as f64 / 4.0)
            }
        })
        .collect::<Vec<_>>();

    // Send in batches, letting the collector catch up in between, so that loopback receive
    // buffers never overflow: datagram loss is outside what the collector controls.
    let clients = (0..SENDERS)
        .map(|_| Client::new(collector.local_addr().to_string()).unwrap())
        .collect::<Vec<_>>();
    for (batch_idx, batch) in expected.chunks(BATCH).enumerate() {
        thread::scope(|scope| {
            for (client_idx, client) in clients.iter().enumerate() {
                scope.spawn(move || {
                    for stat in batch.iter().skip(client_idx).step_by(SENDERS) {
                        client.send(stat).unwrap();
                    }
                });
            }
        });
        wait_for_processed(&collector, ((batch_idx + 1) * BATCH) as u64);
    }

    let reports = sink.reports();
    assert_eq!(reports.len(), TOTAL);

    let by_key = reports
        .into_iter()
        .map(|stat| (stat.key().to_owned(), stat))
        .collect::<HashMap<_, _>>();
    assert_eq!(by_key.len(), TOTAL);
    for stat in &expected {
        assert_eq!(&by_key[stat.key()], stat);
    }

    let telemetry = collector.telemetry();
    assert_eq!(telemetry.received, TOTAL as u64);
    assert_eq!(telemetry.reported, TOTAL as u64);
    assert_eq!(telemetry.dropped(), 0);
}

#[test]
fn shutdown_stops_all_readers() {
    init_tracing();

    let sink = Arc::new(DebuggingSink::new());
    let collector = spawn_collector(4, Arc::clone(&sink));
    let addr = collector.local_addr();

    let started = Instant::now();
    collector.shutdown();
    assert!(started.elapsed() < WAIT_TIMEOUT);

    // Every reader held the socket; once they are gone the port can be bound again.
    UdpSocket::bind(addr).expect("socket should be released after shutdown");
}

#[test]
fn accepts_already_bound_socket() {
    init_tracing();

    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = socket.local_addr().unwrap();

    let sink = Arc::new(DebuggingSink::new());
    let collector = CollectorBuilder::new()
        .with_socket(socket)
        .with_readers(1)
        .spawn(Arc::clone(&sink))
        .unwrap();
    assert_eq!(collector.local_addr(), addr);

    Client::new(addr.to_string()).unwrap().send_value("bound", 8.0).unwrap();
    wait_for_processed(&collector, 1);
    assert_eq!(sink.reports(), vec![Stat::value("bound", 8.0)]);
}
