use std::{thread, time::Duration};

use statler::{Client, CollectorBuilder, LogSink};

fn main() {
    tracing_subscriber::fmt::init();

    let collector = CollectorBuilder::default()
        .with_bind_address("127.0.0.1:5354")
        .spawn(LogSink)
        .expect("failed to spawn collector");

    let client = Client::new("127.0.0.1:5354").expect("failed to create client");

    // Loop a few times, pretending to do some work.
    for i in 0..20 {
        client.increment("loop_iterations").expect("failed to send count");
        client.send_value("loop_progress", f64::from(i) / 20.0).expect("failed to send value");

        thread::sleep(Duration::from_millis(100));
    }

    println!("{:?}", collector.telemetry());
    collector.shutdown();
}
