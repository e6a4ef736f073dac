//! Publish a `Header` on `/chatter` once per second.
//!
//! Start the hub example first, then:
//!
//! ```sh
//! RUST_LOG=debug cargo run --example simple_publisher
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spoke::msg::{Header, Time};
use spoke::{Endpoint, Node, TcpTransport, DEFAULT_HUB_PORT};

fn main() {
    spoke::dev_tracing::init_tracing();

    let hub = Endpoint::new("127.0.0.1", DEFAULT_HUB_PORT);
    let node = Node::new(
        "simple_publisher",
        hub,
        TcpTransport::server_factory(),
        TcpTransport::client_factory(),
    );

    let publisher = node.create_publisher::<Header>("/chatter", Endpoint::new("127.0.0.1", 7900));
    if !publisher.ok() {
        eprintln!("failed to create publisher");
        std::process::exit(1);
    }

    let seq = Arc::new(AtomicU32::new(0));
    let timer_publisher = Arc::clone(&publisher);
    node.create_timer(Duration::from_secs(1), move |_event| {
        let message = Header {
            seq: seq.fetch_add(1, Ordering::Relaxed),
            stamp: Time::now(),
            frame_id: "Hello, world!".to_string(),
        };
        println!(
            "publishing {} to {} subscriber(s)",
            message.seq,
            timer_publisher.subscriber_count()
        );
        timer_publisher.publish(&message);
    });

    node.spin(|| false);
}
