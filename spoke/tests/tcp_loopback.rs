//! One end-to-end round trip over real loopback TCP.
//!
//! The mock-transport suite covers the protocol logic; this smoke test
//! exercises the actual sockets: non-blocking accepts, bounded reads,
//! and notification delivery across the kernel.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use spoke::msg::{Header, Time};
use spoke::{Endpoint, Hub, Node, TcpTransport};

fn free_endpoint() -> Endpoint {
    let port = portpicker::pick_unused_port().expect("no free port");
    Endpoint::new("127.0.0.1", port)
}

fn spin_until(node: &Node, deadline: Instant, done: impl Fn() -> bool) -> bool {
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        node.spin_once();
        std::thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn test_tcp_round_trip() {
    spoke::dev_tracing::init_tracing();

    let hub_endpoint = free_endpoint();
    let hub = Arc::new(Hub::new(
        hub_endpoint.clone(),
        TcpTransport::server_factory(),
        TcpTransport::client_factory(),
    ));
    assert!(hub.ok());
    let hub_thread = std::thread::spawn({
        let hub = Arc::clone(&hub);
        move || hub.spin()
    });

    {
        let node = Node::new(
            "tcp_smoke",
            hub_endpoint,
            TcpTransport::server_factory(),
            TcpTransport::client_factory(),
        );

        let received: Arc<Mutex<Vec<Header>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let subscriber = node.create_subscriber::<Header, _>(
            "/tcp_topic",
            free_endpoint(),
            move |msg: Header| sink.lock().unwrap().push(msg),
        );
        assert!(subscriber.ok());

        let publisher = node.create_publisher::<Header>("/tcp_topic", free_endpoint());
        assert!(publisher.ok());

        let paired = spin_until(&node, Instant::now() + Duration::from_secs(5), || {
            publisher.subscriber_count() == 1 && subscriber.publisher_count() == 1
        });
        assert!(paired, "publisher and subscriber never paired up");

        let message = Header {
            seq: 1234,
            stamp: Time { sec: 456, nsec: 789 },
            frame_id: "hello, world!".to_string(),
        };
        publisher.publish(&message);

        let delivered = spin_until(&node, Instant::now() + Duration::from_secs(5), || {
            !received.lock().unwrap().is_empty()
        });
        assert!(delivered, "message never arrived");
        assert_eq!(received.lock().unwrap().as_slice(), &[message]);
    }

    hub.shutdown();
    hub_thread.join().unwrap();
}
