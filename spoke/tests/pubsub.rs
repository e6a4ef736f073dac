//! End-to-end pub/sub scenarios over the in-memory mock transport.
//!
//! Each test runs its own network and hub thread, builds nodes against
//! it, and drives delivery with explicit `spin_once` steps: one spin
//! for the subscriber to act on a notification, one for the publisher
//! to accept, one per delivered message.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use spoke::msg::{Header, Time};
use spoke::{Endpoint, Hub, MockNetwork, Node};

struct Fixture {
    net: Arc<MockNetwork>,
    hub: Arc<Hub>,
    handle: Option<JoinHandle<()>>,
}

impl Fixture {
    fn start() -> Self {
        spoke::dev_tracing::init_tracing();
        let net = MockNetwork::new();
        let hub = Arc::new(Hub::new(
            hub_endpoint(),
            net.server_factory(),
            net.client_factory(),
        ));
        assert!(hub.ok());
        let handle = std::thread::spawn({
            let hub = Arc::clone(&hub);
            move || hub.spin()
        });
        Self {
            net,
            hub,
            handle: Some(handle),
        }
    }

    fn node(&self, name: &str) -> Node {
        Node::new(
            name,
            hub_endpoint(),
            self.net.server_factory(),
            self.net.client_factory(),
        )
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.hub.shutdown();
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn hub_endpoint() -> Endpoint {
    Endpoint::new("127.0.0.1", 1)
}

fn endpoint(port: u16) -> Endpoint {
    Endpoint::new("127.0.0.1", port)
}

/// Give the hub thread time to process registrations and connect to
/// subscriber notification sockets before the nodes spin.
fn settle() {
    std::thread::sleep(Duration::from_millis(150));
}

type Sink<M> = Arc<Mutex<Vec<M>>>;

fn sink<M>() -> (Sink<M>, impl Fn(M) + Send + Sync + 'static)
where
    M: Send + 'static,
{
    let received: Sink<M> = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::clone(&received);
    (received, move |msg: M| inner.lock().unwrap().push(msg))
}

fn header(seq: u32, frame_id: &str) -> Header {
    Header {
        seq,
        stamp: Time { sec: 456, nsec: 789 },
        frame_id: frame_id.to_string(),
    }
}

#[test]
fn test_single_pub_sub_round_trip() {
    let fixture = Fixture::start();
    let node = fixture.node("test");
    assert!(node.ok());

    let (received, callback) = sink::<Header>();
    let subscriber = node.create_subscriber::<Header, _>("/test_topic", endpoint(2), callback);
    assert!(subscriber.ok());

    let publisher = node.create_publisher::<Header>("/test_topic", endpoint(3));
    assert!(publisher.ok());

    settle();
    node.spin_once(); // subscriber connects
    node.spin_once(); // publisher accepts

    assert_eq!(publisher.subscriber_count(), 1);
    assert_eq!(subscriber.publisher_count(), 1);

    let message = header(1234, "hello, world!");
    publisher.publish(&message);

    node.spin_once(); // subscriber reads and invokes the callback

    let received = received.lock().unwrap();
    assert_eq!(received.as_slice(), &[message]);
}

#[test]
fn test_topic_hash_mismatch_rejected() {
    let fixture = Fixture::start();
    let node = fixture.node("test");

    let (_, callback) = sink::<Header>();
    let subscriber = node.create_subscriber::<Header, _>("/test_topic", endpoint(2), callback);
    assert!(subscriber.ok());

    // Same topic, different payload schema: both directions rejected.
    let (_, time_callback) = sink::<Time>();
    let wrong_subscriber =
        node.create_subscriber::<Time, _>("/test_topic", endpoint(3), time_callback);
    assert!(!wrong_subscriber.ok());

    let wrong_publisher = node.create_publisher::<Time>("/test_topic", endpoint(4));
    assert!(!wrong_publisher.ok());

    // The node sheds the dead components on its next spin.
    node.spin_once();
    node.spin_once();
    assert!(subscriber.ok());
}

#[test]
fn test_multiple_publishers_one_subscriber() {
    let fixture = Fixture::start();
    let node = fixture.node("test");

    let (received, callback) = sink::<Header>();
    let subscriber = node.create_subscriber::<Header, _>("/test_topic", endpoint(2), callback);
    assert!(subscriber.ok());

    let publisher1 = node.create_publisher::<Header>("/test_topic", endpoint(3));
    assert!(publisher1.ok());

    settle();
    node.spin_once();
    node.spin_once();

    assert_eq!(publisher1.subscriber_count(), 1);
    assert_eq!(subscriber.publisher_count(), 1);

    let publisher2 = node.create_publisher::<Header>("/test_topic", endpoint(4));
    assert!(publisher2.ok());

    settle();
    node.spin_once();
    node.spin_once();

    assert_eq!(publisher1.subscriber_count(), 1);
    assert_eq!(publisher2.subscriber_count(), 1);
    assert_eq!(subscriber.publisher_count(), 2);

    let first = header(1234, "hello, world!");
    publisher1.publish(&first);
    node.spin_once();
    assert_eq!(received.lock().unwrap().last(), Some(&first));

    let second = header(5678, "from the other publisher");
    publisher2.publish(&second);
    node.spin_once();
    assert_eq!(received.lock().unwrap().last(), Some(&second));
}

#[test]
fn test_one_publisher_multiple_subscribers() {
    let fixture = Fixture::start();
    let node = fixture.node("test");

    let (received1, callback1) = sink::<Header>();
    let subscriber1 = node.create_subscriber::<Header, _>("/test_topic", endpoint(2), callback1);
    assert!(subscriber1.ok());

    let (received2, callback2) = sink::<Header>();
    let subscriber2 = node.create_subscriber::<Header, _>("/test_topic", endpoint(3), callback2);
    assert!(subscriber2.ok());

    let publisher = node.create_publisher::<Header>("/test_topic", endpoint(4));
    assert!(publisher.ok());

    settle();
    node.spin_once(); // both subscribers connect
    node.spin_once(); // publisher accepts
    node.spin_once();

    assert_eq!(publisher.subscriber_count(), 2);
    assert_eq!(subscriber1.publisher_count(), 1);
    assert_eq!(subscriber2.publisher_count(), 1);

    let message = header(1234, "hello, world!");
    publisher.publish(&message);
    node.spin_once();

    assert_eq!(received1.lock().unwrap().as_slice(), &[message.clone()]);
    assert_eq!(received2.lock().unwrap().as_slice(), &[message]);
}

#[test]
fn test_independent_topics() {
    let fixture = Fixture::start();
    let node = fixture.node("test");

    let (headers, header_callback) = sink::<Header>();
    let subscriber1 =
        node.create_subscriber::<Header, _>("/test_topic", endpoint(2), header_callback);
    assert!(subscriber1.ok());

    let publisher2 = node.create_publisher::<Time>("/other_topic", endpoint(3));
    assert!(publisher2.ok());

    let (times, time_callback) = sink::<Time>();
    let subscriber2 = node.create_subscriber::<Time, _>("/other_topic", endpoint(4), time_callback);
    assert!(subscriber2.ok());

    settle();
    node.spin_once();

    let publisher1 = node.create_publisher::<Header>("/test_topic", endpoint(5));
    assert!(publisher1.ok());

    settle();
    node.spin_once();
    node.spin_once();

    assert_eq!(publisher1.subscriber_count(), 1);
    assert_eq!(publisher2.subscriber_count(), 1);
    assert_eq!(subscriber1.publisher_count(), 1);
    assert_eq!(subscriber2.publisher_count(), 1);

    let head = header(1234, "hello, world!");
    publisher1.publish(&head);
    let time = Time { sec: 456, nsec: 789 };
    publisher2.publish(&time);

    node.spin_once();

    // Each subscriber saw exactly its own topic's message.
    assert_eq!(headers.lock().unwrap().as_slice(), &[head]);
    assert_eq!(times.lock().unwrap().as_slice(), &[time]);
}

#[test]
fn test_cross_node() {
    let fixture = Fixture::start();
    let node1 = fixture.node("alpha");
    let node2 = fixture.node("beta");

    let (headers, header_callback) = sink::<Header>();
    let subscriber1 =
        node1.create_subscriber::<Header, _>("/test_topic", endpoint(3), header_callback);
    assert!(subscriber1.ok());

    let publisher2 = node1.create_publisher::<Time>("/other_topic", endpoint(4));
    assert!(publisher2.ok());

    let (times, time_callback) = sink::<Time>();
    let subscriber2 =
        node2.create_subscriber::<Time, _>("/other_topic", endpoint(5), time_callback);
    assert!(subscriber2.ok());

    settle();
    node2.spin_once();

    let publisher1 = node2.create_publisher::<Header>("/test_topic", endpoint(6));
    assert!(publisher1.ok());

    settle();
    node1.spin_once();
    node2.spin_once();
    node1.spin_once();

    assert_eq!(publisher1.subscriber_count(), 1);
    assert_eq!(publisher2.subscriber_count(), 1);
    assert_eq!(subscriber1.publisher_count(), 1);
    assert_eq!(subscriber2.publisher_count(), 1);

    let head = header(1234, "hello, world!");
    publisher1.publish(&head);
    let time = Time { sec: 456, nsec: 789 };
    publisher2.publish(&time);

    node1.spin_once();
    node2.spin_once();

    assert_eq!(headers.lock().unwrap().as_slice(), &[head]);
    assert_eq!(times.lock().unwrap().as_slice(), &[time]);
}

#[test]
fn test_in_order_delivery() {
    let fixture = Fixture::start();
    let node = fixture.node("test");

    let (received, callback) = sink::<Header>();
    let subscriber = node.create_subscriber::<Header, _>("/ordered", endpoint(2), callback);
    assert!(subscriber.ok());
    let publisher = node.create_publisher::<Header>("/ordered", endpoint(3));
    assert!(publisher.ok());

    settle();
    node.spin_once();
    node.spin_once();
    assert_eq!(publisher.subscriber_count(), 1);

    for seq in 1..=3 {
        publisher.publish(&header(seq, "tick"));
    }
    // One frame is drained per publisher per spin.
    for _ in 0..3 {
        node.spin_once();
    }

    let seqs: Vec<u32> = received.lock().unwrap().iter().map(|m| m.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[test]
fn test_shutdown_is_idempotent() {
    let fixture = Fixture::start();
    let node = fixture.node("test");

    let publisher = node.create_publisher::<Header>("/test_topic", endpoint(2));
    assert!(publisher.ok());

    publisher.shutdown();
    publisher.shutdown();
    assert!(!publisher.ok());

    // Dead components are shed; spinning stays a no-op for them.
    node.spin_once();
    node.spin_once();

    node.shutdown();
    node.shutdown();
    assert!(!node.ok());
}

#[test]
fn test_publish_with_no_subscribers_is_a_no_op() {
    let fixture = Fixture::start();
    let node = fixture.node("test");

    let publisher = node.create_publisher::<Header>("/lonely", endpoint(2));
    assert!(publisher.ok());
    settle();
    node.spin_once();

    assert_eq!(publisher.subscriber_count(), 0);
    publisher.publish(&header(1, "anyone?"));
    assert_eq!(publisher.subscriber_count(), 0);
}
