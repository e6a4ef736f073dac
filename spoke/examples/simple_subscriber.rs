//! Print every `Header` published on `/chatter`.
//!
//! Start the hub example first, then:
//!
//! ```sh
//! RUST_LOG=debug cargo run --example simple_subscriber
//! ```

use spoke::msg::Header;
use spoke::{Endpoint, Node, TcpTransport, DEFAULT_HUB_PORT};

fn main() {
    spoke::dev_tracing::init_tracing();

    let hub = Endpoint::new("127.0.0.1", DEFAULT_HUB_PORT);
    let node = Node::new(
        "simple_subscriber",
        hub,
        TcpTransport::server_factory(),
        TcpTransport::client_factory(),
    );

    let subscriber = node.create_subscriber::<Header, _>(
        "/chatter",
        Endpoint::new("127.0.0.1", 7901),
        |msg: Header| println!("received message {} : {}", msg.seq, msg.frame_id),
    );
    if !subscriber.ok() {
        eprintln!("failed to create subscriber");
        std::process::exit(1);
    }

    node.spin(|| false);
}
