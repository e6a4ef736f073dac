//! Run a rendezvous hub on the default port.
//!
//! ```sh
//! RUST_LOG=debug cargo run --example hub
//! ```

use spoke::{Endpoint, Hub, TcpTransport, DEFAULT_HUB_PORT};

fn main() {
    spoke::dev_tracing::init_tracing();

    let endpoint = Endpoint::new("0.0.0.0", DEFAULT_HUB_PORT);
    let hub = Hub::new(
        endpoint.clone(),
        TcpTransport::server_factory(),
        TcpTransport::client_factory(),
    );
    if !hub.ok() {
        eprintln!("failed to bind hub on {endpoint}");
        std::process::exit(1);
    }

    println!("hub listening on {endpoint}");
    hub.spin();
}
