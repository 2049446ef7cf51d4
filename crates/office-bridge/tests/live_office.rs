//! Transport tests against a running office listener.
//!
//! These need an office started with a socket listener:
//!    soffice --headless --accept="socket,host=localhost,port=2002;urp;StarOffice.ServiceManager"
//!
//! If nothing listens on localhost:2002, all tests are skipped.

use std::time::Duration;

use office_bridge::{ConnectionDescriptor, SocketConnector, TransportConnector};

const DESCRIPTOR: &str = "uno:socket,host=localhost,port=2002;urp;StarOffice.ServiceManager";

/// Check if an office listener is available on localhost:2002.
fn office_available() -> bool {
    std::net::TcpStream::connect_timeout(
        &"127.0.0.1:2002".parse().unwrap(),
        Duration::from_secs(2),
    )
    .is_ok()
}

/// Skip this test if no office is listening.
macro_rules! skip_if_no_office {
    () => {
        if !office_available() {
            eprintln!(
                "SKIP: no office listener on localhost:2002.\n\
                 Start one with:\n  \
                 soffice --headless --accept=\"socket,host=localhost,port=2002;urp;StarOffice.ServiceManager\""
            );
            return;
        }
    };
}

#[tokio::test]
async fn test_open_and_close_channel() {
    skip_if_no_office!();

    let descriptor = ConnectionDescriptor::parse(DESCRIPTOR).expect("descriptor");
    let channel = SocketConnector::new()
        .connect(&descriptor.transport_spec)
        .await
        .unwrap_or_else(|e| panic!("Failed to open {}: {e}", descriptor.transport_spec));

    let desc = channel.description();
    assert!(desc.ends_with("peerPort=2002"), "unexpected description: {desc}");

    channel.close().await.expect("close");
    eprintln!("OK: opened and closed {desc}");
}
