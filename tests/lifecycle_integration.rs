//! End-to-end lifecycle tests against an in-process job server
//!
//! Each test binds a real TCP listener on a loopback port and speaks the
//! line protocol, so create/validate/destroy run over actual sockets with
//! no external services involved.

use queuewire::{
    Bind, Connection, ConnectionFactory, ConnectionState, Endpoint, Error, FactoryConfig,
    HelloHandshake, TcpBinder,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

/// Bind a loopback listener and return it with its endpoint.
///
/// Also wires up tracing output for `RUST_LOG`-driven debugging; the
/// first caller wins, later calls are no-ops.
async fn listen() -> (TcpListener, Endpoint) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, Endpoint::new("127.0.0.1", port))
}

/// Accept one client, run the banner/HELLO/OK exchange, then drain lines
/// until the client says END or hangs up. Returns the HELLO line.
fn spawn_server(listener: TcpListener, banner: &'static str) -> JoinHandle<String> {
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(banner.as_bytes()).await.unwrap();
        write.write_all(b"\r\n").await.unwrap();

        let hello = lines.next_line().await.unwrap().unwrap();
        assert!(hello.starts_with("HELLO "));
        write.write_all(b"+OK\r\n").await.unwrap();

        while let Ok(Some(line)) = lines.next_line().await {
            if line == "END" {
                break;
            }
        }
        hello
    })
}

/// Configuration with a backoff short enough for tests that hit the
/// failure path under real time
fn fast_backoff(endpoint: Endpoint) -> FactoryConfig {
    FactoryConfig::builder(endpoint)
        .backoff_step(Duration::from_millis(1))
        .build()
}

#[tokio::test]
async fn test_create_validate_destroy_roundtrip() {
    let (listener, endpoint) = listen().await;
    let server = spawn_server(listener, "+HI {\"v\":2}");

    let factory = ConnectionFactory::from_config(
        FactoryConfig::new(endpoint),
        HelloHandshake::new().hostname("itest"),
    );

    let conn = factory.create().await.unwrap();
    assert!(factory.validate(&conn));
    assert_eq!(conn.state(), ConnectionState::Ready);
    assert_eq!(factory.attempts(), 0);

    assert_ok!(factory.destroy(conn).await);

    let hello = server.await.unwrap();
    assert!(hello.contains("\"hostname\":\"itest\""));
    assert!(hello.contains("\"v\":2"));
}

#[tokio::test]
async fn test_worker_handshake_carries_wid_and_labels() {
    let (listener, endpoint) = listen().await;
    let server = spawn_server(listener, "+HI {\"v\":2}");

    let handshake = HelloHandshake::worker()
        .worker_id("wid-itest-1")
        .label("integration");
    let factory = ConnectionFactory::from_config(FactoryConfig::new(endpoint), handshake);

    let conn = factory.create().await.unwrap();
    factory.destroy(conn).await.unwrap();

    let hello = server.await.unwrap();
    assert!(hello.contains("\"wid\":\"wid-itest-1\""));
    assert!(hello.contains("\"labels\":[\"integration\"]"));
}

#[tokio::test]
async fn test_password_handshake_against_salted_server() {
    let (listener, endpoint) = listen().await;

    // Digest of "top-secret" against this salt at 1545 iterations
    const EXPECTED: &str = "eb67f56d36ab395d4506a50d98b14d2f47daeeca24e9d69a5401bf68a7f1bab1";

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        write
            .write_all(b"+HI {\"v\":2,\"s\":\"55104dc76695721d\",\"i\":1545}\r\n")
            .await
            .unwrap();

        let hello = lines.next_line().await.unwrap().unwrap();
        let authenticated = hello.contains(EXPECTED);
        if authenticated {
            write.write_all(b"+OK\r\n").await.unwrap();
        } else {
            write.write_all(b"-ERR invalid password\r\n").await.unwrap();
        }
        authenticated
    });

    let factory = ConnectionFactory::from_config(
        FactoryConfig::new(endpoint),
        HelloHandshake::worker().password("top-secret"),
    );

    let conn = factory.create().await.unwrap();
    assert!(server.await.unwrap());
    factory.destroy(conn).await.unwrap();
}

#[tokio::test]
async fn test_rejected_handshake_fails_create_and_counts() {
    let (listener, endpoint) = listen().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"+HI {\"v\":2}\r\n").await.unwrap();
        let _hello = lines.next_line().await.unwrap();
        write
            .write_all(b"-ERR worker quota exhausted\r\n")
            .await
            .unwrap();
    });

    let factory = ConnectionFactory::from_config(fast_backoff(endpoint), HelloHandshake::new());

    let err = factory.create().await.unwrap_err();
    match err {
        Error::Handshake(msg) => assert!(msg.contains("quota")),
        other => panic!("expected handshake error, got {}", other),
    }
    assert_eq!(factory.attempts(), 1);
}

#[tokio::test]
async fn test_connection_refused_backs_off_and_reraises() {
    // Bind then drop to obtain a port nothing listens on
    let (listener, endpoint) = listen().await;
    drop(listener);

    let factory = ConnectionFactory::from_config(fast_backoff(endpoint), HelloHandshake::new());

    for expected in 1..=3 {
        let err = factory.create().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(factory.attempts(), expected);
    }
}

#[tokio::test]
async fn test_malformed_greeting_fails_open_and_reaches_sink() {
    let (listener, endpoint) = listen().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"+WELCOME to nothing\r\n").await.unwrap();
    });

    let factory = ConnectionFactory::from_config(fast_backoff(endpoint), HelloHandshake::new());

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    factory.set_error_sink(Arc::new(move |err: &Error| {
        sink_seen.lock().unwrap().push(err.to_string());
    }));

    let err = factory.create().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("banner"));
}

#[tokio::test]
async fn test_unterminated_oversized_banner_is_rejected() {
    let (listener, endpoint) = listen().await;

    // 9 KiB of banner with no CRLF in sight
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        write.write_all(&[b'x'; 9 * 1024]).await.unwrap();
        // Hold the socket open until the client gives up
        let _ = BufReader::new(read).lines().next_line().await;
    });

    let factory = ConnectionFactory::from_config(fast_backoff(endpoint), HelloHandshake::new());

    let err = factory.create().await.unwrap_err();
    match err {
        Error::Protocol(msg) => assert!(msg.contains("without terminator")),
        other => panic!("expected protocol error, got {}", other),
    }
    assert_eq!(factory.attempts(), 1);
}

#[tokio::test]
async fn test_server_hangup_before_reply_is_connection_closed() {
    let (listener, endpoint) = listen().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"+HI {\"v\":2}\r\n").await.unwrap();
        // Receive the HELLO, then hang up without answering
        let _ = lines.next_line().await;
    });

    let factory = ConnectionFactory::from_config(fast_backoff(endpoint), HelloHandshake::new());

    let err = factory.create().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
    assert_eq!(factory.attempts(), 1);
}

#[tokio::test]
async fn test_close_hook_fires_on_destroy() {
    let (listener, endpoint) = listen().await;
    let server = spawn_server(listener, "+HI {\"v\":2}");

    let factory =
        ConnectionFactory::from_config(FactoryConfig::new(endpoint), HelloHandshake::new());

    let conn = factory.create().await.unwrap();

    let closed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&closed);
    conn.on_close(Box::new(move || {
        flag.store(true, Ordering::SeqCst);
    }));

    assert_ok!(factory.destroy(conn).await);
    assert!(closed.load(Ordering::SeqCst));

    server.await.unwrap();
}

#[tokio::test]
async fn test_validate_blind_to_unobserved_hangup() {
    let (listener, endpoint) = listen().await;

    // Server that hangs up right after accepting the handshake
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"+HI {\"v\":2}\r\n").await.unwrap();
        let _ = lines.next_line().await;
        write.write_all(b"+OK\r\n").await.unwrap();
    });

    let factory =
        ConnectionFactory::from_config(FactoryConfig::new(endpoint), HelloHandshake::new());

    let conn = factory.create().await.unwrap();
    server.await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The socket is gone, but nothing here read the hangup. The flag
    // never saw the death, and validate does not probe.
    assert!(factory.validate(&conn));

    factory.destroy(conn).await.unwrap();
}

#[tokio::test]
async fn test_raw_connection_open_surfaces_greeting() {
    let (listener, endpoint) = listen().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        write
            .write_all(b"+HI {\"v\":2,\"s\":\"abc\",\"i\":3}\r\n")
            .await
            .unwrap();
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(_)) = lines.next_line().await {}
    });

    let mut conn = TcpBinder::new(endpoint).bind();
    assert!(!conn.connected());

    let greeting = conn.open().await.unwrap();
    assert_eq!(greeting.version, 2);
    assert_eq!(greeting.salt.as_deref(), Some("abc"));
    assert_eq!(greeting.iterations, Some(3));
    assert_eq!(conn.state(), ConnectionState::Handshaking);
    assert!(conn.connected());

    conn.close().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(!conn.connected());
}

#[tokio::test]
async fn test_sequential_creates_share_one_factory() {
    let (listener, endpoint) = listen().await;

    // Serve three sequential clients with the same exchange
    tokio::spawn(async move {
        for _ in 0..3 {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            write.write_all(b"+HI {\"v\":2}\r\n").await.unwrap();
            let _ = lines.next_line().await;
            write.write_all(b"+OK\r\n").await.unwrap();
            while let Ok(Some(line)) = lines.next_line().await {
                if line == "END" {
                    break;
                }
            }
        }
    });

    let factory =
        ConnectionFactory::from_config(FactoryConfig::new(endpoint), HelloHandshake::worker());

    for _ in 0..3 {
        let conn = factory.create().await.unwrap();
        assert!(factory.validate(&conn));
        factory.destroy(conn).await.unwrap();
    }
    assert_eq!(factory.attempts(), 0);
}
