use onion_control::{ControlClient, ControlEvent};
use std::io::Write;
use std::net::TcpListener;
use std::path::PathBuf;

/// Spins up a fake control-port listener that authenticates then replays a
/// fixed script of reply lines whenever it sees a request containing a
/// given marker. Good enough to exercise `ControlClient` end to end
/// without a real tor daemon.
fn start_fake_control_port(script: Vec<(&'static str, &'static str)>) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            use std::io::{BufRead, BufReader};
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();

            // AUTHENTICATE
            reader.read_line(&mut line).unwrap();
            assert!(line.starts_with("AUTHENTICATE "));
            stream.write_all(b"250 OK\r\n").unwrap();

            loop {
                line.clear();
                let n = reader.read_line(&mut line).unwrap();
                if n == 0 {
                    break;
                }
                let matched = script.iter().find(|(marker, _)| line.starts_with(marker));
                if let Some((_, reply)) = matched {
                    stream.write_all(reply.as_bytes()).unwrap();
                } else {
                    stream.write_all(b"510 Unrecognized\r\n").unwrap();
                }
            }
        }
    });

    addr
}

fn write_cookie(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("control_auth_cookie");
    std::fs::write(&path, [0xde, 0xad, 0xbe, 0xef]).unwrap();
    path
}

#[tokio::test]
async fn connect_authenticates_and_correlates_new_onion() {
    let addr = start_fake_control_port(vec![(
        "ADD_ONION NEW:",
        "250-ServiceID=freshservice\r\n250-PrivateKey=ED25519-V3:secret\r\n250 OK\r\n",
    )]);
    let dir = tempfile::tempdir().unwrap();
    let cookie = write_cookie(&dir);

    let mut client = ControlClient::connect(addr, &cookie).await.unwrap();
    client
        .send_new_onion("label-a".to_string(), 9001)
        .await
        .unwrap();

    let event = client.next_event().await.unwrap();
    match event {
        ControlEvent::NewOnionReady {
            label_hint,
            service_id,
            private_key,
        } => {
            assert_eq!(label_hint, Some("label-a".to_string()));
            assert_eq!(service_id, "freshservice.onion");
            assert_eq!(private_key, Some("ED25519-V3:secret".to_string()));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn connect_authenticates_and_correlates_known_onion() {
    let addr = start_fake_control_port(vec![(
        "ADD_ONION ED25519-V3",
        "250-ServiceID=knownservice\r\n250 OK\r\n",
    )]);
    let dir = tempfile::tempdir().unwrap();
    let cookie = write_cookie(&dir);

    let mut client = ControlClient::connect(addr, &cookie).await.unwrap();
    client.send_known_onion("ED25519-V3:abc", 9002).await.unwrap();

    let event = client.next_event().await.unwrap();
    match event {
        ControlEvent::KnownOnionReady { service_id } => {
            assert_eq!(service_id, "knownservice.onion");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn bad_cookie_auth_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            use std::io::BufRead;
            let mut reader = std::io::BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            stream.write_all(b"515 Authentication failed\r\n").unwrap();
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let cookie = write_cookie(&dir);
    let result = ControlClient::connect(addr, &cookie).await;
    assert!(result.is_err());
}
