use onion_common::Platform;
use onion_installer::{Installer, InstallerConfig};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::thread;

/// Minimal HTTP/1.1 responder good enough to drive `ensure_present` end
/// to end without a real network.
struct FakeIndex {
    addr: std::net::SocketAddr,
}

impl FakeIndex {
    fn start(routes: Vec<(String, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(s) => s,
                    Err(_) => break,
                };
                let routes = routes.clone();
                thread::spawn(move || handle(stream, &routes));
            }
        });

        Self { addr }
    }

    fn base_url(&self) -> String {
        format!("http://{}/torbrowser/", self.addr)
    }
}

fn handle(mut stream: TcpStream, routes: &[(String, Vec<u8>)]) {
    let mut buf = [0u8; 4096];
    let n = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(_) => return,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    match routes.iter().find(|(p, _)| *p == path) {
        Some((_, body)) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(body);
        }
        None => {
            let header = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = stream.write_all(header.as_bytes());
        }
    }
}

fn build_fixture_bundle(dir: &Path, exe_name: &str) -> Vec<u8> {
    let staging = dir.join("staging");
    let bin_dir = staging.join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    std::fs::write(bin_dir.join(exe_name), b"#!/bin/sh\necho fake tor\n").unwrap();

    let archive_path = dir.join("bundle.tar.gz");
    let status = std::process::Command::new("tar")
        .arg("-czf")
        .arg(&archive_path)
        .arg("-C")
        .arg(&staging)
        .arg("bin")
        .status()
        .expect("system tar must be available to build the test fixture");
    assert!(status.success());

    std::fs::read(&archive_path).unwrap()
}

#[tokio::test]
async fn ensure_present_downloads_verifies_and_extracts() {
    let os = Platform::os_token();
    let arch = Platform::arch_token().unwrap();
    let version = "14.5.1";
    let exe_name = Platform::exe_name("tor");
    let bundle_name = format!("tor-expert-bundle-{os}-{arch}-{version}.tar.gz");

    let work = tempfile::tempdir().unwrap();
    let bundle_bytes = build_fixture_bundle(work.path(), &exe_name);
    let digest = hex::encode(Sha256::digest(&bundle_bytes));

    let index_html = format!(r#"<a href="{version}/">{version}/</a>"#);
    let checksums = format!("{digest} *{bundle_name}\n");

    let server = FakeIndex::start(vec![
        ("/torbrowser/".to_string(), index_html.into_bytes()),
        (
            format!("/torbrowser/{version}/sha256sums-unsigned-build.txt"),
            checksums.into_bytes(),
        ),
        (
            format!("/torbrowser/{version}/{bundle_name}"),
            bundle_bytes,
        ),
    ]);

    let install_root = tempfile::tempdir().unwrap();
    let mut installer = Installer::new(InstallerConfig {
        install_root: install_root.path().to_path_buf(),
        require_gpg: false,
        allowed_fingerprints: vec![],
        index_base_url: Some(server.base_url()),
    });

    let bin_path = installer
        .ensure_present(false)
        .await
        .expect("installer pipeline should succeed against the fake index");

    assert!(bin_path.exists());
    assert!(bin_path.to_string_lossy().contains("bin"));

    // Idempotence: a second call without force_download must not error and
    // must return a path to the same already-installed binary.
    let second = installer.ensure_present(false).await.unwrap();
    assert_eq!(bin_path, second);
}
