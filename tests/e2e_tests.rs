//! End-to-end tests over a real HTTP connection
//!
//! A minimal hyper host wires the serving core into `service_fn`, including
//! host-side conditional evaluation; the client speaks raw HTTP/1.1 over a
//! TCP socket and reads until close.

use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use hyperserve::http::conditional;
use hyperserve::{error_response, DirOptions, DirRoots, FileService, ServeRequest};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn write_tree(files: &[(&str, &[u8])]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
    dir
}

async fn spawn_host(root: PathBuf, opts: DirOptions) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = FileService::new();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let io = TokioIo::new(stream);
            let service = service.clone();
            let root = root.clone();
            let opts = opts.clone();

            tokio::spawn(async move {
                let handler = service_fn(move |req: Request<Incoming>| {
                    let service = service.clone();
                    let root = root.clone();
                    let opts = opts.clone();
                    async move {
                        let ctx = ServeRequest::from_request(&req, None);
                        let roots = DirRoots::single(root);
                        let response = match service.serve_dir(&ctx, &roots, &opts).await {
                            Ok(descriptor) => {
                                // host-side conditional evaluation against the
                                // prepared validators
                                let etag = descriptor
                                    .headers
                                    .get(hyper::header::ETAG)
                                    .and_then(|v| v.to_str().ok())
                                    .map(ToString::to_string);
                                match etag {
                                    Some(etag)
                                        if conditional::etag_matches(
                                            ctx.if_none_match,
                                            &etag,
                                        ) =>
                                    {
                                        // superseded by revalidation: dropping
                                        // the prepared stream releases its
                                        // descriptor
                                        drop(descriptor);
                                        let mut response = hyper::Response::new(
                                            Empty::<hyper::body::Bytes>::new()
                                                .map_err(|never| match never {})
                                                .boxed(),
                                        );
                                        *response.status_mut() =
                                            hyper::StatusCode::NOT_MODIFIED;
                                        if let Ok(value) =
                                            hyper::header::HeaderValue::from_str(&etag)
                                        {
                                            response
                                                .headers_mut()
                                                .insert(hyper::header::ETAG, value);
                                        }
                                        response
                                    }
                                    _ => descriptor.into_response(),
                                }
                            }
                            Err(err) => error_response(&err),
                        };
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, handler)
                    .await;
            });
        }
    });
    addr
}

/// Raw HTTP/1.1 exchange: send one request, read to connection close.
async fn exchange(addr: SocketAddr, request: &str) -> (u16, String, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).to_string();
    let body = raw[split + 4..].to_vec();
    let status: u16 = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .expect("status line");
    (status, head.to_lowercase(), body)
}

#[tokio::test]
async fn full_file_over_the_wire() {
    let dir = write_tree(&[("hello.txt", b"hello over http")]);
    let addr = spawn_host(dir.path().to_path_buf(), DirOptions::default()).await;

    let (status, head, body) = exchange(
        addr,
        "GET /hello.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: text/plain"));
    assert!(head.contains("accept-ranges: bytes"));
    assert!(head.contains("etag: \""));
    assert_eq!(body, b"hello over http");
}

#[tokio::test]
async fn range_request_over_the_wire() {
    let content: Vec<u8> = (0..42010u32).map(|i| (i % 251) as u8).collect();
    let dir = write_tree(&[("blob.bin", content.as_slice())]);
    let addr = spawn_host(dir.path().to_path_buf(), DirOptions::default()).await;

    let (status, head, body) = exchange(
        addr,
        "GET /blob.bin HTTP/1.1\r\nHost: localhost\r\nRange: bytes=42005-42011\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status, 206);
    assert!(head.contains("content-length: 5"));
    assert!(head.contains("content-range: bytes 42005-42009/42010"));
    assert_eq!(body, &content[42005..42010]);
}

#[tokio::test]
async fn unsatisfiable_range_over_the_wire() {
    let dir = write_tree(&[("blob.bin", b"0123456789")]);
    let addr = spawn_host(dir.path().to_path_buf(), DirOptions::default()).await;

    let (status, head, _body) = exchange(
        addr,
        "GET /blob.bin HTTP/1.1\r\nHost: localhost\r\nRange: bytes=99-\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status, 416);
    assert!(head.contains("content-range: bytes */10"));
}

#[tokio::test]
async fn revalidation_gets_304_over_the_wire() {
    let dir = write_tree(&[("page.html", b"<h1>hi</h1>")]);
    let addr = spawn_host(dir.path().to_path_buf(), DirOptions::default()).await;

    let (status, head, _body) = exchange(
        addr,
        "GET /page.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status, 200);
    let etag_line = head
        .lines()
        .find(|line| line.starts_with("etag:"))
        .expect("etag header");
    let etag = etag_line.trim_start_matches("etag:").trim().to_string();

    let (status, _head, body) = exchange(
        addr,
        &format!(
            "GET /page.html HTTP/1.1\r\nHost: localhost\r\nIf-None-Match: {etag}\r\nConnection: close\r\n\r\n"
        ),
    )
    .await;
    assert_eq!(status, 304);
    assert!(body.is_empty());
}

#[tokio::test]
async fn missing_file_is_404_over_the_wire() {
    let dir = write_tree(&[]);
    let addr = spawn_host(dir.path().to_path_buf(), DirOptions::default()).await;

    let (status, _head, body) = exchange(
        addr,
        "GET /nope.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body, b"404 Not Found");
}

#[tokio::test]
async fn directory_index_over_the_wire() {
    let dir = write_tree(&[("docs/index.html", b"<h1>docs index</h1>")]);
    let addr = spawn_host(dir.path().to_path_buf(), DirOptions::default()).await;

    let (status, head, body) = exchange(
        addr,
        "GET /docs/ HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: text/html"));
    assert_eq!(body, b"<h1>docs index</h1>");
}

#[tokio::test]
async fn head_request_over_the_wire() {
    let dir = write_tree(&[("data.txt", b"body text here")]);
    let addr = spawn_host(dir.path().to_path_buf(), DirOptions::default()).await;

    let (status, head, body) = exchange(
        addr,
        "HEAD /data.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status, 200);
    assert!(head.contains("content-length: 14"));
    assert!(body.is_empty());
}
