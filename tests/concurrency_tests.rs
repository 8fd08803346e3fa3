//! Concurrency and resource-accounting tests
//!
//! The coalescing property is observed through the cache counters; the
//! descriptor-release property through `/proc/self/fd` introspection.

use http_body_util::BodyExt;
use hyperserve::{FileOptions, FileService, PathSource, ServeError, ServeRequest};
use hyper::header;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn write_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn confined(dir: &tempfile::TempDir) -> FileOptions {
    FileOptions {
        confine: Some(dir.path().to_path_buf()),
        ..FileOptions::default()
    }
}

#[tokio::test]
async fn concurrent_identical_requests_hash_once() {
    let dir = tempfile::tempdir().unwrap();
    // large enough that hashing suspends and requests overlap
    write_file(&dir, "big.bin", &vec![0xA5u8; 512 * 1024]);

    let service = Arc::new(FileService::new());
    let opts = Arc::new(confined(&dir));

    let mut tasks = Vec::new();
    for _ in 0..24 {
        let service = Arc::clone(&service);
        let opts = Arc::clone(&opts);
        tasks.push(tokio::spawn(async move {
            let descriptor = service
                .serve_file(
                    &ServeRequest::default(),
                    &PathSource::from("big.bin"),
                    &opts,
                )
                .await
                .unwrap();
            descriptor
                .headers
                .get(header::ETAG)
                .unwrap()
                .to_str()
                .unwrap()
                .to_string()
        }));
    }

    let mut etags = Vec::new();
    for task in tasks {
        etags.push(task.await.unwrap());
    }
    assert!(etags.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(service.cache_stats().computations, 1);
}

#[tokio::test]
async fn shared_hash_failure_fails_all_requesters() {
    let service = Arc::new(FileService::new());
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service
                .serve_file(
                    &ServeRequest::default(),
                    &PathSource::Fixed("/no/such/file.bin".into()),
                    &FileOptions::default(),
                )
                .await
        }));
    }
    for task in tasks {
        assert!(matches!(task.await.unwrap(), Err(ServeError::NotFound)));
    }
}

#[cfg(target_os = "linux")]
fn fds_pointing_to(target: &Path) -> usize {
    std::fs::read_dir("/proc/self/fd")
        .unwrap()
        .filter_map(Result::ok)
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter(|link| link == target)
        .count()
}

#[cfg(target_os = "linux")]
async fn wait_for_release(target: &Path) {
    // tokio closes dropped files on the blocking pool; poll briefly
    for _ in 0..100 {
        if fds_pointing_to(target) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("descriptor for {} still open", target.display());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn descriptors_released_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "served.bin", &vec![1u8; 128 * 1024]);
    let service = FileService::new();

    let descriptor = service
        .serve_file(
            &ServeRequest::default(),
            &PathSource::from("served.bin"),
            &confined(&dir),
        )
        .await
        .unwrap();
    assert!(fds_pointing_to(&path) > 0, "stream should hold the descriptor");

    let body = descriptor.into_response().into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    assert_eq!(bytes.len(), 128 * 1024);

    wait_for_release(&path).await;
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn descriptors_released_on_aborted_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "aborted.bin", &vec![2u8; 256 * 1024]);
    let service = FileService::new();

    let descriptor = service
        .serve_file(
            &ServeRequest::default(),
            &PathSource::from("aborted.bin"),
            &confined(&dir),
        )
        .await
        .unwrap();
    // client went away: the response is dropped without reading a byte
    drop(descriptor);

    wait_for_release(&path).await;
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn descriptors_released_on_range_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "ranged.bin", b"0123456789");
    let service = FileService::new();

    let req = ServeRequest {
        range: Some("bytes=9-0"),
        ..ServeRequest::default()
    };
    let err = service
        .serve_file(&req, &PathSource::from("ranged.bin"), &confined(&dir))
        .await
        .unwrap_err();
    assert!(matches!(err, ServeError::RangeNotSatisfiable { .. }));

    wait_for_release(&path).await;
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn descriptors_released_on_directory_condition() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("subdir");
    std::fs::create_dir(&sub).unwrap();
    let service = FileService::new();

    let err = service
        .serve_file(
            &ServeRequest::default(),
            &PathSource::Fixed(sub.clone()),
            &FileOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServeError::Forbidden { .. }));

    wait_for_release(&sub).await;
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn descriptors_released_after_head() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "head.bin", b"headless body");
    let service = FileService::new();

    let req = ServeRequest {
        head: true,
        ..ServeRequest::default()
    };
    let descriptor = service
        .serve_file(&req, &PathSource::from("head.bin"), &confined(&dir))
        .await
        .unwrap();
    assert_eq!(descriptor.body_len(), Some(0));

    wait_for_release(&path).await;
}

#[tokio::test]
async fn cache_hit_survives_across_requests() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir, "hot.txt", b"frequently requested");
    let service = FileService::new();
    let opts = confined(&dir);
    let source = PathSource::from("hot.txt");

    service
        .serve_file(&ServeRequest::default(), &source, &opts)
        .await
        .unwrap();
    service
        .serve_file(&ServeRequest::default(), &source, &opts)
        .await
        .unwrap();

    let stats = service.cache_stats();
    assert_eq!(stats.computations, 1);
    assert_eq!(stats.hits, 1);
}
