use std::time::{Duration, Instant};

use dashls::{
    dash::{
        downloader::{DownloadTask, Downloader},
        segment::Segment,
    },
    DashlsError,
};
use tokio::sync::mpsc;
use url::Url;
use wiremock::{
    matchers::{header, method},
    Mock, MockServer, ResponseTemplate,
};

fn segment(uri: &str, id: &str) -> Segment {
    Segment {
        url: Url::parse(uri).unwrap(),
        id: id.to_string(),
        time: 0,
        duration: 0,
        rep_id: "v1".to_string(),
        is_init: false,
    }
}

#[tokio::test]
async fn test_download_success() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "test-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("segment data"))
        .mount(&server)
        .await;

    let downloader = Downloader::new(reqwest::Client::new(), Some("test-agent".to_string()), 2);
    let (results_tx, mut results_rx) = mpsc::channel(1);
    downloader
        .enqueue(DownloadTask {
            segment: segment(&server.uri(), "1"),
            results: results_tx,
        })
        .await?;

    let result = results_rx.recv().await.expect("download result");
    assert_eq!(&result.payload?[..], b"segment data");

    downloader.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_download_retry_then_success() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("final segment data"))
        .mount(&server)
        .await;

    let downloader = Downloader::new(reqwest::Client::new(), Some("test-agent".to_string()), 1);
    let (results_tx, mut results_rx) = mpsc::channel(1);
    downloader
        .enqueue(DownloadTask {
            segment: segment(&server.uri(), "2"),
            results: results_tx,
        })
        .await?;

    let result = results_rx.recv().await.expect("download result");
    assert_eq!(&result.payload?[..], b"final segment data");

    let requests = server.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 3, "expected exactly 3 attempts");

    downloader.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_download_per_attempt_timeout() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("this should not be sent")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let downloader = Downloader::with_request_timeout(
        reqwest::Client::new(),
        Some("test-agent".to_string()),
        1,
        Duration::from_millis(100),
    );
    let (results_tx, mut results_rx) = mpsc::channel(1);
    let started = Instant::now();
    downloader
        .enqueue(DownloadTask {
            segment: segment(&server.uri(), "3"),
            results: results_tx,
        })
        .await?;

    let result = results_rx.recv().await.expect("download result");
    let error = result.payload.expect_err("expected a timeout failure");
    assert!(error.to_string().contains("after 3 attempts"));
    assert!(error.to_string().contains("deadline"));
    // Three timed-out attempts plus backoff must stay well under the test
    // budget; a single deadline stretched across retries would not.
    assert!(started.elapsed() < Duration::from_secs(2));

    downloader.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_download_failure_after_retries() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let downloader = Downloader::new(reqwest::Client::new(), Some("test-agent".to_string()), 1);
    let (results_tx, mut results_rx) = mpsc::channel(1);
    downloader
        .enqueue(DownloadTask {
            segment: segment(&server.uri(), "4"),
            results: results_tx,
        })
        .await?;

    let result = results_rx.recv().await.expect("download result");
    let error = result.payload.expect_err("expected a terminal failure");
    assert!(error
        .to_string()
        .contains("failed to download segment 4 after 3 attempts"));

    let requests = server.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 3, "expected exactly 3 attempts");

    downloader.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_enqueue_after_stop_fails() {
    let downloader = Downloader::new(reqwest::Client::new(), None, 1);
    downloader.stop().await;

    let (results_tx, _results_rx) = mpsc::channel(1);
    let error = downloader
        .enqueue(DownloadTask {
            segment: segment("http://127.0.0.1:9/", "5"),
            results: results_tx,
        })
        .await
        .expect_err("stopped pool must reject tasks");
    assert!(matches!(error, DashlsError::PoolClosed));
}
