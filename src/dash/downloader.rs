use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::USER_AGENT;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{dash::segment::Segment, DashlsError, DashlsResult};

const QUEUE_CAPACITY: usize = 100;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DownloadTask {
    pub segment: Segment,
    /// Where the outcome of this task is delivered.
    pub results: mpsc::Sender<DownloadResult>,
}

pub struct DownloadResult {
    pub segment: Segment,
    pub payload: DashlsResult<Bytes>,
}

/// Fixed-size worker pool over a bounded task queue.
///
/// Enqueueing into a full queue applies backpressure to the producer. Each
/// task gets up to [`MAX_ATTEMPTS`] tries with a per-attempt deadline and a
/// fixed backoff in between; the terminal outcome, success or failure, is
/// always delivered to the task's result sink.
pub struct Downloader {
    queue: StdMutex<Option<mpsc::Sender<DownloadTask>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

impl Downloader {
    pub fn new(client: reqwest::Client, user_agent: Option<String>, workers: usize) -> Self {
        Self::with_request_timeout(client, user_agent, workers, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_request_timeout(
        client: reqwest::Client,
        user_agent: Option<String>,
        workers: usize,
        request_timeout: Duration,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let fetcher = Arc::new(SegmentFetcher {
            client,
            user_agent,
            request_timeout,
        });

        let handles = (0..workers)
            .map(|worker_id| {
                let queue_rx = queue_rx.clone();
                let fetcher = fetcher.clone();
                tokio::spawn(worker(worker_id, queue_rx, fetcher))
            })
            .collect();

        Self {
            queue: StdMutex::new(Some(queue_tx)),
            workers: StdMutex::new(handles),
        }
    }

    /// Queue a segment for download. Blocks while the queue is full; fails
    /// once the pool has been stopped.
    pub async fn enqueue(&self, task: DownloadTask) -> DashlsResult<()> {
        let queue = { self.queue.lock().unwrap().clone() };
        match queue {
            Some(queue) => queue
                .send(task)
                .await
                .map_err(|_| DashlsError::PoolClosed),
            None => Err(DashlsError::PoolClosed),
        }
    }

    /// Close the queue and wait for the workers to drain outstanding tasks.
    /// The pool cannot be reused afterwards.
    pub async fn stop(&self) {
        drop(self.queue.lock().unwrap().take());
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn worker(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<DownloadTask>>>,
    fetcher: Arc<SegmentFetcher>,
) {
    debug!(worker_id, "download worker started");

    loop {
        let task = { queue.lock().await.recv().await };
        let Some(task) = task else { break };

        let payload = fetcher.download(&task.segment).await;
        let result = DownloadResult {
            segment: task.segment,
            payload,
        };
        if task.results.send(result).await.is_err() {
            warn!(worker_id, "result sink closed, dropping download outcome");
        }
    }

    debug!(worker_id, "download worker finished");
}

struct SegmentFetcher {
    client: reqwest::Client,
    user_agent: Option<String>,
    request_timeout: Duration,
}

impl SegmentFetcher {
    async fn download(&self, segment: &Segment) -> DashlsResult<Bytes> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                segment = %segment.id,
                url = %segment.url,
                attempt,
                max_attempts = MAX_ATTEMPTS,
                "downloading segment"
            );

            match self.attempt(segment).await {
                Ok(data) => {
                    debug!(segment = %segment.id, size = data.len(), "downloaded segment");
                    return Ok(data);
                }
                Err(error) if attempt < MAX_ATTEMPTS => {
                    warn!(segment = %segment.id, attempt, %error, "segment download attempt failed");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(error) => {
                    return Err(DashlsError::DownloadFailed {
                        id: segment.id.clone(),
                        attempts: MAX_ATTEMPTS,
                        source: Box::new(error),
                    });
                }
            }
        }
    }

    /// One HTTP attempt. The deadline covers the full attempt including the
    /// body read; each retry gets a fresh deadline.
    async fn attempt(&self, segment: &Segment) -> DashlsResult<Bytes> {
        let mut request = self.client.get(segment.url.clone());
        if let Some(user_agent) = &self.user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        tokio::time::timeout(self.request_timeout, async move {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(DashlsError::HttpStatus(response.status()));
            }
            Ok(response.bytes().await?)
        })
        .await?
    }
}
