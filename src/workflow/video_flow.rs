//! 视频生成流程 - 流程层
//!
//! 提交 → 轮询 → 下载。被取消或超时返回 `None`。

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::VideoRequest;
use crate::orchestrator::{CancelSignal, JobPoller, PollOutcome};
use crate::services::VideoBackend;

/// 视频生成流程
pub struct VideoFlow<B> {
    backend: Arc<B>,
    poller: JobPoller<Arc<B>>,
}

impl<B: VideoBackend> VideoFlow<B> {
    pub fn new(backend: Arc<B>, config: &Config) -> Self {
        let poller = JobPoller::new(backend.clone())
            .with_interval(config.poll_interval())
            .with_deadline(config.poll_deadline());
        Self { backend, poller }
    }

    /// 生成视频并下载
    ///
    /// # 返回
    /// 返回视频字节；收到取消信号或超过截止时间时返回 `None`
    pub async fn run(
        &self,
        request: &VideoRequest,
        cancel: &CancelSignal,
    ) -> AppResult<Option<Vec<u8>>> {
        let handle = self.backend.submit_video(request).await?;

        match self.poller.poll_until_done(handle, cancel).await? {
            PollOutcome::Completed(locator) => {
                info!("⬇️ 下载视频: {}", locator);
                let bytes = self.backend.download(&locator).await?;
                Ok(Some(bytes))
            }
            PollOutcome::Cancelled => {
                info!("视频生成已取消");
                Ok(None)
            }
            PollOutcome::DeadlineExceeded => {
                warn!("视频生成超时，已停止等待");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::AsyncJobHandle;
    use crate::orchestrator::cancel_pair;
    use crate::services::JobBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 第 N 次查询时完成
    struct FakeVideoBackend {
        finish_after: usize,
        locator: Option<String>,
        queries: AtomicUsize,
        downloaded: Mutex<Vec<String>>,
    }

    impl FakeVideoBackend {
        fn new(finish_after: usize, locator: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                finish_after,
                locator: locator.map(str::to_string),
                queries: AtomicUsize::new(0),
                downloaded: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl JobBackend for FakeVideoBackend {
        async fn refresh(&self, handle: &AsyncJobHandle) -> AppResult<AsyncJobHandle> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.finish_after {
                Ok(AsyncJobHandle::completed(handle.name.clone(), self.locator.clone()))
            } else {
                Ok(AsyncJobHandle::pending(handle.name.clone()))
            }
        }
    }

    #[async_trait]
    impl VideoBackend for FakeVideoBackend {
        async fn submit_video(&self, request: &VideoRequest) -> AppResult<AsyncJobHandle> {
            Ok(AsyncJobHandle::pending(format!("operations/{}", request.prompt.len())))
        }

        async fn download(&self, locator: &str) -> AppResult<Vec<u8>> {
            self.downloaded.lock().unwrap().push(locator.to_string());
            Ok(b"mp4".to_vec())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_and_download() {
        let backend = FakeVideoBackend::new(3, Some("https://host/v.mp4"));
        let flow = VideoFlow::new(backend.clone(), &Config::default());

        let bytes = flow
            .run(&VideoRequest::new("a cell dividing"), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(bytes.as_deref(), Some(&b"mp4"[..]));
        assert_eq!(backend.queries.load(Ordering::SeqCst), 3);
        assert_eq!(
            backend.downloaded.lock().unwrap().as_slice(),
            &["https://host/v.mp4".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_video_uri() {
        let backend = FakeVideoBackend::new(1, None);
        let flow = VideoFlow::new(backend.clone(), &Config::default());

        let err = flow
            .run(&VideoRequest::new("prompt"), &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MissingResult { .. }));
        assert!(backend.downloaded.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_returns_none() {
        let backend = FakeVideoBackend::new(usize::MAX, Some("L"));
        let flow = VideoFlow::new(backend.clone(), &Config::default());
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let bytes = flow.run(&VideoRequest::new("prompt"), &signal).await.unwrap();

        assert!(bytes.is_none());
        assert!(backend.downloaded.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_from_config() {
        let backend = FakeVideoBackend::new(usize::MAX, Some("L"));
        let config = Config {
            poll_deadline_secs: Some(30),
            ..Config::default()
        };
        let flow = VideoFlow::new(backend.clone(), &config);

        let bytes = flow
            .run(&VideoRequest::new("prompt"), &CancelSignal::never())
            .await
            .unwrap();

        assert!(bytes.is_none());
        assert_eq!(backend.queries.load(Ordering::SeqCst), 5);
    }
}
