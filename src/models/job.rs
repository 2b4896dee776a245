use super::media::InlineFile;

/// 远程长任务句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncJobHandle {
    /// 远程任务名称，如 `models/veo/operations/abc123`
    pub name: String,
    pub done: bool,
    /// 只有 `done` 为 true 时才有意义
    pub result_locator: Option<String>,
}

impl AsyncJobHandle {
    /// 刚提交、尚未完成的任务
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            result_locator: None,
        }
    }

    pub fn completed(name: impl Into<String>, locator: Option<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            result_locator: locator,
        }
    }
}

/// 视频生成请求
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    /// 可选的首帧图片
    pub image: Option<InlineFile>,
    pub aspect_ratio: String,
    pub resolution: String,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            aspect_ratio: "16:9".to_string(),
            resolution: "720p".to_string(),
        }
    }

    pub fn with_image(mut self, image: InlineFile) -> Self {
        self.image = Some(image);
        self
    }
}
