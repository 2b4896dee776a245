use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{AppResult, FileError};

/// 以 base64 内联上传的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFile {
    pub mime_type: String,
    /// base64 编码后的内容
    pub data: String,
}

impl InlineFile {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// 读取本地文件，根据扩展名推断 MIME 类型
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| FileError::ReadFailed {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::from_bytes(mime_type_for(path), &bytes))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_text(&self) -> bool {
        self.mime_type.starts_with("text/")
    }

    /// PDF 等只能以附件形式上传的资料
    pub fn is_document(&self) -> bool {
        !self.is_image() && !self.is_text()
    }

    /// 文本文件解码为字符串
    pub fn decode_text(&self) -> Option<String> {
        let bytes = STANDARD.decode(&self.data).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// `data:` URL 形式
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url() {
        let file = InlineFile::from_bytes("image/png", b"abc");
        assert_eq!(file.to_data_url(), "data:image/png;base64,YWJj");
        assert!(file.is_image());
        assert!(!file.is_document());
    }

    #[test]
    fn test_text_round_trip() {
        let file = InlineFile::from_bytes("text/plain", "细胞分裂".as_bytes());
        assert_eq!(file.decode_text().as_deref(), Some("细胞分裂"));
    }

    #[test]
    fn test_mime_type_for_extension() {
        assert_eq!(mime_type_for(Path::new("notes.JPG")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("chapter.pdf")), "application/pdf");
        assert_eq!(mime_type_for(Path::new("blob")), "application/octet-stream");
    }
}
