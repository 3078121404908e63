//! 音频转写服务 - 业务能力层
//!
//! 下载音频，调用兼容 OpenAI 的 `/audio/transcriptions` 接口。
//! 接口拒绝原始格式时用 ffmpeg 转成 MP3 后重试一次。

use std::process::Stdio;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::TranscriptionError;
use crate::models::ResourceKind;
use crate::services::Transcriber;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize)]
struct TranscriptionReply {
    #[serde(default)]
    text: String,
}

/// 音频转写服务
pub struct TranscriptionService {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model_name: String,
}

impl TranscriptionService {
    pub fn new(config: &Config, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        let api_base = config
            .llm_api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model_name: config.transcription_model_name.clone(),
        })
    }

    async fn download(&self, audio_url: &str) -> Result<Vec<u8>, TranscriptionError> {
        let failed = |message: String| TranscriptionError::DownloadFailed {
            url: audio_url.to_string(),
            message,
        };

        let response = self
            .http
            .get(audio_url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status().as_u16())));
        }
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn request_transcript(&self, audio: Vec<u8>, file_name: String) -> Result<String> {
        let part = Part::bytes(audio)
            .file_name(file_name.clone())
            .mime_str(mime_for(&file_name))?;
        let form = Form::new()
            .text("model", self.model_name.clone())
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TranscriptionError::BadResponse {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let reply: TranscriptionReply = serde_json::from_str(&body)?;
        Ok(reply.text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for TranscriptionService {
    async fn transcribe(&self, audio_url: &str) -> Result<String> {
        debug!("转写音频: {}", audio_url);
        let audio = self.download(audio_url).await?;
        let file_name = file_name_for(audio_url);

        let text = match self.request_transcript(audio.clone(), file_name).await {
            Ok(text) => text,
            Err(first_error) => {
                warn!("直接转写失败，转换为 MP3 后重试: {}", first_error);
                let mp3 = convert_to_mp3(audio).await?;
                self.request_transcript(mp3, "audio.mp3".to_string()).await?
            }
        };

        if text.is_empty() {
            return Err(TranscriptionError::EmptyTranscript {
                url: audio_url.to_string(),
            }
            .into());
        }
        debug!("转写完成，{} 字符", text.chars().count());
        Ok(text)
    }
}

/// 上传时使用的文件名，保留原扩展名以便接口识别格式
fn file_name_for(audio_url: &str) -> String {
    match ResourceKind::extension(audio_url) {
        Some(ext) if ResourceKind::from_url(audio_url) == Some(ResourceKind::Audio) => {
            format!("audio.{}", ext)
        }
        _ => "audio.mp3".to_string(),
    }
}

fn mime_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next().unwrap_or_default() {
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "audio/mpeg",
    }
}

/// 通过 ffmpeg 管道把任意音频转成 MP3
async fn convert_to_mp3(audio: Vec<u8>) -> Result<Vec<u8>, TranscriptionError> {
    let mut child = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0", "-f", "mp3", "pipe:1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TranscriptionError::ConversionFailed {
            message: format!("无法启动 ffmpeg: {}", e),
        })?;

    // 边写边读，避免管道写满后互相等待
    let writer = child.stdin.take().map(|mut stdin| {
        tokio::spawn(async move {
            let _ = stdin.write_all(&audio).await;
        })
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| TranscriptionError::ConversionFailed {
            message: e.to_string(),
        })?;
    if let Some(writer) = writer {
        let _ = writer.await;
    }

    if !output.status.success() || output.stdout.is_empty() {
        return Err(TranscriptionError::ConversionFailed {
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_keeps_audio_extension() {
        assert_eq!(file_name_for("https://x/clip.opus?sig=1"), "audio.opus");
        assert_eq!(file_name_for("https://x/CLIP.WAV"), "audio.wav");
        assert_eq!(file_name_for("https://x/stream"), "audio.mp3");
        assert_eq!(file_name_for("https://x/data.csv"), "audio.mp3");
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("audio.wav"), "audio/wav");
        assert_eq!(mime_for("audio.opus"), "audio/ogg");
        assert_eq!(mime_for("audio.mp3"), "audio/mpeg");
    }

    #[tokio::test]
    async fn test_unreachable_audio_is_download_error() {
        let config = Config::default();
        let service = TranscriptionService::new(&config, Duration::from_secs(2)).unwrap();
        let err = service.transcribe("http://127.0.0.1:9/clip.mp3").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranscriptionError>(),
            Some(TranscriptionError::DownloadFailed { .. })
        ));
    }
}
