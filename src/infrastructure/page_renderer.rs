//! 页面渲染器 - 基础设施层
//!
//! 持有唯一的 Browser 资源，只暴露"把 URL 渲染成页面快照"的能力

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use tracing::{debug, warn};

use crate::error::BrowserError;
use crate::infrastructure::html_scan::scan_resources;
use crate::models::PageContext;
use crate::services::ContentSource;

const BODY_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// 页面渲染器
///
/// 职责：
/// - 持有 Browser
/// - 每次抓取打开新标签页，结束后关闭
/// - 不认识题目 / 答案
pub struct PageRenderer {
    browser: Browser,
    render_timeout: Duration,
}

impl PageRenderer {
    pub fn new(browser: Browser, render_timeout: Duration) -> Self {
        Self {
            browser,
            render_timeout,
        }
    }

    /// 渲染页面，整个过程受渲染超时限制
    pub async fn render(&self, url: &str) -> Result<PageContext> {
        debug!("渲染页面: {}", url);

        match tokio::time::timeout(self.render_timeout, self.open_and_capture(url)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::RenderTimeout {
                url: url.to_string(),
                timeout_ms: self.render_timeout.as_millis() as u64,
            }
            .into()),
        }
    }

    async fn open_and_capture(&self, url: &str) -> Result<PageContext> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let captured = capture(&page, url).await;
        if let Err(e) = page.close().await {
            debug!("关闭标签页失败: {}", e);
        }
        captured
    }
}

async fn capture(page: &Page, url: &str) -> Result<PageContext> {
    page.wait_for_navigation().await?;

    let text: String = page.evaluate(BODY_TEXT_JS).await?.into_value()?;
    let html = page.content().await?;

    let screenshot = match page
        .screenshot(ScreenshotParams::builder().full_page(true).build())
        .await
    {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("截图失败 ({}): {}", url, e);
            None
        }
    };

    let resources = scan_resources(&html, url)?;
    debug!(
        "页面文本 {} 字符，音频 {}，数据文件 {}，图片 {}",
        text.chars().count(),
        resources.audio_urls.len(),
        resources.data_urls.len(),
        resources.image_urls.len()
    );

    Ok(PageContext {
        url: url.to_string(),
        text,
        html,
        screenshot,
        resources,
    })
}

#[async_trait]
impl ContentSource for PageRenderer {
    async fn fetch(&self, url: &str) -> Result<PageContext> {
        self.render(url).await
    }
}
