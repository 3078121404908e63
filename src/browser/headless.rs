use std::path::Path;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tracing::{debug, error, info};

use crate::error::BrowserError;

/// 启动无头浏览器
///
/// 整个进程只启动一个浏览器，每次抓取页面时再打开新的标签页
///
/// # 参数
/// - `chrome_executable`: 浏览器可执行文件路径（为空时自动查找）
pub async fn launch_headless_browser(chrome_executable: Option<&str>) -> Result<Browser> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--remote-debugging-port=0",
    ]);
    if let Some(path) = chrome_executable {
        debug!("使用浏览器: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        BrowserError::LaunchFailed { reason: e }
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        BrowserError::LaunchFailed {
            reason: e.to_string(),
        }
    })?;

    // 在后台处理浏览器事件；服务常驻，单条消息出错不退出
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                debug!("浏览器事件处理出错: {}", e);
            }
        }
        debug!("浏览器事件循环结束");
    });

    info!("✅ 无头浏览器已启动");
    Ok(browser)
}
