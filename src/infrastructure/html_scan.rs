//! 从页面 HTML 中提取音频、数据文件和图片的地址

use anyhow::Result;
use regex::Regex;
use reqwest::Url;

use crate::models::{PageResources, ResourceKind};

/// 扫描 HTML，返回按出现顺序去重后的绝对 URL
///
/// - `<audio src>` / `<source src>` 以及指向音频文件的链接 → 音频
/// - 指向数据文件（csv、xlsx 等）的链接 → 数据
/// - `<img src>` → 图片
pub fn scan_resources(html: &str, page_url: &str) -> Result<PageResources> {
    let base = Url::parse(page_url).ok();

    let media_re = Regex::new(r#"(?is)<(audio|source)\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#)?;
    let link_re = Regex::new(r#"(?is)<a\b[^>]*?\shref\s*=\s*["']([^"']+)["']"#)?;
    let img_re = Regex::new(r#"(?is)<img\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#)?;

    let mut resources = PageResources::default();

    for cap in media_re.captures_iter(html) {
        let tag = cap[1].to_ascii_lowercase();
        let src = &cap[2];
        // <source> 也可能属于 <video> / <picture>，只接受音频扩展名或无法判断的 <audio src>
        let is_audio = tag == "audio" || ResourceKind::from_url(src) == Some(ResourceKind::Audio);
        if is_audio {
            push_unique(&mut resources.audio_urls, resolve(base.as_ref(), src));
        }
    }

    for cap in link_re.captures_iter(html) {
        let href = &cap[1];
        match ResourceKind::from_url(href) {
            Some(ResourceKind::Audio) => {
                push_unique(&mut resources.audio_urls, resolve(base.as_ref(), href))
            }
            Some(ResourceKind::Data) => {
                push_unique(&mut resources.data_urls, resolve(base.as_ref(), href))
            }
            _ => {}
        }
    }

    for cap in img_re.captures_iter(html) {
        let src = &cap[1];
        if src.starts_with("data:") {
            continue;
        }
        push_unique(&mut resources.image_urls, resolve(base.as_ref(), src));
    }

    Ok(resources)
}

/// 相对地址按页面 URL 解析；无法解析时保留原样
fn resolve(base: Option<&Url>, reference: &str) -> String {
    let reference = reference.trim();
    match base {
        Some(base) => base
            .join(reference)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| reference.to_string()),
        None => reference.to_string(),
    }
}

fn push_unique(list: &mut Vec<String>, url: String) {
    if !url.is_empty() && !list.contains(&url) {
        list.push(url);
    }
}
