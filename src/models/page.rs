//! 单次抓取得到的页面快照

/// 页面中发现的附属资源（均为绝对 URL，按出现顺序去重）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResources {
    pub audio_urls: Vec<String>,
    pub data_urls: Vec<String>,
    pub image_urls: Vec<String>,
}

/// 页面快照
///
/// 抓取后不再修改。`text` 始终是渲染得到的原始文本，提交答案时只使用它；
/// 追加了转写和资源提示的文本由 [`PageContext::augmented_text`] 生成，只用于推理。
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub url: String,
    pub text: String,
    pub html: String,
    /// 整页截图（PNG）
    pub screenshot: Option<Vec<u8>>,
    pub resources: PageResources,
}

/// 单个音频的转写结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub url: String,
    pub text: String,
}

impl PageContext {
    pub fn audio_urls(&self) -> &[String] {
        &self.resources.audio_urls
    }

    pub fn data_urls(&self) -> &[String] {
        &self.resources.data_urls
    }

    pub fn image_urls(&self) -> &[String] {
        &self.resources.image_urls
    }

    /// 在原始文本后追加音频转写段落和数据文件提示段落
    pub fn augmented_text(&self, transcripts: &[Transcript]) -> String {
        let mut text = self.text.clone();

        if !transcripts.is_empty() {
            text.push_str("\n\n[Audio transcripts]\n");
            for transcript in transcripts {
                text.push_str(&format!("- {}:\n{}\n", transcript.url, transcript.text.trim()));
            }
        }

        if !self.resources.data_urls.is_empty() {
            text.push_str("\n\n[Data resources]\n");
            text.push_str(
                "The following data files are linked from the page. \
                 Download them with an HTTP client instead of re-fetching the page:\n",
            );
            for url in &self.resources.data_urls {
                text.push_str(&format!("- {}\n", url));
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageContext {
        PageContext {
            url: "https://quiz.example/q1".to_string(),
            text: "What is the sum of the value column?".to_string(),
            resources: PageResources {
                data_urls: vec!["https://quiz.example/data.csv".to_string()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_augmented_text_appends_sections() {
        let transcripts = vec![Transcript {
            url: "https://quiz.example/a.opus".to_string(),
            text: " only count rows where id is even \n".to_string(),
        }];

        let augmented = page().augmented_text(&transcripts);

        assert!(augmented.starts_with("What is the sum of the value column?"));
        assert!(augmented.contains("[Audio transcripts]"));
        assert!(augmented.contains("only count rows where id is even"));
        assert!(augmented.contains("[Data resources]"));
        assert!(augmented.contains("- https://quiz.example/data.csv"));
    }

    #[test]
    fn test_augmented_text_keeps_original_untouched() {
        let page = page();
        let _ = page.augmented_text(&[]);
        assert_eq!(page.text, "What is the sum of the value column?");
    }

    #[test]
    fn test_augmented_text_without_extras() {
        let page = PageContext {
            text: "plain".to_string(),
            ..Default::default()
        };
        assert_eq!(page.augmented_text(&[]), "plain");
    }
}
