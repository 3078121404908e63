//! 生成代码的前置变量
//!
//! 在模型生成的代码前注入 `PAGE_TEXT`、`PAGE_URL`、`DATA_URLS` 三个变量，
//! 生成的代码可以直接使用，不必重新抓取页面。

use serde_json::Value as JsonValue;

/// 把页面上下文以 Python 字面量的形式放在代码前面
///
/// JSON 字符串与列表字面量同时也是合法的 Python 字面量
pub fn wrap_code(code: &str, problem_text: &str, url: &str, data_urls: &[String]) -> String {
    let text_literal = JsonValue::from(problem_text).to_string();
    let url_literal = JsonValue::from(url).to_string();
    let urls_literal = JsonValue::from(data_urls.to_vec()).to_string();

    format!(
        "PAGE_TEXT = {}\nPAGE_URL = {}\nDATA_URLS = {}\n\n{}\n",
        text_literal, url_literal, urls_literal, code
    )
}
