//! 核心工具函数

/// 截断长文本用于日志输出，按字符边界截断
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_for_log("[[],[],[],[]]", 100), "[[],[],[],[]]");
    }

    #[test]
    fn test_truncate_long_text() {
        let text = "a".repeat(150);
        let out = truncate_for_log(&text, 100);
        assert_eq!(out.len(), 103);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_multibyte() {
        let out = truncate_for_log("模块注册表", 2);
        assert_eq!(out, "模块...");
    }
}
