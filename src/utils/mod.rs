use anyhow::Result;
use url::Url;

/// Validate a URL and return normalized version
pub fn validate_and_normalize_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed.to_string())
}

/// Sanitize a title for use as a filename: control characters are stripped,
/// filesystem-illegal characters become underscores, and human-readable
/// scripts (CJK included) pass through untouched.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "transcript".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_and_normalize_url() {
        assert!(validate_and_normalize_url("https://youtube.com/watch?v=abc").is_ok());
        assert!(validate_and_normalize_url("http://example.com").is_ok());
        assert!(validate_and_normalize_url("ftp://example.com").is_err());
        assert!(validate_and_normalize_url("not-a-url").is_err());
    }

    #[test]
    fn test_sanitize_title_replaces_illegal_characters() {
        assert_eq!(sanitize_title("a/b\\c:d*e"), "a_b_c_d_e");
        assert_eq!(sanitize_title("what? \"quotes\" <here>"), "what_ _quotes_ _here_");
    }

    #[test]
    fn test_sanitize_title_preserves_cjk() {
        assert_eq!(sanitize_title("財報分析 2024"), "財報分析 2024");
    }

    #[test]
    fn test_sanitize_title_strips_control_characters() {
        assert_eq!(sanitize_title("re\u{0}port\n"), "report");
    }

    #[test]
    fn test_sanitize_title_falls_back_when_empty() {
        assert_eq!(sanitize_title("   "), "transcript");
        assert_eq!(sanitize_title(""), "transcript");
    }
}
