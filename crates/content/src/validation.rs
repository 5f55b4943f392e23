use crate::ContentError;

/// Validates a logical URL path used as a descriptor key.
///
/// Rejects:
/// - Paths not starting with `/`
/// - Empty segments (`//`) and `.`/`..` segments
/// - Backslashes, query strings and fragments
/// - Control characters
pub fn validate_logical_url(url: &str) -> Result<(), ContentError> {
    if !url.starts_with('/') {
        return Err(ContentError::InvalidUrl(format!(
            "must start with '/': {url}"
        )));
    }

    if url.chars().any(|c| c.is_control() || matches!(c, '\\' | '?' | '#')) {
        return Err(ContentError::InvalidUrl(format!(
            "forbidden character in: {url:?}"
        )));
    }

    if url == "/" {
        return Ok(());
    }

    // A trailing slash is allowed for directory-style URLs.
    let body = url[1..].strip_suffix('/').unwrap_or(&url[1..]);
    for segment in body.split('/') {
        match segment {
            "" => {
                return Err(ContentError::InvalidUrl(format!(
                    "empty path segment in: {url}"
                )));
            }
            "." | ".." => {
                return Err(ContentError::InvalidUrl(format!(
                    "relative segment not allowed in: {url}"
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_root() {
        assert!(validate_logical_url("/").is_ok());
    }

    #[test]
    fn accepts_nested_file() {
        assert!(validate_logical_url("/assets/index.BaRf_7uT.css").is_ok());
    }

    #[test]
    fn accepts_directory_style() {
        assert!(validate_logical_url("/docs/").is_ok());
    }

    #[test]
    fn accepts_dotfile() {
        assert!(validate_logical_url("/.well-known/security.txt").is_ok());
    }

    #[test]
    fn rejects_relative() {
        assert!(validate_logical_url("assets/app.js").is_err());
        assert!(validate_logical_url("").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_logical_url("/assets/../secret").is_err());
        assert!(validate_logical_url("/..").is_err());
    }

    #[test]
    fn rejects_current_dir_segment() {
        assert!(validate_logical_url("/./index.html").is_err());
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(validate_logical_url("//index.html").is_err());
        assert!(validate_logical_url("/a//b").is_err());
    }

    #[test]
    fn rejects_query_and_backslash() {
        assert!(validate_logical_url("/index.html?v=1").is_err());
        assert!(validate_logical_url("/page#top").is_err());
        assert!(validate_logical_url("/a\\b").is_err());
    }
}
