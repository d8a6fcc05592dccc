use url::Url;

/// Whether `url` loads in the same origin host as `context_url`.
///
/// `about:blank` and URLs without a host inherit their context, so they are
/// always local. Hosts and ports are compared after URL parsing: host case is
/// ignored and a port equal to the scheme default is treated as absent, so
/// `https://a.com:443/` is local to `https://A.com/`. The scheme is not
/// compared.
pub fn is_url_local(url: &str, context_url: &str) -> bool {
    if url == "about:blank" {
        return true;
    }
    let Ok(parsed) = Url::parse(url) else {
        // relative references have no host of their own
        return true;
    };
    let Some(host) = parsed.host_str() else {
        return true;
    };
    match Url::parse(context_url) {
        Ok(context) => context.host_str() == Some(host) && context.port() == parsed.port(),
        Err(_) => false,
    }
}

/// Replaces the last path segment with an empty one, keeping the directory:
/// `https://a.com/x/idx_3` becomes `https://a.com/x/`.
///
/// URLs that cannot be parsed, or cannot have a path, are returned as is.
pub fn strip_url_index(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if let Ok(mut segments) = parsed.path_segments_mut() {
        segments.pop().push("");
    }
    parsed.to_string()
}

/// Appends an `idx_<idx>` segment to the URL path. The inverse of
/// [`strip_url_index`] for URLs whose path ends in `/`.
pub fn add_url_index(url: &str, idx: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if let Ok(mut segments) = parsed.path_segments_mut() {
        segments.pop_if_empty().push(&format!("idx_{}", idx));
    }
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_same_host() {
        assert!(is_url_local("https://a.com/frame.html", "https://a.com/"));
        assert!(is_url_local("http://a.com/frame.html", "https://a.com/"));
        assert!(!is_url_local("https://b.com/", "https://a.com/"));
        assert!(!is_url_local("https://sub.a.com/", "https://a.com/"));
    }

    #[test]
    fn test_local_default_port_and_case() {
        assert!(is_url_local("https://a.com:443/", "https://a.com/"));
        assert!(is_url_local("https://A.COM/", "https://a.com/"));
        assert!(!is_url_local("https://a.com:8443/", "https://a.com/"));
    }

    #[test]
    fn test_local_without_host() {
        assert!(is_url_local("about:blank", "https://a.com/"));
        assert!(is_url_local("/relative/frame.html", "https://a.com/"));
        assert!(is_url_local("data:text/html,hi", "https://a.com/"));
        assert!(!is_url_local("https://a.com/", "not a url"));
    }

    #[test]
    fn test_strip_keeps_directory() {
        assert_eq!(strip_url_index("https://a.com/x/idx_3"), "https://a.com/x/");
        assert_eq!(strip_url_index("https://a.com/idx_0"), "https://a.com/");
    }

    #[test]
    fn test_strip_preserves_query() {
        assert_eq!(
            strip_url_index("https://a.com/x/idx_1?q=1"),
            "https://a.com/x/?q=1"
        );
    }

    #[test]
    fn test_add_index_on_root() {
        assert_eq!(add_url_index("https://a.com/", "2"), "https://a.com/idx_2");
    }
}
