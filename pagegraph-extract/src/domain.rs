use url::{Host, Url};

/// eTLD+1 of a URL's host according to the public suffix list.
///
/// IP literals and hosts without a registrable part (e.g. `localhost`)
/// yield the host itself. Unparseable or host-less URLs yield `None`.
pub fn registrable_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    match parsed.host()? {
        Host::Domain(host) => {
            let host = host.trim_end_matches('.');
            Some(
                psl::domain_str(host)
                    .unwrap_or(host)
                    .to_ascii_lowercase(),
            )
        }
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registrable_domain() {
        assert_eq!(
            registrable_domain("https://static.cdn.example.co.uk/a.js").as_deref(),
            Some("example.co.uk")
        );
        assert_eq!(
            registrable_domain("https://www.example.com/").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn test_ip_and_localhost_use_host() {
        assert_eq!(
            registrable_domain("http://127.0.0.1:8080/").as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(
            registrable_domain("http://localhost/").as_deref(),
            Some("localhost")
        );
    }

    #[test]
    fn test_unparseable_url() {
        assert_eq!(registrable_domain("not a url"), None);
        assert_eq!(registrable_domain("about:blank"), None);
    }
}
