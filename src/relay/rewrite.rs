//! Pure pieces of the relay contract: prefix routing and `Location`
//! rewriting.

use url::Url;

/// Strip the relay's routing prefix from a request path
///
/// Returns the upstream path (always starting with `/`) or `None` when the
/// path is not under `prefix`.
pub fn strip_route_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Move an absolute redirect target onto the relay's data prefix
///
/// `http://dn:9864/webhdfs/v1/a?op=CREATE` becomes
/// `/datanode-api/webhdfs/v1/a?op=CREATE`. Relative or unparsable targets
/// yield `None` and are forwarded untouched.
pub fn rewrite_location(location: &str, data_prefix: &str) -> Option<String> {
    let target = Url::parse(location.trim()).ok()?;
    if target.cannot_be_a_base() {
        return None;
    }
    let mut rewritten = format!("{}{}", data_prefix.trim_end_matches('/'), target.path());
    if let Some(query) = target.query() {
        rewritten.push('?');
        rewritten.push_str(query);
    }
    Some(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_route_prefix() {
        assert_eq!(strip_route_prefix("/namenode-api/a/b", "/namenode-api"), Some("/a/b"));
        assert_eq!(strip_route_prefix("/namenode-api", "/namenode-api"), Some("/"));
        assert_eq!(strip_route_prefix("/namenode-api/", "/namenode-api/"), Some("/"));
        assert_eq!(strip_route_prefix("/namenode-apix/a", "/namenode-api"), None);
        assert_eq!(strip_route_prefix("/other/a", "/namenode-api"), None);
    }

    #[test]
    fn test_rewrite_location() {
        assert_eq!(
            rewrite_location(
                "http://dn1:9864/webhdfs/v1/test/a%20b.txt?op=CREATE&namenoderpcaddress=nn:8020&overwrite=true",
                "/datanode-api"
            )
            .as_deref(),
            Some("/datanode-api/webhdfs/v1/test/a%20b.txt?op=CREATE&namenoderpcaddress=nn:8020&overwrite=true")
        );
        assert_eq!(
            rewrite_location("https://dn1/x", "/datanode-api/").as_deref(),
            Some("/datanode-api/x")
        );
        assert_eq!(rewrite_location("/datanode-api/x", "/datanode-api"), None);
        assert_eq!(rewrite_location("mailto:someone", "/datanode-api"), None);
    }
}
