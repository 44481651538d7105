//! `Link` header pagination (RFC 8288), as served by the GitHub REST API.

use reqwest::header::{HeaderMap, LINK};
use url::Url;

/// Find the target of the `rel="next"` link, resolved against the request URL.
///
/// Returns `None` when the header is absent or has no `next` relation, which
/// is the only termination signal the fetch loop uses.
pub fn next_link(headers: &HeaderMap, current: &Url) -> Option<Url> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| find_rel(value, "next"))
        .and_then(|target| current.join(&target).ok())
}

fn find_rel(header: &str, rel: &str) -> Option<String> {
    for link in header.split(',') {
        let link = link.trim();
        let Some(end) = link.find('>') else { continue };
        if !link.starts_with('<') {
            continue;
        }
        let target = &link[1..end];
        let matches = link[end + 1..]
            .split(';')
            .filter_map(|param| param.trim().split_once('='))
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case("rel"))
            .any(|(_, value)| {
                value
                    .trim()
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|r| r.eq_ignore_ascii_case(rel))
            });
        if matches {
            return Some(target.to_string());
        }
    }
    None
}
