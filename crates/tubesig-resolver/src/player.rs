//! Video id normalization and player script discovery.

use once_cell::sync::Lazy;
use regex::Regex;
use tubesig_core::{Error, Result};
use url::Url;

#[allow(clippy::expect_used)] // Literal pattern
static JS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:jsUrl|PLAYER_JS_URL)"\s*:\s*"(?P<path>[^"]*?(?:\\/|/)s(?:\\/|/)player(?:\\/|/)[^"]+)""#)
        .expect("valid jsUrl pattern")
});

#[allow(clippy::expect_used)] // Literal pattern
static LOCALE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/[a-z]{2}_[A-Z]{2}/").expect("valid locale pattern"));

/// Normalize a bare id or a watch/share URL to a video id.
///
/// Accepts `watch?v=<id>`, `youtu.be/<id>`, `/embed/<id>`, `/shorts/<id>`
/// and bare ids.
pub fn video_id(input: &str) -> Result<String> {
    let input = input.trim();
    let looks_like_url =
        input.contains("://") || input.contains("youtube.com/") || input.contains("youtu.be/");

    let candidate = if looks_like_url {
        let absolute = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{input}")
        };
        let url = Url::parse(&absolute)
            .map_err(|e| Error::InvalidVideoId(format!("{input}: {e}")))?;
        id_from_url(&url).ok_or_else(|| Error::InvalidVideoId(input.to_string()))?
    } else {
        input.to_string()
    };

    if is_valid_id(&candidate) {
        Ok(candidate)
    } else {
        Err(Error::InvalidVideoId(input.to_string()))
    }
}

fn id_from_url(url: &Url) -> Option<String> {
    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
        return Some(id.into_owned());
    }

    let mut segments = url.path_segments()?;
    if url.host_str()?.ends_with("youtu.be") {
        return segments.next().map(str::to_string);
    }
    match segments.next()? {
        "embed" | "shorts" | "live" | "v" => segments.next().map(str::to_string),
        _ => None,
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Absolute player script URL referenced by the page, if any.
///
/// JSON-escaped slashes are undone, the locale segment is pinned to `en_US`
/// and relative paths are resolved against `origin`.
pub fn script_url(page: &str, origin: &str) -> Option<String> {
    let path = JS_URL.captures(page)?.name("path")?.as_str().replace("\\/", "/");
    let path = LOCALE_SEGMENT.replace(&path, "/en_US/");

    let url = if path.starts_with("http://") || path.starts_with("https://") {
        path.into_owned()
    } else if let Some(rest) = path.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("{}{path}", origin.trim_end_matches('/'))
    };
    Some(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://www.youtube.com";

    #[test]
    fn test_bare_id() {
        assert_eq!(video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(video_id("  a-b_c  ").unwrap(), "a-b_c");
    }

    #[test]
    fn test_watch_urls() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            video_id("youtube.com/watch?feature=share&v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ?si=x").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(
            video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_invalid_ids() {
        assert!(matches!(video_id(""), Err(Error::InvalidVideoId(_))));
        assert!(matches!(video_id("not an id"), Err(Error::InvalidVideoId(_))));
        assert!(matches!(
            video_id("https://www.youtube.com/feed/trending"),
            Err(Error::InvalidVideoId(_))
        ));
    }

    #[test]
    fn test_script_url_relative_and_escaped() {
        let page = r#"ytcfg.set({"jsUrl":"\/s\/player\/abc123\/player_ias.vflset\/de_DE\/base.js","x":1});"#;
        assert_eq!(
            script_url(page, ORIGIN).unwrap(),
            "https://www.youtube.com/s/player/abc123/player_ias.vflset/en_US/base.js"
        );
    }

    #[test]
    fn test_script_url_plain() {
        let page = r#"{"jsUrl":"/s/player/abc123/player_ias.vflset/en_US/base.js"}"#;
        assert_eq!(
            script_url(page, "http://127.0.0.1:9000/").unwrap(),
            "http://127.0.0.1:9000/s/player/abc123/player_ias.vflset/en_US/base.js"
        );
    }

    #[test]
    fn test_script_url_absolute() {
        let page = r#""PLAYER_JS_URL": "https://cdn.test/s/player/ff/base.js""#;
        assert_eq!(
            script_url(page, ORIGIN).unwrap(),
            "https://cdn.test/s/player/ff/base.js"
        );
    }

    #[test]
    fn test_script_url_missing() {
        assert!(script_url("<html></html>", ORIGIN).is_none());
        assert!(script_url(r#"{"jsUrl":"/other/base.js"}"#, ORIGIN).is_none());
    }
}
