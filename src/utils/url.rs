use crate::error::{Result, ViewerError};
use reqwest::Url;
use std::path::Path;

/// Collapse `.` and `..` segments and repeated slashes of a slash-separated path,
/// following POSIX `normpath` rules (an empty result becomes `.`).
pub fn normpath(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    // POSIX keeps exactly two leading slashes, but folds three or more into one
    let leading = if path.starts_with("//") && !path.starts_with("///") {
        2
    } else if path.starts_with('/') {
        1
    } else {
        0
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." if leading == 0 && (parts.is_empty() || parts.last() == Some(&"..")) => {
                parts.push(part)
            }
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    let normalised = format!("{}{}", "/".repeat(leading), parts.join("/"));
    if normalised.is_empty() {
        ".".to_string()
    } else {
        normalised
    }
}

/// Byte range of the path component of `url`, i.e. what sits between the
/// authority (or scheme) and the first `?` or `#`.
fn path_span(url: &str) -> (usize, usize) {
    let after_scheme = url.find(':').map(|i| i + 1).unwrap_or(0);
    let start = if url[after_scheme..].starts_with("//") {
        let authority = after_scheme + 2;
        url[authority..]
            .find(['/', '?', '#'])
            .map(|i| authority + i)
            .unwrap_or(url.len())
    } else {
        after_scheme
    };
    let end = url[start..]
        .find(['?', '#'])
        .map(|i| start + i)
        .unwrap_or(url.len());
    (start, end)
}

/// Normalise the path part of a URL by resolving `.` and `..`.
///
/// Scheme, host, query and fragment are kept byte-for-byte, so tile templates
/// like `{z}/{x}/{y}` and nested `url=` query values come through untouched.
/// A trailing slash survives when the input path had one.
pub fn normalize_url_path(url: &str) -> Result<String> {
    Url::parse(url).map_err(|e| ViewerError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let (start, end) = path_span(url);
    let path = &url[start..end];
    if path.is_empty() {
        return Ok(url.to_string());
    }

    let mut normalised = normpath(path);
    if path.ends_with('/') && !normalised.ends_with('/') {
        normalised.push('/');
    }

    Ok(format!("{}{}{}", &url[..start], normalised, &url[end..]))
}

/// Append `path` to `base` and normalise the result. Absolute URLs in `path`
/// are only normalised.
pub fn join_url(base: &str, path: &str) -> Result<String> {
    if is_url(path) {
        return normalize_url_path(path);
    }
    normalize_url_path(&format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

pub fn is_url(location: &str) -> bool {
    location.contains("://")
}

/// Form-encode `value` for use as a single query parameter value, so an href
/// carrying its own `?`, `&` or `#` reaches the server whole.
pub fn encode_query_value(value: &str) -> Result<String> {
    const SCRATCH: &str = "http://localhost/";
    let mut scratch = Url::parse(SCRATCH).map_err(|e| ViewerError::InvalidUrl {
        url: SCRATCH.to_string(),
        message: e.to_string(),
    })?;
    scratch.query_pairs_mut().append_pair("v", value);
    Ok(scratch
        .query()
        .and_then(|query| query.strip_prefix("v="))
        .unwrap_or_default()
        .to_string())
}

/// Resolve an href found inside the document at `location` (a URL or a
/// filesystem path) the way STAC links are resolved: relative to the
/// document's directory.
pub fn resolve_relative(location: &str, href: &str) -> Result<String> {
    if is_url(href) {
        return normalize_url_path(href);
    }

    if is_url(location) {
        let (start, end) = path_span(location);
        let dir_end = location[start..end]
            .rfind('/')
            .map(|i| start + i)
            .unwrap_or(end);
        return join_url(&location[..dir_end], href);
    }

    if Path::new(href).is_absolute() {
        return Ok(normpath(href));
    }
    let dir = Path::new(location)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    if dir.is_empty() {
        Ok(normpath(href))
    } else {
        Ok(normpath(&format!("{}/{}", dir, href)))
    }
}
