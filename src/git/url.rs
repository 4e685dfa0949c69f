//! Repository URL helpers: validation, normalisation, and naming.
//!
//! Accepted forms:
//! - `https://host/owner/repo[.git]` and `http://...`, optionally with credentials
//! - `ssh://[user@]host[:port]/owner/repo[.git]`
//! - SSH short form `user@host:owner/repo[.git]` (typically `git@...`)
//! - `file:///absolute/path` for local mirrors

use crate::core::SpecLedgerError;

const NETWORK_SCHEMES: [&str; 3] = ["https://", "http://", "ssh://"];

fn invalid(url: &str, reason: &str) -> SpecLedgerError {
    SpecLedgerError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// `user@host:path` without a scheme.
#[must_use]
pub fn is_ssh_short_form(url: &str) -> bool {
    if url.contains("://") {
        return false;
    }
    let Some((user, rest)) = url.split_once('@') else {
        return false;
    };
    let Some((host, path)) = rest.split_once(':') else {
        return false;
    };
    !user.is_empty()
        && !user.contains('/')
        && is_host(host)
        && !path.is_empty()
        && !path.starts_with('/')
}

fn is_host(host: &str) -> bool {
    !host.is_empty() && host.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

/// Check that `url` is one of the accepted Git URL forms.
pub fn validate_git_url(url: &str) -> Result<(), SpecLedgerError> {
    if url.trim().is_empty() {
        return Err(invalid(url, "must not be empty"));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(invalid(url, "must not contain whitespace"));
    }

    if let Some(rest) = NETWORK_SCHEMES.iter().find_map(|s| url.strip_prefix(s)) {
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        let host = host_port.split_once(':').map_or(host_port, |(h, port)| {
            if port.chars().all(|c| c.is_ascii_digit()) { h } else { "" }
        });
        if !is_host(host) {
            return Err(invalid(url, "missing or malformed host"));
        }
        if path.trim_matches('/').is_empty() {
            return Err(invalid(url, "missing repository path"));
        }
        return Ok(());
    }

    if let Some(path) = url.strip_prefix("file://") {
        if path.is_empty() {
            return Err(invalid(url, "missing repository path"));
        }
        return Ok(());
    }

    if is_ssh_short_form(url) {
        return Ok(());
    }

    Err(invalid(url, "expected http(s)://, ssh://, file:// or user@host:path"))
}

#[must_use]
pub fn is_valid_git_url(url: &str) -> bool {
    validate_git_url(url).is_ok()
}

/// Remove `user:token@` from http(s) URLs.
#[must_use]
pub fn strip_auth_from_url(url: &str) -> String {
    for scheme in ["https://", "http://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            let authority_end = rest.find('/').unwrap_or(rest.len());
            if let Some(at) = rest[..authority_end].rfind('@') {
                return format!("{scheme}{}", &rest[at + 1..]);
            }
        }
    }
    url.to_string()
}

/// Canonical `host/path` form used to compare two URLs for the same repository.
///
/// Scheme, credentials, port, trailing `/` and `.git` are dropped and the host
/// is lowercased, so `git@github.com:o/r.git` and `https://GitHub.com/o/r`
/// normalise identically. `file://` URLs keep a `file:` prefix.
#[must_use]
pub fn normalize_repo_url(url: &str) -> String {
    let url = url.trim();
    let (host, path) = if let Some(path) = url.strip_prefix("file://") {
        ("file:".to_string(), path.to_string())
    } else if let Some(rest) = NETWORK_SCHEMES.iter().find_map(|s| url.strip_prefix(s)) {
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        let host = host_port.split_once(':').map_or(host_port, |(h, _)| h);
        (host.to_lowercase(), path.to_string())
    } else if is_ssh_short_form(url) {
        let rest = url.split_once('@').map_or(url, |(_, r)| r);
        let (host, path) = rest.split_once(':').unwrap_or((rest, ""));
        (host.to_lowercase(), path.to_string())
    } else {
        (String::new(), url.to_string())
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path).trim_matches('/');
    if host == "file:" {
        format!("file:/{path}")
    } else if host.is_empty() {
        path.to_string()
    } else {
        format!("{host}/{path}")
    }
}

/// Same repository, ignoring scheme, credentials and `.git`.
#[must_use]
pub fn same_repository(a: &str, b: &str) -> bool {
    normalize_repo_url(a) == normalize_repo_url(b)
}

/// Directory-safe slug: lowercase, runs of non-alphanumerics collapsed to `-`,
/// `.git` suffix removed.
#[must_use]
pub fn url_slug(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let mut slug = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Last path segment without `.git`, e.g. `repo` for `git@host:owner/repo.git`.
#[must_use]
pub fn repo_name(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed).to_string()
}

/// Alias suggested for a URL when none is given: the repository name,
/// lowercased, with characters outside `[a-z0-9_-]` replaced by `-`.
#[must_use]
pub fn derive_alias(url: &str) -> String {
    let alias: String = repo_name(url)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect();
    alias.trim_matches('-').to_string()
}
