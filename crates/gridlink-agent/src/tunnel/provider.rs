//! Tunnel provider descriptions and URL detection

use std::fmt;

use gridlink_core::config::TunnelProviderConfig;

/// Which configured provider produced a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelProviderKind {
    Primary,
    Fallback,
}

impl fmt::Display for TunnelProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelProviderKind::Primary => write!(f, "primary"),
            TunnelProviderKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// A runnable tunnel provider: the command to launch and the URL shape
/// that signals it is serving
#[derive(Debug, Clone)]
pub struct TunnelProvider {
    pub kind: TunnelProviderKind,
    pub command: String,
    pub args: Vec<String>,
    pub url_suffix: String,
}

impl TunnelProvider {
    /// Build a provider from its config section, expanding `{port}`
    pub fn from_config(kind: TunnelProviderKind, config: &TunnelProviderConfig, port: u16) -> Self {
        Self {
            kind,
            command: config.command.clone(),
            args: config.expanded_args(port),
            url_suffix: config.url_suffix.clone(),
        }
    }

    /// Test a single output line for this provider's public URL.
    ///
    /// Providers announce their URL on either stream, anywhere in a line,
    /// so this matches the first `https://` URL whose host belongs to the
    /// provider's domain.
    pub fn match_url(&self, line: &str) -> Option<String> {
        extract_https_url(line, &self.url_suffix)
    }
}

/// Extract the first `https://` URL in `line` whose host ends with the
/// given domain suffix.
pub(crate) fn extract_https_url(line: &str, suffix: &str) -> Option<String> {
    let mut rest = line;
    while let Some(start) = rest.find("https://") {
        let candidate = rest[start..].split_whitespace().next().unwrap_or("");
        // Some providers frame the URL with punctuation or box-drawing
        // characters; strip what commonly glues to the end.
        let candidate =
            candidate.trim_end_matches(|c: char| matches!(c, '"' | '\'' | ')' | ']' | '|' | ',' | '.'));
        if let Some(host) = host_of(candidate) {
            if host == suffix || host.ends_with(&format!(".{}", suffix)) {
                return Some(candidate.to_string());
            }
        }
        rest = &rest[start + "https://".len()..];
    }
    None
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("https://")?;
    let end = rest
        .find(|c: char| c == '/' || c == ':')
        .unwrap_or(rest.len());
    let host = &rest[..end];
    (!host.is_empty()).then_some(host)
}
