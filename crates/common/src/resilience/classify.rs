//! Built-in transient error detection
//!
//! Errors are matched by `std::io::ErrorKind` where available and otherwise
//! by message patterns. The whole `source()` chain is inspected, so wrapped
//! transport errors are still recognised.

use std::fmt;
use std::io;

use once_cell::sync::Lazy;
use regex::Regex;

static CONNECTION_RESET: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)connection reset|econnreset|broken pipe|socket hang up").ok());
static CONNECTION_REFUSED: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)connection refused|econnrefused").ok());
static DNS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\bdns\b|enotfound|eai_again|name resolution|getaddrinfo|no such host").ok()
});
static UPSTREAM_5XX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b50[234]\b|bad gateway|service unavailable|gateway time-?out").ok()
});
static TIMEOUT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)timed out|timeout|etimedout").ok());

/// Transient failure families recognised by the retry executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    ConnectionReset,
    Timeout,
    ConnectionRefused,
    Dns,
    Upstream5xx,
    /// Anything outside the built-in set
    Other,
}

impl TransientKind {
    /// Value used for the `error_type` metric label
    pub fn as_label(self) -> &'static str {
        match self {
            Self::ConnectionReset => "connection_reset",
            Self::Timeout => "timeout",
            Self::ConnectionRefused => "connection_refused",
            Self::Dns => "dns",
            Self::Upstream5xx => "upstream_5xx",
            Self::Other => "other",
        }
    }

    pub fn is_transient(self) -> bool {
        self != Self::Other
    }
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Classify `error` by walking its source chain
pub fn classify_error(error: &(dyn std::error::Error + 'static)) -> TransientKind {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(kind) =
            err.downcast_ref::<io::Error>().and_then(|io| classify_io_kind(io.kind()))
        {
            return kind;
        }
        let kind = classify_message(&err.to_string());
        if kind.is_transient() {
            return kind;
        }
        current = err.source();
    }
    TransientKind::Other
}

/// True when `error` belongs to the built-in retryable set
pub fn is_builtin_retryable(error: &(dyn std::error::Error + 'static)) -> bool {
    classify_error(error).is_transient()
}

fn classify_io_kind(kind: io::ErrorKind) -> Option<TransientKind> {
    match kind {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => Some(TransientKind::ConnectionReset),
        io::ErrorKind::TimedOut => Some(TransientKind::Timeout),
        io::ErrorKind::ConnectionRefused => Some(TransientKind::ConnectionRefused),
        _ => None,
    }
}

fn classify_message(message: &str) -> TransientKind {
    let matches = |pattern: &Lazy<Option<Regex>>| {
        pattern.as_ref().is_some_and(|regex| regex.is_match(message))
    };

    // 5xx before timeout so "504 Gateway Timeout" is labelled upstream_5xx
    if matches(&CONNECTION_RESET) {
        TransientKind::ConnectionReset
    } else if matches(&CONNECTION_REFUSED) {
        TransientKind::ConnectionRefused
    } else if matches(&DNS) {
        TransientKind::Dns
    } else if matches(&UPSTREAM_5XX) {
        TransientKind::Upstream5xx
    } else if matches(&TIMEOUT) {
        TransientKind::Timeout
    } else {
        TransientKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct Msg(&'static str);

    #[derive(Debug, thiserror::Error)]
    #[error("request to upstream failed")]
    struct Wrapped(#[source] io::Error);

    #[test]
    fn test_io_kinds() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "x");
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "x");
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "x");
        assert_eq!(classify_error(&reset), TransientKind::ConnectionReset);
        assert_eq!(classify_error(&refused), TransientKind::ConnectionRefused);
        assert_eq!(classify_error(&timed_out), TransientKind::Timeout);
    }

    #[test]
    fn test_message_patterns() {
        assert_eq!(classify_error(&Msg("ECONNRESET")), TransientKind::ConnectionReset);
        assert_eq!(classify_error(&Msg("request timed out")), TransientKind::Timeout);
        assert_eq!(
            classify_error(&Msg("connect ECONNREFUSED 127.0.0.1")),
            TransientKind::ConnectionRefused
        );
        assert_eq!(
            classify_error(&Msg("getaddrinfo ENOTFOUND api.example.com")),
            TransientKind::Dns
        );
        assert_eq!(
            classify_error(&Msg("HTTP 503 Service Unavailable")),
            TransientKind::Upstream5xx
        );
        assert_eq!(classify_error(&Msg("502 Bad Gateway")), TransientKind::Upstream5xx);
        assert_eq!(classify_error(&Msg("504 Gateway Timeout")), TransientKind::Upstream5xx);
    }

    #[test]
    fn test_non_transient_errors() {
        assert_eq!(classify_error(&Msg("validation failed")), TransientKind::Other);
        assert_eq!(classify_error(&Msg("HTTP 500 internal error")), TransientKind::Other);
        assert_eq!(classify_error(&Msg("status 5030 is not an http code")), TransientKind::Other);
        assert!(!is_builtin_retryable(&Msg("permission denied")));
    }

    #[test]
    fn test_source_chain_is_walked() {
        let err = Wrapped(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(classify_error(&err), TransientKind::ConnectionReset);
        assert!(is_builtin_retryable(&err));
    }

    #[test]
    fn test_labels() {
        assert_eq!(TransientKind::Upstream5xx.to_string(), "upstream_5xx");
        assert_eq!(TransientKind::Other.as_label(), "other");
    }
}
