//! Origin checks for browser-initiated WebSocket handshakes.

/// Which `Origin` header values may open a WebSocket connection.
///
/// Clients that send no `Origin` header (CLI tools, other services) are
/// always admitted; only browsers are subject to the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept every origin.
    AllowAny,
    /// Accept only the listed origins (compared case-insensitively).
    AllowList(Vec<String>),
}

impl Default for OriginPolicy {
    fn default() -> Self {
        OriginPolicy::AllowList(Vec::new())
    }
}

impl OriginPolicy {
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (OriginPolicy::AllowAny, _) => true,
            (OriginPolicy::AllowList(_), None) => true,
            (OriginPolicy::AllowList(allowed), Some(origin)) => allowed
                .iter()
                .any(|candidate| candidate.trim_end_matches('/').eq_ignore_ascii_case(origin)),
        }
    }
}
