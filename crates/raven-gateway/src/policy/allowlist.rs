//! Event allowlist compilation and matching.
//!
//! Entries are exact event names or `prefix*` wildcards (`raven_channel_*`).

use raven_core::error::{RavenError, Result};

/// Compiled allowlist rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRule {
    Exact(String),
    Prefix(String),
}

pub fn compile_event_rules(raw: &[String]) -> Result<Vec<EventRule>> {
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        let s = s.trim();
        if s.is_empty() {
            return Err(RavenError::BadRequest("empty event_allowlist entry".into()));
        }
        match s.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => {
                return Err(RavenError::BadRequest(format!(
                    "invalid event_allowlist entry: {s} (only a trailing * is supported)"
                )));
            }
            Some(prefix) => out.push(EventRule::Prefix(prefix.to_string())),
            None if s.contains('*') => {
                return Err(RavenError::BadRequest(format!(
                    "invalid event_allowlist entry: {s} (only a trailing * is supported)"
                )));
            }
            None => out.push(EventRule::Exact(s.to_string())),
        }
    }
    Ok(out)
}

pub fn is_event_allowed(rules: &[EventRule], event: &str) -> bool {
    rules.iter().any(|r| match r {
        EventRule::Exact(name) => name == event,
        EventRule::Prefix(prefix) => event.starts_with(prefix.as_str()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_and_exact_rules() {
        let rules = compile_event_rules(&["raven_channel_*".into(), "doc_subscribe".into()]);
        let rules = rules.unwrap_or_default();
        assert!(is_event_allowed(&rules, "raven_channel_typing"));
        assert!(is_event_allowed(&rules, "doc_subscribe"));
        assert!(!is_event_allowed(&rules, "doc_unsubscribe"));
    }

    #[test]
    fn inner_wildcards_are_rejected() {
        assert!(compile_event_rules(&["raven_*_typing".into()]).is_err());
        assert!(compile_event_rules(&["**".into()]).is_err());
        assert!(compile_event_rules(&["  ".into()]).is_err());
    }
}
