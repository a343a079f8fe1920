//! Routing rules and their target lists.

use regex::Regex;

/// One candidate next-hop attached to a rule: a gateway reference with the
/// priority tier and weight used during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Index of the gateway in the owning snapshot's registry.
    pub gateway: usize,
    /// Priority tier; lower values are preferred.
    pub priority: u8,
    /// Weight for randomized ordering among equal-priority peers, `1..=254`.
    pub weight: u16,
}

/// A routing rule matched against the callee's user part.
///
/// Rules are immutable after the snapshot that owns them is published.
#[derive(Debug)]
pub struct RoutingRule {
    /// Literal prefix matched against the leading characters of the
    /// request user part; empty means catch-all.
    pub prefix: String,
    /// Optional pattern the caller URI must match.
    pub caller_pattern: Option<Regex>,
    /// Optional pattern the full request URI must match.
    pub request_pattern: Option<Regex>,
    /// When matched, halt evaluation of shorter prefixes.
    pub stopper: bool,
    /// Routing group the rule belongs to.
    pub group: u32,
    /// Ordered candidate targets; never empty after validation.
    pub targets: Vec<Target>,
}

impl RoutingRule {
    /// Length of the literal prefix in bytes.
    pub fn prefix_len(&self) -> usize {
        self.prefix.len()
    }

    /// Whether the rule applies to the given caller and request URIs.
    pub fn matches_uris(&self, caller_uri: &str, request_uri: &str) -> bool {
        if let Some(re) = &self.caller_pattern {
            if !re.is_match(caller_uri) {
                return false;
            }
        }
        if let Some(re) = &self.request_pattern {
            if !re.is_match(request_uri) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(caller: Option<&str>, request: Option<&str>) -> RoutingRule {
        RoutingRule {
            prefix: "1".into(),
            caller_pattern: caller.map(|p| Regex::new(p).unwrap()),
            request_pattern: request.map(|p| Regex::new(p).unwrap()),
            stopper: false,
            group: 0,
            targets: vec![Target {
                gateway: 0,
                priority: 0,
                weight: 1,
            }],
        }
    }

    #[test]
    fn pattern_free_rule_matches_any_uris() {
        assert!(rule(None, None).matches_uris("sip:alice@a.example", "sip:1555@b.example"));
    }

    #[test]
    fn caller_pattern_gates_the_match() {
        let r = rule(Some(r"^sip:\+358"), None);
        assert!(r.matches_uris("sip:+35840111@a.example", "sip:1555@b.example"));
        assert!(!r.matches_uris("sip:+1640111@a.example", "sip:1555@b.example"));
    }

    #[test]
    fn request_pattern_gates_the_match() {
        let r = rule(None, Some(r"@pstn\.example$"));
        assert!(r.matches_uris("sip:alice@a.example", "sip:1555@pstn.example"));
        assert!(!r.matches_uris("sip:alice@a.example", "sip:1555@ims.example"));
    }
}
