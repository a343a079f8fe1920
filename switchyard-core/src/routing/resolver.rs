//! Longest-prefix-match resolution of routing rules to candidate targets.

use tracing::{debug, error};

use crate::error::StructuralError;
use crate::routing::Candidate;
use crate::snapshot::Snapshot;

/// The per-request inputs resolution runs against.
#[derive(Debug, Clone, Copy)]
pub struct RouteInput<'a> {
    /// Caller URI, matched against rule caller patterns.
    pub caller_uri: &'a str,
    /// Full request URI, matched against rule request patterns.
    pub request_uri: &'a str,
    /// User part of the request URI, matched against rule prefixes.
    pub request_user: &'a str,
    /// Routing group to resolve within.
    pub group: u32,
}

/// Collect the candidate targets of every rule matching the input, walking
/// distinct prefix lengths from longest to shortest.
///
/// All rules at a matching prefix length contribute their targets; a
/// `stopper` rule halts evaluation of shorter prefixes once its length is
/// finished. The catch-all (empty-prefix) rules are consulted only when no
/// literal prefix matched. An empty result is a routing miss, not an
/// error; `Err` means the snapshot itself is structurally corrupt.
pub fn resolve(
    snapshot: &Snapshot,
    input: &RouteInput<'_>,
) -> Result<Vec<Candidate>, StructuralError> {
    let index = snapshot.index();
    let user = input.request_user.as_bytes();
    let mut candidates = Vec::new();
    let mut stopped = false;

    for &len in index.lengths() {
        if len > user.len() {
            continue;
        }
        let Some(bucket) = index.bucket(&user[..len]) else {
            continue;
        };
        for &rule_index in bucket {
            let rule = &snapshot.rules()[rule_index];
            if rule.group != input.group {
                continue;
            }
            if !rule.matches_uris(input.caller_uri, input.request_uri) {
                continue;
            }
            collect_targets(snapshot, rule_index, len, &mut candidates)?;
            if rule.stopper {
                stopped = true;
            }
        }
        // A stopper forbids falling back to shorter prefixes, but every
        // rule at its own length has already been taken.
        if stopped {
            break;
        }
    }

    if candidates.is_empty() && !stopped {
        for &rule_index in index.catch_all() {
            let rule = &snapshot.rules()[rule_index];
            if rule.group != input.group {
                continue;
            }
            if !rule.matches_uris(input.caller_uri, input.request_uri) {
                continue;
            }
            collect_targets(snapshot, rule_index, 0, &mut candidates)?;
        }
    }

    debug!(
        user = input.request_user,
        group = input.group,
        candidates = candidates.len(),
        "resolved"
    );
    Ok(candidates)
}

fn collect_targets(
    snapshot: &Snapshot,
    rule_index: usize,
    prefix_len: usize,
    out: &mut Vec<Candidate>,
) -> Result<(), StructuralError> {
    let rule = &snapshot.rules()[rule_index];
    for target in &rule.targets {
        if target.gateway >= snapshot.gateways().len() {
            // Cannot happen through a validated build; alarm, do not
            // degrade silently.
            let err = StructuralError {
                index: target.gateway,
                registry_len: snapshot.gateways().len(),
            };
            error!(%err, "corrupt snapshot");
            return Err(err);
        }
        out.push(Candidate {
            gateway: target.gateway,
            prefix_len,
            priority: target.priority,
            weight: target.weight,
        });
    }
    Ok(())
}
