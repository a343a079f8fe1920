//! Snapshot construction and validation from configuration rows.
//!
//! Building happens entirely off to the side of the published snapshot:
//! any validation failure aborts the reload with a [`ConfigError`] and the
//! previous generation stays in service untouched.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::config::{CapacityLimits, ConfigRows};
use crate::domain::gateway::{Gateway, GatewayHealth, GatewayId};
use crate::domain::rule::{RoutingRule, Target};
use crate::error::ConfigError;
use crate::snapshot::{RuleIndex, Snapshot};

const WEIGHT_MIN: u16 = 1;
const WEIGHT_MAX: u16 = 254;

fn check_weight(gateway: u32, weight: u16) -> Result<u16, ConfigError> {
    if !(WEIGHT_MIN..=WEIGHT_MAX).contains(&weight) {
        return Err(ConfigError::WeightOutOfRange { gateway, weight });
    }
    Ok(weight)
}

fn compile_pattern(
    pattern: &Option<String>,
    kind: &'static str,
    rule: u32,
) -> Result<Option<Regex>, ConfigError> {
    match pattern.as_deref() {
        None | Some("") => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| ConfigError::Pattern { kind, rule, source }),
    }
}

/// Build a validated snapshot with the given generation number from freshly
/// fetched configuration rows.
pub fn build_snapshot(
    rows: &ConfigRows,
    limits: &CapacityLimits,
    generation: u64,
) -> Result<Snapshot, ConfigError> {
    if rows.gateways.len() > limits.max_gateways {
        return Err(ConfigError::CapacityExceeded {
            what: "gateways",
            count: rows.gateways.len(),
            limit: limits.max_gateways,
        });
    }
    if rows.rules.len() > limits.max_rules {
        return Err(ConfigError::CapacityExceeded {
            what: "rules",
            count: rows.rules.len(),
            limit: limits.max_rules,
        });
    }
    if rows.targets.len() > limits.max_targets {
        return Err(ConfigError::CapacityExceeded {
            what: "targets",
            count: rows.targets.len(),
            limit: limits.max_targets,
        });
    }

    // Gateway registry, indexed by id for target resolution.
    let mut gateways = Vec::with_capacity(rows.gateways.len());
    let mut by_id = HashMap::with_capacity(rows.gateways.len());
    for row in &rows.gateways {
        if by_id.contains_key(&GatewayId(row.id)) {
            return Err(ConfigError::DuplicateGatewayId(row.id));
        }
        if gateways
            .iter()
            .any(|g: &Gateway| g.host == row.host && g.group == row.group)
        {
            return Err(ConfigError::DuplicateGatewayHost {
                host: row.host.clone(),
                group: row.group,
            });
        }
        check_weight(row.id, row.weight)?;
        by_id.insert(GatewayId(row.id), gateways.len());
        gateways.push(Gateway {
            id: GatewayId(row.id),
            host: row.host.clone(),
            port: row.port,
            scheme: row.scheme,
            transport: row.transport,
            strip: row.strip,
            prefix: row.prefix.clone(),
            weight: row.weight,
            group: row.group,
            flags: row.flags,
            health: GatewayHealth::new(),
        });
    }

    // Group target rows by rule id up front so each rule is assembled in
    // one pass.
    let mut targets_by_rule: HashMap<u32, Vec<Target>> = HashMap::new();
    for row in &rows.targets {
        if !rows.rules.iter().any(|r| r.id == row.rule_id) {
            return Err(ConfigError::DanglingRule(row.rule_id));
        }
        let registry_index =
            *by_id
                .get(&GatewayId(row.gateway_id))
                .ok_or(ConfigError::DanglingTarget {
                    rule: row.rule_id,
                    gateway: row.gateway_id,
                })?;
        let weight = match row.weight {
            Some(w) => check_weight(row.gateway_id, w)?,
            None => gateways[registry_index].weight,
        };
        targets_by_rule
            .entry(row.rule_id)
            .or_default()
            .push(Target {
                gateway: registry_index,
                priority: row.priority,
                weight,
            });
    }

    let mut rules = Vec::new();
    let mut index = RuleIndex::default();
    for row in &rows.rules {
        if !row.enabled {
            debug!(rule = row.id, "skipping disabled rule");
            continue;
        }
        let targets = targets_by_rule
            .remove(&row.id)
            .ok_or(ConfigError::EmptyTargets(row.id))?;
        let rule = RoutingRule {
            prefix: row.prefix.clone(),
            caller_pattern: compile_pattern(&row.caller_pattern, "caller", row.id)?,
            request_pattern: compile_pattern(&row.request_pattern, "request", row.id)?,
            stopper: row.stopper,
            group: row.group,
            targets,
        };
        let rule_index = rules.len();
        if rule.prefix.is_empty() {
            index.catch_all.push(rule_index);
        } else {
            index
                .buckets
                .entry(rule.prefix.as_bytes().to_vec())
                .or_default()
                .push(rule_index);
        }
        rules.push(rule);
    }

    // Distinct non-zero prefix lengths, longest first.
    let mut lengths: Vec<usize> = index.buckets.keys().map(Vec::len).collect();
    lengths.sort_unstable_by(|a, b| b.cmp(a));
    lengths.dedup();
    index.lengths = lengths;

    debug!(
        generation,
        gateways = gateways.len(),
        rules = rules.len(),
        "built snapshot"
    );

    Ok(Snapshot {
        generation,
        gateways,
        by_id,
        rules,
        index,
    })
}
