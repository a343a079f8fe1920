//! Weighted, priority-tiered ordering of candidate gateways.

use rand::Rng;

use crate::routing::Candidate;
use crate::snapshot::Snapshot;

/// Order candidates into the fallback gateway list for one request.
///
/// Uses the thread-local RNG for the weighted draw; see
/// [`select_with_rng`] for the algorithm.
pub fn select(snapshot: &Snapshot, candidates: &[Candidate], now: u64) -> Vec<usize> {
    select_with_rng(snapshot, candidates, now, &mut rand::thread_rng())
}

/// Order candidates into the fallback gateway list for one request, drawing
/// randomness from the given RNG.
///
/// Candidates whose gateway is inactive or defunct are discarded. The rest
/// sort by `(prefix_len desc, priority asc, weight x uniform draw desc)`:
/// more specific prefixes win outright, lower priority tiers come first,
/// and equal-priority peers are randomly ordered with a bias towards
/// higher configured weights, reshuffled on every call. The same gateway
/// reachable through several rules is emitted once, at its highest rank.
pub fn select_with_rng<R: Rng + ?Sized>(
    snapshot: &Snapshot,
    candidates: &[Candidate],
    now: u64,
    rng: &mut R,
) -> Vec<usize> {
    let gateways = snapshot.gateways();

    let mut ranked: Vec<(&Candidate, f64)> = candidates
        .iter()
        .filter(|c| gateways[c.gateway].health.is_selectable(now))
        .map(|c| (c, f64::from(c.weight) * rng.gen::<f64>()))
        .collect();

    ranked.sort_by(|(a, wa), (b, wb)| {
        b.prefix_len
            .cmp(&a.prefix_len)
            .then(a.priority.cmp(&b.priority))
            .then(wb.partial_cmp(wa).unwrap_or(std::cmp::Ordering::Equal))
    });

    // First (highest-ranked) occurrence of a gateway wins; later
    // duplicates from other rules are dropped silently.
    let mut ordered = Vec::with_capacity(ranked.len());
    for (candidate, _) in ranked {
        let id = gateways[candidate.gateway].id;
        if !ordered
            .iter()
            .any(|&index: &usize| gateways[index].id == id)
        {
            ordered.push(candidate.gateway);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CapacityLimits, ConfigRows, GatewayRow};
    use crate::domain::gateway::{Scheme, Transport};
    use crate::snapshot::build_snapshot;

    fn snapshot(count: u32) -> Snapshot {
        let gateways = (1..=count)
            .map(|id| GatewayRow {
                id,
                host: format!("gw{id}.example"),
                port: None,
                scheme: Scheme::Sip,
                transport: Transport::Udp,
                strip: 0,
                prefix: String::new(),
                weight: 1,
                group: 0,
                flags: 0,
            })
            .collect();
        let rows = ConfigRows {
            gateways,
            rules: vec![],
            targets: vec![],
        };
        build_snapshot(&rows, &CapacityLimits::default(), 1).unwrap()
    }

    fn candidate(gateway: usize, prefix_len: usize, priority: u8, weight: u16) -> Candidate {
        Candidate {
            gateway,
            prefix_len,
            priority,
            weight,
        }
    }

    #[test]
    fn longer_prefix_wins_over_heavier_shorter_one() {
        let snap = snapshot(2);
        let candidates = [candidate(0, 3, 5, 1), candidate(1, 1, 0, 254)];
        for _ in 0..50 {
            assert_eq!(select(&snap, &candidates, 0), vec![0, 1]);
        }
    }

    #[test]
    fn lower_priority_wins_within_equal_specificity() {
        let snap = snapshot(2);
        let candidates = [candidate(0, 1, 2, 1), candidate(1, 1, 1, 254)];
        for _ in 0..50 {
            assert_eq!(select(&snap, &candidates, 0), vec![1, 0]);
        }
    }

    #[test]
    fn duplicate_gateway_is_emitted_once_at_its_highest_rank() {
        let snap = snapshot(2);
        // Gateway 0 is reachable via a specific and a generic rule.
        let candidates = [
            candidate(0, 3, 0, 1),
            candidate(1, 2, 0, 1),
            candidate(0, 1, 0, 1),
        ];
        for _ in 0..50 {
            assert_eq!(select(&snap, &candidates, 0), vec![0, 1]);
        }
    }

    #[test]
    fn inactive_and_defunct_gateways_are_discarded() {
        let snap = snapshot(3);
        snap.gateways()[0].health.report_failure(1);
        snap.gateways()[1].health.set_defunct_until(1_000);

        let candidates = [
            candidate(0, 1, 0, 1),
            candidate(1, 1, 0, 1),
            candidate(2, 1, 0, 1),
        ];
        assert_eq!(select(&snap, &candidates, 999), vec![2]);
        // The defunct window has expired at its exact timestamp.
        let after = select(&snap, &candidates, 1_000);
        assert!(after.contains(&1) && after.contains(&2));
    }

    #[test]
    fn suspect_gateways_remain_eligible() {
        let snap = snapshot(1);
        snap.gateways()[0].health.report_failure(3);
        let candidates = [candidate(0, 1, 0, 1)];
        assert_eq!(select(&snap, &candidates, 0), vec![0]);
    }

    #[test]
    fn weighted_draw_biases_towards_heavier_gateway() {
        let snap = snapshot(2);
        let candidates = [candidate(0, 1, 0, 10), candidate(1, 1, 0, 1)];

        let trials = 2_000;
        let mut heavy_first = 0;
        for _ in 0..trials {
            if select(&snap, &candidates, 0)[0] == 0 {
                heavy_first += 1;
            }
        }
        // P(10 x U1 > U2) = 0.95; anything near parity means the weight
        // is being ignored.
        assert!(
            heavy_first > trials * 3 / 4,
            "weight-10 gateway ranked first in only {heavy_first}/{trials} trials"
        );
    }

    #[test]
    fn empty_candidates_select_nothing() {
        let snap = snapshot(1);
        assert!(select(&snap, &[], 0).is_empty());
    }
}
