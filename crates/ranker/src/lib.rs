//! Scores and ranks offers against an intent.
//!
//! Selection is a pure function of the candidate multiset: no clock
//! reads, no randomness, no I/O. Callers resolve live reputation ahead
//! of time and hand it in via [`ReputationSnapshot`].

pub mod duration;
pub mod error;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

pub use error::{RankingError, Result};

/// One offer as the ranker sees it, stripped down to the fields that
/// feed scoring. Callers adapt their own offer representation into
/// this at the call site.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub from_address: String,
    pub fee: Decimal,
    pub eta: String,
    /// The reputation the offer itself claimed at submission time.
    /// Used only when a live lookup is unavailable.
    pub snapshot_reputation: i64,
    pub stake_age_seconds: i64,
    pub created_at: i64,
}

/// Live reputation for a candidate, resolved by the caller before
/// ranking. `None` means "unavailable" and falls back to the offer's
/// own snapshot, per spec.
pub trait ReputationSnapshot {
    fn live_reputation(&self, address: &str) -> Option<f64>;
}

impl<F> ReputationSnapshot for F
where
    F: Fn(&str) -> Option<f64>,
{
    fn live_reputation(&self, address: &str) -> Option<f64> {
        self(address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub reputation: f64,
    pub fee: f64,
    pub speed: f64,
    pub tie_window: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            reputation: 0.5,
            fee: 0.3,
            speed: 0.2,
            tie_window: 0.05,
        }
    }
}

/// Per-offer normalized components, kept around purely for
/// observability — never consulted by selection itself.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferScore {
    pub from_address: String,
    pub reputation_norm: f64,
    pub fee_norm: f64,
    pub speed_norm: f64,
    pub score: f64,
    pub live_reputation: f64,
}

#[derive(Debug, Clone)]
pub struct RankedSelection {
    pub winner: Candidate,
    pub score_breakdown: Vec<OfferScore>,
}

#[derive(Debug, Clone)]
pub struct Ranker {
    weights: Weights,
}

impl Ranker {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn rank(
        &self,
        intent_id: &str,
        offers: &[Candidate],
        reputation: &dyn ReputationSnapshot,
    ) -> Result<RankedSelection> {
        if offers.is_empty() {
            return Err(RankingError::EmptyOfferSet(intent_id.to_string()));
        }

        let live_rep: Vec<f64> = offers
            .iter()
            .map(|o| {
                reputation
                    .live_reputation(&o.from_address)
                    .filter(|r| r.is_finite())
                    .unwrap_or(o.snapshot_reputation as f64)
            })
            .collect();

        let fees: Vec<f64> = offers
            .iter()
            .map(|o| o.fee.to_f64().unwrap_or(0.0))
            .collect();

        let eta_seconds: Vec<i64> = offers
            .iter()
            .map(|o| duration::parse_eta_seconds(&o.eta))
            .collect();

        let rep_norm = min_max_normalize(&live_rep);
        let fee_norm = min_max_normalize(&fees);
        let speed_norm = normalize_speed(&eta_seconds);

        let scores: Vec<f64> = (0..offers.len())
            .map(|i| {
                self.weights.reputation * rep_norm[i]
                    + self.weights.fee * (1.0 - fee_norm[i])
                    + self.weights.speed * speed_norm[i]
            })
            .collect();

        let breakdown: Vec<OfferScore> = (0..offers.len())
            .map(|i| OfferScore {
                from_address: offers[i].from_address.clone(),
                reputation_norm: rep_norm[i],
                fee_norm: fee_norm[i],
                speed_norm: speed_norm[i],
                score: scores[i],
                live_reputation: live_rep[i],
            })
            .collect();

        // (a) sort by score desc, then live reputation desc.
        let mut indices: Vec<usize> = (0..offers.len()).collect();
        indices.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| live_rep[b].partial_cmp(&live_rep[a]).unwrap_or(std::cmp::Ordering::Equal))
        });

        let best_score = scores[indices[0]];

        // (b) within the tie window, re-sort by stake age desc then
        // creation time asc.
        let mut tie_group: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| best_score - scores[i] <= self.weights.tie_window)
            .collect();
        tie_group.sort_by(|&a, &b| {
            offers[b]
                .stake_age_seconds
                .cmp(&offers[a].stake_age_seconds)
                .then_with(|| offers[a].created_at.cmp(&offers[b].created_at))
        });

        // (c) return the first.
        let winner_idx = tie_group[0];
        debug!(
            intent_id,
            winner = %offers[winner_idx].from_address,
            score = best_score,
            tie_group_size = tie_group.len(),
            "ranked offers"
        );

        Ok(RankedSelection {
            winner: offers[winner_idx].clone(),
            score_breakdown: breakdown,
        })
    }
}

/// `(v - min) / (max - min)`, or `1.0` for every entry when
/// `max == min` (including the single-offer case).
fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

/// Speed is `1/etaSeconds`; an eta of zero means "unknown" and is
/// treated as max speed rather than propagated as `1/0`.
fn normalize_speed(eta_seconds: &[i64]) -> Vec<f64> {
    let raw: Vec<Option<f64>> = eta_seconds
        .iter()
        .map(|&eta| if eta <= 0 { None } else { Some(1.0 / eta as f64) })
        .collect();

    let finite: Vec<f64> = raw.iter().filter_map(|v| *v).collect();
    if finite.is_empty() {
        return vec![1.0; eta_seconds.len()];
    }

    let min = finite.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let tied = (max - min).abs() < f64::EPSILON;

    raw.iter()
        .map(|v| match v {
            None => 1.0,
            Some(_) if tied => 1.0,
            Some(speed) => (speed - min) / (max - min),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoLiveReputation;
    impl ReputationSnapshot for NoLiveReputation {
        fn live_reputation(&self, _address: &str) -> Option<f64> {
            None
        }
    }

    struct FixedReputation(std::collections::HashMap<String, f64>);
    impl ReputationSnapshot for FixedReputation {
        fn live_reputation(&self, address: &str) -> Option<f64> {
            self.0.get(address).copied()
        }
    }

    fn candidate(addr: &str, fee: i64, eta: &str, rep: i64, stake_age: i64, created_at: i64) -> Candidate {
        Candidate {
            from_address: addr.to_string(),
            fee: Decimal::new(fee, 0),
            eta: eta.to_string(),
            snapshot_reputation: rep,
            stake_age_seconds: stake_age,
            created_at,
        }
    }

    #[test]
    fn empty_offer_set_is_rejected() {
        let ranker = Ranker::new(Weights::default());
        let err = ranker.rank("intent-1", &[], &NoLiveReputation).unwrap_err();
        assert!(matches!(err, RankingError::EmptyOfferSet(_)));
    }

    #[test]
    fn falls_back_to_snapshot_reputation_without_live_lookup() {
        let ranker = Ranker::new(Weights::default());
        let offers = vec![
            candidate("a", 10, "30s", 50, 0, 100),
            candidate("b", 10, "30s", 90, 0, 100),
        ];
        let selection = ranker.rank("intent-1", &offers, &NoLiveReputation).unwrap();
        assert_eq!(selection.winner.from_address, "b");
    }

    #[test]
    fn cheaper_offer_wins_when_reputation_and_speed_tie() {
        let ranker = Ranker::new(Weights::default());
        let offers = vec![
            candidate("expensive", 100, "30s", 80, 0, 100),
            candidate("cheap", 10, "30s", 80, 0, 100),
        ];
        let selection = ranker.rank("intent-1", &offers, &NoLiveReputation).unwrap();
        assert_eq!(selection.winner.from_address, "cheap");
    }

    #[test]
    fn adding_a_strictly_dominated_offer_never_changes_the_winner() {
        let ranker = Ranker::new(Weights::default());
        let mut reps = std::collections::HashMap::new();
        reps.insert("a".to_string(), 80.0);
        reps.insert("b".to_string(), 95.0);
        let lookup = FixedReputation(reps.clone());

        let base = vec![
            candidate("a", 20, "30s", 80, 0, 100),
            candidate("b", 15, "20s", 95, 0, 100),
        ];
        let baseline = ranker.rank("intent-1", &base, &lookup).unwrap();

        let mut reps2 = reps;
        reps2.insert("dominated".to_string(), 10.0);
        let lookup2 = FixedReputation(reps2);
        let mut extended = base.clone();
        extended.push(candidate("dominated", 200, "900s", 10, 0, 100));
        let extended_result = ranker.rank("intent-1", &extended, &lookup2).unwrap();

        assert_eq!(baseline.winner.from_address, extended_result.winner.from_address);
    }

    #[test]
    fn selection_is_deterministic_across_repeated_calls() {
        let ranker = Ranker::new(Weights::default());
        let offers = vec![
            candidate("a", 20, "30s", 80, 10, 100),
            candidate("b", 15, "20s", 82, 5, 90),
            candidate("c", 18, "25s", 81, 20, 80),
        ];
        let first = ranker.rank("intent-1", &offers, &NoLiveReputation).unwrap();
        let second = ranker.rank("intent-1", &offers, &NoLiveReputation).unwrap();
        assert_eq!(first.winner.from_address, second.winner.from_address);
    }

    #[test]
    fn tie_window_breaks_ties_by_stake_age_then_created_at() {
        let ranker = Ranker::new(Weights {
            tie_window: 1.0, // force everything into one tie group for this test
            ..Weights::default()
        });
        let offers = vec![
            candidate("older-stake", 20, "30s", 80, 500, 200),
            candidate("younger-stake", 20, "30s", 80, 10, 100),
        ];
        let selection = ranker.rank("intent-1", &offers, &NoLiveReputation).unwrap();
        assert_eq!(selection.winner.from_address, "older-stake");
    }

    #[test]
    fn zero_eta_is_treated_as_max_speed() {
        let ranker = Ranker::new(Weights::default());
        let offers = vec![
            candidate("unknown-eta", 20, "not-a-duration", 80, 0, 100),
            candidate("slow", 20, "600s", 80, 0, 100),
        ];
        let selection = ranker.rank("intent-1", &offers, &NoLiveReputation).unwrap();
        assert_eq!(selection.winner.from_address, "unknown-eta");
    }

    #[test]
    fn single_offer_always_wins() {
        let ranker = Ranker::new(Weights::default());
        let offers = vec![candidate("solo", 50, "30s", 10, 0, 0)];
        let selection = ranker.rank("intent-1", &offers, &NoLiveReputation).unwrap();
        assert_eq!(selection.winner.from_address, "solo");
        assert_eq!(selection.score_breakdown.len(), 1);
    }
}
