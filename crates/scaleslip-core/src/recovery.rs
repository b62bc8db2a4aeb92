//! Weight recovery search.
//!
//! When net disagrees with gross − tare beyond tolerance, look through every
//! weight-shaped value seen on the ticket for a reassignment that agrees.
//! Strategies run in a fixed order, each keeping more of the current reading
//! than the next; the first that finds any in-tolerance triple wins.

use tracing::debug;

use crate::candidate::WeightRole;
use crate::config::ValidationPolicy;
use crate::validate::WeightTriple;

/// Shared signature of every strategy attempt.
pub type Attempt = fn(&WeightTriple, &[i64], &ValidationPolicy) -> Option<Recovery>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Gross and tare kept, net searched.
    NetFromGrossTare,
    /// Gross and net kept, tare searched.
    TareFromGrossNet,
    /// Tare and net kept, gross searched.
    GrossFromTareNet,
    /// Gross kept, tare and net searched.
    TareNetFromGross,
    /// Net kept, gross and tare searched.
    GrossTareFromNet,
    /// Tare kept, gross and net searched.
    GrossNetFromTare,
}

impl Strategy {
    pub const ORDER: [Strategy; 6] = [
        Strategy::NetFromGrossTare,
        Strategy::TareFromGrossNet,
        Strategy::GrossFromTareNet,
        Strategy::TareNetFromGross,
        Strategy::GrossTareFromNet,
        Strategy::GrossNetFromTare,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetFromGrossTare => "net_from_gross_tare",
            Self::TareFromGrossNet => "tare_from_gross_net",
            Self::GrossFromTareNet => "gross_from_tare_net",
            Self::TareNetFromGross => "tare_net_from_gross",
            Self::GrossTareFromNet => "gross_tare_from_net",
            Self::GrossNetFromTare => "gross_net_from_tare",
        }
    }

    /// Roles whose values this strategy replaces.
    pub fn recovered_roles(&self) -> &'static [WeightRole] {
        match self {
            Self::NetFromGrossTare => &[WeightRole::Net],
            Self::TareFromGrossNet => &[WeightRole::Tare],
            Self::GrossFromTareNet => &[WeightRole::Gross],
            Self::TareNetFromGross => &[WeightRole::Tare, WeightRole::Net],
            Self::GrossTareFromNet => &[WeightRole::Gross, WeightRole::Tare],
            Self::GrossNetFromTare => &[WeightRole::Gross, WeightRole::Net],
        }
    }

    pub fn attempt_fn(&self) -> Attempt {
        match self {
            Self::NetFromGrossTare => net_from_gross_tare,
            Self::TareFromGrossNet => tare_from_gross_net,
            Self::GrossFromTareNet => gross_from_tare_net,
            Self::TareNetFromGross => tare_net_from_gross,
            Self::GrossTareFromNet => gross_tare_from_net,
            Self::GrossNetFromTare => gross_net_from_tare,
        }
    }

    pub fn attempt(
        &self,
        known: &WeightTriple,
        pool: &[i64],
        policy: &ValidationPolicy,
    ) -> Option<Recovery> {
        (self.attempt_fn())(known, pool, policy)
    }
}

/// A repaired weight triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    pub strategy: Strategy,
    pub weights: WeightTriple,
    /// |net − (gross − tare)| of the repaired triple.
    pub deviation: i64,
}

impl Recovery {
    /// Audit note, e.g. `recovered:net=130 (strategy=net_from_gross_tare, deviation=0)`.
    pub fn note(&self) -> String {
        let assigned: Vec<String> = self
            .strategy
            .recovered_roles()
            .iter()
            .filter_map(|role| self.weights.get(*role).map(|v| format!("{role}={v}")))
            .collect();
        format!(
            "recovered:{} (strategy={}, deviation={})",
            assigned.join(","),
            self.strategy.as_str(),
            self.deviation
        )
    }
}

/// Sorted, deduplicated, non-negative search pool.
pub fn candidate_pool(values: &[i64]) -> Vec<i64> {
    let mut pool: Vec<i64> = values.iter().copied().filter(|v| *v >= 0).collect();
    pool.sort_unstable();
    pool.dedup();
    pool
}

/// Run the strategies in order over `candidates`; first success wins.
pub fn search(
    known: &WeightTriple,
    candidates: &[i64],
    policy: &ValidationPolicy,
) -> Option<Recovery> {
    let pool = candidate_pool(candidates);
    if pool.is_empty() {
        return None;
    }

    Strategy::ORDER.iter().find_map(|strategy| {
        let found = strategy.attempt(known, &pool, policy);
        debug!(
            strategy = strategy.as_str(),
            found = found.is_some(),
            pool = pool.len(),
            "recovery attempt"
        );
        found
    })
}

// ── Strategies ──

fn net_from_gross_tare(
    known: &WeightTriple,
    pool: &[i64],
    policy: &ValidationPolicy,
) -> Option<Recovery> {
    let (gross, tare) = (known.gross?, known.tare?);
    let triples = pool.iter().map(|&net| (gross, tare, net));
    closest(Strategy::NetFromGrossTare, known, triples, policy, false)
}

fn tare_from_gross_net(
    known: &WeightTriple,
    pool: &[i64],
    policy: &ValidationPolicy,
) -> Option<Recovery> {
    let (gross, net) = (known.gross?, known.net?);
    let triples = pool.iter().map(|&tare| (gross, tare, net));
    closest(Strategy::TareFromGrossNet, known, triples, policy, true)
}

fn gross_from_tare_net(
    known: &WeightTriple,
    pool: &[i64],
    policy: &ValidationPolicy,
) -> Option<Recovery> {
    let (tare, net) = (known.tare?, known.net?);
    let triples = pool.iter().map(|&gross| (gross, tare, net));
    closest(Strategy::GrossFromTareNet, known, triples, policy, true)
}

fn tare_net_from_gross(
    known: &WeightTriple,
    pool: &[i64],
    policy: &ValidationPolicy,
) -> Option<Recovery> {
    let gross = known.gross?;
    let triples = pairs(pool).map(|(tare, net)| (gross, tare, net));
    closest(Strategy::TareNetFromGross, known, triples, policy, true)
}

fn gross_tare_from_net(
    known: &WeightTriple,
    pool: &[i64],
    policy: &ValidationPolicy,
) -> Option<Recovery> {
    let net = known.net?;
    let triples = pairs(pool).map(|(gross, tare)| (gross, tare, net));
    closest(Strategy::GrossTareFromNet, known, triples, policy, true)
}

fn gross_net_from_tare(
    known: &WeightTriple,
    pool: &[i64],
    policy: &ValidationPolicy,
) -> Option<Recovery> {
    let tare = known.tare?;
    let triples = pairs(pool).map(|(gross, net)| (gross, tare, net));
    closest(Strategy::GrossNetFromTare, known, triples, policy, true)
}

// ── Helpers ──

fn pairs(pool: &[i64]) -> impl Iterator<Item = (i64, i64)> + '_ {
    pool.iter()
        .flat_map(move |&a| pool.iter().map(move |&b| (a, b)))
}

/// Deviation of a triple if it passes the tolerance rule.
fn deviation(
    (gross, tare, net): (i64, i64, i64),
    policy: &ValidationPolicy,
    require_order: bool,
) -> Option<i64> {
    if require_order && gross < tare {
        return None;
    }
    let expected = gross.saturating_sub(tare);
    let diff = net.saturating_sub(expected).saturating_abs();
    (diff <= policy.tolerance(expected)).then_some(diff)
}

/// How far a triple moves the values that were already read.
fn displacement(known: &WeightTriple, (gross, tare, net): (i64, i64, i64)) -> i64 {
    [(known.gross, gross), (known.tare, tare), (known.net, net)]
        .into_iter()
        .filter_map(|(old, new)| old.map(|o| o.saturating_sub(new).saturating_abs()))
        .fold(0i64, i64::saturating_add)
}

/// Pick the in-tolerance triple with the smallest deviation. Ties go to the
/// triple closest to the current reading, then to the first one seen.
fn closest(
    strategy: Strategy,
    known: &WeightTriple,
    triples: impl Iterator<Item = (i64, i64, i64)>,
    policy: &ValidationPolicy,
    require_order: bool,
) -> Option<Recovery> {
    let (triple, dev, _) = triples
        .filter_map(|t| deviation(t, policy, require_order).map(|d| (t, d, displacement(known, t))))
        .fold(None, |best: Option<((i64, i64, i64), i64, i64)>, cur| match best {
            Some(b) if (b.1, b.2) <= (cur.1, cur.2) => Some(b),
            _ => Some(cur),
        })?;

    let (gross, tare, net) = triple;
    Some(Recovery {
        strategy,
        weights: WeightTriple::new(Some(gross), Some(tare), Some(net)),
        deviation: dev,
    })
}
