// Contest payout economics: rake, paid places and payout-shape summaries.

use serde::{Deserialize, Serialize};

/// One band of the payout table: every rank in `min_rank..=max_rank` wins
/// `prize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutTier {
    pub min_rank: u32,
    pub max_rank: u32,
    pub prize: f64,
}

/// How the contest pays out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutCurve {
    /// The top `fraction` of the field is paid.
    TopFraction { fraction: f64 },
    /// A fixed number of places is paid.
    FlatTopN { places: u32 },
    /// An explicit payout table.
    Tiers { tiers: Vec<PayoutTier> },
}

impl Default for PayoutCurve {
    fn default() -> Self {
        PayoutCurve::TopFraction { fraction: 0.2 }
    }
}

/// Raw contest parameters as edited by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContestInput {
    pub name: String,
    #[serde(alias = "entryFee", alias = "fee")]
    pub entry_fee: f64,
    /// The user's own entry count.
    #[serde(alias = "maxEntries", alias = "entries_per_user")]
    pub entries: u32,
    #[serde(alias = "fieldSize")]
    pub field_size: u32,
    #[serde(alias = "prizePool")]
    pub prize_pool: f64,
    pub payout: PayoutCurve,
}

impl Default for ContestInput {
    fn default() -> Self {
        ContestInput {
            name: "Classic GPP".to_string(),
            entry_fee: 20.0,
            entries: 1,
            field_size: 1000,
            prize_pool: 17_000.0,
            payout: PayoutCurve::default(),
        }
    }
}

/// Payout-structure metrics derived from a [`ContestInput`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestDerived {
    /// Entry fee times field size.
    pub total_contributions: f64,
    /// Fraction of contributions not returned as prizes, never negative.
    pub rake_pct: f64,
    pub paid_places: u32,
    /// Paid places as a fraction of the field.
    pub paid_pct: f64,
    /// Smallest paying prize, when the payout table is known.
    pub min_cash: Option<f64>,
    /// First-place prize as a multiple of the entry fee.
    pub top_prize_multiple: Option<f64>,
    /// What the user pays across all their entries.
    pub user_outlay: f64,
}

/// A contest input paired with its derivation; the unit the classifier reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestState {
    pub input: ContestInput,
    pub derived: ContestDerived,
}

impl ContestState {
    pub fn new(input: ContestInput) -> Self {
        let derived = derive_contest(&input);
        ContestState { input, derived }
    }
}

impl Default for ContestState {
    fn default() -> Self {
        Self::new(ContestInput::default())
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Compute payout economics from raw contest parameters.
///
/// Pure: the same input always yields the same output. A prize pool larger
/// than total contributions yields a rake of 0, not a negative one.
pub fn derive_contest(input: &ContestInput) -> ContestDerived {
    let fee = finite_or_zero(input.entry_fee).max(0.0);
    let field = input.field_size;
    let total_contributions = fee * f64::from(field);
    let prize_pool = finite_or_zero(input.prize_pool);

    let rake_pct = if total_contributions > 0.0 {
        ((total_contributions - prize_pool) / total_contributions).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let (paid_places, min_cash, top_prize) = match &input.payout {
        PayoutCurve::TopFraction { fraction } => {
            let fraction = finite_or_zero(*fraction).clamp(0.0, 1.0);
            ((f64::from(field) * fraction).floor() as u32, None, None)
        }
        PayoutCurve::FlatTopN { places } => ((*places).min(field), None, None),
        PayoutCurve::Tiers { tiers } => {
            let deepest = tiers
                .iter()
                .map(|t| t.max_rank.max(t.min_rank))
                .max()
                .unwrap_or(0);
            let min_cash = tiers
                .iter()
                .map(|t| t.prize)
                .filter(|p| p.is_finite() && *p > 0.0)
                .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.min(p))));
            let top = tiers
                .iter()
                .find(|t| t.min_rank <= 1 && t.max_rank >= 1)
                .map(|t| t.prize);
            (deepest.min(field), min_cash, top)
        }
    };

    let paid_pct = if field > 0 {
        f64::from(paid_places) / f64::from(field)
    } else {
        0.0
    };
    let top_prize_multiple = top_prize.filter(|_| fee > 0.0).map(|p| p / fee);

    ContestDerived {
        total_contributions,
        rake_pct,
        paid_places,
        paid_pct,
        min_cash,
        top_prize_multiple,
        user_outlay: fee * f64::from(input.entries),
    }
}

/// Single-entry memo of the last derivation, keyed on input equality.
#[derive(Debug, Clone, Default)]
pub struct ContestMemo {
    last: Option<ContestState>,
}

impl ContestMemo {
    /// Return the state for `input`, deriving it only when the input changed.
    pub fn state_for(&mut self, input: &ContestInput) -> &ContestState {
        let stale = self.last.as_ref().map_or(true, |s| s.input != *input);
        if stale {
            self.last = Some(ContestState::new(input.clone()));
        }
        self.last.get_or_insert_with(|| ContestState::new(input.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(fee: f64, field: u32, prize_pool: f64) -> ContestInput {
        ContestInput {
            name: "Test".into(),
            entry_fee: fee,
            entries: 1,
            field_size: field,
            prize_pool,
            payout: PayoutCurve::TopFraction { fraction: 0.2 },
        }
    }

    #[test]
    fn rake_fifteen_percent() {
        let d = derive_contest(&input(10.0, 1000, 8500.0));
        assert!((d.total_contributions - 10_000.0).abs() < f64::EPSILON);
        assert!((d.rake_pct - 0.15).abs() < 1e-12);
        assert!((d.user_outlay - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overlay_never_goes_negative() {
        let d = derive_contest(&input(10.0, 1000, 12_000.0));
        assert_eq!(d.rake_pct, 0.0);
    }

    #[test]
    fn empty_contest_has_zero_rake() {
        let d = derive_contest(&input(0.0, 0, 0.0));
        assert_eq!(d.rake_pct, 0.0);
        assert_eq!(d.paid_places, 0);
        assert_eq!(d.paid_pct, 0.0);
    }

    #[test]
    fn top_fraction_rounds_down() {
        let mut i = input(5.0, 1001, 4000.0);
        i.payout = PayoutCurve::TopFraction { fraction: 0.225 };
        let d = derive_contest(&i);
        assert_eq!(d.paid_places, 225);
    }

    #[test]
    fn flat_places_capped_at_field() {
        let mut i = input(5.0, 50, 200.0);
        i.payout = PayoutCurve::FlatTopN { places: 80 };
        assert_eq!(derive_contest(&i).paid_places, 50);
    }

    #[test]
    fn tier_table_summaries() {
        let mut i = input(20.0, 500, 8500.0);
        i.payout = PayoutCurve::Tiers {
            tiers: vec![
                PayoutTier {
                    min_rank: 1,
                    max_rank: 1,
                    prize: 2000.0,
                },
                PayoutTier {
                    min_rank: 2,
                    max_rank: 10,
                    prize: 300.0,
                },
                PayoutTier {
                    min_rank: 11,
                    max_rank: 110,
                    prize: 40.0,
                },
            ],
        };
        let d = derive_contest(&i);
        assert_eq!(d.paid_places, 110);
        assert_eq!(d.min_cash, Some(40.0));
        assert_eq!(d.top_prize_multiple, Some(100.0));
        assert!((d.paid_pct - 0.22).abs() < 1e-12);
    }

    #[test]
    fn derivation_is_deterministic() {
        let i = input(3.0, 23_781, 60_000.0);
        assert_eq!(derive_contest(&i), derive_contest(&i));
    }

    #[test]
    fn memo_rederives_only_on_change() {
        let mut memo = ContestMemo::default();
        let a = input(10.0, 1000, 8500.0);
        let first = memo.state_for(&a).clone();
        assert_eq!(memo.state_for(&a), &first);

        let b = input(10.0, 1000, 9000.0);
        let second = memo.state_for(&b);
        assert!((second.derived.rake_pct - 0.10).abs() < 1e-12);
    }

    #[test]
    fn contest_input_accepts_camel_case() {
        let json = r#"{"name":"Main","entryFee":10,"fieldSize":1000,"prizePool":8500}"#;
        let i: ContestInput = serde_json::from_str(json).unwrap();
        assert_eq!(i.field_size, 1000);
        assert_eq!(i.entries, 1);
        assert_eq!(i.payout, PayoutCurve::default());
    }
}
