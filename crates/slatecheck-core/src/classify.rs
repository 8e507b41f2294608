// Lineup classification along three independent axes: contest viability,
// field alignment and upside quality.
//
// Every classifier is a pure function of a complete lineup (and the contest
// state where payout economics matter). Incomplete lineups are never
// labelled. Comparisons at a threshold resolve to the more conservative
// label.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::contest::ContestState;
use crate::model::Lineup;

// ---------------------------------------------------------------------------
// Display hints
// ---------------------------------------------------------------------------

/// Palette shared by every signal chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalColor {
    Emerald,
    Amber,
    Red,
    Blue,
}

impl SignalColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalColor::Emerald => "emerald",
            SignalColor::Amber => "amber",
            SignalColor::Red => "red",
            SignalColor::Blue => "blue",
        }
    }
}

/// A rendered label: text, color hint and a short glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalChip {
    pub label: &'static str,
    pub color: SignalColor,
    pub icon: &'static str,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Classifier cut-offs. Loaded from the `[thresholds]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Strong viability requires ROI above `rake * strong_rake_multiple`.
    pub strong_rake_multiple: f64,
    /// Moderate viability requires ROI above this fraction.
    pub moderate_floor: f64,
    /// Cumulative ownership of a "typical" lineup, in percent points.
    pub ownership_baseline: f64,
    pub over_aligned_ratio: f64,
    pub contrarian_ratio: f64,
    /// Ceiling-to-projection ratio for a clean upside profile.
    pub clean_ratio: f64,
    pub mixed_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            strong_rake_multiple: 1.0,
            moderate_floor: 0.0,
            ownership_baseline: 100.0,
            over_aligned_ratio: 1.3,
            contrarian_ratio: 0.7,
            clean_ratio: 1.35,
            mixed_ratio: 1.2,
        }
    }
}

// ---------------------------------------------------------------------------
// Viability
// ---------------------------------------------------------------------------

/// Whether simulated returns beat what the contest structure takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Viability {
    Strong,
    Moderate,
    Unlikely,
}

impl Viability {
    pub fn label(&self) -> &'static str {
        match self {
            Viability::Strong => "Strong",
            Viability::Moderate => "Moderate",
            Viability::Unlikely => "Unlikely",
        }
    }

    pub fn color(&self) -> SignalColor {
        match self {
            Viability::Strong => SignalColor::Emerald,
            Viability::Moderate => SignalColor::Amber,
            Viability::Unlikely => SignalColor::Red,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Viability::Strong => "✓",
            Viability::Moderate => "~",
            Viability::Unlikely => "✗",
        }
    }

    /// One-line diagnosis shown in the expanded lineup view.
    pub fn diagnosis(&self) -> Option<&'static str> {
        match self {
            Viability::Strong => {
                Some("Simulation shows positive expectation in this prize structure.")
            }
            Viability::Moderate => None,
            Viability::Unlikely => Some(
                "Build struggles to reach profitable win frequency in current field model.",
            ),
        }
    }

    pub fn chip(&self) -> SignalChip {
        SignalChip {
            label: self.label(),
            color: self.color(),
            icon: self.icon(),
        }
    }
}

/// Simulated return as a fraction of the entry fee. Prefers the optimizer's
/// ROI column; falls back to EV over fee. A lineup with neither counts as
/// break-even.
fn simulated_roi(lineup: &Lineup, entry_fee: f64) -> f64 {
    if let Some(roi) = lineup.sim_roi.filter(|v| v.is_finite()) {
        return roi / 100.0;
    }
    match lineup.sim_ev.filter(|v| v.is_finite()) {
        Some(ev) if entry_fee.is_finite() && entry_fee > 0.0 => ev / entry_fee,
        _ => 0.0,
    }
}

pub fn classify_viability(
    lineup: &Lineup,
    contest: &ContestState,
    thresholds: &Thresholds,
) -> Option<Viability> {
    if !lineup.is_complete() {
        return None;
    }
    let roi = simulated_roi(lineup, contest.input.entry_fee);
    let hurdle = contest.derived.rake_pct * thresholds.strong_rake_multiple;
    Some(if roi > hurdle {
        Viability::Strong
    } else if roi > thresholds.moderate_floor {
        Viability::Moderate
    } else {
        Viability::Unlikely
    })
}

// ---------------------------------------------------------------------------
// Field alignment
// ---------------------------------------------------------------------------

/// How closely the lineup tracks what the field is rostering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    OverAligned,
    Balanced,
    Contrarian,
}

impl Alignment {
    pub fn label(&self) -> &'static str {
        match self {
            Alignment::OverAligned => "Over-Aligned",
            Alignment::Balanced => "Balanced",
            Alignment::Contrarian => "Contrarian",
        }
    }

    pub fn color(&self) -> SignalColor {
        match self {
            Alignment::OverAligned => SignalColor::Amber,
            Alignment::Balanced => SignalColor::Blue,
            Alignment::Contrarian => SignalColor::Emerald,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Alignment::OverAligned => "⚠",
            Alignment::Balanced => "≈",
            Alignment::Contrarian => "✨",
        }
    }

    pub fn diagnosis(&self) -> Option<&'static str> {
        match self {
            Alignment::OverAligned => {
                Some("High concentration of popular plays increases duplication risk.")
            }
            Alignment::Balanced => None,
            Alignment::Contrarian => Some("Unique build paths reduce payout splitting risk."),
        }
    }

    pub fn chip(&self) -> SignalChip {
        SignalChip {
            label: self.label(),
            color: self.color(),
            icon: self.icon(),
        }
    }
}

pub fn classify_alignment(lineup: &Lineup, thresholds: &Thresholds) -> Option<Alignment> {
    if !lineup.is_complete() {
        return None;
    }
    // Players without ownership data contribute 0%.
    let total = lineup.total_ownership;
    let baseline = thresholds.ownership_baseline;
    Some(if total >= baseline * thresholds.over_aligned_ratio {
        Alignment::OverAligned
    } else if total < baseline * thresholds.contrarian_ratio {
        Alignment::Contrarian
    } else {
        Alignment::Balanced
    })
}

// ---------------------------------------------------------------------------
// Upside
// ---------------------------------------------------------------------------

/// Headroom between the lineup's ceiling and its median projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Upside {
    Clean,
    Mixed,
    Thin,
}

impl Upside {
    pub fn label(&self) -> &'static str {
        match self {
            Upside::Clean => "Clean",
            Upside::Mixed => "Mixed",
            Upside::Thin => "Thin",
        }
    }

    pub fn color(&self) -> SignalColor {
        match self {
            Upside::Clean => SignalColor::Emerald,
            Upside::Mixed => SignalColor::Amber,
            Upside::Thin => SignalColor::Red,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Upside::Clean => "🎯",
            Upside::Mixed => "◐",
            Upside::Thin => "▽",
        }
    }

    pub fn diagnosis(&self) -> Option<&'static str> {
        match self {
            Upside::Clean => Some("High-ceiling combinations identified in core positions."),
            _ => None,
        }
    }

    pub fn chip(&self) -> SignalChip {
        SignalChip {
            label: self.label(),
            color: self.color(),
            icon: self.icon(),
        }
    }
}

fn has_duplicate_player(lineup: &Lineup) -> bool {
    let mut seen = HashSet::with_capacity(lineup.players.len());
    lineup.players.iter().any(|p| !seen.insert(p.id.as_str()))
}

pub fn classify_upside(lineup: &Lineup, thresholds: &Thresholds) -> Option<Upside> {
    if !lineup.is_complete() {
        return None;
    }
    let (proj, ceil) = (lineup.total_projection, lineup.total_ceiling);
    if !(proj > 0.0 && ceil > 0.0) {
        return Some(Upside::Thin);
    }
    let ratio = ceil / proj;
    Some(if ratio > thresholds.clean_ratio && !has_duplicate_player(lineup) {
        Upside::Clean
    } else if ratio > thresholds.mixed_ratio || ratio > thresholds.clean_ratio {
        Upside::Mixed
    } else {
        Upside::Thin
    })
}

// ---------------------------------------------------------------------------
// Combined
// ---------------------------------------------------------------------------

/// The three labels attached to a lineup. Complete lineups carry all three;
/// incomplete ones carry none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineupSignals {
    pub viability: Option<Viability>,
    pub alignment: Option<Alignment>,
    pub upside: Option<Upside>,
}

impl LineupSignals {
    pub fn is_unclassified(&self) -> bool {
        self.viability.is_none() && self.alignment.is_none() && self.upside.is_none()
    }

    /// Diagnosis lines for every label that has one.
    pub fn diagnoses(&self) -> Vec<&'static str> {
        [
            self.viability.and_then(|v| v.diagnosis()),
            self.alignment.and_then(|a| a.diagnosis()),
            self.upside.and_then(|u| u.diagnosis()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

pub fn classify_lineup(
    lineup: &Lineup,
    contest: &ContestState,
    thresholds: &Thresholds,
) -> LineupSignals {
    LineupSignals {
        viability: classify_viability(lineup, contest, thresholds),
        alignment: classify_alignment(lineup, thresholds),
        upside: classify_upside(lineup, thresholds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contest::{ContestInput, PayoutCurve};
    use crate::model::{Player, PlayerRef, SimOutcomes};

    fn contest(fee: f64, field: u32, prize_pool: f64) -> ContestState {
        ContestState::new(ContestInput {
            name: "Test".into(),
            entry_fee: fee,
            entries: 1,
            field_size: field,
            prize_pool,
            payout: PayoutCurve::default(),
        })
    }

    fn player(id: &str, own: Option<f64>, proj: f64, ceil: Option<f64>) -> Player {
        Player {
            id: id.into(),
            name: format!("P{id}"),
            team: "BOS".into(),
            opponent: "NYK".into(),
            position: "PG".into(),
            salary: 6000,
            projection: proj,
            ownership: own,
            ceiling: ceil,
            value: None,
        }
    }

    /// Complete lineup with uniform per-player stats.
    fn lineup(own: Option<f64>, proj: f64, ceil: Option<f64>, sim: SimOutcomes) -> Lineup {
        let players: Vec<Player> = (1..=8)
            .map(|i| player(&i.to_string(), own, proj, ceil))
            .collect();
        let refs = players.iter().map(|p| PlayerRef::by_id(p.id.clone())).collect();
        let mut l = Lineup::new("test", 1, None, refs, sim);
        l.set_players(players, 0);
        l
    }

    fn roi(v: f64) -> SimOutcomes {
        SimOutcomes {
            sim_roi: Some(v),
            ..SimOutcomes::default()
        }
    }

    #[test]
    fn viability_against_fifteen_percent_rake() {
        let c = contest(10.0, 1000, 8500.0);
        let t = Thresholds::default();
        let strong = lineup(Some(10.0), 40.0, Some(55.0), roi(40.0));
        let weak = lineup(Some(10.0), 40.0, Some(55.0), roi(-5.0));
        let middling = lineup(Some(10.0), 40.0, Some(55.0), roi(8.0));
        assert_eq!(classify_viability(&strong, &c, &t), Some(Viability::Strong));
        assert_eq!(classify_viability(&weak, &c, &t), Some(Viability::Unlikely));
        assert_eq!(classify_viability(&middling, &c, &t), Some(Viability::Moderate));
    }

    #[test]
    fn viability_boundary_is_conservative() {
        let c = contest(10.0, 1000, 8500.0);
        let t = Thresholds::default();
        let at_rake = lineup(None, 40.0, None, roi(15.0));
        let at_zero = lineup(None, 40.0, None, roi(0.0));
        assert_eq!(classify_viability(&at_rake, &c, &t), Some(Viability::Moderate));
        assert_eq!(classify_viability(&at_zero, &c, &t), Some(Viability::Unlikely));
    }

    #[test]
    fn viability_falls_back_to_ev_over_fee() {
        let c = contest(10.0, 1000, 8500.0);
        let ev = SimOutcomes {
            sim_ev: Some(3.0),
            ..SimOutcomes::default()
        };
        let l = lineup(None, 40.0, None, ev);
        assert_eq!(
            classify_viability(&l, &c, &Thresholds::default()),
            Some(Viability::Strong)
        );
        let free = contest(0.0, 1000, 0.0);
        assert_eq!(
            classify_viability(&l, &free, &Thresholds::default()),
            Some(Viability::Unlikely)
        );
    }

    #[test]
    fn no_sim_data_counts_as_break_even() {
        let c = contest(10.0, 1000, 8500.0);
        let l = lineup(Some(10.0), 40.0, Some(55.0), SimOutcomes::default());
        assert_eq!(
            classify_viability(&l, &c, &Thresholds::default()),
            Some(Viability::Unlikely)
        );

        let lenient = Thresholds {
            moderate_floor: -0.1,
            ..Thresholds::default()
        };
        assert_eq!(classify_viability(&l, &c, &lenient), Some(Viability::Moderate));
    }

    #[test]
    fn alignment_bands() {
        let t = Thresholds::default();
        // 8 players x ownership
        let heavy = lineup(Some(20.0), 40.0, None, SimOutcomes::default()); // 160
        let mid = lineup(Some(12.0), 40.0, None, SimOutcomes::default()); // 96
        let light = lineup(Some(5.0), 40.0, None, SimOutcomes::default()); // 40
        assert_eq!(classify_alignment(&heavy, &t), Some(Alignment::OverAligned));
        assert_eq!(classify_alignment(&mid, &t), Some(Alignment::Balanced));
        assert_eq!(classify_alignment(&light, &t), Some(Alignment::Contrarian));
    }

    #[test]
    fn alignment_boundaries() {
        let t = Thresholds::default();
        let at_over = lineup(Some(16.25), 40.0, None, SimOutcomes::default()); // 130
        let at_contrarian = lineup(Some(8.75), 40.0, None, SimOutcomes::default()); // 70
        assert_eq!(classify_alignment(&at_over, &t), Some(Alignment::OverAligned));
        assert_eq!(classify_alignment(&at_contrarian, &t), Some(Alignment::Balanced));
    }

    #[test]
    fn missing_ownership_reads_as_contrarian() {
        let l = lineup(None, 40.0, None, SimOutcomes::default());
        assert_eq!(
            classify_alignment(&l, &Thresholds::default()),
            Some(Alignment::Contrarian)
        );
    }

    #[test]
    fn upside_bands() {
        let t = Thresholds::default();
        let clean = lineup(None, 40.0, Some(60.0), SimOutcomes::default()); // 1.5
        let mixed = lineup(None, 40.0, Some(50.0), SimOutcomes::default()); // 1.25
        let thin = lineup(None, 40.0, Some(44.0), SimOutcomes::default()); // 1.1
        assert_eq!(classify_upside(&clean, &t), Some(Upside::Clean));
        assert_eq!(classify_upside(&mixed, &t), Some(Upside::Mixed));
        assert_eq!(classify_upside(&thin, &t), Some(Upside::Thin));
    }

    #[test]
    fn duplicate_player_caps_upside_at_mixed() {
        let mut l = lineup(None, 40.0, Some(60.0), SimOutcomes::default());
        let mut players = l.players.clone();
        players[7] = players[0].clone();
        l.set_players(players, 0);
        assert_eq!(classify_upside(&l, &Thresholds::default()), Some(Upside::Mixed));
    }

    #[test]
    fn upside_without_projection_or_ceiling_is_thin() {
        let t = Thresholds::default();
        let no_ceiling = lineup(None, 40.0, None, SimOutcomes::default());
        let no_proj = lineup(None, 0.0, Some(50.0), SimOutcomes::default());
        assert_eq!(classify_upside(&no_ceiling, &t), Some(Upside::Thin));
        assert_eq!(classify_upside(&no_proj, &t), Some(Upside::Thin));
    }

    #[test]
    fn every_complete_lineup_is_labelled_on_each_axis() {
        let c = contest(10.0, 1000, 8500.0);
        let t = Thresholds::default();
        let cases = [
            lineup(None, 0.0, None, SimOutcomes::default()),
            lineup(Some(20.0), 40.0, Some(60.0), roi(40.0)),
            lineup(Some(5.0), 40.0, Some(44.0), roi(-5.0)),
            lineup(None, 40.0, Some(50.0), SimOutcomes::default()),
        ];
        for l in &cases {
            let signals = classify_lineup(l, &c, &t);
            assert!(signals.viability.is_some(), "{signals:?}");
            assert!(signals.alignment.is_some(), "{signals:?}");
            assert!(signals.upside.is_some(), "{signals:?}");
        }
    }

    #[test]
    fn incomplete_lineup_is_never_labelled() {
        let c = contest(10.0, 1000, 8500.0);
        let mut l = lineup(Some(20.0), 40.0, Some(60.0), roi(40.0));
        let mut players = l.players.clone();
        players.pop();
        l.set_players(players, 1);
        let signals = classify_lineup(&l, &c, &Thresholds::default());
        assert!(signals.is_unclassified());
    }

    #[test]
    fn chips_carry_display_hints() {
        let chip = Viability::Strong.chip();
        assert_eq!(chip.label, "Strong");
        assert_eq!(chip.color.as_str(), "emerald");
        assert_eq!(Alignment::OverAligned.label(), "Over-Aligned");
        assert_eq!(Alignment::Balanced.color(), SignalColor::Blue);
    }

    #[test]
    fn diagnoses_collects_available_lines() {
        let signals = LineupSignals {
            viability: Some(Viability::Strong),
            alignment: Some(Alignment::Balanced),
            upside: Some(Upside::Clean),
        };
        assert_eq!(signals.diagnoses().len(), 2);
    }
}
