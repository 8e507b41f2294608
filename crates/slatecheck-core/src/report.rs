// Portfolio read-outs: the "reality check" summary over classified lineups
// and belief-versus-reference deltas per player.

use serde::Serialize;

use crate::classify::{Alignment, Upside, Viability};
use crate::contest::ContestInput;
use crate::model::{Lineup, PlayerPool};
use crate::reconcile::Reconciler;

/// Field sizes above this are treated as large-field contests.
pub const LARGE_FIELD: u32 = 5000;

/// Deltas within this distance of zero are shown as unchanged.
const DELTA_EPSILON: f64 = 0.01;

// ---------------------------------------------------------------------------
// Portfolio summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    /// Complete lineups the percentages are taken over.
    pub analyzed: usize,
    pub strong_pct: f64,
    pub over_aligned_pct: f64,
    pub clean_pct: f64,
    pub narrative: String,
    pub guidance: String,
}

fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Summarize how a classified portfolio looks for `contest`.
pub fn portfolio_summary(lineups: &[Lineup], contest: &ContestInput) -> PortfolioSummary {
    let complete: Vec<&Lineup> = lineups.iter().filter(|l| l.is_complete()).collect();
    let total = complete.len();
    let count = |pred: &dyn Fn(&Lineup) -> bool| complete.iter().filter(|l| pred(l)).count();

    let strong = count(&|l| l.signals.viability == Some(Viability::Strong));
    let over_aligned = count(&|l| l.signals.alignment == Some(Alignment::OverAligned));
    let clean = count(&|l| l.signals.upside == Some(Upside::Clean));

    let strong_pct = pct(strong, total);
    let over_aligned_pct = pct(over_aligned, total);

    let narrative = if total == 0 {
        "No lineups analyzed yet. Upload builds to generate your Reality Check summary."
            .to_string()
    } else {
        let viability = if strong_pct > 50.0 {
            "Your portfolio is highly viable for this contest"
        } else {
            "Your portfolio shows mixed viability"
        };
        let exposure = if over_aligned_pct > 50.0 {
            "but is heavily aligned with the field"
        } else {
            "and maintains a balanced exposure to the field"
        };
        let upside = if clean > 0 {
            "Upside exists, but payout splitting risk should be monitored."
        } else {
            "Upside exists, though floor stability is the primary driver."
        };
        format!("{viability} {exposure}. {upside}")
    };

    PortfolioSummary {
        analyzed: total,
        strong_pct,
        over_aligned_pct,
        clean_pct: pct(clean, total),
        narrative,
        guidance: field_guidance(contest.field_size).to_string(),
    }
}

/// Strategy note for the contest's field size.
pub fn field_guidance(field_size: u32) -> &'static str {
    if field_size > LARGE_FIELD {
        "For this contest size, consider reducing duplication risk and increasing ceiling \
         exposure across your remaining entries. The \"Over-Aligned\" builds should be \
         scrutinized for potential pivot plays in FLEX spots."
    } else {
        "Smaller fields prioritize projectable volume. Focus on your \"Strong Viability\" \
         builds and ensure you aren't over-extending into low-floor contrarian plays where \
         variance outweighs potential ROI."
    }
}

// ---------------------------------------------------------------------------
// Belief deltas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeltaDirection {
    Higher,
    Lower,
    Flat,
}

/// One belief figure next to its reference counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Delta {
    pub belief: f64,
    pub reference: f64,
}

impl Delta {
    pub fn delta(&self) -> f64 {
        self.belief - self.reference
    }

    pub fn direction(&self) -> DeltaDirection {
        let d = self.delta();
        if d > DELTA_EPSILON {
            DeltaDirection::Higher
        } else if d < -DELTA_EPSILON {
            DeltaDirection::Lower
        } else {
            DeltaDirection::Flat
        }
    }

    /// `+1.5`, `-0.3`, or `--` when unchanged.
    pub fn display(&self, suffix: &str) -> String {
        match self.direction() {
            DeltaDirection::Higher => format!("+{:.1}{suffix}", self.delta()),
            DeltaDirection::Lower => format!("{:.1}{suffix}", self.delta()),
            DeltaDirection::Flat => "--".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerDelta {
    pub id: String,
    pub name: String,
    pub team: String,
    pub projection: Delta,
    /// Missing on either side is read as 0.
    pub ownership: Delta,
    pub value: Delta,
}

/// Compare every belief player against its reference counterpart. Players
/// with no counterpart are omitted.
pub fn belief_deltas(beliefs: &PlayerPool, reference: &PlayerPool) -> Vec<PlayerDelta> {
    let reconciler = Reconciler::new(reference);
    beliefs
        .iter()
        .filter_map(|belief| {
            let counterpart = reconciler.find_counterpart(belief)?;
            Some(PlayerDelta {
                id: belief.id.clone(),
                name: belief.name.clone(),
                team: belief.team.clone(),
                projection: Delta {
                    belief: belief.projection,
                    reference: counterpart.projection,
                },
                ownership: Delta {
                    belief: belief.ownership.unwrap_or(0.0),
                    reference: counterpart.ownership.unwrap_or(0.0),
                },
                value: Delta {
                    belief: belief.value.unwrap_or(0.0),
                    reference: counterpart.value.unwrap_or(0.0),
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LineupSignals;
    use crate::model::{Player, PlayerRef, SimOutcomes};

    fn classified(complete: bool, signals: LineupSignals) -> Lineup {
        let refs: Vec<PlayerRef> = (1..=8).map(|i| PlayerRef::by_id(i.to_string())).collect();
        let mut lineup = Lineup::new("test", 1, None, refs, SimOutcomes::default());
        let players: Vec<Player> = (1..=8).map(|i| player(&i.to_string(), 20.0)).collect();
        let missing = if complete { 0 } else { 1 };
        lineup.set_players(players, missing);
        lineup.signals = signals;
        lineup
    }

    fn player(id: &str, projection: f64) -> Player {
        Player {
            id: id.into(),
            name: format!("Player {id}"),
            team: "BOS".into(),
            opponent: "NYK".into(),
            position: "PG".into(),
            salary: 5000,
            projection,
            ownership: Some(12.0),
            ceiling: None,
            value: Some(4.0),
        }
    }

    fn signals(v: Viability, a: Alignment, u: Upside) -> LineupSignals {
        LineupSignals {
            viability: Some(v),
            alignment: Some(a),
            upside: Some(u),
        }
    }

    #[test]
    fn empty_portfolio_prompts_for_uploads() {
        let summary = portfolio_summary(&[], &ContestInput::default());
        assert_eq!(summary.analyzed, 0);
        assert_eq!(summary.strong_pct, 0.0);
        assert!(summary.narrative.starts_with("No lineups analyzed yet."));
    }

    #[test]
    fn strong_and_aligned_portfolio() {
        let lineups = vec![
            classified(true, signals(Viability::Strong, Alignment::OverAligned, Upside::Thin)),
            classified(true, signals(Viability::Strong, Alignment::OverAligned, Upside::Mixed)),
            classified(true, signals(Viability::Unlikely, Alignment::Balanced, Upside::Thin)),
            // incomplete lineups are not counted
            classified(false, LineupSignals::default()),
        ];
        let summary = portfolio_summary(&lineups, &ContestInput::default());
        assert_eq!(summary.analyzed, 3);
        assert!((summary.strong_pct - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.clean_pct, 0.0);
        assert_eq!(
            summary.narrative,
            "Your portfolio is highly viable for this contest but is heavily aligned with \
             the field. Upside exists, though floor stability is the primary driver."
        );
    }

    #[test]
    fn mixed_balanced_portfolio_with_clean_upside() {
        let lineups = vec![
            classified(true, signals(Viability::Strong, Alignment::Balanced, Upside::Clean)),
            classified(true, signals(Viability::Moderate, Alignment::Contrarian, Upside::Thin)),
        ];
        let summary = portfolio_summary(&lineups, &ContestInput::default());
        // exactly half is not a majority
        assert_eq!(summary.strong_pct, 50.0);
        assert!(summary
            .narrative
            .starts_with("Your portfolio shows mixed viability and maintains"));
        assert!(summary.narrative.ends_with("payout splitting risk should be monitored."));
    }

    #[test]
    fn guidance_switches_above_large_field() {
        assert!(field_guidance(LARGE_FIELD).starts_with("Smaller fields"));
        assert!(field_guidance(LARGE_FIELD + 1).starts_with("For this contest size"));
        let contest = ContestInput {
            field_size: 23_781,
            ..ContestInput::default()
        };
        assert!(portfolio_summary(&[], &contest).guidance.contains("FLEX"));
    }

    #[test]
    fn deltas_against_reference_counterparts() {
        let reference = PlayerPool::new(vec![player("4471", 50.0), player("9", 30.0)]);
        let mut mine = player("x-1", 55.0);
        mine.name = "Player 4471".into();
        mine.ownership = None;
        let beliefs = PlayerPool::new(vec![mine, player("unknown", 10.0)]);

        let deltas = belief_deltas(&beliefs, &reference);
        assert_eq!(deltas.len(), 1);
        let d = &deltas[0];
        assert_eq!(d.projection.direction(), DeltaDirection::Higher);
        assert_eq!(d.projection.display(""), "+5.0");
        assert_eq!(d.ownership.display("%"), "-12.0%");
        assert_eq!(d.value.display(""), "--");
    }
}
