// Report rendering: a snapshot of the session as plain text or JSON.

use std::fmt::Write;

use serde_json::{json, Value};
use slatecheck_core::contest::ContestState;
use slatecheck_core::model::{Game, Lineup, SlateStats, Warning};
use slatecheck_core::report::{belief_deltas, portfolio_summary, PlayerDelta, PortfolioSummary};
use slatecheck_core::session::{ReferenceInfo, Session, SidecarStatus};

pub struct ReportView {
    reference: Option<ReferenceInfo>,
    belief_profile: Option<String>,
    contest: ContestState,
    stats: SlateStats,
    games: Vec<Game>,
    sets: Vec<String>,
    lineups: Vec<Lineup>,
    summary: PortfolioSummary,
    deltas: Vec<PlayerDelta>,
}

impl ReportView {
    pub fn build(session: &mut Session, set: Option<&str>) -> Self {
        let contest = session.contest_state();
        let lineups: Vec<Lineup> = session.lineups_in_set(set).cloned().collect();
        let summary = portfolio_summary(&lineups, &contest.input);
        let deltas = match (session.belief_pool(), session.reference_pool()) {
            (Some(beliefs), Some(reference)) => belief_deltas(&beliefs, &reference),
            _ => Vec::new(),
        };
        ReportView {
            reference: session.reference_info().cloned(),
            belief_profile: session.belief_profile_name().map(str::to_string),
            contest,
            stats: session.slate_stats(),
            games: session.games(),
            sets: session.lineup_sets(),
            lineups,
            summary,
            deltas,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "reference": self.reference.as_ref().map(|r| json!({
                "location": r.location,
                "meta": r.meta,
                "diagnostics": r.diagnostics,
                "sidecar": sidecar_label(&r.sidecar),
            })),
            "belief_profile": self.belief_profile,
            "contest": self.contest,
            "stats": {
                "total_players": self.stats.total_players,
                "total_lineups": self.stats.total_lineups,
                "missing_salary_count": self.stats.missing_salary_count,
                "warnings": self.stats.warnings.iter().map(Warning::to_string).collect::<Vec<_>>(),
            },
            "games": self.games.iter().map(Game::to_string).collect::<Vec<_>>(),
            "sets": self.sets,
            "lineups": self.lineups.iter().map(lineup_json).collect::<Vec<_>>(),
            "summary": self.summary,
            "belief_deltas": self.deltas,
        })
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        match &self.reference {
            Some(r) => writeln!(
                out,
                "Reference pack: {} ({} players, sidecar {})",
                r.location,
                self.stats.total_players,
                sidecar_label(&r.sidecar)
            )?,
            None => writeln!(out, "Reference pack: none loaded")?,
        }
        if let Some(name) = &self.belief_profile {
            writeln!(out, "Belief profile: {name}")?;
        }

        let c = &self.contest;
        writeln!(
            out,
            "Contest: {} | ${:.2} x {} entries | field {} | prize pool ${:.0}",
            c.input.name, c.input.entry_fee, c.input.entries, c.input.field_size, c.input.prize_pool
        )?;
        writeln!(
            out,
            "  rake {:.1}% | {} paid ({:.1}%) | outlay ${:.2}",
            c.derived.rake_pct * 100.0,
            c.derived.paid_places,
            c.derived.paid_pct * 100.0,
            c.derived.user_outlay
        )?;

        if !self.games.is_empty() {
            let games: Vec<String> = self.games.iter().map(Game::to_string).collect();
            writeln!(out, "Games: {}", games.join(", "))?;
        }
        if self.stats.missing_salary_count > 0 {
            writeln!(
                out,
                "Players missing salary: {}",
                self.stats.missing_salary_count
            )?;
        }

        if !self.stats.warnings.is_empty() {
            writeln!(out, "\nWarnings:")?;
            for w in &self.stats.warnings {
                writeln!(out, "  ! {w}")?;
            }
        }

        writeln!(out, "\nLineups ({} of {}):", self.lineups.len(), self.stats.total_lineups)?;
        if self.sets.len() > 1 {
            writeln!(out, "  sets: {}", self.sets.join(", "))?;
        }
        for lineup in &self.lineups {
            write_lineup(out, lineup)?;
        }

        let s = &self.summary;
        writeln!(out, "\nReality check ({} complete lineups):", s.analyzed)?;
        writeln!(
            out,
            "  Strong {:.0}% | Over-Aligned {:.0}% | Clean {:.0}%",
            s.strong_pct, s.over_aligned_pct, s.clean_pct
        )?;
        writeln!(out, "  {}", s.narrative)?;
        writeln!(out, "  {}", s.guidance)?;

        if !self.deltas.is_empty() {
            writeln!(out, "\nBeliefs vs reference:")?;
            for d in &self.deltas {
                writeln!(
                    out,
                    "  {:<24} {:<4} proj {:>6}  own {:>7}  value {:>6}",
                    d.name,
                    d.team,
                    d.projection.display(""),
                    d.ownership.display("%"),
                    d.value.display("")
                )?;
            }
        }
        Ok(())
    }
}

fn sidecar_label(status: &SidecarStatus) -> String {
    match status {
        SidecarStatus::NotListed => "not listed".to_string(),
        SidecarStatus::Skipped => "skipped".to_string(),
        SidecarStatus::Loaded { lineups } => format!("loaded ({lineups} lineups)"),
        SidecarStatus::FellBack { reason } => format!("unavailable: {reason}"),
    }
}

fn opt(v: Option<f64>, suffix: &str) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.1}{suffix}"))
}

fn write_lineup(out: &mut String, l: &Lineup) -> std::fmt::Result {
    writeln!(
        out,
        "  {:<14} ${:>6}  proj {:>6.1}  own {:>6.1}%  ceil {:>6.1}  roi {:>7}  cash {:>6}",
        l.id,
        l.total_salary,
        l.total_projection,
        l.total_ownership,
        l.total_ceiling,
        opt(l.sim_roi, "%"),
        opt(l.cash_pct, "%")
    )?;

    if l.is_complete() {
        let chips: Vec<&str> = [
            l.signals.viability.map(|v| v.label()),
            l.signals.alignment.map(|a| a.label()),
            l.signals.upside.map(|u| u.label()),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !chips.is_empty() {
            writeln!(out, "    [{}]", chips.join("] ["))?;
        }
        for diagnosis in l.signals.diagnoses() {
            writeln!(out, "    - {diagnosis}")?;
        }
    } else if l.is_unmapped() {
        writeln!(out, "    no players mapped to the active pool")?;
    } else {
        writeln!(out, "    {} player(s) unresolved", l.missing_count)?;
    }

    if let Some(slots) = &l.slots {
        let cells: Vec<String> = slots
            .slots
            .iter()
            .map(|(slot, p)| match p {
                Some(p) => format!("{slot} {}", p.name),
                None => format!("{slot} ?"),
            })
            .collect();
        writeln!(out, "    {}", cells.join(" | "))?;
    }
    writeln!(out, "    ids: {}", l.copyable_ids())
}

fn lineup_json(l: &Lineup) -> Value {
    json!({
        "id": l.id,
        "set": l.set,
        "lineup_id_raw": l.lineup_id_raw,
        "complete": l.is_complete(),
        "missing_count": l.missing_count,
        "players": l.players.iter().map(|p| json!({
            "id": p.id,
            "name": p.name,
            "team": p.team,
            "position": p.position,
            "salary": p.salary,
            "projection": p.projection,
            "ownership": p.ownership,
        })).collect::<Vec<_>>(),
        "total_salary": l.total_salary,
        "total_projection": l.total_projection,
        "total_ownership": l.total_ownership,
        "total_ceiling": l.total_ceiling,
        "sim": l.sim_outcomes(),
        "slots": l.slots.as_ref().map(|a| a.slots.iter().map(|(slot, p)| json!({
            "slot": slot.display_str(),
            "player_id": p.as_ref().map(|p| p.id.clone()),
        })).collect::<Vec<_>>()),
        "signals": {
            "viability": l.signals.viability.map(|v| v.chip()),
            "alignment": l.signals.alignment.map(|a| a.chip()),
            "upside": l.signals.upside.map(|u| u.chip()),
            "diagnoses": l.signals.diagnoses(),
        },
        "copyable_ids": l.copyable_ids(),
    })
}
