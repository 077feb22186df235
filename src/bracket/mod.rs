//! Bracket construction and round labeling.
//!
//! Everything in this module except [`cache`] is pure: it takes a snapshot of
//! a tournament's matches and returns derived views. Rounds are derived from
//! the data itself; gaps or duplicates are reported by [`inspect`] but never
//! rejected.

pub mod cache;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Match, MatchId, MatchStatus, PlayerSlot};

pub use cache::{BracketCache, BracketSnapshot};

/// Placeholder shown for an undecided slot.
pub const TBD: &str = "TBD";

/// Group matches by round, each round ordered by ascending match number.
///
/// Iteration over the returned map is in ascending round order. Matches that
/// share a `(round, match_number)` pair are all kept, in input order.
pub fn group_by_round<I>(matches: I) -> BTreeMap<u32, Vec<Match>>
where
    I: IntoIterator<Item = Match>,
{
    let mut rounds: BTreeMap<u32, Vec<Match>> = BTreeMap::new();
    for m in matches {
        rounds.entry(m.round).or_default().push(m);
    }
    for round in rounds.values_mut() {
        // stable: ties keep input order
        round.sort_by_key(|m| m.match_number);
    }
    rounds
}

/// Highest round present, or `None` when there are no matches.
pub fn total_rounds(matches: &[Match]) -> Option<u32> {
    matches.iter().map(|m| m.round).max()
}

/// Display name for `round` given the tournament's `total_rounds`.
///
/// Rounds past the derived total (possible if matches changed between fetch
/// and render) fall through to "Round N".
pub fn round_name(round: u32, total_rounds: u32) -> String {
    let distance_from_final = i64::from(total_rounds) - i64::from(round);
    match distance_from_final {
        0 => "Finals".to_string(),
        1 => "Semi Finals".to_string(),
        2 => "Quarter Finals".to_string(),
        _ => format!("Round {}", round),
    }
}

/// The slot to highlight as winner: a completed match whose score is
/// strictly higher on one side. `winner_id` is not consulted.
pub fn winning_slot(m: &Match) -> Option<PlayerSlot> {
    if m.status != MatchStatus::Completed {
        return None;
    }
    if m.player1_score > m.player2_score {
        Some(PlayerSlot::One)
    } else if m.player2_score > m.player1_score {
        Some(PlayerSlot::Two)
    } else {
        None
    }
}

pub fn is_winner(m: &Match, slot: PlayerSlot) -> bool {
    winning_slot(m) == Some(slot)
}

/// How a match's recorded `winner_id` relates to the score-derived winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerAgreement {
    /// Not completed; nothing to compare.
    NotCompleted,
    /// Completed but no `winner_id` recorded.
    NoRecordedWinner,
    Agrees,
    Disagrees,
    /// `winner_id` is set but cannot be matched to a slot, or scores are level.
    Unverifiable,
}

pub fn winner_agreement(m: &Match) -> WinnerAgreement {
    if m.status != MatchStatus::Completed {
        return WinnerAgreement::NotCompleted;
    }
    let Some(ref recorded) = m.winner_id else {
        return WinnerAgreement::NoRecordedWinner;
    };
    let recorded_slot = [PlayerSlot::One, PlayerSlot::Two]
        .into_iter()
        .find(|slot| m.participant(*slot) == Some(recorded));

    match (recorded_slot, winning_slot(m)) {
        (Some(recorded), Some(by_score)) if recorded == by_score => WinnerAgreement::Agrees,
        (Some(_), Some(_)) => WinnerAgreement::Disagrees,
        _ => WinnerAgreement::Unverifiable,
    }
}

/// One participant slot as rendered on a match card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub name: String,
    pub score: u32,
    pub is_winner: bool,
}

/// A match as rendered inside a round column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchView {
    pub id: MatchId,
    pub match_number: u32,
    pub status: MatchStatus,
    pub status_label: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub player1: SlotView,
    pub player2: SlotView,
    pub winner_agreement: WinnerAgreement,
}

impl From<&Match> for MatchView {
    fn from(m: &Match) -> Self {
        let slot = |slot: PlayerSlot| SlotView {
            name: m.player_name(slot).unwrap_or(TBD).to_string(),
            score: m.score(slot),
            is_winner: is_winner(m, slot),
        };
        Self {
            id: m.id.clone(),
            match_number: m.match_number,
            status: m.status,
            status_label: m.status.label(),
            scheduled_time: m.scheduled_time,
            player1: slot(PlayerSlot::One),
            player2: slot(PlayerSlot::Two),
            winner_agreement: winner_agreement(m),
        }
    }
}

/// One column of the bracket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundColumn {
    pub round: u32,
    pub name: String,
    pub matches: Vec<MatchView>,
}

/// A whole tournament bracket, columns in ascending round order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Bracket {
    pub total_rounds: u32,
    pub rounds: Vec<RoundColumn>,
}

impl Bracket {
    /// No matches yet; callers show a "no bracket yet" state.
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn match_count(&self) -> usize {
        self.rounds.iter().map(|r| r.matches.len()).sum()
    }
}

/// Group, label and render a snapshot of matches.
pub fn build_bracket(matches: Vec<Match>) -> Bracket {
    let Some(total) = total_rounds(&matches) else {
        return Bracket::default();
    };
    let rounds = group_by_round(matches)
        .into_iter()
        .map(|(round, ms)| RoundColumn {
            round,
            name: round_name(round, total),
            matches: ms.iter().map(MatchView::from).collect(),
        })
        .collect();

    Bracket {
        total_rounds: total,
        rounds,
    }
}

/// Structural oddities in a bracket snapshot. Reported, never rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BracketIssue {
    /// A round between 1 and the total has no matches.
    MissingRound { round: u32 },
    /// More than one match claims the same slot in a round.
    DuplicateMatchNumber { round: u32, match_number: u32 },
    /// A match was stored with round 0.
    RoundZero { match_id: MatchId },
}

/// Check a snapshot for gaps, duplicate match numbers and zero rounds.
pub fn inspect(matches: &[Match]) -> Vec<BracketIssue> {
    let mut issues = Vec::new();
    let Some(total) = total_rounds(matches) else {
        return issues;
    };

    for m in matches.iter().filter(|m| m.round == 0) {
        issues.push(BracketIssue::RoundZero {
            match_id: m.id.clone(),
        });
    }

    let mut counts: HashMap<(u32, u32), usize> = HashMap::new();
    for m in matches {
        *counts.entry((m.round, m.match_number)).or_default() += 1;
    }

    for round in 1..=total {
        if !counts.keys().any(|(r, _)| *r == round) {
            issues.push(BracketIssue::MissingRound { round });
        }
    }

    let mut duplicates: Vec<(u32, u32)> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(key, _)| key)
        .collect();
    duplicates.sort_unstable();
    issues.extend(
        duplicates
            .into_iter()
            .map(|(round, match_number)| BracketIssue::DuplicateMatchNumber {
                round,
                match_number,
            }),
    );

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityId;
    use pretty_assertions::assert_eq;

    fn m(round: u32, number: u32) -> Match {
        Match::new(EntityId::from("t-1"), round, number)
    }

    fn completed(p1: u32, p2: u32) -> Match {
        m(1, 1)
            .with_players("Alice", "Bob")
            .with_scores(p1, p2)
            .with_status(MatchStatus::Completed)
    }

    #[test]
    fn test_group_empty() {
        assert!(group_by_round(Vec::new()).is_empty());
    }

    #[test]
    fn test_group_is_partition() {
        let input = vec![m(2, 1), m(1, 2), m(3, 1), m(1, 1), m(2, 2)];
        let ids: Vec<_> = input.iter().map(|x| x.id.clone()).collect();

        let grouped = group_by_round(input);

        let mut seen = Vec::new();
        for (round, ms) in &grouped {
            for x in ms {
                assert_eq!(x.round, *round);
                seen.push(x.id.clone());
            }
        }
        assert_eq!(seen.len(), ids.len());
        for id in ids {
            assert!(seen.contains(&id));
        }
    }

    #[test]
    fn test_group_rounds_ascending_and_sorted_within() {
        let grouped = group_by_round(vec![m(2, 2), m(1, 3), m(2, 1), m(1, 1), m(1, 2)]);

        let rounds: Vec<u32> = grouped.keys().copied().collect();
        assert_eq!(rounds, vec![1, 2]);

        let r1: Vec<u32> = grouped[&1].iter().map(|x| x.match_number).collect();
        assert_eq!(r1, vec![1, 2, 3]);
        let r2: Vec<u32> = grouped[&2].iter().map(|x| x.match_number).collect();
        assert_eq!(r2, vec![1, 2]);
    }

    #[test]
    fn test_group_keeps_duplicates_in_input_order() {
        let first = m(1, 1).with_players("First", "A");
        let second = m(1, 1).with_players("Second", "B");
        let grouped = group_by_round(vec![m(1, 2), first.clone(), second.clone()]);

        let r1 = &grouped[&1];
        assert_eq!(r1.len(), 3);
        assert_eq!(r1[0].id, first.id);
        assert_eq!(r1[1].id, second.id);
        assert_eq!(r1[2].match_number, 2);
    }

    #[test]
    fn test_total_rounds() {
        assert_eq!(total_rounds(&[]), None);
        assert_eq!(total_rounds(&[m(1, 1), m(4, 1), m(2, 1)]), Some(4));
    }

    #[test]
    fn test_round_names_four_rounds() {
        assert_eq!(round_name(4, 4), "Finals");
        assert_eq!(round_name(3, 4), "Semi Finals");
        assert_eq!(round_name(2, 4), "Quarter Finals");
        assert_eq!(round_name(1, 4), "Round 1");
    }

    #[test]
    fn test_round_name_single_round_is_finals() {
        assert_eq!(round_name(1, 1), "Finals");
    }

    #[test]
    fn test_round_name_keeps_literal_number() {
        assert_eq!(round_name(2, 6), "Round 2");
        assert_eq!(round_name(3, 6), "Round 3");
    }

    #[test]
    fn test_round_name_past_total_falls_through() {
        assert_eq!(round_name(5, 4), "Round 5");
    }

    #[test]
    fn test_winner_by_score_ignores_winner_id() {
        let mut x = completed(2, 1);
        x.player2_id = Some(EntityId::from("bob"));
        x.winner_id = Some(EntityId::from("bob"));

        assert!(is_winner(&x, PlayerSlot::One));
        assert!(!is_winner(&x, PlayerSlot::Two));
    }

    #[test]
    fn test_completed_tie_has_no_winner() {
        let x = completed(1, 1);
        assert_eq!(winning_slot(&x), None);
    }

    #[test]
    fn test_non_completed_never_highlights() {
        for status in [
            MatchStatus::Scheduled,
            MatchStatus::InProgress,
            MatchStatus::Cancelled,
        ] {
            let x = m(1, 1).with_scores(3, 0).with_status(status);
            assert!(!is_winner(&x, PlayerSlot::One));
            assert!(!is_winner(&x, PlayerSlot::Two));
        }
    }

    #[test]
    fn test_winner_agreement() {
        let mut x = completed(0, 2);
        x.player1_id = Some(EntityId::from("alice"));
        x.player2_id = Some(EntityId::from("bob"));
        assert_eq!(winner_agreement(&x), WinnerAgreement::NoRecordedWinner);

        x.winner_id = Some(EntityId::from("bob"));
        assert_eq!(winner_agreement(&x), WinnerAgreement::Agrees);

        x.winner_id = Some(EntityId::from("alice"));
        assert_eq!(winner_agreement(&x), WinnerAgreement::Disagrees);

        x.winner_id = Some(EntityId::from("someone-else"));
        assert_eq!(winner_agreement(&x), WinnerAgreement::Unverifiable);

        x.status = MatchStatus::InProgress;
        assert_eq!(winner_agreement(&x), WinnerAgreement::NotCompleted);
    }

    #[test]
    fn test_build_bracket_empty() {
        let b = build_bracket(Vec::new());
        assert!(b.is_empty());
        assert_eq!(b.total_rounds, 0);
    }

    #[test]
    fn test_build_bracket_columns() {
        let b = build_bracket(vec![
            m(3, 1).with_players("Alice", "Carol"),
            m(1, 2),
            m(2, 1),
            m(1, 1).with_scores(2, 0).with_status(MatchStatus::Completed),
        ]);

        assert_eq!(b.total_rounds, 3);
        assert_eq!(b.match_count(), 4);
        let names: Vec<&str> = b.rounds.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Quarter Finals", "Semi Finals", "Finals"]);

        let opener = &b.rounds[0].matches[0];
        assert_eq!(opener.match_number, 1);
        assert_eq!(opener.player1.name, TBD);
        assert!(opener.player1.is_winner);
        assert_eq!(opener.status_label, "COMPLETED");

        let last = &b.rounds[2].matches[0];
        assert_eq!(last.player1.name, "Alice");
        assert_eq!(last.player2.name, "Carol");
    }

    #[test]
    fn test_inspect_clean_bracket() {
        assert!(inspect(&[m(1, 1), m(1, 2), m(2, 1)]).is_empty());
        assert!(inspect(&[]).is_empty());
    }

    #[test]
    fn test_inspect_reports_gaps_and_duplicates() {
        let zero = m(0, 1);
        let issues = inspect(&[m(1, 1), m(1, 1), m(3, 1), zero.clone()]);

        assert_eq!(
            issues,
            vec![
                BracketIssue::RoundZero { match_id: zero.id },
                BracketIssue::MissingRound { round: 2 },
                BracketIssue::DuplicateMatchNumber {
                    round: 1,
                    match_number: 1
                },
            ]
        );
    }
}
