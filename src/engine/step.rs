//! One simulated second of play.
//!
//! `SimulationStepEngine::step` reads the match state, draws an action for
//! the side in possession, and returns the event it implies together with
//! every score/stat delta. It never mutates the state; the runner applies
//! the outcome as a unit.

use super::commentary::{CommentaryContext, CommentaryGenerator};
use crate::domain::state::RESTART_POSITION;
use crate::domain::{
    Attributes, EventKind, FieldPlayer, Formation, MatchState, PlayerId, PlayerStats, Priority,
    Role, Side, TeamStats,
};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use uuid::Uuid;

/// Ball position from which a score becomes possible.
pub const RED_ZONE: u8 = 80;
/// Ball position at or beyond which a score is worth the higher value.
pub const GOAL_LINE: u8 = 95;
pub const CLOSE_RANGE_POINTS: u32 = 3;
pub const LONG_RANGE_POINTS: u32 = 2;
/// Furthest the ball can travel without a score.
const MAX_BALL: u8 = 99;

/// Everything one step implies.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub kind: EventKind,
    /// Side credited with the action.
    pub side: Side,
    pub primary: Option<PlayerId>,
    pub description: String,
    pub priority: Priority,
    /// Points for `side`. Only a `Score` outcome may carry points.
    pub points: u32,
    pub player_deltas: Vec<(PlayerId, PlayerStats)>,
    pub team_deltas: Vec<(Side, TeamStats)>,
    pub next_possession: Side,
    pub next_ball_position: u8,
    pub injured: Option<(Side, PlayerId)>,
}

/// Chooses and resolves actions.
#[derive(Debug, Clone, Default)]
pub struct SimulationStepEngine {
    commentary: CommentaryGenerator,
}

/// Players involved in the current play, with stand-ins for vacant slots.
struct Lineup {
    passer: FieldPlayer,
    runner: FieldPlayer,
    wildcard: FieldPlayer,
    blocker: FieldPlayer,
    defender: FieldPlayer,
    thief: FieldPlayer,
    block_strength: f32,
}

impl SimulationStepEngine {
    pub fn new(commentary: CommentaryGenerator) -> Self {
        Self { commentary }
    }

    pub fn commentary(&self) -> &CommentaryGenerator {
        &self.commentary
    }

    pub fn step<R: Rng + ?Sized>(&self, state: &MatchState, rng: &mut R) -> StepOutcome {
        let offense = state.possession;
        let lineup = self.lineup(state, rng);
        let ball = state.ball_position.min(MAX_BALL);

        let kind = choose_action(&lineup, ball, rng);
        match kind {
            EventKind::Pass => self.pass(state, &lineup, ball, rng),
            EventKind::Run => self.run(state, &lineup, ball, rng),
            EventKind::Tackle => self.tackle(state, &lineup, ball, rng),
            EventKind::Score => self.score(state, &lineup, ball, rng),
            EventKind::Turnover => self.turnover(state, &lineup, ball, rng),
            EventKind::Injury => self.injury(state, ball, rng),
            _ => self.advance(state, &lineup, ball, offense, rng),
        }
    }

    fn lineup<R: Rng + ?Sized>(&self, state: &MatchState, rng: &mut R) -> Lineup {
        let offense = &state.sheet(state.possession).formation;
        let defense = &state.sheet(state.possession.opponent()).formation;
        Lineup {
            passer: resolve(offense, Role::Passer, rng),
            runner: resolve(offense, Role::Runner, rng),
            wildcard: resolve(offense, Role::Wildcard, rng),
            blocker: resolve(offense, Role::Blocker, rng),
            defender: resolve(defense, Role::Blocker, rng),
            thief: resolve(defense, Role::Wildcard, rng),
            block_strength: defense.mean_effective(Role::Blocker, |a| a.strength),
        }
    }

    fn advance<R: Rng + ?Sized>(
        &self,
        state: &MatchState,
        l: &Lineup,
        ball: u8,
        offense: Side,
        rng: &mut R,
    ) -> StepOutcome {
        let gain = rng.gen_range(1..=3u8);
        let carrier = &l.blocker;
        let ctx = CommentaryContext::for_state(state, offense);
        let description = self
            .commentary
            .generate(EventKind::Advance, carrier, None, &ctx, rng);
        let mut outcome = base(EventKind::Advance, offense, carrier, description);
        outcome.next_ball_position = ball.saturating_add(gain).min(MAX_BALL);
        outcome.team_deltas.push((
            offense,
            TeamStats {
                plays: 1,
                yards: gain as u32,
                ..Default::default()
            },
        ));
        outcome
    }

    fn pass<R: Rng + ?Sized>(
        &self,
        state: &MatchState,
        l: &Lineup,
        ball: u8,
        rng: &mut R,
    ) -> StepOutcome {
        let offense = state.possession;
        let passer = &l.passer;
        let receiver = if l.runner.id != passer.id {
            &l.runner
        } else {
            &l.wildcard
        };

        let edge = passer.effective(passer.attributes.passing)
            - l.defender.effective(l.defender.attributes.skill);
        let completion = (0.55 + edge / 200.0).clamp(0.2, 0.9);
        let complete = rng.gen_bool(completion as f64);

        let ctx = CommentaryContext::for_state(state, offense);
        let mut description = self
            .commentary
            .generate(EventKind::Pass, passer, Some(receiver), &ctx, rng);
        let mut outcome;
        if complete {
            let gain = rng.gen_range(5..=15u8);
            outcome = base(EventKind::Pass, offense, passer, description);
            outcome.next_ball_position = ball.saturating_add(gain).min(MAX_BALL);
            credit(
                &mut outcome,
                passer,
                PlayerStats {
                    passes_attempted: 1,
                    passes_completed: 1,
                    yards: gain as u32,
                    ..Default::default()
                },
            );
            credit(
                &mut outcome,
                receiver,
                PlayerStats {
                    receptions: 1,
                    ..Default::default()
                },
            );
            outcome.team_deltas.push((
                offense,
                TeamStats {
                    plays: 1,
                    passes: 1,
                    yards: gain as u32,
                    ..Default::default()
                },
            ));
        } else {
            description.push_str(" Incomplete.");
            outcome = base(EventKind::Pass, offense, passer, description);
            outcome.next_ball_position = ball;
            credit(
                &mut outcome,
                passer,
                PlayerStats {
                    passes_attempted: 1,
                    ..Default::default()
                },
            );
            outcome.team_deltas.push((
                offense,
                TeamStats {
                    plays: 1,
                    passes: 1,
                    ..Default::default()
                },
            ));
        }
        outcome
    }

    fn run<R: Rng + ?Sized>(
        &self,
        state: &MatchState,
        l: &Lineup,
        ball: u8,
        rng: &mut R,
    ) -> StepOutcome {
        let offense = state.possession;
        let runner = &l.runner;
        let burst = (runner.effective(runner.attributes.speed) / 12.0) as u8;
        let gain = 2 + rng.gen_range(0..=burst);
        let description = self.commentary.generate(
            EventKind::Run,
            runner,
            Some(&l.defender),
            &CommentaryContext::for_state(state, offense),
            rng,
        );
        let mut outcome = base(EventKind::Run, offense, runner, description);
        outcome.next_ball_position = ball.saturating_add(gain).min(MAX_BALL);
        credit(
            &mut outcome,
            runner,
            PlayerStats {
                rushes: 1,
                yards: gain as u32,
                ..Default::default()
            },
        );
        outcome.team_deltas.push((
            offense,
            TeamStats {
                plays: 1,
                rushes: 1,
                yards: gain as u32,
                ..Default::default()
            },
        ));
        outcome
    }

    fn tackle<R: Rng + ?Sized>(
        &self,
        state: &MatchState,
        l: &Lineup,
        ball: u8,
        rng: &mut R,
    ) -> StepOutcome {
        let defense = state.possession.opponent();
        let tackler = &l.defender;
        let loss = rng.gen_range(0..=2u8);
        let description = self.commentary.generate(
            EventKind::Tackle,
            tackler,
            Some(&l.runner),
            &CommentaryContext::for_state(state, defense),
            rng,
        );
        let mut outcome = base(EventKind::Tackle, defense, tackler, description);
        outcome.next_ball_position = ball.saturating_sub(loss);
        credit(
            &mut outcome,
            tackler,
            PlayerStats {
                tackles: 1,
                ..Default::default()
            },
        );
        outcome.team_deltas.push((
            defense,
            TeamStats {
                tackles: 1,
                ..Default::default()
            },
        ));
        outcome.team_deltas.push((
            state.possession,
            TeamStats {
                plays: 1,
                ..Default::default()
            },
        ));
        outcome
    }

    fn score<R: Rng + ?Sized>(
        &self,
        state: &MatchState,
        l: &Lineup,
        ball: u8,
        rng: &mut R,
    ) -> StepOutcome {
        let offense = state.possession;
        let scorer = if l.wildcard.attributes.skill > l.runner.attributes.skill {
            &l.wildcard
        } else {
            &l.runner
        };
        let points = if ball >= GOAL_LINE {
            CLOSE_RANGE_POINTS
        } else {
            LONG_RANGE_POINTS
        };
        let ctx = CommentaryContext::for_state(state, offense);
        let description = self
            .commentary
            .generate(EventKind::Score, scorer, None, &ctx, rng);
        let mut outcome = base(EventKind::Score, offense, scorer, description);
        outcome.points = points;
        outcome.next_possession = offense.opponent();
        outcome.next_ball_position = RESTART_POSITION;
        credit(
            &mut outcome,
            scorer,
            PlayerStats {
                scores: 1,
                points,
                ..Default::default()
            },
        );
        outcome.team_deltas.push((
            offense,
            TeamStats {
                plays: 1,
                scores: 1,
                points,
                ..Default::default()
            },
        ));
        outcome
    }

    fn turnover<R: Rng + ?Sized>(
        &self,
        state: &MatchState,
        l: &Lineup,
        ball: u8,
        rng: &mut R,
    ) -> StepOutcome {
        let offense = state.possession;
        let defense = offense.opponent();
        let thief = &l.thief;
        let description = self.commentary.generate(
            EventKind::Turnover,
            thief,
            Some(&l.passer),
            &CommentaryContext::for_state(state, defense),
            rng,
        );
        let mut outcome = base(EventKind::Turnover, defense, thief, description);
        outcome.next_possession = defense;
        outcome.next_ball_position = (100 - ball).clamp(1, MAX_BALL);
        credit(
            &mut outcome,
            thief,
            PlayerStats {
                turnovers_forced: 1,
                ..Default::default()
            },
        );
        outcome.team_deltas.push((
            offense,
            TeamStats {
                plays: 1,
                turnovers: 1,
                ..Default::default()
            },
        ));
        outcome
    }

    fn injury<R: Rng + ?Sized>(&self, state: &MatchState, ball: u8, rng: &mut R) -> StepOutcome {
        let side = if rng.gen_bool(0.5) { Side::Home } else { Side::Away };
        let healthy: Vec<&FieldPlayer> = state
            .sheet(side)
            .formation
            .players
            .iter()
            .filter(|p| !p.injured)
            .collect();
        let victim = if healthy.is_empty() {
            stand_in(Role::Wildcard)
        } else {
            healthy[rng.gen_range(0..healthy.len())].clone()
        };

        let ctx = CommentaryContext::for_state(state, side);
        let description = self
            .commentary
            .generate(EventKind::Injury, &victim, None, &ctx, rng);
        let mut outcome = base(EventKind::Injury, side, &victim, description);
        outcome.next_possession = state.possession;
        outcome.next_ball_position = ball;
        if !is_stand_in(&victim) {
            outcome.injured = Some((side, victim.id));
            credit(
                &mut outcome,
                &victim,
                PlayerStats {
                    injuries: 1,
                    ..Default::default()
                },
            );
            outcome.team_deltas.push((
                side,
                TeamStats {
                    injuries: 1,
                    ..Default::default()
                },
            ));
        }
        outcome
    }
}

/// Weighted draw over the action categories, driven by the players involved.
fn choose_action<R: Rng + ?Sized>(l: &Lineup, ball: u8, rng: &mut R) -> EventKind {
    let score_weight = if ball >= RED_ZONE {
        2.0 + (ball - RED_ZONE) as f32 * 0.6
            + l.wildcard.effective(l.wildcard.attributes.skill) * 0.05
    } else {
        0.0
    };
    let weights = [
        30.0,
        10.0 + l.passer.effective(l.passer.attributes.passing) * 0.25,
        10.0 + l.runner.effective(l.runner.attributes.speed) * 0.25,
        8.0 + l.block_strength * 0.15,
        score_weight,
        2.0 + l.thief.effective(l.thief.attributes.skill) * 0.03,
        0.4,
    ];
    match WeightedIndex::new(weights) {
        Ok(dist) => EventKind::ACTIONS[dist.sample(rng)],
        Err(_) => EventKind::Advance,
    }
}

/// A healthy player for `slot`: a random occupant of the slot, else the
/// least impactful healthy player on the field, else a stand-in.
fn resolve<R: Rng + ?Sized>(formation: &Formation, slot: Role, rng: &mut R) -> FieldPlayer {
    let occupants: Vec<&FieldPlayer> = formation.in_slot(slot).collect();
    if !occupants.is_empty() {
        return occupants[rng.gen_range(0..occupants.len())].clone();
    }
    formation
        .least_impactful()
        .cloned()
        .unwrap_or_else(|| stand_in(slot))
}

/// Placeholder for a side with nobody left to play. Carries the nil id and
/// is never credited with stats.
pub fn stand_in(slot: Role) -> FieldPlayer {
    FieldPlayer {
        id: PlayerId::new(Uuid::nil()),
        name: "A stand-in".to_string(),
        role: slot,
        slot,
        attributes: Attributes::new(1, 1, 1, 1),
        stamina: 0.0,
        injured: false,
    }
}

pub fn is_stand_in(player: &FieldPlayer) -> bool {
    player.id.0.is_nil()
}

fn base(kind: EventKind, side: Side, primary: &FieldPlayer, description: String) -> StepOutcome {
    StepOutcome {
        kind,
        side,
        primary: (!is_stand_in(primary)).then_some(primary.id),
        description,
        priority: kind.default_priority(),
        points: 0,
        player_deltas: Vec::new(),
        team_deltas: Vec::new(),
        next_possession: match kind {
            EventKind::Tackle | EventKind::Turnover => side.opponent(),
            _ => side,
        },
        next_ball_position: 0,
        injured: None,
    }
}

fn credit(outcome: &mut StepOutcome, player: &FieldPlayer, delta: PlayerStats) {
    if !is_stand_in(player) {
        outcome.player_deltas.push((player.id, delta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        FacilityLevels, MatchId, MatchParams, RosterPlayer, TeamId, TeamRoster, FORMATION_SLOTS,
    };
    use crate::engine::formation::build_team_sheet;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn roster(name: &str, rating: u8) -> TeamRoster {
        TeamRoster {
            team_id: TeamId::new(Uuid::new_v4()),
            name: name.to_string(),
            players: FORMATION_SLOTS
                .iter()
                .enumerate()
                .map(|(i, role)| RosterPlayer {
                    id: PlayerId::new(Uuid::new_v4()),
                    name: format!("{} {}", name, i),
                    role: *role,
                    attributes: Attributes::new(rating, rating, rating, rating),
                    endurance: 100,
                    retired: false,
                })
                .collect(),
        }
    }

    fn state() -> MatchState {
        MatchState::new(
            MatchId::new(),
            build_team_sheet(&roster("Hawks", 60)).unwrap(),
            build_team_sheet(&roster("Owls", 60)).unwrap(),
            FacilityLevels::default(),
            MatchParams {
                max_time: 2400,
                speed: 1.0,
                event_history_cap: 50,
                revenue_history_cap: 50,
                seed: 1,
            },
        )
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let engine = SimulationStepEngine::default();
        let s = state();
        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..50 {
            assert_eq!(engine.step(&s, &mut a), engine.step(&s, &mut b));
        }
    }

    #[test]
    fn test_only_score_outcomes_carry_points() {
        let engine = SimulationStepEngine::default();
        let mut s = state();
        s.ball_position = 97;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut saw_score = false;
        for _ in 0..2000 {
            let o = engine.step(&s, &mut rng);
            if o.kind == EventKind::Score {
                saw_score = true;
                assert_eq!(o.points, CLOSE_RANGE_POINTS);
                assert_eq!(o.side, s.possession);
                assert_eq!(o.next_possession, s.possession.opponent());
                assert_eq!(o.next_ball_position, RESTART_POSITION);
            } else {
                assert_eq!(o.points, 0, "{:?} carried points", o.kind);
                assert!(o.team_deltas.iter().all(|(_, t)| t.points == 0));
                assert!(o.player_deltas.iter().all(|(_, p)| p.points == 0));
            }
        }
        assert!(saw_score, "a red-zone drive should eventually score");
    }

    #[test]
    fn test_no_score_outside_red_zone() {
        let engine = SimulationStepEngine::default();
        let mut s = state();
        s.ball_position = 10;
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..2000 {
            assert_ne!(engine.step(&s, &mut rng).kind, EventKind::Score);
        }
    }

    #[test]
    fn test_long_range_score_value() {
        let engine = SimulationStepEngine::default();
        let mut s = state();
        s.ball_position = 85;
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let score = (0..5000)
            .map(|_| engine.step(&s, &mut rng))
            .find(|o| o.kind == EventKind::Score)
            .expect("expected a score");
        assert_eq!(score.points, LONG_RANGE_POINTS);
    }

    #[test]
    fn test_empty_formation_does_not_panic() {
        let engine = SimulationStepEngine::default();
        let mut s = state();
        s.home.formation.players.clear();
        s.away.formation.players.clear();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..500 {
            let o = engine.step(&s, &mut rng);
            assert!(o.player_deltas.is_empty());
            assert!(o.primary.is_none());
            assert!(!o.description.is_empty());
        }
    }

    #[test]
    fn test_deltas_reference_only_field_players() {
        let engine = SimulationStepEngine::default();
        let s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for _ in 0..1000 {
            let o = engine.step(&s, &mut rng);
            for (id, _) in &o.player_deltas {
                assert!(s.player_stats.contains_key(id));
            }
        }
    }

    #[test]
    fn test_ball_stays_in_bounds() {
        let engine = SimulationStepEngine::default();
        let mut s = state();
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..3000 {
            let o = engine.step(&s, &mut rng);
            assert!(o.next_ball_position <= MAX_BALL);
            s.possession = o.next_possession;
            s.ball_position = o.next_ball_position;
        }
    }
}
