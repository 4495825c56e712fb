//! Narrative lines for match events.
//!
//! Lines are grouped by event kind and, within a kind, by a tone derived
//! from the primary participant's ratings and the game situation. The draw
//! inside a pool is uniform over the caller's RNG, so a seeded RNG yields a
//! reproducible commentary stream.

use crate::domain::{EventKind, FieldPlayer, MatchState, Side};
use rand::Rng;
use std::collections::HashMap;

/// Rating at or above which a participant draws from a highlight pool.
pub const HIGHLIGHT_RATING: u8 = 80;
/// Skill below which a participant draws from the struggle pool.
pub const STRUGGLE_RATING: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Standard,
    Power,
    Finesse,
    Struggle,
    Clutch,
}

/// Game situation handed to the generator.
#[derive(Debug, Clone, Copy)]
pub struct CommentaryContext<'a> {
    pub game_time: u32,
    pub max_time: u32,
    pub home_score: u32,
    pub away_score: u32,
    pub acting_side: Side,
    pub team_name: &'a str,
    pub opponent_name: &'a str,
}

impl<'a> CommentaryContext<'a> {
    /// Situation as seen by `side` in the current state.
    pub fn for_state(state: &'a MatchState, side: Side) -> Self {
        Self {
            game_time: state.game_time,
            max_time: state.max_time,
            home_score: state.home_score,
            away_score: state.away_score,
            acting_side: side,
            team_name: &state.sheet(side).name,
            opponent_name: &state.sheet(side.opponent()).name,
        }
    }

    /// Final tenth of the match with the scores within one score.
    pub fn is_clutch(&self) -> bool {
        let late = self.game_time as u64 * 10 >= self.max_time as u64 * 9;
        late && self.home_score.abs_diff(self.away_score) <= 3
    }
}

type Pool = &'static [&'static str];

const FALLBACK: Pool = &["{team} keep going."];

const POOLS: &[(EventKind, Tone, Pool)] = &[
    (
        EventKind::Advance,
        Tone::Standard,
        &[
            "{team} work the ball forward patiently.",
            "{primary} edges {team} a few yards upfield.",
            "Steady build-up from {team}.",
            "{team} probe for an opening.",
        ],
    ),
    (
        EventKind::Advance,
        Tone::Struggle,
        &[
            "{primary} fumbles about but {team} keep the ball.",
            "Scrappy stuff from {team}, barely a yard gained.",
        ],
    ),
    (
        EventKind::Pass,
        Tone::Standard,
        &[
            "{primary} finds {secondary} with a tidy pass.",
            "{primary} moves it on to {secondary}.",
            "Short ball from {primary}, collected by {secondary}.",
        ],
    ),
    (
        EventKind::Pass,
        Tone::Finesse,
        &[
            "What vision from {primary}! Threaded straight to {secondary}.",
            "{primary} drops it onto {secondary}'s hands from forty yards.",
            "Pinpoint delivery by {primary}.",
        ],
    ),
    (
        EventKind::Pass,
        Tone::Power,
        &[
            "{primary} fires a bullet to {secondary}.",
            "A rocket of a throw from {primary}!",
        ],
    ),
    (
        EventKind::Pass,
        Tone::Struggle,
        &[
            "{primary} hurries the pass and {secondary} has to stretch.",
            "Wobbly throw from {primary}, but it gets there.",
            "{primary} looks rattled, the pass sails high.",
        ],
    ),
    (
        EventKind::Run,
        Tone::Standard,
        &[
            "{primary} carries for a handful of yards.",
            "{primary} finds a seam and pushes on.",
            "Solid run from {primary}.",
        ],
    ),
    (
        EventKind::Run,
        Tone::Finesse,
        &[
            "{primary} jinks past two defenders!",
            "Blistering pace from {primary}, {opponent} can't keep up.",
        ],
    ),
    (
        EventKind::Run,
        Tone::Power,
        &[
            "{primary} bulldozes through the line!",
            "{primary} drags {secondary} along for three extra yards.",
        ],
    ),
    (
        EventKind::Run,
        Tone::Struggle,
        &[
            "{primary} trips over their own feet after a short gain.",
            "Laboured run from {primary}.",
        ],
    ),
    (
        EventKind::Tackle,
        Tone::Standard,
        &[
            "{primary} brings down {secondary}.",
            "Good stop by {primary}.",
            "{primary} wraps up {secondary} cleanly.",
        ],
    ),
    (
        EventKind::Tackle,
        Tone::Power,
        &[
            "Crunching hit from {primary} on {secondary}!",
            "{primary} flattens {secondary}. The crowd felt that one.",
        ],
    ),
    (
        EventKind::Tackle,
        Tone::Struggle,
        &[
            "{primary} just about clings on to {secondary}.",
            "Untidy tackle from {primary}, but it does the job.",
        ],
    ),
    (
        EventKind::Score,
        Tone::Standard,
        &[
            "{primary} scores for {team}!",
            "It's in! {primary} puts {team} on the board.",
            "{team} convert, {primary} with the finish.",
        ],
    ),
    (
        EventKind::Score,
        Tone::Power,
        &[
            "{primary} powers over the line, nobody was stopping that!",
            "Sheer strength from {primary} to score.",
        ],
    ),
    (
        EventKind::Score,
        Tone::Finesse,
        &[
            "Sublime from {primary}, a score of pure class.",
            "{primary} dances through and scores!",
        ],
    ),
    (
        EventKind::Score,
        Tone::Struggle,
        &[
            "Somehow {primary} scores! Not pretty, but it counts.",
            "{primary} stumbles in for the score.",
        ],
    ),
    (
        EventKind::Score,
        Tone::Clutch,
        &[
            "{primary} with the score when {team} needed it most!",
            "Ice in the veins from {primary}, and at {time} of all moments!",
            "Late drama! {primary} scores for {team}.",
        ],
    ),
    (
        EventKind::Turnover,
        Tone::Standard,
        &[
            "{primary} snatches possession for {team}!",
            "Turnover! {primary} wins it back.",
            "{opponent} cough it up and {primary} pounces.",
        ],
    ),
    (
        EventKind::Turnover,
        Tone::Power,
        &["{primary} simply rips the ball away from {secondary}!"],
    ),
    (
        EventKind::Injury,
        Tone::Standard,
        &[
            "{primary} is down and needs attention.",
            "Concern for {team}, {primary} is hurt.",
            "{primary} limps off the field.",
        ],
    ),
    (
        EventKind::Kickoff,
        Tone::Standard,
        &[
            "We're underway! {team} get us started against {opponent}.",
            "Kick-off! {team} and {opponent} go at it.",
        ],
    ),
    (
        EventKind::Halftime,
        Tone::Standard,
        &[
            "That's the half. {team} {score} {opponent}.",
            "Half-time whistle, {team} {score} {opponent}.",
        ],
    ),
    (
        EventKind::SecondHalf,
        Tone::Standard,
        &[
            "The second half is underway.",
            "Back out they come for the second half.",
        ],
    ),
    (
        EventKind::FullTime,
        Tone::Standard,
        &[
            "Full time! {team} {score} {opponent}.",
            "That's it, it's all over. {team} {score} {opponent}.",
        ],
    ),
];

/// Picks narrative lines. Never performs I/O.
#[derive(Debug, Clone)]
pub struct CommentaryGenerator {
    pools: HashMap<(EventKind, Tone), Pool>,
}

impl Default for CommentaryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentaryGenerator {
    pub fn new() -> Self {
        let pools = POOLS
            .iter()
            .map(|(kind, tone, lines)| ((*kind, *tone), *lines))
            .collect();
        Self { pools }
    }

    /// Tone for a participant in a given situation.
    pub fn tone_for(kind: EventKind, primary: &FieldPlayer, ctx: &CommentaryContext) -> Tone {
        let a = &primary.attributes;
        if kind == EventKind::Score && ctx.is_clutch() {
            return Tone::Clutch;
        }
        if a.skill < STRUGGLE_RATING {
            return Tone::Struggle;
        }
        let finesse_rating = match kind {
            EventKind::Pass => a.passing,
            EventKind::Run => a.speed,
            _ => a.skill,
        };
        if a.strength >= HIGHLIGHT_RATING && a.strength >= finesse_rating {
            Tone::Power
        } else if finesse_rating >= HIGHLIGHT_RATING {
            Tone::Finesse
        } else {
            Tone::Standard
        }
    }

    /// Pool for (kind, tone), falling back to the kind's standard pool.
    pub fn pool(&self, kind: EventKind, tone: Tone) -> Pool {
        self.pools
            .get(&(kind, tone))
            .or_else(|| self.pools.get(&(kind, Tone::Standard)))
            .copied()
            .unwrap_or(FALLBACK)
    }

    /// One line for an on-field action.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        kind: EventKind,
        primary: &FieldPlayer,
        secondary: Option<&FieldPlayer>,
        ctx: &CommentaryContext,
        rng: &mut R,
    ) -> String {
        let tone = Self::tone_for(kind, primary, ctx);
        let template = pick(self.pool(kind, tone), rng);
        render(template, Some(primary), secondary, ctx)
    }

    /// One line for a lifecycle moment (kickoff, halftime, ...), which has
    /// no individual participant.
    pub fn narrate<R: Rng + ?Sized>(
        &self,
        kind: EventKind,
        ctx: &CommentaryContext,
        rng: &mut R,
    ) -> String {
        let template = pick(self.pool(kind, Tone::Standard), rng);
        render(template, None, None, ctx)
    }
}

fn pick<R: Rng + ?Sized>(pool: Pool, rng: &mut R) -> &'static str {
    pool[rng.gen_range(0..pool.len())]
}

fn render(
    template: &str,
    primary: Option<&FieldPlayer>,
    secondary: Option<&FieldPlayer>,
    ctx: &CommentaryContext,
) -> String {
    let (ours, theirs) = match ctx.acting_side {
        Side::Home => (ctx.home_score, ctx.away_score),
        Side::Away => (ctx.away_score, ctx.home_score),
    };
    template
        .replace("{primary}", primary.map_or("A player", |p| p.name.as_str()))
        .replace(
            "{secondary}",
            secondary.map_or("a teammate", |p| p.name.as_str()),
        )
        .replace("{team}", ctx.team_name)
        .replace("{opponent}", ctx.opponent_name)
        .replace("{score}", &format!("{}-{}", ours, theirs))
        .replace(
            "{time}",
            &format!("{:02}:{:02}", ctx.game_time / 60, ctx.game_time % 60),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attributes, PlayerId, Role};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn player(name: &str, attrs: Attributes) -> FieldPlayer {
        FieldPlayer {
            id: PlayerId::new(Uuid::new_v4()),
            name: name.to_string(),
            role: Role::Runner,
            slot: Role::Runner,
            attributes: attrs,
            stamina: 100.0,
            injured: false,
        }
    }

    fn ctx(game_time: u32, home: u32, away: u32) -> CommentaryContext<'static> {
        CommentaryContext {
            game_time,
            max_time: 2400,
            home_score: home,
            away_score: away,
            acting_side: Side::Home,
            team_name: "Hawks",
            opponent_name: "Owls",
        }
    }

    #[test]
    fn test_same_seed_same_line() {
        let gen = CommentaryGenerator::new();
        let p = player("Ada", Attributes::new(60, 60, 60, 60));
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(
                gen.generate(EventKind::Run, &p, None, &ctx(100, 0, 0), &mut a),
                gen.generate(EventKind::Run, &p, None, &ctx(100, 0, 0), &mut b)
            );
        }
    }

    #[test]
    fn test_power_participant_uses_power_pool() {
        let gen = CommentaryGenerator::new();
        let p = player("Brick", Attributes::new(50, 95, 60, 50));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let power = gen.pool(EventKind::Tackle, Tone::Power);
        for _ in 0..10 {
            let line = gen.generate(EventKind::Tackle, &p, None, &ctx(10, 0, 0), &mut rng);
            assert!(
                power
                    .iter()
                    .any(|t| render(t, Some(&p), None, &ctx(10, 0, 0)) == line),
                "unexpected line: {}",
                line
            );
        }
    }

    #[test]
    fn test_low_skill_participant_struggles() {
        let p = player("Wobbles", Attributes::new(50, 50, 20, 50));
        assert_eq!(
            CommentaryGenerator::tone_for(EventKind::Pass, &p, &ctx(10, 0, 0)),
            Tone::Struggle
        );
    }

    #[test]
    fn test_fast_runner_gets_finesse() {
        let p = player("Zip", Attributes::new(92, 40, 70, 50));
        assert_eq!(
            CommentaryGenerator::tone_for(EventKind::Run, &p, &ctx(10, 0, 0)),
            Tone::Finesse
        );
    }

    #[test]
    fn test_late_close_score_is_clutch() {
        let p = player("Ada", Attributes::new(60, 60, 60, 60));
        assert_eq!(
            CommentaryGenerator::tone_for(EventKind::Score, &p, &ctx(2300, 10, 9)),
            Tone::Clutch
        );
        assert_eq!(
            CommentaryGenerator::tone_for(EventKind::Score, &p, &ctx(2300, 20, 9)),
            Tone::Standard
        );
    }

    #[test]
    fn test_missing_tone_falls_back_to_standard() {
        let gen = CommentaryGenerator::new();
        assert_eq!(
            gen.pool(EventKind::Injury, Tone::Power),
            gen.pool(EventKind::Injury, Tone::Standard)
        );
    }

    #[test]
    fn test_placeholders_are_filled() {
        let gen = CommentaryGenerator::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let line = gen.narrate(EventKind::Halftime, &ctx(1200, 14, 7), &mut rng);
        assert!(line.contains("Hawks 14-7 Owls"), "{}", line);
        assert!(!line.contains('{'));
    }

    #[test]
    fn test_every_pool_renders_without_leftover_placeholders() {
        let p = player("Ada", Attributes::new(60, 60, 60, 60));
        let q = player("Bo", Attributes::new(60, 60, 60, 60));
        for (_, _, lines) in POOLS {
            for t in lines.iter() {
                let line = render(t, Some(&p), Some(&q), &ctx(60, 1, 2));
                assert!(!line.contains('{'), "{}", line);
            }
        }
    }
}
