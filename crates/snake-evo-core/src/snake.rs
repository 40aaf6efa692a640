//! Deterministic Snake simulation used as a fitness oracle.
//!
//! One [`Snake`] is one trial: it owns its seeded RNG, body and food, and asks
//! a borrowed [`Network`] for a move every step. Collisions and starvation are
//! ordinary terminal outcomes, reported through [`DeathCause`].

use crate::config::{ConfigError, TrialConfig};
use crate::nn::Network;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::{error::Error, fmt};

/// Ray directions from the head: N, NE, E, SE, S, SW, W, NW (rows grow downward).
const RAYS: [(i32, i32); 8] = [
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
];

/// Network input width: wall, food and body distance for each of the 8 rays.
pub const SENSE_LEN: usize = RAYS.len() * 3;

/// Ray reading when no food or body cell lies on the ray.
pub const NOT_FOUND: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(self, drow: i32, dcol: i32) -> Self {
        Self {
            row: self.row + drow,
            col: self.col + dcol,
        }
    }
}

/// Discrete network decision, in output-index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Up,
    Right,
    Down,
    Left,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Up, Action::Right, Action::Down, Action::Left];

    /// Returns (drow, dcol).
    pub fn delta(self) -> (i32, i32) {
        match self {
            Action::Up => (-1, 0),
            Action::Right => (0, 1),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    Wall,
    SelfCollision,
    Starvation,
    /// No free cell was left to place food on.
    GridFull,
}

/// Final result of running a trial to its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub eaten: u32,
    pub steps: u32,
    pub cause: DeathCause,
}

/// Read-only view for an external renderer, taken once per frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeSnapshot {
    pub body: Vec<Position>,
    pub food: Option<Position>,
    pub dead: bool,
    /// Tail cell vacated by the last step, if any.
    pub vacated_tail: Option<Position>,
    /// Food cell consumed by the last step, if any.
    pub eaten_food: Option<Position>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnakeError {
    Config(ConfigError),
    NetworkShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

impl fmt::Display for SnakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnakeError::Config(e) => write!(f, "{e}"),
            SnakeError::NetworkShape { expected, actual } => write!(
                f,
                "network must map {} inputs to {} outputs (got {} -> {})",
                expected.0, expected.1, actual.0, actual.1
            ),
        }
    }
}

impl From<ConfigError> for SnakeError {
    fn from(err: ConfigError) -> Self {
        SnakeError::Config(err)
    }
}

impl Error for SnakeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SnakeError::Config(e) => Some(e),
            SnakeError::NetworkShape { .. } => None,
        }
    }
}

pub struct Snake<'a> {
    network: &'a Network,
    trial: TrialConfig,
    seed: u64,
    rng: ChaCha12Rng,
    /// Head at the front.
    body: VecDeque<Position>,
    /// Row-major occupancy mirror of `body`.
    occupied: Vec<bool>,
    food: Option<Position>,
    moves_left: u32,
    eaten: u32,
    steps: u32,
    cause: Option<DeathCause>,
    vacated_tail: Option<Position>,
    eaten_food: Option<Position>,
}

impl<'a> Snake<'a> {
    pub fn new(network: &'a Network, trial: TrialConfig, seed: u64) -> Self {
        Self::try_new(network, trial, seed).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(network: &'a Network, trial: TrialConfig, seed: u64) -> Result<Self, SnakeError> {
        trial.validate()?;
        let expected = (SENSE_LEN, Action::ALL.len());
        let actual = (network.input_width(), network.output_width());
        if actual != expected {
            return Err(SnakeError::NetworkShape { expected, actual });
        }

        let mut snake = Self {
            network,
            trial,
            seed,
            rng: ChaCha12Rng::seed_from_u64(seed),
            body: VecDeque::with_capacity(trial.initial_length),
            occupied: vec![false; trial.cell_count()],
            food: None,
            moves_left: trial.move_limit,
            eaten: 0,
            steps: 0,
            cause: None,
            vacated_tail: None,
            eaten_food: None,
        };
        snake.spawn_snake();
        if !snake.spawn_food() {
            snake.cause = Some(DeathCause::GridFull);
        }
        Ok(snake)
    }

    /// Lay the initial body as a horizontal segment trailing away from the
    /// grid's vertical center line.
    fn spawn_snake(&mut self) {
        let row = self.rng.random_range(0..self.trial.grid_height) as i32;
        let col = self.rng.random_range(0..self.trial.grid_width) as i32;
        let dcol = if col as usize * 2 > self.trial.grid_width {
            -1
        } else {
            1
        };
        for i in 0..self.trial.initial_length as i32 {
            self.push_tail(Position::new(row, col + i * dcol));
        }
    }

    /// Place food on a uniformly random free cell. Returns false when the body
    /// covers the whole grid.
    fn spawn_food(&mut self) -> bool {
        if self.body.len() >= self.trial.cell_count() {
            return false;
        }
        loop {
            let pos = Position::new(
                self.rng.random_range(0..self.trial.grid_height) as i32,
                self.rng.random_range(0..self.trial.grid_width) as i32,
            );
            if !self.is_occupied(pos) {
                self.food = Some(pos);
                return true;
            }
        }
    }

    fn cell_index(&self, pos: Position) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.row as usize * self.trial.grid_width + pos.col as usize)
        } else {
            None
        }
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0
            && pos.col >= 0
            && (pos.row as usize) < self.trial.grid_height
            && (pos.col as usize) < self.trial.grid_width
    }

    fn is_occupied(&self, pos: Position) -> bool {
        self.cell_index(pos).is_some_and(|i| self.occupied[i])
    }

    fn set_occupied(&mut self, pos: Position, value: bool) {
        if let Some(i) = self.cell_index(pos) {
            self.occupied[i] = value;
        }
    }

    fn push_head(&mut self, pos: Position) {
        self.set_occupied(pos, true);
        self.body.push_front(pos);
    }

    fn push_tail(&mut self, pos: Position) {
        self.set_occupied(pos, true);
        self.body.push_back(pos);
    }

    fn pop_tail(&mut self) -> Option<Position> {
        let tail = self.body.pop_back()?;
        self.set_occupied(tail, false);
        Some(tail)
    }

    /// Walk each ray from the head and record, in steps, where the wall, the
    /// food and the first body segment are met. Layout is
    /// `[wall, food, body]` per ray, rays in `N, NE, E, SE, S, SW, W, NW` order.
    pub fn sense(&self) -> [f32; SENSE_LEN] {
        let mut senses = [NOT_FOUND; SENSE_LEN];
        let head = self.head();
        for (ray, &(drow, dcol)) in RAYS.iter().enumerate() {
            let mut food = None;
            let mut body = None;
            let mut distance = 1;
            let mut cell = head.offset(drow, dcol);
            while self.in_bounds(cell) {
                if food.is_none() && self.food == Some(cell) {
                    food = Some(distance);
                }
                if body.is_none() && self.is_occupied(cell) {
                    body = Some(distance);
                }
                distance += 1;
                cell = cell.offset(drow, dcol);
            }
            senses[ray * 3] = distance as f32;
            senses[ray * 3 + 1] = food.map_or(NOT_FOUND, |d| d as f32);
            senses[ray * 3 + 2] = body.map_or(NOT_FOUND, |d| d as f32);
        }
        senses
    }

    /// Advance one tick. Returns whether the snake is still alive afterwards.
    pub fn step(&mut self) -> bool {
        if self.cause.is_some() {
            return false;
        }
        self.vacated_tail = None;
        self.eaten_food = None;
        if self.moves_left == 0 {
            self.cause = Some(DeathCause::Starvation);
            return false;
        }

        let senses = self.sense();
        let action = Action::ALL[self.network.decide(&senses)];
        let (drow, dcol) = action.delta();
        let head = self.head().offset(drow, dcol);
        self.steps += 1;

        if self.food == Some(head) {
            // Growth: the tail stays and the new head counts as occupied
            // before food is respawned.
            self.moves_left = self.trial.move_limit;
            self.eaten += 1;
            self.eaten_food = self.food.take();
            self.push_head(head);
            if !self.spawn_food() {
                self.cause = Some(DeathCause::GridFull);
                return false;
            }
            return true;
        }

        self.moves_left -= 1;
        if !self.in_bounds(head) {
            self.cause = Some(DeathCause::Wall);
            return false;
        }
        // The tail leaves before the head enters its cell.
        self.vacated_tail = self.pop_tail();
        if self.is_occupied(head) {
            self.cause = Some(DeathCause::SelfCollision);
            return false;
        }
        self.push_head(head);

        if self.moves_left == 0 {
            self.cause = Some(DeathCause::Starvation);
            return false;
        }
        true
    }

    /// Step until terminal.
    pub fn run_to_end(&mut self) -> TrialOutcome {
        loop {
            if let Some(cause) = self.cause {
                return TrialOutcome {
                    eaten: self.eaten,
                    steps: self.steps,
                    cause,
                };
            }
            self.step();
        }
    }

    pub fn snapshot(&self) -> SnakeSnapshot {
        SnakeSnapshot {
            body: self.body.iter().copied().collect(),
            food: self.food,
            dead: self.is_dead(),
            vacated_tail: self.vacated_tail,
            eaten_food: self.eaten_food,
        }
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn body(&self) -> &VecDeque<Position> {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn food(&self) -> Option<Position> {
        self.food
    }

    pub fn is_dead(&self) -> bool {
        self.cause.is_some()
    }

    pub fn death_cause(&self) -> Option<DeathCause> {
        self.cause
    }

    pub fn eaten(&self) -> u32 {
        self.eaten
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn moves_left(&self) -> u32 {
        self.moves_left
    }

    pub fn vacated_tail(&self) -> Option<Position> {
        self.vacated_tail
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn trial(&self) -> &TrialConfig {
        &self.trial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Single-layer network whose output always favours `action`.
    fn fixed_action(action: Action) -> Network {
        let template = Network::new(SENSE_LEN, &[], 4);
        let mut params = vec![0.0; template.parameter_count()];
        let layer = template.layers()[0];
        params[layer.bias_offset + action as usize] = 1.0;
        Network::from_parameters(template.layer_widths(), params).unwrap()
    }

    fn random_network(seed: u64) -> Network {
        let mut net = Network::new(SENSE_LEN, &[16], 4);
        net.initialize_parameters(&mut ChaCha12Rng::seed_from_u64(seed));
        net
    }

    /// Replace body and food with a hand-built layout.
    fn place(snake: &mut Snake<'_>, body: &[Position], food: Option<Position>) {
        while snake.pop_tail().is_some() {}
        for &pos in body {
            snake.push_tail(pos);
        }
        snake.food = food;
    }

    fn assert_invariants(snake: &Snake<'_>) {
        if snake.is_dead() {
            return;
        }
        let unique: HashSet<_> = snake.body().iter().collect();
        assert_eq!(unique.len(), snake.len(), "body cells must be distinct");
        assert!(snake.body().iter().all(|&p| snake.in_bounds(p)));
        if let Some(food) = snake.food() {
            assert!(snake.in_bounds(food));
            assert!(!snake.body().contains(&food), "food inside body");
        }
        let occupied = snake.occupied.iter().filter(|&&o| o).count();
        assert_eq!(occupied, snake.len(), "occupancy out of sync with body");
    }

    #[test]
    fn rejects_degenerate_grid() {
        let net = fixed_action(Action::Up);
        let trial = TrialConfig {
            grid_width: 0,
            ..TrialConfig::default()
        };
        let err = Snake::try_new(&net, trial, 0).err();
        assert!(matches!(
            err,
            Some(SnakeError::Config(ConfigError::EmptyGrid { .. }))
        ));
    }

    #[test]
    fn rejects_initial_length_beyond_layout() {
        let net = fixed_action(Action::Up);
        let trial = TrialConfig {
            grid_width: 4,
            initial_length: 3,
            ..TrialConfig::default()
        };
        let err = Snake::try_new(&net, trial, 0).err();
        assert!(matches!(
            err,
            Some(SnakeError::Config(ConfigError::InitialLength { length: 3, max: 2 }))
        ));
    }

    #[test]
    fn rejects_wrong_network_shape() {
        let net = Network::new(8, &[4], 4);
        let err = Snake::try_new(&net, TrialConfig::default(), 0).err();
        assert_eq!(
            err,
            Some(SnakeError::NetworkShape {
                expected: (24, 4),
                actual: (8, 4)
            })
        );
    }

    #[test]
    #[should_panic(expected = "positive area")]
    fn new_panics_on_degenerate_grid() {
        let net = fixed_action(Action::Up);
        let trial = TrialConfig {
            grid_height: 0,
            ..TrialConfig::default()
        };
        Snake::new(&net, trial, 0);
    }

    #[test]
    fn spawn_lays_straight_body_away_from_center() {
        let net = fixed_action(Action::Up);
        let trial = TrialConfig::default();
        for seed in 0..200 {
            let snake = Snake::new(&net, trial, seed);
            assert_eq!(snake.len(), trial.initial_length);
            assert_eq!(snake.moves_left(), trial.move_limit);
            assert_invariants(&snake);
            let head = snake.head();
            let expected_dcol = if head.col as usize * 2 > trial.grid_width {
                -1
            } else {
                1
            };
            for (i, &cell) in snake.body().iter().enumerate() {
                assert_eq!(cell, Position::new(head.row, head.col + i as i32 * expected_dcol));
            }
            assert!(snake.food().is_some());
        }
    }

    #[test]
    fn same_seed_reproduces_trial() {
        let net = random_network(3);
        let trial = TrialConfig::default();
        let mut a = Snake::new(&net, trial, 99);
        let mut b = Snake::new(&net, trial, 99);
        assert_eq!(a.snapshot(), b.snapshot());
        while a.step() {
            b.step();
            assert_eq!(a.snapshot(), b.snapshot());
        }
        assert_eq!(a.run_to_end(), b.run_to_end());
    }

    #[test]
    fn sense_reports_wall_food_and_body_distances() {
        let net = fixed_action(Action::Up);
        let mut snake = Snake::new(&net, TrialConfig::default(), 0);
        place(
            &mut snake,
            &[
                Position::new(5, 5),
                Position::new(5, 4),
                Position::new(5, 3),
            ],
            Some(Position::new(2, 5)),
        );
        let s = snake.sense();
        // N: rows 4..=0 are inside, wall after 6 steps, food 3 steps up
        assert_eq!(&s[0..3], &[6.0, 3.0, NOT_FOUND]);
        // NE: limited by the top wall
        assert_eq!(&s[3..6], &[6.0, NOT_FOUND, NOT_FOUND]);
        // E
        assert_eq!(&s[6..9], &[11.0, NOT_FOUND, NOT_FOUND]);
        // SE: limited by both walls equally
        assert_eq!(&s[9..12], &[11.0, NOT_FOUND, NOT_FOUND]);
        // S
        assert_eq!(&s[12..15], &[11.0, NOT_FOUND, NOT_FOUND]);
        // SW: limited by the left wall
        assert_eq!(&s[15..18], &[6.0, NOT_FOUND, NOT_FOUND]);
        // W: first body segment right behind the head
        assert_eq!(&s[18..21], &[6.0, NOT_FOUND, 1.0]);
        // NW
        assert_eq!(&s[21..24], &[6.0, NOT_FOUND, NOT_FOUND]);
    }

    #[test]
    fn snake_moving_right_dies_at_right_wall() {
        let net = fixed_action(Action::Right);
        let trial = TrialConfig {
            grid_height: 16,
            grid_width: 16,
            initial_length: 3,
            move_limit: 100,
        };
        let mut checked = 0;
        for seed in 0..500 {
            let mut snake = Snake::new(&net, trial, seed);
            let head = snake.head();
            let food_ahead = snake
                .food()
                .is_some_and(|f| f.row == head.row && f.col > head.col);
            if head.col as usize * 2 <= trial.grid_width || food_ahead {
                continue;
            }
            let expected_steps = trial.grid_width as u32 - head.col as u32;
            let mut steps = 0;
            while snake.step() {
                steps += 1;
                assert_invariants(&snake);
            }
            steps += 1;
            assert_eq!(steps, expected_steps, "seed {seed}");
            assert_eq!(snake.eaten(), 0);
            assert_eq!(snake.death_cause(), Some(DeathCause::Wall));
            checked += 1;
        }
        assert!(checked > 0, "no seed spawned in the right half");
    }

    #[test]
    fn snake_facing_its_body_collides_with_itself() {
        let net = fixed_action(Action::Right);
        let mut snake = Snake::new(&net, TrialConfig::default(), 0);
        place(
            &mut snake,
            &[
                Position::new(5, 5),
                Position::new(5, 6),
                Position::new(5, 7),
            ],
            Some(Position::new(0, 0)),
        );
        assert!(!snake.step());
        assert_eq!(snake.death_cause(), Some(DeathCause::SelfCollision));
        assert_eq!(snake.steps(), 1);
    }

    #[test]
    fn starves_after_exactly_move_limit_steps() {
        let net = fixed_action(Action::Down);
        let trial = TrialConfig {
            move_limit: 5,
            ..TrialConfig::default()
        };
        let mut snake = Snake::new(&net, trial, 0);
        place(
            &mut snake,
            &[
                Position::new(2, 5),
                Position::new(2, 4),
                Position::new(2, 3),
            ],
            Some(Position::new(0, 0)),
        );
        for step in 1..=4 {
            assert!(snake.step(), "alive after step {step}");
            assert_eq!(snake.moves_left(), 5 - step);
        }
        assert!(!snake.step());
        assert_eq!(snake.death_cause(), Some(DeathCause::Starvation));
        assert_eq!(snake.steps(), 5);
        assert_eq!(snake.head(), Position::new(7, 5));
    }

    #[test]
    fn starves_move_limit_steps_after_last_meal() {
        let net = fixed_action(Action::Down);
        let trial = TrialConfig {
            move_limit: 5,
            ..TrialConfig::default()
        };
        let mut snake = Snake::new(&net, trial, 0);
        place(
            &mut snake,
            &[
                Position::new(2, 5),
                Position::new(2, 4),
                Position::new(2, 3),
            ],
            Some(Position::new(3, 5)),
        );
        assert!(snake.step());
        assert_eq!(snake.eaten(), 1);
        assert_eq!(snake.moves_left(), 5);
        // keep the respawned food off the path straight down
        snake.food = Some(Position::new(0, 0));

        let mut after_meal = 0;
        while snake.step() {
            after_meal += 1;
            assert_eq!(snake.moves_left(), 5 - after_meal);
        }
        after_meal += 1;
        assert_eq!(after_meal, 5);
        assert_eq!(snake.death_cause(), Some(DeathCause::Starvation));
        assert_eq!(snake.eaten(), 1);
        assert_eq!(snake.steps(), 6);
        assert_eq!(snake.head(), Position::new(8, 5));
    }

    #[test]
    fn single_cell_snake_keeps_its_head_after_hitting_a_wall() {
        let net = fixed_action(Action::Up);
        let trial = TrialConfig {
            grid_height: 1,
            grid_width: 4,
            initial_length: 1,
            move_limit: 10,
        };
        let mut snake = Snake::new(&net, trial, 0);
        let start = snake.head();
        assert!(!snake.step());
        assert_eq!(snake.death_cause(), Some(DeathCause::Wall));
        assert_eq!(snake.len(), 1);
        assert_eq!(snake.head(), start);
        assert_eq!(snake.snapshot().body, vec![start]);
        assert_eq!(snake.vacated_tail(), None);
    }

    #[test]
    fn eating_grows_body_and_resets_budget() {
        let net = fixed_action(Action::Right);
        let mut snake = Snake::new(&net, TrialConfig::default(), 0);
        place(
            &mut snake,
            &[
                Position::new(5, 5),
                Position::new(5, 4),
                Position::new(5, 3),
            ],
            Some(Position::new(5, 7)),
        );
        assert!(snake.step());
        assert_eq!(snake.len(), 3, "plain move keeps length");
        assert_eq!(snake.vacated_tail(), Some(Position::new(5, 3)));
        assert_eq!(snake.moves_left(), 99);

        assert!(snake.step());
        assert_eq!(snake.len(), 4, "meal adds exactly one segment");
        assert_eq!(snake.eaten(), 1);
        assert_eq!(snake.moves_left(), 100);
        assert_eq!(snake.head(), Position::new(5, 7));
        let frame = snake.snapshot();
        assert_eq!(frame.vacated_tail, None);
        assert_eq!(frame.eaten_food, Some(Position::new(5, 7)));
        assert_invariants(&snake);
    }

    #[test]
    fn filling_the_grid_ends_the_trial() {
        let net = fixed_action(Action::Right);
        let trial = TrialConfig {
            grid_height: 1,
            grid_width: 2,
            initial_length: 1,
            move_limit: 10,
        };
        let seed = (0..100)
            .find(|&seed| Snake::new(&net, trial, seed).head().col == 0)
            .expect("some seed spawns on the left cell");
        let mut snake = Snake::new(&net, trial, seed);
        assert_eq!(snake.food(), Some(Position::new(0, 1)));
        assert!(!snake.step());
        assert_eq!(snake.death_cause(), Some(DeathCause::GridFull));
        assert_eq!(snake.eaten(), 1);
        assert_eq!(snake.len(), 2);
        assert_eq!(snake.food(), None);
    }

    #[test]
    fn dead_snake_is_frozen() {
        let net = fixed_action(Action::Up);
        let mut snake = Snake::new(&net, TrialConfig::default(), 4);
        let outcome = snake.run_to_end();
        let frozen = snake.snapshot();
        assert!(frozen.dead);
        assert!(!snake.step());
        assert_eq!(snake.snapshot().body, frozen.body);
        assert_eq!(snake.run_to_end(), outcome);
    }

    #[test]
    fn random_networks_keep_invariants() {
        let trial = TrialConfig {
            move_limit: 60,
            ..TrialConfig::default()
        };
        for seed in 0..30 {
            let net = random_network(seed);
            let mut snake = Snake::new(&net, trial, seed + 1000);
            let mut last_len = snake.len();
            let mut last_eaten = snake.eaten();
            while snake.step() {
                assert_invariants(&snake);
                let grew = snake.len() - last_len;
                assert_eq!(grew as u32, snake.eaten() - last_eaten);
                last_len = snake.len();
                last_eaten = snake.eaten();
            }
            assert!(snake.is_dead());
        }
    }
}
