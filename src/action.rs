//! Composite agent actions.

use crate::error::ActionError;
use serde::{Deserialize, Serialize};

/// Number of movement choices
pub const NUM_MOVES: usize = 5;
/// Number of consumption choices
pub const NUM_CONSUMES: usize = 2;
/// Number of mating choices
pub const NUM_MATES: usize = 2;
/// Length of the k-hot action encoding
pub const NUM_ACTIONS: usize = NUM_MOVES + NUM_CONSUMES + NUM_MATES;

/// Movement sub-action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Left,
    Right,
    Up,
    Down,
    Stay,
}

/// Consumption sub-action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Consume {
    Eat,
    NoEat,
}

/// Mating sub-action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mate {
    Mate,
    NoMate,
}

impl Move {
    pub const ALL: [Move; NUM_MOVES] = [Move::Left, Move::Right, Move::Up, Move::Down, Move::Stay];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self, ActionError> {
        Self::ALL.get(index).copied().ok_or(ActionError::Move(index))
    }

    /// Unit displacement `(dx, dy)`; `Up` increases `y`.
    #[inline]
    pub fn delta(self) -> (i64, i64) {
        match self {
            Move::Left => (-1, 0),
            Move::Right => (1, 0),
            Move::Up => (0, 1),
            Move::Down => (0, -1),
            Move::Stay => (0, 0),
        }
    }
}

impl Consume {
    pub const ALL: [Consume; NUM_CONSUMES] = [Consume::Eat, Consume::NoEat];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self, ActionError> {
        Self::ALL.get(index).copied().ok_or(ActionError::Consume(index))
    }
}

impl Mate {
    pub const ALL: [Mate; NUM_MATES] = [Mate::Mate, Mate::NoMate];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self, ActionError> {
        Self::ALL.get(index).copied().ok_or(ActionError::Mate(index))
    }
}

/// One agent's action for a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub movement: Move,
    pub consume: Consume,
    pub mate: Mate,
}

impl Default for Action {
    fn default() -> Self {
        Self {
            movement: Move::Stay,
            consume: Consume::NoEat,
            mate: Mate::NoMate,
        }
    }
}

impl Action {
    pub fn new(movement: Move, consume: Consume) -> Self {
        Self {
            movement,
            consume,
            mate: Mate::NoMate,
        }
    }

    pub fn with_mate(movement: Move, consume: Consume, mate: Mate) -> Self {
        Self {
            movement,
            consume,
            mate,
        }
    }

    /// Parse raw sub-action indices (2 or 3 entries).
    pub fn from_indices(raw: &[usize]) -> Result<Self, ActionError> {
        match *raw {
            [movement, consume] => Ok(Self::new(
                Move::from_index(movement)?,
                Consume::from_index(consume)?,
            )),
            [movement, consume, mate] => Ok(Self::with_mate(
                Move::from_index(movement)?,
                Consume::from_index(consume)?,
                Mate::from_index(mate)?,
            )),
            _ => Err(ActionError::Arity(raw.len())),
        }
    }

    /// Sub-action indices `[move, consume, mate]`
    pub fn indices(&self) -> [usize; 3] {
        [self.movement.index(), self.consume.index(), self.mate.index()]
    }

    /// Same action with the movement replaced by `Stay`
    pub fn stay(self) -> Self {
        Self {
            movement: Move::Stay,
            ..self
        }
    }

    /// Three concatenated one-hot blocks
    pub fn flat(&self) -> [f32; NUM_ACTIONS] {
        let mut flat = [0.0; NUM_ACTIONS];
        flat[self.movement.index()] = 1.0;
        flat[NUM_MOVES + self.consume.index()] = 1.0;
        flat[NUM_MOVES + NUM_CONSUMES + self.mate.index()] = 1.0;
        flat
    }

    /// Every action in the action space, in index order
    pub fn all() -> Vec<Action> {
        let mut actions = Vec::with_capacity(NUM_MOVES * NUM_CONSUMES * NUM_MATES);
        for movement in Move::ALL {
            for consume in Consume::ALL {
                for mate in Mate::ALL {
                    actions.push(Action::with_mate(movement, consume, mate));
                }
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_indices_two_tuple() {
        let action = Action::from_indices(&[2, 0]).unwrap();
        assert_eq!(action.movement, Move::Up);
        assert_eq!(action.consume, Consume::Eat);
        assert_eq!(action.mate, Mate::NoMate);
    }

    #[test]
    fn test_from_indices_three_tuple() {
        let action = Action::from_indices(&[4, 1, 0]).unwrap();
        assert_eq!(action, Action::with_mate(Move::Stay, Consume::NoEat, Mate::Mate));
        assert_eq!(action.indices(), [4, 1, 0]);
    }

    #[test]
    fn test_from_indices_rejects_malformed() {
        assert_eq!(Action::from_indices(&[5, 0]), Err(ActionError::Move(5)));
        assert_eq!(Action::from_indices(&[0, 2]), Err(ActionError::Consume(2)));
        assert_eq!(Action::from_indices(&[0, 0, 7]), Err(ActionError::Mate(7)));
        assert_eq!(Action::from_indices(&[0]), Err(ActionError::Arity(1)));
        assert_eq!(Action::from_indices(&[0, 0, 0, 0]), Err(ActionError::Arity(4)));
    }

    #[test]
    fn test_flat_is_k_hot() {
        let action = Action::with_mate(Move::Down, Consume::NoEat, Mate::Mate);
        let flat = action.flat();

        assert_eq!(flat.iter().sum::<f32>(), 3.0);
        assert_eq!(flat[Move::Down.index()], 1.0);
        assert_eq!(flat[NUM_MOVES + 1], 1.0);
        assert_eq!(flat[NUM_MOVES + NUM_CONSUMES], 1.0);
    }

    #[test]
    fn test_stay_keeps_other_sub_actions() {
        let action = Action::with_mate(Move::Left, Consume::Eat, Mate::Mate).stay();
        assert_eq!(action, Action::with_mate(Move::Stay, Consume::Eat, Mate::Mate));
    }

    #[test]
    fn test_all_actions_distinct() {
        let all = Action::all();
        assert_eq!(all.len(), 20);
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 20);
    }

    #[test]
    fn test_move_deltas() {
        assert_eq!(Move::Up.delta(), (0, 1));
        assert_eq!(Move::Down.delta(), (0, -1));
        assert_eq!(Move::Left.delta(), (-1, 0));
        assert_eq!(Move::Right.delta(), (1, 0));
        assert_eq!(Move::Stay.delta(), (0, 0));
    }
}
