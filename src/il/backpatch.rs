//! Patch lists for deferred jump-target resolution.

use crate::listing::Position;

/// A set of control-transfer instructions whose target is not yet known.
///
/// Lists are merged rather than copied, and resolving a list consumes it,
/// so every list is consumed exactly once and no instruction is patched
/// through two different lists.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PatchList {
    positions: Vec<Position>,
}

impl PatchList {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn one(position: Position) -> Self {
        Self {
            positions: vec![position],
        }
    }

    pub fn add(&mut self, position: Position) {
        self.positions.push(position);
    }

    /// Merge two lists into one. Positions originate from distinct emitted
    /// instructions, so merging never introduces duplicates.
    pub fn merge(mut self, mut other: PatchList) -> PatchList {
        self.positions.append(&mut other.positions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Consume the list for resolution.
    pub fn into_positions(self) -> Vec<Position> {
        self.positions
    }
}

/// The result of translating a logical expression to jumping code: the
/// pending true/false jumps, and the instruction range the expression's
/// code occupies.
///
/// The materialized 0/1 value of the expression is produced separately (and
/// unconditionally) by the generator, which consumes this struct to patch
/// both lists.
#[derive(Debug)]
pub struct BoolExpr {
    pub true_list: PatchList,
    pub false_list: PatchList,
    pub first: Position,
    pub last: Position,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_combines_both_lists() {
        let merged = PatchList::one(Position(1)).merge(PatchList::one(Position(4)));
        assert_eq!(vec![Position(1), Position(4)], merged.into_positions());
    }

    #[test]
    fn empty_list_stays_empty_through_merge() {
        let merged = PatchList::empty().merge(PatchList::empty());
        assert!(merged.is_empty());
    }
}
