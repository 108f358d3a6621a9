use std::{
    fmt::{self, Display, Formatter},
    slice::Iter,
    vec::IntoIter,
};

use super::position::*;

/// An append-only sequence of lines. Lines are assigned a [`Position`] when
/// they are pushed, and existing lines may be looked up (and amended in
/// place) by that position, but they are never removed or reordered.
#[derive(Debug, PartialEq)]
pub struct Listing<T> {
    lines: Vec<T>,
}

impl<T> Listing<T> {
    pub fn new() -> Self {
        Self { lines: vec![] }
    }

    /// Append a line, returning the position it was assigned.
    pub fn push(&mut self, line: T) -> Position {
        self.lines.push(line);
        Position(self.lines.len() - 1)
    }

    /// The position the next pushed line will be assigned.
    pub fn next_position(&self) -> Position {
        Position(self.lines.len())
    }

    pub fn get(&self, position: Position) -> Option<&T> {
        self.lines.get(position.0)
    }

    pub fn get_mut(&mut self, position: Position) -> Option<&mut T> {
        self.lines.get_mut(position.0)
    }

    pub fn iter_lines(&self) -> LinesIter<T> {
        LinesIter {
            inner: self.lines.iter(),
            position: Position(0),
        }
    }

    pub fn iter_instructions(&self) -> Iter<T> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Display> Display for Listing<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

pub struct LinesIter<'item, T> {
    inner: Iter<'item, T>,
    position: Position,
}

impl<'item, T> Iterator for LinesIter<'item, T> {
    type Item = (Position, &'item T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|v| {
            let current = self.position;
            self.position = current + 1;
            (current, v)
        })
    }
}

pub struct IntoLines<T> {
    inner: IntoIter<T>,
    position: Position,
}

impl<T> Iterator for IntoLines<T> {
    type Item = (Position, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|v| {
            let current = self.position;
            self.position = current + 1;
            (current, v)
        })
    }
}

impl<T> IntoIterator for Listing<T> {
    type Item = (Position, T);
    type IntoIter = IntoLines<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoLines {
            inner: self.lines.into_iter(),
            position: Position(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_ascending_positions() {
        let mut listing = Listing::new();

        assert_eq!(Position(0), listing.push("a"));
        assert_eq!(Position(1), listing.push("b"));
        assert_eq!(Position(2), listing.next_position());
    }

    #[test]
    fn get_mut_amends_a_line_in_place() {
        let mut listing = Listing::new();
        let pos = listing.push(10);
        listing.push(20);

        *listing.get_mut(pos).unwrap() = 15;

        assert_eq!(Some(&15), listing.get(pos));
        assert_eq!(2, listing.len());
    }

    #[test]
    fn listings_with_the_same_lines_compare_equal() {
        let mut a = Listing::new();
        a.push("x");
        let mut b = Listing::new();
        b.push("x");

        assert_eq!(a, b);
        b.push("y");
        assert_ne!(a, b);
    }

    #[test]
    fn iter_lines_yields_positions() {
        let mut listing = Listing::new();
        listing.push("x");
        listing.push("y");

        let lines: Vec<_> = listing.iter_lines().collect();
        assert_eq!(vec![(Position(0), &"x"), (Position(1), &"y")], lines);
    }
}
