//! Dataset containers: relations of rectangles with stable identifiers.
//!
//! A [`Relation`] is an ordered sequence of rectangles plus optional explicit
//! ids; when the ids vector is empty, the id of the i-th rectangle is
//! implicitly `i`. A [`Dataset`] pairs two relations `R` and `S` under a
//! name. Validation enforces the invariants every downstream sweep relies
//! on: proper half-open rectangles, finite coordinates, id/rect parity, and
//! a total size that fits the 32-bit handle space.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::Rect;
use crate::Id;

/// Validation failures for datasets handed to the join frameworks.
///
/// These surface before any sweep state is built; a dataset that validates
/// cannot make `build` fail later.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DatasetError {
    /// Rectangle with non-positive width on some axis.
    ImproperRect { relation: &'static str, index: usize },
    /// Rectangle with a NaN or infinite coordinate.
    NonFiniteCoord { relation: &'static str, index: usize },
    /// Explicit ids present but not one per rectangle.
    IdCountMismatch {
        relation: &'static str,
        rects: usize,
        ids: usize,
    },
    /// `|R| + |S|` exceeds the 32-bit handle space.
    SizeOverflow { total: usize },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImproperRect { relation, index } => {
                write!(f, "{relation}[{index}]: rectangle is not proper (lo >= hi)")
            }
            Self::NonFiniteCoord { relation, index } => {
                write!(f, "{relation}[{index}]: non-finite coordinate")
            }
            Self::IdCountMismatch {
                relation,
                rects,
                ids,
            } => {
                write!(f, "{relation}: {ids} ids for {rects} rectangles")
            }
            Self::SizeOverflow { total } => {
                write!(f, "dataset size {total} exceeds u32 handle space")
            }
        }
    }
}

impl std::error::Error for DatasetError {}

/// A collection of rectangles with stable external identifiers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Optional tag used in logs.
    pub name: String,
    pub rects: Vec<Rect>,
    /// Stable ids, one per rectangle; empty means `id(i) == i`.
    pub ids: Vec<Id>,
}

impl Relation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rects: Vec::new(),
            ids: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Stable id of the i-th stored rectangle (`i` itself when ids are
    /// implicit).
    #[inline]
    pub fn id(&self, i: usize) -> Id {
        if self.ids.is_empty() {
            Id(i as u32)
        } else {
            self.ids[i]
        }
    }

    /// Appends a rectangle with an implicit sequential id.
    pub fn push(&mut self, rect: Rect) {
        if !self.ids.is_empty() {
            self.ids.push(Id(self.rects.len() as u32));
        }
        self.rects.push(rect);
    }

    /// Appends a rectangle with an explicit id, materializing implicit ids
    /// for earlier entries if needed.
    pub fn push_with_id(&mut self, rect: Rect, id: Id) {
        if self.ids.is_empty() && !self.rects.is_empty() {
            self.ids = (0..self.rects.len() as u32).map(Id).collect();
        }
        self.rects.push(rect);
        self.ids.push(id);
    }

    /// Makes ids explicit (`0..n`) if they are still implicit.
    pub fn ensure_ids(&mut self) {
        if self.ids.is_empty() {
            self.ids = (0..self.rects.len() as u32).map(Id).collect();
        }
    }

    fn validate(&self, relation: &'static str) -> Result<(), DatasetError> {
        if !self.ids.is_empty() && self.ids.len() != self.rects.len() {
            return Err(DatasetError::IdCountMismatch {
                relation,
                rects: self.rects.len(),
                ids: self.ids.len(),
            });
        }
        for (index, r) in self.rects.iter().enumerate() {
            if !r.is_finite() {
                return Err(DatasetError::NonFiniteCoord { relation, index });
            }
            if !r.is_proper() {
                return Err(DatasetError::ImproperRect { relation, index });
            }
        }
        Ok(())
    }
}

/// A pair of relations `R` and `S` plus a name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub r: Relation,
    pub s: Relation,
}

impl Dataset {
    pub fn new(name: impl Into<String>, r: Relation, s: Relation) -> Self {
        Self {
            name: name.into(),
            r,
            s,
        }
    }

    #[inline]
    pub fn total_len(&self) -> usize {
        self.r.len() + self.s.len()
    }

    /// Checks the dataset invariants the sweep frameworks depend on.
    pub fn validate(&self) -> Result<(), DatasetError> {
        self.r.validate("R")?;
        self.s.validate("S")?;
        let total = self.total_len();
        if total > u32::MAX as usize {
            return Err(DatasetError::SizeOverflow { total });
        }
        Ok(())
    }
}
