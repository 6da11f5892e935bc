//! Union-find over densely numbered variable slots.
//!
//! Variables are mapped to dense slots once, at engine build time
//! ([`VariableSlots`]). The [`UnionFind`] then replays effects over slots:
//!
//! - a union links `find(from)` under `find(into)` when they differ. There
//!   is no union-by-rank because which variable becomes the root is part of
//!   the observable state;
//! - a descriptor update merges into the descriptor stored at the root.
//!
//! Every mutation returns an [`Undo`] record so an incrementally advanced
//! structure can be stepped backwards. Path compression
//! ([`UnionFind::find_compressed`]) never changes a root, only shortens
//! paths, and is therefore only used on throwaway per-query structures whose
//! mutations are never undone.

use std::collections::HashMap;

use unitrace_log::descriptor::Descriptor;
use unitrace_log::variable::Variable;

// ---------------------------------------------------------------------------
// VariableSlots
// ---------------------------------------------------------------------------

/// Bidirectional mapping between variables and dense slots.
#[derive(Debug, Clone, Default)]
pub(crate) struct VariableSlots {
    slots: HashMap<Variable, u32>,
    variables: Vec<Variable>,
}

impl VariableSlots {
    /// Assign slots in iteration order; duplicates keep their first slot.
    pub(crate) fn new(variables: impl IntoIterator<Item = Variable>) -> Self {
        let mut out = Self::default();
        for variable in variables {
            if !out.slots.contains_key(&variable) {
                out.slots.insert(variable, out.variables.len() as u32);
                out.variables.push(variable);
            }
        }
        out
    }

    pub(crate) fn slot(&self, variable: Variable) -> Option<u32> {
        self.slots.get(&variable).copied()
    }

    pub(crate) fn variable(&self, slot: u32) -> Variable {
        self.variables[slot as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.variables.len()
    }

    /// `(slot, variable)` pairs in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u32, Variable)> + '_ {
        self.variables
            .iter()
            .enumerate()
            .map(|(slot, &variable)| (slot as u32, variable))
    }
}

// ---------------------------------------------------------------------------
// Effect
// ---------------------------------------------------------------------------

/// A replayable union-find mutation, already translated to slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    Union { from: u32, into: u32 },
    Describe { slot: u32, descriptor: Descriptor },
}

/// What a single applied effect overwrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Undo {
    /// The effect changed nothing (union of an already joined pair).
    Nothing,
    /// `slot` was a root before the union redirected it.
    Parent { slot: u32 },
    /// The descriptor stored at `slot` before the update.
    Descriptor {
        slot: u32,
        previous: Option<Descriptor>,
    },
}

// ---------------------------------------------------------------------------
// UnionFind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnionFind {
    parent: Vec<u32>,
    descriptor: Vec<Option<Descriptor>>,
}

impl UnionFind {
    /// `len` singleton sets with no descriptors.
    pub(crate) fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
            descriptor: vec![None; len],
        }
    }

    /// The root of `slot`'s set, without touching the structure.
    pub(crate) fn find(&self, slot: u32) -> u32 {
        let mut current = slot;
        loop {
            let next = self.parent[current as usize];
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// The root of `slot`'s set, pointing every slot on the way directly at it.
    pub(crate) fn find_compressed(&mut self, slot: u32) -> u32 {
        let root = self.find(slot);
        let mut current = slot;
        while current != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    /// Every slot from `slot` to its root, both included.
    pub(crate) fn path(&self, slot: u32) -> Vec<u32> {
        let mut path = vec![slot];
        let mut current = slot;
        loop {
            let next = self.parent[current as usize];
            if next == current {
                return path;
            }
            path.push(next);
            current = next;
        }
    }

    /// The descriptor stored at `root`.
    pub(crate) fn descriptor(&self, root: u32) -> Option<&Descriptor> {
        self.descriptor[root as usize].as_ref()
    }

    /// Apply one effect and report what it overwrote.
    pub(crate) fn apply(&mut self, effect: &Effect, compress: bool) -> Undo {
        match effect {
            Effect::Union { from, into } => {
                let (from_root, into_root) = if compress {
                    (self.find_compressed(*from), self.find_compressed(*into))
                } else {
                    (self.find(*from), self.find(*into))
                };
                if from_root == into_root {
                    return Undo::Nothing;
                }
                self.parent[from_root as usize] = into_root;
                Undo::Parent { slot: from_root }
            }
            Effect::Describe { slot, descriptor } => {
                let root = if compress {
                    self.find_compressed(*slot)
                } else {
                    self.find(*slot)
                };
                let stored = &mut self.descriptor[root as usize];
                let previous = stored.clone();
                stored.get_or_insert_with(Descriptor::default).merge(descriptor);
                Undo::Descriptor {
                    slot: root,
                    previous,
                }
            }
        }
    }

    /// Revert the most recent un-reverted [`apply`](Self::apply).
    ///
    /// Only valid on a structure that was never compressed.
    pub(crate) fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Nothing => {}
            Undo::Parent { slot } => self.parent[slot as usize] = slot,
            Undo::Descriptor { slot, previous } => self.descriptor[slot as usize] = previous,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
