//! Combo detection.
//!
//! Each seed cell is scanned horizontally and vertically for the maximal run
//! through it. Chameleon blocks extend any run. When the seed itself is a
//! Chameleon, the two walks away from it resolve their types independently
//! and are reconciled:
//!
//! - backward walk all-wildcard (or empty): merge both sides
//! - every forward block combos with the backward type: merge both sides
//! - otherwise keep the longer single-sided run (forward on a tie)
//!
//! A seed reports at most one combo, horizontal winning ties. Overlapping
//! combos from different seeds are left for [`dedup_combos`].

use std::collections::BTreeSet;

use crate::game::block::{BlockType, Cell};
use crate::game::field::Field;

/// A qualifying run.
#[derive(Clone, Debug, PartialEq)]
pub struct Combo {
    /// Cells along the run, in walk order.
    pub cells: Vec<Cell>,
    /// Resolved type: first non-wildcard block, or wildcard if none.
    pub block_type: BlockType,
    /// Effect scale accumulated by unique block hooks.
    pub multiplier: f32,
}

impl Combo {
    /// Build a combo from cells, resolving its type from the field.
    pub fn from_cells(field: &Field, cells: Vec<Cell>) -> Self {
        let types: Vec<BlockType> = cells.iter().filter_map(|c| field.type_at(*c)).collect();
        Self {
            cells,
            block_type: resolve_type(&types),
            multiplier: 1.0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Blocks beyond the minimum run length.
    pub fn extra_blocks(&self, min_len: usize) -> usize {
        self.len().saturating_sub(min_len)
    }
}

/// First non-wildcard type, or the wildcard when every block is one.
pub fn resolve_type(types: &[BlockType]) -> BlockType {
    types
        .iter()
        .copied()
        .find(|t| !t.is_wildcard())
        .unwrap_or(BlockType::Chameleon)
}

/// Scan every seed and return at most one combo per seed.
pub fn check_for_combos(field: &Field, seeds: &[Cell], min_len: usize) -> Vec<Combo> {
    seeds
        .iter()
        .filter_map(|seed| combo_at(field, *seed, min_len))
        .collect()
}

/// Best qualifying run through a single seed.
pub fn combo_at(field: &Field, seed: Cell, min_len: usize) -> Option<Combo> {
    let seed_block = field.get(seed)?;
    if !seed_block.is_live() {
        return None;
    }

    let horizontal = scan_line(field, seed, (1, 0));
    let vertical = scan_line(field, seed, (0, 1));

    let best = match (horizontal.len() >= min_len, vertical.len() >= min_len) {
        (true, true) if vertical.len() > horizontal.len() => vertical,
        (true, _) => horizontal,
        (false, true) => vertical,
        (false, false) => return None,
    };

    Some(Combo::from_cells(field, best))
}

/// Drop combos whose cells are already covered by an earlier one.
pub fn dedup_combos(combos: Vec<Combo>) -> Vec<Combo> {
    let mut kept: Vec<Combo> = Vec::new();
    for combo in combos {
        let cells: BTreeSet<Cell> = combo.cells.iter().copied().collect();
        let covered = kept.iter().any(|k| {
            let other: BTreeSet<Cell> = k.cells.iter().copied().collect();
            cells.is_subset(&other)
        });
        if !covered {
            kept.push(combo);
        }
    }
    kept
}

/// Maximal run through `seed` along one axis, ordered backward to forward.
fn scan_line(field: &Field, seed: Cell, axis: (i32, i32)) -> Vec<Cell> {
    let seed_type = match field.type_at(seed) {
        Some(t) => t,
        None => return Vec::new(),
    };
    let back_axis = (-axis.0, -axis.1);

    let (back, back_type) = walk(field, seed, back_axis, seed_type);
    let (fwd, fwd_type) = walk(field, seed, axis, seed_type);

    let merged = |back: &[Cell], fwd: &[Cell]| -> Vec<Cell> {
        let mut cells: Vec<Cell> = back.iter().rev().copied().collect();
        cells.push(seed);
        cells.extend_from_slice(fwd);
        cells
    };

    if !seed_type.is_wildcard() {
        return merged(&back, &fwd);
    }

    match (back_type, fwd_type) {
        (None, _) => merged(&back, &fwd),
        (Some(b), Some(f)) if b == f => merged(&back, &fwd),
        (Some(b), _) if all_combo_with(field, &fwd, b) => merged(&back, &fwd),
        _ => {
            let back_run = merged(&back, &[]);
            let fwd_run = merged(&[], &fwd);
            if back_run.len() > fwd_run.len() {
                back_run
            } else {
                fwd_run
            }
        }
    }
}

/// Walk away from `seed` collecting compatible live blocks.
///
/// A wildcard start resolves its effective type from the first non-wildcard
/// block met. Returns the cells in walk order and the resolved type, which
/// is `None` when every collected block is a wildcard.
fn walk(field: &Field, seed: Cell, step: (i32, i32), seed_type: BlockType) -> (Vec<Cell>, Option<BlockType>) {
    let mut resolved = (!seed_type.is_wildcard()).then_some(seed_type);
    let mut cells = Vec::new();
    let mut cursor = seed;

    while let Some(next) = cursor.offset(step.0, step.1).filter(|c| field.contains(*c)) {
        let block = match field.get(next) {
            Some(b) if b.is_live() => b,
            _ => break,
        };
        match resolved {
            Some(t) if !block.block_type.can_combo_with(t) => break,
            None if !block.block_type.is_wildcard() => resolved = Some(block.block_type),
            _ => {}
        }
        cells.push(next);
        cursor = next;
    }

    (cells, resolved)
}

fn all_combo_with(field: &Field, cells: &[Cell], block_type: BlockType) -> bool {
    cells
        .iter()
        .filter_map(|c| field.type_at(*c))
        .all(|t| t.can_combo_with(block_type))
}
