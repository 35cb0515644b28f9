//! Field Engine
//!
//! Fixed-size grid of blocks with swap validation, logical destruction,
//! gravity refill, tap locks and sampling helpers. Run detection lives in
//! [`crate::game::combo`].
//!
//! Invariants:
//! - dimensions never change after creation
//! - every slot holds exactly one block
//! - a block's `cell` always equals its slot

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::core::rng::DeterministicRng;
use crate::game::block::{
    Block, BlockId, BlockState, BlockType, Cell, DestroyCause, Provenance,
};
use crate::game::effects::{EffectId, GlobalEffect};

/// Swap direction, relative to the first cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Every direction, in the order bots scan them.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    /// Column/row delta. Rows grow downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

/// Why a swap was refused. The board is never touched on refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("cell out of bounds")]
    OutOfBounds,
    #[error("blocks share a type")]
    SameType,
    #[error("block is frozen")]
    Frozen,
    #[error("block is destroyed")]
    Destroyed,
}

/// Result of a tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// Block joined the lock set.
    Locked,
    /// Block was already locked and got released.
    Unlocked,
    /// Block did not fit the current lock set, which restarted with it.
    Restarted,
    /// Lock set reached the required size; these cells pop as one combo.
    Complete(Vec<Cell>),
}

/// Why a tap was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TapError {
    #[error("cell out of bounds")]
    OutOfBounds,
    #[error("block is destroyed")]
    Destroyed,
}

/// One player's grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Field {
    /// Field identifier, equal to the owning slot number (1 or 2).
    pub id: u8,
    width: usize,
    height: usize,
    cells: Vec<Block>,
    /// Field-scoped statuses.
    pub effects: Vec<GlobalEffect>,
    next_block_id: u64,
    next_effect_id: u64,
}

impl Field {
    /// Generate a field; every cell is drawn independently from the
    /// non-wildcard types.
    pub fn generate(id: u8, width: usize, height: usize, rng: &mut DeterministicRng) -> Self {
        let mut field = Self::empty(id, width, height);
        for y in 0..height {
            for x in 0..width {
                let block_type = random_regular(rng);
                let block_id = field.alloc_block_id();
                field.cells.push(Block::new(block_id, block_type, Cell::new(x, y)));
            }
        }
        field
    }

    /// Build a field from explicit rows (top row first).
    ///
    /// All rows must share the same length.
    pub fn from_rows(id: u8, rows: &[Vec<BlockType>]) -> Self {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut field = Self::empty(id, width, height);
        for (y, row) in rows.iter().enumerate() {
            for x in 0..width {
                let block_type = row.get(x).copied().unwrap_or(BlockType::Sword);
                let block_id = field.alloc_block_id();
                field.cells.push(Block::new(block_id, block_type, Cell::new(x, y)));
            }
        }
        field
    }

    fn empty(id: u8, width: usize, height: usize) -> Self {
        Self {
            id,
            width,
            height,
            cells: Vec::with_capacity(width * height),
            effects: Vec::new(),
            next_block_id: 1,
            next_effect_id: 1,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, cell: Cell) -> usize {
        cell.y * self.width + cell.x
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    /// Resolve a signed coordinate pair to an in-bounds cell.
    pub fn cell_at(&self, x: i32, y: i32) -> Option<Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        let cell = Cell::new(x as usize, y as usize);
        self.contains(cell).then_some(cell)
    }

    pub fn get(&self, cell: Cell) -> Option<&Block> {
        if self.contains(cell) {
            self.cells.get(self.index(cell))
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, cell: Cell) -> Option<&mut Block> {
        if self.contains(cell) {
            let idx = self.index(cell);
            self.cells.get_mut(idx)
        } else {
            None
        }
    }

    /// Type at a cell.
    pub fn type_at(&self, cell: Cell) -> Option<BlockType> {
        self.get(cell).map(|b| b.block_type)
    }

    /// All blocks in row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.cells.iter()
    }

    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.cells.iter_mut()
    }

    /// Cells of every live block.
    pub fn live_cells(&self) -> Vec<Cell> {
        self.cells.iter().filter(|b| b.is_live()).map(|b| b.cell).collect()
    }

    /// Cells currently marked destroyed.
    pub fn destroyed_cells(&self) -> Vec<Cell> {
        self.cells.iter().filter(|b| b.is_destroyed()).map(|b| b.cell).collect()
    }

    /// Cells currently tap-locked.
    pub fn locked_cells(&self) -> Vec<Cell> {
        self.cells.iter().filter(|b| b.locked).map(|b| b.cell).collect()
    }

    pub fn find_block(&self, id: BlockId) -> Option<&Block> {
        self.cells.iter().find(|b| b.id == id)
    }

    fn alloc_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        id
    }

    /// Next free global effect id on this field.
    pub fn alloc_effect_id(&mut self) -> EffectId {
        let id = EffectId(self.next_effect_id);
        self.next_effect_id += 1;
        id
    }

    // =========================================================================
    // Swap
    // =========================================================================

    /// Validate a swap without touching the board.
    pub fn check_swap(&self, cell: Cell, dir: Direction, now: Millis) -> Result<Cell, SwapError> {
        let (dx, dy) = dir.delta();
        let target = cell
            .offset(dx, dy)
            .filter(|c| self.contains(*c))
            .ok_or(SwapError::OutOfBounds)?;
        let a = self.get(cell).ok_or(SwapError::OutOfBounds)?;
        let b = self.get(target).ok_or(SwapError::OutOfBounds)?;

        if a.is_destroyed() || b.is_destroyed() {
            return Err(SwapError::Destroyed);
        }
        if a.block_type == b.block_type {
            return Err(SwapError::SameType);
        }
        if a.is_frozen(now) || b.is_frozen(now) {
            return Err(SwapError::Frozen);
        }
        Ok(target)
    }

    /// Exchange two adjacent blocks. Returns both cells as combo scan seeds.
    pub fn try_swap(&mut self, cell: Cell, dir: Direction, now: Millis) -> Result<[Cell; 2], SwapError> {
        let target = self.check_swap(cell, dir, now)?;
        let (ia, ib) = (self.index(cell), self.index(target));
        self.cells.swap(ia, ib);
        self.cells[ia].cell = cell;
        self.cells[ib].cell = target;
        Ok([cell, target])
    }

    // =========================================================================
    // Destruction & refill
    // =========================================================================

    /// Mark blocks destroyed without changing occupancy.
    ///
    /// Returns copies of the blocks that were live before the call, so the
    /// caller can run delete hooks on them.
    pub fn destroy_blocks(&mut self, cells: &[Cell], cause: DestroyCause) -> Vec<Block> {
        let mut destroyed = Vec::new();
        for &cell in cells {
            if let Some(block) = self.get_mut(cell) {
                if block.is_live() {
                    block.state = BlockState::Destroyed(cause);
                    block.locked = false;
                    destroyed.push(block.clone());
                }
            }
        }
        destroyed
    }

    /// Remove destroyed blocks column by column, let survivors fall while
    /// keeping their order, and fill the vacated top cells with fresh blocks.
    ///
    /// Every moved or created block records what it replaced.
    /// Returns the number of freshly created blocks.
    pub fn fill_holes(&mut self, rng: &mut DeterministicRng) -> usize {
        let mut created = 0;

        for x in 0..self.width {
            let old: Vec<Block> = (0..self.height)
                .map(|y| self.cells[self.index(Cell::new(x, y))].clone())
                .collect();

            if old.iter().all(|b| b.is_live()) {
                continue;
            }

            // Survivors bottom-up
            let survivors: Vec<&Block> = old.iter().rev().filter(|b| b.is_live()).collect();
            let mut dest_y = self.height;

            for survivor in &survivors {
                dest_y -= 1;
                let dest = Cell::new(x, dest_y);
                let mut block = (*survivor).clone();
                if block.cell != dest {
                    block.replaces = Some(provenance(&old[dest_y], Some(block.cell)));
                    block.cell = dest;
                }
                let idx = self.index(dest);
                self.cells[idx] = block;
            }

            while dest_y > 0 {
                dest_y -= 1;
                let dest = Cell::new(x, dest_y);
                let block_id = self.alloc_block_id();
                let mut block = Block::new(block_id, random_regular(rng), dest);
                block.replaces = Some(provenance(&old[dest_y], None));
                let idx = self.index(dest);
                self.cells[idx] = block;
                created += 1;
            }
        }

        created
    }

    /// Alias kept for the turn pipeline's naming.
    #[inline]
    pub fn clear_destroyed_blocks(&mut self, rng: &mut DeterministicRng) -> usize {
        self.fill_holes(rng)
    }

    /// Materialize a block of `block_type` at a uniformly random candidate,
    /// recording what it replaced.
    pub fn create_block_in_range(
        &mut self,
        block_type: BlockType,
        candidates: &[Cell],
        rng: &mut DeterministicRng,
    ) -> Option<Cell> {
        let valid: Vec<Cell> = candidates.iter().copied().filter(|c| self.contains(*c)).collect();
        let cell = *rng.choose(&valid)?;
        self.replace_block(cell, block_type);
        Some(cell)
    }

    /// Put a fresh block of `block_type` at `cell`.
    pub fn replace_block(&mut self, cell: Cell, block_type: BlockType) -> Option<&mut Block> {
        if !self.contains(cell) {
            return None;
        }
        let block_id = self.alloc_block_id();
        let idx = self.index(cell);
        let mut block = Block::new(block_id, block_type, cell);
        block.replaces = Some(provenance(&self.cells[idx], None));
        self.cells[idx] = block;
        self.cells.get_mut(idx)
    }

    /// Return to steady state: fresh blocks become eligible, animation
    /// records are dropped and expired per-block effects are pruned.
    ///
    /// Returns the number of pruned per-block effects.
    pub fn normalize(&mut self, now: Millis) -> usize {
        let mut pruned = 0;
        for block in &mut self.cells {
            if block.state == BlockState::Created {
                block.state = BlockState::Eligible;
            }
            block.replaces = None;
            pruned += block.prune_effects(now);
        }
        pruned
    }

    // =========================================================================
    // Tap locks
    // =========================================================================

    /// Toggle the tap lock of a block.
    ///
    /// Locked blocks must be able to combo together. Once `required` blocks
    /// are locked, locks clear and the cells are returned as one combo.
    pub fn toggle_lock(&mut self, cell: Cell, required: usize) -> Result<TapOutcome, TapError> {
        let block = self.get(cell).ok_or(TapError::OutOfBounds)?;
        if block.is_destroyed() {
            return Err(TapError::Destroyed);
        }
        let (already_locked, tapped) = (block.locked, block.block_type);
        if already_locked {
            if let Some(b) = self.get_mut(cell) {
                b.locked = false;
            }
            return Ok(TapOutcome::Unlocked);
        }

        let locked = self.locked_cells();
        let locked_types: Vec<BlockType> = locked.iter().filter_map(|c| self.type_at(*c)).collect();
        let fits = lock_set_accepts(&locked_types, tapped);

        let outcome = if fits {
            TapOutcome::Locked
        } else {
            for c in &locked {
                if let Some(b) = self.get_mut(*c) {
                    b.locked = false;
                }
            }
            TapOutcome::Restarted
        };

        if let Some(b) = self.get_mut(cell) {
            b.locked = true;
        }

        let locked = self.locked_cells();
        if locked.len() >= required {
            for c in &locked {
                if let Some(b) = self.get_mut(*c) {
                    b.locked = false;
                }
            }
            return Ok(TapOutcome::Complete(locked));
        }

        Ok(outcome)
    }

    // =========================================================================
    // Sampling helpers (live blocks only)
    // =========================================================================

    /// Uniformly random live block.
    pub fn random_block(&self, rng: &mut DeterministicRng) -> Option<Cell> {
        rng.choose(&self.live_cells()).copied()
    }

    /// Up to `count` distinct random live blocks.
    pub fn random_blocks(&self, rng: &mut DeterministicRng, count: usize) -> Vec<Cell> {
        let mut cells = self.live_cells();
        rng.shuffle(&mut cells);
        cells.truncate(count);
        cells
    }

    /// Live blocks within Chebyshev distance `radius` of `center`, center
    /// included.
    pub fn neighbours(&self, center: Cell, radius: usize) -> Vec<Cell> {
        let r = radius as i32;
        let mut cells = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if let Some(cell) = center.offset(dx, dy).filter(|c| self.contains(*c)) {
                    if self.get(cell).map(|b| b.is_live()).unwrap_or(false) {
                        cells.push(cell);
                    }
                }
            }
        }
        cells
    }

    /// Random live block at least `radius` away from every border, so its
    /// full `(2 * radius + 1)` square neighbourhood stays in bounds.
    pub fn random_inner_block(&self, rng: &mut DeterministicRng, radius: usize) -> Option<Cell> {
        if self.width <= 2 * radius || self.height <= 2 * radius {
            return None;
        }
        let inner: Vec<Cell> = self
            .cells
            .iter()
            .filter(|b| b.is_live())
            .map(|b| b.cell)
            .filter(|c| {
                c.x >= radius && c.y >= radius && c.x + radius < self.width && c.y + radius < self.height
            })
            .collect();
        rng.choose(&inner).copied()
    }

    // =========================================================================
    // Global effects
    // =========================================================================

    pub fn has_shield(&self) -> bool {
        self.effects
            .iter()
            .any(|e| e.kind == crate::game::effects::GlobalEffectKind::Shield)
    }

    /// Remove and return the global effect with `id`.
    pub fn remove_effect(&mut self, id: EffectId) -> Option<GlobalEffect> {
        let pos = self.effects.iter().position(|e| e.id == id)?;
        Some(self.effects.remove(pos))
    }
}

/// Whether `tapped` can join a lock set of `locked` types.
fn lock_set_accepts(locked: &[BlockType], tapped: BlockType) -> bool {
    match locked.iter().find(|t| !t.is_wildcard()) {
        Some(resolved) => tapped.can_combo_with(*resolved),
        None => true,
    }
}

fn provenance(replaced: &Block, moved_from: Option<Cell>) -> Provenance {
    Provenance {
        replaced_id: replaced.id,
        replaced_type: replaced.block_type,
        replaced_state: replaced.state,
        moved_from,
    }
}

fn random_regular(rng: &mut DeterministicRng) -> BlockType {
    BlockType::REGULAR[rng.next_index(BlockType::REGULAR.len())]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use BlockType::*;

    /// Checkerboard-free 6x6 layout with no run of three anywhere.
    pub(crate) fn calm_rows() -> Vec<Vec<BlockType>> {
        vec![
            vec![Sword, Heart, Crystal, Bolt, Shield, Sword],
            vec![Bolt, Shield, Sword, Heart, Crystal, Bolt],
            vec![Heart, Crystal, Bolt, Shield, Sword, Heart],
            vec![Shield, Sword, Heart, Crystal, Bolt, Shield],
            vec![Crystal, Bolt, Shield, Sword, Heart, Crystal],
            vec![Sword, Heart, Crystal, Bolt, Shield, Sword],
        ]
    }

    fn assert_coordinates_consistent(field: &Field) {
        for y in 0..field.height() {
            for x in 0..field.width() {
                let cell = Cell::new(x, y);
                assert_eq!(field.get(cell).map(|b| b.cell), Some(cell));
            }
        }
    }

    #[test]
    fn test_generate_has_no_wildcards() {
        let mut rng = DeterministicRng::new(42);
        let field = Field::generate(1, 6, 6, &mut rng);

        assert_eq!(field.blocks().count(), 36);
        assert!(field.blocks().all(|b| !b.block_type.is_wildcard()));
        assert!(field.blocks().all(|b| b.state == BlockState::Created));
        assert_coordinates_consistent(&field);
    }

    #[test]
    fn test_swap_exchanges_blocks() {
        let mut field = Field::from_rows(1, &calm_rows());
        let seeds = field.try_swap(Cell::new(0, 0), Direction::Right, 0).unwrap();

        assert_eq!(seeds, [Cell::new(0, 0), Cell::new(1, 0)]);
        assert_eq!(field.type_at(Cell::new(0, 0)), Some(Heart));
        assert_eq!(field.type_at(Cell::new(1, 0)), Some(Sword));
        assert_coordinates_consistent(&field);
    }

    #[test]
    fn test_swap_rejects_out_of_bounds() {
        let mut field = Field::from_rows(1, &calm_rows());
        let before: Vec<BlockType> = field.blocks().map(|b| b.block_type).collect();

        assert_eq!(field.try_swap(Cell::new(0, 0), Direction::Up, 0), Err(SwapError::OutOfBounds));
        assert_eq!(field.try_swap(Cell::new(0, 0), Direction::Left, 0), Err(SwapError::OutOfBounds));
        assert_eq!(field.try_swap(Cell::new(5, 5), Direction::Right, 0), Err(SwapError::OutOfBounds));
        assert_eq!(field.try_swap(Cell::new(9, 9), Direction::Down, 0), Err(SwapError::OutOfBounds));

        let after: Vec<BlockType> = field.blocks().map(|b| b.block_type).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_swap_rejects_same_type() {
        let mut rows = calm_rows();
        rows[0][1] = Sword;
        let mut field = Field::from_rows(1, &rows);

        assert_eq!(field.try_swap(Cell::new(0, 0), Direction::Right, 0), Err(SwapError::SameType));
        assert_eq!(field.type_at(Cell::new(0, 0)), Some(Sword));
    }

    #[test]
    fn test_swap_rejects_frozen() {
        let mut field = Field::from_rows(1, &calm_rows());
        field.get_mut(Cell::new(1, 0)).unwrap().freeze(1_000, 2_000);

        assert_eq!(field.try_swap(Cell::new(0, 0), Direction::Right, 1_500), Err(SwapError::Frozen));
        assert!(field.try_swap(Cell::new(0, 0), Direction::Right, 3_000).is_ok());
    }

    #[test]
    fn test_destroy_keeps_occupancy() {
        let mut field = Field::from_rows(1, &calm_rows());
        let destroyed = field.destroy_blocks(&[Cell::new(2, 2), Cell::new(2, 2)], DestroyCause::AsCombo);

        assert_eq!(destroyed.len(), 1);
        assert_eq!(field.blocks().count(), 36);
        assert_eq!(field.destroyed_cells(), vec![Cell::new(2, 2)]);
    }

    #[test]
    fn test_fill_holes_gravity_and_provenance() {
        let mut field = Field::from_rows(1, &calm_rows());
        let top = field.get(Cell::new(0, 0)).unwrap().clone();
        let destroyed = field.get(Cell::new(0, 1)).unwrap().clone();

        field.destroy_blocks(&[Cell::new(0, 1)], DestroyCause::AsCombo);
        let mut rng = DeterministicRng::new(3);
        assert_eq!(field.fill_holes(&mut rng), 1);

        // Old top block fell into the hole
        let fallen = field.get(Cell::new(0, 1)).unwrap();
        assert_eq!(fallen.id, top.id);
        let prov = fallen.replaces.as_ref().unwrap();
        assert_eq!(prov.replaced_id, destroyed.id);
        assert_eq!(prov.moved_from, Some(Cell::new(0, 0)));

        // Fresh block on top
        let fresh = field.get(Cell::new(0, 0)).unwrap();
        assert_eq!(fresh.state, BlockState::Created);
        assert_eq!(fresh.replaces.as_ref().unwrap().replaced_id, top.id);
        assert!(fresh.replaces.as_ref().unwrap().moved_from.is_none());

        // Untouched columns carry no provenance
        assert!(field.get(Cell::new(3, 3)).unwrap().replaces.is_none());
        assert_coordinates_consistent(&field);
    }

    #[test]
    fn test_create_block_in_range() {
        let mut field = Field::from_rows(1, &calm_rows());
        let mut rng = DeterministicRng::new(8);
        let candidates = [Cell::new(1, 1), Cell::new(2, 1)];

        let cell = field.create_block_in_range(Chameleon, &candidates, &mut rng).unwrap();
        assert!(candidates.contains(&cell));
        assert_eq!(field.type_at(cell), Some(Chameleon));
        assert!(field.get(cell).unwrap().replaces.is_some());

        assert!(field.create_block_in_range(Sword, &[], &mut rng).is_none());
    }

    #[test]
    fn test_normalize_clears_transient_state() {
        let mut field = Field::from_rows(1, &calm_rows());
        field.get_mut(Cell::new(0, 0)).unwrap().freeze(0, 100);
        field.destroy_blocks(&[Cell::new(4, 4)], DestroyCause::ByDamage);
        field.fill_holes(&mut DeterministicRng::new(1));

        assert_eq!(field.normalize(200), 1);
        assert!(field.blocks().all(|b| b.state == BlockState::Eligible));
        assert!(field.blocks().all(|b| b.replaces.is_none()));
    }

    #[test]
    fn test_tap_locks_pop_as_combo() {
        let mut rows = calm_rows();
        rows[5][0] = Heart;
        rows[3][3] = Chameleon;
        let mut field = Field::from_rows(1, &rows);

        assert_eq!(field.toggle_lock(Cell::new(1, 0), 3), Ok(TapOutcome::Locked)); // Heart
        assert_eq!(field.toggle_lock(Cell::new(3, 3), 3), Ok(TapOutcome::Locked)); // Chameleon
        // Sword does not fit a Heart set
        assert_eq!(field.toggle_lock(Cell::new(0, 0), 3), Ok(TapOutcome::Restarted));
        assert_eq!(field.locked_cells(), vec![Cell::new(0, 0)]);

        assert_eq!(field.toggle_lock(Cell::new(0, 0), 3), Ok(TapOutcome::Unlocked));
        assert!(field.locked_cells().is_empty());

        field.toggle_lock(Cell::new(1, 0), 3).unwrap();
        field.toggle_lock(Cell::new(3, 3), 3).unwrap();
        let outcome = field.toggle_lock(Cell::new(0, 5), 3).unwrap();
        match outcome {
            TapOutcome::Complete(cells) => assert_eq!(cells.len(), 3),
            other => panic!("expected complete, got {:?}", other),
        }
        assert!(field.locked_cells().is_empty());
    }

    #[test]
    fn test_sampling_helpers_skip_destroyed() {
        let mut field = Field::from_rows(1, &calm_rows());
        let all: Vec<Cell> = field.live_cells();
        field.destroy_blocks(&all[1..], DestroyCause::ByDamage);

        let mut rng = DeterministicRng::new(4);
        assert_eq!(field.random_block(&mut rng), Some(all[0]));
        assert_eq!(field.random_blocks(&mut rng, 5), vec![all[0]]);
        assert_eq!(field.neighbours(Cell::new(1, 1), 1), vec![Cell::new(0, 0)]);
    }

    #[test]
    fn test_random_inner_block_stays_off_border() {
        let field = Field::from_rows(1, &calm_rows());
        let mut rng = DeterministicRng::new(11);
        for _ in 0..100 {
            let cell = field.random_inner_block(&mut rng, 1).unwrap();
            assert_eq!(field.neighbours(cell, 1).len(), 9);
        }
        assert!(field.random_inner_block(&mut rng, 3).is_none());
    }

    proptest! {
        #[test]
        fn prop_fill_holes_leaves_no_destroyed_cell(seed in any::<u64>(), mask in any::<u64>()) {
            let mut rng = DeterministicRng::new(seed);
            let mut field = Field::generate(1, 6, 6, &mut rng);
            let cells: Vec<Cell> = field
                .live_cells()
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| c)
                .collect();
            field.destroy_blocks(&cells, DestroyCause::AsCombo);
            field.fill_holes(&mut rng);

            prop_assert!(field.destroyed_cells().is_empty());
            prop_assert_eq!(field.blocks().count(), 36);
            assert_coordinates_consistent(&field);
        }

        #[test]
        fn prop_rejected_swap_leaves_board_unchanged(
            seed in any::<u64>(),
            x in 0i32..8,
            y in 0i32..8,
            dir in 0usize..4,
        ) {
            let mut rng = DeterministicRng::new(seed);
            let mut field = Field::generate(1, 6, 6, &mut rng);
            let before: Vec<(BlockId, BlockType)> = field.blocks().map(|b| (b.id, b.block_type)).collect();

            let cell = Cell::new(x as usize, y as usize);
            if field.try_swap(cell, Direction::ALL[dir], 0).is_err() {
                let after: Vec<(BlockId, BlockType)> = field.blocks().map(|b| (b.id, b.block_type)).collect();
                prop_assert_eq!(before, after);
            }
        }
    }
}
