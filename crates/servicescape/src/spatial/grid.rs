//! Uniform horizontal grid
//!
//! Divides the XZ plane into square cells of a fixed edge length. Height is
//! ignored: an entity at any Y lands in the cell below (or above) it. Cells
//! store entity ids only; the world manager owns the entities themselves.

use std::collections::HashMap;

use serde::{Serialize, Deserialize};

use crate::foundation::math::Vec3;
use crate::world::EntityId;

/// Integer cell coordinate on the XZ plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    /// Cell index along X
    pub x: i32,
    /// Cell index along Z
    pub z: i32,
}

impl GridCoord {
    /// Create a coordinate
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Cell containing `position`: `floor(position.xz / cell_size)`
    pub fn from_position(position: &Vec3, cell_size: f32) -> Self {
        Self {
            x: cell_index(position.x, cell_size),
            z: cell_index(position.z, cell_size),
        }
    }

    /// World-space center of the cell at height 0
    pub fn center(&self, cell_size: f32) -> Vec3 {
        Vec3::new(
            (self.x as f32 + 0.5) * cell_size,
            0.0,
            (self.z as f32 + 0.5) * cell_size,
        )
    }
}

fn cell_index(value: f32, cell_size: f32) -> i32 {
    (value / cell_size).floor() as i32
}

/// One occupied or explicitly loaded cell
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    coord: GridCoord,
    entities: Vec<EntityId>,
}

impl GridCell {
    fn new(coord: GridCoord) -> Self {
        Self {
            coord,
            entities: Vec::new(),
        }
    }

    /// Coordinate of this cell
    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    /// Ids of the entities currently inside
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Whether `id` is inside
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    /// Number of entities inside
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is inside
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Sparse uniform grid keyed by [`GridCoord`]
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<GridCoord, GridCell>,
    locations: HashMap<EntityId, GridCoord>,
}

impl SpatialGrid {
    /// Create an empty grid with the given cell edge length
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            locations: HashMap::new(),
        }
    }

    /// Cell edge length
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing `position`
    pub fn coord_of(&self, position: &Vec3) -> GridCoord {
        GridCoord::from_position(position, self.cell_size)
    }

    /// Cell currently holding `id`
    pub fn location(&self, id: EntityId) -> Option<GridCoord> {
        self.locations.get(&id).copied()
    }

    /// Borrow a cell
    pub fn cell(&self, coord: GridCoord) -> Option<&GridCell> {
        self.cells.get(&coord)
    }

    /// Iterate over all cells (unordered)
    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.values()
    }

    /// Number of cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of tracked entities
    pub fn entity_count(&self) -> usize {
        self.locations.len()
    }

    /// Ensure a cell exists; returns `true` if it was created
    pub fn load(&mut self, coord: GridCoord) -> bool {
        if self.cells.contains_key(&coord) {
            return false;
        }
        self.cells.insert(coord, GridCell::new(coord));
        true
    }

    /// Drop a cell and forget every entity it held
    pub fn unload(&mut self, coord: GridCoord) -> Option<GridCell> {
        let cell = self.cells.remove(&coord)?;
        for id in &cell.entities {
            self.locations.remove(id);
        }
        Some(cell)
    }

    /// Place an entity, moving it if it is already tracked
    pub fn insert(&mut self, id: EntityId, position: &Vec3) -> GridCoord {
        let coord = self.coord_of(position);
        match self.locations.get(&id).copied() {
            Some(current) if current == coord => {}
            Some(current) => {
                self.detach(id, current);
                self.attach(id, coord);
            }
            None => self.attach(id, coord),
        }
        coord
    }

    /// Re-bucket a tracked entity after it moved
    ///
    /// Returns `(from, to)` when the entity crossed a cell boundary.
    pub fn relocate(&mut self, id: EntityId, position: &Vec3) -> Option<(GridCoord, GridCoord)> {
        let current = self.locations.get(&id).copied();
        let coord = self.insert(id, position);
        match current {
            Some(from) if from != coord => Some((from, coord)),
            _ => None,
        }
    }

    /// Stop tracking an entity; returns the cell it was in
    ///
    /// The cell itself stays, even when it becomes empty.
    pub fn remove(&mut self, id: EntityId) -> Option<GridCoord> {
        let coord = self.locations.get(&id).copied()?;
        self.detach(id, coord);
        Some(coord)
    }

    /// Ids in every existing cell that overlaps the horizontal square
    /// `[center - radius, center + radius]`
    ///
    /// Candidates still need an exact distance test.
    pub fn candidates_near(&self, center: &Vec3, radius: f32) -> Vec<EntityId> {
        let radius = radius.abs();
        let min = GridCoord::from_position(&Vec3::new(center.x - radius, 0.0, center.z - radius), self.cell_size);
        let max = GridCoord::from_position(&Vec3::new(center.x + radius, 0.0, center.z + radius), self.cell_size);
        let in_range = |coord: &GridCoord| {
            (min.x..=max.x).contains(&coord.x) && (min.z..=max.z).contains(&coord.z)
        };

        let span = (i128::from(max.x) - i128::from(min.x) + 1) * (i128::from(max.z) - i128::from(min.z) + 1);
        let mut candidates = Vec::new();
        if span > self.cells.len() as i128 {
            // Fewer cells exist than the square covers; walk what exists
            for cell in self.cells.values().filter(|cell| in_range(&cell.coord)) {
                candidates.extend_from_slice(&cell.entities);
            }
        } else {
            for x in min.x..=max.x {
                for z in min.z..=max.z {
                    if let Some(cell) = self.cells.get(&GridCoord::new(x, z)) {
                        candidates.extend_from_slice(&cell.entities);
                    }
                }
            }
        }
        candidates
    }

    /// Remove every cell and entity
    pub fn clear(&mut self) {
        self.cells.clear();
        self.locations.clear();
    }

    fn attach(&mut self, id: EntityId, coord: GridCoord) {
        self.cells
            .entry(coord)
            .or_insert_with(|| GridCell::new(coord))
            .entities
            .push(id);
        self.locations.insert(id, coord);
    }

    fn detach(&mut self, id: EntityId, coord: GridCoord) {
        if let Some(cell) = self.cells.get_mut(&coord) {
            cell.entities.retain(|&other| other != id);
        }
        self.locations.remove(&id);
    }
}
