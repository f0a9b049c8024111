use crate::error::GossipError;
use crate::model::AgentId;

/// Toroidal 2D grid of agent positions.
///
/// Cells are stored in row-major order and may hold several agents.
pub struct SpatialGrid {
    width: usize,
    height: usize,
    cells: Vec<Vec<AgentId>>,
}

impl SpatialGrid {
    /// # Errors
    /// Returns [`GossipError::OutOfBounds`] if either dimension is zero, since
    /// no position would lie on the grid.
    pub fn new(width: usize, height: usize) -> Result<Self, GossipError> {
        if width == 0 || height == 0 {
            return Err(GossipError::OutOfBounds {
                x: 0,
                y: 0,
                width,
                height,
            });
        }
        let mut cells = Vec::new();
        cells.resize_with(width * height, Vec::new);
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Place an agent at `(x, y)`, which must already lie on the grid.
    pub fn place(&mut self, agent: AgentId, x: usize, y: usize) -> Result<(), GossipError> {
        if x >= self.width || y >= self.height {
            return Err(GossipError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let i_cell = self.cell_index(x, y);
        self.cells[i_cell].push(agent);
        Ok(())
    }

    /// Agents placed at `(x, y)`.
    pub fn agents_at(&self, x: usize, y: usize) -> &[AgentId] {
        &self.cells[self.cell_index(x % self.width, y % self.height)]
    }

    /// Agents on the Moore neighborhood of `(x, y)`, wrapping at the edges.
    ///
    /// The center cell is excluded. On grids narrower than three cells the
    /// wrapped offsets collide and each distinct cell is visited only once.
    pub fn neighbors_of(&self, x: usize, y: usize) -> Vec<AgentId> {
        let (x, y) = (x % self.width, y % self.height);
        let center = self.cell_index(x, y);

        let mut visited = Vec::with_capacity(8);
        let mut neighbors = Vec::with_capacity(8);
        for dy in [self.height - 1, 0, 1] {
            for dx in [self.width - 1, 0, 1] {
                let i_cell = self.cell_index((x + dx) % self.width, (y + dy) % self.height);
                if i_cell == center || visited.contains(&i_cell) {
                    continue;
                }
                visited.push(i_cell);
                neighbors.extend_from_slice(&self.cells[i_cell]);
            }
        }
        neighbors
    }

    fn cell_index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }
}
