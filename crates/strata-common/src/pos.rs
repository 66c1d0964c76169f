use std::fmt;

use serde::{Deserialize, Serialize};

/// Blocks along one horizontal edge of a chunk.
pub const CHUNK_SIZE: i32 = 16;
/// Chunks along one edge of a region container.
pub const REGION_SIZE: i32 = 32;

macro_rules! pair_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "x: {} z: {}", self.x, self.z)
                }
            }
        )*
    };
}

/// A block column in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldPosition {
    pub x: i32,
    pub z: i32,
}

/// A chunk in chunk-grid units (one unit is sixteen blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub x: i32,
    pub z: i32,
}

/// A column inside one chunk, both coordinates in `0..16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InChunkPosition {
    pub x: i32,
    pub z: i32,
}

/// A block inside one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// A slot of a region container, both coordinates in `0..32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InFilePosition {
    pub x: i32,
    pub z: i32,
}

/// A pixel position on a map rendered at some blocks-to-pixels scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenPosition {
    pub x: i32,
    pub z: i32,
}

pair_display!(
    WorldPosition,
    ChunkPosition,
    InChunkPosition,
    InFilePosition,
    ScreenPosition
);

impl WorldPosition {
    pub fn new(x: i32, z: i32) -> Self {
        WorldPosition { x, z }
    }

    pub fn pos_in_chunk(self) -> InChunkPosition {
        InChunkPosition {
            x: self.x.rem_euclid(CHUNK_SIZE),
            z: self.z.rem_euclid(CHUNK_SIZE),
        }
    }

    pub fn pos_of_chunk(self) -> ChunkPosition {
        ChunkPosition {
            x: self.x.div_euclid(CHUNK_SIZE),
            z: self.z.div_euclid(CHUNK_SIZE),
        }
    }
}

impl ChunkPosition {
    pub fn new(x: i32, z: i32) -> Self {
        ChunkPosition { x, z }
    }

    /// The world position of the chunk's north-west column.
    pub fn origin(self) -> WorldPosition {
        WorldPosition {
            x: self.x * CHUNK_SIZE,
            z: self.z * CHUNK_SIZE,
        }
    }

    pub fn world(self, pos: InChunkPosition) -> WorldPosition {
        let origin = self.origin();
        WorldPosition {
            x: origin.x + pos.x,
            z: origin.z + pos.z,
        }
    }

    /// Coordinates of the region container holding this chunk.
    pub fn region(self) -> (i32, i32) {
        (
            self.x.div_euclid(REGION_SIZE),
            self.z.div_euclid(REGION_SIZE),
        )
    }

    /// The slot this chunk occupies in its region container.
    pub fn in_file(self) -> InFilePosition {
        InFilePosition {
            x: self.x.rem_euclid(REGION_SIZE),
            z: self.z.rem_euclid(REGION_SIZE),
        }
    }

    /// `r.<x>.<z>.<extension>`
    pub fn region_file_name(self, extension: &str) -> String {
        let (rx, rz) = self.region();
        format!("r.{}.{}.{}", rx, rz, extension)
    }
}

impl From<WorldPosition> for ChunkPosition {
    fn from(pos: WorldPosition) -> Self {
        pos.pos_of_chunk()
    }
}

impl InChunkPosition {
    pub fn new(x: i32, z: i32) -> Self {
        InChunkPosition { x, z }
    }

    pub fn is_valid(self) -> bool {
        (0..CHUNK_SIZE).contains(&self.x) && (0..CHUNK_SIZE).contains(&self.z)
    }

    pub fn at_height(self, y: i32) -> Position3D {
        Position3D {
            x: self.x,
            y,
            z: self.z,
        }
    }
}

impl Position3D {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Position3D { x, y, z }
    }

    pub fn column(self) -> InChunkPosition {
        InChunkPosition {
            x: self.x,
            z: self.z,
        }
    }
}

impl fmt::Display for Position3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x: {} y: {} z: {}", self.x, self.y, self.z)
    }
}

impl InFilePosition {
    pub fn new(x: i32, z: i32) -> Self {
        InFilePosition { x, z }
    }

    pub fn is_valid(self) -> bool {
        (0..REGION_SIZE).contains(&self.x) && (0..REGION_SIZE).contains(&self.z)
    }

    /// Index into a container's offset directory.
    pub fn index(self) -> usize {
        (self.x + self.z * REGION_SIZE) as usize
    }

    /// Every slot of the grid, `x` major.
    pub fn grid() -> impl Iterator<Item = InFilePosition> {
        (0..REGION_SIZE).flat_map(|x| (0..REGION_SIZE).map(move |z| InFilePosition { x, z }))
    }
}

impl ScreenPosition {
    pub fn new(x: i32, z: i32) -> Self {
        ScreenPosition { x, z }
    }

    /// Maps a world column to screen space; each block spans `scale` pixels.
    pub fn from_world(pos: WorldPosition, offset: WorldPosition, scale: i32) -> Self {
        ScreenPosition {
            x: (pos.x - offset.x) * scale,
            z: (pos.z - offset.z) * scale,
        }
    }

    pub fn to_world(self, offset: WorldPosition, scale: i32) -> WorldPosition {
        let scale = scale.max(1);
        WorldPosition {
            x: self.x.div_euclid(scale) + offset.x,
            z: self.z.div_euclid(scale) + offset.z,
        }
    }
}
