//! Biome ids and their map overlay colors.

use std::fmt;

use crate::color::Rgba;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Biome {
    pub id: u8,
    pub name: &'static str,
    pub color: Rgba,
}

// Overlays are drawn half transparent.
const fn biome(id: u8, name: &'static str, rgb: u32) -> Biome {
    Biome {
        id,
        name,
        color: Rgba::argb(0x8000_0000 | rgb),
    }
}

pub const UNASSIGNED: Biome = biome(u8::MAX, "Unassigned", 0xff00ff);

static BIOMES: [Biome; 23] = [
    biome(0, "Ocean", 0x0000ff),
    biome(1, "Plains", 0x00ff00),
    biome(2, "Desert", 0xffff00),
    biome(3, "Extreme Hills", 0x964b00),
    biome(4, "Forest", 0x00a000),
    biome(5, "Taiga", 0x80a080),
    biome(6, "Swampland", 0x006000),
    biome(7, "River", 0x8080ff),
    biome(8, "Hell", 0xff0000),
    biome(9, "Sky", 0x00ffff),
    biome(10, "Frozen Ocean", 0x8080ff),
    biome(11, "Frozen River", 0x80a0a0),
    biome(12, "Ice Plains", 0x80ff80),
    biome(13, "Ice Mountains", 0xff9800),
    biome(14, "Mushroom Island", 0xffa000),
    biome(15, "Mushroom Island Shore", 0xffa060),
    biome(16, "Beach", 0xffff80),
    biome(17, "Desert Hills", 0x808000),
    biome(18, "Forest Hills", 0x80ff00),
    biome(19, "Taiga Hills", 0xd66b00),
    biome(20, "Extreme Hills Edge", 0xbf5400),
    biome(21, "Jungle", 0x00d000),
    biome(22, "Jungle Hills", 0x20d020),
];

pub fn biome_for_id(id: u8) -> &'static Biome {
    BIOMES.get(usize::from(id)).unwrap_or(&UNASSIGNED)
}

pub fn all() -> &'static [Biome] {
    &BIOMES
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense() {
        for (i, biome) in all().iter().enumerate() {
            assert_eq!(usize::from(biome.id), i);
            assert_eq!(biome.color.a, 0x80);
        }
    }

    #[test]
    fn test_unknown_id() {
        assert_eq!(biome_for_id(23).to_string(), "Unassigned");
        assert_eq!(biome_for_id(21).name, "Jungle");
    }
}
