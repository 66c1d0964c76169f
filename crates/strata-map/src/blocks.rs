//! The classic numeric block ids and the colors used to draw them on a map.

use crate::color::Rgba;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub id: u16,
    pub name: &'static str,
    pub color: Rgba,
}

const fn block(id: u16, name: &'static str, color: Rgba) -> Block {
    Block { id, name, color }
}

pub const AIR: u16 = 0;

/// Returned for ids without an entry.
pub const UNASSIGNED: Block = block(u16::MAX, "unassigned", Rgba::rgb(0xff00ff));

static BLOCKS: [Block; 125] = [
    block(0, "air", Rgba::argb(0x00000000)),
    block(1, "stone", Rgba::rgb(0xc0c0c0)),
    block(2, "grass", Rgba::rgb(0x40d040)),
    block(3, "dirt", Rgba::rgb(0x964b00)),
    block(4, "cobble", Rgba::rgb(0x808080)),
    block(5, "plank", Rgba::rgb(0xff9800)),
    block(6, "sapling", Rgba::argb(0x7020ff20)),
    block(7, "bedrock", Rgba::rgb(0x000000)),
    block(8, "water", Rgba::argb(0x400000ff)),
    block(9, "water_stat", Rgba::argb(0x40000080)),
    block(10, "lava", Rgba::rgb(0xff0000)),
    block(11, "lava_stat", Rgba::rgb(0xff0000)),
    block(12, "sand", Rgba::rgb(0xffff00)),
    block(13, "gravel", Rgba::rgb(0x808080)),
    block(14, "gold_ore", Rgba::argb(0x80ffff00)),
    block(15, "iron_ore", Rgba::argb(0x80a0a0a0)),
    block(16, "coal", Rgba::argb(0x80404040)),
    block(17, "wood", Rgba::rgb(0xd66b00)),
    block(18, "leaves", Rgba::argb(0x4010a010)),
    block(19, "sponge", Rgba::rgb(0xffff00)),
    block(20, "glass", Rgba::argb(0x40ffffff)),
    block(21, "lapis_ore", Rgba::argb(0x800000ff)),
    block(22, "lapis", Rgba::rgb(0x0000ff)),
    block(23, "dispenser", Rgba::rgb(0x404040)),
    block(24, "sandstone", Rgba::rgb(0xffff40)),
    block(25, "note", Rgba::argb(0x80964b00)),
    block(26, "bed", Rgba::argb(0x8000ff00)),
    block(27, "rail_powered", Rgba::argb(0x8080ff80)),
    block(28, "rail_detector", Rgba::argb(0x80808080)),
    block(29, "piston_sticky", Rgba::argb(0x80964b00)),
    block(30, "web", Rgba::argb(0x20ffffff)),
    block(31, "grass_tall", Rgba::argb(0x2000ff00)),
    block(32, "dead_bush", Rgba::argb(0x20964b00)),
    block(33, "piston", Rgba::argb(0x80964b00)),
    block(34, "block34", Rgba::rgb(0xff00ff)),
    block(35, "wool_white", Rgba::rgb(0xffffff)),
    block(36, "technical_block", Rgba::argb(0x00000000)),
    block(37, "dandelion", Rgba::argb(0x40ffff00)),
    block(38, "rose", Rgba::argb(0x40ff0000)),
    block(39, "mushroom_brown", Rgba::argb(0x40d66b00)),
    block(40, "mushroom_red", Rgba::argb(0x40ff8080)),
    block(41, "gold", Rgba::rgb(0xffff00)),
    block(42, "iron", Rgba::rgb(0xc0c0c0)),
    block(43, "slab_dbl", Rgba::rgb(0x808080)),
    block(44, "slab", Rgba::argb(0x80808080)),
    block(45, "brick", Rgba::rgb(0x953400)),
    block(46, "tnt", Rgba::rgb(0xff0000)),
    block(47, "books", Rgba::rgb(0xff9800)),
    block(48, "moss", Rgba::rgb(0x80a080)),
    block(49, "obsidian", Rgba::rgb(0x202020)),
    block(50, "torch", Rgba::argb(0x80ffa500)),
    block(51, "fire", Rgba::argb(0x80ff8000)),
    block(52, "spawner", Rgba::argb(0x80202020)),
    block(53, "stairs_wood", Rgba::rgb(0xff9800)),
    block(54, "chest", Rgba::rgb(0xff9800)),
    block(55, "redstone_wire", Rgba::argb(0x70ff0000)),
    block(56, "diamond_ore", Rgba::argb(0x8000ffff)),
    block(57, "diamond", Rgba::rgb(0x00ffff)),
    block(58, "crafting_table", Rgba::rgb(0xd66b00)),
    block(59, "crops", Rgba::argb(0x80ffff00)),
    block(60, "farmland", Rgba::rgb(0x693400)),
    block(61, "furnace", Rgba::rgb(0x404040)),
    block(62, "furnace_active", Rgba::rgb(0x644040)),
    block(63, "sign", Rgba::argb(0x60ff9800)),
    block(64, "door_wood", Rgba::argb(0x80ff9800)),
    block(65, "ladder", Rgba::argb(0x70ff9800)),
    block(66, "rail", Rgba::argb(0x80909090)),
    block(67, "cobble_stairs", Rgba::rgb(0x808080)),
    block(68, "sign_wall", Rgba::argb(0x60ff9800)),
    block(69, "lever", Rgba::argb(0x60ff9800)),
    block(70, "plate_stone", Rgba::argb(0x80a0a0a0)),
    block(71, "door_iron", Rgba::argb(0x80ffffff)),
    block(72, "plate_wood", Rgba::argb(0x80ff9800)),
    block(73, "redstone_ore", Rgba::argb(0x80ff0000)),
    block(74, "redstone_ore_on", Rgba::argb(0x90ff0000)),
    block(75, "redstone_torch", Rgba::argb(0x60ff0000)),
    block(76, "redstone_torch_on", Rgba::argb(0x80ff0000)),
    block(77, "button", Rgba::argb(0x40a0a0a0)),
    block(78, "snow", Rgba::argb(0xd0ffffff)),
    block(79, "ice", Rgba::argb(0xc000ffff)),
    block(80, "snow_block", Rgba::rgb(0xffffff)),
    block(81, "cactus", Rgba::rgb(0x00d000)),
    block(82, "clay", Rgba::rgb(0xc0c0c0)),
    block(83, "cane", Rgba::argb(0xd060ff60)),
    block(84, "jukebox", Rgba::argb(0x80964b00)),
    block(85, "fence", Rgba::argb(0x80ff9800)),
    block(86, "pumpkin", Rgba::rgb(0xffa400)),
    block(87, "netherrack", Rgba::rgb(0xe080a0)),
    block(88, "soulsand", Rgba::rgb(0x9080a0)),
    block(89, "glowstone", Rgba::rgb(0xffff80)),
    block(90, "portal", Rgba::argb(0x40800080)),
    block(91, "pumpkin_light", Rgba::rgb(0xffc440)),
    block(92, "cake", Rgba::argb(0x80ffa400)),
    block(93, "redstone_rep", Rgba::argb(0x70ff0000)),
    block(94, "redstone_rep_on", Rgba::argb(0x80ff0000)),
    block(95, "chest_locked", Rgba::rgb(0xff9800)),
    block(96, "trap", Rgba::argb(0x80ff9800)),
    block(97, "stone_silverfish", Rgba::rgb(0xc0c0c0)),
    block(98, "stone_brick", Rgba::rgb(0x808080)),
    block(99, "mushroom_brown_huge", Rgba::rgb(0xd66b00)),
    block(100, "mushroom_red_huge", Rgba::rgb(0xff8080)),
    block(101, "iron_bar", Rgba::argb(0x80ffffff)),
    block(102, "glass_pane", Rgba::argb(0x20ffffff)),
    block(103, "melon", Rgba::rgb(0x29ff29)),
    block(104, "stem_pumpkin", Rgba::rgb(0x008070)),
    block(105, "stem_melon", Rgba::rgb(0x008070)),
    block(106, "vine", Rgba::argb(0x80008000)),
    block(107, "fence_gate", Rgba::argb(0x80ff9800)),
    block(108, "stairs_brick", Rgba::rgb(0x953400)),
    block(109, "stairs_stone_brick", Rgba::rgb(0x808080)),
    block(110, "mycellium", Rgba::rgb(0x964b00)),
    block(111, "lily_pad", Rgba::argb(0x80008000)),
    block(112, "nether_brick", Rgba::rgb(0x600000)),
    block(113, "fence_nether_brick", Rgba::argb(0x80600000)),
    block(114, "stairs_nether_brick", Rgba::rgb(0x600000)),
    block(115, "nether_wart", Rgba::argb(0x80800045)),
    block(116, "enchantment", Rgba::argb(0x8000d0d0)),
    block(117, "brewing", Rgba::argb(0x80d00000)),
    block(118, "cauldron", Rgba::argb(0x80707070)),
    block(119, "portal_end", Rgba::argb(0x80000000)),
    block(120, "portal_end_frame", Rgba::rgb(0x00d0d0)),
    block(121, "stone_end", Rgba::rgb(0xa0a070)),
    block(122, "dragon_egg", Rgba::argb(0x80202020)),
    block(123, "redstone_lamp", Rgba::rgb(0x408080)),
    block(124, "redstone_lamp_on", Rgba::rgb(0x40ffff)),
];

/// The table entry for `id`, or [`UNASSIGNED`].
pub fn block_for_id(id: u16) -> &'static Block {
    BLOCKS.get(usize::from(id)).unwrap_or(&UNASSIGNED)
}

pub fn block_by_name(name: &str) -> Option<&'static Block> {
    BLOCKS.iter().find(|b| b.name.eq_ignore_ascii_case(name))
}

pub fn all() -> &'static [Block] {
    &BLOCKS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense() {
        for (i, block) in all().iter().enumerate() {
            assert_eq!(usize::from(block.id), i);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(block_for_id(AIR).name, "air");
        assert!(!block_for_id(AIR).color.is_opaque());
        assert_eq!(block_for_id(1).name, "stone");
        assert_eq!(block_for_id(125), &UNASSIGNED);
        assert_eq!(block_for_id(4095), &UNASSIGNED);
        assert_eq!(block_by_name("GRASS").map(|b| b.id), Some(2));
    }
}
