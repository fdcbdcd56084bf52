//! Colour palettes
//!
//! Monochrome games pick one of four shades per pixel through BGP; the
//! selected [`DmgPalette`] decides what RGB each shade becomes. Colour games
//! write 15-bit colours into palette RAM through the index/data port pairs
//! at 0xFF68-0xFF6B, modelled by [`CgbPalette`].

use serde::{Deserialize, Serialize};

/// RGB shades used for monochrome output, lightest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DmgPalette {
    Greyscale,
    /// Green-tinted, close to the original screen
    Original,
    /// Default of the BGB debugger
    #[default]
    Bgb,
    Nyx4,
    Crimson,
    ColdFire,
}

impl DmgPalette {
    pub const ALL: [DmgPalette; 6] = [
        DmgPalette::Greyscale,
        DmgPalette::Original,
        DmgPalette::Bgb,
        DmgPalette::Nyx4,
        DmgPalette::Crimson,
        DmgPalette::ColdFire,
    ];

    /// The four shades, indexed by the 2-bit value a BGP entry resolves to
    pub fn colors(self) -> [[u8; 3]; 4] {
        match self {
            DmgPalette::Greyscale => [
                [0xFF, 0xFF, 0xFF],
                [0xCC, 0xCC, 0xCC],
                [0x77, 0x77, 0x77],
                [0x00, 0x00, 0x00],
            ],
            DmgPalette::Original => [
                [0x9B, 0xBC, 0x0F],
                [0x8B, 0xAC, 0x0F],
                [0x30, 0x62, 0x30],
                [0x0F, 0x38, 0x0F],
            ],
            DmgPalette::Bgb => [
                [0xE0, 0xF8, 0xD0],
                [0x88, 0xC0, 0x70],
                [0x34, 0x68, 0x56],
                [0x08, 0x18, 0x20],
            ],
            DmgPalette::Nyx4 => [
                [0x8C, 0xAB, 0xA1],
                [0x6D, 0x7A, 0x80],
                [0x0F, 0x2A, 0x3F],
                [0x08, 0x14, 0x1E],
            ],
            DmgPalette::Crimson => [
                [0xEF, 0xF9, 0xD6],
                [0xBA, 0x50, 0x44],
                [0x7A, 0x1C, 0x4B],
                [0x1B, 0x03, 0x26],
            ],
            DmgPalette::ColdFire => [
                [0xF6, 0xC6, 0xA8],
                [0xD1, 0x7C, 0x7C],
                [0x5B, 0x76, 0x8D],
                [0x46, 0x42, 0x5E],
            ],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DmgPalette::Greyscale => "greyscale",
            DmgPalette::Original => "original",
            DmgPalette::Bgb => "bgb",
            DmgPalette::Nyx4 => "nyx4",
            DmgPalette::Crimson => "crimson",
            DmgPalette::ColdFire => "coldfire",
        }
    }

    /// Parse a palette name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub(crate) fn index(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_index(index: u8) -> Self {
        Self::ALL[index as usize % Self::ALL.len()]
    }

    /// The palette after this one, wrapping around
    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }
}

/// 5-bit colour channel to 8-bit
const CHANNEL_5_TO_8: [u8; 32] = [
    0x00, 0x08, 0x10, 0x18, 0x20, 0x29, 0x31, 0x39, 0x41, 0x4A, 0x52, 0x5A, 0x62, 0x6A, 0x73, 0x7B,
    0x83, 0x8B, 0x94, 0x9C, 0xA4, 0xAC, 0xB4, 0xBD, 0xC5, 0xCD, 0xD5, 0xDE, 0xE6, 0xEE, 0xF6, 0xFF,
];

const PALETTE_RAM_SIZE: usize = 0x40;

/// Colour palette RAM behind one index/data port pair
///
/// Eight palettes of four colours, each colour two bytes little-endian
/// (`0bbbbbgg gggrrrrr`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CgbPalette {
    #[serde(with = "serde_bytes_array")]
    data: [u8; PALETTE_RAM_SIZE],
    index: u8,
    auto_increment: bool,
}

impl Default for CgbPalette {
    fn default() -> Self {
        Self::new()
    }
}

impl CgbPalette {
    pub fn new() -> Self {
        Self {
            data: [0xFF; PALETTE_RAM_SIZE],
            index: 0,
            auto_increment: false,
        }
    }

    /// Index port write: bits 0-5 select the byte, bit 7 enables auto-increment
    pub fn write_index(&mut self, val: u8) {
        self.index = val & 0x3F;
        self.auto_increment = val & 0x80 != 0;
    }

    pub fn read_index(&self) -> u8 {
        let inc = if self.auto_increment { 0x80 } else { 0 };
        self.index | inc | 0x40
    }

    pub fn read_data(&self) -> u8 {
        self.data[self.index as usize]
    }

    pub fn write_data(&mut self, val: u8) {
        self.data[self.index as usize] = val;
        if self.auto_increment {
            self.index = (self.index + 1) & 0x3F;
        }
    }

    /// RGB for colour `num` (0-3) of palette `palette` (0-7)
    pub fn color(&self, palette: u8, num: u8) -> [u8; 3] {
        let idx = ((palette & 0x07) as usize * 8) + ((num & 0x03) as usize * 2);
        let raw = u16::from_le_bytes([self.data[idx], self.data[idx + 1]]);
        [
            CHANNEL_5_TO_8[(raw & 0x1F) as usize],
            CHANNEL_5_TO_8[((raw >> 5) & 0x1F) as usize],
            CHANNEL_5_TO_8[((raw >> 10) & 0x1F) as usize],
        ]
    }
}

/// serde only derives arrays up to 32 elements
mod serde_bytes_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        data: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        data.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::invalid_length(len, &"a fixed-size byte array"))
    }
}
