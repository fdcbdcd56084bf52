//! Core emulator primitives and traits.

pub mod cpu_lr35902;
pub mod logging;
pub mod types {
    use serde::{Deserialize, Serialize};

    /// Packed 0xAARRGGBB pixels, row-major
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }
    }
}

use serde_json::Value;

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Cartridge", "BootROM")
    pub id: String,
    /// User-friendly name for display (e.g., "Cartridge Slot")
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["gb", "gbc"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Return a JSON-serializable save state for debugging.
    /// Cartridge ROM is never part of it; only CPU and device state.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    /// Returns error if the state is malformed or from another format version.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_starts_cleared() {
        let f = types::Frame::new(160, 144);
        assert_eq!(f.pixels.len(), 160 * 144);
        assert!(f.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_frame_serializes_dimensions() {
        let f = types::Frame::new(2, 1);
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["width"], 2);
        assert_eq!(v["height"], 1);
        assert_eq!(v["pixels"].as_array().map(Vec::len), Some(2));
    }
}
