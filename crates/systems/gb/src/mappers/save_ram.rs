//! Battery-backed RAM files
//!
//! A save file is the raw concatenation of every external RAM bank, stored
//! next to the ROM as `<rom file name>.sav`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// `game.gb` -> `game.gb.sav`
pub fn path_for(rom: &Path) -> PathBuf {
    let mut name = rom.as_os_str().to_owned();
    name.push(".sav");
    PathBuf::from(name)
}

/// Read a save file; `None` when there is none yet
pub fn load(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn store(path: &Path, ram: &[u8]) -> io::Result<()> {
    fs::write(path, ram)
}
