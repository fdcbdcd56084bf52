use anyhow::{Context, Result};
use clap::Parser;
use emu_core::System;
use emu_gb::context::{EmuContext, GbConfig};
use emu_gb::mappers::save_ram;
use emu_gb::GbSystem;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(about = "Run a Game Boy cartridge headless and dump its state")]
struct Args {
    /// Path to a .gb or .gbc ROM
    rom: PathBuf,

    /// Optional boot ROM image: 256 bytes for monochrome cartridges, 2304
    /// for colour ones
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dump save-state to this file as JSON
    #[arg(long, default_value = "state.json")]
    save: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 5)]
    frames: u32,

    /// off, error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,

    /// Monochrome palette name
    #[arg(long)]
    palette: Option<String>,

    /// Run colour cartridges in monochrome mode
    #[arg(long, default_value_t = false)]
    force_dmg: bool,

    /// Stop with an error when the CPU stops making progress
    #[arg(long, default_value_t = false)]
    panic_on_stuck: bool,

    /// Print per-frame pixels and the I/O registers
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Suppress all per-frame output (still writes --save)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn load_config(args: &Args) -> Result<GbConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => GbConfig::default(),
    };

    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(palette) = &args.palette {
        config.palette = palette.clone();
    }
    config.force_dmg |= args.force_dmg;
    config.panic_on_stuck |= args.panic_on_stuck;
    Ok(config)
}

fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {what} {}", path.display()))
}

fn print_io(io: &[u8; 0x80]) {
    for (row, chunk) in io.chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
        println!("  FF{:02X}: {}", row * 16, bytes.join(" "));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let ctx = Arc::new(EmuContext::from_config(&config)?);

    // RUST_LOG still wins over the configured level
    let filter = ctx
        .logger()
        .get_global_level()
        .to_log_level()
        .map_or("off", |level| level.as_str());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
    let mut sys = GbSystem::with_context(ctx);

    let rom = read_file(&args.rom, "ROM")?;
    sys.mount("Cartridge", &rom)?;
    if let Some(path) = &args.boot_rom {
        let boot = read_file(path, "boot ROM")?;
        sys.mount("BootROM", &boot)?;
    }

    let sav = save_ram::path_for(&args.rom);
    if sys.load_ram_from(&sav)? {
        log::info!("restored save RAM from {}", sav.display());
    }

    if !args.quiet {
        if let Some(header) = sys.cartridge_header() {
            println!(
                "{}: {} ROM banks, {} RAM banks, {} mode",
                header.title,
                header.rom_banks,
                header.ram_banks,
                if sys.is_cgb() { "colour" } else { "monochrome" }
            );
        }
    }

    for fnum in 1..=args.frames {
        let frame = sys.step_frame()?;
        if args.quiet || !args.debug {
            continue;
        }

        println!("Frame {}: {}x{}", fnum, frame.width, frame.height);
        let dump_len = std::cmp::min(16, frame.pixels.len());
        let out: Vec<String> = frame.pixels[..dump_len]
            .iter()
            .map(|p| format!("{p:08X}"))
            .collect();
        println!("First {} pixels: {}", dump_len, out.join(" "));
        println!("I/O registers (frame {}):", fnum);
        print_io(&sys.io_snapshot());
    }

    let state = sys.save_state();
    let mut f = File::create(&args.save)
        .with_context(|| format!("creating {}", args.save.display()))?;
    write!(f, "{}", serde_json::to_string_pretty(&state)?)?;

    if sys.save_ram_to(&sav)? && !args.quiet {
        println!("Wrote save RAM to {}", sav.display());
    }
    if sys.cpu().is_stuck() {
        log::warn!("CPU was stuck at PC={:04X}", sys.cpu().pc);
    }
    if !args.quiet {
        println!("Ran {} frames, state written to {}", args.frames, args.save.display());
    }

    Ok(())
}
