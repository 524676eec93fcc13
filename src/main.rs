// Host side of the machine: ROM and save file traffic, the window, the keyboard and the pacing
// all live here, on the far side of the MotherBoard interface.
use dotmatrix::motherboard::{MotherBoard, TickMode};
use std::path::{Path, PathBuf};

struct Config {
    rom: String,
    scale: u32,
    save_interval: u64,
}

fn parse_args() -> Config {
    let mut c = Config { rom: String::new(), scale: 2, save_interval: 1000 };
    {
        let mut ap = argparse::ArgumentParser::new();
        ap.set_description("DMG emulator");
        ap.refer(&mut c.scale).add_option(
            &["-x", "--scale-factor"],
            argparse::Store,
            "Scale the video by a factor of 1, 2, 4, or 8",
        );
        ap.refer(&mut c.save_interval).add_option(
            &["-s", "--save-interval"],
            argparse::Store,
            "Minimum milliseconds between battery ram saves",
        );
        ap.refer(&mut c.rom).add_argument("rom", argparse::Store, "Rom name");
        ap.parse_args_or_exit();
    }
    c
}

fn power_up(config: &Config, sink: Box<dyn dotmatrix::serial::SerialSink>) -> (MotherBoard, PathBuf) {
    let rom = match std::fs::read(&config.rom) {
        Ok(ok) => ok,
        Err(e) => {
            rog::println!("Can not read {}: {}", config.rom, e);
            std::process::exit(1);
        }
    };
    let sav_path = Path::new(&config.rom).with_extension("sav");
    let ram = std::fs::read(&sav_path).ok();
    match MotherBoard::power_up(rom, ram, config.save_interval, sink) {
        Ok(ok) => (ok, sav_path),
        Err(e) => {
            rog::println!("Can not load {}: {}", config.rom, e);
            std::process::exit(1);
        }
    }
}

// Battery ram goes to disk next to the ROM. A failed write is worth complaining about, but it
// never stops the machine.
fn write_save(mbrd: &mut MotherBoard, sav_path: &Path) {
    if !mbrd.mmu.cartridge.has_battery() {
        return;
    }
    if let Err(e) = std::fs::write(sav_path, mbrd.save_ram()) {
        rog::println!("Can not write {:?}: {}", sav_path, e);
    }
    mbrd.clear_save();
}

#[cfg(feature = "gui")]
fn main() {
    use dotmatrix::joypad::JoypadKey;
    use dotmatrix::ppu::{SCREEN_H, SCREEN_W};
    use dotmatrix::serial::NullSink;
    use std::time::{Duration, Instant};

    rog::reg("dotmatrix");
    rog::reg("dotmatrix::cartridge");

    let config = parse_args();
    let (mut mbrd, sav_path) = power_up(&config, Box::new(NullSink));

    let mut option = minifb::WindowOptions::default();
    option.resize = true;
    option.scale = match config.scale {
        1 => minifb::Scale::X1,
        2 => minifb::Scale::X2,
        4 => minifb::Scale::X4,
        8 => minifb::Scale::X8,
        _ => {
            rog::println!("Supported scale: 1, 2, 4 or 8");
            std::process::exit(1);
        }
    };
    let title = format!("DotMatrix - {}", mbrd.romname());
    let mut window = minifb::Window::new(title.as_str(), SCREEN_W, SCREEN_H, option).unwrap();
    window.update_with_buffer(mbrd.frame()).unwrap();

    // One frame of guest time is 70224 cycles of the 4.194304 MHz clock.
    let frame_time = Duration::from_nanos(16_742_706);
    let mut frame_begin = Instant::now();

    let keys = [
        (minifb::Key::Right, JoypadKey::Right),
        (minifb::Key::Left, JoypadKey::Left),
        (minifb::Key::Up, JoypadKey::Up),
        (minifb::Key::Down, JoypadKey::Down),
        (minifb::Key::Z, JoypadKey::A),
        (minifb::Key::X, JoypadKey::B),
        (minifb::Key::Space, JoypadKey::Select),
        (minifb::Key::Enter, JoypadKey::Start),
    ];

    while window.is_open() && !window.is_key_down(minifb::Key::Escape) {
        mbrd.step(TickMode::PerInstruction);

        if mbrd.check_and_reset_frame_ready() {
            window.update_with_buffer(mbrd.frame()).unwrap();
            for (rk, vk) in &keys {
                if window.is_key_down(*rk) {
                    mbrd.keydown(*vk);
                } else {
                    mbrd.keyup(*vk);
                }
            }
            // Pace to real time; the guest has no idea how fast the host is.
            if let Some(rest) = frame_time.checked_sub(frame_begin.elapsed()) {
                std::thread::sleep(rest);
            }
            frame_begin = Instant::now();
        }

        if mbrd.save_pending() {
            write_save(&mut mbrd, &sav_path);
        }
    }
    write_save(&mut mbrd, &sav_path);
}

// Without a window the machine still runs: serial output goes to stdout, which is exactly the
// channel the hardware conformance ROMs report through.
#[cfg(not(feature = "gui"))]
fn main() {
    use dotmatrix::serial::SerialSink;
    use std::io::Write;

    rog::reg("dotmatrix");
    rog::reg("dotmatrix::cartridge");

    struct StdoutSink;

    impl SerialSink for StdoutSink {
        fn push(&mut self, byte: u8) {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(&[byte]);
            let _ = stdout.flush();
        }
    }

    let config = parse_args();
    let (mut mbrd, sav_path) = power_up(&config, Box::new(StdoutSink));
    loop {
        mbrd.step(TickMode::PerInstruction);
        if mbrd.save_pending() {
            write_save(&mut mbrd, &sav_path);
        }
    }
}
