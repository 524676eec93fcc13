// The board that wires the core to the bus and drives time forward. One step runs one CPU
// fetch/execute (or one interrupt dispatch), then advances the Timer, PPU, Serial and the
// cartridge save latch by however many T-cycles the CPU reported. Memory effects of the
// instruction are therefore visible before any subordinate component ticks, and interrupts
// raised while ticking are seen by the CPU at the top of the next step.
use super::cpu::Cpu;
use super::error::Error;
use super::joypad::JoypadKey;
use super::mmu::Mmu;
use super::serial::SerialSink;

// Granularity of the subordinate ticks within one step. PerInstruction hands the whole
// instruction's cycles over at once and is all the conformance ROMs need; PerCycle slices them
// into machine cycles so the timer and PPU observe intra-instruction time.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    PerInstruction,
    PerCycle,
}

pub struct MotherBoard {
    pub mmu: Mmu,
    pub cpu: Cpu,
}

impl MotherBoard {
    pub fn power_up(
        rom: Vec<u8>,
        ram: Option<Vec<u8>>,
        save_interval_ms: u64,
        sink: Box<dyn SerialSink>,
    ) -> Result<Self, Error> {
        Ok(Self { mmu: Mmu::power_up(rom, ram, save_interval_ms, sink)?, cpu: Cpu::power_up() })
    }

    pub fn step(&mut self, mode: TickMode) -> u32 {
        let cycles = self.cpu.next(&mut self.mmu);
        // STOP freezes the divider with the core.
        self.mmu.timer.stopped = self.cpu.stopped;
        match mode {
            TickMode::PerInstruction => self.mmu.next(cycles),
            TickMode::PerCycle => {
                let mut rest = cycles;
                while rest > 0 {
                    let step = rest.min(4);
                    self.mmu.next(step);
                    rest -= step;
                }
            }
        }
        cycles
    }

    // Frame latch handshake: true at most once per 70224 cycles of PPU time.
    pub fn check_and_reset_frame_ready(&mut self) -> bool {
        let r = self.mmu.ppu.frame_ready;
        self.mmu.ppu.frame_ready = false;
        r
    }

    // 160x144 opaque ARGB pixels, row major, top down.
    pub fn frame(&self) -> &[u32] {
        &self.mmu.ppu.data
    }

    pub fn keydown(&mut self, key: JoypadKey) {
        self.mmu.joypad.keydown(key);
    }

    pub fn keyup(&mut self, key: JoypadKey) {
        self.mmu.joypad.keyup(key);
    }

    pub fn romname(&self) -> String {
        self.mmu.cartridge.title()
    }

    // Battery save handshake, forwarded from the cartridge.
    pub fn save_pending(&self) -> bool {
        self.mmu.cartridge.save_pending()
    }

    pub fn save_ram(&self) -> &[u8] {
        self.mmu.cartridge.ram()
    }

    pub fn clear_save(&mut self) {
        self.mmu.cartridge.clear_save()
    }
}
