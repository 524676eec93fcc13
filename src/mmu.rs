// A memory management unit (MMU), sometimes called paged memory management unit (PMMU), is a
// computer hardware unit having all memory references passed through itself. Here it is the
// 16 bit address space router: every CPU access lands on the cartridge, a RAM, or one of the
// memory mapped I/O components, and the access rules of the video hardware (VRAM and OAM locks,
// the OAM DMA blackout) are enforced on the CPU facing path only - the PPU and the DMA engine
// read around them.
use super::apu::Apu;
use super::cartridge::Cartridge;
use super::error::Error;
use super::intf::Intf;
use super::joypad::Joypad;
use super::memory::Memory;
use super::ppu::{Mode, Ppu};
use super::serial::{Serial, SerialSink};
use super::timer::Timer;
use std::cell::RefCell;
use std::rc::Rc;

// An OAM DMA transfer copies its 160 bytes up front, but the bus stays blocked for the full 160
// machine cycles the real transfer engine needs; only HRAM remains reachable, which is why games
// park their wait loop there.
const DMA_CYCLES: u32 = 640;

pub struct Mmu {
    pub cartridge: Box<dyn Cartridge>,
    pub apu: Apu,
    pub ppu: Ppu,
    pub joypad: Joypad,
    pub serial: Serial,
    pub timer: Timer,
    pub intf: Rc<RefCell<Intf>>,
    inte: u8,
    wram: [u8; 0x2000],
    hram: [u8; 0x7f],
    // Last value written to FF46, readable back, and the remaining blackout.
    dma: u8,
    dma_cycles: u32,
    // Observation hook for tests: sees every CPU initiated I/O write before it is routed.
    io_hook: Option<Box<dyn FnMut(u16, u8)>>,
}

impl Mmu {
    pub fn power_up(
        rom: Vec<u8>,
        ram: Option<Vec<u8>>,
        save_interval_ms: u64,
        sink: Box<dyn SerialSink>,
    ) -> Result<Self, Error> {
        let cartridge = super::cartridge::power_up(rom, ram, save_interval_ms)?;
        let intf = Rc::new(RefCell::new(Intf::power_up()));
        let mut r = Self {
            cartridge,
            apu: Apu::power_up(),
            ppu: Ppu::power_up(intf.clone()),
            joypad: Joypad::power_up(intf.clone()),
            serial: Serial::power_up(intf.clone(), sink),
            timer: Timer::power_up(intf.clone()),
            intf,
            inte: 0x00,
            wram: [0x00; 0x2000],
            hram: [0x00; 0x7f],
            dma: 0x00,
            dma_cycles: 0,
            io_hook: None,
        };
        // Register contents left behind by the boot ROM.
        r.set(0xff10, 0x80);
        r.set(0xff11, 0xbf);
        r.set(0xff12, 0xf3);
        r.set(0xff14, 0xbf);
        r.set(0xff16, 0x3f);
        r.set(0xff17, 0x00);
        r.set(0xff19, 0xbf);
        r.set(0xff1a, 0x7f);
        r.set(0xff1b, 0xff);
        r.set(0xff1c, 0x9f);
        r.set(0xff1e, 0xbf);
        r.set(0xff20, 0xff);
        r.set(0xff21, 0x00);
        r.set(0xff22, 0x00);
        r.set(0xff23, 0xbf);
        r.set(0xff24, 0x77);
        r.set(0xff25, 0xf3);
        r.set(0xff26, 0xf1);
        r.set(0xff40, 0x91);
        r.set(0xff42, 0x00);
        r.set(0xff43, 0x00);
        r.set(0xff45, 0x00);
        r.set(0xff47, 0xfc);
        r.set(0xff48, 0xff);
        r.set(0xff49, 0xff);
        r.set(0xff4a, 0x00);
        r.set(0xff4b, 0x00);
        Ok(r)
    }

    pub fn set_io_hook(&mut self, hook: Box<dyn FnMut(u16, u8)>) {
        self.io_hook = Some(hook);
    }

    // Advance every subordinate component by the cycles one instruction consumed. The CPU's
    // memory effects are already visible at this point, and the order is fixed: a timer
    // interrupt raised at cycle C is in IF before the PPU or serial get to run their share.
    pub fn next(&mut self, cycles: u32) {
        self.timer.next(cycles);
        self.ppu.next(cycles);
        self.serial.next(cycles);
        self.cartridge.tick();
        self.dma_cycles = self.dma_cycles.saturating_sub(cycles);
    }

    fn vram_locked(&self) -> bool {
        self.ppu.mode() == Mode::Transfer
    }

    fn oam_locked(&self) -> bool {
        matches!(self.ppu.mode(), Mode::OamScan | Mode::Transfer) || self.dma_cycles > 0
    }

    // Writing to FF46 launches a DMA transfer from ROM or RAM to OAM memory (sprite attribute
    // table). The copy itself is immediate; the blackout window is counted down by next().
    fn run_dma(&mut self, v: u8) {
        self.dma = v;
        let base = u16::from(v) << 8;
        for i in 0..0xa0 {
            let b = self.get(base + i);
            self.ppu.set(0xfe00 + i, b);
        }
        self.dma_cycles = DMA_CYCLES;
    }
}

impl Memory for Mmu {
    fn get(&self, a: u16) -> u8 {
        match a {
            0x0000..=0x7fff => self.cartridge.get(a),
            0x8000..=0x9fff => {
                if self.vram_locked() {
                    0xff
                } else {
                    self.ppu.get(a)
                }
            }
            0xa000..=0xbfff => self.cartridge.get(a),
            0xc000..=0xdfff => self.wram[a as usize - 0xc000],
            0xe000..=0xfdff => self.wram[a as usize - 0xe000],
            0xfe00..=0xfe9f => {
                if self.oam_locked() {
                    0xff
                } else {
                    self.ppu.get(a)
                }
            }
            0xfea0..=0xfeff => 0xff,
            0xff00 => self.joypad.get(a),
            0xff01..=0xff02 => self.serial.get(a),
            0xff04..=0xff07 => self.timer.get(a),
            0xff0f => 0xe0 | self.intf.borrow().data,
            0xff10..=0xff3f => self.apu.get(a),
            0xff40..=0xff45 | 0xff47..=0xff4b => self.ppu.get(a),
            0xff46 => self.dma,
            0xff80..=0xfffe => self.hram[a as usize - 0xff80],
            0xffff => self.inte,
            _ => 0xff,
        }
    }

    fn set(&mut self, a: u16, v: u8) {
        if let 0xff00..=0xff7f = a {
            if let Some(hook) = self.io_hook.as_mut() {
                hook(a, v);
            }
        }
        match a {
            0x0000..=0x7fff => self.cartridge.set(a, v),
            0x8000..=0x9fff => {
                if !self.vram_locked() {
                    self.ppu.set(a, v);
                }
            }
            0xa000..=0xbfff => self.cartridge.set(a, v),
            0xc000..=0xdfff => self.wram[a as usize - 0xc000] = v,
            0xe000..=0xfdff => self.wram[a as usize - 0xe000] = v,
            0xfe00..=0xfe9f => {
                if !self.oam_locked() {
                    self.ppu.set(a, v);
                }
            }
            0xfea0..=0xfeff => {}
            0xff00 => self.joypad.set(a, v),
            0xff01..=0xff02 => self.serial.set(a, v),
            0xff04..=0xff07 => self.timer.set(a, v),
            0xff0f => self.intf.borrow_mut().data = v & 0x1f,
            0xff10..=0xff3f => self.apu.set(a, v),
            0xff40..=0xff45 | 0xff47..=0xff4b => self.ppu.set(a, v),
            0xff46 => self.run_dma(v),
            0xff80..=0xfffe => self.hram[a as usize - 0xff80] = v,
            0xffff => self.inte = v,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::memory::Memory;
    use super::super::ppu::Mode;
    use super::super::serial::NullSink;
    use super::Mmu;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn mmu() -> Mmu {
        // Minimal valid 32KB ROM-only image.
        let mut rom = vec![0x00; 0x8000];
        let mut cks: u8 = 0;
        for i in 0x0134..0x014d {
            cks = cks.wrapping_sub(rom[i]).wrapping_sub(1);
        }
        rom[0x014d] = cks;
        Mmu::power_up(rom, None, 0, Box::new(NullSink)).unwrap()
    }

    #[test]
    fn echo_mirrors_work_ram_both_ways() {
        let mut m = mmu();
        m.set(0xc123, 0x55);
        assert_eq!(m.get(0xe123), 0x55);
        m.set(0xfdff, 0xaa);
        assert_eq!(m.get(0xddff), 0xaa);
        for a in 0xe000..=0xfdffu16 {
            assert_eq!(m.get(a), m.get(a - 0x2000));
        }
    }

    #[test]
    fn unusable_region_reads_open_bus_and_swallows_writes() {
        let mut m = mmu();
        for a in 0xfea0..=0xfeffu16 {
            m.set(a, 0x12);
            assert_eq!(m.get(a), 0xff);
        }
    }

    #[test]
    fn vram_is_locked_during_transfer() {
        let mut m = mmu();
        // HBlank at power up? Advance into Transfer.
        m.ppu.next(80);
        assert_eq!(m.ppu.mode(), Mode::Transfer);
        m.set(0x8000, 0x42);
        assert_eq!(m.get(0x8000), 0xff);
        // Into HBlank: access restored, and the locked write never landed.
        m.ppu.next(172);
        assert_eq!(m.ppu.mode(), Mode::HBlank);
        assert_eq!(m.get(0x8000), 0x00);
        m.set(0x8000, 0x42);
        assert_eq!(m.get(0x8000), 0x42);
    }

    #[test]
    fn oam_is_locked_during_scan_and_transfer() {
        let mut m = mmu();
        assert_eq!(m.ppu.mode(), Mode::OamScan);
        m.set(0xfe00, 0x42);
        assert_eq!(m.get(0xfe00), 0xff);
        m.ppu.next(80 + 172);
        assert_eq!(m.ppu.mode(), Mode::HBlank);
        m.set(0xfe00, 0x42);
        assert_eq!(m.get(0xfe00), 0x42);
    }

    #[test]
    fn oam_dma_copies_and_blacks_out_the_table() {
        let mut m = mmu();
        // Park the PPU so its own locks do not interfere.
        m.set(0xff40, 0x00);
        for i in 0..0xa0u16 {
            m.set(0xc000 + i, i as u8);
        }
        m.set(0xff46, 0xc0);
        assert_eq!(m.get(0xff46), 0xc0);
        // The copy happened, but the CPU cannot see OAM for 640 cycles.
        assert_eq!(m.get(0xfe00), 0xff);
        m.set(0xfe10, 0x99);
        m.next(636);
        assert_eq!(m.get(0xfe9f), 0xff);
        m.next(4);
        assert_eq!(m.get(0xfe00), 0x00);
        assert_eq!(m.get(0xfe10), 0x10);
        assert_eq!(m.get(0xfe9f), 0x9f);
    }

    #[test]
    fn hram_stays_reachable_during_dma() {
        let mut m = mmu();
        m.set(0xff80, 0x7b);
        m.set(0xff46, 0xc0);
        assert_eq!(m.get(0xff80), 0x7b);
        m.set(0xff81, 0x3c);
        assert_eq!(m.get(0xff81), 0x3c);
    }

    #[test]
    fn io_hook_sees_every_io_write() {
        let mut m = mmu();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        m.set_io_hook(Box::new(move |a, v| log.borrow_mut().push((a, v))));
        m.set(0xff01, b'A');
        m.set(0xff02, 0x81);
        m.set(0xc000, 0x42); // not I/O, not seen
        assert_eq!(*seen.borrow(), vec![(0xff01, b'A'), (0xff02, 0x81)]);
    }

    #[test]
    fn interrupt_registers_read_back() {
        let mut m = mmu();
        assert_eq!(m.get(0xff0f), 0xe0);
        m.set(0xff0f, 0x1f);
        assert_eq!(m.get(0xff0f), 0xff);
        m.set(0xffff, 0x15);
        assert_eq!(m.get(0xffff), 0x15);
    }

    #[test]
    fn work_and_high_ram_round_trip() {
        let mut m = mmu();
        m.set(0xc000, 0x01);
        m.set(0xdfff, 0x02);
        m.set(0xff80, 0x03);
        m.set(0xfffe, 0x04);
        assert_eq!(m.get(0xc000), 0x01);
        assert_eq!(m.get(0xdfff), 0x02);
        assert_eq!(m.get(0xff80), 0x03);
        assert_eq!(m.get(0xfffe), 0x04);
    }

    #[test]
    fn ticking_orders_timer_before_ppu() {
        let mut m = mmu();
        // A full frame of ticking leaves both a VBlank and, with the timer armed, a timer flag.
        m.set(0xff07, 0x05);
        m.next(70224);
        let intf = m.intf.borrow().data;
        assert_eq!(intf & 0x01, 0x01);
        assert_eq!(intf & 0x04, 0x04);
    }
}
