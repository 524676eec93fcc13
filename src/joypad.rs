// The eight gameboy buttons/direction keys are arranged in form of a 2x4 matrix. Select either
// button or direction keys by writing to this register, then read-out bit 0-3.
//
// FF00 - P1/JOYP - Joypad (R/W)
//
// Bit 7 - Not used (reads 1)
// Bit 6 - Not used (reads 1)
// Bit 5 - P15 Select Button Keys      (0=Select)
// Bit 4 - P14 Select Direction Keys   (0=Select)
// Bit 3 - P13 Input Down  or Start    (0=Pressed) (Read Only)
// Bit 2 - P12 Input Up    or Select   (0=Pressed) (Read Only)
// Bit 1 - P11 Input Left  or Button B (0=Pressed) (Read Only)
// Bit 0 - P10 Input Right or Button A (0=Pressed) (Read Only)
//
// Note: Most programs are repeatedly reading from this port several times (the first reads used
// as short delay, allowing the inputs to stabilize, and only the value from the last read
// actually used).
use super::intf::{Flag, Intf};
use super::memory::Memory;
use std::cell::RefCell;
use std::rc::Rc;

// One bit per physical key in an 8 bit matrix: action group in the low nibble, direction group
// in the high nibble. 0 means pressed, matching the polarity of P1.
#[rustfmt::skip]
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum JoypadKey {
    A      = 0b0000_0001,
    B      = 0b0000_0010,
    Select = 0b0000_0100,
    Start  = 0b0000_1000,
    Right  = 0b0001_0000,
    Left   = 0b0010_0000,
    Up     = 0b0100_0000,
    Down   = 0b1000_0000,
}

const SELECT_ACTION: u8 = 0b0010_0000;
const SELECT_DIRECTION: u8 = 0b0001_0000;
const SELECT_MASK: u8 = SELECT_ACTION | SELECT_DIRECTION;

pub struct Joypad {
    intf: Rc<RefCell<Intf>>,
    matrix: u8,
    // Only bits 5-4 of P1 are writable; the rest of the register is composed on read.
    select: u8,
}

impl Joypad {
    pub fn power_up(intf: Rc<RefCell<Intf>>) -> Self {
        Self { intf, matrix: 0xff, select: SELECT_MASK }
    }

    pub fn keydown(&mut self, key: JoypadKey) {
        if self.matrix & key as u8 == 0x00 {
            return;
        }
        let was_idle = self.matrix == 0xff;
        self.matrix &= !(key as u8);
        // The joypad line only fires on the transition from no key held to a key held, and only
        // while the program has a group selected. Pressing a second key while one is already
        // down does not retrigger it.
        if was_idle && self.select & SELECT_MASK != SELECT_MASK {
            self.intf.borrow_mut().hi(Flag::Joypad);
        }
    }

    pub fn keyup(&mut self, key: JoypadKey) {
        self.matrix |= key as u8;
    }
}

impl Memory for Joypad {
    fn get(&self, a: u16) -> u8 {
        if a != 0xff00 {
            return 0xff;
        }
        let base = 0b1100_0000 | self.select;
        match (self.select & SELECT_ACTION == 0, self.select & SELECT_DIRECTION == 0) {
            // Both groups selected: the two nibbles short together on the matrix lines.
            (true, true) => base | (self.matrix & 0x0f) & (self.matrix >> 4),
            (true, false) => base | (self.matrix & 0x0f),
            (false, true) => base | (self.matrix >> 4),
            (false, false) => base | 0x0f,
        }
    }

    fn set(&mut self, a: u16, v: u8) {
        if a != 0xff00 {
            return;
        }
        self.select = v & SELECT_MASK;
    }
}
