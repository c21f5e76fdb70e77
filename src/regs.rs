// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Latte AES engine registers.
//!
//! The engine exposes five big-endian 32-bit registers. The key and IV
//! registers are FIFOs: a 128-bit value is loaded by writing its four words,
//! most significant first, to the same offset.

use {
    crate::cbc::{Direction, Iv, Key},
    bitflags::bitflags,
};

pub const HW_AES_BASE: usize = 0x0D02_0000;

pub const CTRL_OFFSET: usize = 0x00;
pub const SRC_OFFSET: usize = 0x04;
pub const DEST_OFFSET: usize = 0x08;
pub const KEY_OFFSET: usize = 0x0C;
pub const IV_OFFSET: usize = 0x10;

/// Largest value of the `BLOCK` field, which holds the burst length in blocks
/// minus one.
pub const MAX_BLOCK_FIELD: u32 = 0xFFF;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Execute. Writing 1 starts a burst, reads back 1 while the engine is busy.
        const EXEC  = 1 << 31;

        /// Interrupt on completion (not used, completion is polled)
        const IRQ   = 1 << 30;

        /// Error
        const ERR   = 1 << 29;

        /// Enable
        const ENA   = 1 << 28;

        /// Decrypt (0 means encrypt)
        const DEC   = 1 << 27;

        /// Chain from the engine's internal state instead of loading the IV register
        const IV    = 1 << 12;

        /// Burst length in blocks, minus one
        const BLOCK = MAX_BLOCK_FIELD;
    }
}

/// Raw access to the engine's register window.
///
/// Values are register values; implementations take care of the bus byte
/// order.
pub trait RegisterWindow {
    fn read(&mut self, offset: usize) -> u32;
    fn write(&mut self, offset: usize, value: u32);
}

/// Memory-mapped register window.
pub struct Mmio {
    base_addr: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// The engine must be mapped at [`HW_AES_BASE`] and nothing else may access it
    /// while the returned window exists.
    pub unsafe fn new() -> Self {
        Self {
            base_addr: HW_AES_BASE,
        }
    }

    /// Creates the window at a different base address. Used with virtual memory
    ///
    /// # Safety
    ///
    /// Same as [`Mmio::new`], for `base_addr`.
    pub unsafe fn with_alt_base_addr(base_addr: usize) -> Self {
        Self { base_addr }
    }
}

impl RegisterWindow for Mmio {
    fn read(&mut self, offset: usize) -> u32 {
        let ptr = (self.base_addr + offset) as *const u32;
        u32::from_be(unsafe { ptr.read_volatile() })
    }

    fn write(&mut self, offset: usize, value: u32) {
        let ptr = (self.base_addr + offset) as *mut u32;
        unsafe { ptr.write_volatile(value.to_be()) }
    }
}

/// Snapshot of the control register taken by [`EngineRegs::poll_done`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Status {
    pub done: bool,
    pub error: bool,
}

/// Typed operations on the engine registers.
pub struct EngineRegs<W> {
    window: W,
}

impl<W: RegisterWindow> EngineRegs<W> {
    pub fn new(window: W) -> Self {
        Self { window }
    }

    pub fn into_inner(self) -> W {
        self.window
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    fn write_field(&mut self, offset: usize, value: &[u8; 16]) {
        for word in value.chunks_exact(4) {
            let word = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
            self.window.write(offset, word);
        }
    }

    pub fn write_key(&mut self, key: &Key) {
        self.write_field(KEY_OFFSET, &key.0);
    }

    pub fn write_iv(&mut self, iv: &Iv) {
        self.write_field(IV_OFFSET, &iv.0);
    }

    pub fn set_addresses(&mut self, src: u32, dst: u32) {
        self.window.write(SRC_OFFSET, src);
        self.window.write(DEST_OFFSET, dst);
    }

    /// Starts a burst of `blocks` blocks (1 to 4096).
    ///
    /// With `continue_chaining` clear the engine loads the IV register, with
    /// it set the engine chains from the last block of the previous burst.
    pub fn start(&mut self, blocks: u32, direction: Direction, continue_chaining: bool) {
        debug_assert!((1..=MAX_BLOCK_FIELD + 1).contains(&blocks));

        let mut ctrl = Control::EXEC | Control::ENA;
        if direction == Direction::Decrypt {
            ctrl |= Control::DEC;
        }
        if continue_chaining {
            ctrl |= Control::IV;
        }

        let count = blocks.saturating_sub(1) & Control::BLOCK.bits();
        self.window.write(CTRL_OFFSET, ctrl.bits() | count);
    }

    pub fn poll_done(&mut self) -> Status {
        let ctrl = Control::from_bits_truncate(self.window.read(CTRL_OFFSET));
        Status {
            done: !ctrl.contains(Control::EXEC),
            error: ctrl.contains(Control::ERR),
        }
    }

    /// Stops the engine and clears the control register.
    pub fn reset(&mut self) {
        self.window.write(CTRL_OFFSET, 0);
    }
}
