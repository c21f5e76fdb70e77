// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The AES engine handle.
//!
//! There is one execution unit and one key register, so every request takes
//! the engine lock for its whole duration: key reload, IV load and all of its
//! bursts. The lock is a critical section, which on a single core masks
//! interrupts for the length of the request. A request therefore holds it for
//! at most the number of bursts times the poll budget.

use {
    crate::{
        burst::POLL_BUDGET,
        cbc::{self, Direction, Iv, Key, Span},
        dma::DmaMapper,
        error::{Error, Result},
        regs::{EngineRegs, RegisterWindow},
        selftest,
    },
    core::cell::RefCell,
    critical_section::Mutex,
};

struct Inner<W, M> {
    regs: EngineRegs<W>,
    mapper: M,
    /// Key currently held by the key register.
    loaded_key: Option<Key>,
}

impl<W: RegisterWindow, M> Inner<W, M> {
    fn load_key(&mut self, key: &Key) {
        if self.loaded_key.as_ref() != Some(key) {
            log::trace!("loading key");
            self.regs.write_key(key);
            self.loaded_key = Some(*key);
        }
    }
}

pub struct Engine<W, M> {
    inner: Mutex<RefCell<Inner<W, M>>>,
    poll_budget: u32,
}

impl<W: RegisterWindow, M: DmaMapper> Engine<W, M> {
    /// Attaches to the engine behind `window` and resets it.
    pub fn new(window: W, mapper: M) -> Self {
        let mut regs = EngineRegs::new(window);
        regs.reset();
        log::info!("Latte AES engine enabled");

        Self {
            inner: Mutex::new(RefCell::new(Inner {
                regs,
                mapper,
                loaded_key: None,
            })),
            poll_budget: POLL_BUDGET,
        }
    }

    /// Sets the number of status reads after which a burst times out.
    pub fn with_poll_budget(mut self, poll_budget: u32) -> Self {
        self.poll_budget = poll_budget.max(1);
        self
    }

    pub fn poll_budget(&self) -> u32 {
        self.poll_budget
    }

    /// Resets the engine and returns the register window and the mapper.
    pub fn detach(self) -> (W, M) {
        let Inner {
            mut regs, mapper, ..
        } = self.inner.into_inner().into_inner();
        regs.reset();
        log::info!("Latte AES engine detached");
        (regs.into_inner(), mapper)
    }

    /// Stops the engine, e.g. after [`Error::EngineTimeout`]. The key register
    /// is left as is.
    pub fn reset(&self) -> Result<()> {
        self.with_locked(|inner| {
            log::warn!("resetting AES engine");
            inner.regs.reset();
            Ok(())
        })
    }

    /// Runs the known-answer test. Sessions reload their key afterwards.
    pub fn self_test(&self) -> Result<()> {
        selftest::run(self)
    }

    /// Runs `f` with exclusive access to the engine.
    fn with_locked<R>(&self, f: impl FnOnce(&mut Inner<W, M>) -> Result<R>) -> Result<R> {
        critical_section::with(|cs| {
            let mut inner = self
                .inner
                .borrow(cs)
                .try_borrow_mut()
                .map_err(|_| Error::EngineBusy)?;
            f(&mut inner)
        })
    }

    pub(crate) fn install_key(&self, key: &Key) -> Result<()> {
        self.with_locked(|inner| {
            inner.regs.write_key(key);
            inner.loaded_key = Some(*key);
            Ok(())
        })
    }

    pub(crate) fn process(
        &self,
        key: &Key,
        direction: Direction,
        pieces: &mut [Span<'_>],
        iv: &Iv,
    ) -> Result<Iv> {
        if cbc::request_len(pieces)? == 0 {
            return Ok(*iv);
        }

        let poll_budget = self.poll_budget;
        self.with_locked(|inner| {
            inner.regs.reset();
            inner.load_key(key);

            let Inner { regs, mapper, .. } = inner;
            cbc::process(regs, mapper, poll_budget, direction, pieces, iv)
        })
    }

    #[cfg(test)]
    fn with_window<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        critical_section::with(|cs| f(self.inner.borrow(cs).borrow().regs.window()))
    }
}
