// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Burst execution.
//!
//! The engine processes at most [`MAX_BURST_BLOCKS`] blocks per start. A chunk
//! of any block-aligned length is split into bursts that run back to back,
//! each one polled to completion before the next is programmed.

use {
    crate::{
        cbc::{Direction, Span, BLOCK_SIZE},
        dma::{DmaDirection, DmaMapper, Mapping},
        error::{Error, Result},
        regs::{EngineRegs, RegisterWindow, MAX_BLOCK_FIELD},
    },
    core::sync::atomic::{compiler_fence, Ordering::SeqCst},
};

pub const MAX_BURST_BLOCKS: u32 = MAX_BLOCK_FIELD + 1;

/// Default number of status reads before a burst is declared timed out.
pub const POLL_BUDGET: u32 = 0x1000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Burst {
    /// Byte offset from the start of the chunk.
    pub offset: usize,
    pub blocks: u32,
}

/// Splits a chunk into bursts, in order.
#[derive(Debug, Clone)]
pub struct Bursts {
    remaining: usize,
    offset: usize,
}

impl Bursts {
    /// Trailing bytes that do not fill a block are ignored.
    pub fn new(len: usize) -> Self {
        Self {
            remaining: len / BLOCK_SIZE,
            offset: 0,
        }
    }
}

impl Iterator for Bursts {
    type Item = Burst;

    fn next(&mut self) -> Option<Burst> {
        if self.remaining == 0 {
            return None;
        }

        let field = (self.remaining - 1).min(MAX_BLOCK_FIELD as usize);
        let blocks = field + 1;
        let burst = Burst {
            offset: self.offset,
            blocks: blocks as u32,
        };

        self.offset += blocks * BLOCK_SIZE;
        self.remaining -= blocks;
        Some(burst)
    }
}

/// Runs one chunk on the engine.
///
/// The chunk is mapped for DMA for the duration of the call and unmapped on
/// every exit path. `continue_chaining` applies to the first burst only,
/// later bursts always chain from the engine's internal state.
pub(crate) fn run<W: RegisterWindow, M: DmaMapper>(
    regs: &mut EngineRegs<W>,
    mapper: &M,
    span: &mut Span<'_>,
    direction: Direction,
    continue_chaining: bool,
    poll_budget: u32,
) -> Result<()> {
    let len = span.len();
    if len % BLOCK_SIZE != 0 {
        return Err(Error::InvalidLength);
    }
    if len == 0 {
        return Ok(());
    }

    let src_map;
    let dst_map;
    let (src_addr, dst_addr) = match span {
        Span::InPlace(buf) => {
            src_map = Mapping::new(mapper, buf.as_mut_ptr(), len, DmaDirection::Bidirectional)?;
            dst_map = None;
            (src_map.bus_addr(), src_map.bus_addr())
        }
        Span::Disjoint { src, dst } => {
            src_map = Mapping::new(mapper, src.as_ptr(), len, DmaDirection::ToDevice)?;
            let map = Mapping::new(mapper, dst.as_mut_ptr(), len, DmaDirection::FromDevice)?;
            let dst_addr = map.bus_addr();
            dst_map = Some(map);
            (src_map.bus_addr(), dst_addr)
        }
    };

    // Last byte of both mappings must be addressable on the 32-bit bus.
    let last = u32::try_from(len - 1).map_err(|_| Error::BufferMapping)?;
    if src_addr.checked_add(last).is_none() || dst_addr.checked_add(last).is_none() {
        log::warn!(
            "mapping {:#010x}/{:#010x} + {:#x} runs past the bus",
            src_addr,
            dst_addr,
            len
        );
        return Err(Error::BufferMapping);
    }

    let mut continue_chaining = continue_chaining;
    for burst in Bursts::new(len) {
        let offset = burst.offset as u32;
        log::trace!(
            "burst {:#010x} -> {:#010x}, {} blocks",
            src_addr + offset,
            dst_addr + offset,
            burst.blocks
        );

        regs.set_addresses(src_addr + offset, dst_addr + offset);
        compiler_fence(SeqCst);
        regs.start(burst.blocks, direction, continue_chaining);
        wait_done(regs, poll_budget).map_err(|err| {
            log::error!("burst at offset {:#x} failed: {}", burst.offset, err);
            err
        })?;
        compiler_fence(SeqCst);

        continue_chaining = true;
    }

    drop(dst_map);
    drop(src_map);
    Ok(())
}

fn wait_done<W: RegisterWindow>(regs: &mut EngineRegs<W>, poll_budget: u32) -> Result<()> {
    for _ in 0..poll_budget {
        let status = regs.poll_done();
        if status.done {
            return if status.error {
                Err(Error::EngineFault)
            } else {
                Ok(())
            };
        }
        core::hint::spin_loop();
    }

    Err(Error::EngineTimeout)
}
