// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-128 in CBC mode on top of the burst executor.
//!
//! A request is a list of pieces. The block-aligned part of each piece goes to
//! the engine as is. Bytes of a block that straddles two or more pieces are
//! gathered into a bounce block, processed in place, and scattered back.
//!
//! Only the first chunk of a request loads the IV register. Every later chunk
//! continues from the chaining state the engine keeps internally. The IV for a
//! follow-up request is the last ciphertext block, captured from the source
//! before a decrypt (it may be overwritten in place) and from the destination
//! after an encrypt.

use {
    crate::{
        burst,
        dma::{Buffer, DmaMapper},
        error::{Error, Result},
        regs::{EngineRegs, RegisterWindow},
    },
    core::ops::Range,
};

pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;
pub const IV_SIZE: usize = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Key(pub [u8; KEY_SIZE]);

impl TryFrom<&[u8]> for Key {
    type Error = Error;

    fn try_from(key: &[u8]) -> Result<Self> {
        let key = key.try_into().map_err(|_| Error::InvalidKeyLength)?;
        Ok(Key(key))
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Iv(pub [u8; IV_SIZE]);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// One piece of a request.
#[derive(Debug)]
pub enum Span<'a> {
    /// Output overwrites the input.
    InPlace(&'a mut [u8]),
    /// Output goes to a separate buffer of the same length.
    Disjoint { src: &'a [u8], dst: &'a mut [u8] },
}

impl<'a> Span<'a> {
    pub fn disjoint(src: &'a [u8], dst: &'a mut [u8]) -> Result<Self> {
        if src.len() != dst.len() {
            return Err(Error::InvalidLength);
        }
        Ok(Span::Disjoint { src, dst })
    }

    pub fn len(&self) -> usize {
        match self {
            Span::InPlace(buf) => buf.len(),
            Span::Disjoint { src, .. } => src.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_valid(&self) -> bool {
        match self {
            Span::InPlace(_) => true,
            Span::Disjoint { src, dst } => src.len() == dst.len(),
        }
    }

    fn src(&self) -> &[u8] {
        match self {
            Span::InPlace(buf) => buf,
            Span::Disjoint { src, .. } => src,
        }
    }

    fn dst(&self) -> &[u8] {
        match self {
            Span::InPlace(buf) => buf,
            Span::Disjoint { dst, .. } => dst,
        }
    }

    fn dst_mut(&mut self) -> &mut [u8] {
        match self {
            Span::InPlace(buf) => buf,
            Span::Disjoint { dst, .. } => dst,
        }
    }

    fn slice(&mut self, range: Range<usize>) -> Span<'_> {
        match self {
            Span::InPlace(buf) => Span::InPlace(&mut buf[range]),
            Span::Disjoint { src, dst } => Span::Disjoint {
                src: &src[range.clone()],
                dst: &mut dst[range],
            },
        }
    }
}

/// Checks the request shape and returns its total length in bytes.
pub(crate) fn request_len(pieces: &[Span<'_>]) -> Result<usize> {
    if !pieces.iter().all(Span::is_valid) {
        return Err(Error::InvalidLength);
    }

    let total = pieces.iter().map(Span::len).sum::<usize>();
    if total % BLOCK_SIZE != 0 {
        return Err(Error::InvalidLength);
    }
    Ok(total)
}

/// Runs a whole request. The caller holds the engine lock and has loaded the
/// key.
pub(crate) fn process<W: RegisterWindow, M: DmaMapper>(
    regs: &mut EngineRegs<W>,
    mapper: &M,
    poll_budget: u32,
    direction: Direction,
    pieces: &mut [Span<'_>],
    iv: &Iv,
) -> Result<Iv> {
    let total = request_len(pieces)?;
    if total == 0 {
        return Ok(*iv);
    }

    let mut chain = Chain {
        regs,
        mapper,
        poll_budget,
        direction,
        iv: *iv,
        first: true,
        total,
        done: 0,
    };
    let mut bounce = Bounce::default();

    for index in 0..pieces.len() {
        let len = pieces[index].len();
        let mut offset = 0;

        if !bounce.is_empty() {
            offset = bounce.gather(&pieces[index], index, 0);
            if bounce.is_full() {
                chain.run_chunk(&mut Span::InPlace(&mut bounce.block.0))?;
                bounce.scatter(pieces);
            }
        }

        let aligned = (len - offset) / BLOCK_SIZE * BLOCK_SIZE;
        if aligned > 0 {
            chain.run_chunk(&mut pieces[index].slice(offset..offset + aligned))?;
            offset += aligned;
        }

        if offset < len {
            bounce.gather(&pieces[index], index, offset);
        }
    }

    debug_assert!(bounce.is_empty());
    debug_assert_eq!(chain.done, total);
    Ok(chain.iv)
}

struct Chain<'a, W, M> {
    regs: &'a mut EngineRegs<W>,
    mapper: &'a M,
    poll_budget: u32,
    direction: Direction,
    /// IV for the first chunk, then the IV handed back to the caller.
    iv: Iv,
    first: bool,
    total: usize,
    done: usize,
}

impl<W: RegisterWindow, M: DmaMapper> Chain<'_, W, M> {
    fn run_chunk(&mut self, span: &mut Span<'_>) -> Result<()> {
        let len = span.len();
        let last = self.done + len == self.total;

        if self.first {
            self.regs.write_iv(&self.iv);
        }

        // Must happen before the engine overwrites an in-place source.
        if last && self.direction == Direction::Decrypt {
            self.iv.0.copy_from_slice(&span.src()[len - IV_SIZE..]);
        }

        burst::run(
            self.regs,
            self.mapper,
            span,
            self.direction,
            !self.first,
            self.poll_budget,
        )?;
        self.first = false;
        self.done += len;

        if last && self.direction == Direction::Encrypt {
            self.iv.0.copy_from_slice(&span.dst()[len - IV_SIZE..]);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Copy, Clone)]
struct Fragment {
    piece: usize,
    offset: usize,
    len: usize,
}

/// A block assembled from pieces that do not end on a block boundary.
#[derive(Default)]
struct Bounce {
    block: Buffer<BLOCK_SIZE>,
    filled: usize,
    fragments: [Fragment; BLOCK_SIZE],
    count: usize,
}

impl Bounce {
    fn is_empty(&self) -> bool {
        self.filled == 0
    }

    fn is_full(&self) -> bool {
        self.filled == BLOCK_SIZE
    }

    /// Copies as many bytes as still fit from `piece[offset..]`. Returns the
    /// number of bytes taken.
    fn gather(&mut self, piece: &Span<'_>, index: usize, offset: usize) -> usize {
        let len = (BLOCK_SIZE - self.filled).min(piece.len() - offset);
        if len == 0 {
            return 0;
        }

        self.block.0[self.filled..self.filled + len]
            .copy_from_slice(&piece.src()[offset..offset + len]);
        self.fragments[self.count] = Fragment {
            piece: index,
            offset,
            len,
        };
        self.count += 1;
        self.filled += len;
        len
    }

    fn scatter(&mut self, pieces: &mut [Span<'_>]) {
        let mut at = 0;
        for fragment in &self.fragments[..self.count] {
            let range = fragment.offset..fragment.offset + fragment.len;
            pieces[fragment.piece].dst_mut()[range]
                .copy_from_slice(&self.block.0[at..at + fragment.len]);
            at += fragment.len;
        }
        self.filled = 0;
        self.count = 0;
    }
}
