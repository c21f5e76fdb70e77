// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-128-CBC cipher sessions.
//!
//! A session holds a key and a reference to the engine it runs on. Any number
//! of sessions can share one engine; their requests are serialized by the
//! engine lock and each request reloads the session's key if another session
//! changed it in between.

use crate::{
    cbc::{Direction, Iv, Key, Span},
    dma::DmaMapper,
    engine::Engine,
    error::{Error, Result},
    regs::RegisterWindow,
};

pub struct Session<'e, W, M> {
    engine: &'e Engine<W, M>,
    key: Option<Key>,
}

impl<'e, W: RegisterWindow, M: DmaMapper> Session<'e, W, M> {
    pub fn bind(engine: &'e Engine<W, M>) -> Self {
        Self { engine, key: None }
    }

    pub fn engine(&self) -> &'e Engine<W, M> {
        self.engine
    }

    /// Installs a 128-bit key and writes it to the key register.
    ///
    /// Any other length is rejected with [`Error::InvalidKeyLength`] and leaves
    /// both the session and the engine untouched.
    pub fn install_key(&mut self, key: &[u8]) -> Result<()> {
        let key = Key::try_from(key).map_err(|err| {
            log::debug!("rejecting {}-byte key", key.len());
            err
        })?;

        self.engine.install_key(&key)?;
        self.key = Some(key);
        Ok(())
    }

    /// Encrypts or decrypts `pieces` as one message and returns the IV that
    /// continues the chain in a later request.
    pub fn process(&self, direction: Direction, pieces: &mut [Span<'_>], iv: &Iv) -> Result<Iv> {
        let key = self.key.as_ref().ok_or(Error::NoKey)?;
        self.engine.process(key, direction, pieces, iv)
    }

    pub fn encrypt(&self, src: &[u8], dst: &mut [u8], iv: &Iv) -> Result<Iv> {
        self.process(Direction::Encrypt, &mut [Span::disjoint(src, dst)?], iv)
    }

    pub fn decrypt(&self, src: &[u8], dst: &mut [u8], iv: &Iv) -> Result<Iv> {
        self.process(Direction::Decrypt, &mut [Span::disjoint(src, dst)?], iv)
    }

    pub fn encrypt_in_place(&self, buf: &mut [u8], iv: &Iv) -> Result<Iv> {
        self.process(Direction::Encrypt, &mut [Span::InPlace(buf)], iv)
    }

    pub fn decrypt_in_place(&self, buf: &mut [u8], iv: &Iv) -> Result<Iv> {
        self.process(Direction::Decrypt, &mut [Span::InPlace(buf)], iv)
    }
}
