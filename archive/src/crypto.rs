//! Symmetric decryption of archive streams.
//!
//! Encrypted archives are the plain zip bytes run through AES in ECB mode
//! with PKCS#7 padding, keyed by the raw bytes of a key file. The key size
//! picks the AES variant (16, 24, or 32 bytes). Decryption is a streaming
//! [`Read`] adapter: it decrypts one chunk at a time and holds back only the
//! final block until it knows whether that block carries the padding.

use crate::error::{ArchiveError, Result};
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Number of blocks pulled from the inner reader per refill.
const CHUNK_BLOCKS: usize = 32;

/// An AES key schedule of whichever width the key file provides.
#[derive(Clone)]
enum AesCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesCipher {
    fn new(key: &[u8]) -> Result<Self> {
        let cipher = match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::Aes128),
            24 => Aes192::new_from_slice(key).map(Self::Aes192),
            32 => Aes256::new_from_slice(key).map(Self::Aes256),
            other => {
                return Err(ArchiveError::configuration(format!(
                    "invalid key length {other}; AES keys must be 16, 24, or 32 bytes"
                )));
            }
        };
        cipher.map_err(|e| ArchiveError::configuration(format!("invalid key: {e}")))
    }

    fn decrypt(&self, block: &mut Block) {
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }

    fn encrypt(&self, block: &mut Block) {
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }
}

/// Read the raw key bytes from `key_store`.
///
/// The file is read in full on every call; keys are never cached.
///
/// # Errors
///
/// Returns [`ArchiveError::Configuration`] when the file cannot be read.
pub fn load_key(key_store: &Path) -> Result<Vec<u8>> {
    fs::read(key_store).map_err(|e| {
        ArchiveError::configuration(format!(
            "failed to read key store {}: {e}",
            key_store.display()
        ))
    })
}

/// Wrap `reader` in a lazily decrypting stream keyed by `key_store`.
///
/// # Errors
///
/// Returns [`ArchiveError::Configuration`] when the key cannot be loaded or
/// has an unsupported length. Corrupt ciphertext is reported later, as an
/// [`io::ErrorKind::InvalidData`] error from `read`.
pub fn decrypt_stream<R: Read>(reader: R, key_store: &Path) -> Result<DecryptingReader<R>> {
    let key = load_key(key_store)?;
    DecryptingReader::new(reader, &key)
}

/// Encrypt `plain` with AES-ECB and PKCS#7 padding.
///
/// # Errors
///
/// Returns [`ArchiveError::Configuration`] for an unsupported key length.
///
/// # Examples
///
/// ```
/// use model_archive::crypto::{BLOCK_SIZE, encrypt_bytes};
///
/// let key = [7u8; 16];
/// let sealed = encrypt_bytes(b"hello", &key).expect("valid key");
/// assert_eq!(sealed.len(), BLOCK_SIZE);
/// ```
pub fn encrypt_bytes(plain: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let cipher = AesCipher::new(key)?;
    let pad = BLOCK_SIZE - plain.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(plain.len() + pad);
    padded.extend_from_slice(plain);
    padded.resize(plain.len() + pad, u8::try_from(pad).unwrap_or(u8::MAX));

    let mut sealed = Vec::with_capacity(padded.len());
    for chunk in padded.chunks_exact(BLOCK_SIZE) {
        let mut block = Block::clone_from_slice(chunk);
        cipher.encrypt(&mut block);
        sealed.extend_from_slice(block.as_slice());
    }
    Ok(sealed)
}

/// A [`Read`] adapter that decrypts AES-ECB/PKCS#7 ciphertext on demand.
pub struct DecryptingReader<R> {
    inner: R,
    cipher: AesCipher,
    held: Option<Block>,
    ready: Vec<u8>,
    cursor: usize,
    finished: bool,
}

impl<R: Read> DecryptingReader<R> {
    /// Decrypt `inner` with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Configuration`] for an unsupported key
    /// length.
    pub fn new(inner: R, key: &[u8]) -> Result<Self> {
        Ok(Self {
            inner,
            cipher: AesCipher::new(key)?,
            held: None,
            ready: Vec::with_capacity(BLOCK_SIZE * CHUNK_BLOCKS),
            cursor: 0,
            finished: false,
        })
    }

    fn refill(&mut self) -> io::Result<()> {
        self.ready.clear();
        self.cursor = 0;

        let mut chunk = [0u8; BLOCK_SIZE * CHUNK_BLOCKS];
        let filled = read_full(&mut self.inner, &mut chunk)?;
        if filled % BLOCK_SIZE != 0 {
            return Err(invalid_data(
                "ciphertext length is not a multiple of the AES block size",
            ));
        }

        if filled == 0 {
            self.finished = true;
            let last = self
                .held
                .take()
                .ok_or_else(|| invalid_data("ciphertext is empty"))?;
            let plain = unpad(&last)?;
            self.ready.extend_from_slice(plain);
            return Ok(());
        }

        for bytes in chunk.chunks_exact(BLOCK_SIZE).take(filled / BLOCK_SIZE) {
            let mut block = Block::clone_from_slice(bytes);
            self.cipher.decrypt(&mut block);
            if let Some(previous) = self.held.replace(block) {
                self.ready.extend_from_slice(previous.as_slice());
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.cursor >= self.ready.len() {
            if self.finished {
                return Ok(0);
            }
            self.refill()?;
        }
        let available = self.ready.get(self.cursor..).unwrap_or_default();
        let count = available.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(available.iter().take(count)) {
            *slot = *byte;
        }
        self.cursor += count;
        Ok(count)
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while let Some(rest) = buf.get_mut(filled..) {
        if rest.is_empty() {
            break;
        }
        match reader.read(rest) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Strip PKCS#7 padding from the final decrypted block.
fn unpad(block: &Block) -> io::Result<&[u8]> {
    let bytes = block.as_slice();
    let pad = bytes.last().copied().map_or(0, usize::from);
    if pad == 0 || pad > BLOCK_SIZE {
        return Err(invalid_data("invalid padding"));
    }
    let (plain, padding) = bytes.split_at(BLOCK_SIZE - pad);
    if padding.iter().any(|&b| usize::from(b) != pad) {
        return Err(invalid_data("invalid padding"));
    }
    Ok(plain)
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_owned())
}
