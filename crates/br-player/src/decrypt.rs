//! Chunk decryption.

use aes::Aes128;
use br_core::{Error, Result, IV_LEN};
use bytes::Bytes;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};

/// AES block size in bytes.
const AES_BLOCK_SIZE: usize = 16;

/// Turns a chunk's ciphertext into plaintext.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &[u8], key: &[u8], iv: &[u8; IV_LEN]) -> Result<Bytes>;
}

/// AES-128-CBC with PKCS7 padding, one independent IV per chunk.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesCbcDecryptor;

impl Decryptor for AesCbcDecryptor {
    fn decrypt(&self, ciphertext: &[u8], key: &[u8], iv: &[u8; IV_LEN]) -> Result<Bytes> {
        let key: &[u8; 16] = key
            .try_into()
            .map_err(|_| Error::Decrypt(format!("key is {} bytes, expected 16", key.len())))?;

        if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(Error::Decrypt(format!(
                "ciphertext length {} is not aligned to AES block size {AES_BLOCK_SIZE}",
                ciphertext.len()
            )));
        }

        let mut buf = ciphertext.to_vec();
        let decryptor = cbc::Decryptor::<Aes128>::new(key.into(), iv.into());
        let len = decryptor
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|e| Error::Decrypt(format!("PKCS7 unpad failed: {e}")))?
            .len();
        buf.truncate(len);

        tracing::trace!(encrypted = ciphertext.len(), decrypted = len, "Chunk decrypted");
        Ok(Bytes::from(buf))
    }
}
