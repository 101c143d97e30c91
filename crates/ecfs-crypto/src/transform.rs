//! Keyed, length-preserving transform applied to whole filenames.

use std::marker::PhantomData;

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use cts::{Decrypt, Encrypt, KeyIvInit};
use zeroize::Zeroizing;

use crate::{BLOCK_SIZE, IV_SIZE};

/// Per-file keyed transform. The output is always exactly as long as the
/// input, and the whole buffer is processed in one call.
pub trait NameTransform: Send + Sync {
    fn encrypt_in_place(&self, buf: &mut [u8], iv: &[u8; IV_SIZE]) -> anyhow::Result<()>;

    /// Decrypt `src` into the first `src.len()` bytes of `dst`.
    fn decrypt(&self, src: &[u8], dst: &mut [u8], iv: &[u8; IV_SIZE]) -> anyhow::Result<()>;
}

/// AES in CBC mode with ciphertext stealing (CS3). Every output block
/// depends on all plaintext before it, and inputs of at least one block
/// keep their length.
pub struct CbcCtsTransform<C> {
    key: Zeroizing<Vec<u8>>,
    name: &'static str,
    cipher: PhantomData<fn() -> C>,
}

pub type Aes256CtsTransform = CbcCtsTransform<aes::Aes256>;
pub type Aes128CtsTransform = CbcCtsTransform<aes::Aes128>;

impl Aes256CtsTransform {
    pub fn new(key: &[u8]) -> anyhow::Result<Self> {
        CbcCtsTransform::with_key("AES-256-CBC-CTS", key)
    }
}

impl Aes128CtsTransform {
    pub fn new(key: &[u8]) -> anyhow::Result<Self> {
        CbcCtsTransform::with_key("AES-128-CBC-CTS", key)
    }
}

impl<C> CbcCtsTransform<C>
where
    C: BlockEncrypt + BlockDecrypt + KeyInit,
{
    fn with_key(name: &'static str, key: &[u8]) -> anyhow::Result<Self> {
        if key.len() != C::key_size() {
            anyhow::bail!(
                "{name} needs a {}-byte key, got {} bytes",
                C::key_size(),
                key.len()
            );
        }
        Ok(Self {
            key: Zeroizing::new(key.to_vec()),
            name,
            cipher: PhantomData,
        })
    }

    fn check_len(&self, len: usize) -> anyhow::Result<()> {
        if len < BLOCK_SIZE {
            anyhow::bail!("{}: {len}-byte input is shorter than one block", self.name);
        }
        Ok(())
    }
}

impl<C> NameTransform for CbcCtsTransform<C>
where
    C: BlockEncrypt + BlockDecrypt + KeyInit,
{
    fn encrypt_in_place(&self, buf: &mut [u8], iv: &[u8; IV_SIZE]) -> anyhow::Result<()> {
        self.check_len(buf.len())?;
        cts::CbcCs3Enc::<C>::new_from_slices(&self.key, iv)
            .map_err(|e| anyhow::anyhow!("{} init: {e}", self.name))?
            .encrypt(buf)
            .map_err(|_| anyhow::anyhow!("{} encryption rejected the input", self.name))
    }

    fn decrypt(&self, src: &[u8], dst: &mut [u8], iv: &[u8; IV_SIZE]) -> anyhow::Result<()> {
        self.check_len(src.len())?;
        if dst.len() < src.len() {
            anyhow::bail!(
                "decrypt destination too short: {} bytes for {} bytes of ciphertext",
                dst.len(),
                src.len()
            );
        }
        cts::CbcCs3Dec::<C>::new_from_slices(&self.key, iv)
            .map_err(|e| anyhow::anyhow!("{} init: {e}", self.name))?
            .decrypt_b2b(src, &mut dst[..src.len()])
            .map_err(|_| anyhow::anyhow!("{} decryption rejected the input", self.name))
    }
}

impl<C> std::fmt::Debug for CbcCtsTransform<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CbcCtsTransform")
            .field("cipher", &self.name)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aes256() -> Aes256CtsTransform {
        Aes256CtsTransform::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let t = aes256();
        let iv = [0u8; IV_SIZE];
        let mut buf = *b"sixteen byte msg";

        t.encrypt_in_place(&mut buf, &iv).unwrap();
        assert_ne!(&buf, b"sixteen byte msg");

        let mut out = [0u8; 16];
        t.decrypt(&buf, &mut out, &iv).unwrap();
        assert_eq!(&out, b"sixteen byte msg");
    }

    #[test]
    fn test_partial_final_block_keeps_length() {
        let t = aes256();
        let iv = [0u8; IV_SIZE];
        let plain = b"twenty-one byte name!";
        let mut buf = *plain;
        t.encrypt_in_place(&mut buf, &iv).unwrap();

        let mut out = [0u8; 24];
        t.decrypt(&buf, &mut out, &iv).unwrap();
        assert_eq!(&out[..plain.len()], plain);
    }

    #[test]
    fn test_same_iv_does_not_share_keystream() {
        let t = aes256();
        let iv = [0u8; IV_SIZE];
        let a = *b"known-public-name.txt!..........";
        let b = *b"salary-2026-alice.xlsx..........";
        let (mut ca, mut cb) = (a, b);
        t.encrypt_in_place(&mut ca, &iv).unwrap();
        t.encrypt_in_place(&mut cb, &iv).unwrap();

        let recovered: Vec<u8> = (0..32).map(|i| ca[i] ^ cb[i] ^ a[i]).collect();
        assert_ne!(recovered, b);
    }

    #[test]
    fn test_change_propagates_forward() {
        let t = aes256();
        let iv = [0u8; IV_SIZE];
        let mut a = [b'a'; 32];
        let mut b = [b'a'; 32];
        b[0] = b'b';
        t.encrypt_in_place(&mut a, &iv).unwrap();
        t.encrypt_in_place(&mut b, &iv).unwrap();
        assert_ne!(a[..16], b[..16]);
        assert_ne!(a[16..], b[16..]);
    }

    #[test]
    fn test_iv_changes_ciphertext() {
        let t = aes256();
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        t.encrypt_in_place(&mut a, &[0u8; IV_SIZE]).unwrap();
        t.encrypt_in_place(&mut b, &[1u8; IV_SIZE]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_sizes() {
        assert!(Aes128CtsTransform::new(&[1u8; 16]).is_ok());
        assert!(Aes128CtsTransform::new(&[1u8; 32]).is_err());
        assert!(Aes256CtsTransform::new(&[1u8; 16]).is_err());
    }

    #[test]
    fn test_ciphers_differ() {
        let key = [9u8; 32];
        let wide = Aes256CtsTransform::new(&key).unwrap();
        let narrow = Aes128CtsTransform::new(&key[..16]).unwrap();
        let mut a = *b"0123456789abcdef";
        let mut b = a;
        wide.encrypt_in_place(&mut a, &[0; IV_SIZE]).unwrap();
        narrow.encrypt_in_place(&mut b, &[0; IV_SIZE]).unwrap();
        assert_ne!(a, b);

        let mut out = [0u8; 16];
        narrow.decrypt(&b, &mut out, &[0; IV_SIZE]).unwrap();
        assert_eq!(&out, b"0123456789abcdef");
    }

    #[test]
    fn test_short_input_rejected() {
        let t = aes256();
        assert!(t.encrypt_in_place(&mut [0u8; 15], &[0u8; IV_SIZE]).is_err());
        let mut out = [0u8; 16];
        assert!(t.decrypt(&[0u8; 15], &mut out, &[0u8; IV_SIZE]).is_err());
    }

    #[test]
    fn test_short_destination_rejected() {
        let t = aes256();
        let mut out = [0u8; 8];
        assert!(t.decrypt(&[0u8; 16], &mut out, &[0u8; IV_SIZE]).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let t = Aes256CtsTransform::new(&[0x42u8; 32]).unwrap();
        let shown = format!("{t:?}");
        assert!(!shown.contains("66"));
        assert!(shown.contains("AES-256-CBC-CTS"));
    }
}
