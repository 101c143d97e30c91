//! Whole-name encryption and decryption with zero padding.

use zeroize::Zeroize;

use ecfs_core::{EcfsError, EcfsResult};

use crate::inode::CryptInfo;
use crate::policy::{padding_bytes, FLAG_DIRECT_KEY};
use crate::{BLOCK_SIZE, IV_SIZE};

/// On-disk length of an `orig_len`-byte name: at least one cipher block,
/// rounded up to the padding multiple, never beyond `max_len`.
pub fn encrypted_size(flags: u8, orig_len: usize, max_len: usize) -> EcfsResult<usize> {
    if orig_len > max_len {
        return Err(EcfsError::NameTooLong {
            len: orig_len,
            max: max_len,
        });
    }
    let padding = padding_bytes(flags);
    let padded = orig_len.max(BLOCK_SIZE).next_multiple_of(padding);
    Ok(padded.min(max_len))
}

/// IV for block `index` of a name. Names are always encrypted as one unit,
/// so callers pass 0.
pub fn generate_iv(index: u64, ci: &CryptInfo) -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    iv[..8].copy_from_slice(&index.to_le_bytes());
    if ci.flags() & FLAG_DIRECT_KEY != 0 {
        iv[8..].copy_from_slice(&ci.nonce()[..8]);
    }
    iv
}

/// Encrypt `name` into a fresh `out_len`-byte buffer, zero-padded past the name.
pub fn encrypt_name(ci: &CryptInfo, ino: u64, name: &[u8], out_len: usize) -> EcfsResult<Vec<u8>> {
    if out_len < name.len() {
        return Err(EcfsError::BufferTooSmall {
            needed: name.len(),
            available: out_len,
        });
    }

    let mut buf = vec![0u8; out_len];
    buf[..name.len()].copy_from_slice(name);

    let iv = generate_iv(0, ci);
    if let Err(e) = ci.transform().encrypt_in_place(&mut buf, &iv) {
        buf.zeroize();
        tracing::error!(ino, error = %e, "filename encryption failed");
        return Err(EcfsError::CipherFailure {
            op: "encryption",
            ino,
            reason: e.to_string(),
        });
    }
    Ok(buf)
}

/// Decrypt `ciphertext` into `out`, returning the name's length (up to the
/// first zero byte of the recovered padding).
pub fn decrypt_name_into(
    ci: &CryptInfo,
    ino: u64,
    ciphertext: &[u8],
    out: &mut [u8],
) -> EcfsResult<usize> {
    if out.len() < ciphertext.len() {
        return Err(EcfsError::BufferTooSmall {
            needed: ciphertext.len(),
            available: out.len(),
        });
    }

    let iv = generate_iv(0, ci);
    if let Err(e) = ci.transform().decrypt(ciphertext, out, &iv) {
        tracing::error!(ino, error = %e, "filename decryption failed");
        return Err(EcfsError::CipherFailure {
            op: "decryption",
            ino,
            reason: e.to_string(),
        });
    }

    let plain = &out[..ciphertext.len()];
    Ok(plain.iter().position(|&b| b == 0).unwrap_or(plain.len()))
}

pub fn decrypt_name(ci: &CryptInfo, ino: u64, ciphertext: &[u8]) -> EcfsResult<Vec<u8>> {
    let mut out = vec![0u8; ciphertext.len()];
    let len = decrypt_name_into(ci, ino, ciphertext, &mut out)?;
    out.truncate(len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::policy::{mode, EncryptionPolicy, PolicyV1, FLAGS_PAD_4, FLAGS_PAD_32};
    use crate::transform::{Aes256CtsTransform, NameTransform};
    use crate::NONCE_SIZE;
    use proptest::prelude::*;

    fn crypt_info(flags: u8) -> CryptInfo {
        let policy = EncryptionPolicy::V1(PolicyV1 {
            contents_mode: mode::AES_256_XTS,
            filenames_mode: mode::AES_256_CTS,
            flags,
            master_key_descriptor: *b"desc0001",
        });
        let nonce: [u8; NONCE_SIZE] = std::array::from_fn(|i| i as u8 + 1);
        CryptInfo::new(policy, nonce, Arc::new(Aes256CtsTransform::new(&[7; 32]).unwrap()))
    }

    struct Broken;

    impl NameTransform for Broken {
        fn encrypt_in_place(&self, _: &mut [u8], _: &[u8; IV_SIZE]) -> anyhow::Result<()> {
            anyhow::bail!("device gone")
        }
        fn decrypt(&self, _: &[u8], _: &mut [u8], _: &[u8; IV_SIZE]) -> anyhow::Result<()> {
            anyhow::bail!("device gone")
        }
    }

    #[test]
    fn test_encrypted_size() {
        assert_eq!(encrypted_size(FLAGS_PAD_4, 5, 255).unwrap(), 16);
        assert_eq!(encrypted_size(FLAGS_PAD_4, 17, 255).unwrap(), 20);
        assert_eq!(encrypted_size(FLAGS_PAD_32, 17, 255).unwrap(), 32);
        assert_eq!(encrypted_size(FLAGS_PAD_32, 250, 255).unwrap(), 255);
        assert_eq!(encrypted_size(FLAGS_PAD_32, 255, 255).unwrap(), 255);
        assert!(matches!(
            encrypted_size(FLAGS_PAD_4, 256, 255),
            Err(EcfsError::NameTooLong { len: 256, max: 255 })
        ));
    }

    #[test]
    fn test_iv_layout() {
        let iv = generate_iv(0, &crypt_info(FLAGS_PAD_4));
        assert_eq!(iv, [0u8; IV_SIZE]);

        let iv = generate_iv(3, &crypt_info(FLAGS_PAD_4 | FLAG_DIRECT_KEY));
        assert_eq!(&iv[..8], &3u64.to_le_bytes());
        assert_eq!(&iv[8..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_five_byte_name() {
        let ci = crypt_info(FLAGS_PAD_4);
        let len = encrypted_size(ci.flags(), 5, 255).unwrap();
        let ct = encrypt_name(&ci, 1, b"hello", len).unwrap();
        assert_eq!(ct.len(), 16);

        let mut expected = [0u8; 16];
        expected[..5].copy_from_slice(b"hello");
        ci.transform()
            .encrypt_in_place(&mut expected, &generate_iv(0, &ci))
            .unwrap();
        assert_eq!(ct, expected);
        assert_eq!(decrypt_name(&ci, 1, &ct).unwrap(), b"hello");
    }

    #[test]
    fn test_sibling_names_do_not_leak() {
        let ci = crypt_info(FLAGS_PAD_32);
        let known = b"known-public-name.txt!";
        let secret = b"salary-2026-alice.xlsx";
        let len = encrypted_size(ci.flags(), known.len(), 255).unwrap();
        let ca = encrypt_name(&ci, 1, known, len).unwrap();
        let cb = encrypt_name(&ci, 1, secret, len).unwrap();

        let recovered: Vec<u8> = (0..known.len()).map(|i| ca[i] ^ cb[i] ^ known[i]).collect();
        assert_ne!(&recovered[..], &secret[..]);
        assert_eq!(decrypt_name(&ci, 1, &cb).unwrap(), secret);
    }

    #[test]
    fn test_full_length_name_has_no_terminator() {
        let ci = crypt_info(FLAGS_PAD_4);
        let name = [b'x'; 16];
        let ct = encrypt_name(&ci, 1, &name, 16).unwrap();
        assert_eq!(decrypt_name(&ci, 1, &ct).unwrap(), name);
    }

    #[test]
    fn test_short_buffers_rejected() {
        let ci = crypt_info(FLAGS_PAD_4);
        assert!(matches!(
            encrypt_name(&ci, 1, b"0123456789", 8),
            Err(EcfsError::BufferTooSmall { needed: 10, available: 8 })
        ));
        let mut out = [0u8; 4];
        assert!(matches!(
            decrypt_name_into(&ci, 1, &[0u8; 16], &mut out),
            Err(EcfsError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_cipher_failure_propagates() {
        let policy = *crypt_info(FLAGS_PAD_4).policy();
        let ci = CryptInfo::new(policy, [0; NONCE_SIZE], Arc::new(Broken));
        assert!(matches!(
            encrypt_name(&ci, 9, b"name", 16),
            Err(EcfsError::CipherFailure { op: "encryption", ino: 9, .. })
        ));
        assert!(matches!(
            decrypt_name(&ci, 9, &[1u8; 16]),
            Err(EcfsError::CipherFailure { op: "decryption", .. })
        ));
    }

    proptest! {
        #[test]
        fn encrypt_decrypt_roundtrip(
            name in proptest::collection::vec(1u8..=255, 1..=255),
            pad in 0u8..4,
        ) {
            let ci = crypt_info(pad);
            let len = encrypted_size(ci.flags(), name.len(), 255).unwrap();
            prop_assert!(len >= name.len());
            prop_assert!(len >= BLOCK_SIZE.min(255));
            let ct = encrypt_name(&ci, 1, &name, len).unwrap();
            prop_assert_eq!(ct.len(), len);
            prop_assert_eq!(decrypt_name(&ci, 1, &ct).unwrap(), name);
        }
    }
}
