//! Presenting stored names to callers and preparing caller names for lookup.
//!
//! Readdir direction:
//! ```text
//! disk name ──key──▶ plaintext
//!           ──none─▶ NoKeyName ─▶ encode ─▶ [A-Za-z0-9+,]{..252}
//! ```
//! Lookup/create direction: the reverse, where a keyless lookup decodes the
//! presented form back into (hash pair, ciphertext prefix, digest).

use zeroize::Zeroizing;

use ecfs_core::{DirHash, EcfsError, EcfsResult};

use crate::crypt::NameCrypt;
use crate::digest::NameDigest;
use crate::fname::{decrypt_name, encrypt_name, encrypted_size};
use crate::inode::Inode;
use crate::nokey::{NoKeyName, NOKEY_ENCODED_MAX};
use crate::BLOCK_SIZE;

pub fn is_dot_dotdot(name: &[u8]) -> bool {
    name == b"." || name == b".."
}

/// Buffer length able to hold any presentation of a name whose stored
/// form is at most `max_encrypted_len` bytes, plus a terminator.
pub fn max_presented_len(max_encrypted_len: usize) -> usize {
    max_encrypted_len.max(NOKEY_ENCODED_MAX) + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentedKind {
    /// `.` or `..`, passed through.
    Dot,
    /// Decrypted with the directory's key.
    Plaintext,
    /// Encoded no-key name.
    NoKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedName {
    bytes: Vec<u8>,
    kind: PresentedKind,
}

impl PresentedName {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn kind(&self) -> PresentedKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

enum DiskName<'a> {
    Plain(&'a [u8]),
    Encrypted(Zeroizing<Vec<u8>>),
    NoKey(Box<NoKeyName>),
}

/// A caller-supplied name prepared for a directory operation. Owned
/// buffers are released when the setup is dropped.
pub struct FilenameSetup<'a> {
    usr_name: &'a [u8],
    disk: DiskName<'a>,
    hash: DirHash,
    ciphertext_name: bool,
    digest: &'a dyn NameDigest,
}

impl<'a> FilenameSetup<'a> {
    pub fn usr_name(&self) -> &'a [u8] {
        self.usr_name
    }

    /// The exact stored name to search for, when it is known. A long no-key
    /// name only identifies its entry through [`FilenameSetup::matches`].
    pub fn disk_name(&self) -> Option<&[u8]> {
        match &self.disk {
            DiskName::Plain(name) => Some(*name),
            DiskName::Encrypted(buf) => Some(buf.as_slice()),
            DiskName::NoKey(nokey) if !nokey.is_digested() => Some(nokey.leading_bytes()),
            DiskName::NoKey(_) => None,
        }
    }

    pub fn hash(&self) -> u32 {
        self.hash.hash
    }

    pub fn minor_hash(&self) -> u32 {
        self.hash.minor_hash
    }

    /// Whether the caller named the entry by its no-key presentation.
    pub fn is_ciphertext_name(&self) -> bool {
        self.ciphertext_name
    }

    /// Whether the stored directory entry `entry_name` is the one requested.
    pub fn matches(&self, entry_name: &[u8]) -> bool {
        match &self.disk {
            DiskName::Plain(name) => entry_name == *name,
            DiskName::Encrypted(buf) => entry_name == buf.as_slice(),
            DiskName::NoKey(nokey) => nokey.matches(entry_name, self.digest),
        }
    }
}

impl std::fmt::Debug for FilenameSetup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let disk = match &self.disk {
            DiskName::Plain(_) => "plain",
            DiskName::Encrypted(_) => "encrypted",
            DiskName::NoKey(_) => "nokey",
        };
        f.debug_struct("FilenameSetup")
            .field("disk", &disk)
            .field("hash", &self.hash)
            .field("ciphertext_name", &self.ciphertext_name)
            .finish()
    }
}

impl NameCrypt {
    /// Present the stored name `disk_name` of an entry in `inode`.
    pub fn disk_to_usr(
        &self,
        inode: &Inode,
        hash: u32,
        minor_hash: u32,
        disk_name: &[u8],
    ) -> EcfsResult<PresentedName> {
        if is_dot_dotdot(disk_name) {
            return Ok(PresentedName {
                bytes: disk_name.to_vec(),
                kind: PresentedKind::Dot,
            });
        }
        if disk_name.len() < BLOCK_SIZE {
            return Err(EcfsError::CorruptName(format!(
                "{}-byte encrypted name in inode {}",
                disk_name.len(),
                inode.ino()
            )));
        }

        if let Some(ci) = inode.crypt_info() {
            return Ok(PresentedName {
                bytes: decrypt_name(ci, inode.ino(), disk_name)?,
                kind: PresentedKind::Plaintext,
            });
        }

        let nokey = NoKeyName::build(
            disk_name,
            Some(DirHash::new(hash, minor_hash)),
            self.digest(),
        )
        .map_err(|e| match e {
            EcfsError::CipherFailure { op, reason, .. } => {
                tracing::error!(ino = inode.ino(), error = %reason, "no-key name digest failed");
                EcfsError::CipherFailure {
                    op,
                    ino: inode.ino(),
                    reason,
                }
            }
            other => other,
        })?;
        Ok(PresentedName {
            bytes: nokey.encode().into_bytes(),
            kind: PresentedKind::NoKey,
        })
    }

    /// Prepare `name` for lookup (`lookup = true`) or creation in `dir`.
    pub fn setup_filename<'a>(
        &'a self,
        dir: &Inode,
        name: &'a [u8],
        lookup: bool,
    ) -> EcfsResult<FilenameSetup<'a>> {
        let plain = |disk| FilenameSetup {
            usr_name: name,
            disk,
            hash: DirHash::default(),
            ciphertext_name: false,
            digest: self.digest(),
        };

        if !dir.is_encrypted() || is_dot_dotdot(name) {
            return Ok(plain(DiskName::Plain(name)));
        }

        self.get_encryption_info(dir)?;
        if let Some(ci) = dir.crypt_info() {
            let len = encrypted_size(ci.flags(), name.len(), self.max_namelen())?;
            let ciphertext = encrypt_name(ci, dir.ino(), name, len)?;
            return Ok(plain(DiskName::Encrypted(Zeroizing::new(ciphertext))));
        }

        if !lookup {
            return Err(EcfsError::KeyUnavailable { ino: dir.ino() });
        }

        let nokey = NoKeyName::decode(name)?;
        tracing::trace!(ino = dir.ino(), digested = nokey.is_digested(), "no-key lookup");
        Ok(FilenameSetup {
            usr_name: name,
            hash: nokey.dirhash(),
            disk: DiskName::NoKey(Box::new(nokey)),
            ciphertext_name: true,
            digest: self.digest(),
        })
    }
}

#[cfg(test)]
mod tests {
    use ecfs_core::FileKind;

    use super::*;
    use crate::nokey::NOKEY_BYTES;
    use crate::testing::{locked_dir, unlocked_dir, Fixture};

    #[test]
    fn dots_pass_through() {
        let fx = Fixture::new();
        let dir = locked_dir(&fx, 2);
        for dot in [&b"."[..], &b".."[..]] {
            let p = fx.crypt.disk_to_usr(&dir, 0, 0, dot).unwrap();
            assert_eq!(p.kind(), PresentedKind::Dot);
            assert_eq!(p.as_bytes(), dot);

            let s = fx.crypt.setup_filename(&dir, dot, false).unwrap();
            assert_eq!(s.disk_name(), Some(dot));
            assert!(!s.is_ciphertext_name());
        }
    }

    #[test]
    fn short_disk_name_is_corrupt() {
        let fx = Fixture::new();
        let dir = locked_dir(&fx, 2);
        assert!(matches!(
            fx.crypt.disk_to_usr(&dir, 0, 0, &[1u8; 15]),
            Err(EcfsError::CorruptName(_))
        ));
    }

    #[test]
    fn unencrypted_dir_is_verbatim() {
        let fx = Fixture::new();
        let dir = Inode::new(3, FileKind::Directory, 0);
        let s = fx.crypt.setup_filename(&dir, b"notes.txt", false).unwrap();
        assert_eq!(s.disk_name(), Some(&b"notes.txt"[..]));
        assert_eq!(s.usr_name(), b"notes.txt");
        assert!(s.matches(b"notes.txt"));
    }

    #[test]
    fn create_then_readdir_with_key() {
        let fx = Fixture::new();
        let dir = unlocked_dir(&fx, 2);
        let s = fx.crypt.setup_filename(&dir, b"hello", false).unwrap();
        let stored = s.disk_name().unwrap().to_vec();
        assert_eq!(stored.len(), 32);

        let p = fx.crypt.disk_to_usr(&dir, 0, 0, &stored).unwrap();
        assert_eq!(p.kind(), PresentedKind::Plaintext);
        assert_eq!(p.as_bytes(), b"hello");
    }

    #[test]
    fn create_without_key_refused() {
        let fx = Fixture::new();
        let dir = locked_dir(&fx, 2);
        assert!(matches!(
            fx.crypt.setup_filename(&dir, b"new", false),
            Err(EcfsError::KeyUnavailable { ino: 2 })
        ));
    }

    #[test]
    fn overlong_name_with_key() {
        let fx = Fixture::new();
        let dir = unlocked_dir(&fx, 2);
        let name = vec![b'a'; 256];
        assert!(matches!(
            fx.crypt.setup_filename(&dir, &name, false),
            Err(EcfsError::NameTooLong { .. })
        ));
    }

    #[test]
    fn keyless_short_name_roundtrip() {
        let fx = Fixture::new();
        let disk = [0x5Au8; 48];
        let dir = locked_dir(&fx, 2);

        let p = fx.crypt.disk_to_usr(&dir, 0x1234, 0x5678, &disk).unwrap();
        assert_eq!(p.kind(), PresentedKind::NoKey);

        let s = fx.crypt.setup_filename(&dir, p.as_bytes(), true).unwrap();
        assert!(s.is_ciphertext_name());
        assert_eq!(s.disk_name(), Some(&disk[..]));
        assert_eq!((s.hash(), s.minor_hash()), (0x1234, 0x5678));
        assert!(s.matches(&disk));
    }

    #[test]
    fn keyless_long_name_uses_digest() {
        let fx = Fixture::new();
        let disk: Vec<u8> = (0..220u16).map(|i| (i % 200) as u8 + 1).collect();
        let mut sibling = disk.clone();
        sibling[NOKEY_BYTES + 3] ^= 1;
        let dir = locked_dir(&fx, 2);

        let p = fx.crypt.disk_to_usr(&dir, 0, 0, &disk).unwrap();
        assert_eq!(p.len(), 252);

        let s = fx.crypt.setup_filename(&dir, p.as_bytes(), true).unwrap();
        assert_eq!(s.disk_name(), None);
        assert!(s.matches(&disk));
        assert!(!s.matches(&sibling));
    }

    #[test]
    fn keyless_lookup_of_garbage_not_found() {
        let fx = Fixture::new();
        let dir = locked_dir(&fx, 2);
        for bad in [&b"has space"[..], &b"B"[..], &[b'A'; 253][..]] {
            assert!(matches!(
                fx.crypt.setup_filename(&dir, bad, true),
                Err(EcfsError::NameNotFound)
            ));
        }
    }

    struct FailingDigest;

    impl NameDigest for FailingDigest {
        fn digest(&self, _: &[u8]) -> anyhow::Result<[u8; 32]> {
            anyhow::bail!("hash engine unavailable")
        }
    }

    static FAILING_DIGEST: FailingDigest = FailingDigest;

    #[test]
    fn digest_failure_names_the_directory() {
        let fx = Fixture::new();
        let dir = locked_dir(&fx, 7);
        let crypt = NameCrypt::new(fx.store.clone(), fx.keys.clone()).with_digest(&FAILING_DIGEST);

        let err = crypt.disk_to_usr(&dir, 0, 0, &[0x33u8; 200]).unwrap_err();
        assert!(matches!(
            err,
            EcfsError::CipherFailure { op: "digest", ino: 7, .. }
        ));

        let short = crypt.disk_to_usr(&dir, 0, 0, &[0x33u8; 40]).unwrap();
        assert_eq!(short.kind(), PresentedKind::NoKey);
    }

    #[test]
    fn presented_buffer_size() {
        assert_eq!(max_presented_len(255), 256);
        assert_eq!(max_presented_len(32), NOKEY_ENCODED_MAX + 1);
    }
}
