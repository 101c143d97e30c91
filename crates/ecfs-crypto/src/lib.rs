//! ecfs-crypto: filename confidentiality and encryption policy for encrypted directories
//!
//! Name flow:
//! ```text
//! lookup/create:  user name ──setup_filename──► disk name (ciphertext, or decoded no-key name)
//! readdir:        disk name ──disk_to_usr─────► plaintext (key present)
//!                                           └─► no-key name (key absent)
//! ```
//!
//! No-key name layout (little-endian hash words, no padding between fields):
//! ```text
//! [4: hash][4: minor hash][<=149: leading ciphertext][32: SHA-256 of the rest, long names only]
//! ```
//!
//! Policy flow: `SET_POLICY` on an empty directory persists a versioned context
//! with a fresh nonce; new children inherit the parent's policy; links and
//! renames into an encrypted tree are gated by `has_permitted_context`.

pub mod codec;
pub mod crypt;
pub mod digest;
pub mod fname;
pub mod inode;
pub mod ioctl;
pub mod keys;
pub mod manager;
pub mod nokey;
pub mod policy;
pub mod presenter;
pub mod store;
pub mod transform;

#[cfg(test)]
mod testing;

pub use codec::{decode, encode, encoded_len, CodecError};
pub use crypt::NameCrypt;
pub use digest::{shared_digest, NameDigest, Sha256Digest};
pub use fname::{decrypt_name, encrypt_name, encrypted_size};
pub use inode::{CryptInfo, Inode};
pub use ioctl::{Credentials, OpenFile};
pub use keys::{KeyProvider, Keyring, MasterKey};
pub use manager::{policies_equal, supported_policy};
pub use nokey::NoKeyName;
pub use policy::{EncryptionContext, EncryptionPolicy};
pub use presenter::{is_dot_dotdot, max_presented_len, FilenameSetup, PresentedKind, PresentedName};
pub use store::ContextStore;
pub use transform::{Aes128CtsTransform, Aes256CtsTransform, CbcCtsTransform, NameTransform};

/// Size of a master or per-file key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the per-file nonce stored in every encryption context
pub const NONCE_SIZE: usize = 16;

/// Size of a filename initialization vector
pub const IV_SIZE: usize = 16;

/// Cipher block size; no encrypted name is ever shorter than this.
pub const BLOCK_SIZE: usize = 16;
