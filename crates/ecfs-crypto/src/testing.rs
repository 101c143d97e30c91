//! In-memory collaborators shared by the unit tests.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ecfs_core::{EcfsError, EcfsResult, FileKind};

use crate::crypt::NameCrypt;
use crate::inode::Inode;
use crate::keys::{Keyring, MasterKey};
use crate::policy::{mode, EncryptionContext, EncryptionPolicy, PolicyV1, FLAGS_PAD_32};
use crate::store::ContextStore;

pub const KNOWN_DESCRIPTOR: [u8; 8] = *b"desc0001";
pub const UNKNOWN_DESCRIPTOR: [u8; 8] = *b"gone0000";

#[derive(Default)]
pub struct MemStore {
    pub contexts: Mutex<HashMap<u64, Vec<u8>>>,
    pub non_empty: Mutex<HashSet<u64>>,
    pub fail_writes: AtomicBool,
}

impl ContextStore for MemStore {
    fn get_context(&self, inode: &Inode, buf: &mut [u8]) -> EcfsResult<usize> {
        let contexts = self.contexts.lock().unwrap();
        let ctx = contexts
            .get(&inode.ino())
            .ok_or(EcfsError::NotEncrypted { ino: inode.ino() })?;
        if ctx.len() > buf.len() {
            return Err(EcfsError::BufferTooSmall {
                needed: ctx.len(),
                available: buf.len(),
            });
        }
        buf[..ctx.len()].copy_from_slice(ctx);
        Ok(ctx.len())
    }

    fn set_context(&self, inode: &Inode, ctx: &[u8], _aux: Option<&dyn Any>) -> EcfsResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EcfsError::Storage("write refused".into()));
        }
        self.contexts
            .lock()
            .unwrap()
            .insert(inode.ino(), ctx.to_vec());
        Ok(())
    }

    fn empty_dir(&self, inode: &Inode) -> bool {
        !self.non_empty.lock().unwrap().contains(&inode.ino())
    }

    fn max_namelen(&self) -> usize {
        255
    }
}

pub struct Fixture {
    pub store: Arc<MemStore>,
    pub keys: Arc<Keyring>,
    pub crypt: NameCrypt,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemStore::default());
        let keys = Arc::new(Keyring::new());
        keys.add_key(&KNOWN_DESCRIPTOR, MasterKey::from_bytes([0x11; 32]));
        let crypt = NameCrypt::new(store.clone(), keys.clone());
        Self { store, keys, crypt }
    }

    pub fn put_context(&self, ino: u64, bytes: Vec<u8>) {
        self.store.contexts.lock().unwrap().insert(ino, bytes);
    }
}

pub fn policy(descriptor: [u8; 8]) -> EncryptionPolicy {
    EncryptionPolicy::V1(PolicyV1 {
        contents_mode: mode::AES_256_XTS,
        filenames_mode: mode::AES_256_CTS,
        flags: FLAGS_PAD_32,
        master_key_descriptor: descriptor,
    })
}

fn encrypted_dir(fx: &Fixture, ino: u64, descriptor: [u8; 8]) -> Inode {
    let ctx = EncryptionContext::new_from_policy(&policy(descriptor));
    fx.put_context(ino, ctx.to_bytes());
    Inode::new(ino, FileKind::Directory, 1000).encrypted()
}

/// Encrypted directory whose master key is in the fixture's keyring.
pub fn unlocked_dir(fx: &Fixture, ino: u64) -> Inode {
    encrypted_dir(fx, ino, KNOWN_DESCRIPTOR)
}

/// Encrypted directory whose master key is absent.
pub fn locked_dir(fx: &Fixture, ino: u64) -> Inode {
    encrypted_dir(fx, ino, UNKNOWN_DESCRIPTOR)
}
