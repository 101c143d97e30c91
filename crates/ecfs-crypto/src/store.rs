//! The filesystem's side of the contract: persisting encryption contexts.

use std::any::Any;

use ecfs_core::EcfsResult;

use crate::inode::Inode;

/// Operations the filesystem driver supplies to the encryption layer.
pub trait ContextStore: Send + Sync {
    /// Copy the stored context into `buf` and return its length.
    ///
    /// A context larger than `buf` is an error (`BufferTooSmall`); an object
    /// without a context returns whatever the driver uses for "no data".
    fn get_context(&self, inode: &Inode, buf: &mut [u8]) -> EcfsResult<usize>;

    /// Persist `ctx` for `inode`. `aux` is the opaque value the driver passed
    /// to `inherit_context`, typically its transaction handle.
    fn set_context(&self, inode: &Inode, ctx: &[u8], aux: Option<&dyn Any>) -> EcfsResult<()>;

    fn empty_dir(&self, inode: &Inode) -> bool;

    /// Longest on-disk name the filesystem accepts.
    fn max_namelen(&self) -> usize;
}
