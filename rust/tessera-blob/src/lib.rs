//! Typed, shaped tensor buffers and zero-copy proxy views over them.
//!
//! A [`Buffer`] owns one block of storage obtained from an
//! [`Allocator`](tessera_alloc::Allocator). A [`ProxyBuffer`] observes a byte
//! window of a buffer under its own element kind, without copying and without
//! ever freeing what it observes. Both implement [`Blob`], so consumers can
//! read, write, size and iterate either one the same way.
//!
//! All access goes through scoped views ([`ReadView`], [`WriteView`]) that hold
//! a lock on the backing storage for exactly as long as they are alive.

pub mod arena;
pub mod blob;
pub mod buffer;
pub mod element;
pub mod proxy;
pub mod shape;
pub mod view;
pub mod window;

pub use arena::{BufferArena, BufferId, ProxyDescriptor};
pub use blob::Blob;
pub use buffer::Buffer;
pub use element::{Element, ElementKind, NumericClass};
pub use proxy::ProxyBuffer;
pub use shape::{Layout, ShapeDescriptor};
pub use view::{ElementMut, Elements, ElementsMut, ReadView, WriteView};
pub use window::LockedWindow;
