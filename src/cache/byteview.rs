//! Immutable Cached Payload
//!
//! `ByteView` is the unit of value held by every namespace store. The
//! backing buffer is reference-counted, so cloning a view is cheap, but the
//! only way to obtain owned, mutable bytes is [`ByteView::to_vec`], which
//! always copies.

use std::fmt;

use bytes::Bytes;

use super::store::Weighted;

/// Read-only view over a cached byte payload
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Copy `data` into a new view.
    ///
    /// The caller keeps ownership of its buffer; later mutations of it are
    /// never visible through the view.
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Payload length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fresh copy of the payload
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Lossy UTF-8 view of the payload
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Shared handle to the payload, for zero-copy writes into a response body
    pub(crate) fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl Weighted for ByteView {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<Bytes> for ByteView {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<&'static str> for ByteView {
    fn from(data: &'static str) -> Self {
        Self {
            data: Bytes::from_static(data.as_bytes()),
        }
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str_lossy())
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("len", &self.len())
            .field("data", &self.as_str_lossy())
            .finish()
    }
}
