//! Owned byte buffers handed across the C boundary.

use txbridge_core::{BridgeResult, SnapshotView};

/// Bytes copied out of a snapshot for managed code.
///
/// Allocated here and released with `txb_free_buffer`. A buffer outlives the
/// view it was read from.
#[repr(C)]
pub struct TxbBuffer {
    /// Start of the copied bytes; null for [`TxbBuffer::empty`].
    pub data: *mut u8,
    /// Number of bytes.
    pub len: usize,
    /// Allocation size, always equal to `len`.
    pub capacity: usize,
}

impl TxbBuffer {
    /// Takes ownership of `bytes`.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        Self {
            data: Box::into_raw(boxed).cast::<u8>(),
            len,
            capacity: len,
        }
    }

    /// Copies the current value of `snapshot`.
    ///
    /// Fails with `StaleAccess` once the view's invocation has returned.
    pub fn from_snapshot(snapshot: &SnapshotView) -> BridgeResult<Self> {
        snapshot.read().map(Self::from_vec)
    }

    /// A buffer with no allocation.
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
            capacity: 0,
        }
    }

    /// Returns true if there is no allocation behind the buffer.
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Borrows the bytes.
    ///
    /// # Safety
    ///
    /// The buffer must come from [`TxbBuffer::from_vec`] and not be freed yet.
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.data.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.data, self.len)
    }

    /// Takes the bytes back.
    ///
    /// # Safety
    ///
    /// The buffer must come from [`TxbBuffer::from_vec`] and not be freed yet.
    pub unsafe fn into_vec(self) -> Vec<u8> {
        if self.data.is_null() {
            return Vec::new();
        }
        let slice = std::ptr::slice_from_raw_parts_mut(self.data, self.len);
        Box::from_raw(slice).into_vec()
    }
}

/// Releases a buffer filled by `txb_snapshot_read`.
///
/// Empty buffers are accepted.
///
/// # Safety
///
/// The buffer must come from this library and must not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn txb_free_buffer(buffer: TxbBuffer) {
    drop(buffer.into_vec());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_bytes_come_back() {
        let buffer = TxbBuffer::from_vec(b"candidate".to_vec());
        assert!(!buffer.is_null());
        assert_eq!(buffer.len, 9);
        assert_eq!(buffer.capacity, buffer.len);

        unsafe {
            assert_eq!(buffer.as_slice(), b"candidate");
            assert_eq!(buffer.into_vec(), b"candidate");
        }
    }

    #[test]
    fn spare_capacity_is_dropped() {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(b"abc");
        let buffer = TxbBuffer::from_vec(bytes);
        assert_eq!(buffer.capacity, 3);
        unsafe { txb_free_buffer(buffer) };
    }

    #[test]
    fn empty_buffer_frees() {
        let buffer = TxbBuffer::empty();
        assert!(buffer.is_null());
        unsafe {
            assert!(buffer.as_slice().is_empty());
            txb_free_buffer(buffer);
        }
    }
}
