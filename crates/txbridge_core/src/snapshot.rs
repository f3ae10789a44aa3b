//! Call-scoped views over native transient snapshot data.
//!
//! The native commit loop owns the candidate value for each attempt and frees
//! it as soon as the trampoline returns. A [`SnapshotView`] borrows that memory
//! without owning it and carries an explicit validity slot. Every access goes
//! through the slot, so once the invocation ends the view (and every clone of
//! it) fails with [`BridgeError::StaleAccess`] instead of touching freed
//! memory.

use crate::error::{BridgeError, BridgeResult};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

/// Native descriptor of a transient snapshot.
///
/// Owned by the native side together with the `capacity` bytes behind `data`.
/// Views may rewrite `data[..capacity]` and update `len`; the native loop reads
/// both back after the trampoline returns.
#[repr(C)]
#[derive(Debug)]
pub struct RawSnapshot {
    /// Pointer to the value bytes.
    pub data: *mut u8,
    /// Length of the current value in bytes.
    pub len: usize,
    /// Number of writable bytes behind `data`.
    pub capacity: usize,
}

impl RawSnapshot {
    /// Describes a native buffer whose first `len` bytes hold the value.
    ///
    /// `len` is clamped to the buffer size. The descriptor does not borrow
    /// `buffer`; the caller must keep it alive and unmoved while the
    /// descriptor is in use.
    pub fn from_buffer(buffer: &mut [u8], len: usize) -> Self {
        Self {
            data: buffer.as_mut_ptr(),
            len: len.min(buffer.len()),
            capacity: buffer.len(),
        }
    }

    /// An empty descriptor with no backing memory.
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
            capacity: 0,
        }
    }

    unsafe fn value(&self) -> &[u8] {
        if self.data.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.data, self.len)
    }

    unsafe fn whole_mut(&mut self) -> &mut [u8] {
        if self.data.is_null() {
            return &mut [];
        }
        std::slice::from_raw_parts_mut(self.data, self.capacity)
    }
}

struct SnapshotPtr(NonNull<RawSnapshot>);

// SAFETY: the pointer is only dereferenced while the slot lock is held, and
// the slot is emptied before the invocation that owns the memory returns.
unsafe impl Send for SnapshotPtr {}
unsafe impl Sync for SnapshotPtr {}

/// Mutable, non-owning view of the candidate value for one attempt.
///
/// Clones share the validity slot. The slot lock is only held for the copy in
/// and out of native memory, never while caller code runs, so closures passed
/// to `with_bytes` and `with_bytes_mut` may use the view again.
#[derive(Clone)]
pub struct SnapshotView {
    slot: Arc<RwLock<Option<SnapshotPtr>>>,
}

impl SnapshotView {
    /// Binds a view to a native descriptor.
    ///
    /// # Safety
    ///
    /// If non-null, `raw` and the memory it describes must stay valid and must
    /// not be accessed by anyone else until [`SnapshotView::invalidate`] runs.
    pub(crate) unsafe fn bind(raw: *mut RawSnapshot) -> BridgeResult<Self> {
        let ptr = NonNull::new(raw)
            .ok_or_else(|| BridgeError::invalid_snapshot("null snapshot pointer"))?;

        let descriptor = ptr.as_ref();
        if descriptor.data.is_null() && descriptor.capacity > 0 {
            return Err(BridgeError::invalid_snapshot(
                "null data pointer with non-zero capacity",
            ));
        }
        if descriptor.len > descriptor.capacity {
            return Err(BridgeError::invalid_snapshot(format!(
                "length {} exceeds capacity {}",
                descriptor.len, descriptor.capacity
            )));
        }

        Ok(Self {
            slot: Arc::new(RwLock::new(Some(SnapshotPtr(ptr)))),
        })
    }

    /// Detaches the view from native memory.
    ///
    /// Blocks until accesses in progress on other threads have finished.
    pub(crate) fn invalidate(&self) {
        self.slot.write().take();
    }

    /// Returns true while the producing invocation is still running.
    pub fn is_valid(&self) -> bool {
        self.slot.read().is_some()
    }

    fn with_raw<R>(&self, f: impl FnOnce(&RawSnapshot) -> R) -> BridgeResult<R> {
        let guard = self.slot.read();
        let ptr = guard.as_ref().ok_or(BridgeError::StaleAccess)?;
        // SAFETY: a populated slot means the native descriptor is still live.
        Ok(f(unsafe { ptr.0.as_ref() }))
    }

    fn with_raw_mut<R>(&self, f: impl FnOnce(&mut RawSnapshot) -> R) -> BridgeResult<R> {
        let mut guard = self.slot.write();
        let ptr = guard.as_mut().ok_or(BridgeError::StaleAccess)?;
        // SAFETY: as above; the write lock makes this the only live reference.
        Ok(f(unsafe { ptr.0.as_mut() }))
    }

    /// Returns the length of the current value.
    pub fn len(&self) -> BridgeResult<usize> {
        self.with_raw(|raw| raw.len)
    }

    /// Returns true if the current value is empty.
    pub fn is_empty(&self) -> BridgeResult<bool> {
        self.with_raw(|raw| raw.len == 0)
    }

    /// Returns the number of bytes the native buffer can hold.
    pub fn capacity(&self) -> BridgeResult<usize> {
        self.with_raw(|raw| raw.capacity)
    }

    /// Copies the current value out of the native buffer.
    pub fn read(&self) -> BridgeResult<Vec<u8>> {
        // SAFETY: descriptor validated in `bind`.
        self.with_raw(|raw| unsafe { raw.value() }.to_vec())
    }

    /// Runs `f` over a copy of the current value.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> BridgeResult<R> {
        let bytes = self.read()?;
        Ok(f(&bytes))
    }

    /// Runs `f` over a copy of the current value and stores the edited copy.
    ///
    /// The length is fixed. Writes made through the view while `f` runs are
    /// replaced by the copy. Fails with `StaleAccess` if the invocation ended
    /// while `f` was running.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> BridgeResult<R> {
        let mut bytes = self.read()?;
        let result = f(&mut bytes);
        self.write(&bytes)?;
        Ok(result)
    }

    /// Replaces the whole value.
    pub fn write(&self, bytes: &[u8]) -> BridgeResult<()> {
        self.with_raw_mut(|raw| {
            if bytes.len() > raw.capacity {
                return Err(BridgeError::CapacityExceeded {
                    requested: bytes.len(),
                    capacity: raw.capacity,
                });
            }
            // SAFETY: `bytes.len() <= capacity`.
            let whole = unsafe { raw.whole_mut() };
            whole[..bytes.len()].copy_from_slice(bytes);
            raw.len = bytes.len();
            Ok(())
        })?
    }

    /// Overwrites bytes starting at `offset`, growing the value if the patch
    /// runs past its end.
    pub fn write_at(&self, offset: usize, bytes: &[u8]) -> BridgeResult<()> {
        self.with_raw_mut(|raw| {
            if offset > raw.len {
                return Err(BridgeError::OutOfBounds {
                    offset,
                    len: raw.len,
                });
            }
            let end = offset.saturating_add(bytes.len());
            if end > raw.capacity {
                return Err(BridgeError::CapacityExceeded {
                    requested: end,
                    capacity: raw.capacity,
                });
            }
            // SAFETY: `end <= capacity`.
            let whole = unsafe { raw.whole_mut() };
            whole[offset..end].copy_from_slice(bytes);
            raw.len = raw.len.max(end);
            Ok(())
        })?
    }

    /// Shortens the value to `len` bytes.
    pub fn truncate(&self, len: usize) -> BridgeResult<()> {
        self.with_raw_mut(|raw| {
            if len > raw.len {
                return Err(BridgeError::OutOfBounds {
                    offset: len,
                    len: raw.len,
                });
            }
            raw.len = len;
            Ok(())
        })?
    }

    /// Decodes the value as a CBOR document.
    pub fn decode<T: DeserializeOwned>(&self) -> BridgeResult<T> {
        let bytes = self.read()?;
        ciborium::de::from_reader(bytes.as_slice()).map_err(BridgeError::codec)
    }

    /// Encodes `value` as CBOR and writes it as the new value.
    pub fn encode<T: Serialize>(&self, value: &T) -> BridgeResult<()> {
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(value, &mut encoded).map_err(BridgeError::codec)?;
        self.write(&encoded)
    }
}

impl fmt::Debug for SnapshotView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotView")
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn bound(raw: &mut RawSnapshot) -> SnapshotView {
        unsafe { SnapshotView::bind(raw) }.unwrap()
    }

    #[test]
    fn read_and_write_through() {
        let mut buffer = vec![0u8; 16];
        buffer[..3].copy_from_slice(b"abc");
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 3);

        let view = bound(&mut raw);
        assert_eq!(view.len().unwrap(), 3);
        assert_eq!(view.capacity().unwrap(), 16);
        assert_eq!(view.read().unwrap(), b"abc");

        view.write(b"hello").unwrap();
        view.invalidate();

        assert_eq!(raw.len, 5);
        assert_eq!(&buffer[..5], b"hello");
    }

    #[test]
    fn stale_after_invalidate() {
        let mut buffer = vec![0u8; 8];
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 0);

        let view = bound(&mut raw);
        let retained = view.clone();
        assert!(retained.is_valid());

        view.invalidate();

        assert!(!retained.is_valid());
        assert!(retained.read().unwrap_err().is_stale_access());
        assert!(retained.write(b"x").unwrap_err().is_stale_access());
        assert!(retained.len().unwrap_err().is_stale_access());
        assert!(retained
            .with_bytes_mut(|_| ())
            .unwrap_err()
            .is_stale_access());
    }

    #[test]
    fn stale_on_another_thread() {
        let mut buffer = vec![0u8; 8];
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 0);

        let view = bound(&mut raw);
        let retained = view.clone();
        view.invalidate();

        let result = std::thread::spawn(move || retained.read()).join().unwrap();
        assert!(matches!(result, Err(BridgeError::StaleAccess)));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut buffer = vec![0u8; 4];
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 2);

        let view = bound(&mut raw);
        let err = view.write(b"too long").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::CapacityExceeded {
                requested: 8,
                capacity: 4
            }
        ));
        assert_eq!(view.len().unwrap(), 2);
    }

    #[test]
    fn patch_and_truncate() {
        let mut buffer = vec![0u8; 8];
        buffer[..4].copy_from_slice(b"AAAA");
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 4);

        let view = bound(&mut raw);
        view.write_at(2, b"BBB").unwrap();
        assert_eq!(view.read().unwrap(), b"AABBB");

        assert!(matches!(
            view.write_at(6, b"C"),
            Err(BridgeError::OutOfBounds { offset: 6, len: 5 })
        ));
        assert!(matches!(
            view.write_at(5, b"CCCC"),
            Err(BridgeError::CapacityExceeded { .. })
        ));

        view.truncate(1).unwrap();
        assert_eq!(view.read().unwrap(), b"A");
        assert!(view.truncate(3).is_err());

        view.with_bytes_mut(|bytes| bytes[0] = b'Z').unwrap();
        assert_eq!(view.with_bytes(|bytes| bytes.to_vec()).unwrap(), b"Z");
    }

    #[test]
    fn cbor_document() {
        let mut buffer = vec![0u8; 64];
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 0);
        let view = bound(&mut raw);

        let mut doc = BTreeMap::new();
        doc.insert("field".to_string(), "A".to_string());
        view.encode(&doc).unwrap();

        let mut decoded: BTreeMap<String, String> = view.decode().unwrap();
        assert_eq!(decoded.get("field").map(String::as_str), Some("A"));

        decoded.insert("field".to_string(), "B".to_string());
        view.encode(&decoded).unwrap();
        let again: BTreeMap<String, String> = view.decode().unwrap();
        assert_eq!(again["field"], "B");
    }

    #[test]
    fn garbage_fails_to_decode() {
        let mut buffer = vec![0xffu8; 4];
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 4);
        let view = bound(&mut raw);

        let result: BridgeResult<BTreeMap<String, String>> = view.decode();
        assert!(matches!(result, Err(BridgeError::Codec(_))));
    }

    #[test]
    fn bind_rejects_bad_descriptors() {
        let result = unsafe { SnapshotView::bind(std::ptr::null_mut()) };
        assert!(matches!(result, Err(BridgeError::InvalidSnapshot { .. })));

        let mut raw = RawSnapshot {
            data: std::ptr::null_mut(),
            len: 0,
            capacity: 8,
        };
        let result = unsafe { SnapshotView::bind(&mut raw) };
        assert!(matches!(result, Err(BridgeError::InvalidSnapshot { .. })));

        let mut buffer = vec![0u8; 2];
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 2);
        raw.len = 3;
        let result = unsafe { SnapshotView::bind(&mut raw) };
        assert!(matches!(result, Err(BridgeError::InvalidSnapshot { .. })));
    }

    #[test]
    fn empty_descriptor() {
        let mut raw = RawSnapshot::empty();
        let view = bound(&mut raw);
        assert!(view.is_empty().unwrap());
        assert_eq!(view.read().unwrap(), Vec::<u8>::new());
        view.write(b"").unwrap();
        assert!(view.write(b"x").is_err());
    }

    #[test]
    fn closures_may_use_the_view_again() {
        let mut buffer = vec![0u8; 8];
        buffer[..2].copy_from_slice(b"AB");
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 2);
        let view = bound(&mut raw);

        // Runs on a helper thread so a lock held across `f` would show up as
        // a timeout instead of hanging the test binary.
        let (tx, rx) = std::sync::mpsc::channel();
        let worker = view.clone();
        std::thread::spawn(move || {
            let nested_write = worker.with_bytes(|_| worker.write(b"xyz").is_ok());
            let nested_valid = worker.with_bytes_mut(|bytes| {
                bytes[0] = b'Q';
                worker.is_valid()
            });
            let _ = tx.send((nested_write, nested_valid));
        });

        let (nested_write, nested_valid) = rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("nested view access blocked");
        assert!(nested_write.unwrap());
        assert!(nested_valid.unwrap());
        // The edited copy from `with_bytes_mut` is what remains.
        assert_eq!(view.read().unwrap(), b"Qyz");
    }

    #[test]
    fn with_bytes_mut_on_stale_view_fails() {
        let mut buffer = vec![0u8; 4];
        let mut raw = RawSnapshot::from_buffer(&mut buffer, 1);
        let view = bound(&mut raw);
        let outer = view.clone();

        let result = outer.with_bytes_mut(|bytes| {
            view.invalidate();
            bytes[0] = b'!';
        });
        assert!(result.unwrap_err().is_stale_access());
        assert_eq!(buffer[0], 0);
    }

    #[test]
    fn debug_shows_validity() {
        let mut raw = RawSnapshot::empty();
        let view = bound(&mut raw);
        assert_eq!(format!("{view:?}"), "SnapshotView { valid: true }");
        view.invalidate();
        assert_eq!(format!("{view:?}"), "SnapshotView { valid: false }");
    }
}
