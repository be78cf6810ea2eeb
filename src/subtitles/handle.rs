/*!
 * Shared, lock-guarded access to the document.
 *
 * All structural mutation goes through a single reentrant lock so that an
 * edit is atomic with respect to concurrently running commands. The guard is
 * not `Send`, so it can never be held across an `.await`: backend calls
 * happen outside the lock and only the reconciliation step is locked.
 */

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::sync::Arc;

use super::document::SubtitleDocument;

/// Cloneable handle to the shared document
#[derive(Debug, Clone, Default)]
pub struct DocumentHandle {
    inner: Arc<ReentrantMutex<RefCell<SubtitleDocument>>>,
}

impl DocumentHandle {
    /// Wrap a document for shared access
    pub fn new(document: SubtitleDocument) -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(document))),
        }
    }

    /// Hold the document lock across several steps.
    ///
    /// The same thread may call `read`/`write` while holding the guard, but
    /// must not keep a `borrow_mut` alive across those calls.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<SubtitleDocument>> {
        self.inner.lock()
    }

    /// Run a closure with shared access under the lock
    pub fn read<R>(&self, f: impl FnOnce(&SubtitleDocument) -> R) -> R {
        let guard = self.inner.lock();
        let document = guard.borrow();
        f(&document)
    }

    /// Run a closure with exclusive access under the lock
    pub fn write<R>(&self, f: impl FnOnce(&mut SubtitleDocument) -> R) -> R {
        let guard = self.inner.lock();
        let mut document = guard.borrow_mut();
        f(&mut document)
    }

    /// Clone the current document
    pub fn snapshot(&self) -> SubtitleDocument {
        self.read(|document| document.clone())
    }

    /// Replace the whole document, e.g. when a new file is loaded
    pub fn replace(&self, document: SubtitleDocument) -> SubtitleDocument {
        self.write(|current| std::mem::replace(current, document))
    }
}
