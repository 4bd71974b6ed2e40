use core::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Buffers that grew past this are dropped instead of being returned to the pool.
const MAX_POOLED_CAPACITY: usize = 64 * 1024;
const MAX_POOLED_BUFFERS: usize = 16;

/// A pool of byte buffers shared across threads.
pub(crate) struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

/// Output buffers for one-shot record formatting.
pub(crate) static BUFFERS: BufferPool = BufferPool::new();

/// A buffer on loan from a [`BufferPool`]. It goes back to the pool on drop,
/// so the borrow checker rules out any use after it's been returned.
pub(crate) struct PooledBuffer<'p> {
    buf: Vec<u8>,
    pool: &'p BufferPool,
}

impl BufferPool {
    pub(crate) const fn new() -> BufferPool {
        BufferPool {
            free: parking_lot::const_mutex(Vec::new()),
        }
    }

    /// Lends out an empty buffer with at least `capacity` bytes of room.
    pub(crate) fn acquire(&self, capacity: usize) -> PooledBuffer<'_> {
        let mut buf = self.free.lock().pop().unwrap_or_default();
        buf.clear();
        buf.reserve(capacity);
        PooledBuffer { buf, pool: self }
    }

    fn release(&self, buf: Vec<u8>) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < MAX_POOLED_BUFFERS {
            free.push(buf);
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(core::mem::take(&mut self.buf));
    }
}
