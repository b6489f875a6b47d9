//! A bounded circular return-address stack (RAS).

use log::trace;

/// A fixed-capacity circular stack of return addresses.
///
/// Pushes past capacity silently overwrite the oldest entry, and pops past
/// the bottom wrap around and replay stale slots; neither is an error.
/// There is deliberately no depth tracking.
///
/// The buffer is zero-filled at construction, so a pop that precedes any
/// push deterministically yields address 0 rather than reading garbage.
pub struct ReturnAddressStack {
    buf: Vec<usize>,
    top: usize,
}
impl ReturnAddressStack {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            buf: vec![0; capacity],
            // The first push wraps this to slot 0.
            top: capacity - 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Push a return address, overwriting the oldest entry on wraparound.
    pub fn push(&mut self, return_addr: usize) {
        self.top = (self.top + 1) % self.buf.len();
        self.buf[self.top] = return_addr;
        trace!("RAS push {:#x} -> slot {}", return_addr, self.top);
    }

    /// Pop the youngest return address.
    pub fn pop(&mut self) -> usize {
        let addr = self.buf[self.top];
        self.top = if self.top == 0 {
            self.buf.len() - 1
        } else {
            self.top - 1
        };
        trace!("RAS pop {:#x}", addr);
        addr
    }
}
