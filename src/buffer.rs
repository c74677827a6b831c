use std::collections::VecDeque;
use std::sync::Mutex;

use crate::opcode::Opcode;

/// One logical application message (or its in-progress tail) living inside a [`FramedBuffer`]'s
/// byte arena.
#[derive(Debug, Clone, Copy)]
struct Block {
    opcode: Opcode,
    offset: usize,
    length: usize,
    completed: bool,
}

struct Inner {
    blocks: VecDeque<Block>,
    arena: Vec<u8>,
}

/// An ordered sequence of [`Block`]s backed by a contiguous byte arena.
///
/// Invariant: the `[offset, offset+length)` ranges of the blocks tile a prefix of the arena in
/// order, and completed blocks precede the at most one in-progress block (always the tail).
///
/// Every method here is synchronous, internally locked with a plain [`std::sync::Mutex`], and
/// returns quickly — none may be called while holding this lock across a socket `.await`, and
/// none ever blocks on one.
pub struct FramedBuffer {
    inner: Mutex<Inner>,
}

impl FramedBuffer {
    pub fn new() -> Self {
        FramedBuffer {
            inner: Mutex::new(Inner {
                blocks: VecDeque::new(),
                arena: Vec::new(),
            }),
        }
    }

    /// Appends a new block at the arena's tail. The previous tail, if any, must already be
    /// completed.
    pub fn begin_block(&self, opcode: Opcode) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(inner.blocks.back().map_or(true, |b| b.completed));
        let offset = inner.arena.len();
        inner.blocks.push_back(Block {
            opcode,
            offset,
            length: 0,
            completed: false,
        });
    }

    /// Appends `bytes` to the arena and grows the tail block's length to match.
    pub fn write(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.arena.extend_from_slice(bytes);
        if let Some(tail) = inner.blocks.back_mut() {
            tail.length += bytes.len();
        }
    }

    /// Marks the tail block completed.
    pub fn end_block(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tail) = inner.blocks.back_mut() {
            tail.completed = true;
        }
    }

    /// Appends one fully-formed block (used by `push`, where the whole message is known up
    /// front and there is no in-progress phase to go through).
    pub fn push_complete(&self, opcode: Opcode, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(inner.blocks.back().map_or(true, |b| b.completed));
        let offset = inner.arena.len();
        inner.arena.extend_from_slice(bytes);
        inner.blocks.push_back(Block {
            opcode,
            offset,
            length: bytes.len(),
            completed: true,
        });
    }

    /// Removes the tail block (which must be completed) and shrinks the arena back to its
    /// former offset. No other block's offset needs adjusting, since the tail is by
    /// construction the last thing in the arena. Used right after a completed message was
    /// handed to `on_message` and consumed inline.
    pub fn discard_tail(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tail) = inner.blocks.pop_back() {
            debug_assert!(tail.completed);
            inner.arena.truncate(tail.offset);
        }
    }

    /// The head block's opcode and length, iff it is completed.
    pub fn peek(&self) -> Option<(Opcode, usize)> {
        let inner = self.inner.lock().unwrap();
        inner
            .blocks
            .front()
            .filter(|b| b.completed)
            .map(|b| (b.opcode, b.length))
    }

    /// Copies the just-completed tail block's bytes without removing it, so the reader can hand
    /// them to `on_message` while the block still satisfies a later `peek`/`pop` if the host
    /// declines to consume them inline.
    pub fn tail_snapshot(&self) -> Option<(Opcode, Vec<u8>)> {
        let inner = self.inner.lock().unwrap();
        let tail = inner.blocks.back()?;
        if !tail.completed {
            return None;
        }
        Some((
            tail.opcode,
            inner.arena[tail.offset..tail.offset + tail.length].to_vec(),
        ))
    }

    /// Copies up to `dst.len()` bytes from the head block into `dst`, shrinking it by the
    /// number of bytes copied. If the head block becomes empty it is removed and every
    /// remaining block's offset is shifted down to match. Returns the number of bytes copied;
    /// `0` if the head block does not exist or is not yet completed.
    pub fn pop(&self, dst: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let Some(head) = inner.blocks.front().copied() else {
            return 0;
        };
        if !head.completed {
            return 0;
        }

        let n = dst.len().min(head.length);
        dst[..n].copy_from_slice(&inner.arena[head.offset..head.offset + n]);

        let head_mut = inner.blocks.front_mut().unwrap();
        head_mut.offset += n;
        head_mut.length -= n;

        if head_mut.length == 0 {
            inner.blocks.pop_front();
            inner.arena.drain(0..head.offset + n);
            for block in inner.blocks.iter_mut() {
                block.offset -= head.offset + n;
            }
        }

        n
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().blocks.is_empty()
    }
}

impl Default for FramedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_write_end_then_peek_and_pop() {
        let buf = FramedBuffer::new();
        buf.begin_block(Opcode::Text);
        assert_eq!(buf.peek(), None, "in-progress block must not be visible");

        buf.write(b"hello ");
        buf.write(b"world");
        buf.end_block();

        assert_eq!(buf.peek(), Some((Opcode::Text, 11)));

        let mut dst = [0u8; 11];
        let n = buf.pop(&mut dst);
        assert_eq!(n, 11);
        assert_eq!(&dst, b"hello world");
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_pops_drain_a_single_block_in_order() {
        let buf = FramedBuffer::new();
        buf.push_complete(Opcode::Binary, b"0123456789");

        let mut dst = [0u8; 4];
        assert_eq!(buf.pop(&mut dst), 4);
        assert_eq!(&dst, b"0123");
        assert_eq!(buf.peek(), Some((Opcode::Binary, 6)));

        assert_eq!(buf.pop(&mut dst), 4);
        assert_eq!(&dst, b"4567");

        let mut last = [0u8; 4];
        assert_eq!(buf.pop(&mut last), 2);
        assert_eq!(&last[..2], b"89");
        assert!(buf.is_empty());
    }

    #[test]
    fn pop_shifts_later_blocks_offsets() {
        let buf = FramedBuffer::new();
        buf.push_complete(Opcode::Text, b"first");
        buf.push_complete(Opcode::Binary, b"second");

        let mut dst = [0u8; 5];
        assert_eq!(buf.pop(&mut dst), 5);
        assert_eq!(&dst, b"first");

        assert_eq!(buf.peek(), Some((Opcode::Binary, 6)));
        let mut dst2 = [0u8; 6];
        assert_eq!(buf.pop(&mut dst2), 6);
        assert_eq!(&dst2, b"second");
    }

    #[test]
    fn discard_tail_removes_only_the_tail() {
        let buf = FramedBuffer::new();
        buf.push_complete(Opcode::Text, b"first");
        buf.push_complete(Opcode::Binary, b"second");

        buf.discard_tail();
        assert_eq!(buf.peek(), Some((Opcode::Text, 5)));

        let mut dst = [0u8; 5];
        assert_eq!(buf.pop(&mut dst), 5);
        assert!(buf.is_empty());
    }

    #[test]
    fn tail_snapshot_does_not_remove_the_block() {
        let buf = FramedBuffer::new();
        buf.push_complete(Opcode::Text, b"hi");

        let (opcode, bytes) = buf.tail_snapshot().unwrap();
        assert_eq!(opcode, Opcode::Text);
        assert_eq!(bytes, b"hi");

        assert_eq!(buf.peek(), Some((Opcode::Text, 2)));
    }

    #[test]
    fn fragment_reassembly_coalesces_into_a_single_block() {
        let buf = FramedBuffer::new();
        buf.begin_block(Opcode::Binary);
        buf.write(&[1, 2, 3]);
        buf.write(&[4, 5]);
        buf.end_block();

        assert_eq!(buf.peek(), Some((Opcode::Binary, 5)));
        let mut dst = [0u8; 5];
        assert_eq!(buf.pop(&mut dst), 5);
        assert_eq!(&dst, &[1, 2, 3, 4, 5]);
    }
}
