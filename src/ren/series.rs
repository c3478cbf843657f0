// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/series.rs

// Series: variable length buffers of fixed width elements with a
// biased head and a terminator slot, plus the header information
// (flags, link, misc) their consumers attach to them.

// <>

use super::cell::Cell;
use super::func::Dispatcher;
use super::symtab::Sym;

/// Handle to a series in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId(pub u32);

/// Largest head bias before the content is moved back down
pub const MAX_BIAS: usize = u16::MAX as usize;

/// Element types a buffer may hold, each with its terminator value
pub trait Element: Copy + std::fmt::Debug {
    const TERM: Self;

    fn is_term(&self) -> bool;
}

impl Element for u8 {
    const TERM: u8 = 0;

    fn is_term(&self) -> bool {
        *self == 0
    }
}

impl Element for u32 {
    const TERM: u32 = 0;

    fn is_term(&self) -> bool {
        *self == 0
    }
}

impl Element for Cell {
    const TERM: Cell = Cell::END;

    fn is_term(&self) -> bool {
        self.is_end()
    }
}

/// Storage for one series.
///
/// The allocation holds `rest + 1` elements: `bias` hidden elements at
/// the front, `len` live ones, the terminator, then spare room. The
/// live region always starts at physical index `bias`.
#[derive(Debug, Clone)]
pub struct Buffer<T: Element> {
    data: Vec<T>,
    bias: usize,
    len: usize,
}

impl<T: Element> Buffer<T> {
    pub fn with_capacity(cap: usize) -> Self {
        Buffer {
            data: vec![T::TERM; cap + 1],
            bias: 0,
            len: 0,
        }
    }

    pub fn from_slice(src: &[T]) -> Self {
        let mut out = Buffer::with_capacity(src.len());
        out.data[..src.len()].copy_from_slice(src);
        out.len = src.len();
        out.terminate();
        out
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated capacity in elements, counting the bias
    #[inline(always)]
    pub fn rest(&self) -> usize {
        self.data.len() - 1
    }

    #[inline(always)]
    pub fn bias(&self) -> usize {
        self.bias
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[self.bias..self.bias + self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data[self.bias..self.bias + self.len]
    }

    /// Element at `i`, or the terminator at and past the tail
    #[inline(always)]
    pub fn get(&self, i: usize) -> T {
        if i < self.len {
            self.data[self.bias + i]
        } else {
            T::TERM
        }
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, val: T) {
        assert!(i < self.len, "set past tail of series");
        self.data[self.bias + i] = val;
    }

    /// Writes the terminator after the last element
    #[inline(always)]
    pub fn terminate(&mut self) {
        let tail = self.bias + self.len;
        self.data[tail] = T::TERM;
    }

    /// Guarantees room for `extra` more elements past the tail
    pub fn reserve(&mut self, extra: usize) {
        if self.bias + self.len + extra <= self.rest() {
            return;
        }
        // geometric growth keeps repeated append amortized O(1)
        let need = self.len + extra;
        let cap = need.max(self.len * 2).max(4);
        let mut data = vec![T::TERM; cap + 1];
        data[..self.len].copy_from_slice(self.as_slice());
        self.data = data;
        self.bias = 0;
    }

    /// Opens a gap of `n` elements at index `i`, without terminating
    pub fn expand_at(&mut self, i: usize, n: usize) {
        assert!(i <= self.len);
        if n == 0 {
            return;
        }
        if i == 0 && n <= self.bias {
            // reuse bias room at the head
            self.bias -= n;
            self.len += n;
            return;
        }
        self.reserve(n);
        let start = self.bias + i;
        let end = self.bias + self.len;
        self.data.copy_within(start..end, start + n);
        self.len += n;
    }

    /// Copies `src` in at index `i`; leaves termination to the caller
    pub fn insert(&mut self, i: usize, src: &[T]) {
        self.expand_at(i, src.len());
        let start = self.bias + i;
        self.data[start..start + src.len()].copy_from_slice(src);
    }

    /// Appends `src` keeping `extra` spare elements, and terminates
    pub fn append_extra(&mut self, src: &[T], extra: usize) {
        self.reserve(src.len() + extra);
        let tail = self.bias + self.len;
        self.data[tail..tail + src.len()].copy_from_slice(src);
        self.len += src.len();
        self.terminate();
    }

    pub fn push(&mut self, val: T) {
        self.append_extra(&[val], 0)
    }

    /// Removes `n` elements at `i`. Head removal only moves the bias.
    pub fn remove(&mut self, i: usize, n: usize) {
        let n = n.min(self.len.saturating_sub(i));
        if n == 0 {
            return;
        }
        if i == 0 {
            self.bias += n;
            self.len -= n;
            if self.bias > MAX_BIAS {
                self.unbias();
            }
            return;
        }
        let start = self.bias + i;
        let end = self.bias + self.len;
        self.data.copy_within(start + n..end, start);
        self.len -= n;
        self.terminate();
    }

    /// Moves the content back to the front of the allocation
    pub fn unbias(&mut self) {
        if self.bias == 0 {
            return;
        }
        let (b, l) = (self.bias, self.len);
        self.data.copy_within(b..b + l, 0);
        self.bias = 0;
        self.terminate();
    }

    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
            self.terminate();
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.bias = 0;
        self.terminate();
    }

    /// The bias/rest/terminator invariants
    pub fn check(&self) -> bool {
        self.bias + self.len <= self.rest() && self.data[self.bias + self.len].is_term()
    }
}

/// Element storage of a series, by width
#[derive(Debug, Clone)]
pub enum Content {
    /// Cells, terminated by an end cell
    Array(Buffer<Cell>),
    /// Bytes: binaries, bitsets, and strings whose codepoints fit
    /// in Latin-1
    Bytes(Buffer<u8>),
    /// Full codepoints, for strings that outgrew Latin-1
    Wide(Buffer<u32>),
}

impl Content {
    pub fn len(&self) -> usize {
        match self {
            Content::Array(b) => b.len(),
            Content::Bytes(b) => b.len(),
            Content::Wide(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element width in bytes
    pub fn width(&self) -> usize {
        match self {
            Content::Array(_) => std::mem::size_of::<Cell>(),
            Content::Bytes(_) => 1,
            Content::Wide(_) => 4,
        }
    }

    pub fn check(&self) -> bool {
        match self {
            Content::Array(b) => b.check(),
            Content::Bytes(b) => b.check(),
            Content::Wide(b) => b.check(),
        }
    }
}

/// Consumer-specific pointer kept in a series header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    None,
    /// Varlist: its keylist
    Keylist(SeriesId),
    /// Paramlist: the meta object, if any
    Meta(Option<SeriesId>),
    /// Body holder: the specialization exemplar, if any
    Exemplar(Option<SeriesId>),
    /// Scanned array: source file
    File(Sym),
}

/// Second consumer-specific slot in a series header
#[derive(Debug, Clone, Copy)]
pub enum Misc {
    None,
    /// Paramlist: the facade used as keylist of pushed frames
    Facade(SeriesId),
    /// Body holder: how the function runs
    Dispatcher(Dispatcher),
    /// Scanned array: line it started on
    Line(u32),
}

/// Series info flags
pub mod flag {
    pub const VARLIST: u16 = 1 << 0;
    pub const KEYLIST: u16 = 1 << 1;
    pub const PARAMLIST: u16 = 1 << 2;
    /// Temporarily read-only, e.g. while being iterated
    pub const LOCKED: u16 = 1 << 3;
    /// Permanently, deeply read-only
    pub const FROZEN: u16 = 1 << 4;
    /// Read-only by request of PROTECT
    pub const PROTECTED: u16 = 1 << 5;
    /// Varlist of a frame whose call has not finished
    pub const RUNNING: u16 = 1 << 6;
    pub const MANAGED: u16 = 1 << 7;
    pub const FILE_LINE: u16 = 1 << 8;
    /// Keylist referenced by more than one varlist
    pub const SHARED_KEYLIST: u16 = 1 << 9;
    /// Map: alternating key and value cells
    pub const MAP: u16 = 1 << 10;
    /// Body holder array
    pub const BODY_HOLDER: u16 = 1 << 11;
}

#[derive(Debug, Clone)]
pub struct Series {
    pub content: Content,
    pub info: u16,
    pub link: Link,
    pub misc: Misc,
    pub(crate) marked: bool,
}

impl Series {
    pub fn new(content: Content) -> Self {
        Series {
            content,
            info: 0,
            link: Link::None,
            misc: Misc::None,
            marked: false,
        }
    }

    #[inline(always)]
    pub fn has(&self, flag: u16) -> bool {
        self.info & flag != 0
    }

    #[inline(always)]
    pub fn set(&mut self, flag: u16) {
        self.info |= flag
    }

    #[inline(always)]
    pub fn clear(&mut self, flag: u16) {
        self.info &= !flag
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn is_array(&self) -> bool {
        matches!(self.content, Content::Array(_))
    }

    pub fn is_read_only(&self) -> bool {
        self.has(flag::LOCKED | flag::FROZEN | flag::PROTECTED)
    }

    pub fn array(&self) -> &Buffer<Cell> {
        match &self.content {
            Content::Array(b) => b,
            _ => panic!("array access to non-array series"),
        }
    }

    pub fn array_mut(&mut self) -> &mut Buffer<Cell> {
        match &mut self.content {
            Content::Array(b) => b,
            _ => panic!("array access to non-array series"),
        }
    }

    pub fn bytes(&self) -> &Buffer<u8> {
        match &self.content {
            Content::Bytes(b) => b,
            _ => panic!("byte access to non-byte series"),
        }
    }

    pub fn bytes_mut(&mut self) -> &mut Buffer<u8> {
        match &mut self.content {
            Content::Bytes(b) => b,
            _ => panic!("byte access to non-byte series"),
        }
    }

    /// Codepoint at `i` of a string series, zero past the tail
    pub fn char_at(&self, i: usize) -> u32 {
        match &self.content {
            Content::Bytes(b) => b.get(i) as u32,
            Content::Wide(w) => w.get(i),
            Content::Array(_) => panic!("char access to array"),
        }
    }

    /// Codepoints from `from` to the tail
    pub fn chars_from(&self, from: usize) -> Vec<u32> {
        match &self.content {
            Content::Bytes(b) => b.as_slice().get(from..).unwrap_or(&[]).iter().map(|c| *c as u32).collect(),
            Content::Wide(w) => w.as_slice().get(from..).unwrap_or(&[]).to_vec(),
            Content::Array(_) => panic!("char access to array"),
        }
    }

    /// Text from `from` to the tail of a string series
    pub fn text_from(&self, from: usize) -> String {
        self.chars_from(from)
            .into_iter()
            .map(|c| char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// Widens a Latin-1 string so it can hold any codepoint
    pub fn widen(&mut self) {
        if let Content::Bytes(b) = &self.content {
            let wide: Vec<u32> = b.as_slice().iter().map(|c| *c as u32).collect();
            self.content = Content::Wide(Buffer::from_slice(&wide));
        }
    }

    /// Inserts codepoints into a string series, widening as needed
    pub fn insert_chars(&mut self, i: usize, chars: &[u32]) {
        if chars.iter().any(|c| *c > 0xFF) {
            self.widen();
        }
        match &mut self.content {
            Content::Bytes(b) => {
                let src: Vec<u8> = chars.iter().map(|c| *c as u8).collect();
                b.insert(i, &src);
                b.terminate();
            }
            Content::Wide(w) => {
                w.insert(i, chars);
                w.terminate();
            }
            Content::Array(_) => panic!("char insert into array"),
        }
    }

    pub fn set_char(&mut self, i: usize, c: u32) {
        if c > 0xFF {
            self.widen();
        }
        match &mut self.content {
            Content::Bytes(b) => b.set(i, c as u8),
            Content::Wide(w) => w.set(i, c),
            Content::Array(_) => panic!("char write into array"),
        }
    }

    pub fn remove(&mut self, i: usize, n: usize) {
        match &mut self.content {
            Content::Array(b) => b.remove(i, n),
            Content::Bytes(b) => b.remove(i, n),
            Content::Wide(w) => w.remove(i, n),
        }
    }

    pub fn truncate(&mut self, len: usize) {
        match &mut self.content {
            Content::Array(b) => b.truncate(len),
            Content::Bytes(b) => b.truncate(len),
            Content::Wide(w) => w.truncate(len),
        }
    }

    /// Reverses `n` elements starting at `i`
    pub fn reverse(&mut self, i: usize, n: usize) {
        let end = (i + n).min(self.len());
        if i >= end {
            return;
        }
        match &mut self.content {
            Content::Array(b) => b.as_mut_slice()[i..end].reverse(),
            Content::Bytes(b) => b.as_mut_slice()[i..end].reverse(),
            Content::Wide(w) => w.as_mut_slice()[i..end].reverse(),
        }
    }
}

#[cfg(test)]
mod buffer_tests {
    use super::*;

    #[test]
    fn append_terminates() {
        let mut b: Buffer<u8> = Buffer::with_capacity(2);
        b.append_extra(b"hello", 3);
        assert_eq!(b.as_slice(), b"hello");
        assert!(b.rest() >= b.len() + 3);
        assert!(b.check());
    }

    #[test]
    fn insert_then_remove_is_identity() {
        let mut b = Buffer::from_slice(&[1u32, 2, 3, 4, 5]);
        for i in 0..=5 {
            let before = b.as_slice().to_vec();
            b.insert(i, &[9, 9, 9]);
            b.terminate();
            assert!(b.check());
            b.remove(i, 3);
            assert!(b.check());
            assert_eq!(b.as_slice(), &before[..]);
        }
    }

    #[test]
    fn head_removal_uses_bias() {
        let mut b = Buffer::from_slice(b"abcdef");
        let rest = b.rest();
        b.remove(0, 2);
        assert_eq!(b.bias(), 2);
        assert_eq!(b.as_slice(), b"cdef");
        assert_eq!(b.rest(), rest);
        assert!(b.check());

        // head insertion reclaims the bias without moving data
        b.insert(0, b"xy");
        b.terminate();
        assert_eq!(b.bias(), 0);
        assert_eq!(b.as_slice(), b"xycdef");

        b.remove(0, 3);
        b.unbias();
        assert_eq!(b.bias(), 0);
        assert_eq!(b.as_slice(), b"def");
        assert!(b.check());
    }

    #[test]
    fn bias_overflow_rebiases() {
        let mut b: Buffer<u8> = Buffer::with_capacity(0);
        let data = vec![7u8; MAX_BIAS + 10];
        b.append_extra(&data, 0);
        for _ in 0..MAX_BIAS + 5 {
            b.remove(0, 1);
            assert!(b.bias() <= MAX_BIAS);
            assert!(b.check());
        }
        assert_eq!(b.len(), 5);
    }

    #[test]
    fn arrays_end_in_end_cells() {
        let mut b: Buffer<Cell> = Buffer::with_capacity(1);
        for i in 0..10 {
            b.push(Cell::integer(i));
        }
        assert!(b.get(10).is_end());
        b.remove(3, 4);
        assert!(b.get(b.len()).is_end());
        assert_eq!(b.get(3).int(), 7);
        assert!(b.check());
    }

    #[test]
    fn strings_widen() {
        let mut s = Series::new(Content::Bytes(Buffer::from_slice(b"ab")));
        s.insert_chars(1, &[0x263A]);
        assert!(matches!(s.content, Content::Wide(_)));
        assert_eq!(s.text_from(0), "a\u{263A}b");
        assert!(s.content.check());

        s.set_char(0, 0x1F600);
        assert_eq!(s.char_at(0), 0x1F600);
        assert_eq!(s.text_from(0), "\u{1F600}\u{263A}b");
    }
}
