//! Coverage bitmaps and the per-sentence bitmap pool.
//!
//! Every bitmap used during one decode is interned in a [`BitmapPool`], so two
//! hypotheses cover the same words iff they hold the same [`BitmapId`].

use std::collections::HashMap;

use crate::options::Span;

const WORD_BITS: usize = 64;

/// Handle to a canonical bitmap inside a [`BitmapPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitmapId(u32);

impl BitmapId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-length bitset; a set bit means the source word is translated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoverageBitmap {
    len: usize,
    words: Box<[u64]>,
    covered: usize,
}

impl CoverageBitmap {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            words: vec![0u64; len.div_ceil(WORD_BITS)].into_boxed_slice(),
            covered: 0,
        }
    }

    /// Build a bitmap from explicit bits. `bits.len()` is the sentence length.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut bitmap = Self::new(bits.len());
        for (pos, _) in bits.iter().enumerate().filter(|(_, &b)| b) {
            bitmap.words[pos / WORD_BITS] |= 1u64 << (pos % WORD_BITS);
        }
        bitmap.covered = bits.iter().filter(|&&b| b).count();
        bitmap
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_set(&self, pos: usize) -> bool {
        pos < self.len && self.words[pos / WORD_BITS] & (1u64 << (pos % WORD_BITS)) != 0
    }

    pub fn words_covered(&self) -> usize {
        self.covered
    }

    pub fn is_complete(&self) -> bool {
        self.covered == self.len
    }

    /// Leftmost uncovered position, `None` when complete.
    pub fn first_gap(&self) -> Option<usize> {
        self.next_with(0, false)
    }

    /// True if any position of `span` is already covered.
    pub fn overlaps(&self, span: Span) -> bool {
        (span.start..=span.end).any(|pos| self.is_set(pos))
    }

    /// Maximal uncovered runs, left to right.
    pub fn gaps(&self) -> Gaps<'_> {
        Gaps {
            bitmap: self,
            pos: 0,
        }
    }

    /// Copy with every position of `span` set.
    pub fn with_span(&self, span: Span) -> Self {
        let mut next = self.clone();
        for pos in span.start..=span.end.min(self.len.saturating_sub(1)) {
            let mask = 1u64 << (pos % WORD_BITS);
            let word = &mut next.words[pos / WORD_BITS];
            if *word & mask == 0 {
                *word |= mask;
                next.covered += 1;
            }
        }
        next
    }

    /// First position `>= from` whose bit equals `value`.
    fn next_with(&self, from: usize, value: bool) -> Option<usize> {
        if from >= self.len {
            return None;
        }
        let mut index = from / WORD_BITS;
        // Bits below `from` in the first word are masked out.
        let mut word = if value {
            self.words[index]
        } else {
            !self.words[index]
        } & (!0u64 << (from % WORD_BITS));
        loop {
            if word != 0 {
                let pos = index * WORD_BITS + word.trailing_zeros() as usize;
                return (pos < self.len).then_some(pos);
            }
            index += 1;
            if index >= self.words.len() {
                return None;
            }
            word = if value {
                self.words[index]
            } else {
                !self.words[index]
            };
        }
    }
}

/// Iterator over maximal uncovered runs of a bitmap.
pub struct Gaps<'a> {
    bitmap: &'a CoverageBitmap,
    pos: usize,
}

impl Iterator for Gaps<'_> {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        let start = self.bitmap.next_with(self.pos, false)?;
        let end = self
            .bitmap
            .next_with(start, true)
            .map_or(self.bitmap.len - 1, |covered| covered - 1);
        self.pos = end + 1;
        Some(Span::new(start, end))
    }
}

/// Interns bitmaps for one sentence and memoizes `(bitmap, span)` transitions.
///
/// Entries are never mutated or removed; the pool lives as long as the search.
pub struct BitmapPool {
    len: usize,
    bitmaps: Vec<CoverageBitmap>,
    index: HashMap<CoverageBitmap, BitmapId>,
    transitions: HashMap<(BitmapId, Span), BitmapId>,
}

impl BitmapPool {
    pub fn new(len: usize) -> Self {
        let mut pool = Self {
            len,
            bitmaps: Vec::new(),
            index: HashMap::new(),
            transitions: HashMap::new(),
        };
        pool.canonicalize(CoverageBitmap::new(len));
        pool
    }

    /// Sentence length every bitmap in this pool has.
    pub fn sentence_len(&self) -> usize {
        self.len
    }

    /// The all-uncovered bitmap.
    pub fn empty(&self) -> BitmapId {
        BitmapId(0)
    }

    pub fn canonicalize(&mut self, bitmap: CoverageBitmap) -> BitmapId {
        debug_assert_eq!(bitmap.len(), self.len);
        if let Some(&id) = self.index.get(&bitmap) {
            return id;
        }
        let id = BitmapId(self.bitmaps.len() as u32);
        self.bitmaps.push(bitmap.clone());
        self.index.insert(bitmap, id);
        id
    }

    pub fn canonicalize_bits(&mut self, bits: &[bool]) -> BitmapId {
        self.canonicalize(CoverageBitmap::from_bits(bits))
    }

    pub fn get(&self, id: BitmapId) -> &CoverageBitmap {
        &self.bitmaps[id.index()]
    }

    /// Bitmap reached by additionally covering `span`.
    ///
    /// Returns `None` if `span` overlaps `from` or runs past the sentence.
    pub fn transition(&mut self, from: BitmapId, span: Span) -> Option<BitmapId> {
        if let Some(&to) = self.transitions.get(&(from, span)) {
            return Some(to);
        }
        let bitmap = self.get(from);
        if span.end >= self.len || span.start > span.end || bitmap.overlaps(span) {
            return None;
        }
        let next = bitmap.with_span(span);
        let to = self.canonicalize(next);
        self.transitions.insert((from, span), to);
        Some(to)
    }

    /// Number of distinct bitmaps created so far.
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(pattern: &str) -> Vec<bool> {
        pattern.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_empty_bitmap() {
        let pool = BitmapPool::new(4);
        let empty = pool.get(pool.empty());
        assert_eq!(empty.len(), 4);
        assert_eq!(empty.words_covered(), 0);
        assert!(!empty.is_complete());
        assert_eq!(empty.first_gap(), Some(0));
        assert_eq!(empty.gaps().collect::<Vec<_>>(), vec![Span::new(0, 3)]);
    }

    #[test]
    fn test_canonicalize_same_pattern_same_id() {
        let mut pool = BitmapPool::new(5);
        let a = pool.canonicalize_bits(&bits("10100"));
        let b = pool.canonicalize_bits(&bits("10100"));
        let c = pool.canonicalize_bits(&bits("10101"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.canonicalize_bits(&bits("00000")), pool.empty());
    }

    #[test]
    fn test_transition_memoized_and_canonical() {
        let mut pool = BitmapPool::new(4);
        let empty = pool.empty();
        let a = pool.transition(empty, Span::new(0, 1)).unwrap();
        let b = pool.transition(a, Span::new(3, 3)).unwrap();
        // Same coverage reached in a different order.
        let c = pool.transition(empty, Span::new(3, 3)).unwrap();
        let d = pool.transition(c, Span::new(0, 1)).unwrap();
        assert_eq!(b, d);
        assert_eq!(pool.get(b).words_covered(), 3);
        assert_eq!(pool.transition(empty, Span::new(0, 1)), Some(a));
    }

    #[test]
    fn test_transition_rejects_overlap() {
        let mut pool = BitmapPool::new(4);
        let a = pool.transition(pool.empty(), Span::new(1, 2)).unwrap();
        assert_eq!(pool.transition(a, Span::new(2, 3)), None);
        assert_eq!(pool.transition(a, Span::new(3, 4)), None);
    }

    #[test]
    fn test_gaps_and_first_gap() {
        let bitmap = CoverageBitmap::from_bits(&bits("0110010"));
        assert_eq!(bitmap.first_gap(), Some(0));
        assert_eq!(
            bitmap.gaps().collect::<Vec<_>>(),
            vec![Span::new(0, 0), Span::new(3, 4), Span::new(6, 6)]
        );
        assert!(bitmap.overlaps(Span::new(0, 1)));
        assert!(!bitmap.overlaps(Span::new(3, 4)));

        let full = CoverageBitmap::from_bits(&bits("111"));
        assert!(full.is_complete());
        assert_eq!(full.first_gap(), None);
        assert_eq!(full.gaps().count(), 0);
    }

    #[test]
    fn test_long_bitmap_crosses_word_boundary() {
        let mut pool = BitmapPool::new(130);
        let a = pool.transition(pool.empty(), Span::new(0, 63)).unwrap();
        let b = pool.transition(a, Span::new(64, 70)).unwrap();
        let bitmap = pool.get(b);
        assert_eq!(bitmap.words_covered(), 71);
        assert_eq!(bitmap.first_gap(), Some(71));
        assert!(bitmap.is_set(64));
        assert!(!bitmap.is_set(129));
        assert_eq!(bitmap.gaps().collect::<Vec<_>>(), vec![Span::new(71, 129)]);
    }

    #[test]
    fn test_zero_length_sentence() {
        let pool = BitmapPool::new(0);
        let empty = pool.get(pool.empty());
        assert!(empty.is_complete());
        assert_eq!(empty.first_gap(), None);
        assert_eq!(empty.gaps().count(), 0);
    }
}
