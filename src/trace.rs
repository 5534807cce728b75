//! In-memory access traces and a generator for synthetic ones.

use std::collections::BTreeMap;
use rand::prelude::*;
use rand::rngs::StdRng;
use crate::word::Word;

/// A single memory access made by some instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessRecord<T: Word> {
    /// Instruction (or stream) identifier
    pub key: T,

    /// Accessed value/address
    pub value: T,

    /// Difference from the previous value with the same key (zero on the
    /// first occurrence of a key)
    pub delta: T,
}

/// An ordered sequence of accesses.
#[derive(Clone, Debug, Default)]
pub struct AccessesDataset<T: Word> {
    records: Vec<AccessRecord<T>>,
    last: BTreeMap<T, T>,
}
impl<T: Word> AccessesDataset<T> {
    pub fn new() -> Self {
        Self { records: Vec::new(), last: BTreeMap::new() }
    }

    /// Build a dataset from (key, value) pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (T, T)>) -> Self {
        let mut res = Self::new();
        for (key, value) in pairs {
            res.push(key, value);
        }
        res
    }

    /// Append an access, computing its per-key delta.
    pub fn push(&mut self, key: T, value: T) {
        let delta = match self.last.insert(key, value) {
            Some(prev) => value.wrapping_sub(prev),
            None => T::zero(),
        };
        self.records.push(AccessRecord { key, value, delta });
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn as_slice(&self) -> &[AccessRecord<T>] { &self.records }
    pub fn iter(&self) -> std::slice::Iter<'_, AccessRecord<T>> {
        self.records.iter()
    }

    /// Number of distinct keys.
    pub fn num_unique_keys(&self) -> usize { self.last.len() }
}

/// Per-access output of the buffers (history cache + class dictionary) that
/// feed the SVM predictor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BufferRecord {
    /// Classes of the previous accesses made by the same instruction
    pub input_classes: Vec<i32>,

    /// Class of this access (-1 when unknown)
    pub output_class: i32,

    /// The instruction history was not in the cache
    pub is_cache_miss: bool,

    /// The access was not in the class dictionary
    pub is_dictionary_miss: bool,

    /// Both buffers hit, so the access is predictable
    pub is_valid: bool,
}
impl BufferRecord {
    /// Returns true if this access missed in either buffer.
    pub fn is_buffer_miss(&self) -> bool { !self.is_valid }
}

/// An ordered sequence of [`BufferRecord`]s.
#[derive(Clone, Debug, Default)]
pub struct BuffersDataset {
    records: Vec<BufferRecord>,
}
impl BuffersDataset {
    pub fn new() -> Self { Self { records: Vec::new() } }
    pub fn push(&mut self, record: BufferRecord) { self.records.push(record); }
    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn as_slice(&self) -> &[BufferRecord] { &self.records }
    pub fn iter(&self) -> std::slice::Iter<'_, BufferRecord> {
        self.records.iter()
    }
}
impl FromIterator<BufferRecord> for BuffersDataset {
    fn from_iter<I: IntoIterator<Item = BufferRecord>>(iter: I) -> Self {
        Self { records: iter.into_iter().collect() }
    }
}

/// A pre-determined pattern of values produced by one access stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamPattern {
    /// Always the same value.
    Constant,

    /// A fixed stride between consecutive values.
    Stride(i64),

    /// A repeating sequence of deltas.
    Cycle(Vec<i64>),

    /// Uniformly random offsets from the base within some span.
    Random(u64),
}

/// Order in which streams are interleaved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    RoundRobin,
    Random,
}

#[derive(Clone, Debug)]
struct Stream {
    key: u64,
    base: u64,
    cur: u64,
    ctr: usize,
    pattern: StreamPattern,
}
impl Stream {
    fn next_value(&mut self, rng: &mut StdRng) -> u64 {
        let res = self.cur;
        self.cur = match &self.pattern {
            StreamPattern::Constant => self.cur,
            StreamPattern::Stride(s) => self.cur.wrapping_add(*s as u64),
            StreamPattern::Cycle(deltas) => {
                let d = deltas[self.ctr % deltas.len()];
                self.cur.wrapping_add(d as u64)
            },
            StreamPattern::Random(span) => {
                self.base.wrapping_add(rng.gen_range(0..(*span).max(1)))
            },
        };
        self.ctr += 1;
        res
    }
}

/// Generates synthetic traces from a set of access streams, each bound to
/// an instruction key.
#[derive(Clone, Debug)]
pub struct TraceGenerator {
    streams: Vec<Stream>,
    schedule: Schedule,
    rng: StdRng,
}
impl TraceGenerator {
    pub fn new(schedule: Schedule, seed: u64) -> Self {
        Self {
            streams: Vec::new(),
            schedule,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Add a stream of accesses made by instruction `key`, starting at
    /// `base`. An empty [`StreamPattern::Cycle`] behaves like
    /// [`StreamPattern::Constant`].
    pub fn add_stream(&mut self, key: u64, base: u64, pattern: StreamPattern) {
        let pattern = match pattern {
            StreamPattern::Cycle(d) if d.is_empty() => StreamPattern::Constant,
            p => p,
        };
        self.streams.push(Stream { key, base, cur: base, ctr: 0, pattern });
    }

    /// A generator with `num_streams` streams cycling through every kind of
    /// [`StreamPattern`], one instruction every 4 bytes from `0x40_0000`.
    pub fn mixed(num_streams: usize, schedule: Schedule, seed: u64) -> Self {
        let mut res = Self::new(schedule, seed);
        for idx in 0..num_streams {
            let i = idx as u64;
            let pattern = match idx % 4 {
                0 => StreamPattern::Stride(8 * (1 + (idx as i64 % 3))),
                1 => StreamPattern::Cycle(vec![16, 16, -32]),
                2 => StreamPattern::Constant,
                _ => StreamPattern::Random(1 << 12),
            };
            res.add_stream(0x40_0000 + 4 * i, 0x1000_0000 + (i << 16), pattern);
        }
        res
    }

    pub fn num_streams(&self) -> usize { self.streams.len() }

    /// Generate `len` accesses.
    pub fn generate<T: Word>(&mut self, len: usize) -> AccessesDataset<T> {
        let mut res = AccessesDataset::new();
        if self.streams.is_empty() {
            return res;
        }
        for i in 0..len {
            let idx = match self.schedule {
                Schedule::RoundRobin => i % self.streams.len(),
                Schedule::Random => self.rng.gen_range(0..self.streams.len()),
            };
            let stream = &mut self.streams[idx];
            let value = stream.next_value(&mut self.rng);
            res.push(T::from_key(stream.key), T::from_key(value));
        }
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deltas_are_per_key() {
        let d = AccessesDataset::<u64>::from_pairs([
            (1, 100), (2, 500), (1, 108), (2, 496), (1, 116),
        ]);
        let deltas: Vec<u64> = d.iter().map(|r| r.delta).collect();
        assert_eq!(deltas, vec![0, 0, 8, 496u64.wrapping_sub(500), 8]);
        assert_eq!(d.num_unique_keys(), 2);
    }

    #[test]
    fn round_robin_streams() {
        let mut g = TraceGenerator::new(Schedule::RoundRobin, 0);
        g.add_stream(0x400, 0x1000, StreamPattern::Stride(8));
        g.add_stream(0x404, 0x2000, StreamPattern::Cycle(vec![4, -4]));
        g.add_stream(0x408, 0x3000, StreamPattern::Constant);
        let d: AccessesDataset<u64> = g.generate(9);
        let values: Vec<u64> = d.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![
            0x1000, 0x2000, 0x3000,
            0x1008, 0x2004, 0x3000,
            0x1010, 0x2000, 0x3000,
        ]);
    }

    #[test]
    fn mixed_streams() {
        let mut g = TraceGenerator::mixed(8, Schedule::RoundRobin, 0);
        assert_eq!(g.num_streams(), 8);
        let d: AccessesDataset<u64> = g.generate(80);
        assert_eq!(d.num_unique_keys(), 8);
        // The first stream strides by 8
        let first: Vec<u64> = d.iter().filter(|r| r.key == 0x40_0000)
            .skip(1).map(|r| r.delta).collect();
        assert!(first.iter().all(|&d| d == 8));
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let build = || {
            let mut g = TraceGenerator::new(Schedule::Random, 7);
            g.add_stream(1, 0, StreamPattern::Random(1 << 16));
            g.add_stream(2, 0, StreamPattern::Stride(1));
            g.generate::<u32>(64)
        };
        assert_eq!(build().as_slice(), build().as_slice());
    }
}
