use smallvec::SmallVec;

/// A mutable sequence of non-negative integers with indexed prefix-sum
/// queries.
///
/// Each piece in the tree carries one of these to map intra-piece byte
/// offsets to line indices and back: entry *i* is the byte length of the
/// *i*-th line inside the piece (including its `\n`, except possibly the
/// trailing fragment). Lookups run against a cached prefix array that is
/// rebuilt from the first modified index after every edit, so reads stay
/// `O(log n)` and cheap edits near the tail don't rescan the whole vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSum {
    /// Individual values. Inline storage covers the common case: pieces
    /// produced by typed edits rarely span more than a few lines.
    values: SmallVec<[usize; 4]>,
    /// `prefix[i]` is the sum of `values[0..=i]`.
    prefix: Vec<usize>,
}

impl PrefixSum {
    pub fn new() -> Self {
        PrefixSum {
            values: SmallVec::new(),
            prefix: Vec::new(),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = usize>) -> Self {
        let mut sum = PrefixSum {
            values: values.into_iter().collect(),
            prefix: Vec::new(),
        };
        sum.rebuild_from(0);
        sum
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> usize {
        self.values[index]
    }

    /// Sum of all values.
    pub fn total(&self) -> usize {
        self.prefix.last().copied().unwrap_or(0)
    }

    /// Sum of `values[0..=index]`.
    pub fn accumulated_value(&self, index: usize) -> usize {
        self.prefix[index]
    }

    /// Sum of `values[0..index]`, i.e. the start offset of entry `index`.
    pub fn start_of(&self, index: usize) -> usize {
        if index == 0 {
            0
        } else {
            self.prefix[index - 1]
        }
    }

    /// Locate the entry containing `offset`.
    ///
    /// Returns `(index, remainder)` such that
    /// `start_of(index) <= offset < accumulated_value(index)`. An `offset`
    /// at or past the total sum clamps to the end of the last entry, so a
    /// cursor at the very end of a piece resolves to its final line.
    pub fn index_of(&self, offset: usize) -> (usize, usize) {
        if self.values.is_empty() {
            return (0, 0);
        }
        if offset >= self.total() {
            let last = self.values.len() - 1;
            return (last, self.values[last]);
        }
        // First index whose accumulated value exceeds the offset.
        let index = self.prefix.partition_point(|&acc| acc <= offset);
        (index, offset - self.start_of(index))
    }

    pub fn change_value(&mut self, index: usize, value: usize) {
        if self.values[index] == value {
            return;
        }
        self.values[index] = value;
        self.rebuild_from(index);
    }

    pub fn insert_values(&mut self, index: usize, values: &[usize]) {
        if values.is_empty() {
            return;
        }
        self.values.insert_from_slice(index, values);
        self.rebuild_from(index);
    }

    pub fn remove_values(&mut self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        self.values.drain(index..index + count);
        self.rebuild_from(index);
    }

    /// Append a single value.
    pub fn push(&mut self, value: usize) {
        self.values.push(value);
        let base = self.prefix.last().copied().unwrap_or(0);
        self.prefix.push(base + value);
    }

    /// Iterate the raw values.
    pub fn values(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.iter().copied()
    }

    fn rebuild_from(&mut self, index: usize) {
        self.prefix.truncate(index);
        let mut acc = if index == 0 {
            0
        } else {
            self.prefix[index - 1]
        };
        for &v in &self.values[index..] {
            acc += v;
            self.prefix.push(acc);
        }
    }
}

impl Default for PrefixSum {
    fn default() -> Self {
        Self::new()
    }
}
