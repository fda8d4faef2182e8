//! Compressed sparse row adjacency tables.
//!
//! A [`Csr`] maps each row index (typically a node) to a contiguous slice of
//! targets (loops or edges). Rows are filled from an unordered pair list with a
//! stable counting sort, so the order of targets within a row is the order in
//! which the pairs were produced.

/// CSR-style adjacency table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Csr<T> {
    /// Offsets into `targets`; `offsets.len() == rows + 1`.
    pub offsets: Vec<usize>,
    pub targets: Vec<T>,
}

impl<T: Copy> Csr<T> {
    /// Build a table with `rows` rows from `(row, target)` pairs.
    ///
    /// Pairs whose row is out of range are ignored.
    pub fn from_pairs<I>(rows: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, T)>,
    {
        let pairs: Vec<(usize, T)> = pairs.into_iter().filter(|(r, _)| *r < rows).collect();
        let mut offsets = vec![0usize; rows + 1];
        for (r, _) in &pairs {
            offsets[r + 1] += 1;
        }
        for i in 0..rows {
            offsets[i + 1] += offsets[i];
        }
        let mut cursor = offsets.clone();
        let mut slots: Vec<Option<T>> = vec![None; pairs.len()];
        for (r, t) in pairs {
            slots[cursor[r]] = Some(t);
            cursor[r] += 1;
        }
        Self {
            offsets,
            targets: slots.into_iter().flatten().collect(),
        }
    }

    /// Targets of row `i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[T] {
        &self.targets[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Number of targets of row `i`.
    #[inline]
    pub fn degree(&self, i: usize) -> usize {
        self.offsets[i + 1] - self.offsets[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_rows() {
        let csr = Csr::from_pairs(3, [(2, 'a'), (0, 'b'), (2, 'c'), (0, 'd'), (5, 'x')]);
        assert_eq!(csr.rows(), 3);
        assert_eq!(csr.neighbors(0), &['b', 'd']);
        assert!(csr.neighbors(1).is_empty());
        assert_eq!(csr.neighbors(2), &['a', 'c']);
        assert_eq!(csr.degree(2), 2);
    }
}
