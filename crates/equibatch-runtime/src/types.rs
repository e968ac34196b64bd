/// A sealed batch: indices in source order plus the footprint accumulated for them.
///
/// Invariant: `footprint` equals the sum of the lengths of `indices`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<I, F = u64> {
    indices: Vec<I>,
    footprint: F,
}

impl<I, F: Copy> Batch<I, F> {
    pub(crate) fn sealed(indices: Vec<I>, footprint: F) -> Self {
        Self { indices, footprint }
    }

    pub fn indices(&self) -> &[I] {
        &self.indices
    }

    pub fn into_indices(self) -> Vec<I> {
        self.indices
    }

    pub fn footprint(&self) -> F {
        self.footprint
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
