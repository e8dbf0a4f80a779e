//! Per-pixel leaf assignments produced by the forest evaluator.

/// Identifier of a leaf within one tree of the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeafId(pub u32);

impl std::fmt::Display for LeafId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Leaf identifiers for every pixel, one per tree.
///
/// Stored pixel-major: the leaves of pixel `i` occupy
/// `leaves[i * tree_count..(i + 1) * tree_count]`.
#[derive(Debug, Clone)]
pub struct LeafImage {
    width: usize,
    height: usize,
    tree_count: usize,
    leaves: Vec<LeafId>,
}

impl LeafImage {
    /// Returns `None` if the buffer length does not match
    /// `width * height * tree_count`.
    pub fn new(width: usize, height: usize, tree_count: usize, leaves: Vec<LeafId>) -> Option<Self> {
        if tree_count == 0 || leaves.len() != width * height * tree_count {
            return None;
        }
        Some(Self {
            width,
            height,
            tree_count,
            leaves,
        })
    }

    /// Build from a tree-major buffer (`leaves[tree * pixels + pixel]`), the
    /// layout GPU forest evaluators usually emit.
    pub fn from_tree_major(
        width: usize,
        height: usize,
        tree_count: usize,
        leaves: &[LeafId],
    ) -> Option<Self> {
        let pixels = width * height;
        if tree_count == 0 || leaves.len() != pixels * tree_count {
            return None;
        }
        let mut pixel_major = Vec::with_capacity(leaves.len());
        for pixel in 0..pixels {
            for tree in 0..tree_count {
                pixel_major.push(leaves[tree * pixels + pixel]);
            }
        }
        Self::new(width, height, tree_count, pixel_major)
    }

    /// Build an image by evaluating `f(pixel, tree)` for every pixel and
    /// tree. A `tree_count` of zero is treated as one.
    pub fn from_fn(
        width: usize,
        height: usize,
        tree_count: usize,
        mut f: impl FnMut(usize, usize) -> LeafId,
    ) -> Self {
        let tree_count = tree_count.max(1);
        let mut leaves = Vec::with_capacity(width * height * tree_count);
        for pixel in 0..width * height {
            for tree in 0..tree_count {
                leaves.push(f(pixel, tree));
            }
        }
        Self {
            width,
            height,
            tree_count,
            leaves,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaves reached by pixel `index`, one per tree.
    pub fn leaves_at(&self, index: usize) -> &[LeafId] {
        let start = index * self.tree_count;
        &self.leaves[start..start + self.tree_count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_major_conversion() {
        // 2 pixels, 3 trees.
        let tree_major: Vec<_> = [10, 11, 20, 21, 30, 31].into_iter().map(LeafId).collect();
        let image = LeafImage::from_tree_major(2, 1, 3, &tree_major).unwrap();

        assert_eq!(image.leaves_at(0), &[LeafId(10), LeafId(20), LeafId(30)]);
        assert_eq!(image.leaves_at(1), &[LeafId(11), LeafId(21), LeafId(31)]);
    }

    #[test]
    fn test_from_fn_layout() {
        let image = LeafImage::from_fn(3, 1, 2, |pixel, tree| LeafId((pixel * 10 + tree) as u32));
        assert_eq!(image.leaves_at(2), &[LeafId(20), LeafId(21)]);
        assert_eq!(LeafImage::from_fn(2, 2, 0, |_, _| LeafId(0)).tree_count(), 1);
    }

    #[test]
    fn test_rejects_bad_shape() {
        assert!(LeafImage::new(2, 2, 1, vec![LeafId(0); 3]).is_none());
        assert!(LeafImage::new(2, 2, 0, Vec::new()).is_none());
    }
}
