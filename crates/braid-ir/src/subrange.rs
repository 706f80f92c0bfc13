//! Image subresource ranges and set algebra over them.
//!
//! A subrange is a rectangle in (mip level, array layer) space. The
//! SSA write walk needs to know whether a requested range is covered
//! by, overlaps, or is disjoint from the range a slice carved out, so
//! ranges support intersection and difference as rectangle sets.

/// Count value meaning "all remaining levels/layers".
pub const REMAINING: u32 = u32::MAX;

/// A rectangular subresource range of an image.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ImageSubrange {
    /// First mip level.
    pub base_level: u32,
    /// Number of mip levels, or [`REMAINING`].
    pub level_count: u32,
    /// First array layer.
    pub base_layer: u32,
    /// Number of array layers, or [`REMAINING`].
    pub layer_count: u32,
}

impl Default for ImageSubrange {
    fn default() -> Self {
        Self::all()
    }
}

/// Exclusive interval end; `REMAINING` counts extend to infinity.
fn end(base: u32, count: u32) -> u64 {
    if count == REMAINING {
        u64::MAX
    } else {
        u64::from(base) + u64::from(count)
    }
}

fn count_from(base: u32, end: u64) -> u32 {
    if end == u64::MAX {
        REMAINING
    } else {
        (end - u64::from(base)) as u32
    }
}

impl ImageSubrange {
    /// The whole image: every level of every layer.
    pub fn all() -> Self {
        Self {
            base_level: 0,
            level_count: REMAINING,
            base_layer: 0,
            layer_count: REMAINING,
        }
    }

    /// Returns `true` if the range selects no subresources.
    pub fn is_empty(&self) -> bool {
        self.level_count == 0 || self.layer_count == 0
    }

    fn level_end(&self) -> u64 {
        end(self.base_level, self.level_count)
    }

    fn layer_end(&self) -> u64 {
        end(self.base_layer, self.layer_count)
    }

    /// Rectangle intersection. `None` when disjoint.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let base_level = self.base_level.max(other.base_level);
        let level_end = self.level_end().min(other.level_end());
        let base_layer = self.base_layer.max(other.base_layer);
        let layer_end = self.layer_end().min(other.layer_end());
        if u64::from(base_level) >= level_end || u64::from(base_layer) >= layer_end {
            return None;
        }
        Some(Self {
            base_level,
            level_count: count_from(base_level, level_end),
            base_layer,
            layer_count: count_from(base_layer, layer_end),
        })
    }

    /// Removes `other` from `self`, yielding at most four disjoint
    /// remainder rectangles.
    pub fn difference(&self, other: &Self) -> Vec<Self> {
        let Some(overlap) = self.intersect(other) else {
            return vec![*self];
        };

        let mut pieces = Vec::new();

        // Levels below the overlap, full layer extent.
        if self.base_level < overlap.base_level {
            pieces.push(Self {
                base_level: self.base_level,
                level_count: overlap.base_level - self.base_level,
                base_layer: self.base_layer,
                layer_count: self.layer_count,
            });
        }
        // Levels above the overlap, full layer extent.
        if overlap.level_end() < self.level_end() {
            let base_level = overlap.level_end() as u32;
            pieces.push(Self {
                base_level,
                level_count: count_from(base_level, self.level_end()),
                base_layer: self.base_layer,
                layer_count: self.layer_count,
            });
        }
        // Layers beside the overlap, within the overlap's level band.
        if self.base_layer < overlap.base_layer {
            pieces.push(Self {
                base_level: overlap.base_level,
                level_count: overlap.level_count,
                base_layer: self.base_layer,
                layer_count: overlap.base_layer - self.base_layer,
            });
        }
        if overlap.layer_end() < self.layer_end() {
            let base_layer = overlap.layer_end() as u32;
            pieces.push(Self {
                base_level: overlap.base_level,
                level_count: overlap.level_count,
                base_layer,
                layer_count: count_from(base_layer, self.layer_end()),
            });
        }

        pieces
    }
}

/// A set of disjoint [`ImageSubrange`] rectangles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultiSubrange(Vec<ImageSubrange>);

impl MultiSubrange {
    /// The unrestricted set: the whole image.
    pub fn all() -> Self {
        Self(vec![ImageSubrange::all()])
    }

    /// The empty set.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns `true` if the set selects no subresources.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The member rectangles.
    pub fn ranges(&self) -> &[ImageSubrange] {
        &self.0
    }

    /// Intersects the set with a single rectangle.
    pub fn intersect(&self, range: &ImageSubrange) -> Self {
        Self(
            self.0
                .iter()
                .filter_map(|r| r.intersect(range))
                .filter(|r| !r.is_empty())
                .collect(),
        )
    }

    /// Removes every rectangle of `other` from the set.
    pub fn difference(&self, other: &Self) -> Self {
        let mut current = self.0.clone();
        for sub in &other.0 {
            current = current
                .into_iter()
                .flat_map(|r| r.difference(sub))
                .filter(|r| !r.is_empty())
                .collect();
        }
        Self(current)
    }
}

impl From<ImageSubrange> for MultiSubrange {
    fn from(range: ImageSubrange) -> Self {
        if range.is_empty() {
            Self::empty()
        } else {
            Self(vec![range])
        }
    }
}
