use crate::bvh::bbox::BBox;
use crate::bvh::sah;
use crate::bvh::{BVHNode, BuildError, BuildOptions, BuildStats, PrimitiveSet};

// The traversal stack holds depth + 1 entries worst case, so the depth cap
// is bounded by the stack capacity no matter what the options ask for.
const DEPTH_LIMIT: u32 = super::TRAVERSAL_STACK_SIZE as u32 - 2;

#[derive(Debug)]
pub struct BuiltTree {
    pub nodes: Vec<BVHNode>,
    pub indices: Vec<u32>,
    pub scene_bounds: BBox,
    pub stats: BuildStats,
}

pub struct BVHBuilder<'a, P: PrimitiveSet> {
    prims: &'a P,
    options: BuildOptions,
    max_depth: u32,
    nodes: Vec<BVHNode>,
    indices: Vec<u32>,
    bbox_cache: Option<Vec<BBox>>,
    stats: BuildStats,
}

impl<'a, P: PrimitiveSet> BVHBuilder<'a, P> {
    /// Top-down binned-SAH build over `num_prims` primitives described by
    /// `prims`. Produces a preorder flat node array and the primitive-id
    /// permutation its leaves index into.
    pub fn build(
        prims: &'a P,
        num_prims: u32,
        options: &BuildOptions,
    ) -> Result<BuiltTree, BuildError> {
        if num_prims == 0 {
            return Err(BuildError::EmptyInput);
        }

        let n = num_prims as usize;
        let mut indices = Vec::new();
        indices.try_reserve_exact(n)?;
        indices.extend(0..num_prims);

        let bbox_cache = if options.cache_bbox {
            let mut cache = Vec::new();
            cache.try_reserve_exact(n)?;
            cache.extend((0..num_prims).map(|id| prims.bounding_box(id)));
            Some(cache)
        } else {
            None
        };

        let mut builder = BVHBuilder {
            prims,
            options: *options,
            max_depth: options.max_tree_depth.min(DEPTH_LIMIT),
            nodes: Vec::new(),
            indices,
            bbox_cache,
            stats: BuildStats::default(),
        };

        let mut scene_bounds = BBox::empty();
        for id in 0..num_prims {
            let bbox = builder.bbox_of(id);
            if !bbox.is_finite() {
                return Err(BuildError::NonFiniteBounds(id));
            }
            scene_bounds = scene_bounds.merge(&bbox);
        }

        // Final trees stay under 2N nodes.
        builder.nodes.try_reserve(2 * n)?;
        builder.build_range(0, n, 0);

        Ok(BuiltTree {
            nodes: builder.nodes,
            indices: builder.indices,
            scene_bounds,
            stats: builder.stats,
        })
    }

    #[inline(always)]
    fn bbox_of(&self, id: u32) -> BBox {
        match &self.bbox_cache {
            Some(cache) => cache[id as usize],
            None => self.prims.bounding_box(id),
        }
    }

    fn build_range(&mut self, begin: usize, end: usize, depth: u32) -> u32 {
        let node_index = self.nodes.len() as u32;
        let count = end - begin;

        let mut bounds = BBox::empty();
        for &id in &self.indices[begin..end] {
            bounds = bounds.merge(&self.bbox_of(id));
        }

        if self.stats.max_tree_depth < depth {
            self.stats.max_tree_depth = depth;
        }

        if count as u32 <= self.options.min_leaf_primitives || depth >= self.max_depth {
            return self.emit_leaf(begin, count, bounds);
        }

        let mut centroid_bounds = BBox::empty();
        for &id in &self.indices[begin..end] {
            centroid_bounds = centroid_bounds.enclose(&self.prims.centroid(id));
        }

        let split = sah::find_best_split(
            &self.indices[begin..end],
            &centroid_bounds,
            &bounds,
            self.options.bin_size as usize,
            |id| match &self.bbox_cache {
                Some(cache) => cache[id as usize],
                None => self.prims.bounding_box(id),
            },
            |id| self.prims.centroid(id),
        );

        // A split has to beat the cost of intersecting all primitives here.
        let leaf_cost = count as f32;
        let mut partition = match split {
            Some(s) if s.cost < leaf_cost => {
                let prims = self.prims;
                let pivot = begin
                    + partition_in_place(&mut self.indices[begin..end], |id| {
                        prims.centroid(id)[s.axis] < s.position
                    });
                if pivot > begin && pivot < end {
                    Some((s.axis, pivot))
                } else {
                    // Binning and the partition predicate disagreed on a
                    // boundary centroid; fall through to the median split.
                    None
                }
            }
            _ => None,
        };

        // max_leaf_primitives is a soft cap: oversized ranges the SAH left
        // alone still get a median split when the centroids allow one.
        if partition.is_none() && count as u32 > self.options.max_leaf_primitives {
            partition = self.median_split(begin, end, &centroid_bounds);
        }

        let (axis, pivot) = match partition {
            Some(p) => p,
            None => return self.emit_leaf(begin, count, bounds),
        };

        self.stats.num_branch_nodes += 1;
        self.nodes.push(BVHNode::Branch {
            right: 0,
            axis: axis as u8,
            bounds,
        });
        self.build_range(begin, pivot, depth + 1);
        let right_index = self.build_range(pivot, end, depth + 1);
        match &mut self.nodes[node_index as usize] {
            BVHNode::Branch { right, .. } => *right = right_index,
            BVHNode::Leaf { .. } => unreachable!("branch emitted above"),
        }

        node_index
    }

    fn emit_leaf(&mut self, begin: usize, count: usize, bounds: BBox) -> u32 {
        let node_index = self.nodes.len() as u32;
        self.stats.num_leaf_nodes += 1;
        self.nodes.push(BVHNode::Leaf {
            first: begin as u32,
            count: count as u32,
            bounds,
        });
        node_index
    }

    /// Object-median fallback: order the range by centroid along the widest
    /// centroid axis and cut it in half. `None` when the centroids are all
    /// identical, in which case the caller emits an oversized leaf.
    fn median_split(
        &mut self,
        begin: usize,
        end: usize,
        centroid_bounds: &BBox,
    ) -> Option<(usize, usize)> {
        let axis = centroid_bounds.longest_axis();
        if !(centroid_bounds.extent()[axis] > 0.0) {
            return None;
        }

        let prims = self.prims;
        self.indices[begin..end].sort_unstable_by(|a, b| {
            let ca = prims.centroid(*a)[axis];
            let cb = prims.centroid(*b)[axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });

        Some((axis, begin + (end - begin) / 2))
    }
}

// In-place predicate partition; returns the size of the `true` prefix.
fn partition_in_place<F: Fn(u32) -> bool>(ids: &mut [u32], pred: F) -> usize {
    let mut i = 0;
    let mut j = ids.len();
    while i < j {
        if pred(ids[i]) {
            i += 1;
        } else {
            j -= 1;
            ids.swap(i, j);
        }
    }
    i
}
