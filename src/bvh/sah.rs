use na::Point3;

use crate::bvh::bbox::BBox;

// Fixed node traversal cost; primitive intersection cost is the unit.
const TRAVERSAL_COST: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
pub struct SplitCandidate {
    pub axis: usize,
    pub position: f32,
    pub cost: f32,
}

#[derive(Clone, Copy)]
struct Bin {
    count: u32,
    bounds: BBox,
}

impl Bin {
    fn empty() -> Self {
        Self {
            count: 0,
            bounds: BBox::empty(),
        }
    }
}

/// Pick the cheapest binned SAH split of `ids` across all three axes.
///
/// Primitives are bucketed by centroid over `centroid_bounds`; each of the
/// `bin_count - 1` inter-bin planes is scored with
/// `C_trav + (SA_l * N_l + SA_r * N_r) / SA(parent)`. Candidates that leave
/// either side empty are rejected. Lower cost wins; on equal cost the smaller
/// axis, then the smaller split index, is kept (strict `<` while scanning in
/// that order). Returns `None` when no plane separates the centroids.
pub fn find_best_split<B, C>(
    ids: &[u32],
    centroid_bounds: &BBox,
    parent_bounds: &BBox,
    bin_count: usize,
    bbox_of: B,
    centroid_of: C,
) -> Option<SplitCandidate>
where
    B: Fn(u32) -> BBox,
    C: Fn(u32) -> Point3<f32>,
{
    let bin_count = bin_count.max(2);
    let inv_parent_area = 1.0 / parent_bounds.surface_area();
    let mut bins = vec![Bin::empty(); bin_count];
    let mut best: Option<SplitCandidate> = None;

    for axis in 0..3 {
        let low = centroid_bounds.min[axis];
        let extent = centroid_bounds.max[axis] - low;
        if !(extent > 0.0) {
            // All centroids coplanar on this axis; every plane leaves one
            // side empty.
            continue;
        }

        for bin in bins.iter_mut() {
            *bin = Bin::empty();
        }
        let scale = bin_count as f32 / extent;
        for &id in ids {
            let index = (((centroid_of(id)[axis] - low) * scale) as usize).min(bin_count - 1);
            bins[index].count += 1;
            bins[index].bounds = bins[index].bounds.merge(&bbox_of(id));
        }

        // Right-to-left sweep first so the left-to-right pass can score each
        // plane in one walk.
        let mut right_area = vec![0.0_f32; bin_count];
        let mut right_count = vec![0_u32; bin_count];
        let mut accum = Bin::empty();
        for i in (1..bin_count).rev() {
            accum.count += bins[i].count;
            accum.bounds = accum.bounds.merge(&bins[i].bounds);
            right_count[i] = accum.count;
            right_area[i] = accum.bounds.surface_area();
        }

        let mut left = Bin::empty();
        for i in 0..bin_count - 1 {
            left.count += bins[i].count;
            left.bounds = left.bounds.merge(&bins[i].bounds);

            let n_left = left.count;
            let n_right = right_count[i + 1];
            if n_left == 0 || n_right == 0 {
                continue;
            }

            let cost = TRAVERSAL_COST
                + (left.bounds.surface_area() * n_left as f32
                    + right_area[i + 1] * n_right as f32)
                    * inv_parent_area;
            // Strict comparison against +inf also drops NaN/inf costs from
            // degenerate (zero-area) parent boxes.
            if cost < best.map_or(f32::INFINITY, |b| b.cost) {
                best = Some(SplitCandidate {
                    axis,
                    position: low + extent * (i + 1) as f32 / bin_count as f32,
                    cost,
                });
            }
        }
    }

    best
}
