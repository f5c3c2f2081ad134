// Oriented bounding box with a separating-axis overlap test.

const DEGENERATE_EPS: f32 = 1e-6;

/// Rectangle of arbitrary orientation. Both setters rewrite the box in place
/// so pooled labels keep their allocation-free box across frames.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Obb {
    corners: [(f32, f32); 4],
    /// Edge axes from corner 0, scaled by the inverse squared edge length so
    /// projections of the box itself span `[origin, origin + 1]`.
    axes: [(f32, f32); 2],
    origins: [f32; 2],
    valid: bool,
}

impl Obb {
    /// Box of `width` x `height` centered on `(cx, cy)`, its long side along
    /// the direction from `(dx, dy)` towards the center.
    pub fn new_directed(cx: f32, cy: f32, dx: f32, dy: f32, width: f32, height: f32) -> Self {
        let mut obb = Self::default();
        obb.set(cx, cy, dx, dy, width, height);
        obb
    }

    pub fn set(&mut self, cx: f32, cy: f32, dx: f32, dy: f32, width: f32, height: f32) {
        let mut vx = cx - dx;
        let mut vy = cy - dy;
        let len = vx.hypot(vy);
        if len <= DEGENERATE_EPS {
            vx = 1.0;
            vy = 0.0;
        } else {
            vx /= len;
            vy /= len;
        }
        self.set_oriented(cx, cy, vx, vy, width, height);
    }

    /// Box of `width` x `height` whose long side follows the unit vector
    /// `(vx, vy)`, shifted by `offset` along its short axis.
    pub fn set_normalized(
        &mut self,
        cx: f32,
        cy: f32,
        vx: f32,
        vy: f32,
        width: f32,
        height: f32,
        offset: f32,
    ) {
        let (nx, ny) = (-vy, vx);
        self.set_oriented(cx + nx * offset, cy + ny * offset, vx, vy, width, height);
    }

    fn set_oriented(&mut self, cx: f32, cy: f32, vx: f32, vy: f32, width: f32, height: f32) {
        let hw = width / 2.0;
        let hh = height / 2.0;
        let (ux, uy) = (vx * hw, vy * hw);
        let (nx, ny) = (-vy * hh, vx * hh);

        self.corners = [
            (cx - ux - nx, cy - uy - ny),
            (cx + ux - nx, cy + uy - ny),
            (cx + ux + nx, cy + uy + ny),
            (cx - ux + nx, cy - uy + ny),
        ];
        self.compute_axes();
    }

    fn compute_axes(&mut self) {
        let c0 = self.corners[0];
        let edges = [self.corners[1], self.corners[3]];
        self.valid = true;
        for (i, corner) in edges.iter().enumerate() {
            let ax = corner.0 - c0.0;
            let ay = corner.1 - c0.1;
            let len_sq = ax * ax + ay * ay;
            if len_sq <= DEGENERATE_EPS {
                self.valid = false;
                self.axes[i] = (0.0, 0.0);
                self.origins[i] = 0.0;
                continue;
            }
            let axis = (ax / len_sq, ay / len_sq);
            self.axes[i] = axis;
            self.origins[i] = c0.0 * axis.0 + c0.1 * axis.1;
        }
    }

    pub fn corners(&self) -> &[(f32, f32); 4] {
        &self.corners
    }

    pub fn center(&self) -> (f32, f32) {
        let (a, c) = (self.corners[0], self.corners[2]);
        ((a.0 + c.0) / 2.0, (a.1 + c.1) / 2.0)
    }

    /// Whether the box has positive extent on both axes.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    fn overlaps_one_way(&self, other: &Obb) -> bool {
        for (axis, origin) in self.axes.iter().zip(self.origins) {
            let mut t_min = f32::INFINITY;
            let mut t_max = f32::NEG_INFINITY;
            for corner in &other.corners {
                let t = corner.0 * axis.0 + corner.1 * axis.1;
                t_min = t_min.min(t);
                t_max = t_max.max(t);
            }
            if t_min > 1.0 + origin || t_max < origin {
                return false;
            }
        }
        true
    }

    /// Exact rectangle-rectangle intersection. Degenerate boxes never overlap.
    pub fn overlaps(&self, other: &Obb) -> bool {
        self.valid && other.valid && self.overlaps_one_way(other) && other.overlaps_one_way(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caption_box(cx: f32, cy: f32, bearing_deg: f32, w: f32, h: f32) -> Obb {
        let angle = bearing_deg.to_radians();
        let mut obb = Obb::default();
        obb.set_normalized(cx, cy, angle.cos(), -angle.sin(), w, h, 0.0);
        obb
    }

    #[test]
    fn axis_aligned_boxes_overlap_when_intervals_intersect() {
        let a = caption_box(0.0, 0.0, 0.0, 20.0, 10.0);
        let b = caption_box(15.0, 0.0, 0.0, 20.0, 10.0);
        let c = caption_box(25.0, 0.0, 0.0, 20.0, 10.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn rotated_boxes_separate_on_own_axes() {
        // Diamond next to a square: axis-aligned hulls intersect, shapes do not.
        let square = caption_box(0.0, 0.0, 0.0, 10.0, 10.0);
        let diamond = caption_box(11.0, 11.0, 45.0, 10.0, 10.0);
        assert!(!square.overlaps(&diamond));
        let closer = caption_box(8.0, 8.0, 45.0, 10.0, 10.0);
        assert!(square.overlaps(&closer));
    }

    #[test]
    fn directed_box_follows_segment() {
        // Long thin box along the diagonal.
        let obb = Obb::new_directed(0.0, 0.0, -10.0, -10.0, 40.0, 4.0);
        let on_line = caption_box(12.0, 12.0, 0.0, 2.0, 2.0);
        let off_line = caption_box(12.0, -12.0, 0.0, 2.0, 2.0);
        assert!(obb.overlaps(&on_line));
        assert!(!obb.overlaps(&off_line));
    }

    #[test]
    fn bearing_rotates_caption_box() {
        let wide = caption_box(0.0, 0.0, 0.0, 100.0, 10.0);
        let below = caption_box(0.0, 30.0, 0.0, 100.0, 10.0);
        assert!(!wide.overlaps(&below));
        let wide_rotated = caption_box(0.0, 0.0, 90.0, 100.0, 10.0);
        assert!(wide_rotated.overlaps(&below));
    }

    #[test]
    fn offset_moves_along_short_axis() {
        let mut obb = Obb::default();
        obb.set_normalized(0.0, 0.0, 1.0, 0.0, 10.0, 4.0, 6.0);
        let (cx, cy) = obb.center();
        assert!(cx.abs() < 1e-5);
        assert!((cy - 6.0).abs() < 1e-5);
    }

    #[test]
    fn set_reuses_box_in_place() {
        let mut obb = Obb::new_directed(0.0, 0.0, -1.0, 0.0, 10.0, 10.0);
        let far = caption_box(100.0, 0.0, 0.0, 10.0, 10.0);
        assert!(!obb.overlaps(&far));
        obb.set(100.0, 0.0, 99.0, 0.0, 10.0, 10.0);
        assert!(obb.overlaps(&far));
    }

    #[test]
    fn degenerate_box_never_overlaps() {
        let empty = Obb::default();
        let b = caption_box(0.0, 0.0, 0.0, 10.0, 10.0);
        assert!(!empty.is_valid());
        assert!(!empty.overlaps(&b));
        assert!(!b.overlaps(&empty));
    }

    #[test]
    fn zero_length_direction_falls_back_to_horizontal() {
        let obb = Obb::new_directed(5.0, 5.0, 5.0, 5.0, 10.0, 2.0);
        let corners = obb.corners();
        assert!((corners[0].0 - 0.0).abs() < 1e-5);
        assert!((corners[1].0 - 10.0).abs() < 1e-5);
    }
}
