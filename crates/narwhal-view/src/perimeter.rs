//! Perimeter projections: where a line from the centre of a bounding box towards `next` leaves
//! the outline of a shape.
//!
//! With `orthogonal` the result is snapped so that a horizontal or vertical segment to `next`
//! stays axis-aligned when `next` lies within the box's horizontal or vertical span.

use crate::constants::{PERIMETER_ELLIPSE, PERIMETER_RECTANGLE, PERIMETER_RHOMBUS};
use narwhal_model::{Point, Rect, RectExt, point};
use std::f64::consts::PI;

pub type PerimeterFn = fn(&Rect, Point, bool) -> Point;

pub fn perimeter_by_name(name: &str) -> Option<PerimeterFn> {
    match name {
        PERIMETER_RECTANGLE => Some(rectangle_perimeter),
        PERIMETER_ELLIPSE => Some(ellipse_perimeter),
        PERIMETER_RHOMBUS => Some(rhombus_perimeter),
        _ => None,
    }
}

pub fn rectangle_perimeter(bounds: &Rect, next: Point, orthogonal: bool) -> Point {
    let c = bounds.center_point();
    let (x, y, w, h) = (bounds.min_x(), bounds.min_y(), bounds.width(), bounds.height());
    let (dx, dy) = (next.x - c.x, next.y - c.y);
    let alpha = dy.atan2(dx);
    let t = h.atan2(w);

    // Side intersections use the slope directly so axis-aligned directions land exactly.
    let mut p = if alpha < -PI + t || alpha > PI - t {
        point(x, c.y - w * ratio(dy, dx) / 2.0)
    } else if alpha < -t {
        point(c.x - h * ratio(dx, dy) / 2.0, y)
    } else if alpha < t {
        point(x + w, c.y + w * ratio(dy, dx) / 2.0)
    } else {
        point(c.x + h * ratio(dx, dy) / 2.0, y + h)
    };

    if orthogonal {
        if next.x >= x && next.x <= x + w {
            p.x = next.x;
        } else if next.y >= y && next.y <= y + h {
            p.y = next.y;
        }
        if next.x < x {
            p.x = x;
        } else if next.x > x + w {
            p.x = x + w;
        }
        if next.y < y {
            p.y = y;
        } else if next.y > y + h {
            p.y = y + h;
        }
    }
    p
}

pub fn ellipse_perimeter(bounds: &Rect, next: Point, orthogonal: bool) -> Point {
    let c = bounds.center_point();
    let a = bounds.width() / 2.0;
    let b = bounds.height() / 2.0;
    if a <= 0.0 || b <= 0.0 {
        return c;
    }

    if orthogonal {
        // Keep the coordinate of `next` on the axis it shares with the ellipse.
        if next.x >= bounds.min_x() && next.x <= bounds.max_x() {
            let dx = next.x - c.x;
            let dy = b * (1.0 - (dx / a).powi(2)).max(0.0).sqrt();
            let y = if next.y < c.y { c.y - dy } else { c.y + dy };
            return point(next.x, y);
        }
        if next.y >= bounds.min_y() && next.y <= bounds.max_y() {
            let dy = next.y - c.y;
            let dx = a * (1.0 - (dy / b).powi(2)).max(0.0).sqrt();
            let x = if next.x < c.x { c.x - dx } else { c.x + dx };
            return point(x, next.y);
        }
    }

    let dx = next.x - c.x;
    let dy = next.y - c.y;
    if dx == 0.0 && dy == 0.0 {
        return next;
    }
    let t = 1.0 / ((dx / a).powi(2) + (dy / b).powi(2)).sqrt();
    point(c.x + dx * t, c.y + dy * t)
}

pub fn rhombus_perimeter(bounds: &Rect, next: Point, orthogonal: bool) -> Point {
    let c = bounds.center_point();
    let (x, y, w, h) = (bounds.min_x(), bounds.min_y(), bounds.width(), bounds.height());
    let (px, py) = (next.x, next.y);

    if c.x == px {
        return if c.y > py { point(c.x, y) } else { point(c.x, y + h) };
    }
    if c.y == py {
        return if c.x > px { point(x, c.y) } else { point(x + w, c.y) };
    }

    let mut tx = c.x;
    let mut ty = c.y;
    if orthogonal {
        if px >= x && px <= x + w {
            tx = px;
        } else if py >= y && py <= y + h {
            ty = py;
        }
    }

    let from = point(px, py);
    let to = point(tx, ty);
    let hit = if px < c.x {
        if py < c.y {
            segment_intersection(from, to, point(c.x, y), point(x, c.y))
        } else {
            segment_intersection(from, to, point(c.x, y + h), point(x, c.y))
        }
    } else if py < c.y {
        segment_intersection(from, to, point(c.x, y), point(x + w, c.y))
    } else {
        segment_intersection(from, to, point(c.x, y + h), point(x + w, c.y))
    };
    hit.unwrap_or(c)
}

fn ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a / b }
}

/// Intersection of segments `a0-a1` and `b0-b1`, if they cross.
pub fn segment_intersection(a0: Point, a1: Point, b0: Point, b1: Point) -> Option<Point> {
    let denom = (b1.y - b0.y) * (a1.x - a0.x) - (b1.x - b0.x) * (a1.y - a0.y);
    if denom == 0.0 {
        return None;
    }
    let ua = ((b1.x - b0.x) * (a0.y - b0.y) - (b1.y - b0.y) * (a0.x - b0.x)) / denom;
    let ub = ((a1.x - a0.x) * (a0.y - b0.y) - (a1.y - a0.y) * (a0.x - b0.x)) / denom;
    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        Some(point(a0.x + ua * (a1.x - a0.x), a0.y + ua * (a1.y - a0.y)))
    } else {
        None
    }
}

/// Squared distance from `p` to the segment `a-b`.
pub fn segment_distance_sq(a: Point, b: Point, p: Point) -> f64 {
    let d = b - a;
    let len_sq = d.square_length();
    let t = if len_sq == 0.0 {
        0.0
    } else {
        ((p - a).dot(d) / len_sq).clamp(0.0, 1.0)
    };
    let closest = a + d * t;
    (p - closest).square_length()
}
