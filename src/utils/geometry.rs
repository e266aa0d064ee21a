/// Polygon helpers for contour simplification and shape tests
use crate::models::PointI;

/// Perimeter of a point chain, closing it back to the start when `closed`
pub fn arc_length(points: &[PointI], closed: bool) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut length: f64 = points
        .windows(2)
        .map(|w| segment_length(w[0], w[1]))
        .sum();
    if closed {
        length += segment_length(points[points.len() - 1], points[0]);
    }
    length as f32
}

fn segment_length(a: PointI, b: PointI) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Distance from `p` to the line through `a` and `b`
fn line_distance(p: PointI, a: PointI, b: PointI) -> f64 {
    let dx = (b.x - a.x) as f64;
    let dy = (b.y - a.y) as f64;
    let norm = (dx * dx + dy * dy).sqrt();
    if norm == 0.0 {
        return segment_length(p, a);
    }
    ((p.x - a.x) as f64 * dy - (p.y - a.y) as f64 * dx).abs() / norm
}

/// Douglas-Peucker on an open chain; pushes every kept vertex except the last
fn simplify_chain(chain: &[PointI], epsilon: f64, out: &mut Vec<PointI>) {
    let mut stack = vec![(0usize, chain.len() - 1)];
    let mut keep = vec![false; chain.len()];
    keep[0] = true;

    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (a, b) = (chain[start], chain[end]);
        let mut farthest = start;
        let mut max_dist = 0.0;
        for (i, &p) in chain.iter().enumerate().take(end).skip(start + 1) {
            let d = line_distance(p, a, b);
            if d > max_dist {
                max_dist = d;
                farthest = i;
            }
        }
        if max_dist > epsilon {
            keep[farthest] = true;
            stack.push((start, farthest));
            stack.push((farthest, end));
        }
    }

    out.extend(
        chain[..chain.len() - 1]
            .iter()
            .zip(&keep)
            .filter(|&(_, &k)| k)
            .map(|(&p, _)| p),
    );
}

fn farthest_from(points: &[PointI], from: PointI) -> usize {
    points
        .iter()
        .enumerate()
        .max_by_key(|&(_, p)| {
            let dx = (p.x - from.x) as i64;
            let dy = (p.y - from.y) as i64;
            dx * dx + dy * dy
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Drop vertices lying within `epsilon` of the line through their neighbours
fn prune_collinear(polygon: &mut Vec<PointI>, epsilon: f64) {
    while polygon.len() > 3 {
        let n = polygon.len();
        let flattest = (0..n)
            .map(|i| {
                let prev = polygon[(i + n - 1) % n];
                let next = polygon[(i + 1) % n];
                (i, line_distance(polygon[i], prev, next))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match flattest {
            Some((i, d)) if d <= epsilon => {
                polygon.remove(i);
            }
            _ => break,
        }
    }
}

/// Simplify a closed contour to a polygon within `epsilon` pixels
///
/// The contour is split at two mutually distant points (the farthest point
/// from the start, then the farthest point from that one), both halves are
/// simplified independently and vertices that ended up on a straight run are
/// removed. The result does not depend on where tracing started.
pub fn approx_polygon(contour: &[PointI], epsilon: f32) -> Vec<PointI> {
    if contour.len() < 3 {
        return contour.to_vec();
    }

    let a = farthest_from(contour, contour[0]);
    let b = farthest_from(contour, contour[a]);
    if a == b {
        return vec![contour[a]];
    }
    let (first, second) = (a.min(b), a.max(b));

    let epsilon = epsilon as f64;
    let mut polygon = Vec::new();
    simplify_chain(&contour[first..=second], epsilon, &mut polygon);

    let mut back: Vec<PointI> = contour[second..].to_vec();
    back.extend_from_slice(&contour[..=first]);
    simplify_chain(&back, epsilon, &mut polygon);

    prune_collinear(&mut polygon, epsilon);
    polygon
}

/// Absolute polygon area (shoelace)
pub fn polygon_area(polygon: &[PointI]) -> f32 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, p) in polygon.iter().enumerate() {
        let q = polygon[(i + 1) % polygon.len()];
        twice += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice.abs() as f64 / 2.0) as f32
}

/// True when every turn has the same orientation (collinear turns allowed)
pub fn is_convex(polygon: &[PointI]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i64;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let c = polygon[(i + 2) % n];
        let cross = (b.x - a.x) as i64 * (c.y - b.y) as i64 - (b.y - a.y) as i64 * (c.x - b.x) as i64;
        if cross == 0 {
            continue;
        }
        if sign == 0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    sign != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_outline(x0: i32, y0: i32, side: i32) -> Vec<PointI> {
        let mut pts = Vec::new();
        for x in x0..x0 + side {
            pts.push(PointI::new(x, y0));
        }
        for y in y0..y0 + side {
            pts.push(PointI::new(x0 + side, y));
        }
        for x in (x0 + 1..=x0 + side).rev() {
            pts.push(PointI::new(x, y0 + side));
        }
        for y in (y0 + 1..=y0 + side).rev() {
            pts.push(PointI::new(x0, y));
        }
        pts
    }

    #[test]
    fn test_square_simplifies_to_four_corners() {
        let outline = square_outline(2, 3, 10);
        let eps = 0.02 * arc_length(&outline, true);
        let poly = approx_polygon(&outline, eps);
        assert_eq!(
            poly,
            vec![
                PointI::new(2, 3),
                PointI::new(12, 3),
                PointI::new(12, 13),
                PointI::new(2, 13)
            ]
        );
        assert!(is_convex(&poly));
        assert_eq!(polygon_area(&poly), 100.0);
    }

    #[test]
    fn test_start_point_mid_edge_is_not_a_vertex() {
        // Start tracing halfway along the top edge
        let outline = square_outline(0, 0, 20);
        let mut rotated = outline[10..].to_vec();
        rotated.extend_from_slice(&outline[..10]);
        let eps = 0.02 * arc_length(&rotated, true);
        let poly = approx_polygon(&rotated, eps);
        assert_eq!(poly.len(), 4, "{poly:?}");
        for corner in [
            PointI::new(0, 0),
            PointI::new(20, 0),
            PointI::new(20, 20),
            PointI::new(0, 20),
        ] {
            assert!(poly.contains(&corner), "missing {corner:?} in {poly:?}");
        }
    }

    #[test]
    fn test_arc_length() {
        let outline = square_outline(0, 0, 4);
        assert!((arc_length(&outline, true) - 16.0).abs() < 1e-4);
        assert!((arc_length(&outline, false) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_concave_polygon() {
        let arrow = [
            PointI::new(0, 0),
            PointI::new(10, 5),
            PointI::new(0, 10),
            PointI::new(4, 5),
        ];
        assert!(!is_convex(&arrow));
    }
}
