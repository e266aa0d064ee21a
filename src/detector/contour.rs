//! Outer boundary tracing for external components

use crate::detector::connected_components::label_components;
use crate::models::{BitMatrix, PointI};

/// Moore neighborhood, clockwise starting east (y grows downwards)
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

fn direction_index(from: PointI, to: PointI) -> usize {
    let offset = (to.x - from.x, to.y - from.y);
    DIRECTIONS.iter().position(|&d| d == offset).unwrap_or(4)
}

/// First foreground neighbor of `current`, searching clockwise after
/// `backtrack`; returns the neighbor and the last background pixel examined
fn next_boundary_pixel(
    matrix: &BitMatrix,
    current: PointI,
    backtrack: PointI,
) -> Option<(PointI, PointI)> {
    let first = direction_index(current, backtrack);
    let mut last_background = backtrack;
    for i in 1..=8 {
        let (dx, dy) = DIRECTIONS[(first + i) % 8];
        let candidate = current.offset(dx, dy);
        if matrix.get_signed(candidate.x, candidate.y) {
            return Some((candidate, last_background));
        }
        last_background = candidate;
    }
    None
}

/// Trace the outer boundary of the component whose first raster pixel is
/// `start`; points come back clockwise without repeating `start`
pub fn trace_boundary(matrix: &BitMatrix, start: PointI, max_steps: usize) -> Vec<PointI> {
    let mut contour = vec![start];
    // The west neighbor of a component's first raster pixel is background
    let Some((first_step, first_backtrack)) =
        next_boundary_pixel(matrix, start, start.offset(-1, 0))
    else {
        return contour;
    };

    let mut current = first_step;
    let mut backtrack = first_backtrack;
    for _ in 0..max_steps {
        let Some((next, next_backtrack)) = next_boundary_pixel(matrix, current, backtrack) else {
            break;
        };
        // Jacob's criterion: back at the start about to repeat the first move
        if current == start && next == first_step {
            break;
        }
        contour.push(current);
        current = next;
        backtrack = next_backtrack;
    }
    contour
}

/// Outer contours of every external component, in raster order of their
/// first pixel
pub fn find_external_contours(matrix: &BitMatrix) -> Vec<Vec<PointI>> {
    label_components(matrix)
        .into_iter()
        .filter(|c| c.external)
        .map(|c| trace_boundary(matrix, c.start, 4 * c.pixel_count + 8))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_rect(w: usize, h: usize, x0: usize, y0: usize, rw: usize, rh: usize) -> BitMatrix {
        BitMatrix::from_fn(w, h, |x, y| {
            (x0..x0 + rw).contains(&x) && (y0..y0 + rh).contains(&y)
        })
    }

    #[test]
    fn test_rectangle_boundary() {
        let matrix = filled_rect(20, 20, 3, 4, 6, 5);
        let contours = find_external_contours(&matrix);
        assert_eq!(contours.len(), 1);
        let contour = &contours[0];
        // Perimeter pixels of a 6x5 block
        assert_eq!(contour.len(), 2 * 6 + 2 * 5 - 4);
        assert_eq!(contour[0], PointI::new(3, 4));
        for corner in [PointI::new(8, 4), PointI::new(8, 8), PointI::new(3, 8)] {
            assert!(contour.contains(&corner));
        }
        // Clockwise: the second point is east of the start
        assert_eq!(contour[1], PointI::new(4, 4));
    }

    #[test]
    fn test_single_pixel() {
        let matrix = filled_rect(5, 5, 2, 2, 1, 1);
        assert_eq!(find_external_contours(&matrix), vec![vec![PointI::new(2, 2)]]);
    }

    #[test]
    fn test_one_pixel_line_walks_both_sides() {
        let matrix = filled_rect(8, 3, 1, 1, 4, 1);
        let contour = &find_external_contours(&matrix)[0];
        assert_eq!(
            contour,
            &vec![
                PointI::new(1, 1),
                PointI::new(2, 1),
                PointI::new(3, 1),
                PointI::new(4, 1),
                PointI::new(3, 1),
                PointI::new(2, 1),
            ]
        );
    }

    #[test]
    fn test_nested_component_skipped() {
        let matrix = BitMatrix::from_fn(12, 12, |x, y| {
            let outer = (1..=10).contains(&x) && (1..=10).contains(&y);
            let hole = (3..=8).contains(&x) && (3..=8).contains(&y);
            let island = (5..=6).contains(&x) && (5..=6).contains(&y);
            (outer && !hole) || island
        });
        let contours = find_external_contours(&matrix);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0][0], PointI::new(1, 1));
    }

    #[test]
    fn test_border_touching_component() {
        let matrix = filled_rect(6, 6, 0, 0, 3, 3);
        let contours = find_external_contours(&matrix);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 8);
    }

    /// Outer contours with no enclosing border, as imageproc reports them
    fn imageproc_outer(matrix: &BitMatrix) -> Vec<Vec<PointI>> {
        use image::{GrayImage, Luma};
        use imageproc::contours::{BorderType, find_contours};

        let image = GrayImage::from_fn(matrix.width() as u32, matrix.height() as u32, |x, y| {
            Luma([if matrix.get(x as usize, y as usize) { 255 } else { 0 }])
        });
        find_contours::<i32>(&image)
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .map(|c| c.points.iter().map(|p| PointI::new(p.x, p.y)).collect())
            .collect()
    }

    fn pixel_set(points: &[PointI]) -> Vec<(i32, i32)> {
        let mut set: Vec<(i32, i32)> = points.iter().map(|p| (p.x, p.y)).collect();
        set.sort_unstable();
        set.dedup();
        set
    }

    #[test]
    fn test_agrees_with_imageproc() {
        let rect = filled_rect(30, 24, 4, 5, 17, 11);
        let disk = BitMatrix::from_fn(40, 40, |x, y| {
            let (dx, dy) = (x as f64 - 19.5, y as f64 - 20.0);
            dx * dx + dy * dy <= 13.0 * 13.0
        });
        let diamond = BitMatrix::from_fn(40, 40, |x, y| {
            (x as i32 - 20).abs() + (y as i32 - 18).abs() <= 12
        });
        let tilted = BitMatrix::from_fn(60, 60, |x, y| {
            let (dx, dy) = (x as f64 - 30.0, y as f64 - 30.0);
            let (c, s) = (0.5f64.cos(), 0.5f64.sin());
            (dx * c + dy * s).abs() <= 15.0 && (dy * c - dx * s).abs() <= 15.0
        });

        let shapes = [("rect", rect), ("disk", disk), ("diamond", diamond), ("tilted", tilted)];
        for (name, matrix) in shapes {
            let ours = find_external_contours(&matrix);
            let theirs = imageproc_outer(&matrix);
            assert_eq!(ours.len(), 1, "{name}");
            assert_eq!(theirs.len(), 1, "{name}");
            assert_eq!(pixel_set(&ours[0]), pixel_set(&theirs[0]), "{name}");
        }
    }

    #[test]
    fn test_component_count_matches_imageproc() {
        // Ring with an island in its hole, plus two separate blobs
        let matrix = BitMatrix::from_fn(40, 30, |x, y| {
            let ring = (2..=17).contains(&x) && (2..=17).contains(&y);
            let hole = (5..=14).contains(&x) && (5..=14).contains(&y);
            let island = (8..=11).contains(&x) && (8..=11).contains(&y);
            let blob_a = (22..=30).contains(&x) && (3..=9).contains(&y);
            let blob_b = (24..=36).contains(&x) && (15..=26).contains(&y);
            (ring && !hole) || island || blob_a || blob_b
        });
        let ours = find_external_contours(&matrix);
        let theirs = imageproc_outer(&matrix);
        assert_eq!(ours.len(), theirs.len());

        let bbox = |points: &[PointI]| {
            let xs = points.iter().map(|p| p.x);
            let ys = points.iter().map(|p| p.y);
            (xs.clone().min(), xs.max(), ys.clone().min(), ys.max())
        };
        let mut ours: Vec<_> = ours.iter().map(|c| bbox(c)).collect();
        let mut theirs: Vec<_> = theirs.iter().map(|c| bbox(c)).collect();
        ours.sort_unstable();
        theirs.sort_unstable();
        assert_eq!(ours, theirs);
    }
}
