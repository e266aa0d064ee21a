/// Connected components over binarized frames
/// Labels 8-connected foreground regions and flags the ones that touch the
/// outer background, i.e. that are not nested inside a hole of another region
use crate::models::{BitMatrix, PointI};
use std::collections::VecDeque;

/// Union-Find data structure
pub struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    /// `n` singleton sets
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
        }
    }

    /// Root of the set containing `x`
    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Path compression
        let mut node = x;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }
        root
    }

    /// Merge the sets of `x` and `y`
    pub fn union(&mut self, x: u32, y: u32) {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x != root_y {
            self.parent[root_x as usize] = root_y;
        }
    }
}

/// One 8-connected foreground region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// First pixel of the region in raster order
    pub start: PointI,
    /// Number of foreground pixels
    pub pixel_count: usize,
    /// Inclusive bounds (min_x, min_y, max_x, max_y)
    pub bounds: (usize, usize, usize, usize),
    /// Reachable from the image border without crossing foreground
    pub external: bool,
}

/// Label every foreground pixel; components come back in raster order of
/// their first pixel
pub fn label_components(matrix: &BitMatrix) -> Vec<Component> {
    let width = matrix.width();
    let height = matrix.height();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut labels = vec![0u32; width * height];
    let mut next_label = 1u32;
    let mut uf = UnionFind::new(width * height + 1);

    // First pass: provisional labels
    for y in 0..height {
        for x in 0..width {
            if !matrix.get(x, y) {
                continue;
            }

            let mut neighbors = [0u32; 4];
            let mut count = 0;
            // Left, upper-left, above, upper-right
            if x > 0 && matrix.get(x - 1, y) {
                neighbors[count] = labels[y * width + x - 1];
                count += 1;
            }
            if x > 0 && y > 0 && matrix.get(x - 1, y - 1) {
                neighbors[count] = labels[(y - 1) * width + x - 1];
                count += 1;
            }
            if y > 0 && matrix.get(x, y - 1) {
                neighbors[count] = labels[(y - 1) * width + x];
                count += 1;
            }
            if x + 1 < width && y > 0 && matrix.get(x + 1, y - 1) {
                neighbors[count] = labels[(y - 1) * width + x + 1];
                count += 1;
            }

            let idx = y * width + x;
            match neighbors[..count].iter().min() {
                None => {
                    labels[idx] = next_label;
                    next_label += 1;
                }
                Some(&min_label) => {
                    labels[idx] = min_label;
                    for &l in &neighbors[..count] {
                        if l != min_label {
                            uf.union(min_label, l);
                        }
                    }
                }
            }
        }
    }

    let outer = outer_background(matrix);

    // Second pass: compact ids in raster order, stats and the external flag
    let mut compact = vec![u32::MAX; next_label as usize];
    let mut components: Vec<Component> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let label = labels[y * width + x];
            if label == 0 {
                continue;
            }
            let root = uf.find(label) as usize;
            if compact[root] == u32::MAX {
                compact[root] = components.len() as u32;
                components.push(Component {
                    start: PointI::new(x as i32, y as i32),
                    pixel_count: 0,
                    bounds: (x, y, x, y),
                    external: false,
                });
            }

            let c = &mut components[compact[root] as usize];
            c.pixel_count += 1;
            c.bounds.0 = c.bounds.0.min(x);
            c.bounds.1 = c.bounds.1.min(y);
            c.bounds.2 = c.bounds.2.max(x);
            c.bounds.3 = c.bounds.3.max(y);

            if !c.external {
                let on_border = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
                c.external = on_border
                    || outer[y * width + x - 1]
                    || outer[y * width + x + 1]
                    || outer[(y - 1) * width + x]
                    || outer[(y + 1) * width + x];
            }
        }
    }

    components
}

/// Background pixels 4-connected to the image border
fn outer_background(matrix: &BitMatrix) -> Vec<bool> {
    let width = matrix.width();
    let height = matrix.height();
    let mut outer = vec![false; width * height];
    let mut queue = VecDeque::new();

    let seed = |x: usize, y: usize, outer: &mut [bool], queue: &mut VecDeque<(usize, usize)>| {
        if !matrix.get(x, y) && !outer[y * width + x] {
            outer[y * width + x] = true;
            queue.push_back((x, y));
        }
    };
    for x in 0..width {
        seed(x, 0, &mut outer, &mut queue);
        seed(x, height - 1, &mut outer, &mut queue);
    }
    for y in 0..height {
        seed(0, y, &mut outer, &mut queue);
        seed(width - 1, y, &mut outer, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        if x > 0 {
            seed(x - 1, y, &mut outer, &mut queue);
        }
        if x + 1 < width {
            seed(x + 1, y, &mut outer, &mut queue);
        }
        if y > 0 {
            seed(x, y - 1, &mut outer, &mut queue);
        }
        if y + 1 < height {
            seed(x, y + 1, &mut outer, &mut queue);
        }
    }
    outer
}
