//! Smoothing and morphology on raw grayscale / binary buffers

use crate::models::BitMatrix;

/// Binomial approximation of a 5-tap Gaussian (sigma ~1.1), sums to 16
const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];

/// Mirror an index into `0..len` without repeating the edge sample
#[inline]
fn reflect101(i: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        }
        if i >= len {
            i = 2 * (len - 1) - i;
        }
    }
    i as usize
}

/// Separable 5x5 Gaussian blur with reflect-101 borders
pub fn gaussian_blur_5x5(gray: &[u8], width: usize, height: usize) -> Vec<u8> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    // Horizontal pass keeps the x16 scale to avoid double rounding
    let mut horizontal = vec![0u32; width * height];
    for y in 0..height {
        let row = &gray[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0;
            for (k, &w) in KERNEL.iter().enumerate() {
                let sx = reflect101(x as isize + k as isize - 2, width);
                acc += w * row[sx] as u32;
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0;
            for (k, &w) in KERNEL.iter().enumerate() {
                let sy = reflect101(y as isize + k as isize - 2, height);
                acc += w * horizontal[sy * width + x];
            }
            // Round half up out of the 256 scale
            out[y * width + x] = ((acc + 128) >> 8) as u8;
        }
    }
    out
}

fn morph(src: &BitMatrix, grow: bool) -> BitMatrix {
    let (w, h) = (src.width(), src.height());
    BitMatrix::from_fn(w, h, |x, y| {
        let (x, y) = (x as i32, y as i32);
        let mut any = false;
        let mut all = true;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let nx = x + dx;
                let ny = y + dy;
                // Pixels outside the matrix do not constrain the result
                if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                    continue;
                }
                let v = src.get(nx as usize, ny as usize);
                any |= v;
                all &= v;
            }
        }
        if grow { any } else { all }
    })
}

/// 3x3 dilation
pub fn dilate(src: &BitMatrix) -> BitMatrix {
    morph(src, true)
}

/// 3x3 erosion
pub fn erode(src: &BitMatrix) -> BitMatrix {
    morph(src, false)
}

/// Morphological close: `iterations` dilations followed by as many erosions
pub fn morph_close(src: &BitMatrix, iterations: usize) -> BitMatrix {
    let mut out = src.clone();
    for _ in 0..iterations {
        out = dilate(&out);
    }
    for _ in 0..iterations {
        out = erode(&out);
    }
    out
}
