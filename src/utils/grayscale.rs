/// Luminance conversion for packed 3-channel frames
/// Y = 0.299*R + 0.587*G + 0.114*B
/// Uses fast integer arithmetic: Y = (76*R + 150*G + 29*B) >> 8

/// Coefficients for grayscale conversion: Y = (76*R + 150*G + 29*B) >> 8
const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

/// Luminance of one RGB sample
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let lum = (COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8;
    lum.min(255) as u8
}

/// Convert RGB bytes to grayscale
pub fn rgb_to_grayscale(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    convert(rgb, width * height, |px| luma(px[0], px[1], px[2]))
}

/// Convert BGR bytes (camera order) to grayscale
pub fn bgr_to_grayscale(bgr: &[u8], width: usize, height: usize) -> Vec<u8> {
    convert(bgr, width * height, |px| luma(px[2], px[1], px[0]))
}

fn convert(packed: &[u8], pixel_count: usize, f: impl Fn(&[u8]) -> u8) -> Vec<u8> {
    let mut gray = Vec::with_capacity(pixel_count);

    // Process 8 pixels at a time
    let mut chunks = packed[..pixel_count * 3].chunks_exact(24);
    for block in &mut chunks {
        for px in block.chunks_exact(3) {
            gray.push(f(px));
        }
    }
    for px in chunks.remainder().chunks_exact(3) {
        gray.push(f(px));
    }

    gray
}
