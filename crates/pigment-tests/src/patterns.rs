//! Test tile generation
//!
//! Tiles are raw byte buffers in the layout the kernels consume, tightly
//! packed, so the stride is `width * layout.pixel_size()`.

use pigment_core::PixelLayout;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Tile pattern types
#[derive(Debug, Clone, Copy)]
pub enum TilePattern {
    /// Random colors; alpha is often exactly zero or opaque
    Random(u64),
    /// Random colors, fully opaque
    Opaque(u64),
    /// All channels zero
    Transparent,
    /// Mid gray with alpha rising left to right
    AlphaRamp,
}

/// Generate a tile as raw bytes
pub fn generate_tile(pattern: TilePattern, layout: PixelLayout, width: usize, height: usize) -> Vec<u8> {
    let pixels = width * height;
    let mut values = Vec::with_capacity(pixels * 4);

    match pattern {
        TilePattern::Random(seed) | TilePattern::Opaque(seed) => {
            let opaque = matches!(pattern, TilePattern::Opaque(_));
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..pixels {
                for _ in 0..3 {
                    values.push(rng.r#gen::<f32>());
                }
                let alpha = if opaque {
                    1.0
                } else {
                    match rng.gen_range(0..4) {
                        0 => 0.0,
                        1 => 1.0,
                        _ => rng.r#gen::<f32>(),
                    }
                };
                values.push(alpha);
            }
        }
        TilePattern::Transparent => values.resize(pixels * 4, 0.0),
        TilePattern::AlphaRamp => {
            for _ in 0..height {
                for x in 0..width {
                    let alpha = if width > 1 { x as f32 / (width - 1) as f32 } else { 1.0 };
                    values.extend_from_slice(&[0.5, 0.5, 0.5, alpha]);
                }
            }
        }
    }

    encode(layout, &values)
}

/// Generate a random 8-bit mask, one byte per pixel
pub fn generate_mask(seed: u64, width: usize, height: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..width * height)
        .map(|_| match rng.gen_range(0..4) {
            0 => 0,
            1 => 255,
            _ => rng.r#gen::<u8>(),
        })
        .collect()
}

/// Encode unit-range channel values into `layout`
pub fn encode(layout: PixelLayout, values: &[f32]) -> Vec<u8> {
    match layout {
        PixelLayout::Bgra8 => values.iter().map(|v| (v * 255.0).round() as u8).collect(),
        PixelLayout::Bgra16 => values
            .iter()
            .flat_map(|v| ((v * 65535.0).round() as u16).to_ne_bytes())
            .collect(),
        PixelLayout::RgbaF32 => values.iter().flat_map(|v| v.to_ne_bytes()).collect(),
    }
}

/// Decode raw bytes of `layout` into unit-range channel values
pub fn decode(layout: PixelLayout, bytes: &[u8]) -> Vec<f32> {
    match layout {
        PixelLayout::Bgra8 => bytes.iter().map(|v| f32::from(*v) / 255.0).collect(),
        PixelLayout::Bgra16 => bytes
            .chunks_exact(2)
            .map(|c| f32::from(u16::from_ne_bytes([c[0], c[1]])) / 65535.0)
            .collect(),
        PixelLayout::RgbaF32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_sizes() {
        for layout in [PixelLayout::Bgra8, PixelLayout::Bgra16, PixelLayout::RgbaF32] {
            let tile = generate_tile(TilePattern::Random(1), layout, 7, 3);
            assert_eq!(tile.len(), 7 * 3 * layout.pixel_size());
        }
    }

    #[test]
    fn test_seeded_tiles_repeat() {
        let a = generate_tile(TilePattern::Random(42), PixelLayout::Bgra8, 16, 16);
        let b = generate_tile(TilePattern::Random(42), PixelLayout::Bgra8, 16, 16);
        let c = generate_tile(TilePattern::Random(43), PixelLayout::Bgra8, 16, 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let values = [0.0, 0.25, 0.5, 1.0];
        let decoded = decode(PixelLayout::Bgra16, &encode(PixelLayout::Bgra16, &values));
        for (a, b) in values.iter().zip(&decoded) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
