use crate::mcu::Block;

impl Block {
    /// Multiply each coefficient by its quantization step.
    ///
    /// Both the block and the table are in zigzag order.
    pub fn dequantize(&self, qt: &[u16; 64]) -> Self {
        let mut block = Block::default();
        for i in 0..64 {
            block.0[i] = (self.0[i] as i32 * qt[i] as i32).clamp(i16::MIN as i32, i16::MAX as i32)
                as i16;
        }
        block
    }

    /// Reorder from zigzag order to natural (row-major) order.
    pub fn zigzag(&self) -> Self {
        #[rustfmt::skip]
        const ZIGZAG: [usize; 64] = [
             0,  1,  5,  6, 14, 15, 27, 28,
             2,  4,  7, 13, 16, 26, 29, 42,
             3,  8, 12, 17, 25, 30, 41, 43,
             9, 11, 18, 24, 31, 40, 44, 53,
            10, 19, 23, 32, 39, 45, 52, 54,
            20, 22, 33, 38, 46, 51, 55, 60,
            21, 34, 37, 47, 50, 56, 59, 61,
            35, 36, 48, 49, 57, 58, 62, 63,
        ];

        let mut x = Block::default();
        for i in 0..8 {
            for j in 0..8 {
                x.0[i * 8 + j] = self.0[ZIGZAG[i * 8 + j]];
            }
        }
        x
    }

    /// Inverse DCT of a block in natural order.
    ///
    /// The resulting samples are centered on 0 (level shift not applied).
    pub fn idct(&self) -> Self {
        lazy_static::lazy_static! {
            // IDCT[x][u] = C(u) / 2 * cos((2x + 1) * u * PI / 16)
            static ref IDCT: [[f32; 8]; 8] = {
                use std::f32::consts::PI;
                let mut m = [[0.0; 8]; 8];
                for (x, row) in m.iter_mut().enumerate() {
                    for (u, v) in row.iter_mut().enumerate() {
                        *v = ((2 * x + 1) as f32 * u as f32 * PI / 16.0).cos() / 2.0;
                    }
                    row[0] *= 1.0 / 2_f32.sqrt();
                }
                m
            };
        }

        let idct = &*IDCT;
        // 1D IDCT of each row
        let mut res1 = [0f32; 64];
        for i in 0..8 {
            for j in 0..8 {
                let mut v = 0.0;
                for x in 0..8 {
                    v += self.0[i * 8 + x] as f32 * idct[j][x];
                }
                res1[i * 8 + j] = v;
            }
        }
        // 1D IDCT of each column
        let mut res2 = Block::default();
        for j in 0..8 {
            for i in 0..8 {
                let mut v = 0.0;
                for x in 0..8 {
                    v += res1[x * 8 + j] * idct[i][x];
                }
                res2.0[i * 8 + j] = v.round() as i16;
            }
        }
        res2
    }
}

/// Convert a centered sample to an unsigned 8-bit value.
///
/// The input is in 10-bit fixed point.
fn chomp(x: i32) -> u8 {
    ((x >> 10).clamp(i8::MIN as i32, i8::MAX as i32) as i8 as u8) ^ 0x80
}

fn fixed(x: f32) -> i32 {
    (x * 1024.0) as i32
}

/// Convert centered YCbCr samples to RGB.
pub fn ycbcr_to_rgb(y: i16, cb: i16, cr: i16) -> [u8; 3] {
    let y = (y as i32) << 10;
    let cb = cb as i32;
    let cr = cr as i32;
    [
        chomp(y + fixed(1.402) * cr),
        chomp(y - fixed(0.344) * cb - fixed(0.714) * cr),
        chomp(y + fixed(1.772) * cb),
    ]
}

/// Convert a centered luminance sample to a gray value.
pub fn gray(y: i16) -> u8 {
    chomp((y as i32) << 10)
}
