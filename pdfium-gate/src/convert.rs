//! Post-processing of rendered B-G-R-A buffers

/// Transforms a rendered buffer in place.
///
/// Runs after the engine gate has been released, so converters may be
/// arbitrarily slow without blocking other callers.
pub trait ImageBytesConverter {
    fn convert(&self, bgra: &mut [u8]);
}

impl<F> ImageBytesConverter for F
where
    F: Fn(&mut [u8]),
{
    fn convert(&self, bgra: &mut [u8]) {
        self(bgra)
    }
}

/// Composites transparent pixels over a solid background.
///
/// Rendered pages have a transparent background; this flattens them so the
/// buffer can be saved in formats without alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaiveTransparencyRemover {
    red: u8,
    green: u8,
    blue: u8,
}

impl NaiveTransparencyRemover {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

impl Default for NaiveTransparencyRemover {
    /// White background.
    fn default() -> Self {
        Self::new(255, 255, 255)
    }
}

impl ImageBytesConverter for NaiveTransparencyRemover {
    fn convert(&self, bgra: &mut [u8]) {
        for pixel in bgra.chunks_exact_mut(4) {
            let alpha = u32::from(pixel[3]);
            let inverse = 255 - alpha;
            let blend = |channel: u8, background: u8| -> u8 {
                ((u32::from(channel) * alpha + u32::from(background) * inverse) >> 8) as u8
            };
            pixel[0] = blend(pixel[0], self.blue);
            pixel[1] = blend(pixel[1], self.green);
            pixel[2] = blend(pixel[2], self.red);
            pixel[3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_becomes_background() {
        let mut pixels = vec![10, 20, 30, 0];
        NaiveTransparencyRemover::new(200, 100, 50).convert(&mut pixels);
        // (bg * 255) >> 8 loses a little, as the formula does.
        assert_eq!(pixels, vec![49, 99, 199, 255]);
    }

    #[test]
    fn test_opaque_keeps_color_within_rounding() {
        let mut pixels = vec![10, 20, 30, 255];
        NaiveTransparencyRemover::default().convert(&mut pixels);
        assert_eq!(pixels, vec![9, 19, 29, 255]);
    }

    #[test]
    fn test_closure_converter() {
        let invert = |bgra: &mut [u8]| bgra.iter_mut().for_each(|b| *b = 255 - *b);
        let mut pixels = vec![0, 255, 10, 20];
        invert.convert(&mut pixels);
        assert_eq!(pixels, vec![255, 0, 245, 235]);
    }
}
