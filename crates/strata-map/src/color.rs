use std::fmt;

/// A non-premultiplied 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::argb(0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    /// An opaque color from `0xRRGGBB`.
    pub const fn rgb(rgb: u32) -> Self {
        Rgba::argb(0xff00_0000 | rgb)
    }

    /// A color from `0xAARRGGBB`.
    pub const fn argb(argb: u32) -> Self {
        Rgba {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    pub fn is_opaque(self) -> bool {
        self.a == u8::MAX
    }

    /// Draws `top` over `self`: `out = self * (1 - a) + top * a`.
    pub fn over(self, top: Rgba) -> Rgba {
        match top.a {
            0 => return self,
            u8::MAX => return top,
            _ => {}
        }
        let a = f64::from(top.a) / 255.0;
        let mix = |old: u8, new: u8| (f64::from(old) * (1.0 - a) + f64::from(new) * a) as u8;
        Rgba {
            r: mix(self.r, top.r),
            g: mix(self.g, top.g),
            b: mix(self.b, top.b),
            a: (f64::from(top.a) + f64::from(self.a) * (1.0 - a)).round() as u8,
        }
    }

    pub fn to_argb(self) -> u32 {
        u32::from(self.a) << 24 | u32::from(self.r) << 16 | u32::from(self.g) << 8 | u32::from(self.b)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.to_argb())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_short_circuits() {
        let base = Rgba::rgb(0x102030);
        assert_eq!(base.over(Rgba::TRANSPARENT), base);
        assert_eq!(base.over(Rgba::rgb(0xffffff)), Rgba::rgb(0xffffff));
    }

    #[test]
    fn test_over_blends() {
        let water = Rgba::argb(0x400000ff);
        let out = Rgba::rgb(0xc0c0c0).over(water);
        // a = 64/255
        assert_eq!(out, Rgba::new(143, 143, 207, 255));
    }

    #[test]
    fn test_display() {
        assert_eq!(Rgba::argb(0x80ff0001).to_string(), "#80ff0001");
    }
}
