/// Linear premultiplied RGBA color.
///
/// Invariant:
/// - `rgb` components are expected to be multiplied by `a` (premultiplied alpha).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32, // premultiplied
    pub g: f32, // premultiplied
    pub b: f32, // premultiplied
    pub a: f32,
}

impl Color {
    /// Creates a premultiplied color from premultiplied components.
    #[inline]
    pub const fn from_premul(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from hue (degrees, wrapped into `[0, 360)`), saturation and value in `[0, 1]`.
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let s = saturation.clamp(0.0, 1.0);
        let v = value.clamp(0.0, 1.0);

        let c = v * s;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = v - c;

        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        Self::from_premul(r + m, g + m, b + m, 1.0)
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 1e-5
            && (a.g - b.g).abs() < 1e-5
            && (a.b - b.b).abs() < 1e-5
            && (a.a - b.a).abs() < 1e-5
    }

    #[test]
    fn hsv_primaries() {
        assert!(approx(Color::from_hsv(0.0, 1.0, 1.0), Color::from_premul(1.0, 0.0, 0.0, 1.0)));
        assert!(approx(Color::from_hsv(120.0, 1.0, 1.0), Color::from_premul(0.0, 1.0, 0.0, 1.0)));
        assert!(approx(Color::from_hsv(240.0, 1.0, 1.0), Color::from_premul(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn hsv_hue_wraps() {
        assert!(approx(Color::from_hsv(360.0, 1.0, 1.0), Color::from_hsv(0.0, 1.0, 1.0)));
        assert!(approx(Color::from_hsv(-120.0, 1.0, 1.0), Color::from_hsv(240.0, 1.0, 1.0)));
    }

    #[test]
    fn hsv_zero_saturation_is_grey() {
        assert!(approx(Color::from_hsv(77.0, 0.0, 0.25), Color::from_premul(0.25, 0.25, 0.25, 1.0)));
    }

    #[test]
    fn hsv_inputs_are_clamped() {
        assert!(approx(Color::from_hsv(0.0, 2.0, 3.0), Color::from_premul(1.0, 0.0, 0.0, 1.0)));
        assert!(approx(Color::from_hsv(0.0, 1.0, -1.0), Color::from_premul(0.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn to_wgpu_keeps_premultiplied_channels() {
        let c = Color::from_premul(0.25, 0.5, 0.0, 0.5).to_wgpu();
        assert_eq!((c.r, c.g, c.b, c.a), (0.25, 0.5, 0.0, 0.5));
    }
}
