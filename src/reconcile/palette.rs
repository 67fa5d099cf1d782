use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Pseudo-random, reasonably saturated colors for new device roles
pub struct RolePalette {
    rng: StdRng,
}

impl RolePalette {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from the wall clock, so each run picks different colors
    pub fn from_clock() -> Self {
        Self::with_seed(chrono::Utc::now().timestamp_micros() as u64)
    }

    /// Six lowercase hex digits, no leading `#`
    pub fn next_color(&mut self) -> String {
        let hue = self.rng.gen_range(0.0..360.0);
        let saturation = self.rng.gen_range(0.55..0.95);
        let value = self.rng.gen_range(0.60..0.95);
        let (r, g, b) = hsv_to_rgb(hue, saturation, value);
        format!("{:02x}{:02x}{:02x}", r, g, b)
    }
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let c = v * s;
    let sector = h / 60.0;
    let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let channel = |f: f64| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r), channel(g), channel(b))
}
