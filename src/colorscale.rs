// colorscale.rs

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Named continuous color scales, in the naming the chart objects use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorScale {
    YlOrRd,
    Jet,
    Viridis,
    Blues,
    Reds,
    Greys,
    Hot,
}

// (position, r, g, b)
type Stop = (f64, u8, u8, u8);

const YLORRD: &[Stop] = &[
    (0.0, 128, 0, 38),
    (0.125, 189, 0, 38),
    (0.25, 227, 26, 28),
    (0.375, 252, 78, 42),
    (0.5, 253, 141, 60),
    (0.625, 254, 178, 76),
    (0.75, 254, 217, 118),
    (0.875, 255, 237, 160),
    (1.0, 255, 255, 204),
];
const JET: &[Stop] = &[
    (0.0, 0, 0, 131),
    (0.125, 0, 60, 170),
    (0.375, 5, 255, 255),
    (0.625, 255, 255, 0),
    (0.875, 250, 0, 0),
    (1.0, 128, 0, 0),
];
const VIRIDIS: &[Stop] = &[
    (0.0, 68, 1, 84),
    (0.25, 59, 82, 139),
    (0.5, 33, 145, 140),
    (0.75, 94, 201, 98),
    (1.0, 253, 231, 37),
];
const BLUES: &[Stop] = &[(0.0, 5, 10, 172), (0.35, 106, 137, 247), (1.0, 220, 220, 220)];
const REDS: &[Stop] = &[(0.0, 220, 220, 220), (0.5, 245, 160, 105), (1.0, 178, 10, 28)];
const GREYS: &[Stop] = &[(0.0, 0, 0, 0), (1.0, 255, 255, 255)];
const HOT: &[Stop] = &[
    (0.0, 0, 0, 0),
    (0.3, 230, 0, 0),
    (0.6, 255, 210, 0),
    (1.0, 255, 255, 255),
];

impl ColorScale {
    fn stops(self) -> &'static [Stop] {
        match self {
            ColorScale::YlOrRd => YLORRD,
            ColorScale::Jet => JET,
            ColorScale::Viridis => VIRIDIS,
            ColorScale::Blues => BLUES,
            ColorScale::Reds => REDS,
            ColorScale::Greys => GREYS,
            ColorScale::Hot => HOT,
        }
    }

    /// Color at `t` in `[0, 1]`; out-of-range and NaN inputs are clamped.
    pub fn sample(self, t: f64) -> (u8, u8, u8) {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let stops = self.stops();
        let upper = stops
            .iter()
            .position(|stop| stop.0 >= t)
            .unwrap_or(stops.len() - 1);
        if upper == 0 {
            return (stops[0].1, stops[0].2, stops[0].3);
        }
        let (p0, r0, g0, b0) = stops[upper - 1];
        let (p1, r1, g1, b1) = stops[upper];
        let f = if p1 > p0 { (t - p0) / (p1 - p0) } else { 0.0 };
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
        (lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
    }

    /// Maps `value` in `[min, max]` onto the scale, optionally reversed.
    pub fn color_for(self, value: f64, min: f64, max: f64, reversed: bool) -> (u8, u8, u8) {
        let t = if max > min { (value - min) / (max - min) } else { 0.5 };
        self.sample(if reversed { 1.0 - t } else { t })
    }
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for ColorScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ylorrd" => Ok(ColorScale::YlOrRd),
            "jet" => Ok(ColorScale::Jet),
            "viridis" => Ok(ColorScale::Viridis),
            "blues" => Ok(ColorScale::Blues),
            "reds" => Ok(ColorScale::Reds),
            "greys" | "grays" => Ok(ColorScale::Greys),
            "hot" => Ok(ColorScale::Hot),
            other => Err(format!("unknown color scale '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_match_first_and_last_stop() {
        assert_eq!(ColorScale::Greys.sample(0.0), (0, 0, 0));
        assert_eq!(ColorScale::Greys.sample(1.0), (255, 255, 255));
        assert_eq!(ColorScale::Greys.sample(7.0), (255, 255, 255));
        assert_eq!(ColorScale::Greys.sample(f64::NAN), (0, 0, 0));
    }

    #[test]
    fn interpolates_between_stops() {
        let (r, g, b) = ColorScale::Greys.sample(0.5);
        assert!((127..=128).contains(&r));
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn reversed_flips_the_domain() {
        let low = ColorScale::YlOrRd.color_for(0.0, 0.0, 10.0, true);
        assert_eq!(low, ColorScale::YlOrRd.sample(1.0));
        let flat = ColorScale::Greys.color_for(3.0, 3.0, 3.0, false);
        assert_eq!(flat, ColorScale::Greys.sample(0.5));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("YlOrRd".parse::<ColorScale>(), Ok(ColorScale::YlOrRd));
        assert_eq!(" jet ".parse::<ColorScale>(), Ok(ColorScale::Jet));
        assert!("rainbowish".parse::<ColorScale>().is_err());
    }
}
