//! Conversion curves mapping a driver value onto a target property.

use serde::{Deserialize, Serialize};

/// Interpolation shape between two curve points (also used for ramps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveType {
    /// Linear interpolation (default)
    #[default]
    Linear,
    /// Exponential curve (good for volume, frequency)
    Exponential,
    /// Instant jump (no interpolation)
    Step,
    /// S-curve (smooth transitions)
    SCurve,
}

impl CurveType {
    /// Interpolate between `from` and `to` at `t` in 0.0-1.0.
    pub fn interpolate(self, from: f32, to: f32, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            CurveType::Linear => from + (to - from) * t,
            CurveType::Step => from,
            CurveType::Exponential => from + (to - from) * (t * t),
            CurveType::SCurve => {
                // Smoothstep
                let t_smooth = t * t * (3.0 - 2.0 * t);
                from + (to - from) * t_smooth
            }
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Some(Self::Linear),
            "exponential" | "exp" => Some(Self::Exponential),
            "step" => Some(Self::Step),
            "scurve" | "s-curve" => Some(Self::SCurve),
            _ => None,
        }
    }
}

/// Converts a source value into a target property value.
///
/// The engine treats conversion as opaque; [`Curve`] is the stock
/// implementation.
pub trait Conversion: Send + Sync + std::fmt::Debug {
    fn convert(&self, input: f32) -> f32;
}

/// A single point of a conversion curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
    /// Shape of the segment starting at this point
    pub shape: CurveType,
}

impl CurvePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            shape: CurveType::default(),
        }
    }

    pub fn with_shape(x: f32, y: f32, shape: CurveType) -> Self {
        Self { x, y, shape }
    }
}

/// Piecewise conversion table. An empty table is the identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    points: Vec<CurvePoint>,
}

impl Curve {
    /// Build from points in any order; points are sorted by `x`.
    pub fn new(mut points: Vec<CurvePoint>) -> Self {
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self { points }
    }

    pub fn identity() -> Self {
        Self { points: Vec::new() }
    }

    pub fn linear(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::new(vec![CurvePoint::new(x0, y0), CurvePoint::new(x1, y1)])
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Evaluate the table at `x`. Inputs outside the table clamp to the end points.
    pub fn value_at(&self, x: f32) -> f32 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return x,
        };
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }

        // First point strictly after x; never 0 or len here.
        let next = self.points.partition_point(|p| p.x <= x);
        let p = &self.points[next - 1];
        let n = &self.points[next];
        if n.x <= p.x {
            return n.y;
        }
        let t = (x - p.x) / (n.x - p.x);
        p.shape.interpolate(p.y, n.y, t)
    }
}

impl Conversion for Curve {
    fn convert(&self, input: f32) -> f32 {
        self.value_at(input)
    }
}
