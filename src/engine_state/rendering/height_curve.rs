//! Height remap curve applied to normalized heights before they are scaled.

use serde::{Deserialize, Serialize};

/// A piecewise-linear `f32 -> f32` curve defined by keyframes.
///
/// Keys are kept sorted by input. Inputs before the first key or after the last
/// evaluate to that key's output. A curve without keys is the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct HeightCurve {
    keys: Vec<[f32; 2]>,
}

impl HeightCurve {
    /// Builds a curve from `[input, output]` keys in any order.
    pub fn new(mut keys: Vec<[f32; 2]>) -> Self {
        keys.retain(|[t, v]| t.is_finite() && v.is_finite());
        keys.sort_by(|a, b| a[0].total_cmp(&b[0]));
        Self { keys }
    }

    /// The identity over `[0, 1]`.
    pub fn linear() -> Self {
        Self::new(vec![[0.0, 0.0], [1.0, 1.0]])
    }

    /// Keys sorted by input.
    pub fn keys(&self) -> &[[f32; 2]] {
        &self.keys
    }

    /// Evaluates the curve at `t`.
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return t,
        };

        if t <= first[0] {
            return first[1];
        }
        if t >= last[0] {
            return last[1];
        }

        // `t` lies strictly inside the key range, so some window brackets it.
        self.keys
            .windows(2)
            .find(|pair| t <= pair[1][0])
            .map_or(last[1], |pair| {
                let [t0, v0] = pair[0];
                let [t1, v1] = pair[1];
                if t1 == t0 {
                    v1
                } else {
                    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
                }
            })
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl From<Vec<[f32; 2]>> for HeightCurve {
    fn from(keys: Vec<[f32; 2]>) -> Self {
        Self::new(keys)
    }
}

impl From<HeightCurve> for Vec<[f32; 2]> {
    fn from(curve: HeightCurve) -> Self {
        curve.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_curve_is_identity_inside_unit_range() {
        let curve = HeightCurve::linear();
        for t in [0.0, 0.25, 0.5, 1.0] {
            assert_eq!(curve.evaluate(t), t);
        }
    }

    #[test]
    fn keys_are_sorted_and_interpolated() {
        let curve = HeightCurve::new(vec![[1.0, 1.0], [0.0, 0.0], [0.4, 0.0]]);

        assert_eq!(curve.keys()[1], [0.4, 0.0]);
        assert_eq!(curve.evaluate(0.2), 0.0);
        assert!((curve.evaluate(0.7) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn outside_key_range_clamps_to_end_keys() {
        let curve = HeightCurve::new(vec![[0.2, 0.1], [0.8, 0.9]]);
        assert_eq!(curve.evaluate(-1.0), 0.1);
        assert_eq!(curve.evaluate(2.0), 0.9);
    }

    #[test]
    fn empty_curve_passes_values_through() {
        assert_eq!(HeightCurve::new(Vec::new()).evaluate(0.37), 0.37);
    }

    #[test]
    fn deserializes_from_key_pairs() {
        let curve: HeightCurve = serde_json::from_str("[[1.0, 2.0], [0.0, 0.0]]").unwrap();
        assert_eq!(curve.keys(), &[[0.0, 0.0], [1.0, 2.0]]);
    }
}
