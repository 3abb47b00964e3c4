//! Blend-shape enumeration and weight store
//!
//! Shape names form a closed set. Unknown names are rejected when parsed
//! (configuration load, plan ingestion) instead of silently mapping to a
//! weight of zero at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::math::clamp;

/// Facial blend shapes of the humanoid model.
///
/// Covers the emotion shapes driven by the expression animator, the eye
/// shapes driven by the blink loop, and the mouth visemes driven by the
/// lip-sync engine. `Happy` is shared between the expression animator and
/// lip-sync; both write it fractionally, never destructively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum BlendShape {
    Happy,
    Joy,
    Sad,
    Sorrow,
    Angry,
    Fury,
    Surprised,
    Shocked,
    Excited,
    Confused,
    Smirk,
    Relaxed,
    Blink,
    Wink,
    Aa,
    Ee,
    Oh,
}

impl BlendShape {
    /// Number of shapes in the closed set.
    pub const COUNT: usize = 17;

    /// Every shape, in store-index order.
    pub const ALL: [BlendShape; Self::COUNT] = [
        BlendShape::Happy,
        BlendShape::Joy,
        BlendShape::Sad,
        BlendShape::Sorrow,
        BlendShape::Angry,
        BlendShape::Fury,
        BlendShape::Surprised,
        BlendShape::Shocked,
        BlendShape::Excited,
        BlendShape::Confused,
        BlendShape::Smirk,
        BlendShape::Relaxed,
        BlendShape::Blink,
        BlendShape::Wink,
        BlendShape::Aa,
        BlendShape::Ee,
        BlendShape::Oh,
    ];

    /// The four mouth-related shapes written by the lip-sync engine.
    pub const MOUTH: [BlendShape; 4] =
        [BlendShape::Aa, BlendShape::Ee, BlendShape::Oh, BlendShape::Happy];

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            BlendShape::Happy => "happy",
            BlendShape::Joy => "joy",
            BlendShape::Sad => "sad",
            BlendShape::Sorrow => "sorrow",
            BlendShape::Angry => "angry",
            BlendShape::Fury => "fury",
            BlendShape::Surprised => "surprised",
            BlendShape::Shocked => "shocked",
            BlendShape::Excited => "excited",
            BlendShape::Confused => "confused",
            BlendShape::Smirk => "smirk",
            BlendShape::Relaxed => "relaxed",
            BlendShape::Blink => "blink",
            BlendShape::Wink => "wink",
            BlendShape::Aa => "aa",
            BlendShape::Ee => "ee",
            BlendShape::Oh => "oh",
        }
    }
}

impl fmt::Display for BlendShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlendShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|shape| shape.name() == s)
            .ok_or_else(|| Error::UnknownShape(s.to_string()))
    }
}

/// Current weight of every blend shape, each in `[0, 1]`.
///
/// Mutated by the expression animator, the lip-sync engine, and the blink
/// loop. Writers to different shapes are safe by construction; the one
/// shared shape (`Happy`) accepts an intentional soft blend.
#[derive(Debug, Clone)]
pub struct BlendShapeStore {
    weights: [f32; BlendShape::COUNT],
}

impl Default for BlendShapeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlendShapeStore {
    pub fn new() -> Self {
        Self { weights: [0.0; BlendShape::COUNT] }
    }

    /// Current weight of `shape`.
    pub fn value(&self, shape: BlendShape) -> f32 {
        self.weights[shape as usize]
    }

    /// Set `shape` to `weight`, clamped to `[0, 1]`.
    pub fn set(&mut self, shape: BlendShape, weight: f32) {
        self.weights[shape as usize] = clamp(weight, 0.0, 1.0);
    }

    /// Move `shape` a fraction of the way toward `target`.
    ///
    /// This is the only mutation concurrent writers use on shared shapes,
    /// so no write ever snaps a value owned by another loop.
    pub fn blend_toward(&mut self, shape: BlendShape, target: f32, factor: f32) {
        let current = self.value(shape);
        self.set(shape, current + (target - current) * factor);
    }

    /// Multiply `shape` by `retention`, flooring at zero.
    pub fn decay(&mut self, shape: BlendShape, retention: f32) {
        let current = self.value(shape);
        self.set(shape, (current * retention).max(0.0));
    }

    /// Reset every shape to zero.
    pub fn reset(&mut self) {
        self.weights = [0.0; BlendShape::COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_roundtrip() {
        for shape in BlendShape::ALL {
            assert_eq!(shape.name().parse::<BlendShape>().unwrap(), shape);
        }
    }

    #[test]
    fn test_unknown_shape_rejected() {
        assert!("grin".parse::<BlendShape>().is_err());
        assert!("".parse::<BlendShape>().is_err());
    }

    #[test]
    fn test_store_clamps() {
        let mut store = BlendShapeStore::new();
        store.set(BlendShape::Aa, 1.7);
        assert_eq!(store.value(BlendShape::Aa), 1.0);
        store.set(BlendShape::Aa, -0.2);
        assert_eq!(store.value(BlendShape::Aa), 0.0);
    }

    #[test]
    fn test_blend_toward() {
        let mut store = BlendShapeStore::new();
        store.set(BlendShape::Happy, 0.0);
        store.blend_toward(BlendShape::Happy, 1.0, 0.25);
        assert!((store.value(BlendShape::Happy) - 0.25).abs() < 1e-6);
        store.blend_toward(BlendShape::Happy, 1.0, 0.25);
        assert!((store.value(BlendShape::Happy) - 0.4375).abs() < 1e-6);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let mut store = BlendShapeStore::new();
        store.set(BlendShape::Oh, 0.5);
        for _ in 0..200 {
            store.decay(BlendShape::Oh, 0.9);
        }
        assert!(store.value(BlendShape::Oh) >= 0.0);
        assert!(store.value(BlendShape::Oh) < 0.01);
    }
}
