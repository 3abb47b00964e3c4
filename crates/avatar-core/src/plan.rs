//! Animation plan types
//!
//! A plan is an ordered list of steps produced by the planning service, one
//! per spoken phrase. Tag enums are closed sets; an unknown tag string from
//! the planner degrades to the neutral/none variant instead of failing the
//! whole plan.

use serde::{Deserialize, Serialize};

use crate::math::clamp;
use crate::shape::BlendShape;

/// Named emotion driven during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmotionTag {
    Happy,
    Sad,
    Angry,
    Surprised,
    Excited,
    Confused,
    Smirk,
    Laugh,
    Embarrassed,
    Determined,
    Worried,
    Curious,
    Sleepy,
    Mischievous,
    #[default]
    #[serde(other)]
    Neutral,
}

impl EmotionTag {
    pub const ALL: [EmotionTag; 15] = [
        EmotionTag::Neutral,
        EmotionTag::Happy,
        EmotionTag::Sad,
        EmotionTag::Angry,
        EmotionTag::Surprised,
        EmotionTag::Excited,
        EmotionTag::Confused,
        EmotionTag::Smirk,
        EmotionTag::Laugh,
        EmotionTag::Embarrassed,
        EmotionTag::Determined,
        EmotionTag::Worried,
        EmotionTag::Curious,
        EmotionTag::Sleepy,
        EmotionTag::Mischievous,
    ];

    /// The blend shapes this emotion drives together.
    ///
    /// Every tag resolves to at least one shape, except `Neutral` which is
    /// a no-op.
    pub fn shapes(&self) -> &'static [BlendShape] {
        match self {
            EmotionTag::Neutral => &[],
            EmotionTag::Happy => &[BlendShape::Happy, BlendShape::Joy],
            EmotionTag::Sad => &[BlendShape::Sad, BlendShape::Sorrow],
            EmotionTag::Angry => &[BlendShape::Angry, BlendShape::Fury],
            EmotionTag::Surprised => &[BlendShape::Surprised, BlendShape::Shocked],
            EmotionTag::Excited => &[BlendShape::Excited, BlendShape::Happy],
            EmotionTag::Confused => &[BlendShape::Confused, BlendShape::Sad],
            EmotionTag::Smirk => &[BlendShape::Smirk, BlendShape::Happy],
            EmotionTag::Laugh => &[BlendShape::Happy, BlendShape::Joy],
            EmotionTag::Embarrassed => &[BlendShape::Blink, BlendShape::Happy],
            EmotionTag::Determined => &[BlendShape::Angry],
            EmotionTag::Worried => &[BlendShape::Sad, BlendShape::Blink],
            EmotionTag::Curious => &[BlendShape::Surprised],
            EmotionTag::Sleepy => &[BlendShape::Relaxed, BlendShape::Blink],
            EmotionTag::Mischievous => &[BlendShape::Smirk, BlendShape::Wink],
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, EmotionTag::Neutral)
    }

    /// Canonical camelCase name.
    pub fn name(&self) -> &'static str {
        match self {
            EmotionTag::Neutral => "neutral",
            EmotionTag::Happy => "happy",
            EmotionTag::Sad => "sad",
            EmotionTag::Angry => "angry",
            EmotionTag::Surprised => "surprised",
            EmotionTag::Excited => "excited",
            EmotionTag::Confused => "confused",
            EmotionTag::Smirk => "smirk",
            EmotionTag::Laugh => "laugh",
            EmotionTag::Embarrassed => "embarrassed",
            EmotionTag::Determined => "determined",
            EmotionTag::Worried => "worried",
            EmotionTag::Curious => "curious",
            EmotionTag::Sleepy => "sleepy",
            EmotionTag::Mischievous => "mischievous",
        }
    }

    /// Strict lookup by name, unlike the tolerant serde path. Configuration
    /// validation uses this so a typo is rejected at load time.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.name() == name)
    }
}

/// Head motion performed during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeadMotionTag {
    Nod,
    Shake,
    TiltLeft,
    TiltRight,
    LookUp,
    LookDown,
    DoubleNod,
    Confused,
    #[default]
    #[serde(other)]
    None,
}

impl HeadMotionTag {
    pub fn is_none(&self) -> bool {
        matches!(self, HeadMotionTag::None)
    }
}

/// Body gesture performed during a step.
///
/// At play time exactly one of {pre-loaded motion clip, procedural routine}
/// backs a gesture; a tag with neither is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GestureTag {
    Point,
    HandWave,
    Shrug,
    LeanIn,
    CrossArms,
    HandToHeart,
    ThumbsUp,
    Facepalm,
    HandToHip,
    Stretch,
    Clap,
    Think,
    Dance,
    Talk,
    Idle,
    #[default]
    #[serde(other)]
    None,
}

impl GestureTag {
    pub fn is_none(&self) -> bool {
        matches!(self, GestureTag::None)
    }

    /// Clip-library key for this gesture, if the asset set names one.
    pub fn clip_name(&self) -> Option<&'static str> {
        match self {
            GestureTag::HandWave => Some("wave"),
            GestureTag::Shrug => Some("shrug"),
            GestureTag::Point => Some("pointing"),
            GestureTag::Clap => Some("clapping"),
            GestureTag::ThumbsUp => Some("thumbsup"),
            GestureTag::Dance => Some("dance"),
            GestureTag::Talk => Some("talk"),
            GestureTag::Idle => Some("idle"),
            _ => None,
        }
    }
}

fn default_duration() -> u64 {
    2000
}

fn default_intensity() -> f32 {
    0.7
}

/// One step of an animation plan: a spoken phrase plus the expression, head
/// motion, and gesture that accompany it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationStep {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub expression: EmotionTag,
    #[serde(default)]
    pub head_motion: HeadMotionTag,
    #[serde(default)]
    pub gesture: GestureTag,
    #[serde(rename = "duration", default = "default_duration")]
    pub duration_ms: u64,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

impl AnimationStep {
    /// The safe single-step plan used whenever the planner response cannot
    /// be used: speak the text with no expression, motion, or gesture.
    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expression: EmotionTag::Neutral,
            head_motion: HeadMotionTag::None,
            gesture: GestureTag::None,
            duration_ms: 2000,
            intensity: 0.5,
        }
    }

    /// Clamp intensity into the valid `[0.1, 1.0]` range.
    pub fn sanitize(mut self) -> Self {
        self.intensity = clamp(self.intensity, 0.1, 1.0);
        self
    }
}

/// Ordered sequence of animation steps; insertion order is playback order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationPlan(pub Vec<AnimationStep>);

impl AnimationPlan {
    pub fn fallback(text: impl Into<String>) -> Self {
        Self(vec![AnimationStep::fallback(text)])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[AnimationStep] {
        &self.0
    }
}

impl From<Vec<AnimationStep>> for AnimationPlan {
    fn from(steps: Vec<AnimationStep>) -> Self {
        Self(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_emotion_resolves() {
        for tag in EmotionTag::ALL {
            if tag.is_neutral() {
                assert!(tag.shapes().is_empty());
            } else {
                assert!(!tag.shapes().is_empty(), "{tag:?} resolves to no shapes");
            }
        }
    }

    #[test]
    fn test_step_deserialize_camel_case() {
        let step: AnimationStep = serde_json::from_str(
            r#"{"text":"Hi!","expression":"happy","headMotion":"doubleNod","gesture":"handWave","duration":1500,"intensity":0.8}"#,
        )
        .unwrap();
        assert_eq!(step.expression, EmotionTag::Happy);
        assert_eq!(step.head_motion, HeadMotionTag::DoubleNod);
        assert_eq!(step.gesture, GestureTag::HandWave);
        assert_eq!(step.duration_ms, 1500);
    }

    #[test]
    fn test_unknown_tags_degrade() {
        let step: AnimationStep = serde_json::from_str(
            r#"{"text":"x","expression":"ecstatic","headMotion":"spin","gesture":"moonwalk","duration":900,"intensity":0.4}"#,
        )
        .unwrap();
        assert_eq!(step.expression, EmotionTag::Neutral);
        assert_eq!(step.head_motion, HeadMotionTag::None);
        assert_eq!(step.gesture, GestureTag::None);
        assert_eq!(step.duration_ms, 900);
    }

    #[test]
    fn test_missing_fields_default() {
        let step: AnimationStep = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(step.expression, EmotionTag::Neutral);
        assert_eq!(step.duration_ms, 2000);
        assert_eq!(step.intensity, 0.7);
    }

    #[test]
    fn test_sanitize_clamps_intensity() {
        let step = AnimationStep { intensity: 3.0, ..AnimationStep::fallback("x") }.sanitize();
        assert_eq!(step.intensity, 1.0);
        let step = AnimationStep { intensity: 0.0, ..AnimationStep::fallback("x") }.sanitize();
        assert_eq!(step.intensity, 0.1);
    }
}
