//! Animation planning service
//!
//! Sends the reply text to the chat backend with a direction prompt and
//! parses the result into an [`AnimationPlan`]. The parser is deliberately
//! tolerant: model output arrives fenced, as a lone object instead of an
//! array, or with adventurous tag values, and none of that may cost the
//! turn. Anything unusable degrades to the single-step fallback plan.

use std::sync::Arc;

use serde_json::Value;

use avatar_core::{AnimationPlan, AnimationStep};

use crate::chat::ChatService;

const DIRECTION_PROMPT: &str = r#"You are an animation director for a 3D character.
Analyze the following text and create a detailed animation sequence.

Return ONLY a valid JSON array of objects. Do not include explanations or code fences.

Available expressions: neutral, happy, sad, angry, surprised, excited, confused, smirk, laugh, embarrassed, determined, worried, curious, sleepy, mischievous
Available head motions: none, nod, shake, tiltLeft, tiltRight, lookUp, lookDown, doubleNod, confused
Available gestures: none, point, handWave, shrug, leanIn, crossArms, handToHeart, thumbsUp, facepalm, handToHip, stretch, clap, think, dance, talk, idle

Each object MUST have:
- "text": the spoken phrase or sentence,
- "expression": the most appropriate expression,
- "headMotion": an appropriate head movement,
- "gesture": an appropriate gesture (use gestures for emphasis, not every phrase),
- "duration": milliseconds for this step,
- "intensity": 0.1-1.0 animation strength

Match expressions to emotional content, vary head motions naturally, time steps
to speech rhythm, and use lower intensity for subtle moments.

Text to animate:
"#;

/// Plans animation sequences over a chat backend.
pub struct AnimationPlanner {
    backend: Arc<dyn ChatService>,
}

impl AnimationPlanner {
    pub fn new(backend: Arc<dyn ChatService>) -> Self {
        Self { backend }
    }

    /// Produce a plan for `reply_text`. Never fails; the worst case is the
    /// single-step fallback plan carrying the original text.
    pub async fn plan(&self, reply_text: &str) -> AnimationPlan {
        let prompt = format!("{DIRECTION_PROMPT}\"\"\"{reply_text}\"\"\"");
        let raw = self.backend.reply(&prompt, None).await;
        parse_plan(&raw, reply_text)
    }
}

/// Strip markdown code fences the model sometimes wraps JSON in.
fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse a planner response. `fallback_text` seeds the single-step fallback
/// plan used for non-JSON, empty, or otherwise unusable responses. A lone
/// JSON object is accepted and wrapped as a one-step plan.
pub fn parse_plan(raw: &str, fallback_text: &str) -> AnimationPlan {
    let cleaned = strip_fences(raw);

    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "planner response is not JSON, using fallback plan");
            return AnimationPlan::fallback(fallback_text);
        }
    };

    let array = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            tracing::warn!(got = %other, "planner response is not an array or object");
            return AnimationPlan::fallback(fallback_text);
        }
    };

    let steps: Vec<AnimationStep> = array
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<AnimationStep>(item) {
            Ok(step) => Some(step.sanitize()),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed plan step");
                None
            }
        })
        .collect();

    if steps.is_empty() {
        tracing::warn!("planner produced no usable steps, using fallback plan");
        return AnimationPlan::fallback(fallback_text);
    }
    AnimationPlan::from(steps)
}
