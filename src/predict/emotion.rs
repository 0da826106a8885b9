//! Emotion labels and the classifier's response shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of classes the classifier scores.
pub const EMOTION_COUNT: usize = 6;

// ---------------------------------------------------------------------------
// Emotion
// ---------------------------------------------------------------------------

/// The six emotion classes, in the order the classifier reports
/// probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Fear,
    Happiness,
    Neutral,
    Sadness,
    Surprised,
}

impl Emotion {
    /// All classes in probability-vector order.
    pub const ALL: [Emotion; EMOTION_COUNT] = [
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Happiness,
        Emotion::Neutral,
        Emotion::Sadness,
        Emotion::Surprised,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Happiness => "happiness",
            Emotion::Neutral => "neutral",
            Emotion::Sadness => "sadness",
            Emotion::Surprised => "surprised",
        }
    }

    /// Position of this class in the probability vector.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown emotion label: {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// One classifier response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Per-class probabilities, indexed as [`Emotion::ALL`].
    pub probabilities: [f32; EMOTION_COUNT],
    /// Label chosen by the service.
    pub predicted_emotion: String,
}

impl Prediction {
    /// The service's label parsed as an [`Emotion`], if it is one of the six.
    pub fn emotion(&self) -> Option<Emotion> {
        self.predicted_emotion.parse().ok()
    }

    /// Class with the highest probability.  Ties resolve to the earlier class.
    pub fn top_emotion(&self) -> Emotion {
        let mut best = 0;
        for (i, &p) in self.probabilities.iter().enumerate() {
            if p > self.probabilities[best] {
                best = i;
            }
        }
        Emotion::ALL[best]
    }

    /// Probability assigned to `emotion`.
    pub fn probability(&self, emotion: Emotion) -> f32 {
        self.probabilities[emotion.index()]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
