use serde::{Deserialize, Serialize};
use std::fmt;

use super::ClassifierError;

/// The emotion labels the classifier can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Calm,
    Disgust,
    Fearful,
    Happy,
    Neutral,
    Sad,
    Surprised,
}

impl Emotion {
    /// Every label, in the order the reference checkpoint emits logits
    pub const ALL: [Emotion; 8] = [
        Emotion::Angry,
        Emotion::Calm,
        Emotion::Disgust,
        Emotion::Fearful,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Angry => "angry",
            Self::Calm => "calm",
            Self::Disgust => "disgust",
            Self::Fearful => "fearful",
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
            Self::Surprised => "surprised",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Emotion {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| ClassifierError::LabelMismatch(format!("Unknown emotion label: {}", s)))
    }
}

/// Parse a configured label list, rejecting unknown or repeated labels
pub fn parse_labels(labels: &[String]) -> Result<Vec<Emotion>, ClassifierError> {
    if labels.is_empty() {
        return Err(ClassifierError::LabelMismatch("Label list is empty".to_string()));
    }
    let mut parsed = Vec::with_capacity(labels.len());
    for label in labels {
        let emotion: Emotion = label.parse()?;
        if parsed.contains(&emotion) {
            return Err(ClassifierError::LabelMismatch(format!(
                "Duplicate emotion label: {}",
                label
            )));
        }
        parsed.push(emotion);
    }
    Ok(parsed)
}

/// Probability per label, one named field each.
///
/// Labels outside the configured set stay `None` and are omitted when
/// serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angry: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disgust: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fearful: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub happy: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neutral: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sad: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surprised: Option<f32>,
}

impl LabelScores {
    pub fn set(&mut self, emotion: Emotion, probability: f32) {
        let slot = match emotion {
            Emotion::Angry => &mut self.angry,
            Emotion::Calm => &mut self.calm,
            Emotion::Disgust => &mut self.disgust,
            Emotion::Fearful => &mut self.fearful,
            Emotion::Happy => &mut self.happy,
            Emotion::Neutral => &mut self.neutral,
            Emotion::Sad => &mut self.sad,
            Emotion::Surprised => &mut self.surprised,
        };
        *slot = Some(probability);
    }

    pub fn get(&self, emotion: Emotion) -> Option<f32> {
        match emotion {
            Emotion::Angry => self.angry,
            Emotion::Calm => self.calm,
            Emotion::Disgust => self.disgust,
            Emotion::Fearful => self.fearful,
            Emotion::Happy => self.happy,
            Emotion::Neutral => self.neutral,
            Emotion::Sad => self.sad,
            Emotion::Surprised => self.surprised,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for emotion in Emotion::ALL {
            assert_eq!(emotion.as_str().parse::<Emotion>().unwrap(), emotion);
        }
        assert_eq!("  HAPPY ".parse::<Emotion>().unwrap(), Emotion::Happy);
    }

    #[test]
    fn test_unknown_label() {
        assert!(matches!(
            "bored".parse::<Emotion>(),
            Err(ClassifierError::LabelMismatch(_))
        ));
    }

    #[test]
    fn test_parse_labels_rejects_duplicates() {
        let labels = vec!["happy".to_string(), "sad".to_string(), "happy".to_string()];
        assert!(matches!(parse_labels(&labels), Err(ClassifierError::LabelMismatch(_))));
    }

    #[test]
    fn test_label_scores_serialization() {
        let mut scores = LabelScores::default();
        scores.set(Emotion::Happy, 0.75);
        scores.set(Emotion::Sad, 0.25);

        let json = serde_json::to_value(&scores).unwrap();
        assert_eq!(json["happy"], 0.75);
        assert_eq!(json["sad"], 0.25);
        assert!(json.get("angry").is_none());
        assert_eq!(scores.get(Emotion::Happy), Some(0.75));
    }
}
