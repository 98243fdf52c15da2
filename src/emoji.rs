//! Emoji suggestions from ranked emotion scores.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::emotion::{Emotion, EmotionScore};

/// How many of the highest-ranked emotions contribute candidates
pub const MAX_CONSIDERED_EMOTIONS: usize = 5;

/// Returned when no considered emotion has a mapping
pub const DEFAULT_EMOJIS: [&str; 3] = ["😐", "😶", "🤔"];

const DEFAULT_MAPPING: [(Emotion, [&str; 3]); 8] = [
    (Emotion::Angry, ["😠", "😡", "😤"]),
    (Emotion::Calm, ["😌", "😇", "🙂"]),
    (Emotion::Disgust, ["🤢", "😒", "😖"]),
    (Emotion::Fearful, ["😨", "😰", "😱"]),
    (Emotion::Happy, ["😊", "😄", "🥰"]),
    (Emotion::Neutral, ["😐", "😶", "🤔"]),
    (Emotion::Sad, ["😢", "😔", "😞"]),
    (Emotion::Surprised, ["😮", "😲", "🤯"]),
];

/// Emoji palette grouped by coarse mood, served by `GET /emojis`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmojiCategories {
    pub great: Vec<String>,
    pub good: Vec<String>,
    pub okay: Vec<String>,
    pub low: Vec<String>,
    pub terrible: Vec<String>,
}

impl Default for EmojiCategories {
    fn default() -> Self {
        fn set(emojis: &[&str]) -> Vec<String> {
            emojis.iter().map(|e| e.to_string()).collect()
        }
        Self {
            great: set(&["😊", "😄", "🥰", "😍", "🤗", "💚", "😁", "🌟"]),
            good: set(&["🙂", "😌", "😇", "🤓", "💛", "😎", "👍"]),
            okay: set(&["😐", "😑", "🤔", "😶", "💙", "😏", "🙃"]),
            low: set(&["😔", "😞", "😕", "😟", "🧡", "😒", "😥"]),
            terrible: set(&["😢", "😭", "😰", "😨", "💔", "😖", "😩", "😱"]),
        }
    }
}

/// Maps emotion scores to a short, ranked, duplicate-free emoji list
#[derive(Debug, Clone)]
pub struct EmojiMapper {
    mapping: HashMap<Emotion, Vec<String>>,
    categories: EmojiCategories,
}

impl Default for EmojiMapper {
    fn default() -> Self {
        Self::with_mapping(
            DEFAULT_MAPPING
                .iter()
                .map(|(emotion, set)| (*emotion, set.iter().map(|e| e.to_string()).collect()))
                .collect(),
        )
    }
}

impl EmojiMapper {
    /// Mapper over a custom emotion -> emoji table. Emotions missing from
    /// `mapping` contribute no candidates.
    pub fn with_mapping(mapping: HashMap<Emotion, Vec<String>>) -> Self {
        Self {
            mapping,
            categories: EmojiCategories::default(),
        }
    }

    pub fn emojis_for(&self, emotion: Emotion) -> Option<&[String]> {
        self.mapping.get(&emotion).map(Vec::as_slice)
    }

    /// Suggest up to `top_k` emojis for `scores` (ranked highest first).
    ///
    /// Each of the first five emotions expands into its emoji set, every
    /// emoji weighted by that emotion's score. Candidates are ordered by
    /// weight with ties kept in rank order, then deduplicated.
    pub fn suggest(&self, scores: &[EmotionScore], top_k: usize) -> Vec<String> {
        let mut candidates: Vec<(&str, f32)> = scores
            .iter()
            .take(MAX_CONSIDERED_EMOTIONS)
            .filter_map(|entry| {
                self.mapping
                    .get(&entry.emotion)
                    .map(|set| set.iter().map(move |emoji| (emoji.as_str(), entry.score)))
            })
            .flatten()
            .collect();

        if candidates.is_empty() {
            return DEFAULT_EMOJIS.iter().map(|e| e.to_string()).collect();
        }

        // sort_by is stable
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|(emoji, _)| seen.insert(*emoji))
            .take(top_k)
            .map(|(emoji, _)| emoji.to_string())
            .collect()
    }

    /// Every mapped emoji once, in label order
    pub fn all_emojis(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        Emotion::ALL
            .iter()
            .filter_map(|emotion| self.mapping.get(emotion))
            .flatten()
            .filter(|emoji| seen.insert(emoji.as_str()))
            .cloned()
            .collect()
    }

    pub fn categories(&self) -> &EmojiCategories {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn score(emotion: Emotion, score: f32) -> EmotionScore {
        EmotionScore { emotion, score }
    }

    #[test]
    fn test_happy_calm_neutral_scenario() {
        let mut mapping = HashMap::new();
        mapping.insert(Emotion::Happy, vec!["😊".into(), "😄".into(), "🥰".into()]);
        mapping.insert(Emotion::Calm, vec!["😌".into(), "😇".into(), "🙂".into()]);
        let mapper = EmojiMapper::with_mapping(mapping);

        let scores = [
            score(Emotion::Happy, 0.7),
            score(Emotion::Calm, 0.2),
            score(Emotion::Neutral, 0.1),
        ];
        let emojis = mapper.suggest(&scores, 3);
        assert_eq!(emojis, vec!["😊", "😄", "🥰"]);
    }

    #[test]
    fn test_lower_ranked_fill_remaining_slots() {
        let mapper = EmojiMapper::default();
        let scores = [score(Emotion::Happy, 0.7), score(Emotion::Calm, 0.3)];
        let emojis = mapper.suggest(&scores, 5);
        assert_eq!(emojis, vec!["😊", "😄", "🥰", "😌", "😇"]);
    }

    #[test]
    fn test_empty_scores_fall_back() {
        let mapper = EmojiMapper::default();
        assert_eq!(mapper.suggest(&[], 3), DEFAULT_EMOJIS.to_vec());
    }

    #[test]
    fn test_unmapped_scores_fall_back() {
        let mapper = EmojiMapper::with_mapping(HashMap::new());
        let scores = [score(Emotion::Sad, 0.9), score(Emotion::Angry, 0.1)];
        assert_eq!(mapper.suggest(&scores, 8), DEFAULT_EMOJIS.to_vec());
    }

    #[test]
    fn test_duplicates_keep_highest_weight() {
        let mut mapping = HashMap::new();
        mapping.insert(Emotion::Sad, vec!["😢".into(), "😐".into()]);
        mapping.insert(Emotion::Neutral, vec!["😐".into(), "😶".into()]);
        let mapper = EmojiMapper::with_mapping(mapping);

        let scores = [score(Emotion::Neutral, 0.6), score(Emotion::Sad, 0.4)];
        assert_eq!(mapper.suggest(&scores, 10), vec!["😐", "😶", "😢"]);
    }

    #[test]
    fn test_only_first_five_emotions_considered() {
        let mapper = EmojiMapper::default();
        let scores: Vec<EmotionScore> = Emotion::ALL
            .iter()
            .map(|&emotion| score(emotion, 0.125))
            .collect();
        let emojis = mapper.suggest(&scores, 100);
        assert_eq!(emojis.len(), 15);
        // neutral is sixth in label order
        assert!(!emojis.contains(&"😶".to_string()));
    }

    #[test]
    fn test_equal_weights_keep_rank_order() {
        let mapper = EmojiMapper::default();
        let scores = [score(Emotion::Sad, 0.5), score(Emotion::Happy, 0.5)];
        assert_eq!(mapper.suggest(&scores, 4), vec!["😢", "😔", "😞", "😊"]);
    }

    #[test]
    fn test_all_emojis_unique() {
        let all = EmojiMapper::default().all_emojis();
        assert_eq!(all.len(), 24);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_categories_serialize() {
        let json = serde_json::to_value(EmojiMapper::default().categories()).unwrap();
        for key in ["great", "good", "okay", "low", "terrible"] {
            assert!(json[key].as_array().is_some_and(|a| !a.is_empty()));
        }
    }

    proptest! {
        #[test]
        fn prop_suggestions_bounded_and_unique(
            raw in proptest::collection::vec((0usize..8, 0.0f32..1.0), 0..8),
            top_k in 0usize..12,
        ) {
            let mapper = EmojiMapper::default();
            let scores: Vec<EmotionScore> = raw
                .iter()
                .map(|&(i, s)| score(Emotion::ALL[i], s))
                .collect();
            let emojis = mapper.suggest(&scores, top_k);

            if scores.is_empty() {
                prop_assert_eq!(emojis.len(), 3);
            } else {
                prop_assert!(emojis.len() <= top_k);
            }
            let unique: HashSet<_> = emojis.iter().collect();
            prop_assert_eq!(unique.len(), emojis.len());
        }
    }
}
