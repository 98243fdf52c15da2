//! Speech emotion classifier: encoder -> pooling -> head -> softmax.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

use super::encoder::{prepare_input, SequenceEncoder};
use super::head::ClassificationHead;
use super::labels::{Emotion, LabelScores};
use super::pooling::PoolingMode;
use super::ClassifierError;
use crate::audio::AudioSignal;

/// Probability assigned to one label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub emotion: Emotion,
    pub score: f32,
}

/// Scores over the full label set, highest probability first
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreList(Vec<EmotionScore>);

impl ScoreList {
    /// Sort `scores` descending; equal scores keep their input order
    pub fn from_unsorted(mut scores: Vec<EmotionScore>) -> Self {
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self(scores)
    }

    /// The highest-probability entry
    pub fn top(&self) -> Option<&EmotionScore> {
        self.0.first()
    }

    /// The leading `k` entries (fewer if the list is shorter)
    pub fn top_k(&self, k: usize) -> &[EmotionScore] {
        &self.0[..k.min(self.0.len())]
    }

    pub fn as_slice(&self) -> &[EmotionScore] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmotionScore> {
        self.0.iter()
    }

    /// Fixed-shape label -> probability record
    pub fn label_scores(&self) -> LabelScores {
        let mut scores = LabelScores::default();
        for entry in &self.0 {
            scores.set(entry.emotion, entry.score);
        }
        scores
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = logits.mapv(|x| (x - max).exp());
    let total = exp.sum();
    exp / total
}

/// Pretrained encoder plus pooling and classification head.
///
/// The head and label set are immutable after construction. The encoder is
/// behind a mutex because the underlying runtime session is not reentrant;
/// everything after encoding runs on per-call buffers outside the lock.
pub struct EmotionClassifier {
    encoder: Mutex<Box<dyn SequenceEncoder>>,
    head: ClassificationHead,
    pooling: PoolingMode,
    labels: Vec<Emotion>,
    sample_rate: u32,
    device: String,
}

impl EmotionClassifier {
    /// Assemble a classifier, checking that the head emits one logit per label
    pub fn new(
        encoder: Box<dyn SequenceEncoder>,
        head: ClassificationHead,
        pooling: PoolingMode,
        labels: Vec<Emotion>,
        sample_rate: u32,
    ) -> Result<Self, ClassifierError> {
        if head.num_labels() != labels.len() {
            return Err(ClassifierError::LabelMismatch(format!(
                "Head emits {} logits but {} labels are configured",
                head.num_labels(),
                labels.len()
            )));
        }
        let device = encoder.device().to_string();
        Ok(Self {
            encoder: Mutex::new(encoder),
            head,
            pooling,
            labels,
            sample_rate,
            device,
        })
    }

    pub fn labels(&self) -> &[Emotion] {
        &self.labels
    }

    pub fn pooling(&self) -> PoolingMode {
        self.pooling
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Score `signal` against every configured label
    pub fn classify(&self, signal: &AudioSignal) -> Result<ScoreList, ClassifierError> {
        if signal.sample_rate() != self.sample_rate {
            return Err(ClassifierError::Inference(format!(
                "Signal is {} Hz, classifier expects {} Hz",
                signal.sample_rate(),
                self.sample_rate
            )));
        }
        if signal.is_empty() {
            return Err(ClassifierError::Inference("Signal is empty".to_string()));
        }

        let start = Instant::now();
        let input = prepare_input(signal.samples());

        let hidden = {
            let mut encoder = self
                .encoder
                .lock()
                .map_err(|_| ClassifierError::Inference("Encoder lock poisoned".to_string()))?;
            encoder.encode(&input)?
        };

        let pooled = self.pooling.pool(hidden.view())?;
        let logits = self.head.forward(pooled.view())?;
        let probs = softmax(&logits);

        if probs.iter().any(|p| !p.is_finite()) {
            return Err(ClassifierError::Inference(
                "Non-finite probability from softmax".to_string(),
            ));
        }

        let scores = ScoreList::from_unsorted(
            self.labels
                .iter()
                .zip(probs.iter())
                .map(|(&emotion, &score)| EmotionScore { emotion, score })
                .collect(),
        );

        if let Some(top) = scores.top() {
            debug!(
                "Classified {} frames in {:?}: {} ({:.0}%)",
                hidden.nrows(),
                start.elapsed(),
                top.emotion,
                top.score * 100.0
            );
        }

        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::head::Linear;
    use ndarray::{array, Array2};
    use proptest::prelude::*;

    /// Encoder emitting frames derived from simple waveform statistics
    struct StatsEncoder;

    impl SequenceEncoder for StatsEncoder {
        fn encode(&mut self, input: &[f32]) -> Result<Array2<f32>, ClassifierError> {
            let frames: Vec<f32> = input
                .chunks(320)
                .flat_map(|c| {
                    let peak = c.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
                    let mean = c.iter().sum::<f32>() / c.len() as f32;
                    [peak, mean]
                })
                .collect();
            let n = frames.len() / 2;
            Array2::from_shape_vec((n, 2), frames).map_err(|e| ClassifierError::Inference(e.to_string()))
        }

        fn device(&self) -> &str {
            "test"
        }
    }

    fn head(rows: usize) -> ClassificationHead {
        let dense = Linear::new(array![[1.0, 0.0], [0.0, 1.0]], array![0.0, 0.0]).unwrap();
        let weight = Array2::from_shape_fn((rows, 2), |(r, c)| (r as f32 - 1.5) * if c == 0 { 1.0 } else { -0.5 });
        let out = Linear::new(weight, Array1::zeros(rows)).unwrap();
        ClassificationHead::new(dense, out).unwrap()
    }

    fn classifier() -> EmotionClassifier {
        EmotionClassifier::new(
            Box::new(StatsEncoder),
            head(8),
            PoolingMode::Mean,
            Emotion::ALL.to_vec(),
            16000,
        )
        .unwrap()
    }

    fn tone() -> AudioSignal {
        let samples = (0..48000).map(|i| (i as f32 * 0.05).sin() * 0.4).collect();
        AudioSignal::new(samples, 16000)
    }

    #[test]
    fn test_scores_cover_labels_and_sum_to_one() {
        let scores = classifier().classify(&tone()).unwrap();
        assert_eq!(scores.len(), 8);

        let mut seen: Vec<Emotion> = scores.iter().map(|s| s.emotion).collect();
        seen.sort_by_key(|e| e.as_str());
        let mut expected = Emotion::ALL.to_vec();
        expected.sort_by_key(|e| e.as_str());
        assert_eq!(seen, expected);

        let total: f32 = scores.iter().map(|s| s.score).sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(&s.score)));
    }

    #[test]
    fn test_sorted_and_top_is_argmax() {
        let scores = classifier().classify(&tone()).unwrap();
        let slice = scores.as_slice();
        assert!(slice.windows(2).all(|w| w[0].score >= w[1].score));

        let argmax = slice
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap();
        assert_eq!(scores.top().unwrap().score, argmax.score);
    }

    #[test]
    fn test_label_mismatch_rejected() {
        let result = EmotionClassifier::new(
            Box::new(StatsEncoder),
            head(3),
            PoolingMode::Mean,
            Emotion::ALL.to_vec(),
            16000,
        );
        assert!(matches!(result, Err(ClassifierError::LabelMismatch(_))));
    }

    #[test]
    fn test_wrong_sample_rate_is_inference_error() {
        let signal = AudioSignal::new(vec![0.1; 44100], 44100);
        assert!(matches!(
            classifier().classify(&signal),
            Err(ClassifierError::Inference(_))
        ));
    }

    #[test]
    fn test_label_scores_record() {
        let scores = classifier().classify(&tone()).unwrap();
        let record = scores.label_scores();
        for entry in scores.iter() {
            assert_eq!(record.get(entry.emotion), Some(entry.score));
        }
    }

    #[test]
    fn test_top_k_clamps() {
        let scores = ScoreList::from_unsorted(vec![
            EmotionScore { emotion: Emotion::Sad, score: 0.2 },
            EmotionScore { emotion: Emotion::Happy, score: 0.8 },
        ]);
        assert_eq!(scores.top_k(5).len(), 2);
        assert_eq!(scores.top_k(1)[0].emotion, Emotion::Happy);
    }

    #[test]
    fn test_concurrent_classification() {
        let classifier = std::sync::Arc::new(classifier());
        let expected = classifier.classify(&tone()).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = classifier.clone();
                std::thread::spawn(move || c.classify(&tone()).unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    proptest! {
        #[test]
        fn prop_softmax_is_distribution(
            logits in proptest::collection::vec(-50.0f32..50.0, 1..16)
        ) {
            let probs = softmax(&Array1::from(logits.clone()));
            let total: f32 = probs.sum();
            prop_assert!((total - 1.0).abs() < 1e-4);
            prop_assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));

            let argmax_logit = logits
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            let top = probs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            prop_assert_eq!(probs[argmax_logit], top);
        }
    }
}
