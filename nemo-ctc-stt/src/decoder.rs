//! Greedy CTC decoding
//!
//! Per-frame argmax, then collapse: blanks are dropped and a token is only
//! emitted when it differs from the token of the previous frame. Two equal
//! tokens separated by a blank are therefore both emitted.

use crate::error::{Result, SttError};
use crate::vocabulary::{Vocabulary, WORD_BOUNDARY};
use ndarray::ArrayView2;
use tracing::{debug, warn};

/// Collapse state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtcState {
    blank_id: usize,
    previous: usize,
}

impl CtcState {
    pub fn new(blank_id: usize) -> Self {
        Self {
            blank_id,
            previous: blank_id,
        }
    }

    /// Feed one frame's token; returns true when it starts a new emission
    pub fn step(&mut self, token: usize) -> bool {
        let emit = token != self.blank_id && token != self.previous;
        self.previous = token;
        emit
    }

    pub fn previous(&self) -> usize {
        self.previous
    }

    pub fn reset(&mut self) {
        self.previous = self.blank_id;
    }
}

/// Output of a greedy decode
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CtcDecoding {
    /// Emitted token ids, all inside the vocabulary
    pub token_ids: Vec<usize>,
    /// `exp(log-prob)` of the frame that emitted each token
    pub token_confidences: Vec<f32>,
    /// Mean `exp(max log-prob)` over all decoded frames (0.0 without frames)
    pub avg_confidence: f32,
    pub text: String,
    /// Emissions skipped because their id was outside the vocabulary
    pub out_of_range: usize,
    /// Frames with no finite log-prob, decoded as blank
    pub degenerate_frames: usize,
    /// Frames consumed
    pub frames: usize,
}

impl CtcDecoding {
    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }
}

pub struct GreedyCtcDecoder {
    vocabulary: Vocabulary,
}

impl GreedyCtcDecoder {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn blank_id(&self) -> usize {
        self.vocabulary.blank_id()
    }

    /// Decode `(frames, classes)` log-probabilities
    pub fn decode(&self, log_probs: ArrayView2<'_, f32>) -> Result<CtcDecoding> {
        let classes = log_probs.ncols();
        if log_probs.nrows() > 0 && classes <= self.blank_id() {
            return Err(SttError::inference(format!(
                "log-probs have {} classes but blank id is {}",
                classes,
                self.blank_id()
            )));
        }
        if classes != self.vocabulary.output_width() {
            warn!(
                "Engine emits {} classes, vocabulary expects {}",
                classes,
                self.vocabulary.output_width()
            );
        }

        let blank = self.blank_id();
        let mut degenerate = 0;
        let mut best = Vec::with_capacity(log_probs.nrows());
        for row in log_probs.rows() {
            best.push(argmax(row.iter().copied()).unwrap_or_else(|| {
                degenerate += 1;
                (blank, f32::NEG_INFINITY)
            }));
        }

        let mut decoding = self.collapse(best.iter().copied());
        if degenerate > 0 {
            warn!(
                "{} of {} frames had no finite log-prob and were decoded as blank",
                degenerate,
                best.len()
            );
            decoding.degenerate_frames = degenerate;
        }
        if !best.is_empty() {
            decoding.avg_confidence =
                best.iter().map(|&(_, lp)| lp.exp()).sum::<f32>() / best.len() as f32;
        }

        debug!(
            "CTC decode: {} frames -> {} tokens, avg confidence {:.3}",
            decoding.frames,
            decoding.token_ids.len(),
            decoding.avg_confidence
        );
        Ok(decoding)
    }

    /// Decode an already argmax'ed id sequence; confidences are reported as 1.0
    pub fn decode_ids(&self, ids: &[usize]) -> CtcDecoding {
        let mut decoding = self.collapse(ids.iter().map(|&id| (id, 0.0)));
        if !ids.is_empty() {
            decoding.avg_confidence = 1.0;
        }
        decoding
    }

    fn collapse<I>(&self, frames: I) -> CtcDecoding
    where
        I: IntoIterator<Item = (usize, f32)>,
    {
        let mut state = CtcState::new(self.blank_id());
        let mut decoding = CtcDecoding::default();

        for (token, log_prob) in frames {
            decoding.frames += 1;
            if !state.step(token) {
                continue;
            }
            if !self.vocabulary.contains(token) {
                decoding.out_of_range += 1;
                continue;
            }
            decoding.token_ids.push(token);
            decoding.token_confidences.push(log_prob.exp());
        }

        if decoding.out_of_range > 0 {
            warn!(
                "Skipped {} token ids outside the vocabulary (size {})",
                decoding.out_of_range,
                self.vocabulary.len()
            );
        }

        decoding.text = self.render(&decoding.token_ids);
        decoding
    }

    /// Join tokens into text; `▁` starts a new word
    pub fn render(&self, token_ids: &[usize]) -> String {
        let mut text = String::new();
        for &id in token_ids {
            let Some(token) = self.vocabulary.token(id) else {
                continue;
            };
            match token.strip_prefix(WORD_BOUNDARY) {
                Some(word) => {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(word);
                }
                None => text.push_str(token),
            }
        }
        text
    }
}

/// Index and value of the first maximum; `None` when every value is NaN or -inf
fn argmax<I: Iterator<Item = f32>>(values: I) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.enumerate() {
        if v > best.map_or(f32::NEG_INFINITY, |(_, b)| b) {
            best = Some((i, v));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    const BLANK: usize = 8;

    fn decoder() -> GreedyCtcDecoder {
        let tokens = ["<unk>", "\u{2581}the", "re", "\u{2581}cat", "s", "\u{2581}a", "b", "c"];
        let vocab =
            Vocabulary::from_tokens(tokens.iter().map(|s| s.to_string()).collect(), None).unwrap();
        GreedyCtcDecoder::new(vocab)
    }

    /// One-hot-ish log-probs with `winner` at -0.1 and everything else at -5.0
    fn log_probs(frames: &[usize]) -> Array2<f32> {
        let mut lp = Array2::from_elem((frames.len(), BLANK + 1), -5.0f32);
        for (t, &winner) in frames.iter().enumerate() {
            lp[[t, winner]] = -0.1;
        }
        lp
    }

    #[test]
    fn test_state_machine() {
        let mut state = CtcState::new(BLANK);
        assert!(!state.step(BLANK));
        assert!(state.step(5));
        assert!(!state.step(5));
        assert!(!state.step(BLANK));
        assert!(state.step(5));
        assert_eq!(state.previous(), 5);
        state.reset();
        assert_eq!(state.previous(), BLANK);
    }

    #[test]
    fn test_collapse_example() {
        let decoding = decoder().decode_ids(&[BLANK, 5, 5, BLANK, 7, 7, 7, BLANK]);
        assert_eq!(decoding.token_ids, vec![5, 7]);
        assert_eq!(decoding.frames, 8);
        assert_eq!(decoding.out_of_range, 0);
    }

    #[test]
    fn test_repeat_across_blank_is_kept() {
        let decoding = decoder().decode_ids(&[6, 6, BLANK, 6]);
        assert_eq!(decoding.token_ids, vec![6, 6]);
        assert_eq!(decoding.text, "bb");
    }

    #[test]
    fn test_all_blank_is_empty() {
        let decoding = decoder().decode(log_probs(&[BLANK; 20]).view()).unwrap();
        assert!(decoding.is_empty());
        assert_eq!(decoding.text, "");
        assert_relative_eq!(decoding.avg_confidence, (-0.1f32).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_no_frames() {
        let decoding = decoder().decode(Array2::<f32>::zeros((0, BLANK + 1)).view()).unwrap();
        assert!(decoding.is_empty());
        assert_eq!(decoding.avg_confidence, 0.0);
    }

    #[test]
    fn test_out_of_range_is_counted() {
        let decoding = decoder().decode_ids(&[1, 42, 42, BLANK, 99, 4]);
        assert_eq!(decoding.token_ids, vec![1, 4]);
        assert_eq!(decoding.out_of_range, 2);
        assert_eq!(decoding.text, "thes");
    }

    #[test]
    fn test_word_boundary_rendering() {
        let decoding = decoder().decode(log_probs(&[1, 2, BLANK, 3, 4, 4, 5]).view()).unwrap();
        assert_eq!(decoding.text, "there cats a");
        assert_eq!(decoding.token_ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(decoding.token_confidences.len(), 5);
        for &c in &decoding.token_confidences {
            assert_relative_eq!(c, (-0.1f32).exp(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_argmax_takes_first_maximum() {
        assert_eq!(argmax([1.0, 3.0, 3.0, 2.0].into_iter()), Some((1, 3.0)));
        assert_eq!(argmax([f32::NAN, -2.0, f32::NAN].into_iter()), Some((1, -2.0)));
        let lp = Array2::from_elem((1, BLANK + 1), 0.0f32);
        let decoding = decoder().decode(lp.view()).unwrap();
        // ties resolve to id 0 (<unk>)
        assert_eq!(decoding.token_ids, vec![0]);
    }

    #[test]
    fn test_non_finite_rows_decode_as_blank() {
        assert_eq!(argmax([f32::NAN; 4].into_iter()), None);
        assert_eq!(argmax([f32::NEG_INFINITY; 4].into_iter()), None);

        let mut lp = log_probs(&[3, BLANK, BLANK, 3]);
        lp.row_mut(1).fill(f32::NAN);
        lp.row_mut(2).fill(f32::NEG_INFINITY);
        let decoding = decoder().decode(lp.view()).unwrap();

        // no phantom <unk>, and the blank rows still split the repeat
        assert_eq!(decoding.token_ids, vec![3, 3]);
        assert_eq!(decoding.degenerate_frames, 2);
        assert_eq!(decoding.frames, 4);
        assert_relative_eq!(
            decoding.avg_confidence,
            (-0.1f32).exp() / 2.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_too_few_classes_is_an_error() {
        let lp = Array2::from_elem((3, 4), -1.0f32);
        assert!(decoder().decode(lp.view()).is_err());
    }
}
