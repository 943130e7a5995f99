use std::sync::Arc;

use crate::error::WrapFailure;
use crate::overlay::FontCandidate;

/// Lines in reading order, plus the font they were measured with.
#[derive(Debug, Clone)]
pub struct WrapResult {
    pub font: Arc<FontCandidate>,
    pub lines: Vec<String>,
}

impl WrapResult {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub(crate) fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

fn max_lines(box_height: f32, font: &FontCandidate) -> usize {
    let line_height = font.line_height();
    if line_height <= 0.0 || box_height <= 0.0 {
        return 0;
    }
    (box_height / line_height).floor() as usize
}

fn join_candidate(current: &str, word: &str) -> String {
    if current.is_empty() {
        word.to_string()
    } else {
        format!("{} {}", current, word)
    }
}

/// Greedy left-to-right line fill at one font size.
///
/// Any word that does not fit alone, or any overflow of the height budget,
/// rejects the whole attempt. Text with no words wraps to one blank line.
pub fn wrap_words(
    words: &[&str],
    box_width: f32,
    box_height: f32,
    font: &Arc<FontCandidate>,
) -> Result<WrapResult, WrapFailure> {
    let max_lines = max_lines(box_height, font);
    if max_lines == 0 {
        return Err(WrapFailure::Height);
    }
    if words.is_empty() {
        return Ok(WrapResult {
            font: font.clone(),
            lines: vec![" ".to_string()],
        });
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in words {
        let candidate = join_candidate(&current, word);
        if font.measure(&candidate) <= box_width {
            current = candidate;
            continue;
        }
        if current.is_empty() {
            return Err(WrapFailure::Width);
        }
        if font.measure(word) > box_width {
            return Err(WrapFailure::Width);
        }
        lines.push(std::mem::take(&mut current));
        // The pending word still needs a line of its own.
        if lines.len() >= max_lines {
            return Err(WrapFailure::Height);
        }
        current = word.to_string();
    }

    if !current.is_empty() {
        lines.push(current);
        if lines.len() > max_lines {
            return Err(WrapFailure::Height);
        }
    }

    Ok(WrapResult {
        font: font.clone(),
        lines,
    })
}

/// Best-effort variant of [`wrap_words`]: stops adding lines once the height
/// budget is used up and lets a too-wide word overflow on its own line.
/// The result may be empty when not even one line fits.
pub fn wrap_relaxed(
    words: &[&str],
    box_width: f32,
    box_height: f32,
    font: &Arc<FontCandidate>,
) -> WrapResult {
    let max_lines = max_lines(box_height, font);
    let mut lines: Vec<String> = Vec::new();
    if max_lines == 0 {
        return WrapResult {
            font: font.clone(),
            lines,
        };
    }
    if words.is_empty() {
        lines.push(" ".to_string());
        return WrapResult {
            font: font.clone(),
            lines,
        };
    }

    let mut current = String::new();
    for word in words {
        let candidate = join_candidate(&current, word);
        if font.measure(&candidate) <= box_width || current.is_empty() {
            current = candidate;
            continue;
        }
        if lines.len() >= max_lines {
            current.clear();
            break;
        }
        lines.push(std::mem::take(&mut current));
        current = word.to_string();
    }

    if !current.is_empty() && lines.len() < max_lines {
        lines.push(current);
    }

    WrapResult {
        font: font.clone(),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::MetricsProvider;

    fn provider() -> MetricsProvider {
        MetricsProvider::builtin(1.2)
    }

    #[test]
    fn fills_lines_greedily() {
        let metrics = provider();
        let font = metrics.candidate(10);
        let words = tokenize("one two three four five six");
        // "one two three" = 11 alnum + 2 spaces = 6.55 units = 65.5 px
        let result = wrap_words(&words, 70.0, 100.0, &font).expect("fits");
        assert_eq!(result.lines, vec!["one two three", "four five six"]);
        for line in &result.lines {
            assert!(font.measure(line) <= 70.0);
        }
    }

    #[test]
    fn single_wide_word_is_width_failure() {
        let metrics = provider();
        let font = metrics.candidate(12);
        let words = tokenize("supercalifragilisticexpialidocious");
        let err = wrap_words(&words, 30.0, 50.0, &font).unwrap_err();
        assert_eq!(err, WrapFailure::Width);
    }

    #[test]
    fn wide_word_after_first_line_is_width_failure() {
        let metrics = provider();
        let font = metrics.candidate(10);
        let words = tokenize("ok supercalifragilistic");
        let err = wrap_words(&words, 40.0, 100.0, &font).unwrap_err();
        assert_eq!(err, WrapFailure::Width);
    }

    #[test]
    fn wide_word_on_last_allowed_line_reports_width() {
        let metrics = provider();
        let font = metrics.candidate(10);
        // 12px lines: only one fits into 20px, and the second word is 77px wide
        let words = tokenize("a wwwwwwwwwwwwww");
        let err = wrap_words(&words, 40.0, 20.0, &font).unwrap_err();
        assert_eq!(err, WrapFailure::Width);
    }

    #[test]
    fn too_many_lines_is_height_failure() {
        let metrics = provider();
        let font = metrics.candidate(10);
        let words = tokenize("alpha beta gamma delta");
        // one line of 12px fits into 20px
        let err = wrap_words(&words, 40.0, 20.0, &font).unwrap_err();
        assert_eq!(err, WrapFailure::Height);
    }

    #[test]
    fn box_shorter_than_a_line_is_height_failure() {
        let metrics = provider();
        let font = metrics.candidate(40);
        let err = wrap_words(&tokenize("hi"), 500.0, 30.0, &font).unwrap_err();
        assert_eq!(err, WrapFailure::Height);
    }

    #[test]
    fn line_count_respects_height_budget() {
        let metrics = provider();
        let font = metrics.candidate(10);
        let words = tokenize("a b c d e f g h i j k l m n o p");
        let result = wrap_words(&words, 20.0, 121.0, &font).expect("fits");
        let budget = (121.0 / font.line_height()).floor() as usize;
        assert_eq!(result.lines.len(), 8);
        assert!(result.lines.len() <= budget);
    }

    #[test]
    fn no_words_wraps_to_blank_line() {
        let metrics = provider();
        let font = metrics.candidate(12);
        let result = wrap_words(&tokenize(" "), 100.0, 40.0, &font).expect("fits");
        assert_eq!(result.lines, vec![" "]);
    }

    #[test]
    fn relaxed_truncates_extra_lines() {
        let metrics = provider();
        let font = metrics.candidate(10);
        let words = tokenize("alpha beta gamma delta");
        let result = wrap_relaxed(&words, 40.0, 20.0, &font);
        assert_eq!(result.lines, vec!["alpha"]);
    }

    #[test]
    fn relaxed_keeps_overflowing_word() {
        let metrics = provider();
        let font = metrics.candidate(12);
        let words = tokenize("supercalifragilisticexpialidocious");
        let result = wrap_relaxed(&words, 30.0, 50.0, &font);
        assert_eq!(result.lines, vec!["supercalifragilisticexpialidocious"]);
    }

    #[test]
    fn relaxed_returns_nothing_when_no_line_fits() {
        let metrics = provider();
        let font = metrics.candidate(12);
        let result = wrap_relaxed(&tokenize("hello"), 100.0, 10.0, &font);
        assert!(result.is_empty());
    }
}
