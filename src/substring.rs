//! Longest substring without repeating characters.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Result of a substring calculation.
///
/// `calculation_time` is wall-clock milliseconds and carries no correctness
/// guarantee beyond being non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstringResult {
    pub longest_substring: String,
    pub length: usize,
    pub all_substrings: Vec<String>,
    pub calculation_time: f64,
}

/// Run the sliding-window scan over already validated text.
///
/// The longest window wins with the leftmost occurrence kept on ties.
/// `all_substrings` lists every repeat-free run in scan order: the window is
/// emitted each time a repeated character forces its left edge forward, and
/// once more for the window still open when the input ends.
///
/// # Examples
/// ```
/// use calculator::substring::compute_longest;
///
/// let result = compute_longest("pwwkew");
/// assert_eq!(result.longest_substring, "wke");
/// assert_eq!(result.all_substrings, vec!["pw", "wke", "kew"]);
/// ```
pub fn compute_longest(text: &str) -> SubstringResult {
    let started = Instant::now();
    let chars: Vec<char> = text.chars().collect();

    let mut last_seen: HashMap<char, usize> = HashMap::new();
    let mut all_substrings = Vec::new();
    let mut left = 0;
    let mut best_start = 0;
    let mut best_len = 0;

    for (right, &c) in chars.iter().enumerate() {
        match last_seen.get(&c) {
            Some(&prev) if prev >= left => {
                all_substrings.push(chars[left..right].iter().collect());
                left = prev + 1;
            }
            _ => {}
        }
        last_seen.insert(c, right);

        let len = right + 1 - left;
        if len > best_len {
            best_len = len;
            best_start = left;
        }
    }

    if !chars.is_empty() {
        all_substrings.push(chars[left..].iter().collect());
    }

    let longest_substring: String = chars[best_start..best_start + best_len].iter().collect();
    let calculation_time = started.elapsed().as_secs_f64() * 1000.0;

    debug!(
        "substring scan over {} chars: longest {} ({} runs) in {:.3}ms",
        chars.len(),
        best_len,
        all_substrings.len(),
        calculation_time
    );

    SubstringResult {
        longest_substring,
        length: best_len,
        all_substrings,
        calculation_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abcabcbb", "abc", 3)]
    #[case("bbbbb", "b", 1)]
    #[case("pwwkew", "wke", 3)]
    #[case("a", "a", 1)]
    #[case("abcdef", "abcdef", 6)]
    #[case("dvdf", "vdf", 3)]
    #[case("abba", "ab", 2)]
    #[case("tmmzuxt", "mzuxt", 5)]
    fn longest(#[case] input: &str, #[case] expected: &str, #[case] length: usize) {
        let result = compute_longest(input);
        assert_eq!(result.longest_substring, expected);
        assert_eq!(result.length, length);
    }

    #[test]
    fn runs_are_emitted_in_scan_order() {
        let result = compute_longest("abcabcbb");
        assert_eq!(
            result.all_substrings,
            vec!["abc", "bca", "cab", "abc", "cb", "b"]
        );
    }

    #[test]
    fn repeated_runs_are_not_deduplicated() {
        let result = compute_longest("bbbbb");
        assert_eq!(result.all_substrings, vec!["b"; 5]);
    }

    #[test]
    fn repeat_free_input_is_its_own_only_run() {
        let result = compute_longest("xyz");
        assert_eq!(result.all_substrings, vec!["xyz"]);
        assert_eq!(compute_longest("q").all_substrings, vec!["q"]);
    }

    #[test]
    fn stale_index_does_not_move_left_backwards() {
        // the second 'a' was seen before the window moved past it
        let result = compute_longest("abba");
        assert_eq!(result.all_substrings, vec!["ab", "ba"]);
    }

    #[test]
    fn whitespace_counts_as_a_character() {
        let result = compute_longest("a b c");
        assert_eq!(result.longest_substring, "a b");
        assert_eq!(result.length, 3);
    }

    #[test]
    fn timing_is_non_negative() {
        assert!(compute_longest("abcabcbb").calculation_time >= 0.0);
    }
}
