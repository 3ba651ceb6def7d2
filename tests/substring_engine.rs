use calculator::substring::compute_longest;
use calculator::{CalcError, Limits, ValidationError, calculate_substring};
use proptest::prelude::*;
use std::collections::HashSet;

fn is_repeat_free(s: &str) -> bool {
    let mut seen = HashSet::new();
    s.chars().all(|c| seen.insert(c))
}

fn brute_force_longest(s: &str) -> usize {
    let chars: Vec<char> = s.chars().collect();
    let mut best = 0;
    for start in 0..chars.len() {
        let mut seen = HashSet::new();
        for &c in &chars[start..] {
            if !seen.insert(c) {
                break;
            }
        }
        best = best.max(seen.len());
    }
    best
}

#[test]
fn reference_examples() {
    let limits = Limits::default();
    for (input, longest, length) in [("abcabcbb", "abc", 3), ("bbbbb", "b", 1), ("pwwkew", "wke", 3)] {
        let result = calculate_substring(input, &limits).unwrap();
        assert_eq!(result.longest_substring, longest);
        assert_eq!(result.length, length);
        assert!(result.calculation_time >= 0.0);
    }
}

#[test]
fn rejected_text_never_reaches_the_engine() {
    let limits = Limits::default();
    assert_eq!(
        calculate_substring("   ", &limits),
        Err(CalcError::Validation(ValidationError::EmptyInput))
    );
    assert!(matches!(
        calculate_substring("a@b", &limits),
        Err(CalcError::Validation(ValidationError::InvalidCharacter { character: '@', position: 1 }))
    ));
}

#[test]
fn serializes_with_client_field_names() {
    let value = serde_json::to_value(compute_longest("pwwkew")).unwrap();
    assert_eq!(value["longestSubstring"], "wke");
    assert_eq!(value["length"], 3);
    assert_eq!(value["allSubstrings"], serde_json::json!(["pw", "wke", "kew"]));
    assert!(value["calculationTime"].as_f64().unwrap() >= 0.0);
}

proptest! {
    #[test]
    fn longest_is_a_real_repeat_free_span(input in "[a-f ,.!?-]{1,60}") {
        let result = compute_longest(&input);
        prop_assert_eq!(result.longest_substring.chars().count(), result.length);
        prop_assert!(input.contains(&result.longest_substring));
        prop_assert!(is_repeat_free(&result.longest_substring));
        prop_assert_eq!(result.length, brute_force_longest(&input));
    }

    #[test]
    fn every_run_is_repeat_free_and_present(input in "[a-d]{1,40}") {
        let result = compute_longest(&input);
        prop_assert!(!result.all_substrings.is_empty());
        for run in &result.all_substrings {
            prop_assert!(is_repeat_free(run));
            prop_assert!(input.contains(run.as_str()));
        }
        prop_assert!(result.all_substrings.contains(&result.longest_substring));
    }

    #[test]
    fn leftmost_longest_wins(input in "[a-c]{1,30}") {
        let result = compute_longest(&input);
        let chars: Vec<char> = input.chars().collect();
        let first = (0..=chars.len() - result.length)
            .map(|start| chars[start..start + result.length].iter().collect::<String>())
            .find(|window| is_repeat_free(window))
            .unwrap();
        prop_assert_eq!(result.longest_substring, first);
    }

    #[test]
    fn repeated_calls_agree(input in "[a-z0-9 ]{1,50}") {
        let first = compute_longest(&input);
        let second = compute_longest(&input);
        prop_assert_eq!(first.longest_substring, second.longest_substring);
        prop_assert_eq!(first.all_substrings, second.all_substrings);
        prop_assert_eq!(first.length, second.length);
    }
}
