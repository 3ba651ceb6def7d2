//! Validate-then-compute entry points shared by every transport.

use serde_json::Value;

use crate::error::CalcError;
use crate::substring::{SubstringResult, compute_longest};
use crate::tree::{TreeResult, compute};
use crate::validator::{
    Limits, parse_tree_text, slots_from_json, validate_substring_input, validate_tree_input,
};

/// Validate `input` and find its longest repeat-free substring.
pub fn calculate_substring(input: &str, limits: &Limits) -> Result<SubstringResult, CalcError> {
    let text = validate_substring_input(input, limits)?;
    Ok(compute_longest(&text))
}

/// Validate a JSON node array and run the tree engine on it.
pub fn calculate_tree(nodes: &[Value], limits: &Limits) -> Result<TreeResult, CalcError> {
    let raw = slots_from_json(nodes)?;
    let slots = validate_tree_input(&raw, limits)?;
    Ok(compute(&slots)?)
}

/// Same as [`calculate_tree`] for comma-separated text such as `"1,2,null,3"`.
pub fn calculate_tree_text(text: &str, limits: &Limits) -> Result<TreeResult, CalcError> {
    let raw = parse_tree_text(text)?;
    let slots = validate_tree_input(&raw, limits)?;
    Ok(compute(&slots)?)
}
