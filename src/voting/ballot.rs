use crate::error::ValidationError;
use crate::models::{Ballot, BallotForm};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

// Trims and collapses internal whitespace; blank input means "nothing selected"
fn clean(value: Option<&str>) -> Option<String> {
    let value = value?;
    let collapsed = WHITESPACE_RUN.replace_all(value.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Turns raw form selections into a ballot.
///
/// The first choice must be present. Any two non-empty choices that are equal
/// after whitespace normalization fail with `DuplicateChoice`.
pub fn validate(form: &BallotForm) -> Result<Ballot, ValidationError> {
    let first_choice = clean(form.first_choice.as_deref()).ok_or(ValidationError::MissingFirstChoice)?;
    let second_choice = clean(form.second_choice.as_deref());
    let third_choice = clean(form.third_choice.as_deref());

    // Pairwise check over the present slots
    let present: Vec<&String> = [Some(&first_choice), second_choice.as_ref(), third_choice.as_ref()]
        .into_iter()
        .flatten()
        .collect();
    for (i, flavor) in present.iter().enumerate() {
        if present[i + 1..].contains(flavor) {
            return Err(ValidationError::DuplicateChoice {
                flavor: flavor.to_string(),
            });
        }
    }

    Ok(Ballot {
        id: Uuid::new_v4(),
        voter_name: clean(form.name.as_deref()),
        first_choice,
        second_choice,
        third_choice,
        suggestion: form
            .suggestion
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        submitted_at: Utc::now(),
    })
}
