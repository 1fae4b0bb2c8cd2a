use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

pub const ANONYMOUS_VOTER: &str = "Anonymous";

// One voter's ranked submission. Only built through `voting::ballot::validate`,
// so the first choice is always present and the three choices never repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub id: Uuid,
    pub voter_name: Option<String>,
    pub first_choice: String,
    pub second_choice: Option<String>,
    pub third_choice: Option<String>,
    pub suggestion: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Ballot {
    /// Choices in rank order, skipping empty slots.
    pub fn choices(&self) -> impl Iterator<Item = (Rank, &str)> {
        [
            (Rank::First, Some(self.first_choice.as_str())),
            (Rank::Second, self.second_choice.as_deref()),
            (Rank::Third, self.third_choice.as_deref()),
        ]
        .into_iter()
        .filter_map(|(rank, flavor)| flavor.map(|f| (rank, f)))
    }

    pub fn display_name(&self) -> &str {
        self.voter_name.as_deref().unwrap_or(ANONYMOUS_VOTER)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    First,
    Second,
    Third,
}

// Raw form input before validation. Empty strings count as "not selected".
#[derive(Debug, Clone, Default)]
pub struct BallotForm {
    pub name: Option<String>,
    pub first_choice: Option<String>,
    pub second_choice: Option<String>,
    pub third_choice: Option<String>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyEntry {
    pub flavor: String,
    pub points: u64,
}

/// Accumulated points per flavor.
///
/// Entries keep the order in which flavors were first seen; ranking relies on
/// that order to break ties. Serialized as a JSON object in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<TallyEntry>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[TallyEntry] {
        &self.entries
    }

    pub fn points(&self, flavor: &str) -> u64 {
        self.entries
            .iter()
            .find(|entry| entry.flavor == flavor)
            .map_or(0, |entry| entry.points)
    }

    // Summed wide so remote aggregates near u64::MAX cannot overflow
    pub fn total(&self) -> u128 {
        self.entries.iter().map(|entry| entry.points as u128).sum()
    }

    /// Adds points to a flavor, creating the entry at zero first if unseen.
    /// Saturates at `u64::MAX`.
    pub fn add(&mut self, flavor: &str, points: u64) {
        match self.entries.iter_mut().find(|entry| entry.flavor == flavor) {
            Some(entry) => entry.points = entry.points.saturating_add(points),
            None => self.entries.push(TallyEntry {
                flavor: flavor.to_string(),
                points,
            }),
        }
    }
}

impl FromIterator<(String, u64)> for Tally {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for (flavor, points) in iter {
            tally.add(&flavor, points);
        }
        tally
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.flavor, &entry.points)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Tally {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TallyVisitor;

        impl<'de> Visitor<'de> for TallyVisitor {
            type Value = Tally;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of flavor names to point totals")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Tally, A::Error> {
                let mut tally = Tally::new();
                while let Some((flavor, points)) = access.next_entry::<String, u64>()? {
                    tally.add(&flavor, points);
                }
                Ok(tally)
            }
        }

        deserializer.deserialize_map(TallyVisitor)
    }
}

// One row of the ranked projection of a tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedResult {
    pub flavor: String,
    pub points: u64,
    pub percentage: u32,
}

// Request body sent to the remote survey endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub ballot_id: String,
    pub name: String,
    pub first_choice: String,
    pub second_choice: String,
    pub third_choice: String,
    pub suggestion: String,
    pub timestamp: String,
}

impl From<&Ballot> for SubmissionRecord {
    fn from(ballot: &Ballot) -> Self {
        Self {
            ballot_id: ballot.id.to_string(),
            name: ballot.display_name().to_string(),
            first_choice: ballot.first_choice.clone(),
            second_choice: ballot.second_choice.clone().unwrap_or_default(),
            third_choice: ballot.third_choice.clone().unwrap_or_default(),
            suggestion: ballot.suggestion.clone().unwrap_or_default(),
            timestamp: ballot.submitted_at.to_rfc3339(),
        }
    }
}

// Response envelope: `{"success": true, "results": [{"flavor": ..., "points": ...}]}`
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Option<Vec<RemoteResult>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteResult {
    pub flavor: String,
    pub points: u64,
}

impl RemoteResponse {
    /// The aggregate tally carried by the response, if any.
    pub fn tally(&self) -> Option<Tally> {
        self.results.as_ref().map(|results| {
            results
                .iter()
                .map(|r| (r.flavor.clone(), r.points))
                .collect()
        })
    }
}

// Transient message shown to the voter after a submission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
