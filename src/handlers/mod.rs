mod vote;

pub use vote::SurveySession;

use crate::error::ValidationError;
use crate::models::{Notice, NoticeKind, RankedResult, Tally};
use crate::voting;
use uuid::Uuid;

// Lifecycle of a single ballot submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded,
    FailedRemote,
}

// Which tally the results view should show after a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Aggregate returned by the remote endpoint (directly or via the secondary fetch).
    Remote(Tally),
    /// The local tally, after this ballot was merged into it.
    Local(Tally),
    /// The endpoint accepted the ballot but no live numbers are available.
    Acknowledged,
}

#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub ballot_id: Option<Uuid>,
    pub state: SubmissionState,
    pub resolution: Option<Resolution>,
    pub notice: Notice,
}

impl SubmissionOutcome {
    pub fn rejected(err: &ValidationError) -> Self {
        Self {
            ballot_id: None,
            state: SubmissionState::Idle,
            resolution: None,
            notice: Notice::new(NoticeKind::Error, validation_message(err)),
        }
    }

    /// Rows for the results view, if this outcome has numbers to show.
    pub fn results(&self) -> Option<Vec<RankedResult>> {
        match &self.resolution {
            Some(Resolution::Remote(tally)) | Some(Resolution::Local(tally)) => Some(voting::leaderboard(tally)),
            _ => None,
        }
    }
}

fn validation_message(err: &ValidationError) -> String {
    match err {
        ValidationError::MissingFirstChoice => "Please select your first choice!".to_string(),
        ValidationError::DuplicateChoice { flavor } => {
            format!("Please pick a different flavor for each rank ('{}' was chosen twice).", flavor)
        }
    }
}
