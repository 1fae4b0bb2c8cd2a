use crate::models::{Ballot, Rank, Tally};

/// Points awarded for each rank position.
pub fn weight(rank: Rank) -> u64 {
    match rank {
        Rank::First => 3,
        Rank::Second => 2,
        Rank::Third => 1,
    }
}

/// Adds one ballot's weighted contribution to the tally.
///
/// Every call counts as one vote: merging the same ballot twice counts it twice.
/// Callers that need once-per-ballot semantics track `Ballot::id` themselves.
pub fn merge(mut tally: Tally, ballot: &Ballot) -> Tally {
    for (rank, flavor) in ballot.choices() {
        tally.add(flavor, weight(rank));
    }
    tally
}
