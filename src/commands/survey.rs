use crate::commands::VoteArgs;
use crate::handlers::SurveySession;
use crate::models::{BallotForm, Notice, NoticeKind};
use crate::render;
use log::info;

// Submits the ballot and returns what the voter should see
pub async fn handle_vote(session: &mut SurveySession, args: &VoteArgs) -> String {
    let form = BallotForm {
        name: args.name.clone(),
        first_choice: args.first.clone(),
        second_choice: args.second.clone(),
        third_choice: args.third.clone(),
        suggestion: args.suggestion.clone(),
    };

    let outcome = session.submit(&form).await;
    match outcome.ballot_id {
        Some(id) => info!("Ballot {} finished in state {:?}", id, session.state()),
        None => info!("Ballot not submitted"),
    }

    let mut out = render::render_notice(&outcome.notice);
    out.push('\n');

    if let Some(results) = outcome.results() {
        out.push('\n');
        out.push_str(render::THANKS_HEADER);
        out.push('\n');
        out.push_str(&render::render_results(&results));
    }
    out
}

// Current standings from the local tally, without voting
pub fn handle_results(session: &SurveySession) -> String {
    if session.tally().is_empty() {
        let notice = Notice::new(NoticeKind::Info, "No votes yet. Be the first to vote!");
        return format!("{}\n", render::render_notice(&notice));
    }

    let mut out = String::from("Current results:\n\n");
    out.push_str(&render::render_results(&session.current_results()));
    out
}
