//! Glue that runs one attempt end to end: apply effects, run the resolver,
//! feed the outcome back, apply effects again.

use std::future::Future;

use tracing::debug;

use crate::controller::{SessionController, Submission};
use crate::error::SessionError;
use crate::i18n::Localizer;
use crate::presenter::{Presenter, ResumeChoice, apply_effects};
use crate::resolver::Resolver;
use crate::session::SessionStatus;
use crate::store::KeyValueStore;

/// Restores saved state and settles any resume prompt.
///
/// Returns a submission when the user chose to resume; the caller then runs
/// it with [`run_attempt`].
pub fn restore<S, L, P>(
    controller: &mut SessionController<S, L>,
    presenter: &mut P,
) -> Result<Option<Submission>, SessionError>
where
    S: KeyValueStore,
    L: Localizer,
    P: Presenter + ?Sized,
{
    let effects = controller.restore();
    match apply_effects(presenter, &effects) {
        Some(ResumeChoice::Resume) => controller.resume().map(Some),
        Some(ResumeChoice::Discard) => {
            let transition = controller.discard()?;
            apply_effects(presenter, &transition.effects);
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Runs the resolver for `submission` until it finishes or `interrupt`
/// resolves, in which case the session is cancelled.
pub async fn run_attempt<S, L, R, P, F>(
    controller: &mut SessionController<S, L>,
    resolver: &R,
    presenter: &mut P,
    submission: Submission,
    interrupt: F,
) -> SessionStatus
where
    S: KeyValueStore,
    L: Localizer,
    R: Resolver + ?Sized,
    P: Presenter + ?Sized,
    F: Future<Output = ()>,
{
    apply_effects(presenter, &submission.effects);
    let ticket = submission.ticket;

    let outcome = tokio::select! {
        outcome = resolver.resolve(&ticket.url, &ticket.cancel) => Some(outcome),
        _ = interrupt => None,
    };

    let transition = match outcome {
        Some(outcome) => controller.on_resolution(ticket.attempt, outcome),
        None => {
            debug!(attempt = ticket.attempt, "interrupted, cancelling");
            match controller.cancel() {
                Ok(transition) => transition,
                Err(_) => return controller.status(),
            }
        }
    };
    apply_effects(presenter, &transition.effects);
    transition.status
}
