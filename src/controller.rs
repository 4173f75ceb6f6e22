//! Download session lifecycle.
//!
//! `Idle -> InFlight -> {Completed | Cancelled | Failed}`, plus a
//! `PendingResume` state entered on startup when the previous process died
//! mid-resolution. Every status change is written to the store before the
//! method returns. Methods hand back [`Effect`]s for the presenter rather than
//! rendering anything themselves.
//!
//! Resolution itself runs outside the controller: `submit` returns a
//! [`ResolveTicket`] carrying a clone of the controller-owned cancellation
//! token, and the caller reports the outcome through
//! [`SessionController::on_resolution_success`] or
//! [`SessionController::on_resolution_failure`]. Outcomes for an attempt that
//! is no longer in flight are dropped, so a cancelled session stays cancelled.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ResolveError, SessionError};
use crate::i18n::{Localizer, MessageKey};
use crate::presenter::{DownloadAction, Effect, MetadataAction};
use crate::resolver::{MediaInfo, select_stream};
use crate::session::{
    DOWNLOAD_STATE_KEY, LAST_MEDIA_KEY, MediaMetadata, PersistedSession, ResolvedMedia, Session,
    SessionRequest, SessionStatus,
};
use crate::store::KeyValueStore;

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    PendingResume,
    InFlight,
    Completed,
    Cancelled,
    Failed,
}

/// Handle given to whoever runs the resolver for one attempt.
#[derive(Debug, Clone)]
pub struct ResolveTicket {
    pub attempt: u64,
    pub url: String,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct Submission {
    pub ticket: ResolveTicket,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: SessionStatus,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(status: SessionStatus) -> Self {
        Self {
            status,
            effects: Vec::new(),
        }
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    PendingResume(SessionRequest),
    Active(Session),
}

pub struct SessionController<S, L> {
    store: S,
    localizer: L,
    language: String,
    phase: Phase,
    next_attempt: u64,
    cancel: Option<CancellationToken>,
}

impl<S: KeyValueStore, L: Localizer> SessionController<S, L> {
    pub fn new(store: S, localizer: L, language: impl Into<String>) -> Self {
        Self {
            store,
            localizer,
            language: language.into(),
            phase: Phase::Idle,
            next_attempt: 1,
            cancel: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
    }

    pub fn state(&self) -> ControllerState {
        match &self.phase {
            Phase::Idle => ControllerState::Idle,
            Phase::PendingResume(_) => ControllerState::PendingResume,
            Phase::Active(session) => match session.status {
                SessionStatus::Idle => ControllerState::Idle,
                SessionStatus::InFlight => ControllerState::InFlight,
                SessionStatus::Completed => ControllerState::Completed,
                SessionStatus::Cancelled => ControllerState::Cancelled,
                SessionStatus::Failed => ControllerState::Failed,
            },
        }
    }

    /// Status of the current session; `Idle` when there is none.
    pub fn status(&self) -> SessionStatus {
        match &self.phase {
            Phase::Active(session) => session.status,
            _ => SessionStatus::Idle,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.phase {
            Phase::Active(session) => Some(session),
            _ => None,
        }
    }

    pub fn pending_request(&self) -> Option<&SessionRequest> {
        match &self.phase {
            Phase::PendingResume(request) => Some(request),
            _ => None,
        }
    }

    /// Reads back `downloadState` on startup.
    ///
    /// Saved form values are always offered for prefill; an interrupted
    /// in-flight session additionally moves to `PendingResume` and asks the
    /// user what to do.
    pub fn restore(&mut self) -> Vec<Effect> {
        let Some(saved) = self.persisted_state() else {
            return Vec::new();
        };

        let request = saved.request();
        let mut effects = vec![Effect::Prefill(request.clone())];
        if saved.is_processing {
            info!(url = %request.url, "found interrupted download");
            effects.push(Effect::PromptResume(
                self.text(MessageKey::ModalMessage).to_string(),
            ));
            self.phase = Phase::PendingResume(request);
        }
        effects
    }

    /// `downloadState` as currently stored. Unreadable records are dropped.
    pub fn persisted_state(&self) -> Option<PersistedSession> {
        let raw = match self.store.get(DOWNLOAD_STATE_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "reading saved download state failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(saved) => Some(saved),
            Err(err) => {
                warn!(error = %err, "discarding unreadable download state");
                self.remove_key(DOWNLOAD_STATE_KEY);
                None
            }
        }
    }

    /// Metadata of the most recent completed download, if any.
    pub fn last_media(&self) -> Option<MediaMetadata> {
        let raw = self.store.get(LAST_MEDIA_KEY).ok()??;
        serde_json::from_str(&raw).ok()
    }

    pub fn submit(&mut self, request: SessionRequest) -> Result<Submission, SessionError> {
        if self.status() == SessionStatus::InFlight {
            return Err(SessionError::AlreadyInProgress);
        }
        request.validate()?;

        if let Phase::PendingResume(previous) = &self.phase {
            debug!(url = %previous.url, "new submission supersedes interrupted download");
        }

        let attempt = self.next_attempt;
        self.next_attempt += 1;
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let session = Session {
            attempt,
            request,
            status: SessionStatus::InFlight,
            result: None,
        };
        self.persist(&session);
        debug!(attempt, url = %session.request.url, "session in flight");

        let ticket = ResolveTicket {
            attempt,
            url: session.request.url.trim().to_string(),
            cancel,
        };
        self.phase = Phase::Active(session);

        Ok(Submission {
            ticket,
            effects: vec![
                Effect::ClearError,
                Effect::ClearResult,
                Effect::SetProcessing(true),
                Effect::ShowProgress(self.text(MessageKey::Analyzing).to_string()),
            ],
        })
    }

    pub fn cancel(&mut self) -> Result<Transition, SessionError> {
        if self.status() != SessionStatus::InFlight {
            return Err(SessionError::NotInFlight);
        }
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        Ok(self.finish_cancelled())
    }

    /// Feeds a successful resolution back in. Selection failures turn the
    /// session `Failed`.
    pub fn on_resolution_success(&mut self, attempt: u64, info: MediaInfo) -> Transition {
        if !self.accepts(attempt) {
            debug!(attempt, "ignoring resolution for stale attempt");
            return Transition::unchanged(self.status());
        }

        let mut effects = vec![Effect::ShowProgress(
            self.text(MessageKey::GeneratingLink).to_string(),
        )];

        let Phase::Active(session) = &self.phase else {
            return Transition::unchanged(self.status());
        };
        let request = session.request.clone();

        let stream = match select_stream(&info.formats, &request.resolution, &request.format) {
            Ok(stream) => stream,
            Err(err) => {
                let mut transition = self.finish_failed(err);
                effects.append(&mut transition.effects);
                transition.effects = effects;
                return transition;
            }
        };

        let media = ResolvedMedia {
            title: info.title.clone(),
            url: request.url.clone(),
            resolution: request.resolution.clone(),
            format: request.format.clone(),
            timestamp: Utc::now(),
            stream_url: stream.stream_url.clone(),
        };
        let metadata = media.metadata();
        let file_name = request.custom_title().unwrap_or(media.title.as_str()).to_string();
        let download = DownloadAction::new(&media.stream_url, &file_name, &request.format);
        let metadata_json = match serde_json::to_string_pretty(&metadata) {
            Ok(json) => json,
            Err(err) => {
                let mut transition = self.finish_failed(ResolveError::Parse(format!(
                    "serializing media metadata: {err}"
                )));
                effects.append(&mut transition.effects);
                transition.effects = effects;
                return transition;
            }
        };
        let metadata_action = MetadataAction {
            json: metadata_json,
            file_name: format!("{file_name}.json"),
        };

        self.cancel = None;
        if let Phase::Active(session) = &mut self.phase {
            session.status = SessionStatus::Completed;
            session.result = Some(media);
        }
        self.persist_current();
        self.write_key(LAST_MEDIA_KEY, &metadata_action.json);
        info!(attempt, title = %metadata.title, "download link ready");

        effects.extend([
            Effect::ShowProgress(self.text(MessageKey::Done).to_string()),
            Effect::ShowResult {
                download,
                metadata: metadata_action,
            },
            Effect::SetProcessing(false),
        ]);
        Transition {
            status: SessionStatus::Completed,
            effects,
        }
    }

    /// Feeds a resolver failure back in. A cancellation error ends the
    /// session as `Cancelled`, anything else as `Failed`.
    pub fn on_resolution_failure(&mut self, attempt: u64, error: ResolveError) -> Transition {
        if !self.accepts(attempt) {
            debug!(attempt, %error, "ignoring failure for stale attempt");
            return Transition::unchanged(self.status());
        }
        self.cancel = None;
        if error.is_cancelled() {
            return self.finish_cancelled();
        }
        self.finish_failed(error)
    }

    pub fn on_resolution(
        &mut self,
        attempt: u64,
        outcome: Result<MediaInfo, ResolveError>,
    ) -> Transition {
        match outcome {
            Ok(info) => self.on_resolution_success(attempt, info),
            Err(error) => self.on_resolution_failure(attempt, error),
        }
    }

    /// Re-submits the interrupted session with its saved parameters.
    pub fn resume(&mut self) -> Result<Submission, SessionError> {
        let Phase::PendingResume(request) = &self.phase else {
            return Err(SessionError::NoPendingResume);
        };
        let request = request.clone();
        self.phase = Phase::Idle;
        self.submit(request).inspect_err(|err| {
            warn!(error = %err, "saved download cannot be resumed, clearing it");
            self.remove_key(DOWNLOAD_STATE_KEY);
        })
    }

    pub fn discard(&mut self) -> Result<Transition, SessionError> {
        if !matches!(self.phase, Phase::PendingResume(_)) {
            return Err(SessionError::NoPendingResume);
        }
        self.phase = Phase::Idle;
        self.remove_key(DOWNLOAD_STATE_KEY);
        debug!("interrupted download discarded");
        Ok(Transition {
            status: SessionStatus::Idle,
            effects: vec![
                Effect::HideProgress,
                Effect::ClearResult,
                Effect::ClearError,
                Effect::SetProcessing(false),
            ],
        })
    }

    /// Drops a finished session and its saved state.
    pub fn acknowledge(&mut self) -> Result<Transition, SessionError> {
        match &self.phase {
            Phase::Idle => return Ok(Transition::unchanged(SessionStatus::Idle)),
            Phase::PendingResume(_) => return Err(SessionError::NotTerminal),
            Phase::Active(session) if !session.status.is_terminal() => {
                return Err(SessionError::NotTerminal);
            }
            Phase::Active(_) => {}
        }
        self.phase = Phase::Idle;
        self.remove_key(DOWNLOAD_STATE_KEY);
        Ok(Transition {
            status: SessionStatus::Idle,
            effects: vec![Effect::HideProgress, Effect::ClearResult, Effect::ClearError],
        })
    }

    /// Text to show when the user tries to quit mid-resolution.
    pub fn leave_warning(&self) -> Option<&str> {
        (self.status() == SessionStatus::InFlight).then(|| self.text(MessageKey::LeaveWarning))
    }

    fn accepts(&self, attempt: u64) -> bool {
        matches!(
            &self.phase,
            Phase::Active(session)
                if session.attempt == attempt && session.status == SessionStatus::InFlight
        )
    }

    fn finish_cancelled(&mut self) -> Transition {
        if let Phase::Active(session) = &mut self.phase {
            session.status = SessionStatus::Cancelled;
            session.result = None;
            info!(attempt = session.attempt, "download cancelled");
        }
        self.persist_current();
        Transition {
            status: SessionStatus::Cancelled,
            effects: vec![
                Effect::HideProgress,
                Effect::ClearResult,
                Effect::ClearError,
                Effect::SetProcessing(false),
            ],
        }
    }

    fn finish_failed(&mut self, error: ResolveError) -> Transition {
        self.cancel = None;
        if let Phase::Active(session) = &mut self.phase {
            session.status = SessionStatus::Failed;
            session.result = None;
            warn!(attempt = session.attempt, %error, "resolution failed");
        }
        self.persist_current();
        let message = format!("{} ({error})", self.text(MessageKey::Error));
        Transition {
            status: SessionStatus::Failed,
            effects: vec![
                Effect::ClearResult,
                Effect::ShowError(message),
                Effect::MarkInputError,
                Effect::SetProcessing(false),
            ],
        }
    }

    fn text(&self, key: MessageKey) -> &str {
        self.localizer.text(&self.language, key)
    }

    fn persist_current(&self) {
        if let Phase::Active(session) = &self.phase {
            self.persist(session);
        }
    }

    fn persist(&self, session: &Session) {
        match serde_json::to_string(&session.persisted()) {
            Ok(json) => self.write_key(DOWNLOAD_STATE_KEY, &json),
            Err(err) => warn!(error = %err, "serializing download state failed"),
        }
    }

    fn write_key(&self, key: &str, value: &str) {
        if let Err(err) = self.store.set(key, value) {
            warn!(key, error = %err, "persisting state failed");
        }
    }

    fn remove_key(&self, key: &str) {
        if let Err(err) = self.store.remove(key) {
            warn!(key, error = %err, "clearing state failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Catalog;
    use crate::resolver::StreamFormat;
    use crate::store::MemoryStore;

    type Controller<'a> = SessionController<&'a MemoryStore, Catalog>;

    fn controller(store: &MemoryStore) -> Controller<'_> {
        SessionController::new(store, Catalog, "en")
    }

    fn request(url: &str) -> SessionRequest {
        SessionRequest::new(url, "720p", "mp4", "")
    }

    fn saved(store: &MemoryStore) -> Option<PersistedSession> {
        store
            .get(DOWNLOAD_STATE_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    fn sample_info() -> MediaInfo {
        MediaInfo {
            title: "Sample".into(),
            formats: vec![StreamFormat::new("720p", "mp4", "https://stream/1")],
        }
    }

    #[test]
    fn empty_url_is_rejected_without_side_effects() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let err = ctl.submit(request("")).unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(ctl.status(), SessionStatus::Idle);
        assert!(store.is_empty());
    }

    #[test]
    fn submit_persists_in_flight_state() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let submission = ctl.submit(request("https://example.com/v1")).unwrap();

        assert_eq!(ctl.state(), ControllerState::InFlight);
        assert_eq!(submission.ticket.url, "https://example.com/v1");
        assert!(!submission.ticket.cancel.is_cancelled());
        assert!(submission.effects.contains(&Effect::SetProcessing(true)));
        assert!(saved(&store).unwrap().is_processing);
    }

    #[test]
    fn second_submit_while_in_flight_is_rejected() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let first = ctl.submit(request("https://example.com/v1")).unwrap();
        let before = saved(&store);

        let err = ctl.submit(request("https://example.com/other")).unwrap_err();
        assert_eq!(err, SessionError::AlreadyInProgress);
        assert_eq!(saved(&store), before);
        let session = ctl.session().unwrap();
        assert_eq!(session.attempt, first.ticket.attempt);
        assert_eq!(session.request.url, "https://example.com/v1");
    }

    #[test]
    fn scenario_completes_with_title_as_file_name() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let submission = ctl
            .submit(SessionRequest::new("https://example.com/v1", "720p", "mp4", ""))
            .unwrap();

        let transition = ctl.on_resolution_success(submission.ticket.attempt, sample_info());
        assert_eq!(transition.status, SessionStatus::Completed);
        assert_eq!(ctl.state(), ControllerState::Completed);

        let (download, metadata) = transition
            .effects
            .iter()
            .find_map(|effect| match effect {
                Effect::ShowResult { download, metadata } => Some((download, metadata)),
                _ => None,
            })
            .expect("result exposed");
        assert_eq!(download.file_name, "Sample");
        assert_eq!(download.stream_url, "https://stream/1");
        assert_eq!(metadata.file_name, "Sample.json");
        assert_eq!(ctl.session().unwrap().result.as_ref().unwrap().title, "Sample");

        let persisted = store.get(DOWNLOAD_STATE_KEY).unwrap().unwrap();
        assert!(!persisted.contains("stream/1"));
        assert!(!saved(&store).unwrap().is_processing);
        assert_eq!(ctl.last_media().unwrap().title, "Sample");
        assert_eq!(
            store.get(LAST_MEDIA_KEY).unwrap().as_deref(),
            Some(metadata.json.as_str())
        );
        let exported: MediaMetadata = serde_json::from_str(&metadata.json).unwrap();
        assert_eq!(exported.url, "https://example.com/v1");
    }

    #[test]
    fn custom_title_overrides_file_name() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let submission = ctl
            .submit(SessionRequest::new("https://example.com/v1", "720p", "mp4", "Mine"))
            .unwrap();
        let transition = ctl.on_resolution_success(submission.ticket.attempt, sample_info());
        assert!(transition.effects.iter().any(|effect| matches!(
            effect,
            Effect::ShowResult { download, .. } if download.file_name == "Mine"
        )));
    }

    #[test]
    fn missing_format_fails_the_session() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let submission = ctl
            .submit(SessionRequest::new("https://example.com/v1", "720p", "webm", ""))
            .unwrap();
        let transition = ctl.on_resolution_success(submission.ticket.attempt, sample_info());
        assert_eq!(transition.status, SessionStatus::Failed);
        assert!(
            transition
                .effects
                .iter()
                .any(|effect| matches!(effect, Effect::ShowError(_)))
        );
        assert!(!saved(&store).unwrap().is_processing);
    }

    #[test]
    fn resolver_failure_marks_failed() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let submission = ctl.submit(request("https://example.com/v1")).unwrap();
        let transition = ctl.on_resolution_failure(
            submission.ticket.attempt,
            ResolveError::Program("unreachable".into()),
        );
        assert_eq!(transition.status, SessionStatus::Failed);
        assert_eq!(ctl.state(), ControllerState::Failed);
        assert_eq!(
            transition.effects[1..],
            [
                Effect::ShowError(
                    "Invalid URL. Please check and try again. \
                     (resolver exited with an error: unreachable)"
                        .into()
                ),
                Effect::MarkInputError,
                Effect::SetProcessing(false),
            ]
        );
    }

    #[test]
    fn cancel_wins_over_late_failure() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let submission = ctl.submit(request("https://example.com/v1")).unwrap();

        let transition = ctl.cancel().unwrap();
        assert_eq!(transition.status, SessionStatus::Cancelled);
        assert!(submission.ticket.cancel.is_cancelled());

        let late = ctl.on_resolution_failure(
            submission.ticket.attempt,
            ResolveError::Program("network down".into()),
        );
        assert_eq!(late.status, SessionStatus::Cancelled);
        assert!(late.effects.is_empty());
        assert_eq!(ctl.state(), ControllerState::Cancelled);
        assert!(!saved(&store).unwrap().is_processing);
    }

    #[test]
    fn cancellation_error_is_not_a_failure() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let submission = ctl.submit(request("https://example.com/v1")).unwrap();
        let transition =
            ctl.on_resolution_failure(submission.ticket.attempt, ResolveError::Cancelled);
        assert_eq!(transition.status, SessionStatus::Cancelled);
        assert!(
            !transition
                .effects
                .iter()
                .any(|effect| matches!(effect, Effect::ShowError(_)))
        );
    }

    #[test]
    fn cancel_requires_in_flight_session() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        assert_eq!(ctl.cancel().unwrap_err(), SessionError::NotInFlight);
    }

    #[test]
    fn new_attempt_after_terminal_state_ignores_old_results() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let first = ctl.submit(request("https://example.com/v1")).unwrap();
        ctl.cancel().unwrap();
        let second = ctl.submit(request("https://example.com/v2")).unwrap();
        assert_ne!(first.ticket.attempt, second.ticket.attempt);

        let stale = ctl.on_resolution_success(first.ticket.attempt, sample_info());
        assert_eq!(stale.status, SessionStatus::InFlight);
        assert_eq!(ctl.state(), ControllerState::InFlight);
    }

    #[test]
    fn interrupted_session_prompts_and_resume_resubmits() {
        let store = MemoryStore::new();
        let original = SessionRequest::new("https://example.com/v1", "480p", "webm", "Title");
        {
            let mut ctl = controller(&store);
            ctl.submit(original.clone()).unwrap();
            // process dies here
        }

        let mut ctl = controller(&store);
        let effects = ctl.restore();
        assert_eq!(ctl.state(), ControllerState::PendingResume);
        assert_eq!(effects[0], Effect::Prefill(original.clone()));
        assert!(matches!(&effects[1], Effect::PromptResume(text) if text == "Previous process is incomplete. Resume?"));

        let submission = ctl.resume().unwrap();
        assert_eq!(ctl.state(), ControllerState::InFlight);
        assert_eq!(ctl.session().unwrap().request, original);
        assert_eq!(submission.ticket.url, "https://example.com/v1");
    }

    #[test]
    fn discard_clears_saved_state() {
        let store = MemoryStore::new();
        controller(&store)
            .submit(request("https://example.com/v1"))
            .unwrap();

        let mut ctl = controller(&store);
        ctl.restore();
        let transition = ctl.discard().unwrap();
        assert_eq!(transition.status, SessionStatus::Idle);
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(store.get(DOWNLOAD_STATE_KEY).unwrap(), None);
        assert_eq!(ctl.discard().unwrap_err(), SessionError::NoPendingResume);
    }

    #[test]
    fn restore_of_finished_session_only_prefills() {
        let store = MemoryStore::new();
        let mut first = controller(&store);
        let submission = first.submit(request("https://example.com/v1")).unwrap();
        first.on_resolution_success(submission.ticket.attempt, sample_info());

        let mut ctl = controller(&store);
        let effects = ctl.restore();
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::Prefill(_)));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(ctl.resume().unwrap_err(), SessionError::NoPendingResume);
    }

    #[test]
    fn persisted_fields_round_trip_exactly() {
        let store = MemoryStore::new();
        let original =
            SessionRequest::new("https://example.com/v1?x=1&y= 2", "1080p", "mp4", "  spaced ☃ ");
        controller(&store).submit(original.clone()).unwrap();

        let restored = controller(&store).persisted_state().unwrap().request();
        assert_eq!(restored, original);
    }

    #[test]
    fn corrupt_saved_state_is_dropped() {
        let store = MemoryStore::new();
        store.set(DOWNLOAD_STATE_KEY, "{not json").unwrap();
        let mut ctl = controller(&store);
        assert!(ctl.restore().is_empty());
        assert_eq!(store.get(DOWNLOAD_STATE_KEY).unwrap(), None);
    }

    #[test]
    fn resume_with_invalid_saved_url_clears_state() {
        let store = MemoryStore::new();
        let bad = PersistedSession {
            url: String::new(),
            resolution: "720p".into(),
            format: "mp4".into(),
            custom_title: String::new(),
            is_processing: true,
        };
        store
            .set(DOWNLOAD_STATE_KEY, &serde_json::to_string(&bad).unwrap())
            .unwrap();
        let mut ctl = controller(&store);
        ctl.restore();
        assert!(matches!(ctl.resume(), Err(SessionError::Validation(_))));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(store.get(DOWNLOAD_STATE_KEY).unwrap(), None);
    }

    #[test]
    fn acknowledge_clears_terminal_session() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let submission = ctl.submit(request("https://example.com/v1")).unwrap();
        assert_eq!(ctl.acknowledge().unwrap_err(), SessionError::NotTerminal);

        ctl.on_resolution_success(submission.ticket.attempt, sample_info());
        ctl.acknowledge().unwrap();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(store.get(DOWNLOAD_STATE_KEY).unwrap(), None);
        assert!(ctl.last_media().is_some());
    }

    #[test]
    fn acknowledge_clears_failed_and_cancelled_sessions() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);

        let submission = ctl.submit(request("https://example.com/v1")).unwrap();
        ctl.on_resolution_failure(
            submission.ticket.attempt,
            ResolveError::Program("boom".into()),
        );
        assert_eq!(ctl.state(), ControllerState::Failed);
        ctl.acknowledge().unwrap();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(store.get(DOWNLOAD_STATE_KEY).unwrap(), None);

        ctl.submit(request("https://example.com/v2")).unwrap();
        ctl.cancel().unwrap();
        assert_eq!(ctl.state(), ControllerState::Cancelled);
        ctl.acknowledge().unwrap();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(store.get(DOWNLOAD_STATE_KEY).unwrap(), None);
    }

    #[test]
    fn submit_while_pending_resume_replaces_interrupted_session() {
        let store = MemoryStore::new();
        controller(&store)
            .submit(request("https://example.com/old"))
            .unwrap();

        let mut ctl = controller(&store);
        ctl.restore();
        assert_eq!(ctl.state(), ControllerState::PendingResume);

        let submission = ctl.submit(request("https://example.com/new")).unwrap();
        assert_eq!(ctl.state(), ControllerState::InFlight);
        assert_eq!(submission.ticket.url, "https://example.com/new");
        let persisted = saved(&store).unwrap();
        assert_eq!(persisted.url, "https://example.com/new");
        assert!(persisted.is_processing);
        assert_eq!(ctl.pending_request(), None);
        assert_eq!(ctl.resume().unwrap_err(), SessionError::NoPendingResume);
    }

    #[test]
    fn leave_warning_only_while_in_flight() {
        let store = MemoryStore::new();
        let mut ctl = SessionController::new(&store, Catalog, "ja");
        assert_eq!(ctl.leave_warning(), None);
        ctl.submit(request("https://example.com/v1")).unwrap();
        assert_eq!(
            ctl.leave_warning(),
            Some("処理中です。ページを離れると中断されます。")
        );
    }
}
