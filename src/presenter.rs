//! Contract between the session controller and whatever renders it.
//!
//! Controller transitions return a list of [`Effect`]s instead of touching a
//! screen. [`apply_effects`] replays them, in order, against a [`Presenter`].

use crate::session::SessionRequest;

/// Everything needed to fetch the resolved stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadAction {
    pub stream_url: String,
    /// Custom title when given, otherwise the video title. No extension.
    pub file_name: String,
    pub format: String,
    pub content_type: String,
}

impl DownloadAction {
    pub fn new(stream_url: &str, file_name: &str, format: &str) -> Self {
        let content_type = mime_guess::from_ext(format)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            stream_url: stream_url.to_string(),
            file_name: file_name.to_string(),
            format: format.to_string(),
            content_type,
        }
    }

    /// `file_name` with the container appended and path separators removed.
    pub fn file_name_with_extension(&self) -> String {
        format!("{}.{}", sanitize_file_name(&self.file_name), self.format)
    }
}

/// Metadata JSON offered next to the video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataAction {
    pub json: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    Resume,
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ShowProgress(String),
    HideProgress,
    ShowError(String),
    /// Flags the URL field as the cause of the last error.
    MarkInputError,
    /// Clears both the error text and the input marker.
    ClearError,
    ShowResult {
        download: DownloadAction,
        metadata: MetadataAction,
    },
    ClearResult,
    /// Toggles between the download and stop controls.
    SetProcessing(bool),
    /// Restores form fields from persisted state.
    Prefill(SessionRequest),
    PromptResume(String),
}

pub trait Presenter {
    fn show_progress(&mut self, text: &str);
    fn hide_progress(&mut self);
    fn show_error(&mut self, text: &str);
    fn mark_input_error(&mut self);
    fn clear_error(&mut self);
    fn show_result(&mut self, download: &DownloadAction, metadata: &MetadataAction);
    fn clear_result(&mut self);
    fn set_processing(&mut self, processing: bool);
    fn prefill(&mut self, request: &SessionRequest);
    fn prompt_resume(&mut self, message: &str) -> ResumeChoice;
}

/// Applies `effects` in order. Returns the user's answer if one of them was a
/// resume prompt.
pub fn apply_effects<P: Presenter + ?Sized>(
    presenter: &mut P,
    effects: &[Effect],
) -> Option<ResumeChoice> {
    let mut choice = None;
    for effect in effects {
        match effect {
            Effect::ShowProgress(text) => presenter.show_progress(text),
            Effect::HideProgress => presenter.hide_progress(),
            Effect::ShowError(text) => presenter.show_error(text),
            Effect::MarkInputError => presenter.mark_input_error(),
            Effect::ClearError => presenter.clear_error(),
            Effect::ShowResult { download, metadata } => presenter.show_result(download, metadata),
            Effect::ClearResult => presenter.clear_result(),
            Effect::SetProcessing(processing) => presenter.set_processing(*processing),
            Effect::Prefill(request) => presenter.prefill(request),
            Effect::PromptResume(message) => choice = Some(presenter.prompt_resume(message)),
        }
    }
    choice
}

pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingPresenter;
    use super::*;

    #[test]
    fn apply_effects_preserves_order_and_returns_choice() {
        let mut presenter = RecordingPresenter {
            answer: Some(ResumeChoice::Resume),
            ..Default::default()
        };
        let effects = vec![
            Effect::Prefill(SessionRequest::new("https://e/v", "720p", "mp4", "")),
            Effect::PromptResume("again?".into()),
            Effect::SetProcessing(false),
        ];
        let choice = apply_effects(&mut presenter, &effects);
        assert_eq!(choice, Some(ResumeChoice::Resume));
        assert_eq!(
            presenter.log,
            vec!["prefill:https://e/v", "prompt:again?", "processing:false"]
        );
    }

    #[test]
    fn error_marker_is_forwarded_after_message() {
        let mut presenter = RecordingPresenter::default();
        apply_effects(
            &mut presenter,
            &[
                Effect::ShowError("bad".into()),
                Effect::MarkInputError,
                Effect::ClearError,
            ],
        );
        assert_eq!(presenter.log, vec!["error:bad", "mark_input_error", "clear_error"]);
    }

    #[test]
    fn apply_effects_without_prompt_returns_none() {
        let mut presenter = RecordingPresenter::default();
        let choice = apply_effects(&mut presenter, &[Effect::HideProgress, Effect::ClearResult]);
        assert_eq!(choice, None);
        assert_eq!(presenter.log, vec!["hide_progress", "clear_result"]);
    }

    #[test]
    fn download_action_guesses_content_type() {
        let action = DownloadAction::new("https://s/1", "Sample", "mp4");
        assert_eq!(action.content_type, "video/mp4");
        assert_eq!(action.file_name_with_extension(), "Sample.mp4");
    }

    #[test]
    fn sanitize_file_name_strips_separators() {
        assert_eq!(sanitize_file_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_file_name(" .. "), "download");
    }
}
