//! User-facing strings.
//!
//! The controller never looks strings up by itself; it is handed a
//! [`Localizer`] and the language code from [`crate::preferences::Preferences`].

/// Language used when a code has no catalog entry.
pub const DEFAULT_LANGUAGE: &str = "ja";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    Placeholder,
    Download,
    Stop,
    Settings,
    Apply,
    CustomTitle,
    Progress,
    Error,
    ModalMessage,
    Resume,
    Discard,
    Analyzing,
    GeneratingLink,
    Done,
    Cancelled,
    LeaveWarning,
}

pub trait Localizer {
    fn text(&self, language: &str, key: MessageKey) -> &str;
}

/// Built-in English, Japanese and Chinese strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Catalog {
    pub const LANGUAGES: [&'static str; 3] = ["en", "ja", "zh"];

    pub fn supports(language: &str) -> bool {
        Self::LANGUAGES.iter().any(|known| *known == language)
    }
}

impl Localizer for Catalog {
    fn text(&self, language: &str, key: MessageKey) -> &str {
        match language {
            "en" => english(key),
            "zh" => chinese(key),
            _ => japanese(key),
        }
    }
}

fn english(key: MessageKey) -> &'static str {
    match key {
        MessageKey::Placeholder => "Enter YouTube URL",
        MessageKey::Download => "Download",
        MessageKey::Stop => "Stop",
        MessageKey::Settings => "Settings",
        MessageKey::Apply => "Apply",
        MessageKey::CustomTitle => "Custom Title (Optional)",
        MessageKey::Progress => "Processing...",
        MessageKey::Error => "Invalid URL. Please check and try again.",
        MessageKey::ModalMessage => "Previous process is incomplete. Resume?",
        MessageKey::Resume => "Resume",
        MessageKey::Discard => "Discard",
        MessageKey::Analyzing => "Analyzing URL...",
        MessageKey::GeneratingLink => "Generating download URL...",
        MessageKey::Done => "Done!",
        MessageKey::Cancelled => "Cancelled.",
        MessageKey::LeaveWarning => "Processing. Leaving now will interrupt the download.",
    }
}

fn japanese(key: MessageKey) -> &'static str {
    match key {
        MessageKey::Placeholder => "YouTubeのURLを入力",
        MessageKey::Download => "ダウンロード",
        MessageKey::Stop => "ストップ",
        MessageKey::Settings => "詳細設定",
        MessageKey::Apply => "適用",
        MessageKey::CustomTitle => "カスタムタイトル（任意）",
        MessageKey::Progress => "処理中...",
        MessageKey::Error => "無効なURLです。確認して再試行してください。",
        MessageKey::ModalMessage => "前回の処理が未完了です。続行しますか？",
        MessageKey::Resume => "続行",
        MessageKey::Discard => "破棄",
        MessageKey::Analyzing => "URLを解析中...",
        MessageKey::GeneratingLink => "ダウンロードURLを生成中...",
        MessageKey::Done => "処理完了！",
        MessageKey::Cancelled => "処理をキャンセルしました",
        MessageKey::LeaveWarning => "処理中です。ページを離れると中断されます。",
    }
}

fn chinese(key: MessageKey) -> &'static str {
    match key {
        MessageKey::Placeholder => "输入YouTube链接",
        MessageKey::Download => "下载",
        MessageKey::Stop => "停止",
        MessageKey::Settings => "详细设置",
        MessageKey::Apply => "应用",
        MessageKey::CustomTitle => "自定义标题（可选）",
        MessageKey::Progress => "处理中...",
        MessageKey::Error => "无效的URL，请检查后重试。",
        MessageKey::ModalMessage => "上一次处理未完成。继续吗？",
        MessageKey::Resume => "继续",
        MessageKey::Discard => "放弃",
        MessageKey::Analyzing => "正在解析URL...",
        MessageKey::GeneratingLink => "正在生成下载链接...",
        MessageKey::Done => "处理完成！",
        MessageKey::Cancelled => "已取消处理",
        MessageKey::LeaveWarning => "正在处理。离开将中断下载。",
    }
}
