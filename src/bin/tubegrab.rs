#![forbid(unsafe_code)]

//! Terminal front-end: paste a URL, pick resolution and format, get a direct
//! link (and optionally the file).
//!
//! Every invocation first restores the saved session. If the previous run died
//! while resolving, the user is asked whether to resume it before anything
//! else happens.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tokio::{signal, task};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tubegrab::{
    config::{DEFAULT_CONFIG_PATH, RuntimeConfig, load_runtime_config_from},
    controller::{ControllerState, SessionController, Submission},
    driver,
    i18n::{Catalog, Localizer, MessageKey},
    preferences::{LANGUAGE_KEY, Preferences},
    presenter::{
        DownloadAction, MetadataAction, Presenter, ResumeChoice, apply_effects, sanitize_file_name,
    },
    resolver::YtDlpResolver,
    session::{SessionRequest, SessionStatus},
    store::{KeyValueStore, MemoryStore, SqliteStore},
};

type Controller = SessionController<Box<dyn KeyValueStore>, Catalog>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Resolve videos into direct download links.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[arg(
        long = "state-db",
        value_name = "PATH",
        help = "Override where session state and preferences are stored"
    )]
    state_db: Option<PathBuf>,
    #[arg(
        long = "ephemeral",
        help = "Keep state in memory only; nothing survives the process"
    )]
    ephemeral: bool,
    #[arg(
        long = "on-interrupted",
        value_name = "CHOICE",
        value_parser = ["resume", "discard"],
        help = "Answer the resume prompt without asking"
    )]
    on_interrupted: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a video URL into a download link.
    Download {
        url: String,
        #[arg(short = 'r', long = "resolution", help = "Preferred resolution, e.g. 720p")]
        resolution: Option<String>,
        #[arg(short = 'f', long = "format", help = "Container format, e.g. mp4")]
        format: Option<String>,
        #[arg(short = 't', long = "title", help = "File name to use instead of the video title")]
        title: Option<String>,
        #[arg(long = "save-dir", value_name = "PATH", help = "Also fetch the stream into PATH")]
        save_dir: Option<PathBuf>,
    },
    /// Show the saved session and the last completed download.
    Status,
    /// Resume an interrupted download.
    Resume {
        #[arg(long = "save-dir", value_name = "PATH")]
        save_dir: Option<PathBuf>,
    },
    /// Forget an interrupted download.
    Discard,
    /// Inspect or change saved preferences.
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsAction {
    Show,
    /// Two or three letter language code (en, ja, zh).
    Language { code: String },
    /// Resolver program to use instead of the configured one; empty clears.
    Resolver { program: String },
    /// Default resolution and format for `download`.
    Defaults { resolution: String, format: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_runtime_config_from(&cli.config)?;
    let store = open_store(&cli, &config)?;
    let prefs = load_preferences(store.as_ref(), &config)?;

    let resolver_program = prefs
        .resolver_program
        .clone()
        .unwrap_or_else(|| config.resolver_program.clone());
    let mut resolver = YtDlpResolver::new(resolver_program);
    if let Some(fallback) = &config.fallback_resolver {
        resolver = resolver.with_fallback(fallback.clone());
    }

    let language = prefs.language.clone();
    let mut controller: Controller = SessionController::new(store, Catalog, language.clone());
    let mut presenter = TerminalPresenter::new(assumed_choice(&cli));

    match cli.command {
        Some(Commands::Status) => {
            controller.restore();
            print_status(&controller);
            Ok(())
        }
        Some(Commands::Discard) => {
            controller.restore();
            let transition = controller.discard()?;
            apply_effects(&mut presenter, &transition.effects);
            println!("Interrupted download discarded.");
            Ok(())
        }
        Some(Commands::Resume { save_dir }) => {
            controller.restore();
            let submission = controller.resume()?;
            run_and_report(
                &mut controller,
                &resolver,
                &mut presenter,
                submission,
                save_dir.as_deref(),
                &language,
            )
            .await
            .map(|_| ())
        }
        Some(Commands::Download {
            url,
            resolution,
            format,
            title,
            save_dir,
        }) => {
            if let Some(submission) = driver::restore(&mut controller, &mut presenter)? {
                let resumed = run_and_report(
                    &mut controller,
                    &resolver,
                    &mut presenter,
                    submission,
                    save_dir.as_deref(),
                    &language,
                )
                .await;
                if !proceeds_after_resume(&resumed) {
                    return Ok(());
                }
            }
            let request = SessionRequest::new(
                url,
                resolution.unwrap_or(prefs.default_resolution),
                format.unwrap_or(prefs.default_format),
                title.unwrap_or_default(),
            );
            let submission = controller.submit(request)?;
            run_and_report(
                &mut controller,
                &resolver,
                &mut presenter,
                submission,
                save_dir.as_deref(),
                &language,
            )
            .await
            .map(|_| ())
        }
        Some(Commands::Prefs { action }) => run_prefs(controller.store().as_ref(), prefs, &action),
        None => {
            if let Some(submission) = driver::restore(&mut controller, &mut presenter)? {
                run_and_report(
                    &mut controller,
                    &resolver,
                    &mut presenter,
                    submission,
                    None,
                    &language,
                )
                .await?;
            }
            print_status(&controller);
            Ok(())
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("TUBEGRAB_LOG")
        .unwrap_or_else(|_| EnvFilter::new("tubegrab=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn open_store(cli: &Cli, config: &RuntimeConfig) -> Result<Box<dyn KeyValueStore>> {
    if cli.ephemeral {
        return Ok(Box::new(MemoryStore::new()));
    }
    let path = cli.state_db.clone().unwrap_or_else(|| config.state_db.clone());
    let store = SqliteStore::open(&path).context("initializing state database")?;
    Ok(Box::new(store))
}

/// Saved preferences win; the config file only supplies the first-run
/// language.
fn load_preferences(store: &dyn KeyValueStore, config: &RuntimeConfig) -> Result<Preferences> {
    let mut prefs = Preferences::load(store)?;
    if store.get(LANGUAGE_KEY)?.is_none() {
        if let Some(language) = &config.language {
            if let Err(err) = prefs.set_language(language) {
                warn!(error = %err, "ignoring LANGUAGE from config");
            }
        }
    }
    Ok(prefs)
}

fn assumed_choice(cli: &Cli) -> Option<ResumeChoice> {
    match cli.on_interrupted.as_deref() {
        Some("resume") => Some(ResumeChoice::Resume),
        Some("discard") => Some(ResumeChoice::Discard),
        _ => None,
    }
}

fn run_prefs(store: &dyn KeyValueStore, mut prefs: Preferences, action: &PrefsAction) -> Result<()> {
    match action {
        PrefsAction::Show => {}
        PrefsAction::Language { code } => {
            prefs.set_language(code)?;
            if !Catalog::supports(&prefs.language) {
                warn!(language = %prefs.language, "no translations for language, falling back");
            }
        }
        PrefsAction::Resolver { program } => prefs.set_resolver_program(program),
        PrefsAction::Defaults { resolution, format } => prefs.set_defaults(resolution, format)?,
    }
    if !matches!(action, PrefsAction::Show) {
        prefs.save(store)?;
    }
    println!("language:           {}", prefs.language);
    println!("default resolution: {}", prefs.default_resolution);
    println!("default format:     {}", prefs.default_format);
    println!(
        "resolver program:   {}",
        prefs.resolver_program.as_deref().unwrap_or("(from config)")
    );
    Ok(())
}

fn print_status(controller: &Controller) {
    let state = match controller.state() {
        ControllerState::Idle => "idle",
        ControllerState::PendingResume => "interrupted (run `tubegrab resume` or `tubegrab discard`)",
        ControllerState::InFlight => "in flight",
        ControllerState::Completed => "completed",
        ControllerState::Cancelled => "cancelled",
        ControllerState::Failed => "failed",
    };
    println!("state: {state}");
    if let Some(saved) = controller.persisted_state() {
        println!("saved url:        {}", saved.url);
        println!("saved resolution: {}", saved.resolution);
        println!("saved format:     {}", saved.format);
        if !saved.custom_title.is_empty() {
            println!("saved title:      {}", saved.custom_title);
        }
    }
    if let Some(media) = controller.last_media() {
        println!(
            "last download:    {} ({} {}, {})",
            media.title, media.resolution, media.format, media.timestamp
        );
    }
}

/// A new download only starts after a resumed one if the user did not stop
/// it. A failed resume is logged and does not block the new URL.
fn proceeds_after_resume(resumed: &Result<SessionStatus>) -> bool {
    match resumed {
        Ok(SessionStatus::Cancelled) => false,
        Ok(_) => true,
        Err(err) => {
            warn!(error = %err, "resumed download did not complete");
            true
        }
    }
}

async fn run_and_report(
    controller: &mut Controller,
    resolver: &YtDlpResolver,
    presenter: &mut TerminalPresenter,
    submission: Submission,
    save_dir: Option<&Path>,
    language: &str,
) -> Result<SessionStatus> {
    if let Some(warning) = controller.leave_warning() {
        eprintln!("{warning} (Ctrl+C)");
    }
    let status =
        driver::run_attempt(controller, resolver, presenter, submission, interrupt_signal()).await;

    match status {
        SessionStatus::Completed => {
            if let (Some(dir), Some((download, metadata))) = (save_dir, presenter.take_result()) {
                let dir = dir.to_path_buf();
                let target = task::spawn_blocking(move || save_download(&dir, &download, &metadata))
                    .await
                    .context("joining download task")??;
                println!("Saved to {}", target.display());
                controller.acknowledge()?;
            }
            Ok(SessionStatus::Completed)
        }
        SessionStatus::Cancelled => {
            println!("{}", Catalog.text(language, MessageKey::Cancelled));
            Ok(SessionStatus::Cancelled)
        }
        other => bail!("download did not complete ({})", other.as_str()),
    }
}

async fn interrupt_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

/// Fetches the stream with a blocking client and writes the metadata JSON
/// beside it.
fn save_download(dir: &Path, download: &DownloadAction, metadata: &MetadataAction) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let target = dir.join(download.file_name_with_extension());

    let response = ureq::get(&download.stream_url)
        .call()
        .with_context(|| format!("requesting {}", download.stream_url))?;
    let mut reader = response.into_reader();
    let mut file =
        File::create(&target).with_context(|| format!("creating {}", target.display()))?;
    let bytes = io::copy(&mut reader, &mut file)
        .with_context(|| format!("writing {}", target.display()))?;
    info!(bytes, path = %target.display(), content_type = %download.content_type, "stream saved");

    let metadata_path = dir.join(sanitize_file_name(&metadata.file_name));
    fs::write(&metadata_path, &metadata.json)
        .with_context(|| format!("writing {}", metadata_path.display()))?;
    Ok(target)
}

/// Renders effects as plain lines. Progress goes to stderr so stdout only
/// carries results.
struct TerminalPresenter {
    assume: Option<ResumeChoice>,
    result: Option<(DownloadAction, MetadataAction)>,
}

impl TerminalPresenter {
    fn new(assume: Option<ResumeChoice>) -> Self {
        Self {
            assume,
            result: None,
        }
    }

    fn take_result(&mut self) -> Option<(DownloadAction, MetadataAction)> {
        self.result.take()
    }
}

impl Presenter for TerminalPresenter {
    fn show_progress(&mut self, text: &str) {
        eprintln!("{text}");
    }

    fn hide_progress(&mut self) {}

    fn show_error(&mut self, text: &str) {
        eprintln!("error: {text}");
    }

    fn mark_input_error(&mut self) {}

    fn clear_error(&mut self) {}

    fn show_result(&mut self, download: &DownloadAction, metadata: &MetadataAction) {
        println!("{}", download.file_name);
        println!("{}", download.stream_url);
        println!("{}", metadata.json);
        self.result = Some((download.clone(), metadata.clone()));
    }

    fn clear_result(&mut self) {
        self.result = None;
    }

    fn set_processing(&mut self, _processing: bool) {}

    fn prefill(&mut self, request: &SessionRequest) {
        debug!(
            url = %request.url,
            resolution = %request.resolution,
            format = %request.format,
            "restored saved session"
        );
    }

    fn prompt_resume(&mut self, message: &str) -> ResumeChoice {
        if let Some(choice) = self.assume {
            return choice;
        }
        match prompt_yes_no(message, true) {
            Ok(true) => ResumeChoice::Resume,
            Ok(false) => ResumeChoice::Discard,
            Err(err) => {
                warn!(error = %err, "no answer to resume prompt, discarding");
                ResumeChoice::Discard
            }
        }
    }
}

fn prompt_yes_no(prompt: &str, default_yes: bool) -> Result<bool> {
    let default_indicator = if default_yes { "[Y/n]" } else { "[y/N]" };
    loop {
        eprint!("{prompt} {default_indicator} ");
        io::stderr().flush().ok();
        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => bail!("Input aborted"),
            Ok(_) => {}
        }
        let value = input.trim().to_lowercase();
        if value.is_empty() {
            return Ok(default_yes);
        }
        match value.as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => eprintln!("Please answer y or n."),
        }
    }
}
