//! Command handlers wiring the CLI to the core

use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::application::ports::ConfigStore;
use crate::application::{
    CancelToken, RetranscribeProgress, SessionController, SessionLedger, StopOutcome,
};
use crate::domain::config::AppConfig;
use crate::domain::session::SessionId;
use crate::domain::state::ControllerState;
use crate::infrastructure::{CommandCapture, CommandTranscriber, XdgConfigStore};
use crate::storage::SessionStore;

use super::presenter::Presenter;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Load the config file and overlay CLI-provided values
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load().await.unwrap_or_else(|_| AppConfig::empty());
    file_config.merge(cli_config)
}

fn ledger_for(config: &AppConfig) -> Arc<SessionLedger> {
    let root = config.data_dir_or_default().join("sessions");
    debug!(root = %root.display(), "opening session tree");
    Arc::new(SessionLedger::new(SessionStore::new(root)))
}

fn transcriber_for(
    config: &AppConfig,
    override_cmd: Option<String>,
    presenter: &Presenter,
) -> Option<CommandTranscriber> {
    let command = override_cmd.or_else(|| config.transcribe_command.clone())?;
    match CommandTranscriber::new(&command) {
        Ok(t) => Some(t),
        Err(e) => {
            presenter.error(&e.to_string());
            None
        }
    }
}

/// Interactive recording loop: Enter toggles record/stop, `c` cancels the
/// in-progress take, `n` starts a new session, `q` quits.
pub async fn run_record(
    config: AppConfig,
    capture_override: Option<String>,
    transcribe_override: Option<String>,
) -> ExitCode {
    let mut presenter = Presenter::new();

    let Some(transcriber) = transcriber_for(&config, transcribe_override, &presenter) else {
        presenter.error(
            "Missing transcriber. Set TAKELOG_TRANSCRIBE_COMMAND, pass --transcribe-command, \
             or run 'takelog config set transcribe_command <cmd>'",
        );
        return ExitCode::from(EXIT_USAGE_ERROR);
    };
    let capture_command = capture_override
        .as_deref()
        .unwrap_or_else(|| config.capture_command_or_default())
        .to_string();
    let capture = match CommandCapture::new(&capture_command) {
        Ok(c) => c,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let controller = SessionController::new(capture, transcriber, ledger_for(&config));

    presenter.info("Enter: record/stop   c: cancel take   n: new session   q: quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                presenter.error(&format!("stdin error: {e}"));
                break;
            }
        };

        match line.trim() {
            "" => {
                if matches!(controller.state().await, ControllerState::Recording) {
                    presenter.start_spinner("Transcribing...");
                    match controller.stop_recording(CancelToken::never()).await {
                        Ok(StopOutcome::Committed(take)) => match take.warning {
                            None => {
                                presenter.spinner_success(&format!("Take {}", take.segment.id));
                                presenter
                                    .output(take.segment.transcript.as_deref().unwrap_or_default());
                            }
                            Some(warning) => {
                                presenter.spinner_fail(&format!(
                                    "Take {} kept without transcript: {}",
                                    take.segment.id, warning
                                ));
                            }
                        },
                        Ok(StopOutcome::NothingCaptured) => {
                            presenter.spinner_fail("No audio captured");
                        }
                        Err(e) => {
                            presenter.spinner_fail(&e.to_string());
                        }
                    }
                } else {
                    match controller.start_recording().await {
                        Ok(()) => presenter.info("Recording... press Enter to stop"),
                        Err(e) => presenter.warn(&e.to_string()),
                    }
                }
            }
            "c" => match controller.cancel_recording().await {
                Ok(()) => presenter.info("Take discarded"),
                Err(e) => presenter.warn(&e.to_string()),
            },
            "n" => {
                controller.ledger().new_session().await;
                presenter.info("Next take starts a new session");
            }
            "q" => break,
            other => presenter.warn(&format!("Unknown command: {other:?}")),
        }
    }

    // Quitting mid-recording discards the capture; nothing was committed.
    if matches!(controller.state().await, ControllerState::Recording) {
        let _ = controller.cancel_recording().await;
    }
    if let Some(session) = controller.ledger().active_session().await {
        presenter.info(&format!("Session: {session}"));
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Append a text-only take
pub async fn run_add(config: AppConfig, session: Option<String>, text: Vec<String>) -> ExitCode {
    let presenter = Presenter::new();
    let ledger = ledger_for(&config);
    let session = session.map(SessionId::new);
    let text = text.join(" ");

    match ledger.append(session.as_ref(), &text).await {
        Ok(Some((session, segment))) => {
            presenter.success(&format!("Appended {} to session {}", segment.id, session));
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(None) => {
            presenter.info("Nothing to add");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// List sessions in creation order
pub async fn run_sessions(config: AppConfig, filter: Option<String>) -> ExitCode {
    let presenter = Presenter::new();
    let ledger = ledger_for(&config);

    match ledger.list_sessions(filter.as_deref()).await {
        Ok(summaries) if summaries.is_empty() => {
            presenter.info("No sessions recorded yet");
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(summaries) => {
            for summary in summaries {
                presenter.output(&format!(
                    "{}  {:>3} takes  {}",
                    summary.id,
                    summary.segments,
                    summary.display_name()
                ));
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Print a session's transcript as persisted on disk
pub async fn run_show(config: AppConfig, session: String) -> ExitCode {
    let presenter = Presenter::new();
    let ledger = ledger_for(&config);

    match ledger.persisted_transcript(&SessionId::new(session)).await {
        Ok(text) => {
            presenter.output(text.trim_end_matches('\n'));
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Rename a session
pub async fn run_rename(config: AppConfig, session: String, name: String) -> ExitCode {
    let presenter = Presenter::new();
    let ledger = ledger_for(&config);
    let session = SessionId::new(session);

    match ledger.rename(&session, &name).await {
        Ok(()) => {
            presenter.success(&format!("Renamed {} to {:?}", session, name));
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Re-run transcription over the latest session
pub async fn run_retranscribe(
    config: AppConfig,
    last_only: bool,
    transcribe_override: Option<String>,
) -> ExitCode {
    let presenter = Presenter::new();

    let Some(transcriber) = transcriber_for(&config, transcribe_override, &presenter) else {
        presenter.error(
            "Missing transcriber. Set TAKELOG_TRANSCRIBE_COMMAND, pass --transcribe-command, \
             or run 'takelog config set transcribe_command <cmd>'",
        );
        return ExitCode::from(EXIT_USAGE_ERROR);
    };
    // The capture collaborator is never started here.
    let capture = match CommandCapture::new(config.capture_command_or_default()) {
        Ok(c) => c,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };
    let controller = SessionController::new(capture, transcriber, ledger_for(&config));

    // The controller resolves the segment list; the bar learns its length
    // from the first progress callback.
    let bar = presenter.retranscribe_bar(0);
    let progress: RetranscribeProgress = {
        let bar = bar.clone();
        Box::new(move |done, total, segment| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
            bar.set_message(segment.to_string());
        })
    };

    match controller
        .retranscribe(last_only, Some(progress), CancelToken::never())
        .await
    {
        Ok(report) => {
            bar.finish_and_clear();
            presenter.success(&format!(
                "Re-transcribed session {}: {} ok, {} failed, {} skipped",
                report.session, report.succeeded, report.failed, report.skipped
            ));
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            bar.finish_and_clear();
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Export a session's transcript to a file
pub async fn run_export(
    config: AppConfig,
    session: String,
    output: std::path::PathBuf,
) -> ExitCode {
    let presenter = Presenter::new();
    let ledger = ledger_for(&config);
    let session = SessionId::new(session);

    let text = match ledger.transcript(&session).await {
        Ok(text) => text,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let content = if text.is_empty() { text } else { format!("{text}\n") };
    match tokio::fs::write(&output, content).await {
        Ok(()) => {
            presenter.success(&format!("Exported {} to {}", session, output.display()));
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&format!("Failed to write {}: {}", output.display(), e));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
