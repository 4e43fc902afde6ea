//! Terminal front end for a chat session.
//!
//! Lines typed on stdin are submitted to the backend; commands start with `/`.
//! Submissions and playback run as background tasks so `/stop` stays usable
//! while a long synthesis request is pending. The transcript is re-rendered
//! from the store's scroll-to-latest notifications.

use std::fmt::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::mpsc;

use crate::backend::{BackendHealth, HttpBackend};
use crate::config::ClientConfig;
use crate::conversation::{Message, RejectReason, Role, SubmitOutcome};
use crate::error::BackendResult;
use crate::playback::{PlayOutcome, StopOutcome};
use crate::session::{ChatSession, ToggleOutcome};

const HELP: &str = "\
命令:
  /ask N     提问第 N 个常见问题
  /play N    播放或停止第 N 条消息的语音
  /stop      停止播放
  /list      重新显示全部对话
  /health    检查后端状态
  /help      显示帮助
  /quit      退出
";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Say(String),
    Ask(usize),
    Play(usize),
    Stop,
    List,
    Health,
    Help,
    Quit,
    Blank,
    Invalid(String),
}

impl Input {
    /// Parse one line. Message numbers are 1-based as displayed.
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Say(line.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let number = parts
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1));

        match (name, number) {
            ("ask", Some(n)) => Self::Ask(n),
            ("play", Some(n)) => Self::Play(n),
            ("stop", _) => Self::Stop,
            ("list", _) => Self::List,
            ("health", _) => Self::Health,
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Invalid(line.to_string()),
        }
    }
}

/// Run the terminal client until EOF, `/quit` or Ctrl-C.
///
/// # Returns
/// `ExitCode::SUCCESS` on a clean exit, `1` on startup or I/O failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Minzai chat v{}", env!("CARGO_PKG_VERSION"));

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!("Backend endpoint: {}", config.base_url);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(chat_loop(&config)) {
        tracing::error!("Chat client error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

async fn chat_loop(config: &ClientConfig) -> anyhow::Result<()> {
    let (session, backend) =
        ChatSession::connect(config).context("failed to build backend client")?;
    let session = Arc::new(session);

    let mut out = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut scroll = session.store().subscribe();
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<String>();

    let mut printed = render_from(&mut out, &session, 0).await?;
    write_suggestions(&mut out, &session).await?;

    // One listener for the whole loop so a SIGINT during a branch body is kept.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let keep_going =
                    handle_input(Input::parse(&line), &session, &backend, &notice_tx, &mut out)
                        .await?;
                if !keep_going {
                    break;
                }
            }
            changed = scroll.changed() => {
                if changed.is_err() {
                    break;
                }
                printed = render_from(&mut out, &session, printed).await?;
            }
            Some(notice) = notice_rx.recv() => {
                emit(&mut out, &format!("  · {notice}\n")).await?;
            }
            _ = &mut ctrl_c => break,
        }
    }

    let _ = session.stop_playback();
    Ok(())
}

async fn handle_input(
    input: Input,
    session: &Arc<ChatSession>,
    backend: &Arc<HttpBackend>,
    notices: &mpsc::UnboundedSender<String>,
    out: &mut Stdout,
) -> anyhow::Result<bool> {
    match input {
        Input::Say(text) => spawn_submit(session, notices, SubmitRequest::Text(text)),
        Input::Ask(index) => {
            if session.suggestions().get(index).is_some() {
                spawn_submit(session, notices, SubmitRequest::Suggested(index));
            } else {
                emit(out, "  · 没有这个常见问题\n").await?;
            }
        }
        Input::Play(index) => match session.store().get_index(index) {
            Some(message) => spawn_toggle(session, notices, message),
            None => emit(out, "  · 没有这条消息\n").await?,
        },
        Input::Stop => {
            let text = match session.stop_playback() {
                StopOutcome::Stopped => "已停止播放",
                StopOutcome::Withdrawn => "已取消语音合成",
                StopOutcome::Idle => "当前没有播放",
            };
            emit(out, &format!("  · {text}\n")).await?;
        }
        Input::List => {
            render_from(out, session, 0).await?;
        }
        Input::Health => {
            let backend = Arc::clone(backend);
            let notices = notices.clone();
            tokio::spawn(async move {
                let _ = notices.send(health_notice(backend.health().await));
            });
        }
        Input::Help => emit(out, HELP).await?,
        Input::Quit => return Ok(false),
        Input::Blank => {}
        Input::Invalid(line) => emit(out, &format!("  · 无法识别的命令: {line} (输入 /help)\n")).await?,
    }
    Ok(true)
}

enum SubmitRequest {
    Text(String),
    Suggested(usize),
}

fn spawn_submit(
    session: &Arc<ChatSession>,
    notices: &mpsc::UnboundedSender<String>,
    request: SubmitRequest,
) {
    if session.is_busy() {
        let _ = notices.send("闽仔正忙，请稍等".to_string());
        return;
    }
    let _ = notices.send("闽仔正在思考中...".to_string());

    let session = Arc::clone(session);
    let notices = notices.clone();
    tokio::spawn(async move {
        let outcome = match request {
            SubmitRequest::Text(text) => Some(session.submit(&text).await),
            SubmitRequest::Suggested(index) => session.ask_suggested(index).await,
        };
        if outcome == Some(SubmitOutcome::Rejected(RejectReason::InFlight)) {
            let _ = notices.send("闽仔还在回答上一个问题，请稍等".to_string());
        }
    });
}

fn spawn_toggle(
    session: &Arc<ChatSession>,
    notices: &mpsc::UnboundedSender<String>,
    message: Message,
) {
    if !ChatSession::can_play(&message) {
        let _ = notices.send("这条消息没有语音".to_string());
        return;
    }
    if !session.playback().is_playing(message.id()) {
        let _ = notices.send("正在合成语音...".to_string());
    }

    let session = Arc::clone(session);
    let notices = notices.clone();
    tokio::spawn(async move {
        let text = match session.toggle_playback(message.id()).await {
            ToggleOutcome::Stopped => "已停止播放",
            ToggleOutcome::Play(PlayOutcome::Started) => "正在播放",
            ToggleOutcome::Play(PlayOutcome::Busy) => "上一段语音还在合成中",
            ToggleOutcome::Play(PlayOutcome::SynthesisFailed) => "语音合成失败",
            ToggleOutcome::Play(PlayOutcome::DeviceFailed) => "音频播放失败",
            ToggleOutcome::Play(PlayOutcome::Withdrawn | PlayOutcome::Skipped) => return,
            ToggleOutcome::NotPlayable | ToggleOutcome::UnknownMessage => "这条消息没有语音",
        };
        let _ = notices.send(text.to_string());
    });
}

fn health_notice(result: BackendResult<BackendHealth>) -> String {
    match result {
        Ok(health) => format!("后端状态: {}", health.status),
        Err(err) => format!("无法连接后端: {err}"),
    }
}

/// Print messages from position `from` onward and return the new count.
async fn render_from(out: &mut Stdout, session: &ChatSession, from: usize) -> anyhow::Result<usize> {
    let messages = session.messages();
    let mut text = String::new();
    for (index, message) in messages.iter().enumerate().skip(from) {
        let playing = session.playback().is_playing(message.id());
        format_message(&mut text, index, message, playing);
    }
    emit(out, &text).await?;
    Ok(messages.len())
}

async fn write_suggestions(out: &mut Stdout, session: &ChatSession) -> anyhow::Result<()> {
    let suggestions = session.suggestions();
    if suggestions.is_empty() {
        return Ok(());
    }
    let mut text = String::from("常见问题 (/ask N):\n");
    for (i, question) in suggestions.iter().enumerate() {
        let _ = writeln!(text, "  {}. {question}", i + 1);
    }
    text.push('\n');
    emit(out, &text).await
}

fn format_message(text: &mut String, index: usize, message: &Message, playing: bool) {
    let speaker = match message.role() {
        Role::User => "你",
        Role::Assistant => "闽仔",
    };
    let marker = if playing {
        " ⏸️"
    } else if ChatSession::can_play(message) {
        " 🔊"
    } else {
        ""
    };
    let _ = writeln!(
        text,
        "[{}] {speaker} {}{marker}",
        index + 1,
        message.display_time()
    );
    for line in message.paragraphs() {
        let _ = writeln!(text, "    {line}");
    }
    text.push('\n');
}

async fn emit(out: &mut Stdout, text: &str) -> anyhow::Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}
