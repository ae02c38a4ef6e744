#![cfg(feature = "tui")]

use crate::app::{self, Settings};
use crate::client::ChatClient;
use crate::store::Role;
use anyhow::Context;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use std::io;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
struct ChatLine {
    role: &'static str,
    text: String,
}

impl ChatLine {
    fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            text: text.into(),
        }
    }
}

type Pending = oneshot::Receiver<Result<String, String>>;

pub async fn run_tui(client: ChatClient, settings: &Settings) -> anyhow::Result<()> {
    let client = Arc::new(client);
    let mut model = app::resolve_model(&client, settings).await?;

    let mut lines: Vec<ChatLine> = vec![ChatLine::system(
        "Type a message and press Enter. Commands: /quit, /clear, /model <name>, /models",
    )];
    for m in client.context().messages {
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        lines.push(ChatLine { role, text: m.content });
    }

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (ev_tx, mut ev_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    std::thread::spawn(move || {
        while let Ok(ev) = crossterm::event::read() {
            if ev_tx.send(ev).is_err() {
                break;
            }
        }
    });

    let mut input = String::new();
    let mut pending: Option<Pending> = None;
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(33));

    let res = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = draw(&mut terminal, &model, &lines, &input, pending.is_some()) {
                    break Err(e);
                }
            }
            Some(ev) = ev_rx.recv() => {
                if let Event::Key(key) = ev {
                    match handle_key(key, &mut input, &mut lines, &mut model, &client, &mut pending).await {
                        Ok(true) => break Ok(()),
                        Ok(false) => {}
                        Err(e) => break Err(e),
                    }
                }
            }
            Some(done) = async {
                match &mut pending {
                    Some(rx) => Some(rx.await.unwrap_or_else(|_| Err("reply task ended unexpectedly".to_string()))),
                    None => None,
                }
            } => {
                pending = None;
                match done {
                    Ok(text) => lines.push(ChatLine { role: "assistant", text }),
                    Err(e) => lines.push(ChatLine { role: "error", text: e }),
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

async fn handle_key(
    key: KeyEvent,
    input: &mut String,
    lines: &mut Vec<ChatLine>,
    model: &mut String,
    client: &Arc<ChatClient>,
    pending: &mut Option<Pending>,
) -> anyhow::Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }

    match key.code {
        KeyCode::Esc => return Ok(true),
        KeyCode::Char(c) => input.push(c),
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Enter => {
            let msg = input.trim().to_string();
            input.clear();
            if msg.is_empty() {
                return Ok(false);
            }

            if msg == "/quit" {
                return Ok(true);
            }
            if msg == "/clear" {
                if pending.is_some() {
                    lines.push(ChatLine::system("(wait for the reply before clearing)"));
                    return Ok(false);
                }
                client.clear_context();
                lines.clear();
                lines.push(ChatLine::system("conversation history cleared"));
                return Ok(false);
            }
            if let Some(rest) = msg.strip_prefix("/model ") {
                *model = rest.trim().to_string();
                lines.push(ChatLine::system(format!("model set to: {model}")));
                return Ok(false);
            }
            if msg == "/models" {
                match client.list_models().await {
                    Ok(models) => {
                        let names: Vec<_> = models.into_iter().map(|m| m.model).collect();
                        lines.push(ChatLine::system(format!("models: {}", names.join(", "))));
                    }
                    Err(e) => lines.push(ChatLine { role: "error", text: e.to_string() }),
                }
                return Ok(false);
            }

            if pending.is_some() {
                lines.push(ChatLine::system("(waiting for the previous reply)"));
                return Ok(false);
            }

            lines.push(ChatLine { role: "user", text: msg.clone() });

            let (tx, rx) = oneshot::channel();
            *pending = Some(rx);

            let client = Arc::clone(client);
            let model = model.clone();
            tokio::spawn(async move {
                let res = client
                    .send_message(&msg, &model, true)
                    .await
                    .map_err(|e| e.to_string());
                let _ = tx.send(res);
            });
        }
        _ => {}
    }

    Ok(false)
}

fn draw(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    model: &str,
    lines: &[ChatLine],
    input: &str,
    waiting: bool,
) -> anyhow::Result<()> {
    terminal.draw(|f| {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .split(f.area());

        let mut text = Text::default();
        for l in lines {
            let role = format!("{}: ", l.role);
            let style = match l.role {
                "user" | "error" => Style::default().add_modifier(Modifier::BOLD),
                _ => Style::default(),
            };
            text.lines.push(Line::styled(role, style));
            text.lines.extend(Text::from(l.text.clone()).lines);
            text.lines.push(Line::from(""));
        }
        if waiting {
            text.lines.push(Line::styled("assistant is typing...", Style::default().add_modifier(Modifier::ITALIC)));
        }

        let chat = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(format!("qchat - model: {model}")))
            .wrap(Wrap { trim: false });

        let input_w = Paragraph::new(input.to_string())
            .block(Block::default().borders(Borders::ALL).title("input"));

        f.render_widget(chat, chunks[0]);
        f.render_widget(input_w, chunks[1]);

        let x = chunks[1].x + 1 + input.chars().count() as u16;
        let y = chunks[1].y + 1;
        f.set_cursor_position((x.min(chunks[1].x + chunks[1].width.saturating_sub(2)), y));
    })?;
    Ok(())
}
