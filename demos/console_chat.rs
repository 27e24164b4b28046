//! Console Chat Example
//!
//! Chats with a backend agent from the terminal, in request or stream mode.
//! Configuration comes from `CHAT_*` environment variables.
//!
//! Run with: cargo run --example console_chat

use std::io::Write;

use anyhow::Result;
use colored::*;
use shadow_chat_sdk::{
    core::StateEvent,
    logging,
    runtime::EventReceiver,
    session::Role,
    ClientConfig, ConnectionMode, SessionManager,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
/new [agent]      start a session (default: selected agent)
/list             list sessions
/select <id>      switch session
/delete <id>      delete a session
/rename <name>    rename the current session
/agents           list agents
/agent <name>     select an agent
/mode <request|stream>
/quit";

/// Prints conversation changes as they are broadcast
struct Printer {
    events: EventReceiver,
    streamed: usize,
}

impl Printer {
    fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                StateEvent::MessageAppended { message, .. } if message.role == Role::Assistant => {
                    self.streamed = message.content.len();
                    if message.is_error() {
                        println!("{}", message.content.red());
                    } else if !message.content.is_empty() {
                        println!("{} {}", "Assistant:".green().bold(), message.content);
                    } else {
                        print!("{} ", "Assistant:".green().bold());
                    }
                }
                StateEvent::MessageUpdated { content, .. } => {
                    if let Some(delta) = content.get(self.streamed..) {
                        print!("{}", delta);
                    }
                    self.streamed = content.len();
                }
                StateEvent::SendingChanged(false) => println!(),
                StateEvent::ChannelChanged { state, .. } => {
                    println!("{}", format!("[channel {}]", state).bright_black());
                }
                _ => {}
            }
        }
        let _ = std::io::stdout().flush();
    }
}

async fn run_command(manager: &mut SessionManager, line: &str) -> Result<bool> {
    let (command, arg) = match line.split_once(' ') {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" => return Ok(false),
        "/help" => println!("{}", HELP.bright_black()),
        "/new" => {
            let agent = match arg {
                "" => manager.state().selected_agent.clone().unwrap_or_default(),
                name => name.to_string(),
            };
            let session = manager.create_session(&agent).await?;
            println!("{} {} ({})", "New session".bright_blue(), session.name, session.id);
        }
        "/list" => {
            manager.load_sessions().await;
            let current = manager.state().current_session_id().map(str::to_string);
            for session in &manager.state().sessions {
                let marker = if current.as_deref() == Some(session.id.as_str()) { "*" } else { " " };
                println!("{} {}  {}  [{}]", marker, session.id.bright_black(), session.name, session.agent);
            }
        }
        "/select" => {
            manager.select_session(arg).await?;
            if let Some(session) = manager.current_session() {
                for message in &session.messages {
                    let who = match message.role {
                        Role::User => "You:".cyan().bold(),
                        Role::Assistant => "Assistant:".green().bold(),
                    };
                    println!("{} {}", who, message.content);
                }
            }
        }
        "/delete" => manager.delete_session_by_id(arg).await?,
        "/rename" => {
            let Some(id) = manager.state().current_session_id().map(str::to_string) else {
                println!("{}", "No session selected".red());
                return Ok(true);
            };
            manager.rename_session(&id, arg).await?;
        }
        "/agents" => {
            manager.load_agents().await;
            for agent in &manager.state().agents {
                println!("  {} - {} ({})", agent.name.bold(), agent.description, agent.status);
            }
        }
        "/agent" => manager.set_selected_agent(Some(arg.to_string())),
        "/mode" => {
            let mode: ConnectionMode = arg.parse()?;
            manager.set_connection_mode(mode).await;
            println!("{} {}", "Mode:".bright_blue(), mode);
        }
        _ => println!("{}", "Unknown command, try /help".red()),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging()?;

    let config = ClientConfig::from_env()?;
    let mut manager = config.build_manager()?;
    let mut printer = Printer {
        events: manager.subscribe(),
        streamed: 0,
    };

    println!("{}", "=".repeat(60).bright_blue());
    println!("{}", "  Chat Client".bright_blue().bold());
    println!("{}", "=".repeat(60).bright_blue());
    println!("{}", HELP.bright_black());

    manager.load_agents().await;
    manager.load_sessions().await;
    if manager.state().agents.is_empty() {
        println!("{}", "No agents available (is the backend running?)".red());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        printer.drain();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let result = if line.starts_with('/') {
                    run_command(&mut manager, line).await
                } else {
                    manager.send_message(line).await.map(|_| true).map_err(Into::into)
                };
                match result {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
                }
            }
            update = manager.next_stream_update() => {
                manager.handle_stream_update(update).await;
            }
        }
    }

    manager.disconnect_web_socket();
    Ok(())
}
