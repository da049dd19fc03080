//! Interactive mode command

use super::{build_controller, RunOptions};
use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use toolloop_core::{ConversationController, MessageRole};
use tracing::debug;

const HELP: &str = "Commands: /history shows the session, /clear forgets it, /exit or /quit leaves";

/// A line of input, classified
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    History,
    Clear,
    Help,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/exit" | "/quit" => Input::Exit,
        "/history" => Input::History,
        "/clear" => Input::Clear,
        "/help" => Input::Help,
        command if command.starts_with('/') => Input::Unknown(command),
        message => Input::Message(message),
    }
}

/// Start interactive mode: one turn per line of input until EOF or /exit
pub async fn interactive_command(options: RunOptions) -> Result<()> {
    let controller = build_controller(&options).await?;
    let session_id = options.session_id.as_str();

    println!(
        "{} {} {}",
        "toolloop".bold(),
        format!("session {}", session_id).bright_black(),
        format!("({} messages)", controller.history(session_id).await?.len()).bright_black()
    );
    println!("{}", HELP.bright_black());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Help => println!("{}", HELP),
            Input::History => print_history(&controller, session_id).await?,
            Input::Clear => {
                controller.clear(session_id).await?;
                println!("{}", "Session cleared".bright_black());
            }
            Input::Unknown(command) => {
                println!("{} {}", "Unknown command:".yellow(), command);
            }
            Input::Message(message) => {
                debug!("Interactive turn in session {}", session_id);
                match controller.run_turn(session_id, message).await {
                    Ok(outcome) => println!("{}", outcome.final_reply),
                    Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
                }
            }
        }
    }

    Ok(())
}

async fn print_history(controller: &ConversationController, session_id: &str) -> Result<()> {
    let log = controller.history(session_id).await?;
    if log.is_empty() {
        println!("{}", "(empty session)".bright_black());
        return Ok(());
    }

    for message in &log {
        match message.role {
            MessageRole::User => println!("{} {}", "user:".cyan(), message.content),
            MessageRole::Assistant if message.has_tool_calls() => {
                for call in &message.tool_calls {
                    println!("{} {}({})", "call:".magenta(), call.name, call.arguments);
                }
            }
            MessageRole::Assistant => println!("{} {}", "assistant:".green(), message.content),
            MessageRole::Tool => println!("{} {}", "tool:".bright_black(), message.content),
            MessageRole::System => println!("{} {}", "system:".bright_black(), message.content),
        }
    }
    Ok(())
}
