//! Interactive chat against a chatwire backend.
//!
//! This binary provides a streaming REPL over the session API.  Replies are printed token by
//! token as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # Cookie credentials against the local services
//! chatwire-chat
//!
//! # Client-held tokens against a remote backend
//! chatwire-chat --api-url https://chat.example.com --auth-url https://auth.example.com \
//!     --credentials bearer --access-token "$AT" --refresh-token "$RT"
//!
//! # Log transport activity to stderr
//! chatwire-chat --verbose
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/sessions` - List sessions
//! - `/new [title]` - Start a new session
//! - `/switch <id|n>` - Switch sessions
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use parking_lot::Mutex;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;

use chatwire::chat::{
    ChatCommand, PlainTextRenderer, Renderer, help_text, parse_command, reply_prefix,
};
use chatwire::logging::{default_filter, init_tracing};
use chatwire::{
    AssistantSink, ChatArgs, ChatClient, ClientConfig, Conversation, Error, MessageRole,
    StreamOutcome,
};

/// Main entry point for the chatwire-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("chatwire-chat [OPTIONS]");
    init_tracing(default_filter(args.verbose))?;
    let config = ClientConfig::try_from(args)?;

    let client = ChatClient::new(&config)?;
    let mut conversation = Conversation::new();
    let mut renderer = PlainTextRenderer::new();
    let mut rl = DefaultEditor::new()?;

    // The reply being streamed, if any; Ctrl+C cancels it.
    let active: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
    let active_clone = Arc::clone(&active);
    ctrlc::set_handler(move || {
        if let Some(cancel) = active_clone.lock().as_ref() {
            cancel.cancel();
        }
    })?;

    println!("chatwire ({})", client.api_base_url());
    println!("Type /help for commands, /quit to exit\n");

    refresh_sessions(&client, &mut conversation, &mut renderer).await;
    if conversation.selected().is_some() {
        load_history(&client, &mut conversation, &mut renderer, false).await;
    }

    loop {
        let prompt = match conversation.selected() {
            Some(session) => format!("[{}] You: ", session.title),
            None => "You: ".to_string(),
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    if cmd == ChatCommand::Quit {
                        println!("Goodbye!");
                        break;
                    }
                    run_command(cmd, &client, &mut conversation, &mut renderer).await;
                    continue;
                }

                send(line, &client, &mut conversation, &mut renderer, &active).await;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

async fn run_command(
    cmd: ChatCommand,
    client: &ChatClient,
    conversation: &mut Conversation,
    renderer: &mut PlainTextRenderer,
) {
    match cmd {
        ChatCommand::Sessions => {
            refresh_sessions(client, conversation, renderer).await;
            let selected = conversation.selected().map(|s| s.id.clone());
            renderer.print_sessions(conversation.sessions(), selected.as_deref());
        }
        ChatCommand::New(title) => match client.create_session(title.as_deref()).await {
            Ok(session) => {
                let id = session.id.clone();
                renderer.print_info(&format!("Created \"{}\".", session.title));
                conversation.upsert_session(session);
                conversation.select(&id);
            }
            Err(err) => report(client, renderer, &err),
        },
        ChatCommand::Switch(target) => match resolve_session(conversation, &target) {
            Some(id) => {
                conversation.select(&id);
                load_history(client, conversation, renderer, true).await;
            }
            None => renderer.print_error(&format!("no session {target}; see /sessions")),
        },
        ChatCommand::Rename(title) => {
            let Some(id) = conversation.selected().map(|s| s.id.clone()) else {
                renderer.print_error("no session selected");
                return;
            };
            match client.rename_session(&id, &title).await {
                Ok(session) => {
                    renderer.print_info(&format!("Renamed to \"{}\".", session.title));
                    conversation.upsert_session(session);
                }
                Err(err) => report(client, renderer, &err),
            }
        }
        ChatCommand::Delete(target) => {
            let id = match target {
                Some(target) => resolve_session(conversation, &target),
                None => conversation.selected().map(|s| s.id.clone()),
            };
            let Some(id) = id else {
                renderer.print_error("no such session; see /sessions");
                return;
            };
            match client.delete_session(&id).await {
                Ok(()) => {
                    conversation.remove_session(&id);
                    renderer.print_info("Session deleted.");
                }
                Err(err) => report(client, renderer, &err),
            }
        }
        ChatCommand::History => load_history(client, conversation, renderer, true).await,
        ChatCommand::WhoAmI => match client.user_info().await {
            Ok(user) => renderer.print_info(&format!(
                "Logged in as {} <{}>{}",
                user.user_name,
                user.email,
                if user.email_verified { "" } else { " (unverified)" }
            )),
            Err(err) => report(client, renderer, &err),
        },
        ChatCommand::Logout => {
            match client.logout().await {
                Ok(()) => renderer.print_info("Logged out."),
                Err(err) => renderer.print_error(&format!("logout: {err}")),
            }
            print_login_url(client, renderer);
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
        }
        ChatCommand::Invalid(message) => renderer.print_error(&message),
        ChatCommand::Quit => {}
    }
}

async fn send(
    line: &str,
    client: &ChatClient,
    conversation: &mut Conversation,
    renderer: &mut PlainTextRenderer,
    active: &Mutex<Option<CancellationToken>>,
) {
    let id = match conversation.selected() {
        Some(session) => session.id.clone(),
        None => match client.create_session(None).await {
            Ok(session) => {
                let id = session.id.clone();
                conversation.upsert_session(session);
                conversation.select(&id);
                id
            }
            Err(err) => {
                report(client, renderer, &err);
                return;
            }
        },
    };
    conversation.push_user_message(line);

    let cancel = CancellationToken::new();
    *active.lock() = Some(cancel.clone());
    renderer.print_text(&reply_prefix(MessageRole::Assistant));
    let (outcome, error) = {
        let mut sink =
            AssistantSink::begin(conversation).with_echo(|text| renderer.print_text(text));
        let outcome = client
            .send_message_streaming(&id, line, &mut sink, &cancel)
            .await;
        (outcome, sink.abandon())
    };
    *active.lock() = None;

    match outcome {
        StreamOutcome::Completed => renderer.finish_response(),
        StreamOutcome::Cancelled => renderer.print_interrupted(),
        StreamOutcome::Failed => {
            println!();
            if let Some(err) = error {
                report(client, renderer, &err);
            }
        }
    }
}

async fn refresh_sessions(
    client: &ChatClient,
    conversation: &mut Conversation,
    renderer: &mut PlainTextRenderer,
) {
    match client.list_sessions().await {
        Ok(sessions) => conversation.set_sessions(sessions),
        Err(err) => report(client, renderer, &err),
    }
}

async fn load_history(
    client: &ChatClient,
    conversation: &mut Conversation,
    renderer: &mut PlainTextRenderer,
    print: bool,
) {
    let Some(id) = conversation.selected().map(|s| s.id.clone()) else {
        renderer.print_error("no session selected");
        return;
    };
    match client.get_history(&id).await {
        Ok(messages) => {
            conversation.set_messages(messages);
            if print {
                for message in conversation.messages() {
                    renderer.print_message(message);
                }
            }
        }
        Err(err) => report(client, renderer, &err),
    }
}

/// Resolve a 1-based list position or a session id.
fn resolve_session(conversation: &Conversation, target: &str) -> Option<String> {
    let sessions = conversation.sessions();
    if let Ok(n) = target.parse::<usize>() {
        if (1..=sessions.len()).contains(&n) {
            return Some(sessions[n - 1].id.clone());
        }
    }
    sessions
        .iter()
        .find(|s| s.id == target)
        .map(|s| s.id.clone())
}

fn report(client: &ChatClient, renderer: &mut PlainTextRenderer, err: &Error) {
    if err.is_authentication_failed() {
        print_login_url(client, renderer);
    } else {
        renderer.print_error(&err.to_string());
    }
}

fn print_login_url(client: &ChatClient, renderer: &mut PlainTextRenderer) {
    match client.login_url(client.api_base_url().as_str()) {
        Ok(url) => renderer.print_login_required(url.as_str()),
        Err(err) => renderer.print_error(&err.to_string()),
    }
}
