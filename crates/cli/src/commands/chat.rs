use folio_agent::replies::welcome_message;
use folio_agent::{bootstrap_controller, DialogueController};
use folio_core::config::{AppConfig, LoadOptions};
use folio_core::domain::conversation::ConversationState;
use folio_core::domain::turn::ChatTurn;
use folio_core::errors::ApplicationError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::commands::CommandResult;

const EXIT_WORDS: &[&str] = &["salir", "exit", "quit"];
const RELOAD_COMMAND: &str = "/recargar";
const PROMPT: &str = "tú> ";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return startup_failure(ApplicationError::from(error)),
    };
    init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    runtime.block_on(async {
        let mut controller = match bootstrap_controller(&config).await {
            Ok(controller) => controller,
            Err(error) => return startup_failure(ApplicationError::from(error)),
        };

        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        match converse(&mut controller, stdin, &mut stdout).await {
            Ok(turns) => {
                CommandResult::success("chat", format!("conversation ended after {turns} turns"))
            }
            Err(error) => CommandResult::failure("chat", "terminal_io", error.to_string(), 5),
        }
    })
}

fn startup_failure(error: ApplicationError) -> CommandResult {
    CommandResult::failure("chat", error.error_class(), error.to_string(), error.exit_code())
}

/// Runs one conversation over line-oriented input until EOF or an exit word.
/// `/recargar` re-reads the profile documents without ending the conversation.
/// Returns the number of turns the assistant answered.
pub async fn converse<R, W>(
    controller: &mut DialogueController,
    input: R,
    output: &mut W,
) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let welcome = welcome_message(&controller.profile().owner_name);
    output.write_all(format!("{welcome}\n\n{PROMPT}").as_bytes()).await?;
    output.flush().await?;

    let mut state = ConversationState::new();
    let mut history: Vec<ChatTurn> = Vec::new();
    let mut turns = 0;
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if EXIT_WORDS.contains(&message.to_lowercase().as_str()) {
            break;
        }
        if message.is_empty() {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;
            continue;
        }
        if message == RELOAD_COMMAND {
            let notice = if controller.reload_profile().await {
                let profile = controller.profile();
                format!(
                    "Perfil recargado: resumen {}, LinkedIn {}.",
                    profile.summary.status.as_str(),
                    profile.linkedin.status.as_str()
                )
            } else {
                "Este asistente no tiene ficheros de perfil que recargar.".to_string()
            };
            output.write_all(format!("asistente> {notice}\n\n{PROMPT}").as_bytes()).await?;
            output.flush().await?;
            continue;
        }

        let outcome = controller.handle_turn(state, message, &history).await;
        state = outcome.state;
        history.push(ChatTurn::user(message));
        history.push(ChatTurn::assistant(outcome.reply.clone()));
        turns += 1;

        output.write_all(format!("asistente> {}\n\n{PROMPT}", outcome.reply).as_bytes()).await?;
        output.flush().await?;
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(turns)
}

fn init_logging(config: &AppConfig) {
    use folio_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(log_level).with_writer(std::io::stderr);

    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}
