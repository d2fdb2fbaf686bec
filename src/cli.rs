use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use crate::composer::{ClipboardSink, Composer, ComposerError, ImageUpload};
use crate::llm::GenerationGateway;
use crate::state::SessionState;

#[derive(Parser, Debug)]
#[clap(name = "cinematic-composer", version, about = "Compose cinematic contact-sheet prompts")]
pub struct CliOptions {
    #[clap(long, short, env = "COMPOSER_VERBOSE")]
    /// Mirror info/debug logs to stderr instead of warnings only.
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive session (default).
    Session,
    /// Translate scene + action and print the final contact-sheet prompt.
    Generate {
        #[clap(long, short)]
        scene: String,
        #[clap(long, short, default_value = "")]
        action: String,
        #[clap(long)]
        copy: bool,
        #[clap(long)]
        json: bool,
    },
    /// Rewrite scene and action cinematically.
    Enhance {
        #[clap(long, short, default_value = "")]
        scene: String,
        #[clap(long, short, default_value = "")]
        action: String,
        #[clap(long)]
        json: bool,
    },
    /// Brainstorm a random scene and action.
    Idea {
        #[clap(long)]
        json: bool,
    },
    /// Describe an image as a scene.
    Analyze {
        image: PathBuf,
        #[clap(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Scene(String),
    Action(String),
    Image(PathBuf),
    ClearImage,
    Enhance,
    Idea,
    Generate,
    Copy,
    Reset,
    Show,
    Help,
    Quit,
    Unknown(String),
}

const SESSION_HELP: &str = "Commands:
  scene <text>     set the scene description
  action <text>    set the action description
  image <path>     analyze an image into the scene field
  clear-image      drop the image preview
  enhance          rewrite scene and action cinematically
  idea             brainstorm a random scene and action
  generate         build the final contact-sheet prompt
  copy             copy the prompt to the clipboard
  reset            clear everything
  show             print the current session
  quit             leave";

pub fn parse_session_command(line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let command = match head.to_lowercase().as_str() {
        "scene" => SessionCommand::Scene(rest.to_string()),
        "action" => SessionCommand::Action(rest.to_string()),
        "image" if !rest.is_empty() => SessionCommand::Image(PathBuf::from(rest)),
        "clear-image" => SessionCommand::ClearImage,
        "enhance" => SessionCommand::Enhance,
        "idea" | "brainstorm" => SessionCommand::Idea,
        "generate" | "gen" => SessionCommand::Generate,
        "copy" => SessionCommand::Copy,
        "reset" | "clear" => SessionCommand::Reset,
        "show" => SessionCommand::Show,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        _ => SessionCommand::Unknown(line.to_string()),
    };
    Some(command)
}

fn field_or_placeholder(value: &str) -> &str {
    if value.trim().is_empty() {
        "(empty)"
    } else {
        value
    }
}

pub fn render_state(state: &SessionState) -> String {
    let mut lines = vec![
        format!("SCENE:  {}", field_or_placeholder(&state.scene)),
        format!("ACTION: {}", field_or_placeholder(&state.action)),
    ];
    if let Some(preview) = &state.image_preview {
        lines.push(format!(
            "IMAGE:  {} ({}, {} bytes)",
            preview.file_name.as_deref().unwrap_or("unnamed"),
            preview.mime_type,
            preview.size_bytes
        ));
    }
    if state.busy.any() {
        let names: Vec<&str> = state
            .busy
            .active()
            .iter()
            .map(|operation| operation.as_str())
            .collect();
        lines.push(format!("BUSY:   {}", names.join(", ")));
    }
    if state.input_error {
        lines.push("! a required field is empty".to_string());
    }
    if state.copy_confirmed {
        lines.push("copied".to_string());
    }
    lines.push(format!("OUTPUT ({} chars):", state.output_chars()));
    if !state.output.is_empty() {
        lines.push(state.output.clone());
    }
    lines.join("\n")
}

fn print_state(state: &SessionState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        println!("{}", render_state(state));
    }
    Ok(())
}

pub async fn run_one_shot<G, C>(composer: Composer<G, C>, command: Command) -> Result<()>
where
    G: GenerationGateway,
    C: ClipboardSink,
{
    match command {
        Command::Session => run_session(composer).await,
        Command::Generate {
            scene,
            action,
            copy,
            json,
        } => {
            composer.set_scene(&scene);
            composer.set_action(&action);
            let mut state = composer.generate().await;
            if state.input_error {
                anyhow::bail!("scene is required");
            }
            if copy {
                state = composer.copy_output();
            }
            if json {
                print_state(&state, true)
            } else {
                println!("{}", state.output);
                Ok(())
            }
        }
        Command::Enhance {
            scene,
            action,
            json,
        } => {
            composer.set_scene(&scene);
            composer.set_action(&action);
            let state = composer.enhance().await;
            if state.input_error {
                anyhow::bail!("scene or action is required");
            }
            print_state(&state, json)
        }
        Command::Idea { json } => {
            let state = composer.brainstorm().await;
            print_state(&state, json)
        }
        Command::Analyze { image, json } => {
            let upload = ImageUpload::from_path(&image).await?;
            let state = composer.submit_image(upload).await?;
            print_state(&state, json)
        }
    }
}

async fn submit_image_from_path<G, C>(composer: &Composer<G, C>, path: &Path) -> Result<SessionState, ComposerError>
where
    G: GenerationGateway,
    C: ClipboardSink,
{
    let upload = ImageUpload::from_path(path).await?;
    composer.submit_image(upload).await
}

fn spawn_operation<G, C, F, Fut>(composer: &Composer<G, C>, label: &'static str, run: F)
where
    G: GenerationGateway,
    C: ClipboardSink,
    F: FnOnce(Composer<G, C>) -> Fut,
    Fut: std::future::Future<Output = SessionState> + Send + 'static,
{
    println!("{label}...");
    let future = run(composer.clone());
    tokio::spawn(async move {
        let state = future.await;
        println!("\n[{label} finished]\n{}", render_state(&state));
    });
}

pub async fn run_session<G, C>(composer: Composer<G, C>) -> Result<()>
where
    G: GenerationGateway,
    C: ClipboardSink,
{
    info!("Interactive session started");
    println!("{SESSION_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_session_command(&line) else {
            continue;
        };
        match command {
            SessionCommand::Scene(text) => {
                composer.set_scene(&text);
            }
            SessionCommand::Action(text) => {
                composer.set_action(&text);
            }
            SessionCommand::Image(path) => {
                println!("analyzing {}...", path.display());
                let composer = composer.clone();
                tokio::spawn(async move {
                    match submit_image_from_path(&composer, &path).await {
                        Ok(state) => println!("\n[analysis finished]\n{}", render_state(&state)),
                        Err(err) => {
                            error!("Image upload rejected: {}", err);
                            println!("\n{err}");
                        }
                    }
                });
            }
            SessionCommand::ClearImage => {
                composer.clear_image();
            }
            SessionCommand::Enhance => {
                spawn_operation(&composer, "enhance", |composer| async move {
                    composer.enhance().await
                });
            }
            SessionCommand::Idea => {
                spawn_operation(&composer, "idea", |composer| async move {
                    composer.brainstorm().await
                });
            }
            SessionCommand::Generate => {
                spawn_operation(&composer, "generate", |composer| async move {
                    composer.generate().await
                });
            }
            SessionCommand::Copy => {
                let state = composer.copy_output();
                if state.copy_confirmed {
                    println!("copied {} chars", state.output_chars());
                } else if state.output.is_empty() {
                    println!("nothing to copy yet");
                }
            }
            SessionCommand::Reset => {
                composer.clear_all();
                println!("session cleared");
            }
            SessionCommand::Show => {
                let state = composer.snapshot();
                if state.is_initial() {
                    println!("(empty session)");
                } else {
                    println!("{}", render_state(&state));
                }
            }
            SessionCommand::Help => println!("{SESSION_HELP}"),
            SessionCommand::Quit => break,
            SessionCommand::Unknown(input) => println!("unknown command: {input}\n{SESSION_HELP}"),
        }
    }

    info!("Interactive session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ImagePreview, Operation};

    #[test]
    fn parses_field_commands_with_free_text() {
        assert_eq!(
            parse_session_command("scene   Rua chuvosa de Neo-Tokyo  "),
            Some(SessionCommand::Scene("Rua chuvosa de Neo-Tokyo".to_string()))
        );
        assert_eq!(
            parse_session_command("action"),
            Some(SessionCommand::Action(String::new()))
        );
        assert_eq!(
            parse_session_command("image ./refs/alley shot.png"),
            Some(SessionCommand::Image(PathBuf::from("./refs/alley shot.png")))
        );
    }

    #[test]
    fn blank_lines_are_skipped_and_aliases_resolve() {
        assert_eq!(parse_session_command("   "), None);
        assert_eq!(parse_session_command("GEN"), Some(SessionCommand::Generate));
        assert_eq!(parse_session_command("brainstorm"), Some(SessionCommand::Idea));
        assert_eq!(parse_session_command("exit"), Some(SessionCommand::Quit));
        assert_eq!(
            parse_session_command("image"),
            Some(SessionCommand::Unknown("image".to_string()))
        );
    }

    #[test]
    fn render_lists_busy_operations_and_preview() {
        let mut state = SessionState {
            scene: "fog".to_string(),
            output: "abc".to_string(),
            image_preview: Some(ImagePreview {
                data_url: "data:image/png;base64,AA==".to_string(),
                mime_type: "image/png".to_string(),
                file_name: Some("ref.png".to_string()),
                size_bytes: 1,
            }),
            ..SessionState::default()
        };
        state.busy.set(Operation::Generate, true);

        let rendered = render_state(&state);
        assert!(rendered.contains("SCENE:  fog"));
        assert!(rendered.contains("ACTION: (empty)"));
        assert!(rendered.contains("IMAGE:  ref.png (image/png, 1 bytes)"));
        assert!(rendered.contains("BUSY:   generate"));
        assert!(rendered.ends_with("OUTPUT (3 chars):\nabc"));
    }

    #[test]
    fn generate_subcommand_parses_flags() {
        let options = CliOptions::parse_from([
            "cinematic-composer",
            "generate",
            "--scene",
            "a rainy alley",
            "--copy",
        ]);
        assert_eq!(
            options.command,
            Some(Command::Generate {
                scene: "a rainy alley".to_string(),
                action: String::new(),
                copy: true,
                json: false,
            })
        );
    }
}
