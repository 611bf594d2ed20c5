//! `parley chat`: interactive or single-message conversation.

use parley_agent::{ConversationService, Orchestrator, ServiceSettings, parse_command};
use parley_config::AppConfig;
use parley_core::message::{ConversationId, Role};
use parley_core::store::ConversationStore;
use parley_memory::InMemoryStore;
use parley_providers::{OpenAiCompatProvider, ResilientInvoker};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

pub struct ChatOptions {
    pub message: Option<String>,
    pub model: Option<String>,
    pub system: Option<String>,
}

/// Wire the engine from configuration. Conversations live in memory only.
fn build_service(config: &AppConfig) -> Result<ConversationService, Box<dyn std::error::Error>> {
    let provider = Arc::new(OpenAiCompatProvider::from_config(config)?);
    let invoker = ResilientInvoker::new(provider, config.retry.timeouts());
    let tools = Arc::new(parley_tools::default_registry(&config.tools));
    let store: Arc<dyn ConversationStore> = Arc::new(InMemoryStore::new());

    let orchestrator = Orchestrator::from_config(config, invoker, tools, store.clone());
    Ok(ConversationService::new(
        store,
        Arc::new(orchestrator),
        ServiceSettings::from_config(config),
    ))
}

pub async fn run(options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY = 'sk-or-v1-...'   (recommended)");
        eprintln!("    PARLEY_API_KEY     = '...'            (any OpenAI-compatible endpoint)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let service = build_service(&config)?;
    let model = options.model.unwrap_or_else(|| config.models.chat.clone());
    let summary_model = config.models.summary.clone();
    // `/summary` goes to the dedicated summary model.
    let model_for = |input: &str| -> String {
        match parse_command(input).command.as_deref() {
            Some("summary") => summary_model.clone(),
            _ => model.clone(),
        }
    };
    let conversation = service
        .create_conversation("cli", options.system.unwrap_or_default())
        .await?;
    debug!(conversation = %conversation, model = %model, "Chat session ready");

    if let Some(message) = options.message {
        eprint!("  Thinking...");
        let result = service.send(&conversation, &message, &model_for(&message)).await;
        eprint!("\r              \r");
        let answer = result?;
        println!("{}", answer.content);
        service.wait_for_background().await;
        return Ok(());
    }

    println!();
    println!("  Parley interactive mode");
    println!();
    println!("  Model:     {model}");
    println!("  Summary:   {summary_model}");
    println!("  Fallback:  {}", config.models.fallback);
    println!(
        "  Tools:     {}",
        service_tool_summary(&config)
    );
    println!("  Router:    {}", if config.router.enabled { "on" } else { "off" });
    println!();
    println!("  Commands:  /summary [focus], /chat <text>, /meteo <city>, /heure");
    println!("             :memory shows the stored memory, :undo drops the last exchange");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            ":memory" => show_memory(&service, &conversation).await,
            ":undo" => undo(&service, &conversation).await,
            _ => {
                eprint!("  ...");
                let result = service.send(&conversation, input, &model_for(input)).await;
                eprint!("\r     \r");
                match result {
                    Ok(answer) => {
                        println!();
                        for line in answer.content.lines() {
                            println!("  Assistant > {line}");
                        }
                        println!();
                    }
                    Err(e) => {
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }
        }
        prompt()?;
    }

    service.wait_for_background().await;
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn service_tool_summary(config: &AppConfig) -> String {
    parley_tools::default_registry(&config.tools)
        .descriptors()
        .iter()
        .map(|d| match &d.slash_command {
            Some(slash) => format!("{} (/{slash})", d.name),
            None => d.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

async fn show_memory(service: &ConversationService, conversation: &ConversationId) {
    match service.store().memory(conversation).await {
        Ok(memory) if memory.is_empty() => println!("  (no memory yet)\n"),
        Ok(memory) => println!("  {memory}\n"),
        Err(e) => eprintln!("  [Error] {e}\n"),
    }
}

async fn undo(service: &ConversationService, conversation: &ConversationId) {
    let last = match service.store().turns(conversation).await {
        Ok(turns) => turns.into_iter().rev().find(|t| t.role == Role::User),
        Err(e) => {
            eprintln!("  [Error] {e}\n");
            return;
        }
    };

    match last {
        Some(turn) => match service.delete_turn(conversation, &turn.id).await {
            Ok(removed) => println!("  Removed {removed} turn(s).\n"),
            Err(e) => eprintln!("  [Error] {e}\n"),
        },
        None => println!("  Nothing to undo.\n"),
    }
}
