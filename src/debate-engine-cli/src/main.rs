//! A thin local driver for the debate engine.
//!
//! Builds one debate from command-line arguments, subscribes to its
//! event stream, prints progress to the console, and exports the final
//! transcript. Not a transport: there is no server here, just a direct
//! in-process consumer of the engine's public API.

use std::sync::Arc;

use clap::{ArgAction, Parser};
use colored::Colorize;
use debate_engine_core::{
    export, AgentConfig, AgentRole, Config, DebateConfig, DebateManager, DebateStatus,
    ExportFormat, ModelBinding, OpenAiGateway,
};

#[derive(Parser)]
#[command(
    name = "debate-engine",
    version,
    about = "Run a debate between AI agents and watch it unfold",
    long_about = "A command-line driver for the debate engine, using OpenAI-compatible APIs."
)]
struct Cli {
    /// The proposition to debate.
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Model names for debaters (specify once per debater, at least 2).
    #[arg(short, long, action = ArgAction::Append, value_name = "MODEL")]
    model: Vec<String>,

    /// Names for the debaters, in the same order as --model.
    #[arg(long, action = ArgAction::Append, value_name = "NAME")]
    name: Vec<String>,

    /// Stances for the debaters, in the same order as --model.
    #[arg(long, action = ArgAction::Append, value_name = "STANCE")]
    stance: Vec<String>,

    /// Number of debate rounds.
    #[arg(short, long, default_value = "3", value_name = "ROUNDS")]
    rounds: u32,

    /// Model to use as judge. Omit to skip the judging phase.
    #[arg(long, value_name = "MODEL")]
    judge_model: Option<String>,

    /// Path to a custom config.toml file.
    #[arg(long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Export format for the final transcript.
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    export: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else if std::path::Path::new("config.toml").exists() {
        Config::load("config.toml")?
    } else {
        debate_engine_core::config::default_config()
    };

    if cli.model.len() < 2 {
        eprintln!(
            "{} at least 2 --model values are required, got {}.",
            "Error:".red().bold(),
            cli.model.len()
        );
        std::process::exit(1);
    }

    let default_stances = ["Pro", "Con", "Neutral", "Neutral"];
    let agents: Vec<AgentConfig> = cli
        .model
        .iter()
        .enumerate()
        .map(|(i, model)| {
            let agent_id = format!("agent-{}", i);
            let name = cli
                .name
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Debater {}", i + 1));
            let stance = cli
                .stance
                .get(i)
                .cloned()
                .unwrap_or_else(|| default_stances[i % default_stances.len()].to_string());
            let system_prompt = config.render_debater_prompt(&name, &cli.topic, &stance);
            AgentConfig::new(agent_id, name, stance, AgentRole::Debater, ModelBinding::new("openai", model.clone()))
                .with_system_prompt(system_prompt)
        })
        .collect();

    let mut debate_config = DebateConfig::new(&cli.topic, cli.rounds.max(1), agents);
    if let Some(judge_model) = &cli.judge_model {
        let judge = AgentConfig::new(
            "judge",
            "Judge",
            "Neutral",
            AgentRole::Judge,
            ModelBinding::new("openai", judge_model.clone()),
        )
        .with_system_prompt(config.prompts.judge_prompt.clone());
        debate_config = debate_config.with_judge(judge);
    }

    println!();
    println!("{}", "=".repeat(70).bright_blue());
    println!("{}", format!("  Debate Engine — {}", cli.topic).bright_blue().bold());
    println!("{}", "=".repeat(70).bright_blue());
    println!();
    println!("{}", "Participants:".bold());
    for (i, agent) in debate_config.agents.iter().enumerate() {
        println!(
            "  {}. {} ({}) - using {}",
            i + 1,
            agent.name.bright_cyan(),
            agent.stance.yellow(),
            agent.binding.display().dimmed()
        );
    }
    println!();
    println!("{}", "-".repeat(70).dimmed());

    let manager = DebateManager::new(Arc::new(OpenAiGateway::new()));
    let debate_id = manager.create(debate_config).await?;
    let (_, mut subscription) = manager.subscribe(debate_id).await?;
    manager.start(debate_id).await?;

    for envelope in subscription.backlog.drain(..) {
        print_event(&envelope.event_type, &envelope.payload);
    }
    loop {
        let envelope = match subscription.receiver.recv().await {
            Ok(envelope) => envelope,
            Err(_) => break,
        };
        print_event(&envelope.event_type, &envelope.payload);
        if envelope.event_type == "debate_complete" || envelope.event_type == "error" {
            break;
        }
    }

    let final_state = manager.get(debate_id).await?;
    println!();
    println!("{}", "=".repeat(70).bright_blue());
    match final_state.status {
        DebateStatus::Completed => println!("{}", "  Debate concluded.".bright_green().bold()),
        DebateStatus::Failed => println!(
            "{} {}",
            "  Debate failed:".red().bold(),
            final_state.error_message.clone().unwrap_or_default()
        ),
        _ => {}
    }
    println!("{}", "=".repeat(70).bright_blue());

    let format = ExportFormat::parse(&cli.export)?;
    let rendered = export(&final_state, format)?;
    println!();
    println!("{}", String::from_utf8_lossy(&rendered));

    Ok(())
}

fn print_event(event_type: &str, payload: &serde_json::Value) {
    match event_type {
        "connection_established" => {
            println!(
                "{} status={} round={} turn={} messages={}",
                "Connected:".dimmed(),
                payload["status"].as_str().unwrap_or("?"),
                payload["current_round"],
                payload["current_turn"],
                payload["message_count"]
            );
        }
        "round_started" => {
            println!();
            println!(
                "{} {}",
                "▶ Round".bright_magenta().bold(),
                payload["round_number"]
            );
        }
        "agent_thinking" => {
            println!(
                "  {} {} is thinking...",
                "…".dimmed(),
                payload["agent_name"].as_str().unwrap_or("").bright_cyan()
            );
        }
        "message_received" => {
            let name = payload["agent_name"].as_str().unwrap_or("");
            let content = payload["content"].as_str().unwrap_or("");
            println!("  {} {}:", "●".bright_cyan(), name.bright_cyan().bold());
            for line in wrap(content, 66).lines() {
                println!("    {}", line);
            }
        }
        "judging_started" => {
            println!();
            println!("{}", "  The judge is deliberating...".yellow());
        }
        "judge_result" => {
            println!();
            println!(
                "{} {}",
                "Winner:".bold(),
                payload["winner_name"].as_str().unwrap_or("").bright_green().bold()
            );
        }
        "error" => {
            println!(
                "{} {}",
                "Error:".red().bold(),
                payload["error_message"].as_str().unwrap_or("")
            );
        }
        _ => {}
    }
}

/// Simple word-wrapping for console output.
fn wrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
