use crate::catalog::{CatalogProvider, FileCatalog};
use crate::config::{Config, get_config_path, load_config, save_config};
use crate::errors::AurabotError;
use crate::gateway::MessageGateway;
use crate::llm::GeminiClient;
use crate::notify::{LineNotifier, NotificationChannel, NullNotifier};
use crate::orchestrator::{ConversationOrchestrator, InboundMessage};
use crate::store::FileStore;
use crate::utils::get_aurabot_home;
use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "aurabot")]
#[command(about = "WhatsApp ordering assistant for retail shops")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize aurabot configuration and a starter catalog
    Onboard,
    /// Talk to the assistant from the terminal
    Chat {
        #[arg(short, long)]
        message: Option<String>,
        /// Sender id the conversation is stored under
        #[arg(short, long, default_value = "console:default")]
        sender: String,
    },
    /// Show aurabot status
    Status,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            onboard()?;
        }
        Commands::Chat { message, sender } => {
            chat(message, sender).await?;
        }
        Commands::Status => {
            status().await?;
        }
    }

    Ok(())
}

fn onboard() -> Result<()> {
    println!("🌸 Initializing aurabot...");

    let config_path = get_config_path()?;
    if config_path.exists() {
        println!("⚠️  Config already exists at {}", config_path.display());
        println!("Overwrite? (y/N): ");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }

    let config = Config::default();
    save_config(&config, Some(config_path.as_path()))?;
    println!("✓ Created config at {}", config_path.display());

    let home = get_aurabot_home()?;
    create_starter_catalog(&home)?;

    println!("\n🌸 aurabot is ready!");
    println!("\nNext steps:");
    println!("  1. Add your Gemini API key to {}", config_path.display());
    println!("     Get one at: https://aistudio.google.com/apikey");
    println!("  2. Replace the starter catalog in {}", home.join("products.json").display());
    println!("  3. Chat: aurabot chat -m \"Hello!\"");

    Ok(())
}

/// Write a sample `products.json` so the first chat has something to sell.
/// Never overwrites an existing catalog.
fn create_starter_catalog(home: &Path) -> Result<()> {
    let path = home.join("products.json");
    if path.exists() {
        return Ok(());
    }
    let starter = r#"[
  {
    "id": "rose-dozen",
    "name": "Classic Rose Bouquet",
    "price": 1500,
    "imageUrl": "https://example.com/catalog/rose-dozen.jpg",
    "description": "A dozen red roses wrapped in kraft paper."
  },
  {
    "id": "tulip-mix",
    "name": "Mixed Tulips",
    "price": 990,
    "imageUrl": "https://example.com/catalog/tulip-mix.jpg",
    "description": "Ten tulips in seasonal colors."
  },
  {
    "id": "orchid-pot",
    "name": "Potted Orchid",
    "price": 1200,
    "imageUrl": "https://example.com/catalog/orchid-pot.jpg",
    "description": "A white phalaenopsis in a ceramic pot."
  }
]
"#;
    std::fs::write(&path, starter)?;
    println!("  Created products.json (starter catalog)");
    Ok(())
}

/// Prints outbound traffic to the terminal in place of the Cloud API.
struct ConsoleGateway;

#[async_trait]
impl MessageGateway for ConsoleGateway {
    async fn send_text(&self, _to: &str, text: &str) -> Result<String, AurabotError> {
        println!("\n🌸 {}\n", text);
        Ok("console".to_string())
    }

    async fn send_image_with_caption(
        &self,
        _to: &str,
        url: &str,
        caption: &str,
    ) -> Result<String, AurabotError> {
        println!("\n🌸 [image] {}\n   {}\n", url, caption);
        Ok("console".to_string())
    }

    async fn mark_read(&self, _message_id: &str) -> Result<(), AurabotError> {
        Ok(())
    }

    async fn send_typing_indicator(&self, _to: &str) -> Result<(), AurabotError> {
        Ok(())
    }
}

/// Wire the full engine over the on-disk store. The gateway is the only
/// part the caller chooses; everything else comes from the config.
fn build_engine(config: &Config, gateway: Arc<dyn MessageGateway>) -> Result<ConversationOrchestrator> {
    let home = get_aurabot_home()?;
    let store = Arc::new(FileStore::new(home.join("data"))?);
    let products_path = config
        .catalog
        .products_path
        .clone()
        .unwrap_or_else(|| home.join("products.json"));
    let catalog = Arc::new(FileCatalog::new(products_path));
    let notifier: Arc<dyn NotificationChannel> = if config.line.enabled {
        Arc::new(LineNotifier::new(&config.line))
    } else {
        Arc::new(NullNotifier)
    };
    let llm = Arc::new(GeminiClient::new(&config.llm));

    Ok(ConversationOrchestrator::new(
        config,
        store.clone(),
        store,
        catalog,
        gateway,
        notifier,
        llm,
    ))
}

async fn chat(message: Option<String>, sender: String) -> Result<()> {
    let config = load_config(None)?;

    if config.llm.gemini_api_key.is_empty() {
        anyhow::bail!(
            "llm.geminiApiKey is not set. Add it to {} first.",
            get_config_path()?.display()
        );
    }

    let engine = build_engine(&config, Arc::new(ConsoleGateway))?;

    if let Some(text) = message {
        engine
            .handle_message(InboundMessage {
                sender_id: sender,
                text,
                wa_message_id: None,
            })
            .await?;
    } else {
        println!("🌸 Interactive mode (Ctrl+C to exit)\n");
        loop {
            use std::io::{self, BufRead, Write};
            print!("You: ");
            io::stdout().flush()?;

            let stdin = io::stdin();
            let mut input = String::new();
            if stdin.lock().read_line(&mut input)? == 0 {
                break;
            }
            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            engine
                .handle_message(InboundMessage {
                    sender_id: sender.clone(),
                    text: input.to_string(),
                    wa_message_id: None,
                })
                .await?;
        }
    }

    Ok(())
}

async fn status() -> Result<()> {
    let config = load_config(None)?;
    let config_path = get_config_path()?;
    let home = get_aurabot_home()?;

    println!("🌸 aurabot status\n");

    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() {
            "✓"
        } else {
            "✗ (run 'aurabot onboard')"
        }
    );
    println!("Shop: {}", config.shop.name);
    println!("Model: {}", config.llm.model);
    println!(
        "Gemini API key: {}",
        if config.llm.gemini_api_key.is_empty() {
            "not set"
        } else {
            "✓"
        }
    );
    println!(
        "WhatsApp Cloud API: {}",
        if config.whatsapp.access_token.is_empty() || config.whatsapp.phone_number_id.is_empty() {
            "not configured"
        } else {
            "✓"
        }
    );
    println!(
        "LINE notifications: {}",
        if !config.line.enabled {
            "disabled"
        } else if config.line.channel_token.is_empty() || config.line.recipient_id.is_empty() {
            "enabled but not configured"
        } else {
            "✓ enabled"
        }
    );

    let products_path = config
        .catalog
        .products_path
        .clone()
        .unwrap_or_else(|| home.join("products.json"));
    match FileCatalog::new(products_path.clone()).list_available().await {
        Ok(products) => println!(
            "Catalog: {} available products ({})",
            products.len(),
            products_path.display()
        ),
        Err(e) => println!("Catalog: unreadable ({e:#})"),
    }

    let meta_dir = home.join("data").join("meta");
    let senders = match std::fs::read_dir(&meta_dir) {
        Ok(entries) => entries.filter_map(std::result::Result::ok).count(),
        Err(_) => 0,
    };
    println!("Known senders: {}", senders);

    Ok(())
}

#[cfg(test)]
mod tests;
