mod daemon;
mod hotkey;
mod instance;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use paste_helper_core::{
    init, ArboardClipboard, ClipboardAccess, ConfigPatch, ConfigStore, PasteHelper,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send clipboard content to an LLM with one hotkey", long_about = None)]
struct Args {
    /// Use this config file instead of the platform default.
    /// OPENROUTER_API_KEY still fills an empty API key.
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for the global hotkey and show the popup (default)
    Daemon,

    /// Send the current clipboard content once and print the answer
    Ask {
        /// Prompt to send along with the clipboard content
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,

        /// Use a preset prompt by name instead
        #[arg(short, long, conflicts_with = "prompt")]
        preset: Option<String>,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,

        /// Copy the result to clipboard automatically
        #[arg(short, long, default_value_t = false)]
        copy: bool,
    },

    /// Show or update settings
    Config {
        #[arg(long)]
        api_key: Option<String>,

        /// Second hotkey modifier: Shift, Alt or Super
        #[arg(long)]
        modifier: Option<String>,

        /// Hotkey letter or digit
        #[arg(long)]
        key: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// Comma-separated provider order, e.g. Google,Vertex
        #[arg(long, value_delimiter = ',')]
        providers: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let store = match args.config_file {
        Some(path) => ConfigStore::at(path).with_env_fallback(),
        None => ConfigStore::open_default(),
    };

    match args.command.unwrap_or(Command::Daemon) {
        Command::Daemon => daemon::run(store),
        Command::Ask {
            prompt,
            preset,
            model,
            copy,
        } => ask(store, prompt, preset, model, copy).await,
        Command::Config {
            api_key,
            modifier,
            key,
            model,
            providers,
        } => configure(
            store,
            ConfigPatch {
                api_key,
                hotkey_modifier: modifier,
                hotkey_key: key,
                model,
                provider_order: providers,
                preset_prompts: None,
            },
        ),
    }
}

async fn ask(
    store: ConfigStore,
    prompt: Vec<String>,
    preset: Option<String>,
    model: Option<String>,
    copy: bool,
) -> Result<()> {
    let app = PasteHelper::with_store(store).context("Failed to initialize")?;

    let mut config = app.config();
    if let Some(m) = model {
        config.model = m;
    }

    let prompt = match preset {
        Some(name) => match config.preset_by_name(&name) {
            Some(p) => p.prompt.clone(),
            None => {
                let names: Vec<_> = config.preset_prompts.iter().map(|p| p.name.as_str()).collect();
                bail!("Unknown preset '{}'. Available: {}", name, names.join(", "));
            }
        },
        None => prompt.join(" "),
    };

    let Some(content) = app.capture_clipboard() else {
        bail!("Clipboard is empty or holds nothing usable");
    };
    eprintln!("Sending {} ...", content.describe());

    let answer = match app.ask_with(&config, &content, &prompt).await {
        Ok(text) => text,
        Err(e) => bail!("{}", e.user_message()),
    };
    println!("{}", answer);

    if copy {
        ArboardClipboard
            .set_text(&answer)
            .context("Failed to copy to clipboard")?;
        eprintln!("(Copied to clipboard)");
    }
    Ok(())
}

fn configure(store: ConfigStore, patch: ConfigPatch) -> Result<()> {
    let config = if patch.is_empty() {
        store.get()
    } else {
        let update = store.set(patch).context("Failed to save settings")?;
        if update.hotkey_changed {
            eprintln!("Hotkey changed; restart the daemon to apply it.");
        }
        update.config
    };

    match store.path() {
        Some(path) => eprintln!("Config file: {}", path.display()),
        None => eprintln!("Config file: (unavailable)"),
    }
    let shown = config
        .redacted()
        .to_pretty_json()
        .context("Failed to format settings")?;
    println!("{}", shown);
    Ok(())
}
