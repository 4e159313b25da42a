use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ai_hub::config::{default_path, Config};
use ai_hub::credentials::{mask_key, Credentials, FileKeyStore, Service};
use ai_hub::gemini::GeminiClient;
use ai_hub::generation::{ChatTurn, Engine, ResultKind};
use ai_hub::image::{decode_image, ImageGenerator, DEFAULT_ASPECT_RATIO};
use ai_hub::media::{mime_for_path, DataUri};
use ai_hub::providers::SearchKind;
use ai_hub::transport::HttpTransport;
use ai_hub::{ChatClient, Dispatcher, GenerationError, TokioSleeper};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;

/// ai-hub: one command line for several hosted media generators
#[derive(Parser)]
#[command(name = "ai-hub")]
#[command(version, about = "Generate videos, images, scripts and chat replies from hosted AI services")]
#[command(after_help = "EXAMPLES:
    # Text-to-video with Grok
    ai-hub video --engine grok \"neon city at night\"

    # Animate a still image
    ai-hub video --engine kling --image photo.png

    # Write a script instead of rendering
    ai-hub video --engine qwen \"heist in a rainy city\"

    # Generate a wide image
    ai-hub image \"mountain lake at dawn\" --aspect-ratio 16:9 -o lake.png

    # Chat interactively
    ai-hub chat")]
struct Cli {
    /// Path to a config file (default: <config dir>/ai-hub/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant, streaming the reply
    ///
    /// Without a message, starts an interactive session that keeps history.
    Chat {
        /// Message to send; omit for an interactive session
        message: Option<String>,
    },

    /// Generate a still image
    Image {
        /// What the image should show
        prompt: String,

        /// One of 1:1, 16:9, 9:16, 4:3, 3:4
        #[arg(long, short = 'a', default_value = DEFAULT_ASPECT_RATIO)]
        aspect_ratio: String,

        /// Write the image here instead of printing a data URI
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Generate a video (or a script, with the qwen engine)
    #[command(after_help = "ENGINES:
    grok         text-to-video (fal.ai)
    wan-video    image-to-video (fal.ai), needs --image
    kling        image-to-video (Vyro), needs --image
    imagine-art  image-to-video (Vyro), needs --image
    veo          text or image to video (Gemini), saved locally
    qwen         cinematic script (OpenRouter, then Gemini)
    stock        first matching Pexels clip")]
    Video {
        /// Backend to use
        #[arg(long, short = 'e', value_enum)]
        engine: Engine,

        /// Prompt; image-driven engines fall back to a default motion prompt
        #[arg(default_value = "")]
        prompt: String,

        /// Reference image file
        #[arg(long, short = 'i')]
        image: Option<PathBuf>,
    },

    /// Browse Pexels stock photos or videos
    Search {
        query: String,

        #[arg(long, short = 'k', value_enum, default_value = "videos")]
        kind: SearchKind,

        #[arg(long, default_value_t = 5)]
        per_page: u32,
    },

    /// Manage API key overrides
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Store a key override, used instead of the environment default
    Set {
        #[arg(value_enum)]
        service: Service,
        key: String,
    },
    /// Show which services have a key (masked)
    Show,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Load .env file
///
/// Does not override existing environment variables.
fn load_env() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

fn load_config(path: Option<&Path>) -> Result<Config, String> {
    Config::load(path).map_err(|e| e.to_string())
}

fn load_credentials(config: &Config) -> Result<Credentials, String> {
    let store = FileKeyStore::open(config.storage.keys_file()).map_err(|e| e.to_string())?;
    Ok(Credentials::from_env(Arc::new(store)))
}

fn gemini_client(config: &Config, credentials: Credentials) -> Result<GeminiClient, String> {
    let transport = HttpTransport::new().map_err(|e| e.to_string())?;
    Ok(GeminiClient::new(transport, credentials, config.endpoints.gemini.clone()))
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create async runtime: {}", e))
}

/// Human-readable error, with a hint when the account ran out of credit.
fn describe(error: &GenerationError, engine: Option<Engine>) -> String {
    match (error, engine) {
        (GenerationError::QuotaExhausted { .. }, Some(engine)) => {
            let others: Vec<&str> = Engine::ALL
                .iter()
                .filter(|e| **e != engine)
                .map(Engine::as_str)
                .collect();
            format!(
                "{}\n\nThe {} account is out of credit. Try another engine: {}",
                error,
                engine,
                others.join(", ")
            )
        }
        _ => error.to_string(),
    }
}

fn read_image(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Failed to read image '{}': {}", path.display(), e))?;
    Ok(DataUri::encode(mime_for_path(path), &bytes))
}

fn run_video(
    config: &Config,
    engine: Engine,
    prompt: &str,
    image: Option<&Path>,
) -> Result<(), String> {
    let reference_image = image.map(read_image).transpose()?;
    let credentials = load_credentials(config)?;
    let dispatcher = Dispatcher::new(config, credentials, Arc::new(TokioSleeper))
        .map_err(|e| e.to_string())?;

    let rt = runtime()?;
    let result = rt
        .block_on(dispatcher.generate(engine, prompt, reference_image))
        .map_err(|e| describe(&e, Some(engine)))?;

    match result.kind() {
        ResultKind::Text => println!("{}", result.payload()),
        ResultKind::MediaUrl => println!("Video ready: {}", result.payload()),
        ResultKind::BlobUrl => println!("Video saved: {}", result.payload()),
    }
    Ok(())
}

fn run_image(
    config: &Config,
    prompt: &str,
    aspect_ratio: &str,
    output: Option<&Path>,
) -> Result<(), String> {
    let credentials = load_credentials(config)?;
    let generator = ImageGenerator::new(
        gemini_client(config, credentials)?,
        config.models.image.clone(),
    );

    let rt = runtime()?;
    let result = rt
        .block_on(generator.generate_image(prompt, aspect_ratio))
        .map_err(|e| describe(&e, None))?;

    match output {
        Some(path) => {
            let image = decode_image(&result).map_err(|e| e.to_string())?;
            std::fs::write(path, &image.bytes)
                .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
            println!("Image saved: {} ({} bytes)", path.display(), image.bytes.len());
        }
        None => println!("{}", result.payload()),
    }
    Ok(())
}

async fn stream_reply(
    client: &ChatClient,
    message: &str,
    history: &[ChatTurn],
) -> Result<String, GenerationError> {
    let mut stream = client.chat_stream(message, history).await?;
    let mut reply = String::new();
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        print!("{}", fragment);
        stdout.flush().ok();
        reply.push_str(&fragment);
    }
    println!();
    Ok(reply)
}

fn run_chat(config: &Config, message: Option<&str>) -> Result<(), String> {
    let credentials = load_credentials(config)?;
    let client = ChatClient::new(gemini_client(config, credentials)?, config.models.chat.clone());
    let rt = runtime()?;

    if let Some(message) = message {
        rt.block_on(stream_reply(&client, message, &[]))
            .map_err(|e| describe(&e, None))?;
        return Ok(());
    }

    println!("Interactive chat. Empty line or Ctrl-D to quit.");
    let mut history: Vec<ChatTurn> = Vec::new();
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("Failed to read input: {}", e))?;
        let line = line.trim();
        if read == 0 || line.is_empty() {
            break;
        }

        match rt.block_on(stream_reply(&client, line, &history)) {
            Ok(reply) => {
                history.push(ChatTurn::user(line));
                history.push(ChatTurn::model(reply));
            }
            Err(e) => eprintln!("Error: {}", describe(&e, None)),
        }
    }
    Ok(())
}

fn run_search(config: &Config, query: &str, kind: SearchKind, per_page: u32) -> Result<(), String> {
    let credentials = load_credentials(config)?;
    let dispatcher = Dispatcher::new(config, credentials, Arc::new(TokioSleeper))
        .map_err(|e| e.to_string())?;

    let rt = runtime()?;
    let results = rt
        .block_on(dispatcher.search_stock(query, kind, per_page))
        .map_err(|e| describe(&e, None))?;

    match kind {
        SearchKind::Videos => {
            if results.videos.is_empty() {
                println!("No videos found for \"{}\"", query);
            }
            for video in &results.videos {
                println!(
                    "{:>10}  {:>4}s  {:<20}  {}",
                    video.id,
                    video.duration_secs,
                    video.author,
                    video.link.as_deref().unwrap_or("(no playable file)")
                );
            }
        }
        SearchKind::Photos => {
            if results.photos.is_empty() {
                println!("No photos found for \"{}\"", query);
            }
            for photo in &results.photos {
                println!("{:>10}  {:<20}  {}", photo.id, photo.photographer, photo.original);
            }
        }
    }
    Ok(())
}

fn run_keys(config: &Config, action: KeysAction) -> Result<(), String> {
    let credentials = load_credentials(config)?;
    match action {
        KeysAction::Set { service, key } => {
            credentials
                .set_key(service, key.trim())
                .map_err(|e| e.to_string())?;
            println!("Saved {} key to {}", service, config.storage.keys_file().display());
        }
        KeysAction::Show => {
            for service in Service::ALL {
                let status = if credentials.has_key(service) {
                    mask_key(&credentials.get_key(service))
                } else {
                    format!("(not set, export {})", service.env_var())
                };
                println!("{:<12} {}", service.as_str(), status);
            }
        }
    }
    Ok(())
}

fn run_config(config: &Config, path: Option<&Path>, action: ConfigAction) -> Result<(), String> {
    let content = config.to_toml().map_err(|e| e.to_string())?;
    match action {
        ConfigAction::Show => print!("{}", content),
        ConfigAction::Init { force } => {
            let path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
            if path.exists() && !force {
                return Err(format!(
                    "Config file already exists: {} (use --force to overwrite)",
                    path.display()
                ));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
            }
            std::fs::write(&path, content)
                .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn main() {
    // Load .env file before anything else
    load_env();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Chat { message } => run_chat(&config, message.as_deref()),
        Commands::Image {
            prompt,
            aspect_ratio,
            output,
        } => run_image(&config, &prompt, &aspect_ratio, output.as_deref()),
        Commands::Video {
            engine,
            prompt,
            image,
        } => run_video(&config, engine, &prompt, image.as_deref()),
        Commands::Search {
            query,
            kind,
            per_page,
        } => run_search(&config, &query, kind, per_page),
        Commands::Keys { action } => run_keys(&config, action),
        Commands::Config { action } => run_config(&config, config_path, action),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
