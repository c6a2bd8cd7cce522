use anyhow::Result;
use clap::Parser;
use idsentra::{
    commands::{self, RequestParams},
    config::ConfigOptions,
    logger::{
        ConsoleLogger, EmojiLogger, LogContext, LogSink, Logger, PlainFormat, StderrSink,
    },
    retry::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// idsentra - service toolkit
///
/// Inspect the environment configuration of a service and exercise JSON APIs
/// through the standard response envelope.
///
/// NODE_ENV selects the mode (development, production, test). RUST_LOG
/// controls diagnostic output.
///
/// Examples:
///   idsentra config --json
///   idsentra request GET /users/1 --base-url http://localhost:3000/api
#[derive(Parser, Debug)]
#[command(author, version = env!("IDSENTRA_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// .env file to load (defaults to ./.env; also via IDSENTRA_ENV_FILE)
    #[arg(
        long = "env-file",
        env = "IDSENTRA_ENV_FILE",
        value_name = "PATH",
        global = true
    )]
    pub env_file: Option<PathBuf>,

    /// Do not read any .env file
    #[arg(long = "no-dotenv", global = true)]
    pub no_dotenv: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the loaded configuration with secrets masked
    Config(ConfigArgs),

    /// Send a request and print the response envelope
    Request(RequestArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Print a JSON object instead of KEY=value lines
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, DELETE, ...)
    #[arg(value_name = "METHOD")]
    pub method: String,

    /// Path relative to the base URL
    #[arg(value_name = "PATH")]
    pub path: String,

    /// API base URL (also via IDSENTRA_BASE_URL)
    #[arg(long = "base-url", env = "IDSENTRA_BASE_URL", value_name = "URL")]
    pub base_url: String,

    /// JSON request body
    #[arg(long, short = 'd', value_name = "JSON")]
    pub data: Option<String>,

    /// Extra header, repeatable
    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Per-request timeout in milliseconds
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Retries for transient failures
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub retries: u32,

    /// Delay before the first retry, in milliseconds
    #[arg(
        long = "initial-delay-ms",
        value_name = "MS",
        default_value_t = DEFAULT_INITIAL_DELAY.as_millis() as u64
    )]
    pub initial_delay_ms: u64,

    /// Decorate log lines with emoji markers
    #[arg(long)]
    pub emoji: bool,
}

impl From<RequestArgs> for RequestParams {
    fn from(args: RequestArgs) -> Self {
        RequestParams {
            method: args.method,
            path: args.path,
            base_url: args.base_url,
            data: args.data,
            headers: args.headers,
            timeout: args.timeout_ms.map(Duration::from_millis),
            retries: args.retries,
            initial_delay: Duration::from_millis(args.initial_delay_ms),
        }
    }
}

/// Log lines go to stderr so stdout carries only command output.
fn console_logger(emoji: bool) -> Arc<dyn Logger> {
    let sink: Arc<dyn LogSink> = Arc::new(StderrSink);
    if emoji {
        Arc::new(EmojiLogger::default().with_sink(sink))
    } else {
        Arc::new(ConsoleLogger::<PlainFormat>::new(LogContext::new()).with_sink(sink))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = idsentra::runtime::RealRuntime;

    let options = ConfigOptions {
        env_path: cli.env_file,
        load_dot_env: !cli.no_dotenv,
        ..ConfigOptions::default()
    };

    match cli.command {
        Commands::Config(args) => {
            let logger = console_logger(false);
            commands::config(&runtime, logger.as_ref(), &options, args.json)?
        }
        Commands::Request(args) => {
            let logger = console_logger(args.emoji);
            let response = commands::request(&args.into(), logger).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_config_parsing() {
        let cli = Cli::try_parse_from(["idsentra", "config", "--json"]).unwrap();
        match cli.command {
            Commands::Config(args) => assert!(args.json),
            _ => panic!("Expected Config command"),
        }
        assert_eq!(cli.env_file, None);
        assert!(!cli.no_dotenv);
    }

    #[test]
    fn test_cli_global_env_file_parsing() {
        let cli = Cli::try_parse_from([
            "idsentra",
            "--env-file",
            "/tmp/app.env",
            "config",
            "--no-dotenv",
        ])
        .unwrap();
        assert_eq!(cli.env_file, Some(PathBuf::from("/tmp/app.env")));
        assert!(cli.no_dotenv);
    }

    #[test]
    fn test_cli_request_parsing() {
        let cli = Cli::try_parse_from([
            "idsentra",
            "request",
            "POST",
            "/users",
            "--base-url",
            "http://localhost:3000/api",
            "--data",
            r#"{"name":"Ada"}"#,
            "-H",
            "X-One: 1",
            "--header",
            "X-Two: 2",
            "--timeout-ms",
            "2500",
            "--retries",
            "1",
        ])
        .unwrap();

        match cli.command {
            Commands::Request(args) => {
                assert_eq!(args.method, "POST");
                assert_eq!(args.headers, vec!["X-One: 1", "X-Two: 2"]);
                assert!(!args.emoji);

                let params = RequestParams::from(args);
                assert_eq!(params.timeout, Some(Duration::from_millis(2500)));
                assert_eq!(params.retries, 1);
                assert_eq!(params.initial_delay, Duration::from_millis(1000));
                assert_eq!(params.data.as_deref(), Some(r#"{"name":"Ada"}"#));
            }
            _ => panic!("Expected Request command"),
        }
    }

    #[test]
    fn test_cli_request_defaults() {
        let cli = Cli::try_parse_from([
            "idsentra",
            "request",
            "GET",
            "/health",
            "--base-url",
            "http://localhost",
        ])
        .unwrap();
        match cli.command {
            Commands::Request(args) => {
                assert_eq!(args.retries, 3);
                assert_eq!(args.initial_delay_ms, 1000);
                assert_eq!(args.timeout_ms, None);
            }
            _ => panic!("Expected Request command"),
        }
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["idsentra"]).is_err());
    }
}
