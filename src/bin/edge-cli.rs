use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;

use edge_router::config::loader::load_config;
use edge_router::playground::PlaygroundRequest;
use edge_router::rules::RedirectRule;

#[derive(Parser)]
#[command(name = "edge-cli")]
#[command(about = "Management CLI for the edge router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check edge system status
    Status,
    /// Show cached environment snapshots
    Cache,
    /// Drop cached snapshots (one environment, or all)
    Invalidate {
        env_id: Option<String>,
    },
    /// Evaluate a rules file against an address
    Try {
        #[arg(short, long)]
        address: String,
        /// TOML file with `[[redirects]]` tables
        #[arg(short, long)]
        rules: PathBuf,
    },
    /// Load and validate a configuration file locally
    Check {
        config: PathBuf,
    },
}

#[derive(Deserialize)]
struct RulesFile {
    #[serde(default)]
    redirects: Vec<RedirectRule>,
    api_prefix: Option<String>,
    api_location: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Check { config } => return check(&config),
        Commands::Status => {
            client.get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Cache => {
            client.get(format!("{}/admin/cache", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Invalidate { env_id } => {
            let endpoint = match env_id {
                Some(env_id) => format!("{}/admin/invalidate/{}", cli.url, env_id),
                None => format!("{}/admin/invalidate", cli.url),
            };
            client.post(endpoint).headers(headers).send().await?
        }
        Commands::Try { address, rules } => {
            let file: RulesFile = toml::from_str(&std::fs::read_to_string(&rules)?)?;
            let request = PlaygroundRequest {
                address,
                redirects: file.redirects,
                api_prefix: file.api_prefix,
                api_location: file.api_location,
            };
            client.post(format!("{}/admin/playground", cli.url))
                .headers(headers)
                .json(&request)
                .send()
                .await?
        }
    };

    print_response(res).await
}

fn check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match load_config(path) {
        Ok(config) => {
            let environments: usize = config.sites.iter().map(|s| s.environments.len()).sum();
            let rules: usize = config
                .sites
                .iter()
                .flat_map(|s| &s.environments)
                .map(|e| e.redirects.len())
                .sum();
            println!(
                "{}: OK ({} sites, {} environments, {} rules)",
                path.display(),
                config.sites.len(),
                environments,
                rules
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
