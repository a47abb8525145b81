//! Medshell CLI
//!
//! Command-line access to the clinical backend with the same session
//! storage as the desktop shell:
//! - Log in and out
//! - List patients and their data
//! - Interpret recommendations
//! - Send raw API requests

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use medshell::api::{ApiClient, ClientError, DataWindow, Method, PendingRequest};
use medshell::config::Config;
use medshell::storage::{LocalStorage, TokenStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "medshell-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the clinical dashboard backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backend origin (overrides config)
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and remember the token until `logout`
    Login {
        username: String,
        /// Password (read from stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored token
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List patients
    Patients,

    /// Show one patient
    Patient { id: i64 },

    /// Glucose, carbs and insulin of a patient
    Data {
        id: i64,
        /// Window start (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Window end (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Stored recommendations of a patient
    Recommendations { id: i64 },

    /// Parse free-text therapy advice
    Interpret {
        /// Recommendation text
        text: Vec<String>,
    },

    /// Send a raw request
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// Path, e.g. /api/patients/
        path: String,
        /// JSON body for POST/PUT/PATCH
        #[arg(short, long, default_value = "")]
        body: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(origin) = cli.origin.clone() {
        config.backend.origin = origin;
    }
    medshell::logging::init(&config.logging);

    let tokens = Arc::new(TokenStore::new(LocalStorage::open(&config.storage.data_dir)));
    let client = ApiClient::new(&config.backend.origin, tokens, &config.client)?;
    let json = cli.format == "json";

    if let Err(e) = run(cli.command, &client, json).await {
        match e.downcast_ref::<ClientError>() {
            Some(err @ ClientError::Network { .. }) => {
                eprintln!("{}", err.user_message());
                eprintln!();
                eprintln!("Make sure the backend is running at {}", client.origin());
            }
            Some(err) => eprintln!("{}", err.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, client: &ApiClient, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            let token = client.login(&username, &password).await?;
            // Each command is its own process, so only the durable tier is useful here
            client.tokens().save(token, true)?;
            println!("Logged in as {}", username);
        }

        Commands::Logout => {
            client.tokens().clear()?;
            println!("Logged out");
        }

        Commands::Whoami => {
            let user = client.current_user().await?;
            if json {
                print_json(&user)?;
            } else {
                println!("{}", user.display_name());
                if let Some(id) = user.id {
                    println!("  id: {}", id);
                }
            }
        }

        Commands::Patients => {
            let patients = client.patients().await?;
            if json {
                print_json(&patients)?;
            } else if patients.is_empty() {
                println!("No patients.");
            } else {
                println!("{:<6} {:<30} {:<12}", "ID", "Name", "Born");
                println!("{}", "-".repeat(50));
                for p in patients {
                    println!(
                        "{:<6} {:<30} {:<12}",
                        p.id,
                        p.full_name,
                        p.date_of_birth
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
            }
        }

        Commands::Patient { id } => {
            let patient = client.patient(id).await?;
            if json {
                print_json(&patient)?;
            } else {
                println!("{} (#{})", patient.full_name, patient.id);
                if let Some(dob) = patient.date_of_birth {
                    println!("  Born: {}", dob);
                }
                if let Some(contact) = &patient.contact_info {
                    println!("  Contact: {}", contact);
                }
                if let Some(doctor) = patient.doctor_id {
                    println!("  Doctor: #{}", doctor);
                }
            }
        }

        Commands::Data { id, start, end } => {
            let data = client
                .comprehensive_data(id, DataWindow::new(start, end))
                .await?;
            if json {
                print_json(&data)?;
            } else {
                println!("Glucose:  {} records", count(&data.glucose));
                println!("Carbs:    {} records", count(&data.carbs));
                println!("Insulin:  {} records", count(&data.insulin));
            }
        }

        Commands::Recommendations { id } => {
            let recommendations = client.recommendations(id).await?;
            if json {
                print_json(&recommendations)?;
            } else if recommendations.is_empty() {
                println!("No recommendations.");
            } else {
                for (i, r) in recommendations.iter().enumerate() {
                    println!("{:>3}. {}", i + 1, r);
                }
            }
        }

        Commands::Interpret { text } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                anyhow::bail!("Nothing to interpret");
            }
            let result = client.interpret(&text).await?;
            if result.is_empty() && !json {
                println!("No changes recognised.");
            } else {
                print_json(&result)?;
            }
        }

        Commands::Request { method, path, body } => {
            let method: Method = method.parse()?;
            let request = PendingRequest::from_raw(method, &path, &body)?;
            let response = client.send(&request).await?;
            print_json(&response)?;
        }

        Commands::Config { output } => {
            let config = medshell::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn count(value: &serde_json::Value) -> usize {
    value.as_array().map(Vec::len).unwrap_or(0)
}
