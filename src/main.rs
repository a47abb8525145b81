//! Medshell
//!
//! Runs the desktop shell headless: the backend is started and supervised
//! as usual, and the login and dashboard views are driven from the terminal.
//!
//! Run with: cargo run --bin medshell -- --config config.toml

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use medshell::api::DataWindow;
use medshell::bridge::{DashboardBridge, LoginBridge, ViewHost};
use medshell::config::Config;
use medshell::shell::{Shell, ViewFactory};
use medshell::views::{render_console, DashboardController, LoginController, StatusLine};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;

#[derive(Parser)]
#[command(name = "medshell")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Clinical dashboard shell (terminal views)")]
struct Args {
    /// Config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend origin, e.g. http://127.0.0.1:8000
    #[arg(long)]
    origin: Option<String>,

    /// Do not start the backend; expect it to be running already
    #[arg(long)]
    external: bool,
}

/// View currently shown in the terminal
enum Screen {
    Login(Arc<LoginController>),
    Dashboard(Arc<DashboardController>),
}

/// Renders views as text and routes typed commands to the current one
struct ConsoleHost {
    factory: ViewFactory,
    screen: Mutex<Option<Screen>>,
}

impl ConsoleHost {
    fn new(factory: ViewFactory) -> Self {
        Self {
            factory,
            screen: Mutex::new(None),
        }
    }

    fn show(&self, screen: Screen) {
        *self.screen.lock().unwrap_or_else(|e| e.into_inner()) = Some(screen);
    }

    fn current(&self) -> Option<Screen> {
        match &*self.screen.lock().unwrap_or_else(|e| e.into_inner()) {
            Some(Screen::Login(c)) => Some(Screen::Login(Arc::clone(c))),
            Some(Screen::Dashboard(c)) => Some(Screen::Dashboard(Arc::clone(c))),
            None => None,
        }
    }

    /// Read commands until `quit` or end of input
    async fn run_input(self: Arc<Self>, stop: oneshot::Sender<()>) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read input");
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "quit" || line == "exit" {
                break;
            }
            if line == "help" {
                print_help();
                continue;
            }

            match self.current() {
                Some(Screen::Login(controller)) => login_command(&controller, line).await,
                Some(Screen::Dashboard(controller)) => dashboard_command(&controller, line).await,
                None => println!("No view loaded yet"),
            }
        }
        let _ = stop.send(());
    }
}

impl ViewHost for ConsoleHost {
    fn open_login(&self, bridge: LoginBridge) {
        let controller = match self.factory.login(bridge) {
            Ok(controller) => controller,
            Err(e) => {
                tracing::error!(error = %e, "Cannot create login view");
                return;
            }
        };
        if let Err(e) = controller.attach() {
            tracing::error!(error = %e, "Cannot attach login view");
        }
        watch_status("login", controller.status());

        println!();
        println!("== Login ==");
        println!("  login <username> <password> [--remember]");
        self.show(Screen::Login(controller));
    }

    fn open_dashboard(&self, bridge: DashboardBridge) {
        let controller = match self.factory.dashboard(bridge) {
            Ok(controller) => controller,
            Err(e) => {
                tracing::error!(error = %e, "Cannot create dashboard view");
                return;
            }
        };
        if let Err(e) = controller.attach() {
            tracing::error!(error = %e, "Cannot attach dashboard view");
        }
        watch_status("dashboard", controller.status());

        println!();
        println!("== Dashboard ==  (sidebar {}px)", controller.sidebar_width());
        println!("  patients | patient <id> [start] [end] | interpret <text>");
        println!("  request <METHOD> <path> [json] | width <px> | logout");
        self.show(Screen::Dashboard(controller));
    }
}

/// Print every status change of a view
fn watch_status(view: &'static str, status: &StatusLine) {
    let mut rx = status.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if let Some(message) = rx.borrow_and_update().clone() {
                println!("[{}] {}", view, message);
            }
        }
    });
}

async fn login_command(controller: &LoginController, line: &str) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["login", username, password, rest @ ..] => {
            let remember = rest.iter().any(|a| *a == "--remember" || *a == "-r");
            controller.submit(username, password, remember).await;
        }
        _ => println!("Usage: login <username> <password> [--remember]"),
    }
}

async fn dashboard_command(controller: &DashboardController, line: &str) {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "patients" => {
            if let Ok(patients) = controller.load_patients().await {
                if patients.is_empty() {
                    println!("No patients.");
                }
                for p in patients {
                    println!("{:>5}  {}", p.id, p.full_name);
                }
            }
        }
        "patient" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let Some(id) = args.first().and_then(|s| s.parse::<i64>().ok()) else {
                println!("Usage: patient <id> [start] [end]");
                return;
            };
            let window = match (parse_time(args.get(1)), parse_time(args.get(2))) {
                (Ok(start), Ok(end)) => DataWindow::new(start, end),
                _ => {
                    println!("Times must be RFC 3339, e.g. 2024-05-01T00:00:00Z");
                    return;
                }
            };
            if let Ok(overview) = controller.select_patient(id, window).await {
                if let Ok(json) = serde_json::to_string_pretty(&overview) {
                    println!("{}", json);
                }
            }
        }
        "interpret" => {
            if let Ok(result) = controller.interpret(rest).await {
                if let Ok(json) = serde_json::to_string_pretty(&result) {
                    println!("{}", json);
                }
            }
        }
        "request" => {
            let mut parts = rest.splitn(3, ' ');
            let method = parts.next().unwrap_or("");
            let path = parts.next().unwrap_or("");
            let body = parts.next().unwrap_or("");
            let result = controller.console(method, path, body).await;
            println!("{}", render_console(&result));
        }
        "width" => match rest.parse::<i64>() {
            Ok(px) => println!("Sidebar width: {}px", controller.set_sidebar_width(px)),
            Err(_) => println!("Sidebar width: {}px", controller.sidebar_width()),
        },
        "logout" => {
            if let Err(e) = controller.logout() {
                println!("Logout failed: {}", e);
            }
        }
        _ => print_help(),
    }
}

fn parse_time(arg: Option<&&str>) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    arg.map(|s| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
        .transpose()
}

fn print_help() {
    println!("Login view:     login <username> <password> [--remember]");
    println!("Dashboard view: patients | patient <id> [start] [end] | interpret <text>");
    println!("                request <METHOD> <path> [json] | width <px> | logout");
    println!("Anywhere:       help | quit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(origin) = args.origin {
        config.backend.origin = origin;
    }
    if args.external {
        config.backend.external = true;
    }

    medshell::logging::init(&config.logging);
    tracing::info!("Medshell v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(data_dir = %config.storage.data_dir, origin = %config.backend.origin, "Starting shell");

    let config = Arc::new(config);
    let host = Arc::new(ConsoleHost::new(ViewFactory::new(Arc::clone(&config))));
    let shell = Shell::new(config, Arc::clone(&host));

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(Arc::clone(&host).run_input(stop_tx));

    shell
        .run(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
                _ = stop_rx => {}
            }
        })
        .await?;

    Ok(())
}
