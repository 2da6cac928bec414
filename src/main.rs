#[macro_use]
mod log;

mod aggregate;
mod cli;
mod config;
mod jmap;
mod normalize;
mod query;
mod stats;
mod store;

use config::{AccountConfig, Config};
use jmap::client::JmapClient;
use jmap::store::JmapStore;
use regex::Regex;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command;
use store::MailStore;

fn default_config_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("sst").join("config.toml")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home)
            .join(".config")
            .join("sst")
            .join("config.toml")
    } else {
        PathBuf::from("config.toml")
    }
}

pub fn run_password_command(cmd: &str) -> Result<String, String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .map_err(|e| format!("failed to execute password command: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "password command exited with {}: {}",
            output.status, stderr
        ));
    }

    let password = String::from_utf8(output.stdout)
        .map_err(|e| format!("password command output is not valid UTF-8: {}", e))?;

    Ok(password.trim_end_matches('\n').to_string())
}

pub fn connect_account(account: &AccountConfig, page_size: u32) -> Result<JmapStore, String> {
    let password = run_password_command(&account.password_command)?;
    let client = JmapClient::discover(&account.well_known_url, &account.username, &password)
        .map_err(|e| format!("JMAP discovery error: {}", e))?;
    Ok(JmapStore::new(client, account.name.clone(), page_size))
}

fn print_help_config() {
    let config_path = default_config_path();
    println!("Default config file: {}", config_path.display());
    println!();
    println!("Available options:");
    println!();
    println!("[stats]");
    println!("  page_size = 50           # Senders per stats page (default: 50)");
    println!("  preview_limit = 10       # Previews returned by get_previews (default: 10)");
    println!("  scan_page_size = 100     # Messages fetched per listing page (default: 100)");
    println!("  inbox_regex = \"^INBOX$\"  # Folder-name fallback when no inbox role exists");
    println!();
    println!("[account.NAME]               # At least one account required");
    println!(
        "  well_known_url = \"https://.../.well-known/jmap\"  # JMAP discovery URL (required)"
    );
    println!("  username = \"user@example.com\"                    # Email address (required)");
    println!("  password_command = \"pass show email/example\"     # Shell command returning password (required)");
}

/// Connect every configured account, scan once, and print the top senders.
fn run_report(config: Config, top: usize) {
    let inbox_regex = match Regex::new(&config.stats.inbox_regex) {
        Ok(re) => re,
        Err(e) => {
            eprintln!("Invalid inbox_regex: {}", e);
            std::process::exit(1);
        }
    };

    let mut stores: Vec<Box<dyn MailStore>> = Vec::new();
    for account in &config.accounts {
        eprint!("Connecting to {} ({})...", account.name, account.well_known_url);
        io::stderr().flush().ok();
        match connect_account(account, config.stats.scan_page_size) {
            Ok(store) => {
                eprintln!(" OK");
                stores.push(Box::new(store));
            }
            Err(e) => {
                eprintln!(" FAILED");
                eprintln!("{}", e);
            }
        }
    }

    if stores.is_empty() {
        eprintln!("No account reachable.");
        std::process::exit(1);
    }

    let snapshot = aggregate::scan(&stores, &inbox_regex, 1);

    println!(
        "{} sender(s), {} email(s) analyzed",
        snapshot.senders.len(),
        snapshot.total_emails
    );
    println!();
    println!("{:>6}  {:<30} {}", "COUNT", "EMAIL", "NAME");
    for sender in snapshot.senders.iter().take(top) {
        println!(
            "{:>6}  {:<30} {}",
            sender.count,
            sender.email,
            sender.display_name.as_deref().unwrap_or("-")
        );
    }
    if snapshot.senders.len() > top {
        println!("... {} more (use --top=N)", snapshot.senders.len() - top);
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: sst [OPTIONS]");
        eprintln!();
        eprintln!("Prints the ranked \"who sent me how many inbox messages\" table,");
        eprintln!("or serves it over an NDJSON protocol with --cli.");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --config=PATH    Use config file at PATH instead of default");
        eprintln!("  --top=N          Rows printed by the one-shot report (default: page_size)");
        eprintln!("  --cli            Run in JSON-over-stdin/stdout CLI mode");
        eprintln!("  --help-cli       Print CLI mode protocol documentation");
        eprintln!("  --help-config    Print default config path and all options");
        eprintln!("  --help           Show this help");
        std::process::exit(0);
    }

    if args.iter().any(|a| a == "--help-cli") {
        cli::print_help_cli();
        std::process::exit(0);
    }

    if args.iter().any(|a| a == "--help-config") {
        print_help_config();
        std::process::exit(0);
    }

    let config_path = args
        .iter()
        .find(|a| a.starts_with("--config="))
        .map(|a| PathBuf::from(&a["--config=".len()..]))
        .unwrap_or_else(default_config_path);

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config from {}: {}", config_path.display(), e);
            eprintln!("Create a config file with:");
            eprintln!();
            eprintln!("  [account.personal]");
            eprintln!("  well_known_url = \"https://your-server/.well-known/jmap\"");
            eprintln!("  username = \"you@example.com\"");
            eprintln!("  password_command = \"pass show email/example.com\"");
            std::process::exit(1);
        }
    };

    if args.iter().any(|a| a == "--cli") {
        cli::run_cli(config);
        std::process::exit(0);
    }

    let top = args
        .iter()
        .find(|a| a.starts_with("--top="))
        .and_then(|a| a["--top=".len()..].parse::<usize>().ok())
        .unwrap_or(config.stats.page_size as usize);

    run_report(config, top);
}
