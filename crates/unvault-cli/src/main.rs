//! unvault: read-only browser and extractor for encrypted vaults
//!
//! Commands:
//!   ls <vault> [dir]             - list folders and files at a virtual path
//!   tree <vault>                 - print the whole folder tree
//!   cat <vault> <file>           - decrypt a file to stdout
//!   extract <vault> <file> <out> - decrypt a file to a local destination
//!   resolve <vault> <file>       - print the physical (encrypted) path

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use unvault_core::config::UnvaultConfig;
use unvault_crypto::content;
use unvault_fs::Vault;

#[derive(Parser, Debug)]
#[command(
    name = "unvault",
    version,
    about = "Read-only browser and extractor for encrypted vaults",
    long_about = "unvault: list, inspect, and decrypt files from password-protected \
                  encrypted-filesystem vaults without the original vault application"
)]
struct Cli {
    /// Path to unvault.toml configuration file
    #[arg(long, short = 'c', env = "UNVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Read the vault password from this environment variable instead of
    /// prompting interactively
    #[arg(long, value_name = "VAR")]
    password_env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List folders and files at a virtual path
    Ls {
        /// Vault root (the directory holding masterkey.cryptomator)
        vault: PathBuf,
        /// Virtual directory, `/`-separated (default: vault root)
        #[arg(default_value = "")]
        dir: String,
    },

    /// Print the whole folder tree
    Tree {
        vault: PathBuf,
    },

    /// Decrypt a file to stdout
    Cat {
        vault: PathBuf,
        /// Virtual file path, e.g. notes/secrets.txt
        file: String,
    },

    /// Decrypt a file to a local destination
    Extract {
        vault: PathBuf,
        /// Virtual file path, e.g. notes/secrets.txt
        file: String,
        /// Destination path for the plaintext
        out: PathBuf,
    },

    /// Print the physical (encrypted) path backing a virtual file
    Resolve {
        vault: PathBuf,
        file: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.log.level, &config.log.format);

    let password = read_password(&cli)?;

    match &cli.command {
        Commands::Ls { vault, dir } => {
            let vault = Vault::open(vault, &password)?;
            for folder in vault.list_folders(dir)? {
                println!("{}/", folder.name);
            }
            for file in vault.list_files(dir)? {
                println!("{}", basename(&file));
            }
        }
        Commands::Tree { vault } => {
            let vault = Vault::open(vault, &password)?;
            println!("/");
            print_tree(&vault, "", 1)?;
        }
        Commands::Cat { vault, file } => {
            let vault = Vault::open(vault, &password)?;
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            vault.decrypt_to_writer(file, &mut lock)?;
        }
        Commands::Extract { vault, file, out } => {
            let vault = Vault::open(vault, &password)?;
            extract(&vault, file, out)?;
        }
        Commands::Resolve { vault, file } => {
            let vault = Vault::open(vault, &password)?;
            println!("{}", vault.resolve_physical_path(file)?.display());
        }
    }
    Ok(())
}

fn read_password(cli: &Cli) -> Result<SecretString> {
    if let Some(var) = &cli.password_env {
        let raw = std::env::var(var).with_context(|| format!("reading password from ${var}"))?;
        return Ok(SecretString::from(raw));
    }
    let raw = rpassword::prompt_password("Vault password: ").context("reading password")?;
    Ok(SecretString::from(raw))
}

fn print_tree(vault: &Vault, dir: &str, depth: usize) -> Result<()> {
    let indent = depth * 2;
    for folder in vault.list_folders(dir)? {
        println!("{:indent$}{}/", "", folder.name);
        if folder.has_children {
            print_tree(vault, &folder.virtual_path, depth + 1)?;
        }
    }
    for file in vault.list_files(dir)? {
        println!("{:indent$}{}", "", basename(&file));
    }
    Ok(())
}

fn extract(vault: &Vault, file: &str, out: &Path) -> Result<()> {
    // Size the bar from the ciphertext length and the fixed chunk overhead
    let physical = vault.resolve_physical_path(file)?;
    let encrypted_len = std::fs::metadata(&physical)?.len();
    let bar = match content::plaintext_len(encrypted_len) {
        Some(total) => make_progress_bar(total, file),
        None => ProgressBar::hidden(),
    };

    let mut sink = bar.wrap_write(BufWriter::new(File::create(out)?));
    match vault.decrypt_to_writer(file, &mut sink) {
        Ok(written) => {
            bar.finish_with_message("done");
            eprintln!("{file} -> {} ({written} bytes)", out.display());
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            drop(sink);
            let _ = std::fs::remove_file(out);
            Err(e.into())
        }
    }
}

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
        )
        .unwrap()
        .progress_chars("=>-"),
    );
    bar.set_prefix(prefix.to_string());
    bar
}

fn basename(virtual_path: &str) -> &str {
    virtual_path.rsplit('/').next().unwrap_or(virtual_path)
}

fn load_config(path: Option<&Path>) -> Result<UnvaultConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(UnvaultConfig::default()),
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
