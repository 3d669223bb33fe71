use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cripta_core::{
    platform, CriptaConfig, ItemKind, RecoveryManager, SqliteStore, VaultManager, VaultSession,
    VaultStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Cripta - zero-knowledge personal vault
#[derive(Parser)]
#[command(name = "cripta")]
#[command(about = "Zero-knowledge personal vault", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Vault database, overriding the config
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault
    Init,

    /// Add an item
    Add {
        #[arg(long, value_enum, default_value_t = KindArg::Password)]
        kind: KindArg,

        #[arg(long)]
        title: String,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Prompt for a secret value
        #[arg(long)]
        secret: bool,
    },

    /// List items
    List,

    /// Show one item, secrets included
    Show { id: String },

    /// Delete an item
    Delete { id: String },

    /// Change the master password
    Passwd,

    /// Generate a recovery key and attach it to the vault
    RecoverySetup,

    /// Reset the master password using the recovery key
    Recover,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Password,
    SecureNote,
    File,
}

impl From<KindArg> for ItemKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Password => ItemKind::Password,
            KindArg::SecureNote => ItemKind::SecureNote,
            KindArg::File => ItemKind::File,
        }
    }
}

struct App {
    config: CriptaConfig,
    vault: VaultManager,
    recovery: RecoveryManager,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(platform::get_default_config_path);
        let mut config = CriptaConfig::load_or_default(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        if let Some(vault) = &cli.vault {
            config.vault_path = vault.clone();
        }

        platform::ensure_parent_dir(&config.vault_path)?;
        let store: Arc<dyn VaultStore> = Arc::new(
            SqliteStore::open(&config.vault_path)
                .with_context(|| format!("opening {}", config.vault_path.display()))?,
        );
        let session = VaultSession::new(config.session);
        let vault = VaultManager::new(
            Arc::clone(&store),
            session.clone(),
            config.user_id.clone(),
            config.kdf,
        );
        let recovery = RecoveryManager::new(store, session, config.user_id.clone(), config.kdf);

        Ok(Self {
            config,
            vault,
            recovery,
        })
    }

    fn unlock(&self) -> Result<()> {
        if !self.vault.exists()? {
            bail!(
                "no vault at {}; run `cripta init` first",
                self.config.vault_path.display()
            );
        }
        let password = rpassword::prompt_password("Master password: ")?;
        self.vault.unlock(&password).context("unlock failed")?;
        Ok(())
    }
}

fn prompt_new_password() -> Result<String> {
    let first = rpassword::prompt_password("New master password: ")?;
    let second = rpassword::prompt_password("Repeat: ")?;
    if first != second {
        bail!("passwords do not match");
    }
    Ok(first)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::open(&cli)?;

    match cli.command {
        Commands::Init => {
            let password = prompt_new_password()?;
            app.vault.create_vault(&password)?;
            info!("Vault created at {}", app.config.vault_path.display());
            println!("Vault created at {}", app.config.vault_path.display());
        }
        Commands::Add {
            kind,
            title,
            username,
            url,
            notes,
            secret,
        } => {
            app.unlock()?;
            let mut data = serde_json::json!({ "title": title });
            if let Some(username) = username {
                data["username"] = username.into();
            }
            if let Some(url) = url {
                data["url"] = url.into();
            }
            if let Some(notes) = notes {
                data["notes"] = notes.into();
            }
            if secret {
                data["secret"] = rpassword::prompt_password("Secret: ")?.into();
            }
            let id = app.vault.add_item(kind.into(), &data)?;
            println!("{}", id);
        }
        Commands::List => {
            app.unlock()?;
            for item in app.vault.list_items()? {
                let title = item.data["title"].as_str().unwrap_or("(untitled)");
                println!("{}  {:<12} {}", item.id, item.kind.as_str(), title);
            }
        }
        Commands::Show { id } => {
            app.unlock()?;
            let item = app.vault.read_item(&id)?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Commands::Delete { id } => {
            app.unlock()?;
            app.vault.delete_item(&id)?;
            println!("Deleted {}", id);
        }
        Commands::Passwd => {
            app.unlock()?;
            let password = prompt_new_password()?;
            app.vault.change_password(&password)?;
            println!("Master password changed");
        }
        Commands::RecoverySetup => {
            app.unlock()?;
            let key = RecoveryManager::generate_recovery_key();
            app.recovery.setup_recovery(&key)?;
            println!("Recovery key (store it offline, it is shown once):");
            println!("{}", key);
        }
        Commands::Recover => {
            if !app.recovery.has_recovery() {
                bail!("no recovery key is configured for this vault");
            }
            let key = rpassword::prompt_password("Recovery key: ")?;
            let password = prompt_new_password()?;
            app.recovery.recover_vault(&key, &password)?;
            println!("Master password reset");
        }
    }

    app.vault.lock();
    Ok(())
}
