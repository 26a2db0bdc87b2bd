use clap::{Parser, Subcommand, ValueEnum};

/// CLI surface (section 6). Environment variables override the matching flag;
/// `--mode` worker additionally requires `--master`, `--token`, `--node-id`.
#[derive(Parser, Debug)]
#[command(name = "sui", author, version, about = "Control plane for a multi-node proxy fleet")]
pub struct Cli {
    #[arg(long, env = "SUI_NODE_MODE", value_enum, default_value = "standalone")]
    pub mode: Mode,

    /// Master base URL (worker mode only).
    #[arg(long, env = "SUI_MASTER_ADDR")]
    pub master: Option<String>,

    /// Registration token (worker mode only).
    #[arg(long, env = "SUI_NODE_TOKEN")]
    pub token: Option<String>,

    #[arg(long, env = "SUI_NODE_ID")]
    pub node_id: Option<String>,

    #[arg(long, env = "SUI_NODE_NAME")]
    pub node_name: Option<String>,

    #[arg(long, env = "SUI_EXTERNAL_HOST")]
    pub external_host: Option<String>,

    #[arg(long, env = "SUI_EXTERNAL_PORT")]
    pub external_port: Option<u16>,

    #[arg(long, env = "SUI_SYNC_CONFIG_INTERVAL", default_value = "60")]
    pub sync_config_interval: u64,

    #[arg(long, env = "SUI_SYNC_STATS_INTERVAL", default_value = "30")]
    pub sync_stats_interval: u64,

    #[arg(long, env = "SUI_DB_FOLDER", default_value = "./data")]
    pub db_folder: String,

    #[arg(long, env = "SUI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "SUI_DEBUG", default_value = "false")]
    pub debug: bool,

    #[arg(long, default_value = "0.0.0.0:2095")]
    pub listen: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Standalone,
    Master,
    Worker,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Administrative tools (tokens, api keys, changes).
    Admin {
        #[command(subcommand)]
        action: AdminCommands,
    },
    /// Read or write a single settings key.
    Setting {
        key: String,
        value: Option<String>,
    },
    /// Run pending database migrations and exit.
    Migrate,
    /// Print a client's share links.
    Uri { uuid_or_name: String },
}

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Mint a single-use node registration token.
    MintToken {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "0")]
        expires_in_secs: i64,
    },
    /// Create an external-API bearer key.
    CreateApiKey { name: String },
    /// List recent audit entries.
    RecentChanges {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mode == Mode::Worker {
            if self.master.is_none() {
                anyhow::bail!("worker mode requires --master");
            }
            if self.token.is_none() {
                anyhow::bail!("worker mode requires --token");
            }
            if self.node_id.is_none() {
                anyhow::bail!("worker mode requires --node-id");
            }
        }
        Ok(())
    }
}
