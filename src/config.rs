use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Huddle signaling server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "huddle-server", version, about = "Huddle meeting signaling server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "HUDDLE_PORT", default_value = "5005")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "HUDDLE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./huddle.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "HUDDLE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Seconds an empty room survives before destruction
    #[arg(long, env = "HUDDLE_ROOM_GRACE_SECS", default_value = "60")]
    pub room_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5005,
            bind_address: "0.0.0.0".to_string(),
            config: "./huddle.toml".to_string(),
            json_logs: false,
            generate_config: false,
            room_grace_secs: 60,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (HUDDLE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("HUDDLE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Huddle Signaling Server Configuration
# Place this file at ./huddle.toml or specify with --config <path>
# All settings can be overridden via environment variables (HUDDLE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 5005)
# port = 5005

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Grace window in seconds before an empty room is destroyed.
# A participant joining within the window rescues the room.
# room_grace_secs = 60
"#
    .to_string()
}
