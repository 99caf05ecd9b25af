use crate::auth::AuthVerifier;
use crate::constants::{
    default_agent_ids, DEFAULT_AUTH_SERVICE_URL, DEFAULT_FORWARD_TIMEOUT_SECS,
    DEFAULT_ROUTING_PATH,
};
use crate::dispatcher::{DispatchConfig, Dispatcher};
use crate::routes::RouteTable;
use crate::types::*;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Every option doubles as an environment variable; `.env` is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
    /// Only the literal "1" enables forwarding; anything else simulates.
    #[arg(long, env = "MAKE_FORWARD", default_value = "0")]
    pub make_forward: String,
    /// Forward timeout in seconds (fractions allowed).
    #[arg(long, env = "MAKE_TIMEOUT", default_value = "4", value_parser = parse_timeout_secs)]
    pub make_timeout: Duration,
    #[arg(long, env = "MAKE_TOKEN", hide_env_values = true)]
    pub make_token: Option<String>,
    #[arg(long, env = "ROUTING_PATH", default_value = DEFAULT_ROUTING_PATH)]
    pub routing_path: PathBuf,
    /// Known agent ids, comma separated. Defaults to neura-1..neura-10.
    #[arg(long, env = "AGENT_IDS", value_delimiter = ',')]
    pub agent_ids: Vec<String>,
    #[arg(long, env = "USE_AUTH", default_value = "0")]
    pub use_auth: String,
    #[arg(long, env = "AUTH_SERVICE_URL", default_value = DEFAULT_AUTH_SERVICE_URL)]
    pub auth_service_url: String,
    /// Comma separated CORS origins; unset or "*" allows every origin.
    #[arg(long, env = "ALLOWED_ORIGIN")]
    pub allowed_origin: Option<String>,
    #[arg(long, env = "MAX_BODY_SIZE", default_value_t = 1024 * 1024)]
    pub max_body_size: usize,
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 2)]
    pub connect_timeout_secs: u64,
    /// Directory for a daily-rolling log file. Stderr only when unset.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

fn parse_timeout_secs(raw: &str) -> std::result::Result<Duration, String> {
    let trimmed = raw.trim();
    let secs = if trimmed.is_empty() {
        DEFAULT_FORWARD_TIMEOUT_SECS
    } else {
        trimmed
            .parse::<f64>()
            .map_err(|e| format!("invalid timeout '{}': {}", raw, e))?
    };
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout '{}': {}", raw, e))
}

impl Args {
    pub fn forward_enabled(&self) -> bool {
        self.make_forward == "1"
    }

    pub fn auth_enabled(&self) -> bool {
        self.use_auth == "1"
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn known_agents(&self) -> Vec<String> {
        let ids: Vec<String> = self
            .agent_ids
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if ids.is_empty() {
            default_agent_ids()
        } else {
            ids
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            forward_enabled: self.forward_enabled(),
            timeout: self.make_timeout,
            service_token: self.make_token.clone().filter(|t| !t.is_empty()),
            known_agents: self.known_agents(),
        }
    }
}

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub args: Arc<Args>,
}

impl AppState {
    /// Resolves everything the request path needs, once. The routing file is
    /// read here and nowhere else.
    pub fn from_args(args: Arc<Args>) -> Result<Self> {
        let routes = Arc::new(RouteTable::load(&args.routing_path));
        Self::with_routes(args, routes)
    }

    pub fn with_routes(args: Arc<Args>, routes: Arc<RouteTable>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(args.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| GatewayError::Config(format!("HTTP client: {}", e)))?;

        let auth = if args.auth_enabled() {
            if let Err(e) = reqwest::Url::parse(&args.auth_service_url) {
                return Err(GatewayError::Config(format!(
                    "AUTH_SERVICE_URL '{}' is not a valid URL: {}",
                    args.auth_service_url, e
                ))
                .into());
            }
            AuthVerifier::remote(client.clone(), args.auth_service_url.clone())
        } else {
            AuthVerifier::Disabled
        };

        let dispatcher = Dispatcher::new(routes, args.dispatch_config(), client, auth);
        Ok(Self { dispatcher, args })
    }
}
