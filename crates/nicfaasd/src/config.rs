//! Daemon settings.
//!
//! Sources, highest precedence first: command line (and the environment
//! variables clap reads for it), an optional TOML file, built-in defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use nicfaas_rpc::OffloadPorts;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_NODES: [&str; 4] = [
    "20.20.20.101",
    "20.20.20.102",
    "20.20.20.103",
    "20.20.20.104",
];
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Where placement state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redb(PathBuf),
    Etcd(String),
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "memory" {
            return Ok(StoreBackend::Memory);
        }
        if let Some(path) = s.strip_prefix("redb:").filter(|p| !p.is_empty()) {
            return Ok(StoreBackend::Redb(PathBuf::from(path)));
        }
        if let Some(endpoint) = s.strip_prefix("etcd:").filter(|e| !e.is_empty()) {
            return Ok(StoreBackend::Etcd(endpoint.to_string()));
        }
        Err(format!(
            "unknown store {s:?}; expected memory, redb:<path> or etcd:<endpoint>"
        ))
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("memory"),
            StoreBackend::Redb(path) => write!(f, "redb:{}", path.display()),
            StoreBackend::Etcd(endpoint) => write!(f, "etcd:{endpoint}"),
        }
    }
}

/// Parse `500ms`, `2s`, `1m`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let invalid = || format!("invalid duration {s:?}");
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse().map(Duration::from_millis).map_err(|_| invalid())
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse().map(Duration::from_secs).map_err(|_| invalid())
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .map(|m| Duration::from_secs(m * 60))
            .map_err(|_| invalid())
    } else {
        s.parse().map(Duration::from_secs).map_err(|_| invalid())
    }
}

/// `nicfaasd serve` arguments.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// TOML settings file.
    #[arg(long, env = "NICFAAS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port the provider API listens on.
    #[arg(long, env = "port")]
    pub port: Option<u16>,

    /// Namespace of cluster functions.
    #[arg(long, env = "function_namespace")]
    pub namespace: Option<String>,

    /// Placement store: memory, redb:<path> or etcd:<endpoint>.
    #[arg(long, env = "NICFAAS_STORE")]
    pub store: Option<StoreBackend>,

    /// Offload node address; repeat or comma-separate for several.
    #[arg(long = "node", env = "NICFAAS_NODES", value_delimiter = ',')]
    pub nodes: Vec<String>,

    /// Reply deadline for offload invocations.
    #[arg(long, env = "NICFAAS_RPC_TIMEOUT", value_parser = parse_duration)]
    pub rpc_timeout: Option<Duration>,

    /// Connect timeout for cluster calls.
    #[arg(long, env = "read_timeout", value_parser = parse_duration)]
    pub read_timeout: Option<Duration>,

    /// Port function containers listen on.
    #[arg(long, env = "NICFAAS_CLUSTER_PORT")]
    pub cluster_port: Option<u16>,

    /// How long a node listing is reused; 0 disables caching.
    #[arg(long, env = "NICFAAS_POOL_TTL", value_parser = parse_duration)]
    pub pool_ttl: Option<Duration>,

    /// Largest accepted function call body, in bytes.
    #[arg(long, env = "NICFAAS_MAX_BODY")]
    pub max_body: Option<usize>,

    /// Node port for lambdanic functions.
    #[arg(long, env = "NICFAAS_LAMBDANIC_PORT")]
    pub lambdanic_port: Option<u16>,

    /// Node port for baremetal functions.
    #[arg(long, env = "NICFAAS_BAREMETAL_PORT")]
    pub baremetal_port: Option<u16>,
}

/// Settings file contents. Durations use the same syntax as the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub namespace: Option<String>,
    pub store: Option<String>,
    pub nodes: Option<Vec<String>>,
    pub rpc_timeout: Option<String>,
    pub read_timeout: Option<String>,
    pub cluster_port: Option<u16>,
    pub pool_ttl: Option<String>,
    pub max_body: Option<usize>,
    pub lambdanic_port: Option<u16>,
    pub baremetal_port: Option<u16>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: FileConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }
}

/// Fully resolved daemon settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub namespace: String,
    pub store: StoreBackend,
    pub nodes: Vec<String>,
    pub rpc_timeout: Duration,
    pub read_timeout: Duration,
    pub cluster_port: u16,
    pub pool_ttl: Duration,
    pub max_body: usize,
    pub ports: OffloadPorts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            namespace: DEFAULT_NAMESPACE.to_string(),
            store: StoreBackend::Memory,
            nodes: DEFAULT_NODES.iter().map(|n| n.to_string()).collect(),
            rpc_timeout: nicfaas_rpc::DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            cluster_port: nicfaas_dispatch::DEFAULT_CLUSTER_PORT,
            pool_ttl: nicfaas_dispatch::DEFAULT_POOL_TTL,
            max_body: nicfaas_dispatch::DEFAULT_MAX_BODY,
            ports: OffloadPorts::default(),
        }
    }
}

impl Settings {
    /// Resolve settings from the command line and the file it names.
    pub fn load(args: &ServeArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    pub fn merge(args: &ServeArgs, file: FileConfig) -> anyhow::Result<Self> {
        let defaults = Settings::default();
        let file_duration = |value: Option<String>, key: &str| -> anyhow::Result<Option<Duration>> {
            value
                .map(|v| parse_duration(&v).map_err(|e| anyhow::anyhow!("{key}: {e}")))
                .transpose()
        };
        let file_store = file
            .store
            .map(|s| s.parse::<StoreBackend>().map_err(|e| anyhow::anyhow!("store: {e}")))
            .transpose()?;

        let nodes = if !args.nodes.is_empty() {
            args.nodes.clone()
        } else {
            file.nodes.unwrap_or(defaults.nodes)
        };
        let nodes: Vec<String> = nodes
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        Ok(Settings {
            port: args.port.or(file.port).unwrap_or(defaults.port),
            namespace: args
                .namespace
                .clone()
                .or(file.namespace)
                .unwrap_or(defaults.namespace),
            store: args.store.clone().or(file_store).unwrap_or(defaults.store),
            nodes,
            rpc_timeout: args
                .rpc_timeout
                .or(file_duration(file.rpc_timeout, "rpc_timeout")?)
                .unwrap_or(defaults.rpc_timeout),
            read_timeout: args
                .read_timeout
                .or(file_duration(file.read_timeout, "read_timeout")?)
                .unwrap_or(defaults.read_timeout),
            cluster_port: args
                .cluster_port
                .or(file.cluster_port)
                .unwrap_or(defaults.cluster_port),
            pool_ttl: args
                .pool_ttl
                .or(file_duration(file.pool_ttl, "pool_ttl")?)
                .unwrap_or(defaults.pool_ttl),
            max_body: args.max_body.or(file.max_body).unwrap_or(defaults.max_body),
            ports: OffloadPorts {
                lambdanic: args
                    .lambdanic_port
                    .or(file.lambdanic_port)
                    .unwrap_or(defaults.ports.lambdanic),
                baremetal: args
                    .baremetal_port
                    .or(file.baremetal_port)
                    .unwrap_or(defaults.ports.baremetal),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(
            "redb:/var/lib/nicfaas/placement.redb".parse::<StoreBackend>().unwrap(),
            StoreBackend::Redb(PathBuf::from("/var/lib/nicfaas/placement.redb"))
        );
        assert_eq!(
            "etcd:http://127.0.0.1:2379".parse::<StoreBackend>().unwrap(),
            StoreBackend::Etcd("http://127.0.0.1:2379".into())
        );
        assert!("redb:".parse::<StoreBackend>().is_err());
        assert!("consul:x".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn store_backend_display_round_trips() {
        let backend = StoreBackend::Etcd("http://10.0.0.5:2379".into());
        assert_eq!(backend.to_string().parse::<StoreBackend>().unwrap(), backend);
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn defaults_apply_without_sources() {
        let settings = Settings::merge(&ServeArgs::default(), FileConfig::default()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.nodes.len(), 4);
        assert_eq!(settings.rpc_timeout, Duration::from_secs(2));
        assert_eq!(settings.cluster_port, 8080);
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            port = 9090
            namespace = "openfaas-fn"
            store = "etcd:http://etcd:2379"
            nodes = ["10.0.0.1", "10.0.0.2"]
            rpc_timeout = "750ms"
            pool_ttl = "0"
            lambdanic_port = 14369
            "#,
        )
        .unwrap();
        let args = ServeArgs {
            port: Some(7070),
            nodes: vec!["10.9.9.9".into()],
            ..Default::default()
        };

        let settings = Settings::merge(&args, file).unwrap();
        assert_eq!(settings.port, 7070);
        assert_eq!(settings.namespace, "openfaas-fn");
        assert_eq!(settings.store, StoreBackend::Etcd("http://etcd:2379".into()));
        assert_eq!(settings.nodes, vec!["10.9.9.9".to_string()]);
        assert_eq!(settings.rpc_timeout, Duration::from_millis(750));
        assert_eq!(settings.pool_ttl, Duration::ZERO);
        assert_eq!(settings.ports.lambdanic, 14369);
        assert_eq!(settings.ports.baremetal, 10000);
    }

    #[test]
    fn bad_file_values_are_reported() {
        let file = FileConfig {
            rpc_timeout: Some("fast".into()),
            ..Default::default()
        };
        let err = Settings::merge(&ServeArgs::default(), file).unwrap_err();
        assert!(err.to_string().contains("rpc_timeout"));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("listen = 1").is_err());
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nicfaasd.toml");
        std::fs::write(&path, "namespace = \"fn\"\nnodes = [\"127.0.0.1\"]\n").unwrap();

        let args = ServeArgs {
            config: Some(path),
            ..Default::default()
        };
        let settings = Settings::load(&args).unwrap();
        assert_eq!(settings.namespace, "fn");
        assert_eq!(settings.nodes, vec!["127.0.0.1".to_string()]);
    }
}
