//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. The config file is
//! optional; a bare `.env` with `CLIENT_ID`, `CLIENT_SECRET`,
//! `REDIRECT_URI` and `SCOPES` is enough to run. The client secret is read
//! from `CLIENT_SECRET` or `client_secret_file`, never from the TOML itself.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use xero_auth::{ClientConfig, Endpoints};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "xero-demo.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub xero: XeroConfig,
    pub session: SessionConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_connections: usize,
    /// Client build served for every path outside `/xero`
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            max_connections: 1000,
            static_dir: PathBuf::from("build"),
        }
    }
}

/// App registration and Xero endpoint settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct XeroConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to CLIENT_SECRET)
    pub client_secret_file: Option<PathBuf>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub http_timeout_ms: u64,
    /// Load each organisation's details when refreshing tenants
    pub full_org_details: bool,
    pub authorize_url: String,
    pub token_url: String,
    pub connections_url: String,
    pub accounting_url: String,
    /// Local file uploaded by the attachment demos
    pub attachment_path: PathBuf,
}

impl Default for XeroConfig {
    fn default() -> Self {
        let endpoints = Endpoints::default();
        Self {
            client_id: String::new(),
            client_secret: None,
            client_secret_file: None,
            redirect_uri: "http://localhost:5000/xero/callback".into(),
            scopes: [
                "openid",
                "profile",
                "email",
                "accounting.transactions",
                "accounting.settings",
                "accounting.contacts",
                "offline_access",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            http_timeout_ms: xero_auth::DEFAULT_HTTP_TIMEOUT.as_millis() as u64,
            full_org_details: false,
            authorize_url: endpoints.authorize,
            token_url: endpoints.token,
            connections_url: endpoints.connections,
            accounting_url: endpoints.accounting,
            attachment_path: PathBuf::from("public/images/xero-dev.png"),
        }
    }
}

/// Session cookie settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_secs: u64,
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "xero_session".into(),
            ttl_secs: 86_400,
            secure_cookie: false,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, overlay environment
    /// variables (read through `env`), resolve the client secret and validate.
    pub fn load(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> common::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };

        config.apply_overrides(&env)?;
        config.resolve_client_secret(&env)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `CLIENT_ID`, `REDIRECT_URI`, `SCOPES` and `PORT`.
    fn apply_overrides(&mut self, env: &impl Fn(&str) -> Option<String>) -> common::Result<()> {
        if let Some(id) = env("CLIENT_ID") {
            self.xero.client_id = id;
        }
        if let Some(uri) = env("REDIRECT_URI") {
            self.xero.redirect_uri = uri;
        }
        if let Some(scopes) = env("SCOPES") {
            self.xero.scopes = scopes.split_whitespace().map(String::from).collect();
        }
        if let Some(port) = env("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| common::Error::Config(format!("PORT must be a port number: {e}")))?;
            self.server.listen_addr.set_port(port);
        }
        Ok(())
    }

    /// Client secret: `CLIENT_SECRET` env var takes precedence over the file.
    fn resolve_client_secret(&mut self, env: &impl Fn(&str) -> Option<String>) -> common::Result<()> {
        if let Some(secret) = env("CLIENT_SECRET") {
            self.xero.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = self.xero.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                self.xero.client_secret = Some(Secret::new(secret));
            }
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        if self.xero.client_id.trim().is_empty() {
            return Err(common::Error::MissingSetting("CLIENT_ID"));
        }
        match &self.xero.client_secret {
            Some(secret) if !secret.is_blank() => {}
            _ => return Err(common::Error::MissingSetting("CLIENT_SECRET")),
        }
        if self.xero.scopes.is_empty() {
            return Err(common::Error::MissingSetting("SCOPES"));
        }

        let urls = [
            ("redirect_uri", &self.xero.redirect_uri),
            ("authorize_url", &self.xero.authorize_url),
            ("token_url", &self.xero.token_url),
            ("connections_url", &self.xero.connections_url),
            ("accounting_url", &self.xero.accounting_url),
        ];
        for (name, value) in urls {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {value}"
                )));
            }
        }

        if self.xero.http_timeout_ms == 0 {
            return Err(common::Error::Config(
                "http_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(common::Error::Config(
                "session ttl_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Identity client settings derived from the `[xero]` section.
    pub fn client_config(&self) -> common::Result<ClientConfig> {
        let client_secret = self
            .xero
            .client_secret
            .clone()
            .ok_or(common::Error::MissingSetting("CLIENT_SECRET"))?;
        Ok(ClientConfig {
            client_id: self.xero.client_id.clone(),
            client_secret,
            redirect_uri: self.xero.redirect_uri.clone(),
            scopes: self.xero.scopes.clone(),
            endpoints: Endpoints {
                authorize: self.xero.authorize_url.clone(),
                token: self.xero.token_url.clone(),
                connections: self.xero.connections_url.clone(),
                accounting: self.xero.accounting_url.clone(),
            },
            http_timeout: self.http_timeout(),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.xero.http_timeout_ms)
    }

    /// Resolve the config file from the CLI arg or `CONFIG_PATH`, falling
    /// back to [`DEFAULT_CONFIG_FILE`] only when it exists.
    pub fn resolve_path(
        cli_path: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Some(p) = env("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal_env() -> impl Fn(&str) -> Option<String> {
        env_of(&[("CLIENT_ID", "cid"), ("CLIENT_SECRET", "csecret")])
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("xero-demo.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_apply_without_config_file() {
        let config = Config::load(None, minimal_env()).unwrap();
        assert_eq!(config.server.listen_addr.port(), 5000);
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.xero.http_timeout_ms, 3000);
        assert!(!config.xero.full_org_details);
        assert_eq!(config.xero.token_url, "https://identity.xero.com/connect/token");
        assert_eq!(config.session.cookie_name, "xero_session");
        assert_eq!(
            config.xero.attachment_path,
            PathBuf::from("public/images/xero-dev.png")
        );
        assert!(config.xero.scopes.iter().any(|s| s == "offline_access"));
    }

    #[test]
    fn env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[xero]
client_id = "from-file"
redirect_uri = "http://localhost:8080/xero/callback"
scopes = ["openid"]
"#,
        );

        let env = env_of(&[
            ("CLIENT_ID", "from-env"),
            ("CLIENT_SECRET", "s"),
            ("SCOPES", "openid profile  offline_access"),
            ("PORT", "5050"),
        ]);
        let config = Config::load(Some(&path), env).unwrap();
        assert_eq!(config.xero.client_id, "from-env");
        assert_eq!(
            config.xero.redirect_uri,
            "http://localhost:8080/xero/callback"
        );
        assert_eq!(config.xero.scopes, vec!["openid", "profile", "offline_access"]);
        assert_eq!(config.server.listen_addr.to_string(), "127.0.0.1:5050");
    }

    #[test]
    fn client_secret_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "file-secret\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[xero]\nclient_id = \"cid\"\nclient_secret_file = \"{}\"\n",
                secret_path.display()
            ),
        );

        let config = Config::load(Some(&path), env_of(&[])).unwrap();
        assert_eq!(
            config.xero.client_secret.as_ref().unwrap().expose(),
            "file-secret"
        );
    }

    #[test]
    fn client_secret_env_wins_over_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[xero]\nclient_id = \"cid\"\nclient_secret_file = \"/nonexistent/secret\"\n",
        );
        let config = Config::load(Some(&path), env_of(&[("CLIENT_SECRET", "env")])).unwrap();
        assert_eq!(config.xero.client_secret.as_ref().unwrap().expose(), "env");
    }

    #[test]
    fn missing_secret_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[xero]\nclient_id = \"cid\"\nclient_secret_file = \"/nonexistent/secret\"\n",
        );
        let err = Config::load(Some(&path), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("client_secret_file"));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = Config::load(None, env_of(&[("CLIENT_SECRET", "s")])).unwrap_err();
        assert!(matches!(err, common::Error::MissingSetting("CLIENT_ID")));

        let err = Config::load(None, env_of(&[("CLIENT_ID", "c")])).unwrap_err();
        assert!(matches!(err, common::Error::MissingSetting("CLIENT_SECRET")));

        let err = Config::load(
            None,
            env_of(&[("CLIENT_ID", "c"), ("CLIENT_SECRET", "s"), ("SCOPES", "  ")]),
        )
        .unwrap_err();
        assert!(matches!(err, common::Error::MissingSetting("SCOPES")));
    }

    #[test]
    fn redirect_uri_without_scheme_is_rejected() {
        let env = env_of(&[
            ("CLIENT_ID", "c"),
            ("CLIENT_SECRET", "s"),
            ("REDIRECT_URI", "localhost:5000/xero/callback"),
        ]);
        let err = Config::load(None, env).unwrap_err();
        assert!(err.to_string().contains("redirect_uri must start with http"));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[xero]\nhttp_timeout_ms = 0\n");
        assert!(Config::load(Some(&path), minimal_env()).is_err());

        let path = write_config(&dir, "[server]\nmax_connections = 0\n");
        assert!(Config::load(Some(&path), minimal_env()).is_err());
    }

    #[test]
    fn bad_port_is_rejected() {
        let env = env_of(&[("CLIENT_ID", "c"), ("CLIENT_SECRET", "s"), ("PORT", "http")]);
        assert!(Config::load(None, env).is_err());
    }

    #[test]
    fn invalid_toml_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(
            Config::load(Some(&path), minimal_env()),
            Err(common::Error::Toml(_))
        ));
    }

    #[test]
    fn client_config_carries_endpoints_and_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[xero]\nhttp_timeout_ms = 1500\ntoken_url = \"http://127.0.0.1:9/connect/token\"\n",
        );
        let config = Config::load(Some(&path), minimal_env()).unwrap();
        let client = config.client_config().unwrap();
        assert_eq!(client.endpoints.token, "http://127.0.0.1:9/connect/token");
        assert_eq!(client.http_timeout, Duration::from_millis(1500));
        assert_eq!(client.client_secret.expose(), "csecret");
    }

    #[test]
    fn resolve_path_prefers_cli_then_env() {
        let env = env_of(&[("CONFIG_PATH", "/env/path.toml")]);
        assert_eq!(
            Config::resolve_path(Some("/cli/wins.toml"), &env),
            Some(PathBuf::from("/cli/wins.toml"))
        );
        assert_eq!(
            Config::resolve_path(None, &env),
            Some(PathBuf::from("/env/path.toml"))
        );
    }
}
