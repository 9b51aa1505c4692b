//! # huddle
//!
//! Relay server binary: loads settings, wires the authenticator into the
//! server and runs until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use huddle_auth::{JwtAuthenticator, StaticDirectory, TokenCodec};
use huddle_core::UserId;
use huddle_core::logging::{LogFormat, init_subscriber};
use huddle_server::{HuddleServer, ServerConfig};
use huddle_settings::{AuthSettings, HuddleSettings, ServerSettings};

/// WebSocket room relay.
#[derive(Parser, Debug)]
#[command(name = "huddle", about = "WebSocket room relay")]
struct Cli {
    /// Settings file (default `~/.huddle/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server.
    Serve {
        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides settings).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a token signed with the configured secret.
    Token {
        /// User id claim.
        #[arg(long)]
        user_id: u64,

        /// Email claim.
        #[arg(long)]
        email: String,

        /// Lifetime in seconds (overrides settings).
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(huddle_settings::settings_path);
    let settings = huddle_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    );

    match cli.command {
        Command::Serve { host, port } => serve(settings, host, port).await,
        Command::Token {
            user_id,
            email,
            ttl_secs,
        } => {
            let token = mint_token(&settings.auth, user_id, &email, ttl_secs)?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(
    mut settings: HuddleSettings,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    apply_cli_overrides(&mut settings.server, host, port);

    if settings.auth.uses_dev_secret() {
        tracing::warn!("using the development JWT secret; set HUDDLE_JWT_SECRET in production");
    }

    let metrics = huddle_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let directory = load_directory(&settings.auth)?;
    let authenticator = JwtAuthenticator::new(
        TokenCodec::new(&settings.auth.jwt_secret),
        Arc::new(directory),
    );

    let server = HuddleServer::new(ServerConfig::from(&settings.server), Arc::new(authenticator))
        .with_metrics(metrics);
    let handle = server.listen().await.context("Failed to bind server")?;

    tracing::info!("huddle listening on ws://{}/ws", handle.addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    handle.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn apply_cli_overrides(server: &mut ServerSettings, host: Option<String>, port: Option<u16>) {
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }
}

fn load_directory(auth: &AuthSettings) -> Result<StaticDirectory> {
    match auth.users_file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            StaticDirectory::from_path(path)
                .with_context(|| format!("Failed to load users from {}", path.display()))
        }
        None => {
            tracing::warn!("no users file configured; every token will be rejected");
            Ok(StaticDirectory::default())
        }
    }
}

fn mint_token(
    auth: &AuthSettings,
    user_id: u64,
    email: &str,
    ttl_secs: Option<u64>,
) -> Result<String> {
    let ttl = ttl_secs.unwrap_or(auth.token_ttl_secs);
    TokenCodec::new(&auth.jwt_secret)
        .encode(UserId(user_id), email, ttl)
        .context("Failed to sign token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_serve_defaults() {
        let cli = Cli::parse_from(["huddle", "serve"]);
        assert!(cli.config.is_none());
        match cli.command {
            Command::Serve { host, port } => {
                assert!(host.is_none());
                assert!(port.is_none());
            }
            Command::Token { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn cli_serve_overrides_and_global_config() {
        let cli = Cli::parse_from([
            "huddle",
            "serve",
            "--port",
            "9000",
            "--host",
            "127.0.0.1",
            "--config",
            "/etc/huddle.json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/huddle.json")));
        let Command::Serve { host, port } = cli.command else {
            panic!("expected serve");
        };

        let mut server = ServerSettings::default();
        apply_cli_overrides(&mut server, host, port);
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 9000);
    }

    #[test]
    fn cli_token_requires_user_and_email() {
        assert!(Cli::try_parse_from(["huddle", "token", "--email", "a@b.c"]).is_err());
        let cli = Cli::parse_from(["huddle", "token", "--user-id", "7", "--email", "a@b.c"]);
        assert!(matches!(cli.command, Command::Token { user_id: 7, ttl_secs: None, .. }));
    }

    #[test]
    fn minted_token_validates() {
        let auth = AuthSettings {
            jwt_secret: "s3cret".into(),
            ..AuthSettings::default()
        };
        let token = mint_token(&auth, 7, "ana@example.com", Some(60)).unwrap();
        let claims = TokenCodec::new("s3cret").decode(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "ana@example.com");
    }

    #[test]
    fn directory_defaults_to_empty() {
        let dir = load_directory(&AuthSettings::default()).unwrap();
        assert!(dir.is_empty());
    }

    #[test]
    fn directory_loaded_from_users_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users.json");
        std::fs::write(&path, r#"[{"id": 1, "name": "Ana", "email": "ana@example.com"}]"#).unwrap();
        let auth = AuthSettings {
            users_file: Some(path.to_string_lossy().into_owned()),
            ..AuthSettings::default()
        };
        assert_eq!(load_directory(&auth).unwrap().len(), 1);
    }

    #[test]
    fn missing_users_file_is_an_error() {
        let auth = AuthSettings {
            users_file: Some("/nonexistent/users.json".into()),
            ..AuthSettings::default()
        };
        assert!(load_directory(&auth).is_err());
    }
}
