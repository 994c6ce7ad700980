//! Application wiring: turns parsed arguments and configuration into a
//! put run or a receiving server.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use fileput_data_channel::TcpPutServer;
use fileput_protocol::HashMethod;
use fileput_put::{PutOrchestrator, TargetConnection, report};
use fileput_transfer::TransferRequest;
use tokio_util::sync::CancellationToken;

use crate::cli::{Command, PutArgs, ServeArgs};
use crate::config::{Config, PutDefaults};
use crate::target::TcpTarget;

/// Runs the selected command until it finishes or is interrupted.
pub async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match command {
        Command::Put(args) => put(args, &config, cancel).await,
        Command::Serve(args) => serve(args, &config, cancel).await,
    }
}

async fn put(args: PutArgs, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let request = build_request(&args, &config.put)?;
    let targets = build_targets(&args, config)?;

    let timeout = args
        .timeout
        .or((config.put.timeout_secs > 0).then_some(config.put.timeout_secs));
    if let Some(secs) = timeout {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!(secs, "timeout reached, cancelling");
            on_timeout.cancel();
        });
    }

    let orchestrator = PutOrchestrator::with_parent(&cancel);
    let results = orchestrator.put(&request, targets).await;
    let report = report(results)?;
    tracing::info!(targets = report.total(), "put complete");
    Ok(())
}

async fn serve(args: ServeArgs, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let root = args.root.unwrap_or_else(|| config.server.root.clone());
    let listen = args.listen.unwrap_or_else(|| config.server.listen.clone());

    tokio::fs::create_dir_all(&root)
        .await
        .with_context(|| format!("creating {}", root.display()))?;

    let server = match args.token.or_else(|| config.server.token.clone()) {
        Some(token) => TcpPutServer::new(root, token, cancel)?,
        None => TcpPutServer::with_generated_token(root, cancel),
    };
    let (info, listener) = server
        .bind(listen.as_str())
        .await
        .with_context(|| format!("binding {listen}"))?;
    tracing::info!(addr = %info.addr, token = %info.token, "accepting uploads");

    server.serve(listener).await?;
    Ok(())
}

/// Merges command-line flags over the configured put defaults.
fn build_request(args: &PutArgs, defaults: &PutDefaults) -> anyhow::Result<TransferRequest> {
    let permission = args.permission.as_deref().unwrap_or(&defaults.permissions);
    let hash_method = args.hash_method.as_deref().unwrap_or(&defaults.hash_method);

    let mut request = TransferRequest::new(&args.file)
        .with_permissions(parse_permissions(permission)?)
        .with_hash_method(HashMethod::normalize(hash_method))
        .with_write_size_kb(args.write_size.unwrap_or(defaults.write_size_kb));
    if let Some(name) = &args.remote_name {
        request = request.with_remote_name(name);
    }
    Ok(request)
}

/// `--target` flags replace the configured target list.
///
/// Target ids must be unique so every result names one target.
fn build_targets(args: &PutArgs, config: &Config) -> anyhow::Result<Vec<Arc<dyn TargetConnection>>> {
    let targets: Vec<Arc<dyn TargetConnection>> = if args.targets.is_empty() {
        config
            .targets
            .iter()
            .map(|t| Arc::new(TcpTarget::from(t)) as Arc<dyn TargetConnection>)
            .collect()
    } else {
        let Some(token) = &args.token else {
            bail!("--token is required with --target");
        };
        args.targets
            .iter()
            .map(|addr| Arc::new(TcpTarget::new(addr, addr, token)) as Arc<dyn TargetConnection>)
            .collect()
    };

    if targets.is_empty() {
        bail!("no targets: pass --target or add [[targets]] to the configuration");
    }
    let mut seen = HashSet::new();
    for target in &targets {
        if !seen.insert(target.target_id()) {
            bail!("duplicate target {:?}", target.target_id());
        }
    }
    Ok(targets)
}

/// Parses an octal permission string such as `0755`, `755` or `0o755`.
fn parse_permissions(value: &str) -> anyhow::Result<u32> {
    let digits = value.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    u32::from_str_radix(digits, 8).with_context(|| format!("invalid permission {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use std::path::PathBuf;

    fn args(targets: &[&str], token: Option<&str>) -> PutArgs {
        PutArgs {
            file: PathBuf::from("fw.bin"),
            remote_name: None,
            write_size: None,
            permission: None,
            hash_method: None,
            targets: targets.iter().map(|t| t.to_string()).collect(),
            token: token.map(str::to_string),
            timeout: None,
        }
    }

    #[test]
    fn permission_strings() {
        assert_eq!(parse_permissions("0755").unwrap(), 0o755);
        assert_eq!(parse_permissions("644").unwrap(), 0o644);
        assert_eq!(parse_permissions("0o600").unwrap(), 0o600);
        assert_eq!(parse_permissions("0").unwrap(), 0);
        assert!(parse_permissions("0789").is_err());
        assert!(parse_permissions("rwx").is_err());
    }

    #[test]
    fn request_uses_config_defaults() {
        let defaults = PutDefaults {
            write_size_kb: 8,
            permissions: "0640".into(),
            hash_method: "sha512".into(),
            timeout_secs: 0,
        };
        let request = build_request(&args(&[], None), &defaults).unwrap();
        assert_eq!(request.write_size_kb, 8);
        assert_eq!(request.permissions, 0o640);
        assert_eq!(request.hash_method, HashMethod::Sha512);
        assert!(request.remote_name.is_none());
    }

    #[test]
    fn flags_override_config() {
        let mut a = args(&[], None);
        a.write_size = Some(2);
        a.permission = Some("0".into());
        a.hash_method = Some("whirlpool".into());
        a.remote_name = Some("boot/fw.bin".into());

        let request = build_request(&a, &PutDefaults::default()).unwrap();
        assert_eq!(request.write_size_kb, 2);
        assert_eq!(request.permissions, 0);
        assert_eq!(request.hash_method, HashMethod::Md5);
        assert_eq!(request.remote_name.as_deref(), Some("boot/fw.bin"));
    }

    #[test]
    fn cli_targets_replace_config_targets() {
        let config = Config {
            targets: vec![TargetConfig {
                name: Some("cfg".into()),
                address: "10.0.0.9:7400".into(),
                token: "0".repeat(32),
            }],
            ..Config::default()
        };

        let from_config = build_targets(&args(&[], None), &config).unwrap();
        assert_eq!(from_config.len(), 1);
        assert_eq!(from_config[0].target_id(), "cfg");

        let token = "a".repeat(32);
        let from_cli = build_targets(&args(&["h1:7400", "h2:7400"], Some(&token)), &config).unwrap();
        let ids: Vec<&str> = from_cli.iter().map(|t| t.target_id()).collect();
        assert_eq!(ids, vec!["h1:7400", "h2:7400"]);
    }

    #[test]
    fn duplicate_targets_rejected() {
        let token = "a".repeat(32);
        let err = build_targets(&args(&["h1:7400", "h1:7400"], Some(&token)), &Config::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("duplicate target"));

        let entry = |name: &str, address: &str| TargetConfig {
            name: Some(name.into()),
            address: address.into(),
            token: "0".repeat(32),
        };
        let config = Config {
            targets: vec![entry("core", "10.0.0.1:7400"), entry("core", "10.0.0.2:7400")],
            ..Config::default()
        };
        assert!(build_targets(&args(&[], None), &config).is_err());
    }

    #[test]
    fn cli_targets_need_a_token() {
        assert!(build_targets(&args(&["h1:7400"], None), &Config::default()).is_err());
    }

    #[test]
    fn no_targets_is_an_error() {
        assert!(build_targets(&args(&[], None), &Config::default()).is_err());
    }
}
