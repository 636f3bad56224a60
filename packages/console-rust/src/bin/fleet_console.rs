//! `fleet-console` command line.
//!
//! ```text
//! fleet-console operations
//! fleet-console resolve organizations
//! fleet-console bulk change_hostgroup --ids 1,2,3 --param hostgroup_id=4
//! fleet-console bulk delete --ids 7 --yes
//! ```

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use fleet_console::{
    ApiClient, BulkOperationEngine, ClientHandle, ConsoleConfig, Credentials, Resolver,
};
use fleet_core::{retryable_ids, BulkOperationResult, OperationRegistry, Outcome, ParamBag};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fleet-console", version, about = "Fleet management console")]
struct Cli {
    /// Base URL of the management API
    #[arg(long, env = "FLEET_URL", default_value = "http://localhost:3000")]
    url: String,

    /// Username for basic authentication
    #[arg(long, env = "FLEET_USER")]
    user: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "FLEET_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Bearer token (takes precedence over basic authentication)
    #[arg(long, env = "FLEET_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Query-graph endpoint path
    #[arg(long, env = "FLEET_GRAPHQL_PATH", default_value = "/api/graphql")]
    graphql_path: String,

    /// Request timeout in seconds
    #[arg(long, env = "FLEET_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Maximum number of targets per bulk operation
    #[arg(long, env = "FLEET_MAX_TARGETS", default_value_t = fleet_core::DEFAULT_MAX_TARGETS)]
    max_targets: usize,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available bulk operations
    Operations,
    /// Fetch a collection and print it in normalized form
    Resolve {
        #[arg(value_enum)]
        collection: Collection,
        /// Search filter (hosts only)
        #[arg(long)]
        search: Option<String>,
    },
    /// Run a bulk operation
    Bulk {
        /// Operation id, see `operations`
        operation: String,
        /// Target ids, comma separated
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        ids: Vec<i64>,
        /// Operation parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
        /// Confirm a destructive operation
        #[arg(long)]
        yes: bool,
        /// Re-dispatch failed items once
        #[arg(long)]
        retry: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Collection {
    Organizations,
    Locations,
    Hostgroups,
    Hosts,
    Session,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    ParamBag::parse_assignment(raw).ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

impl Cli {
    fn config(&self) -> ConsoleConfig {
        let credentials = match (&self.token, &self.user) {
            (Some(token), _) => Credentials::Bearer(token.clone()),
            (None, Some(user)) => Credentials::Basic {
                username: user.clone(),
                password: self.password.clone().unwrap_or_default(),
            },
            (None, None) => Credentials::None,
        };
        let mut config = ConsoleConfig {
            base_url: self.url.clone(),
            graphql_path: self.graphql_path.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            credentials,
            ..ConsoleConfig::default()
        };
        config.bulk.max_targets = self.max_targets;
        config
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.config();
    config.validate().context("invalid configuration")?;
    let client = ClientHandle::new(ApiClient::from_config(&config)?);

    match cli.command {
        Command::Operations => {
            list_operations(&OperationRegistry::builtin())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Resolve { collection, search } => {
            let resolver = Resolver::from_config(client, &config);
            resolve(&resolver, collection, search.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Bulk {
            operation,
            ids,
            params,
            yes,
            retry,
        } => {
            let engine = BulkOperationEngine::from_config(client, &config);
            let params = ParamBag::from_pairs(params);
            run_bulk(&engine, &operation, &ids, params, yes, retry).await
        }
    }
}

fn list_operations(registry: &OperationRegistry) -> anyhow::Result<()> {
    let rows: Vec<Value> = registry
        .list()
        .iter()
        .map(|op| {
            json!({
                "id": op.id,
                "label": op.label,
                "method": op.method,
                "endpoint": op.endpoint,
                "destructive": op.destructive,
                "parameters": op.required_parameters,
            })
        })
        .collect();
    print_json(&rows)
}

async fn resolve(
    resolver: &Resolver,
    collection: Collection,
    search: Option<&str>,
) -> anyhow::Result<()> {
    match collection {
        Collection::Organizations => print_json(&resolver.organizations().await),
        Collection::Locations => print_json(&resolver.locations().await),
        Collection::Hostgroups => print_json(&resolver.host_groups().await),
        Collection::Hosts => print_json(&resolver.hosts(search).await),
        Collection::Session => print_json(&resolver.current_session().await),
    }
}

async fn run_bulk(
    engine: &BulkOperationEngine,
    operation: &str,
    ids: &[i64],
    params: ParamBag,
    confirmed: bool,
    retry: bool,
) -> anyhow::Result<ExitCode> {
    let descriptor = engine.registry().require(operation)?;
    if descriptor.destructive && !confirmed {
        bail!("{} is destructive; pass --yes to confirm", descriptor.label);
    }

    let mut result = engine.execute(operation, ids, Some(params.clone())).await?;
    report(&result)?;

    if retry && !retryable_ids(&result).is_empty() {
        result = engine
            .retry_failed(operation, &result, Some(params))
            .await?;
        report(&result)?;
    }

    Ok(match Outcome::of(&result) {
        Outcome::Success => ExitCode::SUCCESS,
        Outcome::PartialFailure | Outcome::TotalFailure => ExitCode::FAILURE,
    })
}

fn report(result: &BulkOperationResult) -> anyhow::Result<()> {
    let outcome = Outcome::of(result);
    print_json(&json!({ "outcome": outcome, "result": result }))?;
    eprintln!("{}: {}", outcome.as_str(), result.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn bulk_arguments_parse() {
        let cli = Cli::try_parse_from([
            "fleet-console",
            "--token",
            "t0k",
            "bulk",
            "change_hostgroup",
            "--ids",
            "1,2,-3",
            "--param",
            "hostgroup_id=4",
        ])
        .unwrap();
        assert!(matches!(cli.config().credentials, Credentials::Bearer(_)));
        let Command::Bulk { ids, params, .. } = cli.command else {
            panic!("expected bulk command");
        };
        assert_eq!(ids, vec![1, 2, -3]);
        assert_eq!(params, vec![("hostgroup_id".to_string(), json!(4))]);
    }

    #[test]
    fn malformed_param_is_rejected() {
        assert!(parse_param("no-equals").is_err());
        assert!(Cli::try_parse_from(["fleet-console", "bulk", "build", "--ids", "1", "--param", "x"])
            .is_err());
    }

    #[test]
    fn basic_credentials_from_user_and_password() {
        let cli = Cli::try_parse_from([
            "fleet-console",
            "--user",
            "admin",
            "--password",
            "changeme",
            "--max-targets",
            "10",
            "operations",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(
            config.credentials,
            Credentials::Basic {
                username: "admin".to_string(),
                password: "changeme".to_string()
            }
        );
        assert_eq!(config.bulk.max_targets, 10);
    }
}
