//! # RBAC check
//!
//! Evaluates the configured guards for one route and prints the decision as JSON.
//!
//! ```text
//! rbac-check <route> [role...]
//! ```
//!
//! Without roles the request is evaluated as a guest. The exit code is 1 when
//! the request is denied.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RBAC_CONFIG` - Path to the JSON configuration (default: rbac.json)
//! - `RUST_LOG` - Log level (default: info)

use anyhow::{bail, Context};
use cretoai_rbac::{RbacConfig, RbacEngine, RequestDescriptor, SimpleIdentity, StaticIdentityProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Serialize)]
struct CheckOutput<'a> {
    route: &'a str,
    roles: &'a [String],
    #[serde(flatten)]
    decision: cretoai_rbac::GuardDecision,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(route) = args.next() else {
        bail!("usage: rbac-check <route> [role...]");
    };
    let roles: Vec<String> = args.collect();

    let path = std::env::var("RBAC_CONFIG").unwrap_or_else(|_| "rbac.json".to_string());
    let config = RbacConfig::from_file(&path).with_context(|| format!("loading {}", path))?;
    info!("Loaded configuration from {} (v{})", path, cretoai_rbac::VERSION);

    let engine = RbacEngine::start(&config, Arc::new(StaticIdentityProvider::anonymous())).await?;
    let request = RequestDescriptor::new(route.clone());

    let decision = if roles.is_empty() {
        engine.evaluate_for(None, &request).await?
    } else {
        let identity = SimpleIdentity {
            id: "cli".to_string(),
            roles: roles.clone(),
        };
        engine.evaluate_for(Some(&identity), &request).await?
    };

    let allowed = decision.is_allowed();
    let output = CheckOutput {
        route: &route,
        roles: &roles,
        decision,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if !allowed {
        std::process::exit(1);
    }
    Ok(())
}
