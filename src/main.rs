use cluster_bootstrap::bootstrap::config::ClusterBootstrapSettings;
use cluster_bootstrap::bootstrap::handlers::routes;
use cluster_bootstrap::bootstrap::service::ClusterBootstrap;
use cluster_bootstrap::discovery::static_discovery::StaticServiceDiscovery;
use cluster_bootstrap::discovery::types::ContactPointCandidate;
use cluster_bootstrap::membership::service::{ClusterMembership, LocalMembership};
use cluster_bootstrap::membership::types::Address;
use reqwest::Url;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> --remoting <addr:port> [--system <name>] [--peer <addr:port>]... [--required <n>]",
            args[0]
        );
        eprintln!(
            "Example: {} --bind 127.0.0.1:8558 --remoting 127.0.0.1:25520 --peer 127.0.0.1:8558 --peer 127.0.0.2:8558",
            args[0]
        );

        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut remoting_addr: Option<SocketAddr> = None;
    let mut system = "bootstrap".to_string();
    let mut peers: Vec<SocketAddr> = vec![];
    let mut required: Option<usize> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--bind", Some(value)) => {
                bind_addr = Some(value.parse()?);
                i += 2;
            }
            ("--remoting", Some(value)) => {
                remoting_addr = Some(value.parse()?);
                i += 2;
            }
            ("--system", Some(value)) => {
                system = value.clone();
                i += 2;
            }
            ("--peer", Some(value)) => {
                peers.push(value.parse()?);
                i += 2;
            }
            ("--required", Some(value)) => {
                required = Some(value.parse()?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.ok_or_else(|| anyhow::anyhow!("--bind is required"))?;
    let remoting_addr = remoting_addr.ok_or_else(|| anyhow::anyhow!("--remoting is required"))?;

    let self_address = Address::new(
        "cluster",
        &system,
        &remoting_addr.ip().to_string(),
        remoting_addr.port(),
    );
    tracing::info!("Starting node {} (management on {})", self_address, bind_addr);

    // 1. Membership sink:
    let membership = LocalMembership::new(self_address, BTreeSet::new());

    // 2. Discovery (static peer list):
    let discovery = StaticServiceDiscovery::new();
    let targets: Vec<ContactPointCandidate> = peers
        .iter()
        .map(|peer| {
            ContactPointCandidate::new(&peer.ip().to_string(), Some(peer.port()))
                .with_address(peer.ip())
        })
        .collect();
    tracing::info!("Static peers: {:?}", peers);
    discovery.set_targets(&system, targets);

    // 3. Bootstrap settings:
    let mut settings = ClusterBootstrapSettings::for_service(&system);
    settings.contact_point.fallback_port = bind_addr.port();
    if let Some(required) = required {
        settings.contact_point_discovery.required_contact_points_nr = required;
    }

    let bootstrap = ClusterBootstrap::new(settings, discovery, membership.clone())?;

    // 4. Management HTTP endpoint:
    let app = routes(membership.clone());
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let local_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Management HTTP server failed: {}", e);
        }
    });
    tracing::info!("Management HTTP server listening on {}", local_addr);

    let self_contact_point = Url::parse(&format!("http://{}", local_addr))?;
    bootstrap.self_contact_point().complete(self_contact_point);

    // 5. Bootstrap:
    bootstrap.start().await?;

    tokio::select! {
        result = bootstrap.wait_for_completion() => {
            result?;
            tracing::info!(
                "Bootstrap complete: {:?}, {} member(s) up",
                membership.join_outcome(),
                membership.up_members().len()
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping bootstrap");
            bootstrap.shutdown();
            return Ok(());
        }
    }

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;

    Ok(())
}
