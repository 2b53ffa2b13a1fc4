use super::protocol::{ClusterMember, ENDPOINT_SEED_NODES, MAX_SEED_NODES, SeedNodesResponse};
use crate::membership::service::ClusterMembership;

use axum::{Extension, Json, Router, http::StatusCode, routing::get};
use std::sync::Arc;

/// Answers probes from bootstrapping nodes.
///
/// Seed nodes are only offered once this node itself is up, so a node that is
/// still bootstrapping never points others at a cluster that does not exist yet.
pub async fn handle_seed_nodes(
    Extension(membership): Extension<Arc<dyn ClusterMembership>>,
) -> (StatusCode, Json<SeedNodesResponse>) {
    let self_node = membership.self_address();
    let up_members = membership.up_members();

    let self_up = up_members
        .iter()
        .any(|member| member.address == self_node && member.status.is_up());

    let seed_nodes: Vec<ClusterMember> = if self_up {
        up_members
            .iter()
            .filter(|member| member.status.is_up())
            .take(MAX_SEED_NODES)
            .map(ClusterMember::from)
            .collect()
    } else {
        Vec::new()
    };

    tracing::debug!("Answering seed nodes probe with {} seed node(s)", seed_nodes.len());

    (
        StatusCode::OK,
        Json(SeedNodesResponse {
            self_node,
            seed_nodes,
        }),
    )
}

pub fn routes(membership: Arc<dyn ClusterMembership>) -> Router {
    Router::new()
        .route(ENDPOINT_SEED_NODES, get(handle_seed_nodes))
        .layer(Extension(membership))
}
