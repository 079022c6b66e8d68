/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client as K8sClient;

use sindri_backend::cluster::kube_client::KubeWorkspaceClient;
use sindri_backend::cluster::WorkspaceClient;
use sindri_backend::controllers;
use sindri_backend::dal::{DatabaseQueries, DAL};
use sindri_backend::db::create_shared_connection_pool;
use sindri_backend::eventloop::preprocess_event_loop::{
    PreprocessEventLoop, PreprocessEventLoopConfig,
};
use sindri_utils::config::Settings;
use sindri_utils::telemetry;
use sindri_utils::telemetry::prelude::*;

#[derive(Parser)]
#[command(name = "sindri-backend", about = "Sindri GitOps control plane backend")]
struct Args {
    /// Name of the logical API export to watch.
    #[arg(long, default_value = "sindri-backend-shared")]
    api_export_name: String,

    /// Enable leader election so only one backend instance is active.
    #[arg(long, default_value_t = false)]
    leader_elect: bool,

    /// Path to an optional configuration file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let settings = Settings::new(args.config.clone()).expect("Failed to load configuration");
    telemetry::init(&settings.log.level, &settings.log.format)
        .expect("Failed to initialize telemetry");

    info!(api_export = %args.api_export_name, "Starting Sindri Backend");
    if args.leader_elect {
        info!("leader election requested; deferring to the deployment environment's lease");
    }

    info!("Connecting to the database");
    let pool = create_shared_connection_pool(
        &settings.database.url,
        settings.database.max_connections,
    );
    let db: Arc<dyn DatabaseQueries> = Arc::new(DAL::new(pool.pool.clone()));

    info!("Initializing Kubernetes client");
    let k8s_client = K8sClient::try_default().await?;
    let workspace_client: Arc<dyn WorkspaceClient> =
        Arc::new(KubeWorkspaceClient::new(k8s_client.clone()));

    let preprocess_event_loop = PreprocessEventLoop::new(
        db,
        PreprocessEventLoopConfig {
            debounce_window: Duration::from_millis(settings.backend.debounce_millis),
            status_tick_period: Duration::from_secs(settings.backend.status_tick_seconds),
        },
    );

    controllers::start_watchers(k8s_client, preprocess_event_loop, workspace_client);
    info!("Watchers started; entering main loop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    Ok(())
}
