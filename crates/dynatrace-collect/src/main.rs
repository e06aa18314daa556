// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::pin::pin;
use std::{env, process::ExitCode, sync::Arc};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use dynatrace_collector::{
    metric_data_points, validate_catalog, CollectorConfig, Event, Operation, OperationInputs,
    Orchestrator,
};
use dynatrace_tls::prepare_client_provider;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("DT_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    if let Err(e) = prepare_client_provider() {
        error!("Error preparing TLS provider: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = validate_catalog() {
        error!("Invalid endpoint catalog: {e}");
        return ExitCode::FAILURE;
    }

    let config = match CollectorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        tenant = %config.tenant,
        operations = ?config.operations,
        interval_minutes = config.collection_interval_minutes,
        "Starting Dynatrace collection"
    );

    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(config.session_options(), Arc::new(config.window()))
        .with_cancellation_token(cancel.clone());
    let redact_keys = Arc::new(config.redact_keys.clone());

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAPACITY);
    let writer = tokio::spawn(write_events(rx));

    // Main requests of every operation, metrics included, share one window start.
    let time = orchestrator.time_param();
    let tasks: Vec<_> = config
        .operations
        .iter()
        .map(|operation| {
            tokio::spawn(run_operation(
                *operation,
                orchestrator.clone(),
                config.operation_inputs(time.clone()),
                redact_keys.clone(),
                tx.clone(),
            ))
        })
        .collect();
    drop(tx);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, cancelling collection");
            cancel.cancel();
        }
    });

    for task in tasks {
        match task.await {
            Ok((operation, count)) => {
                info!(operation = %operation, records = count, "Operation finished");
            }
            Err(e) => error!("Operation task failed: {e}"),
        }
    }

    match writer.await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!("Failed to write events: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Event writer task failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_operation(
    operation: Operation,
    orchestrator: Orchestrator,
    inputs: OperationInputs,
    redact_keys: Arc<Vec<String>>,
    tx: mpsc::Sender<Event>,
) -> (Operation, u64) {
    let source = operation.name();
    let mut count = 0;

    if operation == Operation::Metrics {
        let mut points = pin!(metric_data_points(&orchestrator, &inputs));
        while let Some(point) = points.next().await {
            let event = match Event::from_data_point(source, &point) {
                Ok(event) => event.redacted(&redact_keys),
                Err(e) => {
                    error!("Failed to serialize data point: {e}");
                    continue;
                }
            };
            if tx.send(event).await.is_err() {
                break;
            }
            count += 1;
        }
        return (operation, count);
    }

    let tenant = orchestrator.tenant().to_string();
    let mut records = pin!(orchestrator.run(operation.plan(&inputs)));
    while let Some(record) = records.next().await {
        let event = Event::from_record(source, &tenant, record).redacted(&redact_keys);
        if tx.send(event).await.is_err() {
            break;
        }
        count += 1;
    }
    (operation, count)
}

/// Writes one JSON document per line to stdout until every sender is gone.
async fn write_events(mut rx: mpsc::Receiver<Event>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = rx.recv().await {
        let mut line = match serde_json::to_vec(&event) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize event: {e}");
                continue;
            }
        };
        line.push(b'\n');
        stdout.write_all(&line).await?;
    }
    stdout.flush().await
}
