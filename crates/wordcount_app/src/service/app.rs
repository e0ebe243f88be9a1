use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use wordcount_engine::{
    probe_brokers, Pipeline, PipelineError, PipelineReport, RestProxy, RestProxySettings,
    SchemaRegistryClient, WORDS_SCHEMA, WORD_COUNT_SCHEMA,
};
use wordcount_logging::{wc_error, wc_info};

use super::persistence::{prepare_state, save_snapshot};
use super::settings::Settings;
use super::shutdown::spawn_signal_listener;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the service until a termination signal or a fatal pipeline error.
///
/// Every external endpoint is checked before the first record is consumed.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    wc_info!(
        "starting {}: {} -> {} via {}",
        settings.application_id,
        settings.input_topic,
        settings.output_topic,
        settings.rest_proxy_url
    );

    let broker = probe_brokers(&settings.brokers, PROBE_TIMEOUT)
        .await
        .context("kafka brokers unreachable")?;
    wc_info!("using bootstrap broker {}", broker);

    let registry = SchemaRegistryClient::new(settings.schema_registry_url.clone(), PROBE_TIMEOUT)?;
    registry
        .check_reachable()
        .await
        .context("schema registry unreachable")?;
    registry
        .register(&settings.input_subject(), WORDS_SCHEMA)
        .await
        .context("input schema rejected")?;
    let value_schema_id = registry
        .register(&settings.output_subject(), WORD_COUNT_SCHEMA)
        .await
        .context("output schema rejected")?;

    let proxy = RestProxy::new(RestProxySettings::new(settings.rest_proxy_url.clone()))?;
    proxy
        .check_reachable()
        .await
        .context("rest proxy unreachable")?;

    let state = prepare_state(&settings.state_dir, &settings.application_id, settings.reset_state)?;

    let source = proxy
        .subscribe(
            &settings.application_id,
            &settings.client_id(),
            &settings.input_topic,
        )
        .await
        .context("failed to subscribe to input topic")?;
    let sink = proxy.sink(&settings.output_topic, Some(value_schema_id));

    let pipeline = Pipeline::new(
        settings.pipeline_settings(),
        Box::new(source),
        Arc::new(sink),
        state,
    );
    let cancel = CancellationToken::new();
    let signals = spawn_signal_listener(cancel.clone());

    let outcome = pipeline.run(cancel.clone()).await;
    cancel.cancel();
    let _ = signals.await;

    match outcome {
        Ok(report) => {
            log_report(&report);
            save_snapshot(&settings.state_dir, &settings.application_id, &report.state)?;
            Ok(())
        }
        Err(PipelineError::Failed { reason, report }) => {
            log_report(&report);
            // Counts stay valid even when delivery failed.
            if let Err(err) = save_snapshot(&settings.state_dir, &settings.application_id, &report.state) {
                wc_error!("{:#}", err);
            }
            bail!("pipeline failed: {:?}", reason)
        }
        Err(err) => Err(err.into()),
    }
}

fn log_report(report: &PipelineReport) {
    wc_info!(
        "stopped ({:?}): {} records read, {} skipped, {} tokens, {} updates published, {} distinct words",
        report.stop_reason,
        report.records_read,
        report.records_skipped,
        report.tokens_counted,
        report.updates_emitted,
        report.state.len()
    );
}
