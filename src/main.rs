use lifeline::application_port::*;
use lifeline::domain_model::*;
use lifeline::logger::*;
use lifeline::runtime::*;
use lifeline::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    debug!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let runtime = ClientRuntime::try_new(&project_settings)?;
    let outcome = run_command(&runtime, cli.command).await;

    let shutdown_timeout = std::time::Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, runtime.shutdown()).await {
        Ok(_) => info!("client runtime shutdown successfully"),
        Err(_) => error!("client runtime shutdown timed out"),
    }

    outcome
}

async fn run_command(runtime: &ClientRuntime, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get {
            path,
            query,
            bypass_cache,
        } => {
            let mut request = ApiRequest::get(path);
            for pair in &query {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("query must be key=value: {}", pair))?;
                request = request.with_query(key, value);
            }
            if bypass_cache {
                request.options.cache = CacheMode::Bypass;
            }
            let response = runtime.api.send(request).await?;
            info!("{} ({:?})", response.status, response.source);
            println!("{}", serde_json::to_string_pretty(&response.body)?);
        }
        Command::Probe => {
            let healthy = runtime.probe.probe().await;
            println!("{}", if healthy { "healthy" } else { "unreachable" });
        }
        Command::Flush => {
            let report = runtime.pipeline.flush_offline_queue().await?;
            println!(
                "flushed {} queued writes, {} remaining",
                report.flushed, report.remaining
            );
        }
        Command::Session => {
            let record = runtime.session.snapshot();
            println!("{}", serde_json::to_string_pretty(&record)?);
            println!(
                "authenticated: {} (mode {}, tier {})",
                runtime.session.is_authenticated(),
                runtime.session.auth_mode(),
                runtime.session.persist_tier()
            );
        }
    }
    Ok(())
}
