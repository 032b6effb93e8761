use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokenpnl::{
    api, config::Config, Address, LedgerSource, MarketData, PnlRunner, RaydiumMarketData,
    RpcClient, RunOutcome, RunSettings, SolanaRpcLedger,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let runner = Arc::new(build_runner(&config));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => serve(config.port, runner).await,
        [wallet, token] => {
            let wallet = Address::parse(wallet).context("Invalid wallet address")?;
            let token = Address::parse(token).context("Invalid token address")?;
            let outcome = runner.run(&wallet, &token).await;
            println!("{}", outcome);
            if !matches!(outcome, RunOutcome::Report(_)) {
                std::process::exit(1);
            }
            Ok(())
        }
        _ => anyhow::bail!("usage: tokenpnl [<wallet> <token>]"),
    }
}

fn build_runner(config: &Config) -> PnlRunner {
    let ledger: Arc<dyn LedgerSource> = Arc::new(SolanaRpcLedger::new(
        RpcClient::new(config.solana_rpc_url.clone()).with_max_elapsed(config.retry_max_elapsed),
        config.transaction_batch_size,
        config.max_signatures,
    ));
    let market: Arc<dyn MarketData> = Arc::new(RaydiumMarketData::new(
        config.raydium_api_url.clone(),
        RpcClient::new(config.historical_rpc_url.clone())
            .with_max_elapsed(config.retry_max_elapsed),
        config.quote_mint.clone(),
    ));
    PnlRunner::new(ledger, market, RunSettings::from(config))
}

async fn serve(port: u16, runner: Arc<PnlRunner>) -> anyhow::Result<()> {
    let app = api::create_router(api::AppState::new(runner));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
