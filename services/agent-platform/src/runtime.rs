//! Agent runtime
//!
//! One tokio task per running agent. Each tick fetches a fresh market
//! snapshot, lets the strategy decide, and executes the resulting intents
//! through the exchange client. Ticks never overlap for a single agent;
//! stop and pause raise a cooperative flag that is honored at the next tick
//! boundary, with a hard timeout for stuck ticks.

use crate::client::{ClientError, ExchangeClient, PlaceOrderBody};
use crate::registry::{AgentRecord, AgentRegistry, AgentStatus};
use crate::strategies::registry::{build as build_strategy, StrategyError};
use crate::strategies::{MarketContext, OrderIntent, Strategy};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use types::ids::AgentId;
use types::order::{OrderType, Side};

/// Hard limit on intents executed per tick
pub const MAX_INTENTS_PER_TICK: usize = 32;

/// Order book depth fetched for snapshots
const SNAPSHOT_DEPTH: usize = 10;

/// Recent-trade window fetched per ticker
const SNAPSHOT_TRADES: usize = 20;

/// How long stop waits for an in-flight tick before abandoning it
pub const STOP_TIMEOUT: Duration = Duration::from_secs(30);

struct RunningTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Spawns and supervises agent tick loops
pub struct AgentRunner {
    registry: Arc<AgentRegistry>,
    tasks: DashMap<AgentId, RunningTask>,
}

impl AgentRunner {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            tasks: DashMap::new(),
        }
    }

    /// Build the agent's strategy and spawn its tick loop.
    /// The caller has already transitioned the record to RUNNING.
    pub fn start(&self, record: &AgentRecord) -> Result<(), StrategyError> {
        // A previous task may have exited on its own (ERROR trip)
        let already_running = self
            .tasks
            .get(&record.id)
            .is_some_and(|task| !task.handle.is_finished());
        if already_running {
            return Ok(());
        }
        self.tasks.remove(&record.id);

        let strategy = build_strategy(
            &record.strategy_type,
            &record.strategy_params,
            record.strategy_source.as_deref(),
        )?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let registry = self.registry.clone();
        let client = ExchangeClient::new(record.exchange_url.clone(), record.api_key.clone());
        let agent_id = record.id;
        let agent_name = record.name.clone();
        let interval = record.interval_seconds.max(0.1);

        let handle = tokio::spawn(async move {
            run_agent_loop(registry, client, strategy, agent_id, agent_name, interval, stop_rx)
                .await;
        });

        self.tasks.insert(record.id, RunningTask { stop_tx, handle });
        Ok(())
    }

    /// Signal the loop to exit and wait for the in-flight tick, abandoning
    /// it after `STOP_TIMEOUT`.
    pub async fn stop(&self, id: &AgentId) {
        let Some((_, task)) = self.tasks.remove(id) else {
            return;
        };
        let _ = task.stop_tx.send(true);

        let abort = task.handle.abort_handle();
        if tokio::time::timeout(STOP_TIMEOUT, task.handle).await.is_err() {
            tracing::warn!(agent_id = %id, "tick did not finish within stop timeout; abandoning");
            abort.abort();
        }
    }

    /// Signal the loop to exit without waiting (pause keeps the record's
    /// PAUSED status; the task drains its in-flight tick and exits).
    pub fn signal(&self, id: &AgentId) {
        if let Some((_, task)) = self.tasks.remove(id) {
            let _ = task.stop_tx.send(true);
        }
    }
}

async fn run_agent_loop(
    registry: Arc<AgentRegistry>,
    client: ExchangeClient,
    mut strategy: Strategy,
    agent_id: AgentId,
    agent_name: String,
    interval_seconds: f64,
    mut stop_rx: watch::Receiver<bool>,
) {
    tracing::info!(agent = %agent_name, kind = strategy.kind(), "agent started");
    let interval = Duration::from_secs_f64(interval_seconds);

    loop {
        if *stop_rx.borrow() {
            break;
        }
        // The record is the source of truth for lifecycle state
        if registry.status(&agent_id) != Some(AgentStatus::Running) {
            break;
        }

        let tick_started = Instant::now();
        match run_tick(&client, &mut strategy, &agent_name).await {
            Ok(orders_placed) => {
                registry.record_tick(&agent_id, orders_placed);
            }
            Err(e) => {
                tracing::warn!(agent = %agent_name, error = %e, "tick failed");
                if registry.record_tick_error(&agent_id, &e.to_string(), Utc::now()) {
                    break;
                }
            }
        }

        let elapsed = tick_started.elapsed();
        if elapsed > interval {
            tracing::warn!(
                agent = %agent_name,
                elapsed_ms = elapsed.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "tick overran its interval"
            );
        }

        let sleep_for = interval.saturating_sub(elapsed);
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(sleep_for) => {}
        }
    }

    tracing::info!(agent = %agent_name, "agent loop exited");
}

/// One tick: snapshot → decide → execute
async fn run_tick(
    client: &ExchangeClient,
    strategy: &mut Strategy,
    agent_name: &str,
) -> Result<u64, ClientError> {
    let ctx = gather_context(client).await?;
    let intents = strategy.on_tick(&ctx, Utc::now());

    if intents.len() > MAX_INTENTS_PER_TICK {
        tracing::warn!(
            agent = agent_name,
            produced = intents.len(),
            executed = MAX_INTENTS_PER_TICK,
            "intent budget exceeded; dropping surplus"
        );
    }

    let mut orders_placed = 0u64;
    let mut first_error: Option<ClientError> = None;

    for intent in intents.into_iter().take(MAX_INTENTS_PER_TICK) {
        let result = execute_intent(client, agent_name, intent).await;
        match result {
            Ok(placed) => orders_placed += placed,
            Err(e) => {
                // Keep executing the remaining intents; the tick still
                // counts as failed for the error budget
                tracing::warn!(agent = agent_name, error = %e, "intent failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(orders_placed),
    }
}

async fn execute_intent(
    client: &ExchangeClient,
    agent_name: &str,
    intent: OrderIntent,
) -> Result<u64, ClientError> {
    match intent {
        OrderIntent::Place {
            ticker,
            side,
            order_type,
            quantity,
            price,
        } => {
            let body = PlaceOrderBody {
                ticker: ticker.to_string(),
                side: match side {
                    Side::Buy => "BUY".to_string(),
                    Side::Sell => "SELL".to_string(),
                },
                order_type: match order_type {
                    OrderType::Limit => "LIMIT".to_string(),
                    OrderType::Market => "MARKET".to_string(),
                },
                quantity,
                price: price.map(|p| p.to_string()),
            };
            let order = client.place_order(&body).await?;
            tracing::info!(
                agent = agent_name,
                ticker = %order.ticker,
                side = %order.side,
                quantity = order.quantity,
                status = %order.status,
                "order placed"
            );
            Ok(1)
        }
        OrderIntent::Cancel { order_id } => {
            client.cancel_order(&order_id).await?;
            tracing::info!(agent = agent_name, order_id = %order_id, "order cancelled");
            Ok(0)
        }
    }
}

/// Fetch the complete market snapshot for one tick
async fn gather_context(client: &ExchangeClient) -> Result<MarketContext, ClientError> {
    let account = client.get_account().await?;
    let holdings = client.get_holdings().await?;
    let companies = client.get_companies().await?;
    let open_orders = client.get_open_orders().await?;

    let mut orderbooks = HashMap::new();
    let mut recent_trades = HashMap::new();
    for company in &companies {
        // A ticker with no book yet should not fail the whole snapshot
        match client.get_orderbook(&company.ticker, SNAPSHOT_DEPTH).await {
            Ok(book) => {
                orderbooks.insert(company.ticker.clone(), book);
            }
            Err(e) if e.is_client_error() => {}
            Err(e) => return Err(e),
        }
        match client.get_trades(&company.ticker, SNAPSHOT_TRADES).await {
            Ok(trades) => {
                recent_trades.insert(company.ticker.clone(), trades);
            }
            Err(e) if e.is_client_error() => {}
            Err(e) => return Err(e),
        }
    }

    Ok(MarketContext {
        account,
        holdings,
        companies,
        orderbooks,
        open_orders,
        recent_trades,
    })
}
