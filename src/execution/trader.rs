use std::io::Write;
use std::time::Duration;

use crate::api::Exchange;
use crate::config::Settings;
use crate::error::CycleError;
use crate::indicators::FibonacciLevels;
use crate::models::{Balances, OpenOrder, OpenPosition, OrderSide, SignalEvent};
use crate::strategy::Strategy;

/// What the trader trades and how it asks for candles
#[derive(Debug, Clone)]
pub struct TraderConfig {
    pub pair: String,
    pub currency: String,
    pub trade_size: f64,
    pub interval: u32,
    pub since: Option<i64>,
}

impl TraderConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            pair: settings.pair.clone(),
            currency: settings.currency.clone(),
            trade_size: settings.trade_size,
            interval: settings.interval,
            since: None,
        }
    }
}

/// Outcome of one completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub candle_count: usize,
    pub fib_levels: FibonacciLevels,
    pub starting_balance: Balances,
    pub cancelled_orders: Vec<String>,
    pub signals: Vec<SignalEvent>,
    pub open_positions: Vec<OpenPosition>,
    pub final_balance: Balances,
}

/// Runs the fetch -> analyze -> report cycle against one exchange
pub struct Trader<E, S> {
    exchange: E,
    strategy: S,
    config: TraderConfig,
}

impl<E: Exchange, S: Strategy> Trader<E, S> {
    pub fn new(exchange: E, strategy: S, config: TraderConfig) -> Self {
        Self {
            exchange,
            strategy,
            config,
        }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Run a single cycle, writing the human-readable report to `out`.
    ///
    /// Any exchange or computation fault aborts the cycle at the step where
    /// it happened; nothing after that step runs. Signals are only evaluated
    /// once the balance is printed and open orders are cancelled.
    pub async fn run_cycle<W: Write>(&self, out: &mut W) -> Result<CycleReport, CycleError> {
        let pair = &self.config.pair;

        let candles = self
            .exchange
            .fetch_candles(pair, self.config.interval, self.config.since)
            .await?;
        tracing::info!("Fetched {} candles for {}", candles.len(), pair);

        let analysis = self.strategy.analyze(&candles)?;
        for level in &analysis.fib_levels.levels {
            tracing::debug!("  Fib {:.3} -> {:.4}", level.ratio, level.price);
        }

        let starting_balance = self.exchange.fetch_balance().await?;
        writeln!(out, "Account balance: {}", format_balances(&starting_balance))?;

        let open_orders = self.exchange.fetch_open_orders(pair).await?;
        let mut cancelled_orders = Vec::new();
        if !open_orders.is_empty() {
            writeln!(out, "Open orders: {}", format_orders(&open_orders))?;
            for order in &open_orders {
                let ack = self.exchange.cancel_order(&order.txid).await?;
                tracing::info!(
                    "Cancelled {} (count={}, pending={})",
                    order.txid,
                    ack.count,
                    ack.pending
                );
                cancelled_orders.push(order.txid.clone());
            }
            writeln!(out, "Cancelled open orders.")?;
        }

        let signals = self.strategy.evaluate(&candles, &analysis)?;
        for signal in &signals {
            self.report_signal(out, signal)?;
        }

        let open_positions = self.exchange.fetch_open_positions().await?;
        if !open_positions.is_empty() {
            writeln!(out, "Open positions: {}", format_positions(&open_positions))?;
            for position in &open_positions {
                self.report_close(out, position, analysis.last_close)?;
            }
            writeln!(out, "Open positions left unchanged.")?;
        }

        let final_balance = self.exchange.fetch_balance().await?;
        writeln!(out, "Final account balance: {}", format_balances(&final_balance))?;

        Ok(CycleReport {
            candle_count: candles.len(),
            fib_levels: analysis.fib_levels,
            starting_balance,
            cancelled_orders,
            signals,
            open_positions,
            final_balance,
        })
    }

    /// Run cycles until Ctrl+C, sleeping `wait` between them.
    ///
    /// A failed cycle is logged and the loop carries on after the delay,
    /// unless `fail_fast` is set, in which case the error is returned.
    pub async fn run_forever(&self, wait: Duration, fail_fast: bool) -> Result<(), CycleError> {
        tokio::select! {
            result = self.cycle_loop(wait, fail_fast) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                Ok(())
            }
        }
    }

    async fn cycle_loop(&self, wait: Duration, fail_fast: bool) -> Result<(), CycleError> {
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            tracing::info!(
                "🔄 Cycle {} | {} {}m | {}",
                cycle,
                self.config.pair,
                self.config.interval,
                self.strategy.name()
            );

            let mut stdout = std::io::stdout();
            match self.run_cycle(&mut stdout).await {
                Ok(report) => tracing::info!(
                    candles = report.candle_count,
                    signals = report.signals.len(),
                    cancelled = report.cancelled_orders.len(),
                    "Cycle {} complete",
                    cycle
                ),
                Err(e) if fail_fast => return Err(e),
                Err(e) => tracing::error!("Cycle {} failed: {}", cycle, e),
            }

            tracing::debug!("Sleeping {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    fn report_signal<W: Write>(&self, out: &mut W, signal: &SignalEvent) -> std::io::Result<()> {
        let (label, verb) = match signal.side {
            OrderSide::Sell => ("Sell", "sell"),
            OrderSide::Buy => ("Buy", "buy"),
        };

        writeln!(out, "{} signal detected at {:.4}.", label, signal.price)?;
        writeln!(
            out,
            "Did not {} {} {} at {:.4}: order placement is disabled.",
            verb, self.config.trade_size, self.config.currency, signal.price
        )
    }

    fn report_close<W: Write>(
        &self,
        out: &mut W,
        position: &OpenPosition,
        price: f64,
    ) -> std::io::Result<()> {
        let kind = match position.side {
            OrderSide::Sell => "short",
            OrderSide::Buy => "long",
        };

        writeln!(
            out,
            "Would {} {} {} to close {} position {} at {:.4}: order placement is disabled.",
            position.side.opposite(),
            position.volume,
            self.config.currency,
            kind,
            position.txid,
            price
        )
    }
}

fn format_balances(balances: &Balances) -> String {
    if balances.is_empty() {
        return "(empty)".to_string();
    }

    balances
        .iter()
        .map(|(asset, amount)| format!("{} {}", asset, amount))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_orders(orders: &[OpenOrder]) -> String {
    orders
        .iter()
        .map(|o| format!("{} ({} {} {})", o.txid, o.side, o.volume, o.pair))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_positions(positions: &[OpenPosition]) -> String {
    positions
        .iter()
        .map(|p| format!("{} ({} {} {})", p.txid, p.side, p.volume, p.pair))
        .collect::<Vec<_>>()
        .join(", ")
}
