//! Tradebook CLI
//!
//! Thin orchestrator over the library: records trade plans, previews them on
//! Telegram, optionally places the order on Mercado Bitcoin, and reports on
//! the journal.

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradebook::config::{load_config, TradingConfig};
use tradebook::domain::trade::{Side, TradeStatus};
use tradebook::infrastructure::mercado_client::MercadoBitcoinClient;
use tradebook::infrastructure::messaging;
use tradebook::persistence::models::{CreateTrade, TradeRecord};
use tradebook::persistence::repository::{ExportFormat, TradeLedger};
use tradebook::persistence::init_database;

#[derive(Debug, Parser)]
#[command(
    name = "tradebook",
    about = "Personal trade journal and order-execution assistant for Mercado Bitcoin"
)]
struct Cli {
    /// Path to the JSON config file (default: config/config.json, or
    /// TRADING_SUPPORT_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a trade thesis, send the pre-trade brief, and optionally execute
    Plan {
        /// Trading symbol (ex: BTCBRL)
        #[arg(long)]
        asset: String,
        /// Direction of the trade (buy or sell)
        #[arg(long)]
        side: Side,
        /// Position size in asset units
        #[arg(long)]
        size: f64,
        /// Target entry price
        #[arg(long)]
        entry_price: f64,
        /// Planned exit logic
        #[arg(long)]
        exit_logic: String,
        /// Narrative for the decision
        #[arg(long)]
        reasoning: String,
        /// Order type (limit/market)
        #[arg(long, default_value = "limit")]
        order_type: String,
        /// Extra context for the telegram note
        #[arg(long)]
        note: Option<String>,
        /// Force paper trade irrespective of config
        #[arg(long, conflicts_with = "live")]
        paper: bool,
        /// Force a live order irrespective of config
        #[arg(long)]
        live: bool,
        /// Execute immediately, skipping the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Close a trade at an exit price and record realized P&L
    Settle {
        trade_id: String,
        #[arg(long)]
        exit_price: f64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Aggregate performance over settled trades
    Stats,
    /// List trades still waiting for execution
    Pending,
    /// List trades, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<TradeStatus>,
    },
    /// Export the journal to csv or json
    Export {
        #[arg(long, default_value = "data/trades_export.csv")]
        path: PathBuf,
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
    },
    /// Fetch the latest market snapshot for a symbol
    Ticker { symbol: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradebook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let pool = init_database(&config.database_url).await?;
    let ledger = TradeLedger::new(pool);

    match cli.command {
        Command::Plan {
            asset,
            side,
            size,
            entry_price,
            exit_logic,
            reasoning,
            order_type,
            note,
            paper,
            live,
            yes,
        } => {
            plan(
                &config,
                &ledger,
                PlanArgs {
                    asset,
                    side,
                    size,
                    entry_price,
                    exit_logic,
                    reasoning,
                    order_type,
                    note,
                    paper,
                    live,
                    yes,
                },
            )
            .await?
        }
        Command::Settle {
            trade_id,
            exit_price,
            note,
        } => {
            let record = ledger.settle(&trade_id, exit_price, note.as_deref()).await?;
            println!(
                "Trade {} closed with realized P&L: {:.6}",
                trade_id,
                record.realized_pnl.unwrap_or(0.0)
            );
        }
        Command::Stats => {
            let stats = ledger.stats().await?;
            println!("trades       {}", stats.trades);
            println!("total_pnl    {:.2}", stats.total_pnl);
            println!("average_pnl  {:.2}", stats.average_pnl);
            println!("wins         {}", stats.wins);
            println!("losses       {}", stats.losses);
            println!("win_rate     {:.2}", stats.win_rate);
        }
        Command::Pending => {
            let trades = ledger.list(Some(TradeStatus::Pending)).await?;
            if trades.is_empty() {
                println!("No pending trades.");
            } else {
                print_trade_lines(&trades);
            }
        }
        Command::List { status } => {
            let trades = ledger.list(status).await?;
            if trades.is_empty() {
                println!("No trades recorded.");
            } else {
                print_trade_lines(&trades);
            }
        }
        Command::Export { path, format } => {
            let out = ledger.export(&path, format).await?;
            println!("Exported trade history to {}", out.display());
        }
        Command::Ticker { symbol } => {
            let client = MercadoBitcoinClient::new(&config)?;
            let snapshot = client.ticker(&symbol).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

struct PlanArgs {
    asset: String,
    side: Side,
    size: f64,
    entry_price: f64,
    exit_logic: String,
    reasoning: String,
    order_type: String,
    note: Option<String>,
    paper: bool,
    live: bool,
    yes: bool,
}

/// notify -> record -> confirm -> execute-or-paper -> display
async fn plan(
    config: &TradingConfig,
    ledger: &TradeLedger,
    args: PlanArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = config
        .telegram_target
        .as_deref()
        .ok_or("telegram_target is not configured; set it in the config file")?;

    let summary = format_summary(&args);
    println!("Sending the pre-trade brief to Telegram...");
    messaging::send_briefing(&summary, target).await?;

    let record = ledger
        .create(CreateTrade {
            asset: args.asset.clone(),
            side: args.side,
            planned_entry_price: args.entry_price,
            size: args.size,
            reasoning: args.reasoning.clone(),
            exit_logic: args.exit_logic.clone(),
            pre_trade_message: summary,
        })
        .await?;
    println!("Pre-trade briefing recorded (trade id: {}).", record.id);

    if !args.yes && !confirm("Execute trade now?")? {
        println!("Trade left pending. You can settle it later once executed.");
        return Ok(());
    }

    // Explicit flag beats the configured default.
    let use_paper = if args.paper {
        true
    } else if args.live {
        false
    } else {
        config.paper_trade
    };

    if use_paper {
        let record = ledger
            .mark_executed(&record.id, args.entry_price, None)
            .await?;
        println!("Paper trade recorded.");
        display_trade(&record)?;
        return Ok(());
    }

    let client = MercadoBitcoinClient::new(config)?;
    println!("Placing order via Mercado Bitcoin API...");
    let response = client
        .place_order(
            &args.asset,
            args.side,
            args.size,
            Some(args.entry_price),
            &args.order_type,
        )
        .await?;

    let executed_price = response
        .get("price")
        .and_then(price_from_value)
        .unwrap_or(args.entry_price);
    let order_id = response.get("id").and_then(id_from_value);
    info!("Order accepted by exchange: {:?}", order_id);

    let record = ledger
        .mark_executed(&record.id, executed_price, order_id.as_deref())
        .await?;
    println!("Trade executed.");
    display_trade(&record)?;
    Ok(())
}

fn format_summary(args: &PlanArgs) -> String {
    let mut parts = vec![
        format!("[{}] Manual trade plan", Utc::now().to_rfc3339()),
        format!(
            "Asset: {} / Direction: {}",
            args.asset,
            args.side.as_str().to_uppercase()
        ),
        format!("Size: {} | Entry price: {}", args.size, args.entry_price),
        format!("Reasoning: {}", args.reasoning),
        format!("Exit logic: {}", args.exit_logic),
    ];
    if let Some(note) = &args.note {
        parts.push(format!("Notes: {}", note));
    }
    parts.join("\n")
}

fn confirm(prompt: &str) -> std::io::Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn display_trade(record: &TradeRecord) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

fn print_trade_lines(trades: &[TradeRecord]) {
    for trade in trades {
        println!(
            "{}  {}  {}  {}  size {}  planned {}  created {}",
            trade.id,
            trade.status,
            trade.asset,
            trade.side,
            trade.size,
            trade.planned_entry_price,
            trade.created_at.to_rfc3339()
        );
    }
}

fn price_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
