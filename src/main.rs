//! Plinko entry point
//!
//! On the web this only installs logging; the page drives a `PlinkoGame`
//! handle. Natively it runs a seeded headless session from the command line.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::path::PathBuf;
    use std::time::Duration;

    use clap::Parser;

    use plinko::cashout::HttpTransport;
    use plinko::tuning::payout_row;
    use plinko::{
        Amount, CashOutConfig, LaunchParams, PlinkoError, RiskLevel, RowCount, Session,
        SessionConfig,
    };

    #[derive(Parser)]
    #[command(name = "plinko")]
    #[command(about = "Run a seeded headless Plinko session")]
    #[command(version)]
    pub struct Cli {
        /// Peg rows (8-16)
        #[arg(short, long, default_value_t = 16)]
        rows: u8,

        /// Risk level: low, medium or high
        #[arg(long, default_value = "medium")]
        risk: String,

        /// Stake per ball in tokens
        #[arg(short, long, default_value = "1")]
        bet: String,

        /// Number of balls to drop
        #[arg(short = 'n', long, default_value_t = 100)]
        balls: u32,

        /// Simulation ticks between drops
        #[arg(long, default_value_t = 12)]
        interval: u32,

        /// RNG seed
        #[arg(short, long, default_value_t = 1)]
        seed: u64,

        /// Starting balance in whole tokens (default 200)
        #[arg(short, long)]
        tokens: Option<String>,

        /// Wallet endpoint; with --uid, cash out at the end of the run
        #[arg(long)]
        cloud_function: Option<String>,

        /// Player id sent to the wallet
        #[arg(long)]
        uid: Option<String>,

        /// Wallet request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Write the final balance snapshot here
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    }

    pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
        let level = if cli.verbose { "debug" } else { "info" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

        let rows = RowCount::new(cli.rows)?;
        let risk = RiskLevel::parse(&cli.risk)
            .ok_or_else(|| PlinkoError::config(format!("unknown risk level '{}'", cli.risk)))?;
        let bet = Amount::parse_tokens(&cli.bet)
            .ok_or_else(|| PlinkoError::config(format!("bet '{}' is not a number", cli.bet)))?;

        let cash_out_requested = cli.cloud_function.is_some() || cli.uid.is_some();
        let params = LaunchParams {
            tokens: cli.tokens,
            cloud_function: cli.cloud_function,
            uid: cli.uid,
        };
        let config = SessionConfig {
            seed: cli.seed,
            rows,
            risk,
            bet_amount: bet,
            cash_out: CashOutConfig {
                timeout: Duration::from_secs(cli.timeout),
                ..CashOutConfig::default()
            },
        };
        let mut session = Session::new(config, params)?;
        let opening = session.balance();

        let mut dropped = 0;
        while dropped < cli.balls {
            let drop = match session.drop_ball() {
                // Wait for the balls in flight to pay out, then try again
                Err(PlinkoError::InsufficientBalance { .. }) if !session.is_idle() => {
                    session.run_until_idle();
                    session.drop_ball()
                }
                other => other,
            };
            if let Err(e) = drop {
                log::warn!("Stopping after {} drops: {}", dropped, e);
                break;
            }
            dropped += 1;
            for _ in 0..cli.interval {
                session.tick();
            }
        }
        session.run_until_idle();

        report(&session, opening)?;

        if cash_out_requested {
            let transport = HttpTransport::new(&session.config().cash_out)?;
            match session.cash_out(&transport).await {
                Ok(handoff) => println!(
                    "Cashed out {} tokens, hand off to {}",
                    handoff.final_balance, handoff.redirect_uri
                ),
                Err(e) => eprintln!("Cash out failed: {}", e),
            }
        }

        if let Some(path) = cli.snapshot {
            session.end().save_to(&path)?;
        }
        Ok(())
    }

    fn report(session: &Session, opening: Amount) -> Result<(), PlinkoError> {
        let rows = session.row_count();
        let records = session.win_records();
        let payouts = payout_row(session.risk_level(), rows)?;
        let probabilities = session.bin_probabilities();

        println!(
            "{} rows, {} risk, {} drops",
            rows.get(),
            session.risk_level().as_str(),
            records.len()
        );
        println!("{:>4} {:>8} {:>6} {:>7}", "bin", "payout", "hits", "freq");
        for (bin, (multiplier, p)) in payouts.iter().zip(&probabilities).enumerate() {
            let hits = records.iter().filter(|r| r.bin_index == bin).count();
            println!(
                "{:>4} {:>8} {:>6} {:>6.2}%",
                bin,
                multiplier.to_string(),
                hits,
                p * 100.0
            );
        }

        let forced = records.iter().filter(|r| r.forced).count();
        if forced > 0 {
            println!("{} ball(s) were forced to the floor", forced);
        }
        for refund in session.refunds() {
            println!(
                "Ball {} refunded {}: {}",
                refund.ball_id, refund.amount, refund.reason
            );
        }
        println!("Opening balance: {}", opening);
        println!("Final balance:   {}", session.balance());
        println!("Total profit:    {}", session.ledger().total_profit());
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialised".into());
    }
    log::info!("Plinko starting...");
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use clap::Parser;

    headless::run(headless::Cli::parse()).await
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
