// src/main.rs
use clap::Parser;
use solana_sdk::native_token::{lamports_to_sol, sol_to_lamports};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use testore_miner_rs::cli::{Action, Commands, ConfigOptions};
use testore_miner_rs::config::{self, Config, load_keypair};
use testore_miner_rs::miner::{Algorithm, Keccak, MiningPool};
use testore_miner_rs::network::program::initialize_miner_ix;
use testore_miner_rs::network::{Ledger, ProgramAccounts, ProofSubmitter, RpcLedger, SubmitOutcome};
use testore_miner_rs::stats::{HashCounter, RunSnapshot, StatsReporter, StatsTracker, rank_miners};
use testore_miner_rs::stats::{CycleOutcome, airdrop_allocation};
use testore_miner_rs::supervisor::{CycleResult, MiningSupervisor};
use testore_miner_rs::utils::{MinerError, StopSignal, init_logging, listen_for_interrupt};

/// Main entry point for the TestORE miner
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Maps the result to an exit status: 0 on success or clean stop,
///    1 on failure
fn main() -> ExitCode {
    let cli = Commands::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            if let Some(hint) = hint(&e) {
                log::error!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Commands) -> Result<ExitCode, MinerError> {
    if let Action::Config(opts) = &cli.action {
        return generate_config(opts);
    }

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let session = Session::open(&config)?;
    match cli.action {
        Action::Init => init(&session, &config),
        Action::Mine(opts) => mine(&session, &config, opts.forever),
        Action::Airdrop(opts) => airdrop(&session, opts.amount),
        Action::Balance => balance(&session),
        Action::Stats => stats(&session, &config),
        Action::Leaderboard(opts) => leaderboard(&session, opts.top),
        Action::Config(_) => Ok(ExitCode::SUCCESS),
    }
}

/// Suggested fix for errors an operator can act on
fn hint(e: &MinerError) -> Option<&'static str> {
    match e {
        MinerError::AccountNotInitialized(_) => Some("Run `testore-miner init` first"),
        MinerError::ConfigError(msg) if msg.contains("program_id") => {
            Some("Set program_id in testore.toml (see `testore-miner config`)")
        }
        MinerError::ConfigError(msg) if msg.contains("fee payer") => {
            Some("Fund the wallet with `testore-miner airdrop 1`")
        }
        _ => None,
    }
}

/// Everything a ledger command needs
struct Session {
    ledger: Arc<RpcLedger>,
    keypair: Arc<Keypair>,
    accounts: ProgramAccounts,
}

impl Session {
    fn open(config: &Config) -> Result<Self, MinerError> {
        let program_id = config.program_id()?;
        let keypair = load_keypair(&config.keypair_path())?;
        let ledger = RpcLedger::new(&config.rpc_url, program_id, config.rpc_timeout())?;
        let accounts = ProgramAccounts::derive(&program_id, &keypair.pubkey());

        log::debug!(
            "Wallet {} on {}, miner account {}",
            accounts.authority,
            ledger.url(),
            accounts.miner
        );

        Ok(Session {
            ledger: Arc::new(ledger),
            keypair: Arc::new(keypair),
            accounts,
        })
    }

    fn authority(&self) -> Pubkey {
        self.accounts.authority
    }

    fn submitter(
        &self,
        config: &Config,
        algorithm: Arc<dyn Algorithm>,
        stop: StopSignal,
    ) -> ProofSubmitter<RpcLedger> {
        ProofSubmitter::new(
            self.ledger.clone(),
            self.keypair.clone(),
            self.accounts,
            algorithm,
            config.submit.clone(),
            stop,
        )
        .with_min_interval(config.min_submit_interval())
    }
}

/// Creates the miner account unless it already exists
fn init(session: &Session, config: &Config) -> Result<ExitCode, MinerError> {
    match session.ledger.account_state(&session.accounts) {
        Ok(state) => {
            log::info!(
                "Miner account {} already exists ({} hashes, {} rounds)",
                session.accounts.miner,
                state.total_hashes,
                state.rounds_completed
            );
            return Ok(ExitCode::SUCCESS);
        }
        Err(MinerError::AccountNotInitialized(_)) => {}
        Err(e) => return Err(e),
    }

    let mut submitter = session.submitter(config, Arc::new(Keccak), StopSignal::new());
    match submitter.submit_instruction(initialize_miner_ix(&session.accounts))? {
        SubmitOutcome::Accepted { signature, .. } => {
            log::info!(
                "Miner account {} created: {}",
                session.accounts.miner,
                signature
            );
            Ok(ExitCode::SUCCESS)
        }
        SubmitOutcome::Rejected { reason, .. } => {
            log::error!("Initialization rejected: {}", reason);
            Ok(ExitCode::FAILURE)
        }
        SubmitOutcome::Aborted {
            attempts,
            last_error,
        } => {
            log::error!(
                "Initialization gave up after {} attempt(s): {}",
                attempts,
                last_error
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Mines one cycle, or cycles until interrupted with `forever`
///
/// # Operations
/// 1. Sets up the interrupt listener and statistics reporting
/// 2. Builds the pool, submitter and supervisor
/// 3. Runs and writes the final run snapshot
fn mine(session: &Session, config: &Config, forever: bool) -> Result<ExitCode, MinerError> {
    let stop = StopSignal::new();
    listen_for_interrupt(stop.clone())?;

    let algorithm: Arc<dyn Algorithm> = Arc::new(Keccak);
    let hashes = HashCounter::new();
    let tracker = StatsTracker::new(hashes.clone());

    let reporter = StatsReporter::new(tracker.clone(), config.report_interval());
    let reporter_stop = StopSignal::new();
    let reporter_handle = reporter.start(reporter_stop.clone())?;

    let pool = MiningPool::new(
        algorithm.clone(),
        config.worker_threads(),
        hashes,
        stop.clone(),
    );
    let submitter = session.submitter(config, algorithm, stop.clone());
    let mut supervisor = MiningSupervisor::new(
        session.ledger.clone(),
        session.accounts,
        pool,
        submitter,
        tracker,
        stop,
        config.supervisor_config(),
    );

    let result = if forever {
        supervisor.run_forever().map(|_| ExitCode::SUCCESS)
    } else {
        supervisor.run_once().map(|result| match result {
            CycleResult::Completed(CycleOutcome::Accepted) => ExitCode::SUCCESS,
            CycleResult::Completed(outcome) => {
                log::warn!("Cycle ended without an accepted proof: {:?}", outcome);
                ExitCode::FAILURE
            }
            CycleResult::Interrupted => ExitCode::SUCCESS,
        })
    };

    reporter_stop.stop();
    if reporter_handle.join().is_err() {
        log::warn!("Reporter thread panicked");
    }

    let snapshot = supervisor.stats().snapshot();
    match snapshot.save(Path::new(&config.stats_file)) {
        Ok(()) => log::info!("Run statistics written to {}", config.stats_file),
        Err(e) => log::warn!("Could not write {}: {}", config.stats_file, e),
    }
    print_snapshot(&snapshot);

    result
}

fn airdrop(session: &Session, amount: f64) -> Result<ExitCode, MinerError> {
    if amount.is_nan() || amount <= 0.0 {
        return Err(MinerError::ConfigError(format!(
            "airdrop amount must be positive, got {}",
            amount
        )));
    }
    let lamports = sol_to_lamports(amount);
    log::info!("Requesting {} SOL for {}", amount, session.authority());

    let signature = session.ledger.request_airdrop(&session.authority(), lamports)?;
    log::info!("Airdrop confirmed: {}", signature);
    balance(session)
}

fn balance(session: &Session) -> Result<ExitCode, MinerError> {
    let lamports = session.ledger.balance(&session.authority())?;
    println!("{} SOL ({})", lamports_to_sol(lamports), session.authority());
    Ok(ExitCode::SUCCESS)
}

fn stats(session: &Session, config: &Config) -> Result<ExitCode, MinerError> {
    let state = session.ledger.account_state(&session.accounts)?;
    println!("Miner:            {}", session.accounts.miner);
    println!("Authority:        {}", state.authority);
    println!("Total hashes:     {}", state.total_hashes);
    println!("Rounds completed: {}", state.rounds_completed);
    println!("Current streak:   {}", state.current_streak);
    println!("Best difficulty:  {} bits", state.best_difficulty);
    println!("Current round:    {} (min {} bits)", state.round_number, state.min_difficulty);
    println!("Est. allocation:  {} tokens", airdrop_allocation(state.total_hashes));

    let path = Path::new(&config.stats_file);
    if path.exists() {
        println!();
        println!("Last local run ({}):", config.stats_file);
        print_snapshot(&RunSnapshot::load(path)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn leaderboard(session: &Session, top: usize) -> Result<ExitCode, MinerError> {
    let entries = rank_miners(session.ledger.miner_accounts()?, top);
    if entries.is_empty() {
        println!("No miners yet");
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:>4}  {:<44}  {:>14}  {:>7}  {:>4}  {:>10}",
        "Rank", "Authority", "Hashes", "Rounds", "Best", "Allocation"
    );
    for entry in entries {
        let marker = if entry.authority == session.authority() { " *" } else { "" };
        println!(
            "{:>4}  {:<44}  {:>14}  {:>7}  {:>4}  {:>10}{}",
            entry.rank,
            entry.authority.to_string(),
            entry.total_hashes,
            entry.rounds_completed,
            entry.best_difficulty,
            entry.allocation,
            marker
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Writes the configuration template to `opts.output`
fn generate_config(opts: &ConfigOptions) -> Result<ExitCode, MinerError> {
    std::fs::write(&opts.output, config::generate_template())?;
    println!("Configuration template written to {}", opts.output.display());
    Ok(ExitCode::SUCCESS)
}

fn print_snapshot(snapshot: &RunSnapshot) {
    println!(
        "Cycles: {} | Accepted: {} | Rejected: {} | Aborted: {} | Timeouts: {} | Failed: {}",
        snapshot.cycles_completed,
        snapshot.proofs_accepted,
        snapshot.proofs_rejected,
        snapshot.submissions_aborted,
        snapshot.search_timeouts,
        snapshot.cycle_failures
    );
    println!(
        "Hashes: {} in {:.1}s ({:.1} H/s)",
        snapshot.total_hashes, snapshot.elapsed_secs, snapshot.hash_rate
    );
}
