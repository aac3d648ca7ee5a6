// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::io::{self, BufRead};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use wallet_engine::chains::{Chain, TokenInfo};
use wallet_engine::config::{EngineConfig, LOG_FORMAT_ENV};
use wallet_engine::error::WalletResult;
use wallet_engine::logging::{self, LogFormat};
use wallet_engine::state::WalletEngine;
use wallet_engine::storage::{ChainAddress, StoreError};
use wallet_engine::transfer::{SendGuard, TransferRequest, TransferStatus};

#[derive(Parser)]
#[command(name = "wallet-engine")]
#[command(about = "Self-custody Solana and Sui wallet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a recovery phrase and store it as a new wallet
    Create,
    /// Import a recovery phrase (read from stdin when omitted)
    Import {
        #[arg(long)]
        phrase: Option<String>,
    },
    /// List wallets
    Wallets,
    /// Add the next account to a wallet
    AddAccount {
        #[arg(long)]
        wallet: String,
    },
    /// Make an account the active one
    Switch { account: String },
    /// Addresses of the active account
    Addresses,
    /// Encrypt a wallet's recovery phrase under a password
    Export {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        password: String,
    },
    /// Decrypt a backup blob
    Decrypt {
        blob: String,
        #[arg(long)]
        password: String,
    },
    /// Signed login payload for the active account
    Login,
    /// Signed link request for the active account's secondary addresses
    Link,
    /// Quote the network fee of a transfer
    Fee(TransferArgs),
    /// Send a transfer from the active account and wait for confirmation
    Send(TransferArgs),
    /// Recently used recipients
    Recent {
        #[arg(long, value_enum)]
        chain: ChainArg,
    },
    /// Delete every wallet, account, and recent recipient
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ChainArg {
    Solana,
    Sui,
}

impl From<ChainArg> for Chain {
    fn from(arg: ChainArg) -> Self {
        match arg {
            ChainArg::Solana => Chain::Solana,
            ChainArg::Sui => Chain::Sui,
        }
    }
}

#[derive(clap::Args)]
struct TransferArgs {
    #[arg(long, value_enum)]
    chain: ChainArg,
    #[arg(long)]
    to: String,
    #[arg(long)]
    amount: String,
    /// Mint (Solana) or coin type (Sui); the native asset when omitted
    #[arg(long)]
    token: Option<String>,
    #[arg(long, requires = "token")]
    decimals: Option<u8>,
}

impl TransferArgs {
    fn token(&self, engine: &WalletEngine) -> TokenInfo {
        let chain = Chain::from(self.chain);
        let ops = engine.chains().get(chain);
        match (&self.token, self.decimals) {
            (Some(address), Some(decimals)) => TokenInfo::new(address, "", "", decimals),
            (Some(address), None) => TokenInfo::new(address, "", "", ops.native_token().decimals),
            _ => ops.native_token(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref()));

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, retryable = e.is_retryable(), "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> WalletResult<()> {
    let engine = WalletEngine::open(EngineConfig::from_env()?)?;

    match cli.command {
        Commands::Create => {
            let phrase = engine.generate_mnemonic()?;
            let account = engine.import_wallet(&phrase)?;
            println!("{}", phrase.as_str());
            print_json(&account)
        }
        Commands::Import { phrase } => {
            let phrase = match phrase {
                Some(phrase) => phrase,
                None => read_line()?,
            };
            print_json(&engine.import_wallet(&phrase)?)
        }
        Commands::Wallets => print_json(&engine.wallets()?),
        Commands::AddAccount { wallet } => print_json(&engine.add_account(&wallet)?),
        Commands::Switch { account } => print_json(&engine.switch_account(&account)?),
        Commands::Addresses => print_json(&engine.current_addresses()?),
        Commands::Export { wallet, password } => {
            println!("{}", engine.export_backup(&wallet, &password)?);
            Ok(())
        }
        Commands::Decrypt { blob, password } => {
            println!("{}", engine.decrypt_backup(&blob, &password)?.as_str());
            Ok(())
        }
        Commands::Login => print_json(&engine.login_params()?),
        Commands::Link => {
            let none: [ChainAddress; 0] = [];
            print_json(&engine.link_request(&none)?)
        }
        Commands::Fee(args) => {
            let from = engine.current_key(args.chain.into())?;
            let token = args.token(&engine);
            let fee = engine
                .estimate_fee(&from.address, &args.to, &args.amount, Some(&token))
                .await?;
            print_json(&fee)
        }
        Commands::Send(args) => send(&engine, args).await,
        Commands::Recent { chain } => print_json(&engine.recent_recipients(chain.into())?),
        Commands::Reset { yes } => {
            if !yes {
                eprintln!("refusing to reset without --yes");
                return Ok(());
            }
            engine.reset()
        }
    }
}

async fn send(engine: &WalletEngine, args: TransferArgs) -> WalletResult<()> {
    let from = engine.current_key(args.chain.into())?;
    let token = args.token(engine);
    let fee_hint = engine
        .estimate_fee(&from.address, &args.to, &args.amount, Some(&token))
        .await?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let guard = SendGuard::new();
    let request = TransferRequest {
        from_address: from.address.clone(),
        to_address: args.to.clone(),
        ui_amount: args.amount.clone(),
        token: Some(token),
        fee_hint: Some(fee_hint),
    };
    let pending = engine.send(&guard, request, cancel).await;
    watcher.abort();
    let pending = pending?;

    println!("{}", pending.explorer_url);
    match pending.wait().await? {
        TransferStatus::Confirmed => eprintln!("confirmed"),
        TransferStatus::Pending => eprintln!("not confirmed yet; it may still land"),
    }
    Ok(())
}

fn read_line() -> WalletResult<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(StoreError::from)?;
    Ok(line.trim().to_string())
}

fn print_json<T: Serialize>(value: &T) -> WalletResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
