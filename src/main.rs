use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::{rngs::OsRng, RngCore};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nos_token::{Address, Amount, Chain, GenesisConfig, ObjectId, SignedCall, TokenCall};

//==================== command line ====================//

#[derive(Parser)]
#[command(name = "nos-token")]
#[command(about = "NOS token ledger over a local state file", long_about = None)]
#[command(version)]
struct Cli {
    /// Chain state file
    #[arg(long, global = true, env = "NOS_STATE", default_value = "nos-state.json")]
    state: PathBuf,

    /// 32-byte Ed25519 secret key in hex; the signer is the sender of every call
    #[arg(long, global = true, env = "NOS_SK_HEX")]
    sk_hex: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a keypair and write sk.hex, pk.hex and address
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print the address of --sk-hex
    Address,
    /// Create the token; the signer becomes owner and creator
    Genesis {
        /// TOML genesis config; defaults apply when absent
        #[arg(long)]
        config: Option<PathBuf>,
    },
    TransferOwnership {
        #[arg(long)]
        new_owner: Address,
    },
    /// Pay out of the pool
    Distribute {
        #[arg(long)]
        recipient: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Return a coin to the pool
    Deposit {
        #[arg(long)]
        coin: ObjectId,
    },
    AddMinter {
        #[arg(long)]
        minter: Address,
    },
    RemoveMinter {
        #[arg(long)]
        minter: Address,
    },
    MintFromPool {
        /// Minter to authorize as; defaults to the signer
        #[arg(long)]
        caller: Option<Address>,
        #[arg(long)]
        recipient: Address,
        #[arg(long)]
        amount: Amount,
    },
    Burn {
        #[arg(long)]
        coin: ObjectId,
    },
    /// Move a whole coin without fees
    Transfer {
        #[arg(long)]
        coin: ObjectId,
        #[arg(long)]
        recipient: Address,
    },
    Split {
        #[arg(long)]
        coin: ObjectId,
        #[arg(long)]
        amount: Amount,
    },
    Join {
        #[arg(long)]
        coin: ObjectId,
        #[arg(long)]
        other: ObjectId,
    },
    TransferWithFee {
        #[arg(long)]
        coin: ObjectId,
        #[arg(long)]
        recipient: Address,
    },
    /// Pay several recipients from one coin; --recipient and --amount pair up in order
    BatchTransfer {
        #[arg(long)]
        coin: ObjectId,
        #[arg(long = "recipient", required = true)]
        recipients: Vec<Address>,
        #[arg(long = "amount", required = true)]
        amounts: Vec<Amount>,
    },
    SetTransferFee {
        #[arg(long)]
        bps: u64,
    },
    SetFeeRecipient {
        #[arg(long)]
        recipient: Address,
    },
    SetPause {
        #[arg(long, action = clap::ArgAction::Set)]
        paused: bool,
        #[arg(long, default_value = "")]
        reason: String,
    },
    MintWithFee {
        #[arg(long)]
        caller: Option<Address>,
        #[arg(long)]
        recipient: Address,
        #[arg(long)]
        amount: Amount,
        #[arg(long, default_value_t = 0)]
        fee_bps: u64,
        /// Omit to leave the fee share in the pool
        #[arg(long)]
        fee_recipient: Option<Address>,
    },
    TransferFromPool {
        #[arg(long)]
        recipient: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Read-only queries, printed as JSON
    Query {
        #[command(subcommand)]
        query: Query,
    },
}

#[derive(Subcommand)]
enum Query {
    Supply,
    Pool,
    Fees,
    Paused,
    Minters,
    IsMinter {
        #[arg(long)]
        address: Address,
    },
    CalculateFee {
        #[arg(long)]
        amount: Amount,
    },
    /// Coins held by --owner, or by the signer
    Coins {
        #[arg(long)]
        owner: Option<Address>,
    },
    Balance {
        #[arg(long)]
        owner: Option<Address>,
    },
    Events {
        /// Only the most recent N
        #[arg(long)]
        limit: Option<usize>,
    },
    Receipts {
        #[arg(long)]
        limit: Option<usize>,
    },
    Info,
}

//==================== keys ====================//

fn parse_sk_hex(sk_hex: &str) -> Result<SigningKey> {
    let sk_bytes = hex::decode(sk_hex.trim()).context("invalid sk-hex")?;
    let arr: [u8; 32] = sk_bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("sk-hex must be 32 bytes (64 hex chars)"))?;
    Ok(SigningKey::from_bytes(&arr))
}

fn require_key(key: Option<SigningKey>) -> Result<SigningKey> {
    match key {
        Some(key) => Ok(key),
        None => bail!("this command needs --sk-hex (or NOS_SK_HEX)"),
    }
}

fn keygen_cmd(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut sk_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut sk_bytes);
    let sk = SigningKey::from_bytes(&sk_bytes);
    let pk = sk.verifying_key();
    let address = Address::from_public_key(&pk);

    fs::write(out_dir.join("sk.hex"), hex::encode(sk_bytes))?;
    fs::write(out_dir.join("pk.hex"), hex::encode(pk.as_bytes()))?;
    fs::write(out_dir.join("address"), address.to_string())?;
    println!("keypair written → {}", out_dir.display());
    println!("address {address}");
    Ok(())
}

//==================== calls ====================//

fn to_call(command: Command, sender: Address) -> Result<TokenCall> {
    let call = match command {
        Command::Genesis { config } => {
            let config = GenesisConfig::load(config.as_deref()).context("loading genesis config")?;
            TokenCall::genesis(config.to_params()?)
        }
        Command::TransferOwnership { new_owner } => TokenCall::TransferOwnership { new_owner },
        Command::Distribute { recipient, amount } => TokenCall::Distribute { recipient, amount },
        Command::Deposit { coin } => TokenCall::Deposit { coin },
        Command::AddMinter { minter } => TokenCall::AddMinter { minter },
        Command::RemoveMinter { minter } => TokenCall::RemoveMinter { minter },
        Command::MintFromPool {
            caller,
            recipient,
            amount,
        } => TokenCall::MintFromPool {
            caller: caller.unwrap_or(sender),
            recipient,
            amount,
        },
        Command::Burn { coin } => TokenCall::Burn { coin },
        Command::Transfer { coin, recipient } => TokenCall::Transfer { coin, recipient },
        Command::Split { coin, amount } => TokenCall::Split { coin, amount },
        Command::Join { coin, other } => TokenCall::Join { coin, other },
        Command::TransferWithFee { coin, recipient } => TokenCall::TransferWithFee { coin, recipient },
        Command::BatchTransfer {
            coin,
            recipients,
            amounts,
        } => TokenCall::BatchTransfer {
            coin,
            recipients,
            amounts,
        },
        Command::SetTransferFee { bps } => TokenCall::SetTransferFee { bps },
        Command::SetFeeRecipient { recipient } => TokenCall::SetFeeRecipient { recipient },
        Command::SetPause { paused, reason } => TokenCall::SetPause { paused, reason },
        Command::MintWithFee {
            caller,
            recipient,
            amount,
            fee_bps,
            fee_recipient,
        } => TokenCall::MintWithFee {
            caller: caller.unwrap_or(sender),
            recipient,
            amount,
            fee_bps,
            fee_recipient: fee_recipient.unwrap_or(Address::ZERO),
        },
        Command::TransferFromPool { recipient, amount } => {
            TokenCall::TransferFromPool { recipient, amount }
        }
        Command::Keygen { .. } | Command::Address | Command::Query { .. } => {
            bail!("not a token call")
        }
    };
    Ok(call)
}

fn submit_cmd(state: &Path, key: &SigningKey, call: TokenCall) -> Result<()> {
    let mut chain = Chain::load_or_new(state).with_context(|| format!("loading {}", state.display()))?;
    let signed = SignedCall::sign(call, OsRng.next_u64(), key)?;
    let outcome = chain.submit_signed(&signed);
    // failure receipts are kept too
    chain
        .save(state)
        .with_context(|| format!("saving {}", state.display()))?;
    let receipt = outcome.with_context(|| format!("{} failed", signed.call.name()))?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}

//==================== queries ====================//

fn tail<T>(items: &[T], limit: Option<usize>) -> &[T] {
    match limit {
        Some(n) if n < items.len() => &items[items.len() - n..],
        _ => items,
    }
}

fn query_cmd(state: &Path, query: Query, signer: Option<Address>) -> Result<()> {
    let chain = Chain::load_or_new(state).with_context(|| format!("loading {}", state.display()))?;
    let owner_or_signer = |owner: Option<Address>| {
        owner
            .or(signer)
            .ok_or_else(|| anyhow::anyhow!("pass --owner or --sk-hex"))
    };

    let out = match query {
        Query::Supply => {
            let registry = chain.registry()?;
            let metadata = registry.metadata();
            json!({
                "total_minted": registry.total_minted(),
                "total_burned": registry.total_burned(),
                "circulating": registry.circulating_supply(),
                "pool": registry.pool_balance(),
                "display": {
                    "circulating": metadata.format_amount(registry.circulating_supply()),
                    "pool": metadata.format_amount(registry.pool_balance()),
                },
            })
        }
        Query::Pool => json!({ "pool": chain.registry()?.pool_balance() }),
        Query::Fees => {
            let registry = chain.registry()?;
            json!({
                "schedule": registry.fee_schedule(),
                "total_fees_collected": registry.total_fees_collected(),
            })
        }
        Query::Paused => {
            let registry = chain.registry()?;
            json!({ "paused": registry.is_paused(), "reason": registry.pause_reason() })
        }
        Query::Minters => json!({ "minters": chain.registry()?.minters() }),
        Query::IsMinter { address } => {
            json!({ "address": address, "is_minter": chain.registry()?.is_minter(&address) })
        }
        Query::CalculateFee { amount } => {
            let registry = chain.registry()?;
            json!({
                "amount": amount,
                "bps": registry.transfer_fee_bps(),
                "fee": registry.calculate_fee(amount),
            })
        }
        Query::Coins { owner } => {
            let owner = owner_or_signer(owner)?;
            let coins: Vec<_> = chain.coins_of(&owner).collect();
            json!({ "owner": owner, "coins": coins })
        }
        Query::Balance { owner } => {
            let owner = owner_or_signer(owner)?;
            json!({ "owner": owner, "balance": chain.balance_of(&owner) })
        }
        Query::Events { limit } => json!(tail(chain.events(), limit)),
        Query::Receipts { limit } => json!(tail(chain.receipts(), limit)),
        Query::Info => {
            let registry = chain.registry()?;
            json!({
                "metadata": registry.metadata(),
                "owner": chain.owner_cap()?.owner(),
                "state_root": hex::encode(chain.state_root()),
                "transactions": chain.receipts().len(),
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

//==================== main ====================//

fn run(cli: Cli) -> Result<()> {
    let Cli {
        state,
        sk_hex,
        command,
        ..
    } = cli;
    if let Command::Keygen { out_dir } = &command {
        return keygen_cmd(out_dir);
    }
    let key = sk_hex.as_deref().map(parse_sk_hex).transpose()?;

    match command {
        Command::Address => {
            let key = require_key(key)?;
            println!("{}", Address::from_public_key(&key.verifying_key()));
            Ok(())
        }
        Command::Query { query } => {
            let signer = key.map(|key| Address::from_public_key(&key.verifying_key()));
            query_cmd(&state, query, signer)
        }
        command => {
            let key = require_key(key)?;
            let sender = Address::from_public_key(&key.verifying_key());
            let call = to_call(command, sender)?;
            submit_cmd(&state, &key, call)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
