//! Commands behind the `renterbind` binary.
//!
//! - `currency parse <text>` / `currency format <base-units>`
//! - `contract decode <hex>`
//! - `txn build --output ADDR=AMOUNT... --input ID=VALUE@INDEX... --change ADDR --seed HEX`
//! - `address <seed> <index>`

use clap::Subcommand;
use renterbind_core::{Contract, ContractError};
use renterbind_currency::{format, parse, Currency, CurrencyError};
use renterbind_txn::{
    BuilderConfig, KeySource, OutputId, Seed, TransactionBuilder, TxnError, UnlockHash,
};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors reported by a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Currency(#[from] CurrencyError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Transaction(#[from] TxnError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {what} {value:?}, expected {expected}")]
    Syntax {
        what: &'static str,
        value: String,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert between currency text and base units
    Currency {
        #[command(subcommand)]
        action: CurrencyCommand,
    },
    /// Inspect contract records
    Contract {
        #[command(subcommand)]
        action: ContractCommand,
    },
    /// Build and sign transactions
    Txn {
        #[command(subcommand)]
        action: TxnCommand,
    },
    /// Print the public key and address of a derived key
    Address {
        /// 32-byte wallet seed, hex
        seed: String,
        index: u64,
    },
}

#[derive(Debug, Subcommand)]
pub enum CurrencyCommand {
    /// Unit-suffixed text to a base-unit count
    Parse { text: String },
    /// Base-unit count to unit-suffixed text
    Format { base_units: String },
}

#[derive(Debug, Subcommand)]
pub enum ContractCommand {
    /// Show the fields of a 192-character hex contract
    Decode {
        hex: String,
        /// Include the renter key seed in the output
        #[arg(long)]
        show_seed: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum TxnCommand {
    /// Assemble, finalize and sign a transaction; prints its JSON
    Build(BuildArgs),
}

#[derive(Debug, clap::Args)]
pub struct BuildArgs {
    /// Miner fee per encoded byte
    #[arg(long, default_value = "0H")]
    pub fee_per_byte: String,

    #[arg(long = "output", value_name = "ADDR=AMOUNT")]
    pub outputs: Vec<String>,

    #[arg(long = "input", value_name = "ID=VALUE@INDEX")]
    pub inputs: Vec<String>,

    /// Address receiving the change
    #[arg(long)]
    pub change: String,

    /// 32-byte wallet seed, hex
    #[arg(long)]
    pub seed: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContractSummary {
    host_key: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    renter_seed: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeySummary {
    index: u64,
    public_key: String,
    address: String,
}

/// Run `command` and return what should be printed.
pub fn run(command: Command) -> Result<String> {
    match command {
        Command::Currency { action } => match action {
            CurrencyCommand::Parse { text } => Ok(parse(&text)?.to_string()),
            CurrencyCommand::Format { base_units } => {
                Ok(format(&Currency::from_decimal(base_units.trim())?))
            }
        },
        Command::Contract {
            action: ContractCommand::Decode { hex, show_seed },
        } => {
            let contract = Contract::from_hex(&hex)?;
            let summary = ContractSummary {
                host_key: hex::encode(contract.host_key),
                id: hex::encode(contract.id),
                renter_seed: show_seed.then(|| hex::encode(contract.renter_seed)),
            };
            Ok(serde_json::to_string_pretty(&summary)?)
        }
        Command::Txn {
            action: TxnCommand::Build(args),
        } => build(&args),
        Command::Address { seed, index } => {
            let seed = Seed::from_hex(&seed)?;
            let summary = KeySummary {
                index,
                public_key: seed.public_key(index).to_string(),
                address: seed.address(index).to_string(),
            };
            Ok(serde_json::to_string_pretty(&summary)?)
        }
    }
}

fn syntax(what: &'static str, value: &str, expected: &'static str) -> CliError {
    CliError::Syntax {
        what,
        value: value.to_string(),
        expected,
    }
}

/// `ADDR=AMOUNT`
fn parse_output(spec: &str) -> Result<(UnlockHash, Currency)> {
    let (address, amount) = spec
        .split_once('=')
        .ok_or_else(|| syntax("output", spec, "ADDR=AMOUNT"))?;
    Ok((address.parse()?, parse(amount)?))
}

/// `ID=VALUE@INDEX`
fn parse_input(spec: &str) -> Result<(OutputId, Currency, u64)> {
    let (id, rest) = spec
        .split_once('=')
        .ok_or_else(|| syntax("input", spec, "ID=VALUE@INDEX"))?;
    let (value, index) = rest
        .rsplit_once('@')
        .ok_or_else(|| syntax("input", spec, "ID=VALUE@INDEX"))?;
    let index = index
        .parse()
        .map_err(|_| syntax("key index", index, "an unsigned integer"))?;
    Ok((id.parse()?, parse(value)?, index))
}

fn build(args: &BuildArgs) -> Result<String> {
    let seed = Seed::from_hex(&args.seed)?;
    let rate = parse(&args.fee_per_byte)?;
    let mut builder = TransactionBuilder::new(BuilderConfig::new(rate));

    for spec in &args.outputs {
        let (address, amount) = parse_output(spec)?;
        builder.add_output(address, amount)?;
    }
    for spec in &args.inputs {
        let (id, value, index) = parse_input(spec)?;
        let covered = builder.add_input(id, value, seed.public_key(index), index)?;
        debug!(input = %id, covered, fee = %builder.fee(), "added input");
    }

    let change: UnlockHash = args.change.parse()?;
    builder.finalize(change)?;
    builder.sign(&seed)?;
    Ok(builder.serialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use renterbind_txn::Transaction;

    const SEED: &str = "0707070707070707070707070707070707070707070707070707070707070707";

    #[test]
    fn currency_commands() {
        let out = run(Command::Currency {
            action: CurrencyCommand::Parse {
                text: "2KS".into(),
            },
        })
        .unwrap();
        assert_eq!(out, format!("2{}", "0".repeat(27)));

        let out = run(Command::Currency {
            action: CurrencyCommand::Format { base_units: out },
        })
        .unwrap();
        assert_eq!(out, "2KS");

        assert!(run(Command::Currency {
            action: CurrencyCommand::Parse { text: "5zZ".into() },
        })
        .is_err());
    }

    #[test]
    fn contract_decode_hides_seed_by_default() {
        let contract = Contract::new([1u8; 32], [2u8; 32], [3u8; 32]);
        let out = run(Command::Contract {
            action: ContractCommand::Decode {
                hex: contract.to_hex(),
                show_seed: false,
            },
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["hostKey"], "01".repeat(32));
        assert!(value.get("renterSeed").is_none());
    }

    #[test]
    fn input_and_output_specs() {
        let seed = Seed::from_hex(SEED).unwrap();
        let addr = seed.address(0).to_string();
        let (parsed, amount) = parse_output(&format!("{}=1SC", addr)).unwrap();
        assert_eq!(parsed, seed.address(0));
        assert_eq!(amount, parse("1SC").unwrap());

        let id = "ab".repeat(32);
        let (oid, value, index) = parse_input(&format!("{}=300mS@4", id)).unwrap();
        assert_eq!(oid.to_string(), id);
        assert_eq!(value, parse("300mS").unwrap());
        assert_eq!(index, 4);

        assert!(matches!(
            parse_input("nope"),
            Err(CliError::Syntax { what: "input", .. })
        ));
        assert!(matches!(
            parse_input(&format!("{}=1H@x", id)),
            Err(CliError::Syntax { what: "key index", .. })
        ));
    }

    #[test]
    fn build_prints_signed_transaction() {
        let seed = Seed::from_hex(SEED).unwrap();
        let args = BuildArgs {
            fee_per_byte: "1H".into(),
            outputs: vec![format!("{}=1000H", seed.address(5))],
            inputs: vec![format!("{}=2000H@0", "11".repeat(32))],
            change: seed.address(6).to_string(),
            seed: SEED.into(),
        };
        let json = build(&args).unwrap();
        let txn = Transaction::from_json(&json).unwrap();
        txn.verify_signatures().unwrap();
        assert_eq!(txn.output_total() + txn.fee_total(), Currency::from(2000u64));
    }

    #[test]
    fn address_command() {
        let out = run(Command::Address {
            seed: SEED.into(),
            index: 2,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let expected = Seed::from_hex(SEED).unwrap().address(2).to_string();
        assert_eq!(value["address"], expected);
        assert!(value["publicKey"].as_str().unwrap().starts_with("ed25519:"));
    }
}
