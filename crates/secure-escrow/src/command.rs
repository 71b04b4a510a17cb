use alloy::primitives::Address;
use eyre::{bail, eyre, Result};

use secure_escrow_core::NewEscrowForm;

pub const HELP: &str = "\
commands:
  list                                       show escrows
  balance                                    refresh the account balance
  create <arbiter> <beneficiary> <amount>    deploy an escrow, amount in ether
  approve <contract>                         approve and release an escrow
  reattach <contract>                        reconnect an escrow loaded from storage
  help                                       show this text
  quit                                       exit

With SECURE_ESCROW_RPC_PROXY_URL set, the wallet comes from the proxy but
escrow contracts still run on the local devnet, where the proxy account holds
no ether: `create` fails with insufficient funds in that mode.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List,
    Balance,
    Create(NewEscrowForm),
    Approve(Address),
    Reattach(Address),
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ShellCommand>> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("list" | "ls", []) => ShellCommand::List,
        ("balance", []) => ShellCommand::Balance,
        ("create", [arbiter, beneficiary, amount]) => ShellCommand::Create(NewEscrowForm {
            arbiter: (*arbiter).to_owned(),
            beneficiary: (*beneficiary).to_owned(),
            amount: (*amount).to_owned(),
        }),
        ("approve", [contract]) => ShellCommand::Approve(parse_address(contract)?),
        ("reattach", [contract]) => ShellCommand::Reattach(parse_address(contract)?),
        ("help" | "?", _) => ShellCommand::Help,
        ("quit" | "exit", []) => ShellCommand::Quit,
        ("create", _) => bail!("usage: create <arbiter> <beneficiary> <amount>"),
        ("approve" | "reattach", _) => bail!("usage: {verb} <contract>"),
        (other, _) => bail!("unknown command `{other}`; try `help`"),
    };
    Ok(Some(command))
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| eyre!("invalid contract address {raw}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_into_form() {
        let cmd = parse("create 0x000000000000000000000000000000000000aaaa 0x000000000000000000000000000000000000bbbb 1.5")
            .expect("parse")
            .expect("command");
        let form = match cmd {
            ShellCommand::Create(form) => form,
            other => panic!("expected create, got {other:?}"),
        };
        assert_eq!(form.amount, "1.5");
        let input = form.parse().expect("valid form");
        assert_eq!(
            input.deposit,
            alloy::primitives::U256::from(1_500_000_000_000_000_000u64)
        );
    }

    #[test]
    fn help_warns_about_proxy_funds() {
        assert!(HELP.contains("SECURE_ESCROW_RPC_PROXY_URL"));
        assert!(HELP.contains("insufficient funds"));
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse("   ").expect("parse"), None);
    }

    #[test]
    fn wrong_arity_reports_usage() {
        let err = parse("approve").expect_err("missing address");
        assert!(err.to_string().contains("usage"));
        let err = parse("approve nope").expect_err("bad address");
        assert!(err.to_string().contains("invalid contract address"));
    }
}
