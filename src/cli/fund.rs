use super::ui;
use crate::chain::{FUND_ME, LocalChain};
use crate::core::units::{format_ether, parse_ether};
use anyhow::{Context, Result};
use tracing::info;

/// Sends `amount` ETH from the account `from` into the ledger.
pub async fn fund(chain: &LocalChain, from: &str, amount: &str) -> Result<()> {
    let funder = chain.resolve_account(from)?;
    let value = parse_ether(amount).with_context(|| format!("Invalid amount: {amount}"))?;
    let ledger = chain.fund_me(FUND_ME)?;

    info!(%funder, value, "Funding contract...");
    chain.fund(&ledger, &funder, value).await?;

    println!(
        "{} {} ETH from {}",
        ui::style_text("Funded", ui::StyleType::Success),
        format_ether(value),
        funder
    );
    ui::print_field(
        "Total from this funder",
        &format!("{} ETH", format_ether(ledger.get_balance(&funder).await)),
    );
    Ok(())
}

/// Withdraws everything the ledger holds to its owner.
pub async fn withdraw(chain: &LocalChain, from: &str) -> Result<()> {
    let caller = chain.resolve_account(from)?;
    let ledger = chain.fund_me(FUND_ME)?;

    info!(%caller, "Withdrawing...");
    let amount = chain.withdraw(&ledger, &caller).await?;

    println!(
        "{} {} ETH to {}",
        ui::style_text("Withdrew", ui::StyleType::Success),
        format_ether(amount),
        ledger.get_owner()
    );
    Ok(())
}
