//! Read-only views of the deployed ledger and its price feed.

use super::ui;
use crate::chain::{FUND_ME, LocalChain, MOCK_V3_AGGREGATOR};
use crate::core::units::{NATIVE_DECIMALS, format_ether, parse_ether};
use crate::core::{Address, FundingLedger, PriceFeed};
use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment, Table};
use futures::future::join_all;
use tracing::warn;

/// Amount recorded for `account`, or for every local account when `None`.
pub async fn balance(chain: &LocalChain, account: Option<&str>) -> Result<()> {
    let ledger = chain.fund_me(FUND_ME)?;
    let accounts = match account {
        Some(name) => vec![chain.resolve_account(name)?],
        None => chain.accounts().to_vec(),
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Account"),
        ui::header_cell("Funded (ETH)"),
    ]);
    let amounts = join_all(accounts.iter().map(|a| ledger.get_balance(a))).await;
    for (address, amount) in accounts.iter().zip(amounts) {
        table.add_row(vec![
            ui::address_cell(address, None),
            ui::amount_cell(amount, NATIVE_DECIMALS),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn funders_table(ledger: &FundingLedger) -> Table {
    let snapshot = ledger.snapshot().await;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Funder"),
        ui::header_cell("Funded (ETH)"),
    ]);
    for (index, funder) in snapshot.funders.iter().enumerate() {
        let amount = snapshot.balances.get(funder).copied().unwrap_or(0);
        table.add_row(vec![
            Cell::new(index).set_alignment(CellAlignment::Right),
            ui::address_cell(funder, None),
            ui::amount_cell(amount, NATIVE_DECIMALS),
        ]);
    }
    table
}

pub async fn funders(chain: &LocalChain) -> Result<()> {
    let ledger = chain.fund_me(FUND_ME)?;
    if ledger.funders_count().await == 0 {
        println!("{}", ui::style_text("No funders yet.", ui::StyleType::Subtle));
        return Ok(());
    }
    println!("{}", funders_table(&ledger).await);
    Ok(())
}

/// Current price reported to the ledger, with the feed's metadata.
pub async fn price(chain: &LocalChain) -> Result<()> {
    let ledger = chain.fund_me(FUND_ME)?;
    let oracle = ledger.oracle();
    let feed = oracle.feed();

    ui::print_field("Price feed", ledger.get_price_feed());
    match feed.description().await {
        Ok(description) => ui::print_field("Description", &description),
        Err(e) => warn!("Could not read feed description: {e:#}"),
    }
    if let Ok(version) = feed.version().await {
        ui::print_field("Version", &version.to_string());
    }
    let round = feed.latest_round_data().await?;
    ui::print_field("Round", &round.round_id.to_string());

    let price = oracle.get_price().await?;
    ui::print_field("ETH/USD", &price.to_string());
    let one_eth = oracle.to_usd(parse_ether("1")?, NATIVE_DECIMALS).await?;
    ui::print_field(
        "Minimum contribution",
        &format!(
            "{} USD (about {} ETH)",
            ledger.minimum_usd(),
            min_native(ledger.minimum_usd(), one_eth.value, one_eth.decimals)
        ),
    );
    Ok(())
}

/// Smallest native amount worth `minimum_usd` at `usd_per_eth` (with `decimals`).
fn min_native(minimum_usd: u128, usd_per_eth: u128, decimals: u8) -> String {
    let Some(scale) = crate::core::units::pow10(decimals) else {
        return "?".to_string();
    };
    let wei_per_eth = 10u128.pow(u32::from(NATIVE_DECIMALS));
    minimum_usd
        .checked_mul(scale)
        .and_then(|usd| usd.checked_mul(wei_per_eth))
        .map(|scaled| format_ether(scaled.div_ceil(usd_per_eth)))
        .unwrap_or_else(|| "?".to_string())
}

/// Pushes a new answer to the mock feed on a development chain.
pub async fn set_price(chain: &LocalChain, answer: i128) -> Result<()> {
    let mock = chain
        .mock_aggregator(MOCK_V3_AGGREGATOR)
        .context("Mock price feed not deployed; run `fundme deploy --tags mocks` first")?;
    mock.update_answer(answer).await;
    let decimals = mock.decimals().await?;
    let round = mock.latest_round_data().await?;
    println!(
        "{} round {} answer {} ({} decimals)",
        ui::style_text("Updated", ui::StyleType::Success),
        round.round_id,
        answer,
        decimals
    );
    Ok(())
}

/// Summary of the deployed ledger.
pub async fn info(chain: &LocalChain) -> Result<()> {
    let ledger = chain.fund_me(FUND_ME)?;
    let owner: &Address = ledger.get_owner();
    let (held, funders, owner_balance, contract_balance) = futures::join!(
        ledger.held(),
        ledger.funders_count(),
        chain.balance_of(owner),
        chain.balance_of(ledger.address()),
    );

    println!("\n{}", ui::style_text("FundMe", ui::StyleType::Title));
    ui::print_field("Network", chain.network());
    ui::print_field("Address", ledger.address());
    ui::print_field("Owner", owner);
    ui::print_field("Price feed", ledger.get_price_feed());
    ui::print_field("Minimum (USD)", &ledger.minimum_usd().to_string());
    ui::print_field("Funders", &funders.to_string());
    ui::print_field("Held", &format!("{} ETH", format_ether(held)));
    ui::print_field(
        "Contract balance",
        &format!("{} ETH", format_ether(contract_balance)),
    );
    ui::print_field(
        "Owner balance",
        &format!("{} ETH", format_ether(owner_balance)),
    );
    match ledger.oracle().get_price().await {
        Ok(price) => ui::print_field("ETH/USD", &price.to_string()),
        Err(e) => ui::print_field("ETH/USD", &ui::style_text(&e.to_string(), ui::StyleType::Error)),
    }
    Ok(())
}
