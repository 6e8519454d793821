use super::ui;
use crate::chain::LocalChain;
use crate::core::Address;
use crate::core::units::NATIVE_DECIMALS;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Table};
use futures::future::join_all;

struct AccountRow {
    index: usize,
    address: Address,
    label: Option<String>,
    balance: u128,
}

async fn collect_rows(chain: &LocalChain) -> Vec<AccountRow> {
    let named = &chain.config().named_accounts;
    let rows = chain.accounts().iter().enumerate().map(|(index, address)| async move {
        let label = named
            .iter()
            .find(|(_, i)| **i == index)
            .map(|(name, _)| name.clone());
        AccountRow {
            index,
            address: address.clone(),
            label,
            balance: chain.balance_of(address).await,
        }
    });
    join_all(rows).await
}

fn render(rows: &[AccountRow]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Address"),
        ui::header_cell("Balance (ETH)"),
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.index).set_alignment(CellAlignment::Right),
            ui::address_cell(&row.address, row.label.as_deref()),
            ui::amount_cell(row.balance, NATIVE_DECIMALS),
        ]);
    }
    table
}

pub async fn run(chain: &LocalChain) -> Result<()> {
    let rows = collect_rows(chain).await;
    println!(
        "\nAccounts on {}",
        ui::style_text(chain.network(), ui::StyleType::Title)
    );
    println!("{}", render(&rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;

    #[tokio::test]
    async fn test_rows_label_named_accounts() {
        let mut config = AppConfig::default();
        config.accounts.count = 3;
        config.accounts.balance = "1.5".to_string();
        config.named_accounts.insert("user".to_string(), 2);
        let chain = LocalChain::new(&config, "hardhat").await.unwrap();

        let rows = collect_rows(&chain).await;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].label.as_deref(), Some("deployer"));
        assert_eq!(rows[1].label, None);
        assert_eq!(rows[2].label.as_deref(), Some("user"));
        assert!(rows.iter().all(|r| r.balance == 1_500_000_000_000_000_000));

        let table = render(&rows).to_string();
        assert!(table.contains("(deployer)"));
        assert!(table.contains("1.5"));
    }
}
