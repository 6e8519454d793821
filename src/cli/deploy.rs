use super::ui;
use crate::chain::LocalChain;
use crate::core::Deployment;
use crate::deploy;
use anyhow::Result;
use comfy_table::{Cell, Table};
use std::collections::BTreeMap;

fn render(deployments: &BTreeMap<String, Deployment>) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Name"),
        ui::header_cell("Contract"),
        ui::header_cell("Address"),
        ui::header_cell("Arguments"),
    ]);
    for (name, deployment) in deployments {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(&deployment.contract),
            Cell::new(&deployment.address),
            Cell::new(deployment.args.join(", ")),
        ]);
    }
    table
}

pub async fn run(chain: &LocalChain, tags: &[String]) -> Result<()> {
    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
    let ran = deploy::fixture(chain, &tags).await?;
    if ran.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("No deploy scripts tagged {}", tags.join(", ")),
                ui::StyleType::Error
            )
        );
        return Ok(());
    }
    for script in ran {
        println!("{} {}", ui::style_text("✓", ui::StyleType::Success), script);
    }
    println!("{}", render(&chain.registry().all()));
    Ok(())
}
