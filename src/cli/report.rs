use super::ui;
use crate::core::analytics::{InvestmentReport, calculate_investment_report};
use crate::core::{PriceProvider, RateSolver, TransactionsByKind};
use crate::providers::fetch_prices;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Attribute, Cell};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

pub async fn run(
    transactions: &TransactionsByKind,
    price_provider: &dyn PriceProvider,
    solver: &dyn RateSolver,
    as_of: NaiveDate,
    format: OutputFormat,
) -> Result<()> {
    info!("Calculating investment report as of {as_of}...");

    if transactions.is_empty() {
        println!("No transactions found to report on.");
        return Ok(());
    }

    let report = build_report(transactions, price_provider, solver, as_of).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => println!("{}", render_report(&report, as_of)),
    }
    Ok(())
}

/// Fetches current prices for every scheme and runs the analytics engine.
///
/// Fails when any scheme has no price, instead of reporting partial totals.
pub async fn build_report(
    transactions: &TransactionsByKind,
    price_provider: &dyn PriceProvider,
    solver: &dyn RateSolver,
    as_of: NaiveDate,
) -> Result<InvestmentReport> {
    let scheme_codes = transactions.scheme_codes();

    let pb = ui::new_progress_bar(scheme_codes.len() as u64);
    let fetched = fetch_prices(price_provider, &scheme_codes, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    let mut prices = HashMap::new();
    let mut names = HashMap::new();
    for code in &scheme_codes {
        let Some(fetched) = fetched.get(code) else {
            continue;
        };
        let price_result = fetched
            .as_ref()
            .map_err(|e| anyhow::anyhow!("{e:#}"))
            .with_context(|| format!("Price unavailable for scheme {code}"))?;
        debug!("Scheme {code} priced at {}", price_result.price);
        prices.insert(*code, price_result.price);
        if let Some(name) = &price_result.scheme_name {
            names.insert(*code, name.clone());
        }
    }

    let mut report = calculate_investment_report(transactions, &prices, as_of, solver)?;
    for scheme in &mut report.scheme_investment_details {
        scheme.scheme_name = names.remove(&scheme.scheme_code);
    }
    Ok(report)
}

pub fn render_report(report: &InvestmentReport, as_of: NaiveDate) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Scheme"),
        ui::header_cell("Invested"),
        ui::header_cell("Invested (all)"),
        ui::header_cell("Value"),
        ui::header_cell("Value (no redeem)"),
        ui::header_cell("XIRR"),
        ui::header_cell("XIRR (lifetime)"),
        ui::header_cell("XIRR (no redeem)"),
    ]);

    for scheme in &report.scheme_investment_details {
        let name = scheme
            .scheme_name
            .clone()
            .unwrap_or_else(|| scheme.scheme_code.to_string());
        let mut row = vec![Cell::new(name)];
        row.extend(detail_cells(&scheme.details));
        table.add_row(row);
    }

    if report.scheme_investment_details.len() > 1 {
        let mut row = vec![Cell::new("Portfolio").add_attribute(Attribute::Bold)];
        row.extend(
            detail_cells(&report.total_investment_details)
                .into_iter()
                .map(|cell| cell.add_attribute(Attribute::Bold)),
        );
        table.add_row(row);
    }

    let mut output = format!(
        "Investments as of {}\n\n{table}",
        ui::style_text(&as_of.to_string(), ui::StyleType::Title)
    );

    for scheme in &report.scheme_investment_details {
        if scheme.unmatched_redeemed_units > 0.0 {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!(
                        "Scheme {} redeemed {:.4} more units than were purchased; check for missing purchases.",
                        scheme.scheme_code, scheme.unmatched_redeemed_units
                    ),
                    ui::StyleType::Warning,
                )
            ));
        }
    }
    output
}

fn detail_cells(details: &crate::core::analytics::InvestmentDetails) -> Vec<Cell> {
    vec![
        ui::amount_cell(details.invest_amount.current),
        ui::amount_cell(details.invest_amount.on_no_redeem),
        ui::amount_cell(details.value.current),
        ui::amount_cell(details.value.on_no_redeem),
        ui::rate_cell(details.xirr.current),
        ui::rate_cell(details.xirr.lifetime.unwrap_or_default()),
        ui::rate_cell(details.xirr.on_no_redeem),
    ]
}
