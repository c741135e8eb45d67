use super::ui;
use crate::core::TransactionsByKind;
use crate::core::analytics::remaining_lots;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;
use tracing::info;

/// Prints the purchase lots still held for each scheme after FIFO matching,
/// replaying only transactions up to `as_of` when given.
pub fn run(transactions: &TransactionsByKind, as_of: Option<NaiveDate>) -> Result<()> {
    let transactions = match as_of {
        Some(date) => {
            info!("Replaying transactions up to {date}");
            transactions.up_to(date)
        }
        None => transactions.clone(),
    };
    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }
    println!("{}", render_lots(&transactions)?);
    Ok(())
}

pub fn render_lots(transactions: &TransactionsByKind) -> Result<String> {
    let lots = remaining_lots(transactions)?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Scheme"),
        ui::header_cell("Purchased"),
        ui::header_cell("Units"),
        ui::header_cell("Price"),
        ui::header_cell("Cost"),
    ]);

    let mut notes = Vec::new();
    for (code, (held, unmatched)) in &lots {
        if held.is_empty() {
            table.add_row(vec![
                Cell::new(code),
                Cell::new(ui::style_text("fully redeemed", ui::StyleType::Subtle)),
            ]);
        }
        for lot in held {
            table.add_row(vec![
                Cell::new(code),
                Cell::new(lot.date),
                ui::amount_cell(lot.quantity),
                ui::amount_cell(lot.price),
                ui::amount_cell(lot.cost()),
            ]);
        }
        if *unmatched > 0.0 {
            notes.push(format!(
                "Scheme {code}: {unmatched:.4} redeemed units had no matching purchase."
            ));
        }
    }

    let mut output = table.to_string();
    for note in notes {
        output.push('\n');
        output.push_str(&ui::style_text(&note, ui::StyleType::Warning));
    }
    Ok(output)
}
