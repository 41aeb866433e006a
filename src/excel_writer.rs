use anyhow::{Context, Result};
use log::info;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;

use crate::tabular::Table;

/// Writes the table to a single-sheet workbook, numbers kept numeric.
/// Used to store the "Naam Geformatteerd" column back into the address sheet.
pub fn write_table(file_path: &Path, table: &Table) -> Result<()> {
    info!("Initializing Excel workbook for file: {:?}", file_path);
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    write_sheet(sheet, table)?;

    info!("Saving Excel workbook...");
    workbook
        .save(file_path)
        .with_context(|| format!("Failed to save workbook {:?}", file_path))?;
    info!("Excel file saved successfully to {:?}", file_path);
    Ok(())
}

fn write_sheet(sheet: &mut Worksheet, table: &Table) -> Result<()> {
    let header_format = Format::new().set_bold();

    // Write headers
    for (col_num, header) in table.headers().iter().enumerate() {
        if header.is_empty() {
            continue;
        }
        sheet.write_string_with_format(0, col_num as u16, header, &header_format)?;
    }

    // Write data rows
    for (row_num, row) in table.rows().enumerate() {
        let current_row = (row_num + 1) as u32; // +1 for header row
        for col_num in 0..row.width() {
            let Some(cell) = row.cell(col_num) else {
                continue;
            };
            match cell.number {
                Some(number) => sheet.write_number(current_row, col_num as u16, number)?,
                None => sheet.write_string(current_row, col_num as u16, &cell.text)?,
            };
        }
    }

    sheet.autofit();
    info!("Sheet written with {} rows.", table.row_count());
    Ok(())
}
