// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::helpers::{india_key, usa_key};
use crate::{ApiError, INVOICE_CSV_HEADERS, export_invoice_csv};
use bidflow_domain::{InvoiceLine, InvoiceSheet};

fn create_sheet() -> InvoiceSheet {
    InvoiceSheet::from_lines([
        InvoiceLine::new(india_key(), 70, 60, 5.0, Some(4.5)),
        InvoiceLine::new(usa_key(), 30, 0, 6.0, None),
    ])
}

fn export(sheet: &InvoiceSheet) -> (usize, String) {
    let mut buffer: Vec<u8> = Vec::new();
    let rows: usize = export_invoice_csv(sheet, &mut buffer).unwrap();
    (rows, String::from_utf8(buffer).unwrap())
}

fn column(row: &str, name: &str) -> String {
    let index: usize = INVOICE_CSV_HEADERS
        .iter()
        .position(|h| *h == name)
        .unwrap();
    row.split(',').nth(index).unwrap().to_string()
}

#[test]
fn test_header_is_written_for_empty_sheet() {
    let (rows, text) = export(&InvoiceSheet::default());
    assert_eq!(rows, 0);
    assert_eq!(text.trim_end(), INVOICE_CSV_HEADERS.join(","));
}

#[test]
fn test_every_line_is_exported() {
    let (rows, text) = export(&create_sheet());
    assert_eq!(rows, 2);
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn test_row_carries_costs() {
    let (_, text) = export(&create_sheet());
    let india: &str = text.lines().nth(1).unwrap();

    assert_eq!(column(india, "partner"), "P1");
    assert_eq!(column(india, "loi"), "15");
    assert_eq!(column(india, "country"), "India");
    assert_eq!(column(india, "delivered"), "60");
    let final_cost: f64 = column(india, "final_cost").parse().unwrap();
    let savings: f64 = column(india, "savings").parse().unwrap();
    assert!((final_cost - 270.0).abs() < f64::EPSILON);
    assert!((savings - 30.0).abs() < f64::EPSILON);
}

#[test]
fn test_missing_final_cpi_exports_initial_cpi() {
    let (_, text) = export(&create_sheet());
    let usa: &str = text.lines().nth(2).unwrap();
    let final_cpi: f64 = column(usa, "final_cpi").parse().unwrap();
    assert!((final_cpi - 6.0).abs() < f64::EPSILON);
}

#[test]
fn test_write_failure_is_export_error() {
    struct Broken;

    impl std::io::Write for Broken {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let result = export_invoice_csv(&create_sheet(), Broken);
    assert!(matches!(result, Err(ApiError::Export(_))));
}
