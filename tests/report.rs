mod common;

use anyhow::Result;
use applus::report::{ExportOptions, export_query, export_to_excel, hyperlink_formula};
use applus::{FieldValue, QueryResult};
use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::NaiveDate;
use common::test_system;

#[tokio::test]
async fn test_export_query_writes_rows() -> Result<()> {
    let system = test_system().await?;
    system.seed_article("A100", "Widget").await?;
    system.seed_article("A200", "Gadget").await?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("artikel.xlsx");
    let options = ExportOptions::default().with_table().with_column_format("PREIS", "#,##0.00");
    let result = export_query(
        &system.session,
        "SELECT ARTIKEL, NAME, PREIS FROM ARTIKEL ORDER BY ARTIKEL",
        &path,
        Some("Artikel"),
        &options,
    )
    .await?;
    assert_eq!(result.len(), 2);

    let mut workbook: Xlsx<_> = open_workbook(&path)?;
    assert_eq!(workbook.sheet_names(), vec!["Artikel".to_string()]);
    let range = workbook.worksheet_range("Artikel")?;
    let rows: Vec<&[Data]> = range.rows().collect();

    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        &[
            Data::String("ARTIKEL".to_string()),
            Data::String("NAME".to_string()),
            Data::String("PREIS".to_string())
        ]
    );
    assert_eq!(rows[1][0], Data::String("A100".to_string()));
    assert_eq!(rows[2][1], Data::String("Gadget".to_string()));
    assert_eq!(rows[1][2], Data::Float(12.5));

    // completed before it ran
    assert_eq!(system.server.calls("getCompleteSQL").len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sheets_with_links_and_dates() -> Result<()> {
    let system = test_system().await?;

    let mut orders = QueryResult::new(vec!["AUFTRAG".to_string(), "LIEFERDATUM".to_string()]);
    orders.push_row(vec!["W1001".into(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().into()]);
    orders.push_row(vec!["W1002".into(), FieldValue::Null]);
    orders.add_column("LINK", |row| {
        let order = row["AUFTRAG"].to_string();
        match system.session.web_link("wp/wauftragRec.aspx", &[("Auftrag", Some(order.clone()))]) {
            Ok(link) => hyperlink_formula(&order, &link).into(),
            Err(_) => FieldValue::Null,
        }
    });

    let mut empty = QueryResult::new(vec!["ARTIKEL".to_string()]);
    assert!(!empty.drop_column("FEHLT"));
    empty.rename_columns(&[("ARTIKEL".to_string(), "Artikel".to_string())].into());

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("auftraege.xlsx");
    export_to_excel(&path, &[(&orders, "Aufträge"), (&empty, "Leer")], &ExportOptions::default())?;

    let mut workbook: Xlsx<_> = open_workbook(&path)?;
    assert_eq!(workbook.sheet_names(), vec!["Aufträge".to_string(), "Leer".to_string()]);

    let range = workbook.worksheet_range("Aufträge")?;
    assert!(matches!(range.get_value((1, 1)), Some(Data::DateTime(_))));
    assert!(matches!(range.get_value((2, 1)), None | Some(Data::Empty)));

    let formulas = workbook.worksheet_formula("Aufträge")?;
    let link = formulas
        .rows()
        .flat_map(|r| r.iter())
        .find(|f| f.contains("HYPERLINK"))
        .expect("hyperlink formula");
    assert!(link.contains("wauftragRec.aspx?Auftrag=W1001"), "{}", link);

    let header = workbook.worksheet_range("Leer")?;
    assert_eq!(header.get_value((0, 0)), Some(&Data::String("Artikel".to_string())));
    Ok(())
}

#[tokio::test]
async fn test_dates_outside_excel_range_are_kept_as_text() -> Result<()> {
    let old = NaiveDate::from_ymd_opt(1753, 1, 1).unwrap();
    let mut result = QueryResult::new(vec!["GUELTIGAB".to_string(), "GUELTIGBIS".to_string()]);
    result.push_row(vec![old.into(), NaiveDate::from_ymd_opt(2030, 12, 31).unwrap().into()]);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gueltig.xlsx");
    export_to_excel(&path, &[(&result, "Gültig")], &ExportOptions::default())?;

    let mut workbook: Xlsx<_> = open_workbook(&path)?;
    let range = workbook.worksheet_range("Gültig")?;
    assert_eq!(range.get_value((1, 0)), Some(&Data::String("1753-01-01".to_string())));
    assert!(matches!(range.get_value((1, 1)), Some(Data::DateTime(_))));
    Ok(())
}
