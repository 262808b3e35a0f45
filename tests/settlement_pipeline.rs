use rust_decimal::Decimal;
use std::fs;
use std::str::FromStr;

use sheetdesk::downloader::{SETTLEMENT_COLUMNS, SETTLEMENT_SHEET_NAME, settlement_to_xlsx};
use sheetdesk::loader::{FileKind, HeaderLayout, first_sheet, load_workbook, read_workbook};
use sheetdesk::season::{SeasonPrice, extract_seasons};
use sheetdesk::settlement::{MBX_LOT, summarize};
use sheetdesk::{CellValue, SettlementInputRow, SheetError, compute_settlement};

const POINTS_CSV: &str = "\
NO,크리에이터ID,크리에이터명,지갑주소,총 포인트,인센티브 포인트,사전모집 포인트,시즌1 포인트,시즌2 포인트
1,c-001,Alice,0xa,1500,0,0,500,1000
2,c-002,\"Bob, Jr.\",0xb,\"1,250\",200,50,300,700
3,c-003,Carol,0xc,800,0,0,900,800
";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Season 1 pays two MBX per point, season 2 one.
fn prices() -> Vec<SeasonPrice> {
    vec![
        SeasonPrice::new(1, dec("1"), dec("0.5")),
        SeasonPrice::new(2, dec("1"), dec("1")),
    ]
}

fn uploaded_rows() -> Vec<SettlementInputRow> {
    let tables = read_workbook(POINTS_CSV.as_bytes(), FileKind::Csv, HeaderLayout::FirstRow).unwrap();
    let table = first_sheet(tables).unwrap();
    assert_eq!(extract_seasons(&table.headers), vec![1, 2]);
    SettlementInputRow::from_table(&table).unwrap()
}

#[test]
fn settles_uploaded_csv() {
    let rows = compute_settlement(&uploaded_rows(), &prices()).unwrap();
    assert_eq!(rows.len(), 3);

    let alice = &rows[0];
    assert_eq!(alice.season_points, "season2:1000, season1:500");
    assert_eq!(alice.season_mbx, dec("2000"));
    assert_eq!(alice.total_mbx, dec("2000"));
    assert_eq!(alice.last_used_season, 1);

    let bob = &rows[1];
    assert_eq!(bob.creator_name, "Bob, Jr.");
    assert_eq!(bob.total_points, dec("1250"));
    assert_eq!(bob.incentive_mbx, dec("200"));
    // 50 points is half a lot, rounded away from zero.
    assert_eq!(bob.early_bird_mbx, dec("100"));
    assert_eq!(bob.season_points, "season2:700, season1:300");
    assert_eq!(bob.season_mbx, dec("1300"));
    assert_eq!(bob.total_mbx, dec("1600"));

    let carol = &rows[2];
    assert_eq!(carol.season_points, "season2:800");
    assert_eq!(carol.total_mbx, dec("800"));
    assert_eq!(carol.last_used_season, 1);
}

#[test]
fn output_rows_keep_their_invariants() {
    let rows = compute_settlement(&uploaded_rows(), &prices()).unwrap();
    let lot = Decimal::from(MBX_LOT);

    for row in &rows {
        assert_eq!(
            row.total_mbx,
            row.season_mbx + row.incentive_mbx + row.early_bird_mbx
        );
        for mbx in [
            row.total_mbx,
            row.season_mbx,
            row.incentive_mbx,
            row.early_bird_mbx,
        ] {
            assert!((mbx % lot).is_zero(), "{} is not a multiple of {}", mbx, lot);
        }

        let seasons: Vec<u32> = row
            .season_points
            .split(", ")
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .trim_start_matches("season")
                    .split(':')
                    .next()
                    .unwrap()
                    .parse()
                    .unwrap()
            })
            .collect();
        let mut descending = seasons.clone();
        descending.sort_by(|a, b| b.cmp(a));
        assert_eq!(seasons, descending);
    }
}

#[test]
fn summary_matches_column_sums() {
    let rows = compute_settlement(&uploaded_rows(), &prices()).unwrap();
    let summary = summarize(&rows).unwrap();

    assert_eq!(summary.total_creators, 3);
    assert_eq!(summary.total_points, dec("3550"));
    assert_eq!(summary.total_mbx, dec("4400"));
    assert_eq!(summary.total_incentive_mbx, dec("200"));
    assert_eq!(summary.total_early_bird_mbx, dec("100"));
    assert_eq!(summary.total_season_mbx, dec("4100"));
}

#[test]
fn same_input_gives_same_output() {
    let rows = uploaded_rows();
    assert_eq!(
        compute_settlement(&rows, &prices()).unwrap(),
        compute_settlement(&rows, &prices()).unwrap()
    );
}

#[test]
fn zero_mbx_price_rejects_the_whole_settlement() {
    let mut prices = prices();
    prices[0].mbx_price = Decimal::ZERO;
    assert!(matches!(
        compute_settlement(&uploaded_rows(), &prices),
        Err(SheetError::DivisionByZeroPrice { season: 1 })
    ));
}

#[test]
fn settlement_export_reads_back_from_disk() {
    let rows = compute_settlement(&uploaded_rows(), &prices()).unwrap();
    let bytes = settlement_to_xlsx(&rows).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settlement.xlsx");
    fs::write(&path, bytes).unwrap();

    let tables = load_workbook(&path, HeaderLayout::FirstRow).unwrap();
    assert_eq!(tables.len(), 1);
    let table = &tables[0];
    assert_eq!(table.name, SETTLEMENT_SHEET_NAME);
    assert_eq!(table.headers, SETTLEMENT_COLUMNS.to_vec());
    assert_eq!(table.rows.len(), 3);

    let total_mbx = table.column_index("totalMbx").unwrap();
    let season_points = table.column_index("seasonPoints").unwrap();
    assert_eq!(table.cell(1, total_mbx), &CellValue::Number(1600.0));
    assert_eq!(
        table.cell(0, season_points),
        &CellValue::Text("season2:1000, season1:500".into())
    );
}
