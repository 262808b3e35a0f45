#![cfg(not(tarpaulin_include))]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::{debug, info};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sheetdesk::downloader::{
    cleaned_to_xlsx, settlement_to_csv, settlement_to_xlsx, timestamped_file_name,
};
use sheetdesk::linter::lint_table;
use sheetdesk::loader::{HeaderLayout, first_sheet, load_workbook};
use sheetdesk::row::SettlementInputRow;
use sheetdesk::season::{
    SeasonPriceInput, complete_price_inputs, extract_seasons, resolve_prices,
};
use sheetdesk::separator::debug_text;
use sheetdesk::settlement::{compute_settlement, summarize};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the MBX settlement of a point sheet
    Settle {
        file: PathBuf,

        /// Season price as `<season>:<point price>:<mbx price>`; repeat per season
        #[arg(long = "price", value_parser = parse_price)]
        prices: Vec<SeasonPriceInput>,

        /// Write to this .xlsx or .csv file instead of printing CSV
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Report LS / PS / VT characters in every sheet
    Lint {
        file: PathBuf,

        /// Headers are on row 1 instead of row 3
        #[arg(long)]
        plain: bool,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a copy of the first sheet with separators replaced by newlines
    Clean {
        file: PathBuf,

        #[arg(long)]
        plain: bool,

        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List the seasons found in a point sheet's headers
    Seasons { file: PathBuf },
}

/// `2:1.5:0.25`; either price may be left empty (`2::0.25`).
fn parse_price(value: &str) -> Result<SeasonPriceInput, String> {
    let parts: Vec<&str> = value.split(':').collect();
    let [season, point_price, mbx_price] = parts.as_slice() else {
        return Err(format!(
            "expected <season>:<point price>:<mbx price>, got {:?}",
            value
        ));
    };

    let season = season
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid season {:?}: {}", season, e))?;
    let price = |raw: &str| -> Result<Option<Decimal>, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        Decimal::from_str(raw)
            .map(Some)
            .map_err(|e| format!("invalid price {:?}: {}", raw, e))
    };

    Ok(SeasonPriceInput {
        season,
        point_price: price(*point_price)?,
        mbx_price: price(*mbx_price)?,
    })
}

fn layout_for(plain: bool) -> HeaderLayout {
    if plain {
        HeaderLayout::FirstRow
    } else {
        HeaderLayout::Preamble
    }
}

fn settle(
    file: &Path,
    prices: Vec<SeasonPriceInput>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let table = first_sheet(load_workbook(file, HeaderLayout::FirstRow)?)?;
    let rows = SettlementInputRow::from_table(&table)?;

    let prices = resolve_prices(&complete_price_inputs(&table.headers, &prices))?;

    let settlement = compute_settlement(&rows, &prices)?;
    let summary = summarize(&settlement)?;
    info!(
        "Settled {} creators: {} points -> {} MBX (season {}, incentive {}, early bird {})",
        summary.total_creators,
        summary.total_points,
        summary.total_mbx,
        summary.total_season_mbx,
        summary.total_incentive_mbx,
        summary.total_early_bird_mbx
    );

    match output {
        Some(path) => {
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_csv {
                fs::write(&path, settlement_to_csv(&settlement))?;
            } else {
                fs::write(&path, settlement_to_xlsx(&settlement)?)?;
            }
            info!("Wrote {}", path.display());
        }
        None => print!("{}", settlement_to_csv(&settlement)),
    }
    Ok(())
}

fn lint(file: &Path, plain: bool, json: bool) -> anyhow::Result<()> {
    let tables = load_workbook(file, layout_for(plain))?;
    let reports: Vec<_> = tables.iter().map(|table| (table, lint_table(table))).collect();
    let dirty = reports.iter().filter(|(_, report)| !report.is_clean()).count();

    if json {
        let sheets: Vec<_> = reports
            .iter()
            .map(|(table, report)| serde_json::json!({ "sheet": table.name, "report": report }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&sheets)?);
    } else {
        for (table, report) in &reports {
            if report.is_clean() {
                println!("{}: clean", table.name);
                continue;
            }
            println!("{}: {}", table.name, report.summary);
            for cell in &report.cells {
                println!("  row {} [{}]: {}", cell.row + 1, cell.header, cell.annotated);
                if let Some(text) = table.cell(cell.row, cell.column).as_text() {
                    debug!("  {}", debug_text(text));
                }
            }
        }
    }

    if dirty > 0 {
        bail!("{} of {} sheet(s) contain line separators", dirty, tables.len());
    }
    Ok(())
}

fn clean(file: &Path, plain: bool, output: Option<PathBuf>) -> anyhow::Result<()> {
    let table = first_sheet(load_workbook(file, layout_for(plain))?)?;
    let output =
        output.unwrap_or_else(|| PathBuf::from(timestamped_file_name("cleaned_data", "xlsx")));

    let bytes = cleaned_to_xlsx(&table)?;
    fs::write(&output, bytes).with_context(|| format!("writing {}", output.display()))?;
    info!("Wrote {} ({} rows)", output.display(), table.rows.len());
    Ok(())
}

fn seasons(file: &Path) -> anyhow::Result<()> {
    let table = first_sheet(load_workbook(file, HeaderLayout::FirstRow)?)?;
    let seasons = extract_seasons(&table.headers);
    if seasons.is_empty() {
        bail!("no season columns in {}", file.display());
    }
    for season in seasons {
        println!("{}", season);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.init();

    let args = Args::parse();
    match args.command {
        Command::Settle {
            file,
            prices,
            output,
        } => settle(&file, prices, output),
        Command::Lint { file, plain, json } => lint(&file, plain, json),
        Command::Clean {
            file,
            plain,
            output,
        } => clean(&file, plain, output),
        Command::Seasons { file } => seasons(&file),
    }
}
