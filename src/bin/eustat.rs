use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use eustat_rs::models::{DatasetInfo, DimensionValues};
use eustat_rs::{Client, ClientConfig, DataQuery, Table, storage};
use num_format::{Locale, ToFormattedString};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "eustat",
    version,
    about = "Browse, fetch & tabulate Eurostat datasets"
)]
struct Cli {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct ConnArgs {
    /// API base URL (defaults to $EUSTAT_BASE_URL or the public Eurostat endpoint).
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Cache responses in the platform cache directory.
    #[arg(long, global = true, default_value_t = false)]
    cache: bool,
    /// Cache responses in this directory (implies --cache).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Hours after which cached responses expire.
    #[arg(long, global = true, default_value_t = 24)]
    cache_hours: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a dataset (and optionally save it).
    Data(DataArgs),
    /// Search the table of contents.
    Search(SearchArgs),
    /// Describe a dataset: catalogue entry plus available filters.
    Info(InfoArgs),
    /// List available filter values per dimension.
    Filters {
        /// Dataset code, e.g. nama_10_gdp
        code: String,
    },
    /// Browse the dataset hierarchy one level at a time.
    Browse(BrowseArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Dataset code, e.g. nama_10_gdp
    code: String,
    /// Dimension filter DIM=V1,V2 (repeatable), e.g. -f geo=FR,DE -f unit=CP_MEUR
    #[arg(short, long = "filter")]
    filters: Vec<String>,
    /// Time period(s) separated by comma, e.g. 2020,2021
    #[arg(short, long)]
    time: Option<String>,
    /// First period of a range (can combine with --until).
    #[arg(long)]
    since: Option<String>,
    /// Last period of a range (can combine with --since).
    #[arg(long)]
    until: Option<String>,
    /// Only the N most recent periods.
    #[arg(long)]
    last: Option<String>,
    /// Geographic level: aggregate, country, nuts1, nuts2, nuts3, city.
    #[arg(long)]
    geo_level: Option<String>,
    /// Save results to file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Rows to print to stdout (0 prints none).
    #[arg(long, default_value_t = 20)]
    head: usize,
}

#[derive(Args, Debug)]
struct SearchArgs {
    query: String,
    #[arg(long, default_value_t = 50)]
    max_results: usize,
    /// Only datasets updated on or after this date (YYYY-MM-DD).
    #[arg(long)]
    updated_since: Option<String>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    code: String,
    /// Show every value of this dimension.
    #[arg(long)]
    show_all: Option<String>,
    #[arg(long, default_value_t = 10)]
    max_values: usize,
}

#[derive(Args, Debug)]
struct BrowseArgs {
    /// Folder code (defaults to the root folder).
    folder: Option<String>,
    #[arg(long, default_value_t = 20)]
    max_items: usize,
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            // Format up to 4 decimals, then trim trailing zeros and trailing dot.
            let s = format!("{:.4}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => "NA".to_string(),
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn build_query(args: &DataArgs) -> Result<DataQuery> {
    let mut q = DataQuery::new();
    for f in &args.filters {
        let (dim, values) = f
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid --filter '{f}', expected DIM=V1,V2"))?;
        q = q.filter(dim, parse_list(values))?;
    }
    if let Some(t) = &args.time {
        for p in parse_list(t) {
            q = q.param("time", &p)?;
        }
    }
    if let Some(s) = &args.since {
        q = q.param("sinceTimePeriod", s)?;
    }
    if let Some(u) = &args.until {
        q = q.param("untilTimePeriod", u)?;
    }
    if let Some(n) = &args.last {
        q = q.param("lastTimePeriod", n)?;
    }
    if let Some(level) = &args.geo_level {
        q = q.param("geoLevel", level)?;
    }
    Ok(q)
}

fn make_client(conn: &ConnArgs) -> Result<Client> {
    let mut config = ClientConfig::default();
    if let Some(url) = &conn.base_url {
        config.base_url = url.clone();
    }
    if conn.cache {
        config = config.with_default_cache();
    }
    if let Some(dir) = &conn.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    config.cache_expire = Duration::from_secs(conn.cache_hours.saturating_mul(3600));
    Ok(Client::new(config)?)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let client = make_client(&cli.conn)?;
    match cli.cmd {
        Command::Data(args) => cmd_data(&client, args),
        Command::Search(args) => cmd_search(&client, args),
        Command::Info(args) => cmd_info(&client, args),
        Command::Filters { code } => cmd_filters(&client, &code),
        Command::Browse(args) => cmd_browse(&client, args),
    }
}

fn print_table(table: &Table, head: usize) {
    let names = table.column_names();
    println!("{}", names.join("\t"));
    let dims = table.dimension_ids();
    for row in table.rows().take(head) {
        let mut cells: Vec<String> = dims
            .iter()
            .map(|d| row.code(d).unwrap_or_default().to_string())
            .collect();
        cells.push(fmt_opt(row.value()));
        if let Some(s) = row.status() {
            cells.push(s.to_string());
        }
        cells.extend(dims.iter().filter_map(|d| row.label(d)).map(String::from));
        println!("{}", cells.join("\t"));
    }
    if table.len() > head {
        println!("... {} more rows", table.len() - head);
    }
}

fn cmd_data(client: &Client, args: DataArgs) -> Result<()> {
    let query = build_query(&args)?;
    let table = client
        .get_table(&args.code, &query)
        .with_context(|| format!("fetch dataset {}", args.code))?;

    if args.head > 0 {
        print_table(&table, args.head);
    }

    if let Some(path) = args.out.as_ref() {
        let fmt = match args.format {
            Some(OutFormat::Csv) => "csv",
            Some(OutFormat::Json) => "json",
            None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
        }
        .to_ascii_lowercase();
        match fmt.as_str() {
            "csv" => storage::save_csv(&table, path)?,
            "json" => storage::save_json(&table, path)?,
            other => anyhow::bail!("unsupported format: {}", other),
        }
        eprintln!("Saved {} rows to {}", table.len(), path.display());
    }
    Ok(())
}

fn describe_entry(d: &DatasetInfo) -> String {
    let mut meta = Vec::new();
    if let Some(u) = d.last_update {
        meta.push(format!("updated {}", u.format("%Y-%m-%d")));
    }
    if let Some(n) = d.values_count {
        meta.push(format!("{} values", n.to_formatted_string(&Locale::en)));
    }
    if meta.is_empty() {
        format!("{}: {}", d.code, d.title)
    } else {
        format!("{}: {} ({})", d.code, d.title, meta.join(", "))
    }
}

fn cmd_search(client: &Client, args: SearchArgs) -> Result<()> {
    let hits = client.search_datasets(&args.query, args.max_results, args.updated_since.as_deref())?;
    if hits.is_empty() {
        println!("No datasets match '{}'.", args.query);
    }
    for d in &hits {
        println!("{:<8} {}", d.kind.as_str(), describe_entry(d));
    }
    Ok(())
}

fn print_dimensions(dims: &[DimensionValues], show_all: Option<&str>, max_values: usize) {
    for dim in dims {
        println!("\n{}:", dim.name);
        let all = show_all == Some(dim.name.as_str()) || dim.values.len() <= max_values;
        let shown = if all { dim.values.len() } else { max_values };
        for v in &dim.values[..shown] {
            println!("  - {v}");
        }
        if !all {
            println!(
                "  ... and {} more values (use --show-all {} to see all {})",
                dim.values.len() - max_values,
                dim.name,
                dim.values.len()
            );
        }
    }
}

fn cmd_info(client: &Client, args: InfoArgs) -> Result<()> {
    let info = client.dataset_info(&args.code)?;
    let dims = client.available_filters(&args.code)?;
    let info = match (info, dims.is_empty()) {
        (Some(info), _) => info,
        (None, false) => {
            println!("Dataset '{}' found in metabase but not in table of contents.", args.code);
            DatasetInfo::bare(&args.code)
        }
        (None, true) => anyhow::bail!("dataset '{}' not found", args.code),
    };

    println!("Dataset: {}", info.code);
    println!("{}", "=".repeat(50));
    println!("Title: {}", info.title);
    if let Some(desc) = &info.short_description {
        println!("Description: {desc}");
    }
    println!("Type: {}", info.kind.as_str());
    if let Some(u) = info.last_update {
        println!("Last Updated: {u}");
    }
    if let (Some(start), Some(end)) = (&info.data_start, &info.data_end) {
        println!("Data Period: {start} - {end}");
    }
    if let Some(n) = info.values_count {
        println!("Number of Values: {}", n.to_formatted_string(&Locale::en));
    }

    if dims.is_empty() {
        println!("\nNo dimension information available.");
        return Ok(());
    }
    println!("\nAvailable Dimensions and Filters ({}):", dims.len());
    print_dimensions(&dims, args.show_all.as_deref(), args.max_values);
    Ok(())
}

fn cmd_filters(client: &Client, code: &str) -> Result<()> {
    let dims = client.available_filters(code)?;
    if dims.is_empty() {
        anyhow::bail!("no dimension information for '{code}'");
    }
    for dim in &dims {
        println!("{}\t{}", dim.name, dim.values.join(","));
    }
    Ok(())
}

fn cmd_browse(client: &Client, args: BrowseArgs) -> Result<()> {
    let listing = client.browse(args.folder.as_deref(), args.max_items)?;
    println!("{}: {}", listing.parent.code, listing.parent.title);
    println!("{}", "=".repeat(60));
    if listing.total == 0 {
        println!("This folder has no subfolders or datasets.");
        return Ok(());
    }
    if !listing.folders.is_empty() {
        println!("Folders:");
        for f in &listing.folders {
            println!("  [+] {}: {} ({} items)", f.info.code, f.info.title, f.child_count);
        }
    }
    if !listing.datasets.is_empty() {
        println!("Datasets and Tables:");
        for d in &listing.datasets {
            println!("  {}", describe_entry(d));
        }
    }
    let shown = listing.folders.len() + listing.datasets.len();
    if listing.total > args.max_items {
        println!("\nShowing {shown} of {} items. Use --max-items to see more.", listing.total);
    } else {
        println!("\nShowing all {shown} items in this folder.");
    }
    Ok(())
}
