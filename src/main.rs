use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use court_fetch::models::{load_all_request_files, load_search_requests};
use court_fetch::services::SqliteLedger;
use court_fetch::utils::{logging, truncate_text};
use court_fetch::{logger, CaseFetcher, Config, SearchRequest, WorkflowOutcome};

#[derive(Parser)]
#[command(name = "court-fetch", about = "Delhi High Court case status fetcher", version)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one case
    Search {
        /// Case type exactly as listed by `case-types`, e.g. "W.P.(C)"
        #[arg(long)]
        case_type: String,
        #[arg(long)]
        case_number: String,
        #[arg(long)]
        filing_year: String,
    },
    /// Look up every request in a TOML file, or in every TOML file of a directory
    Batch { path: PathBuf },
    /// Show recent queries
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show query statistics
    Stats,
    /// List the accepted case types
    CaseTypes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    // 加载配置
    let config = Config::load()?;
    logger::init(cli.verbose || config.verbose_logging);

    match cli.command {
        Commands::Search {
            case_type,
            case_number,
            filing_year,
        } => {
            let fetcher = CaseFetcher::initialize(&config)?;
            let request = SearchRequest::new(case_type, case_number, filing_year);
            let outcome = fetcher.fetch(&request).await;
            print_outcome(&request, &outcome, cli.json)?;
            Ok(exit_code(outcome.is_success()))
        }
        Commands::Batch { path } => {
            let requests = if path.is_dir() {
                load_all_request_files(&path.to_string_lossy()).await?
            } else {
                load_search_requests(&path).await?
            };
            if requests.is_empty() {
                tracing::warn!("⚠️ 没有找到待查询的请求，程序结束");
                return Ok(ExitCode::SUCCESS);
            }

            logging::log_startup(&config.target_url, config.max_concurrent_requests);
            let fetcher = CaseFetcher::initialize(&config)?;
            let results = fetcher.fetch_batch(requests).await;

            let mut all_ok = true;
            for (request, outcome) in &results {
                all_ok &= outcome.is_success();
                print_outcome(request, outcome, cli.json)?;
            }
            Ok(exit_code(all_ok))
        }
        Commands::History { limit } => {
            let ledger = SqliteLedger::open(&config.database_path)?;
            let entries = ledger.history(limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for e in &entries {
                    println!(
                        "{}  {} {}/{}  [{}]  {}",
                        e.queried_at,
                        e.case_type,
                        e.case_number,
                        e.filing_year,
                        e.status,
                        truncate_text(e.parties.as_deref().unwrap_or("-"), 60)
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stats => {
            let ledger = SqliteLedger::open(&config.database_path)?;
            let stats = ledger.stats().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Total queries:      {}", stats.total_queries);
                println!("Successful queries: {}", stats.successful_queries);
                println!("Failed queries:     {}", stats.failed_queries);
                println!("Success rate:       {:.1}%", stats.success_rate);
                for (case_type, count) in &stats.top_case_types {
                    println!("  {:<16} {}", case_type, count);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::CaseTypes => {
            for case_type in config.catalog()?.iter() {
                println!("{}", case_type);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_outcome(request: &SearchRequest, outcome: &WorkflowOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        WorkflowOutcome::Success { records, .. } => {
            println!("{}: {} result(s)", request, outcome.total_count());
            for record in records {
                println!("  S.No.: {}", record.sequence_no);
                println!("  Case No.: {}", record.case_number_display);
                if let Some(link) = &record.case_number_link {
                    println!("  Case Link: {}", link);
                }
                println!("  Date of Judgment/Order: {}", record.order_date_display);
                if let Some(link) = &record.order_date_link {
                    println!("  Date Link: {}", link);
                }
                println!("  Party: {}", record.parties.replace('\n', " "));
                println!("  Corrigendum: {}", record.corrigendum_note);
                if let Some(pdf) = &record.pdf_artifact_name {
                    println!("  PDF: {}", pdf);
                }
                println!();
            }
        }
        WorkflowOutcome::Failure { .. } => {
            println!("{}: {}", request, outcome.user_message().unwrap_or_default());
        }
    }
    Ok(())
}
