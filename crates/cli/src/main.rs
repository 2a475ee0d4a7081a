// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

use bidflow::{BidState, Stage};
use bidflow_api::{
    BatchPolicy, BatchReport, BidStore, BidWorkflow, ClientConfig, DEFAULT_BASE_URL,
    DEFAULT_TIMEOUT, HttpBidStore, export_invoice_csv,
};
use bidflow_audit::Actor;
use bidflow_domain::{
    AllocationKey, AudienceId, BidId, BidNumber, BidStatus, CostBreakdown, Country,
    DeliveryMetrics, InvoiceSummary, Loi, PartnerAudienceKey, PartnerId, PartnerMetrics,
    parse_iso_date, round_currency,
};
use bidflow_persistence::{DraftCache, TransitionRecord};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_log::AsTrace;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args: Args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.log_level().into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let workflow: BidWorkflow<HttpBidStore> = args.workflow()?;
    if let Err(err) = args.command.run(&workflow).await {
        error!("{err:#}");
        std::process::exit(1);
    }
    Ok(())
}

/// Bidflow - drive market-research bids through their lifecycle
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the bid data store
    #[arg(long, env = "BIDFLOW_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Bearer token sent with every request
    #[arg(long, env = "BIDFLOW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "BIDFLOW_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// `SQLite` file for drafts and the local transition log. In-memory when unset.
    #[arg(long, env = "BIDFLOW_DRAFTS_DB")]
    drafts_db: Option<PathBuf>,

    /// Operator recorded on every transition
    #[arg(long, env = "BIDFLOW_OPERATOR", default_value = "operator")]
    operator: String,

    /// How batches react to a failing item
    #[arg(long, value_enum, default_value_t = Policy::FailFast)]
    batch_policy: Policy,

    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        self.verbosity.log_level_filter().as_trace()
    }

    fn workflow(&self) -> Result<BidWorkflow<HttpBidStore>> {
        let config: ClientConfig = ClientConfig::new(&self.api_url)
            .with_token(self.token.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        info!(base_url = %config.base_url, "Using bid data store");
        let store: HttpBidStore = HttpBidStore::new(config)?;

        let cache: DraftCache = match &self.drafts_db {
            Some(path) => {
                info!("Using draft cache at: {}", path.display());
                DraftCache::new_with_file(path)
                    .wrap_err_with(|| format!("Failed to open draft cache {}", path.display()))?
            }
            None => {
                info!("Using in-memory draft cache");
                DraftCache::new_in_memory()?
            }
        };

        let actor: Actor = Actor::new(self.operator.clone(), String::from("operator"));
        Ok(BidWorkflow::new(store, actor)
            .with_cache(cache)
            .with_policy(self.batch_policy.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    /// Stop at the first failure
    FailFast,
    /// Run every item and report failures per item
    CollectAll,
}

impl From<Policy> for BatchPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::FailFast => Self::FailFast,
            Policy::CollectAll => Self::CollectAll,
        }
    }
}

/// Identifies one (partner, audience, country, LOI) cell.
#[derive(Debug, Clone, clap::Args)]
struct CellArgs {
    /// Partner identifier
    partner: String,
    /// Target audience identifier
    audience: i64,
    /// Country name
    country: String,
    /// Length of interview in minutes
    loi: u16,
}

impl CellArgs {
    fn key(&self) -> Result<AllocationKey> {
        Ok(AllocationKey::new(
            PartnerId::new(&self.partner),
            AudienceId(self.audience),
            Country::new(&self.country),
            Loi::new(self.loi)?,
        ))
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show the next bid number the store would issue
    #[command(visible_alias = "n")]
    NextNumber,

    /// Show reference data counts
    Reference,

    /// List bids in a status
    #[command(visible_alias = "ls")]
    List {
        /// Lifecycle status (draft, partner_response, infield, closure,
        /// ready_for_invoice, completed)
        #[arg(long, value_parser = parse_status)]
        status: BidStatus,
    },

    /// Show a bid and the stages it has reached
    Show { id: i64 },

    /// Set one field allocation and submit every pending allocation
    Allocate {
        id: i64,
        #[command(flatten)]
        cell: CellArgs,
        /// Allocation; invalid input is coerced to a whole number
        value: String,
    },

    /// Close fieldwork
    MoveToClosure { id: i64 },

    /// Reopen fieldwork from closure
    BackToInfield { id: i64 },

    /// Record the delivered count of one allocated cell and save closure
    Deliver {
        id: i64,
        #[command(flatten)]
        cell: CellArgs,
        delivered: u32,
    },

    /// Record the field-close date of an audience and save closure
    FieldClose {
        id: i64,
        audience: i64,
        /// Date as YYYY-MM-DD
        date: String,
    },

    /// Record the delivery metrics of an audience and save closure
    DeliveryMetrics {
        id: i64,
        audience: i64,
        #[arg(long)]
        ir: Option<f64>,
        #[arg(long)]
        drop_rate: Option<f64>,
        #[arg(long)]
        incidence_rate: Option<f64>,
        #[arg(long)]
        loi: Option<f64>,
    },

    /// Record how a partner performed on one audience and save closure
    PartnerMetrics {
        id: i64,
        partner: String,
        audience: i64,
        loi: u16,
        #[arg(long)]
        final_loi: Option<f64>,
        #[arg(long)]
        final_ir: Option<f64>,
        #[arg(long)]
        final_timeline: Option<u32>,
        #[arg(long, default_value_t = 0)]
        quality_rejects: u32,
        /// Rating from 1 to 5
        #[arg(long)]
        communication: Option<u8>,
        /// Rating from 1 to 5
        #[arg(long)]
        engagement: Option<u8>,
        /// Rating from 1 to 5
        #[arg(long)]
        problem_solving: Option<u8>,
        #[arg(long, default_value = "")]
        feedback: String,
    },

    /// Mark closure complete
    ReadyForInvoice { id: i64 },

    /// Return from invoice preparation to closure
    BackToClosure { id: i64 },

    /// Set or clear the final CPI of one invoice line and save the invoice
    FinalCpi {
        id: i64,
        #[command(flatten)]
        cell: CellArgs,
        /// Final CPI; omit to fall back to the initial CPI
        #[arg(long)]
        cpi: Option<f64>,
    },

    /// Show the invoice summary, optionally exporting its lines as CSV
    Invoice {
        id: i64,
        /// Write the invoice lines to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Submit the invoice and complete the bid
    SubmitInvoice { id: i64 },

    /// Show transitions recorded in the local log
    History { bid_number: String },
}

impl Command {
    #[allow(clippy::too_many_lines)]
    async fn run(self, workflow: &BidWorkflow<HttpBidStore>) -> Result<()> {
        match self {
            Self::NextNumber => {
                let bid_number: BidNumber = workflow.store().next_bid_number().await?;
                println!("{bid_number}");
            }
            Self::Reference => {
                let reference = workflow.load_reference_data().await?;
                println!("sales contacts: {}", reference.sales.len());
                println!("VM contacts:    {}", reference.vms.len());
                println!("clients:        {}", reference.clients.len());
                println!("partners:       {}", reference.partners.len());
            }
            Self::List { status } => {
                for bid in workflow.list_bids(status).await? {
                    println!(
                        "{:>6}  {:<8}  {:<30}  {}",
                        bid.id,
                        bid.bid_number,
                        bid.study_name,
                        bid.po_number.as_deref().unwrap_or("-")
                    );
                }
            }
            Self::Show { id } => {
                let state: BidState = workflow.open_bid(BidId(id)).await?;
                print_state(&state);
            }
            Self::Allocate { id, cell, value } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                let key: AllocationKey = cell.key()?;
                if let Some(coercion) = workflow.set_allocation(&mut state, &key, &value)? {
                    println!("coerced: {coercion}");
                }
                let report: BatchReport<AllocationKey> =
                    workflow.submit_allocations(&mut state).await?;
                println!("submitted {} allocation(s)", report.succeeded.len());
                for (key, err) in &report.failed {
                    println!("failed {key}: {err}");
                }
                if !report.is_complete() {
                    return Err(eyre!("{} allocation(s) failed", report.failed.len()));
                }
            }
            Self::MoveToClosure { id } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                workflow.move_to_closure(&mut state).await?;
                println!("{} is now {}", state.bid.bid_number, state.bid.status);
            }
            Self::BackToInfield { id } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                let stale: Vec<Stage> = workflow.back_to_infield(&mut state).await?;
                println!("{} is now {}", state.bid.bid_number, state.bid.status);
                print_stale(&stale);
            }
            Self::Deliver {
                id,
                cell,
                delivered,
            } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                let key: AllocationKey = cell.key()?;
                workflow.set_delivered(&mut state, &key, delivered)?;
                workflow.save_closure(&mut state).await?;
                println!("{key}: {delivered} delivered");
            }
            Self::FieldClose { id, audience, date } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                let closed_on = parse_iso_date(&date)?;
                workflow.set_field_close(&mut state, AudienceId(audience), closed_on)?;
                workflow.save_closure(&mut state).await?;
                println!("audience {audience} closed on {date}");
            }
            Self::DeliveryMetrics {
                id,
                audience,
                ir,
                drop_rate,
                incidence_rate,
                loi,
            } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                let metrics: DeliveryMetrics = DeliveryMetrics {
                    ir,
                    drop_rate,
                    incidence_rate,
                    loi,
                };
                workflow.set_delivery_metrics(&mut state, AudienceId(audience), metrics)?;
                workflow.save_closure(&mut state).await?;
                println!("saved delivery metrics for audience {audience}");
            }
            Self::PartnerMetrics {
                id,
                partner,
                audience,
                loi,
                final_loi,
                final_ir,
                final_timeline,
                quality_rejects,
                communication,
                engagement,
                problem_solving,
                feedback,
            } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                let key: PartnerAudienceKey = PartnerAudienceKey {
                    partner: PartnerId::new(&partner),
                    loi: Loi::new(loi)?,
                    audience: AudienceId(audience),
                };
                let metrics: PartnerMetrics = PartnerMetrics {
                    final_loi,
                    final_ir,
                    final_timeline,
                    quality_rejects,
                    communication,
                    engagement,
                    problem_solving,
                    additional_feedback: feedback,
                };
                workflow.set_partner_metrics(&mut state, key, metrics)?;
                workflow.save_closure(&mut state).await?;
                println!("saved metrics for {partner} on audience {audience}");
            }
            Self::ReadyForInvoice { id } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                workflow.move_to_ready_for_invoice(&mut state).await?;
                println!("{} is now {}", state.bid.bid_number, state.bid.status);
            }
            Self::BackToClosure { id } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                let stale: Vec<Stage> = workflow.move_back_to_closure(&mut state).await?;
                println!("{} is now {}", state.bid.bid_number, state.bid.status);
                print_stale(&stale);
            }
            Self::FinalCpi { id, cell, cpi } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                workflow.load_invoice(&mut state).await?;
                let key: AllocationKey = cell.key()?;
                let cost: CostBreakdown = workflow.set_final_cpi(&mut state, &key, cpi)?;
                workflow.save_invoice(&mut state).await?;
                println!(
                    "{key}: initial {:.2}, final {:.2}, savings {:.2}",
                    cost.initial_cost, cost.final_cost, cost.savings
                );
            }
            Self::Invoice { id, csv } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                let summary: InvoiceSummary = workflow.load_invoice(&mut state).await?;
                print_summary(&summary);
                if let Some(path) = csv {
                    let sheet = state
                        .invoice
                        .as_ref()
                        .ok_or_else(|| eyre!("Bid {} has no invoice", state.bid.bid_number))?;
                    let file: File = File::create(&path)
                        .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
                    let rows: usize = export_invoice_csv(sheet, file)?;
                    info!(rows, "Exported invoice lines to {}", path.display());
                }
            }
            Self::SubmitInvoice { id } => {
                let mut state: BidState = workflow.open_bid(BidId(id)).await?;
                workflow.load_invoice(&mut state).await?;
                let summary: InvoiceSummary = workflow.submit_invoice(&mut state).await?;
                println!("{} is now {}", state.bid.bid_number, state.bid.status);
                print_summary(&summary);
            }
            Self::History { bid_number } => {
                let records: Vec<TransitionRecord> =
                    workflow.history(&BidNumber::new(&bid_number))?;
                if records.is_empty() {
                    println!("no transitions recorded for {bid_number}");
                }
                for record in records {
                    println!(
                        "{}  {:<24} {} -> {}  by {}",
                        record.recorded_at,
                        record.action,
                        record.from_status,
                        record.to_status,
                        record.actor.id
                    );
                }
            }
        }
        Ok(())
    }
}

fn parse_status(value: &str) -> Result<BidStatus, String> {
    value.parse::<BidStatus>().map_err(|e| e.to_string())
}

fn print_state(state: &BidState) {
    let bid = &state.bid;
    println!("bid {} ({})", bid.bid_number, bid.status);
    println!("  study:      {}", bid.study_name);
    println!("  partners:   {}", bid.partners.len());
    println!("  LOIs:       {}", bid.lois.len());
    println!("  countries:  {}", bid.countries.len());
    println!("  audiences:  {}", bid.target_audiences.len());
    println!("  responses:  {}", state.responses.len());
    println!("  allocated:  {}", state.allocations.total_allocation());
    if let Some(closure) = &state.closure {
        println!("  delivered:  {}", closure.delivered_total());
    }
    if let Some(sheet) = &state.invoice {
        println!("  invoice:    {:.2}", round_currency(sheet.total()));
    }
    if let Some(po_number) = &bid.po_number {
        println!("  PO number:  {po_number}");
    }
    let stale: Vec<Stage> = state.stale_stages.iter().copied().collect();
    print_stale(&stale);
}

fn print_stale(stale: &[Stage]) {
    for stage in stale {
        println!("  {stage} data may be stale until saved again");
    }
}

fn print_summary(summary: &InvoiceSummary) {
    let average = |value: Option<f64>| {
        value.map_or_else(|| String::from("-"), |v| format!("{:.2}", round_currency(v)))
    };
    println!("total allocation: {}", summary.total_allocation);
    println!("total delivered:  {}", summary.total_delivered);
    println!("avg initial CPI:  {}", average(summary.avg_initial_cpi));
    println!("avg final CPI:    {}", average(summary.avg_final_cpi));
    println!("avg final LOI:    {}", average(summary.avg_final_loi));
    println!("avg final IR:     {}", average(summary.avg_final_ir));
    println!("quality rejects:  {}", summary.quality_rejects);
    println!("invoice amount:   {:.2}", round_currency(summary.invoice_amount));
}
