use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AmortizationPoint, AmortizationRun, Band, Leg, Repayment, RepaymentBasis, Scheme,
    calculate_repayment, fy2024, simulate_amortization,
};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_INCOME: f64 = 60_000.0;
pub const DEFAULT_DEBT: f64 = 30_000.0;
pub const MAX_SLIDER_INCOME: f64 = 180_000.0;
pub const MAX_SLIDER_DEBT: f64 = 174_998.0;
const MAX_INPUT: f64 = 10_000_000.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliScheme {
    Old,
    New,
}

impl From<CliScheme> for Scheme {
    fn from(value: CliScheme) -> Self {
        match value {
            CliScheme::Old => Scheme::Old,
            CliScheme::New => Scheme::New,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiScheme {
    #[serde(alias = "nonMarginal", alias = "non-marginal", alias = "current")]
    Old,
    #[serde(alias = "marginal", alias = "proposed")]
    New,
}

impl From<ApiScheme> for CliScheme {
    fn from(value: ApiScheme) -> Self {
        match value {
            ApiScheme::Old => CliScheme::Old,
            ApiScheme::New => CliScheme::New,
        }
    }
}

impl From<Scheme> for ApiScheme {
    fn from(value: Scheme) -> Self {
        match value {
            Scheme::Old => ApiScheme::Old,
            Scheme::New => ApiScheme::New,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "hecs-calculator",
    about = "HECS-HELP compulsory repayment and payoff calculator"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API consumed by the calculator UI
    Serve {
        #[arg(long, env = "HECS_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Yearly compulsory repayment for one income
    Repayment(RepaymentArgs),
    /// Year-by-year balance under the old and new schemes
    Amortization {
        #[command(flatten)]
        args: AmortizationArgs,
        #[arg(long, help = "Print the run as JSON instead of a table")]
        json: bool,
    },
    /// Print the FY2024 repayment bands
    Bands,
}

#[derive(Args, Debug, Clone)]
struct RepaymentArgs {
    #[arg(long, help = "Repayment income for the year")]
    income: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Indexation applied to income in percent, e.g. 3.5"
    )]
    cpi: f64,
    #[arg(long, value_enum, default_value_t = CliScheme::Old)]
    scheme: CliScheme,
}

#[derive(Args, Debug, Clone)]
struct AmortizationArgs {
    #[arg(long, help = "Repayment income, held constant over the run")]
    income: f64,
    #[arg(long, help = "Outstanding HECS debt")]
    debt: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Indexation applied to income in percent"
    )]
    cpi: f64,
    #[arg(
        long,
        help = "Cut the new-scheme balance by 20% at the start of year 1"
    )]
    apply_cut: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RepaymentPayload {
    income: Option<f64>,
    cpi: Option<f64>,
    scheme: Option<ApiScheme>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AmortizationPayload {
    income: Option<f64>,
    #[serde(alias = "hecsDebt", alias = "initialDebt")]
    debt: Option<f64>,
    cpi: Option<f64>,
    #[serde(alias = "twentyPercentCut")]
    apply_cut: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RepaymentRequest {
    income: f64,
    cpi: f64,
    scheme: Scheme,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AmortizationRequest {
    income: f64,
    debt: f64,
    cpi: f64,
    apply_cut: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RepaymentResponse {
    income: f64,
    cpi: f64,
    scheme: ApiScheme,
    adjusted_income: f64,
    amount: f64,
    basis: RepaymentBasis,
    band: Option<Band>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AmortizationResponse {
    income: f64,
    debt: f64,
    cpi: f64,
    apply_cut: bool,
    old_repayment: f64,
    new_repayment: f64,
    old_paid_off_year: Option<u32>,
    new_paid_off_year: Option<u32>,
    old_total_repaid: f64,
    new_total_repaid: f64,
    years: Vec<AmortizationPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BandsResponse {
    financial_year: &'static str,
    bands: Vec<Band>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LimitsResponse {
    max_income: f64,
    max_debt: f64,
    default_income: f64,
    default_debt: f64,
    default_cpi: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn check_amount(flag: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || !(0.0..=MAX_INPUT).contains(&value) {
        return Err(format!("--{flag} must be between 0 and {MAX_INPUT}"));
    }
    Ok(())
}

fn check_cpi(cpi: f64) -> Result<(), String> {
    if !(0.0..=100.0).contains(&cpi) {
        return Err("--cpi must be between 0 and 100".to_string());
    }
    Ok(())
}

fn build_repayment_request(args: RepaymentArgs) -> Result<RepaymentRequest, String> {
    check_amount("income", args.income)?;
    check_cpi(args.cpi)?;
    Ok(RepaymentRequest {
        income: args.income,
        cpi: args.cpi,
        scheme: args.scheme.into(),
    })
}

fn build_amortization_request(args: AmortizationArgs) -> Result<AmortizationRequest, String> {
    check_amount("income", args.income)?;
    check_amount("debt", args.debt)?;
    check_cpi(args.cpi)?;
    Ok(AmortizationRequest {
        income: args.income,
        debt: args.debt,
        cpi: args.cpi,
        apply_cut: args.apply_cut,
    })
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Repayment(args) => {
            let request = build_repayment_request(args)?;
            let repayment = calculate_repayment(request.income, request.cpi, request.scheme.mode());
            print_repayment(&request, &repayment);
            Ok(())
        }
        Command::Amortization { args, json } => {
            let request = build_amortization_request(args)?;
            let response = build_amortization_response(&request);
            if json {
                let body = serde_json::to_string_pretty(&response)
                    .map_err(|e| format!("Failed to encode run: {e}"))?;
                println!("{body}");
            } else {
                print_amortization(&response);
            }
            Ok(())
        }
        Command::Bands => {
            print_bands();
            Ok(())
        }
    }
}

fn print_repayment(request: &RepaymentRequest, repayment: &Repayment) {
    let label = match request.scheme {
        Scheme::Old => "old",
        Scheme::New => "new",
    };
    println!("Income:           ${:.2}", request.income);
    println!("Indexed income:   ${:.2}", repayment.adjusted_income);
    if let Some(band) = repayment.band {
        println!("Band rate:        {:.1}%", band.rate * 100.0);
    }
    println!("Repayment ({label}): ${:.2}", repayment.amount);
}

fn print_amortization(response: &AmortizationResponse) {
    println!(
        "Yearly repayment: old ${:.2}, new ${:.2}",
        response.old_repayment, response.new_repayment
    );
    println!("{:>4} {:>14} {:>14}", "Year", "Old", "New");
    println!("{}", "-".repeat(34));
    for point in &response.years {
        println!(
            "{:>4} {:>14.2} {:>14.2}",
            point.year,
            point.old,
            point.new.unwrap_or_default()
        );
    }
    let paid_off = |year: Option<u32>| match year {
        Some(year) => format!("year {year}"),
        None => "not within the horizon".to_string(),
    };
    println!("Old scheme paid off: {}", paid_off(response.old_paid_off_year));
    println!("New scheme paid off: {}", paid_off(response.new_paid_off_year));
}

fn print_bands() {
    println!("{:>10} {:>10} {:>6}", "From", "To", "Rate");
    for band in fy2024().bands() {
        let to = band
            .max_income
            .map(|max| max.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>10} {:>10} {:>5.1}%", band.min_income, to, band.rate * 100.0);
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/repayment",
            get(repayment_get_handler).post(repayment_post_handler),
        )
        .route(
            "/api/amortization",
            get(amortization_get_handler).post(amortization_post_handler),
        )
        .route("/api/bands", get(bands_handler))
        .route("/api/limits", get(limits_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("HECS calculator API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn repayment_get_handler(Query(payload): Query<RepaymentPayload>) -> Response {
    repayment_handler_impl(payload)
}

async fn repayment_post_handler(Json(payload): Json<RepaymentPayload>) -> Response {
    repayment_handler_impl(payload)
}

fn repayment_handler_impl(payload: RepaymentPayload) -> Response {
    let request = match repayment_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    debug!("repayment request: {request:?}");
    json_response(StatusCode::OK, build_repayment_response(&request))
}

async fn amortization_get_handler(Query(payload): Query<AmortizationPayload>) -> Response {
    amortization_handler_impl(payload)
}

async fn amortization_post_handler(Json(payload): Json<AmortizationPayload>) -> Response {
    amortization_handler_impl(payload)
}

fn amortization_handler_impl(payload: AmortizationPayload) -> Response {
    let request = match amortization_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    debug!("amortization request: {request:?}");
    json_response(StatusCode::OK, build_amortization_response(&request))
}

async fn bands_handler() -> Response {
    json_response(
        StatusCode::OK,
        BandsResponse {
            financial_year: "2024-25",
            bands: fy2024().bands().to_vec(),
        },
    )
}

async fn limits_handler() -> Response {
    json_response(StatusCode::OK, default_limits())
}

fn default_limits() -> LimitsResponse {
    LimitsResponse {
        max_income: MAX_SLIDER_INCOME,
        max_debt: MAX_SLIDER_DEBT,
        default_income: DEFAULT_INCOME,
        default_debt: DEFAULT_DEBT,
        default_cpi: 0.0,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn repayment_request_from_json(json: &str) -> Result<RepaymentRequest, String> {
    let payload = serde_json::from_str::<RepaymentPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    repayment_request_from_payload(payload)
}

#[cfg(test)]
fn amortization_request_from_json(json: &str) -> Result<AmortizationRequest, String> {
    let payload = serde_json::from_str::<AmortizationPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    amortization_request_from_payload(payload)
}

fn repayment_request_from_payload(payload: RepaymentPayload) -> Result<RepaymentRequest, String> {
    let mut args = default_repayment_args();
    if let Some(v) = payload.income {
        args.income = v;
    }
    if let Some(v) = payload.cpi {
        args.cpi = v;
    }
    if let Some(v) = payload.scheme {
        args.scheme = v.into();
    }
    build_repayment_request(args)
}

fn amortization_request_from_payload(
    payload: AmortizationPayload,
) -> Result<AmortizationRequest, String> {
    let mut args = default_amortization_args();
    if let Some(v) = payload.income {
        args.income = v;
    }
    if let Some(v) = payload.debt {
        args.debt = v;
    }
    if let Some(v) = payload.cpi {
        args.cpi = v;
    }
    if let Some(v) = payload.apply_cut {
        args.apply_cut = v;
    }
    build_amortization_request(args)
}

fn default_repayment_args() -> RepaymentArgs {
    RepaymentArgs {
        income: DEFAULT_INCOME,
        cpi: 0.0,
        scheme: CliScheme::Old,
    }
}

fn default_amortization_args() -> AmortizationArgs {
    AmortizationArgs {
        income: DEFAULT_INCOME,
        debt: DEFAULT_DEBT,
        cpi: 0.0,
        apply_cut: false,
    }
}

fn build_repayment_response(request: &RepaymentRequest) -> RepaymentResponse {
    let repayment = calculate_repayment(request.income, request.cpi, request.scheme.mode());
    RepaymentResponse {
        income: request.income,
        cpi: request.cpi,
        scheme: request.scheme.into(),
        adjusted_income: repayment.adjusted_income,
        amount: repayment.amount,
        basis: repayment.basis,
        band: repayment.band,
    }
}

fn build_amortization_response(request: &AmortizationRequest) -> AmortizationResponse {
    let run: AmortizationRun =
        simulate_amortization(request.income, request.debt, request.cpi, request.apply_cut);
    AmortizationResponse {
        income: request.income,
        debt: request.debt,
        cpi: request.cpi,
        apply_cut: request.apply_cut,
        old_repayment: run.yearly_repayment(Leg::Old).unwrap_or_default(),
        new_repayment: run.yearly_repayment(Leg::New).unwrap_or_default(),
        old_paid_off_year: run.paid_off_year(Leg::Old),
        new_paid_off_year: run.paid_off_year(Leg::New),
        old_total_repaid: run.total_repaid(Leg::Old).unwrap_or_default(),
        new_total_repaid: run.total_repaid(Leg::New).unwrap_or_default(),
        years: run.into_points(),
    }
}
