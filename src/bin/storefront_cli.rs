use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use storefront::{
    auth::Session,
    client::StorefrontClient,
    config::{self, AppConfig},
    models::{Cart, Coupon, CouponKind, CreateCouponRequest, LoginRequest, Product, SubscriptionOffer},
    services::{compute_final_price_at, subscriptions::current_offers, PriceQuote},
};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Offline pricing needs neither config nor network
    if let Commands::Quote(args) = &cli.command {
        return handle_quote(args, cli.json);
    }

    let context = CliContext::initialize()?;
    match cli.command {
        Commands::Quote(_) => Ok(()),
        Commands::Login(args) => handle_login(&context, args, cli.json).await,
        Commands::Logout => handle_logout(&context),
        Commands::Coupons(command) => handle_coupons_command(&context, command, cli.json).await,
        Commands::Products(command) => handle_products_command(&context, command, cli.json).await,
        Commands::Cart(command) => handle_cart_command(&context, command, cli.json).await,
        Commands::Subscriptions(command) => {
            handle_subscriptions_command(&context, command, cli.json).await
        }
    }
}

#[derive(Parser)]
#[command(name = "storefront", about = "Storefront pricing and catalog CLI", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price an amount locally against a coupon described by flags
    Quote(QuoteArgs),
    /// Log in and save the session
    Login(LoginArgs),
    /// End the saved session
    Logout,
    #[command(subcommand)]
    Coupons(CouponsCommands),
    #[command(subcommand)]
    Products(ProductsCommands),
    #[command(subcommand)]
    Cart(CartCommands),
    #[command(subcommand)]
    Subscriptions(SubscriptionsCommands),
}

#[derive(Args)]
struct QuoteArgs {
    #[arg(long, value_parser = parse_decimal, help = "Pre-discount amount")]
    base: Decimal,
    #[arg(long, value_parser = parse_coupon_kind, requires = "coupon_value", help = "Percentage or Fixed")]
    coupon_type: Option<CouponKind>,
    #[arg(long, value_parser = parse_decimal, requires = "coupon_type")]
    coupon_value: Option<Decimal>,
    #[arg(long, default_value = "CLI", requires = "coupon_type", help = "Code reported on the quote")]
    code: String,
    #[arg(long, value_parser = parse_datetime, requires = "coupon_type", help = "Window start (RFC3339); defaults to the evaluation time")]
    starts_from: Option<DateTime<Utc>>,
    #[arg(long, value_parser = parse_datetime, requires = "coupon_type", help = "Window end (RFC3339); defaults to one day after the start")]
    ends_on: Option<DateTime<Utc>>,
    #[arg(long, requires = "coupon_type")]
    usage_limit: Option<u32>,
    #[arg(long, default_value_t = 0, requires = "coupon_type")]
    used_count: u32,
    #[arg(long, value_parser = parse_decimal, requires = "coupon_type")]
    min_purchase: Option<Decimal>,
    #[arg(long, value_parser = parse_datetime, help = "Evaluation time (RFC3339); defaults to now")]
    at: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct LoginArgs {
    #[arg(long, help = "Email address for the account")]
    email: String,
    #[arg(long, help = "Password for the account")]
    password: String,
}

#[derive(Subcommand)]
enum CouponsCommands {
    List,
    Create(CreateCouponArgs),
}

#[derive(Args)]
struct CreateCouponArgs {
    #[arg(long)]
    code: String,
    #[arg(long, value_parser = parse_coupon_kind)]
    coupon_type: CouponKind,
    #[arg(long, value_parser = parse_decimal)]
    coupon_value: Decimal,
    #[arg(long, value_parser = parse_datetime)]
    starts_from: DateTime<Utc>,
    #[arg(long, value_parser = parse_datetime)]
    ends_on: DateTime<Utc>,
    #[arg(long)]
    usage_limit: Option<u32>,
    #[arg(long, value_parser = parse_decimal)]
    min_purchase: Option<Decimal>,
}

#[derive(Subcommand)]
enum ProductsCommands {
    List,
}

#[derive(Subcommand)]
enum CartCommands {
    Show,
    ApplyCoupon(ApplyCouponArgs),
}

#[derive(Args)]
struct ApplyCouponArgs {
    #[arg(long)]
    code: String,
}

#[derive(Subcommand)]
enum SubscriptionsCommands {
    /// The offer in force for each plan
    Current(CurrentOffersArgs),
}

#[derive(Args)]
struct CurrentOffersArgs {
    #[arg(long, value_parser = parse_datetime, help = "Reference time (RFC3339); defaults to now")]
    at: Option<DateTime<Utc>>,
}

struct CliContext {
    config: AppConfig,
    client: StorefrontClient,
}

impl CliContext {
    fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);
        let client =
            StorefrontClient::from_config(&config).context("failed to build API client")?;
        debug!(base_url = %client.base_url(), "CLI initialized");
        Ok(Self { config, client })
    }

    fn session_path(&self) -> Option<PathBuf> {
        session_file_path(self.config.session_file.as_deref())
    }

    fn require_session(&self) -> Result<Session> {
        read_session(self.session_path())?
            .map(|(_, session)| session)
            .ok_or_else(|| anyhow!("not logged in; run `storefront login` first"))
    }
}

fn handle_quote(args: &QuoteArgs, json: bool) -> Result<()> {
    let at = args.at.unwrap_or_else(Utc::now);
    let coupon = match (args.coupon_type, args.coupon_value) {
        (Some(kind), Some(value)) => {
            let starts_at = args.starts_from.unwrap_or(at);
            Some(Coupon {
                id: None,
                code: args.code.clone(),
                kind,
                value,
                starts_at,
                ends_at: args.ends_on.unwrap_or(starts_at + Duration::days(1)),
                usage_limit: args.usage_limit,
                used_count: args.used_count,
                min_purchase: args.min_purchase,
            })
        }
        _ => None,
    };

    let quote = compute_final_price_at(args.base, coupon.as_ref(), at)?;
    if json {
        print_json(&quote)
    } else {
        render_quote(&quote);
        Ok(())
    }
}

async fn handle_login(context: &CliContext, args: LoginArgs, json: bool) -> Result<()> {
    let credentials = LoginRequest {
        email: args.email,
        password: args.password,
    };
    let session = context
        .client
        .login(&credentials)
        .await
        .context("failed to authenticate")?;

    let saved_path = persist_session(context.session_path(), &session)?;

    if json {
        print_json(&serde_json::json!({
            "userId": session.user_id(),
            "role": session.role(),
            "sessionFile": saved_path,
        }))?;
    } else {
        println!("Logged in as {} ({})", session.user_id(), session.role());
        match saved_path {
            Some(path) => println!("Session saved to: {}", path),
            None => eprintln!("Skipping session persistence: no suitable directory found."),
        }
    }
    Ok(())
}

fn handle_logout(context: &CliContext) -> Result<()> {
    match read_session(context.session_path())? {
        Some((path, session)) => {
            let user_id = session.end();
            clear_session_file(&path)?;
            println!("Logged out {}", user_id);
        }
        None => println!("No saved session"),
    }
    Ok(())
}

async fn handle_coupons_command(
    context: &CliContext,
    command: CouponsCommands,
    json: bool,
) -> Result<()> {
    let session = context.require_session()?;
    match command {
        CouponsCommands::List => {
            let coupons = context.client.list_coupons(&session).await?;
            if json {
                print_json(&coupons)?;
            } else if coupons.is_empty() {
                println!("No coupons");
            } else {
                coupons.iter().for_each(render_coupon);
            }
        }
        CouponsCommands::Create(args) => {
            let request = CreateCouponRequest {
                code: args.code,
                kind: args.coupon_type,
                value: args.coupon_value,
                starts_at: args.starts_from,
                ends_at: args.ends_on,
                usage_limit: args.usage_limit,
                min_purchase: args.min_purchase,
            };
            let coupon = context.client.create_coupon(&session, &request).await?;
            if json {
                print_json(&coupon)?;
            } else {
                print!("Created ");
                render_coupon(&coupon);
            }
        }
    }
    Ok(())
}

async fn handle_products_command(
    context: &CliContext,
    command: ProductsCommands,
    json: bool,
) -> Result<()> {
    let session = context.require_session()?;
    match command {
        ProductsCommands::List => {
            let products = context.client.list_products(&session).await?;
            if json {
                print_json(&products)?;
            } else {
                products.iter().for_each(render_product);
            }
        }
    }
    Ok(())
}

async fn handle_cart_command(context: &CliContext, command: CartCommands, json: bool) -> Result<()> {
    let session = context.require_session()?;
    let cart = context
        .client
        .own_cart(&session)
        .await?
        .ok_or_else(|| anyhow!("cart is empty"))?;

    match command {
        CartCommands::Show => {
            if json {
                print_json(&cart)?;
            } else {
                render_cart(&cart);
            }
        }
        CartCommands::ApplyCoupon(args) => {
            let repriced = context
                .client
                .apply_coupon(&session, &cart.id, &args.code)
                .await?;
            if json {
                print_json(&repriced)?;
            } else {
                println!("Coupon {} applied", args.code.trim());
                render_cart(&repriced);
            }
        }
    }
    Ok(())
}

async fn handle_subscriptions_command(
    context: &CliContext,
    command: SubscriptionsCommands,
    json: bool,
) -> Result<()> {
    match command {
        SubscriptionsCommands::Current(args) => {
            let offers = context.client.list_offers().await?;
            let current = current_offers(&offers, args.at.unwrap_or_else(Utc::now));
            if json {
                print_json(&current)?;
            } else if current.is_empty() {
                println!("No subscription offers");
            } else {
                current.iter().for_each(render_offer);
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_quote(quote: &PriceQuote) {
    println!("Base amount:  {:.2}", quote.base_amount);
    if let Some(code) = &quote.coupon_code {
        println!("Coupon:       {}", code);
    }
    println!("Discount:     {:.2}", quote.discount);
    println!("Final amount: {:.2}", quote.final_amount);
}

fn usage_summary(coupon: &Coupon) -> String {
    match (coupon.usage_limit, coupon.remaining_uses()) {
        (Some(limit), Some(remaining)) => format!(
            "{}/{} used, {} left",
            coupon.used_count, limit, remaining
        ),
        _ => format!("{} used", coupon.used_count),
    }
}

fn render_coupon(coupon: &Coupon) {
    println!(
        "- {} • {} • {} to {} • {}",
        coupon.code,
        coupon.label(),
        coupon.starts_at.format("%Y-%m-%d"),
        coupon.ends_at.format("%Y-%m-%d"),
        usage_summary(coupon)
    );
}

fn render_product(product: &Product) {
    println!(
        "- Product {} • {} • price {:.2} • stock {}",
        product.id, product.name, product.price, product.stock
    );
}

fn render_cart(cart: &Cart) {
    println!("Cart {}", cart.id);
    for line in &cart.lines {
        match line.product.product() {
            Some(product) => println!(
                "  • {} x {} @ {:.2}",
                line.quantity, product.name, product.price
            ),
            None => println!("  • {} x {}", line.quantity, line.product.id()),
        }
    }
    println!("Total: {:.2}", cart.total_price);
    if let Some(discount) = cart.discount_price {
        println!("Discount: -{:.2}", discount);
    }
    println!("Payable: {:.2}", cart.payable());
}

fn render_offer(offer: &SubscriptionOffer) {
    println!(
        "- {} • {:.2} (was {:.2}) • {} days • up to {} employees • from {}",
        offer.plan_name(),
        offer.selling_price,
        offer.display_price,
        offer.validity_in_days,
        offer.max_employees,
        offer.wef.format("%Y-%m-%d")
    );
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw).map_err(|_| format!("invalid decimal '{raw}'"))
}

fn parse_coupon_kind(raw: &str) -> Result<CouponKind, String> {
    CouponKind::from_str(raw).map_err(|_| format!("invalid coupon type '{raw}', expected Percentage or Fixed"))
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("invalid datetime '{}', expected RFC3339", raw))
}

fn session_file_path(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(PathBuf::from(path));
    }

    if let Ok(dir) = std::env::var("STOREFRONT_CLI_HOME") {
        let mut path = PathBuf::from(dir);
        path.push("session.json");
        return Some(path);
    }

    std::env::var("HOME").ok().map(|home| {
        let mut path = PathBuf::from(home);
        path.push(".storefront");
        path.push("session.json");
        path
    })
}

fn save_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let payload = serde_json::to_vec_pretty(session)?;
    fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}

fn persist_session(path: Option<PathBuf>, session: &Session) -> Result<Option<String>> {
    match path {
        Some(path) => {
            save_session(&path, session)?;
            Ok(Some(path.display().to_string()))
        }
        None => Ok(None),
    }
}

fn read_session(path: Option<PathBuf>) -> Result<Option<(PathBuf, Session)>> {
    let path = match path {
        Some(path) => path,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read session file {}", path.display()))?;
    let session: Session = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse session file {}", path.display()))?;
    Ok(Some((path, session)))
}

fn clear_session_file(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}
