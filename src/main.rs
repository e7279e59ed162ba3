mod auth;
mod config;
mod error;
mod handlers;
mod http;
mod models;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Datelike, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{Instrument, error, info_span, warn};
use tracing_subscriber::EnvFilter;

use config::{DEFAULT_AGENT_ID, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, Settings};
use error::ClientError;
use handlers::uploads::{asset_keys, asset_spec, format_title};
use handlers::{
    ChatSession, ConfigEditor, FaqEditor, LocalFile, Period, bucket_by_status, daily_status, fetch_all_tickets,
    find_ticket, handle_active_images, handle_create_image, handle_delete_faq, handle_delete_image,
    handle_delete_ticket, handle_faq_answer, handle_faq_categories, handle_image_categories, handle_list_images,
    handle_list_tickets, handle_login, handle_recent_tickets, handle_reset_password, handle_ticket_metrics,
    handle_update_image, handle_update_status, handle_upload_config_asset, monthly_status_chart,
};
use http::{ApiClient, error_from, generate_short_id, success_response};
use models::{FaqRequest, ImageRequest, TicketStatus};

/// Admin console for the support-desk API.
#[derive(Debug, Parser)]
#[command(name = "support-admin", version, about)]
struct Cli {
    #[arg(long, global = true, env = "SUPPORT_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Bearer token from `login`
    #[arg(long, global = true, env = "SUPPORT_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Sender id used for chat replies
    #[arg(long, global = true, env = "SUPPORT_AGENT_ID", default_value_t = DEFAULT_AGENT_ID)]
    agent_id: i64,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "SUPPORT_API_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Log requests to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and print a bearer token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SUPPORT_API_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Set a new password with the token from the reset email
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long = "reset-token")]
        reset_token: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Show what the configured token says about itself
    Whoami,
    #[command(subcommand)]
    Tickets(TicketCommand),
    /// Ticket totals per status
    Metrics,
    /// Today's closure rate across every ticket
    Daily,
    /// Ticket trends grouped by month, quarter or year
    Stats {
        #[arg(long, value_enum, default_value = "monthly")]
        period: Period,
        /// Defaults to the current year
        #[arg(long)]
        year: Option<i32>,
    },
    /// Closed, pending and under-review tickets per month
    MonthlyChart {
        #[arg(long)]
        year: Option<i32>,
    },
    #[command(subcommand)]
    Chat(ChatCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
    #[command(subcommand)]
    Faqs(FaqCommand),
    #[command(subcommand)]
    Images(ImageCommand),
}

#[derive(Debug, Subcommand)]
enum TicketCommand {
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// The seven most recent tickets
    Recent,
    Status {
        id: i64,
        /// pending, underReview or closed
        status: String,
    },
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ChatCommand {
    /// Latest messages; marks the customer's unread messages as read
    Show { ticket: i64 },
    /// Latest messages plus up to `pages` older pages
    More {
        ticket: i64,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Send {
        ticket: i64,
        #[arg(default_value = "")]
        message: String,
        #[arg(long)]
        attach: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    List,
    /// Branding logo URLs
    Logos,
    /// Change a value, or replace an avatar with --file
    Set {
        name: String,
        #[arg(default_value = "")]
        value: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Add {
        name: String,
        #[arg(long)]
        value: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Delete {
        name: String,
        #[arg(long)]
        yes: bool,
    },
    /// Upload logos or avatars (app_logo, app_logo_white, icon_logo, avatar_paths)
    Upload {
        key: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum FaqCommand {
    List,
    Categories,
    Show { id: String },
    Add(FaqArgs),
    Edit {
        id: String,
        #[command(flatten)]
        form: FaqEditArgs,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
struct FaqArgs {
    #[arg(long)]
    category: String,
    #[arg(long)]
    question: String,
    #[arg(long)]
    answer: String,
}

/// Unset fields keep their current value.
#[derive(Debug, Args)]
struct FaqEditArgs {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    question: Option<String>,
    #[arg(long)]
    answer: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ImageCommand {
    List,
    Categories,
    /// Images the app is showing right now
    Active,
    Add {
        #[command(flatten)]
        form: ImageArgs,
        #[arg(long)]
        file: PathBuf,
    },
    Edit {
        id: String,
        #[command(flatten)]
        form: ImageArgs,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
struct ImageArgs {
    #[arg(long)]
    category: String,
    /// 0 internal link, 1 external link
    #[arg(long, default_value_t = 0)]
    action: i64,
    #[arg(long)]
    external_url: Option<String>,
    #[arg(long)]
    internal_url: Option<String>,
    #[arg(long)]
    display_from: Option<String>,
    #[arg(long)]
    display_until: Option<String>,
}

impl From<ImageArgs> for ImageRequest {
    fn from(args: ImageArgs) -> Self {
        ImageRequest {
            category: args.category,
            action: args.action,
            external_url: args.external_url,
            internal_url: args.internal_url,
            display_from: args.display_from,
            display_until: args.display_until,
        }
    }
}

/// Route a parsed command to its handler. Returns the success message and the data to print.
async fn handle_command(command: Command, settings: &Settings, client: &ApiClient) -> Result<(String, Value), ClientError> {
    let current_year = Utc::now().year();

    match command {
        Command::Login { email, password } => {
            let out = handle_login(&email, &password, client).await?;
            Ok(("Login successful".to_string(), out))
        }
        Command::ResetPassword { email, reset_token, password, confirm } => {
            let out = handle_reset_password(&email, &reset_token, &password, &confirm, client).await?;
            Ok(("Password has been reset".to_string(), out))
        }
        Command::Whoami => {
            let token = settings
                .token
                .as_deref()
                .ok_or_else(|| ClientError::Config("No token set. Run `login` and export SUPPORT_API_TOKEN".to_string()))?;
            let claims = auth::describe_token(token, Utc::now());
            if claims.as_ref().is_some_and(|c| c.expired) {
                warn!("token has expired");
            }
            Ok(("Token details".to_string(), json!({ "base_url": client.base_url(), "claims": claims })))
        }

        Command::Tickets(TicketCommand::List { page, per_page }) => {
            Ok(("Tickets".to_string(), handle_list_tickets(page, per_page, client).await?))
        }
        Command::Tickets(TicketCommand::Recent) => {
            Ok(("Recent tickets".to_string(), json!(handle_recent_tickets(client).await?)))
        }
        Command::Tickets(TicketCommand::Status { id, status }) => {
            let status = TicketStatus::from(status);
            let out = handle_update_status(id, status, client).await?;
            Ok(("Ticket status updated successfully".to_string(), out))
        }
        Command::Tickets(TicketCommand::Delete { id, yes }) => {
            confirm(yes, &format!("delete ticket {}", id))?;
            Ok(("Ticket deleted successfully".to_string(), handle_delete_ticket(id, client).await?))
        }

        Command::Metrics => Ok(("Ticket metrics".to_string(), json!(handle_ticket_metrics(client).await?))),
        Command::Daily => {
            let tickets = fetch_all_tickets(client).await?;
            let today = Utc::now().date_naive();
            Ok(("Daily status".to_string(), json!(daily_status(&tickets, today))))
        }
        Command::Stats { period, year } => {
            let tickets = fetch_all_tickets(client).await?;
            let series = bucket_by_status(&tickets, period, year.unwrap_or(current_year));
            Ok(("Ticket statistics".to_string(), series.to_chart()))
        }
        Command::MonthlyChart { year } => {
            let tickets = fetch_all_tickets(client).await?;
            Ok(("Monthly tickets".to_string(), monthly_status_chart(&tickets, year.unwrap_or(current_year))))
        }

        Command::Chat(ChatCommand::Show { ticket }) => {
            let ticket = find_ticket(ticket, client).await?;
            let chat = ChatSession::open(client, &ticket, settings.agent_id).await?;
            Ok(("Chat history".to_string(), chat.to_json()))
        }
        Command::Chat(ChatCommand::More { ticket, pages }) => {
            let ticket = find_ticket(ticket, client).await?;
            let mut chat = ChatSession::open(client, &ticket, settings.agent_id).await?;
            for _ in 0..pages {
                if !chat.has_more() {
                    break;
                }
                chat.load_more(client).await?;
            }
            Ok(("Chat history".to_string(), chat.to_json()))
        }
        Command::Chat(ChatCommand::Send { ticket, message, attach }) => {
            let attachment = read_optional(attach).await?;
            let ticket = find_ticket(ticket, client).await?;
            let mut chat = ChatSession::open(client, &ticket, settings.agent_id).await?;
            let sent = chat.send(client, &message, attachment).await?;
            Ok(("Message sent!".to_string(), json!(sent)))
        }

        Command::Config(ConfigCommand::List) => {
            let editor = ConfigEditor::load(client).await?;
            let rows: Vec<Value> = editor
                .entries()
                .iter()
                .map(|e| json!({ "entry": e, "is_image": handlers::is_image_config(&e.name, &e.value) }))
                .collect();
            Ok(("Configurations".to_string(), json!(rows)))
        }
        Command::Config(ConfigCommand::Logos) => {
            let map = handlers::fetch_config_map(client).await?;
            Ok(("Logos".to_string(), json!(handlers::branding_logos(&map))))
        }
        Command::Config(ConfigCommand::Set { name, value, file }) => {
            let file = read_optional(file).await?;
            let mut editor = ConfigEditor::load(client).await?;
            editor.begin_edit(&name)?;
            let saved = editor.save(client, &value, file).await?;
            Ok(("Configuration updated successfully".to_string(), json!(saved)))
        }
        Command::Config(ConfigCommand::Add { name, value, file }) => {
            let file = read_optional(file).await?;
            let mut editor = ConfigEditor::load(client).await?;
            editor.add(client, &name, value, file).await?;
            Ok(("Configuration added successfully".to_string(), json!(editor.entries())))
        }
        Command::Config(ConfigCommand::Delete { name, yes }) => {
            confirm(yes, &format!("delete config '{}'", name))?;
            let mut editor = ConfigEditor::load(client).await?;
            let removed = editor.delete(client, &name).await?;
            Ok(("Configuration deleted successfully".to_string(), json!(removed)))
        }
        Command::Config(ConfigCommand::Upload { key, files }) => {
            if asset_spec(&key).is_none() {
                return Err(ClientError::Validation(format!(
                    "'{}' does not take uploads; use one of: {}",
                    key,
                    asset_keys().join(", ")
                )));
            }
            let mut local = Vec::with_capacity(files.len());
            for path in &files {
                local.push(LocalFile::read(path).await?);
            }
            let out = handle_upload_config_asset(&key, local, client).await?;
            Ok((format!("{} uploaded successfully", format_title(&key)), out))
        }

        Command::Faqs(FaqCommand::List) => Ok(("FAQs".to_string(), json!(FaqEditor::load(client).await?.faqs()))),
        Command::Faqs(FaqCommand::Categories) => {
            Ok(("FAQ categories".to_string(), json!(handle_faq_categories(client).await?)))
        }
        Command::Faqs(FaqCommand::Show { id }) => Ok(("FAQ".to_string(), json!(handle_faq_answer(&id, client).await?))),
        Command::Faqs(FaqCommand::Add(args)) => {
            let mut editor = FaqEditor::default();
            let form = FaqRequest { category: args.category, question: args.question, answer: args.answer };
            let created = editor.submit(client, form).await?;
            Ok(("FAQ added successfully".to_string(), json!(created)))
        }
        Command::Faqs(FaqCommand::Edit { id, form }) => {
            let mut editor = FaqEditor::load(client).await?;
            let mut current = editor.begin_edit(&id)?;
            if current.answer.is_empty() && form.answer.is_none() {
                current.answer = handle_faq_answer(&id, client).await?.answer.unwrap_or_default();
            }
            let merged = FaqRequest {
                category: form.category.unwrap_or(current.category),
                question: form.question.unwrap_or(current.question),
                answer: form.answer.unwrap_or(current.answer),
            };
            let updated = editor.submit(client, merged).await?;
            Ok(("FAQ updated successfully".to_string(), json!(updated)))
        }
        Command::Faqs(FaqCommand::Delete { id, yes }) => {
            confirm(yes, &format!("delete FAQ {}", id))?;
            Ok(("FAQ deleted successfully".to_string(), handle_delete_faq(&id, client).await?))
        }

        Command::Images(ImageCommand::List) => Ok(("Images".to_string(), json!(handle_list_images(client).await?))),
        Command::Images(ImageCommand::Categories) => {
            Ok(("Image categories".to_string(), json!(handle_image_categories(client).await?)))
        }
        Command::Images(ImageCommand::Active) => {
            Ok(("Active images".to_string(), json!(handle_active_images(client).await?)))
        }
        Command::Images(ImageCommand::Add { form, file }) => {
            let file = LocalFile::read(&file).await?;
            let created = handle_create_image(&ImageRequest::from(form), file, client).await?;
            Ok(("Image added successfully".to_string(), json!(created)))
        }
        Command::Images(ImageCommand::Edit { id, form }) => {
            let out = handle_update_image(&id, &ImageRequest::from(form), client).await?;
            Ok(("Image updated successfully".to_string(), out))
        }
        Command::Images(ImageCommand::Delete { id, yes }) => {
            confirm(yes, &format!("delete image {}", id))?;
            Ok(("Image deleted successfully".to_string(), handle_delete_image(&id, client).await?))
        }
    }
}

/// Destructive commands only run with `--yes`.
fn confirm(yes: bool, action: &str) -> Result<(), ClientError> {
    if yes {
        Ok(())
    } else {
        Err(ClientError::Validation(format!("Refusing to {} without --yes", action)))
    }
}

async fn read_optional(path: Option<PathBuf>) -> Result<Option<LocalFile>, ClientError> {
    match path {
        Some(path) => Ok(Some(LocalFile::read(&path).await?)),
        None => Ok(None),
    }
}

/// The fallback shown when the server gave no message, per command family.
fn fallback_message(command: &Command) -> &'static str {
    match command {
        Command::Login { .. } => "Login failed",
        Command::ResetPassword { .. } => "Failed to reset password",
        Command::Whoami => "Failed to read token",
        Command::Tickets(TicketCommand::List { .. } | TicketCommand::Recent) => "Failed to fetch tickets",
        Command::Tickets(_) => "Failed to update ticket",
        Command::Metrics | Command::Daily | Command::Stats { .. } | Command::MonthlyChart { .. } => {
            "Failed to load ticket statistics"
        }
        Command::Chat(_) => "An error occurred while fetching messages.",
        Command::Config(_) => "Failed to save configuration",
        Command::Faqs(_) => "Failed to save FAQ",
        Command::Images(_) => "Failed to save image",
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "support_admin=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(String, Value), ClientError> {
    let settings = Settings::new(&cli.base_url, cli.token, cli.agent_id, cli.timeout)?;
    let client = ApiClient::new(&settings)?;
    handle_command(cli.command, &settings, &client).await
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let fallback = fallback_message(&cli.command);
    let span = info_span!("command", request_id = %generate_short_id(8));

    match run(cli).instrument(span).await {
        Ok((message, data)) => {
            println!("{}", success_response(&message, data));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "command failed");
            println!("{}", error_from(&e, fallback));
            ExitCode::FAILURE
        }
    }
}
