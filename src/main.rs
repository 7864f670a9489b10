use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use lawdesk::config::{
    config_dir, load_clients, load_config, load_state, save_clients, save_state, Config,
    CLIENTS_TEMPLATE, CONFIG_TEMPLATE,
};
use lawdesk::document::{
    add_client_file, export_client_file, generate_document, object_store, remove_client_file,
    upload_template,
};
use lawdesk::error::{LawdeskError, Result};
use lawdesk::payment::{apply_payment, format_brl, generate_plan, parse_amount, set_paid_amount};
use lawdesk::registration::{check_duplicates, client_id_for, lookup_cep, ClientRegistration};
use lawdesk::session::{LocalSignOut, SessionState, SessionTracker};
use lawdesk::template::{detect_placeholders, PlaceholderKind};

#[derive(Parser)]
#[command(name = "lawdesk")]
#[command(version, about = "Law office back-office: clients, fee plans and documents", long_about = None)]
struct Cli {
    /// Path to config directory (default: ~/.lawdesk or XDG config)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with template files
    Init,

    /// Manage clients
    #[command(subcommand)]
    Clients(ClientCommands),

    /// Manage fee payment plans
    #[command(subcommand)]
    Plan(PlanCommands),

    /// Record a payment against a plan, settling installments in order
    Pay {
        /// Plan id
        plan: u32,

        /// Amount, e.g. 500, 1234.56 or "1.234,56"
        amount: String,

        /// Payment date (default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Overwrite the paid amount of a single installment
    SetPaid {
        /// Plan id
        plan: u32,

        /// Installment number (1-based)
        installment: u32,

        /// New paid amount
        amount: String,

        /// Payment date (default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Manage document templates
    #[command(subcommand)]
    Template(TemplateCommands),

    /// List the placeholders templates may use
    Placeholders,

    /// Generate documents from templates
    #[command(subcommand)]
    Document(DocumentCommands),

    /// Manage stored client files
    #[command(subcommand)]
    Files(FileCommands),

    /// Manage appointments
    #[command(subcommand)]
    Appointment(AppointmentCommands),

    /// Interactive session that signs out after a period of inactivity
    Shell {
        /// Operator name recorded in the activity log
        #[arg(long, default_value = "operator")]
        operator: String,
    },

    /// Show office overview
    Status,
}

#[derive(Subcommand)]
enum ClientCommands {
    /// List registered clients
    List,

    /// Show all details of a client
    Show {
        /// Client identifier from clients.toml
        id: String,
    },

    /// Register a new client
    Add(ClientArgs),

    /// Change fields of a registered client
    Edit {
        /// Client identifier from clients.toml
        id: String,

        #[command(flatten)]
        fields: ClientEditArgs,
    },
}

#[derive(Args)]
struct ClientArgs {
    #[arg(long, default_value = "")]
    first_name: String,
    #[arg(long, default_value = "")]
    last_name: String,
    #[arg(long, default_value = "")]
    phone: String,
    #[arg(long)]
    contact_phone: Option<String>,
    #[arg(long, default_value = "")]
    cpf: String,
    #[arg(long, default_value = "")]
    rg: String,
    #[arg(long)]
    expeditor_rg: Option<String>,
    #[arg(long)]
    nationality: Option<String>,
    #[arg(long)]
    marital_status: Option<String>,
    #[arg(long, default_value = "")]
    cep: String,
    #[arg(long, default_value = "")]
    address: String,
    #[arg(long = "number")]
    address_number: Option<String>,
    #[arg(long)]
    neighborhood: Option<String>,
    #[arg(long, default_value = "")]
    city: String,
    #[arg(long, default_value = "")]
    state: String,
    #[arg(long)]
    father_name: Option<String>,
    #[arg(long, default_value = "")]
    mother_name: String,
    /// Birth date (YYYY-MM-DD)
    #[arg(long, default_value = "")]
    birth_date: String,

    /// Fill missing address, city and state from the CEP
    #[arg(long)]
    lookup_cep: bool,
}

/// Fields to change; anything omitted keeps its stored value
#[derive(Args)]
struct ClientEditArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    contact_phone: Option<String>,
    #[arg(long)]
    cpf: Option<String>,
    #[arg(long)]
    rg: Option<String>,
    #[arg(long)]
    expeditor_rg: Option<String>,
    #[arg(long)]
    nationality: Option<String>,
    #[arg(long)]
    marital_status: Option<String>,
    #[arg(long)]
    cep: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long = "number")]
    address_number: Option<String>,
    #[arg(long)]
    neighborhood: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    father_name: Option<String>,
    #[arg(long)]
    mother_name: Option<String>,
    /// Birth date (YYYY-MM-DD)
    #[arg(long)]
    birth_date: Option<String>,
}

impl ClientEditArgs {
    fn apply(self, form: &mut ClientRegistration) {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(v) = value {
                *target = v;
            }
        }
        fn set_opt(target: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *target = value;
            }
        }

        set(&mut form.first_name, self.first_name);
        set(&mut form.last_name, self.last_name);
        set(&mut form.phone, self.phone);
        set_opt(&mut form.contact_phone, self.contact_phone);
        set(&mut form.cpf, self.cpf);
        set(&mut form.rg, self.rg);
        set_opt(&mut form.expeditor_rg, self.expeditor_rg);
        set_opt(&mut form.nationality, self.nationality);
        set_opt(&mut form.marital_status, self.marital_status);
        set(&mut form.cep, self.cep);
        set(&mut form.address, self.address);
        set_opt(&mut form.address_number, self.address_number);
        set_opt(&mut form.neighborhood, self.neighborhood);
        set(&mut form.city, self.city);
        set(&mut form.state, self.state);
        set_opt(&mut form.father_name, self.father_name);
        set(&mut form.mother_name, self.mother_name);
        set(&mut form.birth_date, self.birth_date);
    }
}

impl From<ClientArgs> for ClientRegistration {
    fn from(a: ClientArgs) -> Self {
        ClientRegistration {
            first_name: a.first_name,
            last_name: a.last_name,
            phone: a.phone,
            contact_phone: a.contact_phone,
            cpf: a.cpf,
            rg: a.rg,
            expeditor_rg: a.expeditor_rg,
            nationality: a.nationality,
            marital_status: a.marital_status,
            cep: a.cep,
            address: a.address,
            address_number: a.address_number,
            neighborhood: a.neighborhood,
            city: a.city,
            state: a.state,
            father_name: a.father_name,
            mother_name: a.mother_name,
            birth_date: a.birth_date,
        }
    }
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Create a plan splitting a total into monthly installments
    Create {
        /// Client identifier from clients.toml
        #[arg(short, long)]
        client: String,

        /// Total contract value
        #[arg(short, long)]
        total: String,

        /// Number of installments
        #[arg(short, long)]
        installments: u32,

        /// Due date of the first installment (YYYY-MM-DD)
        #[arg(long)]
        first_due: String,

        /// Contract date (default: today)
        #[arg(long)]
        contract_date: Option<String>,
    },

    /// List payment plans
    List {
        /// Only plans of this client
        #[arg(short, long)]
        client: Option<String>,
    },

    /// Show installments and payment history of a plan
    Show {
        /// Plan id
        id: u32,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Upload a .docx or .html template
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Template file (.docx, .html)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List stored templates
    List,

    /// Show a template and the placeholders it uses
    Show {
        id: u32,

        /// Also print the HTML content
        #[arg(long)]
        content: bool,
    },

    /// Delete a template
    Remove { id: u32 },
}

#[derive(Subcommand)]
enum DocumentCommands {
    /// Render a template for a client and store the result
    Generate {
        /// Template id
        #[arg(short, long)]
        template: u32,

        /// Client identifier from clients.toml
        #[arg(short, long)]
        client: String,

        /// Also render a PDF with wkhtmltopdf
        #[arg(long)]
        pdf: bool,

        /// Open the generated document with the system default viewer
        #[arg(long)]
        open: bool,
    },
}

#[derive(Subcommand)]
enum FileCommands {
    /// List stored files
    List {
        /// Only files of this client
        #[arg(short, long)]
        client: Option<String>,
    },

    /// Upload a file to a client's folder
    Add {
        /// Client identifier from clients.toml
        #[arg(short, long)]
        client: String,

        /// Local file to upload
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Copy a stored file to a local path
    Get {
        id: u32,

        /// Destination file or directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Open a stored file with the system default viewer
    Open { id: u32 },

    /// Delete a stored file and its record
    Remove { id: u32 },
}

#[derive(Subcommand)]
enum AppointmentCommands {
    /// Schedule an appointment
    Add {
        /// Client identifier from clients.toml
        #[arg(short, long)]
        client: String,

        /// Date and time ("YYYY-MM-DD HH:MM")
        #[arg(long)]
        date: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// List appointments sorted by date
    List {
        #[arg(short, long)]
        client: Option<String>,

        /// Only appointments from now on
        #[arg(long)]
        upcoming: bool,
    },

    /// Cancel an appointment
    Remove { id: u32 },
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(e.kind().exit_code());
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LAWDESK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Determine config directory
    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };

    dispatch(&cfg_dir, cli.command)
}

fn dispatch(cfg_dir: &Path, command: Commands) -> Result<()> {
    match command {
        Commands::Init => cmd_init(cfg_dir),
        Commands::Clients(cmd) => match cmd {
            ClientCommands::List => cmd_clients(cfg_dir),
            ClientCommands::Show { id } => cmd_client_show(cfg_dir, &id),
            ClientCommands::Add(args) => cmd_client_add(cfg_dir, args),
            ClientCommands::Edit { id, fields } => cmd_client_edit(cfg_dir, &id, fields),
        },
        Commands::Plan(cmd) => match cmd {
            PlanCommands::Create {
                client,
                total,
                installments,
                first_due,
                contract_date,
            } => cmd_plan_create(
                cfg_dir,
                &client,
                &total,
                installments,
                &first_due,
                contract_date,
            ),
            PlanCommands::List { client } => cmd_plans(cfg_dir, client.as_deref()),
            PlanCommands::Show { id } => cmd_plan_show(cfg_dir, id),
        },
        Commands::Pay { plan, amount, date } => cmd_pay(cfg_dir, plan, &amount, date),
        Commands::SetPaid {
            plan,
            installment,
            amount,
            date,
        } => cmd_set_paid(cfg_dir, plan, installment, &amount, date),
        Commands::Template(cmd) => match cmd {
            TemplateCommands::Add {
                name,
                description,
                file,
            } => cmd_template_add(cfg_dir, &name, &description, &file),
            TemplateCommands::List => cmd_templates(cfg_dir),
            TemplateCommands::Show { id, content } => cmd_template_show(cfg_dir, id, content),
            TemplateCommands::Remove { id } => cmd_template_remove(cfg_dir, id),
        },
        Commands::Placeholders => cmd_placeholders(),
        Commands::Document(DocumentCommands::Generate {
            template,
            client,
            pdf,
            open,
        }) => cmd_generate(cfg_dir, template, &client, pdf, open),
        Commands::Files(cmd) => match cmd {
            FileCommands::List { client } => cmd_files(cfg_dir, client.as_deref()),
            FileCommands::Add {
                client,
                file,
                description,
            } => cmd_file_add(cfg_dir, &client, &file, &description),
            FileCommands::Get { id, output } => cmd_file_get(cfg_dir, id, &output),
            FileCommands::Open { id } => cmd_file_open(cfg_dir, id),
            FileCommands::Remove { id } => cmd_file_remove(cfg_dir, id),
        },
        Commands::Appointment(cmd) => match cmd {
            AppointmentCommands::Add {
                client,
                date,
                description,
            } => cmd_appointment_add(cfg_dir, &client, &date, &description),
            AppointmentCommands::List { client, upcoming } => {
                cmd_appointments(cfg_dir, client.as_deref(), upcoming)
            }
            AppointmentCommands::Remove { id } => cmd_appointment_remove(cfg_dir, id),
        },
        Commands::Shell { operator } => cmd_shell(cfg_dir, &operator),
        Commands::Status => cmd_status(cfg_dir),
    }
}

fn ensure_initialized(cfg_dir: &Path) -> Result<()> {
    if !cfg_dir.exists() {
        return Err(LawdeskError::ConfigNotFound(cfg_dir.to_path_buf()));
    }
    Ok(())
}

fn parse_date(value: Option<String>) -> Result<NaiveDate> {
    match value {
        Some(s) => parse_day(&s),
        None => Ok(Local::now().date_naive()),
    }
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| LawdeskError::InvalidDate(s.to_string(), "YYYY-MM-DD"))
}

fn money(config: &Config, value: Decimal) -> String {
    format_brl(&config.payments.currency_symbol, value)
}

/// Initialize config directory with template files
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    use std::fs;

    if cfg_dir.exists() {
        return Err(LawdeskError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }

    fs::create_dir_all(cfg_dir)?;
    fs::create_dir_all(cfg_dir.join("storage"))?;

    fs::write(cfg_dir.join("config.toml"), CONFIG_TEMPLATE)?;
    fs::write(cfg_dir.join("clients.toml"), CLIENTS_TEMPLATE)?;
    save_state(cfg_dir, &Default::default())?;

    println!("Initialized lawdesk config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit office and lawyer details:  $EDITOR {}/config.toml",
        cfg_dir.display()
    );
    println!("  2. Register clients:                lawdesk clients add --help");
    println!("  3. Upload a contract template:      lawdesk template add --name <name> --file <file.docx>");
    println!();
    println!("Then create a fee plan:");
    println!("  lawdesk plan create --client <client-id> --total 1200 --installments 3 --first-due <YYYY-MM-DD>");

    Ok(())
}

// Table row structs for tabled
#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "CPF")]
    cpf: String,
    #[tabled(rename = "PHONE")]
    phone: String,
    #[tabled(rename = "CITY")]
    city: String,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "CLIENT")]
    client: String,
    #[tabled(rename = "CONTRACT")]
    contract_date: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "PAID")]
    paid: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

#[derive(Tabled)]
struct InstallmentRow {
    #[tabled(rename = "#")]
    number: u32,
    #[tabled(rename = "DUE")]
    due_date: String,
    #[tabled(rename = "VALUE")]
    value: String,
    #[tabled(rename = "PAID")]
    paid: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "INSTALLMENT")]
    installment: u32,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "DIFFERENCE")]
    difference: String,
}

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "FIELDS")]
    fields: usize,
    #[tabled(rename = "CREATED")]
    created: String,
}

#[derive(Tabled)]
struct PlaceholderRow {
    #[tabled(rename = "PLACEHOLDER")]
    key: String,
    #[tabled(rename = "SOURCE")]
    subject: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "CLIENT")]
    client: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TYPE")]
    file_type: String,
    #[tabled(rename = "CREATED")]
    created: String,
}

#[derive(Tabled)]
struct AppointmentRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "CLIENT")]
    client: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

/// List registered clients
fn cmd_clients(cfg_dir: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;

    if clients.is_empty() {
        println!("No clients registered.");
        println!("Add one with: lawdesk clients add --help");
        return Ok(());
    }

    let rows: Vec<ClientRow> = clients
        .iter()
        .map(|(id, client)| ClientRow {
            id: id.clone(),
            name: client.full_name(),
            cpf: client.cpf.clone(),
            phone: client.phone.clone(),
            city: format!("{}/{}", client.city, client.state),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}

fn cmd_client_show(cfg_dir: &Path, id: &str) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    let client = clients
        .get(id)
        .ok_or_else(|| LawdeskError::ClientNotFound(id.to_string()))?;

    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    println!("Client {id}");
    println!("{}", "-".repeat(50));
    println!("Name:           {}", client.full_name());
    println!("CPF:            {}", client.cpf);
    println!(
        "RG:             {} {}",
        client.rg,
        client.expeditor_rg.as_deref().unwrap_or_default()
    );
    println!("Phone:          {}", client.phone);
    println!("Contact phone:  {}", opt(&client.contact_phone));
    println!("Nationality:    {}", opt(&client.nationality));
    println!("Marital status: {}", opt(&client.marital_status));
    println!(
        "Birth date:     {}",
        client
            .birth_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Mother:         {}", client.mother_name);
    println!("Father:         {}", opt(&client.father_name));
    println!(
        "Address:        {}, {} - {}",
        client.address,
        client.address_number.as_deref().unwrap_or("s/n"),
        client.neighborhood.as_deref().unwrap_or_default()
    );
    println!("                {}/{} CEP {}", client.city, client.state, client.cep);

    Ok(())
}

fn cmd_client_add(cfg_dir: &Path, args: ClientArgs) -> Result<()> {
    ensure_initialized(cfg_dir)?;

    let lookup = args.lookup_cep;
    let mut registration = ClientRegistration::from(args);
    if lookup && registration.needs_address() {
        let found = lookup_cep(&registration.cep)?;
        debug!(city = %found.city, "filled address from CEP");
        registration.fill_address(&found);
    }

    let client = registration.validate()?;
    let mut clients = load_clients(cfg_dir)?;
    check_duplicates(&clients, &client, None)?;

    let id = client_id_for(&client, &clients);
    let name = client.full_name();
    clients.insert(id.clone(), client);
    save_clients(cfg_dir, &clients)?;

    let mut state = load_state(cfg_dir)?;
    state.log_activity("client_created", format!("client={id}"));
    save_state(cfg_dir, &state)?;

    println!("Registered client '{id}' ({name})");
    Ok(())
}

fn cmd_client_edit(cfg_dir: &Path, id: &str, fields: ClientEditArgs) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let mut clients = load_clients(cfg_dir)?;
    let current = clients
        .get(id)
        .ok_or_else(|| LawdeskError::ClientNotFound(id.to_string()))?;

    let mut registration = ClientRegistration::from_client(current);
    fields.apply(&mut registration);
    let client = registration.validate()?;
    check_duplicates(&clients, &client, Some(id))?;

    let name = client.full_name();
    clients.insert(id.to_string(), client);
    save_clients(cfg_dir, &clients)?;

    let mut state = load_state(cfg_dir)?;
    state.log_activity("client_updated", format!("client={id}"));
    save_state(cfg_dir, &state)?;

    println!("Updated client '{id}' ({name})");
    Ok(())
}

fn cmd_plan_create(
    cfg_dir: &Path,
    client_id: &str,
    total: &str,
    installments: u32,
    first_due: &str,
    contract_date: Option<String>,
) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    if !clients.contains_key(client_id) {
        return Err(LawdeskError::ClientNotFound(client_id.to_string()));
    }

    let total = parse_amount(total)?;
    let first_due = parse_day(first_due)?;
    let contract_date = parse_date(contract_date)?;
    let schedule = generate_plan(total, installments, first_due)?;

    let mut state = load_state(cfg_dir)?;
    let plan_id = state.add_plan(client_id, contract_date, total, schedule).id;
    state.log_activity(
        "plan_created",
        format!("plan={plan_id} client={client_id} total={total}"),
    );
    save_state(cfg_dir, &state)?;

    println!(
        "Created plan #{plan_id} for '{client_id}': {} in {installments} installment(s)",
        money(&config, total)
    );
    cmd_plan_show(cfg_dir, plan_id)
}

fn cmd_plans(cfg_dir: &Path, client: Option<&str>) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let state = load_state(cfg_dir)?;

    let rows: Vec<PlanRow> = state
        .plans
        .iter()
        .filter(|p| client.map_or(true, |c| p.client_id == c))
        .map(|p| PlanRow {
            id: p.id,
            client: p.client_id.clone(),
            contract_date: p.contract_date.to_string(),
            total: money(&config, p.total_value),
            paid: money(&config, p.paid_amount()),
            status: p.status().to_string(),
        })
        .collect();

    if rows.is_empty() {
        println!("No payment plans found.");
        return Ok(());
    }

    let count = rows.len();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!();
    println!("Total: {count} plan(s)");

    Ok(())
}

fn cmd_plan_show(cfg_dir: &Path, id: u32) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let plan = state.plan(id).ok_or(LawdeskError::PlanNotFound(id))?;

    println!(
        "Plan #{} - {} - contract {} - {}",
        plan.id,
        plan.client_id,
        plan.contract_date,
        plan.status()
    );

    let rows: Vec<InstallmentRow> = plan
        .installments
        .iter()
        .map(|i| InstallmentRow {
            number: i.installment_number,
            due_date: i.due_date.to_string(),
            value: money(&config, i.installment_value),
            paid: money(&config, i.paid_amount),
            status: if i.settled {
                "SETTLED".to_string()
            } else if i.paid_amount > Decimal::ZERO {
                "PARTIAL".to_string()
            } else {
                "PENDING".to_string()
            },
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    println!("Total:     {}", money(&config, plan.total_value));
    println!("Paid:      {}", money(&config, plan.paid_amount()));
    println!("Remaining: {}", money(&config, plan.outstanding()));

    let history = state.history_for(id);
    if !history.is_empty() {
        println!();
        println!("Payment history:");
        let rows: Vec<HistoryRow> = history
            .iter()
            .map(|h| HistoryRow {
                date: h.payment_date.to_string(),
                installment: h.installment_number,
                amount: money(&config, h.amount),
                difference: money(&config, h.difference),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    Ok(())
}

/// Record a payment, spreading it over installments in ascending order
fn cmd_pay(cfg_dir: &Path, plan_id: u32, amount: &str, date: Option<String>) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let amount = parse_amount(amount)?;
    let date = parse_date(date)?;

    let mut state = load_state(cfg_dir)?;
    let plan = state
        .plan_mut(plan_id)
        .ok_or(LawdeskError::PlanNotFound(plan_id))?;

    let outcome = apply_payment(&plan.installments, amount, date).map_err(|e| match e {
        LawdeskError::OverPayment { max, .. } => LawdeskError::OverPayment { plan: plan_id, max },
        other => other,
    })?;
    plan.installments = outcome.installments;
    let remaining = plan.outstanding();
    let status = plan.status();

    for applied in &outcome.applied {
        println!(
            "  installment {}: {}",
            applied.installment_number,
            money(&config, applied.amount)
        );
    }
    state.record_payments(plan_id, outcome.applied);
    state.log_activity(
        "payment_recorded",
        format!("plan={plan_id} amount={amount}"),
    );
    save_state(cfg_dir, &state)?;

    println!(
        "Recorded payment of {} on plan #{plan_id} ({status})",
        money(&config, amount)
    );
    println!("Remaining: {}", money(&config, remaining));

    Ok(())
}

fn cmd_set_paid(
    cfg_dir: &Path,
    plan_id: u32,
    number: u32,
    amount: &str,
    date: Option<String>,
) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let amount = parse_amount(amount)?;
    let date = parse_date(date)?;

    let mut state = load_state(cfg_dir)?;
    let plan = state
        .plan_mut(plan_id)
        .ok_or(LawdeskError::PlanNotFound(plan_id))?;
    let installment = plan
        .installment_mut(number)
        .ok_or(LawdeskError::InstallmentNotFound {
            plan: plan_id,
            number,
        })?;
    let applied = set_paid_amount(installment, amount, date)?;
    let remaining = plan.outstanding();

    let difference = applied.difference;
    state.record_payments(plan_id, vec![applied]);
    state.log_activity(
        "payment_edited",
        format!("plan={plan_id} installment={number} paid={amount}"),
    );
    save_state(cfg_dir, &state)?;

    println!(
        "Installment {number} of plan #{plan_id} now paid {} (difference {})",
        money(&config, amount),
        money(&config, difference)
    );
    println!("Remaining: {}", money(&config, remaining));

    Ok(())
}

fn cmd_template_add(cfg_dir: &Path, name: &str, description: &str, file: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let id = upload_template(cfg_dir, name, description, file)?;

    let state = load_state(cfg_dir)?;
    if let Some(template) = state.template(id) {
        println!("Stored template #{id} '{}'", template.name);
        if template.fields.is_empty() {
            println!("No placeholders found.");
        } else {
            println!("Placeholders: {}", template.fields.join(", "));
        }
    }
    Ok(())
}

fn cmd_templates(cfg_dir: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let state = load_state(cfg_dir)?;

    if state.templates.is_empty() {
        println!("No templates stored.");
        return Ok(());
    }

    let rows: Vec<TemplateRow> = state
        .templates
        .iter()
        .map(|t| TemplateRow {
            id: t.id,
            name: t.name.clone(),
            fields: t.fields.len(),
            created: t.created_at.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}

fn cmd_template_show(cfg_dir: &Path, id: u32, show_content: bool) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let template = state.template(id).ok_or(LawdeskError::TemplateNotFound(id))?;

    println!("Template #{} - {}", template.id, template.name);
    if !template.description.is_empty() {
        println!("{}", template.description);
    }
    println!("Created: {}", template.created_at.format("%Y-%m-%d %H:%M"));

    let report = detect_placeholders(&template.content);
    println!("Placeholders: {}", report.valid.join(", "));
    if !report.invalid.is_empty() {
        println!("Unknown tokens: {}", report.invalid.join(", "));
    }

    if show_content {
        println!();
        println!("{}", template.content);
    }
    Ok(())
}

fn cmd_template_remove(cfg_dir: &Path, id: u32) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let removed = state
        .remove_template(id)
        .ok_or(LawdeskError::TemplateNotFound(id))?;
    state.log_activity("template_deleted", format!("template={id}"));
    save_state(cfg_dir, &state)?;

    println!("Removed template #{id} '{}'", removed.name);
    Ok(())
}

fn cmd_placeholders() -> Result<()> {
    let rows: Vec<PlaceholderRow> = PlaceholderKind::ALL
        .iter()
        .map(|k| PlaceholderRow {
            key: format!("{{{}}}", k.key()),
            subject: format!("{:?}", k.subject()),
            description: k.description().to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn cmd_generate(
    cfg_dir: &Path,
    template_id: u32,
    client_id: &str,
    pdf: bool,
    open: bool,
) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let generated = generate_document(cfg_dir, template_id, client_id, pdf)?;

    println!("Generated document: {}", generated.local_path.display());
    if let Some(pdf_path) = &generated.pdf_path {
        println!("PDF: {}", pdf_path.display());
    }
    println!("Stored as file #{}", generated.file_id);
    if let Some(pdf_id) = generated.pdf_file_id {
        println!("PDF stored as file #{pdf_id}");
    }

    if open {
        let target = generated.pdf_path.as_ref().unwrap_or(&generated.local_path);
        open_path(target)?;
    }
    Ok(())
}

fn cmd_files(cfg_dir: &Path, client: Option<&str>) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let state = load_state(cfg_dir)?;

    let mut files: Vec<_> = state
        .files
        .iter()
        .filter(|f| client.map_or(true, |c| f.client_id == c))
        .collect();
    if files.is_empty() {
        println!("No files stored.");
        return Ok(());
    }
    files.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let rows: Vec<FileRow> = files
        .iter()
        .map(|f| FileRow {
            id: f.id,
            client: f.client_id.clone(),
            name: f.file_name.clone(),
            file_type: f.file_type.clone(),
            created: f.created_at.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}

fn cmd_file_open(cfg_dir: &Path, id: u32) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let record = state.file(id).ok_or(LawdeskError::FileNotFound(id))?;

    let path = object_store(cfg_dir)?.path_of(&record.file_path)?;
    if !path.exists() {
        return Err(LawdeskError::ObjectNotFound(record.file_path.clone()));
    }
    println!("Opening: {}", path.display());
    open_path(&path)
}

fn cmd_file_add(cfg_dir: &Path, client_id: &str, file: &Path, description: &str) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let id = add_client_file(cfg_dir, client_id, file, description)?;
    println!("Stored file #{id} for '{client_id}'");
    Ok(())
}

fn cmd_file_get(cfg_dir: &Path, id: u32, output: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let written = export_client_file(cfg_dir, id, output)?;
    println!("Saved file #{id} to {}", written.display());
    Ok(())
}

fn cmd_file_remove(cfg_dir: &Path, id: u32) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let record = remove_client_file(cfg_dir, id)?;
    println!("Removed file #{id} '{}'", record.file_name);
    Ok(())
}

fn cmd_appointment_add(cfg_dir: &Path, client_id: &str, date: &str, description: &str) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    if !clients.contains_key(client_id) {
        return Err(LawdeskError::ClientNotFound(client_id.to_string()));
    }
    let when = NaiveDateTime::parse_from_str(date.trim(), "%Y-%m-%d %H:%M")
        .map_err(|_| LawdeskError::InvalidDate(date.to_string(), "YYYY-MM-DD HH:MM"))?;

    let mut state = load_state(cfg_dir)?;
    let id = state.add_appointment(client_id, when, description.trim());
    state.log_activity("appointment_created", format!("appointment={id} client={client_id}"));
    save_state(cfg_dir, &state)?;

    println!(
        "Scheduled appointment #{id} with '{client_id}' on {}",
        when.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn cmd_appointments(cfg_dir: &Path, client: Option<&str>, upcoming: bool) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let now = Local::now().naive_local();

    let mut appointments: Vec<_> = state
        .appointments
        .iter()
        .filter(|a| client.map_or(true, |c| a.client_id == c))
        .filter(|a| !upcoming || a.date >= now)
        .collect();
    if appointments.is_empty() {
        println!("No appointments found.");
        return Ok(());
    }
    appointments.sort_by_key(|a| (a.date, a.id));

    let rows: Vec<AppointmentRow> = appointments
        .iter()
        .map(|a| AppointmentRow {
            id: a.id,
            date: a.date.format("%Y-%m-%d %H:%M").to_string(),
            client: a.client_id.clone(),
            description: a.description.clone(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}

fn cmd_appointment_remove(cfg_dir: &Path, id: u32) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let removed = state
        .remove_appointment(id)
        .ok_or(LawdeskError::AppointmentNotFound(id))?;
    state.log_activity(
        "appointment_deleted",
        format!("appointment={id} client={}", removed.client_id),
    );
    save_state(cfg_dir, &state)?;

    println!(
        "Removed appointment #{id} with '{}' on {}",
        removed.client_id,
        removed.date.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

/// Split a shell line into arguments, honouring double quotes.
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}

/// Interactive loop; every line counts as activity
fn cmd_shell(cfg_dir: &Path, operator: &str) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let timeout = Duration::from_secs(config.session.timeout_minutes * 60);
    let interval = Duration::from_secs(config.session.check_interval_secs.max(1));

    let sign_out = Arc::new(LocalSignOut::new(cfg_dir.to_path_buf(), operator));
    let mut tracker = SessionTracker::new(timeout, interval, sign_out.clone());
    tracker.start();

    // Lines arrive over a channel so the loop can poll the tracker while idle
    let (tx, rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                warn!(error = %e, "could not open line editor");
                return;
            }
        };
        loop {
            match editor.readline("lawdesk> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    warn!(error = %e, "reading shell input failed");
                    break;
                }
            }
        }
    });

    println!(
        "lawdesk shell ({operator}). Type 'exit' to leave; idle sessions end after {} minute(s).",
        config.session.timeout_minutes
    );
    let poll = interval.min(Duration::from_secs(1));

    loop {
        let line = match rx.recv_timeout(poll) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => {
                if tracker.state() == SessionState::Expired {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracker.stop();
                sign_out.record()?;
                return Ok(());
            }
        };

        if tracker.check() == SessionState::Expired || !tracker.record_activity() {
            break;
        }

        let args = split_args(&line);
        match args.first().map(String::as_str) {
            None => continue,
            Some("exit") | Some("quit") => {
                tracker.stop();
                sign_out.record()?;
                return Ok(());
            }
            Some("session") => {
                let status = tracker.status();
                println!(
                    "Session active, {} minute(s) until sign-out",
                    status.time_remaining.as_secs() / 60
                );
                continue;
            }
            Some("shell") => {
                println!("Already in a shell.");
                continue;
            }
            _ => {}
        }

        let parsed = Cli::try_parse_from(std::iter::once("lawdesk".to_string()).chain(args));
        match parsed {
            Ok(cli) => {
                let dir = cli.config_dir.unwrap_or_else(|| cfg_dir.to_path_buf());
                if let Err(e) = dispatch(&dir, cli.command) {
                    eprintln!("Error: {e}");
                }
            }
            Err(e) => {
                let _ = e.print();
            }
        }
    }

    tracker.stop();
    sign_out.record()?;
    println!("Session expired after inactivity. Signed out.");
    Ok(())
}

/// Show office overview
fn cmd_status(cfg_dir: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;

    let config = load_config(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    let state = load_state(cfg_dir)?;

    let outstanding: Decimal = state.plans.iter().map(|p| p.outstanding()).sum();
    let now = Local::now().naive_local();
    let upcoming = state.appointments.iter().filter(|a| a.date >= now).count();

    println!("Office Status");
    println!("{}", "-".repeat(50));
    println!("Config directory: {}", cfg_dir.display());
    println!("Office:           {}", config.office.name);
    println!(
        "Lawyer:           {} (OAB {})",
        config.lawyer.name, config.lawyer.oab_number
    );
    println!("Clients:          {}", clients.len());
    println!("Payment plans:    {}", state.plans.len());
    println!("Outstanding:      {}", money(&config, outstanding));
    println!("Templates:        {}", state.templates.len());
    println!("Files:            {}", state.files.len());
    println!("Upcoming appts:   {upcoming}");

    if !state.activity.is_empty() {
        println!();
        println!("Recent activity:");
        for entry in state.activity.iter().rev().take(5) {
            println!(
                "  {} - {} {}",
                entry.at.format("%Y-%m-%d %H:%M"),
                entry.action_type,
                entry.details
            );
        }
    }

    Ok(())
}

fn open_path(path: &Path) -> Result<()> {
    // Open with system default viewer
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .spawn()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_arguments() {
        assert_eq!(
            split_args(r#"appointment add --client ana --date "2026-11-03 14:30""#),
            vec!["appointment", "add", "--client", "ana", "--date", "2026-11-03 14:30"]
        );
        assert_eq!(split_args("  status  "), vec!["status"]);
        assert_eq!(split_args(r#"x --description """#), vec!["x", "--description", ""]);
        assert!(split_args("").is_empty());
    }
}
