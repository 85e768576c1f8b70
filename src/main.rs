use std::fs::{self, File};
use std::io::{self, BufRead, Write, stdout};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{debug, error, info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use librovault::admin;
use librovault::api::{
    ApiClient, Book, BookId, CatalogQuery, DiscoverStyle, GENRES, GatewayReceipt, PaymentOrder,
    Rating, SubmissionStatus,
};
use librovault::auth::{
    AuthError, AuthEvent, GoTrueProvider, IdentityProvider, SessionStore, SignUpOutcome,
};
use librovault::event_source::KeyboardEventSource;
use librovault::library::{CheckoutOutcome, PaymentGateway, RatingState, Shelf, download_filename};
use librovault::panic_handler::initialize_panic_handler;
use librovault::prompt::prompt_password;
use librovault::reader::{ReaderSession, SpeechCommandEngine, open_document};
use librovault::settings::{self, APP_NAME, Settings};
use librovault::{ReaderApp, run_reader_with_event_source};

/// Terminal client for the LibroVault ebook platform
#[derive(Parser, Debug)]
#[command(name = "librovault")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password (password is read from stdin)
    Login { email: String },
    /// Create an account
    Signup { email: String, username: String },
    /// Sign out and forget the stored session
    Logout,
    /// Send a password reset email
    ResetPassword { email: String },
    /// Sign in through an OAuth provider in the browser
    Oauth { provider: String },
    /// Browse the catalog
    Catalog {
        #[arg(short, long, default_value = "")]
        query: String,
        #[arg(short, long)]
        genre: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// List your bookmarks
    Library,
    /// Show a book with your rating and access
    Book { id: String },
    /// Rate a book from 1 to 5
    Rate { id: String, rating: i64 },
    /// Buy a PRO book
    Buy { id: String },
    /// Save the book file locally
    Download {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Book suggestions from your reading history, or for a topic or author
    Recommend {
        /// Topic or author to discover books for
        topic: Option<String>,
        /// Ask for surprising picks instead of similar ones
        #[arg(long)]
        surprise: bool,
    },
    /// Open a book in the reader
    Read {
        id: String,
        /// Start page, preferred over the saved bookmark
        #[arg(short, long)]
        page: Option<i64>,
    },
    /// Admin dashboard
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    Users,
    Analytics,
    Status,
    Pending,
    Approve { id: String },
    Reject { id: String },
}

fn resolve_log_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("Could not determine data directory")?
        .join(APP_NAME);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create data directory: {dir:?}"))?;
    Ok(dir.join("librovault.log"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level: LevelFilter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    WriteLogger::init(level, Config::default(), File::create(resolve_log_path()?)?)?;
    initialize_panic_handler();

    settings::load_settings();
    let settings = settings::current();
    info!("Starting librovault {}", env!("CARGO_PKG_VERSION"));

    let result = run(cli.command, &settings);
    if let Err(e) = &result {
        error!("Command failed: {e:#}");
    }
    result
}

fn run(command: Command, settings: &Settings) -> Result<()> {
    let mut store = SessionStore::load_or_ephemeral(SessionStore::default_path().ok().as_deref());
    let auth_events = store.subscribe();

    let result = dispatch(command, settings, &mut store);
    for event in auth_events.try_iter() {
        log_auth_event(&event);
    }
    result
}

fn log_auth_event(event: &AuthEvent) {
    match event {
        AuthEvent::SignedIn(session) => info!(
            "Signed in as {} ({:?})",
            session.user.display_name(),
            session.role
        ),
        AuthEvent::SignedOut => info!("Signed out"),
        AuthEvent::TokenRefreshed(session) => {
            debug!("Access token refreshed for {}", session.user.display_name())
        }
    }
}

fn dispatch(command: Command, settings: &Settings, store: &mut SessionStore) -> Result<()> {
    match command {
        Command::Login { email } => {
            let password = prompt_password("Password: ")?;
            let session = provider(settings)?.sign_in_with_password(&email, &password)?;
            println!("Signed in as {}", session.user.display_name());
            store.set_session(session)?;
        }
        Command::Signup { email, username } => {
            let password = prompt_password("Password: ")?;
            match provider(settings)?.sign_up(&email, &password, &username)? {
                SignUpOutcome::SignedIn(session) => {
                    println!("Welcome, {}!", session.user.display_name());
                    store.set_session(session)?;
                }
                SignUpOutcome::ConfirmationSent => {
                    println!("Check {email} for a confirmation link, then log in.");
                }
            }
        }
        Command::Logout => {
            if let Some(session) = store.current() {
                if let Err(e) = provider(settings)?.sign_out(session) {
                    warn!("Provider sign-out failed: {e}");
                }
            }
            store.clear()?;
            println!("Signed out.");
        }
        Command::ResetPassword { email } => {
            provider(settings)?.request_password_reset(&email)?;
            println!("Password reset email sent to {email}.");
        }
        Command::Oauth { provider: name } => {
            let provider = provider(settings)?;
            let url = provider.oauth_authorize_url(&name);
            println!("Opening {url}");
            if let Err(e) = open::that(&url) {
                warn!("Could not open browser: {e}");
                println!("Open the URL above in your browser.");
            }
            let redirect = prompt("Paste the URL you were redirected to: ")?;
            let session = provider.complete_oauth(&redirect)?;
            println!("Signed in as {}", session.user.display_name());
            store.set_session(session)?;
        }
        Command::Catalog {
            query,
            genre,
            page,
            limit,
        } => {
            let client = api_client(settings, store)?;
            let mut catalog = CatalogQuery::default()
                .search(query)
                .page(page)
                .limit(limit.unwrap_or(settings.catalog_page_size));
            if let Some(genre) = genre {
                if !GENRES.iter().any(|g| g.eq_ignore_ascii_case(&genre)) {
                    warn!("Unknown genre {genre}");
                }
                catalog = catalog.genre(genre);
            }
            let result = client.list_books(&catalog)?;
            for book in &result.books {
                println!("{}", catalog_line(book));
            }
            println!(
                "Page {} of {} ({} books)",
                catalog.page,
                result.total_pages(catalog.limit).max(1),
                result.total_count
            );
        }
        Command::Library => {
            let client = api_client(settings, store)?;
            let bookmarks = client.my_bookmarks()?;
            if bookmarks.is_empty() {
                println!("No bookmarks yet.");
            }
            for bookmark in bookmarks {
                println!(
                    "{:>6}  {}  (page {})",
                    bookmark.book_id, bookmark.book_title, bookmark.page_number
                );
            }
        }
        Command::Book { id } => {
            let client = api_client(settings, store)?;
            let id = BookId::new(id);
            let book = client.get_book(&id)?;
            let shelf = shelf(&client);
            println!("{}", catalog_line(&book));
            if let Some(summary) = &book.summary {
                println!("\n{}\n", textwrap::fill(summary, 78));
            }
            println!("Access: {:?}", shelf.access(&book));
            match client.my_rating(&id)? {
                Some(rating) => println!("Your rating: {}", stars(rating.value())),
                None => println!("Your rating: not rated"),
            }
        }
        Command::Rate { id, rating } => {
            let client = api_client(settings, store)?;
            let id = BookId::new(id);
            let rating = Rating::try_from(rating).map_err(anyhow::Error::msg)?;
            let mut state = RatingState::new(client.my_rating(&id)?);
            state.rate(rating, |r| client.rate_book(&id, r))?;
            let book = client.get_book(&id)?;
            println!(
                "Rated {}. Average now {}",
                stars(rating.value()),
                average(&book)
            );
        }
        Command::Buy { id } => {
            let client = api_client(settings, store)?;
            let book = client.get_book(&BookId::new(id))?;
            let mut shelf = shelf(&client);
            match shelf.checkout(&client, &mut PromptGateway, &book)? {
                CheckoutOutcome::Completed(message) => println!("{message}"),
                CheckoutOutcome::AlreadyReadable(access) => {
                    println!("Nothing to buy: {} is readable ({access:?}).", book.title)
                }
                CheckoutOutcome::Cancelled => println!("Payment cancelled."),
            }
        }
        Command::Download { id, output } => {
            let client = api_client(settings, store)?;
            let id = BookId::new(id);
            let book = client.get_book(&id)?;
            let bytes = client.download_book(&id)?;
            let path = output.unwrap_or_else(|| PathBuf::from(download_filename(&book)));
            fs::write(&path, bytes).with_context(|| format!("Failed to write {path:?}"))?;
            println!("Saved {}", path.display());
        }
        Command::Recommend { topic, surprise } => {
            let client = api_client(settings, store)?;
            let books = match topic {
                Some(topic) => {
                    let style = if surprise {
                        DiscoverStyle::Surprise
                    } else {
                        DiscoverStyle::Similar
                    };
                    client.discover(&topic, style)?
                }
                None => client.history_recommendations()?,
            };
            if books.is_empty() {
                println!("No recommendations yet. Read a few books first, or name a topic.");
            }
            for book in &books {
                println!("{}", catalog_line(book));
            }
        }
        Command::Read { id, page } => {
            let client = api_client(settings, store)?;
            read_book(settings, client, BookId::new(id), page)?;
        }
        Command::Admin { command } => {
            let client = api_client(settings, store)?;
            run_admin(&client, command)?;
        }
    }
    Ok(())
}

fn run_admin(client: &ApiClient, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::Users => print!("{}", admin::render_users(&client.list_users()?)),
        AdminCommand::Analytics => {
            let signups = admin::signup_series(&client.monthly_signups()?);
            let activity = admin::activity_series(&client.monthly_activity()?);
            print!("{}", admin::render_series("New users per month", &signups));
            println!();
            print!("{}", admin::render_series("Books read per month", &activity));
        }
        AdminCommand::Status => {
            print!("{}", admin::render_gauges(&admin::system_gauges(&client.system_stats()?)))
        }
        AdminCommand::Pending => {
            let pending = client.pending_books()?;
            if pending.is_empty() {
                println!("No submissions waiting for review.");
            } else {
                print!("{}", admin::render_pending(&pending));
            }
        }
        AdminCommand::Approve { id } => {
            println!("{}", client.set_book_status(&BookId::new(id), SubmissionStatus::Approved)?)
        }
        AdminCommand::Reject { id } => {
            println!("{}", client.set_book_status(&BookId::new(id), SubmissionStatus::Rejected)?)
        }
    }
    Ok(())
}

fn read_book(settings: &Settings, client: ApiClient, id: BookId, page: Option<i64>) -> Result<()> {
    let book = client.get_book(&id)?;
    if !shelf(&client).access(&book).can_read() {
        bail!("{} is a PRO book. Buy it first with `librovault buy {id}`.", book.title);
    }

    let engine = SpeechCommandEngine::new(settings.speech_program(), settings.speech_args.clone());
    let session = ReaderSession::initialize(
        Box::new(engine),
        page,
        || Ok(open_document(&client.fetch_document(&id)?)?),
        || Ok(client.get_bookmark(&id)?),
    )?
    .with_notice_duration(settings.notice_duration())
    .with_book_title(book.title.clone());

    let sink_client = client.clone();
    let sink_id = id.clone();
    let mut app = ReaderApp::new(
        session,
        Box::new(move |page| Ok(sink_client.save_bookmark(&sink_id, page)?)),
    );

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_reader_with_event_source(&mut terminal, &mut app, &mut KeyboardEventSource);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!("Reader error: {err:?}");
    }
    res
}

fn provider(settings: &Settings) -> Result<GoTrueProvider> {
    if settings.auth_url.is_empty() || settings.auth_anon_key.is_empty() {
        bail!(
            "Identity provider not configured: set auth_url and auth_anon_key in {} \
             or LIBROVAULT_AUTH_URL / LIBROVAULT_AUTH_ANON_KEY",
            settings::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "config.yaml".to_string())
        );
    }
    Ok(GoTrueProvider::new(
        &settings.auth_url,
        &settings.auth_anon_key,
        settings.request_timeout(),
    )?)
}

fn api_client(settings: &Settings, store: &mut SessionStore) -> Result<ApiClient> {
    let session = match store.active_session(&provider(settings)?) {
        Ok(session) => session,
        Err(AuthError::NoSession) => bail!("Not signed in. Run `librovault login <email>` first."),
        Err(e) => return Err(e.into()),
    };
    Ok(ApiClient::with_timeout(
        &settings.api_url,
        session,
        settings.request_timeout(),
    )?)
}

/// Purchases unknown to the client only make PRO books look locked.
fn shelf(client: &ApiClient) -> Shelf {
    let purchased = client.my_purchases().unwrap_or_else(|e| {
        warn!("Could not load purchases: {e}");
        Default::default()
    });
    Shelf::new(purchased, client.session().role)
}

fn catalog_line(book: &Book) -> String {
    let price = match (book.is_pro, book.price) {
        (true, Some(price)) => format!("PRO ₹{price}"),
        (true, None) => "PRO".to_string(),
        (false, _) => "free".to_string(),
    };
    format!(
        "{:>6}  {} by {}  [{}]  {}  {}",
        book.id,
        book.title,
        book.author,
        book.genre.join(", "),
        price,
        average(book)
    )
}

fn average(book: &Book) -> String {
    match book.average_rating {
        Some(avg) => format!("★ {avg:.1} ({} ratings)", book.rating_count.unwrap_or(0)),
        None => "★ N/A".to_string(),
    }
}

fn stars(value: u8) -> String {
    let value = usize::from(value.min(Rating::MAX));
    format!("{}{}", "★".repeat(value), "☆".repeat(usize::from(Rating::MAX) - value))
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Payment collected out of band: the user pays through the gateway's page
/// and pastes the identifiers it returns.
struct PromptGateway;

impl PaymentGateway for PromptGateway {
    fn collect(&mut self, book: &Book, order: &PaymentOrder) -> Result<Option<GatewayReceipt>> {
        println!(
            "Order {} for \"{}\": {}",
            order.id,
            book.title,
            order.display_amount()
        );
        let payment_id = prompt("Payment id (empty to cancel): ")?;
        if payment_id.is_empty() {
            return Ok(None);
        }
        let signature = prompt("Payment signature: ")?;
        Ok(Some(GatewayReceipt {
            payment_id,
            order_id: order.id.clone(),
            signature,
        }))
    }
}
