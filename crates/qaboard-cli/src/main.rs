//! qaboard - Q&A board client
//!
//! The `qaboard` command reads and writes a board kept in SurrealDB.
//!
//! ## Commands
//!
//! - `seed`: Write site config, questions and replies from a seed file
//! - `show`: Load the board and print it
//! - `reply`: Post a reply to a question
//! - `login`: Run the sign-in flow with a local identity

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use qaboard_core::domain::{collections, fields, PLACEHOLDER_TITLE};
use qaboard_core::metrics::METRICS;
use qaboard_core::{
    AppSnapshot, AuthStatus, BoardSeed, Delivery, DocumentStore, Identity, LoadPhase,
    LocalIdentityProvider, QuestionId, Reconciler, ReplySync, SeedTarget, SessionManager,
    StoreConfig, SurrealDocumentStore, User,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "qaboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Q&A board client", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Database URL (mem://, surrealkv://PATH, ws://HOST:PORT)
    #[arg(long, global = true, env = "QABOARD_DB_URL")]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the site config and questions of a board
    Seed {
        /// Seed file (JSON); a small demo board when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Load the board and print it
    Show {
        /// Wait for every question and print them by title
        #[arg(long)]
        ordered: bool,
    },

    /// Post a reply to a question
    Reply {
        /// Store id of the question
        question_id: String,

        /// Reply text
        text: String,
    },

    /// Sign in with a local identity
    Login {
        /// Display name
        #[arg(long)]
        name: String,

        /// Profile photo URL
        #[arg(long, default_value = "")]
        photo: String,

        /// Account id (derived from the name if omitted)
        #[arg(long)]
        uid: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    qaboard_core::telemetry::init_tracing(cli.json, level);

    let mut config = StoreConfig::from_env();
    if let Some(url) = cli.db_url {
        config.url = url;
    }
    let store = Arc::new(
        SurrealDocumentStore::connect(&config)
            .await
            .context("Failed to connect to qaboard database")?,
    );

    let result = match cli.command {
        Commands::Seed { file } => cmd_seed(store.as_ref(), file.as_deref()).await,
        Commands::Show { ordered } => cmd_show(store, ordered).await.map(|out| print!("{out}")),
        Commands::Reply { question_id, text } => cmd_reply(store, &question_id, &text).await,
        Commands::Login { name, photo, uid } => {
            cmd_login(store, &name, &photo, uid.as_deref()).await
        }
    };

    METRICS.flush();
    result
}

/// Read a board seed from a JSON file
fn read_seed_file(path: &Path) -> Result<BoardSeed> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid seed file {}", path.display()))
}

/// Seed the board
async fn cmd_seed(target: &dyn SeedTarget, file: Option<&Path>) -> Result<()> {
    let seed = match file {
        Some(path) => read_seed_file(path)?,
        None => BoardSeed::demo(),
    };
    let seeded = seed.apply(target).await.context("Failed to seed board")?;

    println!(
        "Seeded '{}' with {} question(s)",
        seed.title,
        seeded.questions.len()
    );
    for (id, replies) in &seeded.questions {
        println!("  {} ({} replies)", id, replies.len());
    }
    Ok(())
}

/// Board wired to a signed-out local identity
fn open_board(store: Arc<dyn DocumentStore>, provider: Arc<LocalIdentityProvider>) -> Reconciler {
    let session = Arc::new(SessionManager::new(provider, Arc::clone(&store)));
    Reconciler::new(store, session)
}

fn anonymous() -> Arc<LocalIdentityProvider> {
    Arc::new(LocalIdentityProvider::new(Identity::new("anonymous", User::default())).returning())
}

/// Load and render the board
async fn cmd_show(store: Arc<dyn DocumentStore>, ordered: bool) -> Result<String> {
    let delivery = if ordered {
        Delivery::Buffered
    } else {
        Delivery::Progressive
    };
    let board = open_board(store, anonymous()).with_delivery(delivery);
    board.mount().await;
    board.settle().await;

    let snapshot = board.snapshot();
    if snapshot.questions_phase == LoadPhase::Failed {
        return Err(anyhow!("Failed to load questions"));
    }
    Ok(render_board(&snapshot))
}

/// Post a reply and report whether it synced
async fn cmd_reply(store: Arc<dyn DocumentStore>, question_id: &str, text: &str) -> Result<()> {
    let board = open_board(store, anonymous()).with_delivery(Delivery::Buffered);
    board.mount().await;

    let id = QuestionId::new(question_id);
    board.set_draft(&id, text);
    let outcome = board.submit_reply(&id).await;
    board.settle().await;

    match outcome {
        Ok(reference) => {
            println!("Replied to {} ({})", id, reference);
            Ok(())
        }
        Err(err) if board.snapshot().unsynced_replies().is_empty() => {
            Err(err).with_context(|| format!("Failed to reply to '{}'", question_id))
        }
        Err(err) => {
            eprintln!("warning: reply shown locally but not synced: {err}");
            Err(anyhow!("Reply to '{}' is unsynced", question_id))
        }
    }
}

/// Whether a `Users` record exists for `uid`
async fn has_user_record(store: &dyn DocumentStore, uid: &str) -> Result<bool> {
    let users = store
        .list_documents(collections::USERS)
        .await
        .context("Failed to list users")?;
    Ok(users
        .iter()
        .any(|doc| doc.str_field(fields::UID) == Some(uid)))
}

fn derive_uid(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("local-{slug}")
}

/// Sign in with a local identity
async fn cmd_login(
    store: Arc<dyn DocumentStore>,
    name: &str,
    photo: &str,
    uid: Option<&str>,
) -> Result<()> {
    let uid = uid.map(str::to_string).unwrap_or_else(|| derive_uid(name));
    let known = has_user_record(store.as_ref(), &uid).await?;

    let mut provider = LocalIdentityProvider::new(Identity::new(&uid, User::new(name, photo)));
    if known {
        provider = provider.returning();
    }
    let board = open_board(Arc::clone(&store), Arc::new(provider));
    board.mount().await;

    let user = board.sign_in().await.context("Sign-in failed")?;
    board.settle().await;
    info!(uid = %uid, first_time = !known, "signed in");

    println!("Signed in as {}", user.display_name);
    if !known {
        let provisioned = has_user_record(store.as_ref(), &uid).await?;
        if provisioned {
            println!("Created user record for {uid}");
        } else {
            eprintln!("warning: could not create user record for {uid}");
        }
    }
    Ok(())
}

/// Plain-text rendering of a board snapshot
fn render_board(snapshot: &AppSnapshot) -> String {
    let mut out = String::new();
    let title = match snapshot.site_phase {
        LoadPhase::Loaded => snapshot.site.title.as_str(),
        _ => PLACEHOLDER_TITLE,
    };
    let _ = writeln!(out, "# {title}");
    if snapshot.auth == AuthStatus::SignedIn {
        let _ = writeln!(out, "signed in as {}", snapshot.current_user.display_name);
    }
    let _ = writeln!(out);

    if snapshot.questions.is_empty() {
        let _ = writeln!(out, "No questions yet.");
        return out;
    }

    for question in &snapshot.questions {
        let _ = writeln!(out, "[{}] {}", question.id, question.title);
        if !question.description.is_empty() {
            let _ = writeln!(out, "    {}", question.description);
        }
        for reply in &question.resolved_replies {
            let marker = match &reply.sync {
                ReplySync::Synced => String::new(),
                ReplySync::Pending => "  (pending)".to_string(),
                ReplySync::Unsynced { error } => format!("  (unsynced: {error})"),
            };
            let _ = writeln!(out, "    - {}{}", reply.reply.content, marker);
        }
        let failed = question.failures().len();
        if failed > 0 {
            let _ = writeln!(
                out,
                "    ! {} of {} replies could not be loaded",
                failed,
                failed + question.fetched_reply_count()
            );
        }
        let _ = writeln!(out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use qaboard_store::fakes::MemoryDocumentStore;
    use qaboard_store::{DocumentId, DocumentRef};
    use serde_json::json;

    fn data(value: serde_json::Value) -> qaboard_store::DocumentData {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_show_renders_demo_board_in_title_order() {
        let store = Arc::new(MemoryDocumentStore::new());
        BoardSeed::demo().apply(store.as_ref()).await.unwrap();

        let out = cmd_show(store, true).await.unwrap();
        let expected = "\
# Ask Me

[sync] How do replies sync?
    Asking for a friend.

[welcome] What is this board?
    A place to ask and answer.
    - Post a question, get replies.
    - Sign in to reply.

";
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn test_show_flags_degraded_question() {
        let store = Arc::new(MemoryDocumentStore::new());
        let ok = store.insert(collections::REPLIES, "r1", data(json!({"Content": "hi"})));
        let broken = DocumentRef::new(collections::REPLIES, "r2");
        store.insert(
            collections::QUESTIONS,
            "q1",
            data(json!({"Title": "Why?", "Replies": [ok.to_value(), broken.to_value()]})),
        );

        let out = cmd_show(store, false).await.unwrap();
        assert!(out.starts_with("# title\n"), "unexpected output: {out}");
        assert!(out.contains("    - hi\n"));
        assert!(out.contains("! 1 of 2 replies could not be loaded"));
    }

    #[tokio::test]
    async fn test_degraded_total_ignores_local_replies() {
        let store = Arc::new(MemoryDocumentStore::new());
        let ok = store.insert(collections::REPLIES, "r1", data(json!({"Content": "hi"})));
        let broken = DocumentRef::new(collections::REPLIES, "r2");
        store.insert(
            collections::QUESTIONS,
            "q1",
            data(json!({"Title": "Why?", "Replies": [ok.to_value(), broken.to_value()]})),
        );
        let board = open_board(store, anonymous());
        board.mount().await;

        let q1 = QuestionId::new("q1");
        board.set_draft(&q1, "me too");
        board.begin_reply(&q1).unwrap();

        let out = render_board(&board.snapshot());
        assert!(out.contains("    - me too  (pending)\n"), "unexpected output: {out}");
        assert!(out.contains("! 1 of 2 replies could not be loaded"), "unexpected output: {out}");
    }

    #[tokio::test]
    async fn test_show_fails_when_listing_fails() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.fail_lists_of(collections::QUESTIONS);
        assert!(cmd_show(store, false).await.is_err());
    }

    #[tokio::test]
    async fn test_reply_persists_and_links() {
        let store = Arc::new(MemoryDocumentStore::new());
        BoardSeed::demo().apply(store.as_ref()).await.unwrap();

        cmd_reply(store.clone(), "sync", "Through the store.")
            .await
            .unwrap();

        let question = store
            .document(collections::QUESTIONS, &DocumentId::from("sync"))
            .unwrap();
        assert_eq!(question[fields::REPLIES].as_array().unwrap().len(), 1);
        assert_eq!(store.len(collections::REPLIES), 3);
    }

    #[tokio::test]
    async fn test_reply_to_unknown_question_is_rejected() {
        let store = Arc::new(MemoryDocumentStore::new());
        let err = cmd_reply(store.clone(), "ghost", "hello").await.unwrap_err();
        assert!(format!("{err:#}").contains("unknown question"), "{err:#}");
        assert_eq!(store.calls().add, 0);
    }

    #[tokio::test]
    async fn test_unsynced_reply_is_reported() {
        let store = Arc::new(MemoryDocumentStore::new());
        BoardSeed::demo().apply(store.as_ref()).await.unwrap();
        store.fail_writes_to(collections::QUESTIONS);

        let err = cmd_reply(store, "sync", "lost?").await.unwrap_err();
        assert!(err.to_string().contains("unsynced"));
    }

    #[tokio::test]
    async fn test_login_provisions_first_time_only() {
        let store = Arc::new(MemoryDocumentStore::new());

        cmd_login(store.clone(), "Ada Lovelace", "", None)
            .await
            .unwrap();
        assert_eq!(store.len(collections::USERS), 1);
        assert!(has_user_record(store.as_ref(), "local-ada-lovelace")
            .await
            .unwrap());

        cmd_login(store.clone(), "Ada Lovelace", "", None)
            .await
            .unwrap();
        assert_eq!(store.len(collections::USERS), 1);
    }

    #[test]
    fn test_seed_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(
            &path,
            r#"{"title": "Ask Me", "questions": [{"id": "q1", "title": "Why?", "replies": ["Because."]}]}"#,
        )
        .unwrap();

        let seed = read_seed_file(&path).unwrap();
        assert_eq!(seed.title, "Ask Me");
        assert_eq!(seed.questions[0].id.as_deref(), Some("q1"));
        assert_eq!(seed.questions[0].replies, vec!["Because."]);
    }

    #[test]
    fn test_invalid_seed_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(&path, "{\"questions\": []}").unwrap();

        let err = read_seed_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid seed file"));
    }

    #[tokio::test]
    async fn test_seed_and_reply_on_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("surrealkv://{}", dir.path().join("board/db").display());
        let store = Arc::new(
            SurrealDocumentStore::connect(&StoreConfig::new(url))
                .await
                .unwrap(),
        );

        cmd_seed(store.as_ref(), None).await.unwrap();
        cmd_reply(store.clone(), "welcome", "Third!").await.unwrap();

        let out = cmd_show(store, true).await.unwrap();
        assert!(out.contains("    - Third!\n"), "unexpected output: {out}");
    }
}
