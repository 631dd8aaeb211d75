use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use moonwalk::areas::repository::Repository;
use moonwalk::artifacts::core::Output;
use moonwalk::artifacts::objects::commit::Author;
use moonwalk::artifacts::status::file_status::StatusRow;
use moonwalk::commands::porcelain::clone::{CloneOptions, DEFAULT_REMOTE};
use moonwalk::commands::porcelain::commit::CommitOptions;
use moonwalk::transport::{HttpOptions, HttpTransport, RemoteTransport};
use moonwalk::vfs::{DiskFs, FileSystem, MemoryFs, OpenOptions};
use serde_json::{Value, json};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MOONWALK_LOG";

#[derive(Parser)]
#[command(
    name = "moonwalk",
    version,
    about = "Git in a virtual filesystem",
    long_about = "moonwalk keeps a git repository inside a virtual filesystem persisted to a \
    single store file. Each subcommand mirrors one action of the browser demo: set up the \
    directory, clone, read and write a file, stage, commit, and inspect status and log.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    /// Snapshot file backing the in-memory filesystem
    #[arg(long, global = true, env = "MOONWALK_STORE", default_value = ".moonwalk/fs.db")]
    store: PathBuf,
    /// Repository directory inside the virtual filesystem
    #[arg(long, global = true, env = "MOONWALK_DIR", default_value = "/moonwalk")]
    dir: PathBuf,
    /// Use a host directory as the filesystem root instead of the store file
    #[arg(long, global = true, env = "MOONWALK_DISK")]
    disk: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "setup", about = "Create the repository directory")]
    Setup,
    #[command(name = "init", about = "Initialize the repository")]
    Init,
    #[command(
        name = "clear",
        about = "Wipe the whole virtual filesystem",
        long_about = "Discards every file of the store. With --disk, removes the repository directory."
    )]
    Clear,
    #[command(name = "ls", about = "List the repository directory")]
    Ls,
    #[command(name = "read", about = "Print a file of the working tree")]
    Read {
        #[arg(index = 1)]
        path: PathBuf,
    },
    #[command(name = "write", about = "Write a file of the working tree")]
    Write {
        #[arg(index = 1)]
        path: PathBuf,
        #[arg(index = 2)]
        contents: String,
    },
    #[command(name = "add", about = "Stage files")]
    Add {
        #[arg(index = 1, required = true)]
        paths: Vec<PathBuf>,
    },
    #[command(name = "rm", about = "Unstage a file or directory, keeping the working copy")]
    Rm {
        #[arg(index = 1)]
        path: PathBuf,
    },
    #[command(
        name = "commit",
        about = "Record the index as a new commit",
        long_about = "Creates a commit from the index. The identity comes from --author-name and \
        --author-email, else GIT_AUTHOR_NAME and GIT_AUTHOR_EMAIL, else user.name and user.email \
        in .git/config."
    )]
    Commit {
        #[arg(short, long)]
        message: String,
        #[arg(long, requires = "author_email")]
        author_name: Option<String>,
        #[arg(long, requires = "author_name")]
        author_email: Option<String>,
    },
    #[command(
        name = "status",
        about = "Show the status of files",
        long_about = "With paths, prints the status of each one. Without paths, or with --matrix, \
        prints the status matrix of every known file (restricted to the given paths)."
    )]
    Status {
        #[arg(index = 1)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        matrix: bool,
    },
    #[command(name = "log", about = "Show commit history")]
    Log {
        #[arg(index = 1)]
        reference: Option<String>,
        #[arg(short = 'n', long)]
        depth: Option<usize>,
    },
    #[command(name = "clone", about = "Clone a remote repository over smart HTTP")]
    Clone {
        #[arg(index = 1)]
        url: String,
        /// Branch or tag to check out
        #[arg(long = "ref")]
        reference: Option<String>,
        #[arg(long)]
        single_branch: bool,
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long, default_value = DEFAULT_REMOTE)]
        remote: String,
        #[arg(long)]
        no_checkout: bool,
        #[arg(long, env = "MOONWALK_CORS_PROXY")]
        cors_proxy: Option<String>,
        #[arg(long)]
        proxy: Option<String>,
        #[arg(long, env = "MOONWALK_USERNAME")]
        username: Option<String>,
        #[arg(long, env = "MOONWALK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Extra request header, as `Name: value`
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
    #[command(name = "checkout", about = "Switch to a branch or commit")]
    Checkout {
        #[arg(index = 1)]
        target: String,
    },
    #[command(name = "hash-object", about = "Compute the blob id of a file")]
    HashObject {
        #[arg(short, long, help = "Write the blob to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: PathBuf,
    },
    #[command(name = "cat-file", about = "Print an object")]
    CatFile {
        #[arg(index = 1)]
        object: String,
    },
    #[command(name = "ls-tree", about = "List every file of a commit or tree")]
    LsTree {
        #[arg(index = 1, default_value = "HEAD")]
        revision: String,
    },
    #[command(name = "write-tree", about = "Store the index as trees")]
    WriteTree,
}

fn parse_header(header: &str) -> Result<(String, String), String> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {header:?}"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// A command's result, as JSON and as text
struct Report {
    json: Value,
    text: String,
    paged: bool,
}

impl Report {
    fn new(json: Value, text: impl Into<String>) -> Self {
        Report {
            json,
            text: text.into(),
            paged: false,
        }
    }

    fn paged(mut self) -> Self {
        self.paged = true;
        self
    }

    fn print(self, as_json: bool) -> anyhow::Result<()> {
        if as_json {
            println!("{}", serde_json::to_string(&self.json)?);
            return Ok(());
        }
        if self.text.is_empty() {
            return Ok(());
        }

        let mut output = if self.paged {
            Output::for_long_text()
        } else {
            Output::stdout()
        };
        writeln!(output, "{}", self.text.trim_end_matches('\n'))?;
        output.finish()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let as_json = cli.json;
    match run(cli).await.and_then(|report| report.print(as_json)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if as_json {
                println!("{}", json!({ "error": format!("{err:#}") }));
            } else {
                eprintln!("{} {err:#}", "error:".red().bold());
            }
            ExitCode::FAILURE
        }
    }
}

fn open_filesystem(cli: &Cli, wipe: bool) -> anyhow::Result<Arc<dyn FileSystem>> {
    Ok(match &cli.disk {
        Some(root) => Arc::new(
            DiskFs::new(root).with_context(|| format!("cannot use {} as root", root.display()))?,
        ),
        None => Arc::new(
            MemoryFs::open(&cli.store, OpenOptions { wipe })
                .with_context(|| format!("cannot open store {}", cli.store.display()))?,
        ),
    })
}

async fn run(cli: Cli) -> anyhow::Result<Report> {
    let wipe = matches!(cli.command, Commands::Clear);
    let fs = open_filesystem(&cli, wipe)?;
    let repository = Repository::new(fs.clone(), &cli.dir)?;

    let report = execute(&repository, cli.command).await?;
    fs.flush().context("cannot save the filesystem")?;

    Ok(report)
}

async fn execute(repository: &Repository, command: Commands) -> anyhow::Result<Report> {
    let dir = repository.path().display().to_string();

    let report = match command {
        Commands::Setup => {
            let created = repository.setup()?;
            let text = if created {
                format!("Created {dir}")
            } else {
                format!("{dir} already exists")
            };
            Report::new(json!({ "created": created }), text)
        }
        Commands::Init => {
            let created = repository.init()?;
            let git_dir = repository.git_path().display().to_string();
            let text = if created {
                format!("Initialized empty Git repository in {git_dir}")
            } else {
                format!("Reinitialized existing Git repository in {git_dir}")
            };
            Report::new(json!({ "initialized": created }), text)
        }
        Commands::Clear => {
            // the store was reopened empty; a host directory has to be removed by hand
            if repository.fs().exists(repository.path()) {
                repository.fs().remove_all(repository.path())?;
            }
            Report::new(json!({ "cleared": true }), "Cleared the filesystem")
        }
        Commands::Ls => {
            let entries = repository.list_directory()?;
            let text = entries.join("\n");
            Report::new(json!(entries), text)
        }
        Commands::Read { path } => {
            let contents = repository.read_file(&path)?;
            Report::new(json!({ "contents": contents }), contents)
        }
        Commands::Write { path, contents } => {
            repository.write_file(&path, &contents)?;
            Report::new(
                json!({ "path": path, "bytes": contents.len() }),
                String::new(),
            )
        }
        Commands::Add { paths } => {
            let added = repository.add(&paths).await?;
            let text = path_lines("add", &added);
            Report::new(json!({ "added": added }), text)
        }
        Commands::Rm { path } => {
            let removed = repository.remove(&path).await?;
            let text = path_lines("rm", &removed);
            Report::new(json!({ "removed": removed }), text)
        }
        Commands::Commit {
            message,
            author_name,
            author_email,
        } => {
            let author = author_name
                .zip(author_email)
                .map(|(name, email)| Author::new(name, email));
            let oid = repository
                .commit(
                    &message,
                    CommitOptions {
                        author,
                        committer: None,
                    },
                )
                .await?;

            let at = match repository.refs().current_branch()? {
                Some(branch) => branch.to_string(),
                None => "detached HEAD".to_string(),
            };
            let subject = message.lines().next().unwrap_or_default();
            Report::new(
                json!({ "oid": oid }),
                format!("[{at} {}] {subject}", oid.to_short_oid()),
            )
        }
        Commands::Status { paths, matrix } => {
            if matrix || paths.is_empty() {
                let status = repository.status_matrix(&paths).await?;
                let text = status.changed().map(format_status_row).collect::<Vec<_>>().join("\n");
                Report::new(json!(status.rows), text)
            } else {
                let mut statuses = Vec::with_capacity(paths.len());
                for path in &paths {
                    let status = repository.status(path).await?;
                    statuses.push((path.display().to_string(), status.as_str()));
                }

                let text = statuses
                    .iter()
                    .map(|(path, status)| format!("{status}\t{path}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                let rows = statuses
                    .iter()
                    .map(|(path, status)| json!({ "path": path, "status": status }))
                    .collect::<Vec<_>>();
                Report::new(Value::Array(rows), text)
            }
        }
        Commands::Log { reference, depth } => {
            let entries = repository.log(reference.as_deref(), depth)?;
            let text = entries
                .iter()
                .map(|entry| {
                    let author = &entry.commit.author;
                    let message = entry
                        .commit
                        .message
                        .lines()
                        .map(|line| format!("    {line}"))
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!(
                        "{}\nAuthor: {} <{}>\nDate:   {}\n\n{message}\n",
                        format!("commit {}", entry.oid).yellow(),
                        author.name,
                        author.email,
                        author.readable_date(),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            Report::new(json!(entries), text).paged()
        }
        Commands::Clone {
            url,
            reference,
            single_branch,
            depth,
            remote,
            no_checkout,
            cors_proxy,
            proxy,
            username,
            password,
            headers,
        } => {
            let transport = HttpTransport::new(
                &url,
                HttpOptions {
                    cors_proxy,
                    proxy,
                    username,
                    password,
                    headers,
                },
            )?;
            let outcome = repository
                .clone(
                    &transport,
                    CloneOptions {
                        reference,
                        single_branch,
                        depth,
                        remote,
                        no_checkout,
                    },
                )
                .await?;

            let mut text = format!(
                "Cloned {} into {dir} ({} objects)",
                transport.url(),
                outcome.object_count
            );
            if let Some(head) = &outcome.head {
                let at = outcome.branch.as_deref().unwrap_or("detached HEAD");
                text.push_str(&format!("\nHEAD is now at {} ({at})", head.to_short_oid()));
            } else {
                text.push_str("\nYou appear to have cloned an empty repository.");
            }
            Report::new(serde_json::to_value(&outcome)?, text)
        }
        Commands::Checkout { target } => {
            let outcome = repository.checkout(&target).await?;
            let text = match &outcome.branch {
                Some(branch) => format!("Switched to branch '{branch}'"),
                None => format!("HEAD is now at {}", outcome.oid.to_short_oid()),
            };
            Report::new(serde_json::to_value(&outcome)?, text)
        }
        Commands::HashObject { write, file } => {
            let oid = repository.hash_object(&file, write)?;
            Report::new(json!({ "oid": oid }), oid.to_string())
        }
        Commands::CatFile { object } => {
            let object = repository.cat_file(&object)?;
            let text = object.content.clone();
            Report::new(serde_json::to_value(&object)?, text)
        }
        Commands::LsTree { revision } => {
            let entries = repository.ls_tree(&revision)?;
            let text = entries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            Report::new(json!(entries), text)
        }
        Commands::WriteTree => {
            let oid = repository.write_tree().await?;
            Report::new(json!({ "oid": oid }), oid.to_string())
        }
    };

    Ok(report)
}

fn path_lines(verb: &str, paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| format!("{verb} '{}'", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `git status --short` line: staged letter in green, unstaged letter in red
fn format_status_row(row: &StatusRow) -> String {
    if row.is_untracked() {
        return format!("{} {}", "??".red(), row.path);
    }

    format!(
        "{}{} {}",
        row.index_code().to_string().green(),
        row.workdir_code().to_string().red(),
        row.path
    )
}
