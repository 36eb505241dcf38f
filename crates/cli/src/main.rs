mod state;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};

use veilfs::linked_data::Cid;
use veilfs::node::{OsFs, PrivateNode, Root, Source};
use veilfs::path::Path;
use veilfs::prelude::Key;
use veilfs::store::{BlockStore, Store};

use state::{data_dir, ExternalState};

#[derive(Parser)]
#[command(name = "veilfs", about = "An encrypted, content-addressed filesystem")]
struct Cli {
    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a directory
    Mkdir { path: String },
    /// Print a file's contents
    Cat { path: String },
    /// Add a local file or directory to the filesystem
    #[command(alias = "add")]
    Write { path: String, file: PathBuf },
    /// List the contents of a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Remove a file or directory
    Rm { path: String },
    /// Show a tree rooted at a given path
    Tree {
        #[arg(default_value = "")]
        path: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "veilfs=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let dir = data_dir()?;
    let mut external = ExternalState::load_or_create(&dir)?;
    let (mut root, store) = open_fs(&dir, &mut external).await?;

    match cli.command {
        Command::Mkdir { path } => {
            root.mkdir(&Path::parse(&path)).await?;
            update_external_state(&mut external, &dir, &root, &store).await?;
        }
        Command::Cat { path } => {
            let node = root.open(&path).await?;
            match node {
                PrivateNode::File(mut file) => {
                    let data = file.read().await?;
                    std::io::stdout().write_all(&data)?;
                }
                PrivateNode::DataFile(df) => {
                    let rendered = serde_json::to_string_pretty(df.content())?;
                    println!("{rendered}");
                }
                PrivateNode::Tree(_) => anyhow::bail!("cannot cat a directory: {path}"),
            }
        }
        Command::Write { path, file } => {
            let meta = std::fs::metadata(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            if meta.is_dir() {
                root.copy(&Path::parse(&path), &file, &OsFs).await?;
            } else {
                let data = std::fs::read(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                root.add(&Path::parse(&path), Source::Bytes(Bytes::from(data)))
                    .await?;
            }
            update_external_state(&mut external, &dir, &root, &store).await?;
        }
        Command::Ls { path } => {
            for entry in root.ls(&Path::parse(&path)).await? {
                if entry.is_file {
                    println!("{}", entry.name);
                } else {
                    println!("{}/", entry.name);
                }
            }
        }
        Command::Rm { path } => {
            root.rm(&Path::parse(&path)).await?;
            update_external_state(&mut external, &dir, &root, &store).await?;
        }
        Command::Tree { path } => {
            let mut out = String::new();
            let base = Path::parse(&path);
            out.push_str(&format!(
                "{}\n",
                if path.is_empty() { "." } else { path.as_str() }
            ));
            render_tree(&mut root, &base, String::new(), &mut out).await?;
            print!("{out}");
        }
    }

    Ok(())
}

/// Open the filesystem described by the state file, creating (and
/// persisting) a fresh one on first run.
async fn open_fs(
    dir: &std::path::Path,
    external: &mut ExternalState,
) -> anyhow::Result<(Root, Store)> {
    let blocks = BlockStore::fs(&dir.join("blocks")).await?;

    let index_root = parse_cid(external.index_root.as_deref())?;
    let ratchet_root = parse_cid(external.ratchet_root.as_deref())?;
    let store = Store::open(blocks, index_root, ratchet_root).await?;

    let root = match (&external.root_key, &external.root_name) {
        (Some(key), Some(name)) => {
            let key = Key::decode(key).context("decoding root key from state file")?;
            Root::load(store.clone(), "private", &key, &name.clone().into()).await?
        }
        _ => {
            eprint!("creating new veilfs filesystem...");
            let mut root = Root::new_empty(store.clone(), "private");
            root.put().await?;
            eprintln!("done");
            update_external_state(external, dir, &root, &store).await?;
            root
        }
    };

    Ok((root, store))
}

fn parse_cid(value: Option<&str>) -> anyhow::Result<Option<Cid>> {
    value
        .map(|s| s.parse::<Cid>().context("parsing CID from state file"))
        .transpose()
}

/// Persist the reopen handle after a mutation.
async fn update_external_state(
    external: &mut ExternalState,
    dir: &std::path::Path,
    root: &Root,
    store: &Store,
) -> anyhow::Result<()> {
    let index_root = root
        .cid()
        .await
        .context("index has no root after mutation")?;
    external.index_root = Some(index_root.to_string());
    external.ratchet_root = store.ratchets().root().await.map(|c| c.to_string());
    external.root_key = Some(root.key().encode());
    external.root_name = Some(root.private_name().to_string());
    external.write(dir)?;

    eprintln!("wrote root cid: {index_root}");
    Ok(())
}

/// Depth-first listing with box-drawing indentation.
async fn render_tree(
    root: &mut Root,
    path: &Path,
    prefix: String,
    out: &mut String,
) -> anyhow::Result<()> {
    let entries = root.ls(path).await?;
    let count = entries.len();

    for (i, entry) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        out.push_str(&format!("{prefix}{connector}{}\n", entry.name));

        if !entry.is_file {
            let mut segments = path.segments().to_vec();
            segments.push(entry.name);
            let child = Path::new(segments);
            let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            Box::pin(render_tree(root, &child, child_prefix, out)).await?;
        }
    }

    Ok(())
}
