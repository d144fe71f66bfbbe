mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use writeright_workspace::{
    join_path, AppConfig, JsonSessionIndex, LocalBackend, Lookup, PathSetChange, TreeNode,
    WorkspaceController,
};

type Controller = WorkspaceController<LocalBackend>;

#[derive(Parser)]
#[command(
    name = "writeright-cli",
    about = "Manage WriteRight workspaces from the command line",
    author,
    version
)]
struct Cli {
    /// 資料夾位置（工作區清單與工作階段）。 / Data directory holding the workspace list and sessions.
    #[arg(long, global = true, value_name = "PATH", env = "WRITERIGHT_HOME")]
    data_dir: Option<PathBuf>,
    /// 顯示除錯日誌。 / Enable debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 管理工作區清單。 / Manage the list of workspaces.
    #[command(subcommand)]
    Roots(RootsCommand),
    /// 顯示工作區目錄樹。 / Print a workspace's directory tree.
    Tree(TreeArgs),
    /// 建立檔案或資料夾。 / Create a file or folder.
    New(NewArgs),
    /// 刪除檔案或資料夾。 / Delete a file or folder.
    Delete(EntryArgs),
    /// 重新命名檔案或資料夾。 / Rename a file or folder.
    Rename(RenameArgs),
    /// 開啟檔案：第一次預覽，再次開啟則固定為分頁。 / Open a file: preview first, pin on the second open.
    Open(EntryArgs),
    /// 關閉分頁。 / Close a tab.
    Close(EntryArgs),
    /// 列出已開啟的分頁。 / List open tabs.
    Tabs(RootArgs),
    /// 輸出檔案內容。 / Print a file's contents.
    Cat(EntryArgs),
    /// 寫入檔案內容。 / Replace a file's contents.
    Write(WriteArgs),
}

#[derive(Subcommand)]
enum RootsCommand {
    /// 列出工作區。 / List tracked workspaces.
    List,
    /// 新增工作區。 / Track a workspace root.
    Add(PathArg),
    /// 移除工作區。 / Stop tracking a workspace root.
    Remove(PathArg),
}

#[derive(Args)]
struct PathArg {
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

#[derive(Args)]
struct RootArgs {
    /// 工作區根目錄。 / Workspace root.
    #[arg(value_name = "ROOT")]
    root: PathBuf,
}

#[derive(Args)]
struct TreeArgs {
    #[command(flatten)]
    workspace: RootArgs,
    /// 以 JSON 輸出。 / Emit the snapshot as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct EntryArgs {
    #[command(flatten)]
    workspace: RootArgs,
    /// 項目路徑（可相對於工作區）。 / Entry path, absolute or relative to the root.
    #[arg(value_name = "PATH")]
    path: String,
}

#[derive(Args)]
struct NewArgs {
    #[command(flatten)]
    workspace: RootArgs,
    /// 上層資料夾（`.` 代表根目錄）。 / Parent folder; `.` is the root.
    #[arg(value_name = "PARENT")]
    parent: String,
    #[arg(value_name = "NAME")]
    name: String,
    /// 建立資料夾而非檔案。 / Create a folder instead of a file.
    #[arg(long)]
    dir: bool,
}

#[derive(Args)]
struct RenameArgs {
    #[command(flatten)]
    workspace: RootArgs,
    #[arg(value_name = "PATH")]
    path: String,
    #[arg(value_name = "NEW_NAME")]
    new_name: String,
}

#[derive(Args)]
struct WriteArgs {
    #[command(flatten)]
    workspace: RootArgs,
    #[arg(value_name = "PATH")]
    path: String,
    #[arg(value_name = "CONTENT")]
    content: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        data_dir,
        verbose,
        command,
    } = Cli::parse();
    logging::init(verbose);

    let data_dir = data_dir.map(|dir| resolve_input_path(&dir)).transpose()?;
    let config = AppConfig::load(data_dir).context("load configuration")?;
    debug!(data_dir = %config.data_dir.display(), "configuration resolved");

    let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
    runtime.block_on(execute(command, config))
}

async fn execute(command: Commands, config: AppConfig) -> Result<()> {
    let mut controller = WorkspaceController::new(
        Arc::new(LocalBackend::new(&config.data_dir)),
        Box::new(JsonSessionIndex::in_dir(&config.data_dir)),
        config.sync,
    );
    match command {
        Commands::Roots(subcommand) => execute_roots_command(&mut controller, subcommand).await,
        Commands::Tree(args) => print_tree(&mut controller, args).await,
        Commands::New(args) => create_entry(&mut controller, args).await,
        Commands::Delete(args) => delete_entry(&mut controller, args).await,
        Commands::Rename(args) => rename_entry(&mut controller, args).await,
        Commands::Open(args) => open_file(&mut controller, args).await,
        Commands::Close(args) => close_tab(&mut controller, args).await,
        Commands::Tabs(args) => list_tabs(&mut controller, args).await,
        Commands::Cat(args) => print_file(&mut controller, args).await,
        Commands::Write(args) => write_file(&mut controller, args).await,
    }
}

async fn execute_roots_command(controller: &mut Controller, command: RootsCommand) -> Result<()> {
    controller.load_roots().await.context("load workspaces")?;
    match command {
        RootsCommand::List => {
            for root in controller.roots().iter() {
                println!("{root}");
            }
        }
        RootsCommand::Add(arg) => {
            let path = root_string(&arg.path)?;
            match controller.add_root(&path) {
                PathSetChange::Unchanged => println!("Workspace '{path}' is already tracked"),
                PathSetChange::Replaced { previous } => {
                    println!("Replaced workspace '{previous}' with '{path}'")
                }
                PathSetChange::Absorbed { removed } => {
                    println!("Added workspace '{path}' (absorbed {})", removed.join(", "))
                }
                PathSetChange::Appended => println!("Added workspace '{path}'"),
            }
        }
        RootsCommand::Remove(arg) => {
            let path = root_string(&arg.path)?;
            if !controller.remove_root(&path) {
                bail!("'{path}' is not a tracked workspace");
            }
            println!("Removed workspace '{path}'");
        }
    }
    controller.settle().await;
    Ok(())
}

async fn print_tree(controller: &mut Controller, args: TreeArgs) -> Result<()> {
    let root = open_workspace(controller, &args.workspace).await?;
    if let Some(active) = controller.active() {
        let snapshot = active.tree().root();
        if args.json {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        } else {
            println!("{root}");
            for child in &snapshot.children {
                print_node(child, 1);
            }
        }
    }
    controller.close_workspace()?;
    Ok(())
}

fn print_node(node: &TreeNode, depth: usize) {
    let suffix = if node.is_dir { "/" } else { "" };
    println!("{}{}{suffix}", "  ".repeat(depth), node.name);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

async fn create_entry(controller: &mut Controller, args: NewArgs) -> Result<()> {
    let root = open_workspace(controller, &args.workspace).await?;
    let parent = entry_path(&root, &args.parent);
    let lookup = if args.dir {
        controller.create_directory(&parent, &args.name).await?
    } else {
        controller.create_file(&parent, &args.name).await?
    };
    if !lookup.is_found() {
        warn!(parent = %parent, "parent folder is outside the cached tree");
    }
    let kind = if args.dir { "folder" } else { "file" };
    println!("Created {kind} {}", join_path(&parent, args.name.trim()));
    controller.close_workspace()?;
    Ok(())
}

async fn delete_entry(controller: &mut Controller, args: EntryArgs) -> Result<()> {
    let root = open_workspace(controller, &args.workspace).await?;
    let path = entry_path(&root, &args.path);
    if controller.delete_entry(&path).await? == Lookup::NotFound {
        bail!("'{path}' is not an entry of workspace '{root}'");
    }
    println!("Deleted {path}");
    controller.close_workspace()?;
    Ok(())
}

async fn rename_entry(controller: &mut Controller, args: RenameArgs) -> Result<()> {
    let root = open_workspace(controller, &args.workspace).await?;
    let path = entry_path(&root, &args.path);
    if controller.rename_entry(&path, &args.new_name).await? == Lookup::NotFound {
        bail!("'{path}' is not an entry of workspace '{root}'");
    }
    println!("Renamed {path} to {}", args.new_name.trim());
    controller.close_workspace()?;
    Ok(())
}

async fn open_file(controller: &mut Controller, args: EntryArgs) -> Result<()> {
    let root = open_workspace(controller, &args.workspace).await?;
    let path = entry_path(&root, &args.path);
    controller.open_file(&path)?;
    let pinned = controller
        .active()
        .is_some_and(|active| active.session().is_pinned(&path));
    if pinned {
        println!("Pinned {path}");
    } else {
        println!("Previewing {path}");
    }
    controller.close_workspace()?;
    Ok(())
}

async fn close_tab(controller: &mut Controller, args: EntryArgs) -> Result<()> {
    let root = open_workspace(controller, &args.workspace).await?;
    let path = entry_path(&root, &args.path);
    if !controller.close_tab(&path)? {
        bail!("'{path}' is not open");
    }
    println!("Closed {path}");
    controller.close_workspace()?;
    Ok(())
}

async fn list_tabs(controller: &mut Controller, args: RootArgs) -> Result<()> {
    open_workspace(controller, &args).await?;
    if let Some(active) = controller.active() {
        let session = active.session();
        for tab in session.opened_files() {
            let marker = if tab == session.selected() { "*" } else { " " };
            println!("{marker} {tab}");
        }
        if let Some(preview) = session.preview() {
            println!("~ {preview}");
        }
    }
    controller.close_workspace()?;
    Ok(())
}

async fn print_file(controller: &mut Controller, args: EntryArgs) -> Result<()> {
    let root = open_workspace(controller, &args.workspace).await?;
    let path = entry_path(&root, &args.path);
    let text = controller.read_file(&path).await?;
    print!("{text}");
    controller.close_workspace()?;
    Ok(())
}

async fn write_file(controller: &mut Controller, args: WriteArgs) -> Result<()> {
    let root = open_workspace(controller, &args.workspace).await?;
    let path = entry_path(&root, &args.path);
    controller.update_content(&path, args.content)?;
    // Closing cancels pending content saves, so let this one land first.
    controller.settle().await;
    controller.close_workspace()?;
    println!("Saved {path}");
    Ok(())
}

async fn open_workspace(controller: &mut Controller, args: &RootArgs) -> Result<String> {
    let root = root_string(&args.root)?;
    controller
        .open_workspace(&root)
        .await
        .with_context(|| format!("open workspace {root}"))?;
    Ok(root)
}

fn root_string(path: &Path) -> Result<String> {
    let resolved = resolve_input_path(path)?;
    resolved
        .to_str()
        .map(str::to_string)
        .with_context(|| format!("path {} is not valid UTF-8", resolved.display()))
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}

/// Absolute paths pass through; anything else is taken relative to `root`.
fn entry_path(root: &str, path: &str) -> String {
    match path {
        "" | "." => root.to_string(),
        _ if Path::new(path).is_absolute() => path.to_string(),
        _ => join_path(root, path),
    }
}
