use std::io::Read;
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use inquire::error::InquireResult;

mod cache;
mod cli;
mod codec;
mod config;
mod eid;
mod entries;
mod provision;
mod remote;
mod semantic;
mod store;
#[cfg(test)]
mod tests;

use cache::{CacheStore, FileCache};
use cli::FolderArgs;
use config::Config;
use eid::Eid;
use entries::{EntryCreate, EntryUpdate, FolderCreate, FolderUpdate};
use remote::GithubClient;
use semantic::FastembedProvider;
use store::{BackendMode, DocumentStore};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let base_path = cache::default_base_path();
    let config = Config::load_with(base_path);

    let cache: Arc<dyn CacheStore> = Arc::new(FileCache::new(base_path)?);
    let remote = Arc::new(GithubClient::new(
        &config.github.api_base,
        &config.github_token(),
    ));
    let embedder = Arc::new(FastembedProvider::new(
        &config.semantic.model,
        config.base_path(),
    ));
    let store = DocumentStore::new(remote, cache, embedder, &config.store_prefix);

    match args.command {
        cli::Command::Add {
            title,
            content,
            folder,
        } => {
            let content = match content {
                Some(content) => content,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };

            let entry = store.create_entry(EntryCreate {
                title,
                content,
                folder_id: folder.map(|f| Eid::from(f.as_str())),
            })?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }

        cli::Command::List {} => {
            let entries = store.get_all_entries()?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }

        cli::Command::Show { id } => {
            let id = Eid::from(id.as_str());
            match store.get_entry(&id)? {
                Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                None => bail!("entry {id} not found"),
            }
        }

        cli::Command::Update {
            id,
            title,
            content,
            folder,
            no_folder,
        } => {
            if title.is_none() && content.is_none() && folder.is_none() && !no_folder {
                println!("This update request does nothing");
                return Ok(());
            }
            if no_folder && folder.is_some() {
                bail!("--folder and --no-folder are mutually exclusive");
            }

            let folder_id = if no_folder {
                Some(None)
            } else {
                folder.map(|f| Some(Eid::from(f.as_str())))
            };

            let id = Eid::from(id.as_str());
            let update = EntryUpdate {
                title,
                content,
                folder_id,
            };
            match store.update_entry(&id, update)? {
                Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                None => bail!("entry {id} not found"),
            }
        }

        cli::Command::Delete { id, yes } => {
            if !yes {
                match inquire::prompt_confirmation(format!(
                    "Are you sure you want to delete entry {id}?"
                )) {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => return Ok(()),
                    InquireResult::Err(err) => bail!("An error occurred: {}", err),
                }
            }

            let id = Eid::from(id.as_str());
            if store.delete_entry(&id)? {
                println!("deleted {id}");
            } else {
                bail!("entry {id} not found");
            }
        }

        cli::Command::Search { query, limit } => {
            if !config.semantic.enabled {
                bail!("semantic search is disabled in the config");
            }

            let limit = limit.unwrap_or(config.semantic.search_limit);
            let results = store.semantic_search(&query, limit)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        cli::Command::Reindex {} => {
            if !config.semantic.enabled {
                bail!("semantic search is disabled in the config");
            }

            let bar = indicatif::ProgressBar::new(0);
            let report = store.reindex(|done, total| {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            })?;
            bar.finish_and_clear();

            println!(
                "processed {} entries, {} errors, {} indexed",
                report.processed,
                report.errors,
                store.indexed_count()
            );
        }

        cli::Command::Init { fresh } => {
            if fresh {
                let repo = store.reset_backing_store()?;
                println!("created backing store {repo}");
            } else {
                let repo = store.ensure_remote()?;
                println!("backing store {repo} is ready");
            }
            config.save();
        }

        cli::Command::Status {} => {
            let entries = store.get_all_entries()?;
            let mode = match store.backend_mode() {
                BackendMode::Remote(repo) => format!("remote ({repo})"),
                BackendMode::LocalOnly => "local-only".to_string(),
                BackendMode::Unchecked => "unchecked".to_string(),
            };

            println!("backend: {mode}");
            println!("provisioning: {:?}", store.provision_state());
            println!("entries: {}", entries.len());
            println!("indexed: {}", store.indexed_count());
        }

        cli::Command::Folder { action } => return run_folder(&store, action),
    }

    Ok(())
}

fn run_folder(store: &DocumentStore, action: FolderArgs) -> anyhow::Result<()> {
    match action {
        FolderArgs::Add {
            name,
            description,
            color,
            parent,
        } => {
            let folder = store.create_folder(FolderCreate {
                name,
                description,
                color,
                parent_id: parent.map(|p| Eid::from(p.as_str())),
            })?;
            println!("{}", serde_json::to_string_pretty(&folder)?);
        }

        FolderArgs::List { parent } => {
            let folders = match parent {
                Some(parent) => store.get_subfolders(&Eid::from(parent.as_str()))?,
                None => store.get_root_folders()?,
            };
            println!("{}", serde_json::to_string_pretty(&folders)?);
        }

        FolderArgs::Update {
            id,
            name,
            description,
            color,
        } => {
            if name.is_none() && description.is_none() && color.is_none() {
                println!("This update request does nothing");
                return Ok(());
            }

            let id = Eid::from(id.as_str());
            let update = FolderUpdate {
                name,
                description,
                color,
            };
            match store.update_folder(&id, update)? {
                Some(folder) => println!("{}", serde_json::to_string_pretty(&folder)?),
                None => bail!("folder {id} not found"),
            }
        }

        FolderArgs::Move { id, parent } => {
            let id = Eid::from(id.as_str());
            let parent = parent.map(|p| Eid::from(p.as_str()));
            match store.move_folder(&id, parent)? {
                Some(folder) => println!("{}", serde_json::to_string_pretty(&folder)?),
                None => bail!("folder {id} not found"),
            }
        }

        FolderArgs::Path { id } => {
            let id = Eid::from(id.as_str());
            let path = store.get_folder_path(&id)?;
            if path.is_empty() {
                bail!("folder {id} not found");
            }

            let names: Vec<&str> = path.iter().map(|f| f.name.as_str()).collect();
            println!("{}", names.join(" / "));
        }

        FolderArgs::Delete { id, yes } => {
            if !yes {
                match inquire::prompt_confirmation(format!(
                    "Are you sure you want to delete folder {id}?"
                )) {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => return Ok(()),
                    InquireResult::Err(err) => bail!("An error occurred: {}", err),
                }
            }

            let id = Eid::from(id.as_str());
            if store.delete_folder(&id)? {
                println!("deleted {id}");
            } else {
                bail!("folder {id} not found");
            }
        }
    }

    Ok(())
}
