use anyhow::{Result, bail};
use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Cache, Repo, RepoType};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolve `files` of `repo_id@revision`, reading the local hf-hub cache first
/// and downloading on a miss unless `offline` is set.
pub fn load_pretrained(
    repo_id: &str,
    revision: &str,
    cache_dir: Option<&Path>,
    offline: bool,
    files: &[&str],
) -> Result<Vec<PathBuf>> {
    let repo = Repo::with_revision(repo_id.to_string(), RepoType::Model, revision.to_string());
    let cache = cache_dir.map_or_else(Cache::default, |d| Cache::new(d.to_path_buf()));
    let mut api: Option<Api> = None;
    let mut out = Vec::with_capacity(files.len());
    for &file in files {
        if let Some(path) = cache.repo(repo.clone()).get(file) {
            debug!(repo = repo_id, file, "cache hit");
            out.push(path);
            continue;
        }
        if offline {
            bail!("{file} for {repo_id}@{revision} is not cached and offline mode is set");
        }
        let client = match api.take() {
            Some(client) => client,
            None => {
                let mut builder = ApiBuilder::new().with_progress(false);
                if let Some(dir) = cache_dir { builder = builder.with_cache_dir(dir.to_path_buf()); }
                builder.build()?
            }
        };
        info!(repo = repo_id, file, "downloading");
        out.push(client.repo(repo.clone()).get(file)?);
        api = Some(client);
    }
    Ok(out)
}
