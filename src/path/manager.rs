use std::collections::HashMap;

use regex::Regex;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::actor::{spawn, PathHandle};
use super::PathConf;

static REGEX_PREFIX: &str = "~";

fn is_regex_name(name: &str) -> bool {
    name.starts_with(REGEX_PREFIX)
}

fn compile_regex(name: &str) -> Option<Regex> {
    Regex::new(&name[REGEX_PREFIX.len()..]).ok()
}

/// Registry of path configurations and their live actors. Reload replaces
/// the whole `confs` map by value; it never hands callers a reference they
/// could mutate behind the manager's back.
pub struct PathManager {
    confs: RwLock<HashMap<String, PathConf>>,
    paths: RwLock<HashMap<String, PathHandle>>,
    token: CancellationToken,
}

impl PathManager {
    pub fn new(token: CancellationToken) -> Self {
        PathManager {
            confs: RwLock::new(HashMap::new()),
            paths: RwLock::new(HashMap::new()),
            token,
        }
    }

    /// Installs a fresh config map, and forwards the updated config to every
    /// currently running actor whose name still resolves against it. Actors
    /// whose config disappeared are left alone; they close themselves once
    /// `should_close` holds. `add_path`/`remove_path_conf` funnel through
    /// this same installer so a single-path add/remove and a bulk reload
    /// share one notification path.
    pub async fn reload_path_confs(&self, new_confs: HashMap<String, PathConf>) {
        let paths = self.paths.read().await;
        for (name, handle) in paths.iter() {
            if let Some(conf) = resolve(&new_confs, name) {
                let _ = handle.reload_conf(conf.clone()).await;
            }
        }
        drop(paths);
        *self.confs.write().await = new_confs;
    }

    /// Inserts `conf` under a fresh config map and reloads it in. Returns
    /// `false` without mutating anything if the name is already registered.
    pub async fn add_path(&self, conf: PathConf) -> bool {
        let mut confs = self.confs.write().await;
        if confs.contains_key(&conf.name) {
            return false;
        }
        let mut new_confs = confs.clone();
        new_confs.insert(conf.name.clone(), conf);
        drop(confs);
        self.reload_path_confs(new_confs).await;
        true
    }

    /// Removes `name` from the config map and drops its live actor (if any),
    /// then reloads the trimmed map in so any surviving actor whose resolved
    /// config changed (e.g. a regex path that now resolves to a catchall)
    /// observes it immediately.
    pub async fn remove_path_conf(&self, name: &str) -> bool {
        let mut confs = self.confs.write().await;
        if confs.remove(name).is_none() {
            return false;
        }
        let new_confs = confs.clone();
        drop(confs);
        self.paths.write().await.remove(name);
        self.reload_path_confs(new_confs).await;
        true
    }

    pub async fn path_exists(&self, name: &str) -> bool {
        self.confs.read().await.contains_key(name)
    }

    pub async fn live_path_exists(&self, name: &str) -> bool {
        self.paths.read().await.contains_key(name)
    }

    /// Returns the actor for `name` if one is already running, without
    /// spawning one. Used by diagnostics that want a snapshot only when
    /// there is something live to snapshot.
    pub async fn get_live(&self, name: &str) -> Option<PathHandle> {
        self.paths.read().await.get(name).cloned()
    }

    /// Returns the actor for `name`, spawning one if a config resolves but
    /// no actor is running yet. Returns `None` if no config (exact, regex,
    /// or catchall) resolves `name`.
    pub async fn get_or_spawn(&self, name: &str) -> Option<PathHandle> {
        if let Some(handle) = self.paths.read().await.get(name).cloned() {
            return Some(handle);
        }
        let confs = self.confs.read().await;
        let conf = resolve(&confs, name)?.clone();
        drop(confs);

        let mut paths = self.paths.write().await;
        if let Some(handle) = paths.get(name) {
            return Some(handle.clone());
        }
        let mut conf = conf;
        conf.name = name.to_string();
        let handle = spawn(conf, self.token.clone());
        paths.insert(name.to_string(), handle.clone());
        info!(path = %name, "path actor spawned");
        Some(handle)
    }

    pub async fn snapshot_names(&self) -> Vec<String> {
        self.paths.read().await.keys().cloned().collect()
    }
}

/// Tiered name resolution: exact match, then regex-named confs (`~prefix`),
/// then the catchall entries `all` / `all_others`, in that order.
fn resolve<'a>(confs: &'a HashMap<String, PathConf>, name: &str) -> Option<&'a PathConf> {
    if let Some(conf) = confs.get(name) {
        return Some(conf);
    }
    for (key, conf) in confs.iter() {
        if is_regex_name(key) {
            if let Some(re) = compile_regex(key) {
                if re.is_match(name) {
                    return Some(conf);
                }
            }
        }
    }
    confs.get("all").or_else(|| confs.get("all_others"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathConf;

    #[tokio::test]
    async fn add_then_get_or_spawn() {
        let mgr = PathManager::new(CancellationToken::new());
        assert!(mgr.add_path(PathConf::publisher("cam1")).await);
        assert!(!mgr.add_path(PathConf::publisher("cam1")).await);
        let handle = mgr.get_or_spawn("cam1").await.unwrap();
        assert_eq!(handle.name(), "cam1");
    }

    #[tokio::test]
    async fn remove_path_conf_drops_actor() {
        let mgr = PathManager::new(CancellationToken::new());
        mgr.add_path(PathConf::publisher("cam1")).await;
        mgr.get_or_spawn("cam1").await.unwrap();
        assert!(mgr.remove_path_conf("cam1").await);
        assert!(!mgr.path_exists("cam1").await);
        assert!(!mgr.live_path_exists("cam1").await);
    }

    #[tokio::test]
    async fn regex_conf_resolves_unknown_name() {
        let mgr = PathManager::new(CancellationToken::new());
        mgr.add_path(PathConf::publisher("~cam.*")).await;
        let handle = mgr.get_or_spawn("cam42").await.unwrap();
        assert_eq!(handle.name(), "cam42");
    }

    #[tokio::test]
    async fn no_conf_resolves_to_none() {
        let mgr = PathManager::new(CancellationToken::new());
        assert!(mgr.get_or_spawn("ghost").await.is_none());
    }

    #[tokio::test]
    async fn reload_path_confs_updates_live_actor() {
        let mgr = PathManager::new(CancellationToken::new());
        let mut conf = PathConf::publisher("cam1");
        conf.max_readers = 1;
        mgr.add_path(conf).await;
        let handle = mgr.get_or_spawn("cam1").await.unwrap();

        let publisher = crate::path::actor::Token::new();
        handle.add_publisher(publisher).await.unwrap();
        handle
            .start_publisher(
                publisher,
                crate::path::StreamDescriptor {
                    codecs: vec![],
                    sdp: vec![],
                },
            )
            .await
            .unwrap();
        handle.add_reader(crate::path::actor::Token::new()).await.unwrap();
        assert!(handle
            .add_reader(crate::path::actor::Token::new())
            .await
            .is_err());

        let mut reloaded = PathConf::publisher("cam1");
        reloaded.max_readers = 2;
        let mut new_confs = HashMap::new();
        new_confs.insert(reloaded.name.clone(), reloaded);
        mgr.reload_path_confs(new_confs).await;

        handle
            .add_reader(crate::path::actor::Token::new())
            .await
            .expect("reloaded max_readers should admit a second reader");
    }

    #[tokio::test]
    async fn add_path_goes_through_reload() {
        let mgr = PathManager::new(CancellationToken::new());
        assert!(mgr.add_path(PathConf::publisher("cam1")).await);
        assert!(mgr.path_exists("cam1").await);
    }
}
