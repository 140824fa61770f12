use std::net::IpAddr;
use std::path::PathBuf;

use super::elevate::ElevatedExecutor;
use super::hosts;
use super::whitelist::WhitelistStore;
use crate::config::BlockingConfig;
use crate::error::CommandError;

/// Common distracting sites blocked by default.
pub const DEFAULT_BLOCK_LIST: &[&str] = &[
    "facebook.com",
    "www.facebook.com",
    "twitter.com",
    "www.twitter.com",
    "x.com",
    "www.x.com",
    "instagram.com",
    "www.instagram.com",
    "youtube.com",
    "www.youtube.com",
    "tiktok.com",
    "www.tiktok.com",
    "reddit.com",
    "www.reddit.com",
    "netflix.com",
    "www.netflix.com",
    "twitch.tv",
    "www.twitch.tv",
];

/// Toggles the system-wide site block by editing the marker region of the
/// hosts file. External failures are logged and leave the flags untouched.
pub struct BlockingCoordinator {
    executor: Box<dyn ElevatedExecutor>,
    whitelist: WhitelistStore,
    block_list: Vec<String>,
    hosts_path: PathBuf,
    redirect_ip: String,
    flush_dns: String,
    authorized: bool,
    blocking: bool,
    /// Whether the active block actually wrote entries to the hosts file.
    wrote_entries: bool,
}

impl BlockingCoordinator {
    pub fn new(
        config: &BlockingConfig,
        executor: Box<dyn ElevatedExecutor>,
        whitelist: WhitelistStore,
    ) -> Self {
        let mut block_list: Vec<String> = DEFAULT_BLOCK_LIST.iter().map(|s| s.to_string()).collect();
        for site in &config.extra_sites {
            let site = site.trim().to_lowercase();
            if !hosts::is_valid_hostname(&site) {
                tracing::warn!(site = %site, "ignoring invalid extra block site");
                continue;
            }
            if !block_list.contains(&site) {
                block_list.push(site);
            }
        }

        let redirect_ip = match config.redirect_ip.parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => {
                tracing::warn!(ip = %config.redirect_ip, "invalid redirect ip, using 127.0.0.1");
                "127.0.0.1".to_string()
            }
        };

        Self {
            executor,
            whitelist,
            block_list,
            hosts_path: config.hosts_path.clone(),
            redirect_ip,
            flush_dns: config.flush_dns_command.clone(),
            authorized: false,
            blocking: false,
            wrote_entries: false,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn whitelist(&self) -> &WhitelistStore {
        &self.whitelist
    }

    pub fn whitelist_mut(&mut self) -> &mut WhitelistStore {
        &mut self.whitelist
    }

    /// Block list minus the whitelist. A whitelisted `youtube.com` also
    /// exempts `www.youtube.com`.
    pub fn sites_to_block(&self) -> Vec<String> {
        self.block_list
            .iter()
            .filter(|site| {
                let base = site.strip_prefix("www.").unwrap_or(site);
                !self.whitelist.contains(base) && !self.whitelist.contains(site)
            })
            .cloned()
            .collect()
    }

    /// Memoized for the process lifetime once it succeeds. May block while the
    /// OS shows a credential prompt.
    pub fn request_authorization(&mut self) -> bool {
        if self.authorized {
            return true;
        }

        let result = self.executor.run("echo authorized").and_then(|out| {
            if out == "authorized" {
                Ok(())
            } else {
                Err(CommandError::UnexpectedOutput(out))
            }
        });

        match result {
            Ok(()) => {
                tracing::info!("site blocking authorized");
                self.authorized = true;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "authorization denied");
                false
            }
        }
    }

    pub fn enable_blocking(&mut self) {
        if self.blocking {
            tracing::debug!("blocking already active");
            return;
        }

        self.whitelist.refresh();
        let sites = self.sites_to_block();
        if sites.is_empty() {
            tracing::info!("every blocked site is whitelisted, nothing to write");
            self.blocking = true;
            self.wrote_entries = false;
            return;
        }

        if !self.authorized {
            // a refused probe is not final, the append below prompts again
            self.request_authorization();
        }

        let block = hosts::render_block(&self.redirect_ip, &sites);
        let script = hosts::append_script(&self.hosts_path, &block, &self.flush_dns);
        match self.executor.run(&script) {
            Ok(_) => {
                tracing::info!(count = sites.len(), "site blocking enabled");
                self.blocking = true;
                self.wrote_entries = true;
                self.authorized = true;
            }
            Err(e) => tracing::warn!(error = %e, "failed to enable site blocking"),
        }
    }

    pub fn disable_blocking(&mut self) {
        if !self.blocking {
            return;
        }

        if !self.wrote_entries {
            self.blocking = false;
            return;
        }

        let script = hosts::remove_script(&self.hosts_path, &self.flush_dns);
        match self.executor.run(&script) {
            Ok(_) => {
                tracing::info!("site blocking disabled");
                self.blocking = false;
                self.wrote_entries = false;
            }
            Err(e) => tracing::warn!(error = %e, "failed to disable site blocking"),
        }
    }

    /// Removes a marker region regardless of the in-memory flags, for cleaning
    /// up after a run that exited without disabling.
    pub fn purge_stale_block(&mut self) -> Result<(), CommandError> {
        let script = hosts::remove_script(&self.hosts_path, &self.flush_dns);
        self.executor.run(&script)?;
        self.blocking = false;
        self.wrote_entries = false;
        Ok(())
    }
}
