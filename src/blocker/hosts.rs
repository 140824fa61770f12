//! The marker-delimited region this program owns inside the hosts file, and the
//! shell scripts that add and remove it. Everything outside the markers is
//! left untouched.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

pub const MARKER_START: &str = "# POMOFOCUS START";
pub const MARKER_END: &str = "# POMOFOCUS END";

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,62}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,62}[a-z0-9])?)+$")
        .expect("hostname pattern is valid")
});

/// Accepts only plain dotted hostnames, so nothing written into a shell script
/// can carry quotes or metacharacters.
pub fn is_valid_hostname(site: &str) -> bool {
    site.len() <= 253 && HOSTNAME.is_match(site)
}

pub fn render_block(redirect_ip: &str, sites: &[String]) -> String {
    let mut block = format!("{MARKER_START}\n");
    for site in sites {
        block.push_str(&format!("{redirect_ip} {site}\n"));
    }
    block.push_str(MARKER_END);
    block.push('\n');
    block
}

/// Sites listed inside the marker region of `contents`.
pub fn blocked_sites(contents: &str) -> Vec<String> {
    let mut inside = false;
    let mut sites = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line == MARKER_START {
            inside = true;
        } else if line == MARKER_END {
            inside = false;
        } else if inside {
            if let Some(site) = line.split_whitespace().nth(1) {
                sites.push(site.to_string());
            }
        }
    }
    sites
}

pub fn contains_block(contents: &str) -> bool {
    contents.lines().any(|line| line.trim() == MARKER_START)
}

pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Appends `block` to the hosts file (adding a newline first if the file lacks
/// a trailing one), then flushes the DNS cache.
pub fn append_script(hosts_path: &Path, block: &str, flush_dns: &str) -> String {
    let hosts = shell_quote(&hosts_path.to_string_lossy());
    format!(
        "if [ -s {hosts} ] && [ -n \"$(tail -c1 {hosts})\" ]; then echo >> {hosts}; fi; \
         printf '%s' {block} >> {hosts} && {{ {flush_dns}; }}",
        block = shell_quote(block),
    )
}

/// Deletes every line from the start marker to the end marker inclusive, then
/// flushes the DNS cache. `-i.bak` is accepted by both GNU and BSD sed.
pub fn remove_script(hosts_path: &Path, flush_dns: &str) -> String {
    let hosts = shell_quote(&hosts_path.to_string_lossy());
    let backup = shell_quote(&format!("{}.bak", hosts_path.to_string_lossy()));
    format!(
        "sed -i.bak '/^{MARKER_START}$/,/^{MARKER_END}$/d' {hosts} && rm -f {backup} && {{ {flush_dns}; }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn run_sh(script: &str) {
        let status = Command::new("sh").arg("-c").arg(script).status().unwrap();
        assert!(status.success(), "script failed: {script}");
    }

    #[test]
    fn render_lists_each_site_between_markers() {
        let block = render_block("127.0.0.1", &["reddit.com".to_string(), "x.com".to_string()]);
        assert_eq!(
            block,
            "# POMOFOCUS START\n127.0.0.1 reddit.com\n127.0.0.1 x.com\n# POMOFOCUS END\n"
        );
        assert_eq!(blocked_sites(&block), vec!["reddit.com", "x.com"]);
    }

    #[test]
    fn hostname_validation() {
        assert!(is_valid_hostname("www.youtube.com"));
        assert!(is_valid_hostname("news.ycombinator.com"));
        assert!(!is_valid_hostname("localhost"));
        assert!(!is_valid_hostname("evil.com'; rm -rf /"));
        assert!(!is_valid_hostname("-bad.com"));
        assert!(!is_valid_hostname(""));
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("a'b"), r"'a'\''b'");
    }

    #[test]
    fn append_then_remove_restores_original_lines() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        let original = "127.0.0.1 localhost\n::1 localhost";
        std::fs::write(&hosts, original).unwrap();

        let block = render_block("127.0.0.1", &["reddit.com".to_string()]);
        run_sh(&append_script(&hosts, &block, "true"));

        let blocked = std::fs::read_to_string(&hosts).unwrap();
        assert!(blocked.starts_with("127.0.0.1 localhost\n::1 localhost\n# POMOFOCUS START\n"));
        assert!(contains_block(&blocked));
        assert_eq!(blocked_sites(&blocked), vec!["reddit.com"]);

        run_sh(&remove_script(&hosts, "true"));

        let restored = std::fs::read_to_string(&hosts).unwrap();
        assert_eq!(restored, "127.0.0.1 localhost\n::1 localhost\n");
        assert!(!contains_block(&restored));
        assert!(!dir.path().join("hosts.bak").exists());
    }

    #[test]
    fn remove_keeps_lines_after_the_region() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        std::fs::write(
            &hosts,
            "a\n# POMOFOCUS START\n127.0.0.1 x.com\n# POMOFOCUS END\nb\n",
        )
        .unwrap();

        run_sh(&remove_script(&hosts, "true"));

        assert_eq!(std::fs::read_to_string(&hosts).unwrap(), "a\nb\n");
    }
}
