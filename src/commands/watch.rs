use anyhow::Result;

use crate::bib::watcher;
use crate::commands::CommandReport;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub once: bool,
    pub daemon: bool,
}

pub fn run(opts: &WatchOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("watch");

    if opts.once && opts.daemon {
        report.issue("invalid flags: use only one of --once or --daemon");
        return Ok(report);
    }

    if opts.daemon {
        report.detail("starting gallery watcher in daemon mode");
        watcher::run_daemon()?;
        return Ok(report);
    }

    let cycle = watcher::run_once()?;
    report.detail("gallery watcher cycle completed");
    report.detail(format!("state_file={}", cycle.state_file));
    report.detail(format!("heartbeat_epoch_secs={}", cycle.heartbeat_epoch_secs));
    report.detail(format!("poll_interval_secs={}", cycle.poll_interval_secs));
    report.detail(format!("categories={}", cycle.categories.join(",")));
    for gallery in &cycle.regenerated {
        report.detail(format!(
            "regenerated {} images={} path={}",
            gallery.category,
            gallery.images,
            gallery.html_path.display()
        ));
    }
    for (category, err) in &cycle.failed {
        report.issue(format!("gallery for {category} failed: {err}"));
    }
    Ok(report)
}
