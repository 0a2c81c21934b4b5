//! Command implementations for objlock.
//!
//! Each command opens the addressed object in the file store, runs one lock
//! manager operation against it and returns the text to print. The object's
//! guard is held for exactly the duration of that operation.

use crate::cli::{BreakArgs, Cli, Command, HeldArgs, InfoArgs, LockArgs, SetCookieArgs, UnlockArgs};
use crate::config::Config;
use crate::error::Result;
use crate::lock::{HeldLock, LockFlags, LockManager, LockRecord, LockRequest, Origin};
use crate::store::FileStore;
use chrono::Duration;
use serde_json::json;

/// Everything a command needs besides its own arguments.
#[derive(Debug)]
pub struct Session {
    pub store: FileStore,
    pub origin: Origin,
    pub manager: LockManager,
    pub default_duration: Duration,
}

impl Session {
    /// Resolve the session from config, with command line flags taking
    /// precedence.
    pub fn new(cli: &Cli, config: &Config) -> Self {
        let root = cli
            .store
            .clone()
            .unwrap_or_else(|| config.store_dir.clone().into());
        let identity = cli.id.clone().unwrap_or_else(|| config.identity.clone());
        let address = cli.addr.clone().unwrap_or_else(|| config.address.clone());

        Self {
            store: FileStore::new(root, config.guard_timeout())
                .with_guard_stale(config.guard_stale()),
            origin: Origin::new(identity, address),
            manager: LockManager::default(),
            default_duration: config.default_duration(),
        }
    }
}

/// Load the config named on the command line, or the defaults.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

/// Dispatch a command to its implementation.
///
/// Returns the command's output; mutating commands print nothing and report
/// through the exit code only.
pub fn dispatch(session: &Session, object: &str, command: Command) -> Result<String> {
    match command {
        Command::Lock(args) => cmd_lock(session, object, args),
        Command::Unlock(args) => cmd_unlock(session, object, args),
        Command::Break(args) => cmd_break(session, object, args),
        Command::Info(args) => cmd_info(session, object, args),
        Command::List => cmd_list(session, object),
        Command::Assert(args) => cmd_assert(session, object, args),
        Command::SetCookie(args) => cmd_set_cookie(session, object, args),
    }
}

fn cmd_lock(session: &Session, object: &str, args: LockArgs) -> Result<String> {
    let duration = args
        .duration
        .map(seconds)
        .unwrap_or(session.default_duration);

    let mut req = LockRequest::new(args.name, args.kind.kind())
        .with_cookie(args.cookie)
        .with_tag(args.tag)
        .with_description(args.description)
        .with_duration(duration)
        .with_flags(LockFlags {
            may_renew: args.renew,
            must_renew: args.must_renew,
        });
    if let Some(amount) = args.bid {
        req = req.with_bid(amount, seconds(args.bid_duration));
    }

    let mut handle = session.store.open(object)?;
    session.manager.lock(&mut handle, &session.origin, &req)?;
    Ok(String::new())
}

fn cmd_unlock(session: &Session, object: &str, args: UnlockArgs) -> Result<String> {
    let mut handle = session.store.open(object)?;
    session
        .manager
        .unlock(&mut handle, &session.origin, &args.name, &args.cookie)?;
    Ok(String::new())
}

fn cmd_break(session: &Session, object: &str, args: BreakArgs) -> Result<String> {
    let mut handle = session.store.open(object)?;
    session
        .manager
        .break_lock(&mut handle, &args.name, &args.locker, &args.cookie)?;
    Ok(String::new())
}

fn cmd_info(session: &Session, object: &str, args: InfoArgs) -> Result<String> {
    let mut handle = session.store.open(object)?;
    let record = session.manager.get_info(&mut handle, &args.name)?;
    Ok(format!("{:#}\n", render_info(&args.name, &record)))
}

fn cmd_list(session: &Session, object: &str) -> Result<String> {
    let handle = session.store.open(object)?;
    let names = session.manager.list_locks(&handle)?;
    Ok(names.iter().map(|name| format!("{}\n", name)).collect())
}

fn cmd_assert(session: &Session, object: &str, args: HeldArgs) -> Result<String> {
    let mut handle = session.store.open(object)?;
    session
        .manager
        .assert_locked(&mut handle, &session.origin, &held(args))?;
    Ok(String::new())
}

fn cmd_set_cookie(session: &Session, object: &str, args: SetCookieArgs) -> Result<String> {
    let mut handle = session.store.open(object)?;
    session.manager.set_cookie(
        &mut handle,
        &session.origin,
        &held(args.held),
        &args.new_cookie,
    )?;
    Ok(String::new())
}

fn held(args: HeldArgs) -> HeldLock {
    HeldLock::new(args.name, args.kind.kind(), args.tag, args.cookie)
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn render_info(name: &str, record: &LockRecord) -> serde_json::Value {
    let lockers: Vec<_> = record
        .lockers
        .iter()
        .map(|(id, info)| {
            json!({
                "locker": id.locker,
                "cookie": id.cookie,
                "expiration": info.expiration.map(|t| t.to_rfc3339()),
                "addr": info.addr,
                "description": info.description,
            })
        })
        .collect();

    json!({
        "name": name,
        "lock_type": record.lock_type.as_str(),
        "tag": record.tag,
        "lockers": lockers,
    })
}
