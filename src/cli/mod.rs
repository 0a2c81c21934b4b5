//! CLI argument parsing for objlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use crate::lock::LockKind;
use std::path::PathBuf;

/// objlock: advisory locks on objects in a directory-backed attribute store.
///
/// Every command addresses one object. Locks are named, may be exclusive or
/// shared, may expire, and are owned by an identity plus a cookie.
#[derive(Parser, Debug)]
#[command(name = "objlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root directory (overrides `store_dir`).
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Requester identity (overrides `identity`).
    #[arg(long = "id", global = true)]
    pub id: Option<String>,

    /// Requester address (overrides `address`).
    #[arg(long, global = true)]
    pub addr: Option<String>,

    /// Object the command operates on.
    pub object: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for objlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take or renew a lock.
    Lock(LockArgs),

    /// Release a lock held by this identity.
    Unlock(UnlockArgs),

    /// Release a lock held by someone else.
    Break(BreakArgs),

    /// Print a lock's state as JSON.
    Info(InfoArgs),

    /// Print the names of all locks on the object.
    List,

    /// Exit 0 only if this identity holds the lock as described.
    Assert(HeldArgs),

    /// Move a held lock to a new cookie.
    SetCookie(SetCookieArgs),
}

/// Lock type selection shared by several commands. Exclusive by default.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct KindArgs {
    /// Shared lock.
    #[arg(long, conflicts_with = "ephemeral")]
    pub shared: bool,

    /// Exclusive lock removed together with its last locker.
    #[arg(long)]
    pub ephemeral: bool,
}

impl KindArgs {
    pub fn kind(self) -> LockKind {
        if self.shared {
            LockKind::Shared
        } else if self.ephemeral {
            LockKind::ExclusiveEphemeral
        } else {
            LockKind::Exclusive
        }
    }
}

/// Arguments for the `lock` command.
#[derive(Parser, Debug)]
pub struct LockArgs {
    /// Lock name.
    pub name: String,

    #[command(flatten)]
    pub kind: KindArgs,

    /// Seconds until the lock expires (0 = never; default from config).
    #[arg(long)]
    pub duration: Option<u64>,

    /// Cookie distinguishing this hold from others by the same identity.
    #[arg(long, default_value = "")]
    pub cookie: String,

    /// Tag every holder of the lock must share.
    #[arg(long, default_value = "")]
    pub tag: String,

    /// Free-form description stored with the hold.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Renew if already held, take it otherwise.
    #[arg(long)]
    pub renew: bool,

    /// Renew only; fail if not already held.
    #[arg(long)]
    pub must_renew: bool,

    /// Bid for an exclusive lock; the lowest live bid wins.
    #[arg(long, allow_negative_numbers = true)]
    pub bid: Option<i32>,

    /// Seconds the bid stays live.
    #[arg(long, requires = "bid", default_value_t = 0)]
    pub bid_duration: u64,
}

/// Arguments for the `unlock` command.
#[derive(Parser, Debug)]
pub struct UnlockArgs {
    /// Lock name.
    pub name: String,

    /// Cookie the lock was taken with.
    #[arg(long, default_value = "")]
    pub cookie: String,
}

/// Arguments for the `break` command.
#[derive(Parser, Debug)]
pub struct BreakArgs {
    /// Lock name.
    pub name: String,

    /// Identity holding the lock.
    #[arg(long)]
    pub locker: String,

    /// Cookie the holder used.
    #[arg(long, default_value = "")]
    pub cookie: String,
}

/// Arguments for the `info` command.
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Lock name.
    pub name: String,
}

/// A lock this identity claims to hold.
#[derive(Parser, Debug)]
pub struct HeldArgs {
    /// Lock name.
    pub name: String,

    #[command(flatten)]
    pub kind: KindArgs,

    /// Cookie the lock was taken with.
    #[arg(long, default_value = "")]
    pub cookie: String,

    /// Tag the lock was taken with.
    #[arg(long, default_value = "")]
    pub tag: String,
}

/// Arguments for the `set-cookie` command.
#[derive(Parser, Debug)]
pub struct SetCookieArgs {
    #[command(flatten)]
    pub held: HeldArgs,

    /// Cookie to move the hold to.
    #[arg(long)]
    pub new_cookie: String,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_lock_minimal() {
        let cli = Cli::try_parse_from(["objlock", "obj", "lock", "foo"]).unwrap();
        assert_eq!(cli.object, "obj");
        if let Command::Lock(args) = cli.command {
            assert_eq!(args.name, "foo");
            assert_eq!(args.kind.kind(), LockKind::Exclusive);
            assert_eq!(args.duration, None);
            assert_eq!(args.cookie, "");
            assert!(!args.renew);
            assert!(args.bid.is_none());
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn parse_lock_full() {
        let cli = Cli::try_parse_from([
            "objlock",
            "--store",
            "/tmp/s",
            "--id",
            "client.9",
            "obj",
            "lock",
            "foo",
            "--shared",
            "--duration",
            "30",
            "--cookie",
            "c1",
            "--tag",
            "t",
            "--description",
            "resize",
            "--renew",
        ])
        .unwrap();

        assert_eq!(cli.store, Some(PathBuf::from("/tmp/s")));
        assert_eq!(cli.id.as_deref(), Some("client.9"));
        if let Command::Lock(args) = cli.command {
            assert_eq!(args.kind.kind(), LockKind::Shared);
            assert_eq!(args.duration, Some(30));
            assert_eq!(args.cookie, "c1");
            assert_eq!(args.tag, "t");
            assert_eq!(args.description, "resize");
            assert!(args.renew);
            assert!(!args.must_renew);
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn parse_global_flag_after_subcommand() {
        let cli =
            Cli::try_parse_from(["objlock", "obj", "list", "--addr", "v2:1.2.3.4:0/5"]).unwrap();
        assert_eq!(cli.addr.as_deref(), Some("v2:1.2.3.4:0/5"));
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn parse_lock_bid() {
        let cli = Cli::try_parse_from([
            "objlock",
            "obj",
            "lock",
            "foo",
            "--bid",
            "3",
            "--bid-duration",
            "10",
        ])
        .unwrap();
        if let Command::Lock(args) = cli.command {
            assert_eq!(args.bid, Some(3));
            assert_eq!(args.bid_duration, 10);
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn parse_negative_bid_reaches_validation() {
        let cli =
            Cli::try_parse_from(["objlock", "obj", "lock", "foo", "--bid", "-1"]).unwrap();
        if let Command::Lock(args) = cli.command {
            assert_eq!(args.bid, Some(-1));
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn bid_duration_requires_bid() {
        let result =
            Cli::try_parse_from(["objlock", "obj", "lock", "foo", "--bid-duration", "10"]);
        assert!(result.is_err());
    }

    #[test]
    fn shared_conflicts_with_ephemeral() {
        let result =
            Cli::try_parse_from(["objlock", "obj", "lock", "foo", "--shared", "--ephemeral"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_ephemeral_kind() {
        let cli = Cli::try_parse_from(["objlock", "obj", "assert", "foo", "--ephemeral"]).unwrap();
        if let Command::Assert(args) = cli.command {
            assert_eq!(args.kind.kind(), LockKind::ExclusiveEphemeral);
        } else {
            panic!("Expected Assert command");
        }
    }

    #[test]
    fn parse_break() {
        let cli = Cli::try_parse_from([
            "objlock", "obj", "break", "foo", "--locker", "client.1", "--cookie", "c1",
        ])
        .unwrap();
        if let Command::Break(args) = cli.command {
            assert_eq!(args.name, "foo");
            assert_eq!(args.locker, "client.1");
            assert_eq!(args.cookie, "c1");
        } else {
            panic!("Expected Break command");
        }
    }

    #[test]
    fn break_requires_locker() {
        let result = Cli::try_parse_from(["objlock", "obj", "break", "foo"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_set_cookie() {
        let cli = Cli::try_parse_from([
            "objlock",
            "obj",
            "set-cookie",
            "foo",
            "--shared",
            "--cookie",
            "old",
            "--new-cookie",
            "new",
        ])
        .unwrap();
        if let Command::SetCookie(args) = cli.command {
            assert_eq!(args.held.name, "foo");
            assert_eq!(args.held.kind.kind(), LockKind::Shared);
            assert_eq!(args.held.cookie, "old");
            assert_eq!(args.new_cookie, "new");
        } else {
            panic!("Expected SetCookie command");
        }
    }

    #[test]
    fn object_is_required() {
        let result = Cli::try_parse_from(["objlock"]);
        assert!(result.is_err());
    }
}
