//! Line-oriented operator console on stdin/stdout, standing in for the device's buttons and screen.

use std::fmt::Write as _;
use std::time::Instant;

use hike_core::{
    format_age, Address, CommandError, HikeCore, OutboundAction, PairingPhase, StatusCode,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::node::{self, SharedCore};

const HELP: &str = "\
commands:
  status <0-7>        set own status
  pair                enter pairing mode
  accept | decline    answer the pending pairing request
  label <XX>          name the accepted device and finish pairing
  cancel              leave pairing mode
  add <mac> [label]   add a peer without pairing
  rm <n>              remove peer n (see `peers`)
  clear               remove all peers
  peers | inbox | carry | show
  help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    SetStatus(StatusCode),
    Pair,
    Accept,
    Decline,
    Label(String),
    Cancel,
    Add(Address, String),
    Remove(usize),
    Clear,
    Peers,
    Inbox,
    Carry,
    Show,
    Help,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    let cmd = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("status", Some(n)) => {
            let code: u8 = n.parse().map_err(|_| format!("not a status code: {n}"))?;
            let code = StatusCode(code);
            if !code.is_selectable() {
                return Err(format!("status must be 0-7, got {}", code.0));
            }
            ConsoleCommand::SetStatus(code)
        }
        ("pair", None) => ConsoleCommand::Pair,
        ("accept", None) => ConsoleCommand::Accept,
        ("decline", None) => ConsoleCommand::Decline,
        ("label", Some(l)) => ConsoleCommand::Label(l.to_string()),
        ("cancel", None) => ConsoleCommand::Cancel,
        ("add", Some(mac)) => {
            let address: Address = mac.parse().map_err(|e| format!("{e}"))?;
            ConsoleCommand::Add(address, words.next().unwrap_or("").to_string())
        }
        ("rm", Some(n)) => ConsoleCommand::Remove(n.parse().map_err(|_| format!("not an index: {n}"))?),
        ("clear", None) => ConsoleCommand::Clear,
        ("peers", None) => ConsoleCommand::Peers,
        ("inbox", None) => ConsoleCommand::Inbox,
        ("carry", None) => ConsoleCommand::Carry,
        ("show", None) => ConsoleCommand::Show,
        ("help", _) | ("?", _) => ConsoleCommand::Help,
        _ => return Err(format!("unrecognised command: {}", line.trim())),
    };
    Ok(Some(cmd))
}

/// Apply a command to the core. Returns text for the operator and actions for the host.
pub fn execute(
    core: &mut HikeCore,
    cmd: ConsoleCommand,
) -> Result<(String, Vec<OutboundAction>), CommandError> {
    let mut actions = Vec::new();
    let text = match cmd {
        ConsoleCommand::SetStatus(code) => {
            core.set_local_status(code)?;
            format!("status: {}", code)
        }
        ConsoleCommand::Pair => {
            core.enter_pairing_mode();
            render_pairing(core)
        }
        ConsoleCommand::Accept => {
            core.accept_pending_candidate();
            render_pairing(core)
        }
        ConsoleCommand::Decline => {
            core.decline_pending_candidate();
            render_pairing(core)
        }
        ConsoleCommand::Label(label) => {
            actions = core.confirm_candidate_label(&label)?;
            render_pairing(core)
        }
        ConsoleCommand::Cancel => {
            core.cancel_pairing();
            render_pairing(core)
        }
        ConsoleCommand::Add(address, label) => {
            actions = core.add_peer_manually(address, &label)?;
            render_peers(core)
        }
        ConsoleCommand::Remove(index) => {
            actions = core.remove_peer(index)?;
            render_peers(core)
        }
        ConsoleCommand::Clear => {
            actions = core.clear_all_peers();
            render_peers(core)
        }
        ConsoleCommand::Peers => render_peers(core),
        ConsoleCommand::Inbox => render_inbox(core),
        ConsoleCommand::Carry => render_carry(core),
        ConsoleCommand::Show => format!(
            "{} status: {}\n{}",
            core.address(),
            core.local_status(),
            render_pairing(core)
        ),
        ConsoleCommand::Help => HELP.to_string(),
    };
    Ok((text, actions))
}

fn render_pairing(core: &HikeCore) -> String {
    let p = core.pairing();
    match p.phase() {
        PairingPhase::Idle => "pairing: off".to_string(),
        PairingPhase::Broadcasting => format!("pairing: waiting ({} declined)", p.declined().len()),
        PairingPhase::RequestPending => match p.candidate() {
            Some(c) => format!("pairing: request from {c} (accept/decline)"),
            None => "pairing: waiting".to_string(),
        },
        PairingPhase::ConfirmingIdentity => match p.candidate() {
            Some(c) => format!("pairing: enter a 2-letter label for {c}"),
            None => "pairing: waiting".to_string(),
        },
    }
}

fn render_peers(core: &HikeCore) -> String {
    let peers = core.peers().displayed();
    if peers.is_empty() {
        return "no peers".to_string();
    }
    let mut out = String::new();
    for (i, p) in peers.iter().enumerate() {
        let _ = writeln!(out, "{:>2}  {:<4}  {}", i + 1, p.initials, p.address);
    }
    out.trim_end().to_string()
}

fn render_inbox(core: &HikeCore) -> String {
    let inbox = core.inbox();
    if inbox.is_empty() {
        return "inbox empty".to_string();
    }
    let now = core.now_minutes();
    let mut out = String::new();
    for e in inbox.entries() {
        let _ = writeln!(
            out,
            "{:<4}  {:<10}  {}",
            core.label_for(&e.record.sender),
            e.record.code.to_string(),
            format_age(e.age_minutes(now))
        );
    }
    out.trim_end().to_string()
}

fn render_carry(core: &HikeCore) -> String {
    let carry = core.carry();
    let mut out = format!("carrying {}/{}", carry.len(), carry.capacity());
    for r in carry.iter() {
        let _ = write!(out, "\n  {}  {}", r.sender, r.code);
    }
    out
}

/// Read commands from stdin until EOF.
pub async fn run_console(
    core: SharedCore,
    started: Instant,
    persist_tx: mpsc::UnboundedSender<OutboundAction>,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };
        let result = {
            let mut c = core.lock().await;
            c.set_uptime(started.elapsed());
            execute(&mut c, cmd)
        };
        match result {
            Ok((text, actions)) => {
                println!("{text}");
                for action in actions {
                    node::dispatch(action, &persist_tx);
                }
            }
            Err(e) => println!("error: {e}"),
        }
    }
    Ok(())
}
