//! Standard menu commands.
//!
//! Every server gets these unless the embedder builds its own registry.
//! Argument-taking commands use `name key=value` syntax and report
//! malformed input to the caller with a usage message.

use protocol::{format_elapsed, SessionError, SessionId};
use tracing::{debug, info};

use crate::commands::{CommandContext, CommandRegistry};

const BYE: &str = "\r\nBye bye, thanks for connecting\r\n";

const SET_USAGE: &str =
    "Invalid set command\r\n\tUse: set parameter=value\r\n\tSupported commands.-\r\n\ttimeout=minutes";

/// Registers help, info, set, sessions, kill, quit and the hidden `exit`
/// alias, in that order.
pub fn register_standard_commands(registry: &mut CommandRegistry) -> Result<(), SessionError> {
    registry.insert("help", "Display this help message", show_help)?;
    registry.insert("info", "System information", show_info)?;
    registry.insert_prefix("set", "Set parameter", set_parameter, 3)?;
    registry.insert("sessions", "List connected sessions", list_sessions)?;
    registry.insert_prefix("kill", "Kill a session connection", kill_session, 4)?;
    registry.insert("quit", "End the connection", quit)?;
    registry.insert("exit", "", quit)?;
    Ok(())
}

/// Extracts `value` from a `command key=value` line.
///
/// The command word must be followed by a space and the key must match
/// exactly. Anything after the first space of the value is ignored.
fn parse_assignment<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (_, rest) = line.split_once(' ')?;
    let (name, value) = rest.trim_start_matches(' ').split_once('=')?;
    if name != key {
        return None;
    }
    value.split_whitespace().next()
}

fn show_help(ctx: &mut CommandContext<'_>, _line: &str) {
    let header = format!("[Client {}] Menu options.-\r\n", ctx.session_id() + 1);
    let listing = ctx.help_lines();
    ctx.print(&header);
    ctx.print(&listing);
}

fn show_info(ctx: &mut CommandContext<'_>, _line: &str) {
    let id = ctx.session_id();
    let server = ctx.info();
    let mut out = format!("This is {} {} - system info:\r\n", server.name, server.version);
    out.push_str(&format!("\tUptime {}\r\n", format_elapsed(ctx.uptime())));
    out.push_str(&format!(
        "\tSessions {}/{}\r\n",
        ctx.active_count(),
        ctx.max_sessions()
    ));
    if let Ok(peer) = ctx.peer(id) {
        out.push_str(&format!("\tYour address {}\r\n", peer));
    }
    if let Some(own) = ctx.sessions().into_iter().find(|s| s.id == id) {
        out.push_str(&format!("\tConnected for {}\r\n", format_elapsed(own.connected_for)));
    }
    match ctx.get_timeout(id) {
        Ok(0) | Err(_) => out.push_str("\tInactivity timeout disabled\r\n"),
        Ok(minutes) => out.push_str(&format!("\tInactivity timeout in {} minutes\r\n", minutes)),
    }
    ctx.print(&out);
}

fn set_parameter(ctx: &mut CommandContext<'_>, line: &str) {
    let minutes = parse_assignment(line, "timeout").and_then(|v| v.parse::<u16>().ok());
    let Some(minutes) = minutes else {
        ctx.print(SET_USAGE);
        return;
    };

    let id = ctx.session_id();
    match ctx.set_timeout(id, minutes) {
        Ok(()) => {
            info!(slot = id, minutes, "Idle timeout changed");
            ctx.print(&format!("\tInactivity timeout set to {} minutes", minutes));
        }
        Err(_) => ctx.print(SET_USAGE),
    }
}

fn write_session_list(ctx: &mut CommandContext<'_>) {
    let caller = ctx.session_id();
    let listing: String = ctx
        .sessions()
        .iter()
        .map(|s| {
            format!(
                "\tClient [{}] {} (T:{}){}\r\n",
                s.id + 1,
                s.peer,
                s.remaining_minutes + 1,
                if s.id == caller { '*' } else { ' ' }
            )
        })
        .collect();
    ctx.print(&listing);
}

fn list_sessions(ctx: &mut CommandContext<'_>, _line: &str) {
    write_session_list(ctx);
}

/// Resolves a 1-based session number to a connected slot.
fn kill_target(ctx: &CommandContext<'_>, line: &str) -> Option<SessionId> {
    let number = parse_assignment(line, "session")?.parse::<usize>().ok()?;
    let id = number.checked_sub(1)?;
    ctx.is_connected(id).then_some(id)
}

fn kill_session(ctx: &mut CommandContext<'_>, line: &str) {
    let caller = ctx.session_id();
    let Some(target) = kill_target(ctx, line) else {
        let usage = format!(
            "Invalid kill command or session is not active\r\n\tUse: kill session=value\r\n\tvalue should be between 1 and {}\r\n\tAvailable clients.-\r\n",
            ctx.max_sessions()
        );
        ctx.print(&usage);
        write_session_list(ctx);
        return;
    };

    let notice = format!("\tSession {} ended forcefully by client [{}]", target + 1, caller + 1);
    ctx.print(&notice);
    if target != caller {
        if let Err(e) = ctx.print_to(target, &notice) {
            debug!(slot = target, error = %e, "Failed to notify killed session");
        }
    }
    info!(slot = target, by = caller, "Session killed");
    end_session(ctx, target);
}

fn quit(ctx: &mut CommandContext<'_>, _line: &str) {
    let id = ctx.session_id();
    info!(slot = id, "Client quit");
    end_session(ctx, id);
}

fn end_session(ctx: &mut CommandContext<'_>, id: SessionId) {
    if let Err(e) = ctx.print_to(id, BYE) {
        debug!(slot = id, error = %e, "Failed to say goodbye");
    }
    if let Err(e) = ctx.close(id) {
        debug!(slot = id, error = %e, "Session already closed");
    }
}
