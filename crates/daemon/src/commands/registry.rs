//! Ordered command registry and dispatcher.
//!
//! Entries are kept in insertion order and dispatch is first-match-wins, so
//! a command registered earlier shadows any later command whose prefix
//! overlaps it. Register the more specific command first.

use std::fmt;
use std::sync::Arc;

use protocol::ansi::{RESET, YELLOW};
use protocol::{CommandPattern, SessionError};
use tracing::trace;

use super::context::CommandContext;

/// A command handler. Receives the dispatch context and the full line.
pub type Handler = Arc<dyn Fn(&mut CommandContext<'_>, &str) + Send + Sync>;

/// Width the command column is right-aligned to in help listings.
const HELP_COLUMN_WIDTH: usize = 10;

/// One registered command.
#[derive(Clone)]
pub struct CommandEntry {
    pattern: CommandPattern,
    help: String,
    handler: Handler,
}

impl CommandEntry {
    /// Text the command is registered under.
    pub fn command(&self) -> &str {
        self.pattern.text()
    }

    /// Help text, empty for hidden aliases.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Number of leading characters compared, zero for exact match.
    pub fn match_len(&self) -> usize {
        self.pattern.match_len()
    }

    /// Whether the entry is left out of help listings.
    pub fn is_hidden(&self) -> bool {
        self.help.is_empty()
    }

    /// Whether `line` selects this command.
    pub fn matches(&self, line: &str) -> bool {
        self.pattern.matches(line.as_bytes())
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("command", &self.command())
            .field("help", &self.help)
            .field("match_len", &self.match_len())
            .finish_non_exhaustive()
    }
}

/// Ordered collection of commands.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an exact-match command.
    ///
    /// An existing entry with the same text is updated in place and keeps
    /// its position.
    pub fn insert<F>(&mut self, command: &str, help: &str, handler: F) -> Result<(), SessionError>
    where
        F: Fn(&mut CommandContext<'_>, &str) + Send + Sync + 'static,
    {
        self.insert_prefix(command, help, handler, 0)
    }

    /// Registers a command matched on its first `match_len` characters.
    ///
    /// A `match_len` of zero means exact match. Replacement of an existing
    /// entry compares the full command text regardless of `match_len`.
    pub fn insert_prefix<F>(
        &mut self,
        command: &str,
        help: &str,
        handler: F,
        match_len: usize,
    ) -> Result<(), SessionError>
    where
        F: Fn(&mut CommandContext<'_>, &str) + Send + Sync + 'static,
    {
        let entry = CommandEntry {
            pattern: CommandPattern::prefix(command, match_len)?,
            help: help.to_string(),
            handler: Arc::new(handler),
        };

        match self.entries.iter_mut().find(|e| e.command() == command) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        Ok(())
    }

    /// Looks up an entry by its exact command text.
    pub fn get(&self, command: &str) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| e.command() == command)
    }

    /// Entries shown in help listings, in registration order.
    pub fn list(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.iter().filter(|e| !e.is_hidden())
    }

    /// Help listing, one coloured line per visible command.
    pub fn help_lines(&self) -> String {
        self.list()
            .map(|e| {
                format!(
                    "{YELLOW}{:>width$}{RESET}\t{}\r\n",
                    e.command(),
                    e.help(),
                    width = HELP_COLUMN_WIDTH
                )
            })
            .collect()
    }

    /// Number of entries, hidden ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose rule accepts `line`.
    pub fn find(&self, line: &str) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| e.matches(line))
    }

    /// Runs the first matching handler for `line`.
    ///
    /// Returns [`SessionError::UnknownCommand`] when nothing matches.
    pub fn dispatch(&self, ctx: &mut CommandContext<'_>, line: &str) -> Result<(), SessionError> {
        let entry = self
            .find(line)
            .ok_or_else(|| SessionError::UnknownCommand(line.to_string()))?;
        trace!(slot = ctx.session_id(), command = entry.command(), "Dispatching");
        (entry.handler)(ctx, line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;
    use crate::session::{ServerInfo, SessionLimits, SessionPool};

    fn noop(_: &mut CommandContext<'_>, _: &str) {}

    fn run(registry: &CommandRegistry, line: &str) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut pool = SessionPool::new(SessionLimits::default(), now);
        let info = ServerInfo::new("Test", "v0", now);
        let mut ctx = CommandContext::new(0, &mut pool, registry, &info, now);
        registry.dispatch(&mut ctx, line)
    }

    fn recorder(
        hits: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl Fn(&mut CommandContext<'_>, &str) + Send + Sync + 'static {
        let hits = Arc::clone(hits);
        move |_, _| hits.lock().unwrap().push(name)
    }

    #[test]
    fn test_empty_command_rejected() {
        let mut registry = CommandRegistry::new();
        assert!(matches!(registry.insert("", "nothing", noop), Err(SessionError::EmptyCommand)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut registry = CommandRegistry::new();
        registry.insert("help", "Display help", noop).unwrap();
        registry.insert("info", "System information", noop).unwrap();
        registry.insert_prefix("set", "Set parameter", noop, 3).unwrap();

        let names: Vec<_> = registry.list().map(|e| e.command()).collect();
        assert_eq!(names, vec!["help", "info", "set"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut registry = CommandRegistry::new();
        registry.insert("help", "old", noop).unwrap();
        registry.insert("info", "System information", noop).unwrap();
        registry.insert_prefix("help", "new", noop, 2).unwrap();

        assert_eq!(registry.len(), 2);
        let first = registry.list().next().unwrap();
        assert_eq!(first.command(), "help");
        assert_eq!(first.help(), "new");
        assert_eq!(first.match_len(), 2);
    }

    #[test]
    fn test_hidden_alias_dispatchable_but_unlisted() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = CommandRegistry::new();
        registry.insert("quit", "End the connection", noop).unwrap();
        let c = Arc::clone(&count);
        registry
            .insert("exit", "", move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(registry.list().all(|e| e.command() != "exit"));
        assert!(!registry.help_lines().contains("exit"));
        assert!(registry.get("exit").unwrap().is_hidden());

        run(&registry, "exit").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_first_match_wins() {
        let hits = Arc::new(Mutex::new(Vec::new()));

        let mut registry = CommandRegistry::new();
        registry.insert_prefix("set", "long", recorder(&hits, "set"), 3).unwrap();
        registry.insert_prefix("se", "short", recorder(&hits, "se"), 2).unwrap();
        run(&registry, "set x").unwrap();

        let mut reversed = CommandRegistry::new();
        reversed.insert_prefix("se", "short", recorder(&hits, "se"), 2).unwrap();
        reversed.insert_prefix("set", "long", recorder(&hits, "set"), 3).unwrap();
        run(&reversed, "set x").unwrap();

        assert_eq!(*hits.lock().unwrap(), vec!["set", "se"]);
    }

    #[test]
    fn test_exact_entry_does_not_shadow_prefix_input() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mut registry = CommandRegistry::new();
        registry.insert_prefix("set", "long", recorder(&hits, "set"), 3).unwrap();
        registry.insert("se", "short", recorder(&hits, "se")).unwrap();

        run(&registry, "set x").unwrap();
        run(&registry, "se").unwrap();
        assert_eq!(*hits.lock().unwrap(), vec!["set", "se"]);
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let mut registry = CommandRegistry::new();
        registry.insert("help", "Display help", noop).unwrap();

        let err = run(&registry, "frobnicate").unwrap_err();
        assert!(matches!(err, SessionError::UnknownCommand(ref line) if line == "frobnicate"));
        assert!(run(&registry, "HELP").is_err());
    }

    #[test]
    fn test_help_lines_format() {
        let mut registry = CommandRegistry::new();
        registry.insert("help", "Display help", noop).unwrap();
        registry.insert("exit", "", noop).unwrap();

        assert_eq!(registry.help_lines(), "\x1b[0;33m      help\x1b[0m\tDisplay help\r\n");
    }
}
