//! Gameset validation.

use std::path::Path;

use rts_behavior::gameset::GameSet;
use serde::Serialize;

use crate::Result;

/// What a gameset declares, by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GamesetReport {
    /// Item names.
    pub items: usize,
    /// Animation tags.
    pub animations: usize,
    /// Event tags, including the built-in idle event.
    pub events: usize,
    /// Equations.
    pub equations: usize,
    /// Action sequences.
    pub sequences: usize,
    /// Object blueprints.
    pub objects: usize,
    /// Order blueprints.
    pub orders: usize,
    /// Task blueprints.
    pub tasks: usize,
    /// Order assignments.
    pub assignments: usize,
    /// Commands.
    pub commands: usize,
    /// Reactions.
    pub reactions: usize,
    /// Package receipt triggers.
    pub package_triggers: usize,
}

impl GamesetReport {
    /// Count the declarations of a compiled gameset.
    #[must_use]
    pub fn of(gameset: &GameSet) -> Self {
        let s = gameset.symbols();
        Self {
            items: s.items.len(),
            animations: s.animations.len(),
            events: s.events.len(),
            equations: s.equations.len(),
            sequences: s.sequences.len(),
            objects: s.objects.len(),
            orders: s.orders.len(),
            tasks: s.tasks.len(),
            assignments: s.assignments.len(),
            commands: s.commands.len(),
            reactions: s.reactions.len(),
            package_triggers: s.package_triggers.len(),
        }
    }
}

/// Load and compile a gameset file.
///
/// # Errors
///
/// Returns the first content error: parse failure, duplicate or
/// unresolved name, or malformed node.
pub fn validate_gameset(path: &Path) -> Result<GamesetReport> {
    let gameset = GameSet::load(path)?;
    let report = GamesetReport::of(&gameset);
    tracing::debug!(?report, "gameset validated");
    Ok(report)
}
