//! Terminal trace explorer -- browse a unification trace step by step.
//!
//! Run with:
//!   cargo run --example trace_explorer -p unitrace-engine [-- trace.json]
//!
//! Without an argument a small built-in trace is used. Commands (one per line
//! on stdin):
//!   toggle N  -- expand or collapse unification #N
//!   at N      -- show every known variable at position N
//!   quit      -- exit
//!
//! Toggle state lives here, in the viewer. The engine only answers queries.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use anyhow::Context;
use unitrace_engine::prelude::*;

const SAMPLE: &str = r#"{
    "variables": [10, 11],
    "events": [
        { "kind": "unification", "mode": "eq", "left": 1, "right": 2, "success": true,
          "children": [
            { "kind": "variable_set_descriptor", "variable": 1, "rank": 1,
              "content": { "type": "structure", "flat": { "shape": "apply", "symbol": "List", "args": [10] } } },
            { "kind": "variable_set_descriptor", "variable": 2, "rank": 1,
              "content": { "type": "structure", "flat": { "shape": "apply", "symbol": "List", "args": [11] } } },
            { "kind": "unification", "mode": "eq", "left": 10, "right": 11, "success": true,
              "children": [
                { "kind": "variable_set_descriptor", "variable": 11,
                  "content": { "type": "structure", "flat": { "shape": "apply", "symbol": "Str", "args": [] } } },
                { "kind": "variable_unified", "from": 10, "into": 11 }
              ] },
            { "kind": "variable_unified", "from": 1, "into": 2 }
          ] },
        { "kind": "unification", "mode": "present", "left": 3, "right": 11, "success": false }
    ]
}"#;

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toggle {
    Collapsed,
    Expanded,
}

impl Toggle {
    fn flipped(self) -> Toggle {
        match self {
            Toggle::Collapsed => Toggle::Expanded,
            Toggle::Expanded => Toggle::Collapsed,
        }
    }
}

struct Explorer {
    engine: Engine,
    /// One entry per unification node; every node starts collapsed.
    toggles: BTreeMap<EventId, Toggle>,
}

impl Explorer {
    fn new(engine: Engine) -> Self {
        let toggles = engine
            .log()
            .iter()
            .filter(|(_, node)| node.event.as_unification().is_some())
            .map(|(id, _)| (id, Toggle::Collapsed))
            .collect();
        Self { engine, toggles }
    }

    fn toggle(&mut self, event: EventId) -> anyhow::Result<()> {
        let toggle = self
            .toggles
            .get_mut(&event)
            .with_context(|| format!("{event} is not a unification"))?;
        *toggle = toggle.flipped();
        Ok(())
    }

    fn render(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let mut stack: Vec<(EventId, usize)> =
            self.engine.log().roots().iter().rev().map(|&id| (id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            let event = self.engine.log().event(id).context("event vanished from log")?;
            let indent = "  ".repeat(depth);
            match event.as_unification() {
                Some(unification) => {
                    let toggle = self.toggles.get(&id).copied().unwrap_or(Toggle::Collapsed);
                    let marker = if toggle == Toggle::Expanded { "v" } else { ">" };
                    writeln!(out, "{indent}{marker} {id} {event}")?;
                    for (label, index) in [
                        ("before", self.engine.before_index(id)?),
                        ("after ", self.engine.after_index(id)?),
                    ] {
                        let left = self.engine.resolve(unification.left, index)?;
                        let right = self.engine.resolve(unification.right, index)?;
                        writeln!(
                            out,
                            "{indent}    {label} {index}: {} is {left}; {} is {right}",
                            unification.left, unification.right
                        )?;
                    }
                    if toggle == Toggle::Expanded {
                        for &child in self.engine.log().children(id).iter().rev() {
                            stack.push((child, depth + 1));
                        }
                    }
                }
                None => writeln!(out, "{indent}  {id} {event}")?,
            }
        }
        Ok(())
    }

    fn show_at(&self, index: EventIndex, out: &mut impl Write) -> anyhow::Result<()> {
        let snapshot = self.engine.snapshot_at(index)?;
        writeln!(out, "state at {index} (hash {})", &snapshot.hash[..12])?;
        for (variable, state) in &snapshot.variables {
            writeln!(out, "  {variable}: {state}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let json = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => SAMPLE.to_owned(),
    };
    let log = EventLog::from_json(&json).context("parsing trace")?;
    let engine = Engine::build(log).context("indexing trace")?;

    let failed = engine.failed_unifications();
    let mut explorer = Explorer::new(engine);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    explorer.render(&mut out)?;
    if !failed.is_empty() {
        let ids: Vec<String> = failed.iter().map(ToString::to_string).collect();
        writeln!(out, "failed unifications: {}", ids.join(", "))?;
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        let result = match (words.next(), words.next().map(str::parse::<u32>)) {
            (Some("quit"), _) => break,
            (Some("toggle"), Some(Ok(n))) => explorer
                .toggle(EventId::new(n))
                .and_then(|()| explorer.render(&mut out)),
            (Some("at"), Some(Ok(n))) => explorer.show_at(EventIndex::from_raw(n), &mut out),
            (None, _) => Ok(()),
            _ => Err(anyhow::anyhow!("commands: toggle N | at N | quit")),
        };
        if let Err(err) = result {
            writeln!(out, "error: {err:#}")?;
        }
    }
    Ok(())
}
