//! Human and JSON rendering for CLI results.

use serde::Serialize;
use std::io::{self, Write};
use stickyboard_core::{BoardSnapshot, Category, Note, NoteView, UploadTarget};

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Writes `value` as pretty JSON, or through `human` otherwise.
pub fn render<T, F>(mode: OutputMode, value: &T, human: F) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T, &mut dyn Write) -> io::Result<()>,
{
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if mode.is_json() {
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
    } else {
        human(value, &mut out)?;
    }
    Ok(())
}

pub fn categories(w: &mut dyn Write, categories: &[Category]) -> io::Result<()> {
    if categories.is_empty() {
        return writeln!(w, "no categories (run `stickyboard init`)");
    }
    for category in categories {
        writeln!(w, "{}  {:>3}  {}", category.id, category.order, category.name)?;
    }
    Ok(())
}

pub fn note(w: &mut dyn Write, note: &Note) -> io::Result<()> {
    writeln!(
        w,
        "{}  lane={}  order={}{}",
        note.id,
        note.category_id,
        note.order,
        note.image
            .as_ref()
            .map(|handle| format!("  image={handle}"))
            .unwrap_or_default()
    )?;
    writeln!(w, "    {}", first_line(&note.content))
}

pub fn note_views(w: &mut dyn Write, views: &[NoteView]) -> io::Result<()> {
    if views.is_empty() {
        return writeln!(w, "no notes");
    }
    for view in views {
        note(w, &view.note)?;
        if let Some(url) = &view.image_url {
            writeln!(w, "    image: {url}")?;
        }
    }
    Ok(())
}

pub fn board(w: &mut dyn Write, snapshot: &BoardSnapshot) -> io::Result<()> {
    if snapshot.is_empty() {
        return writeln!(w, "empty board");
    }
    for lane in &snapshot.lanes {
        writeln!(w, "{} ({})", lane.category.name, lane.notes.len())?;
        writeln!(w, "{:-<width$}", "", width = RULE_WIDTH)?;
        for view in &lane.notes {
            writeln!(
                w,
                "  [{}] {}  {}{}",
                view.note.order,
                short_id(&view.note.id),
                first_line(&view.note.content),
                if view.note.image.is_some() { "  [img]" } else { "" }
            )?;
        }
        writeln!(w)?;
    }
    Ok(())
}

pub fn upload_target(w: &mut dyn Write, target: &UploadTarget) -> io::Result<()> {
    writeln!(w, "token:      {}", target.token)?;
    writeln!(w, "url:        {}", target.url)?;
    writeln!(w, "expires_at: {}", target.expires_at)
}

fn short_id(id: &uuid::Uuid) -> String {
    id.simple().to_string().chars().take(8).collect()
}

fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or_default()
}
